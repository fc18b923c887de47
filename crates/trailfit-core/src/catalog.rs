use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::product::Product;
use crate::ConfigError;

const MAX_RATING: f64 = 5.0;

#[derive(Debug, Deserialize)]
struct CatalogFile {
    products: Vec<Product>,
}

/// The immutable product catalog in its natural (document) order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    products: Vec<Product>,
    index: HashMap<String, usize>,
}

impl Catalog {
    /// Build a catalog from already-parsed products, validating them.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] on duplicate or empty ids, negative
    /// prices, or ratings outside `[0, 5]`.
    pub fn from_products(products: Vec<Product>) -> Result<Self, ConfigError> {
        validate_products(&products)?;
        let index = products
            .iter()
            .enumerate()
            .map(|(pos, p)| (p.id.clone(), pos))
            .collect();
        Ok(Self { products, index })
    }

    /// See [`load_catalog`].
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        load_catalog(path)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Product> {
        self.index.get(id).map(|&pos| &self.products[pos])
    }

    /// Position of a product in natural catalog order.
    #[must_use]
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    #[must_use]
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.products.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Distinct brand names, sorted.
    #[must_use]
    pub fn brands(&self) -> Vec<String> {
        let set: std::collections::BTreeSet<&str> =
            self.products.iter().map(|p| p.brand.as_str()).collect();
        set.into_iter().map(str::to_owned).collect()
    }

    /// Aggregate counts and price/rating statistics for catalog-info answers.
    #[must_use]
    pub fn summary(&self) -> CatalogSummary {
        let mut summary = CatalogSummary {
            total_products: self.products.len(),
            ..CatalogSummary::default()
        };
        for p in &self.products {
            *summary.brands.entry(p.brand.clone()).or_default() += 1;
            *summary.categories.entry(p.category.clone()).or_default() += 1;
            *summary.genders.entry(p.gender.clone()).or_default() += 1;
            *summary.seasons.entry(p.season.clone()).or_default() += 1;
        }
        summary.price = NumericStats::from_values(self.products.iter().map(|p| p.price));
        summary.rating = NumericStats::from_values(self.products.iter().map(|p| p.rating));
        summary
    }
}

/// Catalog overview returned for INFO queries.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CatalogSummary {
    pub total_products: usize,
    pub brands: BTreeMap<String, usize>,
    pub categories: BTreeMap<String, usize>,
    pub genders: BTreeMap<String, usize>,
    pub seasons: BTreeMap<String, usize>,
    /// `None` for an empty catalog.
    pub price: Option<NumericStats>,
    pub rating: Option<NumericStats>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NumericStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

impl NumericStats {
    fn from_values(values: impl Iterator<Item = f64>) -> Option<Self> {
        let mut count = 0_u32;
        let mut stats = Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            avg: 0.0,
        };
        for v in values {
            count += 1;
            stats.min = stats.min.min(v);
            stats.max = stats.max.max(v);
            stats.avg += v;
        }
        if count == 0 {
            return None;
        }
        stats.avg = ((stats.avg / f64::from(count)) * 100.0).round() / 100.0;
        Some(stats)
    }
}

/// Load and validate the catalog document (YAML or JSON) at `path`.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_catalog(path: &Path) -> Result<Catalog, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::CatalogFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let file: CatalogFile = serde_yaml::from_str(&content)?;
    Catalog::from_products(file.products)
}

fn validate_products(products: &[Product]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for product in products {
        if product.id.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "product '{}' has an empty id",
                product.name
            )));
        }

        if !seen.insert(product.id.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate product id: '{}'",
                product.id
            )));
        }

        if !product.price.is_finite() || product.price < 0.0 {
            return Err(ConfigError::Validation(format!(
                "product '{}' has invalid price {}",
                product.id, product.price
            )));
        }

        if !(0.0..=MAX_RATING).contains(&product.rating) {
            return Err(ConfigError::Validation(format!(
                "product '{}' has rating {} outside 0-{MAX_RATING}",
                product.id, product.rating
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: &str, brand: &str, price: f64, rating: f64) -> Product {
        Product {
            id: id.to_owned(),
            name: format!("{brand} item {id}"),
            brand: brand.to_owned(),
            category: "Outerwear".to_owned(),
            subcategory: "Shell Jackets".to_owned(),
            price,
            rating,
            gender: "Unisex".to_owned(),
            season: "All-season".to_owned(),
            waterproofing: "Waterproof".to_owned(),
            insulation: "None".to_owned(),
            material: "Nylon".to_owned(),
            color: "Black".to_owned(),
            purpose: "Trail Hiking".to_owned(),
            terrain: "Mountain".to_owned(),
            description: String::new(),
        }
    }

    #[test]
    fn keeps_natural_order_and_indexes_ids() {
        let catalog = Catalog::from_products(vec![
            product("b", "AlpineCo", 10.0, 4.0),
            product("a", "NorthPeak", 20.0, 3.0),
        ])
        .unwrap();
        assert_eq!(catalog.products()[0].id, "b");
        assert_eq!(catalog.position("a"), Some(1));
        assert_eq!(catalog.get("a").unwrap().brand, "NorthPeak");
        assert!(catalog.get("zzz").is_none());
    }

    #[test]
    fn rejects_duplicate_ids() {
        let err = Catalog::from_products(vec![
            product("a", "AlpineCo", 10.0, 4.0),
            product("a", "NorthPeak", 20.0, 3.0),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref m) if m.contains("duplicate")));
    }

    #[test]
    fn rejects_negative_price() {
        let err = Catalog::from_products(vec![product("a", "AlpineCo", -1.0, 4.0)]).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref m) if m.contains("price")));
    }

    #[test]
    fn rejects_rating_out_of_scale() {
        let err = Catalog::from_products(vec![product("a", "AlpineCo", 1.0, 5.5)]).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref m) if m.contains("rating")));
    }

    #[test]
    fn summary_counts_and_stats() {
        let catalog = Catalog::from_products(vec![
            product("a", "AlpineCo", 100.0, 4.0),
            product("b", "AlpineCo", 200.0, 5.0),
            product("c", "NorthPeak", 300.0, 3.0),
        ])
        .unwrap();
        let summary = catalog.summary();
        assert_eq!(summary.total_products, 3);
        assert_eq!(summary.brands["AlpineCo"], 2);
        let price = summary.price.unwrap();
        assert_eq!(price.min, 100.0);
        assert_eq!(price.max, 300.0);
        assert_eq!(price.avg, 200.0);
        assert_eq!(catalog.brands(), vec!["AlpineCo", "NorthPeak"]);
    }

    #[test]
    fn summary_of_empty_catalog_has_no_stats() {
        let summary = Catalog::default().summary();
        assert_eq!(summary.total_products, 0);
        assert!(summary.price.is_none());
    }

    #[test]
    fn load_catalog_reads_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.yaml");
        std::fs::write(
            &path,
            r"
products:
  - id: PRD-1
    name: Summit Parka
    brand: NorthPeak
    category: Outerwear
    subcategory: Parkas
    price: 349.0
    rating: 4.6
    gender: Women
    season: Winter
    waterproofing: Waterproof
    insulation: Down
    material: Nylon
    color: Blue
    purpose: Skiing
    terrain: Alpine
",
        )
        .unwrap();
        let catalog = load_catalog(&path).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("PRD-1").unwrap().color, "Blue");
    }

    #[test]
    fn load_catalog_missing_file_is_io_error() {
        let err = load_catalog(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::CatalogFileIo { .. }));
    }

    #[test]
    fn bundled_sample_catalog_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../data/catalog.yaml");
        let catalog = load_catalog(&path).unwrap();
        assert_eq!(catalog.len(), 8);
        assert_eq!(catalog.brands(), vec!["Cascade", "NorthPeak", "Ridgeline"]);
    }
}
