//! Conjunctive filter predicates over catalog products.

use std::fmt;

use serde::{Deserialize, Serialize};
use trailfit_core::{Attribute, Product};

use crate::error::RetrievalError;

/// One exact-match or range constraint on a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Constraint {
    /// Case-insensitive exact match on a categorical attribute.
    Equals { attribute: Attribute, value: String },
    /// Case-insensitive match against any of `values`.
    OneOf {
        attribute: Attribute,
        values: Vec<String>,
    },
    MinPrice { value: f64 },
    MaxPrice { value: f64 },
    MinRating { value: f64 },
    /// Rejects any product whose brand is in the list (case-insensitive).
    ExcludeBrands { brands: Vec<String> },
}

impl Constraint {
    #[must_use]
    pub fn equals(attribute: Attribute, value: impl Into<String>) -> Self {
        Constraint::Equals {
            attribute,
            value: value.into(),
        }
    }

    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        match self {
            Constraint::Equals { attribute, value } => product
                .attribute(*attribute)
                .trim()
                .eq_ignore_ascii_case(value.trim()),
            Constraint::OneOf { attribute, values } => {
                let actual = product.attribute(*attribute).trim();
                values.iter().any(|v| actual.eq_ignore_ascii_case(v.trim()))
            }
            Constraint::MinPrice { value } => product.price >= *value,
            Constraint::MaxPrice { value } => product.price <= *value,
            Constraint::MinRating { value } => product.rating >= *value,
            Constraint::ExcludeBrands { brands } => !brands
                .iter()
                .any(|b| b.trim().eq_ignore_ascii_case(product.brand.trim())),
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Equals { attribute, value } => write!(f, "{attribute} = {value}"),
            Constraint::OneOf { attribute, values } => {
                write!(f, "{attribute} in [{}]", values.join(", "))
            }
            Constraint::MinPrice { value } => write!(f, "price >= {value}"),
            Constraint::MaxPrice { value } => write!(f, "price <= {value}"),
            Constraint::MinRating { value } => write!(f, "rating >= {value}"),
            Constraint::ExcludeBrands { brands } => {
                write!(f, "brand not in [{}]", brands.join(", "))
            }
        }
    }
}

/// Ordering applied to pure-filter results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Rating descending, then price ascending.
    TopRated,
}

/// A conjunction of [`Constraint`]s plus an optional sort key.
///
/// The empty predicate matches every product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortKey>,
}

impl Predicate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    #[must_use]
    pub fn sorted_by(mut self, key: SortKey) -> Self {
        self.sort = Some(key);
        self
    }

    pub fn push(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    /// True when there are no constraints. A sort key alone does not filter.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        self.constraints.iter().all(|c| c.matches(product))
    }

    /// Copy of this predicate with the constraint at `index` removed.
    #[must_use]
    pub fn without(&self, index: usize) -> Self {
        let mut relaxed = self.clone();
        if index < relaxed.constraints.len() {
            relaxed.constraints.remove(index);
        }
        relaxed
    }

    /// Tightest price ceiling among the constraints, if any.
    #[must_use]
    pub fn max_price(&self) -> Option<f64> {
        self.constraints
            .iter()
            .filter_map(|c| match c {
                Constraint::MaxPrice { value } => Some(*value),
                _ => None,
            })
            .reduce(f64::min)
    }

    /// Build a predicate from `key=value` pairs.
    ///
    /// Categorical keys are the [`Attribute`] field names. Range keys are
    /// `min_price`, `max_price`, and `min_rating`. `exclude_brands` takes a
    /// comma-separated list and `sort` accepts `top_rated` (or `rating`).
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::InvalidInput`] for unknown keys, empty values,
    /// or numbers that do not parse.
    pub fn parse_pairs<I, K, V>(pairs: I) -> Result<Self, RetrievalError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut predicate = Self::new();
        for (key, value) in pairs {
            let key = key.as_ref().trim().to_ascii_lowercase();
            let value = value.as_ref().trim();
            if value.is_empty() {
                return Err(RetrievalError::InvalidInput(format!(
                    "filter '{key}' has an empty value"
                )));
            }

            if let Some(attribute) = Attribute::from_field_name(&key) {
                predicate.push(Constraint::equals(attribute, value));
                continue;
            }

            match key.as_str() {
                "min_price" => predicate.push(Constraint::MinPrice {
                    value: parse_number(&key, value)?,
                }),
                "max_price" => predicate.push(Constraint::MaxPrice {
                    value: parse_number(&key, value)?,
                }),
                "min_rating" => predicate.push(Constraint::MinRating {
                    value: parse_number(&key, value)?,
                }),
                "exclude_brands" => predicate.push(Constraint::ExcludeBrands {
                    brands: value
                        .split(',')
                        .map(str::trim)
                        .filter(|b| !b.is_empty())
                        .map(str::to_owned)
                        .collect(),
                }),
                "sort" => match value.to_ascii_lowercase().as_str() {
                    "top_rated" | "rating" => predicate.sort = Some(SortKey::TopRated),
                    other => {
                        return Err(RetrievalError::InvalidInput(format!(
                            "unknown sort key '{other}'"
                        )))
                    }
                },
                other => {
                    return Err(RetrievalError::InvalidInput(format!(
                        "unknown filter key '{other}'"
                    )))
                }
            }
        }
        Ok(predicate)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.constraints.is_empty() {
            return f.write_str("(any)");
        }
        let parts: Vec<String> = self.constraints.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join(" AND "))
    }
}

fn parse_number(key: &str, value: &str) -> Result<f64, RetrievalError> {
    let number = value
        .trim_start_matches('$')
        .parse::<f64>()
        .map_err(|e| RetrievalError::InvalidInput(format!("filter '{key}': {e}")))?;
    if !number.is_finite() {
        return Err(RetrievalError::InvalidInput(format!(
            "filter '{key}' must be a finite number"
        )));
    }
    Ok(number)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jacket(brand: &str, color: &str, price: f64, rating: f64) -> Product {
        Product {
            id: format!("{brand}-{color}"),
            name: format!("{brand} {color} jacket"),
            brand: brand.to_owned(),
            category: "Outerwear".to_owned(),
            subcategory: "Shell Jackets".to_owned(),
            price,
            rating,
            gender: "Unisex".to_owned(),
            season: "Winter".to_owned(),
            waterproofing: "Waterproof".to_owned(),
            insulation: "Synthetic".to_owned(),
            material: "Nylon".to_owned(),
            color: color.to_owned(),
            purpose: "Skiing".to_owned(),
            terrain: "Alpine".to_owned(),
            description: String::new(),
        }
    }

    #[test]
    fn empty_predicate_matches_everything() {
        assert!(Predicate::new().matches(&jacket("NorthPeak", "Blue", 999.0, 0.0)));
    }

    #[test]
    fn equals_is_case_insensitive() {
        let p = Predicate::new().with(Constraint::equals(Attribute::Color, "blue"));
        assert!(p.matches(&jacket("NorthPeak", "Blue", 100.0, 4.0)));
        assert!(!p.matches(&jacket("NorthPeak", "Red", 100.0, 4.0)));
    }

    #[test]
    fn one_of_accepts_any_listed_value() {
        let c = Constraint::OneOf {
            attribute: Attribute::Season,
            values: vec!["winter".into(), "All-season".into()],
        };
        assert!(c.matches(&jacket("NorthPeak", "Blue", 100.0, 4.0)));
        let mut summer = jacket("NorthPeak", "Blue", 100.0, 4.0);
        summer.season = "Summer".into();
        assert!(!c.matches(&summer));
        assert_eq!(c.to_string(), "season in [winter, All-season]");
    }

    #[test]
    fn ranges_are_inclusive() {
        let p = Predicate::new()
            .with(Constraint::MaxPrice { value: 300.0 })
            .with(Constraint::MinRating { value: 4.0 });
        assert!(p.matches(&jacket("NorthPeak", "Blue", 300.0, 4.0)));
        assert!(!p.matches(&jacket("NorthPeak", "Blue", 300.01, 4.0)));
        assert!(!p.matches(&jacket("NorthPeak", "Blue", 100.0, 3.9)));
    }

    #[test]
    fn exclude_brands_rejects_listed_brand() {
        let p = Predicate::new().with(Constraint::ExcludeBrands {
            brands: vec!["northpeak".into()],
        });
        assert!(!p.matches(&jacket("NorthPeak", "Blue", 100.0, 4.0)));
        assert!(p.matches(&jacket("Ridgeline", "Blue", 100.0, 4.0)));
    }

    #[test]
    fn parse_pairs_builds_constraints() {
        let p = Predicate::parse_pairs([
            ("brand", "NorthPeak"),
            ("max_price", "$250"),
            ("min_rating", "4.5"),
            ("exclude_brands", "Ridgeline, Summit"),
            ("sort", "top_rated"),
        ])
        .unwrap();
        assert_eq!(p.constraints.len(), 4);
        assert_eq!(p.max_price(), Some(250.0));
        assert_eq!(p.sort, Some(SortKey::TopRated));
        assert_eq!(
            p.constraints[3],
            Constraint::ExcludeBrands {
                brands: vec!["Ridgeline".into(), "Summit".into()]
            }
        );
    }

    #[test]
    fn parse_pairs_rejects_unknown_key() {
        let err = Predicate::parse_pairs([("colour", "blue")]).unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidInput(ref m) if m.contains("colour")));
    }

    #[test]
    fn parse_pairs_rejects_bad_number() {
        let err = Predicate::parse_pairs([("max_price", "cheap")]).unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidInput(_)));
    }

    #[test]
    fn without_drops_one_constraint() {
        let p = Predicate::new()
            .with(Constraint::equals(Attribute::Brand, "NorthPeak"))
            .with(Constraint::MaxPrice { value: 10.0 });
        let relaxed = p.without(0);
        assert_eq!(relaxed.constraints, vec![Constraint::MaxPrice { value: 10.0 }]);
        assert_eq!(p.constraints.len(), 2);
    }

    #[test]
    fn display_joins_constraints() {
        let p = Predicate::new()
            .with(Constraint::equals(Attribute::Brand, "NorthPeak"))
            .with(Constraint::MaxPrice { value: 300.0 });
        assert_eq!(p.to_string(), "brand = NorthPeak AND price <= 300");
        assert_eq!(Predicate::new().to_string(), "(any)");
    }
}
