use serde::{Deserialize, Serialize};

/// An outdoor-apparel catalog record.
///
/// Created once by catalog ingestion and read-only afterwards. The embedding
/// vector lives with the similarity oracle, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(alias = "product_id")]
    pub id: String,
    #[serde(alias = "product_name")]
    pub name: String,
    pub brand: String,
    pub category: String,
    pub subcategory: String,
    /// Price in USD. Never negative (enforced at catalog load).
    #[serde(alias = "price_usd")]
    pub price: f64,
    /// Average review score on a 0.0–5.0 scale.
    pub rating: f64,
    pub gender: String,
    pub season: String,
    pub waterproofing: String,
    pub insulation: String,
    pub material: String,
    pub color: String,
    #[serde(alias = "primary_purpose")]
    pub purpose: String,
    pub terrain: String,
    #[serde(default)]
    pub description: String,
}

impl Product {
    /// Value of a categorical attribute.
    #[must_use]
    pub fn attribute(&self, attr: Attribute) -> &str {
        match attr {
            Attribute::Brand => &self.brand,
            Attribute::Category => &self.category,
            Attribute::Subcategory => &self.subcategory,
            Attribute::Gender => &self.gender,
            Attribute::Season => &self.season,
            Attribute::Waterproofing => &self.waterproofing,
            Attribute::Insulation => &self.insulation,
            Attribute::Material => &self.material,
            Attribute::Color => &self.color,
            Attribute::Purpose => &self.purpose,
            Attribute::Terrain => &self.terrain,
        }
    }

    /// Text handed to embedders: name, brand, taxonomy, description and every
    /// categorical attribute, one per line.
    #[must_use]
    pub fn document(&self) -> String {
        format!(
            "{}\nBrand: {}\nCategory: {} - {}\nDescription: {}\nGender: {}\nMaterial: {}\n\
             Season: {}\nPurpose: {}\nTerrain: {}\nFeatures: Waterproofing={}, Insulation={}\n\
             Color: {}",
            self.name,
            self.brand,
            self.category,
            self.subcategory,
            self.description,
            self.gender,
            self.material,
            self.season,
            self.purpose,
            self.terrain,
            self.waterproofing,
            self.insulation,
            self.color,
        )
    }
}

/// Categorical product attributes addressable by exact-match filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    Brand,
    Category,
    Subcategory,
    Gender,
    Season,
    Waterproofing,
    Insulation,
    Material,
    Color,
    Purpose,
    Terrain,
}

impl Attribute {
    pub const ALL: [Attribute; 11] = [
        Attribute::Brand,
        Attribute::Category,
        Attribute::Subcategory,
        Attribute::Gender,
        Attribute::Season,
        Attribute::Waterproofing,
        Attribute::Insulation,
        Attribute::Material,
        Attribute::Color,
        Attribute::Purpose,
        Attribute::Terrain,
    ];

    /// Field name as it appears in catalog documents and oracle payloads.
    #[must_use]
    pub fn field_name(self) -> &'static str {
        match self {
            Attribute::Brand => "brand",
            Attribute::Category => "category",
            Attribute::Subcategory => "subcategory",
            Attribute::Gender => "gender",
            Attribute::Season => "season",
            Attribute::Waterproofing => "waterproofing",
            Attribute::Insulation => "insulation",
            Attribute::Material => "material",
            Attribute::Color => "color",
            Attribute::Purpose => "purpose",
            Attribute::Terrain => "terrain",
        }
    }

    /// Parse a field name. Returns `None` for anything that is not a
    /// categorical attribute.
    #[must_use]
    pub fn from_field_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|attr| attr.field_name().eq_ignore_ascii_case(name.trim()))
    }
}

impl std::fmt::Display for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.field_name())
    }
}
