use serde::{Deserialize, Serialize};

/// Stock status of a listed product, normalized to a closed vocabulary.
///
/// Serializes to the human-facing labels (`"In Stock"`, `"Out of Stock"`, ...)
/// so exported files read naturally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Availability {
    #[serde(rename = "In Stock")]
    InStock,
    #[serde(rename = "Out of Stock")]
    OutOfStock,
    #[serde(rename = "Pre-Order")]
    PreOrder,
    #[serde(rename = "Limited Stock")]
    LimitedStock,
    #[default]
    Unknown,
}

impl Availability {
    pub const ALL: [Availability; 5] = [
        Availability::InStock,
        Availability::OutOfStock,
        Availability::PreOrder,
        Availability::LimitedStock,
        Availability::Unknown,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Availability::InStock => "In Stock",
            Availability::OutOfStock => "Out of Stock",
            Availability::PreOrder => "Pre-Order",
            Availability::LimitedStock => "Limited Stock",
            Availability::Unknown => "Unknown",
        }
    }

    /// Exact (case-insensitive) match against the canonical labels.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(label))
    }
}

impl std::fmt::Display for Availability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field values as scraped from one product container (or one item of an
/// oracle response), before any cleaning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawProductRecord {
    pub name: Option<String>,
    pub price: Option<String>,
    pub availability: Option<String>,
    pub product_url: Option<String>,
    pub image_url: Option<String>,
    /// Listing page the record was scraped from.
    #[serde(default)]
    pub source_url: String,
}

impl RawProductRecord {
    /// A record is worth keeping only when it carries a name or a price.
    #[must_use]
    pub fn has_identity(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        present(&self.name) || present(&self.price)
    }
}

/// A product after cleaning: name normalized, price parsed, URLs absolute and
/// stripped of tracking parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanedProductRecord {
    pub name: String,
    /// Display price, e.g. `"$1,299.00"`.
    pub price: Option<String>,
    /// Numeric price rounded to two decimals.
    pub price_numeric: Option<f64>,
    pub availability: Availability,
    pub product_url: Option<String>,
    pub image_url: Option<String>,
    pub source_url: String,
}

impl CleanedProductRecord {
    /// Identity used for de-duplication: lowercased trimmed name plus the
    /// display price.
    #[must_use]
    pub fn dedup_key(&self) -> (String, Option<String>) {
        (self.name.trim().to_lowercase(), self.price.clone())
    }
}
