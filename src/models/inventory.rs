use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_CATEGORY: &str = "Individual";
pub const PLACEHOLDER_IMAGE: &str = "Placeholder.png";

/// Restriction tag on an inventory row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Restriction {
    #[default]
    None,
    Academy,
}

impl Restriction {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "Academy" => Restriction::Academy,
            _ => Restriction::None,
        }
    }
}

impl<'de> Deserialize<'de> for Restriction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(Restriction::parse).unwrap_or_default())
    }
}

/// Stock column: either a count or a free-form marker such as `X`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StockLevel {
    Count(i64),
    Text(String),
}

impl Default for StockLevel {
    fn default() -> Self {
        StockLevel::Text(String::new())
    }
}

impl std::fmt::Display for StockLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StockLevel::Count(n) => write!(f, "{}", n),
            StockLevel::Text(s) => write!(f, "{}", s),
        }
    }
}

/// A listed catalog item as returned by `getInventory`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub name: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub stock: StockLevel,
    #[serde(default)]
    pub restriction: Restriction,
    #[serde(default = "default_true")]
    pub available: bool,
    #[serde(default)]
    pub image: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub market_price: Option<f64>,
    #[serde(default)]
    pub required_missions: Option<String>,
    #[serde(default)]
    pub is_academy_restricted: bool,
}

impl InventoryItem {
    pub fn image_or_placeholder(&self) -> &str {
        if self.image.trim().is_empty() {
            PLACEHOLDER_IMAGE
        } else {
            &self.image
        }
    }
}

/// Inventory mapping keyed by item name
pub type Inventory = BTreeMap<String, InventoryItem>;

/// Raw inventory sheet row (columns A..I)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryRow {
    /// Column A, boolean or its text form
    #[serde(default)]
    pub listing: serde_json::Value,
    #[serde(default)]
    pub restriction: String,
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub stock: StockLevel,
    #[serde(default)]
    pub image: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub market_price: Option<f64>,
    #[serde(default)]
    pub required_missions: Option<String>,
}

impl InventoryRow {
    /// Listing flag is truthy only for `true`, `"TRUE"` and `"true"`
    pub fn is_listed(&self) -> bool {
        match &self.listing {
            serde_json::Value::Bool(b) => *b,
            serde_json::Value::String(s) => s == "TRUE" || s == "true",
            _ => false,
        }
    }

    /// Convert to a catalog item, or `None` when the row is unlisted or unnamed
    pub fn to_item(&self) -> Option<InventoryItem> {
        if self.name.trim().is_empty() || !self.is_listed() {
            return None;
        }

        let restriction = Restriction::parse(&self.restriction);
        let category = if self.category.trim().is_empty() {
            DEFAULT_CATEGORY.to_string()
        } else {
            self.category.clone()
        };
        let image = if self.image.trim().is_empty() {
            PLACEHOLDER_IMAGE.to_string()
        } else {
            self.image.clone()
        };

        Some(InventoryItem {
            name: self.name.clone(),
            category,
            stock: self.stock.clone(),
            restriction,
            available: true,
            image,
            market_price: self.market_price,
            required_missions: self.required_missions.clone(),
            is_academy_restricted: restriction == Restriction::Academy,
        })
    }

    /// Price used for cost computation; unparsable prices count as zero
    pub fn unit_price(&self) -> f64 {
        self.market_price.unwrap_or(0.0)
    }
}

/// Build the listed inventory from sheet rows
pub fn listed_inventory(rows: &[InventoryRow]) -> Inventory {
    rows.iter()
        .filter_map(|row| row.to_item())
        .map(|item| (item.name.clone(), item))
        .collect()
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

fn default_true() -> bool {
    true
}

/// Accepts numbers, numeric strings, empty strings and null
pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    })
}
