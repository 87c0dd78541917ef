use serde::{Deserialize, Serialize};

/// Default section for items listed before any section header
pub const DEFAULT_SECTION: &str = "Items";
/// Row value marking the end of a kit block
pub const END_MARKER: &str = "-";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KitItem {
    pub name: String,
    pub quantity: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KitSection {
    pub name: String,
    pub items: Vec<KitItem>,
}

/// Contents of a kit from the lookup table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KitInfo {
    pub name: String,
    pub sections: Vec<KitSection>,
}

/// One row of the two-column lookup table (name, quantity)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LookupRow(pub String, pub String);

impl LookupRow {
    pub fn new(name: &str, quantity: &str) -> Self {
        Self(name.to_string(), quantity.to_string())
    }
}

impl KitInfo {
    /// Locate `kit_name` in the lookup rows and read its sections.
    ///
    /// The kit header is matched case-insensitively after trimming. A header
    /// row mentioning "items" directly below the kit name is skipped. Rows
    /// with a name and no quantity open a section; `-` closes the kit.
    pub fn from_lookup_rows(kit_name: &str, rows: &[LookupRow]) -> Option<KitInfo> {
        let wanted = kit_name.trim().to_lowercase();
        let start = rows
            .iter()
            .position(|row| !row.0.trim().is_empty() && row.0.trim().to_lowercase() == wanted)?;

        let mut kit = KitInfo {
            name: rows[start].0.trim().to_string(),
            sections: Vec::new(),
        };

        let mut cursor = start + 1;
        if rows
            .get(cursor)
            .is_some_and(|row| row.0.to_lowercase().contains("items"))
        {
            cursor += 1;
        }

        let mut current: Option<KitSection> = None;

        for row in &rows[cursor.min(rows.len())..] {
            let name = row.0.trim();
            let quantity = row.1.trim();

            if name == END_MARKER {
                break;
            }
            if name.is_empty() {
                continue;
            }

            if quantity.is_empty() {
                if let Some(section) = current.take() {
                    kit.sections.push(section);
                }
                current = Some(KitSection {
                    name: name.to_string(),
                    items: Vec::new(),
                });
                continue;
            }

            let item = KitItem {
                name: name.to_string(),
                quantity: quantity.to_string(),
            };
            match current.as_mut() {
                Some(section) => section.items.push(item),
                None => kit.default_section().items.push(item),
            }
        }

        if let Some(section) = current {
            kit.sections.push(section);
        }

        Some(kit)
    }

    fn default_section(&mut self) -> &mut KitSection {
        let index = match self.sections.iter().position(|s| s.name == DEFAULT_SECTION) {
            Some(index) => index,
            None => {
                self.sections.push(KitSection {
                    name: DEFAULT_SECTION.to_string(),
                    items: Vec::new(),
                });
                self.sections.len() - 1
            }
        };
        &mut self.sections[index]
    }

    pub fn item_total(&self) -> usize {
        self.sections.iter().map(|s| s.items.len()).sum()
    }
}
