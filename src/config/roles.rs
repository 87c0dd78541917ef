use serde::{Deserialize, Serialize};

/// Role names that grant access to the staff console
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct LogisticsRoles {
    names: Vec<String>,
}

impl LogisticsRoles {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: names
                .into_iter()
                .map(|n| n.as_ref().trim().to_lowercase())
                .filter(|n| !n.is_empty())
                .collect(),
        }
    }

    /// Parse a comma-separated list, e.g. from `LOGISTICS_ROLES`
    pub fn from_csv(raw: &str) -> Self {
        Self::new(raw.split(','))
    }

    /// Case-insensitive exact match against the configured names
    pub fn contains(&self, role: &str) -> bool {
        let role = role.trim().to_lowercase();
        self.names.iter().any(|n| *n == role)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

impl Default for LogisticsRoles {
    fn default() -> Self {
        Self::new(["logistics", "logistics staff", "admin", "administrator"])
    }
}
