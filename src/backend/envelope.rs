use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::{PortalError, Result};

/// Response shape shared by the sheet function and the bot API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(alias = "user", skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// Data of a successful envelope; `success:false` or missing data is an error
    pub fn into_data(self, action: &str) -> Result<T> {
        if !self.success {
            return Err(PortalError::backend(self.failure_message(action)));
        }
        self.data.ok_or_else(|| PortalError::Decode {
            action: action.to_string(),
            message: "response carried no data".to_string(),
        })
    }

    /// Success check for actions whose data is irrelevant
    pub fn into_unit(self, action: &str) -> Result<()> {
        if self.success {
            Ok(())
        } else {
            Err(PortalError::backend(self.failure_message(action)))
        }
    }

    fn failure_message(&self, action: &str) -> String {
        if self.message.trim().is_empty() {
            format!("{} failed", action)
        } else {
            self.message.clone()
        }
    }
}

/// Decode an envelope from raw JSON text
pub fn decode<T: DeserializeOwned>(action: &str, body: &str) -> Result<Envelope<T>> {
    serde_json::from_str(body).map_err(|e| PortalError::Decode {
        action: action.to_string(),
        message: e.to_string(),
    })
}
