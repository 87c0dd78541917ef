use thiserror::Error;

#[derive(Error, Debug)]
pub enum PortalError {
    // Transport errors
    #[error("Network error: {message}")]
    Transport { message: String },

    #[error("{message}")]
    Backend { message: String },

    #[error("Unexpected response from {action}: {message}")]
    Decode { action: String, message: String },

    // Precondition errors (reported before any round trip)
    #[error("{message}")]
    MissingPrecondition { message: String },

    #[error("{what} not found: {id}")]
    NotFound { what: String, id: String },

    // State errors
    #[error("Failed to save state to '{path}': {source}")]
    StateSave {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to load state from '{path}': {source}")]
    StateLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse state file '{path}': {source}")]
    StateParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    // Generic errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl PortalError {
    pub fn precondition(message: impl Into<String>) -> Self {
        PortalError::MissingPrecondition {
            message: message.into(),
        }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        PortalError::Backend {
            message: message.into(),
        }
    }

    /// True when the failure was detected locally without contacting a backend
    pub fn is_precondition(&self) -> bool {
        matches!(self, PortalError::MissingPrecondition { .. })
    }
}

impl From<reqwest::Error> for PortalError {
    fn from(err: reqwest::Error) -> Self {
        PortalError::Transport {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for PortalError {
    fn from(err: std::io::Error) -> Self {
        PortalError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for PortalError {
    fn from(err: serde_json::Error) -> Self {
        PortalError::Internal {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PortalError>;
