//! Error types shared by ODP crates

use thiserror::Error;

/// Result type alias for ODP operations
pub type Result<T> = std::result::Result<T, OdpError>;

/// Errors that cross crate boundaries without a more specific home
#[derive(Error, Debug)]
pub enum OdpError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl OdpError {
    /// Build a configuration error from any displayable message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_message() {
        let err = OdpError::config("LOG_LEVEL is not a level");
        assert_eq!(err.to_string(), "Configuration error: LOG_LEVEL is not a level");
    }

    #[test]
    fn test_io_error_converts() {
        fn open() -> Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "missing"))?;
            Ok(())
        }

        assert!(matches!(open(), Err(OdpError::Io(_))));
    }
}
