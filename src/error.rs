use std::error::Error as StdError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Initialization error: {message}")]
    InitializationError {
        message: String,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },

    #[error("Configuration error for {parameter}: {message}")]
    ConfigurationError {
        message: String,
        parameter: String,
    },

    #[error("Transport error: {message}")]
    TransportError {
        message: String,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },

    /// The collector answered with a non-2xx status.
    #[error("{status} - {body}")]
    ApiError {
        status: u16,
        body: String,
    },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Failed to collect {adapter} metrics: {source}")]
    CollectionError {
        adapter: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Shutdown error: {message}")]
    ShutdownError {
        message: String,
    },
}

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "request timed out".to_string()
        } else if err.is_connect() {
            "connection failed".to_string()
        } else {
            err.to_string()
        };

        AgentError::TransportError {
            message,
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = AgentError::ApiError {
            status: 503,
            body: "oops".to_string(),
        };
        assert_eq!(error.to_string(), "503 - oops");

        let error = AgentError::ConfigurationError {
            message: "must be greater than zero".to_string(),
            parameter: "report_interval".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Configuration error for report_interval: must be greater than zero"
        );
    }

    #[test]
    fn test_collection_error_names_adapter() {
        let collection = AgentError::CollectionError {
            adapter: "Que".to_string(),
            source: anyhow::anyhow!("relation does not exist"),
        };
        assert_eq!(
            collection.to_string(),
            "Failed to collect Que metrics: relation does not exist"
        );
    }
}
