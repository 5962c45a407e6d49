/// Error types for the monitor
///
/// `MonitorError` covers every failure that crosses a module boundary.
/// `ExtractionError` is kept separate so the extractor stays free of
/// transport concerns; it converts into `MonitorError` via `?`.
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Configuration error: {0}")] Config(String),

    #[error("Connection error ({endpoint}): {message}")] Connection {
        endpoint: String,
        message: String,
    },

    #[error("RPC error: {0}")] Rpc(String),

    #[error("Subscription error: {0}")] Subscription(String),

    #[error("Extraction error: {0}")] Extraction(#[from] ExtractionError),

    #[error("Handler error: {0}")] Handler(String),

    #[error("Trading callback error: {0}")] Callback(String),

    #[error("Serialization error: {0}")] Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")] Io(#[from] std::io::Error),

    #[error("Task error: {0}")] Task(String),
}

impl MonitorError {
    pub fn connection(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        MonitorError::Connection {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Transport-level failures that a retry or a failover can fix
    pub fn is_recoverable(&self) -> bool {
        match self {
            MonitorError::Connection { .. } => true,
            MonitorError::Rpc(_) => true,
            MonitorError::Subscription(_) => true,
            MonitorError::Task(_) => true,
            _ => false,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("transaction carries no signature")] MissingSignature,

    #[error("transaction {signature} has no account key at index {index}")] MissingAccountKey {
        signature: String,
        index: usize,
    },
}

pub type MonitorResult<T> = Result<T, MonitorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(MonitorError::connection("http://a", "refused").is_recoverable());
        assert!(MonitorError::Rpc("boom".into()).is_recoverable());
        assert!(!MonitorError::Config("missing".into()).is_recoverable());
        assert!(!MonitorError::from(ExtractionError::MissingSignature).is_recoverable());
    }

    #[test]
    fn test_display_includes_context() {
        let err = MonitorError::from(ExtractionError::MissingAccountKey {
            signature: "abc".into(),
            index: 1,
        });
        assert_eq!(
            err.to_string(),
            "Extraction error: transaction abc has no account key at index 1"
        );
    }
}
