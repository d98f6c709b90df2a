use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("Photon API error in {context}: {message}")]
    PhotonError { context: String, message: String },

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Indexer does not support method {0}")]
    MethodNotFound(String),

    #[error("Validity proof references an outdated root: {0}")]
    StaleProof(String),

    #[error("Indexer is not synced to the requested slot")]
    IndexerNotSyncedToSlot,

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid response data: {0}")]
    InvalidResponseData(String),

    #[error("Base58 decode error in {field}: {message}")]
    Base58DecodeError { field: String, message: String },

    #[error("Missing result from {context}: {message}")]
    MissingResult { context: String, message: String },

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("State tree {0} is not known to this wallet")]
    UnknownStateTree(String),
}

impl IndexerError {
    pub fn missing_result(context: &str, message: &str) -> Self {
        IndexerError::MissingResult {
            context: context.to_string(),
            message: message.to_string(),
        }
    }

    pub fn base58_decode_error(field: &str, error: impl std::fmt::Display) -> Self {
        IndexerError::Base58DecodeError {
            field: field.to_string(),
            message: error.to_string(),
        }
    }

    /// Classifies a JSON-RPC error object returned by the indexer.
    pub fn from_rpc_error(context: &str, code: i64, message: String) -> Self {
        if code == -32601 {
            return IndexerError::MethodNotFound(context.to_string());
        }
        if is_stale_root_message(&message) {
            return IndexerError::StaleProof(message);
        }
        IndexerError::ApiError(format!(
            "API error in {} (code: {}): {}",
            context, code, message
        ))
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            IndexerError::ApiError(_)
                | IndexerError::PhotonError { .. }
                | IndexerError::IndexerNotSyncedToSlot
                | IndexerError::Http(_)
        )
    }
}

/// True when the indexer says the referenced tree root is no longer current.
pub fn is_stale_root_message(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    if message.contains("stale") {
        return true;
    }
    message.contains("root")
        && ["outdated", "not found", "expired", "unknown", "advanced"]
            .iter()
            .any(|needle| message.contains(needle))
}
