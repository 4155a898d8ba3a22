use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

/// Failures of the whitelist Merkle engine. Deterministic, pure computation
/// errors; none of these are retryable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WhitelistError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Whitelist is empty")]
    EmptyTree,
    #[error("Leaf not present in tree")]
    LeafNotFound,
    #[error("Address {0} is not whitelisted")]
    NotWhitelisted(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Redis error: {0}")]
    Redis(String),
    #[error("Provider error: {0}")]
    Provider(String),
    #[error("Contract error: {0}")]
    Contract(String),
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Whitelist(#[from] WhitelistError),
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ServiceError::Redis(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ServiceError::Provider(msg) => (StatusCode::BAD_GATEWAY, msg),
            ServiceError::Contract(msg) => (StatusCode::BAD_REQUEST, msg),
            ServiceError::CollectionNotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ServiceError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ServiceError::Configuration(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ServiceError::Whitelist(err) => {
                let status = match err {
                    WhitelistError::NotWhitelisted(_) => StatusCode::FORBIDDEN,
                    WhitelistError::InvalidAddress(_) | WhitelistError::EmptyTree => {
                        StatusCode::BAD_REQUEST
                    }
                    // A leaf derived from the stored set must exist in the
                    // tree built from that same set.
                    WhitelistError::LeafNotFound => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.to_string())
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
