use crate::store::StoreError;

#[derive(Debug)]
pub enum ServiceError {
    /// Malformed input, reported before any lookup.
    Validation(String),
    /// Missing entity — or one this caller is not allowed to know exists.
    NotFound(String),
    /// Well-formed but semantically rejected.
    BadRequest(String),
    /// Storage failure underneath an otherwise valid call.
    Store(StoreError),
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::Validation(msg) => write!(f, "validation failed: {msg}"),
            ServiceError::NotFound(msg) => write!(f, "not found: {msg}"),
            ServiceError::BadRequest(msg) => write!(f, "bad request: {msg}"),
            ServiceError::Store(e) => write!(f, "store error: {e}"),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        ServiceError::Store(e)
    }
}
