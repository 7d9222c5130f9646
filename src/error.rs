use thiserror::Error;

use crate::ingest::scanner::ScanError;

pub type Result<T> = std::result::Result<T, CatalogError>;

#[derive(Debug, Error)]
pub enum CatalogError {
    /// Document directory or storage location is missing or unusable.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },

    #[error("persistence error: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("usage error: {0}")]
    Usage(String),
}

impl CatalogError {
    pub fn document_not_found(id: i64) -> Self {
        CatalogError::NotFound {
            kind: "document",
            key: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CatalogError::NotFound { .. })
    }
}

impl From<ScanError> for CatalogError {
    fn from(err: ScanError) -> Self {
        CatalogError::Configuration(err.to_string())
    }
}
