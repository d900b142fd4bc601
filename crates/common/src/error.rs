//! Error types for the taxi service

use thiserror::Error;

/// Result type alias using the taxi service Error
pub type Result<T> = std::result::Result<T, Error>;

/// Taxi service error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Resource not found: {kind} with id {id}")]
    NotFound { kind: String, id: i64 },

    #[error("Resource already exists: {kind} with this {field}")]
    AlreadyExists { kind: String, field: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn not_found(kind: &str, id: i64) -> Self {
        Error::NotFound {
            kind: kind.to_string(),
            id,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = Error::not_found("car", 7);
        assert_eq!(err.to_string(), "Resource not found: car with id 7");
        assert!(err.is_not_found());

        let err = Error::AlreadyExists {
            kind: "manufacturer".to_string(),
            field: "name".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Resource already exists: manufacturer with this name"
        );
        assert!(!err.is_not_found());
    }
}
