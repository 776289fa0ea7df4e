//! Error types for the anonymization engine.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RedactionError>;

#[derive(Debug, Error)]
pub enum RedactionError {
    #[error("key error: {0}")]
    KeyError(String),
}
