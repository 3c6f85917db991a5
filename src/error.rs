//! Crate-wide error taxonomy.
//!
//! `InvalidArgument` and `InvalidState` are user-visible and bubble to the
//! request layer; `IoFailure` aborts the segment being scored;
//! `ResourceExhausted` signals a cache that cannot be allocated under the
//! configured circuit-breaker limit. `CollectionTerminated` is deliberately
//! *not* a variant here: early termination is modeled as an ordinary result
//! variant (see [`crate::scorer::ScanOutcome`]), never as an `Err`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SeismicError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("io failure: {0}")]
    IoFailure(#[from] std::io::Error),

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
}

pub type Result<T> = std::result::Result<T, SeismicError>;

impl From<serde_json::Error> for SeismicError {
    fn from(e: serde_json::Error) -> Self {
        SeismicError::InvalidArgument(format!("malformed json: {e}"))
    }
}

impl From<Box<bincode::ErrorKind>> for SeismicError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        SeismicError::IoFailure(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}
