//! Error types for propfinder

use thiserror::Error;

use crate::types::Category;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Propeller '{code}' not found in {category} data")]
    NotFound { code: String, category: Category },

    #[error("Format error: {0}")]
    Format(String),

    #[error("No performance data found: {0}")]
    NoData(String),

    #[error("Query features {actual:?} do not match index features {expected:?}")]
    Dimension {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("No propeller matches the constraints")]
    EmptyResult,

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid column: {0}")]
    InvalidColumn(String),

    #[error("Corrupt bundle: {0}")]
    CorruptBundle(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn format(msg: impl Into<String>) -> Self {
        Error::Format(msg.into())
    }

    pub fn no_data(msg: impl Into<String>) -> Self {
        Error::NoData(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }
}
