use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed threshold file {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value {value:?} for {key}")]
    InvalidEnv { key: &'static str, value: String },
}

#[derive(Error, Debug, PartialEq)]
pub enum PackError {
    #[error("at least one item is required")]
    NoItems,

    #[error("at least one box is required")]
    NoBoxes,

    #[error("{kind} id is required")]
    MissingId { kind: &'static str },

    #[error("{kind} {id}: {field} must be greater than 0")]
    NonPositive {
        kind: &'static str,
        id: String,
        field: &'static str,
    },

    #[error("{kind} {id}: {field} cannot be negative")]
    Negative {
        kind: &'static str,
        id: String,
        field: &'static str,
    },

    #[error("item {id}: count must be at least 1")]
    ZeroCount { id: String },

    #[error("margin cannot be negative")]
    NegativeMargin,
}
