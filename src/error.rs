//! Error types
//!
//! Extraction itself never fails: structural misses resolve to empty values
//! and malformed rows are dropped. The only runtime failure is a document that
//! cannot be turned into a tree at all. Everything else is a construction-time
//! error raised while building paths, rules and specs.

use thiserror::Error;

/// Document could not be parsed into a tree; no partial results are produced.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid UTF-8 in document at byte {0}")]
    InvalidUtf8(usize),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("Path expression is empty")]
    Empty,

    #[error("Invalid selector in path `{path}`: {reason}")]
    InvalidSelector { path: String, reason: String },

    #[error("Empty accessor after `@` in path `{0}`")]
    EmptyAccessor(String),
}

#[derive(Debug, Error)]
pub enum RuleError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error("Attribute `{0}` maps several paths but has no postprocess transform")]
    MissingPostprocess(String),

    #[error("Unknown transform: {0}")]
    UnknownTransform(String),

    #[error("Identifier attribute `{0}` is not declared by the extraction spec")]
    UnknownIdentifier(String),

    #[error("Invalid substitution pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Substitution pattern lacks the `{0}` capture group")]
    MissingGroup(String),

    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),

    #[error("Invalid spec definition: {0}")]
    Definition(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ParseError>;
