use thiserror::Error;

/// Errors produced by model constructors and validation routines.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("malformed guid {0:?}: expected \"source:value\"")]
    MalformedGuid(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
