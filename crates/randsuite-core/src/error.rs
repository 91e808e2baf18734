//! Input-tier errors.
//!
//! These are the failures that stop a run before any test executes: bad raw
//! input, an unknown test selector, or an override naming a parameter the test
//! does not declare. Failures inside a single test never use this type.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unknown test: {0}")]
    UnknownTest(String),

    #[error("test '{test}' has no parameter named '{name}'")]
    UnknownParameter { test: String, name: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
