//! Error types for tracking operations.

use std::fmt;

use thiserror::Error;

/// Which side of a correlation pair an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    Previous,
    Current,
}

impl fmt::Display for FieldRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldRole::Previous => write!(f, "previous"),
            FieldRole::Current => write!(f, "current"),
        }
    }
}

/// Recoverable failures. Contract violations panic instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot correlate fields: the {role} field has zero variance after windowing")]
    DegenerateField { role: FieldRole },

    #[error("cannot correlate fields at time index {time_index}: {source}")]
    Correlation {
        time_index: usize,
        #[source]
        source: Box<Error>,
    },

    #[error("invalid tracker configuration")]
    Config(#[from] serde_yml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
