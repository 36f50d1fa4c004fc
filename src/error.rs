use thiserror::Error;

/// Errors raised by the selection and spatial engines.
///
/// Every variant is a hard failure: nothing in the crate catches one of
/// these and substitutes a default.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CellError {
    /// Malformed caller arguments (radii, pairs, mask lengths, ...).
    #[error("Invalid argument: {0}")]
    Validation(String),

    /// Unrecognised phenotype description syntax.
    #[error("Can't parse phenotype '{description}': {reason}")]
    Parse { description: String, reason: String },

    /// An expected column is missing or has the wrong shape.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Inconsistent phenotype rules.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An input of the wrong kind where a phenotype or selector was expected.
    #[error("Unsupported selector input: {0}")]
    Type(String),

    /// A predicate could not be evaluated against the table.
    #[error("Can't evaluate predicate: {0}")]
    Eval(String),
}

impl CellError {
    pub(crate) fn parse(description: &str, reason: impl Into<String>) -> Self {
        CellError::Parse {
            description: description.to_string(),
            reason: reason.into(),
        }
    }
}
