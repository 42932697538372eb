//! Error types for cloudfuzz data model construction.

use thiserror::Error;

/// Errors raised while building parameter domains and job configs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// Parameter name was empty.
    #[error("parameter name must not be empty")]
    EmptyName,

    /// The same parameter name was declared twice.
    #[error("duplicate parameter: {0}")]
    DuplicateParameter(String),

    /// A parameter was declared with no candidate values.
    #[error("parameter {0} has no candidate values")]
    NoCandidates(String),

    /// A float candidate or value was NaN or infinite, which JSON cannot carry.
    #[error("parameter {0} has a non-finite float value")]
    NonFiniteValue(String),

    /// A fuzzer was requested over a domain with no parameters.
    #[error("parameter domain is empty")]
    EmptyDomain,

    /// Node address could not be parsed.
    #[error("invalid node address: {0}")]
    InvalidAddress(String),
}
