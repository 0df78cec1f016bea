use thiserror::Error;

/// Structural and invariant violations. These abort the containing operation
/// and propagate to the caller; an empty plan is not an error.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("\"{entity}\" is not a \"{expected}\"")]
    TypeMismatch { entity: String, expected: String },

    #[error("\"{0}\" is not a known type, predicate or entity")]
    UnknownName(String),

    #[error("fact \"{fact}\" has {got} arguments but predicate \"{predicate}\" declares {expected}")]
    ArityMismatch {
        fact: String,
        predicate: String,
        got: usize,
        expected: usize,
    },

    #[error("the value of the fluent \"{0}\" is missing")]
    MissingValue(String),

    #[error("the fact \"{0}\" should not have a value")]
    UnexpectedValue(String),

    #[error("the fact \"{0}\" is timeless and cannot be removed")]
    ImmutableFact(String),

    #[error("requirement \"{0}\" is not managed")]
    UnknownRequirement(String),

    #[error("successor \"{0}\" is cached but not registered in the domain")]
    MissingSuccessor(String),

    #[error("failed to parse: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, PlanError>;
