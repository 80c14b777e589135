use thiserror::Error;

/// Error taxonomy for the learning core. `PathNotFound` is deliberately
/// absent: it is an internal control-flow signal inside the knowledge
/// tree, consumed by the knowledge base to trigger a teacher invocation,
/// and must never reach a caller (see `tree::Lookup`).
#[derive(Error, Debug)]
pub enum LearningError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("cache conflict: input prefix {input:?} previously resolved to {previous:?}, now {attempted:?}")]
    CacheConflict {
        input: String,
        previous: String,
        attempted: String,
    },

    #[error("teacher failure: {0}")]
    TeacherFailure(String),

    #[error("hypothesis extraction fault: {0}")]
    HypothesisExtractionFault(String),
}

pub type Result<T> = std::result::Result<T, LearningError>;
