use thiserror::Error;

/// Failures while building the rating store. Always fatal for the run.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read ratings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed record on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

/// Per-user failures. The driver logs them and moves on to the next user.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecError {
    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("No recommendation for user {0}: neighbors have no ratings")]
    NoRecommendation(String),
}
