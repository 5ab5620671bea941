use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    /// Transient failure worth one more attempt.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("storage failure: {0}")]
    Backend(String),
}

impl StorageError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Unavailable(_))
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut => StorageError::Unavailable(err.to_string()),
            other => StorageError::Backend(other.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum PollError {
    #[error("{0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("only the poll creator may do that")]
    Unauthorized,
    #[error("poll {0} is closed")]
    ClosedPoll(String),
    #[error("already voted on poll {0}")]
    DuplicateVote(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type PollResult<T> = Result<T, PollError>;
