use super::domain::{AttemptId, EnrollmentAttempt};

/// Durable keyed storage for enrollment attempts.
///
/// `update` is revision-checked: the caller passes the record as it read it (with the
/// revision it saw) and the store rejects the write with [`RepositoryError::Conflict`]
/// when another writer got there first. Successful writes bump the revision.
pub trait AttemptRepository: Send + Sync {
    fn insert(&self, attempt: EnrollmentAttempt) -> Result<EnrollmentAttempt, RepositoryError>;
    fn update(&self, attempt: EnrollmentAttempt) -> Result<EnrollmentAttempt, RepositoryError>;
    fn fetch(&self, id: &AttemptId) -> Result<Option<EnrollmentAttempt>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists or was modified concurrently")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
