use thiserror::Error;

/// Convenience alias for `Result<T, CogitoError>`.
pub type CogitoResult<T> = Result<T, CogitoError>;

/// Unified error type for every Cogito crate.
///
/// Transient version conflicts inside the session store never appear here:
/// they are retried internally and only surface as [`CogitoError::Contention`]
/// once the retry budget is spent.
#[derive(Error, Debug)]
pub enum CogitoError {
    /// No session is stored under the requested id.
    #[error("session {0} not found")]
    SessionNotFound(String),

    /// A revision targeted a step outside `1..=len`.
    #[error("invalid step number: {0}")]
    InvalidStep(usize),

    /// A domain rule was violated; nothing was written.
    #[error("validation error: {0}")]
    Validation(String),

    /// `start` was asked to reuse an id that is already taken.
    #[error("session {0} already exists")]
    AlreadyExists(String),

    /// The optimistic update lost every race it was allowed to retry.
    #[error("too much contention on session {session_id} after {attempts} attempts")]
    Contention {
        /// Session whose update could not be committed.
        session_id: String,
        /// Number of attempts made, including the first.
        attempts: u32,
    },

    /// Inserting a new session would exceed the configured limit.
    #[error("session store is full ({0} sessions)")]
    CapacityExceeded(usize),

    /// Configuration could not be parsed or failed validation.
    #[error("Config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CogitoError {
    /// Whether the error was caused by the caller's input rather than by the
    /// store's state or environment.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CogitoError::SessionNotFound(_)
                | CogitoError::InvalidStep(_)
                | CogitoError::Validation(_)
                | CogitoError::AlreadyExists(_)
        )
    }
}
