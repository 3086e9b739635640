#[derive(Debug, thiserror::Error)]
pub enum ClinicError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid text: {0}")]
    Text(#[from] clinic_types::TextError),

    #[error("{kind} with ID {id} not found")]
    NotFound { kind: &'static str, id: u64 },
    #[error("cannot {event} when {dimension} is {from}")]
    InvalidTransition {
        dimension: &'static str,
        from: String,
        event: String,
    },
    #[error("{kind} with ID {id} was modified concurrently; reload and retry")]
    StaleRecord { kind: &'static str, id: u64 },
    #[error("admission with ID {0} is already discharged")]
    AlreadyDischarged(u64),
    #[error("user {0} already exists")]
    UserExists(String),
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("failed to create storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("failed to write record file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to read record file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to delete record file: {0}")]
    FileDelete(std::io::Error),
    #[error("failed to serialize record: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize record: {0}")]
    Deserialization(String),
    #[error("record store lock poisoned")]
    LockPoisoned,
    #[error("failed to hash password: {0}")]
    PasswordHash(String),
}

impl ClinicError {
    /// True for errors caused by the state of a record rather than the request itself.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            ClinicError::InvalidTransition { .. }
                | ClinicError::StaleRecord { .. }
                | ClinicError::AlreadyDischarged(_)
                | ClinicError::UserExists(_)
        )
    }

    /// True for errors caused by malformed caller input.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, ClinicError::InvalidInput(_) | ClinicError::Text(_))
    }
}

pub type ClinicResult<T> = std::result::Result<T, ClinicError>;
