use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Source not found: {0}")]
    SourceNotFound(String),

    #[error("Structural decode error at byte {position}: {message}")]
    StructuralDecode { position: usize, message: String },

    #[error("Record decode error: {0}")]
    RecordDecode(String),

    #[error("Store schema version mismatch: {0}")]
    StoreVersionMismatch(String),

    #[error("Performance calculator unavailable: {0}")]
    CollaboratorUnavailable(String),

    #[error("Replay decode error: {0}")]
    ReplayDecode(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for failures that abort a whole import pass rather than a
    /// single record.
    pub fn is_pass_fatal(&self) -> bool {
        matches!(
            self,
            Error::SourceNotFound(_)
                | Error::StructuralDecode { .. }
                | Error::StoreVersionMismatch(_)
                | Error::Io(_)
                | Error::Database(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_fatal_classification() {
        assert!(Error::SourceNotFound("x".into()).is_pass_fatal());
        assert!(
            Error::StructuralDecode {
                position: 0,
                message: "x".into()
            }
            .is_pass_fatal()
        );
        assert!(!Error::RecordDecode("x".into()).is_pass_fatal());
        assert!(!Error::CollaboratorUnavailable("x".into()).is_pass_fatal());
    }
}
