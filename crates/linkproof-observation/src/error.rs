use thiserror::Error;

/// Errors from the observation pipeline.
///
/// Domain outcomes (opacity, unknown verdicts, good windows) are values on
/// the result types, never errors. Only conditions the caller cannot act on
/// as evidence end up here.
#[derive(Debug, Error)]
pub enum ObservationError {
    #[error("no metric samples collected yet; recognition has nothing to work on")]
    NoSamplesCollected,

    #[error("lock acquisition failed")]
    LockError,

    #[error("adapter collection failed: {0}")]
    Adapter(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("evidence bundle rejected: {0}")]
    BundleShape(String),

    #[error("invalid configuration: {field} -- {detail}")]
    InvalidConfig { field: String, detail: String },
}

impl From<std::io::Error> for ObservationError {
    fn from(e: std::io::Error) -> Self {
        ObservationError::Persistence(e.to_string())
    }
}

/// Convenience type alias for observation results.
pub type ObservationResult<T> = Result<T, ObservationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = ObservationError::NoSamplesCollected;
        assert!(e.to_string().contains("no metric samples"));

        let e = ObservationError::InvalidConfig {
            field: "sample_interval".into(),
            detail: "must be positive".into(),
        };
        assert!(e.to_string().contains("sample_interval"));
        assert!(e.to_string().contains("must be positive"));

        let e = ObservationError::BundleShape("missing field `timeline`".into());
        assert!(e.to_string().contains("timeline"));
    }

    #[test]
    fn io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "bundle missing");
        let obs_err: ObservationError = io_err.into();
        assert!(matches!(obs_err, ObservationError::Persistence(_)));
        assert!(obs_err.to_string().contains("bundle missing"));
    }

    #[test]
    fn result_type_works() {
        let ok: ObservationResult<u32> = Ok(42);
        assert_eq!(ok.unwrap(), 42);

        let err: ObservationResult<u32> = Err(ObservationError::LockError);
        assert!(err.is_err());
    }
}
