use thiserror::Error;

/// Errors from card generation and policy loading.
///
/// Verdicts, privacy failures and egress denials are card contents, not
/// errors.
#[derive(Debug, Error)]
pub enum ProofCardError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("policy document error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid privacy policy: {0}")]
    InvalidPolicy(String),
}

pub type ProofCardResult<T> = Result<T, ProofCardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let e = ProofCardError::InvalidPolicy("egress receipts cannot be disabled".into());
        assert!(e.to_string().contains("receipts"));

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "privacy.yaml");
        let e: ProofCardError = io.into();
        assert!(matches!(e, ProofCardError::Io(_)));
        assert!(e.to_string().contains("privacy.yaml"));
    }

    #[test]
    fn yaml_conversion() {
        let err = serde_yaml::from_str::<u32>("not: a number").unwrap_err();
        let e: ProofCardError = err.into();
        assert!(matches!(e, ProofCardError::Yaml(_)));
    }
}
