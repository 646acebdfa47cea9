use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Backing errors for all provisioning operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("failed metadata query (message: {message:?}, retryable: {retryable:?})")]
    Metadata { message: String, retryable: bool },
    #[error("failed command '{command}' (message: {message:?}, retryable: {retryable:?})")]
    Command {
        command: String,
        message: String,
        retryable: bool,
    },
    #[error("invalid configuration (message: {message:?})")]
    Config { message: String },
    #[error("failed for other reasons (message: {message:?}, retryable: {retryable:?})")]
    Other { message: String, retryable: bool },
}

impl Error {
    /// Returns the error message in "String".
    #[inline]
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Error::Metadata { message, .. }
            | Error::Command { message, .. }
            | Error::Config { message }
            | Error::Other { message, .. } => message.clone(),
        }
    }

    /// Returns if the error is retryable.
    #[inline]
    #[must_use]
    pub fn retryable(&self) -> bool {
        match self {
            Error::Metadata { retryable, .. }
            | Error::Command { retryable, .. }
            | Error::Other { retryable, .. } => *retryable,
            Error::Config { .. } => false,
        }
    }
}

/// Wraps a local filesystem failure; never retryable.
#[inline]
pub(crate) fn io_err(op: &str, path: &str, e: std::io::Error) -> Error {
    Error::Other {
        message: format!("failed {op} '{path}' {e}"),
        retryable: false,
    }
}

#[test]
fn test_retryable() {
    let e = Error::Command {
        command: "gsutil cat gs://b/o".to_string(),
        message: "exit status 1".to_string(),
        retryable: true,
    };
    assert!(e.retryable());
    assert_eq!(e.message(), "exit status 1");
    assert!(e.to_string().contains("gsutil cat gs://b/o"));

    let e = Error::Config {
        message: "empty bucket".to_string(),
    };
    assert!(!e.retryable());
}
