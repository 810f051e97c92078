//! Error taxonomy shared by the local helpers and every remote backend.
//!
//! # Logging Convention
//! The `Other` variant is transparent over `anyhow::Error`, so logging any
//! error with `{}`, `{:#}` or `{:?}` shows the full context chain.

/// Error kinds raised by remote-filesystem operations.
///
/// Every public operation either returns a well-typed value or one of these;
/// there is no silent fallback and no automatic retry. `exists` is the one
/// operation defined to tolerate a missing path (it returns `false` instead
/// of `NotFound`).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The operation requires the path to exist and it does not.
    #[error("'{0}' does not exist")]
    NotFound(String),

    /// The operation expected a file and found a directory, or vice versa.
    /// Also raised when creating over an existing path and when uploading
    /// onto an existing file without `update`.
    #[error("{0}")]
    WrongKind(String),

    /// A required ancestor directory is missing and creating parents was not
    /// authorized.
    #[error("{0}")]
    PredicateUnmet(String),

    /// Session establishment or authentication failed, or the server refused
    /// a request (negative completion reply, SFTP status error).
    #[error("{0}")]
    Connector(String),

    /// Local filesystem failure while staging an upload or download.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Transport-level failure with context attached.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let error = Error::NotFound("/data/in".to_string());
        assert_eq!(format!("{}", error), "'/data/in' does not exist");
    }

    #[test]
    fn test_other_preserves_context_chain() {
        let source = anyhow::anyhow!("connection reset").context("listing '/data'");
        let error = Error::from(source);
        assert!(format!("{:#}", error).contains("listing '/data'"));
        assert!(format!("{:#}", error).contains("connection reset"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error = Error::from(io);
        match error {
            Error::Io(inner) => {
                assert_eq!(inner.kind(), std::io::ErrorKind::PermissionDenied)
            }
            other => panic!("expected Io, got {:?}", other),
        }
    }
}
