//! Error taxonomy for the client.
//!
//! Every fallible operation returns [`HsError`]. Callers that need to decide on a
//! recovery policy should match on [`HsError::kind`] rather than on the variants
//! themselves: a malformed response frame and a server-side rejection both end up
//! as [`ErrorKind::Operational`], for instance.
use thiserror::Error;

/// Recovery class of an [`HsError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No reachable server for the operation.
    Terminal,
    /// A connection died, but retrying the whole operation once may succeed.
    Recoverable,
    /// The server rejected the request, or its response could not be understood.
    Operational,
    /// Caller input was rejected before any network I/O.
    Validation,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HsError {
    #[error("{0}")]
    Connection(String),

    #[error("{0}")]
    RecoverableConnection(String),

    #[error("{0}")]
    Operational(String),

    #[error("malformed response: {0}")]
    Protocol(String),

    #[error("invalid input: {0}")]
    Validation(String),
}

impl HsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HsError::Connection(_) => ErrorKind::Terminal,
            HsError::RecoverableConnection(_) => ErrorKind::Recoverable,
            HsError::Operational(_) | HsError::Protocol(_) => ErrorKind::Operational,
            HsError::Validation(_) => ErrorKind::Validation,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.kind() == ErrorKind::Recoverable
    }

    /// True for both terminal and recoverable connection failures.
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            HsError::Connection(_) | HsError::RecoverableConnection(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, HsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds() {
        let inputs = vec![
            (HsError::Connection("x".into()), ErrorKind::Terminal),
            (
                HsError::RecoverableConnection("x".into()),
                ErrorKind::Recoverable,
            ),
            (HsError::Operational("x".into()), ErrorKind::Operational),
            (HsError::Protocol("x".into()), ErrorKind::Operational),
            (HsError::Validation("x".into()), ErrorKind::Validation),
        ];

        for (err, kind) in inputs {
            assert_eq!(err.kind(), kind);
        }
    }

    #[test]
    fn recoverable_is_a_connection_error() {
        let err = HsError::RecoverableConnection("closed".into());
        assert!(err.is_connection());
        assert!(err.is_recoverable());
        assert!(!HsError::Operational("rejected".into()).is_connection());
    }
}
