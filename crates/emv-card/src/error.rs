//! Error taxonomy for the reading pipeline

use emv_common::TlvError;
use thiserror::Error;

use crate::transport::SessionState;

/// Errors raised while talking to a card
#[derive(Debug, Error)]
pub enum Error {
    /// Link fault (timeout, card removed). Ends the whole session.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),

    /// Session used out of order. Always a defect in the caller.
    #[error("cannot {operation} while session is {state}")]
    SessionState {
        operation: &'static str,
        state: SessionState,
    },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("TLV decode failed: {0}")]
    Tlv(#[from] TlvError),

    #[error("SELECT {aid} failed with status {status:04X}")]
    ApplicationSelect { aid: String, status: u16 },

    #[error("GET PROCESSING OPTIONS failed with status {status:04X}")]
    ProcessingOptions { status: u16 },

    /// Command data longer than an extended Lc can announce
    #[error("command data of {len} bytes exceeds the 65535 byte limit")]
    CommandTooLong { len: usize },
}

impl Error {
    pub(crate) fn transport<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Transport(Box::new(err))
    }

    /// Fatal errors end the session; everything else only ends the
    /// current application.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::SessionState { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_failure_display() {
        let err = Error::ApplicationSelect {
            aid: "A0000000031010".to_string(),
            status: 0x6A82,
        };
        assert_eq!(err.to_string(), "SELECT A0000000031010 failed with status 6A82");
        assert!(!err.is_fatal());
    }

    #[test]
    fn transport_and_session_errors_are_fatal() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "no answer");
        assert!(Error::transport(io).is_fatal());

        let err = Error::SessionState {
            operation: "transceive",
            state: SessionState::Closed,
        };
        assert!(err.is_fatal());
        assert!(err.to_string().contains("closed"));
    }

    #[test]
    fn tlv_errors_are_recoverable() {
        let err: Error = TlvError::UnsupportedEncoding("indefinite length").into();
        assert!(!err.is_fatal());
    }
}
