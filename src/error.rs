//! Error types for the TextLift client

use std::fmt;

use thiserror::Error;

use crate::session::SessionError;
use crate::transport::TransportFailure;

/// Client-wide result type
pub type Result<T> = std::result::Result<T, ClientError>;

/// The request/response exchange an error happened in.
///
/// Carried by protocol, transport and auth errors so the UI can tell
/// "failed to negotiate" apart from "failed to finalize".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Negotiate,
    Transfer,
    Finalize,
    Status,
    Login,
    Signup,
    Logout,
    ListUploads,
    DeleteUpload,
    Annotations,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Negotiate => "negotiate",
            Step::Transfer => "transfer",
            Step::Finalize => "finalize",
            Step::Status => "status",
            Step::Login => "login",
            Step::Signup => "signup",
            Step::Logout => "logout",
            Step::ListUploads => "list_uploads",
            Step::DeleteUpload => "delete_upload",
            Step::Annotations => "annotations",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local pre-flight rejection. Never reaches the network.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("File too large: {size} bytes (max: {max})")]
    TooLarge { size: u64, max: u64 },

    #[error("Unsupported file type: {0} (only PDF uploads are allowed)")]
    UnsupportedType(String),

    #[error("File is empty")]
    Empty,
}

/// Client error type
#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Unexpected response during {step}: {message}")]
    Protocol { step: Step, message: String },

    #[error("Failed to {step}: {source}")]
    Transport {
        step: Step,
        #[source]
        source: TransportFailure,
    },

    #[error("Not authorized to {step} (HTTP {status})")]
    Auth { step: Step, status: u16 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Operation abandoned")]
    Abandoned,
}

/// Coarse error category for choosing a user-facing message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Protocol,
    Transport,
    Auth,
    Io,
    Session,
    Abandoned,
}

impl ClientError {
    pub fn protocol(step: Step, message: impl Into<String>) -> Self {
        Self::Protocol {
            step,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Protocol { .. } => ErrorKind::Protocol,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Auth { .. } => ErrorKind::Auth,
            Self::Io(_) => ErrorKind::Io,
            Self::Session(_) => ErrorKind::Session,
            Self::Abandoned => ErrorKind::Abandoned,
        }
    }

    /// The exchange that failed, when the error came from one
    pub fn step(&self) -> Option<Step> {
        match self {
            Self::Protocol { step, .. } | Self::Transport { step, .. } | Self::Auth { step, .. } => {
                Some(*step)
            }
            _ => None,
        }
    }

    /// Whether the session was invalidated as a side effect of this error
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_step() {
        let err = ClientError::Transport {
            step: Step::Finalize,
            source: TransportFailure::Timeout,
        };
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.step(), Some(Step::Finalize));
        assert!(err.to_string().contains("finalize"));

        let err: ClientError = ValidationError::Empty.into();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.step(), None);
    }

    #[test]
    fn test_auth_error_reports_unauthenticated() {
        let err = ClientError::Auth {
            step: Step::Negotiate,
            status: 401,
        };
        assert!(err.is_unauthenticated());
        assert_eq!(err.to_string(), "Not authorized to negotiate (HTTP 401)");
    }
}
