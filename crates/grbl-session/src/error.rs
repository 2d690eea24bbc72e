//! Error types for GRBL sessions

use thiserror::Error;

/// Errors returned by [`Session::command`](crate::Session::command)
///
/// Each of these means the controller's state is unknown. Callers must
/// stop issuing motion commands for the current job when they see one.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The controller answered something other than `ok`
    #[error("unexpected response from GRBL to {command:?}: {response:?}")]
    ProtocolViolation { command: String, response: String },

    /// The controller never answered
    #[error("GRBL serial timeout after command {command:?}")]
    CommandTimeout { command: String },

    /// The transport failed mid-exchange
    #[error("failed after command {command:?}: {source}")]
    Transport {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

impl SessionError {
    /// The command that was being executed
    pub fn command(&self) -> &str {
        match self {
            SessionError::ProtocolViolation { command, .. }
            | SessionError::CommandTimeout { command }
            | SessionError::Transport { command, .. } => command,
        }
    }
}
