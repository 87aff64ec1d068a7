//! Library error types with rich context

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Library error types organized by layer/domain
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Common/Infrastructure Errors
    // ─────────────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // Binding Construction Errors
    // ─────────────────────────────────────────────────────────────
    #[error("action group '{group}' places an action after its finishing action")]
    FinalActionNotLast { group: String },

    #[error("cannot sequence two cycling bindings: '{left}' + '{right}'")]
    CycleSequence { left: String, right: String },

    #[error("cycling binding '{name}' cannot carry a finishing action")]
    CycleWithFinalAction { name: String },

    #[error("trigger '{trigger}' is already bound to '{existing}' (rejected: '{new}')")]
    BindingConflict {
        trigger: String,
        existing: String,
        new: String,
    },

    #[error("unknown key name: '{name}'")]
    UnknownKey { name: String },

    #[error("unknown event name: '{name}'")]
    UnknownEvent { name: String },

    #[error("server call '{id}' is already registered under trigger '{existing}' (attempted: '{attempted}')")]
    ServerCallReuse {
        id: String,
        existing: String,
        attempted: String,
    },

    // ─────────────────────────────────────────────────────────────
    // Protocol Errors
    // ─────────────────────────────────────────────────────────────
    #[error("unknown endpoint id '{id}' (known: {known:?})")]
    UnknownEndpoint { id: String, known: Vec<String> },

    #[error("malformed request: {message}")]
    MalformedRequest { message: String },

    #[error("endpoint '{id}' failed: {message}")]
    Callback { id: String, message: String },

    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },

    // ─────────────────────────────────────────────────────────────
    // Process Errors
    // ─────────────────────────────────────────────────────────────
    #[error("fuzzy finder binary '{program}' not found on PATH")]
    FinderNotFound { program: String },

    #[error("failed to spawn finder process: {reason}")]
    ProcessSpawn { reason: String },

    #[error("finder exited unexpectedly with code {code:?}: {stderr}")]
    UnexpectedExit { code: Option<i32>, stderr: String },

    #[error("finder exited (code {code:?}) without any finishing action firing")]
    MissingResult { code: Option<i32> },

    #[error("remote control request failed: {message}")]
    RemoteControl { message: String },

    #[error("script step references trigger '{trigger}' with no binding")]
    UnboundTrigger { trigger: String },

    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────
    #[error("configuration error: {message}")]
    Config { message: String },

    // ─────────────────────────────────────────────────────────────
    // Lifecycle Discipline Errors
    // ─────────────────────────────────────────────────────────────
    #[error("operation '{op}' is not valid in stage '{stage}'")]
    Stage { op: String, stage: String },

    #[error("result read before the session finished (stage: '{stage}')")]
    ResultNotReady { stage: String },

    #[error("session result was already recorded")]
    AlreadyFinished,

    // ─────────────────────────────────────────────────────────────
    // Channel/Communication Errors
    // ─────────────────────────────────────────────────────────────
    #[error("channel send error: {message}")]
    ChannelSend { message: String },

    #[error("channel closed unexpectedly")]
    ChannelClosed,
}

// ─────────────────────────────────────────────────────────────────
// Convenience Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn final_action_not_last(group: impl Into<String>) -> Self {
        Self::FinalActionNotLast {
            group: group.into(),
        }
    }

    pub fn cycle_sequence(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self::CycleSequence {
            left: left.into(),
            right: right.into(),
        }
    }

    pub fn cycle_with_final_action(name: impl Into<String>) -> Self {
        Self::CycleWithFinalAction { name: name.into() }
    }

    pub fn unknown_key(name: impl Into<String>) -> Self {
        Self::UnknownKey { name: name.into() }
    }

    pub fn unknown_event(name: impl Into<String>) -> Self {
        Self::UnknownEvent { name: name.into() }
    }

    pub fn malformed_request(message: impl Into<String>) -> Self {
        Self::MalformedRequest {
            message: message.into(),
        }
    }

    pub fn callback(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Callback {
            id: id.into(),
            message: message.into(),
        }
    }

    pub fn process_spawn(reason: impl Into<String>) -> Self {
        Self::ProcessSpawn {
            reason: reason.into(),
        }
    }

    pub fn remote_control(message: impl Into<String>) -> Self {
        Self::RemoteControl {
            message: message.into(),
        }
    }

    pub fn stage(op: impl Into<String>, stage: impl std::fmt::Display) -> Self {
        Self::Stage {
            op: op.into(),
            stage: stage.to_string(),
        }
    }

    pub fn channel_send(message: impl Into<String>) -> Self {
        Self::ChannelSend {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Check if this is a recoverable error
    ///
    /// Protocol errors are always recovered at the server boundary and turned
    /// into response bodies; they never tear a session down.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::UnknownEndpoint { .. }
                | Error::MalformedRequest { .. }
                | Error::Callback { .. }
                | Error::RemoteControl { .. }
                | Error::ChannelSend { .. }
        )
    }

    /// Check if this error should abort the run before or instead of a result
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::FinderNotFound { .. }
                | Error::ProcessSpawn { .. }
                | Error::UnexpectedExit { .. }
                | Error::MissingResult { .. }
                | Error::Stage { .. }
        )
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Context Extensions
// ─────────────────────────────────────────────────────────────────

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", context.into(), err);
            err
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", f(), err);
            err
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = Error::final_action_not_last("reload");
        assert_eq!(
            err.to_string(),
            "action group 'reload' places an action after its finishing action"
        );

        let err = Error::FinderNotFound {
            program: "fzf".into(),
        };
        assert!(err.to_string().contains("not found on PATH"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_is_fatal() {
        assert!(Error::FinderNotFound {
            program: "fzf".into()
        }
        .is_fatal());
        assert!(Error::MissingResult { code: Some(0) }.is_fatal());
        assert!(!Error::callback("ep-1", "boom").is_fatal());
    }

    #[test]
    fn test_error_is_recoverable() {
        assert!(Error::callback("ep-1", "boom").is_recoverable());
        assert!(Error::malformed_request("bad frame").is_recoverable());
        assert!(!Error::MissingResult { code: None }.is_recoverable());
    }
}
