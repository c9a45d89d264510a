//! Toolkit error types
//!
//! Every fallible operation in the dispatch core, the handle layer and the
//! widget tree reports one of these.

use std::any::Any;
use std::thread::ThreadId;

use thiserror::Error;

use crate::config::ConfigError;
use crate::platform::{PlatformError, ResourceKind};

/// Main toolkit error type
#[derive(Error, Debug)]
pub enum ToolkitError {
    /// Operation on a disposed widget, display or released handle
    #[error("{what} is disposed")]
    Disposed { what: String },

    /// A native factory call failed
    #[error("failed to create {kind} ({params}): {reason}")]
    ResourceCreation {
        kind: ResourceKind,
        params: String,
        reason: String,
    },

    /// A native call was attempted off the UI thread
    #[error("{operation} called on thread {caller:?}, but the UI thread is {ui_thread:?}")]
    CrossThreadViolation {
        operation: &'static str,
        ui_thread: ThreadId,
        caller: ThreadId,
    },

    /// An action run through `sync_exec` panicked on the UI thread
    #[error("action marshaled to the UI thread failed")]
    Marshaled(#[source] ActionPanic),

    /// The platform needs the display on the process's first thread
    #[error("the {platform} platform requires the display to be created on the main thread")]
    NotMainThread { platform: &'static str },

    /// The calling thread already owns a live display
    #[error("thread {thread:?} already owns a live display")]
    DisplayAlreadyOpen { thread: ThreadId },

    /// The parent cannot hold children
    #[error("a {parent} cannot own a {child}")]
    InvalidParent {
        parent: &'static str,
        child: &'static str,
    },

    /// The widget kind has no such capability
    #[error("a {kind} does not support {operation}")]
    Unsupported {
        operation: &'static str,
        kind: &'static str,
    },

    /// A native primitive failed outside resource creation
    #[error(transparent)]
    Platform(#[from] PlatformError),

    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ToolkitError {
    pub(crate) fn disposed(what: impl Into<String>) -> Self {
        ToolkitError::Disposed { what: what.into() }
    }

    /// Whether this error reports a disposed object
    pub fn is_disposed(&self) -> bool {
        matches!(self, ToolkitError::Disposed { .. })
    }
}

/// Toolkit result alias
pub type Result<T> = std::result::Result<T, ToolkitError>;

/// Panic captured while running a marshaled action
///
/// Carried as the `source()` of [`ToolkitError::Marshaled`].
#[derive(Error, Debug, Clone)]
#[error("panicked on UI thread: {message}")]
pub struct ActionPanic {
    pub message: String,
}

impl ActionPanic {
    /// Extract a readable message from a panic payload
    pub fn from_payload(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_panic_payload_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(ActionPanic::from_payload(payload.as_ref()).message, "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned boom"));
        assert_eq!(ActionPanic::from_payload(payload.as_ref()).message, "owned boom");

        let payload: Box<dyn Any + Send> = Box::new(42u32);
        assert_eq!(
            ActionPanic::from_payload(payload.as_ref()).message,
            "non-string panic payload"
        );
    }

    #[test]
    fn test_marshaled_keeps_cause() {
        let err = ToolkitError::Marshaled(ActionPanic {
            message: "bad".to_string(),
        });
        let source = err.source().expect("marshaled error has a cause");
        assert!(source.to_string().contains("bad"));
    }

    #[test]
    fn test_creation_error_names_kind_and_params() {
        let err = ToolkitError::ResourceCreation {
            kind: ResourceKind::Font,
            params: "family=Sans size=12".to_string(),
            reason: "out of handles".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("font"));
        assert!(text.contains("family=Sans size=12"));
        assert!(text.contains("out of handles"));
    }
}
