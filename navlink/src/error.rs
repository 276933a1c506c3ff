//! Error type shared by the linking relations, the window group and the engine.

use crate::types::{PanelId, WindowId};
use thiserror::Error;

pub type LinkingResult<T> = Result<T, LinkingError>;

/// Failures surfaced by linking operations.
///
/// Only `StaleReference` and `WindowGone` are absorbed by the engine; every
/// other kind propagates to the caller of the reconciliation pass.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LinkingError {
    /// A relation store (or any remote collaborator) rejected a call.
    #[error("remote call to {target} failed: {message}")]
    Remote { target: String, message: String },

    /// A window stopped answering while it was being queried.
    #[error("window {0} went away")]
    WindowGone(WindowId),

    /// A groupcast was attempted before the window joined its group.
    #[error("window group not yet established")]
    NoGroup,

    /// A panel vanished between the triple snapshot and the mutation.
    #[error("panel {0} no longer exists")]
    StaleReference(PanelId),

    #[error("unknown window: {0}")]
    UnknownWindow(WindowId),

    #[error("unknown panel: {0}")]
    UnknownPanel(PanelId),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl LinkingError {
    pub fn remote(target: impl Into<String>, message: impl Into<String>) -> Self {
        LinkingError::Remote {
            target: target.into(),
            message: message.into(),
        }
    }

    /// True for the kinds a reconciliation pass skips instead of raising.
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            LinkingError::StaleReference(_) | LinkingError::WindowGone(_)
        )
    }
}

impl From<std::io::Error> for LinkingError {
    fn from(e: std::io::Error) -> Self {
        LinkingError::Io(e.to_string())
    }
}

impl From<toml::de::Error> for LinkingError {
    fn from(e: toml::de::Error) -> Self {
        LinkingError::Config(e.to_string())
    }
}
