//! Errors surfaced by keyword calls.

use thiserror::Error;

use crate::context::ContextError;
use crate::session::SessionError;
use crate::types::TypeTag;

/// The single error a failed keyword call reports.
#[derive(Debug, Error)]
pub enum KeywordError {
    /// A per-call session switch (or reading the session to restore) failed.
    #[error(transparent)]
    Session(#[from] SessionError),
    /// A per-call context switch failed.
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error("argument {index} cannot be converted to {expected}: {source}")]
    Cast {
        index: usize,
        expected: TypeTag,
        #[source]
        source: anyhow::Error,
    },
    /// The keyword implementation itself failed; the original error is kept as is.
    #[error(transparent)]
    Implementation(anyhow::Error),
    /// Switching back to the state before the call failed. Always takes precedence.
    #[error("restoring {identifier} failed: {source}")]
    Restoration {
        identifier: String,
        #[source]
        source: Box<KeywordError>,
    },
    #[error("no keyword with name '{0}'")]
    NotFound(String),
}

impl KeywordError {
    pub fn is_restoration(&self) -> bool {
        matches!(self, KeywordError::Restoration { .. })
    }

    /// The implementation's own error, when the call failed inside the keyword.
    pub fn implementation_error(&self) -> Option<&anyhow::Error> {
        match self {
            KeywordError::Implementation(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn implementation_error_displays_transparently() {
        let err = KeywordError::Implementation(anyhow::anyhow!("boom"));
        assert_eq!(err.to_string(), "boom");
        assert_eq!(err.implementation_error().map(|e| e.to_string()).as_deref(), Some("boom"));
    }

    #[test]
    fn restoration_wraps_handler_error() {
        let err = KeywordError::Restoration {
            identifier: "connection".into(),
            source: Box::new(SessionError::new("ConnectionError", "gone").into()),
        };
        assert!(err.is_restoration());
        assert_eq!(
            err.to_string(),
            "restoring connection failed: ConnectionError: gone"
        );
    }
}
