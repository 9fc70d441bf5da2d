//! Remote value handles and argument encoding.
//!
//! A [`Handle`] is an opaque reference to a value bound inside the
//! interpreter's environment. It is an explicit tagged struct — owning
//! session identifier, remote variable name, optional this-context — and is
//! never mutated after creation; every derived access produces a new handle.

use crate::error::Result;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide identifier of one session, used for handle ownership checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

impl SessionId {
    pub(crate) fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Reference to a value bound in the remote environment.
///
/// The variable name refers to a still-live `const` binding for the lifetime
/// of the owning session. Handles are cheap to clone and compare ownership by
/// session identifier, not object identity.
#[derive(Debug, Clone)]
pub struct Handle {
    session_id: SessionId,
    var: String,
    // Set only when the handle came from a property read; binds the correct
    // receiver if the value is later invoked as a method.
    this_context: Option<String>,
}

impl Handle {
    pub(crate) fn new(session_id: SessionId, var: String) -> Self {
        Self {
            session_id,
            var,
            this_context: None,
        }
    }

    pub(crate) fn with_this_context(mut self, receiver_var: String) -> Self {
        self.this_context = Some(receiver_var);
        self
    }

    /// Owning session identifier.
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Remote variable name, stable for the handle's lifetime.
    pub fn var(&self) -> &str {
        &self.var
    }

    pub(crate) fn this_context(&self) -> Option<&str> {
        self.this_context.as_deref()
    }
}

/// Argument to a remote invocation: pass-by-reference for owned handles,
/// JSON literal for everything else.
#[derive(Debug, Clone)]
pub enum RemoteArg {
    Handle(Handle),
    Value(serde_json::Value),
}

impl RemoteArg {
    /// Render as remote expression text for a call made by `session_id`.
    ///
    /// Never fails on a foreign handle: it degrades to the best-effort
    /// literal `null`, matching the non-throwing ownership contract.
    pub(crate) fn to_expr(&self, session_id: SessionId) -> Result<String> {
        match self {
            RemoteArg::Handle(h) if h.session_id == session_id => Ok(h.var.clone()),
            RemoteArg::Handle(_) => Ok("null".to_string()),
            RemoteArg::Value(v) => Ok(serde_json::to_string(v)?),
        }
    }
}

impl From<Handle> for RemoteArg {
    fn from(handle: Handle) -> Self {
        RemoteArg::Handle(handle)
    }
}

impl From<&Handle> for RemoteArg {
    fn from(handle: &Handle) -> Self {
        RemoteArg::Handle(handle.clone())
    }
}

impl From<serde_json::Value> for RemoteArg {
    fn from(value: serde_json::Value) -> Self {
        RemoteArg::Value(value)
    }
}

impl From<&str> for RemoteArg {
    fn from(value: &str) -> Self {
        RemoteArg::Value(serde_json::Value::String(value.to_string()))
    }
}

impl From<String> for RemoteArg {
    fn from(value: String) -> Self {
        RemoteArg::Value(serde_json::Value::String(value))
    }
}

impl From<bool> for RemoteArg {
    fn from(value: bool) -> Self {
        RemoteArg::Value(serde_json::Value::Bool(value))
    }
}

impl From<i64> for RemoteArg {
    fn from(value: i64) -> Self {
        RemoteArg::Value(serde_json::Value::from(value))
    }
}

impl From<f64> for RemoteArg {
    fn from(value: f64) -> Self {
        RemoteArg::Value(serde_json::Value::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ids_are_unique() {
        let a = SessionId::next();
        let b = SessionId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn test_owned_handle_encodes_as_variable_name() {
        let session = SessionId::next();
        let handle = Handle::new(session, "$3".to_string());
        let arg = RemoteArg::from(&handle);
        assert_eq!(arg.to_expr(session).unwrap(), "$3");
    }

    #[test]
    fn test_foreign_handle_degrades_to_null() {
        let mine = SessionId::next();
        let theirs = SessionId::next();
        let handle = Handle::new(theirs, "$0".to_string());
        assert_eq!(RemoteArg::from(handle).to_expr(mine).unwrap(), "null");
    }

    #[test]
    fn test_value_encodes_as_json_literal() {
        let session = SessionId::next();
        assert_eq!(RemoteArg::from("it's").to_expr(session).unwrap(), "\"it's\"");
        assert_eq!(RemoteArg::from(42i64).to_expr(session).unwrap(), "42");
        assert_eq!(RemoteArg::from(true).to_expr(session).unwrap(), "true");
        assert_eq!(
            RemoteArg::from(serde_json::json!([1, 2])).to_expr(session).unwrap(),
            "[1,2]"
        );
    }

    #[test]
    fn test_derived_handle_carries_this_context() {
        let session = SessionId::next();
        let handle = Handle::new(session, "$1".to_string()).with_this_context("$0".to_string());
        assert_eq!(handle.this_context(), Some("$0"));
        assert_eq!(handle.var(), "$1");
    }
}
