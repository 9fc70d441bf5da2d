//! Session facade: lifecycle, raw evaluation, and the remote-object proxy
//! operations.
//!
//! A session owns exactly one background execution context and, transitively,
//! exactly one interpreter process. The proxy operations — `get`, `set`,
//! `call` — compose `Reflect.*` expressions over handles and ship them
//! through the bridge; each is one blocking round trip.

use crate::config::BridgeConfig;
use crate::error::{ForeignHandleError, JxaError, Result, SessionError};
use crate::handle::{Handle, RemoteArg, SessionId};
use crate::protocol::CallKind;
use crate::sync_bridge::SyncBridge;
use crate::transport::{PtyTransport, ReplTransport};
use tracing::info;

/// One connection to a remote interpreter, driven synchronously.
pub struct Session {
    id: SessionId,
    bridge: SyncBridge,
}

impl Session {
    /// Spawn the default interpreter (`osascript -i -l JavaScript`).
    pub fn spawn() -> Result<Self> {
        Self::with_config(BridgeConfig::default())
    }

    /// Spawn a configured interpreter under a pty.
    pub fn with_config(config: BridgeConfig) -> Result<Self> {
        let transport = PtyTransport::spawn(&config)?;
        Self::with_transport(Box::new(transport), config.response_capacity)
    }

    /// Build a session over an arbitrary transport.
    ///
    /// This is the seam used by tests and by callers that manage the
    /// interpreter process themselves.
    pub fn with_transport(
        transport: Box<dyn ReplTransport>,
        response_capacity: usize,
    ) -> Result<Self> {
        let bridge = SyncBridge::start(transport, response_capacity)?;
        let id = SessionId::next();
        info!(session = ?id, "session started");
        Ok(Self { id, bridge })
    }

    /// Identifier used for handle ownership comparisons.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Evaluate one single-line statement, returning the interpreter's raw
    /// textual result.
    pub fn execute(&self, code: &str) -> Result<String> {
        self.bridge.call(CallKind::Execute, code)
    }

    fn create_var(&self, expr: &str) -> Result<Handle> {
        let var = self.bridge.call(CallKind::CreateVar, expr)?;
        Ok(Handle::new(self.id, var))
    }

    /// Root handle bound to the remote global environment.
    ///
    /// All other handles descend from `get`/`call`/`set` on it or on values
    /// reachable from it.
    pub fn global_this(&self) -> Handle {
        Handle::new(self.id, "globalThis".to_string())
    }

    /// True iff `handle` is owned by this session. Never errors; used to
    /// decide reference-vs-literal argument encoding.
    pub fn owns(&self, handle: &Handle) -> bool {
        handle.session_id() == self.id
    }

    /// Property read: binds `Reflect.get(target, key)` to a fresh variable.
    ///
    /// The returned handle remembers `handle` as its this-context so a later
    /// `call` binds the correct receiver.
    pub fn get(&self, handle: &Handle, key: &str) -> Result<Handle> {
        let expr = format!(
            "Reflect.get({}, {})",
            handle.var(),
            serde_json::to_string(key)?
        );
        Ok(self
            .create_var(&expr)?
            .with_this_context(handle.var().to_string()))
    }

    /// Invocation: binds `Reflect.apply(target, thisContext, [args])` to a
    /// fresh variable.
    ///
    /// Arguments that are handles owned by this session pass by reference;
    /// everything else is JSON-encoded as a literal.
    pub fn call(&self, handle: &Handle, args: &[RemoteArg]) -> Result<Handle> {
        let rendered = args
            .iter()
            .map(|arg| arg.to_expr(self.id))
            .collect::<Result<Vec<_>>>()?;
        let expr = format!(
            "Reflect.apply({}, {}, [{}])",
            handle.var(),
            handle.this_context().unwrap_or("undefined"),
            rendered.join(", ")
        );
        self.create_var(&expr)
    }

    /// Property write: executes `Reflect.set(target, key, value)` and returns
    /// its boolean outcome.
    ///
    /// The value is given a remote binding first (unless it already is an
    /// owned handle), so the assignment references it by name.
    pub fn set(&self, handle: &Handle, key: &str, value: impl Into<RemoteArg>) -> Result<bool> {
        let value = self.ensure_handle(value.into())?;
        let expr = format!(
            "Reflect.set({}, {}, {})",
            handle.var(),
            serde_json::to_string(key)?,
            value.var()
        );
        Ok(self.execute(&expr)? == "true")
    }

    /// Give a value a remote binding and return its handle.
    ///
    /// Idempotent on a handle this session already owns. Foreign handles have
    /// no literal form here and degrade to a `null` binding, mirroring the
    /// argument-encoding contract.
    pub fn wrap(&self, value: impl Into<RemoteArg>) -> Result<Handle> {
        self.ensure_handle(value.into())
    }

    /// Bind a function from its source text and return its handle.
    ///
    /// The source must be a single-line expression (`x => x % 2 === 0`); this
    /// is the Rust rendition of wrapping a callable by captured source text.
    pub fn wrap_function(&self, source: &str) -> Result<Handle> {
        // Parenthesized so function expressions survive statement position.
        self.create_var(&format!("({})", source.trim()))
    }

    /// Read a handle's value back as JSON.
    ///
    /// The handle must belong to this session; a foreign handle is rejected
    /// with [`ForeignHandleError`] before any remote traffic. Values with no
    /// JSON representation (functions, `undefined`, ...) fail with
    /// `NotSerializable` carrying their raw textual form.
    pub fn unwrap(&self, handle: &Handle) -> std::result::Result<serde_json::Value, SessionError> {
        if !self.owns(handle) {
            return Err(ForeignHandleError.into());
        }
        let raw = self.execute(handle.var()).map_err(SessionError::Bridge)?;
        serde_json::from_str(&raw)
            .map_err(|_| SessionError::Bridge(JxaError::NotSerializable { raw }))
    }

    /// Tear down the interpreter and the background context, in that order.
    ///
    /// Idempotent. After disposal every call fails with `Disposed`.
    pub fn dispose(&mut self) -> Result<()> {
        info!(session = ?self.id, "disposing session");
        self.bridge.shutdown()
    }

    fn ensure_handle(&self, arg: RemoteArg) -> Result<Handle> {
        match arg {
            RemoteArg::Handle(h) if self.owns(&h) => Ok(h),
            RemoteArg::Handle(_) => self.create_var("null"),
            RemoteArg::Value(v) => self.create_var(&serde_json::to_string(&v)?),
        }
    }
}
