//! jxa-bridge - Drive a line-oriented scripting REPL as a synchronous remote
//! object space.
//!
//! The crate spawns an external interpreter (by default the macOS JXA REPL,
//! `osascript -i -l JavaScript`) under a pseudo-terminal, speaks its
//! line-oriented prompt/result/error protocol, and layers a remote-object
//! handle system on top: values living in the interpreter are represented by
//! opaque [`Handle`]s, and property reads, writes, and invocations compose
//! remote expressions that ship through a blocking bridge. No asynchronous
//! control flow is exposed to callers.
//!
//! # Example
//!
//! ```rust,ignore
//! use jxa_bridge::Session;
//! use serde_json::json;
//!
//! fn main() -> jxa_bridge::Result<()> {
//!     let mut session = Session::spawn()?;
//!
//!     assert_eq!(session.execute("1 + 1")?, "2");
//!
//!     // Filter an array through a remotely-bound predicate.
//!     let numbers = session.wrap(json!([1, 2, 3, 4, 5]))?;
//!     let is_even = session.wrap_function("x => x % 2 === 0")?;
//!     let filter = session.get(&numbers, "filter")?;
//!     let evens = session.call(&filter, &[is_even.into()])?;
//!     assert_eq!(session.unwrap(&evens).unwrap(), json!([2, 4]));
//!
//!     session.dispose()
//! }
//! ```
//!
//! Remote bindings created for handles are never reclaimed; they accumulate
//! for the life of the session.

pub mod config;
pub mod error;
pub mod handle;
pub mod protocol;
pub mod repl;
pub mod session;
pub mod sync_bridge;
pub mod transport;

// Re-export commonly used types
pub use config::{BridgeConfig, ProtocolConfig};
pub use error::{ForeignHandleError, JxaError, Result, SessionError, WireError};
pub use handle::{Handle, RemoteArg, SessionId};
pub use protocol::{CallKind, CallRequest, ReplyLine};
pub use repl::ReplBridge;
pub use session::Session;
pub use sync_bridge::SyncBridge;
pub use transport::{IoTransport, PtyTransport, ReplTransport};
