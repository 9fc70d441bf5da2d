//! Synchronization bridge: a blocking call surface over the async protocol
//! bridge.
//!
//! The protocol bridge lives on a dedicated background thread running a
//! current-thread tokio runtime. The foreground sends a [`CallRequest`]
//! together with a freshly allocated [`ResponseBuffer`] and blocks on a
//! rendezvous channel until the background hands the completed region back —
//! a wait/wake handoff, no polling. Because the public call blocks, a session
//! has at most one call in flight at any time.

use crate::error::{JxaError, Result};
use crate::protocol::{CallKind, CallRequest, ResponseBuffer};
use crate::repl::ReplBridge;
use crate::transport::ReplTransport;
use std::sync::mpsc;
use tracing::{debug, error};

/// Ephemeral per-request state for one blocking round trip.
struct PendingCall {
    request: CallRequest,
    buffer: ResponseBuffer,
    done: mpsc::SyncSender<ResponseBuffer>,
}

/// Hosts a [`ReplBridge`] in a background execution context and exposes a
/// strictly synchronous call interface to the foreground.
pub struct SyncBridge {
    requests: Option<mpsc::Sender<PendingCall>>,
    worker: Option<std::thread::JoinHandle<()>>,
    response_capacity: usize,
}

impl SyncBridge {
    /// Start the background context over the given transport.
    pub fn start(transport: Box<dyn ReplTransport>, response_capacity: usize) -> Result<Self> {
        let (request_tx, request_rx) = mpsc::channel::<PendingCall>();
        let worker = std::thread::Builder::new()
            .name("jxa-bridge-worker".to_string())
            .spawn(move || worker_loop(transport, request_rx))?;

        Ok(Self {
            requests: Some(request_tx),
            worker: Some(worker),
            response_capacity,
        })
    }

    /// Forward one request to the background context and block until its
    /// response region is completed.
    pub fn call(&self, kind: CallKind, payload: impl Into<String>) -> Result<String> {
        let requests = self.requests.as_ref().ok_or(JxaError::Disposed)?;
        Self::round_trip(requests, self.response_capacity, kind, payload.into())
    }

    /// Tear down the bridge: dispose the interpreter first, then release the
    /// background context. The ordering prevents an orphaned child process.
    ///
    /// Idempotent; later calls return `Ok(())`.
    pub fn shutdown(&mut self) -> Result<()> {
        let Some(requests) = self.requests.take() else {
            return Ok(());
        };
        let result =
            Self::round_trip(&requests, self.response_capacity, CallKind::Dispose, String::new());
        drop(requests);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        debug!("sync bridge shut down");
        result.map(|_| ())
    }

    fn round_trip(
        requests: &mpsc::Sender<PendingCall>,
        capacity: usize,
        kind: CallKind,
        payload: String,
    ) -> Result<String> {
        // Fresh response region and completion channel per call; never reused.
        let (done_tx, done_rx) = mpsc::sync_channel(1);
        let call = PendingCall {
            request: CallRequest { kind, payload },
            buffer: ResponseBuffer::new(capacity),
            done: done_tx,
        };
        requests.send(call).map_err(|_| JxaError::Disposed)?;
        let buffer = done_rx.recv().map_err(|_| JxaError::StreamEnded)?;
        buffer.decode()
    }
}

impl Drop for SyncBridge {
    fn drop(&mut self) {
        // Best-effort teardown for sessions dropped without an explicit
        // dispose.
        let _ = self.shutdown();
    }
}

fn worker_loop(transport: Box<dyn ReplTransport>, requests: mpsc::Receiver<PendingCall>) {
    let runtime = match tokio::runtime::Builder::new_current_thread().build() {
        Ok(rt) => rt,
        Err(e) => {
            // Dropping the receiver fails all pending and future calls fast.
            error!("failed to build bridge runtime: {}", e);
            return;
        }
    };
    let mut bridge = ReplBridge::new(transport);

    while let Ok(PendingCall {
        request,
        mut buffer,
        done,
    }) = requests.recv()
    {
        let disposing = request.kind == CallKind::Dispose;
        match runtime.block_on(dispatch(&mut bridge, &request)) {
            Ok(text) => {
                if let Err(overflow) = buffer.write_success(&text) {
                    buffer.write_error(&overflow);
                }
            }
            Err(err) => buffer.write_error(&err),
        }
        // Final step, regardless of outcome: hand the region back exactly
        // once so the caller is never left blocked.
        let _ = done.send(buffer);
        if disposing {
            break;
        }
    }
}

async fn dispatch(bridge: &mut ReplBridge, request: &CallRequest) -> Result<String> {
    match request.kind {
        CallKind::Execute => bridge.execute(&request.payload).await,
        CallKind::CreateVar => bridge.create_var(&request.payload).await,
        CallKind::Dispose => {
            bridge.dispose().await?;
            Ok(String::new())
        }
    }
}
