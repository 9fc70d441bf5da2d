//! Transport seam between the protocol bridge and the interpreter process.
//!
//! [`ReplTransport`] is the line-oriented boundary the bridge talks through.
//! [`PtyTransport`] is the production implementation: it spawns the
//! interpreter under a pseudo-terminal (required so the interpreter
//! line-buffers its output) and bridges the blocking pty ends to the async
//! bridge with dedicated reader/writer threads. [`IoTransport`] adapts any
//! async byte stream pair, which is what the tests use.

use crate::config::{BridgeConfig, ProtocolConfig};
use crate::error::{JxaError, Result};
use async_trait::async_trait;
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use std::io::{BufRead, BufReader, Read, Write};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

/// Line-oriented transport to the interpreter.
///
/// `read_line` returns `Ok(None)` on end of stream. Implementations strip
/// trailing `\r\n` from returned lines.
#[async_trait]
pub trait ReplTransport: Send {
    /// Read the next line of interpreter output.
    async fn read_line(&mut self) -> Result<Option<String>>;

    /// Write raw text to the interpreter's input.
    async fn write(&mut self, data: &str) -> Result<()>;

    /// Close the interpreter's input and await process termination.
    ///
    /// Must be safe to call after failures and more than once.
    async fn shutdown(&mut self) -> Result<()>;
}

/// Transport over arbitrary async streams.
pub struct IoTransport<R, W> {
    reader: R,
    writer: W,
}

impl<R, W> IoTransport<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }
}

#[async_trait]
impl<R, W> ReplTransport for IoTransport<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line).await?;
        if n == 0 {
            return Ok(None);
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }

    async fn write(&mut self, data: &str) -> Result<()> {
        self.writer.write_all(data.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

enum WriteOp {
    Data(String),
    Eof,
}

/// Transport over an interpreter child process running under a pty.
pub struct PtyTransport {
    lines: tokio::sync::mpsc::Receiver<String>,
    writer: Option<std::sync::mpsc::Sender<WriteOp>>,
    child: Option<Box<dyn Child + Send + Sync>>,
    // Keeps the pty open for the lifetime of the transport; dropping the
    // master while the child is alive would sever both directions.
    _master: Box<dyn MasterPty + Send>,
}

impl PtyTransport {
    /// Spawn the configured interpreter under a new pty pair.
    pub fn spawn(config: &BridgeConfig) -> Result<Self> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows: config.pty_rows,
                cols: config.pty_cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| JxaError::Spawn {
                message: format!("openpty failed: {}", e),
            })?;

        let mut cmd = CommandBuilder::new(&config.program);
        cmd.args(&config.args);
        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| JxaError::Spawn {
                message: format!("{}: {}", config.program, e),
            })?;
        // The slave end belongs to the child now.
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| JxaError::Spawn {
                message: format!("pty reader unavailable: {}", e),
            })?;
        let pty_writer = pair.master.take_writer().map_err(|e| JxaError::Spawn {
            message: format!("pty writer unavailable: {}", e),
        })?;

        debug!(
            program = %config.program,
            pid = child.process_id(),
            "spawned interpreter under pty"
        );

        let (line_tx, line_rx) = tokio::sync::mpsc::channel(ProtocolConfig::LINE_CHANNEL_DEPTH);
        std::thread::Builder::new()
            .name("jxa-pty-reader".to_string())
            .spawn(move || reader_loop(reader, line_tx))?;

        let (write_tx, write_rx) = std::sync::mpsc::channel();
        std::thread::Builder::new()
            .name("jxa-pty-writer".to_string())
            .spawn(move || writer_loop(pty_writer, write_rx))?;

        Ok(Self {
            lines: line_rx,
            writer: Some(write_tx),
            child: Some(child),
            _master: pair.master,
        })
    }
}

#[async_trait]
impl ReplTransport for PtyTransport {
    async fn read_line(&mut self) -> Result<Option<String>> {
        Ok(self.lines.recv().await)
    }

    async fn write(&mut self, data: &str) -> Result<()> {
        let writer = self.writer.as_ref().ok_or(JxaError::Disposed)?;
        writer
            .send(WriteOp::Data(data.to_string()))
            // The writer thread only exits when the pty is gone.
            .map_err(|_| JxaError::StreamEnded)?;
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            let _ = writer.send(WriteOp::Eof);
        }
        if let Some(mut child) = self.child.take() {
            let status = tokio::task::spawn_blocking(move || child.wait())
                .await
                .map_err(|e| JxaError::Other(format!("child reaper panicked: {}", e)))??;
            debug!(?status, "interpreter exited");
        }
        Ok(())
    }
}

fn reader_loop(reader: Box<dyn Read + Send>, tx: tokio::sync::mpsc::Sender<String>) {
    let mut reader = BufReader::new(reader);
    loop {
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {
                while line.ends_with('\n') || line.ends_with('\r') {
                    line.pop();
                }
                if tx.blocking_send(line).is_err() {
                    break;
                }
            }
            // Ptys report EIO when the child exits; either way the stream
            // is over.
            Err(e) => {
                debug!("pty reader stopped: {}", e);
                break;
            }
        }
    }
}

fn writer_loop(mut writer: Box<dyn Write + Send>, rx: std::sync::mpsc::Receiver<WriteOp>) {
    for op in rx {
        match op {
            WriteOp::Data(text) => {
                if let Err(e) = writer
                    .write_all(text.as_bytes())
                    .and_then(|_| writer.flush())
                {
                    warn!("pty write failed: {}", e);
                    break;
                }
            }
            WriteOp::Eof => {
                // Ptys have no half-close; EOT tells the interpreter that
                // input is finished.
                let _ = writer.write_all(&[0x04]);
                let _ = writer.flush();
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader as AsyncBufReader;

    fn duplex_transport(
        capacity: usize,
    ) -> (impl ReplTransport, tokio::io::DuplexStream) {
        let (client, server) = tokio::io::duplex(capacity);
        let (read_half, write_half) = tokio::io::split(client);
        (
            IoTransport::new(AsyncBufReader::new(read_half), write_half),
            server,
        )
    }

    #[tokio::test]
    async fn test_io_transport_reads_lines_without_terminators() {
        let (mut transport, mut server) = duplex_transport(1024);
        server.write_all(b"=> 2\r\n>> \n").await.unwrap();

        assert_eq!(transport.read_line().await.unwrap(), Some("=> 2".into()));
        assert_eq!(transport.read_line().await.unwrap(), Some(">> ".into()));
    }

    #[tokio::test]
    async fn test_io_transport_eof_returns_none() {
        let (mut transport, server) = duplex_transport(1024);
        drop(server);
        assert_eq!(transport.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_io_transport_write_is_visible_to_peer() {
        let (mut transport, server) = duplex_transport(1024);
        transport.write("1 + 1\n\n").await.unwrap();
        drop(transport);

        let mut lines = AsyncBufReader::new(server).lines();
        assert_eq!(lines.next_line().await.unwrap(), Some("1 + 1".into()));
        assert_eq!(lines.next_line().await.unwrap(), Some("".into()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_pty_transport_round_trip_with_cat() {
        let config = BridgeConfig::new("cat");
        // Environments without a pty device skip this test.
        let Ok(mut transport) = PtyTransport::spawn(&config) else {
            return;
        };

        transport.write("hello\n").await.unwrap();
        // The pty echoes input and cat repeats it; either way the first
        // line we see must carry the payload.
        let line = transport.read_line().await.unwrap();
        assert!(line.is_some_and(|l| l.contains("hello")));

        transport.shutdown().await.unwrap();
        // Idempotent after teardown.
        transport.shutdown().await.unwrap();
    }
}
