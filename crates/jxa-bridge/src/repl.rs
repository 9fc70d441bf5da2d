//! Protocol bridge: turns single-statement submissions into parsed results.
//!
//! Owns the transport to the interpreter and the minting of remote variable
//! names. One `execute` call writes `trim(code) + "\n\n"` — the blank line
//! terminates statement entry and becomes a second, empty submission whose
//! echo and result are discarded — then drives a two-state line parser until
//! the interpreter is idle again.

use crate::error::{JxaError, Result};
use crate::protocol::{classify, ReplyLine};
use crate::transport::ReplTransport;
use tracing::{debug, trace};

enum ParseState {
    AwaitingResult,
    HaveResult,
}

/// Asynchronous bridge to one interpreter process.
pub struct ReplBridge {
    transport: Box<dyn ReplTransport>,
    var_counter: u64,
    // Set once the output stream ends mid-call; every later call fails fast.
    failed: bool,
}

impl ReplBridge {
    pub fn new(transport: Box<dyn ReplTransport>) -> Self {
        Self {
            transport,
            var_counter: 0,
            failed: false,
        }
    }

    /// Submit one statement and return the interpreter's textual result.
    ///
    /// Fails with `MultiLineCode` when `code` still contains a line break
    /// after trimming, and with `ReplExecution` when the remote evaluation
    /// throws. `StreamEnded` is fatal: the session must be disposed.
    pub async fn execute(&mut self, code: &str) -> Result<String> {
        if self.failed {
            return Err(JxaError::StreamEnded);
        }
        let code = code.trim();
        if code.contains('\n') {
            return Err(JxaError::multi_line(code));
        }

        debug!(statement = code, "submitting");
        self.transport.write(&format!("{}\n\n", code)).await?;
        self.read_reply().await
    }

    async fn read_reply(&mut self) -> Result<String> {
        let mut state = ParseState::AwaitingResult;
        let mut captured = String::new();
        let mut is_error = false;

        loop {
            let Some(line) = self.transport.read_line().await? else {
                self.failed = true;
                return Err(JxaError::StreamEnded);
            };
            trace!(line = line.as_str(), "repl output");

            match state {
                ParseState::AwaitingResult => match classify(&line) {
                    // Command echo, or chatter printed before the result.
                    ReplyLine::Prompt | ReplyLine::Chatter(_) => {}
                    ReplyLine::Success(rest) => {
                        captured = rest;
                        state = ParseState::HaveResult;
                    }
                    ReplyLine::Error(rest) => {
                        captured = rest;
                        is_error = true;
                        state = ParseState::HaveResult;
                    }
                },
                ParseState::HaveResult => match classify(&line) {
                    // Result of the discarded trailing empty submission.
                    ReplyLine::Success(_) | ReplyLine::Error(_) => {}
                    // Continuation of a multi-line textual representation.
                    ReplyLine::Chatter(rest) => {
                        captured.push('\n');
                        captured.push_str(&rest);
                    }
                    // The interpreter is idle again.
                    ReplyLine::Prompt => {
                        if is_error {
                            return Err(JxaError::ReplExecution { message: captured });
                        }
                        return Ok(captured);
                    }
                },
            }
        }
    }

    /// Bind an expression to a fresh remote variable and return its name.
    ///
    /// Names are `$0`, `$1`, ... — unique within the session, never reused.
    /// This is the sole mechanism for giving a remote value a stable name.
    pub async fn create_var(&mut self, expr: &str) -> Result<String> {
        let var = format!("${}", self.var_counter);
        self.var_counter += 1;
        self.execute(&format!("const {} = {}", var, expr)).await?;
        Ok(var)
    }

    /// Close the interpreter's input and await its termination.
    pub async fn dispose(&mut self) -> Result<()> {
        debug!("disposing repl bridge");
        self.transport.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::IoTransport;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, DuplexStream};

    fn bridge_over_duplex() -> (ReplBridge, DuplexStream) {
        let (client, server) = tokio::io::duplex(256 * 1024);
        let (read_half, write_half) = tokio::io::split(client);
        let transport = IoTransport::new(BufReader::new(read_half), write_half);
        (ReplBridge::new(Box::new(transport)), server)
    }

    #[tokio::test]
    async fn test_execute_captures_success_result() {
        let (mut bridge, mut server) = bridge_over_duplex();
        server
            .write_all(b">> 1 + 1\n=> 2\n=> undefined\n>> \n")
            .await
            .unwrap();

        assert_eq!(bridge.execute("1 + 1").await.unwrap(), "2");
    }

    #[tokio::test]
    async fn test_execute_trims_and_writes_double_newline() {
        let (mut bridge, mut server) = bridge_over_duplex();
        server
            .write_all(b">> 1 + 1\n=> 2\n=> undefined\n>> \n")
            .await
            .unwrap();
        bridge.execute("  1 + 1  ").await.unwrap();
        drop(bridge);

        let mut written = String::new();
        server.read_to_string(&mut written).await.unwrap();
        assert_eq!(written, "1 + 1\n\n");
    }

    #[tokio::test]
    async fn test_execute_skips_chatter_before_result() {
        let (mut bridge, mut server) = bridge_over_duplex();
        server
            .write_all(b">> console.log('hi')\nhi\n=> undefined\n=> undefined\n>> \n")
            .await
            .unwrap();

        // Side-effecting console output is never part of the result.
        assert_eq!(bridge.execute("console.log('hi')").await.unwrap(), "undefined");
    }

    #[tokio::test]
    async fn test_execute_captures_multiline_representation() {
        let (mut bridge, mut server) = bridge_over_duplex();
        server
            .write_all(
                b">> Error\n=> function Error() {\n    [function Error]\n}\n=> undefined\n>> \n",
            )
            .await
            .unwrap();

        let result = bridge.execute("Error").await.unwrap();
        assert_eq!(result, "function Error() {\n    [function Error]\n}");
        assert!(result.contains("[function Error]"));
    }

    #[tokio::test]
    async fn test_execute_surfaces_repl_error() {
        let (mut bridge, mut server) = bridge_over_duplex();
        server
            .write_all(b">> throw new Error('x')\n!! Error: x\n=> undefined\n>> \n")
            .await
            .unwrap();

        match bridge.execute("throw new Error('x')").await {
            Err(JxaError::ReplExecution { message }) => assert_eq!(message, "Error: x"),
            other => panic!("Expected ReplExecution, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_multiline_code_is_rejected_without_submission() {
        let (mut bridge, mut server) = bridge_over_duplex();

        match bridge.execute("1 + 1\n2 + 2").await {
            Err(JxaError::MultiLineCode { .. }) => {}
            other => panic!("Expected MultiLineCode, got: {:?}", other),
        }

        // The bridge wrote nothing and stays usable.
        server
            .write_all(b">> 1 + 1\n=> 2\n=> undefined\n>> \n")
            .await
            .unwrap();
        assert_eq!(bridge.execute("1 + 1").await.unwrap(), "2");
    }

    #[tokio::test]
    async fn test_stream_end_is_fatal() {
        let (mut bridge, mut server) = bridge_over_duplex();
        // Close only the interpreter's output direction; its input stays
        // writable so the submission itself succeeds.
        server.shutdown().await.unwrap();

        assert!(matches!(
            bridge.execute("1").await,
            Err(JxaError::StreamEnded)
        ));
        // Later calls fail fast without touching the transport.
        assert!(matches!(
            bridge.execute("2").await,
            Err(JxaError::StreamEnded)
        ));
    }

    #[tokio::test]
    async fn test_create_var_mints_sequential_names() {
        let (mut bridge, mut server) = bridge_over_duplex();
        server
            .write_all(b">> const $0 = 1\n=> 1\n=> undefined\n>> \n")
            .await
            .unwrap();
        server
            .write_all(b">> const $1 = 2\n=> 2\n=> undefined\n>> \n")
            .await
            .unwrap();

        assert_eq!(bridge.create_var("1").await.unwrap(), "$0");
        assert_eq!(bridge.create_var("2").await.unwrap(), "$1");
        drop(bridge);

        let mut written = String::new();
        server.read_to_string(&mut written).await.unwrap();
        assert_eq!(written, "const $0 = 1\n\nconst $1 = 2\n\n");
    }
}
