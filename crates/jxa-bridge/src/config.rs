//! Centralized configuration for the JXA bridge.
//!
//! Protocol constants live in [`ProtocolConfig`]; per-session knobs (which
//! interpreter to spawn, pty geometry, response capacity) live in
//! [`BridgeConfig`].

/// Fixed protocol parameters shared by every session.
pub struct ProtocolConfig;

impl ProtocolConfig {
    /// Prefix of prompt/echo lines emitted by the interpreter.
    pub const PROMPT_MARKER: &'static str = ">> ";
    /// Prefix of success-result lines.
    pub const SUCCESS_MARKER: &'static str = "=> ";
    /// Prefix of error-result lines.
    pub const ERROR_MARKER: &'static str = "!! ";

    /// Default capacity of the per-call response region, in bytes.
    pub const RESPONSE_CAPACITY: usize = 16_000;

    /// Depth of the channel carrying parsed lines out of the pty reader thread.
    pub const LINE_CHANNEL_DEPTH: usize = 64;
}

/// Configuration for spawning the interpreter under a pseudo-terminal.
///
/// Defaults target the macOS JXA REPL (`osascript -i -l JavaScript`). The pty
/// is required so the interpreter line-buffers its output instead of
/// block-buffering it.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Interpreter executable.
    pub program: String,
    /// Arguments passed to the interpreter.
    pub args: Vec<String>,
    /// Pty rows.
    pub pty_rows: u16,
    /// Pty columns. Wide enough that echoed statements rarely wrap.
    pub pty_cols: u16,
    /// Capacity of the per-call response region, in bytes.
    pub response_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            program: "osascript".to_string(),
            args: vec!["-i".to_string(), "-l".to_string(), "JavaScript".to_string()],
            pty_rows: 24,
            pty_cols: 512,
            response_capacity: ProtocolConfig::RESPONSE_CAPACITY,
        }
    }
}

impl BridgeConfig {
    /// Create a config for an arbitrary line-oriented interpreter.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: vec![],
            ..Self::default()
        }
    }

    /// Set the interpreter arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the pty geometry.
    pub fn with_pty_size(mut self, rows: u16, cols: u16) -> Self {
        self.pty_rows = rows;
        self.pty_cols = cols;
        self
    }

    /// Set the response region capacity.
    pub fn with_response_capacity(mut self, capacity: usize) -> Self {
        self.response_capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_targets_jxa() {
        let config = BridgeConfig::default();
        assert_eq!(config.program, "osascript");
        assert_eq!(config.args, vec!["-i", "-l", "JavaScript"]);
        assert_eq!(config.response_capacity, 16_000);
    }

    #[test]
    fn test_builder_methods() {
        let config = BridgeConfig::new("node")
            .with_args(["-i"])
            .with_pty_size(40, 120)
            .with_response_capacity(1024);
        assert_eq!(config.program, "node");
        assert_eq!(config.args, vec!["-i"]);
        assert_eq!(config.pty_rows, 40);
        assert_eq!(config.pty_cols, 120);
        assert_eq!(config.response_capacity, 1024);
    }
}
