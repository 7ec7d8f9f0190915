//! Error types for hlsrelay-av.

use std::path::PathBuf;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while locating or launching the engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required external tool is not available.
    #[error("tool not found: {tool}")]
    ToolNotFound { tool: String },

    /// A configured tool path does not exist.
    #[error("configured {tool} path does not exist: {}", path.display())]
    ToolPathMissing { tool: String, path: PathBuf },

    /// The tool was found but could not be launched.
    #[error("failed to spawn {tool}: {message}")]
    SpawnFailed { tool: String, message: String },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Create a tool not found error.
    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Self::ToolNotFound { tool: tool.into() }
    }

    /// Create a spawn failed error.
    pub fn spawn_failed(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SpawnFailed {
            tool: tool.into(),
            message: message.into(),
        }
    }
}
