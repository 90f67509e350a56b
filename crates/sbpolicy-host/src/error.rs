// ── Host error types ──
//
// Everything that can go wrong once the pure compilers hand over: file
// I/O, external commands, and the discovery sources. Compiler errors pass
// through unchanged in `Core`.

use std::path::PathBuf;

use sbpolicy_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    #[error(transparent)]
    Core(#[from] CoreError),

    // ── Files ────────────────────────────────────────────────────────
    #[error("Cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid JSON in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("{} does not exist", .path.display())]
    Missing { path: PathBuf },

    // ── External commands ────────────────────────────────────────────
    #[error("Cannot run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {output}")]
    Command {
        program: String,
        status: String,
        output: String,
    },

    // ── Discovery sources ────────────────────────────────────────────
    #[error("{message}")]
    Upstream { message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl HostError {
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
        }
    }
}
