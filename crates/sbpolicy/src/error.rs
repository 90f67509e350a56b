//! CLI error types with miette diagnostics.
//!
//! Maps core, host and config errors into user-facing errors with
//! actionable help text and a stable exit code.

use std::path::Path;

use miette::Diagnostic;
use thiserror::Error;

use sbpolicy_config::ConfigError;
use sbpolicy_core::CoreError;
use sbpolicy_host::HostError;

/// Process exit codes.
pub mod exit_code {
    #[allow(dead_code)]
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const PRECONDITION: i32 = 6;
    pub const UPSTREAM: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Input ────────────────────────────────────────────────────────

    #[error("{message}")]
    #[diagnostic(code(sbpolicy::invalid))]
    Invalid {
        message: String,
        #[help]
        details: Option<String>,
    },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(sbpolicy::validation))]
    Validation { field: String, reason: String },

    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(sbpolicy::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Resources ────────────────────────────────────────────────────

    #[error("{entity} '{identifier}' not found")]
    #[diagnostic(
        code(sbpolicy::not_found),
        help("Run: sbpolicy {list_command}")
    )]
    NotFound {
        entity: String,
        identifier: String,
        list_command: String,
    },

    #[error("{message}")]
    #[diagnostic(
        code(sbpolicy::precondition),
        help(
            "The firewall file must contain the force-UDP block between\n\
             `# === SB-WEBUI:BEGIN force_udp_vpn_clients ===` and\n\
             `# === SB-WEBUI:END force_udp_vpn_clients ===`. Nothing was written."
        )
    )]
    Precondition { message: String },

    // ── Host ─────────────────────────────────────────────────────────

    #[error("{message}")]
    #[diagnostic(
        code(sbpolicy::file),
        help("Check the paths in `sbpolicy config show` and the file permissions.")
    )]
    File { message: String },

    #[error("{message}")]
    #[diagnostic(
        code(sbpolicy::command_failed),
        help("Check `[service]` in the config; `sudo = true` runs systemctl and nft via sudo.")
    )]
    CommandFailed { message: String },

    #[error("{message}")]
    #[diagnostic(code(sbpolicy::upstream))]
    Upstream { message: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error(transparent)]
    #[diagnostic(
        code(sbpolicy::config),
        help("Inspect the resolved settings with: sbpolicy config show")
    )]
    Config(#[from] ConfigError),

    // ── Interactive ──────────────────────────────────────────────────

    #[error("Prompt failed: {message}")]
    #[diagnostic(code(sbpolicy::prompt))]
    Prompt { message: String },

    // ── IO / Serialization ───────────────────────────────────────────

    #[error(transparent)]
    #[diagnostic(code(sbpolicy::io))]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON in {path}: {source}")]
    #[diagnostic(code(sbpolicy::json), help("Check the JSON file contents and try again."))]
    Json {
        path: String,
        source: serde_json::Error,
    },
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Invalid { .. }
            | Self::Validation { .. }
            | Self::NonInteractiveRequiresYes { .. }
            | Self::Config(_)
            | Self::Json { .. } => exit_code::USAGE,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Precondition { .. } => exit_code::PRECONDITION,
            Self::Prompt { .. } => exit_code::GENERAL,
            Self::File { .. } | Self::CommandFailed { .. } | Self::Upstream { .. } | Self::Io(_) => {
                exit_code::UPSTREAM
            }
        }
    }

    pub fn json(path: &Path, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.display().to_string(),
            source,
        }
    }
}

/// The listing command that shows what a missing entity could have been.
fn list_command(entity: &str) -> &'static str {
    match entity {
        "domain group" => "domains show",
        "template" => "vless templates list",
        "outbound" => "vless show",
        "client" => "clients list",
        _ => "--help",
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation { message, details } => CliError::Invalid {
                message,
                details: (!details.is_empty()).then(|| details.join("\n")),
            },
            CoreError::NotFound { entity, identifier } => CliError::NotFound {
                list_command: list_command(&entity).into(),
                entity,
                identifier,
            },
            CoreError::Precondition { message } => CliError::Precondition { message },
            CoreError::Json(err) => CliError::Invalid {
                message: err.to_string(),
                details: None,
            },
        }
    }
}

// ── HostError → CliError mapping ─────────────────────────────────────

impl From<HostError> for CliError {
    fn from(err: HostError) -> Self {
        match err {
            HostError::Core(core) => core.into(),
            HostError::Read { .. }
            | HostError::Write { .. }
            | HostError::Parse { .. }
            | HostError::Missing { .. } => CliError::File {
                message: err.to_string(),
            },
            HostError::Spawn { .. } | HostError::Command { .. } => CliError::CommandFailed {
                message: err.to_string(),
            },
            HostError::Upstream { message } => CliError::Upstream { message },
            HostError::Http(_) => CliError::Upstream {
                message: err.to_string(),
            },
        }
    }
}
