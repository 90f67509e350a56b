// ── Proxy daemon service control ──

use std::future::Future;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::command::Runner;
use crate::error::HostError;

/// Result of an active-state query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub active: bool,
    /// Raw state string as reported by the service manager.
    pub status: String,
}

impl ServiceStatus {
    pub fn unknown() -> Self {
        Self {
            active: false,
            status: "unknown".to_owned(),
        }
    }
}

pub trait ServiceControl: Send + Sync {
    fn restart(&self) -> impl Future<Output = Result<(), HostError>> + Send;

    /// Never fails: a query that cannot be answered reports
    /// [`ServiceStatus::unknown`].
    fn status(&self) -> impl Future<Output = ServiceStatus> + Send;
}

/// systemd unit driven through `systemctl`.
#[derive(Debug, Clone)]
pub struct Systemd {
    unit: String,
    runner: Runner,
}

impl Systemd {
    pub fn new(unit: impl Into<String>, runner: Runner) -> Self {
        Self {
            unit: unit.into(),
            runner,
        }
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }
}

impl ServiceControl for Systemd {
    async fn restart(&self) -> Result<(), HostError> {
        info!(unit = %self.unit, "restarting service");
        self.runner
            .run("systemctl", &["restart", &self.unit])
            .await
            .map(|_| ())
    }

    async fn status(&self) -> ServiceStatus {
        // is-active needs no privileges
        match Runner::new(false)
            .run("systemctl", &["is-active", &self.unit])
            .await
        {
            Ok(output) => ServiceStatus {
                active: output.stdout == "active",
                status: output.stdout,
            },
            // is-active exits non-zero for every state but "active"
            Err(HostError::Command { output, .. }) if !output.is_empty() => ServiceStatus {
                active: false,
                status: output,
            },
            Err(err) => {
                debug!(unit = %self.unit, error = %err, "service status query failed");
                ServiceStatus::unknown()
            }
        }
    }
}
