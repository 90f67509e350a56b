// ── Firewall reload ──

use std::future::Future;
use std::path::Path;

use tracing::info;

use crate::command::Runner;
use crate::error::HostError;

pub trait FirewallReload: Send + Sync {
    /// Load the ruleset file into the kernel.
    fn reload(&self, path: &Path) -> impl Future<Output = Result<(), HostError>> + Send;
}

/// `nft -f <file>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Nft {
    runner: Runner,
}

impl Nft {
    pub fn new(runner: Runner) -> Self {
        Self { runner }
    }
}

impl FirewallReload for Nft {
    async fn reload(&self, path: &Path) -> Result<(), HostError> {
        let file = path.to_string_lossy();
        info!(path = %file, "reloading nftables");
        self.runner.run("nft", &["-f", &file]).await.map(|_| ())
    }
}
