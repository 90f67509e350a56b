//! Clap derive structures for the `sbpolicy` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// sbpolicy -- VPN routing policy for a sing-box gateway
#[derive(Debug, Parser)]
#[command(
    name = "sbpolicy",
    version,
    about = "Manage sing-box VPN routing policy from the command line",
    long_about = "Edits the operator-facing policy documents (domain groups, per-client\n\
        overrides, the VPN endpoint) and compiles them into the sing-box\n\
        configuration, the domain rule set and the nftables force-UDP set.\n\n\
        Every change is written first, then the firewall is reloaded and\n\
        the proxy service restarted.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "SBPOLICY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "SBPOLICY_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Compute and print the result without writing files or restarting
    #[arg(long, global = true)]
    pub dry_run: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage domain groups and the compiled vpn-domains rule set
    #[command(alias = "dom")]
    Domains(DomainsArgs),

    /// Switch the VPN on or off and pick the routing mode
    Vpn(VpnArgs),

    /// Manage per-client overrides
    #[command(alias = "cl")]
    Clients(ClientsArgs),

    /// Inspect and replace the VPN endpoint
    Vless(VlessArgs),

    /// Query or restart the proxy service
    #[command(alias = "svc")]
    Service(ServiceArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Domains ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DomainsArgs {
    #[command(subcommand)]
    pub command: DomainsCommand,
}

#[derive(Debug, Subcommand)]
pub enum DomainsCommand {
    /// Show the domain groups
    #[command(alias = "ls")]
    Show,

    /// Replace the domain policy with a JSON document and recompile
    Apply {
        /// Policy document: {"version": 1, "groups": [...]}
        #[arg(long, short = 'f')]
        file: PathBuf,
    },

    /// Compile a policy document to the flat rule set without touching the host
    Compile {
        /// Policy document: {"version": 1, "groups": [...]}
        #[arg(long, short = 'f')]
        file: PathBuf,
    },

    /// Enable a domain group
    Enable {
        /// Group id
        id: String,
    },

    /// Disable a domain group
    Disable {
        /// Group id
        id: String,
    },
}

// ── VPN ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct VpnArgs {
    #[command(subcommand)]
    pub command: VpnCommand,
}

#[derive(Debug, Subcommand)]
pub enum VpnCommand {
    /// Show whether the VPN is on, its routing mode and the service state
    Status,

    /// Route traffic through the VPN
    On {
        /// What goes through the tunnel
        #[arg(long, short = 'p', default_value = "domains")]
        policy: PolicyArg,
    },

    /// Send everything direct
    Off,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PolicyArg {
    /// Only domains of the enabled groups
    Domains,
    /// All traffic except LAN ranges
    All,
}

// ── Clients ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ClientsArgs {
    #[command(subcommand)]
    pub command: ClientsCommand,
}

#[derive(Debug, Subcommand)]
pub enum ClientsCommand {
    /// List clients with stored overrides
    #[command(alias = "ls")]
    List,

    /// List clients seen on the LAN
    Discover,

    /// Create or update a client's overrides
    Set {
        /// Client id (usually the MAC address)
        id: String,

        /// Display name
        #[arg(long)]
        name: Option<String>,

        /// Client IPv4 address
        #[arg(long)]
        ip: Option<String>,

        /// Send all of this client's traffic through the VPN
        #[arg(long, action = ArgAction::Set)]
        force_vpn: Option<bool>,

        /// Add this client to the nftables force-UDP set
        #[arg(long, action = ArgAction::Set)]
        force_udp_vpn: Option<bool>,
    },
}

// ── VLESS endpoint ──────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct VlessArgs {
    #[command(subcommand)]
    pub command: VlessCommand,
}

#[derive(Debug, Subcommand)]
pub enum VlessCommand {
    /// Show the current vpn outbound
    Show,

    /// Decode a vless:// link without applying it
    Parse {
        /// vless://uuid@host:port?...#name
        uri: String,
    },

    /// Point the vpn outbound at a link or a saved template
    Apply {
        /// vless://uuid@host:port?...#name
        #[arg(required_unless_present = "template", conflicts_with = "template")]
        uri: Option<String>,

        /// Saved template id
        #[arg(long, short = 't')]
        template: Option<String>,
    },

    /// Manage saved links
    #[command(alias = "tpl")]
    Templates(TemplatesArgs),
}

#[derive(Debug, Args)]
pub struct TemplatesArgs {
    #[command(subcommand)]
    pub command: TemplatesCommand,
}

#[derive(Debug, Subcommand)]
pub enum TemplatesCommand {
    /// List saved templates
    #[command(alias = "ls")]
    List,

    /// Show a template and its decoded endpoint
    Show {
        /// Template id (file name)
        id: String,
    },

    /// Save a link as a template
    Save {
        /// vless://uuid@host:port?...#name
        uri: String,

        /// Display name (defaults to the link fragment)
        #[arg(long, short = 'n')]
        name: Option<String>,
    },

    /// Delete a template
    #[command(alias = "rm")]
    Delete {
        /// Template id (file name)
        id: String,
    },
}

// ── Service ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ServiceArgs {
    #[command(subcommand)]
    pub command: ServiceCommand,
}

#[derive(Debug, Subcommand)]
pub enum ServiceCommand {
    /// Show the proxy service's active state
    Status,

    /// Restart the proxy service
    Restart,
}

// ── Config ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current resolved configuration
    Show,

    /// Print the config file path
    Path,

    /// Create a config file with guided setup
    Init,
}

// ── Completions ─────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
