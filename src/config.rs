//! Configuration for the wallet library and CLI
//!
//! Library callers build a [`WalletOptions`] (serde-deserializable, with
//! defaults) and the wallet resolves it once into an immutable
//! [`WalletConfig`]. The CLI fills the same options from:
//! - a JSON file or inline JSON string (`--config`, `X402_CONFIG`)
//! - command line flags and their environment variables (highest priority)

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::WalletError;
use crate::eth::{Network, USDC};
use crate::logging::LogFormat;
use crate::x402::{ClientConfig, PolicyConfig};

/// Network used when none is configured
pub const DEFAULT_NETWORK: &str = "eip155:8453";

// ============================================================================
// Wallet options
// ============================================================================

/// Caller-facing wallet settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletOptions {
    /// Network identifier, CAIP-2 (`eip155:84532`) or legacy name (`base-sepolia`)
    pub network: String,
    /// JSON-RPC endpoint overriding the network's public default
    pub rpc_url: Option<String>,
    /// Per-payment budget in cents; `None` or `0` pays any amount
    pub max_payment: Option<u64>,
    /// Connection timeout in seconds
    pub connect_timeout: Option<u64>,
    /// Total request timeout in seconds
    pub request_timeout: Option<u64>,
}

impl Default for WalletOptions {
    fn default() -> Self {
        Self {
            network: DEFAULT_NETWORK.to_string(),
            rpc_url: None,
            max_payment: None,
            connect_timeout: None,
            request_timeout: None,
        }
    }
}

impl WalletOptions {
    pub fn network(mut self, network: impl Into<String>) -> Self {
        self.network = network.into();
        self
    }

    pub fn rpc_url(mut self, rpc_url: impl Into<String>) -> Self {
        self.rpc_url = Some(rpc_url.into());
        self
    }

    pub fn max_payment(mut self, cents: u64) -> Self {
        self.max_payment = Some(cents);
        self
    }
}

// ============================================================================
// Resolved wallet configuration
// ============================================================================

/// A network the wallet can query balances on
#[derive(Debug, Clone)]
pub struct ChainProfile {
    pub network: Network,
    pub usdc: &'static USDC,
    pub rpc_url: Url,
}

/// Immutable wallet configuration, fixed at construction
#[derive(Debug, Clone)]
pub struct WalletConfig {
    pub network: String,
    /// `None` when the network has no USDC deployment or RPC endpoint
    pub chain: Option<ChainProfile>,
    pub policy: PolicyConfig,
    pub client: ClientConfig,
}

impl WalletConfig {
    pub fn from_options(options: &WalletOptions) -> Result<Self, WalletError> {
        let network = options.network.trim();
        if network.is_empty() {
            return Err(WalletError::Configuration("network must not be empty".into()));
        }

        let chain = match Network::parse(network).and_then(|n| USDC::try_by_network(n).map(|u| (n, u))) {
            Some((resolved, usdc)) => {
                let rpc = options
                    .rpc_url
                    .as_deref()
                    .or_else(|| resolved.default_rpc_url());
                match rpc {
                    Some(rpc) => {
                        let rpc_url = Url::parse(rpc).map_err(|e| {
                            WalletError::Configuration(format!("invalid RPC URL {rpc:?}: {e}"))
                        })?;
                        Some(ChainProfile {
                            network: resolved,
                            usdc,
                            rpc_url,
                        })
                    }
                    None => None,
                }
            }
            None => None,
        };

        Ok(Self {
            network: network.to_string(),
            chain,
            policy: PolicyConfig::default().with_max_payment(options.max_payment),
            client: ClientConfig {
                connect_timeout: options.connect_timeout.map(Duration::from_secs),
                timeout: options.request_timeout.map(Duration::from_secs),
            },
        })
    }
}

// ============================================================================
// Configuration Arguments
// ============================================================================

/// Common configuration arguments (used across CLI commands)
#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    /// Configuration file (JSON file path or JSON string).
    ///
    /// - A file path: --config wallet.json
    ///
    /// - Inline JSON: --config '{"network":"eip155:84532","max_payment":50}'
    ///
    #[arg(long = "config", short = 'c', env = "X402_CONFIG", value_name = "file.json or {json}")]
    pub config: Option<String>,

    /// Network: CAIP-2 identifier or legacy name
    ///
    /// eip155:8453 (Base) and eip155:84532 (Base Sepolia) support balance queries.
    ///
    #[arg(long, short = 'n', env = "X402_NETWORK", value_name = "eip155:ID")]
    pub network: Option<String>,

    /// JSON-RPC endpoint for balance queries
    #[arg(long, env = "X402_RPC_URL", value_name = "http(s)://...")]
    pub rpc_url: Option<String>,

    /// Maximum amount per payment, in cents (0 = no limit)
    #[arg(long, short = 'M', env = "X402_MAX_PAYMENT", value_name = "CENTS")]
    pub max_payment: Option<u64>,

    /// Connection timeout in seconds
    #[arg(long, env = "X402_CONNECT_TIMEOUT", value_name = "SECS")]
    pub connect_timeout: Option<u64>,

    /// Total request timeout in seconds
    #[arg(long, env = "X402_REQUEST_TIMEOUT", value_name = "SECS")]
    pub request_timeout: Option<u64>,

    // -------------------------------------------------------------------------
    // Logging/Tracing Options
    // -------------------------------------------------------------------------

    /// Enable verbose output (INFO level logging)
    ///
    /// Default is WARN level. Use -v for INFO, -d for DEBUG.
    ///
    #[arg(short = 'v', long, env = "X402_VERBOSE")]
    pub verbose: bool,

    /// Enable debug output (DEBUG level logging)
    #[arg(short = 'd', long, env = "X402_DEBUG", conflicts_with = "verbose")]
    pub debug: bool,

    /// Quiet mode - only show errors
    #[arg(short = 'q', long, conflicts_with_all = ["verbose", "debug"])]
    pub quiet: bool,

    /// Silent mode - suppress all terminal log output
    ///
    /// Log file output (if configured) is unaffected.
    ///
    #[arg(long, short = 's', conflicts_with_all = ["verbose", "debug", "quiet"])]
    pub silent: bool,

    /// Log output format
    #[arg(long, short = 'L', default_value = "pretty", value_enum, env = "X402_LOG_FORMAT")]
    pub log_format: LogFormat,

    /// Write debug logs to file
    #[arg(long, short = 'l', env = "X402_LOG_FILE", value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

// ============================================================================
// Global Configuration
// ============================================================================

/// CLI configuration: wallet options plus logging
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    #[serde(flatten)]
    pub wallet: WalletOptions,

    pub verbose: bool,
    pub debug: bool,
    pub quiet: bool,
    pub silent: bool,
    pub log_format: LogFormat,
    pub log_file: Option<PathBuf>,
}

impl GlobalConfig {
    /// Load `--config`, then let explicit flags and env vars override it
    pub fn from_args(args: &ConfigArgs) -> Result<Self> {
        let mut global = match &args.config {
            Some(input) => {
                let json_str = load_json_string(input)?;
                serde_json::from_str(&json_str)
                    .map_err(|e| anyhow::anyhow!("Failed to parse config JSON: {}", e))?
            }
            None => GlobalConfig::default(),
        };

        if let Some(network) = &args.network {
            global.wallet.network = network.clone();
        }
        if let Some(rpc_url) = &args.rpc_url {
            global.wallet.rpc_url = Some(rpc_url.clone());
        }
        if let Some(max_payment) = args.max_payment {
            global.wallet.max_payment = Some(max_payment);
        }
        if let Some(connect_timeout) = args.connect_timeout {
            global.wallet.connect_timeout = Some(connect_timeout);
        }
        if let Some(request_timeout) = args.request_timeout {
            global.wallet.request_timeout = Some(request_timeout);
        }

        global.verbose |= args.verbose;
        global.debug |= args.debug;
        global.quiet |= args.quiet;
        global.silent |= args.silent;
        if !matches!(args.log_format, LogFormat::Pretty) {
            global.log_format = args.log_format.clone();
        }
        if let Some(log_file) = &args.log_file {
            global.log_file = Some(log_file.clone());
        }

        Ok(global)
    }

    /// Initialize tracing/logging based on configuration.
    ///
    /// Call this once early in main() before any logging calls.
    pub fn init_tracing(&self) {
        crate::logging::init_tracing(crate::logging::TracingConfig {
            verbose: self.verbose,
            debug: self.debug,
            quiet: self.quiet,
            silent: self.silent,
            format: self.log_format.clone(),
            log_file: self.log_file.clone(),
        });
    }
}

/// Accepts inline JSON (starting with `{`) or a path to a JSON file
fn load_json_string(input: &str) -> Result<String> {
    if input.trim_start().starts_with('{') {
        return Ok(input.to_string());
    }
    let path = std::path::Path::new(input);
    std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read file '{}': {}", path.display(), e))
}
