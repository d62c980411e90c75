pub mod account;
pub mod request;

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::config::GlobalConfig;
use crate::wallet::{create_wallet_from_env, Wallet, DEFAULT_KEY_ENV};

/// Private key configuration
#[derive(Args, Clone, Debug)]
pub struct KeyArgs {
    /// Environment variable holding the hex private key
    #[arg(long, default_value = DEFAULT_KEY_ENV, value_name = "VAR")]
    pub key_env: String,
}

impl KeyArgs {
    pub fn wallet(&self, config: &GlobalConfig) -> Result<Wallet> {
        Ok(create_wallet_from_env(Some(&self.key_env), config.wallet.clone())?)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the USDC balance of the wallet
    ///
    ///  - Only networks with a known USDC deployment are supported.
    ///
    /// Example:
    ///
    ///  $ x402-wallet balance
    ///
    ///  $ x402-wallet --network eip155:84532 balance
    ///
    Balance,

    /// Print the wallet address
    Address,

    /// GET a URL, paying if the server asks for it
    ///
    /// Example:
    ///
    ///  $ x402-wallet get https://api.example.com/weather
    ///
    ///  $ x402-wallet --max-payment 50 get -H "Accept: application/json" https://api.example.com/report
    ///
    Get(request::GetArgs),

    /// POST a JSON body to a URL, paying if the server asks for it
    ///
    /// Example:
    ///
    ///  $ x402-wallet post https://api.example.com/summarize '{"text":"hello"}'
    ///
    Post(request::PostArgs),

    /// Display version information
    ///
    /// Example output:
    ///
    ///  $ x402-wallet version
    ///
    ///  x402-wallet 0.1.0 x86_64 linux gnu dynamic release panic=unwind
    ///
    Version,
}

pub async fn run(cmd: Commands, key: &KeyArgs, config: &GlobalConfig, bin_name: &str) -> Result<()> {
    match cmd {
        Commands::Version => println!("{}", version(bin_name)),
        cmd => {
            let wallet = key.wallet(config)?;
            run_with_wallet(cmd, &wallet).await?;
            wallet.close();
        }
    }
    Ok(())
}

async fn run_with_wallet(cmd: Commands, wallet: &Wallet) -> Result<()> {
    match cmd {
        Commands::Balance => account::balance(wallet).await?,
        Commands::Address => account::address(wallet),
        Commands::Get(args) => request::get(args, wallet).await?,
        Commands::Post(args) => request::post(args, wallet).await?,
        Commands::Version => {}
    }
    Ok(())
}

/// Get version string with build details
pub fn version(name: &str) -> String {
    let build_type = if cfg!(debug_assertions) { "debug" } else { "release" };
    let panic_mode = if cfg!(panic = "abort") { "panic=abort" } else { "panic=unwind" };
    let link_mode = if cfg!(target_feature = "crt-static") { "static" } else { "dynamic" };
    let target_env = if cfg!(target_env = "gnu") { "gnu" }
        else if cfg!(target_env = "musl") { "musl" }
        else if cfg!(target_env = "msvc") { "msvc" }
        else { "unknown" };

    format!("{} {} {} {} {} {} {} {}",
        name,
        env!("CARGO_PKG_VERSION"),
        std::env::consts::ARCH,
        std::env::consts::OS,
        target_env,
        link_mode,
        build_type,
        panic_mode,
    )
}
