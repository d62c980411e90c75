use std::process::ExitCode;

use clap::Parser;

use x402_wallet::{cli, config};

const BIN_NAME: &str = "x402-wallet";

#[derive(Parser)]
#[command(name = "x402-wallet")]
#[command(about = "Pay for HTTP requests with x402 USDC micropayments")]
#[command(long_about = "\
Pay for HTTP requests with x402 USDC micropayments

When a server answers HTTP 402 Payment Required, x402-wallet signs a USDC
transfer authorization for one of the offered payment options and retries
the request once with the payment attached. Options above --max-payment are
never signed.

The private key is read from the environment (X402_PRIVATE_KEY by default).

EXAMPLES:

    export X402_PRIVATE_KEY=0x...
    x402-wallet balance
    x402-wallet --max-payment 50 get https://api.example.com/report
    x402-wallet post https://api.example.com/summarize '{\"text\":\"hello\"}'

For more details on each command, use: x402-wallet <command> --help
")]
struct Cli {
    /// Global configuration arguments
    #[command(flatten)]
    config: config::ConfigArgs,

    /// Private key configuration
    #[command(flatten)]
    key: cli::KeyArgs,

    #[command(subcommand)]
    command: cli::Commands,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let global_config = config::GlobalConfig::from_args(&cli.config)?;
    global_config.init_tracing();

    tracing::debug!("x402-wallet starting");
    cli::run(cli.command, &cli.key, &global_config, BIN_NAME).await
}
