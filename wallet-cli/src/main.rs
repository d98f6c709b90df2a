use clap::Parser;
use tracing::{debug, error};

mod cli;
mod commands;
mod telemetry;

use cli::{Cli, Commands};
use commands::{Engine, Wallet};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    telemetry::setup_telemetry(&cli.global.log_dir);

    let config = cli.global.wallet_config();
    debug!(
        "rpc {} indexer {:?}",
        config.rpc_url,
        config.indexer_url.as_deref()
    );
    let engine = Engine::from_config(config);

    let result = match cli.command {
        Commands::Status => commands::status(&engine).await,
        command => match Wallet::load(&cli.global) {
            Ok(wallet) => commands::run(command, engine, wallet).await,
            Err(e) => Err(e),
        },
    };
    if let Err(e) = result {
        error!("{:#}", e);
        return Err(e);
    }
    Ok(())
}
