use std::{path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand};
use light_wallet_client::{Network, WalletConfig};
use solana_sdk::pubkey::Pubkey;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Clone, Debug)]
pub struct GlobalArgs {
    /// Cluster name (mainnet, devnet, testnet, localnet) or RPC URL.
    #[arg(long, env = "LIGHT_WALLET_RPC_URL", default_value = "devnet", global = true)]
    pub rpc_url: String,

    #[arg(long, env = "LIGHT_WALLET_INDEXER_URL", global = true)]
    pub indexer_url: Option<String>,

    #[arg(long, env = "LIGHT_WALLET_INDEXER_API_KEY", global = true)]
    pub indexer_api_key: Option<String>,

    #[arg(
        long,
        env = "LIGHT_WALLET_KEYPAIR",
        default_value = "~/.config/solana/id.json",
        global = true
    )]
    pub keypair: String,

    /// Separate fee payer. Defaults to the wallet keypair.
    #[arg(long, env = "LIGHT_WALLET_PAYER", global = true)]
    pub payer: Option<String>,

    #[arg(
        long,
        env = "LIGHT_WALLET_CONFIRM_TIMEOUT_MS",
        default_value = "60000",
        global = true
    )]
    pub confirm_timeout_ms: u64,

    #[arg(
        long,
        env = "LIGHT_WALLET_CONFIRM_POLL_MS",
        default_value = "500",
        global = true
    )]
    pub confirm_poll_ms: u64,

    #[arg(
        long,
        env = "LIGHT_WALLET_REFRESH_INTERVAL_SECS",
        default_value = "30",
        global = true
    )]
    pub refresh_interval_secs: u64,

    #[arg(
        long,
        env = "LIGHT_WALLET_PROOF_ATTEMPTS",
        default_value = "2",
        global = true
    )]
    pub proof_attempts: u32,

    #[arg(
        long,
        env = "LIGHT_WALLET_COMPUTE_UNIT_LIMIT",
        default_value = "300000",
        global = true
    )]
    pub compute_unit_limit: u32,

    #[arg(long, env = "LIGHT_WALLET_MAX_INPUTS", default_value = "4", global = true)]
    pub max_inputs: usize,

    #[arg(long, env = "LIGHT_WALLET_LOG_DIR", default_value = "logs", global = true)]
    pub log_dir: String,
}

impl GlobalArgs {
    pub fn wallet_config(&self) -> WalletConfig {
        let mut config = WalletConfig::new(Network::parse(&self.rpc_url), self.indexer_url.clone());
        config.indexer_api_key = self
            .indexer_api_key
            .clone()
            .filter(|key| !key.trim().is_empty());
        config.confirm_timeout = Duration::from_millis(self.confirm_timeout_ms);
        config.confirm_poll_interval = Duration::from_millis(self.confirm_poll_ms.max(1));
        config.refresh_interval = Duration::from_secs(self.refresh_interval_secs);
        config.proof_attempts = self.proof_attempts.max(1);
        config.compute_unit_limit = self.compute_unit_limit;
        config.max_inputs = self.max_inputs.max(1);
        config
    }

    pub fn keypair_path(&self) -> PathBuf {
        expand_home(&self.keypair)
    }

    pub fn payer_path(&self) -> Option<PathBuf> {
        self.payer.as_deref().map(expand_home)
    }
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), std::env::var_os("HOME")) {
        (Some(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => PathBuf::from(path),
    }
}

fn parse_pubkey(value: &str) -> Result<Pubkey, String> {
    Pubkey::from_str(value.trim()).map_err(|_| format!("invalid public key: {}", value))
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check that the ledger RPC and the indexer are reachable.
    Status,
    /// Public, compressed and total SOL of the wallet.
    Balance,
    /// Compress SOL from the public balance.
    Compress {
        /// Amount in SOL.
        amount: f64,
    },
    /// Decompress SOL into a public account.
    Decompress {
        amount: f64,
        #[arg(long, value_parser = parse_pubkey)]
        recipient: Option<Pubkey>,
    },
    /// Send compressed SOL.
    Transfer {
        amount: f64,
        #[arg(value_parser = parse_pubkey)]
        recipient: Pubkey,
    },
    /// Compress SPL tokens from the wallet's associated token account.
    CompressToken {
        #[arg(value_parser = parse_pubkey)]
        mint: Pubkey,
        /// Amount in base units.
        amount: u64,
        #[arg(long, value_parser = parse_pubkey)]
        recipient: Option<Pubkey>,
    },
    /// Decompress tokens into the recipient's associated token account.
    DecompressToken {
        #[arg(value_parser = parse_pubkey)]
        mint: Pubkey,
        amount: u64,
        #[arg(long, value_parser = parse_pubkey)]
        recipient: Option<Pubkey>,
    },
    /// Send compressed tokens.
    TransferToken {
        #[arg(value_parser = parse_pubkey)]
        mint: Pubkey,
        amount: u64,
        #[arg(value_parser = parse_pubkey)]
        recipient: Pubkey,
    },
    /// Register a mint with the compressed token program.
    CreateTokenPool {
        #[arg(value_parser = parse_pubkey)]
        mint: Pubkey,
    },
    /// Show or create the associated token account for a mint.
    ReceiveAccount {
        #[arg(value_parser = parse_pubkey)]
        mint: Pubkey,
        #[arg(long, value_parser = parse_pubkey)]
        recipient: Option<Pubkey>,
    },
    /// List the token pools of a mint.
    Pools {
        #[arg(value_parser = parse_pubkey)]
        mint: Pubkey,
    },
    /// Recent compression signatures of the wallet.
    History,
    /// Keep balances refreshed in the background until interrupted.
    Watch,
    /// Invoke an agent tool with JSON arguments.
    Tool {
        name: String,
        #[arg(default_value = "{}")]
        args: String,
    },
}
