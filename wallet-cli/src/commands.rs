use std::{path::Path, sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use light_wallet_client::{
    indexer::PhotonIndexer, rpc::SolanaRpcConnection, sol_to_lamports, ActionSigners,
    BalanceView, CompressionEngine, DynSigner, PoolStatus, WalletTools,
};
use solana_sdk::{
    pubkey::Pubkey,
    signature::{read_keypair_file, Keypair, Signature},
    signer::Signer,
};
use tracing::{debug, info};

use crate::cli::{Commands, GlobalArgs};

pub type Engine = CompressionEngine<SolanaRpcConnection, PhotonIndexer>;

/// Wallet key and optional separate fee payer.
pub struct Wallet {
    pub owner: Arc<Keypair>,
    pub payer: Option<Keypair>,
}

impl Wallet {
    pub fn load(args: &GlobalArgs) -> Result<Self> {
        let owner = read_keypair(&args.keypair_path())?;
        let payer = args
            .payer_path()
            .map(|path| read_keypair(&path))
            .transpose()?;
        Ok(Self {
            owner: Arc::new(owner),
            payer,
        })
    }

    pub fn pubkey(&self) -> Pubkey {
        self.owner.pubkey()
    }

    fn signers(&self) -> ActionSigners<'_> {
        let owner: &DynSigner = self.owner.as_ref();
        match &self.payer {
            Some(payer) => ActionSigners { payer, owner },
            None => ActionSigners::single(owner),
        }
    }

    fn payer(&self) -> &DynSigner {
        match &self.payer {
            Some(payer) => payer as &DynSigner,
            None => self.owner.as_ref(),
        }
    }
}

fn read_keypair(path: &Path) -> Result<Keypair> {
    read_keypair_file(path)
        .map_err(|e| anyhow!("failed to read keypair {}: {}", path.display(), e))
}

fn print_view(view: &BalanceView) {
    println!(
        "Total: {:.4} SOL (Public: {:.4}, Compressed: {:.4})",
        view.total_sol(),
        view.public_sol(),
        view.compressed_sol()
    );
    if let Some(error) = &view.error {
        println!("Compressed balance unavailable: {}", error);
    }
}

fn print_signature(action: &str, signature: &Signature) {
    println!("{} confirmed: {}", action, signature);
}

pub async fn run(command: Commands, engine: Engine, wallet: Wallet) -> Result<()> {
    let owner = wallet.pubkey();
    debug!("Running {:?} for {}", command, owner);
    engine.set_owner(Some(owner)).await;

    match command {
        Commands::Status => status(&engine).await?,
        Commands::Balance => {
            print_view(&engine.get_total_balance());
            for token in &engine.snapshot().token_balances {
                match token.ui_amount() {
                    Some(amount) => println!("  {}: {}", token.mint, amount),
                    None => println!("  {}: {} (base units)", token.mint, token.balance),
                }
            }
        }
        Commands::Compress { amount } => {
            let lamports = sol_to_lamports(amount)?;
            let signature = engine.compress_sol(wallet.signers(), lamports).await?;
            print_signature("Compress", &signature);
            print_view(&engine.get_total_balance());
        }
        Commands::Decompress { amount, recipient } => {
            let lamports = sol_to_lamports(amount)?;
            let signature = engine
                .decompress_sol(wallet.signers(), lamports, recipient.unwrap_or(owner))
                .await?;
            print_signature("Decompress", &signature);
            print_view(&engine.get_total_balance());
        }
        Commands::Transfer { amount, recipient } => {
            let lamports = sol_to_lamports(amount)?;
            let signature = engine
                .transfer_sol(wallet.signers(), lamports, recipient)
                .await?;
            print_signature("Transfer", &signature);
            print_view(&engine.get_total_balance());
        }
        Commands::CompressToken {
            mint,
            amount,
            recipient,
        } => {
            let signature = engine
                .compress_token(wallet.signers(), mint, amount, recipient.unwrap_or(owner))
                .await?;
            print_signature("Token compress", &signature);
        }
        Commands::DecompressToken {
            mint,
            amount,
            recipient,
        } => {
            let signature = engine
                .decompress_token(wallet.signers(), mint, amount, recipient.unwrap_or(owner))
                .await?;
            print_signature("Token decompress", &signature);
        }
        Commands::TransferToken {
            mint,
            amount,
            recipient,
        } => {
            let signature = engine
                .transfer_token(wallet.signers(), mint, amount, recipient)
                .await?;
            print_signature("Token transfer", &signature);
        }
        Commands::CreateTokenPool { mint } => {
            match engine.create_token_pool(wallet.payer(), mint).await? {
                PoolStatus::Created(signature) => print_signature("Token pool creation", &signature),
                PoolStatus::AlreadyExists => println!("Token pool for {} already exists", mint),
            }
        }
        Commands::ReceiveAccount { mint, recipient } => {
            let account = engine
                .get_or_create_receive_account(wallet.payer(), mint, recipient.unwrap_or(owner))
                .await?;
            println!("{} (balance {})", account.address, account.amount);
        }
        Commands::Pools { mint } => {
            let pools = engine.get_token_pools(mint).await?;
            for pool in pools {
                println!(
                    "#{} {} initialized={} balance={}",
                    pool.pool_index, pool.pool_pda, pool.is_initialized, pool.balance
                );
            }
        }
        Commands::History => {
            for entry in engine.history(owner).await? {
                println!("{} slot={} time={}", entry.signature, entry.slot, entry.block_time);
            }
        }
        Commands::Watch => watch(&engine).await?,
        Commands::Tool { name, args } => {
            let args: serde_json::Value =
                serde_json::from_str(&args).context("tool arguments must be JSON")?;
            let signer: Arc<DynSigner> = wallet.owner.clone();
            let tools = WalletTools::new(engine.clone(), Some(signer));
            let response = tools.call(&name, &args).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    engine.set_owner(None).await;
    Ok(())
}

pub async fn status(engine: &Engine) -> Result<()> {
    let status = engine.status().await?;
    println!(
        "RPC {} reachable, indexer at slot {}",
        status.rpc_url, status.indexer_slot
    );
    Ok(())
}

/// Prints the balance whenever a background refresh changes it.
async fn watch(engine: &Engine) -> Result<()> {
    let mut last = engine.get_total_balance();
    print_view(&last);
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("failed to listen for ctrl-c")?;
                info!("Stopping balance watch");
                return Ok(());
            }
            _ = interval.tick() => {
                let view = engine.get_total_balance();
                if view != last {
                    print_view(&view);
                    last = view;
                }
            }
        }
    }
}
