use std::{
    collections::HashMap,
    sync::{Arc, Mutex, Weak},
};

use futures::future::{join_all, BoxFuture};
use solana_sdk::{pubkey::Pubkey, signature::Signature};
use tracing::{debug, info, warn};

pub use crate::submit::DynSigner;
use crate::{
    balance::{
        ApplyOutcome, BalanceCache, BalanceSnapshot, BalanceView, CompressedHalf, RefreshOptions,
        TokenBalanceEntry,
    },
    config::WalletConfig,
    error::WalletError,
    indexer::{
        AccountState, CompressedAccount, CompressedTokenAccount,
        GetCompressedTokenAccountsByOwnerOptions, Indexer, IndexerRpcConfig, PaginatedOptions,
        PhotonIndexer, SignatureWithMetadata,
    },
    instructions::{
        create_associated_token_account_idempotent, get_associated_token_address,
        token::find_token_pool_pda_with_index,
    },
    mint::{MintCache, MintInfo},
    proof::{with_fresh_proof, ProofAnchor},
    rpc::{RpcConnection, SolanaRpcConnection},
    scheduler::RefreshScheduler,
    selection::select,
    submit::SubmitAndConfirm,
    token_pool::{
        get_token_pools, select_token_pool_for_compression, select_token_pools_for_decompression,
        token_account_amount, TokenPoolInfo,
    },
    transaction::{Action, Anchor, ProvedInputs, TransactionAssembler, UnsignedTransaction},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolStatus {
    Created(Signature),
    AlreadyExists,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveAccount {
    pub address: Pubkey,
    pub amount: u64,
}

/// Reachability of both backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStatus {
    pub rpc_url: String,
    pub indexer_slot: u64,
}

/// Fee payer and owner of the consumed state. Often the same key.
#[derive(Clone, Copy)]
pub struct ActionSigners<'a> {
    pub payer: &'a DynSigner,
    pub owner: &'a DynSigner,
}

impl<'a> ActionSigners<'a> {
    pub fn single(signer: &'a DynSigner) -> Self {
        Self {
            payer: signer,
            owner: signer,
        }
    }
}

/// Moves value between public and compressed state for one owner at a time
/// and keeps that owner's balances cached.
///
/// Clones share the same cache, schedule and connections.
pub struct CompressionEngine<R: RpcConnection, I: Indexer> {
    inner: Arc<EngineInner<R, I>>,
}

impl<R: RpcConnection, I: Indexer> Clone for CompressionEngine<R, I> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct EngineInner<R: RpcConnection, I: Indexer> {
    rpc: Arc<R>,
    indexer: Option<Arc<I>>,
    config: WalletConfig,
    cache: BalanceCache,
    scheduler: RefreshScheduler,
    mints: MintCache,
    owner_locks: OwnerLocks,
}

impl CompressionEngine<SolanaRpcConnection, PhotonIndexer> {
    /// Connects to the ledger RPC and, when configured, the Photon indexer.
    pub fn from_config(config: WalletConfig) -> Self {
        let rpc = SolanaRpcConnection::new_with_retry(
            config.rpc_url.clone(),
            Some(config.commitment),
            Some(config.rpc_retry.clone()),
        );
        let indexer = config.indexer_url.clone().map(|url| {
            PhotonIndexer::new(url, config.indexer_api_key.clone())
                .with_retry_config(config.indexer_retry.clone())
        });
        Self::new(rpc, indexer, config)
    }
}

impl<R: RpcConnection, I: Indexer> CompressionEngine<R, I> {
    pub fn new(rpc: R, indexer: Option<I>, config: WalletConfig) -> Self {
        Self::with_shared(Arc::new(rpc), indexer.map(Arc::new), config)
    }

    pub fn with_shared(rpc: Arc<R>, indexer: Option<Arc<I>>, config: WalletConfig) -> Self {
        if indexer.is_none() {
            warn!("No compression indexer configured, compressed state is unavailable");
        }
        Self {
            inner: Arc::new(EngineInner {
                rpc,
                indexer,
                config,
                cache: BalanceCache::new(),
                scheduler: RefreshScheduler::new(),
                mints: MintCache::default(),
                owner_locks: OwnerLocks::default(),
            }),
        }
    }

    pub fn config(&self) -> &WalletConfig {
        &self.inner.config
    }

    pub fn rpc(&self) -> &Arc<R> {
        &self.inner.rpc
    }

    pub fn cache(&self) -> &BalanceCache {
        &self.inner.cache
    }

    pub fn has_indexer(&self) -> bool {
        self.inner.indexer.is_some()
    }

    pub fn owner(&self) -> Option<Pubkey> {
        self.inner.cache.owner()
    }

    pub fn snapshot(&self) -> Arc<BalanceSnapshot> {
        self.inner.cache.snapshot()
    }

    pub fn is_refresh_scheduled(&self) -> bool {
        self.inner.scheduler.is_scheduled()
    }

    /// Probes the ledger RPC and the indexer.
    pub async fn status(&self) -> Result<EngineStatus, WalletError> {
        let indexer = self.inner.indexer()?;
        self.inner.rpc.health().await?;
        indexer.get_indexer_health().await?;
        let indexer_slot = indexer.get_indexer_slot(None).await?;
        Ok(EngineStatus {
            rpc_url: self.inner.rpc.get_url(),
            indexer_slot,
        })
    }

    /// Total, public and compressed balance of the current owner.
    pub fn get_total_balance(&self) -> BalanceView {
        self.inner.cache.view()
    }

    /// Switches to `owner`, refreshing immediately. `None` logs out.
    pub async fn set_owner(&self, owner: Option<Pubkey>) {
        self.refresh(owner, RefreshOptions::loud()).await
    }

    /// Refreshes the balances of `owner` and schedules the next tick.
    ///
    /// `None` clears the cache and cancels the pending tick.
    pub async fn refresh(&self, owner: Option<Pubkey>, options: RefreshOptions) {
        match owner {
            Some(owner) => {
                self.inner.refresh_owner(owner, options, None).await;
            }
            None => {
                self.inner.scheduler.cancel();
                self.inner.cache.clear();
                debug!("Balance cache cleared");
            }
        }
    }

    pub async fn compress_sol(
        &self,
        signers: ActionSigners<'_>,
        amount: u64,
    ) -> Result<Signature, WalletError> {
        let inner = self.inner.as_ref();
        inner.indexer()?;
        check_amount(amount)?;
        let owner = signers.owner.pubkey();
        let _guard = inner.owner_locks.acquire(owner).await;

        let anchor = inner.latest_anchor().await?;
        let tx = TransactionAssembler::new(&inner.config).build(
            Action::Compress {
                amount,
                recipient: owner,
            },
            Vec::new(),
            signers.payer.pubkey(),
            owner,
            anchor,
        )?;
        let result = inner.submit(&tx, signers).await;
        self.inner.after_action(owner, &result).await;
        result.map(|(signature, _)| signature)
    }

    pub async fn decompress_sol(
        &self,
        signers: ActionSigners<'_>,
        amount: u64,
        recipient: Pubkey,
    ) -> Result<Signature, WalletError> {
        let inner = self.inner.as_ref();
        let indexer = inner.indexer()?;
        check_amount(amount)?;
        let owner = signers.owner.pubkey();
        let payer = signers.payer.pubkey();
        let _guard = inner.owner_locks.acquire(owner).await;

        let result = with_fresh_proof(inner.config.proof_attempts, move |attempt| async move {
            debug!("decompress attempt {}", attempt);
            let accounts = inner.compressed_accounts(indexer, &owner).await?;
            let selection = select(&accounts, amount, inner.config.max_inputs)?;
            let proof = ProofAnchor::new(indexer.clone())
                .get_proof(selection.hashes())
                .await?;
            let anchor = inner.latest_anchor().await?;
            let tx = TransactionAssembler::new(&inner.config).build(
                Action::Decompress {
                    amount,
                    recipient,
                    inputs: ProvedInputs {
                        selection: &selection,
                        proof: &proof,
                    },
                },
                Vec::new(),
                payer,
                owner,
                anchor,
            )?;
            inner.submit(&tx, signers).await
        })
        .await;
        self.inner.after_action(owner, &result).await;
        result.map(|(signature, _)| signature)
    }

    /// Transfers compressed SOL, keeping it compressed.
    pub async fn transfer_sol(
        &self,
        signers: ActionSigners<'_>,
        amount: u64,
        recipient: Pubkey,
    ) -> Result<Signature, WalletError> {
        let inner = self.inner.as_ref();
        let indexer = inner.indexer()?;
        check_amount(amount)?;
        let owner = signers.owner.pubkey();
        let payer = signers.payer.pubkey();
        let _guard = inner.owner_locks.acquire(owner).await;

        let result = with_fresh_proof(inner.config.proof_attempts, move |attempt| async move {
            debug!("transfer attempt {}", attempt);
            let accounts = inner.compressed_accounts(indexer, &owner).await?;
            let selection = select(&accounts, amount, inner.config.max_inputs)?;
            let proof = ProofAnchor::new(indexer.clone())
                .get_proof(selection.hashes())
                .await?;
            let anchor = inner.latest_anchor().await?;
            let tx = TransactionAssembler::new(&inner.config).build(
                Action::Transfer {
                    amount,
                    recipient,
                    inputs: ProvedInputs {
                        selection: &selection,
                        proof: &proof,
                    },
                },
                Vec::new(),
                payer,
                owner,
                anchor,
            )?;
            inner.submit(&tx, signers).await
        })
        .await;
        self.inner.after_action(owner, &result).await;
        result.map(|(signature, _)| signature)
    }

    /// Moves `amount` from the owner's associated token account into
    /// compressed token state owned by `recipient`.
    pub async fn compress_token(
        &self,
        signers: ActionSigners<'_>,
        mint: Pubkey,
        amount: u64,
        recipient: Pubkey,
    ) -> Result<Signature, WalletError> {
        let inner = self.inner.as_ref();
        inner.indexer()?;
        check_amount(amount)?;
        let owner = signers.owner.pubkey();
        let _guard = inner.owner_locks.acquire(owner).await;

        let pools = get_token_pools(inner.rpc.as_ref(), &inner.config.programs, &mint).await?;
        let pool = select_token_pool_for_compression(&mint, &pools)?;
        let source = get_associated_token_address(&owner, &mint, &pool.token_program);
        let available = inner
            .rpc
            .get_account(source)
            .await?
            .and_then(|account| token_account_amount(&account.data))
            .unwrap_or(0);
        if available < amount {
            return Err(WalletError::InsufficientFunds {
                requested: amount,
                available,
            });
        }

        let anchor = inner.latest_anchor().await?;
        let tx = TransactionAssembler::new(&inner.config).build(
            Action::CompressToken {
                mint,
                amount,
                recipient,
                source,
                pool: &pool,
            },
            Vec::new(),
            signers.payer.pubkey(),
            owner,
            anchor,
        )?;
        let result = inner.submit(&tx, signers).await;
        self.inner.after_action(owner, &result).await;
        result.map(|(signature, _)| signature)
    }

    /// Releases compressed tokens into the associated token account of
    /// `recipient`, creating it when missing.
    pub async fn decompress_token(
        &self,
        signers: ActionSigners<'_>,
        mint: Pubkey,
        amount: u64,
        recipient: Pubkey,
    ) -> Result<Signature, WalletError> {
        let inner = self.inner.as_ref();
        let indexer = inner.indexer()?;
        check_amount(amount)?;
        let owner = signers.owner.pubkey();
        let payer = signers.payer.pubkey();
        let _guard = inner.owner_locks.acquire(owner).await;

        let result = with_fresh_proof(inner.config.proof_attempts, move |attempt| async move {
            debug!("decompress_token attempt {}", attempt);
            let accounts = inner.token_accounts(indexer, &owner, &mint).await?;
            let selection = select(&accounts, amount, inner.config.max_inputs)?;

            let pools = get_token_pools(inner.rpc.as_ref(), &inner.config.programs, &mint).await?;
            let pools = select_token_pools_for_decompression(&mint, &pools, amount)?;
            let token_program = token_program_of(&mint, &pools)?;
            let destination = get_associated_token_address(&recipient, &mint, &token_program);
            let mut setup = Vec::new();
            if inner.rpc.get_account(destination).await?.is_none() {
                debug!("Creating associated token account {} for {}", destination, recipient);
                setup.push(create_associated_token_account_idempotent(
                    &payer,
                    &recipient,
                    &mint,
                    &token_program,
                ));
            }

            let proof = ProofAnchor::new(indexer.clone())
                .get_proof(selection.hashes())
                .await?;
            let anchor = inner.latest_anchor().await?;
            let tx = TransactionAssembler::new(&inner.config).build(
                Action::DecompressToken {
                    mint,
                    amount,
                    destination,
                    pools: &pools,
                    inputs: ProvedInputs {
                        selection: &selection,
                        proof: &proof,
                    },
                },
                setup,
                payer,
                owner,
                anchor,
            )?;
            inner.submit(&tx, signers).await
        })
        .await;
        self.inner.after_action(owner, &result).await;
        result.map(|(signature, _)| signature)
    }

    pub async fn transfer_token(
        &self,
        signers: ActionSigners<'_>,
        mint: Pubkey,
        amount: u64,
        recipient: Pubkey,
    ) -> Result<Signature, WalletError> {
        let inner = self.inner.as_ref();
        let indexer = inner.indexer()?;
        check_amount(amount)?;
        let owner = signers.owner.pubkey();
        let payer = signers.payer.pubkey();
        let _guard = inner.owner_locks.acquire(owner).await;

        let result = with_fresh_proof(inner.config.proof_attempts, move |attempt| async move {
            debug!("transfer_token attempt {}", attempt);
            let accounts = inner.token_accounts(indexer, &owner, &mint).await?;
            let selection = select(&accounts, amount, inner.config.max_inputs)?;
            let proof = ProofAnchor::new(indexer.clone())
                .get_proof(selection.hashes())
                .await?;
            let anchor = inner.latest_anchor().await?;
            let tx = TransactionAssembler::new(&inner.config).build(
                Action::TransferToken {
                    mint,
                    amount,
                    recipient,
                    inputs: ProvedInputs {
                        selection: &selection,
                        proof: &proof,
                    },
                },
                Vec::new(),
                payer,
                owner,
                anchor,
            )?;
            inner.submit(&tx, signers).await
        })
        .await;
        self.inner.after_action(owner, &result).await;
        result.map(|(signature, _)| signature)
    }

    /// Registers pool 0 for `mint`. An existing pool is not an error.
    pub async fn create_token_pool(
        &self,
        payer: &DynSigner,
        mint: Pubkey,
    ) -> Result<PoolStatus, WalletError> {
        let inner = self.inner.as_ref();
        inner.indexer()?;
        let mint_info = inner.mint(&mint).await?;
        let (pool, _) = find_token_pool_pda_with_index(&inner.config.programs, &mint, 0);
        if inner.rpc.get_account(pool).await?.is_some() {
            info!("Token pool {} for mint {} already exists", pool, mint);
            return Ok(PoolStatus::AlreadyExists);
        }

        let anchor = inner.latest_anchor().await?;
        let tx = TransactionAssembler::new(&inner.config).build(
            Action::CreateTokenPool {
                mint,
                token_program: mint_info.token_program,
            },
            Vec::new(),
            payer.pubkey(),
            payer.pubkey(),
            anchor,
        )?;
        match inner.submit(&tx, ActionSigners::single(payer)).await {
            Ok((signature, _)) => Ok(PoolStatus::Created(signature)),
            Err(WalletError::SubmissionRejected(message)) if message.contains("already in use") => {
                info!("Token pool for mint {} was created concurrently", mint);
                Ok(PoolStatus::AlreadyExists)
            }
            Err(err) => Err(err),
        }
    }

    /// Returns the associated token account of `recipient` for `mint`,
    /// creating it first if it does not exist.
    pub async fn get_or_create_receive_account(
        &self,
        payer: &DynSigner,
        mint: Pubkey,
        recipient: Pubkey,
    ) -> Result<ReceiveAccount, WalletError> {
        let inner = self.inner.as_ref();
        let mint_info = inner.mint(&mint).await?;
        let address = get_associated_token_address(&recipient, &mint, &mint_info.token_program);
        if let Some(account) = inner.rpc.get_account(address).await? {
            return Ok(ReceiveAccount {
                address,
                amount: token_account_amount(&account.data).unwrap_or(0),
            });
        }

        let anchor = inner.latest_anchor().await?;
        let tx = TransactionAssembler::new(&inner.config).build(
            Action::CreateReceiveAccount {
                owner: recipient,
                mint,
                token_program: mint_info.token_program,
            },
            Vec::new(),
            payer.pubkey(),
            payer.pubkey(),
            anchor,
        )?;
        let (signature, _) = inner.submit(&tx, ActionSigners::single(payer)).await?;
        info!("Created receive account {} in {}", address, signature);
        Ok(ReceiveAccount { address, amount: 0 })
    }

    pub async fn get_token_pools(&self, mint: Pubkey) -> Result<Vec<TokenPoolInfo>, WalletError> {
        get_token_pools(self.inner.rpc.as_ref(), &self.inner.config.programs, &mint).await
    }

    pub async fn get_mint(&self, mint: Pubkey) -> Result<MintInfo, WalletError> {
        self.inner.mint(&mint).await
    }

    /// Most recent compression signatures of `owner`, newest first.
    pub async fn history(&self, owner: Pubkey) -> Result<Vec<SignatureWithMetadata>, WalletError> {
        let indexer = self.inner.indexer()?;
        let response = indexer
            .get_compression_signatures_for_owner(
                &owner,
                Some(PaginatedOptions::with_limit(self.inner.config.history_limit)),
                None,
            )
            .await?;
        Ok(response.value.items)
    }
}

fn check_amount(amount: u64) -> Result<(), WalletError> {
    if amount == 0 {
        return Err(WalletError::InvalidAmount(
            "Amount must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

fn token_program_of(mint: &Pubkey, pools: &[TokenPoolInfo]) -> Result<Pubkey, WalletError> {
    pools
        .first()
        .map(|pool| pool.token_program)
        .ok_or(WalletError::TokenPoolNotFound(*mint))
}

type LockMap = Mutex<HashMap<Pubkey, Arc<tokio::sync::Mutex<()>>>>;

/// One async lock per owner with an action in flight.
#[derive(Default)]
struct OwnerLocks {
    locks: LockMap,
}

impl OwnerLocks {
    async fn acquire(&self, owner: Pubkey) -> OwnerGuard<'_> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            locks.entry(owner).or_default().clone()
        };
        let guard = lock.lock_owned().await;
        OwnerGuard {
            locks: &self.locks,
            owner,
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

/// Releases the owner's lock and drops its entry once nobody else holds or
/// waits on it.
struct OwnerGuard<'a> {
    locks: &'a LockMap,
    owner: Pubkey,
    guard: Option<tokio::sync::OwnedMutexGuard<()>>,
}

impl Drop for OwnerGuard<'_> {
    fn drop(&mut self) {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        drop(self.guard.take());
        if locks
            .get(&self.owner)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.owner);
        }
    }
}

impl<R: RpcConnection, I: Indexer> EngineInner<R, I> {
    fn indexer(&self) -> Result<&Arc<I>, WalletError> {
        self.indexer.as_ref().ok_or(WalletError::IndexerUnavailable)
    }

    async fn mint(&self, mint: &Pubkey) -> Result<MintInfo, WalletError> {
        self.mints.get(self.rpc.as_ref(), mint).await
    }

    async fn latest_anchor(&self) -> Result<Anchor, WalletError> {
        let (blockhash, last_valid_block_height) = self.rpc.get_latest_blockhash().await?;
        Ok(Anchor {
            blockhash,
            last_valid_block_height,
        })
    }

    async fn submit(
        &self,
        tx: &UnsignedTransaction,
        signers: ActionSigners<'_>,
    ) -> Result<(Signature, u64), WalletError> {
        let submitter = SubmitAndConfirm::new(
            self.rpc.as_ref(),
            self.config.confirm_timeout,
            self.config.confirm_poll_interval,
        );
        let available: [&DynSigner; 2] = [signers.payer, signers.owner];
        submitter.send_and_confirm(tx, &available).await
    }

    /// Every spendable compressed SOL account of `owner`, across all pages.
    async fn compressed_accounts(
        &self,
        indexer: &Arc<I>,
        owner: &Pubkey,
    ) -> Result<Vec<CompressedAccount>, WalletError> {
        let mut accounts = Vec::new();
        let mut cursor = None;
        loop {
            let page = indexer
                .get_compressed_accounts_by_owner(
                    owner,
                    Some(PaginatedOptions::after(cursor.take())),
                    None,
                )
                .await?
                .value;
            accounts.extend(
                page.items
                    .into_iter()
                    .filter(|account| account.data.as_ref().map_or(true, |d| d.data.is_empty())),
            );
            match page.cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        debug!("{} compressed accounts for {}", accounts.len(), owner);
        Ok(accounts)
    }

    /// Every spendable compressed token account of `owner` for `mint`.
    async fn token_accounts(
        &self,
        indexer: &Arc<I>,
        owner: &Pubkey,
        mint: &Pubkey,
    ) -> Result<Vec<CompressedTokenAccount>, WalletError> {
        let mut accounts = Vec::new();
        let mut cursor = None;
        loop {
            let page = indexer
                .get_compressed_token_accounts_by_owner(
                    owner,
                    Some(GetCompressedTokenAccountsByOwnerOptions::for_mint(
                        *mint,
                        cursor.take(),
                    )),
                    None,
                )
                .await?
                .value;
            accounts.extend(page.items.into_iter().filter(|account| {
                account.token.mint == *mint && account.token.state != AccountState::Frozen
            }));
            match page.cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        debug!(
            "{} compressed token accounts of mint {} for {}",
            accounts.len(),
            mint,
            owner
        );
        Ok(accounts)
    }

    async fn fetch_compressed(
        &self,
        owner: &Pubkey,
        min_slot: Option<u64>,
    ) -> Result<CompressedHalf, WalletError> {
        let indexer = self.indexer()?;
        let config =
            min_slot.map(|slot| IndexerRpcConfig::at_slot(slot, self.config.indexer_retry.clone()));
        let (lamports, tokens) = futures::join!(
            indexer.get_compressed_balance_by_owner(owner, config.clone()),
            indexer.get_compressed_token_balances_by_owner(
                owner,
                Some(PaginatedOptions::with_limit(self.config.token_balance_limit)),
                config,
            )
        );
        let lamports = lamports?.value;
        let tokens = tokens?.value.items;

        let decimals = join_all(tokens.iter().map(|token| async move {
            match self.mint(&token.mint).await {
                Ok(info) => Some(info.decimals),
                Err(err) => {
                    debug!("Decimals of mint {} unavailable: {}", token.mint, err);
                    None
                }
            }
        }))
        .await;
        let token_balances = tokens
            .into_iter()
            .zip(decimals)
            .map(|(token, decimals)| TokenBalanceEntry {
                mint: token.mint,
                balance: token.balance,
                decimals,
            })
            .collect();
        Ok(CompressedHalf {
            lamports,
            token_balances,
        })
    }

    async fn refresh_owner(
        self: &Arc<Self>,
        owner: Pubkey,
        options: RefreshOptions,
        min_slot: Option<u64>,
    ) {
        self.cache.set_owner(Some(owner));
        let ticket = self.cache.begin_fetch(owner, options);
        let (public, compressed) = futures::join!(
            self.rpc.get_balance(&owner),
            self.fetch_compressed(&owner, min_slot)
        );
        let outcome = self.cache.apply(
            ticket,
            public.map_err(|err| err.to_string()),
            compressed.map_err(|err| err.to_string()),
        );
        debug!("Balance refresh {} for {}: {:?}", ticket.seq, owner, outcome);
        if outcome != ApplyOutcome::Discarded {
            self.scheduler.schedule(
                owner,
                self.config.refresh_interval,
                Self::tick(Arc::downgrade(self), owner),
            );
        }
    }

    fn tick(engine: Weak<Self>, owner: Pubkey) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            let Some(engine) = engine.upgrade() else {
                return;
            };
            if engine.cache.owner() == Some(owner) {
                engine
                    .refresh_owner(owner, RefreshOptions::silent(), None)
                    .await;
            }
        })
    }

    /// Refreshes after an action: loudly on success, silently after a
    /// confirmation timeout, since the transfer may still land.
    async fn after_action(
        self: &Arc<Self>,
        owner: Pubkey,
        result: &Result<(Signature, u64), WalletError>,
    ) {
        if self.cache.owner() != Some(owner) {
            return;
        }
        match result {
            Ok((_, slot)) => {
                self.refresh_owner(owner, RefreshOptions::loud(), Some(*slot))
                    .await
            }
            Err(WalletError::ConfirmationTimeout { .. }) => {
                self.refresh_owner(owner, RefreshOptions::silent(), None)
                    .await
            }
            Err(_) => {}
        }
    }
}
