use std::fmt::Debug;

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;

use super::{
    CompressedAccount, CompressedTokenAccount, GetCompressedTokenAccountsByOwnerOptions, Hash,
    IndexerError, IndexerRpcConfig, ItemsWithCursor, PaginatedOptions, Response, RetryConfig,
    SignatureWithMetadata, TokenBalance, ValidityProofWithContext,
};

pub type BalanceResult = Response<u64>;
pub type TokenBalancesResult = Response<ItemsWithCursor<TokenBalance>>;
pub type AccountsResult = Response<ItemsWithCursor<CompressedAccount>>;
pub type TokenAccountsResult = Response<ItemsWithCursor<CompressedTokenAccount>>;
pub type ProofResult = Response<ValidityProofWithContext>;
pub type SignaturesResult = Response<ItemsWithCursor<SignatureWithMetadata>>;

/// Read access to the compression indexer. Implementations provide every
/// method; a backend lacking one reports `IndexerError::MethodNotFound`.
#[async_trait]
pub trait Indexer: Send + Sync + Debug + 'static {
    /// Total lamports held in compressed accounts owned by `owner`.
    async fn get_compressed_balance_by_owner(
        &self,
        owner: &Pubkey,
        config: Option<IndexerRpcConfig>,
    ) -> Result<BalanceResult, IndexerError>;

    async fn get_compressed_token_balances_by_owner(
        &self,
        owner: &Pubkey,
        options: Option<PaginatedOptions>,
        config: Option<IndexerRpcConfig>,
    ) -> Result<TokenBalancesResult, IndexerError>;

    async fn get_compressed_accounts_by_owner(
        &self,
        owner: &Pubkey,
        options: Option<PaginatedOptions>,
        config: Option<IndexerRpcConfig>,
    ) -> Result<AccountsResult, IndexerError>;

    async fn get_compressed_token_accounts_by_owner(
        &self,
        owner: &Pubkey,
        options: Option<GetCompressedTokenAccountsByOwnerOptions>,
        config: Option<IndexerRpcConfig>,
    ) -> Result<TokenAccountsResult, IndexerError>;

    /// Fresh proof that `hashes` exist under current roots. Never cache the
    /// result: the roots it references may be superseded at any time.
    async fn get_validity_proof(
        &self,
        hashes: Vec<Hash>,
        config: Option<IndexerRpcConfig>,
    ) -> Result<ProofResult, IndexerError>;

    async fn get_compression_signatures_for_owner(
        &self,
        owner: &Pubkey,
        options: Option<PaginatedOptions>,
        config: Option<IndexerRpcConfig>,
    ) -> Result<SignaturesResult, IndexerError>;

    async fn get_indexer_slot(&self, config: Option<RetryConfig>) -> Result<u64, IndexerError>;

    async fn get_indexer_health(&self) -> Result<(), IndexerError>;
}
