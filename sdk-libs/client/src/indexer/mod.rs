pub mod photon_indexer;

mod base58;
mod config;
mod error;
mod indexer_trait;
mod options;
mod response;
mod types;

pub use base58::{decode_base58_option_to_pubkey, decode_base58_to_fixed_array, Base58Conversions};
pub use config::{IndexerRpcConfig, RetryConfig};
pub use error::{is_stale_root_message, IndexerError};
pub use indexer_trait::{
    AccountsResult, BalanceResult, Indexer, ProofResult, SignaturesResult, TokenAccountsResult,
    TokenBalancesResult,
};
pub use options::{GetCompressedTokenAccountsByOwnerOptions, PaginatedOptions};
pub use photon_indexer::PhotonIndexer;
pub use response::{Context, ItemsWithCursor, Response};
pub use types::{
    AccountState, CompressedAccount, CompressedAccountData, CompressedProof,
    CompressedTokenAccount, Hash, SignatureWithMetadata, TokenBalance, TokenData,
    ValidityProofWithContext,
};
