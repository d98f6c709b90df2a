use std::fmt::Debug;

use async_trait::async_trait;
use solana_sdk::{
    account::Account, hash::Hash, pubkey::Pubkey, signature::Signature, transaction::Transaction,
};
use solana_transaction_status::TransactionStatus;

use crate::rpc::errors::RpcError;

/// The ledger side of the wallet: public balances, raw accounts, blockhashes,
/// submission and status lookups.
#[async_trait]
pub trait RpcConnection: Send + Sync + Debug + 'static {
    fn get_url(&self) -> String;

    async fn health(&self) -> Result<(), RpcError>;

    async fn get_balance(&self, pubkey: &Pubkey) -> Result<u64, RpcError>;

    async fn get_account(&self, address: Pubkey) -> Result<Option<Account>, RpcError>;

    /// Latest blockhash and the last block height it stays valid for.
    async fn get_latest_blockhash(&self) -> Result<(Hash, u64), RpcError>;

    /// Submits once. Implementations must not resend on failure.
    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature, RpcError>;

    async fn get_signature_statuses(
        &self,
        signatures: &[Signature],
    ) -> Result<Vec<Option<TransactionStatus>>, RpcError>;
}
