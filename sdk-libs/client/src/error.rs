use std::time::Duration;

use solana_sdk::{pubkey::Pubkey, signature::Signature};
use thiserror::Error;

use crate::{indexer::IndexerError, rpc::RpcError, selection::SelectionError};

/// Whether a failed action may still have moved funds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing was executed on the ledger.
    NotExecuted,
    /// The transaction may have landed; re-read the balance before retrying.
    MaybeExecuted,
}

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Compression indexer is not configured")]
    IndexerUnavailable,

    #[error("Indexer does not provide {0}")]
    CapabilityMissing(String),

    #[error("{0}")]
    InvalidAmount(String),

    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientFunds { requested: u64, available: u64 },

    #[error("Covering {requested} needs {required} inputs, at most {max} fit in one transaction")]
    TooManyInputs {
        requested: u64,
        required: usize,
        max: usize,
    },

    #[error("Validity proof expired after {attempts} attempts")]
    ProofExpired { attempts: u32 },

    #[error("Transaction {signature} was not confirmed within {elapsed:?}")]
    ConfirmationTimeout {
        signature: Signature,
        elapsed: Duration,
    },

    #[error("Transaction could not be built: {0}")]
    Assembly(String),

    #[error("Transaction rejected: {0}")]
    SubmissionRejected(String),

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Mint {0} not found")]
    MintNotFound(Pubkey),

    #[error("No token pool exists for mint {0}")]
    TokenPoolNotFound(Pubkey),

    #[error("All token pool balances for mint {0} are zero")]
    TokenPoolDepleted(Pubkey),

    #[error("Indexer error: {0}")]
    Indexer(IndexerError),

    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),
}

impl From<IndexerError> for WalletError {
    fn from(err: IndexerError) -> Self {
        match err {
            IndexerError::MethodNotFound(method) => WalletError::CapabilityMissing(method),
            other => WalletError::Indexer(other),
        }
    }
}

impl From<SelectionError> for WalletError {
    fn from(err: SelectionError) -> Self {
        match err {
            SelectionError::InvalidTarget => {
                WalletError::InvalidAmount("Amount must be greater than 0".to_string())
            }
            SelectionError::InsufficientFunds {
                requested,
                available,
            } => WalletError::InsufficientFunds {
                requested,
                available,
            },
            SelectionError::TooManyInputs {
                requested,
                required,
                max,
            } => WalletError::TooManyInputs {
                requested,
                required,
                max,
            },
        }
    }
}

impl WalletError {
    pub fn outcome(&self) -> Outcome {
        match self {
            WalletError::ConfirmationTimeout { .. } => Outcome::MaybeExecuted,
            _ => Outcome::NotExecuted,
        }
    }

    /// Retrying the same request may succeed without user action.
    pub fn is_retryable(&self) -> bool {
        match self {
            WalletError::ProofExpired { .. } => true,
            WalletError::Indexer(err) => err.is_retryable(),
            WalletError::Rpc(err) => err.is_transient(),
            _ => false,
        }
    }
}
