//! Client-side engine for holdings split between public lamports and
//! Light Protocol compressed state.
//!
//! The [`engine::CompressionEngine`] owns the ledger RPC handle, the optional
//! indexer handle, the balance cache and the refresh schedule for the current
//! owner. Every value-moving action goes through the same pipeline:
//! fetch compressed accounts, select inputs, fetch a validity proof, assemble,
//! sign, submit, confirm and refresh.

pub mod balance;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod indexer;
pub mod instructions;
pub mod mint;
pub mod proof;
pub mod rpc;
pub mod scheduler;
pub mod selection;
pub mod submit;
pub mod token_pool;
pub mod tools;
pub mod transaction;

pub use balance::{BalanceCache, BalanceSnapshot, BalanceView, RefreshOptions};
pub use config::{LightProgramIds, Network, StateTreeInfo, WalletConfig};
pub use engine::{
    ActionSigners, CompressionEngine, DynSigner, EngineStatus, PoolStatus, ReceiveAccount,
};
pub use error::{Outcome, WalletError};
pub use selection::{select, Selection, SelectionError};
pub use tools::{sol_to_lamports, ToolResponse, WalletTools};
