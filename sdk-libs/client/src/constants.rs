use solana_sdk::{pubkey, pubkey::Pubkey};

pub const LIGHT_SYSTEM_PROGRAM_ID: Pubkey = pubkey!("SySTEM1eSU2p4BGQfQpimFEWWSC1XDFeun3Nqzz3rT7");
pub const COMPRESSED_TOKEN_PROGRAM_ID: Pubkey =
    pubkey!("cTokenmWW8bLPjZEBAUgYy3zKxQZW6VKi7bqNFEVv3m");
pub const ACCOUNT_COMPRESSION_PROGRAM_ID: Pubkey =
    pubkey!("compr6CUsB5m2jS4Y3831ztGSTnDpnKJTKS95d64XVq");
pub const NOOP_PROGRAM_ID: Pubkey = pubkey!("noopb9bkMVfRPU8AsbpTUg8AQkHtKwMYZiFUjNRtMmV");

pub const SPL_TOKEN_2022_PROGRAM_ID: Pubkey = pubkey!("TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb");
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Pubkey =
    pubkey!("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");

/// Public v1 state tree and its nullifier queue.
pub const DEFAULT_STATE_TREE: Pubkey = pubkey!("smt1NamzXdq4AMqS2fS2F1i5KTYPZRhoHgWx38d8WsT");
pub const DEFAULT_NULLIFIER_QUEUE: Pubkey = pubkey!("nfq1NvQDJ2GEgnS8zt9prAe8rjjpAW1zFkrvZoBR148");

pub const CPI_AUTHORITY_PDA_SEED: &[u8] = b"cpi_authority";
pub const SOL_POOL_PDA_SEED: &[u8] = b"sol_pool_pda";
pub const TOKEN_POOL_SEED: &[u8] = b"pool";

pub const TRANSFER_DISCRIMINATOR: [u8; 8] = [163, 52, 200, 231, 140, 3, 69, 186];
pub const CREATE_TOKEN_POOL_DISCRIMINATOR: [u8; 8] = [23, 169, 27, 122, 147, 169, 209, 152];

/// Token pools per mint: index 0 plus four additional pools.
pub const NUM_MAX_POOL_ACCOUNTS: u8 = 5;

pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Compute units attached to every wallet transaction. Proof verification
/// cost grows with the input count, so a fixed high watermark is used.
pub const DEFAULT_COMPUTE_UNIT_LIMIT: u32 = 300_000;
/// Most compressed inputs a single transfer instruction can consume.
pub const MAX_INPUT_ACCOUNTS: usize = 4;
pub const DEFAULT_PROOF_ATTEMPTS: u32 = 2;

pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_CONFIRM_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_CONFIRM_POLL_MS: u64 = 500;

pub const TOKEN_BALANCE_PAGE_LIMIT: u16 = 50;
pub const HISTORY_LIMIT: u16 = 20;

/// Byte offset of `decimals` in an SPL mint account.
pub const MINT_DECIMALS_OFFSET: usize = 44;
/// Byte offset of `amount` in an SPL token account.
pub const TOKEN_ACCOUNT_AMOUNT_OFFSET: usize = 64;

pub const NO_WALLET_LOADED: &str = "No wallet loaded";
