use borsh::BorshSerialize;
use solana_sdk::pubkey::Pubkey;

pub type Hash = [u8; 32];

#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize)]
pub struct CompressedProof {
    pub a: [u8; 32],
    pub b: [u8; 64],
    pub c: [u8; 32],
}

impl Default for CompressedProof {
    fn default() -> Self {
        Self {
            a: [0; 32],
            b: [0; 64],
            c: [0; 32],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompressedAccountData {
    pub discriminator: [u8; 8],
    pub data: Vec<u8>,
    pub data_hash: [u8; 32],
}

/// A compressed account as reported by the indexer. The `hash` is the leaf
/// commitment that gets nullified when the account is consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedAccount {
    pub hash: Hash,
    pub owner: Pubkey,
    pub lamports: u64,
    pub address: Option<[u8; 32]>,
    pub data: Option<CompressedAccountData>,
    pub tree: Pubkey,
    /// Present when the indexer reports it; otherwise resolved from the
    /// wallet's known trees.
    pub queue: Option<Pubkey>,
    pub leaf_index: u32,
    pub prove_by_index: bool,
    pub slot_created: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccountState {
    #[default]
    Initialized,
    Frozen,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenData {
    pub mint: Pubkey,
    pub owner: Pubkey,
    pub amount: u64,
    pub delegate: Option<Pubkey>,
    pub state: AccountState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedTokenAccount {
    pub account: CompressedAccount,
    pub token: TokenData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBalance {
    pub mint: Pubkey,
    pub balance: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SignatureWithMetadata {
    pub block_time: u64,
    pub signature: String,
    pub slot: u64,
}

/// Proof for a set of input hashes. All vectors are in the order of the
/// requested hashes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidityProofWithContext {
    /// `None` when every input can be proven by index.
    pub proof: Option<CompressedProof>,
    pub root_indices: Vec<u16>,
    pub leaf_indices: Vec<u32>,
    pub leaves: Vec<Hash>,
    pub merkle_trees: Vec<Pubkey>,
    pub roots: Vec<Hash>,
}
