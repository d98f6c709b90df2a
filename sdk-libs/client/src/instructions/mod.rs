pub mod ata;
pub mod system;
pub mod token;
pub mod wire;

use std::collections::HashMap;

use borsh::BorshSerialize;
use solana_sdk::{hash::hashv, instruction::AccountMeta, pubkey::Pubkey};

use crate::{
    config::WalletConfig,
    indexer::{Base58Conversions, CompressedAccount, IndexerError, ValidityProofWithContext},
};

pub use ata::{create_associated_token_account_idempotent, get_associated_token_address};

/// First eight bytes of `sha256("global:<name>")`.
pub fn anchor_discriminator(name: &str) -> [u8; 8] {
    let hash = hashv(&[b"global:", name.as_bytes()]);
    let mut discriminator = [0u8; 8];
    discriminator.copy_from_slice(&hash.to_bytes()[..8]);
    discriminator
}

/// Anchor instruction data for a handler taking a single `inputs: Vec<u8>`.
pub fn anchor_inputs_data<T: BorshSerialize>(
    discriminator: [u8; 8],
    inputs: &T,
) -> std::io::Result<Vec<u8>> {
    let mut serialized = Vec::new();
    inputs.serialize(&mut serialized)?;
    let mut data = Vec::with_capacity(8 + 4 + serialized.len());
    data.extend_from_slice(&discriminator);
    serialized.serialize(&mut data)?;
    Ok(data)
}

/// Deduplicated remaining accounts, indexed in insertion order.
#[derive(Debug, Default, Clone)]
pub struct PackedAccounts {
    indices: HashMap<Pubkey, u8>,
    order: Vec<Pubkey>,
}

impl PackedAccounts {
    pub fn insert_or_get(&mut self, pubkey: Pubkey) -> u8 {
        if let Some(index) = self.indices.get(&pubkey) {
            return *index;
        }
        let index = self.order.len() as u8;
        self.indices.insert(pubkey, index);
        self.order.push(pubkey);
        index
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn to_account_metas(&self) -> Vec<AccountMeta> {
        self.order
            .iter()
            .map(|pubkey| AccountMeta::new(*pubkey, false))
            .collect()
    }
}

/// Where an input lives and which root its proof was made against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputContext {
    pub tree: Pubkey,
    pub queue: Pubkey,
    pub leaf_index: u32,
    pub prove_by_index: bool,
    pub root_index: u16,
}

/// Pairs each selected input with its root index from `proof`.
pub fn input_contexts<'a>(
    accounts: impl IntoIterator<Item = &'a CompressedAccount>,
    proof: &ValidityProofWithContext,
    config: &WalletConfig,
) -> Result<Vec<InputContext>, IndexerError> {
    accounts
        .into_iter()
        .enumerate()
        .map(|(i, account)| {
            let queue = account
                .queue
                .or_else(|| config.queue_for_tree(&account.tree))
                .ok_or_else(|| IndexerError::UnknownStateTree(account.tree.to_base58()))?;
            let root_index = *proof.root_indices.get(i).ok_or_else(|| {
                IndexerError::InvalidResponseData(format!("no root index for input {}", i))
            })?;
            Ok(InputContext {
                tree: account.tree,
                queue,
                leaf_index: account.leaf_index,
                prove_by_index: account.prove_by_index,
                root_index,
            })
        })
        .collect()
}

/// Packs trees first, then queues, matching the programs' expected layout.
pub(crate) fn pack_merkle_contexts(
    contexts: &[InputContext],
    remaining: &mut PackedAccounts,
) -> Vec<wire::PackedMerkleContext> {
    let tree_indices: Vec<u8> = contexts
        .iter()
        .map(|ctx| remaining.insert_or_get(ctx.tree))
        .collect();
    contexts
        .iter()
        .zip(tree_indices)
        .map(|(ctx, merkle_tree_pubkey_index)| wire::PackedMerkleContext {
            merkle_tree_pubkey_index,
            nullifier_queue_pubkey_index: remaining.insert_or_get(ctx.queue),
            leaf_index: ctx.leaf_index,
            prove_by_index: ctx.prove_by_index,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{CREATE_TOKEN_POOL_DISCRIMINATOR, TRANSFER_DISCRIMINATOR};

    #[test]
    fn anchor_discriminators_match_deployed_programs() {
        assert_eq!(anchor_discriminator("transfer"), TRANSFER_DISCRIMINATOR);
        assert_eq!(
            anchor_discriminator("create_token_pool"),
            CREATE_TOKEN_POOL_DISCRIMINATOR
        );
    }

    #[test]
    fn inputs_are_length_prefixed() {
        let data = anchor_inputs_data([7u8; 8], &(1u8, 2u16)).unwrap();
        assert_eq!(&data[..8], &[7u8; 8]);
        assert_eq!(&data[8..12], &3u32.to_le_bytes());
        assert_eq!(&data[12..], &[1, 2, 0]);
    }

    #[test]
    fn packed_accounts_deduplicate() {
        let mut packed = PackedAccounts::default();
        let a = Pubkey::new_unique();
        let b = Pubkey::new_unique();
        assert_eq!(packed.insert_or_get(a), 0);
        assert_eq!(packed.insert_or_get(b), 1);
        assert_eq!(packed.insert_or_get(a), 0);
        let metas = packed.to_account_metas();
        assert_eq!(metas.len(), 2);
        assert!(metas.iter().all(|m| m.is_writable && !m.is_signer));
    }

    #[test]
    fn trees_are_packed_before_queues() {
        let tree = Pubkey::new_unique();
        let queue = Pubkey::new_unique();
        let ctx = InputContext {
            tree,
            queue,
            leaf_index: 3,
            prove_by_index: false,
            root_index: 9,
        };
        let mut packed = PackedAccounts::default();
        let contexts = pack_merkle_contexts(&[ctx, ctx], &mut packed);
        assert_eq!(packed.to_account_metas()[0].pubkey, tree);
        assert_eq!(packed.to_account_metas()[1].pubkey, queue);
        assert_eq!(contexts[1].merkle_tree_pubkey_index, 0);
        assert_eq!(contexts[1].nullifier_queue_pubkey_index, 1);
    }
}
