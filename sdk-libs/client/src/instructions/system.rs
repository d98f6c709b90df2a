use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    system_program,
};

use super::{
    anchor_discriminator, anchor_inputs_data, pack_merkle_contexts,
    wire::{
        CompressedAccount, CompressedAccountData, InstructionDataInvoke,
        OutputCompressedAccountWithPackedContext, PackedCompressedAccountWithMerkleContext,
    },
    InputContext, PackedAccounts,
};
use crate::{
    config::LightProgramIds,
    indexer::{self, CompressedProof},
};

/// Lamport movement carried by an invoke instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LamportsFlow {
    /// Debit the fee payer into the SOL pool.
    Compress(u64),
    /// Credit `recipient` from the SOL pool.
    Decompress { amount: u64, recipient: Pubkey },
    None,
}

#[derive(Debug, Clone)]
pub struct InvokeParams<'a> {
    pub payer: Pubkey,
    pub authority: Pubkey,
    pub inputs: &'a [indexer::CompressedAccount],
    pub input_contexts: &'a [InputContext],
    pub proof: Option<CompressedProof>,
    /// `(owner, lamports)` pairs written to `output_tree`.
    pub outputs: Vec<(Pubkey, u64)>,
    pub output_tree: Pubkey,
    pub flow: LamportsFlow,
}

pub fn invoke_instruction(
    programs: &LightProgramIds,
    params: InvokeParams<'_>,
) -> std::io::Result<Instruction> {
    let mut remaining = PackedAccounts::default();
    let merkle_contexts = pack_merkle_contexts(params.input_contexts, &mut remaining);

    let input_compressed_accounts_with_merkle_context = params
        .inputs
        .iter()
        .zip(params.input_contexts)
        .zip(merkle_contexts)
        .map(
            |((account, ctx), merkle_context)| PackedCompressedAccountWithMerkleContext {
                compressed_account: CompressedAccount {
                    owner: account.owner,
                    lamports: account.lamports,
                    address: account.address,
                    data: account.data.as_ref().map(|data| CompressedAccountData {
                        discriminator: data.discriminator,
                        data: data.data.clone(),
                        data_hash: data.data_hash,
                    }),
                },
                merkle_context,
                root_index: ctx.root_index,
                read_only: false,
            },
        )
        .collect();

    let output_tree_index = remaining.insert_or_get(params.output_tree);
    let output_compressed_accounts = params
        .outputs
        .iter()
        .map(|(owner, lamports)| OutputCompressedAccountWithPackedContext {
            compressed_account: CompressedAccount {
                owner: *owner,
                lamports: *lamports,
                address: None,
                data: None,
            },
            merkle_tree_index: output_tree_index,
        })
        .collect();

    let (compress_or_decompress_lamports, is_compress) = match params.flow {
        LamportsFlow::Compress(amount) => (Some(amount), true),
        LamportsFlow::Decompress { amount, .. } => (Some(amount), false),
        LamportsFlow::None => (None, false),
    };

    let inputs = InstructionDataInvoke {
        proof: params.proof,
        input_compressed_accounts_with_merkle_context,
        output_compressed_accounts,
        relay_fee: None,
        new_address_params: Vec::new(),
        compress_or_decompress_lamports,
        is_compress,
    };
    let data = anchor_inputs_data(anchor_discriminator("invoke"), &inputs)?;

    let program_id = programs.light_system_program;
    let sol_pool = match params.flow {
        LamportsFlow::None => AccountMeta::new_readonly(program_id, false),
        _ => AccountMeta::new(programs.sol_pool_pda(), false),
    };
    let recipient = match params.flow {
        LamportsFlow::Decompress { recipient, .. } => AccountMeta::new(recipient, false),
        _ => AccountMeta::new_readonly(program_id, false),
    };

    let mut accounts = vec![
        AccountMeta::new(params.payer, true),
        AccountMeta::new_readonly(params.authority, true),
        AccountMeta::new_readonly(programs.registered_program_pda(), false),
        AccountMeta::new_readonly(programs.noop_program, false),
        AccountMeta::new_readonly(programs.account_compression_authority(), false),
        AccountMeta::new_readonly(programs.account_compression_program, false),
        sol_pool,
        recipient,
        AccountMeta::new_readonly(system_program::ID, false),
    ];
    accounts.extend(remaining.to_account_metas());

    Ok(Instruction {
        program_id,
        accounts,
        data,
    })
}
