use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    system_program,
};

use super::{
    anchor_inputs_data, pack_merkle_contexts,
    wire::{
        CompressedTokenInstructionDataTransfer, InputTokenDataWithContext,
        PackedTokenTransferOutputData,
    },
    InputContext, PackedAccounts,
};
use crate::{
    config::LightProgramIds,
    constants::{
        CREATE_TOKEN_POOL_DISCRIMINATOR, NUM_MAX_POOL_ACCOUNTS, TOKEN_POOL_SEED,
        TRANSFER_DISCRIMINATOR,
    },
    indexer::{CompressedProof, CompressedTokenAccount},
};

/// SPL side of a compressed-token transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplFlow {
    /// Move `amount` from `source` into the pool and mint compressed outputs.
    Compress {
        amount: u64,
        source: Pubkey,
        pool: Pubkey,
        token_program: Pubkey,
    },
    /// Burn compressed inputs and release `amount` from the pools to `destination`.
    Decompress {
        amount: u64,
        destination: Pubkey,
        pools: Vec<Pubkey>,
        token_program: Pubkey,
    },
    None,
}

#[derive(Debug, Clone)]
pub struct TokenTransferParams<'a> {
    pub payer: Pubkey,
    pub authority: Pubkey,
    pub mint: Pubkey,
    pub inputs: &'a [CompressedTokenAccount],
    pub input_contexts: &'a [InputContext],
    pub proof: Option<CompressedProof>,
    /// `(owner, amount)` pairs written to `output_tree`.
    pub outputs: Vec<(Pubkey, u64)>,
    pub output_tree: Pubkey,
    pub flow: SplFlow,
}

pub fn transfer_instruction(
    programs: &LightProgramIds,
    params: TokenTransferParams<'_>,
) -> std::io::Result<Instruction> {
    let mut remaining = PackedAccounts::default();
    let merkle_contexts = pack_merkle_contexts(params.input_contexts, &mut remaining);

    let input_token_data_with_context = params
        .inputs
        .iter()
        .zip(params.input_contexts)
        .zip(merkle_contexts)
        .map(|((input, ctx), merkle_context)| InputTokenDataWithContext {
            amount: input.token.amount,
            delegate_index: None,
            merkle_context,
            root_index: ctx.root_index,
            lamports: (input.account.lamports > 0).then_some(input.account.lamports),
            tlv: None,
        })
        .collect();

    let output_tree_index = remaining.insert_or_get(params.output_tree);
    let mut output_compressed_accounts: Vec<_> = params
        .outputs
        .iter()
        .map(|(owner, amount)| PackedTokenTransferOutputData {
            owner: *owner,
            amount: *amount,
            lamports: None,
            merkle_tree_index: output_tree_index,
            tlv: None,
        })
        .collect();

    let lamports_change_account_merkle_tree_index = route_input_lamports(
        params.inputs,
        &params.authority,
        &mut output_compressed_accounts,
        output_tree_index,
    );

    let (is_compress, compression_amount) = match &params.flow {
        SplFlow::Compress { amount, .. } => (true, Some(*amount)),
        SplFlow::Decompress { amount, .. } => (false, Some(*amount)),
        SplFlow::None => (false, None),
    };

    let inputs = CompressedTokenInstructionDataTransfer {
        proof: params.proof,
        mint: params.mint,
        delegated_transfer: None,
        input_token_data_with_context,
        output_compressed_accounts,
        is_compress,
        compression_amount,
        cpi_context: None,
        lamports_change_account_merkle_tree_index,
    };
    let data = anchor_inputs_data(TRANSFER_DISCRIMINATOR, &inputs)?;

    let program_id = programs.compressed_token_program;
    let absent = AccountMeta::new_readonly(program_id, false);
    let (pool, token_account, token_program, extra_pools) = match &params.flow {
        SplFlow::Compress {
            source,
            pool,
            token_program,
            ..
        } => (
            AccountMeta::new(*pool, false),
            AccountMeta::new(*source, false),
            AccountMeta::new_readonly(*token_program, false),
            &[][..],
        ),
        SplFlow::Decompress {
            destination,
            pools,
            token_program,
            ..
        } => match pools.split_first() {
            Some((first, rest)) => (
                AccountMeta::new(*first, false),
                AccountMeta::new(*destination, false),
                AccountMeta::new_readonly(*token_program, false),
                rest,
            ),
            None => (
                absent.clone(),
                AccountMeta::new(*destination, false),
                AccountMeta::new_readonly(*token_program, false),
                &[][..],
            ),
        },
        SplFlow::None => (absent.clone(), absent.clone(), absent.clone(), &[][..]),
    };

    let mut accounts = vec![
        AccountMeta::new(params.payer, true),
        AccountMeta::new_readonly(params.authority, true),
        AccountMeta::new_readonly(programs.token_cpi_authority(), false),
        AccountMeta::new_readonly(programs.light_system_program, false),
        AccountMeta::new_readonly(programs.registered_program_pda(), false),
        AccountMeta::new_readonly(programs.noop_program, false),
        AccountMeta::new_readonly(programs.account_compression_authority(), false),
        AccountMeta::new_readonly(programs.account_compression_program, false),
        AccountMeta::new_readonly(program_id, false),
        pool,
        token_account,
        token_program,
        AccountMeta::new_readonly(system_program::ID, false),
    ];
    accounts.extend(remaining.to_account_metas());
    accounts.extend(extra_pools.iter().map(|pool| AccountMeta::new(*pool, false)));

    Ok(Instruction {
        program_id,
        accounts,
        data,
    })
}

/// Lamports held by token inputs return to `authority`: on its token output
/// when there is one, otherwise in a separate change account in the output
/// tree, whose index is returned.
fn route_input_lamports(
    inputs: &[CompressedTokenAccount],
    authority: &Pubkey,
    outputs: &mut [PackedTokenTransferOutputData],
    output_tree_index: u8,
) -> Option<u8> {
    let input_lamports: u64 = inputs.iter().map(|input| input.account.lamports).sum();
    if input_lamports == 0 {
        return None;
    }
    match outputs.iter_mut().rev().find(|output| output.owner == *authority) {
        Some(change) => {
            change.lamports = Some(input_lamports);
            None
        }
        None => Some(output_tree_index),
    }
}

pub fn find_token_pool_pda_with_index(
    programs: &LightProgramIds,
    mint: &Pubkey,
    pool_index: u8,
) -> (Pubkey, u8) {
    let index_seed = [pool_index];
    let seeds: [&[u8]; 3] = [TOKEN_POOL_SEED, mint.as_ref(), &index_seed];
    // Pool 0 omits the index byte.
    let seeds = if pool_index == 0 {
        &seeds[..2]
    } else {
        &seeds[..]
    };
    Pubkey::find_program_address(seeds, &programs.compressed_token_program)
}

pub fn token_pool_pdas(programs: &LightProgramIds, mint: &Pubkey) -> Vec<Pubkey> {
    (0..NUM_MAX_POOL_ACCOUNTS)
        .map(|index| find_token_pool_pda_with_index(programs, mint, index).0)
        .collect()
}

pub fn create_token_pool_instruction(
    programs: &LightProgramIds,
    fee_payer: &Pubkey,
    mint: &Pubkey,
    token_program: &Pubkey,
) -> Instruction {
    let (token_pool_pda, _) = find_token_pool_pda_with_index(programs, mint, 0);
    Instruction {
        program_id: programs.compressed_token_program,
        accounts: vec![
            AccountMeta::new(*fee_payer, true),
            AccountMeta::new(token_pool_pda, false),
            AccountMeta::new_readonly(system_program::ID, false),
            AccountMeta::new(*mint, false),
            AccountMeta::new_readonly(*token_program, false),
            AccountMeta::new_readonly(programs.token_cpi_authority(), false),
        ],
        data: CREATE_TOKEN_POOL_DISCRIMINATOR.to_vec(),
    }
}
