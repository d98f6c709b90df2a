use solana_sdk::{account::Account, program_pack::Pack, pubkey::Pubkey};
use tracing::debug;

use crate::{
    config::LightProgramIds,
    constants::TOKEN_ACCOUNT_AMOUNT_OFFSET,
    error::WalletError,
    instructions::token::token_pool_pdas,
    rpc::RpcConnection,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPoolInfo {
    pub mint: Pubkey,
    pub pool_pda: Pubkey,
    pub pool_index: u8,
    pub token_program: Pubkey,
    pub is_initialized: bool,
    pub balance: u64,
}

/// Reads the SPL `amount` of a token account, classic or Token-2022.
pub fn token_account_amount(data: &[u8]) -> Option<u64> {
    if data.len() < spl_token::state::Account::LEN {
        return None;
    }
    let bytes = data.get(TOKEN_ACCOUNT_AMOUNT_OFFSET..TOKEN_ACCOUNT_AMOUNT_OFFSET + 8)?;
    Some(u64::from_le_bytes(bytes.try_into().ok()?))
}

fn pool_info(mint: &Pubkey, pool_pda: Pubkey, pool_index: u8, account: Option<&Account>) -> TokenPoolInfo {
    match account.and_then(|acc| token_account_amount(&acc.data).map(|balance| (acc.owner, balance))) {
        Some((token_program, balance)) => TokenPoolInfo {
            mint: *mint,
            pool_pda,
            pool_index,
            token_program,
            is_initialized: true,
            balance,
        },
        None => TokenPoolInfo {
            mint: *mint,
            pool_pda,
            pool_index,
            token_program: spl_token::ID,
            is_initialized: false,
            balance: 0,
        },
    }
}

/// Reads every possible pool PDA of `mint` from the ledger.
pub async fn get_token_pools<R: RpcConnection>(
    rpc: &R,
    programs: &LightProgramIds,
    mint: &Pubkey,
) -> Result<Vec<TokenPoolInfo>, WalletError> {
    let mut pools = Vec::new();
    for (index, pool_pda) in token_pool_pdas(programs, mint).into_iter().enumerate() {
        let account = rpc.get_account(pool_pda).await?;
        pools.push(pool_info(mint, pool_pda, index as u8, account.as_ref()));
    }
    debug!(
        "Mint {} has {} initialized token pools",
        mint,
        pools.iter().filter(|p| p.is_initialized).count()
    );
    Ok(pools)
}

/// Pool that receives tokens on compression: the lowest initialized index.
pub fn select_token_pool_for_compression(
    mint: &Pubkey,
    pools: &[TokenPoolInfo],
) -> Result<TokenPoolInfo, WalletError> {
    pools
        .iter()
        .filter(|pool| pool.is_initialized)
        .min_by_key(|pool| pool.pool_index)
        .cloned()
        .ok_or(WalletError::TokenPoolNotFound(*mint))
}

/// Pools to release `amount` from on decompression.
///
/// A single pool is used when one covers the amount; otherwise every
/// initialized pool is passed, in index order.
pub fn select_token_pools_for_decompression(
    mint: &Pubkey,
    pools: &[TokenPoolInfo],
    amount: u64,
) -> Result<Vec<TokenPoolInfo>, WalletError> {
    let mut initialized: Vec<TokenPoolInfo> =
        pools.iter().filter(|pool| pool.is_initialized).cloned().collect();
    if initialized.is_empty() {
        return Err(WalletError::TokenPoolNotFound(*mint));
    }
    initialized.sort_by_key(|pool| pool.pool_index);
    if initialized.iter().all(|pool| pool.balance == 0) {
        return Err(WalletError::TokenPoolDepleted(*mint));
    }
    if let Some(pool) = initialized.iter().find(|pool| pool.balance >= amount) {
        return Ok(vec![pool.clone()]);
    }
    Ok(initialized)
}
