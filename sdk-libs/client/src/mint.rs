use std::{collections::HashMap, sync::Mutex};

use solana_sdk::{account::Account, program_pack::Pack, pubkey::Pubkey};

use crate::{
    constants::{MINT_DECIMALS_OFFSET, SPL_TOKEN_2022_PROGRAM_ID},
    error::WalletError,
    rpc::RpcConnection,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MintInfo {
    pub decimals: u8,
    pub token_program: Pubkey,
}

pub fn parse_mint(account: &Account) -> Option<MintInfo> {
    if account.owner != spl_token::ID && account.owner != SPL_TOKEN_2022_PROGRAM_ID {
        return None;
    }
    if account.data.len() < spl_token::state::Mint::LEN {
        return None;
    }
    Some(MintInfo {
        decimals: *account.data.get(MINT_DECIMALS_OFFSET)?,
        token_program: account.owner,
    })
}

/// Mint metadata, fetched on first use and kept for the engine's lifetime.
#[derive(Debug, Default)]
pub struct MintCache {
    mints: Mutex<HashMap<Pubkey, MintInfo>>,
}

impl MintCache {
    pub fn cached(&self, mint: &Pubkey) -> Option<MintInfo> {
        self.mints.lock().ok()?.get(mint).copied()
    }

    pub async fn get<R: RpcConnection>(&self, rpc: &R, mint: &Pubkey) -> Result<MintInfo, WalletError> {
        if let Some(info) = self.cached(mint) {
            return Ok(info);
        }
        let account = rpc
            .get_account(*mint)
            .await?
            .ok_or(WalletError::MintNotFound(*mint))?;
        let info = parse_mint(&account).ok_or(WalletError::MintNotFound(*mint))?;
        if let Ok(mut mints) = self.mints.lock() {
            mints.insert(*mint, info);
        }
        Ok(info)
    }
}

/// `amount` in whole units of a mint with `decimals`.
pub fn to_ui_amount(amount: u64, decimals: u8) -> f64 {
    amount as f64 / 10f64.powi(decimals as i32)
}
