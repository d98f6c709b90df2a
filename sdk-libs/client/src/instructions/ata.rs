use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    system_program,
};

use crate::constants::ASSOCIATED_TOKEN_PROGRAM_ID;

pub fn get_associated_token_address(owner: &Pubkey, mint: &Pubkey, token_program: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[owner.as_ref(), token_program.as_ref(), mint.as_ref()],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
    )
    .0
}

/// `CreateIdempotent`: succeeds when the account already exists.
pub fn create_associated_token_account_idempotent(
    payer: &Pubkey,
    owner: &Pubkey,
    mint: &Pubkey,
    token_program: &Pubkey,
) -> Instruction {
    let ata = get_associated_token_address(owner, mint, token_program);
    Instruction {
        program_id: ASSOCIATED_TOKEN_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(*payer, true),
            AccountMeta::new(ata, false),
            AccountMeta::new_readonly(*owner, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new_readonly(system_program::ID, false),
            AccountMeta::new_readonly(*token_program, false),
        ],
        data: vec![1],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ata_depends_on_token_program() {
        let owner = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let classic = get_associated_token_address(&owner, &mint, &spl_token::ID);
        let token_2022 = get_associated_token_address(
            &owner,
            &mint,
            &crate::constants::SPL_TOKEN_2022_PROGRAM_ID,
        );
        assert_ne!(classic, token_2022);
        let ix = create_associated_token_account_idempotent(&owner, &owner, &mint, &spl_token::ID);
        assert_eq!(ix.accounts[1].pubkey, classic);
        assert_eq!(ix.data, vec![1]);
    }
}
