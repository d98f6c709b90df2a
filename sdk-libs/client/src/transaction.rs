use solana_sdk::{
    compute_budget::ComputeBudgetInstruction, hash::Hash, instruction::Instruction,
    message::Message, pubkey::Pubkey,
};
use tracing::debug;

use crate::{
    config::WalletConfig,
    error::WalletError,
    indexer::{CompressedAccount, CompressedTokenAccount, ValidityProofWithContext},
    instructions::{
        create_associated_token_account_idempotent, input_contexts,
        system::{invoke_instruction, InvokeParams, LamportsFlow},
        token::{create_token_pool_instruction, transfer_instruction, SplFlow, TokenTransferParams},
    },
    selection::Selection,
    token_pool::TokenPoolInfo,
};

/// A recent ledger reference a transaction must carry to be accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub blockhash: Hash,
    pub last_valid_block_height: u64,
}

#[derive(Debug, Clone)]
pub struct UnsignedTransaction {
    pub instructions: Vec<Instruction>,
    pub payer: Pubkey,
    /// Required signers, fee payer first, without duplicates.
    pub signers: Vec<Pubkey>,
    pub anchor: Anchor,
}

impl UnsignedTransaction {
    pub fn message(&self) -> Message {
        Message::new_with_blockhash(&self.instructions, Some(&self.payer), &self.anchor.blockhash)
    }
}

/// Inputs chosen by selection together with the proof fetched for them.
#[derive(Debug, Clone)]
pub struct ProvedInputs<'a, T> {
    pub selection: &'a Selection<T>,
    pub proof: &'a ValidityProofWithContext,
}

#[derive(Debug, Clone)]
pub enum Action<'a> {
    Compress {
        amount: u64,
        recipient: Pubkey,
    },
    Decompress {
        amount: u64,
        recipient: Pubkey,
        inputs: ProvedInputs<'a, CompressedAccount>,
    },
    Transfer {
        amount: u64,
        recipient: Pubkey,
        inputs: ProvedInputs<'a, CompressedAccount>,
    },
    CompressToken {
        mint: Pubkey,
        amount: u64,
        recipient: Pubkey,
        source: Pubkey,
        pool: &'a TokenPoolInfo,
    },
    DecompressToken {
        mint: Pubkey,
        amount: u64,
        destination: Pubkey,
        pools: &'a [TokenPoolInfo],
        inputs: ProvedInputs<'a, CompressedTokenAccount>,
    },
    TransferToken {
        mint: Pubkey,
        amount: u64,
        recipient: Pubkey,
        inputs: ProvedInputs<'a, CompressedTokenAccount>,
    },
    CreateTokenPool {
        mint: Pubkey,
        token_program: Pubkey,
    },
    /// Idempotent creation of `owner`'s associated token account.
    CreateReceiveAccount {
        owner: Pubkey,
        mint: Pubkey,
        token_program: Pubkey,
    },
}

impl Action<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Compress { .. } => "compress",
            Action::Decompress { .. } => "decompress",
            Action::Transfer { .. } => "transfer",
            Action::CompressToken { .. } => "compress_token",
            Action::DecompressToken { .. } => "decompress_token",
            Action::TransferToken { .. } => "transfer_token",
            Action::CreateTokenPool { .. } => "create_token_pool",
            Action::CreateReceiveAccount { .. } => "create_receive_account",
        }
    }

    fn requires_owner_signature(&self) -> bool {
        !matches!(
            self,
            Action::CreateTokenPool { .. } | Action::CreateReceiveAccount { .. }
        )
    }
}

fn with_change(mut outputs: Vec<(Pubkey, u64)>, owner: Pubkey, change: u64) -> Vec<(Pubkey, u64)> {
    if change > 0 {
        outputs.push((owner, change));
    }
    outputs
}

/// Builds the ordered instruction list for an action: compute budget first,
/// then setup instructions, then the action itself.
#[derive(Debug, Clone, Copy)]
pub struct TransactionAssembler<'a> {
    config: &'a WalletConfig,
}

impl<'a> TransactionAssembler<'a> {
    pub fn new(config: &'a WalletConfig) -> Self {
        Self { config }
    }

    pub fn build(
        &self,
        action: Action<'_>,
        setup: Vec<Instruction>,
        payer: Pubkey,
        owner: Pubkey,
        anchor: Anchor,
    ) -> Result<UnsignedTransaction, WalletError> {
        debug!("Assembling {} for owner {} paid by {}", action.name(), owner, payer);
        let mut signers = vec![payer];
        if action.requires_owner_signature() && owner != payer {
            signers.push(owner);
        }

        let mut instructions = Vec::with_capacity(setup.len() + 2);
        instructions.push(ComputeBudgetInstruction::set_compute_unit_limit(
            self.config.compute_unit_limit,
        ));
        instructions.extend(setup);
        instructions.push(self.action_instruction(action, payer, owner)?);

        Ok(UnsignedTransaction {
            instructions,
            payer,
            signers,
            anchor,
        })
    }

    fn action_instruction(
        &self,
        action: Action<'_>,
        payer: Pubkey,
        owner: Pubkey,
    ) -> Result<Instruction, WalletError> {
        let programs = &self.config.programs;
        let output_tree = self.config.output_tree().tree;
        let instruction = match action {
            Action::Compress { amount, recipient } => invoke_instruction(
                programs,
                InvokeParams {
                    payer,
                    authority: owner,
                    inputs: &[],
                    input_contexts: &[],
                    proof: None,
                    outputs: vec![(recipient, amount)],
                    output_tree,
                    flow: LamportsFlow::Compress(amount),
                },
            ),
            Action::Decompress {
                amount,
                recipient,
                inputs,
            } => {
                let contexts = input_contexts(&inputs.selection.inputs, inputs.proof, self.config)?;
                invoke_instruction(
                    programs,
                    InvokeParams {
                        payer,
                        authority: owner,
                        inputs: &inputs.selection.inputs,
                        input_contexts: &contexts,
                        proof: inputs.proof.proof,
                        outputs: with_change(Vec::new(), owner, inputs.selection.change_amount),
                        output_tree,
                        flow: LamportsFlow::Decompress { amount, recipient },
                    },
                )
            }
            Action::Transfer {
                amount,
                recipient,
                inputs,
            } => {
                let contexts = input_contexts(&inputs.selection.inputs, inputs.proof, self.config)?;
                invoke_instruction(
                    programs,
                    InvokeParams {
                        payer,
                        authority: owner,
                        inputs: &inputs.selection.inputs,
                        input_contexts: &contexts,
                        proof: inputs.proof.proof,
                        outputs: with_change(
                            vec![(recipient, amount)],
                            owner,
                            inputs.selection.change_amount,
                        ),
                        output_tree,
                        flow: LamportsFlow::None,
                    },
                )
            }
            Action::CompressToken {
                mint,
                amount,
                recipient,
                source,
                pool,
            } => transfer_instruction(
                programs,
                TokenTransferParams {
                    payer,
                    authority: owner,
                    mint,
                    inputs: &[],
                    input_contexts: &[],
                    proof: None,
                    outputs: vec![(recipient, amount)],
                    output_tree,
                    flow: SplFlow::Compress {
                        amount,
                        source,
                        pool: pool.pool_pda,
                        token_program: pool.token_program,
                    },
                },
            ),
            Action::DecompressToken {
                mint,
                amount,
                destination,
                pools,
                inputs,
            } => {
                let contexts = input_contexts(
                    inputs.selection.inputs.iter().map(|input| &input.account),
                    inputs.proof,
                    self.config,
                )?;
                let token_program = pools
                    .first()
                    .map(|pool| pool.token_program)
                    .ok_or(WalletError::TokenPoolNotFound(mint))?;
                transfer_instruction(
                    programs,
                    TokenTransferParams {
                        payer,
                        authority: owner,
                        mint,
                        inputs: &inputs.selection.inputs,
                        input_contexts: &contexts,
                        proof: inputs.proof.proof,
                        outputs: with_change(Vec::new(), owner, inputs.selection.change_amount),
                        output_tree,
                        flow: SplFlow::Decompress {
                            amount,
                            destination,
                            pools: pools.iter().map(|pool| pool.pool_pda).collect(),
                            token_program,
                        },
                    },
                )
            }
            Action::TransferToken {
                mint,
                amount,
                recipient,
                inputs,
            } => {
                let contexts = input_contexts(
                    inputs.selection.inputs.iter().map(|input| &input.account),
                    inputs.proof,
                    self.config,
                )?;
                transfer_instruction(
                    programs,
                    TokenTransferParams {
                        payer,
                        authority: owner,
                        mint,
                        inputs: &inputs.selection.inputs,
                        input_contexts: &contexts,
                        proof: inputs.proof.proof,
                        outputs: with_change(
                            vec![(recipient, amount)],
                            owner,
                            inputs.selection.change_amount,
                        ),
                        output_tree,
                        flow: SplFlow::None,
                    },
                )
            }
            Action::CreateTokenPool {
                mint,
                token_program,
            } => Ok(create_token_pool_instruction(
                programs,
                &payer,
                &mint,
                &token_program,
            )),
            Action::CreateReceiveAccount {
                owner: account_owner,
                mint,
                token_program,
            } => Ok(create_associated_token_account_idempotent(
                &payer,
                &account_owner,
                &mint,
                &token_program,
            )),
        };
        instruction.map_err(|e| WalletError::Assembly(format!("serialization: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use solana_sdk::compute_budget;

    use super::*;
    use crate::{constants::DEFAULT_STATE_TREE, indexer::IndexerError};

    fn anchor() -> Anchor {
        Anchor {
            blockhash: Hash::new_unique(),
            last_valid_block_height: 100,
        }
    }

    fn account(lamports: u64, tree: Pubkey) -> CompressedAccount {
        CompressedAccount {
            hash: [lamports as u8; 32],
            owner: Pubkey::new_unique(),
            lamports,
            address: None,
            data: None,
            tree,
            queue: None,
            leaf_index: 0,
            prove_by_index: false,
            slot_created: 0,
        }
    }

    #[test]
    fn payer_equal_to_owner_signs_once() {
        let config = WalletConfig::default();
        let assembler = TransactionAssembler::new(&config);
        let payer = Pubkey::new_unique();
        let tx = assembler
            .build(
                Action::Compress {
                    amount: 10,
                    recipient: payer,
                },
                Vec::new(),
                payer,
                payer,
                anchor(),
            )
            .unwrap();
        assert_eq!(tx.signers, vec![payer]);
        assert_eq!(tx.message().header.num_required_signatures, 1);
    }

    #[test]
    fn distinct_payer_and_owner_both_sign_payer_first() {
        let config = WalletConfig::default();
        let assembler = TransactionAssembler::new(&config);
        let payer = Pubkey::new_unique();
        let owner = Pubkey::new_unique();
        let tx = assembler
            .build(
                Action::Compress {
                    amount: 10,
                    recipient: owner,
                },
                Vec::new(),
                payer,
                owner,
                anchor(),
            )
            .unwrap();
        assert_eq!(tx.signers, vec![payer, owner]);
        assert_eq!(tx.message().account_keys[0], payer);
    }

    #[test]
    fn compute_budget_comes_first() {
        let config = WalletConfig::default();
        let assembler = TransactionAssembler::new(&config);
        let payer = Pubkey::new_unique();
        let setup = vec![crate::instructions::create_associated_token_account_idempotent(
            &payer,
            &payer,
            &Pubkey::new_unique(),
            &spl_token::ID,
        )];
        let tx = assembler
            .build(
                Action::CreateTokenPool {
                    mint: Pubkey::new_unique(),
                    token_program: spl_token::ID,
                },
                setup,
                payer,
                Pubkey::new_unique(),
                anchor(),
            )
            .unwrap();
        assert_eq!(tx.instructions.len(), 3);
        assert_eq!(tx.instructions[0].program_id, compute_budget::ID);
        assert_eq!(
            tx.instructions[0],
            ComputeBudgetInstruction::set_compute_unit_limit(300_000)
        );
        assert_eq!(tx.instructions[2].program_id, config.programs.compressed_token_program);
        // Pool creation needs only the fee payer.
        assert_eq!(tx.signers, vec![payer]);
    }

    #[test]
    fn transfer_emits_change_only_when_positive() {
        let config = WalletConfig::default();
        let assembler = TransactionAssembler::new(&config);
        let owner = Pubkey::new_unique();
        let recipient = Pubkey::new_unique();
        let selection = Selection {
            inputs: vec![account(5, DEFAULT_STATE_TREE)],
            total: 5,
            change_amount: 0,
        };
        let proof = ValidityProofWithContext {
            root_indices: vec![3],
            ..Default::default()
        };
        let tx = assembler
            .build(
                Action::Transfer {
                    amount: 5,
                    recipient,
                    inputs: ProvedInputs {
                        selection: &selection,
                        proof: &proof,
                    },
                },
                Vec::new(),
                owner,
                owner,
                anchor(),
            )
            .unwrap();
        let exact = tx.instructions[1].data.len();

        let selection = Selection {
            change_amount: 1,
            total: 6,
            inputs: vec![account(6, DEFAULT_STATE_TREE)],
        };
        let tx = assembler
            .build(
                Action::Transfer {
                    amount: 5,
                    recipient,
                    inputs: ProvedInputs {
                        selection: &selection,
                        proof: &proof,
                    },
                },
                Vec::new(),
                owner,
                owner,
                anchor(),
            )
            .unwrap();
        assert!(tx.instructions[1].data.len() > exact);
    }

    #[test]
    fn unknown_input_tree_is_reported() {
        let config = WalletConfig::default();
        let assembler = TransactionAssembler::new(&config);
        let owner = Pubkey::new_unique();
        let selection = Selection {
            inputs: vec![account(5, Pubkey::new_unique())],
            total: 5,
            change_amount: 0,
        };
        let proof = ValidityProofWithContext {
            root_indices: vec![0],
            ..Default::default()
        };
        let result = assembler.build(
            Action::Decompress {
                amount: 5,
                recipient: owner,
                inputs: ProvedInputs {
                    selection: &selection,
                    proof: &proof,
                },
            },
            Vec::new(),
            owner,
            owner,
            anchor(),
        );
        assert!(matches!(
            result,
            Err(WalletError::Indexer(IndexerError::UnknownStateTree(_)))
        ));
    }
}
