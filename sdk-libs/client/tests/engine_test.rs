use std::{sync::atomic::Ordering, time::Duration};

use light_wallet_client::{
    constants::{ASSOCIATED_TOKEN_PROGRAM_ID, NO_WALLET_LOADED},
    indexer::AccountState,
    instructions::{get_associated_token_address, token::find_token_pool_pda_with_index},
    ActionSigners, LightProgramIds, Outcome, PoolStatus, RefreshOptions, WalletError,
};
use solana_sdk::{
    account::Account,
    program_pack::Pack,
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    transaction::Transaction,
};

use test_utils::*;

#[tokio::test]
async fn total_balance_is_public_plus_compressed() {
    let (engine, rpc, indexer) = engine();
    let owner = Keypair::new();
    rpc.set_balance(owner.pubkey(), sol(1.2));
    indexer.set_compressed_balance(owner.pubkey(), sol(0.3));

    engine.set_owner(Some(owner.pubkey())).await;

    let view = engine.get_total_balance();
    assert_eq!(view.total_lamports, sol(1.5));
    assert_eq!(view.total_sol(), 1.5);
    assert_eq!(view.public_lamports, sol(1.2));
    assert_eq!(view.compressed_lamports, sol(0.3));
    assert!(view.error.is_none());
    assert!(engine.snapshot().last_refreshed_at.is_some());
}

#[tokio::test(start_paused = true)]
async fn logout_clears_cache_and_stops_refreshing() {
    let (engine, rpc, _indexer) = engine();
    let owner = Keypair::new();
    rpc.set_balance(owner.pubkey(), sol(2.0));

    engine.set_owner(Some(owner.pubkey())).await;
    assert!(engine.is_refresh_scheduled());
    assert_eq!(rpc.balance_calls(), 1);

    engine.refresh(None, RefreshOptions::loud()).await;
    assert!(!engine.is_refresh_scheduled());
    let view = engine.get_total_balance();
    assert_eq!(view.total_lamports, 0);
    assert_eq!(view.error.as_deref(), Some(NO_WALLET_LOADED));
    assert!(engine.snapshot().last_refreshed_at.is_none());

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(rpc.balance_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn background_refresh_ticks_silently() {
    let (engine, rpc, indexer) = engine();
    let owner = Keypair::new();
    engine.set_owner(Some(owner.pubkey())).await;
    assert_eq!(rpc.balance_calls(), 1);

    indexer.set_compressed_balance(owner.pubkey(), 42);
    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(rpc.balance_calls(), 2);
    assert_eq!(engine.get_total_balance().compressed_lamports, 42);
    assert!(!engine.cache().is_loading());
    assert!(engine.is_refresh_scheduled());
}

#[tokio::test(start_paused = true)]
async fn owner_change_moves_the_schedule() {
    let (engine, rpc, _indexer) = engine();
    let first = Pubkey::new_unique();
    let second = Pubkey::new_unique();
    rpc.set_balance(second, 9);
    engine.set_owner(Some(first)).await;
    engine.set_owner(Some(second)).await;
    assert_eq!(engine.owner(), Some(second));
    assert_eq!(engine.get_total_balance().public_lamports, 9);

    tokio::time::sleep(Duration::from_secs(31)).await;
    // One tick for the current owner only.
    assert_eq!(rpc.balance_calls(), 3);
}

#[tokio::test]
async fn failed_compressed_fetch_keeps_last_known_balance() {
    let (engine, rpc, indexer) = engine();
    let owner = Keypair::new();
    rpc.set_balance(owner.pubkey(), 100);
    indexer.set_compressed_balance(owner.pubkey(), 50);
    engine.set_owner(Some(owner.pubkey())).await;

    rpc.set_balance(owner.pubkey(), 120);
    indexer.fail_balance.store(true, Ordering::SeqCst);
    engine
        .refresh(Some(owner.pubkey()), RefreshOptions::silent())
        .await;

    let view = engine.get_total_balance();
    assert_eq!(view.public_lamports, 120);
    assert_eq!(view.compressed_lamports, 50);
    assert_eq!(view.total_lamports, 170);
    assert!(view.error.unwrap().contains("indexer timeout"));
}

#[tokio::test]
async fn decompress_beyond_compressed_balance_fails_before_proving() {
    let (engine, rpc, indexer) = engine();
    let owner = Keypair::new();
    indexer.set_accounts(owner.pubkey(), &[sol(0.6), sol(0.4)]);

    let err = engine
        .decompress_sol(ActionSigners::single(&owner), sol(2.0), owner.pubkey())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        WalletError::InsufficientFunds { requested, available }
            if requested == sol(2.0) && available == sol(1.0)
    ));
    assert_eq!(indexer.proof_calls(), 0);
    assert_eq!(rpc.sent_count(), 0);
}

#[tokio::test]
async fn stale_proof_is_retried_once_then_expires() {
    let (engine, rpc, indexer) = engine();
    let owner = Keypair::new();
    indexer.set_accounts(owner.pubkey(), &[sol(1.0)]);
    indexer.stale_proofs.store(u32::MAX, Ordering::SeqCst);

    let err = engine
        .transfer_sol(ActionSigners::single(&owner), sol(0.5), Pubkey::new_unique())
        .await
        .unwrap_err();

    assert!(matches!(err, WalletError::ProofExpired { attempts: 2 }));
    assert_eq!(err.outcome(), Outcome::NotExecuted);
    assert_eq!(indexer.proof_calls(), 2);
    // Each attempt starts again from the account fetch.
    assert_eq!(indexer.account_calls(), 2);
    assert_eq!(rpc.sent_count(), 0);
}

#[tokio::test]
async fn stale_root_rejected_at_submission_is_reproved() {
    let (engine, rpc, indexer) = engine();
    let owner = Keypair::new();
    indexer.set_accounts(owner.pubkey(), &[10]);
    *rpc.reject_with.lock().unwrap() = Some(
        "Transaction simulation failed: root not found in root history (stale root)".to_string(),
    );

    let err = engine
        .transfer_sol(ActionSigners::single(&owner), 5, Pubkey::new_unique())
        .await
        .unwrap_err();

    assert!(matches!(err, WalletError::ProofExpired { attempts: 2 }));
    assert_eq!(indexer.proof_calls(), 2);
    assert_eq!(indexer.account_calls(), 2);
    assert_eq!(rpc.sent_count(), 0);
}

#[tokio::test]
async fn stale_proof_recovers_on_second_attempt() {
    let (engine, rpc, indexer) = engine();
    let owner = Keypair::new();
    indexer.set_accounts(owner.pubkey(), &[sol(1.0)]);
    indexer.stale_proofs.store(1, Ordering::SeqCst);

    engine
        .decompress_sol(ActionSigners::single(&owner), sol(0.25), owner.pubkey())
        .await
        .unwrap();

    assert_eq!(indexer.proof_calls(), 2);
    assert_eq!(rpc.sent_count(), 1);
}

#[tokio::test]
async fn transfer_spends_single_covering_account() {
    let (engine, rpc, indexer) = engine();
    let owner = Keypair::new();
    let accounts = indexer.set_accounts(owner.pubkey(), &[5, 3, 2]);
    engine.set_owner(Some(owner.pubkey())).await;
    let calls_before = rpc.balance_calls();

    engine
        .transfer_sol(ActionSigners::single(&owner), 4, Pubkey::new_unique())
        .await
        .unwrap();

    let requests = indexer.proof_requests.lock().unwrap().clone();
    assert_eq!(requests, vec![vec![accounts[0].hash]]);

    let sent = rpc.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    let message = &sent[0].message;
    assert_eq!(message.header.num_required_signatures, 1);
    assert_eq!(message.account_keys[0], owner.pubkey());
    drop(sent);

    // Successful actions refresh the balance.
    assert_eq!(rpc.balance_calls(), calls_before + 1);
}

#[tokio::test]
async fn separate_payer_and_owner_both_sign() {
    let (engine, rpc, indexer) = engine();
    let owner = Keypair::new();
    let payer = Keypair::new();
    indexer.set_accounts(owner.pubkey(), &[10]);

    engine
        .transfer_sol(
            ActionSigners {
                payer: &payer,
                owner: &owner,
            },
            10,
            Pubkey::new_unique(),
        )
        .await
        .unwrap();

    let sent = rpc.sent.lock().unwrap();
    let transaction = &sent[0];
    assert_eq!(transaction.message.header.num_required_signatures, 2);
    assert_eq!(transaction.message.account_keys[0], payer.pubkey());
    assert!(transaction.verify().is_ok());
}

#[tokio::test(start_paused = true)]
async fn confirmation_timeout_reports_maybe_executed() {
    let (engine, rpc, indexer) = engine();
    let owner = Keypair::new();
    indexer.set_accounts(owner.pubkey(), &[10]);
    engine.set_owner(Some(owner.pubkey())).await;
    rpc.confirm.store(false, Ordering::SeqCst);
    let calls_before = rpc.balance_calls();

    let err = engine
        .decompress_sol(ActionSigners::single(&owner), 10, owner.pubkey())
        .await
        .unwrap_err();

    assert!(matches!(err, WalletError::ConfirmationTimeout { .. }));
    assert_eq!(err.outcome(), Outcome::MaybeExecuted);
    assert_eq!(rpc.sent_count(), 1);
    // A silent refresh still runs so the caller can re-check the balance.
    assert!(rpc.balance_calls() > calls_before);
    assert!(!engine.cache().is_loading());
}

#[tokio::test]
async fn rejected_submission_is_surfaced_verbatim() {
    let (engine, rpc, indexer) = engine();
    let owner = Keypair::new();
    indexer.set_accounts(owner.pubkey(), &[10]);
    *rpc.reject_with.lock().unwrap() = Some("Blockhash not found".to_string());

    let err = engine
        .transfer_sol(ActionSigners::single(&owner), 5, Pubkey::new_unique())
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::SubmissionRejected(ref m) if m.contains("Blockhash not found")));
    assert_eq!(err.outcome(), Outcome::NotExecuted);
}

#[tokio::test]
async fn concurrent_actions_for_one_owner_run_one_at_a_time() {
    let (engine, rpc, indexer) = engine();
    let owner = Keypair::new();
    indexer.set_accounts(owner.pubkey(), &[10, 10]);

    let (first, second) = tokio::join!(
        engine.transfer_sol(ActionSigners::single(&owner), 5, Pubkey::new_unique()),
        engine.transfer_sol(ActionSigners::single(&owner), 5, Pubkey::new_unique()),
    );
    first.unwrap();
    second.unwrap();
    assert_eq!(rpc.sent_count(), 2);
    assert_eq!(indexer.proof_calls(), 2);
}

#[tokio::test]
async fn compressed_operations_need_an_indexer() {
    let (engine, rpc) = engine_without_indexer();
    let owner = Keypair::new();
    rpc.set_balance(owner.pubkey(), 7);
    let signers = ActionSigners::single(&owner);

    assert!(matches!(
        engine.compress_sol(signers, 1).await,
        Err(WalletError::IndexerUnavailable)
    ));
    assert!(matches!(
        engine.decompress_sol(signers, 1, owner.pubkey()).await,
        Err(WalletError::IndexerUnavailable)
    ));
    assert!(matches!(
        engine.transfer_sol(signers, 1, Pubkey::new_unique()).await,
        Err(WalletError::IndexerUnavailable)
    ));
    assert!(matches!(
        engine.history(owner.pubkey()).await,
        Err(WalletError::IndexerUnavailable)
    ));
    assert_eq!(rpc.sent_count(), 0);

    // Reads report the missing indexer instead of a zero compressed balance.
    engine.set_owner(Some(owner.pubkey())).await;
    let view = engine.get_total_balance();
    assert_eq!(view.public_lamports, 7);
    assert!(view.error.unwrap().contains("not configured"));
    assert!(engine.snapshot().last_refreshed_at.is_none());
}

#[tokio::test]
async fn zero_amounts_are_rejected() {
    let (engine, rpc, _indexer) = engine();
    let owner = Keypair::new();
    let err = engine
        .compress_sol(ActionSigners::single(&owner), 0)
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::InvalidAmount(_)));
    assert_eq!(rpc.sent_count(), 0);
}

#[tokio::test]
async fn history_is_limited() {
    let (engine, _rpc, _indexer) = engine();
    let history = engine.history(Pubkey::new_unique()).await.unwrap();
    assert_eq!(history.len(), 20);
}

fn mint_account() -> Account {
    Account {
        lamports: 1,
        data: vec![0u8; spl_token::state::Mint::LEN],
        owner: spl_token::ID,
        executable: false,
        rent_epoch: 0,
    }
}

#[tokio::test]
async fn existing_token_pool_is_not_recreated() {
    let (engine, rpc, _indexer) = engine();
    let payer = Keypair::new();
    let mint = Pubkey::new_unique();
    rpc.set_account(mint, mint_account());
    let (pool, _) = find_token_pool_pda_with_index(&LightProgramIds::default(), &mint, 0);
    rpc.set_account(pool, mint_account());

    let status = engine.create_token_pool(&payer, mint).await.unwrap();
    assert_eq!(status, PoolStatus::AlreadyExists);
    assert_eq!(rpc.sent_count(), 0);
}

#[tokio::test]
async fn pool_created_concurrently_counts_as_success() {
    let (engine, rpc, _indexer) = engine();
    let payer = Keypair::new();
    let mint = Pubkey::new_unique();
    rpc.set_account(mint, mint_account());
    *rpc.reject_with.lock().unwrap() =
        Some("Allocate: account Address { address: pool } already in use".to_string());

    let status = engine.create_token_pool(&payer, mint).await.unwrap();
    assert_eq!(status, PoolStatus::AlreadyExists);
}

#[tokio::test]
async fn missing_mint_is_reported() {
    let (engine, _rpc, _indexer) = engine();
    let payer = Keypair::new();
    let mint = Pubkey::new_unique();
    assert!(matches!(
        engine.create_token_pool(&payer, mint).await,
        Err(WalletError::MintNotFound(m)) if m == mint
    ));
}

#[tokio::test]
async fn status_reports_indexer_slot() {
    let (engine, _rpc, _indexer) = engine();
    let status = engine.status().await.unwrap();
    assert_eq!(status.rpc_url, "test");
    assert_eq!(status.indexer_slot, CONFIRMED_SLOT);

    let (engine, _rpc) = engine_without_indexer();
    assert!(matches!(
        engine.status().await,
        Err(WalletError::IndexerUnavailable)
    ));
}

fn pool_pda(mint: &Pubkey, index: u8) -> Pubkey {
    find_token_pool_pda_with_index(&LightProgramIds::default(), mint, index).0
}

fn last_sent(rpc: &TestRpc) -> Transaction {
    rpc.sent.lock().unwrap().last().cloned().unwrap()
}

fn program_ids(transaction: &Transaction) -> Vec<Pubkey> {
    let message = &transaction.message;
    message
        .instructions
        .iter()
        .map(|ix| *ix.program_id(&message.account_keys))
        .collect()
}

#[tokio::test]
async fn compress_token_checks_the_source_balance_first() {
    let (engine, rpc, _indexer) = engine();
    let owner = Keypair::new();
    let mint = Pubkey::new_unique();
    let pool = pool_pda(&mint, 0);
    rpc.set_account(pool, spl_token_account(0));
    let source = get_associated_token_address(&owner.pubkey(), &mint, &spl_token::ID);
    rpc.set_account(source, spl_token_account(50));
    let signers = ActionSigners::single(&owner);

    let err = engine
        .compress_token(signers, mint, 60, owner.pubkey())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WalletError::InsufficientFunds {
            requested: 60,
            available: 50
        }
    ));
    assert_eq!(rpc.sent_count(), 0);

    engine
        .compress_token(signers, mint, 40, owner.pubkey())
        .await
        .unwrap();
    assert_eq!(rpc.sent_count(), 1);
    let keys = last_sent(&rpc).message.account_keys;
    assert!(keys.contains(&pool));
    assert!(keys.contains(&source));
}

#[tokio::test]
async fn compress_token_without_a_pool_is_reported() {
    let (engine, rpc, _indexer) = engine();
    let owner = Keypair::new();
    let mint = Pubkey::new_unique();

    let err = engine
        .compress_token(ActionSigners::single(&owner), mint, 1, owner.pubkey())
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::TokenPoolNotFound(m) if m == mint));
    assert_eq!(rpc.sent_count(), 0);
}

#[tokio::test]
async fn decompress_token_creates_a_missing_destination() {
    let (engine, rpc, indexer) = engine();
    let owner = Keypair::new();
    let recipient = Pubkey::new_unique();
    let mint = Pubkey::new_unique();
    indexer.set_token_accounts(
        owner.pubkey(),
        vec![token_account(owner.pubkey(), mint, 100, AccountState::Initialized, 11)],
    );
    rpc.set_account(pool_pda(&mint, 0), spl_token_account(500));
    let signers = ActionSigners::single(&owner);

    engine
        .decompress_token(signers, mint, 30, recipient)
        .await
        .unwrap();
    let programs = program_ids(&last_sent(&rpc));
    assert_eq!(programs.len(), 3);
    assert_eq!(programs[1], ASSOCIATED_TOKEN_PROGRAM_ID);
    assert_eq!(programs[2], LightProgramIds::default().compressed_token_program);

    let destination = get_associated_token_address(&recipient, &mint, &spl_token::ID);
    rpc.set_account(destination, spl_token_account(30));
    engine
        .decompress_token(signers, mint, 30, recipient)
        .await
        .unwrap();
    let programs = program_ids(&last_sent(&rpc));
    assert_eq!(programs.len(), 2);
    assert!(!programs.contains(&ASSOCIATED_TOKEN_PROGRAM_ID));
}

#[tokio::test]
async fn decompress_token_prefers_a_single_covering_pool() {
    let (engine, rpc, indexer) = engine();
    let owner = Keypair::new();
    let mint = Pubkey::new_unique();
    indexer.set_token_accounts(
        owner.pubkey(),
        vec![token_account(owner.pubkey(), mint, 100, AccountState::Initialized, 11)],
    );
    let pools = [pool_pda(&mint, 0), pool_pda(&mint, 1), pool_pda(&mint, 2)];
    rpc.set_account(pools[0], spl_token_account(10));
    rpc.set_account(pools[1], spl_token_account(80));
    rpc.set_account(pools[2], spl_token_account(0));
    let signers = ActionSigners::single(&owner);

    engine
        .decompress_token(signers, mint, 50, owner.pubkey())
        .await
        .unwrap();
    let keys = last_sent(&rpc).message.account_keys;
    assert!(keys.contains(&pools[1]));
    assert!(!keys.contains(&pools[0]));
    assert!(!keys.contains(&pools[2]));

    // No single pool holds 85, so every initialized pool is passed.
    engine
        .decompress_token(signers, mint, 85, owner.pubkey())
        .await
        .unwrap();
    let keys = last_sent(&rpc).message.account_keys;
    for pool in &pools {
        assert!(keys.contains(pool));
    }
    assert!(!keys.contains(&pool_pda(&mint, 3)));
}

#[tokio::test]
async fn token_inputs_skip_other_mints_and_frozen_accounts() {
    let (engine, rpc, indexer) = engine();
    let owner = Keypair::new();
    let mint = Pubkey::new_unique();
    let spendable = token_account(owner.pubkey(), mint, 30, AccountState::Initialized, 11);
    indexer.set_token_accounts(
        owner.pubkey(),
        vec![
            spendable.clone(),
            token_account(owner.pubkey(), Pubkey::new_unique(), 100, AccountState::Initialized, 12),
            token_account(owner.pubkey(), mint, 50, AccountState::Frozen, 13),
        ],
    );
    let signers = ActionSigners::single(&owner);

    let err = engine
        .transfer_token(signers, mint, 40, Pubkey::new_unique())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WalletError::InsufficientFunds {
            requested: 40,
            available: 30
        }
    ));
    assert_eq!(indexer.proof_calls(), 0);

    engine
        .transfer_token(signers, mint, 20, Pubkey::new_unique())
        .await
        .unwrap();
    let requests = indexer.proof_requests.lock().unwrap().clone();
    assert_eq!(requests, vec![vec![spendable.account.hash]]);
    assert_eq!(rpc.sent_count(), 1);
}

#[tokio::test]
async fn receive_account_is_created_only_when_missing() {
    let (engine, rpc, _indexer) = engine();
    let payer = Keypair::new();
    let recipient = Pubkey::new_unique();
    let mint = Pubkey::new_unique();
    rpc.set_account(mint, mint_account());
    let address = get_associated_token_address(&recipient, &mint, &spl_token::ID);

    let created = engine
        .get_or_create_receive_account(&payer, mint, recipient)
        .await
        .unwrap();
    assert_eq!(created.address, address);
    assert_eq!(created.amount, 0);
    assert_eq!(rpc.sent_count(), 1);
    assert!(program_ids(&last_sent(&rpc)).contains(&ASSOCIATED_TOKEN_PROGRAM_ID));

    rpc.set_account(address, spl_token_account(25));
    let existing = engine
        .get_or_create_receive_account(&payer, mint, recipient)
        .await
        .unwrap();
    assert_eq!(existing.address, address);
    assert_eq!(existing.amount, 25);
    assert_eq!(rpc.sent_count(), 1);
}
