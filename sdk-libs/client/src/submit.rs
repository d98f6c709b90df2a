use std::time::Duration;

use solana_sdk::{signature::Signature, signer::Signer, transaction::Transaction};
use solana_transaction_status::TransactionConfirmationStatus;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::{
    error::WalletError,
    indexer::{is_stale_root_message, IndexerError},
    rpc::{RpcConnection, RpcError},
    transaction::UnsignedTransaction,
};

/// Signer handle shared between the engine and its callers.
pub type DynSigner = dyn Signer + Send + Sync;

/// Signs with the subset of `signers` the transaction requires.
///
/// Signers are matched by public key, so passing the same key twice, or a
/// payer that is also the owner, produces exactly one signature.
pub fn sign(
    unsigned: &UnsignedTransaction,
    signers: &[&DynSigner],
) -> Result<Transaction, WalletError> {
    let mut required: Vec<&dyn Signer> = Vec::with_capacity(unsigned.signers.len());
    for pubkey in &unsigned.signers {
        let signer = signers
            .iter()
            .find(|signer| signer.pubkey() == *pubkey)
            .ok_or_else(|| WalletError::Assembly(format!("missing signer {}", pubkey)))?;
        required.push(*signer);
    }
    let mut transaction = Transaction::new_unsigned(unsigned.message());
    transaction
        .try_sign(&required, unsigned.anchor.blockhash)
        .map_err(|e| WalletError::Assembly(e.to_string()))?;
    Ok(transaction)
}

fn rejection_message(err: RpcError) -> String {
    match err {
        RpcError::ClientError(err) => err.to_string(),
        RpcError::TransactionError(err) => err.to_string(),
        other => other.to_string(),
    }
}

/// Submits signed transactions once and polls for their confirmation.
#[derive(Debug)]
pub struct SubmitAndConfirm<'a, R: RpcConnection> {
    rpc: &'a R,
    timeout: Duration,
    poll_interval: Duration,
}

impl<'a, R: RpcConnection> SubmitAndConfirm<'a, R> {
    pub fn new(rpc: &'a R, timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            rpc,
            timeout,
            poll_interval,
        }
    }

    /// Sends once. A rejection naming an unknown or advanced root becomes
    /// `StaleProof` so the caller can re-prove.
    pub async fn submit(&self, transaction: &Transaction) -> Result<Signature, WalletError> {
        match self.rpc.send_transaction(transaction).await {
            Ok(signature) => {
                debug!("Submitted transaction {}", signature);
                Ok(signature)
            }
            Err(err) => {
                let message = rejection_message(err);
                warn!("Transaction rejected: {}", message);
                if is_stale_root_message(&message) {
                    return Err(IndexerError::StaleProof(message).into());
                }
                Err(WalletError::SubmissionRejected(message))
            }
        }
    }

    /// Waits until `signature` is confirmed and returns the slot it landed in.
    pub async fn confirm(&self, signature: Signature) -> Result<u64, WalletError> {
        let start = Instant::now();
        loop {
            match self.rpc.get_signature_statuses(&[signature]).await {
                Ok(statuses) => {
                    if let Some(Some(status)) = statuses.into_iter().next() {
                        if let Some(err) = status.err {
                            warn!("Transaction {} failed: {}", signature, err);
                            return Err(WalletError::SubmissionRejected(err.to_string()));
                        }
                        if matches!(
                            status.confirmation_status,
                            Some(TransactionConfirmationStatus::Confirmed)
                                | Some(TransactionConfirmationStatus::Finalized)
                        ) {
                            info!("Transaction {} confirmed in slot {}", signature, status.slot);
                            return Ok(status.slot);
                        }
                    }
                }
                Err(err) => {
                    warn!("Status lookup for {} failed: {:?}", signature, err);
                }
            }

            let elapsed = start.elapsed();
            if elapsed >= self.timeout {
                warn!("Transaction {} unconfirmed after {:?}", signature, elapsed);
                return Err(WalletError::ConfirmationTimeout { signature, elapsed });
            }
            sleep(self.poll_interval.min(self.timeout - elapsed)).await;
        }
    }

    pub async fn send_and_confirm(
        &self,
        unsigned: &UnsignedTransaction,
        signers: &[&DynSigner],
    ) -> Result<(Signature, u64), WalletError> {
        let transaction = sign(unsigned, signers)?;
        let signature = self.submit(&transaction).await?;
        let slot = self.confirm(signature).await?;
        Ok((signature, slot))
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
    };

    use async_trait::async_trait;
    use solana_sdk::{
        account::Account,
        hash::Hash,
        pubkey::Pubkey,
        signature::Keypair,
        system_instruction,
        transaction::TransactionError,
    };
    use solana_transaction_status::TransactionStatus;

    use super::*;
    use crate::transaction::Anchor;

    type StatusScript = VecDeque<Result<Option<TransactionStatus>, RpcError>>;

    #[derive(Debug, Default)]
    struct ScriptedRpc {
        statuses: Mutex<StatusScript>,
        reject_with: Option<String>,
        status_calls: AtomicUsize,
    }

    #[async_trait]
    impl RpcConnection for ScriptedRpc {
        fn get_url(&self) -> String {
            "scripted".to_string()
        }

        async fn health(&self) -> Result<(), RpcError> {
            Ok(())
        }

        async fn get_balance(&self, _pubkey: &Pubkey) -> Result<u64, RpcError> {
            Ok(0)
        }

        async fn get_account(&self, _address: Pubkey) -> Result<Option<Account>, RpcError> {
            Ok(None)
        }

        async fn get_latest_blockhash(&self) -> Result<(Hash, u64), RpcError> {
            Ok((Hash::default(), 0))
        }

        async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature, RpcError> {
            match &self.reject_with {
                Some(message) => Err(RpcError::CustomError(message.clone())),
                None => Ok(transaction.signatures[0]),
            }
        }

        async fn get_signature_statuses(
            &self,
            _signatures: &[Signature],
        ) -> Result<Vec<Option<TransactionStatus>>, RpcError> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            match self.statuses.lock().unwrap().pop_front() {
                Some(result) => result.map(|status| vec![status]),
                None => Ok(vec![None]),
            }
        }
    }

    fn status(confirmation: TransactionConfirmationStatus, err: Option<TransactionError>) -> TransactionStatus {
        TransactionStatus {
            slot: 42,
            confirmations: None,
            status: match &err {
                Some(e) => Err(e.clone()),
                None => Ok(()),
            },
            err,
            confirmation_status: Some(confirmation),
        }
    }

    fn unsigned(payer: &Keypair, signers: Vec<Pubkey>) -> UnsignedTransaction {
        UnsignedTransaction {
            instructions: vec![system_instruction::transfer(
                &payer.pubkey(),
                &Pubkey::new_unique(),
                1,
            )],
            payer: payer.pubkey(),
            signers,
            anchor: Anchor {
                blockhash: Hash::new_unique(),
                last_valid_block_height: 10,
            },
        }
    }

    #[test]
    fn duplicate_signers_sign_once() {
        let payer = Keypair::new();
        let tx = unsigned(&payer, vec![payer.pubkey()]);
        let signers: [&DynSigner; 2] = [&payer, &payer];
        let signed = sign(&tx, &signers).unwrap();
        assert_eq!(signed.signatures.len(), 1);
        assert!(signed.verify().is_ok());
    }

    #[test]
    fn missing_signer_fails_before_sending() {
        let payer = Keypair::new();
        let tx = unsigned(&payer, vec![payer.pubkey()]);
        let other = Keypair::new();
        let signers: [&DynSigner; 1] = [&other];
        assert!(matches!(
            sign(&tx, &signers),
            Err(WalletError::Assembly(m)) if m.contains(&payer.pubkey().to_string())
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn confirms_after_pending_polls() {
        let rpc = ScriptedRpc::default();
        {
            let mut script = rpc.statuses.lock().unwrap();
            script.push_back(Ok(None));
            script.push_back(Err(RpcError::CustomError("node busy".into())));
            script.push_back(Ok(Some(status(TransactionConfirmationStatus::Processed, None))));
            script.push_back(Ok(Some(status(TransactionConfirmationStatus::Confirmed, None))));
        }
        let submitter = SubmitAndConfirm::new(&rpc, Duration::from_secs(60), Duration::from_millis(500));
        let slot = submitter.confirm(Signature::default()).await.unwrap();
        assert_eq!(slot, 42);
        assert_eq!(rpc.status_calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_execution_is_a_rejection() {
        let rpc = ScriptedRpc::default();
        rpc.statuses.lock().unwrap().push_back(Ok(Some(status(
            TransactionConfirmationStatus::Confirmed,
            Some(TransactionError::InsufficientFundsForFee),
        ))));
        let submitter = SubmitAndConfirm::new(&rpc, Duration::from_secs(60), Duration::from_millis(500));
        let err = submitter.confirm(Signature::default()).await.unwrap_err();
        assert!(matches!(err, WalletError::SubmissionRejected(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_when_never_confirmed() {
        let rpc = ScriptedRpc::default();
        let submitter = SubmitAndConfirm::new(&rpc, Duration::from_secs(60), Duration::from_millis(500));
        let signature = Signature::new_unique();
        let err = submitter.confirm(signature).await.unwrap_err();
        match err {
            WalletError::ConfirmationTimeout {
                signature: timed_out,
                elapsed,
            } => {
                assert_eq!(timed_out, signature);
                assert!(elapsed >= Duration::from_secs(60));
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(rpc.status_calls.load(Ordering::SeqCst) >= 120);
    }

    #[tokio::test]
    async fn send_failure_keeps_node_message() {
        let rpc = ScriptedRpc {
            reject_with: Some("Blockhash not found".into()),
            ..Default::default()
        };
        let payer = Keypair::new();
        let signers: [&DynSigner; 1] = [&payer];
        let tx = sign(&unsigned(&payer, vec![payer.pubkey()]), &signers).unwrap();
        let submitter = SubmitAndConfirm::new(&rpc, Duration::from_secs(60), Duration::from_millis(500));
        let err = submitter.submit(&tx).await.unwrap_err();
        assert!(matches!(err, WalletError::SubmissionRejected(m) if m.contains("Blockhash not found")));
        assert_eq!(rpc.status_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn stale_root_rejection_is_a_stale_proof() {
        let rpc = ScriptedRpc {
            reject_with: Some(
                "Transaction simulation failed: root not found in root history".into(),
            ),
            ..Default::default()
        };
        let payer = Keypair::new();
        let signers: [&DynSigner; 1] = [&payer];
        let tx = sign(&unsigned(&payer, vec![payer.pubkey()]), &signers).unwrap();
        let submitter = SubmitAndConfirm::new(&rpc, Duration::from_secs(60), Duration::from_millis(500));
        let err = submitter.submit(&tx).await.unwrap_err();
        assert!(matches!(
            err,
            WalletError::Indexer(IndexerError::StaleProof(m)) if m.contains("root not found")
        ));
    }
}
