use std::{future::Future, sync::Arc};

use tracing::{debug, warn};

use crate::{
    error::WalletError,
    indexer::{Hash, Indexer, IndexerError, ValidityProofWithContext},
};

/// Fetches validity proofs for selected inputs.
///
/// A proof binds to the tree roots current at request time, so it is fetched
/// right before assembly and never cached.
#[derive(Debug)]
pub struct ProofAnchor<I: Indexer> {
    indexer: Arc<I>,
}

impl<I: Indexer> Clone for ProofAnchor<I> {
    fn clone(&self) -> Self {
        Self {
            indexer: self.indexer.clone(),
        }
    }
}

impl<I: Indexer> ProofAnchor<I> {
    pub fn new(indexer: Arc<I>) -> Self {
        Self { indexer }
    }

    pub async fn get_proof(
        &self,
        hashes: Vec<Hash>,
    ) -> Result<ValidityProofWithContext, IndexerError> {
        let expected = hashes.len();
        let response = self.indexer.get_validity_proof(hashes, None).await?;
        let proof = response.value;
        if proof.root_indices.len() != expected {
            return Err(IndexerError::InvalidResponseData(format!(
                "proof carries {} root indices for {} inputs",
                proof.root_indices.len(),
                expected
            )));
        }
        debug!(
            "Fetched validity proof at slot {} for {} inputs",
            response.context.slot, expected
        );
        Ok(proof)
    }
}

/// Runs `attempt` until it produces a result that is not a stale proof.
///
/// Each attempt must start from fetching accounts so that re-selection sees
/// the current tree. After `max_attempts` stale proofs the action fails with
/// `ProofExpired`.
pub async fn with_fresh_proof<T, F, Fut>(
    max_attempts: u32,
    mut attempt: F,
) -> Result<T, WalletError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, WalletError>>,
{
    let max_attempts = max_attempts.max(1);
    for n in 1..=max_attempts {
        match attempt(n).await {
            Err(WalletError::Indexer(IndexerError::StaleProof(message))) => {
                warn!(
                    "Validity proof went stale (attempt {}/{}): {}",
                    n, max_attempts, message
                );
            }
            other => return other,
        }
    }
    Err(WalletError::ProofExpired {
        attempts: max_attempts,
    })
}
