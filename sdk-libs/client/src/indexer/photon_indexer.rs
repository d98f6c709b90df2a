use std::fmt::Debug;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, error, trace, warn};

use super::{
    indexer_trait::{
        AccountsResult, BalanceResult, ProofResult, SignaturesResult, TokenAccountsResult,
        TokenBalancesResult,
    },
    AccountState, Base58Conversions, CompressedAccount, CompressedAccountData, CompressedProof,
    CompressedTokenAccount, Context, GetCompressedTokenAccountsByOwnerOptions, Hash, Indexer,
    IndexerError, IndexerRpcConfig, ItemsWithCursor, PaginatedOptions, Response, RetryConfig,
    SignatureWithMetadata, TokenBalance, TokenData, ValidityProofWithContext,
};
use crate::indexer::base58::{decode_base58_option_to_pubkey, decode_base58_to_fixed_array};

const JSON_RPC_ID: &str = "light-wallet";

/// JSON-RPC client for a Photon compression indexer.
pub struct PhotonIndexer {
    url: String,
    api_key: Option<String>,
    client: reqwest::Client,
    retry_config: RetryConfig,
}

impl PhotonIndexer {
    pub fn new(url: String, api_key: Option<String>) -> Self {
        Self {
            url,
            api_key,
            client: reqwest::Client::new(),
            retry_config: RetryConfig::default(),
        }
    }

    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    fn endpoint(&self) -> String {
        match &self.api_key {
            Some(key) => {
                let separator = if self.url.contains('?') { '&' } else { '?' };
                format!("{}{}api-key={}", self.url, separator, key)
            }
            None => self.url.clone(),
        }
    }

    fn resolve_config(&self, config: Option<IndexerRpcConfig>) -> IndexerRpcConfig {
        config.unwrap_or_else(|| IndexerRpcConfig::at_slot(0, self.retry_config.clone()))
    }

    async fn retry<F, Fut, T>(
        &self,
        config: RetryConfig,
        mut operation: F,
    ) -> Result<T, IndexerError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, IndexerError>>,
    {
        let max_retries = config.attempts();
        let mut attempts = 0;

        loop {
            attempts += 1;
            trace!("Attempt {}/{}: Executing operation", attempts, max_retries);

            match operation().await {
                Ok(value) => {
                    trace!("Attempt {}/{}: Operation succeeded.", attempts, max_retries);
                    return Ok(value);
                }
                Err(e) => {
                    let is_retryable = e.is_retryable();
                    if is_retryable && attempts < max_retries {
                        warn!(
                            "Attempt {}/{}: Operation failed: {}. Retrying",
                            attempts, max_retries, e
                        );
                        tokio::time::sleep(config.delay(attempts)).await;
                    } else {
                        if is_retryable {
                            error!("Operation failed after max retries.");
                        } else {
                            debug!("Operation failed with non-retryable error: {}", e);
                        }
                        return Err(e);
                    }
                }
            }
        }
    }

    async fn call<P, T>(&self, method: &str, params: &P) -> Result<T, IndexerError>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: JSON_RPC_ID,
            method,
            params,
        };
        let response = self
            .client
            .post(self.endpoint())
            .json(&request)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            // JSON-RPC errors may still arrive with a non-2xx status.
            if let Ok(JsonRpcResponse::<serde_json::Value> {
                error: Some(error), ..
            }) = serde_json::from_str(&body)
            {
                return Err(IndexerError::from_rpc_error(
                    method,
                    error.code,
                    error.message,
                ));
            }
            return Err(IndexerError::PhotonError {
                context: method.to_string(),
                message: format!("HTTP {}: {}", status, body),
            });
        }
        let response: JsonRpcResponse<T> = serde_json::from_str(&body)
            .map_err(|e| IndexerError::InvalidResponseData(format!("{}: {}", method, e)))?;
        Self::extract_result_with_error_check(method, response.error, response.result)
    }

    fn extract_result_with_error_check<T>(
        context: &str,
        error: Option<JsonRpcError>,
        result: Option<T>,
    ) -> Result<T, IndexerError> {
        if let Some(error) = error {
            return Err(IndexerError::from_rpc_error(
                context,
                error.code,
                error.message,
            ));
        }
        result.ok_or_else(|| IndexerError::missing_result(context, "value not present"))
    }

    async fn call_with_context<P, T>(
        &self,
        method: &str,
        params: &P,
        min_slot: u64,
    ) -> Result<(Context, T), IndexerError>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response: PhotonResponse<T> = self.call(method, params).await?;
        if response.context.slot < min_slot {
            return Err(IndexerError::IndexerNotSyncedToSlot);
        }
        Ok((
            Context {
                slot: response.context.slot,
            },
            response.value,
        ))
    }
}

impl Debug for PhotonIndexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhotonIndexer")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[async_trait]
impl Indexer for PhotonIndexer {
    async fn get_compressed_balance_by_owner(
        &self,
        owner: &Pubkey,
        config: Option<IndexerRpcConfig>,
    ) -> Result<BalanceResult, IndexerError> {
        let config = self.resolve_config(config);
        self.retry(config.retry_config, || async {
            let params = OwnerParams {
                owner: owner.to_base58(),
                mint: None,
                cursor: None,
                limit: None,
            };
            let (context, value): (Context, U64Value) = self
                .call_with_context("getCompressedBalanceByOwner", &params, config.slot)
                .await?;
            Ok(Response {
                context,
                value: value.0,
            })
        })
        .await
    }

    async fn get_compressed_token_balances_by_owner(
        &self,
        owner: &Pubkey,
        options: Option<PaginatedOptions>,
        config: Option<IndexerRpcConfig>,
    ) -> Result<TokenBalancesResult, IndexerError> {
        let config = self.resolve_config(config);
        let options = options.unwrap_or_default();
        self.retry(config.retry_config, || async {
            let params = OwnerParams {
                owner: owner.to_base58(),
                mint: None,
                cursor: options.cursor.clone(),
                limit: options.limit,
            };
            let (context, page): (Context, PhotonPage<PhotonTokenBalance>) = self
                .call_with_context(
                    "getCompressedTokenBalancesByOwnerV2",
                    &params,
                    config.slot,
                )
                .await?;
            let items = page
                .items
                .iter()
                .map(TokenBalance::try_from)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Response {
                context,
                value: ItemsWithCursor {
                    items,
                    cursor: page.cursor,
                },
            })
        })
        .await
    }

    async fn get_compressed_accounts_by_owner(
        &self,
        owner: &Pubkey,
        options: Option<PaginatedOptions>,
        config: Option<IndexerRpcConfig>,
    ) -> Result<AccountsResult, IndexerError> {
        let config = self.resolve_config(config);
        let options = options.unwrap_or_default();
        self.retry(config.retry_config, || async {
            let params = OwnerParams {
                owner: owner.to_base58(),
                mint: None,
                cursor: options.cursor.clone(),
                limit: options.limit,
            };
            let (context, page): (Context, PhotonPage<PhotonAccount>) = self
                .call_with_context("getCompressedAccountsByOwner", &params, config.slot)
                .await?;
            let items = page
                .items
                .iter()
                .map(CompressedAccount::try_from)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Response {
                context,
                value: ItemsWithCursor {
                    items,
                    cursor: page.cursor,
                },
            })
        })
        .await
    }

    async fn get_compressed_token_accounts_by_owner(
        &self,
        owner: &Pubkey,
        options: Option<GetCompressedTokenAccountsByOwnerOptions>,
        config: Option<IndexerRpcConfig>,
    ) -> Result<TokenAccountsResult, IndexerError> {
        let config = self.resolve_config(config);
        let options = options.unwrap_or_default();
        self.retry(config.retry_config, || async {
            let params = OwnerParams {
                owner: owner.to_base58(),
                mint: options.mint.map(|mint| mint.to_base58()),
                cursor: options.cursor.clone(),
                limit: options.limit,
            };
            let (context, page): (Context, PhotonPage<PhotonTokenAccount>) = self
                .call_with_context("getCompressedTokenAccountsByOwner", &params, config.slot)
                .await?;
            let items = page
                .items
                .iter()
                .map(CompressedTokenAccount::try_from)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Response {
                context,
                value: ItemsWithCursor {
                    items,
                    cursor: page.cursor,
                },
            })
        })
        .await
    }

    async fn get_validity_proof(
        &self,
        hashes: Vec<Hash>,
        config: Option<IndexerRpcConfig>,
    ) -> Result<ProofResult, IndexerError> {
        if hashes.is_empty() {
            return Err(IndexerError::InvalidParameters(
                "at least one hash is required".to_string(),
            ));
        }
        let config = self.resolve_config(config);
        self.retry(config.retry_config, || async {
            let params = ValidityProofParams {
                hashes: hashes.iter().map(|hash| hash.to_base58()).collect(),
                new_addresses_with_trees: Vec::new(),
            };
            let (context, proof): (Context, PhotonValidityProof) = self
                .call_with_context("getValidityProof", &params, config.slot)
                .await?;
            let value = ValidityProofWithContext::try_from(&proof)?;
            if value.root_indices.len() != hashes.len() {
                return Err(IndexerError::InvalidResponseData(format!(
                    "proof covers {} roots for {} hashes",
                    value.root_indices.len(),
                    hashes.len()
                )));
            }
            Ok(Response { context, value })
        })
        .await
    }

    async fn get_compression_signatures_for_owner(
        &self,
        owner: &Pubkey,
        options: Option<PaginatedOptions>,
        config: Option<IndexerRpcConfig>,
    ) -> Result<SignaturesResult, IndexerError> {
        let config = self.resolve_config(config);
        let options = options.unwrap_or_default();
        self.retry(config.retry_config, || async {
            let params = OwnerParams {
                owner: owner.to_base58(),
                mint: None,
                cursor: options.cursor.clone(),
                limit: options.limit,
            };
            let (context, page): (Context, PhotonPage<PhotonSignature>) = self
                .call_with_context("getCompressionSignaturesForOwner", &params, config.slot)
                .await?;
            let items = page
                .items
                .into_iter()
                .map(|item| SignatureWithMetadata {
                    block_time: item.block_time,
                    signature: item.signature,
                    slot: item.slot,
                })
                .collect();
            Ok(Response {
                context,
                value: ItemsWithCursor {
                    items,
                    cursor: page.cursor,
                },
            })
        })
        .await
    }

    async fn get_indexer_slot(&self, config: Option<RetryConfig>) -> Result<u64, IndexerError> {
        let config = config.unwrap_or_else(|| self.retry_config.clone());
        self.retry(config, || async {
            let slot: U64Value = self.call("getIndexerSlot", &serde_json::Map::new()).await?;
            Ok(slot.0)
        })
        .await
    }

    async fn get_indexer_health(&self) -> Result<(), IndexerError> {
        let status: String = self
            .call("getIndexerHealth", &serde_json::Map::new())
            .await?;
        if status != "ok" {
            return Err(IndexerError::ApiError(format!("indexer unhealthy: {}", status)));
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct JsonRpcRequest<'a, P: ?Sized> {
    jsonrpc: &'static str,
    id: &'static str,
    method: &'a str,
    params: &'a P,
}

#[derive(Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OwnerParams {
    owner: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    mint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cursor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u16>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidityProofParams {
    hashes: Vec<String>,
    new_addresses_with_trees: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct PhotonContext {
    slot: u64,
}

#[derive(Deserialize)]
struct PhotonResponse<T> {
    context: PhotonContext,
    value: T,
}

#[derive(Deserialize)]
struct PhotonPage<T> {
    items: Vec<T>,
    #[serde(default)]
    cursor: Option<String>,
}

/// Photon encodes 64-bit integers as JSON numbers, some deployments as strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct U64Value(u64);

impl<'de> Deserialize<'de> for U64Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum NumberOrString {
            Number(u64),
            String(String),
        }
        match NumberOrString::deserialize(deserializer)? {
            NumberOrString::Number(value) => Ok(U64Value(value)),
            NumberOrString::String(value) => value
                .parse::<u64>()
                .map(U64Value)
                .map_err(serde::de::Error::custom),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PhotonAccountData {
    discriminator: U64Value,
    data: String,
    data_hash: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PhotonAccount {
    hash: String,
    owner: String,
    lamports: U64Value,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    data: Option<PhotonAccountData>,
    tree: String,
    #[serde(default)]
    queue: Option<String>,
    leaf_index: u32,
    #[serde(default)]
    prove_by_index: bool,
    #[serde(default)]
    slot_created: Option<U64Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PhotonTokenData {
    mint: String,
    owner: String,
    amount: U64Value,
    #[serde(default)]
    delegate: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PhotonTokenAccount {
    account: PhotonAccount,
    token_data: PhotonTokenData,
}

#[derive(Deserialize)]
struct PhotonTokenBalance {
    mint: String,
    balance: U64Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PhotonSignature {
    #[serde(default)]
    block_time: u64,
    signature: String,
    slot: u64,
}

#[derive(Deserialize)]
struct PhotonCompressedProof {
    a: Vec<u8>,
    b: Vec<u8>,
    c: Vec<u8>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PhotonValidityProof {
    #[serde(default)]
    compressed_proof: Option<PhotonCompressedProof>,
    root_indices: Vec<u64>,
    #[serde(default)]
    leaf_indices: Vec<u32>,
    #[serde(default)]
    leaves: Vec<String>,
    #[serde(default)]
    merkle_trees: Vec<String>,
    #[serde(default)]
    roots: Vec<String>,
}

fn decode_pubkey(field: &str, value: &str) -> Result<Pubkey, IndexerError> {
    Pubkey::from_base58(value).map_err(|e| IndexerError::base58_decode_error(field, e))
}

fn fixed<const N: usize>(field: &str, bytes: &[u8]) -> Result<[u8; N], IndexerError> {
    bytes.try_into().map_err(|_| {
        IndexerError::InvalidResponseData(format!(
            "{}: expected {} bytes, got {}",
            field,
            N,
            bytes.len()
        ))
    })
}

impl TryFrom<&PhotonAccount> for CompressedAccount {
    type Error = IndexerError;

    fn try_from(account: &PhotonAccount) -> Result<Self, Self::Error> {
        let data = account
            .data
            .as_ref()
            .map(|data| -> Result<CompressedAccountData, IndexerError> {
                Ok(CompressedAccountData {
                    discriminator: data.discriminator.0.to_le_bytes(),
                    data: base64::decode(&data.data).map_err(|e| {
                        IndexerError::InvalidResponseData(format!("account data: {}", e))
                    })?,
                    data_hash: decode_base58_to_fixed_array(&data.data_hash)?,
                })
            })
            .transpose()?;
        Ok(CompressedAccount {
            hash: decode_base58_to_fixed_array(&account.hash)?,
            owner: decode_pubkey("owner", &account.owner)?,
            lamports: account.lamports.0,
            address: account
                .address
                .as_deref()
                .map(decode_base58_to_fixed_array)
                .transpose()?,
            data,
            tree: decode_pubkey("tree", &account.tree)?,
            queue: decode_base58_option_to_pubkey(&account.queue)?,
            leaf_index: account.leaf_index,
            prove_by_index: account.prove_by_index,
            slot_created: account.slot_created.map(|slot| slot.0).unwrap_or_default(),
        })
    }
}

impl TryFrom<&PhotonTokenAccount> for CompressedTokenAccount {
    type Error = IndexerError;

    fn try_from(value: &PhotonTokenAccount) -> Result<Self, Self::Error> {
        let token = &value.token_data;
        let state = match token.state.as_deref() {
            Some("frozen") => AccountState::Frozen,
            _ => AccountState::Initialized,
        };
        Ok(CompressedTokenAccount {
            account: CompressedAccount::try_from(&value.account)?,
            token: TokenData {
                mint: decode_pubkey("mint", &token.mint)?,
                owner: decode_pubkey("owner", &token.owner)?,
                amount: token.amount.0,
                delegate: decode_base58_option_to_pubkey(&token.delegate)?,
                state,
            },
        })
    }
}

impl TryFrom<&PhotonTokenBalance> for TokenBalance {
    type Error = IndexerError;

    fn try_from(value: &PhotonTokenBalance) -> Result<Self, Self::Error> {
        Ok(TokenBalance {
            mint: decode_pubkey("mint", &value.mint)?,
            balance: value.balance.0,
        })
    }
}

impl TryFrom<&PhotonValidityProof> for ValidityProofWithContext {
    type Error = IndexerError;

    fn try_from(value: &PhotonValidityProof) -> Result<Self, Self::Error> {
        let proof = value
            .compressed_proof
            .as_ref()
            .map(|proof| -> Result<CompressedProof, IndexerError> {
                Ok(CompressedProof {
                    a: fixed("proof.a", &proof.a)?,
                    b: fixed("proof.b", &proof.b)?,
                    c: fixed("proof.c", &proof.c)?,
                })
            })
            .transpose()?;
        let root_indices = value
            .root_indices
            .iter()
            .map(|index| {
                u16::try_from(*index).map_err(|_| {
                    IndexerError::InvalidResponseData(format!("root index {} out of range", index))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ValidityProofWithContext {
            proof,
            root_indices,
            leaf_indices: value.leaf_indices.clone(),
            leaves: value
                .leaves
                .iter()
                .map(|leaf| decode_base58_to_fixed_array(leaf))
                .collect::<Result<Vec<_>, _>>()?,
            merkle_trees: value
                .merkle_trees
                .iter()
                .map(|tree| decode_pubkey("merkleTrees", tree))
                .collect::<Result<Vec<_>, _>>()?,
            roots: value
                .roots
                .iter()
                .map(|root| decode_base58_to_fixed_array(root))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }
}
