//! Entry points for an agent that moves funds on the user's behalf.
//!
//! Every tool returns a [`ToolResponse`] that serializes to
//! `{ "success": bool, "result" | "error": ... }`.

use std::{str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, warn};

use crate::{
    balance::RefreshOptions,
    constants::{LAMPORTS_PER_SOL, NO_WALLET_LOADED},
    engine::{ActionSigners, CompressionEngine, DynSigner},
    error::{Outcome, WalletError},
    indexer::Indexer,
    rpc::RpcConnection,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResponse {
    pub fn ok(result: Value) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }

    fn from_error(err: &WalletError) -> Self {
        match err.outcome() {
            Outcome::NotExecuted => Self::err(err.to_string()),
            Outcome::MaybeExecuted => Self::err(format!(
                "{}. The transfer may still complete, check the balance before retrying.",
                err
            )),
        }
    }
}

/// Converts a SOL amount to lamports, rounding to the nearest lamport.
pub fn sol_to_lamports(amount: f64) -> Result<u64, WalletError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(WalletError::InvalidAmount(
            "Amount must be a positive number".to_string(),
        ));
    }
    let lamports = (amount * LAMPORTS_PER_SOL as f64).round();
    if lamports < 1.0 {
        return Err(WalletError::InvalidAmount(
            "Amount is smaller than one lamport".to_string(),
        ));
    }
    if lamports >= u64::MAX as f64 {
        return Err(WalletError::InvalidAmount("Amount is too large".to_string()));
    }
    Ok(lamports as u64)
}

fn parse_recipient(recipient: &str) -> Result<Pubkey, WalletError> {
    Pubkey::from_str(recipient.trim())
        .map_err(|_| WalletError::InvalidRecipient(recipient.to_string()))
}

pub struct WalletTools<R: RpcConnection, I: Indexer> {
    engine: CompressionEngine<R, I>,
    wallet: Option<Arc<DynSigner>>,
}

impl<R: RpcConnection, I: Indexer> WalletTools<R, I> {
    pub fn new(engine: CompressionEngine<R, I>, wallet: Option<Arc<DynSigner>>) -> Self {
        Self { engine, wallet }
    }

    pub fn set_wallet(&mut self, wallet: Option<Arc<DynSigner>>) {
        self.wallet = wallet;
    }

    pub fn engine(&self) -> &CompressionEngine<R, I> {
        &self.engine
    }

    /// Dispatches a tool call by name with JSON arguments.
    pub async fn call(&self, name: &str, args: &Value) -> ToolResponse {
        debug!("Tool call {} {}", name, args);
        let amount = args.get("amount").and_then(Value::as_f64);
        let recipient = args.get("recipient").and_then(Value::as_str);
        match (name, amount, recipient) {
            ("get_balance", _, _) => self.get_balance().await,
            ("get_private_balance", _, _) => self.get_private_balance().await,
            ("shield_funds", Some(amount), _) => self.shield_funds(amount).await,
            ("private_send", Some(amount), Some(recipient)) => {
                self.private_send(amount, recipient).await
            }
            ("unshield_funds", Some(amount), recipient) => {
                self.unshield_funds(amount, recipient).await
            }
            ("shield_funds" | "private_send" | "unshield_funds", _, _) => {
                ToolResponse::err(format!("Missing or invalid arguments for {}", name))
            }
            _ => ToolResponse::err(format!("Unknown tool: {}", name)),
        }
    }

    pub async fn get_balance(&self) -> ToolResponse {
        let Some(wallet) = &self.wallet else {
            return ToolResponse::err(NO_WALLET_LOADED);
        };
        self.engine
            .refresh(Some(wallet.pubkey()), RefreshOptions::loud())
            .await;
        let view = self.engine.get_total_balance();
        let summary = format!(
            "Total: {:.4} SOL (Public: {:.4}, Shielded: {:.4})",
            view.total_sol(),
            view.public_sol(),
            view.compressed_sol()
        );
        ToolResponse::ok(json!({
            "totalSol": view.total_sol(),
            "publicSol": view.public_sol(),
            "privateSol": view.compressed_sol(),
            "privateError": view.error,
            "summary": summary,
        }))
    }

    pub async fn get_private_balance(&self) -> ToolResponse {
        let Some(wallet) = &self.wallet else {
            return ToolResponse::err(NO_WALLET_LOADED);
        };
        self.engine
            .refresh(Some(wallet.pubkey()), RefreshOptions::loud())
            .await;
        let view = self.engine.get_total_balance();
        ToolResponse::ok(json!({
            "privateSol": view.compressed_sol(),
            "privateError": view.error,
            "summary": format!("{:.4} SOL (shielded)", view.compressed_sol()),
        }))
    }

    /// Compresses `amount` SOL of the wallet's public balance.
    pub async fn shield_funds(&self, amount: f64) -> ToolResponse {
        let Some(wallet) = &self.wallet else {
            return ToolResponse::err(NO_WALLET_LOADED);
        };
        let result = async {
            let lamports = sol_to_lamports(amount)?;
            self.engine
                .compress_sol(ActionSigners::single(wallet.as_ref()), lamports)
                .await
        }
        .await;
        match result {
            Ok(signature) => ToolResponse::ok(json!({
                "txHash": signature.to_string(),
                "status": "confirmed",
                "amount": amount,
            })),
            Err(err) => {
                warn!("shield_funds failed: {}", err);
                ToolResponse::from_error(&err)
            }
        }
    }

    /// Sends `amount` compressed SOL to `recipient`.
    pub async fn private_send(&self, amount: f64, recipient: &str) -> ToolResponse {
        let Some(wallet) = &self.wallet else {
            return ToolResponse::err(NO_WALLET_LOADED);
        };
        let result = async {
            let lamports = sol_to_lamports(amount)?;
            let recipient = parse_recipient(recipient)?;
            let signature = self
                .engine
                .transfer_sol(ActionSigners::single(wallet.as_ref()), lamports, recipient)
                .await?;
            Ok::<_, WalletError>((signature, recipient))
        }
        .await;
        match result {
            Ok((signature, recipient)) => ToolResponse::ok(json!({
                "txHash": signature.to_string(),
                "status": "confirmed",
                "recipient": recipient.to_string(),
                "amount": amount,
            })),
            Err(err) => {
                warn!("private_send failed: {}", err);
                ToolResponse::from_error(&err)
            }
        }
    }

    /// Decompresses `amount` SOL to `recipient`, or to the wallet itself.
    pub async fn unshield_funds(&self, amount: f64, recipient: Option<&str>) -> ToolResponse {
        let Some(wallet) = &self.wallet else {
            return ToolResponse::err(NO_WALLET_LOADED);
        };
        let result = async {
            let lamports = sol_to_lamports(amount)?;
            let recipient = match recipient {
                Some(recipient) => parse_recipient(recipient)?,
                None => wallet.pubkey(),
            };
            let signature = self
                .engine
                .decompress_sol(ActionSigners::single(wallet.as_ref()), lamports, recipient)
                .await?;
            Ok::<_, WalletError>((signature, recipient))
        }
        .await;
        match result {
            Ok((signature, recipient)) => ToolResponse::ok(json!({
                "txHash": signature.to_string(),
                "status": "confirmed",
                "recipient": recipient.to_string(),
                "amount": amount,
            })),
            Err(err) => {
                warn!("unshield_funds failed: {}", err);
                ToolResponse::from_error(&err)
            }
        }
    }
}
