use std::io;

use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_sdk::{signer::SignerError, transaction::TransactionError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("TransactionError: {0}")]
    TransactionError(#[from] Box<TransactionError>),

    #[error("ClientError: {0}")]
    ClientError(#[from] Box<ClientError>),

    #[error("SignerError: {0}")]
    SignerError(#[from] Box<SignerError>),

    #[error("IoError: {0}")]
    IoError(#[from] Box<io::Error>),

    #[error("Error: `{0}`")]
    CustomError(String),
}

impl From<TransactionError> for RpcError {
    fn from(err: TransactionError) -> Self {
        RpcError::TransactionError(Box::new(err))
    }
}

impl From<ClientError> for RpcError {
    fn from(err: ClientError) -> Self {
        RpcError::ClientError(Box::new(err))
    }
}

impl From<SignerError> for RpcError {
    fn from(err: SignerError) -> Self {
        RpcError::SignerError(Box::new(err))
    }
}

impl From<io::Error> for RpcError {
    fn from(err: io::Error) -> Self {
        RpcError::IoError(Box::new(err))
    }
}

impl RpcError {
    /// Transport failures where the request never reached a node.
    pub fn is_transient(&self) -> bool {
        match self {
            RpcError::ClientError(err) => {
                matches!(err.kind(), ClientErrorKind::Io(_) | ClientErrorKind::Reqwest(_))
            }
            RpcError::IoError(_) => true,
            _ => false,
        }
    }
}
