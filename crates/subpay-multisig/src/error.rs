use subpay_offchain::ProtocolError;
use subpay_tx::ChainError;
use subpay_types::{DecodeError, KeyHash, TokenNameError, ValueError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MultisigError {
    #[error("invalid threshold: {0}")]
    InvalidThreshold(String),

    #[error("{0} is not a signer of this multisig")]
    NotASigner(KeyHash),

    #[error("duplicate witness from {0}")]
    DuplicateWitness(KeyHash),

    #[error("{have} of {need} required signatures collected")]
    Incomplete { have: usize, need: usize },

    #[error("amount {amount} exceeds the spending limit of {limit}")]
    SpendingLimit { amount: u64, limit: u64 },

    #[error("malformed pending transaction: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

pub type Result<T> = std::result::Result<T, MultisigError>;

impl From<ChainError> for MultisigError {
    fn from(e: ChainError) -> Self {
        Self::Protocol(e.into())
    }
}

impl From<DecodeError> for MultisigError {
    fn from(e: DecodeError) -> Self {
        Self::Protocol(e.into())
    }
}

impl From<ValueError> for MultisigError {
    fn from(e: ValueError) -> Self {
        Self::Protocol(e.into())
    }
}

impl From<TokenNameError> for MultisigError {
    fn from(e: TokenNameError) -> Self {
        Self::Protocol(e.into())
    }
}
