//! Protocol error types.

use subpay_tx::{ChainError, TxError};
use subpay_types::{DecodeError, LookupError, TokenNameError, ValueError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A required UTxO, address or token is absent. Refetch and retry.
    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("datum decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("validator not found in blueprint: {0}")]
    ValidatorNotFound(String),

    /// Surfaced verbatim from the submitter; never retried here.
    #[error("transaction rejected by chain: {0}")]
    ChainRejected(String),

    #[error("chain error: {0}")]
    Chain(ChainError),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("blueprint error: {0}")]
    Blueprint(String),

    #[error("arithmetic overflow: {0}")]
    Overflow(String),

    #[error("token naming: {0}")]
    TokenName(#[from] TokenNameError),

    #[error("value error: {0}")]
    Value(#[from] ValueError),

    #[error("transaction error: {0}")]
    Tx(#[from] TxError),
}

impl From<ChainError> for ProtocolError {
    fn from(e: ChainError) -> Self {
        match e {
            ChainError::Rejected(reason) => Self::ChainRejected(reason),
            ChainError::Tx(e) => Self::Tx(e),
            other => Self::Chain(other),
        }
    }
}

impl From<LookupError> for ProtocolError {
    fn from(e: LookupError) -> Self {
        Self::Precondition(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_maps_to_chain_rejected() {
        let e: ProtocolError = ChainError::Rejected("UTxO already spent".into()).into();
        assert!(matches!(e, ProtocolError::ChainRejected(ref m) if m == "UTxO already spent"));
        let e: ProtocolError = ChainError::Query("timeout".into()).into();
        assert!(matches!(e, ProtocolError::Chain(ChainError::Query(_))));
    }

    #[test]
    fn test_lookup_is_a_precondition() {
        let e: ProtocolError = LookupError::NotFound("user token".into()).into();
        assert!(matches!(e, ProtocolError::Precondition(_)));
    }
}
