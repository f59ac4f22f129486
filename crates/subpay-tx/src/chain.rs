//! External collaborators: chain queries, wallet signing, assembly and
//! submission.
//!
//! The protocol layer only consumes these traits. Production code backs them
//! with a node or indexer client and a wallet; tests use the in-memory ledger
//! behind the `memory` feature.

use async_trait::async_trait;
use subpay_types::{Address, AssetClass, TxHash, Utxo};
use thiserror::Error;

use crate::plan::TxPlan;
use crate::transaction::{SignedTx, UnsignedTx, Witness};
use crate::TxError;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("chain query failed: {0}")]
    Query(String),

    #[error("transaction assembly failed: {0}")]
    Assembly(String),

    #[error("signing failed: {0}")]
    Signing(String),

    /// Rejected by the chain. Resubmitting the same transaction is unsafe.
    #[error("transaction rejected: {0}")]
    Rejected(String),

    #[error("insufficient funds: need {need} of {unit}, have {have}")]
    InsufficientFunds { unit: String, need: u64, have: u64 },

    #[error(transparent)]
    Tx(#[from] TxError),
}

/// Read access to chain state.
#[async_trait]
pub trait ChainProvider: Send + Sync {
    async fn utxos_at(&self, address: &Address) -> Result<Vec<Utxo>, ChainError>;

    /// Every UTxO holding `unit`, wherever it sits. For a unique token this
    /// is expected to be exactly one.
    async fn utxos_with_unit(&self, unit: &AssetClass) -> Result<Vec<Utxo>, ChainError>;

    async fn utxos_at_with_unit(
        &self,
        address: &Address,
        unit: &AssetClass,
    ) -> Result<Vec<Utxo>, ChainError> {
        let utxos = self.utxos_at(address).await?;
        Ok(utxos.into_iter().filter(|u| u.holds(unit)).collect())
    }
}

/// The acting party's wallet.
#[async_trait]
pub trait WalletSigner: Send + Sync {
    /// Address used for fee inputs, change and user tokens.
    fn address(&self) -> Address;

    /// Witness `tx` with every key the wallet holds.
    async fn sign(&self, tx: UnsignedTx) -> Result<SignedTx, ChainError>;

    /// Produce this wallet's witness only, for multi-party assembly.
    async fn partial_sign(&self, tx: &UnsignedTx) -> Result<Witness, ChainError>;
}

/// Turns a plan into a balanced, canonically ordered transaction body.
#[async_trait]
pub trait TxAssembler: Send + Sync {
    async fn assemble(&self, plan: TxPlan, change_address: &Address) -> Result<UnsignedTx, ChainError>;
}

#[async_trait]
pub trait TxSubmitter: Send + Sync {
    async fn submit(&self, tx: SignedTx) -> Result<TxHash, ChainError>;
}
