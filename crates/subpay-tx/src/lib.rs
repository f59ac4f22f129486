//! Transaction plumbing for the subscription-payment protocol.
//!
//! Workflows describe a transaction as a [`TxPlan`]: an ordered list of
//! instructions (collect inputs, mint, pay, attach scripts, set validity).
//! Redeemers that must name the position of an input are expressed as
//! [`PendingRedeemer`]s and only resolved once an assembler has fixed the
//! canonical input ordering. The chain itself is reached through the
//! collaborator traits in [`chain`]; the `memory` feature provides a
//! deterministic in-memory ledger implementing all of them.

pub mod chain;
pub mod indexed;
pub mod plan;
pub mod transaction;

#[cfg(feature = "memory")]
pub mod memory;

pub use chain::{ChainError, ChainProvider, TxAssembler, TxSubmitter, WalletSigner};
pub use indexed::{IndexedInput, InputOrdering, InputRole, PendingRedeemer, ResolvedRedeemer};
pub use plan::{Redeemer, TxInstruction, TxPlan};
pub use transaction::{
    PlutusScript, RedeemerEntry, RedeemerPurpose, SignedTx, TxBody, TxOutput, UnsignedTx, Witness,
};

use subpay_types::{OutRef, PolicyId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TxError {
    #[error("plan has no inputs, outputs or mints")]
    EmptyPlan,

    #[error("input {0} named by a redeemer is not part of the transaction")]
    UnresolvedInput(OutRef),

    #[error("input {0} collected more than once")]
    DuplicateInput(OutRef),

    #[error("invalid mint under policy {policy_id}: {reason}")]
    InvalidMint { policy_id: PolicyId, reason: String },

    #[error("invalid validity interval: from {from} is after to {to}")]
    InvalidValidity { from: u64, to: u64 },

    #[error("{0}")]
    Other(String),
}
