//! Threshold-signed treasury held at the multisig validator.
//!
//! A coordinator prepares a transaction, hands the resulting
//! [`PendingMultisigTx`] to the co-signers (it serialises to JSON), collects
//! their witnesses and submits once every required key has signed.

pub mod datum;
pub mod error;
pub mod pending;
pub mod workflow;

pub use datum::{MultisigDatum, MultisigMintRedeemer, MultisigSpendRedeemer};
pub use error::{MultisigError, Result};
pub use pending::PendingMultisigTx;
pub use workflow::{
    EndMultisigConfig, InitMultisigConfig, MultisigContext, SignMultisigConfig, UpdateMultisigConfig,
};
