//! Core types for the subscription-payment protocol.
//!
//! This crate provides the foundational types used across all subpay crates:
//! hashes, asset classes and values, addresses, output references and UTxOs,
//! the Plutus data model with its CBOR codec, the protocol's datums and
//! redeemers, and CIP-68 style token naming.

pub mod address;
pub mod asset;
pub mod datum;
pub mod error;
pub mod hash;
pub mod plutus;
pub mod redeemer;
pub mod serde_hex;
pub mod token_name;
pub mod utxo;

pub use address::{Address, Credential, Network};
pub use asset::{AssetClass, AssetName, Value};
pub use datum::{
    AccountDatum, Installment, PaymentDatum, PaymentValidatorDatum, PenaltyDatum, ServiceDatum,
};
pub use error::{DecodeError, LookupError, TokenNameError, ValueError};
pub use hash::{Hash, KeyHash, PolicyId, ScriptHash, TxHash};
pub use plutus::{PlutusData, PlutusSchema};
pub use redeemer::{
    AccountMintRedeemer, AccountSpend, AccountSpendRedeemer, PaymentMintRedeemer,
    PaymentSpendRedeemer, ServiceMintRedeemer, ServiceSpend, ServiceSpendRedeemer,
};
pub use token_name::{
    derive_token_name, find_paired_token_names, TokenPair, REFERENCE_LABEL, USER_LABEL,
};
pub use utxo::{OutRef, ReadableUtxo, Utxo};

/// POSIX time in milliseconds, as seen by on-chain validators.
pub type PosixTime = u64;
