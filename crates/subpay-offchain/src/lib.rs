//! Off-chain side of the subscription-payment protocol.
//!
//! Every protocol action is an async workflow taking an explicit
//! [`ProtocolContext`]: it reads chain state through the context's provider,
//! classifies the relevant UTxOs, computes the successor datums, builds a
//! [`TxPlan`](subpay_tx::TxPlan) and hands it to the assembler, the wallet
//! and the submitter in turn. Nothing is submitted unless every step before
//! it succeeded.
//!
//! Protocol states move as follows:
//!
//! - service: create, update, remove (retire)
//! - account: create, update, remove
//! - payment: initiate, extend, merchant withdraw, unsubscribe (penalty),
//!   subscriber withdraw (after the service retired)

pub mod account;
pub mod blueprint;
pub mod classify;
pub mod config;
pub mod context;
pub mod error;
pub mod installment;
pub mod payment;
pub mod query;
pub mod service;

pub use blueprint::{Blueprint, Validator};
pub use config::{ProtocolConfig, ValidatorTitles};
pub use context::{ProtocolContext, ProtocolScripts};
pub use error::ProtocolError;
pub use installment::{build_schedule, claimable, extend_schedule, Claim};

/// Lovelace locked next to reference tokens that carry no `minimum_ada` of
/// their own (account records).
pub const REFERENCE_OUTPUT_LOVELACE: u64 = 2_000_000;
