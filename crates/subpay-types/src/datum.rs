//! Datums held by the protocol's script UTxOs.
//!
//! Every type here is an immutable snapshot of chain state. Workflows never
//! mutate them in place; they build a successor value and write it into a
//! new output.

use crate::asset::{AssetClass, AssetName};
use crate::error::DecodeError;
use crate::hash::{sha3_256, PolicyId};
use crate::plutus::{PlutusData, PlutusSchema};
use crate::PosixTime;

impl PlutusSchema for AssetClass {
    fn to_data(&self) -> PlutusData {
        let (policy, name) = match self {
            AssetClass::Lovelace => (Vec::new(), Vec::new()),
            AssetClass::Native { policy_id, name } => {
                (policy_id.as_bytes().to_vec(), name.as_bytes().to_vec())
            }
        };
        PlutusData::constr(0, vec![PlutusData::bytes(policy), PlutusData::bytes(name)])
    }

    fn from_data(data: &PlutusData) -> Result<Self, DecodeError> {
        let f = data.expect_constr(0, 2, "AssetClass")?;
        let policy = f[0].as_bytes("AssetClass.policy_id")?;
        let name = decode_asset_name(&f[1], "AssetClass.asset_name")?;
        if policy.is_empty() {
            if !name.is_empty() {
                return Err(DecodeError::Kind {
                    what: "AssetClass",
                    expected: "empty asset name for lovelace",
                });
            }
            return Ok(AssetClass::Lovelace);
        }
        Ok(AssetClass::native(PolicyId::from_slice(policy)?, name))
    }
}

pub(crate) fn decode_asset_name(data: &PlutusData, what: &'static str) -> Result<AssetName, DecodeError> {
    let bytes = data.as_bytes(what)?;
    AssetName::new(bytes.to_vec()).map_err(|_| DecodeError::Length {
        what,
        expected: crate::asset::MAX_ASSET_NAME_LEN,
        got: bytes.len(),
    })
}

pub(crate) fn asset_name_data(name: &AssetName) -> PlutusData {
    PlutusData::bytes(name.as_bytes().to_vec())
}

// ─── Service ────────────────────────────────────────────────────────────────

/// Terms a merchant publishes for a subscription service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDatum {
    pub service_fee: AssetClass,
    pub service_fee_qty: u64,
    pub penalty_fee: AssetClass,
    pub penalty_fee_qty: u64,
    /// Length of one billing interval in milliseconds.
    pub interval_length: u64,
    pub num_intervals: u64,
    pub minimum_ada: u64,
    pub is_active: bool,
}

impl PlutusSchema for ServiceDatum {
    fn to_data(&self) -> PlutusData {
        PlutusData::constr(
            0,
            vec![
                self.service_fee.to_data(),
                PlutusData::int(self.service_fee_qty),
                self.penalty_fee.to_data(),
                PlutusData::int(self.penalty_fee_qty),
                PlutusData::int(self.interval_length),
                PlutusData::int(self.num_intervals),
                PlutusData::int(self.minimum_ada),
                PlutusData::bool(self.is_active),
            ],
        )
    }

    fn from_data(data: &PlutusData) -> Result<Self, DecodeError> {
        let f = data.expect_constr(0, 8, "ServiceDatum")?;
        Ok(Self {
            service_fee: AssetClass::from_data(&f[0])?,
            service_fee_qty: f[1].as_u64("ServiceDatum.service_fee_qty")?,
            penalty_fee: AssetClass::from_data(&f[2])?,
            penalty_fee_qty: f[3].as_u64("ServiceDatum.penalty_fee_qty")?,
            interval_length: f[4].as_u64("ServiceDatum.interval_length")?,
            num_intervals: f[5].as_u64("ServiceDatum.num_intervals")?,
            minimum_ada: f[6].as_u64("ServiceDatum.minimum_ada")?,
            is_active: f[7].as_bool("ServiceDatum.is_active")?,
        })
    }
}

// ─── Account ────────────────────────────────────────────────────────────────

/// Subscriber identity record. Contact details are stored as sha3-256
/// digests so that the chain never carries them in clear text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountDatum {
    pub email_hash: Vec<u8>,
    pub phone_hash: Vec<u8>,
    pub account_created: PosixTime,
}

impl AccountDatum {
    pub fn new(email: &str, phone: &str, account_created: PosixTime) -> Self {
        Self {
            email_hash: sha3_256(email.trim().to_lowercase().as_bytes()).to_vec(),
            phone_hash: sha3_256(phone.trim().as_bytes()).to_vec(),
            account_created,
        }
    }
}

impl PlutusSchema for AccountDatum {
    fn to_data(&self) -> PlutusData {
        PlutusData::constr(
            0,
            vec![
                PlutusData::bytes(self.email_hash.clone()),
                PlutusData::bytes(self.phone_hash.clone()),
                PlutusData::int(self.account_created),
            ],
        )
    }

    fn from_data(data: &PlutusData) -> Result<Self, DecodeError> {
        let f = data.expect_constr(0, 3, "AccountDatum")?;
        Ok(Self {
            email_hash: f[0].as_bytes("AccountDatum.email_hash")?.to_vec(),
            phone_hash: f[1].as_bytes("AccountDatum.phone_hash")?.to_vec(),
            account_created: f[2].as_u64("AccountDatum.account_created")?,
        })
    }
}

// ─── Payment ────────────────────────────────────────────────────────────────

/// One scheduled slice of a subscription fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Installment {
    pub claimable_at: PosixTime,
    pub claimable_amount: u64,
}

impl PlutusSchema for Installment {
    fn to_data(&self) -> PlutusData {
        PlutusData::constr(
            0,
            vec![
                PlutusData::int(self.claimable_at),
                PlutusData::int(self.claimable_amount),
            ],
        )
    }

    fn from_data(data: &PlutusData) -> Result<Self, DecodeError> {
        let f = data.expect_constr(0, 2, "Installment")?;
        Ok(Self {
            claimable_at: f[0].as_u64("Installment.claimable_at")?,
            claimable_amount: f[1].as_u64("Installment.claimable_amount")?,
        })
    }
}

/// One subscriber's escrow of funds against one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentDatum {
    pub service_nft_tn: AssetName,
    pub subscriber_nft_tn: AssetName,
    pub subscription_start: PosixTime,
    pub subscription_end: PosixTime,
    pub original_subscription_end: PosixTime,
    /// Chronological; claimed strictly from the front.
    pub installments: Vec<Installment>,
}

impl PaymentDatum {
    /// Sum of the installments still to be claimed, `None` on overflow.
    pub fn remaining_amount(&self) -> Option<u64> {
        self.installments
            .iter()
            .try_fold(0u64, |acc, i| acc.checked_add(i.claimable_amount))
    }

    /// Whether the schedule obeys the datum invariants: the end does not
    /// precede the start and installments are sorted by `claimable_at`.
    pub fn is_well_formed(&self) -> bool {
        self.subscription_end >= self.subscription_start
            && self
                .installments
                .windows(2)
                .all(|w| w[0].claimable_at <= w[1].claimable_at)
    }
}

impl PlutusSchema for PaymentDatum {
    fn to_data(&self) -> PlutusData {
        PlutusData::constr(
            0,
            vec![
                asset_name_data(&self.service_nft_tn),
                asset_name_data(&self.subscriber_nft_tn),
                PlutusData::int(self.subscription_start),
                PlutusData::int(self.subscription_end),
                PlutusData::int(self.original_subscription_end),
                PlutusData::list(self.installments.iter().map(|i| i.to_data()).collect()),
            ],
        )
    }

    fn from_data(data: &PlutusData) -> Result<Self, DecodeError> {
        let f = data.expect_constr(0, 6, "PaymentDatum")?;
        let installments = f[5]
            .as_list("PaymentDatum.installments")?
            .iter()
            .map(Installment::from_data)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            service_nft_tn: decode_asset_name(&f[0], "PaymentDatum.service_nft_tn")?,
            subscriber_nft_tn: decode_asset_name(&f[1], "PaymentDatum.subscriber_nft_tn")?,
            subscription_start: f[2].as_u64("PaymentDatum.subscription_start")?,
            subscription_end: f[3].as_u64("PaymentDatum.subscription_end")?,
            original_subscription_end: f[4].as_u64("PaymentDatum.original_subscription_end")?,
            installments,
        })
    }
}

/// Residual record left after an early cancellation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PenaltyDatum {
    pub service_nft_tn: AssetName,
    pub subscriber_nft_tn: AssetName,
    pub penalty_fee: AssetClass,
    pub penalty_fee_qty: u64,
}

impl PlutusSchema for PenaltyDatum {
    fn to_data(&self) -> PlutusData {
        PlutusData::constr(
            0,
            vec![
                asset_name_data(&self.service_nft_tn),
                asset_name_data(&self.subscriber_nft_tn),
                self.penalty_fee.to_data(),
                PlutusData::int(self.penalty_fee_qty),
            ],
        )
    }

    fn from_data(data: &PlutusData) -> Result<Self, DecodeError> {
        let f = data.expect_constr(0, 4, "PenaltyDatum")?;
        Ok(Self {
            service_nft_tn: decode_asset_name(&f[0], "PenaltyDatum.service_nft_tn")?,
            subscriber_nft_tn: decode_asset_name(&f[1], "PenaltyDatum.subscriber_nft_tn")?,
            penalty_fee: AssetClass::from_data(&f[2])?,
            penalty_fee_qty: f[3].as_u64("PenaltyDatum.penalty_fee_qty")?,
        })
    }
}

/// The two shapes an escrow UTxO's datum may take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentValidatorDatum {
    Payment(PaymentDatum),
    Penalty(PenaltyDatum),
}

impl PaymentValidatorDatum {
    pub fn service_nft_tn(&self) -> &AssetName {
        match self {
            Self::Payment(p) => &p.service_nft_tn,
            Self::Penalty(p) => &p.service_nft_tn,
        }
    }

    pub fn subscriber_nft_tn(&self) -> &AssetName {
        match self {
            Self::Payment(p) => &p.subscriber_nft_tn,
            Self::Penalty(p) => &p.subscriber_nft_tn,
        }
    }
}

impl PlutusSchema for PaymentValidatorDatum {
    fn to_data(&self) -> PlutusData {
        match self {
            Self::Payment(p) => PlutusData::constr(0, vec![p.to_data()]),
            Self::Penalty(p) => PlutusData::constr(1, vec![p.to_data()]),
        }
    }

    fn from_data(data: &PlutusData) -> Result<Self, DecodeError> {
        let what = "PaymentValidatorDatum";
        let (tag, _) = data.as_constr(what)?;
        match tag {
            0 => Ok(Self::Payment(PaymentDatum::from_data(
                &data.expect_constr(0, 1, what)?[0],
            )?)),
            1 => Ok(Self::Penalty(PenaltyDatum::from_data(
                &data.expect_constr(1, 1, what)?[0],
            )?)),
            got => Err(DecodeError::UnexpectedConstructor { what, got }),
        }
    }
}
