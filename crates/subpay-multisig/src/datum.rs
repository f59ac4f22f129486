//! Multisig datum and redeemers.

use std::collections::BTreeSet;

use subpay_types::{AssetClass, DecodeError, KeyHash, OutRef, PlutusData, PlutusSchema};

use crate::error::{MultisigError, Result};

/// Parameters of a multisig treasury, held inline at the validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultisigDatum {
    pub signers: Vec<KeyHash>,
    /// Number of signers that must approve a spend, update or removal.
    pub threshold: u64,
    /// Asset class the treasury pays out.
    pub funds: AssetClass,
    /// Largest amount of `funds` a single spend may release.
    pub spending_limit: u64,
    pub minimum_ada: u64,
}

impl MultisigDatum {
    /// Reject empty or repeated signer sets and unreachable thresholds.
    pub fn validate(&self) -> Result<()> {
        if self.signers.is_empty() {
            return Err(MultisigError::InvalidThreshold("at least one signer is required".into()));
        }
        let unique: BTreeSet<&KeyHash> = self.signers.iter().collect();
        if unique.len() != self.signers.len() {
            return Err(MultisigError::InvalidThreshold("signers must be distinct".into()));
        }
        if self.threshold == 0 {
            return Err(MultisigError::InvalidThreshold("threshold must be at least 1".into()));
        }
        if self.threshold > self.signers.len() as u64 {
            return Err(MultisigError::InvalidThreshold(format!(
                "threshold {} exceeds signer count {}",
                self.threshold,
                self.signers.len()
            )));
        }
        if self.spending_limit == 0 {
            return Err(MultisigError::InvalidThreshold("spending_limit must be positive".into()));
        }
        Ok(())
    }

    pub fn is_signer(&self, key_hash: &KeyHash) -> bool {
        self.signers.contains(key_hash)
    }

    /// Check that `signing` is a distinct subset of the signers meeting the
    /// threshold.
    pub fn check_approval(&self, signing: &[KeyHash]) -> Result<()> {
        let mut seen = BTreeSet::new();
        for key_hash in signing {
            if !self.is_signer(key_hash) {
                return Err(MultisigError::NotASigner(*key_hash));
            }
            if !seen.insert(key_hash) {
                return Err(MultisigError::DuplicateWitness(*key_hash));
            }
        }
        if (seen.len() as u64) < self.threshold {
            return Err(MultisigError::Incomplete {
                have: seen.len(),
                need: self.threshold as usize,
            });
        }
        Ok(())
    }
}

impl PlutusSchema for MultisigDatum {
    fn to_data(&self) -> PlutusData {
        PlutusData::constr(
            0,
            vec![
                PlutusData::list(
                    self.signers
                        .iter()
                        .map(|k| PlutusData::bytes(k.as_bytes().to_vec()))
                        .collect(),
                ),
                PlutusData::int(self.threshold),
                self.funds.to_data(),
                PlutusData::int(self.spending_limit),
                PlutusData::int(self.minimum_ada),
            ],
        )
    }

    fn from_data(data: &PlutusData) -> std::result::Result<Self, DecodeError> {
        let f = data.expect_constr(0, 5, "MultisigDatum")?;
        let signers = f[0]
            .as_list("MultisigDatum.signers")?
            .iter()
            .map(|k| KeyHash::from_slice(k.as_bytes("MultisigDatum.signer")?))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self {
            signers,
            threshold: f[1].as_u64("MultisigDatum.threshold")?,
            funds: AssetClass::from_data(&f[2])?,
            spending_limit: f[3].as_u64("MultisigDatum.spending_limit")?,
            minimum_ada: f[4].as_u64("MultisigDatum.minimum_ada")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultisigMintRedeemer {
    Init { output_reference: OutRef },
    Burn,
}

impl PlutusSchema for MultisigMintRedeemer {
    fn to_data(&self) -> PlutusData {
        match self {
            Self::Init { output_reference } => PlutusData::constr(0, vec![output_reference.to_data()]),
            Self::Burn => PlutusData::constr(1, vec![]),
        }
    }

    fn from_data(data: &PlutusData) -> std::result::Result<Self, DecodeError> {
        let what = "MultisigMintRedeemer";
        match data.as_constr(what)?.0 {
            0 => {
                let f = data.expect_constr(0, 1, what)?;
                Ok(Self::Init {
                    output_reference: OutRef::from_data(&f[0])?,
                })
            }
            1 => {
                data.expect_constr(1, 0, what)?;
                Ok(Self::Burn)
            }
            got => Err(DecodeError::UnexpectedConstructor { what, got }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultisigSpendRedeemer {
    Sign,
    Update,
    Remove,
}

impl PlutusSchema for MultisigSpendRedeemer {
    fn to_data(&self) -> PlutusData {
        let tag = match self {
            Self::Sign => 0,
            Self::Update => 1,
            Self::Remove => 2,
        };
        PlutusData::constr(tag, vec![])
    }

    fn from_data(data: &PlutusData) -> std::result::Result<Self, DecodeError> {
        let what = "MultisigSpendRedeemer";
        let tag = data.as_constr(what)?.0;
        let redeemer = match tag {
            0 => Self::Sign,
            1 => Self::Update,
            2 => Self::Remove,
            got => return Err(DecodeError::UnexpectedConstructor { what, got }),
        };
        data.expect_constr(tag, 0, what)?;
        Ok(redeemer)
    }
}
