//! Asset classes, asset names and multi-asset values.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{DecodeError, ValueError};
use crate::hash::PolicyId;

/// Maximum asset name length enforced by the ledger.
pub const MAX_ASSET_NAME_LEN: usize = 32;

/// A token name under a minting policy (at most 32 bytes).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AssetName(Vec<u8>);

impl AssetName {
    pub fn new(bytes: Vec<u8>) -> Result<Self, ValueError> {
        if bytes.len() > MAX_ASSET_NAME_LEN {
            return Err(ValueError::NameTooLong(bytes.len()));
        }
        Ok(Self(bytes))
    }

    pub fn from_hex(s: &str) -> Result<Self, DecodeError> {
        let bytes = hex::decode(s)?;
        if bytes.len() > MAX_ASSET_NAME_LEN {
            return Err(DecodeError::Length {
                what: "asset name",
                expected: MAX_ASSET_NAME_LEN,
                got: bytes.len(),
            });
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for AssetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for AssetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetName({})", self.to_hex())
    }
}

impl Serialize for AssetName {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for AssetName {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Identifies a fungible or non-fungible token class.
///
/// On chain, lovelace is the asset class with an empty policy id and an
/// empty asset name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    Lovelace,
    Native { policy_id: PolicyId, name: AssetName },
}

impl AssetClass {
    pub fn native(policy_id: PolicyId, name: AssetName) -> Self {
        Self::Native { policy_id, name }
    }

    pub fn is_lovelace(&self) -> bool {
        matches!(self, Self::Lovelace)
    }

    /// The asset unit string used by chain indexers: policy id hex followed
    /// by asset name hex, or `lovelace`.
    pub fn unit(&self) -> String {
        match self {
            Self::Lovelace => "lovelace".to_string(),
            Self::Native { policy_id, name } => format!("{}{}", policy_id.to_hex(), name.to_hex()),
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.unit())
    }
}

/// Native assets grouped by policy.
pub type MultiAsset = BTreeMap<PolicyId, BTreeMap<AssetName, u64>>;

/// A bundle of lovelace and native assets. Zero quantities are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Value {
    pub coin: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub assets: MultiAsset,
}

impl Value {
    pub fn lovelace(coin: u64) -> Self {
        Self {
            coin,
            assets: BTreeMap::new(),
        }
    }

    /// A value holding `qty` of a single asset class.
    pub fn from_asset(class: &AssetClass, qty: u64) -> Self {
        let mut v = Self::default();
        // Cannot overflow starting from zero.
        let _ = v.add_asset(class, qty);
        v
    }

    /// Builder-style variant of [`Value::add_asset`].
    pub fn with_asset(mut self, class: &AssetClass, qty: u64) -> Result<Self, ValueError> {
        self.add_asset(class, qty)?;
        Ok(self)
    }

    pub fn quantity_of(&self, class: &AssetClass) -> u64 {
        match class {
            AssetClass::Lovelace => self.coin,
            AssetClass::Native { policy_id, name } => self
                .assets
                .get(policy_id)
                .and_then(|names| names.get(name))
                .copied()
                .unwrap_or(0),
        }
    }

    pub fn add_asset(&mut self, class: &AssetClass, qty: u64) -> Result<(), ValueError> {
        if qty == 0 {
            return Ok(());
        }
        let overflow = || ValueError::Overflow(class.unit());
        match class {
            AssetClass::Lovelace => {
                self.coin = self.coin.checked_add(qty).ok_or_else(overflow)?;
            }
            AssetClass::Native { policy_id, name } => {
                let slot = self
                    .assets
                    .entry(*policy_id)
                    .or_default()
                    .entry(name.clone())
                    .or_insert(0);
                *slot = slot.checked_add(qty).ok_or_else(overflow)?;
            }
        }
        Ok(())
    }

    pub fn sub_asset(&mut self, class: &AssetClass, qty: u64) -> Result<(), ValueError> {
        if qty == 0 {
            return Ok(());
        }
        let have = self.quantity_of(class);
        if have < qty {
            return Err(ValueError::Insufficient {
                unit: class.unit(),
                need: qty,
                have,
            });
        }
        match class {
            AssetClass::Lovelace => self.coin -= qty,
            AssetClass::Native { policy_id, name } => {
                if let Some(names) = self.assets.get_mut(policy_id) {
                    if have == qty {
                        names.remove(name);
                    } else if let Some(slot) = names.get_mut(name) {
                        *slot -= qty;
                    }
                    if names.is_empty() {
                        self.assets.remove(policy_id);
                    }
                }
            }
        }
        Ok(())
    }

    pub fn checked_add(&self, other: &Value) -> Result<Value, ValueError> {
        let mut out = self.clone();
        for (class, qty) in other.iter() {
            out.add_asset(&class, qty)?;
        }
        Ok(out)
    }

    /// Subtract `other`, failing if any asset would go negative.
    pub fn checked_sub(&self, other: &Value) -> Result<Value, ValueError> {
        let mut out = self.clone();
        for (class, qty) in other.iter() {
            out.sub_asset(&class, qty)?;
        }
        Ok(out)
    }

    /// Whether `self` holds at least every quantity in `other`.
    pub fn contains(&self, other: &Value) -> bool {
        other.iter().all(|(class, qty)| self.quantity_of(&class) >= qty)
    }

    pub fn is_empty(&self) -> bool {
        self.coin == 0 && self.assets.is_empty()
    }

    /// Every non-zero entry, lovelace first.
    pub fn iter(&self) -> impl Iterator<Item = (AssetClass, u64)> + '_ {
        let coin = (self.coin > 0).then_some((AssetClass::Lovelace, self.coin));
        coin.into_iter().chain(self.assets.iter().flat_map(|(policy_id, names)| {
            names
                .iter()
                .map(move |(name, qty)| (AssetClass::native(*policy_id, name.clone()), *qty))
        }))
    }

    /// Whether any token under `policy_id` is held.
    pub fn has_policy(&self, policy_id: &PolicyId) -> bool {
        self.assets.contains_key(policy_id)
    }
}
