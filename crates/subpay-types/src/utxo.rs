//! Output references and unspent outputs.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::asset::{AssetClass, Value};
use crate::error::DecodeError;
use crate::hash::TxHash;
use crate::plutus::{PlutusData, PlutusSchema};

/// Identifies a specific prior transaction output.
///
/// The derived ordering (transaction id bytes, then output index) is the
/// ledger's canonical input ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OutRef {
    pub tx_hash: TxHash,
    pub index: u32,
}

impl OutRef {
    pub fn new(tx_hash: TxHash, index: u32) -> Self {
        Self { tx_hash, index }
    }
}

impl fmt::Display for OutRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.tx_hash, self.index)
    }
}

/// `OutputReference { transaction_id, output_index }` as Plutus V3 sees it.
impl PlutusSchema for OutRef {
    fn to_data(&self) -> PlutusData {
        PlutusData::constr(
            0,
            vec![
                PlutusData::bytes(self.tx_hash.as_bytes().to_vec()),
                PlutusData::int(self.index),
            ],
        )
    }

    fn from_data(data: &PlutusData) -> Result<Self, DecodeError> {
        let f = data.expect_constr(0, 2, "OutputReference")?;
        let tx_hash = TxHash::from_slice(f[0].as_bytes("OutputReference.transaction_id")?)?;
        let index = f[1].as_u64("OutputReference.output_index")?;
        let index = u32::try_from(index).map_err(|_| DecodeError::OutOfRange {
            what: "OutputReference.output_index",
            value: index as i128,
        })?;
        Ok(Self { tx_hash, index })
    }
}

/// A raw chain UTxO as returned by the chain-query collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub out_ref: OutRef,
    pub address: Address,
    pub value: Value,
    /// Inline datum, CBOR encoded.
    #[serde(default, with = "crate::serde_hex::option")]
    pub datum: Option<Vec<u8>>,
}

impl Utxo {
    pub fn holds(&self, class: &AssetClass) -> bool {
        self.value.quantity_of(class) > 0
    }
}

/// The decoded, application-level view of a UTxO.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadableUtxo<T> {
    pub out_ref: OutRef,
    pub datum: T,
    pub assets: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_ordering() {
        let a = OutRef::new(TxHash::new([1; 32]), 5);
        let b = OutRef::new(TxHash::new([1; 32]), 6);
        let c = OutRef::new(TxHash::new([2; 32]), 0);
        let mut refs = vec![c, b, a];
        refs.sort();
        assert_eq!(refs, vec![a, b, c]);
    }

    #[test]
    fn test_out_ref_plutus_roundtrip() {
        let r = OutRef::new(TxHash::new([7; 32]), 3);
        assert_eq!(OutRef::from_data(&r.to_data()).unwrap(), r);
    }

    #[test]
    fn test_display() {
        let r = OutRef::new(TxHash::new([0; 32]), 1);
        assert_eq!(r.to_string(), format!("{}#1", "00".repeat(32)));
    }
}
