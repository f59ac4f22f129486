//! Assembled transaction types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use subpay_types::hash::{blake2b_224, blake2b_256};
use subpay_types::{Address, AssetName, KeyHash, OutRef, PlutusData, PolicyId, PosixTime, ScriptHash, TxHash, Value};

/// Script language tag prefixed before hashing a Plutus V3 script.
const PLUTUS_V3_TAG: u8 = 0x03;

/// A compiled Plutus V3 script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlutusScript(#[serde(with = "subpay_types::serde_hex")] Vec<u8>);

impl PlutusScript {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        hex::decode(s).map(Self)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// blake2b-224 over the language tag and the script bytes.
    pub fn hash(&self) -> ScriptHash {
        let mut preimage = Vec::with_capacity(self.0.len() + 1);
        preimage.push(PLUTUS_V3_TAG);
        preimage.extend_from_slice(&self.0);
        blake2b_224(&preimage)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedeemerPurpose {
    Spend,
    Mint,
}

/// A redeemer attached to a spend (by input position) or a mint (by policy
/// position).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedeemerEntry {
    pub purpose: RedeemerPurpose,
    pub index: u64,
    pub data: PlutusData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub address: Address,
    pub value: Value,
    /// Inline datum.
    #[serde(default)]
    pub datum: Option<PlutusData>,
}

/// A balanced transaction body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxBody {
    /// Spent inputs in canonical order.
    pub inputs: Vec<OutRef>,
    /// Reference inputs in canonical order.
    pub reference_inputs: Vec<OutRef>,
    pub outputs: Vec<TxOutput>,
    /// Positive quantities mint, negative ones burn.
    pub mint: BTreeMap<PolicyId, BTreeMap<AssetName, i64>>,
    pub redeemers: Vec<RedeemerEntry>,
    pub valid_from: Option<PosixTime>,
    pub valid_to: Option<PosixTime>,
    pub required_signers: Vec<KeyHash>,
    pub scripts: Vec<PlutusScript>,
    pub fee: u64,
}

impl TxBody {
    /// blake2b-256 over the canonical JSON encoding of the body.
    pub fn hash(&self) -> TxHash {
        let bytes = serde_json::to_vec(self).expect("serializing TxBody to a Vec should not fail");
        blake2b_256(&bytes)
    }

    pub fn redeemer(&self, purpose: RedeemerPurpose, index: u64) -> Option<&PlutusData> {
        self.redeemers
            .iter()
            .find(|r| r.purpose == purpose && r.index == index)
            .map(|r| &r.data)
    }
}

/// A vkey witness over a transaction hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Witness {
    pub key_hash: KeyHash,
    #[serde(with = "subpay_types::serde_hex")]
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedTx {
    pub body: TxBody,
    pub hash: TxHash,
}

impl UnsignedTx {
    pub fn new(body: TxBody) -> Self {
        let hash = body.hash();
        Self { body, hash }
    }

    pub fn with_witnesses(self, witnesses: Vec<Witness>) -> SignedTx {
        SignedTx {
            body: self.body,
            hash: self.hash,
            witnesses,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTx {
    pub body: TxBody,
    pub hash: TxHash,
    pub witnesses: Vec<Witness>,
}

impl SignedTx {
    pub fn signed_by(&self, key_hash: &KeyHash) -> bool {
        self.witnesses.iter().any(|w| &w.key_hash == key_hash)
    }
}
