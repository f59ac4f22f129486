//! A transaction awaiting co-signer witnesses.

use serde::{Deserialize, Serialize};
use subpay_tx::{SignedTx, UnsignedTx, Witness};
use subpay_types::{KeyHash, TxHash};

use crate::error::{MultisigError, Result};

/// An assembled multisig transaction plus the witnesses gathered so far.
///
/// Passed between parties as JSON; each co-signer adds a witness over
/// [`PendingMultisigTx::hash`] and returns it to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingMultisigTx {
    pub action: String,
    pub tx: UnsignedTx,
    /// Keys whose witness the transaction needs, sorted.
    pub required: Vec<KeyHash>,
    #[serde(default)]
    pub witnesses: Vec<Witness>,
}

impl PendingMultisigTx {
    pub fn new(action: impl Into<String>, tx: UnsignedTx, mut required: Vec<KeyHash>) -> Self {
        required.sort();
        required.dedup();
        Self {
            action: action.into(),
            tx,
            required,
            witnesses: Vec::new(),
        }
    }

    pub fn hash(&self) -> TxHash {
        self.tx.hash
    }

    pub fn add_witness(&mut self, witness: Witness) -> Result<()> {
        if !self.required.contains(&witness.key_hash) {
            return Err(MultisigError::NotASigner(witness.key_hash));
        }
        if self.has_witness(&witness.key_hash) {
            return Err(MultisigError::DuplicateWitness(witness.key_hash));
        }
        self.witnesses.push(witness);
        Ok(())
    }

    pub fn has_witness(&self, key_hash: &KeyHash) -> bool {
        self.witnesses.iter().any(|w| &w.key_hash == key_hash)
    }

    /// Required keys that have not signed yet.
    pub fn missing(&self) -> Vec<KeyHash> {
        self.required
            .iter()
            .filter(|k| !self.has_witness(k))
            .copied()
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }

    /// Attach the collected witnesses, refusing while any is missing.
    pub fn into_signed(self) -> Result<SignedTx> {
        if !self.is_complete() {
            return Err(MultisigError::Incomplete {
                have: self.witnesses.len(),
                need: self.required.len(),
            });
        }
        Ok(self.tx.with_witnesses(self.witnesses))
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("PendingMultisigTx serialization should not fail")
    }

    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}
