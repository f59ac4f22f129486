//! Transaction plans.
//!
//! A [`TxPlan`] is the ordered list of instructions a workflow hands to a
//! [`TxAssembler`](crate::TxAssembler). It does not balance, order or sign
//! anything itself.

use std::collections::{BTreeMap, BTreeSet};

use subpay_types::{Address, AssetName, KeyHash, OutRef, PlutusData, PlutusSchema, PolicyId, PosixTime, Utxo, Value};

use crate::indexed::{InputOrdering, PendingRedeemer};
use crate::transaction::PlutusScript;
use crate::TxError;

/// Redeemer attached to a collect or mint instruction.
#[derive(Debug, Clone)]
pub enum Redeemer {
    /// Payload known up front.
    Static(PlutusData),
    /// Payload depending on final input positions.
    Indexed(PendingRedeemer),
}

impl Redeemer {
    pub fn of<R: PlutusSchema>(redeemer: &R) -> Self {
        Self::Static(redeemer.to_data())
    }

    pub fn resolve(&self, ordering: &InputOrdering) -> Result<PlutusData, TxError> {
        match self {
            Self::Static(data) => Ok(data.clone()),
            Self::Indexed(pending) => pending.resolve(ordering).map(|r| r.data),
        }
    }
}

impl From<PlutusData> for Redeemer {
    fn from(data: PlutusData) -> Self {
        Self::Static(data)
    }
}

impl From<PendingRedeemer> for Redeemer {
    fn from(pending: PendingRedeemer) -> Self {
        Self::Indexed(pending)
    }
}

#[derive(Debug, Clone)]
pub enum TxInstruction {
    /// Spend `utxos`; script-locked ones need a redeemer.
    Collect { utxos: Vec<Utxo>, redeemer: Option<Redeemer> },
    /// Read `utxos` without spending them.
    ReadFrom(Vec<Utxo>),
    /// Mint (positive) or burn (negative) under `policy_id`.
    Mint { policy_id: PolicyId, assets: BTreeMap<AssetName, i64>, redeemer: Redeemer },
    Pay { address: Address, value: Value, datum: Option<PlutusData> },
    AttachScript(PlutusScript),
    ValidFrom(PosixTime),
    ValidTo(PosixTime),
    AddSigner(KeyHash),
}

/// Builder for a transaction's instruction list.
#[derive(Debug, Clone, Default)]
pub struct TxPlan {
    instructions: Vec<TxInstruction>,
}

impl TxPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spend `utxos`, all under the same redeemer.
    pub fn collect_from(mut self, utxos: Vec<Utxo>, redeemer: impl Into<Redeemer>) -> Self {
        self.instructions.push(TxInstruction::Collect {
            utxos,
            redeemer: Some(redeemer.into()),
        });
        self
    }

    /// Spend key-locked `utxos`.
    pub fn collect_wallet(mut self, utxos: Vec<Utxo>) -> Self {
        self.instructions.push(TxInstruction::Collect { utxos, redeemer: None });
        self
    }

    pub fn read_from(mut self, utxos: Vec<Utxo>) -> Self {
        self.instructions.push(TxInstruction::ReadFrom(utxos));
        self
    }

    pub fn mint_assets(
        mut self,
        policy_id: PolicyId,
        assets: BTreeMap<AssetName, i64>,
        redeemer: impl Into<Redeemer>,
    ) -> Self {
        self.instructions.push(TxInstruction::Mint {
            policy_id,
            assets,
            redeemer: redeemer.into(),
        });
        self
    }

    pub fn pay_to_address(mut self, address: Address, value: Value) -> Self {
        self.instructions.push(TxInstruction::Pay { address, value, datum: None });
        self
    }

    /// Pay to a script address with an inline datum.
    pub fn pay_to_contract(mut self, address: Address, value: Value, datum: PlutusData) -> Self {
        self.instructions.push(TxInstruction::Pay {
            address,
            value,
            datum: Some(datum),
        });
        self
    }

    pub fn attach_script(mut self, script: PlutusScript) -> Self {
        self.instructions.push(TxInstruction::AttachScript(script));
        self
    }

    pub fn valid_from(mut self, time: PosixTime) -> Self {
        self.instructions.push(TxInstruction::ValidFrom(time));
        self
    }

    pub fn valid_to(mut self, time: PosixTime) -> Self {
        self.instructions.push(TxInstruction::ValidTo(time));
        self
    }

    pub fn add_signer(mut self, key_hash: KeyHash) -> Self {
        self.instructions.push(TxInstruction::AddSigner(key_hash));
        self
    }

    pub fn instructions(&self) -> &[TxInstruction] {
        &self.instructions
    }

    pub fn into_instructions(self) -> Vec<TxInstruction> {
        self.instructions
    }

    /// Spent inputs in declaration order.
    pub fn spent_inputs(&self) -> impl Iterator<Item = &Utxo> {
        self.instructions.iter().flat_map(|i| match i {
            TxInstruction::Collect { utxos, .. } => utxos.as_slice(),
            _ => &[],
        })
    }

    pub fn reference_inputs(&self) -> impl Iterator<Item = &Utxo> {
        self.instructions.iter().flat_map(|i| match i {
            TxInstruction::ReadFrom(utxos) => utxos.as_slice(),
            _ => &[],
        })
    }

    /// Structural checks an assembler runs before balancing.
    pub fn validate(&self) -> Result<(), TxError> {
        let mut seen: BTreeSet<OutRef> = BTreeSet::new();
        let mut moves_value = false;
        let mut from = None;
        let mut to = None;

        for instruction in &self.instructions {
            match instruction {
                TxInstruction::Collect { utxos, .. } => {
                    for utxo in utxos {
                        if !seen.insert(utxo.out_ref) {
                            return Err(TxError::DuplicateInput(utxo.out_ref));
                        }
                        moves_value = true;
                    }
                }
                TxInstruction::Mint { policy_id, assets, .. } => {
                    if assets.is_empty() {
                        return Err(TxError::InvalidMint {
                            policy_id: *policy_id,
                            reason: "no assets".into(),
                        });
                    }
                    if let Some((name, _)) = assets.iter().find(|(_, q)| **q == 0) {
                        return Err(TxError::InvalidMint {
                            policy_id: *policy_id,
                            reason: format!("zero quantity for {}", name.to_hex()),
                        });
                    }
                    moves_value = true;
                }
                TxInstruction::Pay { .. } => moves_value = true,
                TxInstruction::ValidFrom(t) => from = Some(*t),
                TxInstruction::ValidTo(t) => to = Some(*t),
                _ => {}
            }
        }

        if !moves_value {
            return Err(TxError::EmptyPlan);
        }
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(TxError::InvalidValidity { from, to });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use subpay_types::{Network, TxHash};

    fn make_test_utxo(index: u32) -> Utxo {
        Utxo {
            out_ref: OutRef::new(TxHash::new([9; 32]), index),
            address: Address::key(Network::Preview, KeyHash::new([1; 28])),
            value: Value::lovelace(5_000_000),
            datum: None,
        }
    }

    #[test]
    fn test_builder_keeps_instruction_order() {
        let plan = TxPlan::new()
            .collect_wallet(vec![make_test_utxo(0)])
            .pay_to_address(make_test_utxo(0).address, Value::lovelace(1))
            .valid_to(10);
        assert!(matches!(plan.instructions()[0], TxInstruction::Collect { .. }));
        assert!(matches!(plan.instructions()[2], TxInstruction::ValidTo(10)));
        assert_eq!(plan.spent_inputs().count(), 1);
        assert_eq!(plan.reference_inputs().count(), 0);
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_empty_plan_rejected() {
        assert!(matches!(TxPlan::new().valid_from(1).validate(), Err(TxError::EmptyPlan)));
    }

    #[test]
    fn test_duplicate_input_rejected() {
        let plan = TxPlan::new()
            .collect_wallet(vec![make_test_utxo(0)])
            .collect_from(vec![make_test_utxo(0)], PlutusData::int(0));
        assert!(matches!(plan.validate(), Err(TxError::DuplicateInput(_))));
    }

    #[test]
    fn test_zero_mint_rejected() {
        let mut assets = BTreeMap::new();
        assets.insert(AssetName::new(vec![1]).unwrap(), 0);
        let plan = TxPlan::new().mint_assets(PolicyId::new([3; 28]), assets, PlutusData::int(0));
        assert!(matches!(plan.validate(), Err(TxError::InvalidMint { .. })));
    }

    #[test]
    fn test_inverted_validity_rejected() {
        let plan = TxPlan::new()
            .pay_to_address(make_test_utxo(0).address, Value::lovelace(1))
            .valid_from(20)
            .valid_to(10);
        assert!(matches!(plan.validate(), Err(TxError::InvalidValidity { from: 20, to: 10 })));
    }
}
