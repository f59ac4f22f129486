//! Deterministic in-memory ledger.
//!
//! [`MemoryChain`] implements [`ChainProvider`], [`TxAssembler`] and
//! [`TxSubmitter`] over a plain UTxO map, and [`MemoryWallet`] implements
//! [`WalletSigner`] with hash-based mock signatures. Together they let the
//! protocol workflows run end to end without a node.
//!
//! Assembly selects extra inputs from the change address to cover any
//! deficit, returns the surplus as change, orders inputs canonically and
//! resolves every redeemer. Submission rejects spent inputs, transactions
//! outside their validity interval, missing witnesses and unbalanced bodies.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use log::debug;
use subpay_types::hash::{blake2b_224, blake2b_256};
use subpay_types::{
    Address, AssetClass, AssetName, KeyHash, Network, OutRef, PolicyId, PosixTime, ScriptHash, TxHash, Utxo,
    Value, ValueError,
};

use crate::chain::{ChainError, ChainProvider, TxAssembler, TxSubmitter, WalletSigner};
use crate::indexed::{InputOrdering, InputRole};
use crate::plan::{Redeemer, TxInstruction, TxPlan};
use crate::transaction::{
    PlutusScript, RedeemerEntry, RedeemerPurpose, SignedTx, TxBody, TxOutput, UnsignedTx, Witness,
};
use crate::TxError;

#[derive(Debug, Default)]
struct Ledger {
    utxos: BTreeMap<OutRef, Utxo>,
    now: PosixTime,
    genesis_count: u64,
}

/// In-memory ledger state plus the collaborator implementations over it.
#[derive(Debug, Default)]
pub struct MemoryChain {
    ledger: Mutex<Ledger>,
    fee: u64,
}

fn value_error(e: ValueError) -> ChainError {
    ChainError::Assembly(e.to_string())
}

impl MemoryChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flat fee charged to every assembled transaction.
    pub fn with_fee(mut self, fee: u64) -> Self {
        self.fee = fee;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the ledger clock used for validity-interval checks.
    pub fn set_time(&self, now: PosixTime) {
        self.lock().now = now;
    }

    pub fn now(&self) -> PosixTime {
        self.lock().now
    }

    /// Create a UTxO out of thin air.
    pub fn fund(&self, address: &Address, value: Value) -> OutRef {
        let mut ledger = self.lock();
        ledger.genesis_count += 1;
        let tx_hash = blake2b_256(&ledger.genesis_count.to_be_bytes());
        let out_ref = OutRef::new(tx_hash, 0);
        ledger.utxos.insert(
            out_ref,
            Utxo {
                out_ref,
                address: address.clone(),
                value,
                datum: None,
            },
        );
        out_ref
    }

    pub fn utxo(&self, out_ref: &OutRef) -> Option<Utxo> {
        self.lock().utxos.get(out_ref).cloned()
    }

    pub fn all_utxos(&self) -> Vec<Utxo> {
        self.lock().utxos.values().cloned().collect()
    }

    /// Total value sitting at `address`.
    pub fn balance(&self, address: &Address) -> Result<Value, ChainError> {
        self.lock()
            .utxos
            .values()
            .filter(|u| &u.address == address)
            .try_fold(Value::default(), |acc, u| acc.checked_add(&u.value))
            .map_err(value_error)
    }
}

/// First asset `required` holds more of than `available`.
fn first_shortfall(available: &Value, required: &Value) -> Option<(AssetClass, u64, u64)> {
    required.iter().find_map(|(class, need)| {
        let have = available.quantity_of(&class);
        (have < need).then_some((class, need, have))
    })
}

#[async_trait]
impl ChainProvider for MemoryChain {
    async fn utxos_at(&self, address: &Address) -> Result<Vec<Utxo>, ChainError> {
        Ok(self
            .lock()
            .utxos
            .values()
            .filter(|u| &u.address == address)
            .cloned()
            .collect())
    }

    async fn utxos_with_unit(&self, unit: &AssetClass) -> Result<Vec<Utxo>, ChainError> {
        Ok(self.lock().utxos.values().filter(|u| u.holds(unit)).cloned().collect())
    }
}

#[async_trait]
impl TxAssembler for MemoryChain {
    async fn assemble(&self, plan: TxPlan, change_address: &Address) -> Result<UnsignedTx, ChainError> {
        plan.validate()?;
        let ledger = self.lock();

        let mut spent: Vec<(Utxo, Option<Redeemer>)> = Vec::new();
        let mut reference: Vec<Utxo> = Vec::new();
        let mut mints: BTreeMap<PolicyId, (BTreeMap<AssetName, i64>, Redeemer)> = BTreeMap::new();
        let mut outputs: Vec<TxOutput> = Vec::new();
        let mut scripts: Vec<PlutusScript> = Vec::new();
        let mut signers: BTreeSet<KeyHash> = BTreeSet::new();
        let mut valid_from = None;
        let mut valid_to = None;

        for instruction in plan.into_instructions() {
            match instruction {
                TxInstruction::Collect { utxos, redeemer } => {
                    for utxo in utxos {
                        spent.push((utxo, redeemer.clone()));
                    }
                }
                TxInstruction::ReadFrom(utxos) => reference.extend(utxos),
                TxInstruction::Mint { policy_id, assets, redeemer } => {
                    if mints.insert(policy_id, (assets, redeemer)).is_some() {
                        return Err(ChainError::Assembly(format!("policy {} minted twice", policy_id)));
                    }
                }
                TxInstruction::Pay { address, value, datum } => outputs.push(TxOutput { address, value, datum }),
                TxInstruction::AttachScript(script) => {
                    if !scripts.contains(&script) {
                        scripts.push(script);
                    }
                }
                TxInstruction::ValidFrom(t) => valid_from = Some(t),
                TxInstruction::ValidTo(t) => valid_to = Some(t),
                TxInstruction::AddSigner(k) => {
                    signers.insert(k);
                }
            }
        }

        for utxo in spent.iter().map(|(u, _)| u).chain(reference.iter()) {
            if !ledger.utxos.contains_key(&utxo.out_ref) {
                return Err(ChainError::Assembly(format!("input {} is not in the UTxO set", utxo.out_ref)));
            }
        }

        let mut available = Value::default();
        for (utxo, _) in &spent {
            available = available.checked_add(&utxo.value).map_err(value_error)?;
        }
        let mut required = Value::lovelace(self.fee);
        for output in &outputs {
            required = required.checked_add(&output.value).map_err(value_error)?;
        }
        for (policy_id, (assets, _)) in &mints {
            for (name, qty) in assets {
                let class = AssetClass::native(*policy_id, name.clone());
                if *qty > 0 {
                    available.add_asset(&class, qty.unsigned_abs()).map_err(value_error)?;
                } else {
                    required.add_asset(&class, qty.unsigned_abs()).map_err(value_error)?;
                }
            }
        }

        // Cover deficits from the change address, in canonical order.
        let used: BTreeSet<OutRef> = spent
            .iter()
            .map(|(u, _)| u.out_ref)
            .chain(reference.iter().map(|u| u.out_ref))
            .collect();
        let mut candidates: Vec<&Utxo> = ledger
            .utxos
            .values()
            .filter(|u| &u.address == change_address && !used.contains(&u.out_ref))
            .collect();
        while let Some((class, need, have)) = first_shortfall(&available, &required) {
            let Some(pos) = candidates.iter().position(|u| u.holds(&class)) else {
                return Err(ChainError::InsufficientFunds {
                    unit: class.unit(),
                    need,
                    have,
                });
            };
            let utxo = candidates.remove(pos).clone();
            debug!("selected {} to cover {}", utxo.out_ref, class.unit());
            available = available.checked_add(&utxo.value).map_err(value_error)?;
            spent.push((utxo, None));
        }

        let change = available.checked_sub(&required).map_err(value_error)?;
        if !change.is_empty() {
            outputs.push(TxOutput {
                address: change_address.clone(),
                value: change,
                datum: None,
            });
        }

        let ordering = InputOrdering::new(
            spent.iter().map(|(u, _)| u.out_ref),
            reference.iter().map(|u| u.out_ref),
        );
        let attached: BTreeSet<ScriptHash> = scripts.iter().map(PlutusScript::hash).collect();

        let mut redeemers = Vec::new();
        for (utxo, redeemer) in &spent {
            let index = ordering
                .index_of(&utxo.out_ref, InputRole::Spend)
                .ok_or(TxError::UnresolvedInput(utxo.out_ref))?;
            match (utxo.address.script_hash(), redeemer) {
                (Some(hash), Some(redeemer)) => {
                    if !attached.contains(&hash) {
                        return Err(ChainError::Assembly(format!("no script attached for input {}", utxo.out_ref)));
                    }
                    let data = redeemer.resolve(&ordering)?;
                    debug!("spend redeemer for {} at index {}", utxo.out_ref, index);
                    redeemers.push(RedeemerEntry {
                        purpose: RedeemerPurpose::Spend,
                        index,
                        data,
                    });
                }
                (Some(_), None) => {
                    return Err(ChainError::Assembly(format!(
                        "script input {} collected without a redeemer",
                        utxo.out_ref
                    )));
                }
                (None, Some(_)) => {
                    return Err(ChainError::Assembly(format!(
                        "key input {} collected with a redeemer",
                        utxo.out_ref
                    )));
                }
                (None, None) => {}
            }
        }
        for (index, (policy_id, (_, redeemer))) in mints.iter().enumerate() {
            if !attached.contains(policy_id) {
                return Err(ChainError::Assembly(format!("no minting policy attached for {}", policy_id)));
            }
            redeemers.push(RedeemerEntry {
                purpose: RedeemerPurpose::Mint,
                index: index as u64,
                data: redeemer.resolve(&ordering)?,
            });
        }

        let body = TxBody {
            inputs: ordering.spend_inputs().to_vec(),
            reference_inputs: ordering.reference_inputs().to_vec(),
            outputs,
            mint: mints.into_iter().map(|(p, (assets, _))| (p, assets)).collect(),
            redeemers,
            valid_from,
            valid_to,
            required_signers: signers.into_iter().collect(),
            scripts,
            fee: self.fee,
        };
        let tx = UnsignedTx::new(body);
        debug!(
            "assembled {} with {} inputs and {} outputs",
            tx.hash,
            tx.body.inputs.len(),
            tx.body.outputs.len()
        );
        Ok(tx)
    }
}

fn rejected(reason: impl Into<String>) -> ChainError {
    ChainError::Rejected(reason.into())
}

#[async_trait]
impl TxSubmitter for MemoryChain {
    async fn submit(&self, tx: SignedTx) -> Result<TxHash, ChainError> {
        let mut ledger = self.lock();
        let body = &tx.body;

        if body.hash() != tx.hash {
            return Err(rejected("transaction hash does not match its body"));
        }
        for input in &body.inputs {
            if !ledger.utxos.contains_key(input) {
                return Err(rejected(format!("UTxO already spent: {}", input)));
            }
        }
        for input in &body.reference_inputs {
            if !ledger.utxos.contains_key(input) {
                return Err(rejected(format!("reference input not found: {}", input)));
            }
        }
        if let Some(from) = body.valid_from {
            if ledger.now < from {
                return Err(rejected(format!("not valid before {}, now {}", from, ledger.now)));
            }
        }
        if let Some(to) = body.valid_to {
            if ledger.now > to {
                return Err(rejected(format!("expired at {}, now {}", to, ledger.now)));
            }
        }

        let mut needed: BTreeSet<KeyHash> = body.required_signers.iter().copied().collect();
        let mut consumed = Value::default();
        for input in &body.inputs {
            if let Some(utxo) = ledger.utxos.get(input) {
                needed.extend(utxo.address.key_hash());
                consumed = consumed.checked_add(&utxo.value).map_err(|e| rejected(e.to_string()))?;
            }
        }
        for key_hash in &needed {
            let valid = tx
                .witnesses
                .iter()
                .any(|w| &w.key_hash == key_hash && w.signature == mock_signature(key_hash, &tx.hash));
            if !valid {
                return Err(rejected(format!("missing signature from {}", key_hash)));
            }
        }

        let mut produced = Value::lovelace(body.fee);
        for output in &body.outputs {
            produced = produced.checked_add(&output.value).map_err(|e| rejected(e.to_string()))?;
        }
        for (policy_id, assets) in &body.mint {
            for (name, qty) in assets {
                let class = AssetClass::native(*policy_id, name.clone());
                let result = if *qty > 0 {
                    consumed.add_asset(&class, qty.unsigned_abs())
                } else {
                    produced.add_asset(&class, qty.unsigned_abs())
                };
                result.map_err(|e| rejected(e.to_string()))?;
            }
        }
        if consumed != produced {
            return Err(rejected("value is not preserved"));
        }

        for input in &body.inputs {
            ledger.utxos.remove(input);
        }
        for (index, output) in body.outputs.iter().enumerate() {
            let out_ref = OutRef::new(tx.hash, index as u32);
            ledger.utxos.insert(
                out_ref,
                Utxo {
                    out_ref,
                    address: output.address.clone(),
                    value: output.value.clone(),
                    datum: output.datum.as_ref().map(|d| d.to_cbor()),
                },
            );
        }
        debug!("memory chain applied {}", tx.hash);
        Ok(tx.hash)
    }
}

/// Signature a [`MemoryWallet`] produces and [`MemoryChain`] accepts.
pub fn mock_signature(key_hash: &KeyHash, tx_hash: &TxHash) -> Vec<u8> {
    let mut preimage = key_hash.as_bytes().to_vec();
    preimage.extend_from_slice(tx_hash.as_bytes());
    blake2b_256(&preimage).as_bytes().to_vec()
}

/// A single-key wallet for the in-memory ledger.
#[derive(Debug, Clone)]
pub struct MemoryWallet {
    key_hash: KeyHash,
    network: Network,
}

impl MemoryWallet {
    /// Derive the key hash from a name so tests can create distinct parties.
    pub fn new(network: Network, name: &str) -> Self {
        Self {
            key_hash: blake2b_224(name.as_bytes()),
            network,
        }
    }

    pub fn key_hash(&self) -> KeyHash {
        self.key_hash
    }

    fn witness(&self, tx: &UnsignedTx) -> Witness {
        Witness {
            key_hash: self.key_hash,
            signature: mock_signature(&self.key_hash, &tx.hash),
        }
    }
}

#[async_trait]
impl WalletSigner for MemoryWallet {
    fn address(&self) -> Address {
        Address::key(self.network, self.key_hash)
    }

    async fn sign(&self, tx: UnsignedTx) -> Result<SignedTx, ChainError> {
        let witness = self.witness(&tx);
        Ok(tx.with_witnesses(vec![witness]))
    }

    async fn partial_sign(&self, tx: &UnsignedTx) -> Result<Witness, ChainError> {
        Ok(self.witness(tx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexed::{IndexedInput, PendingRedeemer};
    use subpay_types::PlutusData;

    fn always_true() -> PlutusScript {
        PlutusScript::new(vec![0x58, 0x01, 0x01])
    }

    fn token(script: &PlutusScript) -> AssetClass {
        AssetClass::native(script.hash(), AssetName::new(b"nft".to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_payment_with_change() {
        let chain = MemoryChain::new().with_fee(200_000);
        let alice = MemoryWallet::new(Network::Preview, "alice");
        let bob = MemoryWallet::new(Network::Preview, "bob");
        chain.fund(&alice.address(), Value::lovelace(10_000_000));

        let plan = TxPlan::new().pay_to_address(bob.address(), Value::lovelace(3_000_000));
        let tx = chain.assemble(plan, &alice.address()).await.unwrap();
        assert_eq!(tx.body.inputs.len(), 1);
        let signed = alice.sign(tx).await.unwrap();
        chain.submit(signed).await.unwrap();

        assert_eq!(chain.balance(&bob.address()).unwrap().coin, 3_000_000);
        assert_eq!(chain.balance(&alice.address()).unwrap().coin, 6_800_000);
    }

    #[tokio::test]
    async fn test_insufficient_funds() {
        let chain = MemoryChain::new();
        let alice = MemoryWallet::new(Network::Preview, "alice");
        chain.fund(&alice.address(), Value::lovelace(1_000));
        let plan = TxPlan::new().pay_to_address(alice.address(), Value::lovelace(5_000));
        let err = chain.assemble(plan, &alice.address()).await.unwrap_err();
        assert!(matches!(err, ChainError::InsufficientFunds { need: 5_000, have: 1_000, .. }));
    }

    #[tokio::test]
    async fn test_double_spend_rejected() {
        let chain = MemoryChain::new();
        let alice = MemoryWallet::new(Network::Preview, "alice");
        chain.fund(&alice.address(), Value::lovelace(5_000_000));

        let plan = TxPlan::new().pay_to_address(alice.address(), Value::lovelace(1_000_000));
        let tx = chain.assemble(plan, &alice.address()).await.unwrap();
        let signed = alice.sign(tx).await.unwrap();
        chain.submit(signed.clone()).await.unwrap();
        let err = chain.submit(signed).await.unwrap_err();
        assert!(matches!(err, ChainError::Rejected(ref m) if m.contains("already spent")));
    }

    #[tokio::test]
    async fn test_missing_signature_rejected() {
        let chain = MemoryChain::new();
        let alice = MemoryWallet::new(Network::Preview, "alice");
        let mallory = MemoryWallet::new(Network::Preview, "mallory");
        chain.fund(&alice.address(), Value::lovelace(5_000_000));

        let plan = TxPlan::new().pay_to_address(mallory.address(), Value::lovelace(1_000_000));
        let tx = chain.assemble(plan, &alice.address()).await.unwrap();
        let signed = mallory.sign(tx).await.unwrap();
        assert!(matches!(chain.submit(signed).await, Err(ChainError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_validity_window() {
        let chain = MemoryChain::new();
        let alice = MemoryWallet::new(Network::Preview, "alice");
        chain.fund(&alice.address(), Value::lovelace(5_000_000));

        let plan = TxPlan::new()
            .pay_to_address(alice.address(), Value::lovelace(1_000_000))
            .valid_from(100)
            .valid_to(200);
        let tx = chain.assemble(plan, &alice.address()).await.unwrap();
        let signed = alice.sign(tx).await.unwrap();

        chain.set_time(50);
        assert!(chain.submit(signed.clone()).await.is_err());
        chain.set_time(250);
        assert!(chain.submit(signed.clone()).await.is_err());
        chain.set_time(150);
        assert!(chain.submit(signed).await.is_ok());
    }

    #[tokio::test]
    async fn test_mint_and_spend_script_output_with_indexed_redeemer() {
        let chain = MemoryChain::new();
        let alice = MemoryWallet::new(Network::Preview, "alice");
        let script = always_true();
        let script_address = Address::script(Network::Preview, script.hash());
        let nft = token(&script);
        chain.fund(&alice.address(), Value::lovelace(10_000_000));

        let mut assets = BTreeMap::new();
        assets.insert(AssetName::new(b"nft".to_vec()).unwrap(), 1);
        let locked = Value::lovelace(2_000_000).with_asset(&nft, 1).unwrap();
        let plan = TxPlan::new()
            .mint_assets(script.hash(), assets, PlutusData::constr(0, vec![]))
            .pay_to_contract(script_address.clone(), locked, PlutusData::int(7))
            .attach_script(script.clone());
        let tx = chain.assemble(plan, &alice.address()).await.unwrap();
        let hash = chain.submit(alice.sign(tx).await.unwrap()).await.unwrap();

        let at_script = chain.utxos_at(&script_address).await.unwrap();
        assert_eq!(at_script.len(), 1);
        assert_eq!(at_script[0].out_ref.tx_hash, hash);
        assert_eq!(at_script[0].datum, Some(PlutusData::int(7).to_cbor()));

        let target = at_script[0].out_ref;
        let pending = PendingRedeemer::new(vec![IndexedInput::spend(target)], |idx| {
            PlutusData::int(idx[0])
        });
        let mut burn = BTreeMap::new();
        burn.insert(AssetName::new(b"nft".to_vec()).unwrap(), -1);
        let plan = TxPlan::new()
            .collect_from(at_script, pending)
            .mint_assets(script.hash(), burn, PlutusData::constr(1, vec![]))
            .attach_script(script);
        let tx = chain.assemble(plan, &alice.address()).await.unwrap();
        let index = tx.body.inputs.iter().position(|r| *r == target).unwrap() as u64;
        assert_eq!(
            tx.body.redeemer(RedeemerPurpose::Spend, index),
            Some(&PlutusData::int(index))
        );
        chain.submit(alice.sign(tx).await.unwrap()).await.unwrap();
        assert!(chain.utxos_with_unit(&nft).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_script_input_needs_attached_script() {
        let chain = MemoryChain::new();
        let alice = MemoryWallet::new(Network::Preview, "alice");
        let script = always_true();
        let script_address = Address::script(Network::Preview, script.hash());
        chain.fund(&script_address, Value::lovelace(2_000_000));
        let utxos = chain.utxos_at(&script_address).await.unwrap();

        let plan = TxPlan::new().collect_from(utxos, PlutusData::int(0));
        let err = chain.assemble(plan, &alice.address()).await.unwrap_err();
        assert!(matches!(err, ChainError::Assembly(_)));
    }
}
