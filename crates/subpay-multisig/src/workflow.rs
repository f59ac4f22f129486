//! Init, sign, update and end workflows for a multisig treasury.
//!
//! Every workflow returns a [`PendingMultisigTx`] instead of submitting: the
//! co-signers witness it out of band and [`MultisigContext::submit`] sends it.

use std::collections::BTreeMap;

use log::{debug, info};
use subpay_offchain::blueprint::Validator;
use subpay_offchain::classify::decode_all;
use subpay_offchain::{Blueprint, ProtocolConfig, ProtocolContext, ProtocolError};
use subpay_tx::{Redeemer, TxPlan};
use subpay_types::{
    derive_token_name, Address, AssetClass, AssetName, KeyHash, PlutusSchema, PosixTime, ReadableUtxo, TxHash,
    Utxo, Value,
};

use crate::datum::{MultisigDatum, MultisigMintRedeemer, MultisigSpendRedeemer};
use crate::error::{MultisigError, Result};
use crate::pending::PendingMultisigTx;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitMultisigConfig {
    pub signers: Vec<KeyHash>,
    pub threshold: u64,
    pub funds: AssetClass,
    /// Quantity of `funds` deposited by the coordinator.
    pub amount: u64,
    pub spending_limit: u64,
    pub minimum_ada: u64,
    pub current_time: PosixTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignMultisigConfig {
    pub multisig_tn: AssetName,
    pub recipient: Address,
    pub amount: u64,
    /// Signers approving this spend.
    pub signing: Vec<KeyHash>,
    pub current_time: PosixTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateMultisigConfig {
    pub multisig_tn: AssetName,
    pub signers: Vec<KeyHash>,
    pub threshold: u64,
    pub spending_limit: u64,
    pub signing: Vec<KeyHash>,
    pub current_time: PosixTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndMultisigConfig {
    pub multisig_tn: AssetName,
    /// Receives everything left in the treasury.
    pub recipient: Address,
    pub signing: Vec<KeyHash>,
    pub current_time: PosixTime,
}

/// A [`ProtocolContext`] paired with the multisig validator.
#[derive(Clone)]
pub struct MultisigContext {
    pub protocol: ProtocolContext,
    pub script: Validator,
}

impl MultisigContext {
    pub fn new(protocol: ProtocolContext, blueprint: &Blueprint, config: &ProtocolConfig) -> Result<Self> {
        let script = blueprint.validator(&config.validators.multisig)?.clone();
        Ok(Self { protocol, script })
    }

    pub fn address(&self) -> Address {
        self.script.address(self.protocol.network)
    }

    fn token(&self, name: AssetName) -> AssetClass {
        AssetClass::native(self.script.policy_id(), name)
    }

    /// Every treasury at the validator with a decodable datum.
    pub async fn multisigs(&self) -> Result<Vec<ReadableUtxo<MultisigDatum>>> {
        let utxos = self.protocol.provider.utxos_at(&self.address()).await?;
        Ok(decode_all::<MultisigDatum>(&utxos)
            .into_iter()
            .map(|(utxo, datum)| ReadableUtxo {
                out_ref: utxo.out_ref,
                datum,
                assets: utxo.value,
            })
            .collect())
    }

    async fn find(&self, multisig_tn: &AssetName) -> Result<(Utxo, MultisigDatum)> {
        let utxos = self
            .protocol
            .provider
            .utxos_at_with_unit(&self.address(), &self.token(multisig_tn.clone()))
            .await?;
        let mut found = decode_all::<MultisigDatum>(&utxos);
        if found.len() != 1 {
            return Err(ProtocolError::Precondition(format!(
                "expected one multisig holding {}, found {}",
                multisig_tn,
                found.len()
            ))
            .into());
        }
        Ok(found.remove(0))
    }

    fn with_validity(&self, plan: TxPlan, current_time: PosixTime) -> Result<TxPlan> {
        let (from, to) = self.protocol.validity(current_time)?;
        Ok(plan.valid_from(from).valid_to(to))
    }

    /// Assemble `plan` and wrap it for witness collection. The coordinator
    /// pays the fee, so its key is always required too.
    async fn pending(&self, action: &str, plan: TxPlan, signers: &[KeyHash]) -> Result<PendingMultisigTx> {
        let plan = signers.iter().fold(plan, |plan, k| plan.add_signer(*k));
        let tx = self.protocol.assemble(action, plan).await?;
        let mut required = signers.to_vec();
        required.push(self.protocol.wallet_key_hash()?);
        let pending = PendingMultisigTx::new(action, tx, required);
        debug!("{}: {} awaiting {} witness(es)", action, pending.hash(), pending.required.len());
        Ok(pending)
    }

    /// Lock `amount` of `funds` under a fresh treasury token. Every initial
    /// signer must witness the transaction.
    pub async fn prepare_init(&self, config: &InitMultisigConfig) -> Result<PendingMultisigTx> {
        let datum = MultisigDatum {
            signers: config.signers.clone(),
            threshold: config.threshold,
            funds: config.funds.clone(),
            spending_limit: config.spending_limit,
            minimum_ada: config.minimum_ada,
        };
        datum.validate()?;

        let seed = self
            .protocol
            .wallet_utxos()
            .await?
            .into_iter()
            .min_by_key(|u| u.out_ref)
            .ok_or_else(|| ProtocolError::Precondition("no UTxO available to seed the mint".into()))?;
        let name = derive_token_name(&seed.out_ref, &[])?;
        let value = Value::lovelace(config.minimum_ada)
            .with_asset(&config.funds, config.amount)?
            .with_asset(&self.token(name.clone()), 1)?;
        debug!("init multisig: token {}, {} of {}", name, config.threshold, config.signers.len());

        let mint = Redeemer::of(&MultisigMintRedeemer::Init {
            output_reference: seed.out_ref,
        });
        let plan = TxPlan::new()
            .collect_wallet(vec![seed])
            .mint_assets(self.script.policy_id(), BTreeMap::from([(name, 1)]), mint)
            .pay_to_contract(self.address(), value, datum.to_data())
            .attach_script(self.script.script.clone());
        let plan = self.with_validity(plan, config.current_time)?;
        self.pending("init multisig", plan, &config.signers).await
    }

    /// Release `amount` of the treasury's funds to `recipient`.
    pub async fn prepare_sign(&self, config: &SignMultisigConfig) -> Result<PendingMultisigTx> {
        let (treasury, datum) = self.find(&config.multisig_tn).await?;
        datum.check_approval(&config.signing)?;
        if config.amount == 0 {
            return Err(ProtocolError::InvalidConfig("amount must be positive".into()).into());
        }
        if config.amount > datum.spending_limit {
            return Err(MultisigError::SpendingLimit {
                amount: config.amount,
                limit: datum.spending_limit,
            });
        }
        let released = Value::from_asset(&datum.funds, config.amount);
        let remaining = treasury.value.checked_sub(&released)?;
        if remaining.coin < datum.minimum_ada {
            return Err(ProtocolError::Precondition(format!(
                "treasury would drop below its minimum of {} lovelace",
                datum.minimum_ada
            ))
            .into());
        }

        let plan = TxPlan::new()
            .collect_from(vec![treasury], Redeemer::of(&MultisigSpendRedeemer::Sign))
            .pay_to_address(config.recipient.clone(), released)
            .pay_to_contract(self.address(), remaining, datum.to_data())
            .attach_script(self.script.script.clone());
        let plan = self.with_validity(plan, config.current_time)?;
        self.pending("sign multisig", plan, &config.signing).await
    }

    /// Replace the signer set, threshold and spending limit. Approval is
    /// checked against the current parameters.
    pub async fn prepare_update(&self, config: &UpdateMultisigConfig) -> Result<PendingMultisigTx> {
        let (treasury, current) = self.find(&config.multisig_tn).await?;
        current.check_approval(&config.signing)?;
        let updated = MultisigDatum {
            signers: config.signers.clone(),
            threshold: config.threshold,
            spending_limit: config.spending_limit,
            ..current
        };
        updated.validate()?;

        let value = treasury.value.clone();
        let plan = TxPlan::new()
            .collect_from(vec![treasury], Redeemer::of(&MultisigSpendRedeemer::Update))
            .pay_to_contract(self.address(), value, updated.to_data())
            .attach_script(self.script.script.clone());
        let plan = self.with_validity(plan, config.current_time)?;
        self.pending("update multisig", plan, &config.signing).await
    }

    /// Dissolve the treasury: burn its token and pay out the rest.
    pub async fn prepare_end(&self, config: &EndMultisigConfig) -> Result<PendingMultisigTx> {
        let (treasury, datum) = self.find(&config.multisig_tn).await?;
        datum.check_approval(&config.signing)?;
        let payout = treasury
            .value
            .checked_sub(&Value::from_asset(&self.token(config.multisig_tn.clone()), 1))?;

        let plan = TxPlan::new()
            .collect_from(vec![treasury], Redeemer::of(&MultisigSpendRedeemer::Remove))
            .mint_assets(
                self.script.policy_id(),
                BTreeMap::from([(config.multisig_tn.clone(), -1)]),
                Redeemer::of(&MultisigMintRedeemer::Burn),
            )
            .pay_to_address(config.recipient.clone(), payout)
            .attach_script(self.script.script.clone());
        let plan = self.with_validity(plan, config.current_time)?;
        self.pending("end multisig", plan, &config.signing).await
    }

    /// Add the coordinator's own witness when still missing, then submit.
    pub async fn submit(&self, mut pending: PendingMultisigTx) -> Result<TxHash> {
        let own = self.protocol.wallet_key_hash()?;
        if !pending.has_witness(&own) {
            let witness = self.protocol.wallet.partial_sign(&pending.tx).await?;
            pending.add_witness(witness)?;
        }
        let action = pending.action.clone();
        let signed = pending.into_signed()?;
        let tx_hash = self.protocol.submitter.submit(signed).await?;
        info!("{} submitted: {}", action, tx_hash);
        Ok(tx_hash)
    }
}
