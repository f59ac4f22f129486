//! Service workflows: create, update and retire a merchant's service.
//!
//! A service is a reference token locked at the service validator with a
//! [`ServiceDatum`], plus the paired user token held by the merchant.
//! Updates and removal spend both and recreate the reference output.

use log::debug;
use subpay_tx::{IndexedInput, PendingRedeemer, TxPlan};
use subpay_types::{
    find_paired_token_names, AssetClass, AssetName, PlutusSchema, ServiceDatum, ServiceMintRedeemer,
    ServiceSpend, ServiceSpendRedeemer, TokenPair, TxHash, Utxo, Value,
};

use crate::classify::{decode_datum, find_by_asset_unit};
use crate::context::{pair_quantities, seed_utxo, ProtocolContext};
use crate::error::{ProtocolError, Result};

/// Terms a merchant publishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceTerms {
    pub service_fee: AssetClass,
    pub service_fee_qty: u64,
    pub penalty_fee: AssetClass,
    pub penalty_fee_qty: u64,
    pub interval_length: u64,
    pub num_intervals: u64,
    pub minimum_ada: u64,
}

impl ServiceTerms {
    pub fn validate(&self) -> Result<()> {
        if self.service_fee_qty == 0 {
            return Err(ProtocolError::InvalidConfig("service_fee_qty must be positive".into()));
        }
        if self.interval_length == 0 {
            return Err(ProtocolError::InvalidConfig("interval_length must be positive".into()));
        }
        if self.num_intervals == 0 {
            return Err(ProtocolError::InvalidConfig("num_intervals must be positive".into()));
        }
        Ok(())
    }

    pub fn to_datum(&self, is_active: bool) -> ServiceDatum {
        ServiceDatum {
            service_fee: self.service_fee.clone(),
            service_fee_qty: self.service_fee_qty,
            penalty_fee: self.penalty_fee.clone(),
            penalty_fee_qty: self.penalty_fee_qty,
            interval_length: self.interval_length,
            num_intervals: self.num_intervals,
            minimum_ada: self.minimum_ada,
            is_active,
        }
    }
}

/// A merchant's service as seen from the merchant's wallet.
#[derive(Debug, Clone)]
pub(crate) struct MerchantService {
    pub tokens: TokenPair,
    pub service: Utxo,
    pub datum: ServiceDatum,
    /// Wallet UTxO holding the service user token.
    pub merchant: Utxo,
}

/// Locate the service whose user token the context wallet holds.
///
/// With several services per merchant, the first pair found wins.
pub(crate) async fn merchant_service(ctx: &ProtocolContext) -> Result<MerchantService> {
    let script_utxos = ctx.provider.utxos_at(&ctx.service_address()).await?;
    let wallet_utxos = ctx.wallet_utxos().await?;
    let policy_id = ctx.scripts.service.policy_id();

    let mut scan = script_utxos.clone();
    scan.extend(wallet_utxos.iter().cloned());
    let tokens = find_paired_token_names(&scan, &policy_id)?;

    let service = find_by_asset_unit(&script_utxos, &AssetClass::native(policy_id, tokens.reference.clone()))?.clone();
    let merchant = find_by_asset_unit(&wallet_utxos, &AssetClass::native(policy_id, tokens.user.clone()))?.clone();
    let datum = decode_datum::<ServiceDatum>(service.datum.as_deref())?;
    debug!("merchant service {} at {}", tokens.reference.to_hex(), service.out_ref);
    Ok(MerchantService {
        tokens,
        service,
        datum,
        merchant,
    })
}

/// The service UTxO carrying reference token `service_nft_tn`.
pub(crate) async fn service_by_token(ctx: &ProtocolContext, service_nft_tn: &AssetName) -> Result<(Utxo, ServiceDatum)> {
    let script_utxos = ctx.provider.utxos_at(&ctx.service_address()).await?;
    let unit = AssetClass::native(ctx.scripts.service.policy_id(), service_nft_tn.clone());
    let utxo = find_by_asset_unit(&script_utxos, &unit)?.clone();
    let datum = decode_datum::<ServiceDatum>(utxo.datum.as_deref())?;
    Ok((utxo, datum))
}

/// Mint a service reference/user pair and publish `terms` as an active
/// service.
pub async fn create_service(ctx: &ProtocolContext, terms: &ServiceTerms) -> Result<TxHash> {
    terms.validate()?;
    let wallet_utxos = ctx.wallet_utxos().await?;
    let seed = seed_utxo(&wallet_utxos)?;
    let tokens = TokenPair::derive(&seed.out_ref)?;
    let policy_id = ctx.scripts.service.policy_id();
    debug!("create service: seed {}, reference token {}", seed.out_ref, tokens.reference.to_hex());

    let seed_ref = seed.out_ref;
    let redeemer = PendingRedeemer::typed(vec![IndexedInput::spend(seed_ref)], move |idx| {
        ServiceMintRedeemer::CreateService {
            output_reference: seed_ref,
            input_index: idx[0],
        }
    });
    let reference_value =
        Value::lovelace(terms.minimum_ada).with_asset(&AssetClass::native(policy_id, tokens.reference.clone()), 1)?;
    let user_value = Value::from_asset(&AssetClass::native(policy_id, tokens.user.clone()), 1);

    let plan = TxPlan::new()
        .collect_wallet(vec![seed])
        .mint_assets(policy_id, pair_quantities(&tokens, 1), redeemer)
        .pay_to_contract(ctx.service_address(), reference_value, terms.to_datum(true).to_data())
        .pay_to_address(ctx.wallet_address(), user_value)
        .attach_script(ctx.scripts.service.script.clone());
    ctx.submit("create service", plan).await
}

async fn respend_service(
    ctx: &ProtocolContext,
    found: MerchantService,
    datum: ServiceDatum,
    value: Value,
    wrap: fn(ServiceSpend) -> ServiceSpendRedeemer,
    action: &str,
) -> Result<TxHash> {
    let reference_name = found.tokens.reference.clone();
    let merchant_ref = found.merchant.out_ref;
    let service_ref = found.service.out_ref;
    let redeemer = PendingRedeemer::typed(
        vec![IndexedInput::spend(merchant_ref), IndexedInput::spend(service_ref)],
        move |idx| {
            wrap(ServiceSpend {
                service_ref_token_name: reference_name.clone(),
                merchant_input_index: idx[0],
                service_input_index: idx[1],
            })
        },
    );

    let plan = TxPlan::new()
        .collect_from(vec![found.service], redeemer)
        .collect_wallet(vec![found.merchant])
        .pay_to_contract(ctx.service_address(), value, datum.to_data())
        .attach_script(ctx.scripts.service.script.clone());
    ctx.submit(action, plan).await
}

/// Replace the terms of the merchant's active service.
pub async fn update_service(ctx: &ProtocolContext, terms: &ServiceTerms) -> Result<TxHash> {
    terms.validate()?;
    let found = merchant_service(ctx).await?;
    if !found.datum.is_active {
        return Err(ProtocolError::Precondition("service is not active".into()));
    }
    let mut value = found.service.value.clone();
    value.coin = value.coin.max(terms.minimum_ada);
    let datum = terms.to_datum(true);
    respend_service(ctx, found, datum, value, ServiceSpendRedeemer::UpdateService, "update service").await
}

/// Retire the merchant's service: `is_active` becomes false, every other
/// field and the locked value stay as they are. Existing payments remain
/// withdrawable.
pub async fn remove_service(ctx: &ProtocolContext) -> Result<TxHash> {
    let found = merchant_service(ctx).await?;
    if !found.datum.is_active {
        return Err(ProtocolError::Precondition("service is already inactive".into()));
    }
    let datum = ServiceDatum {
        is_active: false,
        ..found.datum.clone()
    };
    let value = found.service.value.clone();
    respend_service(ctx, found, datum, value, ServiceSpendRedeemer::RemoveService, "remove service").await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms() -> ServiceTerms {
        ServiceTerms {
            service_fee: AssetClass::Lovelace,
            service_fee_qty: 10_000_000,
            penalty_fee: AssetClass::Lovelace,
            penalty_fee_qty: 1_000_000,
            interval_length: 2_592_000_000,
            num_intervals: 12,
            minimum_ada: 2_000_000,
        }
    }

    #[test]
    fn test_terms_validation() {
        assert!(terms().validate().is_ok());
        let zero_interval = ServiceTerms {
            interval_length: 0,
            ..terms()
        };
        assert!(matches!(zero_interval.validate(), Err(ProtocolError::InvalidConfig(_))));
        let zero_fee = ServiceTerms {
            service_fee_qty: 0,
            ..terms()
        };
        assert!(zero_fee.validate().is_err());
    }

    #[test]
    fn test_to_datum() {
        let d = terms().to_datum(true);
        assert!(d.is_active);
        assert_eq!(d.num_intervals, 12);
        assert_eq!(d.service_fee_qty, 10_000_000);
    }
}
