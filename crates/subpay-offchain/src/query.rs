//! Read-only views of protocol state.
//!
//! The script addresses accept outputs from anyone, so a decodable datum
//! alone does not make a UTxO protocol state. Payment escrows are also
//! checked against the token and funds they must carry.

use std::collections::BTreeMap;

use log::debug;
use subpay_types::{
    AccountDatum, AssetClass, AssetName, PaymentDatum, PaymentValidatorDatum, PenaltyDatum, ReadableUtxo,
    ServiceDatum, Utxo,
};

use crate::classify::decode_all;
use crate::context::ProtocolContext;
use crate::error::Result;

/// Whether `utxo` is a live escrow for `datum`: it holds exactly one payment
/// token, the schedule is well formed and the locked `service_fee` covers
/// every remaining installment.
pub(crate) fn is_genuine_payment(
    ctx: &ProtocolContext,
    utxo: &Utxo,
    datum: &PaymentDatum,
    service_fee: &AssetClass,
) -> bool {
    let one_token = utxo
        .value
        .assets
        .get(&ctx.scripts.payment.policy_id())
        .is_some_and(|names| names.len() == 1 && names.values().all(|qty| *qty == 1));
    let funded = datum
        .remaining_amount()
        .is_some_and(|remaining| remaining <= utxo.value.quantity_of(service_fee));
    let genuine = one_token && datum.is_well_formed() && funded;
    if !genuine {
        debug!("ignoring payment datum at {} without a matching escrow", utxo.out_ref);
    }
    genuine
}

/// Whether a penalty UTxO still holds the penalty its datum names.
pub(crate) fn is_funded_penalty(utxo: &Utxo, datum: &PenaltyDatum) -> bool {
    utxo.value.quantity_of(&datum.penalty_fee) >= datum.penalty_fee_qty
}

fn view<T>(utxo: Utxo, datum: T) -> ReadableUtxo<T> {
    ReadableUtxo {
        out_ref: utxo.out_ref,
        datum,
        assets: utxo.value,
    }
}

pub async fn services(ctx: &ProtocolContext) -> Result<Vec<ReadableUtxo<ServiceDatum>>> {
    let utxos = ctx.provider.utxos_at(&ctx.service_address()).await?;
    Ok(decode_all::<ServiceDatum>(&utxos)
        .into_iter()
        .map(|(u, d)| view(u, d))
        .collect())
}

pub async fn accounts(ctx: &ProtocolContext) -> Result<Vec<ReadableUtxo<AccountDatum>>> {
    let utxos = ctx.provider.utxos_at(&ctx.account_address()).await?;
    Ok(decode_all::<AccountDatum>(&utxos)
        .into_iter()
        .map(|(u, d)| view(u, d))
        .collect())
}

/// Active payment escrows. Penalty UTxOs at the same address are excluded,
/// as are datums that do not sit on a genuine escrow of a known service.
pub async fn payments(ctx: &ProtocolContext) -> Result<Vec<ReadableUtxo<PaymentDatum>>> {
    let service_policy = ctx.scripts.service.policy_id();
    let fees: BTreeMap<AssetName, AssetClass> = services(ctx)
        .await?
        .into_iter()
        .flat_map(|s| {
            let fee = s.datum.service_fee.clone();
            s.assets
                .assets
                .get(&service_policy)
                .map(|names| names.keys().cloned().collect::<Vec<_>>())
                .unwrap_or_default()
                .into_iter()
                .map(move |name| (name, fee.clone()))
        })
        .collect();

    let utxos = ctx.provider.utxos_at(&ctx.payment_address()).await?;
    Ok(decode_all::<PaymentValidatorDatum>(&utxos)
        .into_iter()
        .filter_map(|(u, d)| match d {
            PaymentValidatorDatum::Payment(p) => {
                let fee = fees.get(&p.service_nft_tn)?;
                is_genuine_payment(ctx, &u, &p, fee).then(|| view(u, p))
            }
            PaymentValidatorDatum::Penalty(_) => None,
        })
        .collect())
}

pub async fn penalties(ctx: &ProtocolContext) -> Result<Vec<ReadableUtxo<PenaltyDatum>>> {
    let utxos = ctx.provider.utxos_at(&ctx.payment_address()).await?;
    Ok(decode_all::<PaymentValidatorDatum>(&utxos)
        .into_iter()
        .filter_map(|(u, d)| match d {
            PaymentValidatorDatum::Penalty(p) => is_funded_penalty(&u, &p).then(|| view(u, p)),
            PaymentValidatorDatum::Payment(_) => None,
        })
        .collect())
}
