//! Payment workflows: the subscription escrow lifecycle.
//!
//! A payment is a UTxO at the payment validator holding the prepaid fee for
//! every scheduled installment plus a unique payment token, with a
//! [`PaymentValidatorDatum::Payment`] datum. From there:
//!
//! - the subscriber extends it (more installments, more funds),
//! - the merchant withdraws elapsed installments,
//! - the subscriber unsubscribes early, leaving a
//!   [`PaymentValidatorDatum::Penalty`] UTxO for the merchant,
//! - or, once the service is retired, the subscriber withdraws everything.

use std::collections::BTreeMap;

use log::debug;
use subpay_tx::{IndexedInput, PendingRedeemer, Redeemer, TxPlan};
use subpay_types::{
    derive_token_name, AssetClass, AssetName, PaymentDatum, PaymentMintRedeemer, PaymentSpendRedeemer,
    PaymentValidatorDatum, PenaltyDatum, PlutusSchema, PosixTime, TxHash, Utxo, Value,
};

use crate::account::subscriber_account;
use crate::classify::decode_all;
use crate::context::ProtocolContext;
use crate::error::{ProtocolError, Result};
use crate::installment::{build_schedule, claimable, extend_schedule};
use crate::query::{self, is_funded_penalty, is_genuine_payment};
use crate::service::{merchant_service, service_by_token};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiateSubscriptionConfig {
    /// Reference token of the service to subscribe to.
    pub service_nft_tn: AssetName,
    pub subscription_start: PosixTime,
    pub current_time: PosixTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendSubscriptionConfig {
    pub service_nft_tn: AssetName,
    pub extension_intervals: u64,
    pub current_time: PosixTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerchantWithdrawConfig {
    /// Reference token of the subscriber's account.
    pub subscriber_nft_tn: AssetName,
    pub current_time: PosixTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsubscribeConfig {
    pub service_nft_tn: AssetName,
    pub current_time: PosixTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberWithdrawConfig {
    pub service_nft_tn: AssetName,
    pub current_time: PosixTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawPenaltyConfig {
    pub subscriber_nft_tn: AssetName,
    pub current_time: PosixTime,
}

// ─── Lookups ────────────────────────────────────────────────────────────────

fn single<T>(mut found: Vec<T>, what: &str) -> Result<T> {
    match found.len() {
        0 => Err(ProtocolError::Precondition(format!("no {} found", what))),
        1 => Ok(found.remove(0)),
        n => Err(ProtocolError::Precondition(format!("{} {} found, expected one", n, what))),
    }
}

async fn escrows(
    ctx: &ProtocolContext,
    service_nft_tn: &AssetName,
    subscriber_nft_tn: &AssetName,
) -> Result<Vec<(Utxo, PaymentValidatorDatum)>> {
    let utxos = ctx.provider.utxos_at(&ctx.payment_address()).await?;
    Ok(decode_all::<PaymentValidatorDatum>(&utxos)
        .into_iter()
        .filter(|(_, d)| d.service_nft_tn() == service_nft_tn && d.subscriber_nft_tn() == subscriber_nft_tn)
        .collect())
}

/// The subscriber's active escrow for a service whose fee is paid in
/// `service_fee`. Datum copies without a genuine escrow behind them are
/// skipped.
async fn find_payment(
    ctx: &ProtocolContext,
    service_nft_tn: &AssetName,
    subscriber_nft_tn: &AssetName,
    service_fee: &AssetClass,
) -> Result<(Utxo, PaymentDatum)> {
    let found = escrows(ctx, service_nft_tn, subscriber_nft_tn)
        .await?
        .into_iter()
        .filter_map(|(u, d)| match d {
            PaymentValidatorDatum::Payment(p) => Some((u, p)),
            PaymentValidatorDatum::Penalty(_) => None,
        })
        .filter(|(u, p)| is_genuine_payment(ctx, u, p, service_fee))
        .collect();
    single(found, "active payment")
}

/// The oldest funded penalty left by this subscriber. Unsubscribing twice
/// from the same service leaves two, collected one at a time.
async fn find_penalty(
    ctx: &ProtocolContext,
    service_nft_tn: &AssetName,
    subscriber_nft_tn: &AssetName,
) -> Result<(Utxo, PenaltyDatum)> {
    escrows(ctx, service_nft_tn, subscriber_nft_tn)
        .await?
        .into_iter()
        .filter_map(|(u, d)| match d {
            PaymentValidatorDatum::Penalty(p) => Some((u, p)),
            PaymentValidatorDatum::Payment(_) => None,
        })
        .filter(|(u, p)| is_funded_penalty(u, p))
        .min_by_key(|(u, _)| u.out_ref)
        .ok_or_else(|| ProtocolError::Precondition("no penalty found".into()))
}

/// The payment token held by a payment UTxO.
fn payment_token(ctx: &ProtocolContext, utxo: &Utxo) -> Result<AssetName> {
    let names: Vec<AssetName> = utxo
        .value
        .assets
        .get(&ctx.scripts.payment.policy_id())
        .map(|names| names.keys().cloned().collect())
        .unwrap_or_default();
    single(names, "payment token")
}

fn total_fee(fee_qty: u64, intervals: u64) -> Result<u64> {
    fee_qty
        .checked_mul(intervals)
        .ok_or_else(|| ProtocolError::Overflow("fee total".into()))
}

fn burn_payment_token(ctx: &ProtocolContext, plan: TxPlan, token: AssetName) -> TxPlan {
    plan.mint_assets(
        ctx.scripts.payment.policy_id(),
        BTreeMap::from([(token, -1)]),
        Redeemer::of(&PaymentMintRedeemer::TerminateSubscription),
    )
}

fn with_validity(ctx: &ProtocolContext, plan: TxPlan, current_time: PosixTime) -> Result<TxPlan> {
    let (from, to) = ctx.validity(current_time)?;
    Ok(plan.valid_from(from).valid_to(to))
}

/// `[service reference input, party input, escrow input]` positions.
fn escrow_inputs(service: &Utxo, party: &Utxo, escrow: &Utxo) -> Vec<IndexedInput> {
    vec![
        IndexedInput::reference(service.out_ref),
        IndexedInput::spend(party.out_ref),
        IndexedInput::spend(escrow.out_ref),
    ]
}

// ─── Workflows ──────────────────────────────────────────────────────────────

/// Open a subscription to an active service, prepaying every installment.
pub async fn initiate_subscription(ctx: &ProtocolContext, config: &InitiateSubscriptionConfig) -> Result<TxHash> {
    let (service, terms) = service_by_token(ctx, &config.service_nft_tn).await?;
    if !terms.is_active {
        return Err(ProtocolError::Precondition("service is not active".into()));
    }
    let subscriber = subscriber_account(ctx).await?;
    let already = query::payments(ctx).await?.into_iter().any(|p| {
        p.datum.service_nft_tn == config.service_nft_tn && p.datum.subscriber_nft_tn == subscriber.tokens.reference
    });
    if already {
        return Err(ProtocolError::Precondition("subscription to this service already active".into()));
    }

    let (installments, subscription_end) = build_schedule(
        config.subscription_start,
        terms.interval_length,
        terms.num_intervals,
        terms.service_fee_qty,
    )?;
    let seed = subscriber.subscriber.clone();
    let token = derive_token_name(&seed.out_ref, &[])?;
    let policy_id = ctx.scripts.payment.policy_id();
    let value = Value::lovelace(terms.minimum_ada)
        .with_asset(&terms.service_fee, total_fee(terms.service_fee_qty, terms.num_intervals)?)?
        .with_asset(&AssetClass::native(policy_id, token.clone()), 1)?;
    let datum = PaymentValidatorDatum::Payment(PaymentDatum {
        service_nft_tn: config.service_nft_tn.clone(),
        subscriber_nft_tn: subscriber.tokens.reference.clone(),
        subscription_start: config.subscription_start,
        subscription_end,
        original_subscription_end: subscription_end,
        installments,
    });
    debug!("initiate subscription: payment token {}, ends {}", token.to_hex(), subscription_end);

    let mint = Redeemer::of(&PaymentMintRedeemer::InitSubscription {
        output_reference: seed.out_ref,
    });
    let plan = TxPlan::new()
        .collect_wallet(vec![seed])
        .read_from(vec![service, subscriber.account])
        .mint_assets(policy_id, BTreeMap::from([(token, 1)]), mint)
        .pay_to_contract(ctx.payment_address(), value, datum.to_data())
        .attach_script(ctx.scripts.payment.script.clone());
    let plan = with_validity(ctx, plan, config.current_time)?;
    ctx.submit("initiate subscription", plan).await
}

/// Append installments to the subscriber's payment and lock their fees.
pub async fn extend_subscription(ctx: &ProtocolContext, config: &ExtendSubscriptionConfig) -> Result<TxHash> {
    if config.extension_intervals == 0 {
        return Err(ProtocolError::InvalidConfig("extension_intervals must be positive".into()));
    }
    let subscriber = subscriber_account(ctx).await?;
    let (service, terms) = service_by_token(ctx, &config.service_nft_tn).await?;
    if !terms.is_active {
        return Err(ProtocolError::Precondition("service is not active".into()));
    }
    let (payment, current) =
        find_payment(ctx, &config.service_nft_tn, &subscriber.tokens.reference, &terms.service_fee).await?;

    let extended = extend_schedule(
        &current,
        terms.interval_length,
        config.extension_intervals,
        terms.service_fee_qty,
    )?;
    let value = payment
        .value
        .clone()
        .with_asset(&terms.service_fee, total_fee(terms.service_fee_qty, config.extension_intervals)?)?;

    let extension_intervals = config.extension_intervals;
    let redeemer = PendingRedeemer::typed(escrow_inputs(&service, &subscriber.subscriber, &payment), move |idx| {
        PaymentSpendRedeemer::Extend {
            service_ref_input_index: idx[0],
            subscriber_input_index: idx[1],
            payment_input_index: idx[2],
            extension_intervals,
        }
    });
    let plan = TxPlan::new()
        .collect_from(vec![payment], redeemer)
        .collect_wallet(vec![subscriber.subscriber])
        .read_from(vec![service])
        .pay_to_contract(
            ctx.payment_address(),
            value,
            PaymentValidatorDatum::Payment(extended).to_data(),
        )
        .attach_script(ctx.scripts.payment.script.clone());
    let plan = with_validity(ctx, plan, config.current_time)?;
    ctx.submit("extend subscription", plan).await
}

/// Withdraw every installment elapsed at `current_time`. The payment token
/// is burned when the schedule is exhausted; otherwise the escrow is
/// recreated with the remaining installments.
pub async fn merchant_withdraw(ctx: &ProtocolContext, config: &MerchantWithdrawConfig) -> Result<TxHash> {
    let merchant = merchant_service(ctx).await?;
    let (payment, current) = find_payment(
        ctx,
        &merchant.tokens.reference,
        &config.subscriber_nft_tn,
        &merchant.datum.service_fee,
    )
    .await?;
    let claim = claimable(config.current_time, &current)?;
    if claim.is_empty() {
        return Err(ProtocolError::Precondition("no installment is claimable yet".into()));
    }
    debug!(
        "merchant withdraw: {} installment(s), {} of {}",
        claim.withdrawable_count,
        claim.withdrawable_amount,
        merchant.datum.service_fee.unit()
    );

    let withdrawn = Value::from_asset(&merchant.datum.service_fee, claim.withdrawable_amount);
    let installments_withdrawn = claim.withdrawable_count as u64;
    let redeemer = PendingRedeemer::typed(
        escrow_inputs(&merchant.service, &merchant.merchant, &payment),
        move |idx| PaymentSpendRedeemer::MerchantWithdraw {
            service_ref_input_index: idx[0],
            merchant_input_index: idx[1],
            payment_input_index: idx[2],
            installments_withdrawn,
        },
    );

    let mut plan = TxPlan::new()
        .collect_from(vec![payment.clone()], redeemer)
        .collect_wallet(vec![merchant.merchant])
        .read_from(vec![merchant.service])
        .pay_to_address(ctx.wallet_address(), withdrawn.clone())
        .attach_script(ctx.scripts.payment.script.clone());

    if claim.is_final() {
        plan = burn_payment_token(ctx, plan, payment_token(ctx, &payment)?);
    } else {
        let successor = PaymentDatum {
            installments: claim.remaining_installments,
            ..current
        };
        plan = plan.pay_to_contract(
            ctx.payment_address(),
            payment.value.checked_sub(&withdrawn)?,
            PaymentValidatorDatum::Payment(successor).to_data(),
        );
    }
    let plan = with_validity(ctx, plan, config.current_time)?;
    ctx.submit("merchant withdraw", plan).await
}

/// Cancel early. Installments already earned plus the penalty fee stay at
/// the payment validator under a penalty datum; the rest is refunded and
/// the payment token burned.
pub async fn unsubscribe(ctx: &ProtocolContext, config: &UnsubscribeConfig) -> Result<TxHash> {
    let subscriber = subscriber_account(ctx).await?;
    let (service, terms) = service_by_token(ctx, &config.service_nft_tn).await?;
    if !terms.is_active {
        return Err(ProtocolError::Precondition(
            "service is not active, withdraw the subscription instead".into(),
        ));
    }
    let (payment, current) =
        find_payment(ctx, &config.service_nft_tn, &subscriber.tokens.reference, &terms.service_fee).await?;
    let earned = claimable(config.current_time, &current)?;
    debug!(
        "unsubscribe: {} earned installment(s) worth {} stay with the penalty",
        earned.withdrawable_count, earned.withdrawable_amount
    );

    let penalty_value = Value::lovelace(terms.minimum_ada)
        .with_asset(&terms.penalty_fee, terms.penalty_fee_qty)?
        .with_asset(&terms.service_fee, earned.withdrawable_amount)?;
    let penalty = PaymentValidatorDatum::Penalty(PenaltyDatum {
        service_nft_tn: current.service_nft_tn.clone(),
        subscriber_nft_tn: current.subscriber_nft_tn.clone(),
        penalty_fee: terms.penalty_fee.clone(),
        penalty_fee_qty: terms.penalty_fee_qty,
    });
    let token = payment_token(ctx, &payment)?;

    let redeemer = PendingRedeemer::typed(escrow_inputs(&service, &subscriber.subscriber, &payment), |idx| {
        PaymentSpendRedeemer::Unsubscribe {
            service_ref_input_index: idx[0],
            subscriber_input_index: idx[1],
            payment_input_index: idx[2],
        }
    });
    let plan = TxPlan::new()
        .collect_from(vec![payment], redeemer)
        .collect_wallet(vec![subscriber.subscriber])
        .read_from(vec![service])
        .pay_to_contract(ctx.payment_address(), penalty_value, penalty.to_data())
        .attach_script(ctx.scripts.payment.script.clone());
    let plan = burn_payment_token(ctx, plan, token);
    let plan = with_validity(ctx, plan, config.current_time)?;
    ctx.submit("unsubscribe", plan).await
}

/// Reclaim the whole escrow once the service has been retired.
pub async fn subscriber_withdraw(ctx: &ProtocolContext, config: &SubscriberWithdrawConfig) -> Result<TxHash> {
    let subscriber = subscriber_account(ctx).await?;
    let (service, terms) = service_by_token(ctx, &config.service_nft_tn).await?;
    if terms.is_active {
        return Err(ProtocolError::Precondition("service is still active".into()));
    }
    let (payment, _) =
        find_payment(ctx, &config.service_nft_tn, &subscriber.tokens.reference, &terms.service_fee).await?;
    let token = payment_token(ctx, &payment)?;

    let redeemer = PendingRedeemer::typed(escrow_inputs(&service, &subscriber.subscriber, &payment), |idx| {
        PaymentSpendRedeemer::SubscriberWithdraw {
            service_ref_input_index: idx[0],
            subscriber_input_index: idx[1],
            payment_input_index: idx[2],
        }
    });
    let plan = TxPlan::new()
        .collect_from(vec![payment], redeemer)
        .collect_wallet(vec![subscriber.subscriber])
        .read_from(vec![service])
        .attach_script(ctx.scripts.payment.script.clone());
    let plan = burn_payment_token(ctx, plan, token);
    let plan = with_validity(ctx, plan, config.current_time)?;
    ctx.submit("subscriber withdraw", plan).await
}

/// Collect the penalty UTxO an unsubscribing subscriber left behind.
pub async fn withdraw_penalty(ctx: &ProtocolContext, config: &WithdrawPenaltyConfig) -> Result<TxHash> {
    let merchant = merchant_service(ctx).await?;
    let (penalty, _) = find_penalty(ctx, &merchant.tokens.reference, &config.subscriber_nft_tn).await?;

    let redeemer = PendingRedeemer::typed(
        escrow_inputs(&merchant.service, &merchant.merchant, &penalty),
        |idx| PaymentSpendRedeemer::MerchantPenaltyWithdraw {
            service_ref_input_index: idx[0],
            merchant_input_index: idx[1],
            penalty_input_index: idx[2],
        },
    );
    let plan = TxPlan::new()
        .collect_from(vec![penalty], redeemer)
        .collect_wallet(vec![merchant.merchant])
        .read_from(vec![merchant.service])
        .attach_script(ctx.scripts.payment.script.clone());
    let plan = with_validity(ctx, plan, config.current_time)?;
    ctx.submit("withdraw penalty", plan).await
}
