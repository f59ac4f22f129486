//! Account workflows: a subscriber's identity record.
//!
//! Same reference/user token shape as a service: the reference token sits
//! at the account validator with an [`AccountDatum`], the user token stays
//! in the subscriber's wallet.

use log::debug;
use subpay_tx::{IndexedInput, PendingRedeemer, Redeemer, TxPlan};
use subpay_types::{
    find_paired_token_names, AccountDatum, AccountMintRedeemer, AccountSpend, AccountSpendRedeemer, AssetClass,
    PlutusSchema, PosixTime, TokenPair, TxHash, Utxo, Value,
};

use crate::classify::{decode_datum, find_by_asset_unit};
use crate::context::{pair_quantities, seed_utxo, ProtocolContext};
use crate::error::{ProtocolError, Result};
use crate::{query, REFERENCE_OUTPUT_LOVELACE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateAccountConfig {
    pub email: String,
    pub phone: String,
    pub account_created: PosixTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateAccountConfig {
    pub email: String,
    pub phone: String,
}

/// A subscriber's account as seen from the subscriber's wallet.
#[derive(Debug, Clone)]
pub(crate) struct SubscriberAccount {
    pub tokens: TokenPair,
    pub account: Utxo,
    pub datum: AccountDatum,
    /// Wallet UTxO holding the account user token.
    pub subscriber: Utxo,
}

pub(crate) async fn subscriber_account(ctx: &ProtocolContext) -> Result<SubscriberAccount> {
    let script_utxos = ctx.provider.utxos_at(&ctx.account_address()).await?;
    let wallet_utxos = ctx.wallet_utxos().await?;
    let policy_id = ctx.scripts.account.policy_id();

    let mut scan = script_utxos.clone();
    scan.extend(wallet_utxos.iter().cloned());
    let tokens = find_paired_token_names(&scan, &policy_id)?;

    let account = find_by_asset_unit(&script_utxos, &AssetClass::native(policy_id, tokens.reference.clone()))?.clone();
    let subscriber = find_by_asset_unit(&wallet_utxos, &AssetClass::native(policy_id, tokens.user.clone()))?.clone();
    let datum = decode_datum::<AccountDatum>(account.datum.as_deref())?;
    debug!("subscriber account {} at {}", tokens.reference.to_hex(), account.out_ref);
    Ok(SubscriberAccount {
        tokens,
        account,
        datum,
        subscriber,
    })
}

fn check_contact(email: &str, phone: &str) -> Result<()> {
    if email.trim().is_empty() && phone.trim().is_empty() {
        return Err(ProtocolError::InvalidConfig("an email or a phone number is required".into()));
    }
    Ok(())
}

pub async fn create_account(ctx: &ProtocolContext, config: &CreateAccountConfig) -> Result<TxHash> {
    check_contact(&config.email, &config.phone)?;
    let wallet_utxos = ctx.wallet_utxos().await?;
    let seed = seed_utxo(&wallet_utxos)?;
    let tokens = TokenPair::derive(&seed.out_ref)?;
    let policy_id = ctx.scripts.account.policy_id();

    let seed_ref = seed.out_ref;
    let redeemer = PendingRedeemer::typed(vec![IndexedInput::spend(seed_ref)], move |idx| {
        AccountMintRedeemer::CreateAccount {
            output_reference: seed_ref,
            input_index: idx[0],
        }
    });
    let datum = AccountDatum::new(&config.email, &config.phone, config.account_created);
    let reference_value = Value::lovelace(REFERENCE_OUTPUT_LOVELACE)
        .with_asset(&AssetClass::native(policy_id, tokens.reference.clone()), 1)?;
    let user_value = Value::from_asset(&AssetClass::native(policy_id, tokens.user.clone()), 1);

    let plan = TxPlan::new()
        .collect_wallet(vec![seed])
        .mint_assets(policy_id, pair_quantities(&tokens, 1), redeemer)
        .pay_to_contract(ctx.account_address(), reference_value, datum.to_data())
        .pay_to_address(ctx.wallet_address(), user_value)
        .attach_script(ctx.scripts.account.script.clone());
    ctx.submit("create account", plan).await
}

fn account_spend(found: &SubscriberAccount, wrap: fn(AccountSpend) -> AccountSpendRedeemer) -> PendingRedeemer {
    let reference_name = found.tokens.reference.clone();
    PendingRedeemer::typed(
        vec![
            IndexedInput::spend(found.subscriber.out_ref),
            IndexedInput::spend(found.account.out_ref),
        ],
        move |idx| {
            wrap(AccountSpend {
                reference_token_name: reference_name.clone(),
                user_input_index: idx[0],
                account_input_index: idx[1],
            })
        },
    )
}

/// Replace the contact details; the creation time is kept.
pub async fn update_account(ctx: &ProtocolContext, config: &UpdateAccountConfig) -> Result<TxHash> {
    check_contact(&config.email, &config.phone)?;
    let found = subscriber_account(ctx).await?;
    let datum = AccountDatum::new(&config.email, &config.phone, found.datum.account_created);
    let redeemer = account_spend(&found, AccountSpendRedeemer::UpdateAccount);

    let plan = TxPlan::new()
        .collect_from(vec![found.account.clone()], redeemer)
        .collect_wallet(vec![found.subscriber])
        .pay_to_contract(ctx.account_address(), found.account.value, datum.to_data())
        .attach_script(ctx.scripts.account.script.clone());
    ctx.submit("update account", plan).await
}

/// Burn both account tokens. Refused while a payment for this subscriber is
/// still active.
pub async fn remove_account(ctx: &ProtocolContext) -> Result<TxHash> {
    let found = subscriber_account(ctx).await?;
    let active = query::payments(ctx)
        .await?
        .into_iter()
        .filter(|p| p.datum.subscriber_nft_tn == found.tokens.reference)
        .count();
    if active > 0 {
        return Err(ProtocolError::Precondition(format!(
            "account has {} active payment(s)",
            active
        )));
    }

    let policy_id = ctx.scripts.account.policy_id();
    let burn = Redeemer::of(&AccountMintRedeemer::DeleteAccount {
        reference_token_name: found.tokens.reference.clone(),
    });
    let spend = account_spend(&found, AccountSpendRedeemer::RemoveAccount);
    let quantities = pair_quantities(&found.tokens, -1);

    let plan = TxPlan::new()
        .collect_from(vec![found.account], spend)
        .collect_wallet(vec![found.subscriber])
        .mint_assets(policy_id, quantities, burn)
        .attach_script(ctx.scripts.account.script.clone());
    ctx.submit("remove account", plan).await
}
