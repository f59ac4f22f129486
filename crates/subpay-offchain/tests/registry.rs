//! Service and account workflows against the in-memory chain.

mod common;

use std::sync::Arc;

use common::*;
use subpay_offchain::account::{self, CreateAccountConfig, UpdateAccountConfig};
use subpay_offchain::service::{self, ServiceTerms};
use subpay_offchain::{query, Blueprint, ProtocolConfig, ProtocolContext, ProtocolError};
use subpay_tx::memory::MemoryWallet;
use subpay_tx::{ChainProvider, TxAssembler, TxPlan, TxSubmitter, WalletSigner};
use subpay_types::{
    find_paired_token_names, AccountDatum, AssetClass, Network, PlutusSchema, ServiceDatum, Value,
};

#[tokio::test]
async fn test_create_service_round_trips_datum() {
    let h = harness();
    service::create_service(&h.merchant, &terms()).await.unwrap();

    let services = query::services(&h.merchant).await.unwrap();
    assert_eq!(services.len(), 1);
    assert_eq!(services[0].datum, terms().to_datum(true));
    assert!(services[0].datum.is_active);

    let policy_id = h.merchant.scripts.service.policy_id();
    let mut scan = h.chain.utxos_at(&h.merchant.service_address()).await.unwrap();
    scan.extend(h.chain.utxos_at(&h.merchant.wallet_address()).await.unwrap());
    let pair = find_paired_token_names(&scan, &policy_id).unwrap();
    assert_eq!(
        services[0].assets.quantity_of(&AssetClass::native(policy_id, pair.reference)),
        1
    );
    assert_eq!(services[0].assets.coin, MIN_ADA);
}

#[tokio::test]
async fn test_create_service_rejects_bad_terms() {
    let h = harness();
    let bad = ServiceTerms {
        num_intervals: 0,
        ..terms()
    };
    assert!(matches!(
        service::create_service(&h.merchant, &bad).await,
        Err(ProtocolError::InvalidConfig(_))
    ));
    assert!(query::services(&h.merchant).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_wallet_is_a_precondition_failure() {
    let h = harness();
    let broke = context(&h.chain, Arc::new(MemoryWallet::new(Network::Preview, "broke")));
    assert!(matches!(
        service::create_service(&broke, &terms()).await,
        Err(ProtocolError::Precondition(_))
    ));
}

#[tokio::test]
async fn test_update_service_replaces_terms() {
    let h = harness();
    service::create_service(&h.merchant, &terms()).await.unwrap();
    let new_terms = ServiceTerms {
        service_fee_qty: 12_000_000,
        num_intervals: 6,
        ..terms()
    };
    service::update_service(&h.merchant, &new_terms).await.unwrap();

    let services = query::services(&h.merchant).await.unwrap();
    assert_eq!(services.len(), 1);
    assert_eq!(services[0].datum, new_terms.to_datum(true));
}

#[tokio::test]
async fn test_remove_service_only_flips_is_active() {
    let h = harness();
    service::create_service(&h.merchant, &terms()).await.unwrap();
    let before = query::services(&h.merchant).await.unwrap().remove(0);

    service::remove_service(&h.merchant).await.unwrap();
    let after = query::services(&h.merchant).await.unwrap().remove(0);

    assert!(!after.datum.is_active);
    assert_ne!(after.out_ref, before.out_ref);
    assert_eq!(after.assets, before.assets);
    let expected = ServiceDatum {
        is_active: false,
        ..before.datum
    };
    assert_eq!(after.datum.to_cbor(), expected.to_cbor());

    assert!(matches!(
        service::remove_service(&h.merchant).await,
        Err(ProtocolError::Precondition(_))
    ));
    assert!(matches!(
        service::update_service(&h.merchant, &terms()).await,
        Err(ProtocolError::Precondition(_))
    ));
}

#[tokio::test]
async fn test_only_the_token_holder_can_remove_a_service() {
    let h = harness();
    service::create_service(&h.merchant, &terms()).await.unwrap();
    assert!(matches!(
        service::remove_service(&h.subscriber).await,
        Err(ProtocolError::Precondition(_))
    ));
    assert!(query::services(&h.merchant).await.unwrap()[0].datum.is_active);
}

#[tokio::test]
async fn test_account_lifecycle() {
    let h = harness();
    let config = CreateAccountConfig {
        email: "Alice@Example.com ".into(),
        phone: "+15550100".into(),
        account_created: START,
    };
    account::create_account(&h.subscriber, &config).await.unwrap();

    let accounts = query::accounts(&h.subscriber).await.unwrap();
    assert_eq!(accounts.len(), 1);
    assert_eq!(
        accounts[0].datum,
        AccountDatum::new("alice@example.com", "+15550100", START)
    );

    account::update_account(
        &h.subscriber,
        &UpdateAccountConfig {
            email: "alice@example.org".into(),
            phone: String::new(),
        },
    )
    .await
    .unwrap();
    let updated = query::accounts(&h.subscriber).await.unwrap().remove(0);
    assert_eq!(updated.datum, AccountDatum::new("alice@example.org", "", START));

    let policy_id = h.subscriber.scripts.account.policy_id();
    account::remove_account(&h.subscriber).await.unwrap();
    assert!(query::accounts(&h.subscriber).await.unwrap().is_empty());
    let wallet = h.chain.balance(&h.subscriber.wallet_address()).unwrap();
    assert!(!wallet.has_policy(&policy_id));
}

#[tokio::test]
async fn test_account_needs_contact_details() {
    let h = harness();
    let config = CreateAccountConfig {
        email: " ".into(),
        phone: String::new(),
        account_created: START,
    };
    assert!(matches!(
        account::create_account(&h.subscriber, &config).await,
        Err(ProtocolError::InvalidConfig(_))
    ));
}

#[tokio::test]
async fn test_missing_validator_is_fatal() {
    let h = harness();
    let blueprint = Blueprint::from_json(
        r#"{"validators":[{"title":"service_multi_validator.mint","compiledCode":"00"}]}"#,
    )
    .unwrap();
    let result = ProtocolContext::new(
        &ProtocolConfig::default(),
        &blueprint,
        h.chain.clone(),
        h.merchant_wallet.clone(),
        h.chain.clone(),
        h.chain.clone(),
    );
    assert!(matches!(
        result,
        Err(ProtocolError::ValidatorNotFound(ref title)) if title == "account_multi_validator.mint"
    ));
}

#[tokio::test]
async fn test_resubmission_is_rejected_verbatim() {
    let h = harness();
    let plan = TxPlan::new().pay_to_address(h.merchant.wallet_address(), Value::lovelace(1_000_000));
    let tx = h.chain.assemble(plan, &h.subscriber.wallet_address()).await.unwrap();
    let signed = h.subscriber_wallet.sign(tx).await.unwrap();

    h.subscriber.submitter.submit(signed.clone()).await.unwrap();
    let err: ProtocolError = h.subscriber.submitter.submit(signed).await.unwrap_err().into();
    assert!(matches!(err, ProtocolError::ChainRejected(ref m) if m.contains("already spent")));
}
