#![allow(dead_code)]

use std::sync::Arc;

use subpay_offchain::service::ServiceTerms;
use subpay_offchain::{Blueprint, ProtocolConfig, ProtocolContext};
use subpay_tx::memory::{MemoryChain, MemoryWallet};
use subpay_tx::WalletSigner;
use subpay_types::{AssetClass, Network, Value};

pub const TX_FEE: u64 = 200_000;
pub const START: u64 = 1_700_000_000_000;
pub const MONTH: u64 = 2_592_000_000;
pub const FEE: u64 = 10_000_000;
pub const PENALTY: u64 = 1_000_000;
pub const MIN_ADA: u64 = 2_000_000;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn blueprint_json() -> &'static str {
    r#"{
        "preamble": { "title": "subpay/test", "plutusVersion": "v3" },
        "validators": [
            { "title": "service_multi_validator.mint", "compiledCode": "4d01000033222220051200120011" },
            { "title": "account_multi_validator.mint", "compiledCode": "4d01000033222220051200120012" },
            { "title": "payment_multi_validator.mint", "compiledCode": "4d01000033222220051200120013" },
            { "title": "multisig_validator.mint", "compiledCode": "4d01000033222220051200120014" }
        ]
    }"#
}

pub fn terms() -> ServiceTerms {
    ServiceTerms {
        service_fee: AssetClass::Lovelace,
        service_fee_qty: FEE,
        penalty_fee: AssetClass::Lovelace,
        penalty_fee_qty: PENALTY,
        interval_length: MONTH,
        num_intervals: 12,
        minimum_ada: MIN_ADA,
    }
}

pub struct Harness {
    pub chain: Arc<MemoryChain>,
    pub merchant_wallet: Arc<MemoryWallet>,
    pub subscriber_wallet: Arc<MemoryWallet>,
    pub merchant: ProtocolContext,
    pub subscriber: ProtocolContext,
}

pub fn context(chain: &Arc<MemoryChain>, wallet: Arc<MemoryWallet>) -> ProtocolContext {
    let blueprint = Blueprint::from_json(blueprint_json()).expect("test blueprint parses");
    ProtocolContext::new(
        &ProtocolConfig::default(),
        &blueprint,
        chain.clone(),
        wallet,
        chain.clone(),
        chain.clone(),
    )
    .expect("test context builds")
}

/// A chain with a funded merchant and subscriber, clock at `START`.
pub fn harness() -> Harness {
    init_logger();
    let chain = Arc::new(MemoryChain::new().with_fee(TX_FEE));
    chain.set_time(START);
    let merchant_wallet = Arc::new(MemoryWallet::new(Network::Preview, "merchant"));
    let subscriber_wallet = Arc::new(MemoryWallet::new(Network::Preview, "subscriber"));
    chain.fund(&merchant_wallet.address(), Value::lovelace(100_000_000));
    chain.fund(&subscriber_wallet.address(), Value::lovelace(500_000_000));
    chain.fund(&subscriber_wallet.address(), Value::lovelace(50_000_000));

    Harness {
        merchant: context(&chain, merchant_wallet.clone()),
        subscriber: context(&chain, subscriber_wallet.clone()),
        chain,
        merchant_wallet,
        subscriber_wallet,
    }
}
