//! The explicit chain-connection context threaded through every workflow.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, info};
use subpay_tx::{ChainProvider, TxAssembler, TxPlan, TxSubmitter, UnsignedTx, WalletSigner};
use subpay_types::{Address, AssetName, KeyHash, Network, PosixTime, TokenPair, TxHash, Utxo};

use crate::blueprint::{Blueprint, Validator};
use crate::config::{ProtocolConfig, ValidatorTitles};
use crate::error::{ProtocolError, Result};

/// The three multi-purpose validators of the protocol.
#[derive(Debug, Clone)]
pub struct ProtocolScripts {
    pub service: Validator,
    pub account: Validator,
    pub payment: Validator,
}

impl ProtocolScripts {
    pub fn load(blueprint: &Blueprint, titles: &ValidatorTitles) -> Result<Self> {
        Ok(Self {
            service: blueprint.validator(&titles.service)?.clone(),
            account: blueprint.validator(&titles.account)?.clone(),
            payment: blueprint.validator(&titles.payment)?.clone(),
        })
    }
}

/// Collaborators, scripts and settings for one acting party.
///
/// Cloning is cheap; [`ProtocolContext::with_wallet`] gives the same chain
/// view to a different party.
#[derive(Clone)]
pub struct ProtocolContext {
    pub provider: Arc<dyn ChainProvider>,
    pub wallet: Arc<dyn WalletSigner>,
    pub assembler: Arc<dyn TxAssembler>,
    pub submitter: Arc<dyn TxSubmitter>,
    pub scripts: ProtocolScripts,
    pub network: Network,
    pub tx_ttl_ms: u64,
}

impl ProtocolContext {
    pub fn new(
        config: &ProtocolConfig,
        blueprint: &Blueprint,
        provider: Arc<dyn ChainProvider>,
        wallet: Arc<dyn WalletSigner>,
        assembler: Arc<dyn TxAssembler>,
        submitter: Arc<dyn TxSubmitter>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            provider,
            wallet,
            assembler,
            submitter,
            scripts: ProtocolScripts::load(blueprint, &config.validators)?,
            network: config.network,
            tx_ttl_ms: config.tx_ttl_ms,
        })
    }

    pub fn with_wallet(&self, wallet: Arc<dyn WalletSigner>) -> Self {
        Self {
            wallet,
            ..self.clone()
        }
    }

    pub fn service_address(&self) -> Address {
        self.scripts.service.address(self.network)
    }

    pub fn account_address(&self) -> Address {
        self.scripts.account.address(self.network)
    }

    pub fn payment_address(&self) -> Address {
        self.scripts.payment.address(self.network)
    }

    pub fn wallet_address(&self) -> Address {
        self.wallet.address()
    }

    pub fn wallet_key_hash(&self) -> Result<KeyHash> {
        self.wallet
            .address()
            .key_hash()
            .ok_or_else(|| ProtocolError::Precondition("wallet address is not key-controlled".into()))
    }

    /// UTxOs at the wallet address; an empty wallet is a precondition
    /// failure.
    pub async fn wallet_utxos(&self) -> Result<Vec<Utxo>> {
        let address = self.wallet.address();
        let utxos = self.provider.utxos_at(&address).await?;
        if utxos.is_empty() {
            return Err(ProtocolError::Precondition(format!("no UTxO found at address {}", address)));
        }
        Ok(utxos)
    }

    /// `[current_time, current_time + ttl]`.
    pub fn validity(&self, current_time: PosixTime) -> Result<(PosixTime, PosixTime)> {
        let to = current_time
            .checked_add(self.tx_ttl_ms)
            .ok_or_else(|| ProtocolError::Overflow("validity upper bound".into()))?;
        Ok((current_time, to))
    }

    /// Balance `plan` against the context wallet without signing it.
    pub async fn assemble(&self, action: &str, plan: TxPlan) -> Result<UnsignedTx> {
        let change = self.wallet.address();
        let unsigned = self.assembler.assemble(plan, &change).await?;
        debug!("{}: assembled {} with inputs {:?}", action, unsigned.hash, unsigned.body.inputs);
        Ok(unsigned)
    }

    /// Assemble, sign with the context wallet and submit.
    pub async fn submit(&self, action: &str, plan: TxPlan) -> Result<TxHash> {
        let unsigned = self.assemble(action, plan).await?;
        let signed = self.wallet.sign(unsigned).await?;
        let tx_hash = self.submitter.submit(signed).await?;
        info!("{} submitted: {}", action, tx_hash);
        Ok(tx_hash)
    }
}

/// The canonically first UTxO, used as the uniqueness seed of a mint.
pub(crate) fn seed_utxo(utxos: &[Utxo]) -> Result<Utxo> {
    utxos
        .iter()
        .min_by_key(|u| u.out_ref)
        .cloned()
        .ok_or_else(|| ProtocolError::Precondition("no UTxO available to seed the mint".into()))
}

/// Mint (`qty > 0`) or burn (`qty < 0`) both tokens of a pair.
pub(crate) fn pair_quantities(tokens: &TokenPair, qty: i64) -> BTreeMap<AssetName, i64> {
    BTreeMap::from([(tokens.reference.clone(), qty), (tokens.user.clone(), qty)])
}
