//! Redeemers understood by the protocol's validators.
//!
//! Input positions are carried as plain integers: the validators look the
//! relevant inputs up by index rather than by output reference. Values for
//! those indices are only known once the enclosing transaction's inputs are
//! ordered, which is why workflows build these through pending redeemers.

use crate::asset::AssetName;
use crate::datum::{asset_name_data, decode_asset_name};
use crate::error::DecodeError;
use crate::plutus::{PlutusData, PlutusSchema};
use crate::utxo::OutRef;

fn int(n: u64) -> PlutusData {
    PlutusData::int(n)
}

// ─── Service ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceMintRedeemer {
    CreateService { output_reference: OutRef, input_index: u64 },
    DeleteService,
}

impl PlutusSchema for ServiceMintRedeemer {
    fn to_data(&self) -> PlutusData {
        match self {
            Self::CreateService { output_reference, input_index } => PlutusData::constr(
                0,
                vec![output_reference.to_data(), int(*input_index)],
            ),
            Self::DeleteService => PlutusData::constr(1, vec![]),
        }
    }

    fn from_data(data: &PlutusData) -> Result<Self, DecodeError> {
        let what = "ServiceMintRedeemer";
        match data.as_constr(what)?.0 {
            0 => {
                let f = data.expect_constr(0, 2, what)?;
                Ok(Self::CreateService {
                    output_reference: OutRef::from_data(&f[0])?,
                    input_index: f[1].as_u64("CreateService.input_index")?,
                })
            }
            1 => {
                data.expect_constr(1, 0, what)?;
                Ok(Self::DeleteService)
            }
            got => Err(DecodeError::UnexpectedConstructor { what, got }),
        }
    }
}

/// Shared payload of the service spend redeemers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpend {
    pub service_ref_token_name: AssetName,
    pub merchant_input_index: u64,
    pub service_input_index: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceSpendRedeemer {
    UpdateService(ServiceSpend),
    RemoveService(ServiceSpend),
}

impl PlutusSchema for ServiceSpendRedeemer {
    fn to_data(&self) -> PlutusData {
        let (tag, s) = match self {
            Self::UpdateService(s) => (0, s),
            Self::RemoveService(s) => (1, s),
        };
        PlutusData::constr(
            tag,
            vec![
                asset_name_data(&s.service_ref_token_name),
                int(s.merchant_input_index),
                int(s.service_input_index),
            ],
        )
    }

    fn from_data(data: &PlutusData) -> Result<Self, DecodeError> {
        let what = "ServiceSpendRedeemer";
        let tag = data.as_constr(what)?.0;
        if tag > 1 {
            return Err(DecodeError::UnexpectedConstructor { what, got: tag });
        }
        let f = data.expect_constr(tag, 3, what)?;
        let s = ServiceSpend {
            service_ref_token_name: decode_asset_name(&f[0], "ServiceSpend.service_ref_token_name")?,
            merchant_input_index: f[1].as_u64("ServiceSpend.merchant_input_index")?,
            service_input_index: f[2].as_u64("ServiceSpend.service_input_index")?,
        };
        Ok(if tag == 0 {
            Self::UpdateService(s)
        } else {
            Self::RemoveService(s)
        })
    }
}

// ─── Account ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountMintRedeemer {
    CreateAccount { output_reference: OutRef, input_index: u64 },
    DeleteAccount { reference_token_name: AssetName },
}

impl PlutusSchema for AccountMintRedeemer {
    fn to_data(&self) -> PlutusData {
        match self {
            Self::CreateAccount { output_reference, input_index } => PlutusData::constr(
                0,
                vec![output_reference.to_data(), int(*input_index)],
            ),
            Self::DeleteAccount { reference_token_name } => {
                PlutusData::constr(1, vec![asset_name_data(reference_token_name)])
            }
        }
    }

    fn from_data(data: &PlutusData) -> Result<Self, DecodeError> {
        let what = "AccountMintRedeemer";
        match data.as_constr(what)?.0 {
            0 => {
                let f = data.expect_constr(0, 2, what)?;
                Ok(Self::CreateAccount {
                    output_reference: OutRef::from_data(&f[0])?,
                    input_index: f[1].as_u64("CreateAccount.input_index")?,
                })
            }
            1 => {
                let f = data.expect_constr(1, 1, what)?;
                Ok(Self::DeleteAccount {
                    reference_token_name: decode_asset_name(&f[0], "DeleteAccount.reference_token_name")?,
                })
            }
            got => Err(DecodeError::UnexpectedConstructor { what, got }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSpend {
    pub reference_token_name: AssetName,
    pub user_input_index: u64,
    pub account_input_index: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountSpendRedeemer {
    UpdateAccount(AccountSpend),
    RemoveAccount(AccountSpend),
}

impl PlutusSchema for AccountSpendRedeemer {
    fn to_data(&self) -> PlutusData {
        let (tag, s) = match self {
            Self::UpdateAccount(s) => (0, s),
            Self::RemoveAccount(s) => (1, s),
        };
        PlutusData::constr(
            tag,
            vec![
                asset_name_data(&s.reference_token_name),
                int(s.user_input_index),
                int(s.account_input_index),
            ],
        )
    }

    fn from_data(data: &PlutusData) -> Result<Self, DecodeError> {
        let what = "AccountSpendRedeemer";
        let tag = data.as_constr(what)?.0;
        if tag > 1 {
            return Err(DecodeError::UnexpectedConstructor { what, got: tag });
        }
        let f = data.expect_constr(tag, 3, what)?;
        let s = AccountSpend {
            reference_token_name: decode_asset_name(&f[0], "AccountSpend.reference_token_name")?,
            user_input_index: f[1].as_u64("AccountSpend.user_input_index")?,
            account_input_index: f[2].as_u64("AccountSpend.account_input_index")?,
        };
        Ok(if tag == 0 {
            Self::UpdateAccount(s)
        } else {
            Self::RemoveAccount(s)
        })
    }
}

// ─── Payment ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentMintRedeemer {
    InitSubscription { output_reference: OutRef },
    TerminateSubscription,
}

impl PlutusSchema for PaymentMintRedeemer {
    fn to_data(&self) -> PlutusData {
        match self {
            Self::InitSubscription { output_reference } => {
                PlutusData::constr(0, vec![output_reference.to_data()])
            }
            Self::TerminateSubscription => PlutusData::constr(1, vec![]),
        }
    }

    fn from_data(data: &PlutusData) -> Result<Self, DecodeError> {
        let what = "PaymentMintRedeemer";
        match data.as_constr(what)?.0 {
            0 => {
                let f = data.expect_constr(0, 1, what)?;
                Ok(Self::InitSubscription {
                    output_reference: OutRef::from_data(&f[0])?,
                })
            }
            1 => {
                data.expect_constr(1, 0, what)?;
                Ok(Self::TerminateSubscription)
            }
            got => Err(DecodeError::UnexpectedConstructor { what, got }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentSpendRedeemer {
    Extend {
        service_ref_input_index: u64,
        subscriber_input_index: u64,
        payment_input_index: u64,
        extension_intervals: u64,
    },
    MerchantWithdraw {
        service_ref_input_index: u64,
        merchant_input_index: u64,
        payment_input_index: u64,
        installments_withdrawn: u64,
    },
    Unsubscribe {
        service_ref_input_index: u64,
        subscriber_input_index: u64,
        payment_input_index: u64,
    },
    SubscriberWithdraw {
        service_ref_input_index: u64,
        subscriber_input_index: u64,
        payment_input_index: u64,
    },
    MerchantPenaltyWithdraw {
        service_ref_input_index: u64,
        merchant_input_index: u64,
        penalty_input_index: u64,
    },
}

impl PlutusSchema for PaymentSpendRedeemer {
    fn to_data(&self) -> PlutusData {
        let (tag, fields) = match *self {
            Self::Extend {
                service_ref_input_index,
                subscriber_input_index,
                payment_input_index,
                extension_intervals,
            } => (
                0,
                vec![
                    service_ref_input_index,
                    subscriber_input_index,
                    payment_input_index,
                    extension_intervals,
                ],
            ),
            Self::MerchantWithdraw {
                service_ref_input_index,
                merchant_input_index,
                payment_input_index,
                installments_withdrawn,
            } => (
                1,
                vec![
                    service_ref_input_index,
                    merchant_input_index,
                    payment_input_index,
                    installments_withdrawn,
                ],
            ),
            Self::Unsubscribe {
                service_ref_input_index,
                subscriber_input_index,
                payment_input_index,
            } => (
                2,
                vec![service_ref_input_index, subscriber_input_index, payment_input_index],
            ),
            Self::SubscriberWithdraw {
                service_ref_input_index,
                subscriber_input_index,
                payment_input_index,
            } => (
                3,
                vec![service_ref_input_index, subscriber_input_index, payment_input_index],
            ),
            Self::MerchantPenaltyWithdraw {
                service_ref_input_index,
                merchant_input_index,
                penalty_input_index,
            } => (
                4,
                vec![service_ref_input_index, merchant_input_index, penalty_input_index],
            ),
        };
        PlutusData::constr(tag, fields.into_iter().map(int).collect())
    }

    fn from_data(data: &PlutusData) -> Result<Self, DecodeError> {
        let what = "PaymentSpendRedeemer";
        let tag = data.as_constr(what)?.0;
        let arity = match tag {
            0 | 1 => 4,
            2..=4 => 3,
            got => return Err(DecodeError::UnexpectedConstructor { what, got }),
        };
        let f = data
            .expect_constr(tag, arity, what)?
            .iter()
            .map(|d| d.as_u64(what))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(match tag {
            0 => Self::Extend {
                service_ref_input_index: f[0],
                subscriber_input_index: f[1],
                payment_input_index: f[2],
                extension_intervals: f[3],
            },
            1 => Self::MerchantWithdraw {
                service_ref_input_index: f[0],
                merchant_input_index: f[1],
                payment_input_index: f[2],
                installments_withdrawn: f[3],
            },
            2 => Self::Unsubscribe {
                service_ref_input_index: f[0],
                subscriber_input_index: f[1],
                payment_input_index: f[2],
            },
            3 => Self::SubscriberWithdraw {
                service_ref_input_index: f[0],
                subscriber_input_index: f[1],
                payment_input_index: f[2],
            },
            _ => Self::MerchantPenaltyWithdraw {
                service_ref_input_index: f[0],
                merchant_input_index: f[1],
                penalty_input_index: f[2],
            },
        })
    }
}
