//! Installment accounting.
//!
//! A payment escrows a schedule of installments, each stamped with the end
//! of the interval it pays for. The merchant claims them strictly from the
//! front: an installment is claimable once its `claimable_at` has passed, so
//! a partly elapsed interval never pays out. Counting uses the timestamps
//! written into the datum, never the service's current terms. Once the
//! subscription end is reached the final installment is claimable even if
//! it was stamped later than the end.

use subpay_types::{Installment, PaymentDatum, PosixTime};

use crate::error::{ProtocolError, Result};

/// Outcome of running the calculator at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub withdrawable_amount: u64,
    pub withdrawable_count: usize,
    /// The schedule to write into the successor datum.
    pub remaining_installments: Vec<Installment>,
}

impl Claim {
    pub fn is_empty(&self) -> bool {
        self.withdrawable_count == 0
    }

    /// Whether this claim exhausts the schedule.
    pub fn is_final(&self) -> bool {
        self.remaining_installments.is_empty()
    }
}

/// Number of installments claimable at `current_time`.
pub fn claimable_count(current_time: PosixTime, payment: &PaymentDatum) -> usize {
    let installments = &payment.installments;
    let count = installments
        .iter()
        .take_while(|i| i.claimable_at <= current_time)
        .count();

    if installments.len() - count == 1 && current_time >= payment.subscription_end {
        return installments.len();
    }
    count
}

/// Run the calculator: how much the merchant may withdraw at `current_time`
/// and what schedule remains.
pub fn claimable(current_time: PosixTime, payment: &PaymentDatum) -> Result<Claim> {
    let count = claimable_count(current_time, payment);
    let withdrawable_amount = payment.installments[..count]
        .iter()
        .try_fold(0u64, |acc, i| acc.checked_add(i.claimable_amount))
        .ok_or_else(|| ProtocolError::Overflow("withdrawable amount".into()))?;
    Ok(Claim {
        withdrawable_amount,
        withdrawable_count: count,
        remaining_installments: payment.installments[count..].to_vec(),
    })
}

fn overflow(what: &str) -> ProtocolError {
    ProtocolError::Overflow(what.to_string())
}

/// Uniform schedule of `num_intervals` installments starting at `start`.
///
/// Installment `i` pays for the interval ending at
/// `start + (i + 1) * interval_length`, so the last one is stamped with the
/// returned subscription end.
pub fn build_schedule(
    start: PosixTime,
    interval_length: u64,
    num_intervals: u64,
    amount: u64,
) -> Result<(Vec<Installment>, PosixTime)> {
    let installments = (1..=num_intervals)
        .map(|i| {
            let claimable_at = i
                .checked_mul(interval_length)
                .and_then(|offset| start.checked_add(offset))
                .ok_or_else(|| overflow("installment time"))?;
            Ok(Installment {
                claimable_at,
                claimable_amount: amount,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let end = num_intervals
        .checked_mul(interval_length)
        .and_then(|span| start.checked_add(span))
        .ok_or_else(|| overflow("subscription end"))?;
    Ok((installments, end))
}

/// Append `extension_intervals` installments after the current end and
/// move the end accordingly.
pub fn extend_schedule(
    payment: &PaymentDatum,
    interval_length: u64,
    extension_intervals: u64,
    amount: u64,
) -> Result<PaymentDatum> {
    let (extra, subscription_end) =
        build_schedule(payment.subscription_end, interval_length, extension_intervals, amount)?;
    let mut extended = payment.clone();
    extended.installments.extend(extra);
    extended.subscription_end = subscription_end;
    Ok(extended)
}
