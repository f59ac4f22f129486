//! Two-phase redeemers whose payload depends on final input positions.
//!
//! Validators locate "the merchant's input" or "the payment input" by its
//! integer position in the transaction, and that position is only known once
//! every input of the transaction has been merged and sorted. A workflow
//! therefore declares a [`PendingRedeemer`]: the inputs it needs positions
//! for plus a pure function from those positions to redeemer data. The
//! assembler later builds an [`InputOrdering`] and calls
//! [`PendingRedeemer::resolve`], which yields a [`ResolvedRedeemer`].

use std::fmt;
use std::sync::Arc;

use subpay_types::{OutRef, PlutusData, PlutusSchema};

use crate::TxError;

/// Which input list a position refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputRole {
    /// Position among the spent inputs.
    Spend,
    /// Position among the reference inputs.
    Reference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexedInput {
    pub out_ref: OutRef,
    pub role: InputRole,
}

impl IndexedInput {
    pub fn spend(out_ref: OutRef) -> Self {
        Self { out_ref, role: InputRole::Spend }
    }

    pub fn reference(out_ref: OutRef) -> Self {
        Self { out_ref, role: InputRole::Reference }
    }
}

type Assemble = dyn Fn(&[u64]) -> PlutusData + Send + Sync;

/// Phase one: intent to build a redeemer from input positions.
#[derive(Clone)]
pub struct PendingRedeemer {
    inputs: Vec<IndexedInput>,
    assemble: Arc<Assemble>,
}

impl PendingRedeemer {
    /// `assemble` receives the resolved positions in the same order as
    /// `inputs`.
    pub fn new<F>(inputs: Vec<IndexedInput>, assemble: F) -> Self
    where
        F: Fn(&[u64]) -> PlutusData + Send + Sync + 'static,
    {
        Self {
            inputs,
            assemble: Arc::new(assemble),
        }
    }

    /// Like [`PendingRedeemer::new`] for a typed redeemer.
    pub fn typed<R, F>(inputs: Vec<IndexedInput>, assemble: F) -> Self
    where
        R: PlutusSchema,
        F: Fn(&[u64]) -> R + Send + Sync + 'static,
    {
        Self::new(inputs, move |indices| assemble(indices).to_data())
    }

    pub fn inputs(&self) -> &[IndexedInput] {
        &self.inputs
    }

    /// Phase two: look every declared input up in the final ordering.
    pub fn resolve(&self, ordering: &InputOrdering) -> Result<ResolvedRedeemer, TxError> {
        let indices = self
            .inputs
            .iter()
            .map(|input| {
                ordering
                    .index_of(&input.out_ref, input.role)
                    .ok_or(TxError::UnresolvedInput(input.out_ref))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let data = (self.assemble)(&indices);
        Ok(ResolvedRedeemer { indices, data })
    }
}

impl fmt::Debug for PendingRedeemer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingRedeemer")
            .field("inputs", &self.inputs)
            .finish_non_exhaustive()
    }
}

/// A redeemer whose positions have been fixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRedeemer {
    pub indices: Vec<u64>,
    pub data: PlutusData,
}

/// The final, canonically sorted input lists of a transaction.
///
/// Inputs are ordered by transaction id bytes, then output index, which is
/// the ordering the ledger presents to validators.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputOrdering {
    spend: Vec<OutRef>,
    reference: Vec<OutRef>,
}

impl InputOrdering {
    pub fn new(
        spend: impl IntoIterator<Item = OutRef>,
        reference: impl IntoIterator<Item = OutRef>,
    ) -> Self {
        let mut spend: Vec<_> = spend.into_iter().collect();
        let mut reference: Vec<_> = reference.into_iter().collect();
        spend.sort();
        spend.dedup();
        reference.sort();
        reference.dedup();
        Self { spend, reference }
    }

    pub fn spend_inputs(&self) -> &[OutRef] {
        &self.spend
    }

    pub fn reference_inputs(&self) -> &[OutRef] {
        &self.reference
    }

    pub fn index_of(&self, out_ref: &OutRef, role: InputRole) -> Option<u64> {
        let list = match role {
            InputRole::Spend => &self.spend,
            InputRole::Reference => &self.reference,
        };
        list.binary_search(out_ref).ok().map(|i| i as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use subpay_types::TxHash;

    fn out_ref(first: u8, index: u32) -> OutRef {
        let mut h = [0u8; 32];
        h[0] = first;
        OutRef::new(TxHash::new(h), index)
    }

    #[test]
    fn test_ordering_is_canonical() {
        let a = out_ref(0x01, 5);
        let b = out_ref(0x01, 2);
        let c = out_ref(0x00, 9);
        let ordering = InputOrdering::new([a, b, c], []);
        assert_eq!(ordering.spend_inputs(), &[c, b, a]);
        assert_eq!(ordering.index_of(&a, InputRole::Spend), Some(2));
        assert_eq!(ordering.index_of(&a, InputRole::Reference), None);
    }

    #[test]
    fn test_resolve_passes_positions_in_declared_order() {
        let merchant = out_ref(0xff, 0);
        let payment = out_ref(0x10, 1);
        let service = out_ref(0x20, 0);
        let pending = PendingRedeemer::new(
            vec![
                IndexedInput::reference(service),
                IndexedInput::spend(merchant),
                IndexedInput::spend(payment),
            ],
            |idx| PlutusData::constr(1, idx.iter().map(|i| PlutusData::int(*i)).collect()),
        );
        let ordering = InputOrdering::new([merchant, payment], [service]);
        let resolved = pending.resolve(&ordering).unwrap();
        assert_eq!(resolved.indices, vec![0, 1, 0]);
        assert_eq!(
            resolved.data,
            PlutusData::constr(1, vec![PlutusData::int(0), PlutusData::int(1), PlutusData::int(0)])
        );
    }

    #[test]
    fn test_resolution_tracks_the_final_ordering() {
        let user = out_ref(0x50, 0);
        let account = out_ref(0x40, 0);
        let pending = PendingRedeemer::new(
            vec![IndexedInput::spend(user), IndexedInput::spend(account)],
            |idx| PlutusData::list(idx.iter().map(|i| PlutusData::int(*i)).collect()),
        );
        let first = pending.resolve(&InputOrdering::new([user, account], [])).unwrap();
        assert_eq!(first.indices, vec![1, 0]);

        // An extra input sorting first shifts both positions.
        let fee_input = out_ref(0x00, 0);
        let second = pending
            .resolve(&InputOrdering::new([user, account, fee_input], []))
            .unwrap();
        assert_eq!(second.indices, vec![2, 1]);
    }

    #[test]
    fn test_missing_input_is_an_error() {
        let absent = out_ref(0x33, 3);
        let pending = PendingRedeemer::new(vec![IndexedInput::spend(absent)], |_| PlutusData::int(0));
        assert!(matches!(
            pending.resolve(&InputOrdering::new([out_ref(0x01, 0)], [])),
            Err(TxError::UnresolvedInput(r)) if r == absent
        ));
    }
}
