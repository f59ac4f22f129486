//! CIP-68 style token naming.
//!
//! A reference/user token pair is minted from a consumed UTxO: both names
//! share the same body (output index byte followed by the sha3-256 of the
//! transaction id) and differ only in their 4-byte CIP-67 label. The
//! consumed input makes the pair unique; the shared body lets the two be
//! matched back together later.

use crate::asset::{AssetName, MAX_ASSET_NAME_LEN};
use crate::error::{LookupError, TokenNameError};
use crate::hash::{sha3_256, PolicyId};
use crate::utxo::{OutRef, Utxo};

/// CIP-67 label 100: reference token carrying the authoritative datum.
pub const REFERENCE_LABEL: [u8; 4] = [0x00, 0x06, 0x43, 0xb0];
/// CIP-67 label 222: user token held by a party.
pub const USER_LABEL: [u8; 4] = [0x00, 0x0d, 0xe1, 0x40];

/// Derive a deterministic token name from a consumed UTxO.
///
/// The name is `prefix || index || sha3_256(tx_hash)`, truncated to 32
/// bytes.
pub fn derive_token_name(out_ref: &OutRef, prefix: &[u8]) -> Result<AssetName, TokenNameError> {
    if prefix.len() >= MAX_ASSET_NAME_LEN {
        return Err(TokenNameError::PrefixTooLong(prefix.len()));
    }
    let index = u8::try_from(out_ref.index).map_err(|_| TokenNameError::IndexTooLarge(out_ref.index))?;
    let digest = sha3_256(out_ref.tx_hash.as_bytes());

    let mut name = Vec::with_capacity(MAX_ASSET_NAME_LEN);
    name.extend_from_slice(prefix);
    name.push(index);
    name.extend_from_slice(&digest);
    name.truncate(MAX_ASSET_NAME_LEN);
    Ok(AssetName::new(name).expect("truncated to the maximum asset name length"))
}

/// Reference and user token names derived from the same UTxO.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub reference: AssetName,
    pub user: AssetName,
}

impl TokenPair {
    pub fn derive(out_ref: &OutRef) -> Result<Self, TokenNameError> {
        Ok(Self {
            reference: derive_token_name(out_ref, &REFERENCE_LABEL)?,
            user: derive_token_name(out_ref, &USER_LABEL)?,
        })
    }

    /// Rebuild the pair from its reference token name.
    pub fn from_reference(reference: &AssetName) -> Option<Self> {
        let body = body(reference, &REFERENCE_LABEL)?;
        Some(Self {
            reference: reference.clone(),
            user: relabel(&USER_LABEL, &body),
        })
    }

    /// Rebuild the pair from its user token name.
    pub fn from_user(user: &AssetName) -> Option<Self> {
        let body = body(user, &USER_LABEL)?;
        Some(Self {
            reference: relabel(&REFERENCE_LABEL, &body),
            user: user.clone(),
        })
    }
}

fn relabel(label: &[u8; 4], body: &[u8]) -> AssetName {
    let mut name = label.to_vec();
    name.extend_from_slice(body);
    name.truncate(MAX_ASSET_NAME_LEN);
    AssetName::new(name).expect("truncated to the maximum asset name length")
}

fn body(name: &AssetName, label: &[u8; 4]) -> Option<Vec<u8>> {
    name.as_bytes().strip_prefix(label.as_slice()).map(|b| b.to_vec())
}

/// Find a matching reference/user pair under `policy_id` across `utxos`.
///
/// Callers pass the script-side UTxOs (holding reference tokens) together
/// with the wallet-side UTxOs (holding user tokens). A reference token only
/// pairs with a user token of the same body.
pub fn find_paired_token_names(utxos: &[Utxo], policy_id: &PolicyId) -> Result<TokenPair, LookupError> {
    let mut references = Vec::new();
    let mut users = Vec::new();
    for utxo in utxos {
        let Some(names) = utxo.value.assets.get(policy_id) else {
            continue;
        };
        for name in names.keys() {
            if let Some(b) = body(name, &REFERENCE_LABEL) {
                references.push((b, name.clone()));
            } else if let Some(b) = body(name, &USER_LABEL) {
                users.push((b, name.clone()));
            }
        }
    }

    if references.is_empty() {
        return Err(LookupError::NotFound(format!("reference token under policy {}", policy_id)));
    }
    if users.is_empty() {
        return Err(LookupError::NotFound(format!("user token under policy {}", policy_id)));
    }

    references
        .into_iter()
        .find_map(|(rb, reference)| {
            users
                .iter()
                .find(|(ub, _)| *ub == rb)
                .map(|(_, user)| TokenPair {
                    reference,
                    user: user.clone(),
                })
        })
        .ok_or_else(|| LookupError::NotFound(format!("matching token pair under policy {}", policy_id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{Address, Network};
    use crate::asset::{AssetClass, Value};
    use crate::hash::{KeyHash, TxHash};

    fn out_ref(index: u32) -> OutRef {
        OutRef::new(TxHash::new([0x42; 32]), index)
    }

    fn utxo_with(policy: PolicyId, names: &[&AssetName]) -> Utxo {
        let mut value = Value::lovelace(2_000_000);
        for name in names {
            value.add_asset(&AssetClass::native(policy, (*name).clone()), 1).unwrap();
        }
        Utxo {
            out_ref: out_ref(9),
            address: Address::key(Network::Preview, KeyHash::new([1; 28])),
            value,
            datum: None,
        }
    }

    #[test]
    fn test_layout() {
        let name = derive_token_name(&out_ref(3), &REFERENCE_LABEL).unwrap();
        let bytes = name.as_bytes();
        assert_eq!(bytes.len(), 32);
        assert_eq!(&bytes[..4], &REFERENCE_LABEL);
        assert_eq!(bytes[4], 3);
        assert_eq!(&bytes[5..], &sha3_256(&[0x42; 32])[..27]);
    }

    #[test]
    fn test_deterministic_and_prefix_distinct() {
        let r = out_ref(0);
        let a = derive_token_name(&r, &REFERENCE_LABEL).unwrap();
        let b = derive_token_name(&r, &REFERENCE_LABEL).unwrap();
        let c = derive_token_name(&r, &USER_LABEL).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(&a.as_bytes()[4..], &c.as_bytes()[4..]);
    }

    #[test]
    fn test_distinct_outputs_distinct_names() {
        let a = derive_token_name(&out_ref(0), &USER_LABEL).unwrap();
        let b = derive_token_name(&out_ref(1), &USER_LABEL).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_empty_prefix() {
        let name = derive_token_name(&out_ref(1), &[]).unwrap();
        assert_eq!(name.as_bytes()[0], 1);
        assert_eq!(name.as_bytes().len(), 32);
    }

    #[test]
    fn test_pair_from_either_side() {
        let pair = TokenPair::derive(&out_ref(4)).unwrap();
        assert_eq!(TokenPair::from_reference(&pair.reference), Some(pair.clone()));
        assert_eq!(TokenPair::from_user(&pair.user), Some(pair.clone()));
        assert_eq!(TokenPair::from_user(&pair.reference), None);
    }

    #[test]
    fn test_index_too_large() {
        assert_eq!(
            derive_token_name(&out_ref(256), &USER_LABEL).unwrap_err(),
            TokenNameError::IndexTooLarge(256)
        );
    }

    #[test]
    fn test_find_pair_across_utxos() {
        let policy = PolicyId::new([7; 28]);
        let pair = TokenPair::derive(&out_ref(2)).unwrap();
        let script_side = utxo_with(policy, &[&pair.reference]);
        let wallet_side = utxo_with(policy, &[&pair.user]);
        let found = find_paired_token_names(&[script_side, wallet_side], &policy).unwrap();
        assert_eq!(found, pair);
    }

    #[test]
    fn test_find_pair_reference_only_fails() {
        let policy = PolicyId::new([7; 28]);
        let pair = TokenPair::derive(&out_ref(2)).unwrap();
        let only_ref = utxo_with(policy, &[&pair.reference]);
        assert!(matches!(
            find_paired_token_names(&[only_ref], &policy),
            Err(LookupError::NotFound(_))
        ));
    }

    #[test]
    fn test_find_pair_ignores_other_policies_and_mismatches() {
        let policy = PolicyId::new([7; 28]);
        let other = PolicyId::new([8; 28]);
        let a = TokenPair::derive(&out_ref(1)).unwrap();
        let b = TokenPair::derive(&out_ref(2)).unwrap();
        let utxos = [utxo_with(policy, &[&a.reference]), utxo_with(policy, &[&b.user]), utxo_with(other, &[&a.user])];
        assert!(find_paired_token_names(&utxos, &policy).is_err());
    }
}
