//! Fixed-width hashes and the digest functions the protocol relies on.
//!
//! Cardano identifies transactions by blake2b-256 and scripts, keys and
//! minting policies by blake2b-224. Token names are derived with sha3-256.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tiny_keccak::{Hasher, Sha3};

use crate::error::DecodeError;

/// A fixed-width digest. Ordering is lexicographic over the raw bytes,
/// matching the ledger's canonical ordering of transaction ids.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash<const N: usize>([u8; N]);

/// Transaction id (blake2b-256 of the transaction body).
pub type TxHash = Hash<32>;
/// Script hash (blake2b-224 of the tagged script bytes).
pub type ScriptHash = Hash<28>;
/// Verification key hash (blake2b-224).
pub type KeyHash = Hash<28>;
/// Minting policy id. For the protocol's multi-purpose validators this is
/// the validator's script hash.
pub type PolicyId = Hash<28>;

impl<const N: usize> Hash<N> {
    pub const fn new(bytes: [u8; N]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; N] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Build a hash from a byte slice of exactly `N` bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, DecodeError> {
        let arr: [u8; N] = bytes.try_into().map_err(|_| DecodeError::Length {
            what: "hash",
            expected: N,
            got: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    pub fn from_hex(s: &str) -> Result<Self, DecodeError> {
        Self::from_slice(&hex::decode(s)?)
    }
}

impl<const N: usize> From<[u8; N]> for Hash<N> {
    fn from(bytes: [u8; N]) -> Self {
        Self(bytes)
    }
}

impl<const N: usize> AsRef<[u8]> for Hash<N> {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl<const N: usize> FromStr for Hash<N> {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl<const N: usize> fmt::Display for Hash<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl<const N: usize> fmt::Debug for Hash<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash<{}>({})", N, self.to_hex())
    }
}

impl<const N: usize> Serialize for Hash<N> {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_hex())
    }
}

impl<'de, const N: usize> Deserialize<'de> for Hash<N> {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ─── Digest Functions ───────────────────────────────────────────────────────

pub fn blake2b_224(data: &[u8]) -> Hash<28> {
    let digest = blake2b_simd::Params::new().hash_length(28).hash(data);
    let mut out = [0u8; 28];
    out.copy_from_slice(digest.as_bytes());
    Hash(out)
}

pub fn blake2b_256(data: &[u8]) -> Hash<32> {
    let digest = blake2b_simd::Params::new().hash_length(32).hash(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(digest.as_bytes());
    Hash(out)
}

pub fn sha3_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha3::v256();
    hasher.update(data);
    let mut out = [0u8; 32];
    hasher.finalize(&mut out);
    out
}
