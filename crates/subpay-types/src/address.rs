//! Shelley-era addresses.
//!
//! Only the structured form is modelled; bech32 rendering belongs to the
//! wallet and chain-query collaborators. The raw header byte follows CIP-19.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::hash::{KeyHash, ScriptHash};

/// Cardano network the protocol is deployed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Preprod,
    Preview,
}

impl Network {
    /// Network id carried in the address header.
    pub fn network_id(&self) -> u8 {
        match self {
            Self::Mainnet => 1,
            Self::Preprod | Self::Preview => 0,
        }
    }
}

impl std::str::FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "mainnet" | "main" => Ok(Self::Mainnet),
            "preprod" => Ok(Self::Preprod),
            "preview" => Ok(Self::Preview),
            _ => Err(format!("unknown network: {} (use mainnet, preprod, or preview)", s)),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mainnet => write!(f, "mainnet"),
            Self::Preprod => write!(f, "preprod"),
            Self::Preview => write!(f, "preview"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Credential {
    Key(KeyHash),
    Script(ScriptHash),
}

impl Credential {
    pub fn hash_bytes(&self) -> &[u8; 28] {
        match self {
            Self::Key(h) | Self::Script(h) => h.as_bytes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address {
    pub network: Network,
    pub payment: Credential,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stake: Option<Credential>,
}

impl Address {
    /// Enterprise address locked by a script.
    pub fn script(network: Network, hash: ScriptHash) -> Self {
        Self {
            network,
            payment: Credential::Script(hash),
            stake: None,
        }
    }

    /// Enterprise address controlled by a verification key.
    pub fn key(network: Network, hash: KeyHash) -> Self {
        Self {
            network,
            payment: Credential::Key(hash),
            stake: None,
        }
    }

    pub fn with_stake(mut self, stake: Credential) -> Self {
        self.stake = Some(stake);
        self
    }

    pub fn is_script(&self) -> bool {
        matches!(self.payment, Credential::Script(_))
    }

    pub fn script_hash(&self) -> Option<ScriptHash> {
        match self.payment {
            Credential::Script(h) => Some(h),
            Credential::Key(_) => None,
        }
    }

    pub fn key_hash(&self) -> Option<KeyHash> {
        match self.payment {
            Credential::Key(h) => Some(h),
            Credential::Script(_) => None,
        }
    }

    /// Raw address bytes: CIP-19 header followed by the credential hashes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let kind: u8 = match (&self.payment, &self.stake) {
            (Credential::Key(_), Some(Credential::Key(_))) => 0b0000,
            (Credential::Script(_), Some(Credential::Key(_))) => 0b0001,
            (Credential::Key(_), Some(Credential::Script(_))) => 0b0010,
            (Credential::Script(_), Some(Credential::Script(_))) => 0b0011,
            (Credential::Key(_), None) => 0b0110,
            (Credential::Script(_), None) => 0b0111,
        };
        let mut out = Vec::with_capacity(57);
        out.push((kind << 4) | self.network.network_id());
        out.extend_from_slice(self.payment.hash_bytes());
        if let Some(stake) = &self.stake {
            out.extend_from_slice(stake.hash_bytes());
        }
        out
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.to_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enterprise_script_header() {
        let addr = Address::script(Network::Preprod, ScriptHash::new([0x11; 28]));
        let bytes = addr.to_bytes();
        assert_eq!(bytes.len(), 29);
        assert_eq!(bytes[0], 0x70);
        assert!(addr.is_script());
    }

    #[test]
    fn test_base_key_header_mainnet() {
        let addr = Address::key(Network::Mainnet, KeyHash::new([1; 28]))
            .with_stake(Credential::Key(KeyHash::new([2; 28])));
        let bytes = addr.to_bytes();
        assert_eq!(bytes.len(), 57);
        assert_eq!(bytes[0], 0x01);
        assert_eq!(addr.key_hash(), Some(KeyHash::new([1; 28])));
        assert_eq!(addr.script_hash(), None);
    }

    #[test]
    fn test_network_parse() {
        assert_eq!("Preview".parse::<Network>().unwrap(), Network::Preview);
        assert!("testnet".parse::<Network>().is_err());
    }

    #[test]
    fn test_address_serde_roundtrip() {
        let addr = Address::script(Network::Mainnet, ScriptHash::new([9; 28]));
        let json = serde_json::to_string(&addr).unwrap();
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
