//! CIP-57 blueprint (compiled-script artifact) loading.

use std::path::Path;

use serde::Deserialize;
use subpay_tx::PlutusScript;
use subpay_types::{Address, Network, PolicyId, ScriptHash};

use crate::error::{ProtocolError, Result};

#[derive(Deserialize)]
struct BlueprintFile {
    #[serde(default)]
    preamble: Option<Preamble>,
    validators: Vec<ValidatorEntry>,
}

#[derive(Deserialize)]
struct Preamble {
    title: Option<String>,
}

#[derive(Deserialize)]
struct ValidatorEntry {
    title: String,
    #[serde(rename = "compiledCode")]
    compiled_code: String,
    #[serde(default)]
    hash: Option<String>,
}

/// A named validator and its compiled script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validator {
    pub title: String,
    pub script: PlutusScript,
}

impl Validator {
    pub fn hash(&self) -> ScriptHash {
        self.script.hash()
    }

    /// Minting policy of a multi-purpose validator: its own script hash.
    pub fn policy_id(&self) -> PolicyId {
        self.script.hash()
    }

    pub fn address(&self, network: Network) -> Address {
        Address::script(network, self.hash())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Blueprint {
    pub title: Option<String>,
    validators: Vec<Validator>,
}

impl Blueprint {
    pub fn from_json(s: &str) -> Result<Self> {
        let file: BlueprintFile = serde_json::from_str(s).map_err(|e| ProtocolError::Blueprint(e.to_string()))?;
        let validators = file
            .validators
            .into_iter()
            .map(|entry| {
                let script = PlutusScript::from_hex(&entry.compiled_code)
                    .map_err(|e| ProtocolError::Blueprint(format!("{}: {}", entry.title, e)))?;
                if let Some(expected) = &entry.hash {
                    let actual = script.hash().to_hex();
                    if !expected.eq_ignore_ascii_case(&actual) {
                        return Err(ProtocolError::Blueprint(format!(
                            "{}: hash mismatch, blueprint says {}, script hashes to {}",
                            entry.title, expected, actual
                        )));
                    }
                }
                Ok(Validator {
                    title: entry.title,
                    script,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            title: file.preamble.and_then(|p| p.title),
            validators,
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .map_err(|e| ProtocolError::Blueprint(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&s)
    }

    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    pub fn validator(&self, title: &str) -> Result<&Validator> {
        self.validators
            .iter()
            .find(|v| v.title == title)
            .ok_or_else(|| ProtocolError::ValidatorNotFound(title.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> String {
        let script = PlutusScript::new(vec![0x49, 0x01, 0x00, 0x00]);
        format!(
            r#"{{
                "preamble": {{ "title": "acme/subscriptions", "plutusVersion": "v3" }},
                "validators": [
                    {{ "title": "service_multi_validator.mint", "compiledCode": "49010000", "hash": "{}" }},
                    {{ "title": "account_multi_validator.mint", "compiledCode": "4a01000000" }}
                ]
            }}"#,
            script.hash()
        )
    }

    #[test]
    fn test_lookup_by_title() {
        let bp = Blueprint::from_json(&sample()).unwrap();
        assert_eq!(bp.title.as_deref(), Some("acme/subscriptions"));
        assert_eq!(bp.validators().len(), 2);
        let v = bp.validator("service_multi_validator.mint").unwrap();
        assert_eq!(v.script.as_bytes(), &[0x49, 0x01, 0x00, 0x00]);
        assert_eq!(v.policy_id(), v.hash());
        assert!(v.address(Network::Preview).is_script());
    }

    #[test]
    fn test_missing_validator() {
        let bp = Blueprint::from_json(&sample()).unwrap();
        assert!(matches!(
            bp.validator("payment_multi_validator.mint"),
            Err(ProtocolError::ValidatorNotFound(t)) if t == "payment_multi_validator.mint"
        ));
    }

    #[test]
    fn test_hash_mismatch_rejected() {
        let json = r#"{"validators":[{"title":"x","compiledCode":"00","hash":"abcd"}]}"#;
        assert!(matches!(Blueprint::from_json(json), Err(ProtocolError::Blueprint(_))));
    }

    #[test]
    fn test_bad_hex_rejected() {
        let json = r#"{"validators":[{"title":"x","compiledCode":"zz"}]}"#;
        assert!(matches!(Blueprint::from_json(json), Err(ProtocolError::Blueprint(_))));
    }
}
