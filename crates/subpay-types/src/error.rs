//! Error types shared by the subpay crates.

use thiserror::Error;

/// A datum, redeemer or CBOR item did not match the expected schema.
///
/// Classification code treats this as "not the kind of UTxO we are looking
/// for" and filters the UTxO out rather than failing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("CBOR decode failed: {0}")]
    Cbor(String),

    #[error("trailing bytes after CBOR item ({0} bytes)")]
    TrailingBytes(usize),

    #[error("UTxO carries no inline datum")]
    MissingDatum,

    #[error("{what}: unexpected constructor {got}")]
    UnexpectedConstructor { what: &'static str, got: u64 },

    #[error("{what}: expected {expected} fields, got {got}")]
    Arity {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("{what}: expected {expected}")]
    Kind {
        what: &'static str,
        expected: &'static str,
    },

    #[error("{what}: integer {value} out of range")]
    OutOfRange { what: &'static str, value: i128 },

    #[error("{what}: expected {expected} bytes, got {got}")]
    Length {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

/// A lookup that must yield exactly one result did not.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("expected exactly one UTxO carrying {unit}, found {count}")]
    Ambiguous { unit: String, count: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenNameError {
    #[error("output index {0} does not fit a single byte")]
    IndexTooLarge(u32),

    #[error("prefix of {0} bytes leaves no room for the name body")]
    PrefixTooLong(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("asset quantity overflow for {0}")]
    Overflow(String),

    #[error("insufficient {unit}: need {need}, have {have}")]
    Insufficient { unit: String, need: u64, have: u64 },

    #[error("asset name longer than 32 bytes ({0})")]
    NameTooLong(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_errors_convert_into_decode_errors() {
        let err: DecodeError = hex::decode("zz").unwrap_err().into();
        assert!(matches!(err, DecodeError::Hex(_)));
        assert_eq!(err.clone(), err);
        assert!(err.to_string().starts_with("invalid hex"));
    }
}
