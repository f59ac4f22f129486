//! The Plutus data model and its CBOR encoding.
//!
//! Encoding mirrors what the ledger and the Aiken compiler produce, so that
//! datums written by this library hash identically to ones written by other
//! tooling:
//!
//! - constructor alternatives 0..=6 use tags 121..=127, 7..=127 use tags
//!   1280..=1400, anything larger uses tag 102 with an explicit index;
//! - non-empty lists and constructor fields are indefinite-length arrays,
//!   empty ones are definite;
//! - byte strings longer than 64 bytes are split into 64-byte chunks;
//! - integers outside the CBOR major-type range become tagged bignums.

use std::fmt;

use minicbor::data::{Int, Tag, Type};
use minicbor::decode::{self, Decoder};
use minicbor::encode::{self, Encoder, Write};
use minicbor::Encode;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::DecodeError;

const BYTES_CHUNK: usize = 64;
const TAG_POS_BIGNUM: u64 = 2;
const TAG_NEG_BIGNUM: u64 = 3;
const TAG_CONSTR_GENERAL: u64 = 102;
/// Deepest nesting accepted when decoding.
const MAX_DEPTH: usize = 256;

#[derive(Clone, PartialEq, Eq)]
pub enum PlutusData {
    Constr { tag: u64, fields: Vec<PlutusData> },
    Map(Vec<(PlutusData, PlutusData)>),
    List(Vec<PlutusData>),
    Integer(i128),
    Bytes(Vec<u8>),
}

/// A typed schema for an on-chain data structure.
pub trait PlutusSchema: Sized {
    fn to_data(&self) -> PlutusData;

    fn from_data(data: &PlutusData) -> Result<Self, DecodeError>;

    fn to_cbor(&self) -> Vec<u8> {
        self.to_data().to_cbor()
    }

    fn from_cbor(bytes: &[u8]) -> Result<Self, DecodeError> {
        Self::from_data(&PlutusData::from_cbor(bytes)?)
    }
}

impl PlutusSchema for PlutusData {
    fn to_data(&self) -> PlutusData {
        self.clone()
    }

    fn from_data(data: &PlutusData) -> Result<Self, DecodeError> {
        Ok(data.clone())
    }
}

// ─── Construction & Access ──────────────────────────────────────────────────

impl PlutusData {
    pub fn constr(tag: u64, fields: Vec<PlutusData>) -> Self {
        Self::Constr { tag, fields }
    }

    pub fn int(n: impl Into<i128>) -> Self {
        Self::Integer(n.into())
    }

    pub fn bytes(b: impl Into<Vec<u8>>) -> Self {
        Self::Bytes(b.into())
    }

    pub fn list(items: Vec<PlutusData>) -> Self {
        Self::List(items)
    }

    /// Aiken/Plutus `Bool`: `False` is constructor 0, `True` constructor 1.
    pub fn bool(b: bool) -> Self {
        Self::constr(b as u64, Vec::new())
    }

    pub fn as_constr(&self, what: &'static str) -> Result<(u64, &[PlutusData]), DecodeError> {
        match self {
            Self::Constr { tag, fields } => Ok((*tag, fields)),
            _ => Err(DecodeError::Kind {
                what,
                expected: "constructor",
            }),
        }
    }

    /// Fields of a constructor with the given alternative and arity.
    pub fn expect_constr(
        &self,
        tag: u64,
        arity: usize,
        what: &'static str,
    ) -> Result<&[PlutusData], DecodeError> {
        let (got, fields) = self.as_constr(what)?;
        if got != tag {
            return Err(DecodeError::UnexpectedConstructor { what, got });
        }
        expect_arity(fields, arity, what)?;
        Ok(fields)
    }

    pub fn as_int(&self, what: &'static str) -> Result<i128, DecodeError> {
        match self {
            Self::Integer(n) => Ok(*n),
            _ => Err(DecodeError::Kind {
                what,
                expected: "integer",
            }),
        }
    }

    /// Non-negative integer that fits in 64 bits.
    pub fn as_u64(&self, what: &'static str) -> Result<u64, DecodeError> {
        let n = self.as_int(what)?;
        u64::try_from(n).map_err(|_| DecodeError::OutOfRange { what, value: n })
    }

    pub fn as_bytes(&self, what: &'static str) -> Result<&[u8], DecodeError> {
        match self {
            Self::Bytes(b) => Ok(b),
            _ => Err(DecodeError::Kind {
                what,
                expected: "byte string",
            }),
        }
    }

    pub fn as_list(&self, what: &'static str) -> Result<&[PlutusData], DecodeError> {
        match self {
            Self::List(items) => Ok(items),
            _ => Err(DecodeError::Kind {
                what,
                expected: "list",
            }),
        }
    }

    pub fn as_bool(&self, what: &'static str) -> Result<bool, DecodeError> {
        let (tag, fields) = self.as_constr(what)?;
        expect_arity(fields, 0, what)?;
        match tag {
            0 => Ok(false),
            1 => Ok(true),
            got => Err(DecodeError::UnexpectedConstructor { what, got }),
        }
    }

    // ── CBOR ────────────────────────────────────────────────────────────

    pub fn to_cbor(&self) -> Vec<u8> {
        minicbor::to_vec(self).expect("encoding PlutusData into a Vec should not fail")
    }

    /// Decode a single CBOR item; trailing bytes are rejected.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut d = Decoder::new(bytes);
        let data: PlutusData = d.decode().map_err(|e| DecodeError::Cbor(e.to_string()))?;
        let rest = bytes.len() - d.position();
        if rest != 0 {
            return Err(DecodeError::TrailingBytes(rest));
        }
        Ok(data)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_cbor())
    }

    pub fn from_hex(s: &str) -> Result<Self, DecodeError> {
        Self::from_cbor(&hex::decode(s)?)
    }
}

fn expect_arity(fields: &[PlutusData], arity: usize, what: &'static str) -> Result<(), DecodeError> {
    if fields.len() != arity {
        return Err(DecodeError::Arity {
            what,
            expected: arity,
            got: fields.len(),
        });
    }
    Ok(())
}

impl fmt::Debug for PlutusData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constr { tag, fields } => {
                write!(f, "Constr{}", tag)?;
                f.debug_list().entries(fields).finish()
            }
            Self::Map(entries) => f
                .debug_map()
                .entries(entries.iter().map(|(k, v)| (k, v)))
                .finish(),
            Self::List(items) => f.debug_list().entries(items).finish(),
            Self::Integer(n) => write!(f, "{}", n),
            Self::Bytes(b) => write!(f, "h'{}'", hex::encode(b)),
        }
    }
}

impl Serialize for PlutusData {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PlutusData {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ─── Encoding ───────────────────────────────────────────────────────────────

fn constr_tag(alternative: u64) -> Option<u64> {
    match alternative {
        0..=6 => Some(121 + alternative),
        7..=127 => Some(1280 + alternative - 7),
        _ => None,
    }
}

impl<C> Encode<C> for PlutusData {
    fn encode<W: Write>(
        &self,
        e: &mut Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), encode::Error<W::Error>> {
        match self {
            Self::Constr { tag, fields } => match constr_tag(*tag) {
                Some(cbor_tag) => {
                    e.tag(Tag::new(cbor_tag))?;
                    encode_list(fields, e, ctx)?;
                }
                None => {
                    e.tag(Tag::new(TAG_CONSTR_GENERAL))?;
                    e.array(2)?;
                    e.u64(*tag)?;
                    encode_list(fields, e, ctx)?;
                }
            },
            Self::Map(entries) => {
                e.map(entries.len() as u64)?;
                for (k, v) in entries {
                    k.encode(e, ctx)?;
                    v.encode(e, ctx)?;
                }
            }
            Self::List(items) => encode_list(items, e, ctx)?,
            Self::Integer(n) => encode_integer(*n, e)?,
            Self::Bytes(b) => encode_bytes(b, e)?,
        }
        Ok(())
    }
}

fn encode_list<C, W: Write>(
    items: &[PlutusData],
    e: &mut Encoder<W>,
    ctx: &mut C,
) -> Result<(), encode::Error<W::Error>> {
    if items.is_empty() {
        e.array(0)?;
        return Ok(());
    }
    e.begin_array()?;
    for item in items {
        item.encode(e, ctx)?;
    }
    e.end()?;
    Ok(())
}

fn encode_bytes<W: Write>(bytes: &[u8], e: &mut Encoder<W>) -> Result<(), encode::Error<W::Error>> {
    if bytes.len() <= BYTES_CHUNK {
        e.bytes(bytes)?;
        return Ok(());
    }
    e.begin_bytes()?;
    for chunk in bytes.chunks(BYTES_CHUNK) {
        e.bytes(chunk)?;
    }
    e.end()?;
    Ok(())
}

fn encode_integer<W: Write>(n: i128, e: &mut Encoder<W>) -> Result<(), encode::Error<W::Error>> {
    if let Ok(i) = Int::try_from(n) {
        e.int(i)?;
        return Ok(());
    }
    // Tag 3 carries -1 - n.
    let (tag, magnitude) = if n >= 0 {
        (TAG_POS_BIGNUM, n as u128)
    } else {
        (TAG_NEG_BIGNUM, (-1 - n) as u128)
    };
    let be = magnitude.to_be_bytes();
    let first = be.iter().position(|b| *b != 0).unwrap_or(be.len() - 1);
    e.tag(Tag::new(tag))?;
    e.bytes(&be[first..])?;
    Ok(())
}

// ─── Decoding ───────────────────────────────────────────────────────────────

impl<'b, C> minicbor::Decode<'b, C> for PlutusData {
    fn decode(d: &mut Decoder<'b>, _ctx: &mut C) -> Result<Self, decode::Error> {
        decode_data(d, 0)
    }
}

fn decode_data(d: &mut Decoder<'_>, depth: usize) -> Result<PlutusData, decode::Error> {
    if depth > MAX_DEPTH {
        return Err(decode::Error::message(format!(
            "plutus data nested deeper than {} levels",
            MAX_DEPTH
        )));
    }
    match d.datatype()? {
        Type::Tag => decode_tagged(d, depth),
        Type::Map | Type::MapIndef => {
            let len = d.map()?;
            let mut entries = Vec::new();
            while !at_end(d, len, entries.len())? {
                let key = decode_data(d, depth + 1)?;
                let value = decode_data(d, depth + 1)?;
                entries.push((key, value));
            }
            Ok(PlutusData::Map(entries))
        }
        Type::Array | Type::ArrayIndef => Ok(PlutusData::List(decode_list(d, depth)?)),
        Type::Bytes | Type::BytesIndef => Ok(PlutusData::Bytes(decode_bytes(d)?)),
        Type::U8
        | Type::U16
        | Type::U32
        | Type::U64
        | Type::I8
        | Type::I16
        | Type::I32
        | Type::I64
        | Type::Int => Ok(PlutusData::Integer(i128::from(d.int()?))),
        other => Err(decode::Error::message(format!(
            "unexpected CBOR type {:?} in plutus data",
            other
        ))),
    }
}

fn decode_tagged(d: &mut Decoder<'_>, depth: usize) -> Result<PlutusData, decode::Error> {
    let tag = d.tag()?.as_u64();
    match tag {
        121..=127 => Ok(PlutusData::Constr {
            tag: tag - 121,
            fields: decode_list(d, depth)?,
        }),
        1280..=1400 => Ok(PlutusData::Constr {
            tag: tag - 1280 + 7,
            fields: decode_list(d, depth)?,
        }),
        TAG_CONSTR_GENERAL => {
            if d.array()? != Some(2) {
                return Err(decode::Error::message("general constructor must be a pair"));
            }
            let alternative = d.u64()?;
            Ok(PlutusData::Constr {
                tag: alternative,
                fields: decode_list(d, depth)?,
            })
        }
        TAG_POS_BIGNUM | TAG_NEG_BIGNUM => {
            let magnitude = decode_bytes(d)?;
            let start = magnitude.iter().position(|b| *b != 0).unwrap_or(magnitude.len());
            let significant = &magnitude[start..];
            if significant.len() > 16 {
                return Err(decode::Error::message("bignum exceeds 128 bits"));
            }
            let mut buf = [0u8; 16];
            buf[16 - significant.len()..].copy_from_slice(significant);
            let m = i128::try_from(u128::from_be_bytes(buf))
                .map_err(|_| decode::Error::message("bignum exceeds 128 bits"))?;
            Ok(PlutusData::Integer(if tag == TAG_POS_BIGNUM { m } else { -1 - m }))
        }
        other => Err(decode::Error::message(format!(
            "unexpected CBOR tag {} in plutus data",
            other
        ))),
    }
}

/// Items of a list or constructor body sit one level below `depth`.
fn decode_list(d: &mut Decoder<'_>, depth: usize) -> Result<Vec<PlutusData>, decode::Error> {
    let len = d.array()?;
    let mut items = Vec::new();
    while !at_end(d, len, items.len())? {
        items.push(decode_data(d, depth + 1)?);
    }
    Ok(items)
}

/// Consumes the break byte of an indefinite container once it is reached.
fn at_end(d: &mut Decoder<'_>, len: Option<u64>, seen: usize) -> Result<bool, decode::Error> {
    match len {
        Some(n) => Ok(seen as u64 >= n),
        None => {
            if d.datatype()? == Type::Break {
                d.set_position(d.position() + 1);
                Ok(true)
            } else {
                Ok(false)
            }
        }
    }
}

fn decode_bytes(d: &mut Decoder<'_>) -> Result<Vec<u8>, decode::Error> {
    match d.datatype()? {
        Type::BytesIndef => {
            let mut out = Vec::new();
            for chunk in d.bytes_iter()? {
                out.extend_from_slice(chunk?);
            }
            Ok(out)
        }
        _ => Ok(d.bytes()?.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(data: &PlutusData) -> PlutusData {
        PlutusData::from_cbor(&data.to_cbor()).unwrap()
    }

    #[test]
    fn test_small_constr_tags() {
        let unit = PlutusData::constr(0, vec![]);
        assert_eq!(hex::encode(unit.to_cbor()), "d87980");
        let one = PlutusData::constr(1, vec![PlutusData::int(1)]);
        assert_eq!(hex::encode(one.to_cbor()), "d87a9f01ff");
        assert_eq!(roundtrip(&one), one);
    }

    #[test]
    fn test_extended_constr_tags() {
        let seven = PlutusData::constr(7, vec![]);
        // tag 1280 = 0xd90500
        assert_eq!(hex::encode(seven.to_cbor()), "d9050080");
        assert_eq!(roundtrip(&seven), seven);

        let big = PlutusData::constr(500, vec![PlutusData::int(2)]);
        assert_eq!(hex::encode(big.to_cbor()), "d866821901f49f02ff");
        assert_eq!(roundtrip(&big), big);
    }

    #[test]
    fn test_bool_encoding() {
        assert_eq!(hex::encode(PlutusData::bool(false).to_cbor()), "d87980");
        assert_eq!(hex::encode(PlutusData::bool(true).to_cbor()), "d87a80");
        assert!(PlutusData::bool(true).as_bool("b").unwrap());
        assert!(PlutusData::constr(2, vec![]).as_bool("b").is_err());
    }

    #[test]
    fn test_integers() {
        for n in [0i128, 1, -1, 23, 24, -25, u64::MAX as i128, -(u64::MAX as i128) - 1] {
            assert_eq!(roundtrip(&PlutusData::int(n)), PlutusData::int(n));
        }
        assert_eq!(hex::encode(PlutusData::int(10_000_000).to_cbor()), "1a00989680");
    }

    #[test]
    fn test_bignums() {
        let pos = PlutusData::int(u64::MAX as i128 + 1);
        assert_eq!(hex::encode(pos.to_cbor()), "c249010000000000000000");
        assert_eq!(roundtrip(&pos), pos);

        let neg = PlutusData::int(-(u64::MAX as i128) - 2);
        assert_eq!(hex::encode(neg.to_cbor()), "c349010000000000000000");
        assert_eq!(roundtrip(&neg), neg);

        assert_eq!(roundtrip(&PlutusData::int(i128::MAX)), PlutusData::int(i128::MAX));
        assert_eq!(roundtrip(&PlutusData::int(i128::MIN)), PlutusData::int(i128::MIN));
    }

    #[test]
    fn test_long_bytes_are_chunked() {
        let data = PlutusData::bytes(vec![0xab; 100]);
        let cbor = data.to_cbor();
        assert_eq!(cbor[0], 0x5f);
        assert_eq!(*cbor.last().unwrap(), 0xff);
        assert_eq!(roundtrip(&data), data);

        let short = PlutusData::bytes(vec![1; 64]);
        assert_eq!(short.to_cbor()[0], 0x58);
    }

    #[test]
    fn test_lists_and_maps() {
        assert_eq!(hex::encode(PlutusData::list(vec![]).to_cbor()), "80");
        let list = PlutusData::list(vec![PlutusData::int(1), PlutusData::bytes(vec![2])]);
        assert_eq!(hex::encode(list.to_cbor()), "9f014102ff");
        assert_eq!(roundtrip(&list), list);

        let map = PlutusData::Map(vec![(PlutusData::int(1), PlutusData::bytes(b"a".to_vec()))]);
        assert_eq!(hex::encode(map.to_cbor()), "a1014161");
        assert_eq!(roundtrip(&map), map);
    }

    #[test]
    fn test_decodes_definite_constr_fields() {
        // Other encoders may emit definite-length field arrays.
        let data = PlutusData::from_hex("d8798201420102").unwrap();
        assert_eq!(
            data,
            PlutusData::constr(0, vec![PlutusData::int(1), PlutusData::bytes(vec![1, 2])])
        );
    }

    #[test]
    fn test_rejects_trailing_bytes() {
        assert_eq!(
            PlutusData::from_hex("d8798000").unwrap_err(),
            DecodeError::TrailingBytes(1)
        );
    }

    #[test]
    fn test_rejects_non_plutus_items() {
        assert!(matches!(
            PlutusData::from_hex("f5").unwrap_err(),
            DecodeError::Cbor(_)
        ));
        assert!(matches!(
            PlutusData::from_hex("d81e80").unwrap_err(),
            DecodeError::Cbor(_)
        ));
    }

    fn nested_lists(levels: usize) -> Vec<u8> {
        let mut raw = vec![0x81; levels];
        raw.push(0x00);
        raw
    }

    #[test]
    fn test_deep_nesting_is_an_error_not_an_overflow() {
        // Tokio workers run on 2 MiB stacks.
        let handle = std::thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(|| {
                let shallow = PlutusData::from_cbor(&nested_lists(200));
                let deep = PlutusData::from_cbor(&nested_lists(4000));
                let indefinite = {
                    let mut raw = vec![0x9f; 4000];
                    raw.push(0x00);
                    raw.extend(std::iter::repeat(0xff).take(4000));
                    PlutusData::from_cbor(&raw)
                };
                let constrs = {
                    let mut raw = Vec::new();
                    for _ in 0..4000 {
                        raw.extend_from_slice(&[0xd8, 0x79, 0x81]);
                    }
                    raw.push(0x00);
                    PlutusData::from_cbor(&raw)
                };
                (shallow, deep, indefinite, constrs)
            })
            .unwrap();
        let (shallow, deep, indefinite, constrs) = handle.join().unwrap();

        let mut value = shallow.unwrap();
        let mut levels = 0;
        while let PlutusData::List(mut items) = value {
            assert_eq!(items.len(), 1);
            value = items.remove(0);
            levels += 1;
        }
        assert_eq!(levels, 200);
        assert_eq!(value, PlutusData::int(0));

        for result in [deep, indefinite, constrs] {
            match result.unwrap_err() {
                DecodeError::Cbor(msg) => assert!(msg.contains("nested deeper"), "{}", msg),
                other => panic!("unexpected error {:?}", other),
            }
        }
    }

    #[test]
    fn test_nesting_limit_boundary() {
        assert!(PlutusData::from_cbor(&nested_lists(MAX_DEPTH)).is_ok());
        assert!(PlutusData::from_cbor(&nested_lists(MAX_DEPTH + 1)).is_err());
    }

    #[test]
    fn test_indefinite_containers_decode() {
        // [_ 1, {_ 2: h'ab'}]
        let data = PlutusData::from_hex("9f01bf0241abffff").unwrap();
        assert_eq!(
            data,
            PlutusData::List(vec![
                PlutusData::int(1),
                PlutusData::Map(vec![(PlutusData::int(2), PlutusData::Bytes(vec![0xab]))]),
            ])
        );
    }

    #[test]
    fn test_expect_constr_errors() {
        let d = PlutusData::constr(1, vec![PlutusData::int(1)]);
        assert!(matches!(
            d.expect_constr(0, 1, "X"),
            Err(DecodeError::UnexpectedConstructor { got: 1, .. })
        ));
        assert!(matches!(
            d.expect_constr(1, 2, "X"),
            Err(DecodeError::Arity { expected: 2, got: 1, .. })
        ));
        assert!(PlutusData::int(-1).as_u64("n").is_err());
    }

    #[test]
    fn test_serde_hex() {
        let d = PlutusData::constr(0, vec![PlutusData::int(42)]);
        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json, "\"d8799f182aff\"");
        let back: PlutusData = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
    }
}
