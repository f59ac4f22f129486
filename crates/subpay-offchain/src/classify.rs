//! UTxO classification.
//!
//! Decoding failures are values, not errors to propagate: a UTxO whose
//! datum does not decode as the expected schema is simply not of that kind
//! and is excluded from the result set.

use log::warn;
use subpay_types::{AssetClass, DecodeError, LookupError, PlutusSchema, ReadableUtxo, Utxo};

/// Decode an inline datum, if any, as `T`.
pub fn decode_datum<T: PlutusSchema>(raw: Option<&[u8]>) -> Result<T, DecodeError> {
    let raw = raw.ok_or(DecodeError::MissingDatum)?;
    T::from_cbor(raw)
}

pub fn readable<T: PlutusSchema>(utxo: &Utxo) -> Result<ReadableUtxo<T>, DecodeError> {
    Ok(ReadableUtxo {
        out_ref: utxo.out_ref,
        datum: decode_datum(utxo.datum.as_deref())?,
        assets: utxo.value.clone(),
    })
}

/// Decode every UTxO as `T`, keeping the raw UTxO alongside. UTxOs that do
/// not decode are skipped.
pub fn decode_all<T: PlutusSchema>(utxos: &[Utxo]) -> Vec<(Utxo, T)> {
    utxos
        .iter()
        .filter_map(|utxo| match decode_datum::<T>(utxo.datum.as_deref()) {
            Ok(datum) => Some((utxo.clone(), datum)),
            Err(e) => {
                warn!("skipping {}: {}", utxo.out_ref, e);
                None
            }
        })
        .collect()
}

pub fn select_by_predicate<T: Clone>(items: &[T], predicate: impl Fn(&T) -> bool) -> Vec<T> {
    items.iter().filter(|item| predicate(item)).cloned().collect()
}

/// The single UTxO carrying `unit`.
///
/// Zero matches and several matches are both errors: a unique token living
/// in more than one place means chain state violates the protocol.
pub fn find_by_asset_unit<'a>(utxos: &'a [Utxo], unit: &AssetClass) -> Result<&'a Utxo, LookupError> {
    let mut matches = utxos.iter().filter(|u| u.holds(unit));
    let first = matches
        .next()
        .ok_or_else(|| LookupError::NotFound(format!("UTxO holding {}", unit.unit())))?;
    let rest = matches.count();
    if rest > 0 {
        return Err(LookupError::Ambiguous {
            unit: unit.unit(),
            count: rest + 1,
        });
    }
    Ok(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use subpay_types::{Address, AssetName, Network, OutRef, PolicyId, ServiceDatum, TxHash, Value, ScriptHash};

    fn service_datum(is_active: bool) -> ServiceDatum {
        ServiceDatum {
            service_fee: AssetClass::Lovelace,
            service_fee_qty: 10_000_000,
            penalty_fee: AssetClass::Lovelace,
            penalty_fee_qty: 1_000_000,
            interval_length: 2_592_000_000,
            num_intervals: 12,
            minimum_ada: 2_000_000,
            is_active,
        }
    }

    fn make_test_utxo(index: u32, datum: Option<Vec<u8>>, value: Value) -> Utxo {
        Utxo {
            out_ref: OutRef::new(TxHash::new([5; 32]), index),
            address: Address::script(Network::Preview, ScriptHash::new([6; 28])),
            value,
            datum,
        }
    }

    #[test]
    fn test_decode_datum_absent_and_malformed() {
        assert_eq!(decode_datum::<ServiceDatum>(None).unwrap_err(), DecodeError::MissingDatum);
        assert!(decode_datum::<ServiceDatum>(Some(&[0xffu8, 0x00][..])).is_err());
        let raw = service_datum(true).to_cbor();
        assert_eq!(decode_datum::<ServiceDatum>(Some(raw.as_slice())).unwrap(), service_datum(true));
    }

    #[test]
    fn test_decode_all_skips_foreign_datums() {
        let utxos = vec![
            make_test_utxo(0, Some(service_datum(true).to_cbor()), Value::lovelace(1)),
            make_test_utxo(1, None, Value::lovelace(1)),
            make_test_utxo(2, Some(vec![0xd8, 0x79, 0x80]), Value::lovelace(1)),
            make_test_utxo(3, Some(service_datum(false).to_cbor()), Value::lovelace(1)),
        ];
        let decoded = decode_all::<ServiceDatum>(&utxos);
        assert_eq!(decoded.len(), 2);
        let inactive = select_by_predicate(&decoded, |(_, d)| !d.is_active);
        assert_eq!(inactive.len(), 1);
        assert_eq!(inactive[0].0.out_ref.index, 3);
    }

    #[tokio::test]
    async fn test_decode_all_drops_deeply_nested_datums() {
        let mut nested = vec![0x81; 4000];
        nested.push(0x00);
        assert!(decode_datum::<ServiceDatum>(Some(nested.as_slice())).is_err());

        let utxos = vec![
            make_test_utxo(0, Some(nested), Value::lovelace(1)),
            make_test_utxo(1, Some(service_datum(true).to_cbor()), Value::lovelace(1)),
        ];
        let decoded = decode_all::<ServiceDatum>(&utxos);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].0.out_ref.index, 1);
    }

    #[test]
    fn test_find_by_asset_unit_cardinality() {
        let nft = AssetClass::native(PolicyId::new([1; 28]), AssetName::new(vec![9]).unwrap());
        let holding = |i| make_test_utxo(i, None, Value::lovelace(2).with_asset(&nft, 1).unwrap());
        let plain = make_test_utxo(7, None, Value::lovelace(2));

        let one = vec![plain.clone(), holding(1)];
        assert_eq!(find_by_asset_unit(&one, &nft).unwrap().out_ref.index, 1);

        assert!(matches!(
            find_by_asset_unit(&[plain.clone()], &nft),
            Err(LookupError::NotFound(_))
        ));
        assert!(matches!(
            find_by_asset_unit(&[holding(1), plain, holding(2)], &nft),
            Err(LookupError::Ambiguous { count: 2, .. })
        ));
    }

    #[test]
    fn test_readable_view() {
        let utxo = make_test_utxo(4, Some(service_datum(true).to_cbor()), Value::lovelace(3));
        let view: ReadableUtxo<ServiceDatum> = readable(&utxo).unwrap();
        assert_eq!(view.out_ref, utxo.out_ref);
        assert_eq!(view.assets, Value::lovelace(3));
        assert!(view.datum.is_active);
    }
}
