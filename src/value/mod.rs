//! Scalar field values and their order-preserving codecs.
//!
//! Every codec upholds the same contract: for two values `a`, `b` of the
//! same type, `encode(a) < encode(b)` under unsigned byte comparison exactly
//! when `a < b`, encodings are canonical (equal values produce identical
//! bytes), and variable-length encodings are prefix-free and self-delimiting
//! so they stay correctly ordered when further key fields follow.

pub(crate) mod bytes;
pub mod decimal;
pub(crate) mod num;
pub mod time;

pub use decimal::Decimal;
pub use time::{RoundMode, TimeUnit, Timestamp};

use crate::error::{Error, Result};

/// A typed scalar field value.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    /// The NULL / absent marker.
    Null,
    /// Boolean.
    Boolean(bool),
    /// 32-bit signed integer.
    Int32(i32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 32-bit IEEE float.
    Float32(f32),
    /// 64-bit IEEE float.
    Float64(f64),
    /// Arbitrary-precision decimal.
    Decimal(Decimal),
    /// UTF-8 string.
    String(String),
    /// Binary blob (fixed or variable width per the field type).
    Binary(Vec<u8>),
    /// Ordinal of an enumerated type.
    EnumOrdinal(u32),
    /// Calendar timestamp.
    Timestamp(Timestamp),
}

impl ScalarValue {
    /// Whether this value is the NULL marker.
    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null)
    }
}

/// Type metadata a codec needs to encode or decode one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataType {
    /// Boolean.
    Boolean,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 32-bit IEEE float.
    Float32,
    /// 64-bit IEEE float.
    Float64,
    /// Arbitrary-precision decimal.
    Decimal,
    /// UTF-8 string.
    String,
    /// Binary, raw fixed width when `fixed_len` is set, escaped and
    /// terminated otherwise.
    Binary {
        /// Exact width in bytes, if fixed.
        fixed_len: Option<usize>,
    },
    /// Ordinal of an enumerated type.
    EnumOrdinal,
    /// Timestamp with 0..=9 sub-second decimal digits.
    Timestamp {
        /// Number of sub-second digits retained.
        precision: u8,
    },
}

impl DataType {
    /// Whether a non-null value carries this type.
    pub fn matches(&self, value: &ScalarValue) -> bool {
        matches!(
            (self, value),
            (DataType::Boolean, ScalarValue::Boolean(_))
                | (DataType::Int32, ScalarValue::Int32(_))
                | (DataType::Int64, ScalarValue::Int64(_))
                | (DataType::Float32, ScalarValue::Float32(_))
                | (DataType::Float64, ScalarValue::Float64(_))
                | (DataType::Decimal, ScalarValue::Decimal(_))
                | (DataType::String, ScalarValue::String(_))
                | (DataType::Binary { .. }, ScalarValue::Binary(_))
                | (DataType::EnumOrdinal, ScalarValue::EnumOrdinal(_))
                | (DataType::Timestamp { .. }, ScalarValue::Timestamp(_))
        )
    }
}

/// Encodes a non-null scalar into `out`, appending bytes whose unsigned
/// order matches the value order of the type.
pub fn encode_value(value: &ScalarValue, ty: &DataType, out: &mut Vec<u8>) -> Result<()> {
    match (value, ty) {
        (ScalarValue::Boolean(b), DataType::Boolean) => out.push(*b as u8),
        (ScalarValue::Int32(v), DataType::Int32) => num::encode_i32(*v, out),
        (ScalarValue::Int64(v), DataType::Int64) => num::encode_i64(*v, out),
        (ScalarValue::Float32(v), DataType::Float32) => num::encode_f32(*v, out),
        (ScalarValue::Float64(v), DataType::Float64) => num::encode_f64(*v, out),
        (ScalarValue::Decimal(v), DataType::Decimal) => decimal::encode(v, out),
        (ScalarValue::String(v), DataType::String) => bytes::encode_escaped(v.as_bytes(), out),
        (ScalarValue::Binary(v), DataType::Binary { fixed_len }) => match fixed_len {
            Some(len) => bytes::encode_fixed(v, *len, out)?,
            None => bytes::encode_escaped(v, out),
        },
        (ScalarValue::EnumOrdinal(v), DataType::EnumOrdinal) => num::encode_u32(*v, out),
        (ScalarValue::Timestamp(v), DataType::Timestamp { precision }) => {
            time::encode(v, *precision, out)?
        }
        (ScalarValue::Null, _) => {
            return Err(Error::illegal(
                "null values are represented by the key builder, not the scalar codec",
            ))
        }
        (value, ty) => {
            return Err(Error::illegal(format!(
                "value {value:?} does not match field type {ty:?}"
            )))
        }
    }
    Ok(())
}

/// Decodes one scalar from the front of `input`, advancing the cursor past
/// the consumed bytes.
pub fn decode_value(input: &mut &[u8], ty: &DataType) -> Result<ScalarValue> {
    Ok(match ty {
        DataType::Boolean => match num::take_byte(input)? {
            0x00 => ScalarValue::Boolean(false),
            0x01 => ScalarValue::Boolean(true),
            other => {
                return Err(Error::malformed(format!(
                    "invalid boolean byte {other:#04x}"
                )))
            }
        },
        DataType::Int32 => ScalarValue::Int32(num::decode_i32(input)?),
        DataType::Int64 => ScalarValue::Int64(num::decode_i64(input)?),
        DataType::Float32 => ScalarValue::Float32(num::decode_f32(input)?),
        DataType::Float64 => ScalarValue::Float64(num::decode_f64(input)?),
        DataType::Decimal => ScalarValue::Decimal(decimal::decode(input)?),
        DataType::String => {
            let raw = bytes::decode_escaped(input)?;
            ScalarValue::String(String::from_utf8(raw).map_err(|e| {
                Error::malformed(format!("string field is not valid UTF-8: {e}"))
            })?)
        }
        DataType::Binary { fixed_len } => match fixed_len {
            Some(len) => ScalarValue::Binary(num::take(input, *len)?.to_vec()),
            None => ScalarValue::Binary(bytes::decode_escaped(input)?),
        },
        DataType::EnumOrdinal => ScalarValue::EnumOrdinal(num::decode_u32(input)?),
        DataType::Timestamp { .. } => ScalarValue::Timestamp(time::decode(input)?),
    })
}

#[cfg(test)]
pub(crate) mod test_util {
    pub(crate) fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(value: ScalarValue, ty: DataType) -> Vec<u8> {
        let mut out = Vec::new();
        encode_value(&value, &ty, &mut out).unwrap();
        let mut cursor = out.as_slice();
        assert_eq!(decode_value(&mut cursor, &ty).unwrap(), value);
        assert!(cursor.is_empty());
        out
    }

    #[test]
    fn each_type_round_trips() {
        round_trip(ScalarValue::Boolean(true), DataType::Boolean);
        round_trip(ScalarValue::Int32(-42), DataType::Int32);
        round_trip(ScalarValue::Int64(i64::MAX), DataType::Int64);
        round_trip(ScalarValue::Float64(-0.25), DataType::Float64);
        round_trip(
            ScalarValue::Decimal(Decimal::parse("-12.5").unwrap()),
            DataType::Decimal,
        );
        round_trip(
            ScalarValue::String("shard/0".into()),
            DataType::String,
        );
        round_trip(
            ScalarValue::Binary(vec![0x00, 0xFF]),
            DataType::Binary { fixed_len: None },
        );
        round_trip(
            ScalarValue::Binary(vec![1, 2, 3, 4]),
            DataType::Binary {
                fixed_len: Some(4),
            },
        );
        round_trip(ScalarValue::EnumOrdinal(u32::MAX), DataType::EnumOrdinal);
        round_trip(
            ScalarValue::Timestamp(Timestamp::date(2024, 6, 1).unwrap()),
            DataType::Timestamp { precision: 3 },
        );
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let mut out = Vec::new();
        assert!(encode_value(&ScalarValue::Int32(1), &DataType::Int64, &mut out).is_err());
        assert!(encode_value(&ScalarValue::Null, &DataType::Int32, &mut out).is_err());
    }

    #[test]
    fn fixed_binary_width_is_enforced() {
        let mut out = Vec::new();
        assert!(encode_value(
            &ScalarValue::Binary(vec![1, 2, 3]),
            &DataType::Binary { fixed_len: Some(4) },
            &mut out
        )
        .is_err());
    }
}
