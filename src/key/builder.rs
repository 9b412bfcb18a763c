use std::sync::Arc;

use crate::{
    error::{Error, Result},
    index::{IndexDefinition, IndexField, SortOrder, SpecialValues},
    key::EncodedKey,
    value::{decode_value, encode_value, ScalarValue},
};

/// Presence indicator preceding a nullable field's cell. Sorts between the
/// null-first and null-last markers so non-null values land in the middle.
pub(crate) const PRESENT: u8 = 0x01;
const NULL_FIRST: u8 = 0x00;
const NULL_LAST: u8 = 0xFF;

/// A field value as supplied to [`KeyBuilder::build`].
#[derive(Debug, Clone)]
pub enum FieldValue {
    /// A single value, possibly [`ScalarValue::Null`].
    Value(ScalarValue),
    /// Multiple values resolved through an array/map path. Only valid for
    /// the multi-key field of a multi-key index; produces one key per
    /// distinct element.
    Many(Vec<ScalarValue>),
    /// The path did not resolve to a value. Treated as NULL.
    Missing,
}

/// Composes per-field codecs into composite keys for one index.
#[derive(Debug, Clone)]
pub struct KeyBuilder {
    index: Arc<IndexDefinition>,
}

impl KeyBuilder {
    /// A builder for the given index definition.
    pub fn new(index: Arc<IndexDefinition>) -> Self {
        KeyBuilder { index }
    }

    /// The definition this builder encodes for.
    pub fn index(&self) -> &Arc<IndexDefinition> {
        &self.index
    }

    /// Builds the keys a record contributes to this index.
    ///
    /// `values` must list every declared field, in declared order. Returns
    /// an empty vector when the index cannot represent the record (a NULL
    /// key field on an index without special-value support). Returns more
    /// than one key only for multi-key indexes, one per distinct element.
    pub fn build(&self, values: &[(&str, FieldValue)]) -> Result<Vec<EncodedKey>> {
        let fields = &self.index.fields;
        if fields.len() > 64 {
            return Err(Error::illegal(format!(
                "index {} declares {} fields, at most 64 are supported",
                self.index.name,
                fields.len()
            )));
        }
        if values.len() != fields.len() {
            return Err(Error::illegal(format!(
                "index {} declares {} fields but {} were supplied",
                self.index.name,
                fields.len(),
                values.len()
            )));
        }

        // Normalize each supplied value into the candidate list for its
        // declared position, rejecting gaps and reordering as we go.
        let mut candidates: Vec<Vec<ScalarValue>> = Vec::with_capacity(fields.len());
        let mut fan_out_at = None;
        for (position, ((path, value), field)) in values.iter().zip(fields).enumerate() {
            if *path != field.path {
                return Err(Error::illegal(format!(
                    "expected field `{}` at position {position} of index {}, got `{path}`",
                    field.path, self.index.name
                )));
            }
            let list = match value {
                FieldValue::Value(v) => vec![v.clone()],
                FieldValue::Missing => vec![ScalarValue::Null],
                FieldValue::Many(elements) => {
                    if !self.index.multi_key {
                        return Err(Error::illegal(format!(
                            "field `{path}` supplied multiple values but index {} is not multi-key",
                            self.index.name
                        )));
                    }
                    if fan_out_at.is_some() {
                        return Err(Error::illegal(format!(
                            "index {} may fan out over at most one field",
                            self.index.name
                        )));
                    }
                    fan_out_at = Some(position);
                    if elements.is_empty() {
                        // An empty collection indexes as a single NULL
                        // component, matching an absent path.
                        vec![ScalarValue::Null]
                    } else {
                        elements.clone()
                    }
                }
            };
            candidates.push(list);
        }

        let fan_out_at = fan_out_at.unwrap_or(0);
        let mut keys: Vec<EncodedKey> = Vec::new();
        'candidate: for element in &candidates[fan_out_at] {
            let mut bytes = Vec::new();
            let mut null_bitmap = 0u64;
            for (position, field) in fields.iter().enumerate() {
                let value = if position == fan_out_at {
                    element
                } else {
                    &candidates[position][0]
                };
                if value.is_null() {
                    if self.index.special_values == SpecialValues::Unsupported {
                        // The index cannot represent this record; skip the
                        // key rather than fail the write.
                        continue 'candidate;
                    }
                    if !field.nullable {
                        return Err(Error::illegal(format!(
                            "field `{}` of index {} is not nullable",
                            field.path, self.index.name
                        )));
                    }
                    null_bitmap |= 1 << position;
                }
                encode_cell(field, self.index.special_values, value, &mut bytes)?;
            }
            let key = EncodedKey::new(bytes, fields.len() as u16, null_bitmap);
            // Structural duplicates from the fan-out collection collapse to
            // one key per record.
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    /// Builds the keys as stored: for a non-unique index every key carries
    /// the record's primary key as a suffix so duplicate index keys stay
    /// distinct and tie-break deterministically.
    pub fn build_entries(
        &self,
        values: &[(&str, FieldValue)],
        record_key: &EncodedKey,
    ) -> Result<Vec<EncodedKey>> {
        let mut keys = self.build(values)?;
        if !self.index.unique {
            for key in &mut keys {
                *key = key.concat(record_key.as_bytes());
            }
        }
        Ok(keys)
    }

    /// Decodes a stored key back into its field values.
    ///
    /// For a unique index the key must be consumed exactly; for a non-unique
    /// index trailing bytes are the record-key suffix and are left alone.
    pub fn decode(&self, key: &EncodedKey) -> Result<Vec<ScalarValue>> {
        let mut input = key.as_bytes();
        let mut out = Vec::with_capacity(self.index.fields.len());
        for field in &self.index.fields {
            out.push(decode_cell(field, self.index.special_values, &mut input)?);
        }
        if self.index.unique && !input.is_empty() {
            return Err(Error::NotFound(format!(
                "{} trailing bytes after the last field of unique index {}",
                input.len(),
                self.index.name
            )));
        }
        Ok(out)
    }
}

/// Encodes one field cell (presence indicator where applicable, then the
/// value bytes) into `out`, complementing the whole cell for descending
/// fields so byte order reverses.
pub(crate) fn encode_cell(
    field: &IndexField,
    special: SpecialValues,
    value: &ScalarValue,
    out: &mut Vec<u8>,
) -> Result<()> {
    let cell_start = out.len();
    if value.is_null() {
        match special {
            SpecialValues::Unsupported => {
                return Err(Error::illegal(format!(
                    "field `{}` cannot hold NULL in an index without special-value support",
                    field.path
                )))
            }
            SpecialValues::SortsFirst => out.push(NULL_FIRST),
            SpecialValues::SortsLast => out.push(NULL_LAST),
        }
    } else {
        if !field.data_type.matches(value) {
            return Err(Error::illegal(format!(
                "value {value:?} does not match type {:?} of field `{}`",
                field.data_type, field.path
            )));
        }
        if field.nullable && special != SpecialValues::Unsupported {
            out.push(PRESENT);
        }
        encode_value(value, &field.data_type, out)?;
    }
    if field.order == SortOrder::Descending {
        for byte in &mut out[cell_start..] {
            *byte = !*byte;
        }
    }
    Ok(())
}

/// Decodes one field cell from the front of `input`.
fn decode_cell(
    field: &IndexField,
    special: SpecialValues,
    input: &mut &[u8],
) -> Result<ScalarValue> {
    if field.order == SortOrder::Descending {
        // Complemented cells decode from a complemented copy; the consumed
        // length tells us how far to advance the real cursor.
        let inverted: Vec<u8> = input.iter().map(|b| !b).collect();
        let mut cursor = inverted.as_slice();
        let value = decode_cell_ascending(field, special, &mut cursor)?;
        let consumed = inverted.len() - cursor.len();
        *input = &input[consumed..];
        return Ok(value);
    }
    decode_cell_ascending(field, special, input)
}

fn decode_cell_ascending(
    field: &IndexField,
    special: SpecialValues,
    input: &mut &[u8],
) -> Result<ScalarValue> {
    if field.nullable && special != SpecialValues::Unsupported {
        let indicator = crate::value::num::take_byte(input)?;
        match indicator {
            PRESENT => {}
            NULL_FIRST | NULL_LAST => return Ok(ScalarValue::Null),
            other => {
                return Err(Error::malformed(format!(
                    "invalid presence indicator {other:#04x} for field `{}`",
                    field.path
                )))
            }
        }
    }
    decode_value(input, &field.data_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::DataType;

    fn two_field_index() -> IndexDefinition {
        IndexDefinition::new(
            "orders_by_region",
            vec![
                IndexField::new("region", DataType::String),
                IndexField::new("amount", DataType::Int64),
            ],
        )
    }

    fn build_one(builder: &KeyBuilder, values: &[(&str, FieldValue)]) -> EncodedKey {
        let mut keys = builder.build(values).unwrap();
        assert_eq!(keys.len(), 1);
        keys.pop().unwrap()
    }

    #[test]
    fn build_then_decode_round_trips() {
        let builder = KeyBuilder::new(Arc::new(two_field_index()));
        let key = build_one(
            &builder,
            &[
                ("region", FieldValue::Value(ScalarValue::String("eu".into()))),
                ("amount", FieldValue::Value(ScalarValue::Int64(42))),
            ],
        );
        assert_eq!(key.field_count(), 2);
        assert!(!key.is_null(0));
        assert_eq!(
            builder.decode(&key).unwrap(),
            vec![
                ScalarValue::String("eu".into()),
                ScalarValue::Int64(42),
            ]
        );
    }

    #[test]
    fn keys_sort_by_declared_field_order() {
        let builder = KeyBuilder::new(Arc::new(two_field_index()));
        let make = |region: &str, amount: i64| {
            build_one(
                &builder,
                &[
                    (
                        "region",
                        FieldValue::Value(ScalarValue::String(region.into())),
                    ),
                    ("amount", FieldValue::Value(ScalarValue::Int64(amount))),
                ],
            )
        };
        assert!(make("eu", 9) < make("eu", 10));
        assert!(make("eu", 1000) < make("us", -5));
    }

    #[test]
    fn out_of_order_fields_are_rejected() {
        let builder = KeyBuilder::new(Arc::new(two_field_index()));
        let err = builder
            .build(&[
                ("amount", FieldValue::Value(ScalarValue::Int64(1))),
                ("region", FieldValue::Value(ScalarValue::String("eu".into()))),
            ])
            .unwrap_err();
        assert!(matches!(err, Error::IllegalKeySpecification(_)));
    }

    #[test]
    fn incomplete_field_list_is_rejected() {
        let builder = KeyBuilder::new(Arc::new(two_field_index()));
        let err = builder
            .build(&[("region", FieldValue::Value(ScalarValue::String("eu".into())))])
            .unwrap_err();
        assert!(matches!(err, Error::IllegalKeySpecification(_)));
    }

    #[test]
    fn null_on_unsupported_index_omits_the_row() {
        let builder = KeyBuilder::new(Arc::new(two_field_index()));
        let keys = builder
            .build(&[
                ("region", FieldValue::Value(ScalarValue::Null)),
                ("amount", FieldValue::Value(ScalarValue::Int64(1))),
            ])
            .unwrap();
        assert!(keys.is_empty());

        let keys = builder
            .build(&[
                ("region", FieldValue::Missing),
                ("amount", FieldValue::Value(ScalarValue::Int64(1))),
            ])
            .unwrap();
        assert!(keys.is_empty());
    }

    #[test]
    fn null_placement_follows_index_configuration() {
        let first = IndexDefinition::new(
            "by_score_nulls_first",
            vec![IndexField::new("score", DataType::Int32).nullable()],
        )
        .special_values(SpecialValues::SortsFirst);
        let last = IndexDefinition::new(
            "by_score_nulls_last",
            vec![IndexField::new("score", DataType::Int32).nullable()],
        )
        .special_values(SpecialValues::SortsLast);

        for (index, null_sorts_first) in [(first, true), (last, false)] {
            let builder = KeyBuilder::new(Arc::new(index));
            let null_key =
                build_one(&builder, &[("score", FieldValue::Value(ScalarValue::Null))]);
            let min_key = build_one(
                &builder,
                &[("score", FieldValue::Value(ScalarValue::Int32(i32::MIN)))],
            );
            let max_key = build_one(
                &builder,
                &[("score", FieldValue::Value(ScalarValue::Int32(i32::MAX)))],
            );
            assert!(null_key.is_null(0));
            assert_eq!(builder.decode(&null_key).unwrap(), vec![ScalarValue::Null]);
            if null_sorts_first {
                assert!(null_key < min_key);
            } else {
                assert!(null_key > max_key);
            }
        }
    }

    #[test]
    fn null_for_non_nullable_field_is_rejected() {
        let index = IndexDefinition::new(
            "by_score",
            vec![IndexField::new("score", DataType::Int32)],
        )
        .special_values(SpecialValues::SortsFirst);
        let builder = KeyBuilder::new(Arc::new(index));
        let err = builder
            .build(&[("score", FieldValue::Value(ScalarValue::Null))])
            .unwrap_err();
        assert!(matches!(err, Error::IllegalKeySpecification(_)));
    }

    #[test]
    fn descending_field_reverses_byte_order() {
        let index = IndexDefinition::new(
            "by_amount_desc",
            vec![IndexField::new("amount", DataType::Int64).descending()],
        );
        let builder = KeyBuilder::new(Arc::new(index));
        let low = build_one(
            &builder,
            &[("amount", FieldValue::Value(ScalarValue::Int64(1)))],
        );
        let high = build_one(
            &builder,
            &[("amount", FieldValue::Value(ScalarValue::Int64(2)))],
        );
        assert!(high < low);
        assert_eq!(builder.decode(&low).unwrap(), vec![ScalarValue::Int64(1)]);
    }

    #[test]
    fn multi_key_fans_out_and_deduplicates() {
        let index = IndexDefinition::new(
            "by_tag",
            vec![
                IndexField::new("tag", DataType::String),
                IndexField::new("rank", DataType::Int32),
            ],
        )
        .multi_key();
        let builder = KeyBuilder::new(Arc::new(index));
        let keys = builder
            .build(&[
                (
                    "tag",
                    FieldValue::Many(vec![
                        ScalarValue::String("a".into()),
                        ScalarValue::String("b".into()),
                        ScalarValue::String("a".into()),
                    ]),
                ),
                ("rank", FieldValue::Value(ScalarValue::Int32(7))),
            ])
            .unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(
            builder.decode(&keys[0]).unwrap()[0],
            ScalarValue::String("a".into())
        );
        assert_eq!(
            builder.decode(&keys[1]).unwrap()[0],
            ScalarValue::String("b".into())
        );
    }

    #[test]
    fn empty_fan_out_indexes_as_null() {
        let index = IndexDefinition::new(
            "by_tag",
            vec![IndexField::new("tag", DataType::String).nullable()],
        )
        .multi_key()
        .special_values(SpecialValues::SortsFirst);
        let builder = KeyBuilder::new(Arc::new(index));
        let keys = builder
            .build(&[("tag", FieldValue::Many(vec![]))])
            .unwrap();
        assert_eq!(keys.len(), 1);
        assert!(keys[0].is_null(0));
    }

    #[test]
    fn many_on_single_key_index_is_rejected() {
        let builder = KeyBuilder::new(Arc::new(two_field_index()));
        let err = builder
            .build(&[
                (
                    "region",
                    FieldValue::Many(vec![ScalarValue::String("eu".into())]),
                ),
                ("amount", FieldValue::Value(ScalarValue::Int64(1))),
            ])
            .unwrap_err();
        assert!(matches!(err, Error::IllegalKeySpecification(_)));
    }

    #[test]
    fn non_unique_entries_carry_the_record_key() {
        let index = two_field_index().non_unique();
        let builder = KeyBuilder::new(Arc::new(index));
        let record_key = EncodedKey::from_bytes(vec![0x00, 0x2A]);
        let values = [
            (
                "region",
                FieldValue::Value(ScalarValue::String("eu".into())),
            ),
            ("amount", FieldValue::Value(ScalarValue::Int64(42))),
        ];
        let plain = builder.build(&values).unwrap();
        let stored = builder.build_entries(&values, &record_key).unwrap();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].as_bytes().starts_with(plain[0].as_bytes()));
        assert!(stored[0].as_bytes().ends_with(record_key.as_bytes()));
        // Decoding tolerates the suffix on a non-unique index.
        assert_eq!(
            builder.decode(&stored[0]).unwrap(),
            vec![
                ScalarValue::String("eu".into()),
                ScalarValue::Int64(42),
            ]
        );
    }

    #[test]
    fn unique_decode_rejects_trailing_bytes() {
        let builder = KeyBuilder::new(Arc::new(two_field_index()));
        let key = build_one(
            &builder,
            &[
                ("region", FieldValue::Value(ScalarValue::String("eu".into()))),
                ("amount", FieldValue::Value(ScalarValue::Int64(42))),
            ],
        );
        let mut bytes = key.as_bytes().to_vec();
        bytes.push(0x00);
        let err = builder
            .decode(&EncodedKey::from_bytes(bytes))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
