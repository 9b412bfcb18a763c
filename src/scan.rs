//! Scan specifications and the planner that turns them into byte ranges.

use std::{ops::Bound, sync::Arc};

use crate::{
    error::{Error, Result},
    index::{IndexDefinition, SortOrder, SpecialValues},
    key::{next_up, EncodedKey, KeyBuilder, PRESENT},
    value::ScalarValue,
};

/// Iteration order of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Ascending key order across all shards.
    Forward,
    /// Descending key order across all shards.
    Reverse,
    /// Per-shard order only; shards are drained one after another without
    /// merging.
    Unordered,
}

/// A bound on the first key field left unset by the scan prefix.
#[derive(Debug, Clone)]
pub struct FieldRange {
    /// Path of the field the range applies to.
    pub path: String,
    /// Lower bound value and whether it is inclusive.
    pub start: Option<(ScalarValue, bool)>,
    /// Upper bound value and whether it is inclusive.
    pub end: Option<(ScalarValue, bool)>,
}

impl FieldRange {
    /// An unbounded range over `path`.
    pub fn over(path: impl Into<String>) -> Self {
        FieldRange {
            path: path.into(),
            start: None,
            end: None,
        }
    }

    /// Sets the lower bound.
    pub fn start_at(mut self, value: ScalarValue, inclusive: bool) -> Self {
        self.start = Some((value, inclusive));
        self
    }

    /// Sets the upper bound.
    pub fn end_at(mut self, value: ScalarValue, inclusive: bool) -> Self {
        self.end = Some((value, inclusive));
        self
    }
}

/// What to scan: an index, a leading run of fixed field values, an optional
/// range on the next field, direction, resume point and batch size.
#[derive(Debug, Clone)]
pub struct ScanSpec {
    /// Name of the index to scan.
    pub index: String,
    /// Fixed values for a contiguous leading run of key fields.
    pub prefix: Vec<(String, ScalarValue)>,
    /// Range over the first field after the prefix.
    pub range: Option<FieldRange>,
    /// Iteration order.
    pub direction: Direction,
    /// Restart strictly after (forward) or before (reverse) this key.
    pub resume_key: Option<EncodedKey>,
    /// Per-shard fetch granularity. Must be non-zero.
    pub batch_size: usize,
}

impl ScanSpec {
    /// A full forward scan of `index` with the default batch size.
    pub fn new(index: impl Into<String>) -> Self {
        ScanSpec {
            index: index.into(),
            prefix: Vec::new(),
            range: None,
            direction: Direction::Forward,
            resume_key: None,
            batch_size: 256,
        }
    }

    /// Fixes the next prefix field to `value`.
    pub fn with_prefix_field(mut self, path: impl Into<String>, value: ScalarValue) -> Self {
        self.prefix.push((path.into(), value));
        self
    }

    /// Attaches a range to the first unset field.
    pub fn with_range(mut self, range: FieldRange) -> Self {
        self.range = Some(range);
        self
    }

    /// Sets the iteration order.
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Resumes the scan at a previously returned key.
    pub fn with_resume_key(mut self, key: EncodedKey) -> Self {
        self.resume_key = Some(key);
        self
    }

    /// Sets the per-shard fetch granularity.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }
}

/// A planned scan: half-open byte bounds plus the iteration order.
#[derive(Debug, Clone)]
pub struct ScanBounds {
    /// Lower byte bound.
    pub start: Bound<EncodedKey>,
    /// Upper byte bound.
    pub end: Bound<EncodedKey>,
    /// Iteration order.
    pub direction: Direction,
}

impl ScanBounds {
    fn empty(direction: Direction) -> Self {
        ScanBounds {
            start: Bound::Unbounded,
            end: Bound::Excluded(EncodedKey::from_bytes(Vec::new())),
            direction,
        }
    }

    /// Whether the bounds provably select no keys.
    pub fn is_empty(&self) -> bool {
        let start = match &self.start {
            Bound::Unbounded => &[][..],
            Bound::Included(k) | Bound::Excluded(k) => k.as_bytes(),
        };
        match &self.end {
            Bound::Unbounded => false,
            Bound::Excluded(k) => k.as_bytes() <= start,
            Bound::Included(k) => k.as_bytes() < start,
        }
    }
}

/// Validates scan specifications and translates them into byte bounds.
#[derive(Debug, Clone)]
pub struct Planner {
    index: Arc<IndexDefinition>,
    builder: KeyBuilder,
}

impl Planner {
    /// A planner for the given index definition.
    pub fn new(index: Arc<IndexDefinition>) -> Self {
        let builder = KeyBuilder::new(index.clone());
        Planner { index, builder }
    }

    /// Checks the spec's shape without encoding anything: contiguous prefix,
    /// correctly attached range, resume key of the right shape.
    pub fn validate(&self, spec: &ScanSpec) -> Result<()> {
        if spec.batch_size == 0 {
            return Err(Error::illegal("batch size must be non-zero"));
        }
        let fields = &self.index.fields;
        if spec.prefix.len() > fields.len() {
            return Err(Error::illegal(format!(
                "{} prefix fields supplied but index {} declares only {}",
                spec.prefix.len(),
                self.index.name,
                fields.len()
            )));
        }
        for (position, (path, _)) in spec.prefix.iter().enumerate() {
            if *path != fields[position].path {
                return Err(Error::illegal(format!(
                    "expected field `{}` at position {position} of index {}, got `{path}`",
                    fields[position].path, self.index.name
                )));
            }
        }
        if let Some(range) = &spec.range {
            match fields.get(spec.prefix.len()) {
                None => {
                    return Err(Error::illegal(format!(
                        "range on `{}` but the key of index {} is already complete",
                        range.path, self.index.name
                    )))
                }
                Some(field) if field.path != range.path => {
                    return Err(Error::illegal(format!(
                        "range must apply to the first unset field `{}` of index {}, got `{}`",
                        field.path, self.index.name, range.path
                    )))
                }
                Some(_) => {}
            }
        }
        if let Some(resume) = &spec.resume_key {
            if spec.direction == Direction::Unordered {
                return Err(Error::illegal(
                    "unordered scans produce no resumable order",
                ));
            }
            // The resume key must decode against this index before any
            // shard is contacted.
            self.builder.decode(resume).map_err(|e| {
                Error::illegal(format!(
                    "resume key does not match the shape of index {}: {e}",
                    self.index.name
                ))
            })?;
        }
        Ok(())
    }

    /// Plans the spec into half-open byte bounds.
    pub fn plan(&self, spec: &ScanSpec) -> Result<ScanBounds> {
        self.validate(spec)?;

        let mut prefix = Vec::new();
        for (position, (_, value)) in spec.prefix.iter().enumerate() {
            self.encode_bound_cell(position, value, &mut prefix)?;
        }

        let (mut start, mut end) = match &spec.range {
            None => (prefix_start(&prefix), prefix_end(&prefix)),
            Some(range) => {
                let position = spec.prefix.len();
                let field = &self.index.fields[position];
                // A descending field stores complemented cells, so the
                // semantic lower bound becomes the byte upper bound.
                let descending = field.order == SortOrder::Descending;
                let (low, high) = if descending {
                    (range.end.as_ref(), range.start.as_ref())
                } else {
                    (range.start.as_ref(), range.end.as_ref())
                };

                // A range predicate never matches NULL. On a nullable field
                // every non-null cell starts with the presence indicator, so
                // an open side clamps to the indicator byte and the null
                // groups on either end of the field stay outside the bounds.
                let nullable =
                    field.nullable && self.index.special_values != SpecialValues::Unsupported;
                let indicator = if descending { !PRESENT } else { PRESENT };

                let start = match low {
                    None if nullable => {
                        let mut bytes = prefix.clone();
                        bytes.push(indicator);
                        Bound::Included(EncodedKey::from_bytes(bytes))
                    }
                    None => prefix_start(&prefix),
                    Some((value, inclusive)) => {
                        let mut bytes = prefix.clone();
                        self.encode_bound_cell(position, value, &mut bytes)?;
                        if *inclusive {
                            Bound::Included(EncodedKey::from_bytes(bytes))
                        } else {
                            // Cell encodings are prefix-free, so the prefix
                            // successor is the tightest exclusive bound even
                            // with further fields or a record-key suffix
                            // behind the cell.
                            match next_up(&bytes) {
                                Some(successor) => {
                                    Bound::Included(EncodedKey::from_bytes(successor))
                                }
                                None => return Ok(ScanBounds::empty(spec.direction)),
                            }
                        }
                    }
                };
                let end = match high {
                    None if nullable => {
                        let mut bytes = prefix.clone();
                        bytes.push(indicator);
                        prefix_end(&bytes)
                    }
                    None => prefix_end(&prefix),
                    Some((value, inclusive)) => {
                        let mut bytes = prefix.clone();
                        self.encode_bound_cell(position, value, &mut bytes)?;
                        if *inclusive {
                            // No successor exists past the greatest encoding
                            // of the type; the range is simply unbounded
                            // above.
                            match next_up(&bytes) {
                                Some(successor) => {
                                    Bound::Excluded(EncodedKey::from_bytes(successor))
                                }
                                None => Bound::Unbounded,
                            }
                        } else {
                            Bound::Excluded(EncodedKey::from_bytes(bytes))
                        }
                    }
                };
                (start, end)
            }
        };

        // A resume key only ever narrows the planned bounds. One lying
        // outside them leaves the planned bound in place instead of widening
        // the scan past what the spec asked for.
        if let Some(resume) = &spec.resume_key {
            match spec.direction {
                Direction::Forward => {
                    let tightens = match &start {
                        Bound::Unbounded => true,
                        Bound::Included(s) | Bound::Excluded(s) => {
                            resume.as_bytes() >= s.as_bytes()
                        }
                    };
                    if tightens {
                        start = Bound::Excluded(resume.clone());
                    }
                }
                Direction::Reverse => {
                    let tightens = match &end {
                        Bound::Unbounded => true,
                        Bound::Included(e) | Bound::Excluded(e) => {
                            resume.as_bytes() <= e.as_bytes()
                        }
                    };
                    if tightens {
                        end = Bound::Excluded(resume.clone());
                    }
                }
                Direction::Unordered => unreachable!("rejected by validate"),
            }
        }

        Ok(ScanBounds {
            start,
            end,
            direction: spec.direction,
        })
    }

    fn encode_bound_cell(
        &self,
        position: usize,
        value: &ScalarValue,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        crate::key::encode_cell(
            &self.index.fields[position],
            self.index.special_values,
            value,
            out,
        )
    }
}

fn prefix_start(prefix: &[u8]) -> Bound<EncodedKey> {
    if prefix.is_empty() {
        Bound::Unbounded
    } else {
        Bound::Included(EncodedKey::from_bytes(prefix.to_vec()))
    }
}

fn prefix_end(prefix: &[u8]) -> Bound<EncodedKey> {
    match next_up(prefix) {
        Some(successor) => Bound::Excluded(EncodedKey::from_bytes(successor)),
        None => Bound::Unbounded,
    }
}
