//! The per-shard sorted-range primitive and an in-memory shard.

use std::{ops::Bound, pin::Pin, sync::Arc};

use async_stream::stream;
use crossbeam_skiplist::SkipMap;
use futures_core::Stream;
use thiserror::Error;

use crate::key::EncodedKey;

/// Failure of a shard or one of its cursors.
#[derive(Debug, Error)]
pub enum ShardError {
    /// The shard cannot serve requests at all.
    #[error("shard {shard} unavailable: {reason}")]
    Unavailable {
        /// Identifier of the failing shard.
        shard: u32,
        /// Why the shard is unavailable.
        reason: String,
    },
    /// An open cursor failed mid-scan.
    #[error("shard cursor failed: {0}")]
    Cursor(String),
}

/// Half-open byte range a shard cursor covers.
#[derive(Debug, Clone)]
pub struct ByteRange {
    /// Lower bound.
    pub start: Bound<EncodedKey>,
    /// Upper bound.
    pub end: Bound<EncodedKey>,
}

impl ByteRange {
    /// The unbounded range.
    pub fn all() -> Self {
        ByteRange {
            start: Bound::Unbounded,
            end: Bound::Unbounded,
        }
    }

    /// Whether `key` lies within the range.
    pub fn contains(&self, key: &[u8]) -> bool {
        self.above_start(key) && self.below_end(key)
    }

    pub(crate) fn above_start(&self, key: &[u8]) -> bool {
        match &self.start {
            Bound::Unbounded => true,
            Bound::Included(s) => key >= s.as_bytes(),
            Bound::Excluded(s) => key > s.as_bytes(),
        }
    }

    pub(crate) fn below_end(&self, key: &[u8]) -> bool {
        match &self.end {
            Bound::Unbounded => true,
            Bound::Included(e) => key <= e.as_bytes(),
            Bound::Excluded(e) => key < e.as_bytes(),
        }
    }

    fn start_bound(&self) -> Bound<&[u8]> {
        as_byte_bound(&self.start)
    }

    fn end_bound(&self) -> Bound<&[u8]> {
        as_byte_bound(&self.end)
    }
}

fn as_byte_bound(bound: &Bound<EncodedKey>) -> Bound<&[u8]> {
    match bound {
        Bound::Unbounded => Bound::Unbounded,
        Bound::Included(k) => Bound::Included(k.as_bytes()),
        Bound::Excluded(k) => Bound::Excluded(k.as_bytes()),
    }
}

/// Order in which one shard cursor walks its range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDirection {
    /// Ascending byte order.
    Forward,
    /// Descending byte order.
    Reverse,
}

/// An open shard cursor: ordered key/value pairs or a terminal error.
pub type ShardStream =
    Pin<Box<dyn Stream<Item = Result<(EncodedKey, Vec<u8>), ShardError>> + Send + 'static>>;

/// The sorted-range primitive every shard implementation provides.
pub trait ShardReader: Send + Sync + 'static {
    /// Opens a cursor over `range`, fetching `batch_size` pairs per
    /// round-trip, ordered per `direction`.
    fn scan(
        self: Arc<Self>,
        range: ByteRange,
        direction: ScanDirection,
        batch_size: usize,
    ) -> ShardStream;
}

/// An in-memory shard over a lock-free skip map.
#[derive(Debug)]
pub struct MemShard {
    id: u32,
    data: SkipMap<Vec<u8>, Vec<u8>>,
}

impl MemShard {
    /// An empty shard with the given identifier.
    pub fn new(id: u32) -> Self {
        MemShard {
            id,
            data: SkipMap::new(),
        }
    }

    /// The shard identifier.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Inserts or replaces one entry.
    pub fn insert(&self, key: &EncodedKey, value: Vec<u8>) {
        self.data.insert(key.as_bytes().to_vec(), value);
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the shard holds no entries.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl ShardReader for MemShard {
    fn scan(
        self: Arc<Self>,
        range: ByteRange,
        direction: ScanDirection,
        batch_size: usize,
    ) -> ShardStream {
        Box::pin(stream! {
            let mut resume: Option<Vec<u8>> = None;
            loop {
                // Entries borrow the map, so each batch is collected before
                // anything is yielded and the walk reseeks from the last
                // key afterwards.
                let mut batch: Vec<(Vec<u8>, Vec<u8>)> = Vec::with_capacity(batch_size);
                {
                    let mut cursor = match (direction, &resume) {
                        (ScanDirection::Forward, None) => {
                            self.data.lower_bound(range.start_bound())
                        }
                        (ScanDirection::Forward, Some(last)) => {
                            self.data.lower_bound(Bound::Excluded(last.as_slice()))
                        }
                        (ScanDirection::Reverse, None) => {
                            self.data.upper_bound(range.end_bound())
                        }
                        (ScanDirection::Reverse, Some(last)) => {
                            self.data.upper_bound(Bound::Excluded(last.as_slice()))
                        }
                    };
                    while batch.len() < batch_size {
                        let Some(entry) = cursor else { break };
                        let in_range = match direction {
                            ScanDirection::Forward => range.below_end(entry.key()),
                            ScanDirection::Reverse => range.above_start(entry.key()),
                        };
                        if !in_range {
                            break;
                        }
                        batch.push((entry.key().clone(), entry.value().clone()));
                        cursor = match direction {
                            ScanDirection::Forward => entry.next(),
                            ScanDirection::Reverse => entry.prev(),
                        };
                    }
                }
                if batch.is_empty() {
                    break;
                }
                let full = batch.len() == batch_size;
                resume = Some(batch.last().map(|(k, _)| k.clone()).unwrap_or_default());
                for (key, value) in batch {
                    yield Ok((EncodedKey::from_bytes(key), value));
                }
                if !full {
                    break;
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn populated() -> Arc<MemShard> {
        let shard = MemShard::new(0);
        for i in 0u8..10 {
            shard.insert(&EncodedKey::from_bytes(vec![i]), vec![i, i]);
        }
        Arc::new(shard)
    }

    async fn collect_keys(stream: ShardStream) -> Vec<Vec<u8>> {
        stream
            .map(|item| item.unwrap().0.as_bytes().to_vec())
            .collect()
            .await
    }

    #[tokio::test]
    async fn forward_scan_walks_batches_in_order() {
        let keys = collect_keys(populated().scan(ByteRange::all(), ScanDirection::Forward, 3)).await;
        assert_eq!(keys, (0u8..10).map(|i| vec![i]).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn reverse_scan_walks_batches_in_reverse_order() {
        let keys = collect_keys(populated().scan(ByteRange::all(), ScanDirection::Reverse, 4)).await;
        assert_eq!(keys, (0u8..10).rev().map(|i| vec![i]).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn bounds_are_respected() {
        let range = ByteRange {
            start: Bound::Included(EncodedKey::from_bytes(vec![3])),
            end: Bound::Excluded(EncodedKey::from_bytes(vec![7])),
        };
        let keys = collect_keys(populated().scan(range.clone(), ScanDirection::Forward, 2)).await;
        assert_eq!(keys, vec![vec![3], vec![4], vec![5], vec![6]]);

        let keys = collect_keys(populated().scan(range, ScanDirection::Reverse, 2)).await;
        assert_eq!(keys, vec![vec![6], vec![5], vec![4], vec![3]]);
    }

    #[tokio::test]
    async fn empty_range_yields_nothing() {
        let range = ByteRange {
            start: Bound::Included(EncodedKey::from_bytes(vec![20])),
            end: Bound::Unbounded,
        };
        let keys = collect_keys(populated().scan(range, ScanDirection::Forward, 8)).await;
        assert!(keys.is_empty());
    }
}
