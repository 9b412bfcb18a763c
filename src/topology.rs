//! Shard topology: which shards exist, what key space each covers, and a
//! version token that lets open scans detect structural change.

use std::{
    fmt,
    sync::{Arc, PoisonError, RwLock},
};

use crate::{
    key::EncodedKey,
    shard::{ByteRange, ShardReader},
};

/// Identifies one structural state of the topology. Two tokens compare
/// equal exactly when no shard was added, removed or re-scoped in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VersionToken(
    /// The raw version counter.
    pub u64,
);

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// The key span one shard is responsible for. `None` on either side means
/// open-ended.
#[derive(Debug, Clone, Default)]
pub struct ShardScope {
    /// Smallest key the shard may hold.
    pub min: Option<EncodedKey>,
    /// Largest key the shard may hold.
    pub max: Option<EncodedKey>,
}

impl ShardScope {
    /// A scope covering the whole key space.
    pub fn all() -> Self {
        ShardScope::default()
    }

    /// A scope bounded on both sides (inclusive).
    pub fn between(min: EncodedKey, max: EncodedKey) -> Self {
        ShardScope {
            min: Some(min),
            max: Some(max),
        }
    }

    /// Whether any key of `range` can fall within this scope. Conservative:
    /// open-ended sides always overlap.
    pub fn meets_range(&self, range: &ByteRange) -> bool {
        if let Some(min) = &self.min {
            let range_ends_below = match &range.end {
                std::ops::Bound::Unbounded => false,
                std::ops::Bound::Included(e) => e.as_bytes() < min.as_bytes(),
                std::ops::Bound::Excluded(e) => e.as_bytes() <= min.as_bytes(),
            };
            if range_ends_below {
                return false;
            }
        }
        if let Some(max) = &self.max {
            let range_starts_above = match &range.start {
                std::ops::Bound::Unbounded => false,
                std::ops::Bound::Included(s) => s.as_bytes() > max.as_bytes(),
                std::ops::Bound::Excluded(s) => s.as_bytes() >= max.as_bytes(),
            };
            if range_starts_above {
                return false;
            }
        }
        true
    }
}

/// One routable shard: identifier, covered scope and its reader.
#[derive(Clone)]
pub struct ShardHandle {
    /// Shard identifier, also used as the merge tie-break offset.
    pub id: u32,
    /// Key span the shard covers.
    pub scope: ShardScope,
    /// The shard's sorted-range primitive.
    pub reader: Arc<dyn ShardReader>,
}

impl fmt::Debug for ShardHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardHandle")
            .field("id", &self.id)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// An immutable view of the topology at one version.
#[derive(Debug, Clone)]
pub struct TopologySnapshot {
    version: VersionToken,
    shards: Vec<ShardHandle>,
}

impl TopologySnapshot {
    /// A snapshot with the given version and shards.
    pub fn new(version: VersionToken, shards: Vec<ShardHandle>) -> Self {
        TopologySnapshot { version, shards }
    }

    /// The snapshot's version token.
    pub fn version(&self) -> VersionToken {
        self.version
    }

    /// All shards of the snapshot.
    pub fn shards(&self) -> &[ShardHandle] {
        &self.shards
    }

    /// The shards whose scope can overlap `range`.
    pub fn route(&self, range: &ByteRange) -> Vec<ShardHandle> {
        self.shards
            .iter()
            .filter(|shard| shard.scope.meets_range(range))
            .cloned()
            .collect()
    }
}

/// Read-only shared access to the current topology.
pub trait TopologyProvider: Send + Sync {
    /// The current snapshot. Cheap; called on every pull of an open scan.
    fn current(&self) -> Arc<TopologySnapshot>;
}

/// A mutable topology cell. Scans read snapshots through
/// [`TopologyProvider`]; administrative code replaces the shard set, which
/// bumps the version token and fails open ordered scans on their next pull.
///
/// The lock is held only to clone or swap the snapshot `Arc` and never
/// across an await, so reads from `poll_next` cannot stall the executor.
pub struct TopologyHandle {
    current: RwLock<Arc<TopologySnapshot>>,
}

impl TopologyHandle {
    /// A handle starting at version 1 with the given shards.
    pub fn new(shards: Vec<ShardHandle>) -> Self {
        TopologyHandle {
            current: RwLock::new(Arc::new(TopologySnapshot::new(VersionToken(1), shards))),
        }
    }

    /// Installs a new shard set under the next version token.
    pub fn replace(&self, shards: Vec<ShardHandle>) {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let next = VersionToken(guard.version().0 + 1);
        *guard = Arc::new(TopologySnapshot::new(next, shards));
    }
}

impl TopologyProvider for TopologyHandle {
    fn current(&self) -> Arc<TopologySnapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use std::ops::Bound;

    use super::*;
    use crate::shard::MemShard;

    fn key(byte: u8) -> EncodedKey {
        EncodedKey::from_bytes(vec![byte])
    }

    fn handle(id: u32, scope: ShardScope) -> ShardHandle {
        ShardHandle {
            id,
            scope,
            reader: Arc::new(MemShard::new(id)),
        }
    }

    #[test]
    fn scope_overlap() {
        let scope = ShardScope::between(key(100), key(200));
        let range = |start: Bound<EncodedKey>, end: Bound<EncodedKey>| ByteRange { start, end };

        assert!(scope.meets_range(&range(Bound::Unbounded, Bound::Unbounded)));
        assert!(scope.meets_range(&range(Bound::Included(key(150)), Bound::Included(key(150)))));
        assert!(scope.meets_range(&range(Bound::Included(key(50)), Bound::Included(key(100)))));
        assert!(scope.meets_range(&range(Bound::Included(key(200)), Bound::Unbounded)));

        assert!(!scope.meets_range(&range(Bound::Unbounded, Bound::Excluded(key(100)))));
        assert!(!scope.meets_range(&range(Bound::Unbounded, Bound::Included(key(99)))));
        assert!(!scope.meets_range(&range(Bound::Excluded(key(200)), Bound::Unbounded)));
        assert!(!scope.meets_range(&range(Bound::Included(key(201)), Bound::Unbounded)));
    }

    #[test]
    fn route_filters_by_scope() {
        let snapshot = TopologySnapshot::new(
            VersionToken(1),
            vec![
                handle(0, ShardScope::between(key(0), key(99))),
                handle(1, ShardScope::between(key(100), key(199))),
                handle(2, ShardScope { min: Some(key(200)), max: None }),
            ],
        );
        let range = ByteRange {
            start: Bound::Included(key(150)),
            end: Bound::Excluded(key(250)),
        };
        let routed = snapshot.route(&range);
        assert_eq!(routed.iter().map(|s| s.id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn replace_bumps_the_version() {
        let topology = TopologyHandle::new(vec![handle(0, ShardScope::all())]);
        let before = topology.current().version();
        topology.replace(vec![handle(0, ShardScope::all()), handle(1, ShardScope::all())]);
        let after = topology.current();
        assert_ne!(before, after.version());
        assert_eq!(after.shards().len(), 2);
    }
}
