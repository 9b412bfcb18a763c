//! The top-level scan entry point: resolves the index, plans the range and
//! drives per-shard cursors or the global merge.

use std::sync::Arc;

use async_stream::try_stream;
use futures_core::Stream;
use futures_util::StreamExt;

use crate::{
    error::{Error, Result},
    executor::Executor,
    index::IndexRegistry,
    key::{EncodedKey, KeyBuilder},
    logging::LOG_TARGET,
    option::ScanOptions,
    scan::{Direction, Planner, ScanBounds, ScanSpec},
    shard::{ByteRange, ScanDirection},
    stream::{merge::MergeStream, session::ScanSession, ScanStream},
    topology::TopologyProvider,
    value::ScalarValue,
};

/// One decoded scan result.
#[derive(Debug)]
pub struct ScanItem {
    /// The stored key, usable as a resume key.
    pub key: EncodedKey,
    /// The key's field values in declared index order.
    pub fields: Vec<ScalarValue>,
    /// The stored value bytes.
    pub value: Vec<u8>,
    /// Shard the entry came from.
    pub shard: u32,
}

/// Plans and executes scans against a registry of indexes and a shard
/// topology.
#[derive(Clone)]
pub struct Scanner {
    registry: Arc<dyn IndexRegistry>,
    topology: Arc<dyn TopologyProvider>,
    options: ScanOptions,
}

impl Scanner {
    /// A scanner over the given registry and topology with default options.
    pub fn new(registry: Arc<dyn IndexRegistry>, topology: Arc<dyn TopologyProvider>) -> Self {
        Scanner {
            registry,
            topology,
            options: ScanOptions::default(),
        }
    }

    /// Replaces the scan options.
    pub fn with_options(mut self, options: ScanOptions) -> Self {
        self.options = options;
        self
    }

    /// A spec for `index` carrying the scanner's default batch size.
    pub fn spec(&self, index: impl Into<String>) -> ScanSpec {
        ScanSpec::new(index).with_batch_size(self.options.batch_size)
    }

    /// Validates and plans `spec` without contacting any shard.
    pub fn plan(&self, spec: &ScanSpec) -> Result<ScanBounds> {
        let index = self
            .registry
            .get(&spec.index)
            .ok_or_else(|| Error::NotFound(format!("index `{}` is not registered", spec.index)))?;
        Planner::new(index).plan(spec)
    }

    /// Opens a lazy, single-pass stream of decoded results. No index lookup,
    /// planning or shard traffic happens before the first pull; every item's
    /// key can be captured and fed back as a resume key.
    pub fn iterate(&self, spec: ScanSpec) -> impl Stream<Item = Result<ScanItem>> + Send + 'static {
        let registry = self.registry.clone();
        let topology = self.topology.clone();
        try_stream! {
            let index = registry
                .get(&spec.index)
                .ok_or_else(|| Error::NotFound(format!("index `{}` is not registered", spec.index)))?;
            let builder = KeyBuilder::new(index.clone());
            let bounds = Planner::new(index).plan(&spec)?;
            tracing::debug!(
                target: LOG_TARGET,
                index = %spec.index,
                ?bounds,
                "scan planned"
            );
            if !bounds.is_empty() {
                let range = ByteRange {
                    start: bounds.start,
                    end: bounds.end,
                };
                match spec.direction {
                    Direction::Forward | Direction::Reverse => {
                        let direction = if spec.direction == Direction::Forward {
                            ScanDirection::Forward
                        } else {
                            ScanDirection::Reverse
                        };
                        let mut merge =
                            MergeStream::open(topology, range, direction, spec.batch_size).await?;
                        while let Some(entry) = merge.next().await {
                            let entry = entry?;
                            let fields = builder.decode(entry.key())?;
                            let shard = entry.shard();
                            let (key, value) = entry.into_parts();
                            yield ScanItem {
                                key,
                                fields,
                                value,
                                shard,
                            };
                        }
                    }
                    Direction::Unordered => {
                        // No global order is promised, so shards are drained
                        // one after another without the merge heap.
                        let snapshot = topology.current();
                        for handle in snapshot.route(&range) {
                            let mut stream = ScanStream::new(
                                handle.id,
                                handle.reader.clone().scan(
                                    range.clone(),
                                    ScanDirection::Forward,
                                    spec.batch_size,
                                ),
                            );
                            while let Some(entry) = stream.next().await {
                                let entry = entry.map_err(Error::from)?;
                                let fields = builder.decode(entry.key())?;
                                let shard = entry.shard();
                                let (key, value) = entry.into_parts();
                                yield ScanItem {
                                    key,
                                    fields,
                                    value,
                                    shard,
                                };
                            }
                        }
                    }
                }
            }
        }
    }

    /// Spawns [`Scanner::iterate`] behind a request-credit session on
    /// `executor`.
    pub fn iterate_session<E>(&self, executor: &E, spec: ScanSpec) -> ScanSession<ScanItem>
    where
        E: Executor,
    {
        ScanSession::spawn(executor, self.iterate(spec), self.options.session_buffer)
    }
}
