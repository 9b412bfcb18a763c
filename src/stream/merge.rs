//! Globally ordered merge across per-shard cursors.

use std::{
    cmp::Ordering,
    collections::BinaryHeap,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use futures_core::{ready, Stream};
use futures_util::StreamExt;
use pin_project_lite::pin_project;

use super::{ScanEntry, ScanStream};
use crate::{
    error::{Error, Result},
    logging::LOG_TARGET,
    shard::{ByteRange, ScanDirection},
    topology::{TopologyProvider, VersionToken},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MergeState {
    Merging,
    Exhausted,
    Failed,
}

pin_project! {
    /// Merges the shard cursors overlapping one planned range into a single
    /// globally ordered stream.
    ///
    /// The topology is pinned at open; a structural change observed on any
    /// later pull makes the stream fail terminally instead of returning
    /// partial or misordered results.
    pub struct MergeStream {
        streams: Vec<ScanStream>,
        peeked: BinaryHeap<CmpEntry>,
        direction: ScanDirection,
        topology: Arc<dyn TopologyProvider>,
        pinned: VersionToken,
        pinned_shards: usize,
        state: MergeState,
    }
}

impl MergeStream {
    /// Routes `range` through the current topology and opens one cursor per
    /// overlapping shard, buffering each cursor's first entry.
    pub async fn open(
        topology: Arc<dyn TopologyProvider>,
        range: ByteRange,
        direction: ScanDirection,
        batch_size: usize,
    ) -> Result<Self> {
        let snapshot = topology.current();
        let pinned = snapshot.version();
        let handles = snapshot.route(&range);
        tracing::debug!(
            target: LOG_TARGET,
            version = pinned.0,
            shards = handles.len(),
            ?direction,
            "opening merge stream"
        );

        let mut streams = Vec::with_capacity(handles.len());
        for handle in &handles {
            streams.push(ScanStream::new(
                handle.id,
                handle.reader.clone().scan(range.clone(), direction, batch_size),
            ));
        }

        let mut peeked = BinaryHeap::with_capacity(streams.len());
        for (offset, stream) in streams.iter_mut().enumerate() {
            if let Some(entry) = stream.next().await.transpose()? {
                peeked.push(CmpEntry::new(offset, entry, direction));
            }
        }

        Ok(MergeStream {
            streams,
            peeked,
            direction,
            topology,
            pinned,
            pinned_shards: handles.len(),
            state: MergeState::Merging,
        })
    }

    /// Drops all cursors and buffered entries. Safe to call repeatedly;
    /// later pulls return `None`.
    pub fn close(&mut self) {
        self.state = MergeState::Exhausted;
        self.peeked.clear();
        self.streams.clear();
    }
}

impl Stream for MergeStream {
    type Item = Result<ScanEntry>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        match this.state {
            MergeState::Merging => {}
            MergeState::Exhausted | MergeState::Failed => return Poll::Ready(None),
        }

        let current = this.topology.current();
        if current.version() != *this.pinned {
            *this.state = MergeState::Failed;
            return Poll::Ready(Some(Err(Error::UnsupportedTopologyChange {
                pinned: *this.pinned,
                current: current.version(),
                detail: format!(
                    "shard set changed from {} to {} shards",
                    this.pinned_shards,
                    current.shards().len()
                ),
            })));
        }

        // Refill the cursor owning the buffered head before handing the
        // head out, so the heap always holds at most one entry per cursor.
        while let Some(offset) = this.peeked.peek().map(|entry| entry.offset) {
            let next = match ready!(Pin::new(&mut this.streams[offset]).poll_next(cx)) {
                Some(Ok(entry)) => Some(entry),
                Some(Err(e)) => {
                    *this.state = MergeState::Failed;
                    return Poll::Ready(Some(Err(e.into())));
                }
                None => None,
            };
            let peeked = match this.peeked.pop() {
                Some(peeked) => peeked,
                None => break,
            };
            if let Some(next) = next {
                this.peeked.push(CmpEntry::new(offset, next, *this.direction));
            }
            return Poll::Ready(Some(Ok(peeked.entry)));
        }

        *this.state = MergeState::Exhausted;
        Poll::Ready(None)
    }
}

#[derive(Debug)]
struct CmpEntry {
    offset: usize,
    entry: ScanEntry,
    direction: ScanDirection,
}

impl CmpEntry {
    fn new(offset: usize, entry: ScanEntry, direction: ScanDirection) -> Self {
        Self {
            offset,
            entry,
            direction,
        }
    }
}

impl PartialEq for CmpEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for CmpEntry {}

impl PartialOrd for CmpEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CmpEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // The heap pops its maximum, so forward order is reversed. Keys
        // carry the record-key suffix on non-unique indexes; equal bytes
        // fall back to the shard offset for a deterministic order.
        match self.direction {
            ScanDirection::Forward => self
                .entry
                .key()
                .cmp(other.entry.key())
                .then(self.offset.cmp(&other.offset))
                .reverse(),
            ScanDirection::Reverse => self
                .entry
                .key()
                .cmp(other.entry.key())
                .then(other.offset.cmp(&self.offset)),
        }
    }
}
