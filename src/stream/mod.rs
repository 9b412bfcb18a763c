//! Scan streams: per-shard adapters, the global merge and the
//! request-credit session.

pub mod merge;
pub mod session;

use std::{
    pin::Pin,
    task::{Context, Poll},
};

use futures_core::Stream;
use pin_project_lite::pin_project;

use crate::{
    key::EncodedKey,
    shard::{ShardError, ShardStream},
};

/// One key/value pair produced by a scan, tagged with its source shard.
#[derive(Debug)]
pub struct ScanEntry {
    key: EncodedKey,
    value: Vec<u8>,
    shard: u32,
}

impl ScanEntry {
    /// The entry's key.
    pub fn key(&self) -> &EncodedKey {
        &self.key
    }

    /// The stored value bytes.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Identifier of the shard the entry came from.
    pub fn shard(&self) -> u32 {
        self.shard
    }

    /// Splits the entry into key and value.
    pub fn into_parts(self) -> (EncodedKey, Vec<u8>) {
        (self.key, self.value)
    }
}

pin_project! {
    /// A shard cursor tagged with the shard it reads from.
    pub struct ScanStream {
        shard: u32,
        #[pin]
        inner: ShardStream,
    }
}

impl ScanStream {
    /// Wraps an open shard cursor.
    pub fn new(shard: u32, inner: ShardStream) -> Self {
        ScanStream { shard, inner }
    }
}

impl Stream for ScanStream {
    type Item = Result<ScanEntry, ShardError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        this.inner.poll_next(cx).map(|item| {
            item.map(|item| {
                item.map(|(key, value)| ScanEntry {
                    key,
                    value,
                    shard: *this.shard,
                })
            })
        })
    }
}
