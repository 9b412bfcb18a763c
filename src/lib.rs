//! Order-preserving key encoding and globally ordered shard range scans.
//!
//! The crate has two halves. The encoding half turns typed field values
//! into byte keys whose unsigned lexicographic order equals semantic order:
//! [`value`] holds the per-type codecs, [`key`] composes them into
//! composite keys per an [`index::IndexDefinition`]. The scan half turns a
//! declarative [`scan::ScanSpec`] into half-open byte bounds and merges
//! per-shard cursors into one globally ordered stream: [`scan`] plans,
//! [`stream`] merges, [`scanner`] ties both to an index registry and a
//! versioned shard [`topology`].
//!
//! ```
//! use std::sync::Arc;
//!
//! use futures_util::StreamExt;
//! use ordkey::{
//!     index::{IndexDefinition, IndexField, IndexRegistry, InMemoryRegistry},
//!     key::{FieldValue, KeyBuilder},
//!     scan::FieldRange,
//!     scanner::Scanner,
//!     shard::MemShard,
//!     topology::{ShardHandle, ShardScope, TopologyHandle},
//!     value::{DataType, ScalarValue},
//! };
//!
//! # fn main() -> ordkey::Result<()> {
//! # let rt = tokio::runtime::Builder::new_current_thread()
//! #     .enable_all()
//! #     .build()
//! #     .unwrap();
//! # rt.block_on(async {
//! let mut registry = InMemoryRegistry::new();
//! registry.insert(IndexDefinition::new(
//!     "events",
//!     vec![
//!         IndexField::new("kind", DataType::String),
//!         IndexField::new("sequence", DataType::Int64),
//!     ],
//! ));
//!
//! let shard = Arc::new(MemShard::new(0));
//! let builder = KeyBuilder::new(registry.get("events").unwrap());
//! for sequence in 0..4i64 {
//!     let key = builder
//!         .build(&[
//!             ("kind", FieldValue::Value(ScalarValue::String("click".into()))),
//!             ("sequence", FieldValue::Value(ScalarValue::Int64(sequence))),
//!         ])?
//!         .pop()
//!         .unwrap();
//!     shard.insert(&key, Vec::new());
//! }
//!
//! let topology = Arc::new(TopologyHandle::new(vec![ShardHandle {
//!     id: 0,
//!     scope: ShardScope::all(),
//!     reader: shard,
//! }]));
//! let scanner = Scanner::new(Arc::new(registry), topology);
//! let spec = scanner
//!     .spec("events")
//!     .with_prefix_field("kind", ScalarValue::String("click".into()))
//!     .with_range(FieldRange::over("sequence").start_at(ScalarValue::Int64(1), true));
//!
//! let mut results = Box::pin(scanner.iterate(spec));
//! let mut sequences = Vec::new();
//! while let Some(item) = results.next().await {
//!     sequences.push(item?.fields[1].clone());
//! }
//! assert_eq!(sequences.len(), 3);
//! # Ok(())
//! # })
//! # }
//! ```
#![deny(missing_docs)]

pub mod error;
pub mod executor;
pub mod index;
pub mod key;
mod logging;
pub mod option;
pub mod scan;
pub mod scanner;
pub mod shard;
pub mod stream;
pub mod topology;
pub mod value;

pub use error::{Error, Result};
pub use index::{IndexDefinition, IndexField, IndexRegistry, InMemoryRegistry};
pub use key::{EncodedKey, FieldValue, KeyBuilder};
pub use option::ScanOptions;
pub use scan::{Direction, FieldRange, Planner, ScanSpec};
pub use scanner::{ScanItem, Scanner};
pub use value::{DataType, Decimal, ScalarValue, Timestamp};
