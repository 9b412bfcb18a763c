//! Index definitions and the registry they are resolved from.
//!
//! Decoded values never carry a reference back to their definition; readers
//! resolve the definition by name through an [`IndexRegistry`].

use std::{collections::HashMap, sync::Arc};

use crate::value::DataType;

/// Sort direction of one indexed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Smallest value first.
    Ascending,
    /// Largest value first (encoded cell is complemented).
    Descending,
}

/// Whether and where an index can represent NULL/absent values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialValues {
    /// NULLs are not representable; rows with a null key field are omitted.
    Unsupported,
    /// NULLs sort before every non-null value of the field.
    SortsFirst,
    /// NULLs sort after every non-null value of the field.
    SortsLast,
}

/// One field of an index definition.
#[derive(Debug, Clone)]
pub struct IndexField {
    /// Dotted path of the field within the record.
    pub path: String,
    /// Field type used for encoding.
    pub data_type: DataType,
    /// Whether the field may be NULL/absent. Nullable fields carry a
    /// one-byte presence indicator in the key.
    pub nullable: bool,
    /// Sort direction.
    pub order: SortOrder,
}

impl IndexField {
    /// An ascending, non-nullable field.
    pub fn new(path: impl Into<String>, data_type: DataType) -> Self {
        IndexField {
            path: path.into(),
            data_type,
            nullable: false,
            order: SortOrder::Ascending,
        }
    }

    /// Marks the field nullable.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Sorts the field descending.
    pub fn descending(mut self) -> Self {
        self.order = SortOrder::Descending;
        self
    }
}

/// An ordered list of key fields plus index-level flags.
#[derive(Debug, Clone)]
pub struct IndexDefinition {
    /// Name the index is registered under.
    pub name: String,
    /// Key fields in declared order.
    pub fields: Vec<IndexField>,
    /// Whether one field may resolve through an array/map, producing one
    /// key per element.
    pub multi_key: bool,
    /// Whether at most one row may exist per key. Non-unique indexes append
    /// the record's primary key to every stored key.
    pub unique: bool,
    /// NULL representability and placement.
    pub special_values: SpecialValues,
}

impl IndexDefinition {
    /// A unique index without multi-key or NULL support.
    pub fn new(name: impl Into<String>, fields: Vec<IndexField>) -> Self {
        IndexDefinition {
            name: name.into(),
            fields,
            multi_key: false,
            unique: true,
            special_values: SpecialValues::Unsupported,
        }
    }

    /// Enables multi-key fan-out.
    pub fn multi_key(mut self) -> Self {
        self.multi_key = true;
        self
    }

    /// Marks the index non-unique (stored keys carry a record-key suffix).
    pub fn non_unique(mut self) -> Self {
        self.unique = false;
        self
    }

    /// Sets NULL representability and placement.
    pub fn special_values(mut self, special_values: SpecialValues) -> Self {
        self.special_values = special_values;
        self
    }

    /// Position of a field within the declared order.
    pub fn field_position(&self, path: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.path == path)
    }
}

/// Resolves index definitions by name.
pub trait IndexRegistry: Send + Sync {
    /// Looks up a definition, returning `None` when the name is unknown.
    fn get(&self, name: &str) -> Option<Arc<IndexDefinition>>;
}

/// A process-local registry backed by a hash map.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    indexes: HashMap<String, Arc<IndexDefinition>>,
}

impl InMemoryRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a definition under its name, replacing any previous one.
    pub fn insert(&mut self, definition: IndexDefinition) {
        self.indexes
            .insert(definition.name.clone(), Arc::new(definition));
    }
}

impl IndexRegistry for InMemoryRegistry {
    fn get(&self, name: &str) -> Option<Arc<IndexDefinition>> {
        self.indexes.get(name).cloned()
    }
}
