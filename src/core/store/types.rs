//! Store type definitions
//!
//! Entry records plus the filter, sort and page types of the query facade.

use serde::{Deserialize, Serialize};

use crate::core::identity::{ContainerId, EntryId, ResourceRef};

// =========================================================================
// Entry Records
// =========================================================================

/// An ordered, optionally nested, optionally resource-linked record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: EntryId,
    pub container_id: ContainerId,

    /// `None` means root level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<EntryId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub index: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_ref: Option<ResourceRef>,

    /// Opaque discriminator ("folder", "link", ...)
    pub kind: String,
}

impl Entry {
    /// The sibling group this entry belongs to
    pub fn scope(&self) -> Scope {
        Scope {
            container_id: self.container_id.clone(),
            parent_id: self.parent_id,
        }
    }
}

/// A `(container, parent)` pair: the unit of index uniqueness
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Scope {
    pub container_id: ContainerId,
    pub parent_id: Option<EntryId>,
}

impl Scope {
    pub fn root(container_id: ContainerId) -> Self {
        Self {
            container_id,
            parent_id: None,
        }
    }
}

/// An entry with its ordered children, as read back for export
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryNode {
    #[serde(flatten)]
    pub entry: Entry,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<EntryNode>,
}

// =========================================================================
// Query Types
// =========================================================================

/// Parent filter: root-level entries or the children of one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentFilter {
    Root,
    Entry(EntryId),
}

/// Filter for listing entries (all set fields must match)
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    pub container_id: Option<ContainerId>,
    pub parent: Option<ParentFilter>,
    pub external_ref: Option<ResourceRef>,
    pub name: Option<String>,
    pub kind: Option<String>,
}

/// Sort key for listing entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Index,
    Name,
    Id,
}

impl SortKey {
    pub(super) fn column(&self) -> &'static str {
        match self {
            SortKey::Index => "idx",
            SortKey::Name => "name",
            SortKey::Id => "id",
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    pub(super) fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }
}

/// A filtered, sorted, paginated listing request
#[derive(Debug, Clone, Default)]
pub struct EntryQuery {
    pub filter: EntryFilter,
    pub sort: SortKey,
    pub order: SortOrder,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl EntryQuery {
    pub fn new(filter: EntryFilter) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }

    pub fn sorted_by(mut self, sort: SortKey, order: SortOrder) -> Self {
        self.sort = sort;
        self.order = order;
        self
    }

    pub fn page(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = Some(limit);
        self
    }
}

/// One page of results plus the size of the whole filtered set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
}
