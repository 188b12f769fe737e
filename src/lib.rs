//! navtree: ordered, tree-structured entry collections
//!
//! Entries are scoped to a container (an application, a profile), may nest
//! under a parent entry of the same container and may reference an external
//! resource such as a page. The engine keeps every sibling group densely
//! indexed through inserts, moves and reparents, and cascades deletions from
//! entries, containers and referenced resources.

pub mod core;
pub mod entries;
pub mod yaml;

pub use crate::core::{
    Config, ContainerId, DeletionReport, Engine, EngineError, EngineResult, Entry, EntryId,
    EntryStore, Family, IndexPolicy, NewEntry, ResourceRef,
};
