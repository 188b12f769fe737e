//! Core module - identifiers, storage, ordering and the engine facade

pub mod cascade;
pub mod collaborators;
pub mod config;
pub mod engine;
pub mod error;
pub mod identity;
pub mod import;
pub mod ordering;
pub mod policy;
pub mod store;

pub use cascade::DeletionReport;
pub use collaborators::{ContainerAudit, ContainerOwner, ContainerRegistry, ResourceOwner, ResourceRegistry};
pub use config::Config;
pub use engine::{Engine, EntryChanges, NewEntry};
pub use error::{EngineError, EngineResult, InvalidParentReason};
pub use identity::{ContainerId, EntryId, IdParseError, ResourceRef};
pub use import::{ImportFailure, ImportRecord, ImportReport, ImportWarning};
pub use ordering::Direction;
pub use policy::{Family, IndexPolicy};
pub use store::{
    Entry, EntryFilter, EntryNode, EntryQuery, EntryStore, Page, ParentFilter, Scope, SortKey,
    SortOrder, StoreOptions,
};
