//! Collaborator interfaces: container owners and external resource owners
//!
//! The engine asks the container owner whether a container exists and tells
//! it, synchronously and after commit, whenever entries under it changed.
//! Resource owners are only consulted for existence checks.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use crate::core::identity::{ContainerId, ResourceRef};

/// Owner of the containers entries are scoped to (an application or profile service)
pub trait ContainerOwner: Send + Sync {
    fn exists(&self, container: &ContainerId) -> bool;

    /// Refresh the container's audit metadata after a committed entry change
    fn entries_changed(&self, container: &ContainerId, actor: &str, at: DateTime<Utc>);
}

/// Owner of the resources entries may reference (a page service)
pub trait ResourceOwner: Send + Sync {
    fn exists(&self, resource: &ResourceRef) -> bool;
}

/// Audit metadata a container carries for its entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerAudit {
    pub last_updated_by: Option<String>,
    pub last_update_date: Option<DateTime<Utc>>,
}

/// In-memory container owner
#[derive(Debug, Default)]
pub struct ContainerRegistry {
    containers: Mutex<HashMap<ContainerId, ContainerAudit>>,
}

/// Lock a registry, recovering the data if a holder panicked
///
/// Every registry update is a single insert or field write, so the data behind
/// a poisoned lock is still consistent.
fn lock<'a, T>(mutex: &'a Mutex<T>, registry: &'static str) -> MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|poisoned: PoisonError<MutexGuard<'a, T>>| {
        tracing::warn!(registry, "recovering poisoned registry lock");
        poisoned.into_inner()
    })
}

impl ContainerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, container: impl Into<ContainerId>) {
        lock(&self.containers, "containers")
            .entry(container.into())
            .or_insert(ContainerAudit {
                last_updated_by: None,
                last_update_date: None,
            });
    }

    /// Forget a container; its entries must be removed with `Engine::delete_by_container`
    pub fn remove(&self, container: &ContainerId) -> bool {
        lock(&self.containers, "containers")
            .remove(container)
            .is_some()
    }

    pub fn audit(&self, container: &ContainerId) -> Option<ContainerAudit> {
        lock(&self.containers, "containers").get(container).cloned()
    }
}

impl ContainerOwner for ContainerRegistry {
    fn exists(&self, container: &ContainerId) -> bool {
        lock(&self.containers, "containers").contains_key(container)
    }

    fn entries_changed(&self, container: &ContainerId, actor: &str, at: DateTime<Utc>) {
        if let Some(audit) = lock(&self.containers, "containers").get_mut(container) {
            audit.last_updated_by = Some(actor.to_string());
            audit.last_update_date = Some(at);
        }
    }
}

/// In-memory resource owner
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    resources: Mutex<HashSet<ResourceRef>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, resource: impl Into<ResourceRef>) {
        lock(&self.resources, "resources").insert(resource.into());
    }

    /// Forget a resource; the caller then cascades with `Engine::delete_by_external_ref`
    pub fn remove(&self, resource: &ResourceRef) -> bool {
        lock(&self.resources, "resources").remove(resource)
    }
}

impl ResourceOwner for ResourceRegistry {
    fn exists(&self, resource: &ResourceRef) -> bool {
        lock(&self.resources, "resources").contains(resource)
    }
}
