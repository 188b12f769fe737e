//! Entry engine - the facade collaborators call
//!
//! Every mutating call is one atomic unit of work inside the store's write
//! boundary. Container owners are notified after the commit, never before.

use std::sync::Arc;

use chrono::Utc;

use crate::core::cascade::{self, DeletionReport};
use crate::core::collaborators::{ContainerOwner, ResourceOwner};
use crate::core::config::Config;
use crate::core::error::{EngineError, EngineResult};
use crate::core::identity::{ContainerId, EntryId, ResourceRef};
use crate::core::ordering::{self, Direction};
use crate::core::policy::Family;
use crate::core::store::{Entry, EntryNode, EntryQuery, EntryStore, Page, Scope};

/// Request to create an entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub container_id: ContainerId,
    pub parent_id: Option<EntryId>,
    /// Requested index; appended when `None`
    pub index: Option<i64>,
    pub name: Option<String>,
    pub kind: String,
    pub external_ref: Option<ResourceRef>,
}

impl NewEntry {
    pub fn new(container_id: impl Into<ContainerId>, kind: impl Into<String>) -> Self {
        Self {
            container_id: container_id.into(),
            parent_id: None,
            index: None,
            name: None,
            kind: kind.into(),
            external_ref: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn under(mut self, parent: EntryId) -> Self {
        self.parent_id = Some(parent);
        self
    }

    pub fn at(mut self, index: i64) -> Self {
        self.index = Some(index);
        self
    }

    pub fn linked_to(mut self, resource: impl Into<ResourceRef>) -> Self {
        self.external_ref = Some(resource.into());
        self
    }
}

/// Field changes for `Engine::update`; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryChanges {
    pub name: Option<Option<String>>,
    pub kind: Option<String>,
    pub external_ref: Option<Option<ResourceRef>>,
    /// New parent (`Some(None)` moves the entry to root level)
    pub parent_id: Option<Option<EntryId>>,
    /// Requested index in the (new) sibling group
    pub index: Option<i64>,
}

/// The ordering/cascade engine for one entry family
#[derive(Clone)]
pub struct Engine {
    store: EntryStore,
    family: Family,
    containers: Arc<dyn ContainerOwner>,
    resources: Arc<dyn ResourceOwner>,
    actor: String,
}

impl Engine {
    /// Create an engine over an existing store
    pub fn new(
        store: EntryStore,
        family: Family,
        containers: Arc<dyn ContainerOwner>,
        resources: Arc<dyn ResourceOwner>,
    ) -> Self {
        Self {
            store,
            family,
            containers,
            resources,
            actor: "system".to_string(),
        }
    }

    /// Open the configured store and bind the named family
    pub fn from_config(
        config: &Config,
        family: &str,
        containers: Arc<dyn ContainerOwner>,
        resources: Arc<dyn ResourceOwner>,
    ) -> EngineResult<Self> {
        let store = EntryStore::open(config.database_path(), &config.store_options())?;
        Ok(Self::new(store, config.family(family), containers, resources).acting_as(config.author()))
    }

    /// A handle whose mutations are attributed to `actor`
    pub fn acting_as(&self, actor: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            ..self.clone()
        }
    }

    pub fn family(&self) -> &Family {
        &self.family
    }

    pub fn store(&self) -> &EntryStore {
        &self.store
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Create an entry, appended or inserted at the requested index
    pub fn create(&self, new: NewEntry) -> EngineResult<Entry> {
        self.require_container(&new.container_id)?;
        if let Some(ref resource) = new.external_ref {
            self.check_resource(resource);
        }

        let policy = self.family.policy();
        let entry = self.store.write(self.family.name(), |tx| {
            if let Some(parent) = new.parent_id {
                ordering::validate_parent(tx, None, &new.container_id, parent)?;
            }
            let draft = Entry {
                id: EntryId::new(),
                container_id: new.container_id,
                parent_id: new.parent_id,
                name: new.name,
                index: 0,
                external_ref: new.external_ref,
                kind: new.kind,
            };
            ordering::insert_new(tx, policy, draft, new.index)
        })?;

        tracing::info!(
            family = self.family.name(),
            entry = %entry.id,
            container = %entry.container_id,
            index = entry.index,
            "created entry"
        );
        self.notify(&entry.container_id);
        Ok(entry)
    }

    /// Apply field changes; a parent change reparents, an index change alone moves
    pub fn update(&self, id: &EntryId, changes: EntryChanges) -> EngineResult<Entry> {
        if let Some(Some(ref resource)) = changes.external_ref {
            self.check_resource(resource);
        }

        let policy = self.family.policy();
        let entry = self.store.write(self.family.name(), |tx| {
            let mut entry = tx.get(id)?;
            self.require_container(&entry.container_id)?;

            let mut dirty = false;
            if let Some(name) = changes.name {
                entry.name = name;
                dirty = true;
            }
            if let Some(kind) = changes.kind {
                entry.kind = kind;
                dirty = true;
            }
            if let Some(external_ref) = changes.external_ref {
                entry.external_ref = external_ref;
                dirty = true;
            }
            if dirty {
                tx.update(&entry)?;
            }

            match (changes.parent_id, changes.index) {
                (Some(parent), index) => ordering::reparent(tx, policy, entry, parent, index),
                (None, Some(index)) => ordering::move_to(tx, policy, entry, index),
                (None, None) => Ok(entry),
            }
        })?;

        tracing::info!(
            family = self.family.name(),
            entry = %entry.id,
            parent = ?entry.parent_id.map(|p| p.to_string()),
            index = entry.index,
            "updated entry"
        );
        self.notify(&entry.container_id);
        Ok(entry)
    }

    /// Move an entry to a requested index within its sibling group
    pub fn move_to(&self, id: &EntryId, index: i64) -> EngineResult<Entry> {
        self.update(
            id,
            EntryChanges {
                index: Some(index),
                ..Default::default()
            },
        )
    }

    /// Move an entry under another parent (or to root level with `None`)
    pub fn reparent(
        &self,
        id: &EntryId,
        parent: Option<EntryId>,
        index: Option<i64>,
    ) -> EngineResult<Entry> {
        self.update(
            id,
            EntryChanges {
                parent_id: Some(parent),
                index,
                ..Default::default()
            },
        )
    }

    /// Swap an entry with the sibling before it
    pub fn move_up(&self, id: &EntryId) -> EngineResult<Entry> {
        self.shift(id, Direction::Up)
    }

    /// Swap an entry with the sibling after it
    pub fn move_down(&self, id: &EntryId) -> EngineResult<Entry> {
        self.shift(id, Direction::Down)
    }

    fn shift(&self, id: &EntryId, direction: Direction) -> EngineResult<Entry> {
        let policy = self.family.policy();
        let entry = self.store.write(self.family.name(), |tx| {
            let entry = tx.get(id)?;
            self.require_container(&entry.container_id)?;
            ordering::shift(tx, policy, entry, direction)
        })?;

        tracing::info!(
            family = self.family.name(),
            entry = %entry.id,
            ?direction,
            index = entry.index,
            "shifted entry"
        );
        self.notify(&entry.container_id);
        Ok(entry)
    }

    /// Delete an entry together with its whole subtree
    pub fn delete(&self, id: &EntryId) -> EngineResult<DeletionReport> {
        let policy = self.family.policy();
        let report = self.store.write(self.family.name(), |tx| {
            cascade::delete_entry(tx, policy, id)
        })?;

        tracing::info!(
            family = self.family.name(),
            entry = %id,
            removed = report.len(),
            "deleted entry subtree"
        );
        self.notify_all(&report);
        Ok(report)
    }

    /// Delete every entry of a container (the container itself is going away)
    pub fn delete_by_container(&self, container: &ContainerId) -> EngineResult<usize> {
        let removed = self.store.write(self.family.name(), |tx| {
            cascade::delete_container(tx, container)
        })?;

        tracing::info!(
            family = self.family.name(),
            container = %container,
            removed,
            "deleted container entries"
        );
        Ok(removed)
    }

    /// Delete every entry referencing a removed resource
    ///
    /// With `container` set only that container's entries are considered;
    /// otherwise the cascade spans every container of the family.
    pub fn delete_by_external_ref(
        &self,
        resource: &ResourceRef,
        container: Option<&ContainerId>,
    ) -> EngineResult<DeletionReport> {
        let policy = self.family.policy();
        let report = self.store.write(self.family.name(), |tx| {
            cascade::delete_referencing(tx, policy, resource, container)
        })?;

        tracing::info!(
            family = self.family.name(),
            resource = %resource,
            removed = report.len(),
            containers = report.containers.len(),
            "deleted entries referencing resource"
        );
        self.notify_all(&report);
        Ok(report)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn get(&self, id: &EntryId) -> EngineResult<Entry> {
        self.store.read(self.family.name(), |tx| tx.get(id))
    }

    /// Ordered direct children of `(container, parent)`
    pub fn children(
        &self,
        container: &ContainerId,
        parent: Option<EntryId>,
    ) -> EngineResult<Vec<Entry>> {
        let scope = Scope {
            container_id: container.clone(),
            parent_id: parent,
        };
        self.store
            .read(self.family.name(), |tx| tx.children_of(&scope))
    }

    /// Filtered, sorted, paginated listing with a total count
    pub fn query(&self, query: &EntryQuery) -> EngineResult<Page<Entry>> {
        self.store.read(self.family.name(), |tx| tx.query(query))
    }

    /// A container's entries as a nested forest ordered by index
    pub fn tree(&self, container: &ContainerId) -> EngineResult<Vec<EntryNode>> {
        self.store.read(self.family.name(), |tx| tx.tree(container))
    }

    // =========================================================================
    // Collaborators
    // =========================================================================

    fn require_container(&self, container: &ContainerId) -> EngineResult<()> {
        if self.has_container(container) {
            Ok(())
        } else {
            Err(EngineError::ContainerNotFound(container.clone()))
        }
    }

    pub(crate) fn resolves(&self, resource: &ResourceRef) -> bool {
        self.resources.exists(resource)
    }

    pub(crate) fn has_container(&self, container: &ContainerId) -> bool {
        self.containers.exists(container)
    }

    /// Unresolved references are allowed but logged
    fn check_resource(&self, resource: &ResourceRef) {
        if !self.resolves(resource) {
            tracing::warn!(
                family = self.family.name(),
                resource = %resource,
                "entry references a resource that does not exist"
            );
        }
    }

    fn notify(&self, container: &ContainerId) {
        self.containers
            .entries_changed(container, &self.actor, Utc::now());
    }

    fn notify_all(&self, report: &DeletionReport) {
        for container in &report.containers {
            self.notify(container);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::collaborators::{ContainerRegistry, ResourceRegistry};
    use crate::core::error::InvalidParentReason;
    use crate::core::policy::IndexPolicy;

    fn setup() -> (Engine, Arc<ContainerRegistry>, Arc<ResourceRegistry>) {
        let containers = Arc::new(ContainerRegistry::new());
        let resources = Arc::new(ResourceRegistry::new());
        containers.register("app");
        resources.register("page-1");
        let engine = Engine::new(
            EntryStore::in_memory().unwrap(),
            Family::application_menu(),
            containers.clone(),
            resources.clone(),
        );
        (engine, containers, resources)
    }

    #[test]
    fn test_create_requires_container() {
        let (engine, _, _) = setup();
        let err = engine.create(NewEntry::new("ghost", "menu")).unwrap_err();
        assert!(matches!(err, EngineError::ContainerNotFound(_)));
    }

    #[test]
    fn test_create_with_unresolved_reference_succeeds() {
        let (engine, _, _) = setup();
        let entry = engine
            .create(NewEntry::new("app", "menu").linked_to("missing-page"))
            .unwrap();
        assert_eq!(entry.external_ref, Some(ResourceRef::from("missing-page")));
    }

    #[test]
    fn test_mutations_refresh_container_audit() {
        let (engine, containers, _) = setup();
        let app = ContainerId::from("app");

        let entry = engine
            .acting_as("alice")
            .create(NewEntry::new("app", "menu").named("Main"))
            .unwrap();
        let audit = containers.audit(&app).unwrap();
        assert_eq!(audit.last_updated_by.as_deref(), Some("alice"));
        let first_update = audit.last_update_date.unwrap();

        engine.acting_as("bob").delete(&entry.id).unwrap();
        let audit = containers.audit(&app).unwrap();
        assert_eq!(audit.last_updated_by.as_deref(), Some("bob"));
        assert!(audit.last_update_date.unwrap() >= first_update);
    }

    #[test]
    fn test_failed_mutation_does_not_notify() {
        let (engine, containers, _) = setup();
        let err = engine
            .create(NewEntry::new("app", "menu").under(EntryId::new()))
            .unwrap_err();
        assert!(matches!(err, EngineError::ParentNotFound(_)));
        let audit = containers.audit(&ContainerId::from("app")).unwrap();
        assert_eq!(audit.last_updated_by, None);
    }

    #[test]
    fn test_update_name_and_reference_in_place() {
        let (engine, _, _) = setup();
        let entry = engine
            .create(NewEntry::new("app", "menu").named("Old"))
            .unwrap();

        let updated = engine
            .update(
                &entry.id,
                EntryChanges {
                    name: Some(Some("New".into())),
                    external_ref: Some(Some(ResourceRef::from("page-1"))),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.name.as_deref(), Some("New"));
        assert_eq!(updated.index, entry.index);
        assert_eq!(engine.get(&entry.id).unwrap(), updated);
    }

    #[test]
    fn test_reparent_to_root_with_explicit_index() {
        let (engine, _, _) = setup();
        let top = engine.create(NewEntry::new("app", "menu").named("top")).unwrap();
        let other = engine.create(NewEntry::new("app", "menu").named("other")).unwrap();
        let child = engine
            .create(NewEntry::new("app", "menu").named("child").under(top.id))
            .unwrap();

        let moved = engine.reparent(&child.id, None, Some(1)).unwrap();
        assert_eq!(moved.parent_id, None);
        assert_eq!(moved.index, 1);

        let roots: Vec<_> = engine
            .children(&ContainerId::from("app"), None)
            .unwrap()
            .into_iter()
            .map(|e| (e.id, e.index))
            .collect();
        assert_eq!(roots, vec![(child.id, 1), (top.id, 2), (other.id, 3)]);
    }

    #[test]
    fn test_reparent_under_descendant_is_rejected_without_writes() {
        let (engine, _, _) = setup();
        let top = engine.create(NewEntry::new("app", "menu")).unwrap();
        let child = engine
            .create(NewEntry::new("app", "menu").under(top.id))
            .unwrap();

        let err = engine.reparent(&top.id, Some(child.id), None).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidParent {
                reason: InvalidParentReason::Cycle,
                ..
            }
        ));
        assert_eq!(engine.get(&top.id).unwrap(), top);
        assert_eq!(engine.get(&child.id).unwrap(), child);
    }

    #[test]
    fn test_move_missing_entry_is_not_found() {
        let (engine, _, _) = setup();
        let err = engine.move_to(&EntryId::new(), 1).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_move_after_container_removed_is_not_found() {
        let (engine, containers, _) = setup();
        let entry = engine.create(NewEntry::new("app", "menu")).unwrap();
        containers.remove(&ContainerId::from("app"));

        let err = engine.move_to(&entry.id, 1).unwrap_err();
        assert!(matches!(err, EngineError::ContainerNotFound(_)));
    }

    #[test]
    fn test_append_overflow_is_an_error_not_a_panic() {
        let (_, containers, resources) = setup();
        let engine = Engine::new(
            EntryStore::in_memory().unwrap(),
            Family::new("big", IndexPolicy { base: 0, step: i64::MAX }),
            containers,
            resources,
        );

        assert_eq!(engine.create(NewEntry::new("app", "menu")).unwrap().index, 0);
        assert_eq!(
            engine.create(NewEntry::new("app", "menu")).unwrap().index,
            i64::MAX
        );
        let err = engine.create(NewEntry::new("app", "menu")).unwrap_err();
        assert!(matches!(err, EngineError::IndexOverflow { .. }));

        // inserting at the front has to renumber past the end as well
        let err = engine
            .create(NewEntry::new("app", "menu").at(0))
            .unwrap_err();
        assert!(matches!(err, EngineError::IndexOverflow { .. }));
        assert_eq!(
            engine.children(&ContainerId::from("app"), None).unwrap().len(),
            2
        );
    }

    #[test]
    fn test_move_up_and_down() {
        let (engine, _, _) = setup();
        let a = engine.create(NewEntry::new("app", "menu").named("a")).unwrap();
        let b = engine.create(NewEntry::new("app", "menu").named("b")).unwrap();

        assert_eq!(engine.move_down(&a.id).unwrap().index, 2);
        assert_eq!(engine.get(&b.id).unwrap().index, 1);
        assert_eq!(engine.move_up(&a.id).unwrap().index, 1);
        assert_eq!(engine.get(&b.id).unwrap().index, 2);
    }
}
