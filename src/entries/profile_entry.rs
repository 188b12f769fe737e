//! Profile entries: folders and links on a user profile
//!
//! Indices start at 0 with step 2.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::cascade::DeletionReport;
use crate::core::collaborators::{ContainerOwner, ResourceOwner};
use crate::core::engine::{Engine, EntryChanges, NewEntry};
use crate::core::error::EngineResult;
use crate::core::identity::{ContainerId, EntryId, ResourceRef};
use crate::core::policy::Family;
use crate::core::store::{Entry, EntryNode, EntryStore};

/// Profile entry kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileEntryKind {
    Folder,
    #[default]
    Link,
}

impl ProfileEntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileEntryKind::Folder => "folder",
            ProfileEntryKind::Link => "link",
        }
    }

    /// Anything other than `folder` reads back as a link
    pub fn from_kind(kind: &str) -> Self {
        if kind.eq_ignore_ascii_case("folder") {
            ProfileEntryKind::Folder
        } else {
            ProfileEntryKind::Link
        }
    }
}

impl std::fmt::Display for ProfileEntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A folder or link on a profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileEntry {
    pub id: EntryId,
    pub profile_id: ContainerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<EntryId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub index: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<ResourceRef>,
    #[serde(rename = "type")]
    pub kind: ProfileEntryKind,
}

impl From<Entry> for ProfileEntry {
    fn from(entry: Entry) -> Self {
        Self {
            kind: ProfileEntryKind::from_kind(&entry.kind),
            id: entry.id,
            profile_id: entry.container_id,
            parent_id: entry.parent_id,
            name: entry.name,
            index: entry.index,
            page: entry.external_ref,
        }
    }
}

/// Profile entry operations over the `profile_entry` family
#[derive(Clone)]
pub struct ProfileEntryService {
    engine: Engine,
}

impl ProfileEntryService {
    pub fn new(
        store: EntryStore,
        profiles: Arc<dyn ContainerOwner>,
        pages: Arc<dyn ResourceOwner>,
    ) -> Self {
        Self {
            engine: Engine::new(store, Family::profile_entry(), profiles, pages),
        }
    }

    pub fn from_engine(engine: Engine) -> Self {
        Self { engine }
    }

    pub fn acting_as(&self, actor: impl Into<String>) -> Self {
        Self::from_engine(self.engine.acting_as(actor))
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Create a folder, appended unless an index is given
    pub fn create_folder(
        &self,
        profile: &ContainerId,
        name: &str,
        parent: Option<EntryId>,
        index: Option<i64>,
    ) -> EngineResult<ProfileEntry> {
        self.create(profile, ProfileEntryKind::Folder, name, parent, index, None)
    }

    /// Create a link to a page
    pub fn create_link(
        &self,
        profile: &ContainerId,
        name: &str,
        page: ResourceRef,
        parent: Option<EntryId>,
        index: Option<i64>,
    ) -> EngineResult<ProfileEntry> {
        self.create(profile, ProfileEntryKind::Link, name, parent, index, Some(page))
    }

    fn create(
        &self,
        profile: &ContainerId,
        kind: ProfileEntryKind,
        name: &str,
        parent: Option<EntryId>,
        index: Option<i64>,
        page: Option<ResourceRef>,
    ) -> EngineResult<ProfileEntry> {
        let entry = self.engine.create(NewEntry {
            container_id: profile.clone(),
            parent_id: parent,
            index,
            name: Some(name.to_string()),
            kind: kind.as_str().to_string(),
            external_ref: page,
        })?;
        Ok(entry.into())
    }

    pub fn get(&self, id: &EntryId) -> EngineResult<ProfileEntry> {
        self.engine.get(id).map(ProfileEntry::from)
    }

    pub fn rename(&self, id: &EntryId, name: &str) -> EngineResult<ProfileEntry> {
        self.engine
            .update(
                id,
                EntryChanges {
                    name: Some(Some(name.to_string())),
                    ..Default::default()
                },
            )
            .map(ProfileEntry::from)
    }

    pub fn move_to(&self, id: &EntryId, index: i64) -> EngineResult<ProfileEntry> {
        self.engine.move_to(id, index).map(ProfileEntry::from)
    }

    /// Move into another folder, or to the top level with `None`
    pub fn move_into(
        &self,
        id: &EntryId,
        folder: Option<EntryId>,
        index: Option<i64>,
    ) -> EngineResult<ProfileEntry> {
        self.engine
            .reparent(id, folder, index)
            .map(ProfileEntry::from)
    }

    pub fn delete(&self, id: &EntryId) -> EngineResult<DeletionReport> {
        self.engine.delete(id)
    }

    pub fn list(
        &self,
        profile: &ContainerId,
        folder: Option<EntryId>,
    ) -> EngineResult<Vec<ProfileEntry>> {
        let entries = self.engine.children(profile, folder)?;
        Ok(entries.into_iter().map(ProfileEntry::from).collect())
    }

    /// The profile's whole entry forest
    pub fn tree(&self, profile: &ContainerId) -> EngineResult<Vec<EntryNode>> {
        self.engine.tree(profile)
    }

    pub fn on_profile_deleted(&self, profile: &ContainerId) -> EngineResult<usize> {
        self.engine.delete_by_container(profile)
    }

    pub fn on_page_deleted(
        &self,
        page: &ResourceRef,
        profile: Option<&ContainerId>,
    ) -> EngineResult<DeletionReport> {
        self.engine.delete_by_external_ref(page, profile)
    }
}
