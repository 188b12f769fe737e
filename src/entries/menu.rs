//! Application menus
//!
//! Menus belong to an application, may nest under a parent menu of the same
//! application and may point at a page. Indices start at 1 with step 1.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::cascade::DeletionReport;
use crate::core::collaborators::{ContainerOwner, ResourceOwner};
use crate::core::engine::{Engine, EntryChanges, NewEntry};
use crate::core::error::EngineResult;
use crate::core::identity::{ContainerId, EntryId, ResourceRef};
use crate::core::policy::Family;
use crate::core::store::{Entry, EntryFilter, EntryQuery, EntryStore, Page, ParentFilter};

/// Kind string menus carry in the engine
pub const MENU_KIND: &str = "menu";

/// An application menu
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Menu {
    pub id: EntryId,
    pub application_id: ContainerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_menu_id: Option<EntryId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub index: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_id: Option<ResourceRef>,
}

impl From<Entry> for Menu {
    fn from(entry: Entry) -> Self {
        Self {
            id: entry.id,
            application_id: entry.container_id,
            parent_menu_id: entry.parent_id,
            display_name: entry.name,
            index: entry.index,
            page_id: entry.external_ref,
        }
    }
}

/// Fields for a new menu
#[derive(Debug, Clone, Default)]
pub struct MenuCreator {
    pub display_name: Option<String>,
    pub parent_menu_id: Option<EntryId>,
    pub index: Option<i64>,
    pub page_id: Option<ResourceRef>,
}

/// Fields to change on a menu; `None` leaves a field as is
#[derive(Debug, Clone, Default)]
pub struct MenuUpdater {
    pub display_name: Option<String>,
    pub parent_menu_id: Option<Option<EntryId>>,
    pub index: Option<i64>,
    pub page_id: Option<Option<ResourceRef>>,
}

/// Menu operations over the `application_menu` family
#[derive(Clone)]
pub struct MenuService {
    engine: Engine,
}

impl MenuService {
    pub fn new(
        store: EntryStore,
        applications: Arc<dyn ContainerOwner>,
        pages: Arc<dyn ResourceOwner>,
    ) -> Self {
        Self::from_engine(Engine::new(
            store,
            Family::application_menu(),
            applications,
            pages,
        ))
    }

    /// Wrap an engine already bound to the menu family
    pub fn from_engine(engine: Engine) -> Self {
        Self { engine }
    }

    pub fn acting_as(&self, actor: impl Into<String>) -> Self {
        Self::from_engine(self.engine.acting_as(actor))
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn create(&self, application: &ContainerId, creator: MenuCreator) -> EngineResult<Menu> {
        let entry = self.engine.create(NewEntry {
            container_id: application.clone(),
            parent_id: creator.parent_menu_id,
            index: creator.index,
            name: creator.display_name,
            kind: MENU_KIND.to_string(),
            external_ref: creator.page_id,
        })?;
        Ok(entry.into())
    }

    pub fn get(&self, id: &EntryId) -> EngineResult<Menu> {
        self.engine.get(id).map(Menu::from)
    }

    pub fn update(&self, id: &EntryId, updater: MenuUpdater) -> EngineResult<Menu> {
        let entry = self.engine.update(
            id,
            EntryChanges {
                name: updater.display_name.map(Some),
                kind: None,
                external_ref: updater.page_id,
                parent_id: updater.parent_menu_id,
                index: updater.index,
            },
        )?;
        Ok(entry.into())
    }

    pub fn move_up(&self, id: &EntryId) -> EngineResult<Menu> {
        self.engine.move_up(id).map(Menu::from)
    }

    pub fn move_down(&self, id: &EntryId) -> EngineResult<Menu> {
        self.engine.move_down(id).map(Menu::from)
    }

    /// Delete a menu and its sub-menus
    pub fn delete(&self, id: &EntryId) -> EngineResult<DeletionReport> {
        self.engine.delete(id)
    }

    /// Ordered menus of an application under `parent` (top level with `None`)
    pub fn list(
        &self,
        application: &ContainerId,
        parent: Option<EntryId>,
    ) -> EngineResult<Vec<Menu>> {
        let entries = self.engine.children(application, parent)?;
        Ok(entries.into_iter().map(Menu::from).collect())
    }

    /// Paginated menu search, ordered by index
    pub fn search(
        &self,
        application: &ContainerId,
        parent: Option<ParentFilter>,
        offset: usize,
        limit: usize,
    ) -> EngineResult<Page<Menu>> {
        let page = self.engine.query(
            &EntryQuery::new(EntryFilter {
                container_id: Some(application.clone()),
                parent,
                ..Default::default()
            })
            .page(offset, limit),
        )?;
        Ok(Page {
            items: page.items.into_iter().map(Menu::from).collect(),
            total: page.total,
        })
    }

    /// The application is being deleted
    pub fn on_application_deleted(&self, application: &ContainerId) -> EngineResult<usize> {
        self.engine.delete_by_container(application)
    }

    /// A page was deleted, from one application or everywhere
    pub fn on_page_deleted(
        &self,
        page: &ResourceRef,
        application: Option<&ContainerId>,
    ) -> EngineResult<DeletionReport> {
        self.engine.delete_by_external_ref(page, application)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::collaborators::{ContainerRegistry, ResourceRegistry};

    fn service() -> MenuService {
        let applications = Arc::new(ContainerRegistry::new());
        applications.register("app");
        let pages = Arc::new(ResourceRegistry::new());
        pages.register("page-1");
        MenuService::new(EntryStore::in_memory().unwrap(), applications, pages)
    }

    fn named(name: &str) -> MenuCreator {
        MenuCreator {
            display_name: Some(name.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_menus_are_numbered_from_one() {
        let menus = service();
        let app = ContainerId::from("app");

        let main = menus.create(&app, named("Main")).unwrap();
        let second = menus.create(&app, named("second menu")).unwrap();

        assert_eq!(main.index, 1);
        assert_eq!(second.index, 2);
        assert_eq!(main.application_id, app);
    }

    #[test]
    fn test_update_moves_under_parent_menu() {
        let menus = service();
        let app = ContainerId::from("app");
        let parent = menus.create(&app, named("parent")).unwrap();
        let child = menus.create(&app, named("child")).unwrap();

        let moved = menus
            .update(
                &child.id,
                MenuUpdater {
                    parent_menu_id: Some(Some(parent.id)),
                    display_name: Some("renamed".into()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(moved.parent_menu_id, Some(parent.id));
        assert_eq!(moved.display_name.as_deref(), Some("renamed"));
        assert_eq!(moved.index, 1);
        assert_eq!(menus.list(&app, None).unwrap(), vec![parent.clone()]);
        assert_eq!(menus.list(&app, Some(parent.id)).unwrap(), vec![moved]);
    }

    #[test]
    fn test_search_pages_top_level_menus() {
        let menus = service();
        let app = ContainerId::from("app");
        for name in ["a", "b", "c"] {
            menus.create(&app, named(name)).unwrap();
        }

        let page = menus
            .search(&app, Some(ParentFilter::Root), 1, 1)
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items[0].display_name.as_deref(), Some("b"));
    }

    #[test]
    fn test_page_delete_keeps_menus_of_other_pages() {
        let menus = service();
        let app = ContainerId::from("app");
        menus
            .create(
                &app,
                MenuCreator {
                    page_id: Some(ResourceRef::from("page-1")),
                    ..named("linked")
                },
            )
            .unwrap();
        menus.create(&app, named("plain")).unwrap();

        let report = menus
            .on_page_deleted(&ResourceRef::from("page-1"), Some(&app))
            .unwrap();
        assert_eq!(report.len(), 1);

        let left = menus.list(&app, None).unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].display_name.as_deref(), Some("plain"));
        assert_eq!(left[0].index, 1);
    }

    #[test]
    fn test_serializes_without_empty_fields() {
        let menus = service();
        let menu = menus
            .create(&ContainerId::from("app"), MenuCreator::default())
            .unwrap();
        let json = serde_json::to_value(&menu).unwrap();
        assert!(json.get("page_id").is_none());
        assert_eq!(json["index"], 1);
    }
}
