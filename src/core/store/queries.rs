//! Query methods for listing stored entries
//!
//! Filtered, sorted, paginated views with a total count over the filtered set.

use std::collections::BTreeMap;

use super::{entry_from_row, Entry, EntryFilter, EntryNode, EntryQuery, Page, ParentFilter, StoreTx};
use super::ENTRY_COLUMNS;
use crate::core::error::EngineResult;
use crate::core::identity::{ContainerId, EntryId};

impl StoreTx<'_> {
    /// List entries matching a query, plus the size of the whole filtered set
    pub fn query(&self, query: &EntryQuery) -> EngineResult<Page<Entry>> {
        let (where_sql, params_vec) = self.filter_clause(&query.filter);
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM entries WHERE {where_sql}"),
            params_refs.as_slice(),
            |row| row.get(0),
        )?;

        let mut sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM entries WHERE {where_sql} ORDER BY {} {}, id {}",
            query.sort.column(),
            query.order.keyword(),
            query.order.keyword(),
        );
        match query.limit {
            Some(limit) => sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, query.offset)),
            None if query.offset > 0 => sql.push_str(&format!(" LIMIT -1 OFFSET {}", query.offset)),
            None => {}
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_refs.as_slice(), entry_from_row)?;
        let items = rows.collect::<Result<Vec<_>, _>>()?;

        Ok(Page {
            items,
            total: total as usize,
        })
    }

    /// The whole entry forest of a container, children ordered by index
    pub fn tree(&self, container: &ContainerId) -> EngineResult<Vec<EntryNode>> {
        let mut by_parent: BTreeMap<Option<EntryId>, Vec<Entry>> = BTreeMap::new();
        for entry in self.in_container(container)? {
            by_parent.entry(entry.parent_id).or_default().push(entry);
        }
        for siblings in by_parent.values_mut() {
            siblings.sort_by_key(|e| e.index);
        }
        Ok(build_nodes(None, &mut by_parent))
    }

    fn filter_clause(&self, filter: &EntryFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut sql = String::from("family = ?");
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(self.family.to_string())];

        if let Some(ref container) = filter.container_id {
            sql.push_str(" AND container_id = ?");
            params_vec.push(Box::new(container.clone()));
        }

        match filter.parent {
            Some(ParentFilter::Root) => sql.push_str(" AND parent_id IS NULL"),
            Some(ParentFilter::Entry(parent)) => {
                sql.push_str(" AND parent_id = ?");
                params_vec.push(Box::new(parent));
            }
            None => {}
        }

        if let Some(ref external_ref) = filter.external_ref {
            sql.push_str(" AND external_ref = ?");
            params_vec.push(Box::new(external_ref.clone()));
        }

        if let Some(ref name) = filter.name {
            sql.push_str(" AND name = ?");
            params_vec.push(Box::new(name.clone()));
        }

        if let Some(ref kind) = filter.kind {
            sql.push_str(" AND kind = ?");
            params_vec.push(Box::new(kind.clone()));
        }

        (sql, params_vec)
    }
}

fn build_nodes(
    parent: Option<EntryId>,
    by_parent: &mut BTreeMap<Option<EntryId>, Vec<Entry>>,
) -> Vec<EntryNode> {
    let Some(siblings) = by_parent.remove(&parent) else {
        return Vec::new();
    };
    siblings
        .into_iter()
        .map(|entry| {
            let children = build_nodes(Some(entry.id), by_parent);
            EntryNode { entry, children }
        })
        .collect()
}
