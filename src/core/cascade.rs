//! Cascading deletion
//!
//! Computes the full deletion set for a trigger (an entry, a container, or an
//! external resource) and applies it inside the caller's transaction. A
//! failure anywhere aborts the whole unit, so a dangling subtree or a stale
//! sibling index is never committed.

use std::collections::{BTreeSet, HashSet, VecDeque};

use crate::core::error::EngineResult;
use crate::core::identity::{ContainerId, EntryId, ResourceRef};
use crate::core::ordering::close_gaps;
use crate::core::policy::IndexPolicy;
use crate::core::store::{Entry, Scope, StoreTx};

/// What a deletion removed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionReport {
    /// Removed entry ids, parents before children
    pub removed: Vec<EntryId>,
    /// Containers whose surviving entries changed
    pub containers: BTreeSet<ContainerId>,
}

impl DeletionReport {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.removed.len()
    }
}

/// An entry followed by all of its descendants, breadth first
pub fn subtree(tx: &StoreTx<'_>, root: &Entry) -> EngineResult<Vec<Entry>> {
    let mut collected = vec![root.clone()];
    let mut queue = VecDeque::from([root.id]);

    while let Some(parent) = queue.pop_front() {
        let children = tx.children_of(&Scope {
            container_id: root.container_id.clone(),
            parent_id: Some(parent),
        })?;
        queue.extend(children.iter().map(|c| c.id));
        collected.extend(children);
    }

    Ok(collected)
}

/// Delete an entry and its whole subtree, then close the gap it leaves
pub fn delete_entry(
    tx: &StoreTx<'_>,
    policy: IndexPolicy,
    id: &EntryId,
) -> EngineResult<DeletionReport> {
    let root = tx.get(id)?;
    let doomed = subtree(tx, &root)?;
    remove(tx, &doomed)?;
    close_gaps(tx, policy, &root.scope())?;

    Ok(DeletionReport {
        removed: doomed.into_iter().map(|e| e.id).collect(),
        containers: BTreeSet::from([root.container_id]),
    })
}

/// Delete every entry of a container; no scope survives, so nothing is renumbered
pub fn delete_container(tx: &StoreTx<'_>, container: &ContainerId) -> EngineResult<usize> {
    let removed = tx.delete_container(container)?;
    tracing::debug!(container = %container, removed, "deleted container entries");
    Ok(removed)
}

/// Delete every entry referencing `resource`, with its subtree
///
/// Restricted to one container when `container` is set, global otherwise.
/// Entries outside those subtrees that reference other resources, or none,
/// are untouched. Descendants of a referencing entry go with it whatever they
/// reference, since no surviving entry may point at a deleted parent. Each
/// affected sibling group is renumbered afterwards.
pub fn delete_referencing(
    tx: &StoreTx<'_>,
    policy: IndexPolicy,
    resource: &ResourceRef,
    container: Option<&ContainerId>,
) -> EngineResult<DeletionReport> {
    let roots = tx.referencing(resource, container)?;

    let mut trees = Vec::with_capacity(roots.len());
    let mut doomed_ids = HashSet::new();
    for root in &roots {
        if doomed_ids.contains(&root.id) {
            continue;
        }
        let tree = subtree(tx, root)?;
        doomed_ids.extend(tree.iter().map(|e| e.id));
        trees.push(tree);
    }

    // A referencing entry nested under another one is covered by the outer tree
    let mut report = DeletionReport::default();
    let mut scopes = BTreeSet::new();
    for tree in trees {
        let top = &tree[0];
        if top.parent_id.is_some_and(|p| doomed_ids.contains(&p)) {
            continue;
        }
        remove(tx, &tree)?;
        scopes.insert(top.scope());
        report.removed.extend(tree.iter().map(|e| e.id));
    }

    for scope in scopes {
        close_gaps(tx, policy, &scope)?;
        report.containers.insert(scope.container_id);
    }

    tracing::debug!(
        resource = %resource,
        removed = report.removed.len(),
        "deleted entries referencing resource"
    );
    Ok(report)
}

/// Delete a breadth-first subtree, deepest rows first
fn remove(tx: &StoreTx<'_>, tree: &[Entry]) -> EngineResult<()> {
    for entry in tree.iter().rev() {
        tx.delete(&entry.id)?;
    }
    Ok(())
}
