//! Index assignment for sibling groups
//!
//! Every structural change re-derives the full order of the affected sibling
//! group from the rows read inside the caller's transaction, then writes a
//! dense `base, base + step, ...` sequence back. Nothing is applied as a
//! relative delta, so a group can never drift.

use std::collections::HashSet;

use crate::core::error::{EngineError, EngineResult, InvalidParentReason};
use crate::core::identity::{ContainerId, EntryId};
use crate::core::policy::IndexPolicy;
use crate::core::store::{Entry, Scope, StoreTx};

/// Index held by a row that has been detached from its group but not yet placed
const PENDING_INDEX: i64 = i64::MIN;

/// Direction for single-step moves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// Index the next appended entry of a scope receives
pub fn append_index(tx: &StoreTx<'_>, policy: IndexPolicy, scope: &Scope) -> EngineResult<i64> {
    policy
        .next_after(tx.max_index(scope)?)
        .ok_or_else(|| overflow(policy, scope))
}

fn overflow(policy: IndexPolicy, scope: &Scope) -> EngineError {
    tracing::warn!(
        policy = ?policy,
        container = %scope.container_id,
        "index arithmetic overflowed"
    );
    EngineError::IndexOverflow {
        base: policy.base,
        step: policy.step,
    }
}

/// Rewrite a sibling group, already in its final relative order, to dense indices
///
/// Rows that change are first parked on distinct negative indices so the
/// unique scope index never sees two rows on the same value.
pub fn renumber(
    tx: &StoreTx<'_>,
    policy: IndexPolicy,
    mut ordered: Vec<Entry>,
) -> EngineResult<Vec<Entry>> {
    if ordered.is_empty() {
        return Ok(ordered);
    }
    let targets = (0..ordered.len())
        .map(|slot| policy.index_at(slot))
        .collect::<Option<Vec<i64>>>()
        .ok_or_else(|| overflow(policy, &ordered[0].scope()))?;

    let changed: Vec<usize> = ordered
        .iter()
        .zip(&targets)
        .enumerate()
        .filter(|(_, (entry, target))| entry.index != **target)
        .map(|(slot, _)| slot)
        .collect();

    if changed.is_empty() {
        return Ok(ordered);
    }

    for (n, &slot) in changed.iter().enumerate() {
        tx.set_index(&ordered[slot].id, -(n as i64) - 1)?;
    }
    for &slot in &changed {
        let index = targets[slot];
        tx.set_index(&ordered[slot].id, index)?;
        ordered[slot].index = index;
    }

    tracing::debug!(
        family = tx.family(),
        group_size = ordered.len(),
        rewritten = changed.len(),
        "renumbered sibling group"
    );
    Ok(ordered)
}

/// Renumber the surviving children of a scope to close any gaps
pub fn close_gaps(tx: &StoreTx<'_>, policy: IndexPolicy, scope: &Scope) -> EngineResult<Vec<Entry>> {
    let siblings = tx.children_of(scope)?;
    renumber(tx, policy, siblings)
}

/// Insert a new entry, appending when no index is requested
pub fn insert_new(
    tx: &StoreTx<'_>,
    policy: IndexPolicy,
    mut entry: Entry,
    requested: Option<i64>,
) -> EngineResult<Entry> {
    let scope = entry.scope();

    let Some(requested) = requested else {
        entry.index = append_index(tx, policy, &scope)?;
        tx.insert(&entry)?;
        return Ok(entry);
    };

    let siblings = tx.children_of(&scope)?;
    entry.index = PENDING_INDEX;
    tx.insert(&entry)?;
    place(tx, policy, siblings, entry, Some(requested))
}

/// Move an entry to a requested index within its current sibling group
pub fn move_to(
    tx: &StoreTx<'_>,
    policy: IndexPolicy,
    entry: Entry,
    requested: i64,
) -> EngineResult<Entry> {
    let others = siblings_without(tx, &entry)?;
    place(tx, policy, others, entry, Some(requested))
}

/// Swap an entry with its neighbour; a no-op at either end of the group
pub fn shift(
    tx: &StoreTx<'_>,
    policy: IndexPolicy,
    entry: Entry,
    direction: Direction,
) -> EngineResult<Entry> {
    let mut siblings = tx.children_of(&entry.scope())?;
    let Some(pos) = siblings.iter().position(|e| e.id == entry.id) else {
        return Err(EngineError::EntryNotFound(entry.id));
    };

    let target = match direction {
        Direction::Up if pos > 0 => pos - 1,
        Direction::Down if pos + 1 < siblings.len() => pos + 1,
        _ => return Ok(siblings.swap_remove(pos)),
    };

    siblings.swap(pos, target);
    let mut renumbered = renumber(tx, policy, siblings)?;
    Ok(renumbered.swap_remove(target))
}

/// Move an entry under a new parent (or to root level)
///
/// The old group is renumbered to close the gap; the entry is appended to the
/// new group, or placed at `requested` when given, and that group renumbered.
pub fn reparent(
    tx: &StoreTx<'_>,
    policy: IndexPolicy,
    mut entry: Entry,
    new_parent: Option<EntryId>,
    requested: Option<i64>,
) -> EngineResult<Entry> {
    if new_parent == entry.parent_id {
        return match requested {
            Some(requested) => move_to(tx, policy, entry, requested),
            None => Ok(entry),
        };
    }

    if let Some(parent_id) = new_parent {
        validate_parent(tx, Some(&entry.id), &entry.container_id, parent_id)?;
    }

    let old_scope = entry.scope();
    entry.parent_id = new_parent;
    entry.index = PENDING_INDEX;
    tx.update(&entry)?;
    close_gaps(tx, policy, &old_scope)?;

    let others = siblings_without(tx, &entry)?;
    place(tx, policy, others, entry, requested)
}

/// Check that `parent_id` may parent an entry of `container`
///
/// When `moving` is set, also rejects parents inside the moving entry's own
/// subtree. The walk is bounded by the depth of the parent's ancestor chain.
pub fn validate_parent(
    tx: &StoreTx<'_>,
    moving: Option<&EntryId>,
    container: &ContainerId,
    parent_id: EntryId,
) -> EngineResult<Entry> {
    let parent = tx
        .find(&parent_id)?
        .ok_or(EngineError::ParentNotFound(parent_id))?;

    let invalid = |reason| EngineError::InvalidParent {
        parent: parent_id,
        reason,
    };

    if &parent.container_id != container {
        return Err(invalid(InvalidParentReason::CrossContainer));
    }

    let Some(moving) = moving else {
        return Ok(parent);
    };
    if *moving == parent_id {
        return Err(invalid(InvalidParentReason::SelfParent));
    }

    let mut visited = HashSet::from([parent_id]);
    let mut cursor = parent.parent_id;
    while let Some(ancestor) = cursor {
        if ancestor == *moving {
            return Err(invalid(InvalidParentReason::Cycle));
        }
        if !visited.insert(ancestor) {
            return Err(invalid(InvalidParentReason::CorruptChain));
        }
        cursor = tx.get(&ancestor)?.parent_id;
    }

    tracing::debug!(parent = %parent_id, depth = visited.len(), "ancestor walk passed");
    Ok(parent)
}

/// Current siblings of `entry`, excluding the entry itself
fn siblings_without(tx: &StoreTx<'_>, entry: &Entry) -> EngineResult<Vec<Entry>> {
    let mut siblings = tx.children_of(&entry.scope())?;
    siblings.retain(|e| e.id != entry.id);
    Ok(siblings)
}

/// Place `entry` among `others` at the requested slot (last when `None`)
fn place(
    tx: &StoreTx<'_>,
    policy: IndexPolicy,
    mut others: Vec<Entry>,
    entry: Entry,
    requested: Option<i64>,
) -> EngineResult<Entry> {
    let slot = requested.map_or(others.len(), |r| policy.slot_for(r, others.len()));
    others.insert(slot, entry);
    let mut renumbered = renumber(tx, policy, others)?;
    Ok(renumbered.swap_remove(slot))
}
