//! Ordering and cascade invariants under random operation sequences

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use navtree::core::{
    ContainerRegistry, EngineError, InvalidParentReason, ResourceRegistry, Scope,
};
use navtree::{
    ContainerId, Engine, Entry, EntryId, EntryStore, Family, IndexPolicy, NewEntry, ResourceRef,
};
use proptest::prelude::*;

const CONTAINERS: [&str; 2] = ["c1", "c2"];
const PAGES: [&str; 3] = ["p1", "p2", "p3"];

/// One step of a random session; `pick` values select among live entries
#[derive(Clone, Debug)]
enum Op {
    Create {
        container: usize,
        parent: Option<usize>,
        index: Option<i64>,
        page: Option<usize>,
    },
    Move {
        pick: usize,
        index: i64,
    },
    Up(usize),
    Down(usize),
    Reparent {
        pick: usize,
        parent: Option<usize>,
        index: Option<i64>,
    },
    Delete(usize),
    DeletePage {
        page: usize,
        container: Option<usize>,
    },
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..2usize, prop::option::of(any::<usize>()), prop::option::of(-2..12i64), prop::option::of(0..3usize))
            .prop_map(|(container, parent, index, page)| Op::Create { container, parent, index, page }),
        2 => (any::<usize>(), -2..12i64).prop_map(|(pick, index)| Op::Move { pick, index }),
        1 => any::<usize>().prop_map(Op::Up),
        1 => any::<usize>().prop_map(Op::Down),
        2 => (any::<usize>(), prop::option::of(any::<usize>()), prop::option::of(-2..12i64))
            .prop_map(|(pick, parent, index)| Op::Reparent { pick, parent, index }),
        1 => any::<usize>().prop_map(Op::Delete),
        1 => (0..3usize, prop::option::of(0..2usize))
            .prop_map(|(page, container)| Op::DeletePage { page, container }),
    ]
}

fn arb_family() -> impl Strategy<Value = Family> {
    prop_oneof![
        Just(Family::application_menu()),
        Just(Family::profile_entry()),
        Just(Family::new("custom", IndexPolicy { base: 3, step: 5 })),
    ]
}

fn engine(family: Family) -> Engine {
    let containers = Arc::new(ContainerRegistry::new());
    for container in CONTAINERS {
        containers.register(container);
    }
    let pages = Arc::new(ResourceRegistry::new());
    for page in PAGES {
        pages.register(page);
    }
    Engine::new(EntryStore::in_memory().unwrap(), family, containers, pages)
}

fn all_entries(engine: &Engine) -> Vec<Entry> {
    CONTAINERS
        .iter()
        .flat_map(|c| {
            engine
                .tree(&ContainerId::from(*c))
                .unwrap()
                .into_iter()
                .flat_map(flatten)
        })
        .collect()
}

fn flatten(node: navtree::core::EntryNode) -> Vec<Entry> {
    let mut out = vec![node.entry];
    for child in node.children {
        out.extend(flatten(child));
    }
    out
}

fn nth(entries: &[Entry], pick: usize) -> Option<&Entry> {
    if entries.is_empty() {
        None
    } else {
        entries.get(pick % entries.len())
    }
}

/// Errors a random session may legitimately run into
fn expected(err: &EngineError) -> bool {
    matches!(
        err,
        EngineError::InvalidParent {
            reason: InvalidParentReason::CrossContainer
                | InvalidParentReason::SelfParent
                | InvalidParentReason::Cycle,
            ..
        }
    )
}

fn apply(engine: &Engine, op: &Op) {
    let entries = all_entries(engine);
    let result = match op {
        Op::Create {
            container,
            parent,
            index,
            page,
        } => {
            let mut new = NewEntry::new(CONTAINERS[*container], "item");
            new.parent_id = parent.and_then(|p| nth(&entries, p)).map(|e| e.id);
            new.index = *index;
            new.external_ref = page.map(|p| ResourceRef::from(PAGES[p]));
            engine.create(new).map(drop)
        }
        Op::Move { pick, index } => match nth(&entries, *pick) {
            Some(entry) => engine.move_to(&entry.id, *index).map(drop),
            None => Ok(()),
        },
        Op::Up(pick) => match nth(&entries, *pick) {
            Some(entry) => engine.move_up(&entry.id).map(drop),
            None => Ok(()),
        },
        Op::Down(pick) => match nth(&entries, *pick) {
            Some(entry) => engine.move_down(&entry.id).map(drop),
            None => Ok(()),
        },
        Op::Reparent {
            pick,
            parent,
            index,
        } => match nth(&entries, *pick) {
            Some(entry) => {
                let parent = parent.and_then(|p| nth(&entries, p)).map(|e| e.id);
                engine.reparent(&entry.id, parent, *index).map(drop)
            }
            None => Ok(()),
        },
        Op::Delete(pick) => match nth(&entries, *pick) {
            Some(entry) => engine.delete(&entry.id).map(drop),
            None => Ok(()),
        },
        Op::DeletePage { page, container } => {
            let container = container.map(|c| ContainerId::from(CONTAINERS[c]));
            engine
                .delete_by_external_ref(&ResourceRef::from(PAGES[*page]), container.as_ref())
                .map(drop)
        }
    };

    if let Err(err) = result {
        assert!(expected(&err), "unexpected error for {op:?}: {err}");
    }
}

fn check_invariants(engine: &Engine) -> Result<(), TestCaseError> {
    let policy = engine.family().policy();
    let entries = all_entries(engine);
    let by_id: BTreeMap<EntryId, &Entry> = entries.iter().map(|e| (e.id, e)).collect();

    let mut groups: BTreeMap<Scope, Vec<i64>> = BTreeMap::new();
    for entry in &entries {
        groups.entry(entry.scope()).or_default().push(entry.index);
        if let Some(parent) = entry.parent_id {
            let parent = by_id.get(&parent);
            prop_assert!(parent.is_some(), "dangling parent");
            prop_assert_eq!(&parent.map(|p| &p.container_id), &Some(&entry.container_id));
        }
    }

    for (scope, mut indices) in groups {
        indices.sort_unstable();
        let dense: Vec<i64> = (0..indices.len()).map(|slot| policy.index_at(slot).unwrap()).collect();
        prop_assert_eq!(indices, dense, "scope {:?} is not dense", scope);
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn sibling_groups_stay_dense(family in arb_family(), ops in prop::collection::vec(arb_op(), 1..40)) {
        let engine = engine(family);
        for op in &ops {
            apply(&engine, op);
            check_invariants(&engine)?;
        }
    }

    #[test]
    fn appends_follow_the_policy(family in arb_family(), count in 1..12usize) {
        let engine = engine(family);
        let policy = engine.family().policy();
        let indices: Vec<i64> = (0..count)
            .map(|_| engine.create(NewEntry::new("c1", "item")).unwrap().index)
            .collect();
        let expected: Vec<i64> = (0..count).map(|slot| policy.index_at(slot).unwrap()).collect();
        prop_assert_eq!(indices, expected);
    }

    #[test]
    fn delete_removes_exactly_the_subtree(ops in prop::collection::vec(arb_op(), 1..30), pick in any::<usize>()) {
        let engine = engine(Family::application_menu());
        for op in &ops {
            apply(&engine, op);
        }
        let before = all_entries(&engine);
        let Some(victim) = nth(&before, pick).cloned() else {
            return Ok(());
        };

        let mut closure = HashSet::from([victim.id]);
        loop {
            let grew: Vec<EntryId> = before
                .iter()
                .filter(|e| e.parent_id.is_some_and(|p| closure.contains(&p)) && !closure.contains(&e.id))
                .map(|e| e.id)
                .collect();
            if grew.is_empty() {
                break;
            }
            closure.extend(grew);
        }

        let report = engine.delete(&victim.id).unwrap();
        let removed: HashSet<EntryId> = report.removed.into_iter().collect();
        prop_assert_eq!(&removed, &closure);

        let after: HashSet<EntryId> = all_entries(&engine).into_iter().map(|e| e.id).collect();
        let expected: HashSet<EntryId> = before.iter().map(|e| e.id).filter(|id| !closure.contains(id)).collect();
        prop_assert_eq!(after, expected);
        check_invariants(&engine)?;
    }
}
