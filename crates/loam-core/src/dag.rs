use std::collections::{HashSet, VecDeque};

use loam_store::{ObjectId, Store, StorePath};

use crate::error::{LoamError, Result};
use crate::layout::CommitPaths;

/// Walk a branch's first-parent chain starting at `head`, most recent
/// first. Stops at the first commit with no `parent` link.
pub fn history(store: &impl Store, head: &ObjectId) -> Result<Vec<ObjectId>> {
    let mut out = Vec::new();
    let mut cursor = head.clone();
    loop {
        out.push(cursor.clone());
        let root = StorePath::by_hash(cursor.clone(), Vec::<String>::new());
        match store.stat(&CommitPaths::parent(&root)) {
            Ok(parent) => cursor = parent,
            Err(_) => break,
        }
    }
    Ok(out)
}

fn expand(store: &impl Store, node: &ObjectId) -> Vec<ObjectId> {
    let root = StorePath::by_hash(node.clone(), Vec::<String>::new());
    let mut out = Vec::new();
    if let Ok(p) = store.stat(&CommitPaths::parent(&root)) {
        out.push(p);
    }
    if let Ok(mp) = store.stat(&CommitPaths::merge_parent(&root)) {
        out.push(mp);
    }
    out
}

/// Find a lowest common ancestor of `ours` and `theirs` in the
/// `parent ∪ merge_parent` DAG, via balanced bidirectional BFS: one
/// frontier node per side expands per iteration, tested against the
/// other side's accumulated reachability set. Returns
/// [`LoamError::UnrelatedHistories`] once either frontier is exhausted
/// without an intersection.
pub fn lowest_common_ancestor(
    store: &impl Store,
    ours: &ObjectId,
    theirs: &ObjectId,
    ours_label: &str,
    theirs_label: &str,
) -> Result<ObjectId> {
    if ours == theirs {
        return Ok(ours.clone());
    }

    let mut seen_ours: HashSet<ObjectId> = HashSet::from([ours.clone()]);
    let mut seen_theirs: HashSet<ObjectId> = HashSet::from([theirs.clone()]);
    let mut frontier_ours: VecDeque<ObjectId> = VecDeque::from([ours.clone()]);
    let mut frontier_theirs: VecDeque<ObjectId> = VecDeque::from([theirs.clone()]);

    loop {
        if let Some(node) = frontier_ours.pop_front() {
            for next in expand(store, &node) {
                if seen_theirs.contains(&next) {
                    return Ok(next);
                }
                if seen_ours.insert(next.clone()) {
                    frontier_ours.push_back(next);
                }
            }
        } else {
            return Err(LoamError::UnrelatedHistories {
                ours: ours_label.to_string(),
                theirs: theirs_label.to_string(),
            });
        }

        if let Some(node) = frontier_theirs.pop_front() {
            for next in expand(store, &node) {
                if seen_ours.contains(&next) {
                    return Ok(next);
                }
                if seen_theirs.insert(next.clone()) {
                    frontier_theirs.push_back(next);
                }
            }
        } else {
            return Err(LoamError::UnrelatedHistories {
                ours: ours_label.to_string(),
                theirs: theirs_label.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loam_store::MemStore;

    fn make_commit(store: &mut MemStore, parent: Option<&ObjectId>) -> ObjectId {
        make_commit_marked(store, parent, "")
    }

    fn make_commit_marked(store: &mut MemStore, parent: Option<&ObjectId>, marker: &str) -> ObjectId {
        let scratch = StorePath::named(["scratch"]);
        store.mkdir(&scratch, true).unwrap();
        if !marker.is_empty() {
            store.write(&scratch.clone().join("marker"), marker.as_bytes(), true, true).unwrap();
        }
        if let Some(p) = parent {
            store
                .cp(&StorePath::by_hash(p.clone(), Vec::<String>::new()), &CommitPaths::parent(&scratch))
                .unwrap();
        }
        let id = store.stat(&scratch).unwrap();
        store.rm(&scratch, true).unwrap();
        id
    }

    #[test]
    fn lca_of_identical_commits_is_itself() {
        let mut store = MemStore::in_memory();
        let c = make_commit(&mut store, None);
        assert_eq!(lowest_common_ancestor(&store, &c, &c, "a", "b").unwrap(), c);
    }

    #[test]
    fn lca_finds_shared_ancestor_through_parent_chain() {
        let mut store = MemStore::in_memory();
        let root = make_commit(&mut store, None);
        let ours = make_commit_marked(&mut store, Some(&root), "ours");
        let theirs = make_commit_marked(&mut store, Some(&root), "theirs");
        assert_eq!(lowest_common_ancestor(&store, &ours, &theirs, "ours", "theirs").unwrap(), root);
    }

    #[test]
    fn unrelated_histories_is_an_error() {
        let mut store = MemStore::in_memory();
        let a = make_commit_marked(&mut store, None, "a");
        let b = make_commit_marked(&mut store, None, "b");
        assert!(lowest_common_ancestor(&store, &a, &b, "a", "b").is_err());
    }

    #[test]
    fn history_walks_first_parent_chain_only() {
        let mut store = MemStore::in_memory();
        let c1 = make_commit(&mut store, None);
        let c2 = make_commit(&mut store, Some(&c1));
        let c3 = make_commit(&mut store, Some(&c2));
        let h = history(&store, &c3).unwrap();
        assert_eq!(h, vec![c3, c2, c1]);
    }
}
