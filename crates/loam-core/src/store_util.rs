use loam_store::{ObjectId, Store, StorePath};

use crate::error::Result;

/// Resolve `path` to an [`ObjectId`], substituting the empty-tree id if
/// nothing lives there yet. `scratch_parent` is a throwaway location used to
/// synthesize that empty tree (the store has no standing "the empty tree"
/// constant to stat directly).
pub fn stat_or_empty(store: &mut impl Store, path: &StorePath, scratch_parent: &StorePath) -> Result<ObjectId> {
    match store.stat(path) {
        Ok(id) => Ok(id),
        Err(_) => {
            let scratch = scratch_parent.clone().join("_scratch_empty");
            store.mkdir(&scratch, true)?;
            let id = store.stat(&scratch)?;
            store.rm(&scratch, true)?;
            Ok(id)
        }
    }
}

/// Join a `/`-separated relative path onto a store path, a no-op for an
/// empty `rel`.
pub fn join_relative(base: &StorePath, rel: &str) -> StorePath {
    if rel.is_empty() {
        return base.clone();
    }
    StorePath::named(base.segments().iter().cloned().chain(rel.split('/').map(str::to_string)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use loam_store::MemStore;

    #[test]
    fn stat_or_empty_returns_real_id_when_present() {
        let mut store = MemStore::in_memory();
        let p = StorePath::named(["a.txt"]);
        store.write(&p, b"x", true, true).unwrap();
        let id = stat_or_empty(&mut store, &p, &StorePath::named(["scratch"])).unwrap();
        assert_eq!(id, store.stat(&p).unwrap());
    }

    #[test]
    fn stat_or_empty_synthesizes_empty_tree_when_missing() {
        let mut store = MemStore::in_memory();
        let p = StorePath::named(["missing"]);
        let id = stat_or_empty(&mut store, &p, &StorePath::named(["scratch"])).unwrap();
        assert!(store.ls(&StorePath::by_hash(id, Vec::<String>::new())).unwrap().is_empty());
    }
}
