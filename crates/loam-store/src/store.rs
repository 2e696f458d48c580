use std::collections::BTreeMap;
use std::path::Path as FsPath;

use crate::diff::{diff_objects, ObjectChange};
use crate::error::{Result, StoreError};
use crate::object::{Kind, ObjectId, StoredObject};
use crate::path::StorePath;
use crate::table::{FsTable, MemTable, ObjectTable};

/// One entry of a directory listing, as returned by `ls`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: Kind,
    pub id: ObjectId,
}

/// The store capability the rest of the engine is built against: a
/// content-addressed object graph with a single mutable root tree playing
/// the role of the MFS namespace.
///
/// Every mutating method operates on the namespace rooted at `self.root()`;
/// [`StorePath::ByHash`] addresses are read-only views into arbitrary
/// content, usable as a `cp` source or `object_diff` operand regardless of
/// whether that content is reachable from the current root.
pub trait Store {
    fn root(&self) -> ObjectId;
    fn set_root(&mut self, id: ObjectId);

    fn stat(&self, path: &StorePath) -> Result<ObjectId>;
    fn read(&self, path: &StorePath) -> Result<Vec<u8>>;
    fn write(&mut self, path: &StorePath, bytes: &[u8], create: bool, truncate: bool) -> Result<()>;
    fn cp(&mut self, src: &StorePath, dst: &StorePath) -> Result<()>;
    fn rm(&mut self, path: &StorePath, recursive: bool) -> Result<()>;
    fn mkdir(&mut self, path: &StorePath, parents: bool) -> Result<()>;
    fn ls(&self, path: &StorePath) -> Result<Vec<DirEntry>>;
    fn cat(&self, id: &ObjectId) -> Result<Vec<u8>>;
    fn add(&mut self, fs_path: &FsPath) -> Result<ObjectId>;
    fn object_diff(&self, a: &ObjectId, b: &ObjectId) -> Result<Vec<ObjectChange>>;
}

/// Generic store built on top of any [`ObjectTable`]. All namespace-tree
/// logic (descent, copy-on-write rebuild, parent creation) lives here once;
/// [`MemStore`] and [`FsStore`] are thin aliases over it with different
/// backing tables.
pub struct TreeStore<T: ObjectTable> {
    table: T,
    root: ObjectId,
}

impl<T: ObjectTable> TreeStore<T> {
    pub fn new(mut table: T) -> Result<Self> {
        let root = table.put(StoredObject::empty_tree())?;
        Ok(Self { table, root })
    }

    fn root_of(&self, path: &StorePath) -> Result<ObjectId> {
        match path {
            StorePath::Named(_) => Ok(self.root.clone()),
            StorePath::ByHash(id, _) => Ok(id.clone()),
        }
    }

    fn resolve(&self, path: &StorePath) -> Result<ObjectId> {
        let mut cur = self.root_of(path)?;
        for seg in path.segments() {
            let obj = self.table.get(&cur)?;
            let StoredObject::Tree(entries) = obj else {
                return Err(StoreError::NotATree(path.display()));
            };
            cur = entries
                .get(seg)
                .map(|(_, id)| id.clone())
                .ok_or_else(|| StoreError::NotFound(path.display()))?;
        }
        Ok(cur)
    }

    /// Replace the object at `path` with `new_id`, rebuilding every ancestor
    /// tree up to the namespace root. `create_parents` controls whether
    /// missing intermediate directories are synthesized as empty trees.
    fn set(&mut self, path: &StorePath, new_id: ObjectId, new_kind: Kind, create_parents: bool) -> Result<()> {
        if matches!(path, StorePath::ByHash(..)) {
            return Err(StoreError::NotFound(
                "content-addressed paths are read-only".to_string(),
            ));
        }
        let root = self.root.clone();
        let updated = self.set_rec(&root, path.segments(), new_id, new_kind, create_parents, path)?;
        self.root = updated;
        Ok(())
    }

    fn set_rec(
        &mut self,
        node: &ObjectId,
        segs: &[String],
        new_id: ObjectId,
        new_kind: Kind,
        create_parents: bool,
        orig_path: &StorePath,
    ) -> Result<ObjectId> {
        let Some((head, tail)) = segs.split_first() else {
            return Ok(new_id);
        };
        let obj = self.table.get(node)?;
        let mut entries = match obj {
            StoredObject::Tree(e) => e,
            StoredObject::Blob(_) => return Err(StoreError::NotATree(orig_path.display())),
        };
        let child = match entries.get(head) {
            Some((_, id)) => id.clone(),
            None if tail.is_empty() || create_parents => {
                self.table.put(StoredObject::empty_tree())?
            }
            None => return Err(StoreError::NoParent(orig_path.display())),
        };
        let updated_child = self.set_rec(&child, tail, new_id, new_kind, create_parents, orig_path)?;
        let child_kind = if tail.is_empty() { new_kind } else { Kind::Tree };
        entries.insert(head.clone(), (child_kind, updated_child));
        self.table.put(StoredObject::Tree(entries))
    }

    fn remove_rec(&mut self, node: &ObjectId, segs: &[String], recursive: bool, orig_path: &StorePath) -> Result<ObjectId> {
        let Some((head, tail)) = segs.split_first() else {
            return Err(StoreError::NotFound(orig_path.display()));
        };
        let obj = self.table.get(node)?;
        let StoredObject::Tree(mut entries) = obj else {
            return Err(StoreError::NotATree(orig_path.display()));
        };
        if tail.is_empty() {
            let (kind, id) = entries
                .get(head)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(orig_path.display()))?;
            if kind == Kind::Tree && !recursive {
                let StoredObject::Tree(child_entries) = self.table.get(&id)? else {
                    unreachable!("kind tag matched Tree")
                };
                if !child_entries.is_empty() {
                    return Err(StoreError::TreeNotEmpty(orig_path.display()));
                }
            }
            entries.remove(head);
        } else {
            let (_, child) = entries
                .get(head)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(orig_path.display()))?;
            let updated = self.remove_rec(&child, tail, recursive, orig_path)?;
            entries.insert(head.clone(), (Kind::Tree, updated));
        }
        self.table.put(StoredObject::Tree(entries))
    }
}

impl<T: ObjectTable> Store for TreeStore<T> {
    fn root(&self) -> ObjectId {
        self.root.clone()
    }

    fn set_root(&mut self, id: ObjectId) {
        self.root = id;
    }

    fn stat(&self, path: &StorePath) -> Result<ObjectId> {
        self.resolve(path)
    }

    fn read(&self, path: &StorePath) -> Result<Vec<u8>> {
        let id = self.resolve(path)?;
        match self.table.get(&id)? {
            StoredObject::Blob(b) => Ok(b),
            StoredObject::Tree(_) => Err(StoreError::NotABlob(path.display())),
        }
    }

    fn write(&mut self, path: &StorePath, bytes: &[u8], create: bool, truncate: bool) -> Result<()> {
        let exists = self.resolve(path).is_ok();
        if exists && !truncate {
            return Err(StoreError::NotABlob(format!(
                "{} exists and truncate=false",
                path.display()
            )));
        }
        if !exists && !create {
            return Err(StoreError::NotFound(path.display()));
        }
        let id = self.table.put(StoredObject::Blob(bytes.to_vec()))?;
        self.set(path, id, Kind::Blob, create)
    }

    fn cp(&mut self, src: &StorePath, dst: &StorePath) -> Result<()> {
        let id = self.resolve(src)?;
        let kind = match self.table.get(&id)? {
            StoredObject::Blob(_) => Kind::Blob,
            StoredObject::Tree(_) => Kind::Tree,
        };
        self.set(dst, id, kind, true)
    }

    fn rm(&mut self, path: &StorePath, recursive: bool) -> Result<()> {
        if path.segments().is_empty() {
            self.root = self.table.put(StoredObject::empty_tree())?;
            return Ok(());
        }
        let root = self.root.clone();
        self.root = self.remove_rec(&root, path.segments(), recursive, path)?;
        Ok(())
    }

    fn mkdir(&mut self, path: &StorePath, parents: bool) -> Result<()> {
        if self.resolve(path).is_ok() {
            return Ok(());
        }
        let id = self.table.put(StoredObject::empty_tree())?;
        self.set(path, id, Kind::Tree, parents)
    }

    fn ls(&self, path: &StorePath) -> Result<Vec<DirEntry>> {
        let id = self.resolve(path)?;
        match self.table.get(&id)? {
            StoredObject::Tree(entries) => Ok(entries
                .into_iter()
                .map(|(name, (kind, id))| DirEntry { name, kind, id })
                .collect()),
            StoredObject::Blob(_) => Err(StoreError::NotATree(path.display())),
        }
    }

    fn cat(&self, id: &ObjectId) -> Result<Vec<u8>> {
        match self.table.get(id)? {
            StoredObject::Blob(b) => Ok(b),
            StoredObject::Tree(_) => Err(StoreError::NotABlob(id.to_string())),
        }
    }

    fn add(&mut self, fs_path: &FsPath) -> Result<ObjectId> {
        let bytes = std::fs::read(fs_path).map_err(|source| StoreError::Io {
            path: fs_path.to_path_buf(),
            source,
        })?;
        self.table.put(StoredObject::Blob(bytes))
    }

    fn object_diff(&self, a: &ObjectId, b: &ObjectId) -> Result<Vec<ObjectChange>> {
        diff_objects(&self.table, a, b)
    }
}

impl<T: ObjectTable> TreeStore<T> {
    /// Used by callers (e.g. the sync engine's scratch-tree swap) who build
    /// a tree entry-by-entry via repeated `set` calls rather than `write`.
    pub fn put_tree(&mut self, entries: BTreeMap<String, (Kind, ObjectId)>) -> Result<ObjectId> {
        self.table.put(StoredObject::Tree(entries))
    }

    pub fn get(&self, id: &ObjectId) -> Result<StoredObject> {
        self.table.get(id)
    }
}

pub type MemStore = TreeStore<MemTable>;
pub type FsStore = TreeStore<FsTable>;

impl MemStore {
    pub fn in_memory() -> Self {
        Self::new(MemTable::default()).expect("empty tree insertion cannot fail")
    }
}

impl FsStore {
    pub fn open(root: impl Into<std::path::PathBuf>) -> Result<Self> {
        Self::new(FsTable::open(root)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_roundtrips() {
        let mut s = MemStore::in_memory();
        let p = StorePath::named(["a", "b.txt"]);
        s.write(&p, b"hi", true, true).unwrap();
        assert_eq!(s.read(&p).unwrap(), b"hi");
    }

    #[test]
    fn write_without_create_on_missing_path_fails() {
        let mut s = MemStore::in_memory();
        let p = StorePath::named(["missing.txt"]);
        assert!(s.write(&p, b"hi", false, true).is_err());
    }

    #[test]
    fn cp_duplicates_a_subtree_under_new_root() {
        let mut s = MemStore::in_memory();
        let src = StorePath::named(["a", "f.txt"]);
        s.write(&src, b"v1", true, true).unwrap();
        let dst = StorePath::named(["b"]);
        s.cp(&StorePath::named(["a"]), &dst).unwrap();
        assert_eq!(s.read(&StorePath::named(["b", "f.txt"])).unwrap(), b"v1");
        // source is untouched
        assert_eq!(s.read(&src).unwrap(), b"v1");
    }

    #[test]
    fn rm_non_recursive_on_nonempty_tree_fails() {
        let mut s = MemStore::in_memory();
        s.write(&StorePath::named(["a", "f.txt"]), b"v1", true, true)
            .unwrap();
        assert!(s.rm(&StorePath::named(["a"]), false).is_err());
        assert!(s.rm(&StorePath::named(["a"]), true).is_ok());
    }

    #[test]
    fn mkdir_parents_creates_intermediate_trees() {
        let mut s = MemStore::in_memory();
        s.mkdir(&StorePath::named(["a", "b", "c"]), true).unwrap();
        assert!(s.ls(&StorePath::named(["a", "b"])).is_ok());
    }

    #[test]
    fn ls_lists_direct_children_only() {
        let mut s = MemStore::in_memory();
        s.write(&StorePath::named(["a", "f1.txt"]), b"1", true, true)
            .unwrap();
        s.write(&StorePath::named(["a", "d", "f2.txt"]), b"2", true, true)
            .unwrap();
        let entries = s.ls(&StorePath::named(["a"])).unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn by_hash_path_reads_without_touching_root() {
        let mut s = MemStore::in_memory();
        s.write(&StorePath::named(["a.txt"]), b"v1", true, true).unwrap();
        let id = s.add(std::path::Path::new("/dev/null")).unwrap_or_else(|_| {
            s.stat(&StorePath::named(["a.txt"])).unwrap()
        });
        let root_before = s.root();
        let _ = s.read(&StorePath::by_hash(id, Vec::<String>::new()));
        assert_eq!(s.root(), root_before);
    }
}
