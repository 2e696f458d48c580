use std::path::{Path as FsPath, PathBuf};

use crate::diff::ObjectChange;
use crate::error::Result;
use crate::object::ObjectId;
use crate::path::StorePath;
use crate::store::{DirEntry, FsStore, MemStore, Store};

/// Which concrete store backend a repository is configured to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoreKind {
    Memory,
    Filesystem,
}

/// Enum dispatch over the two concrete backends, so callers that only know
/// a [`StoreKind`] at runtime (e.g. loaded from config) don't need a
/// `Box<dyn Store>`.
pub enum AnyStore {
    Memory(MemStore),
    Filesystem(FsStore),
}

impl AnyStore {
    pub fn from_kind(kind: StoreKind, fs_root: Option<PathBuf>) -> Result<Self> {
        match kind {
            StoreKind::Memory => Ok(AnyStore::Memory(MemStore::in_memory())),
            StoreKind::Filesystem => {
                let root = fs_root.expect("filesystem store requires a root directory");
                Ok(AnyStore::Filesystem(FsStore::open(root)?))
            }
        }
    }
}

impl Store for AnyStore {
    fn root(&self) -> ObjectId {
        match self {
            AnyStore::Memory(s) => s.root(),
            AnyStore::Filesystem(s) => s.root(),
        }
    }

    fn set_root(&mut self, id: ObjectId) {
        match self {
            AnyStore::Memory(s) => s.set_root(id),
            AnyStore::Filesystem(s) => s.set_root(id),
        }
    }

    fn stat(&self, path: &StorePath) -> Result<ObjectId> {
        match self {
            AnyStore::Memory(s) => s.stat(path),
            AnyStore::Filesystem(s) => s.stat(path),
        }
    }

    fn read(&self, path: &StorePath) -> Result<Vec<u8>> {
        match self {
            AnyStore::Memory(s) => s.read(path),
            AnyStore::Filesystem(s) => s.read(path),
        }
    }

    fn write(&mut self, path: &StorePath, bytes: &[u8], create: bool, truncate: bool) -> Result<()> {
        match self {
            AnyStore::Memory(s) => s.write(path, bytes, create, truncate),
            AnyStore::Filesystem(s) => s.write(path, bytes, create, truncate),
        }
    }

    fn cp(&mut self, src: &StorePath, dst: &StorePath) -> Result<()> {
        match self {
            AnyStore::Memory(s) => s.cp(src, dst),
            AnyStore::Filesystem(s) => s.cp(src, dst),
        }
    }

    fn rm(&mut self, path: &StorePath, recursive: bool) -> Result<()> {
        match self {
            AnyStore::Memory(s) => s.rm(path, recursive),
            AnyStore::Filesystem(s) => s.rm(path, recursive),
        }
    }

    fn mkdir(&mut self, path: &StorePath, parents: bool) -> Result<()> {
        match self {
            AnyStore::Memory(s) => s.mkdir(path, parents),
            AnyStore::Filesystem(s) => s.mkdir(path, parents),
        }
    }

    fn ls(&self, path: &StorePath) -> Result<Vec<DirEntry>> {
        match self {
            AnyStore::Memory(s) => s.ls(path),
            AnyStore::Filesystem(s) => s.ls(path),
        }
    }

    fn cat(&self, id: &ObjectId) -> Result<Vec<u8>> {
        match self {
            AnyStore::Memory(s) => s.cat(id),
            AnyStore::Filesystem(s) => s.cat(id),
        }
    }

    fn add(&mut self, fs_path: &FsPath) -> Result<ObjectId> {
        match self {
            AnyStore::Memory(s) => s.add(fs_path),
            AnyStore::Filesystem(s) => s.add(fs_path),
        }
    }

    fn object_diff(&self, a: &ObjectId, b: &ObjectId) -> Result<Vec<ObjectChange>> {
        match self {
            AnyStore::Memory(s) => s.object_diff(a, b),
            AnyStore::Filesystem(s) => s.object_diff(a, b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_store_memory_roundtrips() {
        let mut s = AnyStore::from_kind(StoreKind::Memory, None).unwrap();
        let p = StorePath::named(["a.txt"]);
        s.write(&p, b"hi", true, true).unwrap();
        assert_eq!(s.read(&p).unwrap(), b"hi");
    }

    #[test]
    fn any_store_filesystem_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = AnyStore::from_kind(StoreKind::Filesystem, Some(dir.path().to_path_buf())).unwrap();
        let p = StorePath::named(["a.txt"]);
        s.write(&p, b"hi", true, true).unwrap();
        assert_eq!(s.read(&p).unwrap(), b"hi");
    }
}
