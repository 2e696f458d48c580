use std::collections::BTreeMap;
use std::collections::HashMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::error::{Result, StoreError};
use crate::object::{Kind, ObjectId, StoredObject};

/// Content-addressed storage for [`StoredObject`]s, keyed by their own id.
///
/// Implementations only need to get and put already-hashed objects; all
/// path-walking and tree-rebuilding logic lives once in [`crate::store::TreeStore`]
/// on top of this trait, mirroring the way the store's two concrete backends
/// in this crate (in-memory and filesystem) only differ in how bytes are
/// persisted, not in how the namespace tree is shaped.
pub trait ObjectTable {
    fn get(&self, id: &ObjectId) -> Result<StoredObject>;
    fn put(&mut self, object: StoredObject) -> Result<ObjectId>;
    fn contains(&self, id: &ObjectId) -> bool;
}

/// In-memory object table, for tests and ephemeral repositories.
#[derive(Debug, Default)]
pub struct MemTable {
    objects: HashMap<ObjectId, StoredObject>,
}

impl ObjectTable for MemTable {
    fn get(&self, id: &ObjectId) -> Result<StoredObject> {
        self.objects
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn put(&mut self, object: StoredObject) -> Result<ObjectId> {
        let id = object.id();
        self.objects.entry(id.clone()).or_insert(object);
        Ok(id)
    }

    fn contains(&self, id: &ObjectId) -> bool {
        self.objects.contains_key(id)
    }
}

/// Loose-object filesystem table: each object lives at
/// `<root>/objects/<id[0..2]>/<id[2..]>`, written scratch-then-renamed so a
/// reader never observes a half-written object.
#[derive(Debug)]
pub struct FsTable {
    root: PathBuf,
}

impl FsTable {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(root.join("objects")).map_err(|source| StoreError::Io {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    fn object_path(&self, id: &ObjectId) -> PathBuf {
        let s = id.as_str();
        self.root.join("objects").join(&s[0..2]).join(&s[2..])
    }

    fn encode(object: &StoredObject) -> Vec<u8> {
        match object {
            StoredObject::Blob(bytes) => {
                let mut out = Vec::with_capacity(bytes.len() + 5);
                out.extend_from_slice(b"blob\0");
                out.extend_from_slice(bytes);
                out
            }
            StoredObject::Tree(entries) => {
                let mut out = vec![];
                out.extend_from_slice(b"tree\0");
                for (name, (kind, id)) in entries {
                    let tag = match kind {
                        Kind::Blob => "blob",
                        Kind::Tree => "tree",
                    };
                    out.extend_from_slice(format!("{tag} {name} {id}\n").as_bytes());
                }
                out
            }
        }
    }

    fn decode(id: &ObjectId, bytes: &[u8]) -> Result<StoredObject> {
        if let Some(rest) = bytes.strip_prefix(b"blob\0") {
            return Ok(StoredObject::Blob(rest.to_vec()));
        }
        if let Some(rest) = bytes.strip_prefix(b"tree\0") {
            let text = std::str::from_utf8(rest)
                .map_err(|e| StoreError::Corrupt(id.to_string(), e.to_string()))?;
            let mut entries = BTreeMap::new();
            for line in text.lines() {
                let mut parts = line.splitn(3, ' ');
                let (Some(tag), Some(name), Some(child)) =
                    (parts.next(), parts.next(), parts.next())
                else {
                    return Err(StoreError::Corrupt(id.to_string(), "malformed tree entry".into()));
                };
                let kind = match tag {
                    "blob" => Kind::Blob,
                    "tree" => Kind::Tree,
                    other => {
                        return Err(StoreError::Corrupt(id.to_string(), format!("unknown kind {other}")))
                    }
                };
                let child_id: ObjectId = child
                    .parse()
                    .map_err(|_| StoreError::Corrupt(id.to_string(), "bad child id".into()))?;
                entries.insert(name.to_string(), (kind, child_id));
            }
            return Ok(StoredObject::Tree(entries));
        }
        Err(StoreError::Corrupt(id.to_string(), "unknown object tag".into()))
    }

    fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
        let dir = path.parent().unwrap_or(path);
        std::fs::create_dir_all(dir).map_err(|source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        tmp.write_all(bytes).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tmp.persist(path)
            .map_err(|e| StoreError::Io {
                path: path.to_path_buf(),
                source: e.error,
            })?;
        Ok(())
    }
}

impl ObjectTable for FsTable {
    fn get(&self, id: &ObjectId) -> Result<StoredObject> {
        let path = self.object_path(id);
        let bytes = std::fs::read(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound(id.to_string())
            } else {
                StoreError::Io { path: path.clone(), source }
            }
        })?;
        Self::decode(id, &bytes)
    }

    fn put(&mut self, object: StoredObject) -> Result<ObjectId> {
        let id = object.id();
        let path = self.object_path(&id);
        if !path.exists() {
            Self::write_atomic(&path, &Self::encode(&object))?;
        }
        Ok(id)
    }

    fn contains(&self, id: &ObjectId) -> bool {
        self.object_path(id).exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mem_table_put_is_idempotent_by_content() {
        let mut t = MemTable::default();
        let id1 = t.put(StoredObject::Blob(b"a".to_vec())).unwrap();
        let id2 = t.put(StoredObject::Blob(b"a".to_vec())).unwrap();
        assert_eq!(id1, id2);
    }

    #[test]
    fn fs_table_roundtrips_blob_and_tree() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = FsTable::open(dir.path()).unwrap();
        let blob_id = t.put(StoredObject::Blob(b"hello".to_vec())).unwrap();
        let mut entries = BTreeMap::new();
        entries.insert("a.txt".to_string(), (Kind::Blob, blob_id.clone()));
        let tree_id = t.put(StoredObject::Tree(entries)).unwrap();

        match t.get(&blob_id).unwrap() {
            StoredObject::Blob(b) => assert_eq!(b, b"hello"),
            StoredObject::Tree(_) => panic!("expected blob"),
        }
        match t.get(&tree_id).unwrap() {
            StoredObject::Tree(e) => assert_eq!(e.len(), 1),
            StoredObject::Blob(_) => panic!("expected tree"),
        }
    }

    #[test]
    fn fs_table_missing_object_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let t = FsTable::open(dir.path()).unwrap();
        let bogus = ObjectId::try_from("a".repeat(64)).unwrap();
        assert!(matches!(t.get(&bogus), Err(StoreError::NotFound(_))));
    }
}
