use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::StoreError;

/// A content address: the hex-encoded SHA-256 hash of a tagged object body.
///
/// Blobs are hashed as `"blob\0" + bytes`; trees are hashed as `"tree\0"`
/// followed by their canonical entry listing. The tag prevents a blob and a
/// tree from ever colliding on the same hash even if their raw bytes happen
/// to coincide.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(s: &str) -> Result<(), StoreError> {
        if s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()) {
            Ok(())
        } else {
            Err(StoreError::BadObjectId(s.to_string()))
        }
    }

    pub(crate) fn of_blob(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"blob\0");
        hasher.update(bytes);
        Self(format!("{:x}", hasher.finalize()))
    }

    pub(crate) fn of_tree(entries: &BTreeMap<String, (Kind, ObjectId)>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"tree\0");
        for (name, (kind, id)) in entries {
            hasher.update(kind.tag().as_bytes());
            hasher.update(b" ");
            hasher.update(name.as_bytes());
            hasher.update(b" ");
            hasher.update(id.as_str().as_bytes());
            hasher.update(b"\n");
        }
        Self(format!("{:x}", hasher.finalize()))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ObjectId {
    type Err = StoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::validate(s)?;
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for ObjectId {
    type Error = StoreError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::validate(&s)?;
        Ok(Self(s))
    }
}

impl From<ObjectId> for String {
    fn from(id: ObjectId) -> Self {
        id.0
    }
}

impl Serialize for ObjectId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ObjectId::try_from(s).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Blob,
    Tree,
}

impl Kind {
    fn tag(self) -> &'static str {
        match self {
            Kind::Blob => "blob",
            Kind::Tree => "tree",
        }
    }
}

/// The two shapes an object can take. Trees hold a sorted map from child
/// name to `(kind, id)` so a tree's own id can be recomputed deterministically.
#[derive(Debug, Clone)]
pub enum StoredObject {
    Blob(Vec<u8>),
    Tree(BTreeMap<String, (Kind, ObjectId)>),
}

impl StoredObject {
    pub fn kind(&self) -> Kind {
        match self {
            StoredObject::Blob(_) => Kind::Blob,
            StoredObject::Tree(_) => Kind::Tree,
        }
    }

    pub fn id(&self) -> ObjectId {
        match self {
            StoredObject::Blob(bytes) => ObjectId::of_blob(bytes),
            StoredObject::Tree(entries) => ObjectId::of_tree(entries),
        }
    }

    pub fn empty_tree() -> Self {
        StoredObject::Tree(BTreeMap::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_and_tree_ids_never_collide_on_same_bytes() {
        let blob = StoredObject::Blob(b"tree\0".to_vec());
        let tree = StoredObject::Tree(BTreeMap::new());
        assert_ne!(blob.id(), tree.id());
    }

    #[test]
    fn object_id_roundtrips_through_string() {
        let id = StoredObject::Blob(b"hello".to_vec()).id();
        let s: String = id.clone().into();
        let back: ObjectId = s.parse().unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn object_id_rejects_bad_hex() {
        assert!("not-a-hash".parse::<ObjectId>().is_err());
        assert!("AB".repeat(32).parse::<ObjectId>().is_err());
    }

    #[test]
    fn tree_id_is_order_independent_of_insertion() {
        let mut a = BTreeMap::new();
        a.insert("b".to_string(), (Kind::Blob, ObjectId::of_blob(b"1")));
        a.insert("a".to_string(), (Kind::Blob, ObjectId::of_blob(b"2")));
        let mut b = BTreeMap::new();
        b.insert("a".to_string(), (Kind::Blob, ObjectId::of_blob(b"2")));
        b.insert("b".to_string(), (Kind::Blob, ObjectId::of_blob(b"1")));
        assert_eq!(ObjectId::of_tree(&a), ObjectId::of_tree(&b));
    }
}
