use crate::error::Result;
use crate::object::{ObjectId, StoredObject};
use crate::table::ObjectTable;

/// Classification of a single path's change between two tree objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    Added,
    Removed,
    Modified,
}

/// One entry of an `object_diff` result: a workspace-relative path and the
/// before/after object ids (whichever side applies).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectChange {
    pub path: String,
    pub change_type: ChangeType,
    pub before: Option<ObjectId>,
    pub after: Option<ObjectId>,
}

/// Recursively diff two objects (trees or a lone blob), producing one
/// `ObjectChange` per changed leaf path. Identical subtrees short-circuit on
/// id equality, since content-addressing makes that comparison exact.
pub fn diff_objects(table: &impl ObjectTable, a: &ObjectId, b: &ObjectId) -> Result<Vec<ObjectChange>> {
    let mut changes = Vec::new();
    walk(table, String::new(), Some(a), Some(b), &mut changes)?;
    Ok(changes)
}

fn walk(
    table: &impl ObjectTable,
    prefix: String,
    a: Option<&ObjectId>,
    b: Option<&ObjectId>,
    out: &mut Vec<ObjectChange>,
) -> Result<()> {
    if a == b {
        return Ok(());
    }
    let a_obj = match a {
        Some(id) => Some(table.get(id)?),
        None => None,
    };
    let b_obj = match b {
        Some(id) => Some(table.get(id)?),
        None => None,
    };

    match (a_obj, b_obj) {
        (None, Some(StoredObject::Blob(_))) => out.push(ObjectChange {
            path: prefix,
            change_type: ChangeType::Added,
            before: None,
            after: b.cloned(),
        }),
        (Some(StoredObject::Blob(_)), None) => out.push(ObjectChange {
            path: prefix,
            change_type: ChangeType::Removed,
            before: a.cloned(),
            after: None,
        }),
        (Some(StoredObject::Blob(_)), Some(StoredObject::Blob(_))) => out.push(ObjectChange {
            path: prefix,
            change_type: ChangeType::Modified,
            before: a.cloned(),
            after: b.cloned(),
        }),
        (None, Some(StoredObject::Tree(entries))) => {
            for (name, (_, id)) in entries {
                walk(table, join(&prefix, &name), None, Some(&id), out)?;
            }
        }
        (Some(StoredObject::Tree(entries)), None) => {
            for (name, (_, id)) in entries {
                walk(table, join(&prefix, &name), Some(&id), None, out)?;
            }
        }
        (Some(StoredObject::Tree(a_entries)), Some(StoredObject::Tree(b_entries))) => {
            let mut names: Vec<&String> = a_entries.keys().chain(b_entries.keys()).collect();
            names.sort();
            names.dedup();
            for name in names {
                let a_child = a_entries.get(name).map(|(_, id)| id);
                let b_child = b_entries.get(name).map(|(_, id)| id);
                walk(table, join(&prefix, name), a_child, b_child, out)?;
            }
        }
        // a blob replaced by a tree or vice versa: treat as remove+add at the
        // leaf and recurse into whichever side is a tree.
        (Some(StoredObject::Blob(_)), Some(StoredObject::Tree(entries))) => {
            out.push(ObjectChange {
                path: prefix.clone(),
                change_type: ChangeType::Removed,
                before: a.cloned(),
                after: None,
            });
            for (name, (_, id)) in entries {
                walk(table, join(&prefix, &name), None, Some(&id), out)?;
            }
        }
        (Some(StoredObject::Tree(entries)), Some(StoredObject::Blob(_))) => {
            for (name, (_, id)) in entries {
                walk(table, join(&prefix, &name), Some(&id), None, out)?;
            }
            out.push(ObjectChange {
                path: prefix,
                change_type: ChangeType::Added,
                before: None,
                after: b.cloned(),
            });
        }
        (None, None) => {}
    }
    Ok(())
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::StorePath;
    use crate::store::{MemStore, Store};

    #[test]
    fn diff_of_identical_trees_is_empty() {
        let mut s = MemStore::in_memory();
        s.write(&StorePath::named(["a.txt"]), b"x", true, true).unwrap();
        let root = s.root();
        assert!(s.object_diff(&root, &root).unwrap().is_empty());
    }

    #[test]
    fn diff_detects_added_removed_modified() {
        let mut s = MemStore::in_memory();
        s.write(&StorePath::named(["keep.txt"]), b"same", true, true).unwrap();
        s.write(&StorePath::named(["gone.txt"]), b"bye", true, true).unwrap();
        s.write(&StorePath::named(["changed.txt"]), b"v1", true, true).unwrap();
        let before = s.root();

        s.rm(&StorePath::named(["gone.txt"]), false).unwrap();
        s.write(&StorePath::named(["changed.txt"]), b"v2", true, true).unwrap();
        s.write(&StorePath::named(["new.txt"]), b"new", true, true).unwrap();
        let after = s.root();

        let mut changes = s.object_diff(&before, &after).unwrap();
        changes.sort_by(|x, y| x.path.cmp(&y.path));
        let paths: Vec<(&str, ChangeType)> =
            changes.iter().map(|c| (c.path.as_str(), c.change_type)).collect();
        assert_eq!(
            paths,
            vec![
                ("changed.txt", ChangeType::Modified),
                ("gone.txt", ChangeType::Removed),
                ("new.txt", ChangeType::Added),
            ]
        );
    }
}
