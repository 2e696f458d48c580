use std::path::Path;

use loam_store::{ObjectChange, Store, StorePath};

use crate::error::Result;
use crate::layout::CommitPaths;
use crate::model::{FileMeta, FilesMetadata};
use crate::scanner::{self, ScanResult};
use crate::store_util::{join_relative, stat_or_empty};

fn full_key(prefix: &str, rel: &str) -> String {
    if prefix.is_empty() {
        rel.to_string()
    } else {
        format!("{prefix}/{rel}")
    }
}

fn scoped_view(metadata: &FilesMetadata, prefix: &str) -> FilesMetadata {
    let mut out = FilesMetadata::default();
    for (path, meta) in &metadata.0 {
        if prefix.is_empty() {
            out.0.insert(path.clone(), *meta);
        } else if let Some(rel) = path.strip_prefix(prefix).and_then(|r| r.strip_prefix('/')) {
            out.0.insert(rel.to_string(), *meta);
        }
    }
    out
}

/// Incrementally rebuild `ref_root`'s `data/bundle/files` subtree under
/// `workspace_relative_prefix` so it equals the on-disk content under
/// `fs_subtree_root`, leaving other paths in the ref untouched. Mutates
/// `metadata` (the whole-ref `files_metadata` map) in place.
///
/// Builds the new tree in a scratch location first and swaps it in with a
/// single `cp`, so a reader observing `ref_root` never sees a half-written
/// tree.
pub fn sync_fs_to_ref(
    store: &mut impl Store,
    fs_subtree_root: &Path,
    workspace_relative_prefix: &str,
    ref_root: &StorePath,
    metadata: &mut FilesMetadata,
) -> Result<Vec<ObjectChange>> {
    let files_path = CommitPaths::files(ref_root);
    let scratch_path = ref_root.clone().join("_scratch_sync");

    match store.cp(&files_path, &scratch_path) {
        Ok(()) => {}
        Err(loam_store::StoreError::NotFound(_)) => {
            store.mkdir(&scratch_path, true)?;
        }
        Err(e) => return Err(e.into()),
    }

    let before_id = stat_or_empty(store, &files_path, ref_root)?;

    let scoped_metadata = scoped_view(metadata, workspace_relative_prefix);
    let result: ScanResult = scanner::scan(fs_subtree_root, &scoped_metadata)?;

    for path in result.removed.iter().chain(result.modified.iter()) {
        let target = join_relative(&scratch_path, path);
        if store.stat(&target).is_ok() {
            store.rm(&target, true)?;
        }
    }

    for path in result.changed() {
        let fs_path = fs_subtree_root.join(path);
        let id = store.add(&fs_path)?;
        store.cp(
            &StorePath::by_hash(id, Vec::<String>::new()),
            &join_relative(&scratch_path, path),
        )?;
    }

    for path in result.changed() {
        let meta = std::fs::metadata(fs_subtree_root.join(path))?;
        let ts = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_nanos() as i128)
            .unwrap_or(0);
        let symlink = std::fs::symlink_metadata(fs_subtree_root.join(path))
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false);
        metadata.0.insert(
            full_key(workspace_relative_prefix, path),
            FileMeta { timestamp: ts, symlink },
        );
    }
    for path in &result.removed {
        metadata.0.remove(&full_key(workspace_relative_prefix, path));
    }

    store.cp(&scratch_path, &files_path)?;
    store.rm(&scratch_path, true)?;

    let after_id = store.stat(&files_path)?;
    let changes = store.object_diff(&before_id, &after_id)?;
    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use loam_store::MemStore;

    #[test]
    fn sync_adds_new_files_and_reports_them() {
        let mut store = MemStore::in_memory();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hello").unwrap();
        let ref_root = StorePath::named(["branches", "master", "workspace"]);
        let mut metadata = FilesMetadata::default();

        let changes = sync_fs_to_ref(&mut store, dir.path(), "", &ref_root, &mut metadata).unwrap();
        assert_eq!(changes.len(), 1);
        assert!(metadata.0.contains_key("a.txt"));
        let files_path = CommitPaths::files(&ref_root).join("a.txt");
        assert_eq!(store.read(&files_path).unwrap(), b"hello");
    }

    #[test]
    fn sync_twice_with_no_changes_reports_empty_diff() {
        let mut store = MemStore::in_memory();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hello").unwrap();
        let ref_root = StorePath::named(["branches", "master", "workspace"]);
        let mut metadata = FilesMetadata::default();
        sync_fs_to_ref(&mut store, dir.path(), "", &ref_root, &mut metadata).unwrap();
        let changes = sync_fs_to_ref(&mut store, dir.path(), "", &ref_root, &mut metadata).unwrap();
        assert!(changes.is_empty());
    }

    #[test]
    fn sync_removes_deleted_files() {
        let mut store = MemStore::in_memory();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hello").unwrap();
        let ref_root = StorePath::named(["branches", "master", "workspace"]);
        let mut metadata = FilesMetadata::default();
        sync_fs_to_ref(&mut store, dir.path(), "", &ref_root, &mut metadata).unwrap();

        std::fs::remove_file(dir.path().join("a.txt")).unwrap();
        sync_fs_to_ref(&mut store, dir.path(), "", &ref_root, &mut metadata).unwrap();
        assert!(!metadata.0.contains_key("a.txt"));
        let files_path = CommitPaths::files(&ref_root);
        assert!(store.ls(&files_path).unwrap().is_empty());
    }

    #[test]
    fn sync_leaves_paths_outside_subtree_untouched() {
        let mut store = MemStore::in_memory();
        let ref_root = StorePath::named(["branches", "master", "workspace"]);
        let files_path = CommitPaths::files(&ref_root);
        store.write(&files_path.clone().join("outside.txt"), b"keep", true, true).unwrap();

        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/inside.txt"), b"new").unwrap();
        let mut metadata = FilesMetadata::default();
        sync_fs_to_ref(&mut store, &dir.path().join("sub"), "sub", &ref_root, &mut metadata).unwrap();

        assert_eq!(store.read(&files_path.clone().join("outside.txt")).unwrap(), b"keep");
        assert_eq!(
            store.read(&files_path.join("sub").join("inside.txt")).unwrap(),
            b"new"
        );
    }
}
