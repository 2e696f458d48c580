use std::collections::BTreeSet;

use loam_store::{ObjectChange, Store, StorePath};

use crate::error::{LoamError, Result};
use crate::layout::{CommitPaths, RepoPaths};
use crate::model::{BranchName, FileMeta, FilesMetadata, RefKind};
use crate::store_util::{join_relative, stat_or_empty};

/// Whether a branch sits mid-merge or mid-replay. Mirrors the presence of
/// the `merge_head`/`replay_stage` ref siblings the conflict machinery
/// writes alongside the normal `head`/`stage`/`workspace` triad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchState {
    Clean,
    MergePending,
    ReplayPending,
}

pub fn branch_state(store: &impl Store, repo: &RepoPaths, branch: &str) -> BranchState {
    if store.stat(&repo.ref_root(branch, "merge_head")).is_ok() {
        BranchState::MergePending
    } else if store.stat(&repo.ref_root(branch, "replay_stage")).is_ok() {
        BranchState::ReplayPending
    } else {
        BranchState::Clean
    }
}

/// Copy the subtree at `add_path` (relative to a ref's tracked-file root)
/// from `from_root` to `to_root`, splicing `from_metadata`'s entries under
/// that prefix into `to_metadata` and dropping `to_metadata`'s prior
/// entries there. Returns the object-level changes this produces, computed
/// as the diff in the copying direction (before `to`, after `to`).
pub fn ref_to_ref_copy(
    store: &mut impl Store,
    from_root: &StorePath,
    to_root: &StorePath,
    add_path: &str,
    from_metadata: &FilesMetadata,
    to_metadata: &mut FilesMetadata,
) -> Result<Vec<ObjectChange>> {
    let from_files = join_relative(&CommitPaths::files(from_root), add_path);
    let to_files = join_relative(&CommitPaths::files(to_root), add_path);

    let before_id = stat_or_empty(store, &to_files, to_root)?;

    if store.stat(&to_files).is_ok() {
        store.rm(&to_files, true)?;
    }

    if store.stat(&from_files).is_ok() {
        store.cp(&from_files, &to_files)?;
    }

    let under_prefix = |path: &str| -> bool {
        add_path.is_empty() || path == add_path || path.starts_with(&format!("{add_path}/"))
    };
    to_metadata.0.retain(|path, _| !under_prefix(path));
    for (path, meta) in &from_metadata.0 {
        if under_prefix(path) {
            to_metadata.0.insert(path.clone(), *meta);
        }
    }

    let after_id = stat_or_empty(store, &to_files, to_root)?;
    store.object_diff(&before_id, &after_id).map_err(Into::into)
}

/// Create a new branch. `from_commit` is either the sibling ref root to
/// fork from (when the new branch should share history) or `None` to copy
/// the active branch's head/stage/workspace wholesale.
pub fn create_branch(
    store: &mut impl Store,
    repo: &RepoPaths,
    active_branch: &str,
    new_name: &BranchName,
    from_commit: Option<&StorePath>,
) -> Result<()> {
    let new_dir = repo.branch_dir(new_name.as_str());
    if store.stat(&new_dir).is_ok() {
        return Err(LoamError::BadName {
            name: new_name.as_str().to_string(),
            reason: "branch already exists".into(),
        });
    }

    match from_commit {
        None => {
            store.cp(&repo.branch_dir(active_branch), &new_dir)?;
        }
        Some(commit_root) => {
            for ref_name in [RefKind::Stage.segment(), RefKind::Workspace.segment()] {
                store.mkdir(&repo.ref_root(new_name.as_str(), ref_name), true)?;
            }
            if store.stat(commit_root).is_err() {
                return Err(LoamError::NoSuchCommit { hash: commit_root.display() });
            }
            let head = repo.ref_root(new_name.as_str(), RefKind::Head.segment());
            store.cp(commit_root, &head)?;

            let commit_bundle = CommitPaths::bundle(commit_root);
            for ref_name in [RefKind::Workspace.segment(), RefKind::Stage.segment()] {
                let dst = CommitPaths::bundle(&repo.ref_root(new_name.as_str(), ref_name));
                store.cp(&commit_bundle, &dst)?;
            }
        }
    }
    Ok(())
}

/// Write `ref_root`'s tracked files onto disk under `fs_root`, restoring
/// each file's recorded mtime. Only paths the caller's scan flagged as
/// `removed | modified` need a fresh write; paths it flagged `added` on
/// disk but absent from the ref are deleted instead.
pub fn load_ref_into_workspace(
    store: &impl Store,
    ref_root: &StorePath,
    fs_root: &std::path::Path,
    metadata: &FilesMetadata,
    added_on_disk: &BTreeSet<String>,
    stale_on_disk: &BTreeSet<String>,
) -> Result<()> {
    for path in added_on_disk {
        let full = fs_root.join(path);
        if full.exists() {
            std::fs::remove_file(&full)?;
        }
    }

    for path in stale_on_disk {
        let files_path = join_relative(&CommitPaths::files(ref_root), path);
        let bytes = store.read(&files_path)?;
        let full = fs_root.join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&full, &bytes)?;

        if let Some(FileMeta { timestamp, .. }) = metadata.0.get(path) {
            let secs = (*timestamp / 1_000_000_000) as i64;
            let nanos = (*timestamp % 1_000_000_000) as u32;
            let ft = filetime::FileTime::from_unix_time(secs, nanos);
            filetime::set_file_times(&full, ft, ft)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use loam_store::MemStore;

    #[test]
    fn fresh_branch_has_clean_state() {
        let store = MemStore::in_memory();
        let repo = RepoPaths::new("abc");
        assert_eq!(branch_state(&store, &repo, "master"), BranchState::Clean);
    }

    #[test]
    fn merge_head_marks_merge_pending() {
        let mut store = MemStore::in_memory();
        let repo = RepoPaths::new("abc");
        store.mkdir(&repo.ref_root("master", "merge_head"), true).unwrap();
        assert_eq!(branch_state(&store, &repo, "master"), BranchState::MergePending);
    }

    #[test]
    fn create_branch_from_head_copies_whole_branch_dir() {
        let mut store = MemStore::in_memory();
        let repo = RepoPaths::new("abc");
        store
            .write(&repo.ref_root("master", "head").join("marker"), b"v", true, true)
            .unwrap();
        let name = BranchName::new("feature").unwrap();
        create_branch(&mut store, &repo, "master", &name, None).unwrap();
        assert_eq!(
            store.read(&repo.ref_root("feature", "head").join("marker")).unwrap(),
            b"v"
        );
    }

    #[test]
    fn create_branch_rejects_existing_name() {
        let mut store = MemStore::in_memory();
        let repo = RepoPaths::new("abc");
        store.mkdir(&repo.branch_dir("master"), true).unwrap();
        let name = BranchName::new("master").unwrap();
        assert!(create_branch(&mut store, &repo, "master", &name, None).is_err());
    }

    #[test]
    fn ref_to_ref_copy_splices_subtree_and_metadata() {
        let mut store = MemStore::in_memory();
        let repo = RepoPaths::new("abc");
        let from_root = repo.ref_root("master", "head");
        let to_root = repo.ref_root("master", "stage");
        store
            .write(&CommitPaths::files(&from_root).join("a.txt"), b"v1", true, true)
            .unwrap();

        let mut from_meta = FilesMetadata::default();
        from_meta.0.insert("a.txt".into(), FileMeta { timestamp: 1, symlink: false });
        let mut to_meta = FilesMetadata::default();

        let changes =
            ref_to_ref_copy(&mut store, &from_root, &to_root, "", &from_meta, &mut to_meta).unwrap();
        assert!(!changes.is_empty());
        assert_eq!(store.read(&CommitPaths::files(&to_root).join("a.txt")).unwrap(), b"v1");
        assert_eq!(to_meta.0.get("a.txt").unwrap().timestamp, 1);
    }
}
