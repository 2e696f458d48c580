//! Replay Controller (spec §4.9): fast-forward our branch's commits on top
//! of another branch's head, preserving our messages and authorship.

use loam_signing::{PeerId, PublicKey, SigningCapability};
use loam_store::{ObjectId, Store, StorePath};

use crate::commit;
use crate::dag;
use crate::error::{LoamError, Result};
use crate::layout::{CommitPaths, RepoPaths};
use crate::merge::{self, FileResolution};
use crate::model::{CommitMetadata, RefKind};

/// Outcome of one `replay` or `replay --resume` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayStatus {
    Complete,
    ResumeRequired { conflict_files: Vec<String> },
}

fn read_metadata(store: &impl Store, commit_root: &StorePath) -> Result<CommitMetadata> {
    let bytes = store.read(&CommitPaths::commit_metadata(commit_root))?;
    serde_json::from_slice(&bytes).map_err(|e| LoamError::ConfigError {
        path: "commit_metadata".into(),
        detail: e.to_string(),
    })
}

pub(crate) fn apply_resolutions(
    store: &mut impl Store,
    files_root: &StorePath,
    resolutions: &std::collections::BTreeMap<String, FileResolution>,
) -> Result<()> {
    for (path, resolution) in resolutions {
        let target = crate::store_util::join_relative(files_root, path);
        match resolution {
            FileResolution::Removed => {
                if store.stat(&target).is_ok() {
                    store.rm(&target, true)?;
                }
            }
            FileResolution::Pulled(bytes) | FileResolution::Merged(bytes) | FileResolution::Conflict(bytes) => {
                let create = store.stat(&target).is_err();
                store.write(&target, bytes, create, true)?;
            }
        }
    }
    Ok(())
}

fn remaining_queue_path(repo: &RepoPaths, branch: &str) -> StorePath {
    repo.ref_root(branch, "replay_remaining")
}

fn write_remaining(store: &mut impl Store, repo: &RepoPaths, branch: &str, ids: &[ObjectId]) -> Result<()> {
    let text = ids.iter().map(ObjectId::to_string).collect::<Vec<_>>().join("\n");
    store.write(&remaining_queue_path(repo, branch), text.as_bytes(), true, true)?;
    Ok(())
}

fn read_remaining(store: &impl Store, repo: &RepoPaths, branch: &str) -> Result<Vec<ObjectId>> {
    let bytes = store.read(&remaining_queue_path(repo, branch))?;
    let text = String::from_utf8_lossy(&bytes);
    text.lines()
        .filter(|l| !l.is_empty())
        .map(|l| l.parse().map_err(|_| LoamError::NoSuchCommit { hash: l.to_string() }))
        .collect()
}

/// Begin a replay of `branch`'s unique commits onto `their_root` (another
/// branch's `head`, or any content-addressed commit node).
pub fn start_replay<S>(
    store: &mut impl Store,
    signer: &S,
    peer_id: &PeerId,
    public_key: &PublicKey,
    repo: &RepoPaths,
    branch: &str,
    their_root: &StorePath,
    their_branch_label: &str,
) -> Result<ReplayStatus>
where
    S: SigningCapability,
    LoamError: From<S::Error>,
{
    let head = repo.ref_root(branch, RefKind::Head.segment());
    let our_head_id = store.stat(&head)?;
    let their_head_id = store.stat(their_root)?;

    let lca_id = dag::lowest_common_ancestor(store, &our_head_id, &their_head_id, branch, their_branch_label)?;
    let history = dag::history(store, &our_head_id)?;
    let lca_pos = history
        .iter()
        .position(|id| *id == lca_id)
        .ok_or_else(|| LoamError::UnrelatedHistories { ours: branch.to_string(), theirs: their_branch_label.to_string() })?;
    let mut our_commits: Vec<ObjectId> = history[..lca_pos].to_vec();
    our_commits.reverse(); // oldest first

    for ref_name in [RefKind::Head.segment(), RefKind::Stage.segment(), RefKind::Workspace.segment()] {
        let src = repo.ref_root(branch, ref_name);
        let backup = repo.ref_root(branch, &format!("replay_{ref_name}"));
        store.cp(&src, &backup)?;
    }

    for ref_name in [RefKind::Head.segment(), RefKind::Stage.segment(), RefKind::Workspace.segment()] {
        let dst = repo.ref_root(branch, ref_name);
        store.rm(&dst, true)?;
        store.cp(their_root, &dst)?;
    }
    for ref_name in [RefKind::Stage.segment(), RefKind::Workspace.segment()] {
        let parent = CommitPaths::parent(&repo.ref_root(branch, ref_name));
        if store.stat(&parent).is_ok() {
            store.rm(&parent, true)?;
        }
    }

    write_remaining(store, repo, branch, &our_commits)?;
    store.write(&repo.ref_root(branch, "their_branch"), their_branch_label.as_bytes(), true, true)?;

    replay_loop(store, signer, peer_id, public_key, repo, branch, their_branch_label)
}

/// Drain the remaining-commits queue, merging each against the current
/// head, until it's empty or a conflict requires user resolution.
fn replay_loop<S>(
    store: &mut impl Store,
    signer: &S,
    peer_id: &PeerId,
    public_key: &PublicKey,
    repo: &RepoPaths,
    branch: &str,
    their_branch_label: &str,
) -> Result<ReplayStatus>
where
    S: SigningCapability,
    LoamError: From<S::Error>,
{
    loop {
        let mut remaining = read_remaining(store, repo, branch)?;
        if remaining.is_empty() {
            finish_replay(store, repo, branch)?;
            return Ok(ReplayStatus::Complete);
        }
        let commit_id = remaining.remove(0);
        let commit_root = StorePath::by_hash(commit_id.clone(), Vec::<String>::new());
        let parent_id = store.stat(&CommitPaths::parent(&commit_root))?;
        let parent_root = StorePath::by_hash(parent_id, Vec::<String>::new());

        let commit_files_id = store.stat(&CommitPaths::files(&commit_root))?;
        let parent_files_id = store.stat(&CommitPaths::files(&parent_root))?;

        let head = repo.ref_root(branch, RefKind::Head.segment());
        let stage = repo.ref_root(branch, RefKind::Stage.segment());
        let head_files_id = store.stat(&CommitPaths::files(&head))?;

        let outcome = merge::merge_trees(store, &parent_files_id, &commit_files_id, &head_files_id, branch, their_branch_label)?;

        store.rm(&stage, true)?;
        store.cp(&head, &stage)?;
        apply_resolutions(store, &CommitPaths::files(&stage), &outcome.resolutions)?;

        if !outcome.conflicts.is_empty() {
            store.write(
                &repo.ref_root(branch, "conflict_files"),
                outcome.conflicts.join("\n").as_bytes(),
                true,
                true,
            )?;
            store.cp(&commit_root, &repo.ref_root(branch, "replay_conflict_commit"))?;
            write_remaining(store, repo, branch, &remaining)?;
            return Ok(ReplayStatus::ResumeRequired { conflict_files: outcome.conflicts });
        }

        let original = read_metadata(store, &commit_root)?;
        commit::commit(
            store,
            signer,
            peer_id,
            public_key,
            &head,
            &stage,
            &original.message,
            None,
            Some(CommitMetadata { is_replay: true, ..original }),
            true,
        )?;
        write_remaining(store, repo, branch, &remaining)?;
    }
}

fn finish_replay(store: &mut impl Store, repo: &RepoPaths, branch: &str) -> Result<()> {
    store.cp(&repo.ref_root(branch, "head"), &repo.ref_root(branch, "workspace"))?;
    for aux in ["replay_head", "replay_stage", "replay_workspace", "replay_remaining", "their_branch", "conflict_files", "replay_conflict_commit"] {
        let p = repo.ref_root(branch, aux);
        if store.stat(&p).is_ok() {
            store.rm(&p, true)?;
        }
    }
    Ok(())
}

/// Verify no conflict markers remain in the named files (read from the
/// branch's `stage`, where the user resolves them), then recommit the
/// conflicting commit's resolution and continue the queue.
pub fn resume_replay<S>(
    store: &mut impl Store,
    signer: &S,
    peer_id: &PeerId,
    public_key: &PublicKey,
    repo: &RepoPaths,
    branch: &str,
) -> Result<ReplayStatus>
where
    S: SigningCapability,
    LoamError: From<S::Error>,
{
    let conflict_bytes = store.read(&repo.ref_root(branch, "conflict_files"))?;
    let conflict_files: Vec<String> = String::from_utf8_lossy(&conflict_bytes)
        .lines()
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();

    let stage = repo.ref_root(branch, RefKind::Stage.segment());
    let mut remaining_markers = Vec::new();
    for path in &conflict_files {
        let target = crate::store_util::join_relative(&CommitPaths::files(&stage), path);
        let content = store.read(&target)?;
        let text = String::from_utf8_lossy(&content);
        if text.contains(">>>>>>>") || text.contains("=======") || text.contains("<<<<<<<") {
            remaining_markers.push(path.clone());
        }
    }
    if !remaining_markers.is_empty() {
        return Err(LoamError::MarkersRemaining { paths: remaining_markers });
    }

    let conflict_commit_root = repo.ref_root(branch, "replay_conflict_commit");
    let original = read_metadata(store, &conflict_commit_root)?;
    let head = repo.ref_root(branch, RefKind::Head.segment());
    commit::commit(
        store,
        signer,
        peer_id,
        public_key,
        &head,
        &stage,
        &original.message,
        None,
        Some(CommitMetadata { is_replay: true, ..original }),
        true,
    )?;

    store.rm(&repo.ref_root(branch, "conflict_files"), true)?;
    store.rm(&conflict_commit_root, true)?;
    store.rm(&repo.ref_root(branch, "their_branch"), true)?;

    let their_branch_label = "theirs";
    replay_loop(store, signer, peer_id, public_key, repo, branch, their_branch_label)
}

/// Restore `head`/`stage`/`workspace` from their `replay_*` backups and
/// drop every `replay_*`/conflict sibling.
pub fn abort_replay(store: &mut impl Store, repo: &RepoPaths, branch: &str) -> Result<()> {
    for ref_name in [RefKind::Head.segment(), RefKind::Stage.segment(), RefKind::Workspace.segment()] {
        let backup = repo.ref_root(branch, &format!("replay_{ref_name}"));
        if store.stat(&backup).is_ok() {
            let dst = repo.ref_root(branch, ref_name);
            store.rm(&dst, true)?;
            store.cp(&backup, &dst)?;
        }
    }
    for aux in ["replay_head", "replay_stage", "replay_workspace", "replay_remaining", "their_branch", "conflict_files", "replay_conflict_commit"] {
        let p = repo.ref_root(branch, aux);
        if store.stat(&p).is_ok() {
            store.rm(&p, true)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use loam_signing::LocalSigner;
    use loam_store::MemStore;

    fn init_branch(store: &mut MemStore, repo: &RepoPaths, branch: &str) {
        for ref_name in ["head", "stage", "workspace"] {
            store.mkdir(&CommitPaths::files(&repo.ref_root(branch, ref_name)), true).unwrap();
        }
    }

    #[test]
    fn replay_with_no_local_commits_completes_immediately() {
        let mut store = MemStore::in_memory();
        let repo = RepoPaths::new("abc");
        init_branch(&mut store, &repo, "master");
        init_branch(&mut store, &repo, "other");
        store
            .write(&CommitPaths::files(&repo.ref_root("other", "head")).join("a.txt"), b"v", true, true)
            .unwrap();

        let mut signer = LocalSigner::new();
        let keys = signer.create_key("me").unwrap();
        let their_head = repo.ref_root("other", "head");

        let status = start_replay(&mut store, &signer, &keys.peer_id, &keys.public_key, &repo, "master", &their_head, "other").unwrap();
        assert_eq!(status, ReplayStatus::Complete);
        assert_eq!(
            store.read(&CommitPaths::files(&repo.ref_root("master", "head")).join("a.txt")).unwrap(),
            b"v"
        );
    }

    #[test]
    fn abort_replay_restores_backups() {
        let mut store = MemStore::in_memory();
        let repo = RepoPaths::new("abc");
        init_branch(&mut store, &repo, "master");
        init_branch(&mut store, &repo, "other");
        store
            .write(&CommitPaths::files(&repo.ref_root("master", "head")).join("mine.txt"), b"mine", true, true)
            .unwrap();

        let mut signer = LocalSigner::new();
        let keys = signer.create_key("me").unwrap();
        let their_head = repo.ref_root("other", "head");
        start_replay(&mut store, &signer, &keys.peer_id, &keys.public_key, &repo, "master", &their_head, "other").unwrap();

        abort_replay(&mut store, &repo, "master").unwrap();
        assert_eq!(
            store.read(&CommitPaths::files(&repo.ref_root("master", "head")).join("mine.txt")).unwrap(),
            b"mine"
        );
        assert!(store.stat(&repo.ref_root("master", "replay_head")).is_err());
    }
}
