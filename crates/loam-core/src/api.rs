//! Public API (spec §6): the facade every CLI command calls into. Mirrors
//! the original `CommonAPI`'s shape — one `Repo` bound to a store, a
//! signer, and the identity that signs its commits — except every
//! mutating method here runs under the Atomic Harness instead of the
//! original's `@atomic` decorator.
//!
//! `common()` in the original synced the on-disk workspace into the
//! `workspace` ref before every operation; [`Repo::sync_workspace`] is that
//! same step, called explicitly by the methods that need a fresh view of
//! disk.

use std::collections::BTreeSet;
use std::path::Path;

use loam_signing::{PeerId, PublicKey, SigningCapability};
use loam_store::{ObjectChange, ObjectId, Store, StorePath};

use crate::atomic::run_atomic;
use crate::commit;
use crate::config::RepoConfig;
use crate::dag;
use crate::diff::{ndiff, split_lines, DiffLine};
use crate::error::{LoamError, Result};
use crate::layout::{CommitPaths, RepoPaths};
use crate::merge;
use crate::model::{BranchName, FilesMetadata, OutputLevel};
use crate::refs::{self, BranchState};
use crate::replay::{self, ReplayStatus};
use crate::scanner;
use crate::sync;

/// Outcome of [`Repo::branch_merge`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeReport {
    AlreadyUpToDate,
    FastForward,
    Merged,
    Conflicts { paths: Vec<String> },
    Aborted,
}

fn read_metadata(store: &impl Store, root: &StorePath) -> Result<FilesMetadata> {
    match store.read(&CommitPaths::files_metadata(root)) {
        Ok(bytes) => Ok(FilesMetadata::from_json(&bytes).map_err(|e| LoamError::ConfigError {
            path: CommitPaths::files_metadata(root).display().into(),
            detail: e.to_string(),
        })?),
        Err(_) => Ok(FilesMetadata::default()),
    }
}

fn write_metadata(store: &mut impl Store, root: &StorePath, metadata: &FilesMetadata) -> Result<()> {
    let bytes = metadata.to_json().map_err(|e| LoamError::ConfigError {
        path: CommitPaths::files_metadata(root).display().into(),
        detail: e.to_string(),
    })?;
    store.write(&CommitPaths::files_metadata(root), &bytes, true, true)
}

/// One repository, bound to a store, a signer, and the identity that signs
/// its commits. `in_atomic` is shared across every method via
/// [`run_atomic`] so a method calling another pays for exactly one
/// snapshot no matter how deep the call chain goes.
pub struct Repo<St: Store, Sg: SigningCapability> {
    store: St,
    signer: Sg,
    peer_id: PeerId,
    public_key: PublicKey,
    paths: RepoPaths,
    config: RepoConfig,
    in_atomic: bool,
    output: OutputLevel,
}

impl<St: Store, Sg: SigningCapability> Repo<St, Sg>
where
    LoamError: From<Sg::Error>,
{
    pub fn new(
        store: St,
        signer: Sg,
        peer_id: PeerId,
        public_key: PublicKey,
        repo_hex: impl Into<String>,
        config: RepoConfig,
    ) -> Self {
        Self {
            store,
            signer,
            peer_id,
            public_key,
            paths: RepoPaths::new(repo_hex),
            config,
            in_atomic: false,
            output: OutputLevel::default(),
        }
    }

    pub fn set_output_level(&mut self, level: OutputLevel) {
        self.output = level;
    }

    pub fn output_level(&self) -> OutputLevel {
        self.output
    }

    pub fn store(&self) -> &St {
        &self.store
    }

    fn atomic<T>(&mut self, f: impl FnOnce(&mut St, &Sg, &PeerId, &PublicKey, &RepoPaths) -> Result<T>) -> Result<T> {
        let paths = self.paths.clone();
        let keep = self.config.store.keep_snapshots;
        let signer = &self.signer;
        let peer_id = &self.peer_id;
        let public_key = &self.public_key;
        run_atomic(&mut self.store, &paths, &mut self.in_atomic, keep, |store| {
            f(store, signer, peer_id, public_key, &paths)
        })
    }

    fn active_branch_inner(store: &St, paths: &RepoPaths) -> Result<BranchName> {
        let bytes = store.read(&paths.active_branch_name())?;
        BranchName::new(String::from_utf8_lossy(&bytes).to_string())
    }

    pub fn active_branch(&self) -> Result<BranchName> {
        Self::active_branch_inner(&self.store, &self.paths)
    }

    /// Create a fresh repository rooted at this `repo_hex`, with an empty
    /// `master` branch and no tracked files — `init`'s empty stage/workspace/
    /// head folders exist purely so there's something to diff against.
    pub fn init(&mut self, display_name: Option<&str>) -> Result<()> {
        self.atomic(|store, _signer, _peer_id, _public_key, paths| {
            if store.stat(&paths.repo_root()).is_ok() {
                return Err(LoamError::RepoConflict {
                    existing: paths.repo_root().display().into(),
                    requested: paths.repo_root().display().into(),
                });
            }
            for ref_name in ["head", "stage", "workspace"] {
                store.mkdir(&CommitPaths::files(&paths.ref_root("master", ref_name)), true)?;
            }
            store.write(&paths.active_branch_name(), b"master", true, true)?;
            if let Some(name) = display_name {
                store.write(&paths.display_name(), name.as_bytes(), true, true)?;
            }
            Ok(())
        })
    }

    pub fn repo_id(&self) -> Result<Option<String>> {
        match self.store.read(&self.paths.identity()) {
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).to_string())),
            Err(_) => Ok(None),
        }
    }

    pub fn set_repo_id(&mut self, key_name: &str) -> Result<()> {
        self.atomic(|store, _signer, _peer_id, _public_key, paths| {
            store.write(&paths.identity(), key_name.as_bytes(), true, true)
        })
    }

    pub fn repo_name(&self) -> Result<Option<String>> {
        match self.store.read(&self.paths.display_name()) {
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).to_string())),
            Err(_) => Ok(None),
        }
    }

    pub fn set_repo_name(&mut self, name: &str) -> Result<()> {
        self.atomic(|store, _signer, _peer_id, _public_key, paths| store.write(&paths.display_name(), name.as_bytes(), true, true))
    }

    pub fn branch_ls(&self) -> Result<Vec<String>> {
        Ok(self
            .store
            .ls(&self.paths.branches_dir())
            .unwrap_or_default()
            .into_iter()
            .map(|e| e.name)
            .collect())
    }

    pub fn branch_status(&self) -> Result<(BranchName, BranchState)> {
        let branch = self.active_branch()?;
        let state = refs::branch_state(&self.store, &self.paths, branch.as_str());
        Ok((branch, state))
    }

    pub fn branch_history(&self, branch: Option<&str>) -> Result<Vec<ObjectId>> {
        let active = self.active_branch()?;
        let branch = branch.unwrap_or(active.as_str());
        let head = self.store.stat(&self.paths.ref_root(branch, "head"))?;
        dag::history(&self.store, &head)
    }

    /// Create `name`, forking from `from_ref`'s head (default `@head` of
    /// the active branch) or copying the active branch wholesale when
    /// `from_ref` is `None`. `checkout` switches the active branch to it
    /// afterward.
    pub fn branch_create(&mut self, name: &str, from_ref: Option<&str>, checkout: bool, fs_root: Option<&Path>) -> Result<()> {
        let new_name = BranchName::new(name)?;
        self.atomic(|store, _signer, _peer_id, _public_key, paths| {
            let active = Self::active_branch_inner(store, paths)?;
            match from_ref {
                None => refs::create_branch(store, paths, active.as_str(), &new_name, None)?,
                Some(refexpr) => {
                    let ctx = crate::resolve::ResolveContext { repo: paths, active_branch: active.as_str() };
                    let resolved = crate::resolve::resolve(refexpr, &ctx, store)?;
                    refs::create_branch(store, paths, active.as_str(), &new_name, Some(&resolved.commit_root))?;
                }
            }
            if checkout {
                if let Some(fs_root) = fs_root {
                    checkout_branch(store, paths, new_name.as_str(), fs_root)?;
                } else {
                    store.write(&paths.active_branch_name(), new_name.as_str().as_bytes(), true, true)?;
                }
            }
            Ok(())
        })
    }

    /// Switch the active branch and replay its `workspace` ref onto disk,
    /// preserving recorded mtimes.
    pub fn branch_checkout(&mut self, name: &str, fs_root: &Path) -> Result<()> {
        let target = BranchName::new(name)?;
        self.atomic(|store, _signer, _peer_id, _public_key, paths| checkout_branch(store, paths, target.as_str(), fs_root))
    }

    pub fn branch_show(&self, refexpr: &str) -> Result<Vec<loam_store::DirEntry>> {
        let ctx = crate::resolve::ResolveContext { repo: &self.paths, active_branch: self.active_branch()?.as_str() };
        let resolved = crate::resolve::resolve(refexpr, &ctx, &self.store)?;
        self.store.ls(&resolved.files_path()).map_err(Into::into)
    }

    /// Sync the on-disk tree under `fs_root` into the active branch's
    /// `workspace` ref — the step the original performed at the top of
    /// every command via `common()`.
    pub fn sync_workspace(&mut self, fs_root: &Path) -> Result<Vec<ObjectChange>> {
        self.atomic(|store, _signer, _peer_id, _public_key, paths| {
            let active = Self::active_branch_inner(store, paths)?;
            let workspace_root = paths.ref_root(active.as_str(), "workspace");
            let mut metadata = read_metadata(store, &workspace_root)?;
            let changes = sync::sync_fs_to_ref(store, fs_root, "", &workspace_root, &mut metadata)?;
            write_metadata(store, &workspace_root, &metadata)?;
            Ok(changes)
        })
    }

    /// Copy `workspace`'s content at `add_path` (repo-relative, empty for
    /// everything) into `stage`.
    pub fn stage_add(&mut self, fs_root: &Path, add_path: &str) -> Result<Vec<ObjectChange>> {
        self.sync_workspace(fs_root)?;
        self.atomic(|store, _signer, _peer_id, _public_key, paths| {
            let active = Self::active_branch_inner(store, paths)?;
            let workspace_root = paths.ref_root(active.as_str(), "workspace");
            let stage_root = paths.ref_root(active.as_str(), "stage");
            let from_metadata = read_metadata(store, &workspace_root)?;
            let mut to_metadata = read_metadata(store, &stage_root)?;
            let changes = refs::ref_to_ref_copy(store, &workspace_root, &stage_root, add_path, &from_metadata, &mut to_metadata)?;
            write_metadata(store, &stage_root, &to_metadata)?;
            Ok(changes)
        })
    }

    /// Revert `stage`'s content at `add_path` back to `head`'s.
    pub fn stage_remove(&mut self, add_path: &str) -> Result<Vec<ObjectChange>> {
        self.atomic(|store, _signer, _peer_id, _public_key, paths| {
            let active = Self::active_branch_inner(store, paths)?;
            let head_root = paths.ref_root(active.as_str(), "head");
            let stage_root = paths.ref_root(active.as_str(), "stage");
            let from_metadata = read_metadata(store, &head_root)?;
            let mut to_metadata = read_metadata(store, &stage_root)?;
            let changes = refs::ref_to_ref_copy(store, &head_root, &stage_root, add_path, &from_metadata, &mut to_metadata)?;
            write_metadata(store, &stage_root, &to_metadata)?;
            Ok(changes)
        })
    }

    /// `(head→stage, stage→workspace)` change sets — staged and unstaged.
    /// The three refs always exist once a branch has been created (`init`/
    /// `branch_create` seed empty `head`/`stage`/`workspace` trees), so
    /// resolving their file roots never hits the empty-tree fallback case.
    pub fn stage_status(&self) -> Result<(Vec<ObjectChange>, Vec<ObjectChange>)> {
        let active = self.active_branch()?;
        let head = self.store.stat(&CommitPaths::files(&self.paths.ref_root(active.as_str(), "head")))?;
        let stage = self.store.stat(&CommitPaths::files(&self.paths.ref_root(active.as_str(), "stage")))?;
        let workspace = self.store.stat(&CommitPaths::files(&self.paths.ref_root(active.as_str(), "workspace")))?;
        let staged = self.store.object_diff(&head, &stage)?;
        let unstaged = self.store.object_diff(&stage, &workspace)?;
        Ok((staged, unstaged))
    }

    /// Line-level diff of `@head` against `@stage` (the original's plain
    /// `stage diff`).
    pub fn stage_diff(&self) -> Result<Vec<(String, Vec<DiffLine>)>> {
        let active = self.active_branch()?;
        let head = self.paths.ref_root(active.as_str(), "head");
        let stage = self.paths.ref_root(active.as_str(), "stage");
        diff_refs(&self.store, &head, &stage)
    }

    /// Commit the current `stage` onto `head`.
    pub fn stage_commit(&mut self, message: &str) -> Result<ObjectId> {
        self.atomic(|store, signer, peer_id, public_key, paths| {
            let active = Self::active_branch_inner(store, paths)?;
            match refs::branch_state(store, paths, active.as_str()) {
                BranchState::Clean => {}
                BranchState::MergePending => {
                    return Err(LoamError::PendingConflict { branch: active.to_string(), state: "merge".into() })
                }
                BranchState::ReplayPending => {
                    return Err(LoamError::PendingConflict { branch: active.to_string(), state: "replay".into() })
                }
            }
            let head = paths.ref_root(active.as_str(), "head");
            let stage = paths.ref_root(active.as_str(), "stage");
            commit::commit(store, signer, peer_id, public_key, &head, &stage, message, None, None, false)
        })
    }

    /// Move `head` back to its parent, leaving `stage` (and so the
    /// commit's changes) in place for re-committing.
    pub fn stage_uncommit(&mut self) -> Result<()> {
        self.atomic(|store, _signer, _peer_id, _public_key, paths| {
            let active = Self::active_branch_inner(store, paths)?;
            let head = paths.ref_root(active.as_str(), "head");
            let parent_id = store.stat(&CommitPaths::parent(&head)).map_err(|_| LoamError::NoSuchCommit {
                hash: "no parent commit to uncommit to".into(),
            })?;
            let parent_root = StorePath::by_hash(parent_id, Vec::<String>::new());
            store.rm(&head, true)?;
            store.cp(&parent_root, &head)?;
            Ok(())
        })
    }

    /// General ref-to-ref diff, default `@stage` vs `@workspace` when both
    /// are `None`, matching the CLI's `diff [TO] [FROM]`.
    pub fn diff(&self, to: Option<&str>, from: Option<&str>) -> Result<Vec<(String, Vec<DiffLine>)>> {
        let active = self.active_branch()?;
        let ctx = crate::resolve::ResolveContext { repo: &self.paths, active_branch: active.as_str() };
        let to_resolved = crate::resolve::resolve(to.unwrap_or("@workspace"), &ctx, &self.store)?;
        let from_resolved = crate::resolve::resolve(from.unwrap_or("@stage"), &ctx, &self.store)?;
        diff_refs(&self.store, &from_resolved.commit_root, &to_resolved.commit_root)
    }

    /// Merge `theirs` into the active branch. Fast-forwards when possible,
    /// otherwise performs a three-way content merge; conflicts move the
    /// branch into `MERGE_PENDING` (see the conflict-state machine).
    pub fn branch_merge(&mut self, theirs: &str, message: Option<&str>) -> Result<MergeReport> {
        self.atomic(|store, signer, peer_id, public_key, paths| {
            let active = Self::active_branch_inner(store, paths)?;
            match refs::branch_state(store, paths, active.as_str()) {
                BranchState::Clean => {}
                BranchState::MergePending => {
                    return Err(LoamError::PendingConflict { branch: active.to_string(), state: "merge".into() })
                }
                BranchState::ReplayPending => {
                    return Err(LoamError::PendingConflict { branch: active.to_string(), state: "replay".into() })
                }
            }
            merge_branch(store, signer, peer_id, public_key, paths, active.as_str(), theirs, message)
        })
    }

    pub fn branch_merge_resolve(&mut self, message: Option<&str>) -> Result<MergeReport> {
        self.atomic(|store, signer, peer_id, public_key, paths| {
            let active = Self::active_branch_inner(store, paths)?;
            match refs::branch_state(store, paths, active.as_str()) {
                BranchState::MergePending => resolve_merge(store, signer, peer_id, public_key, paths, active.as_str(), message),
                other => Err(LoamError::PendingConflict { branch: active.to_string(), state: format!("{other:?} (nothing to resolve)") }),
            }
        })
    }

    pub fn branch_merge_abort(&mut self) -> Result<MergeReport> {
        self.atomic(|store, _signer, _peer_id, _public_key, paths| {
            let active = Self::active_branch_inner(store, paths)?;
            match refs::branch_state(store, paths, active.as_str()) {
                BranchState::MergePending => {
                    abort_merge(store, paths, active.as_str())?;
                    Ok(MergeReport::Aborted)
                }
                other => Err(LoamError::PendingConflict { branch: active.to_string(), state: format!("{other:?} (nothing to abort)") }),
            }
        })
    }

    /// Replay the active branch's unique commits onto `theirs`'s head.
    pub fn branch_replay(&mut self, theirs: &str) -> Result<ReplayStatus> {
        self.atomic(|store, signer, peer_id, public_key, paths| {
            let active = Self::active_branch_inner(store, paths)?;
            match refs::branch_state(store, paths, active.as_str()) {
                BranchState::Clean => {}
                BranchState::MergePending => {
                    return Err(LoamError::PendingConflict { branch: active.to_string(), state: "merge".into() })
                }
                BranchState::ReplayPending => {
                    return Err(LoamError::PendingConflict { branch: active.to_string(), state: "replay".into() })
                }
            }
            let their_root = paths.ref_root(theirs, "head");
            replay::start_replay(store, signer, peer_id, public_key, paths, active.as_str(), &their_root, theirs)
        })
    }

    pub fn branch_replay_resume(&mut self) -> Result<ReplayStatus> {
        self.atomic(|store, signer, peer_id, public_key, paths| {
            let active = Self::active_branch_inner(store, paths)?;
            replay::resume_replay(store, signer, peer_id, public_key, paths, active.as_str())
        })
    }

    pub fn branch_replay_abort(&mut self) -> Result<()> {
        self.atomic(|store, _signer, _peer_id, _public_key, paths| {
            let active = Self::active_branch_inner(store, paths)?;
            replay::abort_replay(store, paths, active.as_str())
        })
    }
}

/// Repository-registry operations (`repo ls`/`rm`/`mv`): these act on the
/// `repos/` namespace as a whole rather than one already-bound `Repo`, since
/// the hex key that names a repo is derived from its filesystem root before
/// a `Repo` can be constructed for it.
pub fn list_repos(store: &impl Store) -> Result<Vec<String>> {
    match store.ls(&StorePath::named(["repos"])) {
        Ok(entries) => Ok(entries.into_iter().map(|e| e.name).collect()),
        Err(_) => Ok(Vec::new()),
    }
}

/// Remove a repository's whole subtree under `repos/<repo_hex>`.
pub fn remove_repo(store: &mut impl Store, repo_hex: &str) -> Result<()> {
    let root = RepoPaths::new(repo_hex).repo_root();
    if store.stat(&root).is_err() {
        return Err(LoamError::NoRepoHere { path: repo_hex.into() });
    }
    store.rm(&root, true)
}

/// Relocate a repository from `old_hex` to `new_hex` (the hash of its new
/// filesystem root). Errors if a repository already lives at the
/// destination; the caller is responsible for moving the on-disk directory
/// itself (content is addressed only by hex, not by path).
pub fn move_repo(store: &mut impl Store, old_hex: &str, new_hex: &str) -> Result<()> {
    let old_root = RepoPaths::new(old_hex).repo_root();
    let new_root = RepoPaths::new(new_hex).repo_root();
    if store.stat(&old_root).is_err() {
        return Err(LoamError::NoRepoHere { path: old_hex.into() });
    }
    if store.stat(&new_root).is_ok() {
        return Err(LoamError::RepoConflict {
            existing: new_root.display().into(),
            requested: new_root.display().into(),
        });
    }
    store.cp(&old_root, &new_root)?;
    store.rm(&old_root, true)
}

fn checkout_branch<St: Store>(store: &mut St, paths: &RepoPaths, branch: &str, fs_root: &Path) -> Result<()> {
    if store.stat(&paths.branch_dir(branch)).is_err() {
        return Err(LoamError::NoSuchRef { refpath: format!("@{branch}") });
    }
    let workspace_root = paths.ref_root(branch, "workspace");
    let metadata = read_metadata(store, &workspace_root)?;

    let disk_scan = scanner::scan(fs_root, &FilesMetadata::default())?;
    let on_disk: BTreeSet<String> = disk_scan
        .added
        .into_iter()
        .chain(disk_scan.modified)
        .chain(disk_scan.persistent)
        .collect();
    let added_on_disk: BTreeSet<String> = on_disk.difference(&metadata.0.keys().cloned().collect()).cloned().collect();
    let stale_on_disk: BTreeSet<String> = metadata.0.keys().cloned().collect();

    refs::load_ref_into_workspace(store, &workspace_root, fs_root, &metadata, &added_on_disk, &stale_on_disk)?;
    store.write(&paths.active_branch_name(), branch.as_bytes(), true, true)?;
    Ok(())
}

fn diff_refs<St: Store>(store: &St, from_root: &StorePath, to_root: &StorePath) -> Result<Vec<(String, Vec<DiffLine>)>> {
    let from_files = CommitPaths::files(from_root);
    let to_files = CommitPaths::files(to_root);
    let from_id = store.stat(&from_files).unwrap_or_else(|_| store.root());
    let to_id = store.stat(&to_files).unwrap_or_else(|_| store.root());
    let changes = store.object_diff(&from_id, &to_id)?;

    let mut out = Vec::new();
    for change in changes {
        let (Some(before_id), Some(after_id)) = (&change.before, &change.after) else {
            continue; // pure add/remove: nothing to line-diff
        };
        let before = store.cat(before_id)?;
        let after = store.cat(after_id)?;
        let before_text = String::from_utf8_lossy(&before);
        let after_text = String::from_utf8_lossy(&after);
        let before_lines = split_lines(&before_text);
        let after_lines = split_lines(&after_text);
        out.push((change.path, ndiff(&before_lines, &after_lines)));
    }
    Ok(out)
}

/// Paths touched both by uncommitted local changes (`head`→`stage`→
/// `workspace`) and by the incoming side (`lca`→`theirs`).
fn overlapping_local_changes<St: Store>(
    store: &St,
    head_files_id: &ObjectId,
    stage_files_id: &ObjectId,
    workspace_files_id: &ObjectId,
    lca_files_id: &ObjectId,
    their_files_id: &ObjectId,
) -> Result<Vec<String>> {
    let mut local: BTreeSet<String> = store
        .object_diff(head_files_id, stage_files_id)?
        .into_iter()
        .map(|c| c.path)
        .collect();
    local.extend(store.object_diff(stage_files_id, workspace_files_id)?.into_iter().map(|c| c.path));
    let incoming: BTreeSet<String> = store.object_diff(lca_files_id, their_files_id)?.into_iter().map(|c| c.path).collect();
    Ok(local.intersection(&incoming).cloned().collect())
}

fn merge_branch<St, Sg>(
    store: &mut St,
    signer: &Sg,
    peer_id: &PeerId,
    public_key: &PublicKey,
    paths: &RepoPaths,
    branch: &str,
    theirs: &str,
    message: Option<&str>,
) -> Result<MergeReport>
where
    St: Store,
    Sg: SigningCapability,
    LoamError: From<Sg::Error>,
{
    let their_root = paths.ref_root(theirs, "head");
    if store.stat(&their_root).is_err() {
        return Err(LoamError::NoSuchRef { refpath: format!("@{theirs}") });
    }
    let our_head_root = paths.ref_root(branch, "head");
    let our_head_id = store.stat(&our_head_root)?;
    let their_head_id = store.stat(&their_root)?;

    if our_head_id == their_head_id {
        return Ok(MergeReport::AlreadyUpToDate);
    }

    let lca_id = dag::lowest_common_ancestor(store, &our_head_id, &their_head_id, branch, theirs)?;
    if lca_id == their_head_id {
        return Ok(MergeReport::AlreadyUpToDate);
    }
    if lca_id == our_head_id {
        for ref_name in ["head", "stage", "workspace"] {
            let dst = paths.ref_root(branch, ref_name);
            store.rm(&dst, true)?;
            store.cp(&their_root, &dst)?;
        }
        return Ok(MergeReport::FastForward);
    }

    let lca_root = StorePath::by_hash(lca_id.clone(), Vec::<String>::new());
    let our_files_id = store.stat(&CommitPaths::files(&our_head_root))?;
    let their_files_id = store.stat(&CommitPaths::files(&their_root))?;
    let lca_files_id = store.stat(&CommitPaths::files(&lca_root))?;

    let stage_root = paths.ref_root(branch, "stage");
    let workspace_root = paths.ref_root(branch, "workspace");
    let stage_files_id = store.stat(&CommitPaths::files(&stage_root))?;
    let workspace_files_id = store.stat(&CommitPaths::files(&workspace_root))?;

    let overlapping =
        overlapping_local_changes(store, &our_files_id, &stage_files_id, &workspace_files_id, &lca_files_id, &their_files_id)?;
    if !overlapping.is_empty() {
        return Err(LoamError::PreMergeLocalChanges { paths: overlapping });
    }

    let outcome = merge::merge_trees(store, &lca_files_id, &our_files_id, &their_files_id, branch, theirs)?;

    store.rm(&stage_root, true)?;
    store.cp(&our_head_root, &stage_root)?;
    replay::apply_resolutions(store, &CommitPaths::files(&stage_root), &outcome.resolutions)?;

    if outcome.conflicts.is_empty() {
        let msg = message.map(str::to_string).unwrap_or_else(|| format!("Merge branch '{theirs}' into {branch}"));
        commit::commit(store, signer, peer_id, public_key, &our_head_root, &stage_root, &msg, Some(&their_root), None, false)?;
        Ok(MergeReport::Merged)
    } else {
        for ref_name in ["head", "stage", "workspace"] {
            let src = paths.ref_root(branch, ref_name);
            let backup = paths.ref_root(branch, &format!("premerge_{ref_name}"));
            store.cp(&src, &backup)?;
        }
        store.rm(&workspace_root, true)?;
        store.cp(&stage_root, &workspace_root)?;
        store.cp(&their_root, &paths.ref_root(branch, "merge_head"))?;
        store.write(
            &paths.ref_root(branch, "conflict_files"),
            outcome.conflicts.join("\n").as_bytes(),
            true,
            true,
        )?;
        Ok(MergeReport::Conflicts { paths: outcome.conflicts })
    }
}

fn resolve_merge<St, Sg>(
    store: &mut St,
    signer: &Sg,
    peer_id: &PeerId,
    public_key: &PublicKey,
    paths: &RepoPaths,
    branch: &str,
    message: Option<&str>,
) -> Result<MergeReport>
where
    St: Store,
    Sg: SigningCapability,
    LoamError: From<Sg::Error>,
{
    let conflict_bytes = store.read(&paths.ref_root(branch, "conflict_files"))?;
    let conflict_files: Vec<String> = String::from_utf8_lossy(&conflict_bytes).lines().filter(|l| !l.is_empty()).map(str::to_string).collect();

    let stage_root = paths.ref_root(branch, "stage");
    let mut remaining_markers = Vec::new();
    for path in &conflict_files {
        let target = crate::store_util::join_relative(&CommitPaths::files(&stage_root), path);
        let content = store.read(&target)?;
        let text = String::from_utf8_lossy(&content);
        if text.contains(">>>>>>>") || text.contains("=======") || text.contains("<<<<<<<") {
            remaining_markers.push(path.clone());
        }
    }
    if !remaining_markers.is_empty() {
        return Err(LoamError::MarkersRemaining { paths: remaining_markers });
    }

    let head_root = paths.ref_root(branch, "head");
    let their_root = paths.ref_root(branch, "merge_head");
    let msg = message.map(str::to_string).unwrap_or_else(|| "Resolve merge conflicts".to_string());
    commit::commit(store, signer, peer_id, public_key, &head_root, &stage_root, &msg, Some(&their_root), None, false)?;

    for aux in ["merge_head", "conflict_files", "premerge_head", "premerge_stage", "premerge_workspace"] {
        let p = paths.ref_root(branch, aux);
        if store.stat(&p).is_ok() {
            store.rm(&p, true)?;
        }
    }
    Ok(MergeReport::Merged)
}

fn abort_merge<St: Store>(store: &mut St, paths: &RepoPaths, branch: &str) -> Result<()> {
    for ref_name in ["head", "stage", "workspace"] {
        let backup = paths.ref_root(branch, &format!("premerge_{ref_name}"));
        if store.stat(&backup).is_ok() {
            let dst = paths.ref_root(branch, ref_name);
            store.rm(&dst, true)?;
            store.cp(&backup, &dst)?;
        }
    }
    for aux in ["merge_head", "conflict_files", "premerge_head", "premerge_stage", "premerge_workspace"] {
        let p = paths.ref_root(branch, aux);
        if store.stat(&p).is_ok() {
            store.rm(&p, true)?;
        }
    }
    Ok(())
}
