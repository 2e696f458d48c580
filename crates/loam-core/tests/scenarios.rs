//! End-to-end scenarios exercising the Public API the way a CLI command
//! would: `MemStore` + `LocalSigner`, real filesystem trees under
//! `tempfile::tempdir()`.

use loam_core::{LoamError, MergeReport, Repo, ReplayStatus};
use loam_signing::LocalSigner;
use loam_store::MemStore;

fn repo(repo_hex: &str) -> Repo<MemStore, LocalSigner> {
    let store = MemStore::in_memory();
    let mut signer = LocalSigner::new();
    let keys = signer.create_key("me").unwrap();
    Repo::new(store, signer, keys.peer_id, keys.public_key, repo_hex, loam_core::config::RepoConfig::default())
}

#[test]
fn initialize_and_commit() {
    let mut r = repo("scenario1");
    r.init(None).unwrap();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), b"hello").unwrap();

    r.stage_add(dir.path(), "").unwrap();
    let id = r.stage_commit("m1").unwrap();

    let history = r.branch_history(None).unwrap();
    assert_eq!(history, vec![id]);

    let entries = r.branch_show("@head").unwrap();
    assert!(entries.iter().any(|e| e.name == "a.txt"));
}

#[test]
fn branch_and_fast_forward_merge() {
    let mut r = repo("scenario2");
    r.init(None).unwrap();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), b"hello").unwrap();
    r.stage_add(dir.path(), "").unwrap();
    r.stage_commit("m1").unwrap();

    r.branch_create("other", None, false, None).unwrap();

    std::fs::write(dir.path().join("a.txt"), b"hello\nworld").unwrap();
    r.stage_add(dir.path(), "").unwrap();
    let master_head = r.stage_commit("m2").unwrap();

    r.branch_checkout("other", dir.path()).unwrap();
    let report = r.branch_merge("master", None).unwrap();
    assert_eq!(report, MergeReport::FastForward);

    let other_head = r.branch_history(Some("other")).unwrap();
    assert_eq!(other_head[0], master_head);
}

#[test]
fn three_way_merge_conflict_then_abort() {
    let mut r = repo("scenario3");
    r.init(None).unwrap();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), "line1\nline2\nline3\nline4\n").unwrap();
    r.stage_add(dir.path(), "").unwrap();
    r.stage_commit("base").unwrap();

    r.branch_create("other", None, false, None).unwrap();

    std::fs::write(dir.path().join("a.txt"), "line1\nother\nline3\nline4\n").unwrap();
    r.stage_add(dir.path(), "").unwrap();
    r.stage_commit("m2").unwrap();

    r.branch_checkout("other", dir.path()).unwrap();
    std::fs::write(dir.path().join("a.txt"), "line1\nline2\nblerg\nline4\n").unwrap();
    r.stage_add(dir.path(), "").unwrap();
    r.stage_commit("m3").unwrap();

    let report = r.branch_merge("master", None).unwrap();
    match report {
        MergeReport::Conflicts { paths } => assert_eq!(paths, vec!["a.txt".to_string()]),
        other => panic!("expected Conflicts, got {other:?}"),
    }
    let (_, state) = r.branch_status().unwrap();
    assert_eq!(state, loam_core::refs::BranchState::MergePending);

    let aborted = r.branch_merge_abort().unwrap();
    assert_eq!(aborted, MergeReport::Aborted);
    let (_, state) = r.branch_status().unwrap();
    assert_eq!(state, loam_core::refs::BranchState::Clean);
}

#[test]
fn replay_onto_another_branch() {
    let mut r = repo("scenario4");
    r.init(None).unwrap();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), "base\n").unwrap();
    r.stage_add(dir.path(), "").unwrap();
    r.stage_commit("base").unwrap();

    r.branch_create("other", None, false, None).unwrap();

    std::fs::write(dir.path().join("a.txt"), "base\nmaster change\n").unwrap();
    r.stage_add(dir.path(), "").unwrap();
    r.stage_commit("master commit").unwrap();

    r.branch_checkout("other", dir.path()).unwrap();
    std::fs::write(dir.path().join("a.txt"), "base\nother change\n").unwrap();
    r.stage_add(dir.path(), "").unwrap();
    r.stage_commit("other commit").unwrap();

    let status = r.branch_replay("master").unwrap();
    assert!(matches!(status, ReplayStatus::Complete | ReplayStatus::ResumeRequired { .. }));

    if let ReplayStatus::ResumeRequired { .. } = status {
        r.branch_replay_abort().unwrap();
    }
}

#[test]
fn reject_staged_change_pull() {
    let mut r = repo("scenario5");
    r.init(None).unwrap();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), "base\n").unwrap();
    r.stage_add(dir.path(), "").unwrap();
    r.stage_commit("base").unwrap();

    r.branch_create("other", None, false, None).unwrap();

    std::fs::write(dir.path().join("a.txt"), "base\nmaster change\n").unwrap();
    r.stage_add(dir.path(), "").unwrap();
    r.stage_commit("master commit").unwrap();

    r.branch_checkout("other", dir.path()).unwrap();
    std::fs::write(dir.path().join("a.txt"), "base\nuncommitted other edit\n").unwrap();
    r.stage_add(dir.path(), "").unwrap(); // staged, not committed

    let err = r.branch_merge("master", None).unwrap_err();
    assert!(matches!(err, LoamError::PreMergeLocalChanges { .. }));
}

#[test]
fn atomic_failure_leaves_repo_unchanged() {
    let mut r = repo("scenario6");
    r.init(None).unwrap();
    let before = r.branch_history(None).unwrap();

    let err = r.stage_commit("nothing staged").unwrap_err();
    assert!(matches!(err, LoamError::NothingToCommit { .. }));

    let after = r.branch_history(None).unwrap();
    assert_eq!(before, after);
}
