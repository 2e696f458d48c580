//! Atomic Harness (spec §4.11): every mutating API call snapshots the
//! repository subtree before running, and restores it on failure. Nested
//! calls (an operation invoking another through the same `Repo`) are
//! pass-through — only the outermost call pays for a snapshot.

use loam_store::Store;

use crate::error::Result;
use crate::layout::RepoPaths;

/// Run `f` under atomic protection. `in_atomic` tracks whether an
/// outermost call is already in flight (single-threaded cooperative model,
/// so a plain bool suffices — see the concurrency model this mirrors).
/// `keep_snapshots` controls whether a successful call's snapshot is
/// retained under `snapshots/` or discarded.
pub fn run_atomic<S, T>(
    store: &mut S,
    repo: &RepoPaths,
    in_atomic: &mut bool,
    keep_snapshots: bool,
    f: impl FnOnce(&mut S) -> Result<T>,
) -> Result<T>
where
    S: Store,
{
    if *in_atomic {
        return f(store);
    }

    *in_atomic = true;
    let timestamp_ns = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as i128)
        .unwrap_or(0);
    let base = repo.repo_root();
    let snapshot = repo.snapshot(timestamp_ns);

    let snapshot_result = store.cp(&base, &snapshot);
    if let Err(e) = snapshot_result {
        *in_atomic = false;
        return Err(e.into());
    }

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| f(store)));
    *in_atomic = false;

    let result = match outcome {
        Ok(result) => result,
        Err(payload) => {
            let _ = store.rm(&base, true);
            let _ = store.cp(&snapshot, &base);
            let _ = store.rm(&snapshot, true);
            std::panic::resume_unwind(payload);
        }
    };

    match result {
        Ok(value) => {
            if !keep_snapshots {
                store.rm(&snapshot, true)?;
            }
            Ok(value)
        }
        Err(e) => {
            store.rm(&base, true)?;
            store.cp(&snapshot, &base)?;
            store.rm(&snapshot, true)?;
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loam_store::MemStore;

    #[test]
    fn nested_call_does_not_snapshot_again() {
        let mut store = MemStore::in_memory();
        let repo = RepoPaths::new("abc");
        store.mkdir(&repo.repo_root(), true).unwrap();
        let mut in_atomic = true; // simulate already being inside an outer call

        let result: Result<()> = run_atomic(&mut store, &repo, &mut in_atomic, false, |_| Ok(()));
        assert!(result.is_ok());
        assert!(store.stat(&repo.snapshots_dir()).is_err());
    }

    #[test]
    fn failure_restores_prior_state() {
        let mut store = MemStore::in_memory();
        let repo = RepoPaths::new("abc");
        let marker = repo.repo_root().join("marker");
        store.write(&marker, b"before", true, true).unwrap();
        let mut in_atomic = false;

        let result: Result<()> = run_atomic(&mut store, &repo, &mut in_atomic, false, |s| {
            s.write(&marker, b"after", true, true)?;
            Err(crate::error::LoamError::NothingToCommit { branch: "x".into() })
        });
        assert!(result.is_err());
        assert_eq!(store.read(&marker).unwrap(), b"before");
        assert!(!in_atomic);
    }

    #[test]
    fn panic_restores_prior_state() {
        let mut store = MemStore::in_memory();
        let repo = RepoPaths::new("abc");
        let marker = repo.repo_root().join("marker");
        store.write(&marker, b"before", true, true).unwrap();
        let mut in_atomic = false;

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            run_atomic(&mut store, &repo, &mut in_atomic, false, |s| {
                s.write(&marker, b"after", true, true)?;
                panic!("boom");
                #[allow(unreachable_code)]
                Ok(())
            })
        }));
        assert!(outcome.is_err());
        assert_eq!(store.read(&marker).unwrap(), b"before");
        assert!(!in_atomic);
    }

    #[test]
    fn success_discards_snapshot_by_default() {
        let mut store = MemStore::in_memory();
        let repo = RepoPaths::new("abc");
        store.mkdir(&repo.repo_root(), true).unwrap();
        let mut in_atomic = false;

        let result: Result<()> = run_atomic(&mut store, &repo, &mut in_atomic, false, |_| Ok(()));
        assert!(result.is_ok());
        assert!(store.ls(&repo.snapshots_dir()).map(|v| v.is_empty()).unwrap_or(true));
    }

    #[test]
    fn success_keeps_snapshot_when_configured() {
        let mut store = MemStore::in_memory();
        let repo = RepoPaths::new("abc");
        store.mkdir(&repo.repo_root(), true).unwrap();
        let mut in_atomic = false;

        let _: Result<()> = run_atomic(&mut store, &repo, &mut in_atomic, true, |_| Ok(()));
        assert_eq!(store.ls(&repo.snapshots_dir()).unwrap().len(), 1);
    }
}
