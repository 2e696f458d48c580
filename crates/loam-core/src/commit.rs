use loam_signing::{PeerId, PublicKey, SigningCapability};
use loam_store::{ObjectId, Store, StorePath};

use crate::error::{LoamError, Result};
use crate::layout::CommitPaths;
use crate::model::{Author, CommitMetadata};

/// Create a commit node from the current `stage`, move `head` to it, link
/// the prior head as `parent` (and `merge_parent` if supplied), sign, and
/// write metadata. Returns the new head's object id.
///
/// `metadata_override` lets the Replay Controller recommit with the
/// original message/author/timestamp instead of minting fresh ones.
pub fn commit<S>(
    store: &mut impl Store,
    signer: &S,
    peer_id: &PeerId,
    public_key: &PublicKey,
    head: &StorePath,
    stage: &StorePath,
    message: &str,
    merge_parent: Option<&StorePath>,
    metadata_override: Option<CommitMetadata>,
    is_replay: bool,
) -> Result<ObjectId>
where
    S: SigningCapability,
    LoamError: From<S::Error>,
{
    let stage_hash = store.stat(stage)?;
    let head_hash = store.stat(head)?;
    if stage_hash == head_hash && metadata_override.is_none() {
        return Err(LoamError::NothingToCommit { branch: head.display() });
    }

    let metadata = match metadata_override {
        Some(m) => m,
        None => CommitMetadata {
            message: message.to_string(),
            author: Some(Author { peer_id: peer_id.to_string(), public_key: public_key.to_string() }),
            timestamp: now_iso8601(),
            is_merge: merge_parent.is_some(),
            is_replay,
        },
    };

    if store.stat(head).is_ok() {
        store.rm(head, true)?;
    }
    store.cp(stage, head)?;
    store.cp(&StorePath::by_hash(head_hash, Vec::<String>::new()), &CommitPaths::parent(head))?;
    if let Some(mp) = merge_parent {
        let mp_hash = store.stat(mp)?;
        store.cp(&StorePath::by_hash(mp_hash, Vec::<String>::new()), &CommitPaths::merge_parent(head))?;
    }

    let metadata_bytes = serde_json::to_vec_pretty(&metadata).map_err(|e| LoamError::ConfigError {
        path: "commit_metadata".into(),
        detail: e.to_string(),
    })?;
    store.write(&CommitPaths::commit_metadata(head), &metadata_bytes, true, true)?;

    let bundle_hash = store.stat(&CommitPaths::bundle(head))?;
    let data_hash = store.stat(&CommitPaths::data(head))?;
    let bundle_sig = signer.sign(peer_id, bundle_hash.as_str().as_bytes())?;
    let data_sig = signer.sign(peer_id, data_hash.as_str().as_bytes())?;
    store.write(&CommitPaths::bundle_signature(head), bundle_sig.to_string().as_bytes(), true, true)?;
    store.write(&CommitPaths::data_signature(head), data_sig.to_string().as_bytes(), true, true)?;

    store.stat(head).map_err(Into::into)
}

fn now_iso8601() -> String {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    humantime_iso8601(now.as_secs())
}

/// Minimal `YYYY-MM-DDTHH:MM:SSZ` formatter so commit timestamps don't
/// depend on pulling in a full calendar crate for one field.
fn humantime_iso8601(unix_secs: u64) -> String {
    const SECS_PER_DAY: u64 = 86_400;
    let days = unix_secs / SECS_PER_DAY;
    let rem = unix_secs % SECS_PER_DAY;
    let (h, m, s) = (rem / 3600, (rem % 3600) / 60, rem % 60);

    let mut z = days as i64 + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    z -= era * 146_097;
    let doe = z as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m_num = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = if m_num <= 2 { y + 1 } else { y };

    format!("{year:04}-{m_num:02}-{d:02}T{h:02}:{m:02}:{s:02}Z")
}

#[cfg(test)]
mod tests {
    use super::*;
    use loam_signing::LocalSigner;
    use loam_store::MemStore;

    fn fresh(store: &mut MemStore, root: &StorePath) {
        store.mkdir(&CommitPaths::files(root), true).unwrap();
    }

    #[test]
    fn commit_with_no_stage_changes_errors() {
        let mut store = MemStore::in_memory();
        let head = StorePath::named(["branches", "master", "head"]);
        let stage = StorePath::named(["branches", "master", "stage"]);
        fresh(&mut store, &head);
        store.cp(&head, &stage).unwrap();

        let mut signer = LocalSigner::new();
        let keys = signer.create_key("default").unwrap();
        let err = commit(&mut store, &signer, &keys.peer_id, &keys.public_key, &head, &stage, "msg", None, None, false);
        assert!(err.is_err());
    }

    #[test]
    fn commit_moves_head_and_links_parent() {
        let mut store = MemStore::in_memory();
        let head = StorePath::named(["branches", "master", "head"]);
        let stage = StorePath::named(["branches", "master", "stage"]);
        fresh(&mut store, &head);
        fresh(&mut store, &stage);
        store.write(&CommitPaths::files(&stage).join("a.txt"), b"hi", true, true).unwrap();

        let mut signer = LocalSigner::new();
        let keys = signer.create_key("default").unwrap();
        let prior_head_hash = store.stat(&head).unwrap();

        let new_head = commit(
            &mut store, &signer, &keys.peer_id, &keys.public_key, &head, &stage, "first commit", None, None, false,
        )
        .unwrap();

        assert_eq!(new_head, store.stat(&head).unwrap());
        assert_eq!(store.read(&CommitPaths::files(&head).join("a.txt")).unwrap(), b"hi");
        assert_eq!(store.stat(&CommitPaths::parent(&head)).unwrap(), prior_head_hash);
        assert!(store.read(&CommitPaths::bundle_signature(&head)).is_ok());
    }
}
