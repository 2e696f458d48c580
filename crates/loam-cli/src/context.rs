//! Process-local wiring: where `loam`'s home directory lives, how a repo's
//! store root is found and re-persisted across invocations, and how a
//! filesystem path turns into the hex key `loam-core` addresses repos by.
//!
//! Every command function is a fresh process, so none of `loam-core`'s
//! in-memory state (a `Repo`'s owned `Store`, a `LocalSigner`'s key map)
//! survives between commands on its own. This module is the sidecar layer
//! that makes that state durable: a `ROOT` file holding the store's current
//! root `ObjectId`, and a `keys.json` keystore (see `keystore.rs`) holding
//! signing identities.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _, Result};
use loam_core::config::RepoConfig;
use loam_core::model::OutputLevel;
use loam_core::Repo;
use loam_signing::{LocalSigner, SigningCapability as _};
use loam_store::{FsStore, ObjectId, Store as _};

/// Where loam keeps its object store, root pointer, and keystore. Honors
/// `LOAM_HOME` for tests and for users who want an alternate location;
/// otherwise `~/.loam`.
pub fn loam_home() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("LOAM_HOME") {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs_home()?;
    Ok(home.join(".loam"))
}

fn dirs_home() -> Result<PathBuf> {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .context("could not determine home directory (set HOME or LOAM_HOME)")
}

fn root_file(home: &Path) -> PathBuf {
    home.join("ROOT")
}

/// Open the shared object store, restoring its root pointer from the `ROOT`
/// sidecar file if one exists. A fresh store starts at an empty tree, which
/// is exactly what `FsStore::open` gives us, so a missing sidecar needs no
/// special case.
pub fn open_store(home: &Path) -> Result<FsStore> {
    std::fs::create_dir_all(home)
        .with_context(|| format!("creating loam home at {}", home.display()))?;
    let mut store = FsStore::open(home.join("objects")).context("opening object store")?;
    let root_path = root_file(home);
    if root_path.exists() {
        let text = std::fs::read_to_string(&root_path)
            .with_context(|| format!("reading {}", root_path.display()))?;
        let id: ObjectId = text
            .trim()
            .parse()
            .with_context(|| format!("{} does not contain a valid object id", root_path.display()))?;
        store.set_root(id);
    }
    Ok(store)
}

/// Persist the store's current root pointer. Call this after every command,
/// whether it succeeded or failed, since a failed command may still have
/// rolled back to a valid (if unchanged) root via the Atomic Harness.
pub fn save_root(home: &Path, store: &FsStore) -> Result<()> {
    let root_path = root_file(home);
    std::fs::write(&root_path, store.root().to_string())
        .with_context(|| format!("writing {}", root_path.display()))?;
    Ok(())
}

/// The hex key `loam-core` addresses a repo's namespace by: the UTF-8 bytes
/// of its canonicalized filesystem path, hex-encoded. Not a content hash —
/// reversible via `hex_to_path`, which `repo ls`/`repo show` rely on to
/// print human-readable paths back to the user.
pub fn path_to_hex(path: &Path) -> Result<String> {
    let canon = path
        .canonicalize()
        .with_context(|| format!("resolving {}", path.display()))?;
    let s = canon.to_str().context("repository path is not valid UTF-8")?;
    Ok(s.as_bytes().iter().map(|b| format!("{b:02x}")).collect())
}

pub fn hex_to_path(hex: &str) -> Result<PathBuf> {
    if hex.len() % 2 != 0 {
        bail!("'{hex}' is not a valid repo key (odd length)");
    }
    let bytes: Result<Vec<u8>, _> = (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16))
        .collect();
    let bytes = bytes.with_context(|| format!("'{hex}' is not a valid repo key"))?;
    let s = String::from_utf8(bytes).with_context(|| format!("'{hex}' does not decode to a UTF-8 path"))?;
    Ok(PathBuf::from(s))
}

/// Walk upward from `start` looking for a `.loam` marker directory, the way
/// a `.git` search works. Returns the directory that contains `.loam`, i.e.
/// the repository's filesystem root.
pub fn discover_repo_root(start: &Path) -> Result<PathBuf> {
    let mut cur = start
        .canonicalize()
        .with_context(|| format!("resolving {}", start.display()))?;
    loop {
        if cur.join(".loam").is_dir() {
            return Ok(cur);
        }
        if !cur.pop() {
            bail!(loam_core::LoamError::NoRepoHere { path: start.to_path_buf() });
        }
    }
}

/// The signing key-name used for a given repo: a stable per-repo identity
/// name, distinct from any other repo's, so one keystore can hold many
/// repos' signing keys side by side.
pub fn key_name_for(repo_hex: &str) -> String {
    format!("repo-{repo_hex}")
}

pub fn load_config(fs_root: &Path) -> Result<RepoConfig> {
    let path = fs_root.join(".loam").join("config.toml");
    if !path.exists() {
        return Ok(RepoConfig::default());
    }
    let text = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    RepoConfig::parse(&text).map_err(|e| {
        anyhow::Error::new(loam_core::LoamError::ConfigError {
            path,
            detail: e.to_string(),
        })
    })
}

/// Discover the repo rooted above `start`, open its store and signing
/// identity, and build a `Repo` ready for a command to call into. Returns
/// the constructed repo together with the shared loam home (callers must
/// pass the repo's store back to `save_root` once the command is done) and
/// the repo's filesystem root (for commands that sync the workspace).
pub struct OpenedRepo {
    pub repo: Repo<FsStore, LocalSigner>,
    pub home: PathBuf,
    pub fs_root: PathBuf,
}

pub fn open_existing_repo(start: &Path, output_level: OutputLevel) -> Result<OpenedRepo> {
    let fs_root = discover_repo_root(start)?;
    open_repo_at(&fs_root, output_level)
}

/// Like `open_existing_repo`, but for callers (namely `repo init`) that
/// already know the filesystem root and don't want the `.loam` marker
/// search — the marker may not exist yet.
pub fn open_repo_at(fs_root: &Path, output_level: OutputLevel) -> Result<OpenedRepo> {
    let home = loam_home()?;
    let store = open_store(&home)?;
    let repo_hex = path_to_hex(fs_root)?;
    let key_name = key_name_for(&repo_hex);
    let mut signer = crate::keystore::load_or_create(&home, &key_name)?;
    let keys = signer.fetch_peer_keys(&key_name)?;
    let config = load_config(fs_root)?;

    let mut repo = Repo::new(store, signer, keys.peer_id, keys.public_key, repo_hex, config);
    repo.set_output_level(output_level);
    Ok(OpenedRepo { repo, home, fs_root: fs_root.to_path_buf() })
}

/// Persist the store's root pointer. Signing identities never change after
/// creation, so the keystore needs no equivalent "save" step here.
pub fn finish(opened: &OpenedRepo) -> Result<()> {
    save_root(&opened.home, opened.repo.store())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trips_a_path() {
        let p = PathBuf::from("/tmp/some-repo");
        let hex: String = p.to_str().unwrap().as_bytes().iter().map(|b| format!("{b:02x}")).collect();
        assert_eq!(hex_to_path(&hex).unwrap(), p);
    }

    #[test]
    fn hex_to_path_rejects_odd_length() {
        assert!(hex_to_path("abc").is_err());
    }
}
