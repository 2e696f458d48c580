//! On-disk persistence for `LocalSigner` identities. `LocalSigner` itself
//! keeps keys in memory only (see `loam-signing`'s doc comment), so a CLI
//! invocation needs to reload every known key on startup and hand them all
//! to a fresh `LocalSigner` before it opens a repo.
//!
//! One keystore file, `keys.json`, holds every repo's signing key side by
//! side, keyed by name (`key_name_for` in `context.rs`), so a single `loam
//! repo mv` doesn't strand an identity under its old name.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context as _, Result};
use loam_signing::{LocalSigner, SigningCapability as _};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize)]
struct KeyFile {
    /// key name -> hex-encoded 32-byte Ed25519 secret.
    keys: BTreeMap<String, String>,
}

fn keystore_path(home: &Path) -> std::path::PathBuf {
    home.join("keys.json")
}

fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn decode_hex(s: &str) -> Result<[u8; 32]> {
    if s.len() != 64 {
        anyhow::bail!("malformed key entry in keystore (expected 64 hex chars, got {})", s.len());
    }
    let mut out = [0u8; 32];
    for (i, chunk) in out.iter_mut().enumerate() {
        *chunk = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).context("malformed key entry in keystore")?;
    }
    Ok(out)
}

fn load_keyfile(home: &Path) -> Result<KeyFile> {
    let path = keystore_path(home);
    if !path.exists() {
        return Ok(KeyFile::default());
    }
    let text = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn save_keyfile(home: &Path, keyfile: &KeyFile) -> Result<()> {
    let path = keystore_path(home);
    let text = serde_json::to_string_pretty(keyfile).context("serializing keystore")?;
    std::fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Build a `LocalSigner` containing every previously-seen key, creating and
/// persisting `key_name` if it isn't present yet. Reloading the whole
/// keystore on every call keeps this simple at the cost of re-parsing a
/// small JSON file per invocation, which is fine at CLI scale.
pub fn load_or_create(home: &Path, key_name: &str) -> Result<LocalSigner> {
    let mut keyfile = load_keyfile(home)?;
    let mut signer = LocalSigner::new();
    for (name, hex) in &keyfile.keys {
        let secret = decode_hex(hex)?;
        signer
            .import_key(name, &secret)
            .with_context(|| format!("loading key '{name}' from keystore"))?;
    }

    if !keyfile.keys.contains_key(key_name) {
        signer.create_key(key_name).with_context(|| format!("creating key '{key_name}'"))?;
        let secret = signer.export_secret(key_name).context("reading back freshly created key")?;
        keyfile.keys.insert(key_name.to_string(), encode_hex(&secret));
        save_keyfile(home, &keyfile)?;
    }

    Ok(signer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_and_reloads_the_same_identity() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = load_or_create(dir.path(), "repo-a").unwrap();
        let keys_a = first.fetch_peer_keys("repo-a").unwrap();

        let mut second = load_or_create(dir.path(), "repo-a").unwrap();
        let keys_b = second.fetch_peer_keys("repo-a").unwrap();

        assert_eq!(keys_a.public_key, keys_b.public_key);
    }

    #[test]
    fn distinct_repos_get_distinct_keys_in_one_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = load_or_create(dir.path(), "repo-a").unwrap();
        let mut b = load_or_create(dir.path(), "repo-b").unwrap();
        let ka = a.fetch_peer_keys("repo-a").unwrap();
        let kb = b.fetch_peer_keys("repo-b").unwrap();
        assert_ne!(ka.public_key, kb.public_key);

        let reloaded = load_or_create(dir.path(), "repo-a").unwrap();
        assert!(reloaded.sign(&ka.peer_id, b"x").is_ok());
    }
}
