use std::collections::HashMap;

use ed25519_dalek::{Signer as _, SigningKey, Verifier as _, VerifyingKey};
use rand_core::OsRng;

use crate::error::SigningError;
use crate::types::{PeerId, PeerKeys, PublicKey, Signature};
use crate::SigningCapability;

struct KeyEntry {
    peer_id: PeerId,
    signing_key: SigningKey,
}

/// A self-contained Ed25519 key store, generating and holding keys entirely
/// in process memory. Suitable for tests and for operation without a
/// separate identity-management daemon; `peer_id` is derived from the key
/// name itself rather than a DHT-discovered value, since no network
/// identity surface is in scope here.
#[derive(Default)]
pub struct LocalSigner {
    keys: HashMap<String, KeyEntry>,
}

impl LocalSigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate and register a new key under `key_name`. Returns the same
    /// value `fetch_peer_keys` would.
    pub fn create_key(&mut self, key_name: &str) -> Result<PeerKeys, SigningError> {
        if self.keys.contains_key(key_name) {
            return Err(SigningError::KeyExists(key_name.to_string()));
        }
        let signing_key = SigningKey::generate(&mut OsRng);
        let peer_id = PeerId::new(key_name);
        let public_key = PublicKey::from_bytes(signing_key.verifying_key().as_bytes());
        self.keys.insert(
            key_name.to_string(),
            KeyEntry {
                peer_id: peer_id.clone(),
                signing_key,
            },
        );
        Ok(PeerKeys {
            peer_id,
            public_key,
            key_name: key_name.to_string(),
        })
    }

    fn entry_for_peer(&self, peer_id: &PeerId) -> Result<&KeyEntry, SigningError> {
        self.keys
            .values()
            .find(|e| &e.peer_id == peer_id)
            .ok_or_else(|| SigningError::NoSuchKey(peer_id.to_string()))
    }

    /// Register a previously-generated key under `key_name`, for callers
    /// that persist key material across process restarts (this store keeps
    /// everything in memory only). Mirrors `create_key` but takes the
    /// secret bytes instead of generating fresh ones.
    pub fn import_key(&mut self, key_name: &str, secret_bytes: &[u8; 32]) -> Result<PeerKeys, SigningError> {
        if self.keys.contains_key(key_name) {
            return Err(SigningError::KeyExists(key_name.to_string()));
        }
        let signing_key = SigningKey::from_bytes(secret_bytes);
        let peer_id = PeerId::new(key_name);
        let public_key = PublicKey::from_bytes(signing_key.verifying_key().as_bytes());
        self.keys.insert(
            key_name.to_string(),
            KeyEntry {
                peer_id: peer_id.clone(),
                signing_key,
            },
        );
        Ok(PeerKeys { peer_id, public_key, key_name: key_name.to_string() })
    }

    /// Export `key_name`'s secret bytes, for a caller to persist to disk.
    pub fn export_secret(&self, key_name: &str) -> Result<[u8; 32], SigningError> {
        self.keys
            .get(key_name)
            .map(|e| e.signing_key.to_bytes())
            .ok_or_else(|| SigningError::NoSuchKey(key_name.to_string()))
    }
}

impl SigningCapability for LocalSigner {
    type Error = SigningError;

    fn sign(&self, peer_id: &PeerId, bytes: &[u8]) -> Result<Signature, SigningError> {
        let entry = self.entry_for_peer(peer_id)?;
        let sig = entry.signing_key.sign(bytes);
        Ok(Signature::from_bytes(&sig.to_bytes()))
    }

    fn verify(
        &self,
        public_key: &PublicKey,
        bytes: &[u8],
        signature: &Signature,
    ) -> Result<bool, SigningError> {
        let verifying_key = VerifyingKey::from_bytes(&public_key.to_bytes()?)
            .map_err(|_| SigningError::BadPublicKey)?;
        let sig = ed25519_dalek::Signature::from_bytes(&signature.to_bytes()?);
        Ok(verifying_key.verify(bytes, &sig).is_ok())
    }

    fn fetch_peer_keys(&mut self, key_name: &str) -> Result<PeerKeys, SigningError> {
        if let Some(entry) = self.keys.get(key_name) {
            return Ok(PeerKeys {
                peer_id: entry.peer_id.clone(),
                public_key: PublicKey::from_bytes(entry.signing_key.verifying_key().as_bytes()),
                key_name: key_name.to_string(),
            });
        }
        self.create_key(key_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_round_trips() {
        let mut signer = LocalSigner::new();
        let keys = signer.fetch_peer_keys("alice").unwrap();
        let sig = signer.sign(&keys.peer_id, b"hello").unwrap();
        assert!(signer.verify(&keys.public_key, b"hello", &sig).unwrap());
    }

    #[test]
    fn verify_rejects_tampered_bytes() {
        let mut signer = LocalSigner::new();
        let keys = signer.fetch_peer_keys("alice").unwrap();
        let sig = signer.sign(&keys.peer_id, b"hello").unwrap();
        assert!(!signer.verify(&keys.public_key, b"goodbye", &sig).unwrap());
    }

    #[test]
    fn fetch_peer_keys_is_idempotent() {
        let mut signer = LocalSigner::new();
        let a = signer.fetch_peer_keys("alice").unwrap();
        let b = signer.fetch_peer_keys("alice").unwrap();
        assert_eq!(a.public_key, b.public_key);
    }

    #[test]
    fn sign_for_unknown_peer_fails() {
        let signer = LocalSigner::new();
        assert!(signer.sign(&PeerId::new("ghost"), b"x").is_err());
    }

    #[test]
    fn export_then_import_preserves_signing_identity() {
        let mut signer = LocalSigner::new();
        let keys = signer.create_key("alice").unwrap();
        let secret = signer.export_secret("alice").unwrap();

        let mut restored = LocalSigner::new();
        let restored_keys = restored.import_key("alice", &secret).unwrap();
        assert_eq!(restored_keys.public_key, keys.public_key);

        let sig = signer.sign(&keys.peer_id, b"hello").unwrap();
        assert!(restored.verify(&restored_keys.public_key, b"hello", &sig).unwrap());
    }

    #[test]
    fn import_key_rejects_duplicate_name() {
        let mut signer = LocalSigner::new();
        signer.create_key("alice").unwrap();
        assert!(signer.import_key("alice", &[0u8; 32]).is_err());
    }
}
