//! Signing capability: the external collaborator the commit builder calls
//! into for authorship and signature material. Core code is written only
//! against [`SigningCapability`]; [`local::LocalSigner`] is a
//! self-contained Ed25519 implementation used for tests and for
//! single-machine operation without a separate identity daemon.

pub mod error;
pub mod local;
pub mod types;

pub use error::{Result, SigningError};
pub use types::{PeerId, PeerKeys, PublicKey, Signature};

/// Methods the commit builder needs: producing a signature, checking one,
/// and resolving a key name to identity material.
///
/// # Invariants
/// - `verify(pk, bytes, sign(peer_id, bytes))` is `true` whenever `peer_id`'s
///   public key equals `pk`.
/// - `fetch_peer_keys` is idempotent: the same `key_name` always yields the
///   same `peer_id`/`public_key` pair for the lifetime of the key store.
pub trait SigningCapability {
    type Error: std::error::Error + Send + Sync + 'static;

    fn sign(&self, peer_id: &PeerId, bytes: &[u8]) -> std::result::Result<Signature, Self::Error>;
    fn verify(
        &self,
        public_key: &PublicKey,
        bytes: &[u8],
        signature: &Signature,
    ) -> std::result::Result<bool, Self::Error>;
    fn fetch_peer_keys(&mut self, key_name: &str) -> std::result::Result<PeerKeys, Self::Error>;
}
