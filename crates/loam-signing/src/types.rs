use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SigningError;

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn from_hex(s: &str) -> Result<Vec<u8>, SigningError> {
    if s.len() % 2 != 0 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(SigningError::BadSignature);
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|_| SigningError::BadSignature))
        .collect()
}

/// Stable name of a local or remote identity. Corresponds to the `peer_id`
/// field of `commit_metadata.author`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hex-encoded Ed25519 public key, serialized as `public_key` in commit
/// metadata (the field is named `pub_key_pem` in the capability interface
/// for historical reasons; the encoding used here is plain hex, not PEM —
/// see `DESIGN.md` Open Question 2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey(String);

impl PublicKey {
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self(to_hex(bytes))
    }

    pub fn to_bytes(&self) -> Result<[u8; 32], SigningError> {
        let v = from_hex(&self.0)?;
        v.try_into().map_err(|_| SigningError::BadPublicKey)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PublicKey {
    type Err = SigningError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        from_hex(s)?;
        Ok(Self(s.to_string()))
    }
}

/// A detached signature over an arbitrary byte string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(String);

impl Signature {
    pub fn from_bytes(bytes: &[u8; 64]) -> Self {
        Self(to_hex(bytes))
    }

    pub fn to_bytes(&self) -> Result<[u8; 64], SigningError> {
        let v = from_hex(&self.0)?;
        v.try_into().map_err(|_| SigningError::BadSignature)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What `fetch_peer_keys` returns: identity material for one key name. The
/// private-key handle is opaque to callers outside this crate — it exists
/// so `sign` can be invoked without re-deriving the key from disk each time.
#[derive(Debug, Clone)]
pub struct PeerKeys {
    pub peer_id: PeerId,
    pub public_key: PublicKey,
    pub(crate) key_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_key_roundtrips_bytes() {
        let bytes = [7u8; 32];
        let pk = PublicKey::from_bytes(&bytes);
        assert_eq!(pk.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn signature_display_is_hex() {
        let sig = Signature::from_bytes(&[0xab; 64]);
        assert_eq!(sig.to_string().len(), 128);
    }

    #[test]
    fn public_key_from_str_rejects_odd_length() {
        assert!("abc".parse::<PublicKey>().is_err());
    }
}
