use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LoamError;

const RESERVED: [&str; 3] = ["head", "stage", "workspace"];

/// A validated branch name: `[A-Za-z0-9_]+`, disjoint from the reserved ref
/// names `head`/`stage`/`workspace`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(test, derive(Default))]
pub struct BranchName(String);

impl BranchName {
    pub fn new(s: impl Into<String>) -> Result<Self, LoamError> {
        let s = s.into();
        Self::validate(&s)?;
        Ok(Self(s))
    }

    fn validate(s: &str) -> Result<(), LoamError> {
        if s.is_empty() {
            return Err(LoamError::BadName { name: s.to_string(), reason: "must not be empty".into() });
        }
        if !s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(LoamError::BadName {
                name: s.to_string(),
                reason: "must match [A-Za-z0-9_]+".into(),
            });
        }
        if RESERVED.contains(&s) {
            return Err(LoamError::BadName { name: s.to_string(), reason: "reserved ref name".into() });
        }
        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BranchName {
    type Err = LoamError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for BranchName {
    type Error = LoamError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<BranchName> for String {
    fn from(b: BranchName) -> Self {
        b.0
    }
}

/// Which of the three per-branch refs an operation addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    Head,
    Stage,
    Workspace,
}

impl RefKind {
    pub fn segment(self) -> &'static str {
        match self {
            RefKind::Head => "head",
            RefKind::Stage => "stage",
            RefKind::Workspace => "workspace",
        }
    }
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segment())
    }
}

/// `commit_metadata.author`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub peer_id: String,
    pub public_key: String,
}

/// `commit_metadata` — written under `data/commit_metadata` of a commit node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitMetadata {
    pub message: String,
    pub author: Option<Author>,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_merge: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_replay: bool,
}

/// One entry of `files_metadata`: `{"timestamp": int_nanoseconds}`, with an
/// optional symlink marker per the scanner's "record as a symlink fact"
/// requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    pub timestamp: i128,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub symlink: bool,
}

/// `files_metadata` — `path -> { timestamp_ns, ... }` for one bundle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilesMetadata(pub BTreeMap<String, FileMeta>);

impl FilesMetadata {
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(&self.0)
    }

    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        if bytes.is_empty() {
            return Ok(Self::default());
        }
        Ok(Self(serde_json::from_slice(bytes)?))
    }
}

/// How chatty the Public API should be — carried from the `ipvc` original's
/// `quiet`/`quieter`/`verbose` flags so library consumers can suppress or
/// request progress output without going through stdout directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputLevel {
    Quieter,
    Quiet,
    #[default]
    Normal,
    Verbose,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_name_rejects_reserved_words() {
        assert!(BranchName::new("head").is_err());
        assert!(BranchName::new("stage").is_err());
        assert!(BranchName::new("workspace").is_err());
    }

    #[test]
    fn branch_name_rejects_non_alphanumeric() {
        assert!(BranchName::new("foo-bar").is_err());
        assert!(BranchName::new("foo/bar").is_err());
    }

    #[test]
    fn branch_name_accepts_valid_names() {
        assert!(BranchName::new("master").is_ok());
        assert!(BranchName::new("feature_123").is_ok());
    }

    #[test]
    fn files_metadata_empty_bytes_is_empty_map() {
        let m = FilesMetadata::from_json(b"").unwrap();
        assert!(m.0.is_empty());
    }

    #[test]
    fn files_metadata_roundtrips() {
        let mut m = FilesMetadata::default();
        m.0.insert("a.txt".to_string(), FileMeta { timestamp: 123, symlink: false });
        let json = m.to_json().unwrap();
        let back = FilesMetadata::from_json(&json).unwrap();
        assert_eq!(m, back);
    }
}
