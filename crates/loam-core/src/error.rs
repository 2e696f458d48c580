use std::fmt;

/// The unified error type for repository operations. Each variant
/// corresponds to one entry of the error taxonomy surfaced to users; every
/// `Display` impl states what happened and, where there's a concrete next
/// step, what to run instead.
#[derive(Debug)]
pub enum LoamError {
    NoRepoHere { path: std::path::PathBuf },
    RepoConflict { existing: std::path::PathBuf, requested: std::path::PathBuf },
    BadName { name: String, reason: String },
    NoSuchRef { refpath: String },
    NoSuchCommit { hash: String },
    NothingToCommit { branch: String },
    PendingConflict { branch: String, state: String },
    PreMergeLocalChanges { paths: Vec<String> },
    MarkersRemaining { paths: Vec<String> },
    UnrelatedHistories { ours: String, theirs: String },
    StoreFailure(loam_store::StoreError),
    SigningFailure(loam_signing::SigningError),
    ConfigError { path: std::path::PathBuf, detail: String },
    Io(std::io::Error),
}

impl fmt::Display for LoamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoamError::NoRepoHere { path } => write!(
                f,
                "no loam repository found at or above {}. To fix: run `loam repo init` here, or cd into an existing repository.",
                path.display()
            ),
            LoamError::RepoConflict { existing, requested } => write!(
                f,
                "a repository already exists at {} (requested {}). To fix: choose a different path, or operate on the existing repository directly.",
                existing.display(),
                requested.display()
            ),
            LoamError::BadName { name, reason } => write!(
                f,
                "'{name}' is not a valid branch name: {reason}. To fix: use only letters, digits, and underscores, and avoid the reserved names head/stage/workspace."
            ),
            LoamError::NoSuchRef { refpath } => write!(
                f,
                "no such ref: {refpath}. To fix: check `loam branch ls` for valid branch names, or verify the hash exists with `loam branch show`."
            ),
            LoamError::NoSuchCommit { hash } => write!(
                f,
                "no such commit: {hash}. To fix: verify the hash was typed correctly and is reachable from a known branch."
            ),
            LoamError::NothingToCommit { branch } => write!(
                f,
                "nothing to commit on branch '{branch}': stage matches head. To fix: `loam stage add` some changes first."
            ),
            LoamError::PendingConflict { branch, state } => write!(
                f,
                "branch '{branch}' has a pending {state}. To fix: resolve conflict markers and pass --resolve/--resume, or pass --abort to back out."
            ),
            LoamError::PreMergeLocalChanges { paths } => write!(
                f,
                "uncommitted local changes touch paths also changed on the incoming side: {}. To fix: commit or revert these paths before merging.",
                paths.join(", ")
            ),
            LoamError::MarkersRemaining { paths } => write!(
                f,
                "conflict markers remain in: {}. To fix: edit these files to remove all >>>>>>>/=======/<<<<<<< markers, then retry --resolve.",
                paths.join(", ")
            ),
            LoamError::UnrelatedHistories { ours, theirs } => write!(
                f,
                "branches '{ours}' and '{theirs}' share no common ancestor. To fix: this merge/replay is not possible without a shared history."
            ),
            LoamError::StoreFailure(e) => write!(f, "store operation failed: {e}. The repository has been restored to its pre-operation state."),
            LoamError::SigningFailure(e) => write!(f, "signing operation failed: {e}."),
            LoamError::ConfigError { path, detail } => write!(f, "invalid config at {}: {detail}", path.display()),
            LoamError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for LoamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoamError::StoreFailure(e) => Some(e),
            LoamError::SigningFailure(e) => Some(e),
            LoamError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<loam_store::StoreError> for LoamError {
    fn from(e: loam_store::StoreError) -> Self {
        LoamError::StoreFailure(e)
    }
}

impl From<loam_signing::SigningError> for LoamError {
    fn from(e: loam_signing::SigningError) -> Self {
        LoamError::SigningFailure(e)
    }
}

impl From<std::io::Error> for LoamError {
    fn from(e: std::io::Error) -> Self {
        LoamError::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, LoamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_repo_here_mentions_init() {
        let e = LoamError::NoRepoHere { path: "/tmp/x".into() };
        assert!(e.to_string().contains("loam repo init"));
    }

    #[test]
    fn bad_name_mentions_reserved_words() {
        let e = LoamError::BadName { name: "head".into(), reason: "reserved".into() };
        assert!(e.to_string().contains("reserved"));
    }

    #[test]
    fn pending_conflict_mentions_resolve_and_abort() {
        let e = LoamError::PendingConflict { branch: "b".into(), state: "merge".into() };
        let s = e.to_string();
        assert!(s.contains("--resolve") || s.contains("--resume"));
        assert!(s.contains("--abort"));
    }

    #[test]
    fn store_failure_sources_the_inner_error() {
        let inner = loam_store::StoreError::NotFound("x".into());
        let e: LoamError = inner.into();
        assert!(std::error::Error::source(&e).is_some());
    }
}
