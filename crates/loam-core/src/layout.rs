use loam_store::StorePath;

/// Store-path layout for one repository's namespace, under `repos/<hex>`.
/// Centralizing this here means every other module constructs store paths
/// the same way instead of hand-assembling segment vectors.
#[derive(Debug, Clone)]
pub struct RepoPaths {
    repo_hex: String,
}

impl RepoPaths {
    pub fn new(repo_hex: impl Into<String>) -> Self {
        Self { repo_hex: repo_hex.into() }
    }

    fn base(&self) -> StorePath {
        StorePath::named(["repos", &self.repo_hex])
    }

    /// The whole repository's subtree root, as copied wholesale by the
    /// Atomic Harness's snapshot/restore.
    pub fn repo_root(&self) -> StorePath {
        self.base()
    }

    pub fn active_branch_name(&self) -> StorePath {
        self.base().join("active_branch_name")
    }

    pub fn identity(&self) -> StorePath {
        self.base().join("identity")
    }

    pub fn display_name(&self) -> StorePath {
        self.base().join("display_name")
    }

    pub fn branches_dir(&self) -> StorePath {
        self.base().join("branches")
    }

    pub fn branch_dir(&self, branch: &str) -> StorePath {
        self.branches_dir().join(branch)
    }

    /// Root of one of a branch's refs: `head`, `stage`, `workspace`, or one
    /// of the conflict-state siblings (`merge_head`, `replay_stage`, …).
    pub fn ref_root(&self, branch: &str, ref_name: &str) -> StorePath {
        self.branch_dir(branch).join(ref_name)
    }

    pub fn remote(&self, branch: &str) -> StorePath {
        self.branch_dir(branch).join("remote")
    }

    /// Lives outside `repos/<hex>` deliberately: the Atomic Harness's
    /// restore path removes and replaces the whole repo subtree, so a
    /// snapshot nested inside it would be destroyed before it could be
    /// copied back.
    pub fn snapshots_dir(&self) -> StorePath {
        StorePath::named(["snapshots", &self.repo_hex])
    }

    pub fn snapshot(&self, timestamp_ns: i128) -> StorePath {
        self.snapshots_dir().join(timestamp_ns.to_string())
    }
}

/// Path layout within a single commit-shaped node (a ref root).
pub struct CommitPaths;

impl CommitPaths {
    pub fn data(root: &StorePath) -> StorePath {
        root.clone().join("data")
    }

    pub fn bundle(root: &StorePath) -> StorePath {
        Self::data(root).join("bundle")
    }

    pub fn files(root: &StorePath) -> StorePath {
        Self::bundle(root).join("files")
    }

    pub fn files_metadata(root: &StorePath) -> StorePath {
        Self::bundle(root).join("files_metadata")
    }

    pub fn commit_metadata(root: &StorePath) -> StorePath {
        Self::data(root).join("commit_metadata")
    }

    pub fn parent(root: &StorePath) -> StorePath {
        Self::data(root).join("parent")
    }

    pub fn merge_parent(root: &StorePath) -> StorePath {
        Self::data(root).join("merge_parent")
    }

    pub fn bundle_signature(root: &StorePath) -> StorePath {
        root.clone().join("bundle_signature")
    }

    pub fn data_signature(root: &StorePath) -> StorePath {
        root.clone().join("data_signature")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ref_root_nests_under_branch() {
        let p = RepoPaths::new("abc123");
        let r = p.ref_root("master", "head");
        assert_eq!(
            r.segments(),
            ["repos", "abc123", "branches", "master", "head"]
        );
    }

    #[test]
    fn commit_paths_files_nests_under_bundle() {
        let root = StorePath::named(["x"]);
        assert_eq!(
            CommitPaths::files(&root).segments(),
            ["x", "data", "bundle", "files"]
        );
    }
}
