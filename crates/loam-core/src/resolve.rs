use loam_store::{ObjectId, Store, StorePath};

use crate::error::{LoamError, Result};
use crate::layout::{CommitPaths, RepoPaths};
use crate::model::{BranchName, RefKind};

/// The three things a ref-path string resolves to: which branch it names
/// (if any — content-address refs name none), the store path of the
/// resolved commit node's root, and the path relative to that commit's
/// tracked-file tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub branch: Option<BranchName>,
    pub commit_root: StorePath,
    pub workspace_relative: String,
}

impl ResolvedPath {
    pub fn files_path(&self) -> StorePath {
        let base = CommitPaths::files(&self.commit_root);
        if self.workspace_relative.is_empty() {
            base
        } else {
            StorePath::named(
                base.segments()
                    .iter()
                    .cloned()
                    .chain(self.workspace_relative.split('/').map(str::to_string)),
            )
        }
    }
}

/// Context a ref-path is resolved against: which repo, and which branch
/// `@head`/`@stage`/`@workspace` refer to absent an explicit branch.
pub struct ResolveContext<'a> {
    pub repo: &'a RepoPaths,
    pub active_branch: &'a str,
}

enum Hop {
    Parent,
    MergeParent,
}

/// Parse and resolve a ref-path expression per the grammar:
/// `@head`/`@stage`/`@workspace` (current branch), `@<branch>/...`,
/// `@<hash>/...`, or a bare path (implicitly `workspace`). `~` chains to
/// `data/parent`, `^` to `data/merge_parent`, applied after the leading ref
/// expansion and before the `data/bundle/files/` prefix.
pub fn resolve(expr: &str, ctx: &ResolveContext<'_>, store: &impl Store) -> Result<ResolvedPath> {
    if let Some(rest) = expr.strip_prefix('@') {
        resolve_ref_form(rest, ctx, store)
    } else {
        let root = ctx.repo.ref_root(ctx.active_branch, RefKind::Workspace.segment());
        Ok(ResolvedPath {
            branch: Some(BranchName::new(ctx.active_branch)?),
            commit_root: root,
            workspace_relative: expr.trim_matches('/').to_string(),
        })
    }
}

fn resolve_ref_form(rest: &str, ctx: &ResolveContext<'_>, store: &impl Store) -> Result<ResolvedPath> {
    let token_end = rest
        .find(|c: char| c == '~' || c == '^' || c == '/')
        .unwrap_or(rest.len());
    let token = &rest[..token_end];
    let mut cursor = token_end;

    let mut hops = Vec::new();
    let bytes = rest.as_bytes();
    while cursor < bytes.len() {
        match bytes[cursor] as char {
            '~' => {
                hops.push(Hop::Parent);
                cursor += 1;
            }
            '^' => {
                hops.push(Hop::MergeParent);
                cursor += 1;
            }
            _ => break,
        }
    }
    let workspace_relative = if cursor < rest.len() {
        rest[cursor..].trim_start_matches('/').to_string()
    } else {
        String::new()
    };

    let (branch, mut commit_root) = if token == "head" || token == "stage" || token == "workspace" {
        (
            Some(BranchName::new(ctx.active_branch)?),
            ctx.repo.ref_root(ctx.active_branch, token),
        )
    } else if token.len() == 64 && token.bytes().all(|b| b.is_ascii_hexdigit()) {
        let id: ObjectId = token
            .parse()
            .map_err(|_| LoamError::NoSuchRef { refpath: format!("@{rest}") })?;
        (None, StorePath::by_hash(id, Vec::<String>::new()))
    } else {
        let branch = BranchName::new(token)?;
        let root = ctx.repo.ref_root(branch.as_str(), RefKind::Head.segment());
        (Some(branch), root)
    };

    for hop in hops {
        let hop_path = match hop {
            Hop::Parent => CommitPaths::parent(&commit_root),
            Hop::MergeParent => CommitPaths::merge_parent(&commit_root),
        };
        let id = store
            .stat(&hop_path)
            .map_err(|_| LoamError::NoSuchRef { refpath: format!("@{rest}") })?;
        commit_root = StorePath::by_hash(id, Vec::<String>::new());
    }

    Ok(ResolvedPath { branch, commit_root, workspace_relative })
}
