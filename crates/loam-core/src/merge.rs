//! Three-way, content-level Merge Kernel (spec §4.8). Operates on the
//! object-diffs between a lowest common ancestor and each side's head, and
//! on a diff-of-diffs for files both sides touched.

use std::collections::BTreeMap;

use loam_store::{ChangeType, ObjectChange, ObjectId, Store};

use crate::diff::{ndiff, split_lines, DiffLine};
use crate::error::Result;

/// How one changed path resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileResolution {
    /// Only their side changed it; write their content verbatim.
    Pulled(Vec<u8>),
    /// Both sides changed it, reconciled without conflict markers.
    Merged(Vec<u8>),
    /// Both sides changed it; `content` carries `>>>>>>>`/`=======`/`<<<<<<<`
    /// markers the user must resolve.
    Conflict(Vec<u8>),
    /// The path was removed on both sides, or removed on one side and
    /// untouched on the other — nothing to write.
    Removed,
}

/// Per-file three-way merge: compute ours' and theirs' line diffs against
/// the LCA, then reconcile via a diff of those two diffs.
pub fn merge_file(lca: &[u8], ours: &[u8], theirs: &[u8], our_branch: &str, their_branch: &str) -> (Vec<u8>, bool) {
    let lca_text = String::from_utf8_lossy(lca);
    let ours_text = String::from_utf8_lossy(ours);
    let theirs_text = String::from_utf8_lossy(theirs);

    let lca_lines = split_lines(&lca_text);
    let our_lines = split_lines(&ours_text);
    let their_lines = split_lines(&theirs_text);

    let our_diff = ndiff(&lca_lines, &our_lines);
    let their_diff = ndiff(&lca_lines, &their_lines);

    let our_diff_strs: Vec<String> = our_diff.iter().map(DiffLine::to_string).collect();
    let their_diff_strs: Vec<String> = their_diff.iter().map(DiffLine::to_string).collect();
    let our_diff_refs: Vec<&str> = our_diff_strs.iter().map(String::as_str).collect();
    let their_diff_refs: Vec<&str> = their_diff_strs.iter().map(String::as_str).collect();

    let outer = ndiff(&our_diff_refs, &their_diff_refs);

    let mut output: Vec<String> = Vec::new();
    let mut our_lines_buf: Vec<String> = Vec::new();
    let mut their_lines_buf: Vec<String> = Vec::new();
    let mut both_lines_buf: Vec<String> = Vec::new();
    let mut conflicted = false;

    let flush = |output: &mut Vec<String>, our_buf: &mut Vec<String>, their_buf: &mut Vec<String>, both_buf: &mut Vec<String>, conflicted: &mut bool| {
        if !our_buf.is_empty() && !their_buf.is_empty() {
            output.push(format!(">>>>>>> {our_branch} (ours)"));
            output.extend(our_buf.drain(..));
            output.push(format!("======= {their_branch} (theirs)"));
            output.extend(their_buf.drain(..));
            output.push("<<<<<<<".to_string());
            *conflicted = true;
        } else {
            output.extend(their_buf.drain(..));
            output.extend(our_buf.drain(..));
            output.extend(both_buf.drain(..));
        }
        both_buf.clear();
    };

    for entry in outer.iter().filter(|l| !l.is_hint()) {
        let inner = entry.text();
        let inner_prefix = inner.chars().next().unwrap_or(' ');
        let inner_content = if inner.len() >= 2 { &inner[2..] } else { "" };

        match entry {
            DiffLine::Unchanged(_) => match inner_prefix {
                ' ' => {
                    flush(&mut output, &mut our_lines_buf, &mut their_lines_buf, &mut both_lines_buf, &mut conflicted);
                    output.push(inner_content.to_string());
                }
                '+' => both_lines_buf.push(inner_content.to_string()),
                _ => {}
            },
            DiffLine::Removed(_) if matches!(inner_prefix, ' ' | '+') => our_lines_buf.push(inner_content.to_string()),
            DiffLine::Added(_) if matches!(inner_prefix, ' ' | '+') => their_lines_buf.push(inner_content.to_string()),
            DiffLine::Removed(_) | DiffLine::Added(_) => {}
            DiffLine::Hint(_) => {}
        }
    }
    flush(&mut output, &mut our_lines_buf, &mut their_lines_buf, &mut both_lines_buf, &mut conflicted);

    let mut joined = output.join("\n");
    joined.push('\n');
    (joined.into_bytes(), conflicted)
}

/// Classification + resolved content for every path either side touched.
pub struct MergeOutcome {
    pub pulled: Vec<String>,
    pub merged: Vec<String>,
    pub conflicts: Vec<String>,
    pub resolutions: BTreeMap<String, FileResolution>,
}

/// Compute the three-way merge of `their_root` into the branch whose LCA
/// (relative to theirs) content-tree root is `lca_root` and whose current
/// content-tree root is `our_root`. Reads blob content via `store.cat`;
/// does not write anything back — callers splice `resolutions` into the
/// workspace/stage themselves so the Atomic Harness can still roll back a
/// failure mid-merge.
pub fn merge_trees(
    store: &impl Store,
    lca_id: &ObjectId,
    our_id: &ObjectId,
    their_id: &ObjectId,
    our_branch: &str,
    their_branch: &str,
) -> Result<MergeOutcome> {
    let our_changes = store.object_diff(lca_id, our_id)?;
    let their_changes = store.object_diff(lca_id, their_id)?;

    let mut our_by_path: BTreeMap<&str, &ObjectChange> = BTreeMap::new();
    for c in &our_changes {
        our_by_path.insert(&c.path, c);
    }
    let mut their_by_path: BTreeMap<&str, &ObjectChange> = BTreeMap::new();
    for c in &their_changes {
        their_by_path.insert(&c.path, c);
    }

    let mut all_paths: Vec<&str> = our_by_path.keys().chain(their_by_path.keys()).copied().collect();
    all_paths.sort_unstable();
    all_paths.dedup();

    let mut outcome = MergeOutcome {
        pulled: Vec::new(),
        merged: Vec::new(),
        conflicts: Vec::new(),
        resolutions: BTreeMap::new(),
    };

    for path in all_paths {
        let ours = our_by_path.get(path);
        let theirs = their_by_path.get(path);

        match (ours, theirs) {
            (None, Some(their_change)) => {
                let resolution = match their_change.after {
                    Some(ref id) => FileResolution::Pulled(store.cat(id)?),
                    None => FileResolution::Removed,
                };
                if !matches!(resolution, FileResolution::Removed) {
                    outcome.pulled.push(path.to_string());
                }
                outcome.resolutions.insert(path.to_string(), resolution);
            }
            (Some(_), None) => {
                // only ours changed it: already correct, nothing to do.
            }
            (Some(our_change), Some(their_change)) => {
                match (our_change.change_type, their_change.change_type) {
                    (ChangeType::Removed, ChangeType::Removed) => {
                        outcome.resolutions.insert(path.to_string(), FileResolution::Removed);
                    }
                    _ => {
                        let lca_bytes = match &our_change.before {
                            Some(id) => store.cat(id)?,
                            None => Vec::new(),
                        };
                        let our_bytes = match &our_change.after {
                            Some(id) => store.cat(id)?,
                            None => Vec::new(),
                        };
                        let their_bytes = match &their_change.after {
                            Some(id) => store.cat(id)?,
                            None => Vec::new(),
                        };
                        let (content, conflicted) =
                            merge_file(&lca_bytes, &our_bytes, &their_bytes, our_branch, their_branch);
                        if conflicted {
                            outcome.conflicts.push(path.to_string());
                            outcome.resolutions.insert(path.to_string(), FileResolution::Conflict(content));
                        } else {
                            outcome.merged.push(path.to_string());
                            outcome.resolutions.insert(path.to_string(), FileResolution::Merged(content));
                        }
                    }
                }
            }
            (None, None) => unreachable!("path came from one of the two change sets"),
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_theirs_changed_is_pulled_verbatim() {
        let (content, conflicted) = merge_file(b"a\nb\nc\n", b"a\nb\nc\n", b"a\nb\nX\n", "ours", "theirs");
        assert!(!conflicted);
        assert_eq!(content, b"a\nb\nX\n");
    }

    #[test]
    fn non_overlapping_edits_merge_cleanly() {
        let lca = b"a\nb\nc\n";
        let ours = b"A\nb\nc\n";
        let theirs = b"a\nb\nC\n";
        let (content, conflicted) = merge_file(lca, ours, theirs, "ours", "theirs");
        assert!(!conflicted);
        let text = String::from_utf8(content).unwrap();
        assert!(text.contains('A'));
        assert!(text.contains('C'));
    }

    #[test]
    fn overlapping_edits_produce_conflict_markers() {
        let lca = b"a\n";
        let ours = b"OURS\n";
        let theirs = b"THEIRS\n";
        let (content, conflicted) = merge_file(lca, ours, theirs, "mine", "yours");
        assert!(conflicted);
        let text = String::from_utf8(content).unwrap();
        assert!(text.contains(">>>>>>> mine (ours)"));
        assert!(text.contains("======= yours (theirs)"));
        assert!(text.contains("<<<<<<<"));
        assert!(text.contains("OURS"));
        assert!(text.contains("THEIRS"));
    }

    #[test]
    fn identical_edits_on_both_sides_merge_without_conflict() {
        let lca = b"a\n";
        let ours = b"same\n";
        let theirs = b"same\n";
        let (content, conflicted) = merge_file(lca, ours, theirs, "mine", "yours");
        assert!(!conflicted);
        assert_eq!(content, b"same\n");
    }

    #[test]
    fn merge_trees_classifies_pulled_merged_and_conflicts() {
        use loam_store::{MemStore, StorePath};

        let mut store = MemStore::in_memory();
        store.write(&StorePath::named(["pulled.txt"]), b"v1\n", true, true).unwrap();
        store.write(&StorePath::named(["clash.txt"]), b"base\n", true, true).unwrap();
        let lca_id = store.root();

        store.write(&StorePath::named(["clash.txt"]), b"ours\n", true, true).unwrap();
        let our_id = store.root();

        store.set_root(lca_id.clone());
        store.write(&StorePath::named(["pulled.txt"]), b"v2\n", true, true).unwrap();
        store.write(&StorePath::named(["clash.txt"]), b"theirs\n", true, true).unwrap();
        let their_id = store.root();

        let outcome = merge_trees(&store, &lca_id, &our_id, &their_id, "mine", "yours").unwrap();
        assert_eq!(outcome.pulled, vec!["pulled.txt".to_string()]);
        assert_eq!(outcome.conflicts, vec!["clash.txt".to_string()]);
    }
}
