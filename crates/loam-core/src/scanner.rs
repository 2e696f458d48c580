use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::model::{FileMeta, FilesMetadata};

/// Disjoint sets produced by comparing a filesystem subtree against a
/// stored metadata map, per the `added`/`removed`/`modified`/`persistent`
/// classification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    pub added: BTreeSet<String>,
    pub removed: BTreeSet<String>,
    pub modified: BTreeSet<String>,
    pub persistent: BTreeSet<String>,
}

impl ScanResult {
    /// Paths that need (re)hashing into the store: added or modified.
    pub fn changed(&self) -> impl Iterator<Item = &String> {
        self.added.iter().chain(self.modified.iter())
    }
}

fn mtime_ns(metadata: &std::fs::Metadata) -> i128 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_nanos() as i128)
        .unwrap_or(0)
}

/// Walk `fs_root` recursively (directories are not tracked themselves;
/// symlinks are followed for content but flagged in the returned disk map).
/// Skips nothing else — `.loam` exclusion is the caller's responsibility,
/// since the scanner only knows about the subtree it's told to scan.
fn walk(fs_root: &Path, rel: &Path, out: &mut Vec<(String, i128, bool)>) -> Result<()> {
    let dir = fs_root.join(rel);
    let entries = match std::fs::read_dir(&dir) {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    for entry in entries {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let rel_path = rel.join(entry.file_name());
        if file_type.is_dir() {
            walk(fs_root, &rel_path, out)?;
        } else {
            let is_symlink = file_type.is_symlink();
            let meta = std::fs::metadata(entry.path())?;
            let rel_str = rel_path.to_string_lossy().replace('\\', "/");
            out.push((rel_str, mtime_ns(&meta), is_symlink));
        }
    }
    Ok(())
}

/// Compare the on-disk tree under `fs_root` against `metadata`, producing
/// the added/removed/modified/persistent classification. Does not mutate
/// `metadata`; call [`update_metadata`] afterward to record new timestamps.
pub fn scan(fs_root: &Path, metadata: &FilesMetadata) -> Result<ScanResult> {
    let mut disk = Vec::new();
    walk(fs_root, &PathBuf::new(), &mut disk)?;

    let mut result = ScanResult::default();
    let mut seen = BTreeSet::new();
    for (path, mtime, _symlink) in &disk {
        seen.insert(path.clone());
        match metadata.0.get(path) {
            None => {
                result.added.insert(path.clone());
            }
            Some(meta) if meta.timestamp == *mtime => {
                result.persistent.insert(path.clone());
            }
            Some(_) => {
                result.modified.insert(path.clone());
            }
        }
    }
    for path in metadata.0.keys() {
        if !seen.contains(path) {
            result.removed.insert(path.clone());
        }
    }
    Ok(result)
}

/// Update `metadata` in place with fresh on-disk timestamps for every
/// `added` or `modified` path from a prior [`scan`] of the same subtree,
/// and drop every `removed` path.
pub fn update_metadata(fs_root: &Path, metadata: &mut FilesMetadata, result: &ScanResult) -> Result<()> {
    for path in result.changed() {
        let meta = std::fs::metadata(fs_root.join(path))?;
        let is_symlink = std::fs::symlink_metadata(fs_root.join(path))
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false);
        metadata
            .0
            .insert(path.clone(), FileMeta { timestamp: mtime_ns(&meta), symlink: is_symlink });
    }
    for path in &result.removed {
        metadata.0.remove(path);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_file_on_disk_is_added() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hi").unwrap();
        let result = scan(dir.path(), &FilesMetadata::default()).unwrap();
        assert!(result.added.contains("a.txt"));
    }

    #[test]
    fn missing_metadata_entry_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let mut metadata = FilesMetadata::default();
        metadata.0.insert("gone.txt".to_string(), FileMeta { timestamp: 1, symlink: false });
        let result = scan(dir.path(), &metadata).unwrap();
        assert!(result.removed.contains("gone.txt"));
    }

    #[test]
    fn matching_mtime_is_persistent_and_stale_mtime_is_modified() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hi").unwrap();
        let meta = std::fs::metadata(dir.path().join("a.txt")).unwrap();
        let ts = meta
            .modified()
            .unwrap()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos() as i128;

        let mut metadata = FilesMetadata::default();
        metadata.0.insert("a.txt".to_string(), FileMeta { timestamp: ts, symlink: false });
        let result = scan(dir.path(), &metadata).unwrap();
        assert!(result.persistent.contains("a.txt"));

        metadata.0.insert("a.txt".to_string(), FileMeta { timestamp: ts - 1, symlink: false });
        let result = scan(dir.path(), &metadata).unwrap();
        assert!(result.modified.contains("a.txt"));
    }

    #[test]
    fn nested_directories_are_walked_but_not_tracked_themselves() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src/nested")).unwrap();
        std::fs::write(dir.path().join("src/nested/b.rs"), b"fn x(){}").unwrap();
        let result = scan(dir.path(), &FilesMetadata::default()).unwrap();
        assert!(result.added.contains("src/nested/b.rs"));
        assert!(!result.added.iter().any(|p| p == "src" || p == "src/nested"));
    }

    #[test]
    fn update_metadata_records_added_and_drops_removed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hi").unwrap();
        let mut metadata = FilesMetadata::default();
        metadata.0.insert("gone.txt".to_string(), FileMeta { timestamp: 1, symlink: false });
        let result = scan(dir.path(), &metadata).unwrap();
        update_metadata(dir.path(), &mut metadata, &result).unwrap();
        assert!(metadata.0.contains_key("a.txt"));
        assert!(!metadata.0.contains_key("gone.txt"));
    }
}
