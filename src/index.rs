//! Index over the PCB directory tree.
//!
//! The index is an immutable snapshot: a membership set for authorization, the
//! walk-ordered listing, and the listing serialized to JSON once per rebuild.
//! `rebuild` scans the tree off to the side and publishes the new snapshot with
//! a single swap, so concurrent readers always see a consistent pair.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("failed to walk PCB directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("failed to read file metadata: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize PCB listing: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One indexed file. Field names match the listing wire format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PcbEntry {
    #[serde(rename = "Path")]
    pub path: String,
    #[serde(rename = "ModTime")]
    pub modified: DateTime<Utc>,
}

/// An immutable view of the PCB tree at one point in time.
#[derive(Debug)]
pub struct IndexSnapshot {
    /// Relative paths of every indexed file, for O(1) membership checks
    pub members: HashSet<String>,
    /// Listing in directory-walk order
    pub entries: Vec<PcbEntry>,
    /// `entries` serialized as JSON, reused across requests
    pub json: Bytes,
}

impl IndexSnapshot {
    /// Walk `root` and build a snapshot of every regular file ending in
    /// `suffix`. Any walk or metadata error aborts the whole scan; a snapshot
    /// is never built from a partial walk.
    pub fn scan(root: &Path, suffix: &str) -> Result<Self, IndexError> {
        let mut members = HashSet::new();
        let mut entries: Vec<PcbEntry> = Vec::new();

        for entry in WalkDir::new(root) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry
                .path()
                .strip_prefix(root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .to_string();
            if !path.ends_with(suffix) {
                continue;
            }
            let modified: DateTime<Utc> = entry.metadata()?.modified()?.into();
            // last-seen wins if the walk ever yields a duplicate path
            if !members.insert(path.clone()) {
                entries.retain(|existing| existing.path != path);
            }
            entries.push(PcbEntry { path, modified });
        }

        let json = Bytes::from(serde_json::to_vec(&entries)?);
        Ok(Self {
            members,
            entries,
            json,
        })
    }

    pub fn contains(&self, path: &str) -> bool {
        self.members.contains(path)
    }
}

/// Shared, refreshable index over one PCB directory.
pub struct PcbIndex {
    root: PathBuf,
    suffix: String,
    current: ArcSwap<IndexSnapshot>,
}

impl PcbIndex {
    /// Scan `root` and build the initial snapshot. Fatal on any walk error.
    pub fn build(root: PathBuf, suffix: &str) -> Result<Self, IndexError> {
        let snapshot = IndexSnapshot::scan(&root, suffix)?;
        info!("indexed {} PCB files under {}", snapshot.entries.len(), root.display());
        Ok(Self {
            root,
            suffix: suffix.to_string(),
            current: ArcSwap::from_pointee(snapshot),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The current snapshot. Loads are lock-free; the returned Arc stays
    /// valid across a concurrent rebuild.
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        self.current.load_full()
    }

    /// Rescan the tree and replace the snapshot in one swap.
    ///
    /// On a walk error the previous snapshot is retained untouched and the
    /// error is returned to the caller.
    pub fn rebuild(&self) -> Result<Arc<IndexSnapshot>, IndexError> {
        info!("refreshing PCB index");
        let snapshot = Arc::new(IndexSnapshot::scan(&self.root, &self.suffix)?);
        info!("indexed {} PCB files", snapshot.entries.len());
        self.current.store(snapshot.clone());
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"(kicad_pcb)").unwrap();
    }

    #[test]
    fn scan_finds_only_matching_files() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a/board.kicad_pcb");
        touch(dir.path(), "a/notes.txt");
        touch(dir.path(), "b/board2.kicad_pcb");

        let snapshot = IndexSnapshot::scan(dir.path(), ".kicad_pcb").unwrap();

        assert_eq!(snapshot.entries.len(), 2);
        assert!(snapshot.contains("a/board.kicad_pcb"));
        assert!(snapshot.contains("b/board2.kicad_pcb"));
        assert!(!snapshot.contains("a/notes.txt"));
    }

    #[test]
    fn scan_skips_directories_with_matching_names() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("weird.kicad_pcb")).unwrap();
        touch(dir.path(), "weird.kicad_pcb/inner.kicad_pcb");

        let snapshot = IndexSnapshot::scan(dir.path(), ".kicad_pcb").unwrap();

        assert!(!snapshot.contains("weird.kicad_pcb"));
        assert!(snapshot.contains("weird.kicad_pcb/inner.kicad_pcb"));
    }

    #[test]
    fn listing_and_membership_agree() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "x.kicad_pcb");
        touch(dir.path(), "sub/y.kicad_pcb");

        let snapshot = IndexSnapshot::scan(dir.path(), ".kicad_pcb").unwrap();

        assert_eq!(snapshot.entries.len(), snapshot.members.len());
        for entry in &snapshot.entries {
            assert!(snapshot.members.contains(&entry.path));
        }
    }

    #[test]
    fn listing_records_modification_time() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "x.kicad_pcb");

        let snapshot = IndexSnapshot::scan(dir.path(), ".kicad_pcb").unwrap();

        let on_disk: DateTime<Utc> = fs::metadata(dir.path().join("x.kicad_pcb"))
            .unwrap()
            .modified()
            .unwrap()
            .into();
        assert_eq!(snapshot.entries[0].modified, on_disk);
    }

    #[test]
    fn serialized_listing_round_trips() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a/board.kicad_pcb");
        touch(dir.path(), "b/board2.kicad_pcb");

        let snapshot = IndexSnapshot::scan(dir.path(), ".kicad_pcb").unwrap();

        let parsed: Vec<PcbEntry> = serde_json::from_slice(&snapshot.json).unwrap();
        assert_eq!(parsed, snapshot.entries);
    }

    #[test]
    fn rebuild_is_idempotent_on_an_unchanged_tree() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a/board.kicad_pcb");
        touch(dir.path(), "b/board2.kicad_pcb");

        let index = PcbIndex::build(dir.path().to_path_buf(), ".kicad_pcb").unwrap();
        let first = index.snapshot();
        let second = index.rebuild().unwrap();

        assert_eq!(first.members, second.members);
        let mut a: Vec<&str> = first.entries.iter().map(|e| e.path.as_str()).collect();
        let mut b: Vec<&str> = second.entries.iter().map(|e| e.path.as_str()).collect();
        a.sort_unstable();
        b.sort_unstable();
        assert_eq!(a, b);
    }

    #[test]
    fn rebuild_picks_up_new_files() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a/board.kicad_pcb");

        let index = PcbIndex::build(dir.path().to_path_buf(), ".kicad_pcb").unwrap();
        assert!(!index.snapshot().contains("b/late.kicad_pcb"));

        touch(dir.path(), "b/late.kicad_pcb");
        let snapshot = index.rebuild().unwrap();

        assert!(snapshot.contains("b/late.kicad_pcb"));
        assert_eq!(snapshot.entries.len(), 2);
    }

    #[test]
    fn old_snapshot_survives_a_rebuild() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a/board.kicad_pcb");

        let index = PcbIndex::build(dir.path().to_path_buf(), ".kicad_pcb").unwrap();
        let held = index.snapshot();

        touch(dir.path(), "b/late.kicad_pcb");
        index.rebuild().unwrap();

        // a reader holding the old Arc still sees the old, self-consistent view
        assert_eq!(held.entries.len(), 1);
        assert!(!held.contains("b/late.kicad_pcb"));
        assert_eq!(index.snapshot().entries.len(), 2);
    }

    #[test]
    fn failed_rebuild_retains_the_previous_snapshot() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a/board.kicad_pcb");

        let index = PcbIndex::build(dir.path().to_path_buf(), ".kicad_pcb").unwrap();
        fs::remove_dir_all(dir.path()).unwrap();

        assert!(index.rebuild().is_err());
        assert!(index.snapshot().contains("a/board.kicad_pcb"));
    }
}
