#![allow(dead_code)]

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use dupsweep::duplicates::{DuplicateFinder, FinderConfig, ScanReport};
use tempfile::TempDir;

/// Create a temp tree from `(relative path, content)` pairs.
pub fn create_tree(files: &[(&str, &[u8])]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (name, content) in files {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }
    dir
}

pub fn scan(dir: &Path, config: FinderConfig) -> ScanReport {
    DuplicateFinder::new(config)
        .find_duplicates(&[dir.to_path_buf()])
        .unwrap()
}

/// File names of every duplicate group, as sets.
pub fn group_names(report: &ScanReport) -> BTreeSet<BTreeSet<String>> {
    report
        .index
        .duplicate_groups()
        .iter()
        .map(|g| g.files.iter().map(|f| f.name.clone()).collect())
        .collect()
}

pub fn names(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

pub fn root_of(dir: &TempDir) -> Vec<PathBuf> {
    vec![dir.path().to_path_buf()]
}
