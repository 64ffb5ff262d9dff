#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

/// Two-row table shared across the ingest and report tests; totals are
/// 30 spend, 6 clicks, 300 impressions.
pub const SAMPLE_CSV: &str = "spend,clicks,impressions\n10,2,100\n20,4,200\n";

/// A week of realistic campaign data with a date column and conversions.
pub const CAMPAIGN_CSV: &str = "\
date,campaign,spend,clicks,impressions,conversions
2024-03-01,Spring Sale,120.50,340,12000,18
2024-03-02,Spring Sale,95.00,280,9800,11
2024-03-03,Brand Push,143.25,410,15500,24
2024-03-04,Brand Push,88.10,190,7600,6
2024-03-05,Retargeting,64.75,220,5400,19
";

/// Returns the absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        self.write_bytes(name, contents.as_bytes())
    }

    /// Writes raw bytes, for inputs that are deliberately not valid UTF-8.
    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents).expect("write temp file contents");
        path
    }
}
