use crate::error::SaliencyError;
use anyhow::Result;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Length of the file extension (e.g. `".jpg"`) trailing every manifest line.
pub const EXTENSION_LEN: usize = 4;

/// The ordered list of sample identifiers for one split.
///
/// Each line of the manifest file names one sample with its 4-character
/// extension, e.g. `ILSVRC2012_test_00000004.jpg`; the extension is stripped.
/// Surrounding whitespace is trimmed and blank lines are skipped. Order and
/// duplicates are preserved.
///
/// The identifiers live behind an `Arc`, so cloning a manifest for another
/// worker is cheap and shares one read-only list.
///
/// # Example
/// ```ignore
/// let manifest = Manifest::load("data/DUTS/train.txt")?;
/// let first = manifest.get(0);
/// ```
#[derive(Debug, Clone)]
pub struct Manifest {
    path: PathBuf,
    names: Arc<[String]>,
}

impl Manifest {
    /// Reads and parses a manifest file.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path: PathBuf = path.into();
        let read_error = |source| SaliencyError::ManifestRead {
            path: path.clone(),
            source,
        };

        let file = File::open(&path).map_err(read_error)?;
        let mut names = Vec::new();
        for (line_num, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(read_error)?;
            let entry = line.trim();
            if entry.is_empty() {
                continue;
            }
            names.push(strip_extension(entry, line_num + 1)?);
        }

        Ok(Self {
            path,
            names: names.into(),
        })
    }

    /// Builds a manifest from identifiers already in memory.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: PathBuf::new(),
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// File the identifiers were read from (empty for in-memory manifests).
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

/// Drops the trailing extension; the identifier itself must be non-empty.
fn strip_extension(entry: &str, line: usize) -> Result<String, SaliencyError> {
    match entry.char_indices().rev().nth(EXTENSION_LEN - 1) {
        Some((cut, _)) if cut > 0 => Ok(entry[..cut].to_string()),
        _ => Err(SaliencyError::MalformedManifestEntry {
            line,
            entry: entry.to_string(),
        }),
    }
}
