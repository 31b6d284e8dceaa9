//! Loader for workflow definition files
//!
//! Collects every `.bpmn` file below a root directory, keyed by file name.

use std::collections::btree_map::{self, BTreeMap};
use std::path::{Path, PathBuf};

use log::{debug, warn};
use walkdir::WalkDir;

use crate::errors::{DeployerError, DeployerResult};

/// Extension of deployable workflow files
pub const WORKFLOW_FILE_EXTENSION: &str = "bpmn";

/// What to do when two files in different directories share a name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// The file visited last wins
    KeepLast,
    /// Abort the load
    Reject,
}

/// Workflow files found under a directory, keyed by file name
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FileSet {
    files: BTreeMap<String, PathBuf>,
}

impl FileSet {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Path> {
        self.files.get(name).map(PathBuf::as_path)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, PathBuf> {
        self.files.iter()
    }
}

impl<'a> IntoIterator for &'a FileSet {
    type Item = (&'a String, &'a PathBuf);
    type IntoIter = btree_map::Iter<'a, String, PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.iter()
    }
}

impl FromIterator<(String, PathBuf)> for FileSet {
    fn from_iter<I: IntoIterator<Item = (String, PathBuf)>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}

/// Load all workflow files below `directory`
///
/// Entries are visited in file-name order, so with [`DuplicatePolicy::KeepLast`]
/// the surviving path for a shared name is the same on every run. A missing
/// or unreadable root yields an empty set, as do unreadable entries below it;
/// each is logged as a warning.
pub fn load_from_directory(directory: &Path, policy: DuplicatePolicy) -> DeployerResult<FileSet> {
    if !directory.is_dir() {
        warn!(
            "Workflow directory {} does not exist or is not a directory",
            directory.display()
        );
        return Ok(FileSet::default());
    }

    let mut files: BTreeMap<String, PathBuf> = BTreeMap::new();

    for entry in WalkDir::new(directory).follow_links(false).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                warn!("Unable to read workflow directory {}: {}", directory.display(), e);
                return Ok(FileSet::default());
            }
            Err(e) => {
                warn!("Skipping unreadable entry below {}: {}", directory.display(), e);
                continue;
            }
        };

        if !entry.file_type().is_file() || !is_workflow_file(entry.path()) {
            continue;
        }

        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            warn!("Skipping workflow file with non UTF-8 name: {}", entry.path().display());
            continue;
        };

        let path = entry.into_path();
        debug!("Found workflow file {}", path.display());

        if let Some(previous) = files.get(&name) {
            match policy {
                DuplicatePolicy::Reject => {
                    return Err(DeployerError::DuplicateFile {
                        name,
                        first: previous.clone(),
                        second: path,
                    });
                }
                DuplicatePolicy::KeepLast => {
                    warn!(
                        "Workflow file name {} found twice, using {} instead of {}",
                        name,
                        path.display(),
                        previous.display()
                    );
                }
            }
        }
        files.insert(name, path);
    }

    Ok(FileSet { files })
}

/// Extension is whatever follows the last dot, so `.bpmn` itself counts
fn is_workflow_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext == WORKFLOW_FILE_EXTENSION)
        .unwrap_or(false)
}
