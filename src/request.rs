// Local side of a sync: which files go where, and with what message.
// Nothing in this module talks to the network.

use chrono::{DateTime, Local};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

/// One local file and the path it will occupy in the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSpec {
    /// Path as given by the caller.
    pub input: PathBuf,
    /// `input` resolved against the working directory.
    pub local: PathBuf,
    /// Forward-slash path inside the repository.
    pub remote: String,
}

/// Why an input never made it into the upload set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Missing,
    NotAFile,
    UnmappablePath,
    /// Maps to the same repository path as an earlier input.
    Duplicate,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SkipReason::Missing => "file not found",
            SkipReason::NotAFile => "not a regular file",
            SkipReason::UnmappablePath => "cannot be mapped to a repository path",
            SkipReason::Duplicate => "same repository path as an earlier file",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub input: PathBuf,
    pub reason: SkipReason,
}

/// Everything one invocation needs to know about its inputs. Built once,
/// consumed by the pipeline, never persisted.
#[derive(Debug, Clone)]
pub struct SyncRequest {
    pub files: Vec<FileSpec>,
    pub skipped: Vec<SkippedFile>,
    pub message: String,
}

impl SyncRequest {
    /// Resolve `inputs` against `cwd`, dropping files that are missing or
    /// cannot be placed in the repository. Order of the remaining inputs is
    /// kept; when two existing files land on the same repository path the
    /// first one wins. A missing `message` becomes the timestamped default.
    pub fn build<P: AsRef<Path>>(inputs: &[P], cwd: &Path, message: Option<String>) -> Self {
        let mut files = Vec::new();
        let mut skipped = Vec::new();
        let mut taken = HashSet::new();

        for input in inputs {
            let input = input.as_ref();
            let remote = match remote_path(input) {
                Some(r) => r,
                None => {
                    skipped.push(SkippedFile {
                        input: input.to_path_buf(),
                        reason: SkipReason::UnmappablePath,
                    });
                    continue;
                }
            };
            let local = if input.is_absolute() {
                input.to_path_buf()
            } else {
                cwd.join(input)
            };
            match std::fs::metadata(&local) {
                Ok(meta) if meta.is_file() => {
                    if taken.insert(remote.clone()) {
                        files.push(FileSpec {
                            input: input.to_path_buf(),
                            local,
                            remote,
                        });
                    } else {
                        skipped.push(SkippedFile {
                            input: input.to_path_buf(),
                            reason: SkipReason::Duplicate,
                        });
                    }
                }
                Ok(_) => skipped.push(SkippedFile {
                    input: input.to_path_buf(),
                    reason: SkipReason::NotAFile,
                }),
                Err(_) => skipped.push(SkippedFile {
                    input: input.to_path_buf(),
                    reason: SkipReason::Missing,
                }),
            }
        }

        SyncRequest {
            files,
            skipped,
            message: message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(default_message),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Repository path for a local input path.
///
/// Absolute paths flatten to their file name. Relative paths keep their
/// structure with `/` separators; backslashes count as separators too, so
/// Windows-style input maps the same way on every platform. `.` segments are
/// dropped. Returns `None` for paths that climb out with `..` or that name
/// nothing.
pub fn remote_path(input: &Path) -> Option<String> {
    if input.is_absolute() {
        return input
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.replace('\\', "/"))
            .and_then(|n| n.rsplit('/').next().map(str::to_string))
            .filter(|n| !n.is_empty());
    }

    let mut parts: Vec<String> = Vec::new();
    for component in input.components() {
        match component {
            Component::Normal(os) => {
                let text = os.to_str()?;
                for seg in text.split('\\') {
                    match seg {
                        "" | "." => {}
                        ".." => return None,
                        s => parts.push(s.to_string()),
                    }
                }
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Commit message used when the caller gives none.
pub fn default_message() -> String {
    message_at(Local::now())
}

pub fn message_at(when: DateTime<Local>) -> String {
    format!("Update files - {}", when.format("%Y-%m-%d %H:%M:%S"))
}
