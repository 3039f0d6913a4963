//! Extraction safety guard.
//!
//! Entry names come from the archive and are attacker-controlled.  Before an
//! entry is materialised its name is joined onto the destination directory
//! and cleaned lexically; the result must stay strictly below the
//! destination.  Entries that escape are not fatal: they are recorded and
//! skipped so the rest of the archive can still be recovered.

use log::warn;
use std::io;
use std::path::{Component, Path, PathBuf};

pub struct ExtractionGuard {
    root:    PathBuf,
    skipped: Vec<String>,
}

impl ExtractionGuard {
    /// Resolve `dest` to an absolute, cleaned path once per extraction.
    pub fn new(dest: &Path) -> io::Result<Self> {
        let root = clean_path(&std::path::absolute(dest)?);
        Ok(Self { root, skipped: Vec::new() })
    }

    #[cfg(test)]
    fn root(&self) -> &Path {
        &self.root
    }

    /// Where `name` may be written, or `None` if it was skipped as unsafe.
    pub fn resolve(&mut self, name: &str) -> Option<PathBuf> {
        match contained_join(&self.root, name) {
            Some(path) => Some(path),
            None => {
                warn!("skipping unsafe entry {name:?}");
                self.skipped.push(name.to_owned());
                None
            }
        }
    }

    pub fn into_skipped(self) -> Vec<String> {
        self.skipped
    }
}

/// Lexically join `name` onto `root` and clean the result.
///
/// Returns `None` unless the cleaned path lies strictly below `root`.  A
/// leading `/` in `name` does not re-root the join; `..` pops a component.
pub fn contained_join(root: &Path, name: &str) -> Option<PathBuf> {
    let mut target = root.to_path_buf();
    for part in name.split(is_separator) {
        match part {
            "" | "." => {}
            ".." => {
                target.pop();
            }
            part => target.push(part),
        }
    }
    if target != root && target.starts_with(root) {
        Some(target)
    } else {
        None
    }
}

fn is_separator(c: char) -> bool {
    c == '/' || (cfg!(windows) && c == '\\')
}

/// Remove `.` components and resolve `..` against preceding components
/// without touching the filesystem.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    out
}
