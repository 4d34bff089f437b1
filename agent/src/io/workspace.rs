//! The confined working root and path resolution against it.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, warn};

use crate::core::error::ActionError;
use crate::core::path::{is_within, normalize_lexical};

/// Canonical directory every tool path is confined to.
///
/// Fixed at startup and never derived from model input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingRoot {
    path: PathBuf,
}

impl WorkingRoot {
    /// Canonicalize `path` and check that it is a directory.
    pub fn open(path: &Path) -> Result<Self> {
        let canonical = path
            .canonicalize()
            .with_context(|| format!("resolve working root {}", path.display()))?;
        if !canonical.is_dir() {
            return Err(anyhow!(
                "working root {} is not a directory",
                canonical.display()
            ));
        }
        debug!(root = %canonical.display(), "working root opened");
        Ok(Self { path: canonical })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolve `relative` against the root, following symlinks.
    ///
    /// Targets that do not exist yet are resolved through their nearest
    /// existing ancestor, so a symlinked parent pointing outside the root is
    /// still rejected. `verb` names the attempted operation in the error.
    pub fn resolve(&self, relative: &str, verb: &'static str) -> Result<PathBuf, ActionError> {
        let joined = normalize_lexical(&self.path.join(relative));
        let canonical = canonicalize_with_missing_tail(&joined)
            .map_err(|err| ActionError::io(format!("cannot resolve \"{relative}\""), err))?;

        if !is_within(&self.path, &canonical) {
            warn!(
                requested = relative,
                resolved = %canonical.display(),
                "path escapes working root"
            );
            return Err(ActionError::Containment {
                verb,
                path: relative.to_string(),
            });
        }
        Ok(canonical)
    }
}

fn canonicalize_with_missing_tail(path: &Path) -> std::io::Result<PathBuf> {
    if fs::symlink_metadata(path).is_ok() {
        return path.canonicalize();
    }
    let mut ancestor = path.to_path_buf();
    let mut tail = PathBuf::new();
    while fs::symlink_metadata(&ancestor).is_err() {
        if let Some(name) = ancestor.file_name() {
            tail = Path::new(name).join(&tail);
        }
        if !ancestor.pop() {
            break;
        }
    }
    Ok(ancestor.canonicalize()?.join(tail))
}
