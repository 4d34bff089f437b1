//! Filesystem tools confined to the working root.

use std::fs;

use tracing::{debug, instrument};

use crate::core::error::{ActionError, ActionOutcome};
use crate::core::report::{ListingEntry, format_listing, truncate_chars};
use crate::io::workspace::WorkingRoot;

/// Default cap on characters returned by [`read_file`].
pub const DEFAULT_READ_LIMIT_CHARS: usize = 10_000;

/// List the immediate children of `directory` with their sizes.
#[instrument(skip(root))]
pub fn list_directory(root: &WorkingRoot, directory: &str) -> ActionOutcome {
    let target = root.resolve(directory, "list")?;
    if !target.is_dir() {
        return Err(ActionError::NotADirectory {
            path: directory.to_string(),
        });
    }

    let mut entries = Vec::new();
    let read_dir = fs::read_dir(&target)
        .map_err(|err| ActionError::io(format!("list \"{directory}\""), err))?;
    for entry in read_dir {
        let entry = entry.map_err(|err| ActionError::io(format!("list \"{directory}\""), err))?;
        let path = entry.path();
        // Follow symlinks like `stat` would; fall back to the link itself if dangling.
        let metadata = fs::metadata(&path)
            .or_else(|_| fs::symlink_metadata(&path))
            .map_err(|err| ActionError::io(format!("stat {}", path.display()), err))?;
        entries.push(ListingEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            size: metadata.len(),
            is_dir: metadata.is_dir(),
        });
    }
    debug!(count = entries.len(), "directory listed");
    Ok(format_listing(directory, &entries))
}

/// Read a regular file, truncating to `limit_chars` characters.
#[instrument(skip(root))]
pub fn read_file(root: &WorkingRoot, file_path: &str, limit_chars: usize) -> ActionOutcome {
    let target = root.resolve(file_path, "read")?;
    if !target.is_file() {
        return Err(ActionError::NotAFile {
            path: file_path.to_string(),
        });
    }
    let content = fs::read_to_string(&target)
        .map_err(|err| ActionError::io(format!("read \"{file_path}\""), err))?;
    Ok(truncate_chars(content, limit_chars, file_path))
}

/// Overwrite `file_path` with `content`, creating missing parent directories.
#[instrument(skip(root, content), fields(chars = content.chars().count()))]
pub fn write_file(root: &WorkingRoot, file_path: &str, content: &str) -> ActionOutcome {
    let target = root.resolve(file_path, "write to")?;
    if let Some(parent) = target.parent()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|err| {
            ActionError::io(format!("create parent directories for \"{file_path}\""), err)
        })?;
    }
    fs::write(&target, content)
        .map_err(|err| ActionError::io(format!("write \"{file_path}\""), err))?;
    let written = content.chars().count();
    debug!(path = %target.display(), written, "file written");
    Ok(format!(
        "Successfully wrote to \"{file_path}\" ({written} characters written)"
    ))
}
