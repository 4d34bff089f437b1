//! Lexical path helpers for containment checks.
//!
//! Nothing here touches the filesystem. Symlink resolution happens in
//! [`crate::io::workspace`], which feeds canonical paths into these helpers.

use std::path::{Component, Path, PathBuf};

/// Collapse `.` and `..` components without consulting the filesystem.
///
/// `..` never pops past the filesystem root, so `/a/../../b` becomes `/b`.
pub fn normalize_lexical(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            Component::CurDir => {}
            other => out.push(other),
        }
    }
    out
}

/// True when `candidate` is `root` or lies below it.
///
/// Comparison is per component, so `/work/root-evil` is not inside `/work/root`.
pub fn is_within(root: &Path, candidate: &Path) -> bool {
    candidate == root || candidate.starts_with(root)
}
