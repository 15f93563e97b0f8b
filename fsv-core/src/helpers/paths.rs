//! Lexical path normalization for snapshot keys.

use std::path::{Component, Path, PathBuf};

/// Normalize a relative path lexically.
///
/// `.` components are dropped and `..` pops the previous component. Nothing
/// touches the filesystem, so the path does not need to exist.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Render a path with `/` separators regardless of platform.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
