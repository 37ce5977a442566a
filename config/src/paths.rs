//! Utilities for walking the directory hierarchy.

use std::path::{Path, PathBuf};

/// Returns an iterator that walks up the directory hierarchy towards the root.
///
/// Each item is a [`Path`]. It will start with the given path, finishing at
/// the root. If the `stop_root_at` parameter is given, it will stop at the
/// given path (which will be the last item).
pub(crate) fn ancestors<'a>(path: &'a Path, stop_root_at: Option<&Path>) -> PathAncestors<'a> {
    PathAncestors {
        current: Some(path),
        stop_at: stop_root_at.map(|p| p.to_path_buf()),
    }
}

/// An iterator over parent paths from a starting directory to a stopping directory.
pub(crate) struct PathAncestors<'a> {
    current: Option<&'a Path>,
    stop_at: Option<PathBuf>,
}

impl<'a> Iterator for PathAncestors<'a> {
    type Item = &'a Path;

    fn next(&mut self) -> Option<&'a Path> {
        let path = self.current?;
        self.current = path.parent();
        if self.stop_at.as_deref() == Some(path) {
            self.current = None;
        }
        Some(path)
    }
}
