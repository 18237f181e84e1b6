//! In-memory mock filesystem for testing collectors without real `/proc`.
//!
//! `MockFs` simulates a filesystem in memory, allowing tests to run in CI
//! and on non-Linux hosts. Unlike a plain file map it also models
//! symlinks, which the correlator needs for `/proc/[pid]/fd/*` targets.

use crate::collector::traits::FileSystem;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};

/// In-memory filesystem for testing.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    /// Map from path to file contents.
    files: HashMap<PathBuf, String>,
    /// Set of directories (for read_dir support).
    directories: HashSet<PathBuf>,
    /// Map from path to symlink target.
    symlinks: HashMap<PathBuf, String>,
}

impl MockFs {
    /// Creates a new empty mock filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file with the given content.
    ///
    /// Parent directories are automatically created.
    pub fn add_file(&mut self, path: impl AsRef<Path>, content: impl Into<String>) {
        let path = path.as_ref().to_path_buf();
        self.add_parents(&path);
        self.files.insert(path, content.into());
    }

    /// Adds an empty directory.
    pub fn add_dir(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        self.add_parents(&path);
        self.directories.insert(path);
    }

    /// Adds a symlink pointing at `target`.
    pub fn add_symlink(&mut self, path: impl AsRef<Path>, target: impl Into<String>) {
        let path = path.as_ref().to_path_buf();
        self.add_parents(&path);
        self.symlinks.insert(path, target.into());
    }

    /// Removes a file, simulating a resource that vanished or is
    /// permission-protected.
    pub fn remove_file(&mut self, path: impl AsRef<Path>) {
        self.files.remove(path.as_ref());
    }

    fn add_parents(&mut self, path: &Path) {
        let mut parent = path.parent();
        while let Some(p) = parent {
            if !p.as_os_str().is_empty() {
                self.directories.insert(p.to_path_buf());
            }
            parent = p.parent();
        }
    }
}

impl FileSystem for MockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("{:?}", path)))
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        if !self.directories.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{:?}", path),
            ));
        }
        let mut entries: Vec<PathBuf> = self
            .files
            .keys()
            .chain(self.directories.iter())
            .chain(self.symlinks.keys())
            .filter(|p| p.parent() == Some(path))
            .cloned()
            .collect();
        entries.sort();
        entries.dedup();
        Ok(entries)
    }

    fn read_link(&self, path: &Path) -> io::Result<String> {
        self.symlinks
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("{:?}", path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_file() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/uptime", "100.0 200.0\n");
        assert_eq!(
            fs.read_to_string(Path::new("/proc/uptime")).unwrap(),
            "100.0 200.0\n"
        );
        assert!(fs.read_to_string(Path::new("/proc/missing")).is_err());
    }

    #[test]
    fn test_parents_created() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/123/stat", "x");
        assert_eq!(
            fs.read_dir(Path::new("/proc/123")).unwrap(),
            vec![PathBuf::from("/proc/123/stat")]
        );
        assert_eq!(
            fs.read_dir(Path::new("/proc")).unwrap(),
            vec![PathBuf::from("/proc/123")]
        );
    }

    #[test]
    fn test_read_dir_lists_all_entry_kinds() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/1/stat", "x");
        fs.add_dir("/proc/1/fd");
        fs.add_symlink("/proc/1/exe", "/usr/bin/init");

        let entries = fs.read_dir(Path::new("/proc/1")).unwrap();
        assert_eq!(entries.len(), 3);
    }

    #[test]
    fn test_read_link() {
        let mut fs = MockFs::new();
        fs.add_symlink("/proc/1/fd/3", "socket:[999]");
        assert_eq!(
            fs.read_link(Path::new("/proc/1/fd/3")).unwrap(),
            "socket:[999]"
        );
        assert!(fs.read_link(Path::new("/proc/1/fd/4")).is_err());
    }

    #[test]
    fn test_remove_file() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/net/tcp", "header\n");
        fs.remove_file("/proc/net/tcp");
        assert!(fs.read_to_string(Path::new("/proc/net/tcp")).is_err());
    }
}
