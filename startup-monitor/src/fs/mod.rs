//! File system operations the monitor depends on.
//!
//! Everything goes through [`FileSystem`] so tests can swap in a recorder and
//! assert exactly which calls a sync performed.

use std::fs;
use std::io::{self, Write};
use std::os::unix::fs::{OpenOptionsExt, symlink};
use std::path::Path;
use std::sync::Arc;

use crate::error::MonitorError;

#[cfg(test)]
pub(crate) mod fake;

/// The subset of file metadata the monitor looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metadata {
    pub is_dir: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

impl DirEntry {
    pub fn dir(name: impl Into<String>) -> Self {
        DirEntry {
            name: name.into(),
            is_dir: true,
        }
    }

    pub fn file(name: impl Into<String>) -> Self {
        DirEntry {
            name: name.into(),
            is_dir: false,
        }
    }
}

/// Blocking file system capability.
///
/// `stat` follows symbolic links. Missing paths are reported as
/// [`io::ErrorKind::NotFound`].
pub trait FileSystem: Send + Sync {
    fn stat(&self, path: &Path) -> io::Result<Metadata>;
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>>;
    fn write_file(&self, path: &Path, data: &[u8], mode: u32) -> io::Result<()>;
    fn remove(&self, path: &Path) -> io::Result<()>;
    /// Create `link` pointing at `target`.
    fn symlink(&self, target: &Path, link: &Path) -> io::Result<()>;
    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>>;
}

impl<T: FileSystem + ?Sized> FileSystem for Arc<T> {
    fn stat(&self, path: &Path) -> io::Result<Metadata> {
        (**self).stat(path)
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        (**self).read_file(path)
    }

    fn write_file(&self, path: &Path, data: &[u8], mode: u32) -> io::Result<()> {
        (**self).write_file(path, data, mode)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        (**self).remove(path)
    }

    fn symlink(&self, target: &Path, link: &Path) -> io::Result<()> {
        (**self).symlink(target, link)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        (**self).read_dir(path)
    }
}

/// Dispatches to the host file system.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostFs;

impl FileSystem for HostFs {
    fn stat(&self, path: &Path) -> io::Result<Metadata> {
        let meta = fs::metadata(path)?;
        Ok(Metadata {
            is_dir: meta.is_dir(),
        })
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn write_file(&self, path: &Path, data: &[u8], mode: u32) -> io::Result<()> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(mode)
            .open(path)?;
        file.write_all(data)?;
        file.sync_all()
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn symlink(&self, target: &Path, link: &Path) -> io::Result<()> {
        symlink(target, link)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            // file_type does not follow links, a link to a directory is not a revision.
            let is_dir = entry.file_type()?.is_dir();
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir,
            });
        }
        Ok(entries)
    }
}

/// Report whether `path` exists as something other than a directory.
///
/// A directory where a file or link is expected means the tree was tampered
/// with; it is reported as [`MonitorError::NotAPointer`] and never repaired.
pub fn file_exists(fs: &dyn FileSystem, path: &Path) -> Result<bool, MonitorError> {
    match fs.stat(path) {
        Ok(meta) if meta.is_dir => Err(MonitorError::NotAPointer {
            path: path.to_path_buf(),
        }),
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(MonitorError::io(path, e)),
    }
}

/// Remove `path`, treating an already missing file as success.
///
/// Returns whether something was removed.
pub fn remove_if_exists(fs: &dyn FileSystem, path: &Path) -> Result<bool, MonitorError> {
    match fs.remove(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(MonitorError::io(path, e)),
    }
}
