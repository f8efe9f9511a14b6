//! Recording [`FileSystem`] used by the unit tests.
//!
//! Each operation is answered by an optional handler. A missing handler makes
//! the call fail, so an unexpected operation surfaces as an error of the code
//! under test as well as a counter mismatch in [`FakeFs::validate`].

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{DirEntry, FileSystem, Metadata};

type PathFn<T> = Box<dyn Fn(&Path) -> io::Result<T> + Send + Sync>;
type WriteFn = Box<dyn Fn(&Path, &[u8], u32) -> io::Result<()> + Send + Sync>;
type SymlinkFn = Box<dyn Fn(&Path, &Path) -> io::Result<()> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Stat(PathBuf),
    ReadFile(PathBuf),
    WriteFile(PathBuf),
    Remove(PathBuf),
    Symlink { target: PathBuf, link: PathBuf },
    ReadDir(PathBuf),
}

/// Number of calls a scenario expects per operation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Expected {
    pub stat: usize,
    pub read_file: usize,
    pub write_file: usize,
    pub remove: usize,
    pub symlink: usize,
    pub read_dir: usize,
}

#[derive(Default)]
pub struct FakeFs {
    stat_fn: Option<PathFn<Metadata>>,
    read_file_fn: Option<PathFn<Vec<u8>>>,
    write_file_fn: Option<WriteFn>,
    remove_fn: Option<PathFn<()>>,
    symlink_fn: Option<SymlinkFn>,
    read_dir_fn: Option<PathFn<Vec<DirEntry>>>,
    expected: Expected,
    calls: Mutex<Vec<Call>>,
}

pub fn not_found() -> io::Error {
    io::Error::from(io::ErrorKind::NotFound)
}

pub fn file() -> Metadata {
    Metadata { is_dir: false }
}

pub fn dir() -> Metadata {
    Metadata { is_dir: true }
}

pub fn unexpected(path: &Path) -> io::Error {
    io::Error::other(format!("unexpected path {}", path.display()))
}

impl FakeFs {
    pub fn new(expected: Expected) -> Self {
        FakeFs {
            expected,
            ..Default::default()
        }
    }

    pub fn on_stat(
        mut self,
        f: impl Fn(&Path) -> io::Result<Metadata> + Send + Sync + 'static,
    ) -> Self {
        self.stat_fn = Some(Box::new(f));
        self
    }

    pub fn on_read_file(
        mut self,
        f: impl Fn(&Path) -> io::Result<Vec<u8>> + Send + Sync + 'static,
    ) -> Self {
        self.read_file_fn = Some(Box::new(f));
        self
    }

    pub fn on_write_file(
        mut self,
        f: impl Fn(&Path, &[u8], u32) -> io::Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.write_file_fn = Some(Box::new(f));
        self
    }

    pub fn on_remove(
        mut self,
        f: impl Fn(&Path) -> io::Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.remove_fn = Some(Box::new(f));
        self
    }

    pub fn on_symlink(
        mut self,
        f: impl Fn(&Path, &Path) -> io::Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.symlink_fn = Some(Box::new(f));
        self
    }

    pub fn on_read_dir(
        mut self,
        f: impl Fn(&Path) -> io::Result<Vec<DirEntry>> + Send + Sync + 'static,
    ) -> Self {
        self.read_dir_fn = Some(Box::new(f));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    /// Counts of every operation performed so far.
    pub fn counts(&self) -> Expected {
        let mut counts = Expected::default();
        for call in self.calls.lock().unwrap().iter() {
            match call {
                Call::Stat(_) => counts.stat += 1,
                Call::ReadFile(_) => counts.read_file += 1,
                Call::WriteFile(_) => counts.write_file += 1,
                Call::Remove(_) => counts.remove += 1,
                Call::Symlink { .. } => counts.symlink += 1,
                Call::ReadDir(_) => counts.read_dir += 1,
            }
        }
        counts
    }

    /// Compare the recorded calls with the expected counts, reporting every
    /// mismatch at once.
    pub fn validate(&self) -> Result<(), String> {
        let actual = self.counts();
        let expected = self.expected;
        let mut errs = Vec::new();
        let pairs = [
            ("Symlink", actual.symlink, expected.symlink),
            ("Stat", actual.stat, expected.stat),
            ("Remove", actual.remove, expected.remove),
            ("ReadFile", actual.read_file, expected.read_file),
            ("ReadDir", actual.read_dir, expected.read_dir),
            ("WriteFile", actual.write_file, expected.write_file),
        ];
        for (op, got, want) in pairs {
            if got != want {
                errs.push(format!("unexpected {op} calls {got}, expected {want}"));
            }
        }
        if errs.is_empty() {
            Ok(())
        } else {
            Err(errs.join(", "))
        }
    }
}

impl FileSystem for FakeFs {
    fn stat(&self, path: &Path) -> io::Result<Metadata> {
        self.record(Call::Stat(path.to_path_buf()));
        match &self.stat_fn {
            Some(f) => f(path),
            None => Err(unexpected(path)),
        }
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.record(Call::ReadFile(path.to_path_buf()));
        match &self.read_file_fn {
            Some(f) => f(path),
            None => Err(unexpected(path)),
        }
    }

    fn write_file(&self, path: &Path, data: &[u8], mode: u32) -> io::Result<()> {
        self.record(Call::WriteFile(path.to_path_buf()));
        match &self.write_file_fn {
            Some(f) => f(path, data, mode),
            None => Err(unexpected(path)),
        }
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        self.record(Call::Remove(path.to_path_buf()));
        match &self.remove_fn {
            Some(f) => f(path),
            None => Err(unexpected(path)),
        }
    }

    fn symlink(&self, target: &Path, link: &Path) -> io::Result<()> {
        self.record(Call::Symlink {
            target: target.to_path_buf(),
            link: link.to_path_buf(),
        });
        match &self.symlink_fn {
            Some(f) => f(target, link),
            None => Err(unexpected(link)),
        }
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        self.record(Call::ReadDir(path.to_path_buf()));
        match &self.read_dir_fn {
            Some(f) => f(path),
            None => Err(unexpected(path)),
        }
    }
}
