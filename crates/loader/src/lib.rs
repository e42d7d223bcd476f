//! Kilt loader: resolve paths against a root directory and read file content.
//!
//! Two implementations:
//! - [`FsLoader`] reads the real filesystem and canonicalizes roots with `std::fs::canonicalize`
//! - [`FakeLoader`] serves an in-memory file table shared by every nested loader (tests)

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

use kilt_core::{KiltError, Result};
use tracing::debug;

/// File access rooted at one directory.
pub trait Loader: Send + Sync {
    /// Canonical absolute root directory.
    fn root(&self) -> &Path;

    /// Read `path` (relative to the root, or absolute).
    fn load(&self, path: &str) -> Result<Vec<u8>>;

    /// True when `path` names a readable file.
    fn is_file(&self, path: &str) -> bool;

    /// A loader rooted at the canonical directory `path` points to.
    fn new_loader(&self, path: &str) -> Result<Box<dyn Loader>>;

    /// Lexically resolve `path` against the root.
    fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() { clean_path(p) } else { clean_path(&self.root().join(p)) }
    }
}

/// Normalize `.` and `..` components without touching the filesystem.
pub fn clean_path(p: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in p.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() { out.push(comp.as_os_str()); }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() { PathBuf::from(".") } else { out }
}

/// Loader over the real filesystem.
#[derive(Debug, Clone)]
pub struct FsLoader {
    root: PathBuf,
}

impl FsLoader {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let canonical = std::fs::canonicalize(root)
            .map_err(|e| KiltError::load(root.display().to_string(), e.to_string()))?;
        if !canonical.is_dir() {
            return Err(KiltError::load(canonical.display().to_string(), "not a directory"));
        }
        Ok(Self { root: canonical })
    }
}

impl Loader for FsLoader {
    fn root(&self) -> &Path { &self.root }

    fn load(&self, path: &str) -> Result<Vec<u8>> {
        let p = self.resolve(path);
        debug!(path = %p.display(), "reading file");
        std::fs::read(&p).map_err(|e| KiltError::load(p.display().to_string(), e.to_string()))
    }

    fn is_file(&self, path: &str) -> bool { self.resolve(path).is_file() }

    fn new_loader(&self, path: &str) -> Result<Box<dyn Loader>> {
        Ok(Box::new(FsLoader::new(self.resolve(path))?))
    }
}

/// In-memory loader. Clones and nested loaders share the same file table,
/// so files added after construction are visible everywhere.
#[derive(Debug, Clone)]
pub struct FakeLoader {
    root: PathBuf,
    files: Arc<Mutex<BTreeMap<PathBuf, Vec<u8>>>>,
}

impl FakeLoader {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self { root: clean_path(root.as_ref()), files: Arc::new(Mutex::new(BTreeMap::new())) }
    }

    /// Register a file at an absolute path.
    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) -> Result<()> {
        let path = path.as_ref();
        if !path.is_absolute() {
            return Err(KiltError::load(path.display().to_string(), "fake files need absolute paths"));
        }
        self.table().insert(clean_path(path), content.into());
        Ok(())
    }

    fn table(&self) -> std::sync::MutexGuard<'_, BTreeMap<PathBuf, Vec<u8>>> {
        self.files.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_dir(&self, dir: &Path) -> bool {
        self.table().keys().any(|f| f.parent().map(|p| p.starts_with(dir)).unwrap_or(false))
    }
}

impl Loader for FakeLoader {
    fn root(&self) -> &Path { &self.root }

    fn load(&self, path: &str) -> Result<Vec<u8>> {
        let p = self.resolve(path);
        self.table()
            .get(&p)
            .cloned()
            .ok_or_else(|| KiltError::load(p.display().to_string(), "no such file"))
    }

    fn is_file(&self, path: &str) -> bool { self.table().contains_key(&self.resolve(path)) }

    fn new_loader(&self, path: &str) -> Result<Box<dyn Loader>> {
        let dir = self.resolve(path);
        if !self.is_dir(&dir) {
            return Err(KiltError::load(dir.display().to_string(), "no such directory"));
        }
        Ok(Box::new(FakeLoader { root: dir, files: Arc::clone(&self.files) }))
    }
}
