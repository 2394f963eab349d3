//! Source provider abstraction for filesystem-independent loading.
//!
//! The [`SourceProvider`] trait abstracts file I/O so the loader can run
//! against the real filesystem or against an in-memory tree in tests.
//! [`SourceManager`] sits on top of a provider and hands out cached
//! [`SourceBuffer`]s.

use std::collections::{BTreeSet, HashMap};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::library::LibraryId;

/// Trait that abstracts file I/O for the loader.
///
/// Implementations must be shareable across the parse thread pool.
pub trait SourceProvider: Send + Sync {
    /// Read the source text for a given path.
    fn read_source(&self, path: &Path) -> Result<String, io::Error>;

    /// Canonicalize a path so that the same file is always keyed the same way.
    fn canonicalize(&self, path: &Path) -> Result<PathBuf, io::Error>;

    fn is_file(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    /// List the immediate children (files and directories) of `dir`, sorted.
    fn read_dir(&self, dir: &Path) -> Result<Vec<PathBuf>, io::Error>;
}

/// Default filesystem-backed source provider.
pub struct FileSystemProvider;

impl SourceProvider for FileSystemProvider {
    fn read_source(&self, path: &Path) -> Result<String, io::Error> {
        std::fs::read_to_string(path)
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf, io::Error> {
        path.canonicalize()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read_dir(&self, dir: &Path) -> Result<Vec<PathBuf>, io::Error> {
        let mut paths = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .collect::<Vec<_>>();
        paths.sort();
        Ok(paths)
    }
}

/// In-memory source provider for testing.
///
/// Maps paths to source text strings. Directories exist implicitly as the
/// ancestors of the stored files.
pub struct InMemoryProvider {
    files: HashMap<PathBuf, String>,
}

impl InMemoryProvider {
    pub fn new(files: HashMap<PathBuf, String>) -> Self {
        let files = files
            .into_iter()
            .map(|(path, text)| (normalize_path(&path), text))
            .collect();
        Self { files }
    }
}

/// Normalize a path by resolving `.` and `..` components without
/// touching the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(components.last(), Some(Component::Normal(_))) {
                    components.pop();
                } else if components.is_empty() {
                    components.push(component);
                }
            }
            other => components.push(other),
        }
    }
    components.iter().collect()
}

impl SourceProvider for InMemoryProvider {
    fn read_source(&self, path: &Path) -> Result<String, io::Error> {
        let normalized = normalize_path(path);
        self.files.get(&normalized).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("file not found in memory: {}", normalized.display()),
            )
        })
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf, io::Error> {
        let normalized = normalize_path(path);
        if self.is_file(&normalized) || self.is_dir(&normalized) {
            Ok(normalized)
        } else {
            Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!(
                    "path not found in memory provider: {}",
                    normalized.display()
                ),
            ))
        }
    }

    fn is_file(&self, path: &Path) -> bool {
        self.files.contains_key(&normalize_path(path))
    }

    fn is_dir(&self, path: &Path) -> bool {
        let normalized = normalize_path(path);
        self.files
            .keys()
            .any(|k| k != &normalized && k.starts_with(&normalized))
    }

    fn read_dir(&self, dir: &Path) -> Result<Vec<PathBuf>, io::Error> {
        let dir = normalize_path(dir);
        let children: BTreeSet<PathBuf> = self
            .files
            .keys()
            .filter(|k| *k != &dir)
            .filter_map(|k| k.strip_prefix(&dir).ok())
            .filter_map(|rest| rest.components().next())
            .map(|first| dir.join(first))
            .collect();
        if children.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("directory not found in memory: {}", dir.display()),
            ));
        }
        Ok(children.into_iter().collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(u32);

impl BufferId {
    pub fn index(self) -> u32 {
        self.0
    }
}

/// A loaded source file. Cloning is cheap; the text is shared.
#[derive(Debug, Clone)]
pub struct SourceBuffer {
    pub id: BufferId,
    pub path: PathBuf,
    pub text: Arc<str>,
    pub library: Option<LibraryId>,
}

/// Reads files through a [`SourceProvider`] and caches them by canonical path.
///
/// Reads may happen concurrently from the parse thread pool.
pub struct SourceManager {
    provider: Box<dyn SourceProvider>,
    cache: RwLock<HashMap<PathBuf, SourceBuffer>>,
    next_id: AtomicU32,
}

impl SourceManager {
    pub fn new(provider: impl SourceProvider + 'static) -> Self {
        Self {
            provider: Box::new(provider),
            cache: RwLock::new(HashMap::new()),
            next_id: AtomicU32::new(0),
        }
    }

    pub fn provider(&self) -> &dyn SourceProvider {
        self.provider.as_ref()
    }

    /// Read `path`, returning the cached buffer if this file was read before.
    ///
    /// A cached buffer is returned with `library` applied when one is given.
    pub fn read_source(
        &self,
        path: &Path,
        library: Option<LibraryId>,
    ) -> Result<SourceBuffer, io::Error> {
        let canon = self.provider.canonicalize(path)?;
        if let Some(buffer) = self.cache.read().get(&canon) {
            tracing::trace!(path = %canon.display(), "source cache hit");
            return Ok(with_library(buffer.clone(), library));
        }

        let text = self.provider.read_source(&canon)?;
        tracing::trace!(path = %canon.display(), bytes = text.len(), "read source");

        let mut cache = self.cache.write();
        let buffer = cache
            .entry(canon.clone())
            .or_insert_with(|| SourceBuffer {
                id: BufferId(self.next_id.fetch_add(1, Ordering::Relaxed)),
                path: canon,
                text: text.into(),
                library,
            })
            .clone();
        Ok(with_library(buffer, library))
    }

    /// Whether `path` has already been read through this manager.
    pub fn is_cached(&self, path: &Path) -> bool {
        match self.provider.canonicalize(path) {
            Ok(canon) => self.cache.read().contains_key(&canon),
            Err(_) => false,
        }
    }

    pub fn cached_count(&self) -> usize {
        self.cache.read().len()
    }
}

impl Default for SourceManager {
    fn default() -> Self {
        Self::new(FileSystemProvider)
    }
}

fn with_library(mut buffer: SourceBuffer, library: Option<LibraryId>) -> SourceBuffer {
    if library.is_some() {
        buffer.library = library;
    }
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(files: &[(&str, &str)]) -> InMemoryProvider {
        InMemoryProvider::new(
            files
                .iter()
                .map(|(p, t)| (PathBuf::from(p), t.to_string()))
                .collect(),
        )
    }

    #[test]
    fn normalize_path_resolves_dot_and_dotdot() {
        let normalized = normalize_path(Path::new("/a/b/../c/./d"));
        assert_eq!(normalized, PathBuf::from("/a/c/d"));
    }

    #[test]
    fn normalize_path_keeps_leading_parent_of_relative_path() {
        let normalized = normalize_path(Path::new("../x/./y"));
        assert_eq!(normalized, PathBuf::from("../x/y"));
    }

    #[test]
    fn in_memory_read_source_not_found() {
        let err = provider(&[])
            .read_source(Path::new("/missing.sv"))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn in_memory_directories_are_implicit() {
        let p = provider(&[("/rtl/a.sv", ""), ("/rtl/sub/b.sv", "")]);
        assert!(p.is_dir(Path::new("/rtl")));
        assert!(p.is_dir(Path::new("/rtl/sub")));
        assert!(!p.is_dir(Path::new("/rtl/a.sv")));
        assert!(p.is_file(Path::new("/rtl/./a.sv")));
        assert_eq!(
            p.read_dir(Path::new("/rtl")).unwrap(),
            vec![PathBuf::from("/rtl/a.sv"), PathBuf::from("/rtl/sub")]
        );
    }

    #[test]
    fn manager_caches_by_canonical_path() {
        let sm = SourceManager::new(provider(&[("/rtl/a.sv", "module a; endmodule")]));
        assert!(!sm.is_cached(Path::new("/rtl/a.sv")));

        let first = sm.read_source(Path::new("/rtl/a.sv"), None).unwrap();
        let second = sm.read_source(Path::new("/rtl/x/../a.sv"), None).unwrap();
        assert_eq!(first.id, second.id);
        assert!(sm.is_cached(Path::new("/rtl/a.sv")));
        assert_eq!(sm.cached_count(), 1);
    }

    #[test]
    fn manager_read_failure_is_not_cached() {
        let sm = SourceManager::new(provider(&[]));
        assert!(sm.read_source(Path::new("/nope.sv"), None).is_err());
        assert!(!sm.is_cached(Path::new("/nope.sv")));
        assert_eq!(sm.cached_count(), 0);
    }
}
