//! Deduplicated file registry with library ownership and precedence.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::glob::GlobRank;
use crate::library::LibraryId;

/// One registered source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: PathBuf,
    /// Only reachable through a library mapping. Cleared for good as soon as
    /// the path is also registered as a direct file.
    pub is_library_file: bool,
    pub library: Option<LibraryId>,
    /// Rank of the pattern that assigned `library`.
    pub library_rank: GlobRank,
    /// Set when another library claimed this path at the same rank and the
    /// tie has not been broken by a more specific pattern.
    pub second_lib: Option<LibraryId>,
}

/// Insertion-ordered set of [`FileEntry`], keyed by path. Order is parse order.
#[derive(Debug, Default)]
pub struct FileRegistry {
    entries: IndexMap<PathBuf, FileEntry>,
}

impl FileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `path`, merging with any earlier registration of the same
    /// path. Returns `true` if the path was new.
    pub fn register(
        &mut self,
        path: PathBuf,
        is_library_file: bool,
        library: Option<LibraryId>,
        rank: GlobRank,
    ) -> bool {
        if let Some(entry) = self.entries.get_mut(&path) {
            entry.is_library_file &= is_library_file;

            if let Some(library) = library {
                // A more specific pattern overrules; a tie with a different
                // library is remembered for a downstream diagnostic.
                if entry.library.is_none() || rank < entry.library_rank {
                    entry.library = Some(library);
                    entry.library_rank = rank;
                    entry.second_lib = None;
                } else if rank == entry.library_rank && entry.library != Some(library) {
                    entry.second_lib = Some(library);
                }
            }
            return false;
        }

        self.entries.insert(
            path.clone(),
            FileEntry {
                path,
                is_library_file,
                library,
                library_rank: rank,
                second_lib: None,
            },
        );
        true
    }

    pub fn get(&self, path: &Path) -> Option<&FileEntry> {
        self.entries.get(path)
    }

    pub fn entries(&self) -> impl ExactSizeIterator<Item = &FileEntry> {
        self.entries.values()
    }

    pub fn to_vec(&self) -> Vec<FileEntry> {
        self.entries.values().cloned().collect()
    }

    /// Entries whose library ownership is still an unresolved tie.
    pub fn library_ties(&self) -> impl Iterator<Item = &FileEntry> {
        self.entries.values().filter(|e| e.second_lib.is_some())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
