//! Turns registered file entries into syntax trees.
//!
//! Each entry is read and classified independently, possibly on a rayon
//! pool. Results land in an index-ordered vector and are merged on the
//! calling thread, so output order never depends on scheduling.

use std::sync::Arc;

use indexmap::IndexMap;
use rayon::prelude::*;
use rayon::ThreadPool;

use crate::error::LoadError;
use crate::options::SourceOptions;
use crate::registry::FileEntry;
use crate::source::{SourceBuffer, SourceManager};
use crate::syntax::{MacroDef, SyntaxTree};

/// Below this many entries the pool is not worth starting.
pub const MIN_FILES_FOR_THREADING: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredKind {
    /// Direct file folded into the single compilation unit.
    SingleUnit,
    /// Library file waiting for the main unit's macros.
    InheritMacros,
}

/// Outcome of reading and classifying one entry.
#[derive(Debug)]
pub enum LoadResult {
    Tree {
        tree: SyntaxTree,
        /// Came from a direct (non-library) entry, whatever `is_library`
        /// says after lint-only marking.
        direct: bool,
    },
    Deferred {
        buffer: SourceBuffer,
        kind: DeferredKind,
    },
    Failed(LoadError),
}

#[derive(Debug)]
pub struct ParseOutput {
    /// Eager trees in file order, then the single-unit tree, then deferred
    /// library trees in file order.
    pub trees: Vec<Arc<SyntaxTree>>,
    pub errors: Vec<LoadError>,
    /// Macros later parses inherit from the main compilation unit.
    pub inherited_macros: Arc<[MacroDef]>,
}

pub struct ParsePipeline<'a> {
    sources: &'a SourceManager,
    options: &'a SourceOptions,
}

impl<'a> ParsePipeline<'a> {
    pub fn new(sources: &'a SourceManager, options: &'a SourceOptions) -> Self {
        ParsePipeline { sources, options }
    }

    pub fn parse_all(&self, entries: &[FileEntry]) -> ParseOutput {
        let threaded = entries.len() >= MIN_FILES_FOR_THREADING && !self.options.threads_disabled();
        let pool = if threaded { self.build_pool() } else { None };
        tracing::debug!(
            files = entries.len(),
            threaded = pool.is_some(),
            "parsing sources"
        );

        let results = map_ordered(pool.as_ref(), entries, |entry| self.classify(entry));

        let mut trees = Vec::new();
        let mut errors = Vec::new();
        let mut eager_direct_macros: IndexMap<String, MacroDef> = IndexMap::new();
        let mut single_unit = Vec::new();
        let mut deferred = Vec::new();
        for result in results {
            match result {
                LoadResult::Tree { tree, direct } => {
                    if direct && self.options.libraries_inherit_macros {
                        for def in tree.defined_macros() {
                            eager_direct_macros.insert(def.name.clone(), def.clone());
                        }
                    }
                    trees.push(Arc::new(tree));
                }
                LoadResult::Deferred {
                    buffer,
                    kind: DeferredKind::SingleUnit,
                } => single_unit.push(buffer),
                LoadResult::Deferred {
                    buffer,
                    kind: DeferredKind::InheritMacros,
                } => deferred.push(buffer),
                LoadResult::Failed(err) => errors.push(err),
            }
        }

        let inherited_macros: Arc<[MacroDef]> = if !single_unit.is_empty() {
            let mut tree = SyntaxTree::from_buffers(&single_unit, self.options, &[]);
            tree.is_library = self.options.only_lint;
            tracing::debug!(buffers = single_unit.len(), "parsed single compilation unit");
            let macros = Arc::from(tree.defined_macros());
            trees.push(Arc::new(tree));
            macros
        } else {
            eager_direct_macros.into_values().collect()
        };

        if !deferred.is_empty() {
            tracing::debug!(
                files = deferred.len(),
                inherited = inherited_macros.len(),
                "parsing macro-inheriting library files"
            );
            let parsed = map_ordered(pool.as_ref(), &deferred, |buffer| {
                let mut tree = SyntaxTree::from_buffer(buffer, self.options, &inherited_macros);
                tree.is_library = true;
                Arc::new(tree)
            });
            trees.extend(parsed);
        }

        ParseOutput {
            trees,
            errors,
            inherited_macros,
        }
    }

    fn classify(&self, entry: &FileEntry) -> LoadResult {
        let buffer = match self.sources.read_source(&entry.path, entry.library) {
            Ok(buffer) => buffer,
            Err(e) => return LoadResult::Failed(LoadError::read(&entry.path, e)),
        };

        if self.options.single_unit && !entry.is_library_file {
            return LoadResult::Deferred {
                buffer,
                kind: DeferredKind::SingleUnit,
            };
        }
        if self.options.libraries_inherit_macros {
            // Direct files define the macros; they cannot wait on them.
            if !entry.is_library_file {
                return self.eager_tree(entry, &buffer);
            }
            debug_assert!(
                entry.is_library_file,
                "only library files inherit macros: {}",
                entry.path.display()
            );
            return LoadResult::Deferred {
                buffer,
                kind: DeferredKind::InheritMacros,
            };
        }

        self.eager_tree(entry, &buffer)
    }

    fn eager_tree(&self, entry: &FileEntry, buffer: &SourceBuffer) -> LoadResult {
        let mut tree = SyntaxTree::from_buffer(buffer, self.options, &[]);
        tree.is_library = entry.is_library_file || self.options.only_lint;
        LoadResult::Tree {
            tree,
            direct: !entry.is_library_file,
        }
    }

    fn build_pool(&self) -> Option<ThreadPool> {
        let threads = self.options.num_threads.unwrap_or(0);
        match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => Some(pool),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "could not start parse thread pool, parsing sequentially"
                );
                None
            }
        }
    }
}

/// Map `items` in order, on `pool` when one is given.
fn map_ordered<T, R, F>(pool: Option<&ThreadPool>, items: &[T], f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync + Send,
{
    match pool {
        Some(pool) => pool.install(|| items.par_iter().map(&f).collect()),
        None => items.iter().map(f).collect(),
    }
}
