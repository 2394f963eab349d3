//! The public entry point: register sources, then load or parse them.
//!
//! Nothing here stops at the first failure. Bad patterns and unreadable
//! files are recorded in [`SourceLoader::errors`] and the rest of the load
//! carries on.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexSet;
use serde::Serialize;

use crate::closure::{ClosureResolver, ClosureStats};
use crate::error::LoadError;
use crate::glob::{self, GlobMode};
use crate::libmap::{LibMapMember, LibraryMap};
use crate::library::{Library, LibraryId, LibraryRegistry};
use crate::options::SourceOptions;
use crate::pipeline::ParsePipeline;
use crate::registry::{FileEntry, FileRegistry};
use crate::source::{SourceBuffer, SourceManager};
use crate::syntax::SyntaxTree;

const DEFAULT_EXTENSIONS: &[&str] = &["v", "sv"];

/// A file claimed by two libraries through equally specific patterns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryTie {
    pub path: PathBuf,
    pub first: String,
    pub second: String,
}

pub struct SourceLoader {
    sources: SourceManager,
    libraries: LibraryRegistry,
    files: FileRegistry,
    library_maps: Vec<LibraryMap>,
    search_dirs: Vec<PathBuf>,
    search_extensions: IndexSet<String>,
    errors: Vec<LoadError>,
    closure_stats: Option<ClosureStats>,
}

impl SourceLoader {
    pub fn new(sources: SourceManager) -> Self {
        SourceLoader {
            sources,
            libraries: LibraryRegistry::new(),
            files: FileRegistry::new(),
            library_maps: Vec::new(),
            search_dirs: Vec::new(),
            search_extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            errors: Vec::new(),
            closure_stats: None,
        }
    }

    // ── Registration ─────────────────────────────────────────────────

    /// Register the files matching `pattern` as direct design files.
    pub fn add_files(&mut self, pattern: &str) {
        self.add_files_internal(pattern, Path::new(""), false, None, false);
    }

    /// Register the files matching `pattern` as members of `library`,
    /// creating the library on first use.
    pub fn add_library_files(&mut self, library: &str, pattern: &str) {
        let library = self.libraries.get_or_add(library);
        self.add_files_internal(pattern, Path::new(""), true, library, false);
    }

    /// Register directories searched for files declaring unresolved names.
    pub fn add_search_directories(&mut self, pattern: &str) {
        match glob::glob(
            self.sources.provider(),
            Path::new(""),
            pattern,
            GlobMode::Directories,
            false,
        ) {
            Ok(matches) => {
                for dir in matches.paths {
                    if !self.search_dirs.contains(&dir) {
                        self.search_dirs.push(dir);
                    }
                }
            }
            Err(e) => self.errors.push(LoadError::pattern(pattern, e)),
        }
    }

    /// Add an extension tried during discovery. The leading dot is optional.
    pub fn add_search_extension(&mut self, extension: &str) {
        let extension = extension.strip_prefix('.').unwrap_or(extension);
        if !extension.is_empty() {
            self.search_extensions.insert(extension.to_owned());
        }
    }

    /// Load every library map matching `pattern`, following includes and
    /// registering the files of each declared library.
    ///
    /// Relative patterns resolve against `base_path`. Includes and library
    /// paths inside a map resolve against that map's own directory.
    pub fn add_library_maps(&mut self, pattern: &str, base_path: &Path, expand_env_vars: bool) {
        let matches = match glob::glob(
            self.sources.provider(),
            base_path,
            pattern,
            GlobMode::Files,
            expand_env_vars,
        ) {
            Ok(matches) => matches,
            Err(e) => {
                self.errors.push(LoadError::pattern(pattern, e));
                return;
            }
        };

        for path in matches.paths {
            let buffer = match self.sources.read_source(&path, None) {
                Ok(buffer) => buffer,
                Err(e) => {
                    self.errors.push(LoadError::read(&path, e));
                    continue;
                }
            };
            let map = LibraryMap::parse(buffer);
            for diag in map.diagnostics() {
                tracing::warn!(file = %diag.file, line = diag.line, "{}", diag.message);
            }
            tracing::debug!(
                path = %map.path().display(),
                members = map.members().len(),
                "loaded library map"
            );

            let map_dir = map.path().parent().map(Path::to_path_buf).unwrap_or_default();
            for member in map.members() {
                match member {
                    LibMapMember::Empty | LibMapMember::Config { .. } => {}
                    LibMapMember::Include { file_path } => {
                        if let Some(include) = file_path.path() {
                            self.add_library_maps(include, &map_dir, true);
                        }
                    }
                    LibMapMember::Library(decl) => {
                        let Some(library) = self.libraries.get_or_add(&decl.name) else {
                            continue;
                        };
                        for spec in &decl.file_paths {
                            if let Some(pattern) = spec.path() {
                                self.add_files_internal(
                                    pattern,
                                    &map_dir,
                                    true,
                                    Some(library),
                                    true,
                                );
                            }
                        }
                    }
                }
            }
            self.library_maps.push(map);
        }
    }

    fn add_files_internal(
        &mut self,
        pattern: &str,
        base_path: &Path,
        is_library_file: bool,
        library: Option<LibraryId>,
        expand_env_vars: bool,
    ) {
        let provider = self.sources.provider();
        match glob::glob(provider, base_path, pattern, GlobMode::Files, expand_env_vars) {
            Ok(matches) => {
                for path in matches.paths {
                    let path = provider.canonicalize(&path).unwrap_or(path);
                    self.files
                        .register(path, is_library_file, library, matches.rank);
                }
            }
            Err(e) => self.errors.push(LoadError::pattern(pattern, e)),
        }
    }

    // ── Loading ──────────────────────────────────────────────────────

    /// Read every registered file without parsing it.
    pub fn load_sources(&mut self) -> Vec<SourceBuffer> {
        let mut buffers = Vec::with_capacity(self.files.len());
        for entry in self.files.entries() {
            match self.sources.read_source(&entry.path, entry.library) {
                Ok(buffer) => buffers.push(buffer),
                Err(e) => self.errors.push(LoadError::read(&entry.path, e)),
            }
        }
        buffers
    }

    /// Parse every registered file, then load files from the search
    /// directories until every referenced name that can be found is.
    pub fn load_and_parse_sources(&mut self, options: &SourceOptions) -> Vec<Arc<SyntaxTree>> {
        for tie in self.library_ties() {
            tracing::warn!(
                path = %tie.path.display(),
                first = %tie.first,
                second = %tie.second,
                "file claimed by two libraries with equal precedence"
            );
        }

        let entries = self.files.to_vec();
        let output = ParsePipeline::new(&self.sources, options).parse_all(&entries);
        self.errors.extend(output.errors);
        let mut trees = output.trees;

        self.closure_stats = if self.search_dirs.is_empty() {
            None
        } else {
            let extensions: Vec<String> = self.search_extensions.iter().cloned().collect();
            let resolver = ClosureResolver::new(
                &self.sources,
                options,
                &self.search_dirs,
                &extensions,
                output.inherited_macros,
            );
            Some(resolver.resolve(&mut trees))
        };
        trees
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn errors(&self) -> &[LoadError] {
        &self.errors
    }

    pub fn has_files(&self) -> bool {
        !self.files.is_empty()
    }

    /// Registered files in parse order.
    pub fn file_entries(&self) -> impl ExactSizeIterator<Item = &FileEntry> {
        self.files.entries()
    }

    pub fn libraries(&self) -> impl Iterator<Item = (LibraryId, &Library)> {
        self.libraries.iter()
    }

    pub fn library(&self, id: LibraryId) -> Option<&Library> {
        self.libraries.get(id)
    }

    pub fn library_ties(&self) -> Vec<LibraryTie> {
        self.files
            .library_ties()
            .filter_map(|entry| {
                let first = self.libraries.get(entry.library?)?;
                let second = self.libraries.get(entry.second_lib?)?;
                Some(LibraryTie {
                    path: entry.path.clone(),
                    first: first.name().to_owned(),
                    second: second.name().to_owned(),
                })
            })
            .collect()
    }

    pub fn library_map_trees(&self) -> &[LibraryMap] {
        &self.library_maps
    }

    pub fn search_directories(&self) -> &[PathBuf] {
        &self.search_dirs
    }

    pub fn search_extensions(&self) -> impl Iterator<Item = &str> {
        self.search_extensions.iter().map(String::as_str)
    }

    pub fn source_manager(&self) -> &SourceManager {
        &self.sources
    }

    /// Statistics from the last discovery run, if search directories were
    /// registered when sources were last parsed.
    pub fn last_closure_stats(&self) -> Option<ClosureStats> {
        self.closure_stats
    }
}

impl Default for SourceLoader {
    fn default() -> Self {
        Self::new(SourceManager::default())
    }
}
