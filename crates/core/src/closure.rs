//! Fixpoint discovery of files that declare referenced names.

use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexSet;
use serde::Serialize;

use crate::options::SourceOptions;
use crate::source::{SourceBuffer, SourceManager};
use crate::syntax::{MacroDef, SyntaxTree};

/// What the last discovery run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClosureStats {
    pub rounds: usize,
    pub files_loaded: usize,
}

/// Loads `<dir>/<name>.<ext>` for every referenced name no loaded tree
/// declares, round after round, until a round finds nothing new to look for.
pub struct ClosureResolver<'a> {
    sources: &'a SourceManager,
    options: &'a SourceOptions,
    search_dirs: &'a [PathBuf],
    extensions: &'a [String],
    inherited_macros: Arc<[MacroDef]>,
}

impl<'a> ClosureResolver<'a> {
    pub fn new(
        sources: &'a SourceManager,
        options: &'a SourceOptions,
        search_dirs: &'a [PathBuf],
        extensions: &'a [String],
        inherited_macros: Arc<[MacroDef]>,
    ) -> Self {
        ClosureResolver {
            sources,
            options,
            search_dirs,
            extensions,
            inherited_macros,
        }
    }

    /// Append discovered trees to `trees`.
    pub fn resolve(&self, trees: &mut Vec<Arc<SyntaxTree>>) -> ClosureStats {
        let mut stats = ClosureStats::default();
        if self.search_dirs.is_empty() {
            return stats;
        }

        let mut known: IndexSet<String> = trees
            .iter()
            .flat_map(|t| t.metadata().declared_names())
            .map(str::to_owned)
            .collect();
        let mut missing = IndexSet::new();
        for tree in trees.iter() {
            collect_missing(tree, &known, &mut missing);
        }

        while !missing.is_empty() {
            stats.rounds += 1;
            tracing::debug!(round = stats.rounds, names = missing.len(), "discovery round");

            let mut next = IndexSet::new();
            for name in &missing {
                if known.contains(name) {
                    continue;
                }
                let Some(buffer) = self.find(name) else {
                    tracing::trace!(name = %name, "no file found");
                    continue;
                };
                tracing::debug!(name = %name, path = %buffer.path.display(), "discovered file");

                let mut tree =
                    SyntaxTree::from_buffer(&buffer, self.options, &self.inherited_macros);
                tree.is_library = true;
                known.extend(tree.metadata().declared_names().map(str::to_owned));
                collect_missing(&tree, &known, &mut next);
                trees.push(Arc::new(tree));
                stats.files_loaded += 1;
            }
            missing = next;
        }

        tracing::debug!(
            rounds = stats.rounds,
            files = stats.files_loaded,
            "discovery finished"
        );
        stats
    }

    /// First readable `<dir>/<name>.<ext>` not already loaded.
    fn find(&self, name: &str) -> Option<SourceBuffer> {
        for dir in self.search_dirs {
            for ext in self.extensions {
                let path = dir.join(format!("{name}.{ext}"));
                if self.sources.is_cached(&path) {
                    continue;
                }
                if let Ok(buffer) = self.sources.read_source(&path, None) {
                    return Some(buffer);
                }
            }
        }
        None
    }
}

fn collect_missing(tree: &SyntaxTree, known: &IndexSet<String>, out: &mut IndexSet<String>) {
    for name in tree.metadata().referenced_names() {
        if !known.contains(name) {
            out.insert(name.to_owned());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemoryProvider;
    use std::collections::HashMap;
    use std::path::Path;

    fn manager(files: &[(&str, &str)]) -> SourceManager {
        SourceManager::new(InMemoryProvider::new(
            files
                .iter()
                .map(|(p, t)| (PathBuf::from(p), t.to_string()))
                .collect::<HashMap<_, _>>(),
        ))
    }

    fn load(sm: &SourceManager, path: &str) -> Arc<SyntaxTree> {
        let buffer = sm.read_source(Path::new(path), None).unwrap();
        Arc::new(SyntaxTree::from_buffer(&buffer, &SourceOptions::default(), &[]))
    }

    fn no_macros() -> Arc<[MacroDef]> {
        Vec::<MacroDef>::new().into()
    }

    fn resolve(
        sm: &SourceManager,
        dirs: &[PathBuf],
        trees: &mut Vec<Arc<SyntaxTree>>,
    ) -> ClosureStats {
        let options = SourceOptions::default();
        let exts = ["v".to_string(), "sv".to_string()];
        ClosureResolver::new(sm, &options, dirs, &exts, no_macros()).resolve(trees)
    }

    #[test]
    fn discovers_transitively() {
        let sm = manager(&[
            ("/src/top.sv", "module top; a u_a(); b u_b(); endmodule"),
            ("/lib/a.sv", "module a; c u_c(); endmodule"),
            ("/lib/b.v", "module b; c u_c(); endmodule"),
            ("/lib/c.sv", "module c; endmodule"),
        ]);
        let mut trees = vec![load(&sm, "/src/top.sv")];
        let dirs = vec![PathBuf::from("/lib")];
        let stats = resolve(&sm, &dirs, &mut trees);

        assert_eq!(stats.rounds, 2);
        assert_eq!(stats.files_loaded, 3);
        let names: Vec<_> = trees
            .iter()
            .flat_map(|t| t.metadata().declared_names().map(str::to_owned).collect::<Vec<_>>())
            .collect();
        assert_eq!(names, vec!["top", "a", "b", "c"]);
        assert!(trees[1..].iter().all(|t| t.is_library));
    }

    #[test]
    fn unknown_names_end_the_loop() {
        let sm = manager(&[("/src/top.sv", "module top; nowhere u(); endmodule")]);
        let mut trees = vec![load(&sm, "/src/top.sv")];
        let dirs = vec![PathBuf::from("/src")];
        let stats = resolve(&sm, &dirs, &mut trees);
        assert_eq!(stats.rounds, 1);
        assert_eq!(stats.files_loaded, 0);
        assert_eq!(trees.len(), 1);
    }

    #[test]
    fn first_directory_and_extension_win() {
        let sm = manager(&[
            ("/top.sv", "module top; pick u(); endmodule"),
            ("/one/pick.sv", "module pick; endmodule"),
            ("/one/pick.v", "module pick; endmodule"),
            ("/two/pick.v", "module pick; endmodule"),
        ]);
        let mut trees = vec![load(&sm, "/top.sv")];
        let dirs = vec![PathBuf::from("/two"), PathBuf::from("/one")];
        resolve(&sm, &dirs, &mut trees);
        assert_eq!(trees.len(), 2);
        assert_eq!(trees[1].path(), Some(Path::new("/two/pick.v")));
    }

    #[test]
    fn already_loaded_files_are_not_reread() {
        let sm = manager(&[
            ("/top.sv", "module top; odd u(); endmodule"),
            ("/lib/odd.sv", "module not_odd; endmodule"),
        ]);
        sm.read_source(Path::new("/lib/odd.sv"), None).unwrap();
        let mut trees = vec![load(&sm, "/top.sv")];
        let dirs = vec![PathBuf::from("/lib")];
        let stats = resolve(&sm, &dirs, &mut trees);
        assert_eq!(stats.files_loaded, 0);
    }
}
