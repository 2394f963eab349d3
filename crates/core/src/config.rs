//! Project configuration for a source load.
//!
//! # Example
//!
//! ```toml
//! files = ["rtl/*.sv", "tb/top_tb.sv"]
//! library_maps = ["lib.map"]
//! search_dirs = ["ip/..."]
//! search_extensions = ["svh"]
//!
//! [libraries]
//! gates = ["netlist/"]
//!
//! [options]
//! single_unit = true
//! libraries_inherit_macros = true
//! predefines = ["SYNTHESIS", "WIDTH=32"]
//! ```
//!
//! Relative patterns resolve against the directory holding the file.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::loader::SourceLoader;
use crate::options::SourceOptions;

// ── Types ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoaderConfig {
    /// Direct design file patterns.
    pub files: Vec<String>,
    /// Library file patterns, keyed by library name.
    pub libraries: BTreeMap<String, Vec<String>>,
    pub library_maps: Vec<String>,
    pub search_dirs: Vec<String>,
    pub search_extensions: Vec<String>,
    pub options: SourceOptions,
    /// Directory relative patterns resolve against. Set by [`LoaderConfig::read`].
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not parse '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

// ── Functions ─────────────────────────────────────────────────────────────────

impl LoaderConfig {
    /// Read and parse a TOML config file from `path`.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        let mut config: LoaderConfig =
            toml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_owned(),
                source,
            })?;
        config.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Register everything this config names with `loader`.
    pub fn apply(&self, loader: &mut SourceLoader) {
        for pattern in &self.files {
            loader.add_files(&self.resolve(pattern));
        }
        for (library, patterns) in &self.libraries {
            for pattern in patterns {
                loader.add_library_files(library, &self.resolve(pattern));
            }
        }
        for pattern in &self.library_maps {
            loader.add_library_maps(pattern, &self.base_dir, false);
        }
        for pattern in &self.search_dirs {
            loader.add_search_directories(&self.resolve(pattern));
        }
        for ext in &self.search_extensions {
            loader.add_search_extension(ext);
        }
    }

    fn resolve(&self, pattern: &str) -> String {
        if self.base_dir.as_os_str().is_empty() || Path::new(pattern).is_absolute() {
            pattern.to_owned()
        } else {
            self.base_dir.join(pattern).to_string_lossy().into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{InMemoryProvider, SourceManager};
    use std::collections::HashMap;

    #[test]
    fn parses_every_section() {
        let config = LoaderConfig::from_toml_str(
            r#"
            files = ["rtl/*.sv"]
            search_extensions = [".svh"]

            [libraries]
            gates = ["netlist/"]

            [options]
            single_unit = true
            num_threads = 2
            predefines = ["SIM"]
            "#,
        )
        .unwrap();
        assert_eq!(config.files, vec!["rtl/*.sv"]);
        assert_eq!(config.libraries["gates"], vec!["netlist/"]);
        assert!(config.options.single_unit);
        assert_eq!(config.options.num_threads, Some(2));
        assert_eq!(config.options.predefines, vec!["SIM"]);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(LoaderConfig::from_toml_str("fils = []").is_err());
        assert!(LoaderConfig::from_toml_str("[options]\nsingle = true").is_err());
    }

    #[test]
    fn apply_resolves_against_base_dir() {
        let files: HashMap<PathBuf, String> = [
            ("/proj/rtl/a.sv", "module a; endmodule"),
            ("/proj/net/g.v", "module g; endmodule"),
        ]
        .into_iter()
        .map(|(p, t)| (PathBuf::from(p), t.to_string()))
        .collect();
        let mut loader = SourceLoader::new(SourceManager::new(InMemoryProvider::new(files)));

        let mut config = LoaderConfig::from_toml_str(
            "files = [\"rtl/*.sv\"]\nsearch_dirs = [\"rtl\"]\n[libraries]\ngates = [\"net/\"]",
        )
        .unwrap();
        config.base_dir = PathBuf::from("/proj");
        config.apply(&mut loader);

        assert!(loader.errors().is_empty(), "{:?}", loader.errors());
        let paths: Vec<_> = loader.file_entries().map(|e| e.path.clone()).collect();
        assert_eq!(
            paths,
            vec![PathBuf::from("/proj/rtl/a.sv"), PathBuf::from("/proj/net/g.v")]
        );
        assert_eq!(loader.search_directories(), &[PathBuf::from("/proj/rtl")]);
    }

    #[test]
    fn read_reports_missing_file() {
        let err = LoaderConfig::read(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("here.toml"));
    }
}
