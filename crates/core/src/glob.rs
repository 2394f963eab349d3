//! Pattern expansion for file and directory arguments.
//!
//! Patterns follow the library-map conventions: `*` and `?` match within a
//! single path component, `...` (or `**`) matches any number of
//! directories, and a trailing `/` names every file in a directory. Each
//! expansion reports a [`GlobRank`] describing how specific the pattern was.

use std::io;
use std::path::{Component, Path, PathBuf};

use globset::GlobBuilder;
use serde::Serialize;

use crate::source::{normalize_path, SourceProvider};

/// Precedence of the pattern that produced a match. Lower ranks win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum GlobRank {
    /// A literal path naming a single file.
    ExactPath,
    /// A pattern with wildcards in it.
    WildcardName,
    /// A directory whose files are all included.
    Directory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobMode {
    Files,
    Directories,
}

#[derive(Debug, thiserror::Error)]
pub enum GlobError {
    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] globset::Error),
    #[error("no such file or directory: {}", .0.display())]
    NotFound(PathBuf),
    #[error("pattern matched nothing")]
    NoMatch,
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobMatches {
    pub paths: Vec<PathBuf>,
    pub rank: GlobRank,
}

/// Expand `pattern` relative to `base` into a sorted list of paths.
pub fn glob(
    provider: &dyn SourceProvider,
    base: &Path,
    pattern: &str,
    mode: GlobMode,
    expand_env: bool,
) -> Result<GlobMatches, GlobError> {
    let expanded = if expand_env {
        expand_env_vars(pattern)
    } else {
        pattern.to_owned()
    };
    let expanded = expanded.trim();
    if expanded.is_empty() {
        return Err(GlobError::NoMatch);
    }

    let dir_only = expanded.ends_with('/') || expanded.ends_with(std::path::MAIN_SEPARATOR);
    let expanded = expanded.replace("...", "**");
    let trimmed = expanded.trim_end_matches(['/', std::path::MAIN_SEPARATOR]);
    let trimmed = if trimmed.is_empty() { "/" } else { trimmed };

    let mut full = if base.as_os_str().is_empty() || Path::new(trimmed).is_absolute() {
        normalize_path(Path::new(trimmed))
    } else {
        normalize_path(&base.join(trimmed))
    };
    if full.as_os_str().is_empty() {
        full = PathBuf::from(".");
    }

    if !has_wildcard(&full.to_string_lossy()) {
        return glob_literal(provider, full, mode, dir_only);
    }

    let components: Vec<Component> = full.components().collect();
    let split = components
        .iter()
        .position(|c| has_wildcard(&c.as_os_str().to_string_lossy()))
        .unwrap_or(components.len());
    let root: PathBuf = components[..split].iter().collect();
    let recursive = components[split..].iter().any(|c| c.as_os_str() == "**");
    let depth = if recursive {
        None
    } else {
        Some(components.len() - split)
    };

    let matcher = GlobBuilder::new(&full.to_string_lossy())
        .literal_separator(true)
        .build()?
        .compile_matcher();

    let relative_root = root.as_os_str().is_empty();
    let walk_root = if relative_root {
        PathBuf::from(".")
    } else {
        root
    };
    let mut candidates = Vec::new();
    walk(provider, &walk_root, depth, &mut candidates)?;

    let mut paths = Vec::new();
    for candidate in candidates {
        let candidate = if relative_root {
            candidate
                .strip_prefix(".")
                .map(Path::to_path_buf)
                .unwrap_or(candidate)
        } else {
            candidate
        };
        if !matcher.is_match(&candidate) {
            continue;
        }
        match mode {
            GlobMode::Files if dir_only => {
                if provider.is_dir(&candidate) {
                    paths.extend(files_in(provider, &candidate)?);
                }
            }
            GlobMode::Files => {
                if provider.is_file(&candidate) {
                    paths.push(candidate);
                }
            }
            GlobMode::Directories => {
                if provider.is_dir(&candidate) {
                    paths.push(candidate);
                }
            }
        }
    }

    paths.sort();
    paths.dedup();
    if paths.is_empty() {
        return Err(GlobError::NoMatch);
    }

    let rank = if dir_only && mode == GlobMode::Files {
        GlobRank::Directory
    } else {
        GlobRank::WildcardName
    };
    Ok(GlobMatches { paths, rank })
}

fn glob_literal(
    provider: &dyn SourceProvider,
    full: PathBuf,
    mode: GlobMode,
    dir_only: bool,
) -> Result<GlobMatches, GlobError> {
    match mode {
        GlobMode::Files => {
            if !dir_only && provider.is_file(&full) {
                return Ok(GlobMatches {
                    paths: vec![full],
                    rank: GlobRank::ExactPath,
                });
            }
            if provider.is_dir(&full) {
                return Ok(GlobMatches {
                    paths: files_in(provider, &full)?,
                    rank: GlobRank::Directory,
                });
            }
            Err(GlobError::NotFound(full))
        }
        GlobMode::Directories => {
            if provider.is_dir(&full) {
                Ok(GlobMatches {
                    paths: vec![full],
                    rank: GlobRank::ExactPath,
                })
            } else {
                Err(GlobError::NotFound(full))
            }
        }
    }
}

fn files_in(provider: &dyn SourceProvider, dir: &Path) -> Result<Vec<PathBuf>, io::Error> {
    Ok(provider
        .read_dir(dir)?
        .into_iter()
        .filter(|p| provider.is_file(p))
        .collect())
}

fn walk(
    provider: &dyn SourceProvider,
    dir: &Path,
    depth: Option<usize>,
    out: &mut Vec<PathBuf>,
) -> Result<(), io::Error> {
    for child in provider.read_dir(dir)? {
        let descend = depth.map_or(true, |d| d > 1) && provider.is_dir(&child);
        out.push(child.clone());
        if descend {
            if let Err(e) = walk(provider, &child, depth.map(|d| d - 1), out) {
                tracing::debug!(
                    dir = %child.display(),
                    error = %e,
                    "skipping unreadable directory"
                );
            }
        }
    }
    Ok(())
}

fn has_wildcard(s: &str) -> bool {
    s.contains(['*', '?', '[', '{'])
}

/// Expand `$VAR`, `${VAR}` and `$(VAR)` references from the process
/// environment. Unset variables expand to nothing.
pub fn expand_env_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }

        let mut name = String::new();
        match chars.peek().copied() {
            Some(open @ ('{' | '(')) => {
                let close = if open == '{' { '}' } else { ')' };
                chars.next();
                let mut terminated = false;
                for c in chars.by_ref() {
                    if c == close {
                        terminated = true;
                        break;
                    }
                    name.push(c);
                }
                if !terminated {
                    out.push('$');
                    out.push(open);
                    out.push_str(&name);
                    continue;
                }
            }
            _ => {
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if name.is_empty() {
                    out.push('$');
                    continue;
                }
            }
        }

        if let Ok(value) = std::env::var(&name) {
            out.push_str(&value);
        }
    }
    out
}
