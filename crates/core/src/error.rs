use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::glob::GlobError;

/// Why a pattern or file could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum LoadErrorKind {
    #[error(transparent)]
    Glob(#[from] GlobError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A load failure recorded against the path or pattern that caused it.
#[derive(Debug, thiserror::Error)]
#[error("{path}: {kind}")]
pub struct LoadError {
    pub path: String,
    #[source]
    pub kind: LoadErrorKind,
}

impl LoadError {
    pub fn new(path: impl Into<String>, kind: impl Into<LoadErrorKind>) -> Self {
        LoadError {
            path: path.into(),
            kind: kind.into(),
        }
    }

    pub fn read(path: &Path, error: io::Error) -> Self {
        LoadError::new(path.display().to_string(), error)
    }

    pub fn pattern(pattern: &str, error: GlobError) -> Self {
        LoadError::new(pattern, error)
    }

    pub fn to_json_value(&self) -> serde_json::Value {
        let kind = match self.kind {
            LoadErrorKind::Glob(_) => "pattern",
            LoadErrorKind::Io(_) => "read",
        };
        serde_json::json!({
            "kind":    kind,
            "message": self.kind.to_string(),
            "path":    self.path,
        })
    }
}

/// A problem found while lexing, preprocessing or scanning a source file.
/// These never abort a load; they travel with the tree or library map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyntaxDiagnostic {
    pub file: String,
    pub line: u32,
    pub message: String,
}

impl SyntaxDiagnostic {
    pub fn new(file: &str, line: u32, message: impl Into<String>) -> Self {
        SyntaxDiagnostic {
            file: file.to_owned(),
            line,
            message: message.into(),
        }
    }
}
