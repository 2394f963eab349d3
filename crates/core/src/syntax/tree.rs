use std::path::Path;

use crate::error::SyntaxDiagnostic;
use crate::library::LibraryId;
use crate::options::SourceOptions;
use crate::source::SourceBuffer;
use crate::syntax::lexer;
use crate::syntax::metadata::{self, TreeMetadata};
use crate::syntax::preprocess::{parse_predefine, MacroDef, Preprocessor};

/// The result of preprocessing and scanning one compilation unit.
///
/// A unit is normally one buffer; in single-unit mode it covers every
/// direct file, in order, with macros flowing from one file to the next.
#[derive(Debug)]
pub struct SyntaxTree {
    buffers: Vec<SourceBuffer>,
    /// Library trees are left out of some whole-design checks downstream.
    pub is_library: bool,
    metadata: TreeMetadata,
    defined_macros: Vec<MacroDef>,
    undefined_macros: Vec<String>,
    diagnostics: Vec<SyntaxDiagnostic>,
}

impl SyntaxTree {
    pub fn from_buffer(
        buffer: &SourceBuffer,
        options: &SourceOptions,
        inherited_macros: &[MacroDef],
    ) -> Self {
        Self::from_buffers(std::slice::from_ref(buffer), options, inherited_macros)
    }

    pub fn from_buffers(
        buffers: &[SourceBuffer],
        options: &SourceOptions,
        inherited_macros: &[MacroDef],
    ) -> Self {
        let initial = options
            .predefines
            .iter()
            .filter_map(|d| parse_predefine(d))
            .chain(inherited_macros.iter().cloned());
        let mut preprocessor = Preprocessor::new(initial);
        let mut metadata = TreeMetadata::default();
        let mut diagnostics = Vec::new();

        for buffer in buffers {
            let filename = buffer.path.display().to_string();
            match lexer::lex(&buffer.text, &filename) {
                Ok(tokens) => {
                    let expanded = preprocessor.run(tokens, &filename);
                    metadata::scan_into(&expanded, &mut metadata);
                }
                Err(diag) => diagnostics.push(diag),
            }
        }

        let (defined_macros, undefined_macros, pp_diagnostics) = preprocessor.finish();
        diagnostics.extend(pp_diagnostics);

        SyntaxTree {
            buffers: buffers.to_vec(),
            is_library: false,
            metadata,
            defined_macros,
            undefined_macros,
            diagnostics,
        }
    }

    pub fn buffers(&self) -> &[SourceBuffer] {
        &self.buffers
    }

    /// Path of the first buffer in the unit.
    pub fn path(&self) -> Option<&Path> {
        self.buffers.first().map(|b| b.path.as_path())
    }

    pub fn library(&self) -> Option<LibraryId> {
        self.buffers.first().and_then(|b| b.library)
    }

    pub fn metadata(&self) -> &TreeMetadata {
        &self.metadata
    }

    /// Every macro defined when preprocessing finished, including
    /// predefined and inherited ones.
    pub fn defined_macros(&self) -> &[MacroDef] {
        &self.defined_macros
    }

    pub fn is_macro_defined(&self, name: &str) -> bool {
        self.defined_macros.iter().any(|m| m.name == name)
    }

    /// Macros that were used but not defined at the point of use.
    pub fn undefined_macros(&self) -> &[String] {
        &self.undefined_macros
    }

    pub fn diagnostics(&self) -> &[SyntaxDiagnostic] {
        &self.diagnostics
    }
}
