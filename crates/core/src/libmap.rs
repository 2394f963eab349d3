//! Library map documents.
//!
//! ```text
//! include "common/base.map";
//! library rtl "rtl/*.sv", "ip/.../*.v" -incdir "rtl/include";
//! library gates "netlist/";
//! config cfg1; design rtl.top; endconfig
//! ```
//!
//! Paths are quoted; the delimiters are kept on the syntax node and
//! stripped by [`FilePathSpec::path`].

use std::path::Path;

use crate::error::SyntaxDiagnostic;
use crate::source::SourceBuffer;
use crate::syntax::lexer::{self, Spanned, Token};

/// A quoted file path or pattern as written in the map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePathSpec {
    pub raw: String,
    pub line: u32,
}

impl FilePathSpec {
    /// The path with one leading and one trailing delimiter removed.
    /// Empty or malformed specs yield `None` and are skipped by the loader.
    pub fn path(&self) -> Option<&str> {
        if self.raw.chars().count() < 3 {
            return None;
        }
        let mut chars = self.raw.chars();
        chars.next();
        chars.next_back();
        Some(chars.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryDecl {
    pub name: String,
    pub file_paths: Vec<FilePathSpec>,
    pub incdirs: Vec<FilePathSpec>,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibMapMember {
    Empty,
    Config { name: String },
    Include { file_path: FilePathSpec },
    Library(LibraryDecl),
}

/// A parsed library map. Kept alive by the loader for the whole load.
#[derive(Debug)]
pub struct LibraryMap {
    buffer: SourceBuffer,
    members: Vec<LibMapMember>,
    diagnostics: Vec<SyntaxDiagnostic>,
}

impl LibraryMap {
    pub fn parse(buffer: SourceBuffer) -> Self {
        let filename = buffer.path.display().to_string();
        let (members, diagnostics) = match lexer::lex(&buffer.text, &filename) {
            Ok(tokens) => Parser::new(&tokens, &filename).parse_members(),
            Err(diag) => (Vec::new(), vec![diag]),
        };
        LibraryMap {
            buffer,
            members,
            diagnostics,
        }
    }

    pub fn path(&self) -> &Path {
        &self.buffer.path
    }

    pub fn buffer(&self) -> &SourceBuffer {
        &self.buffer
    }

    pub fn members(&self) -> &[LibMapMember] {
        &self.members
    }

    pub fn diagnostics(&self) -> &[SyntaxDiagnostic] {
        &self.diagnostics
    }
}

// ──────────────────────────────────────────────
// Parser
// ──────────────────────────────────────────────

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    filename: String,
    diagnostics: Vec<SyntaxDiagnostic>,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Spanned], filename: &str) -> Self {
        Parser {
            tokens,
            pos: 0,
            filename: filename.to_owned(),
            diagnostics: Vec::new(),
        }
    }

    fn cur(&self) -> &Spanned {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &Token {
        &self.cur().token
    }

    fn advance(&mut self) -> &Spanned {
        let t = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn at_punct(&self, c: char) -> bool {
        self.peek() == &Token::Punct(c)
    }

    fn is_word(&self, w: &str) -> bool {
        matches!(self.peek(), Token::Ident(x) if x == w)
    }

    fn err(&mut self, msg: impl Into<String>) {
        let line = self.cur().line;
        self.diagnostics
            .push(SyntaxDiagnostic::new(&self.filename, line, msg));
    }

    fn take_word(&mut self) -> Option<String> {
        if let Token::Ident(w) = self.peek().clone() {
            self.advance();
            Some(w)
        } else {
            self.err(format!("expected identifier, got {:?}", self.peek()));
            None
        }
    }

    fn take_path(&mut self) -> Option<FilePathSpec> {
        let line = self.cur().line;
        if let Token::Str(raw) = self.peek().clone() {
            self.advance();
            Some(FilePathSpec { raw, line })
        } else {
            self.err(format!("expected quoted file path, got {:?}", self.peek()));
            None
        }
    }

    /// Skip to just past the next `;` after a malformed member.
    fn recover(&mut self) {
        while !matches!(self.peek(), Token::Eof) {
            let done = self.at_punct(';');
            self.advance();
            if done {
                break;
            }
        }
    }

    fn expect_semi(&mut self) -> bool {
        if self.at_punct(';') {
            self.advance();
            true
        } else {
            self.err(format!("expected ';', got {:?}", self.peek()));
            self.recover();
            false
        }
    }

    fn parse_members(mut self) -> (Vec<LibMapMember>, Vec<SyntaxDiagnostic>) {
        let mut members = Vec::new();
        while !matches!(self.peek(), Token::Eof) {
            let member = if self.at_punct(';') {
                self.advance();
                Some(LibMapMember::Empty)
            } else if self.is_word("include") {
                self.advance();
                self.parse_include()
            } else if self.is_word("library") {
                self.advance();
                self.parse_library()
            } else if self.is_word("config") {
                self.advance();
                self.parse_config()
            } else {
                self.err(format!("unexpected {:?} in library map", self.peek()));
                self.recover();
                None
            };
            members.extend(member);
        }
        (members, self.diagnostics)
    }

    fn parse_include(&mut self) -> Option<LibMapMember> {
        let Some(file_path) = self.take_path() else {
            self.recover();
            return None;
        };
        self.expect_semi()
            .then_some(LibMapMember::Include { file_path })
    }

    fn parse_library(&mut self) -> Option<LibMapMember> {
        let line = self.cur().line;
        let Some(name) = self.take_word() else {
            self.recover();
            return None;
        };

        let mut file_paths = Vec::new();
        let mut incdirs = Vec::new();
        if !self.at_punct(';') && !self.at_punct('-') {
            if !self.path_list(&mut file_paths) {
                return None;
            }
        }
        if self.at_punct('-') {
            self.advance();
            if !self.is_word("incdir") {
                self.err(format!("expected 'incdir', got {:?}", self.peek()));
                self.recover();
                return None;
            }
            self.advance();
            if !self.path_list(&mut incdirs) {
                return None;
            }
        }

        self.expect_semi().then_some(LibMapMember::Library(LibraryDecl {
            name,
            file_paths,
            incdirs,
            line,
        }))
    }

    fn path_list(&mut self, out: &mut Vec<FilePathSpec>) -> bool {
        loop {
            match self.take_path() {
                Some(spec) => out.push(spec),
                None => {
                    self.recover();
                    return false;
                }
            }
            if !self.at_punct(',') {
                return true;
            }
            self.advance();
        }
    }

    /// Configurations are recognized and skipped.
    fn parse_config(&mut self) -> Option<LibMapMember> {
        let name = self.take_word().unwrap_or_default();
        while !matches!(self.peek(), Token::Eof) && !self.is_word("endconfig") {
            self.advance();
        }
        if self.is_word("endconfig") {
            self.advance();
        } else {
            self.err("missing 'endconfig'");
        }
        Some(LibMapMember::Config { name })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{InMemoryProvider, SourceManager};
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn parse(text: &str) -> LibraryMap {
        let mut files = HashMap::new();
        files.insert(PathBuf::from("/lib.map"), text.to_string());
        let sm = SourceManager::new(InMemoryProvider::new(files));
        LibraryMap::parse(sm.read_source(Path::new("/lib.map"), None).unwrap())
    }

    fn spec(raw: &str) -> FilePathSpec {
        FilePathSpec {
            raw: raw.into(),
            line: 1,
        }
    }

    #[test]
    fn path_spec_strips_one_delimiter_each_side() {
        assert_eq!(spec("\"rtl/*.sv\"").path(), Some("rtl/*.sv"));
        assert_eq!(spec("\"x\"").path(), Some("x"));
        assert_eq!(spec("\"\"").path(), None);
        assert_eq!(spec("\"").path(), None);
    }

    #[test]
    fn parses_every_member_kind() {
        let map = parse(
            "// shared\n\
             include \"common.map\";\n\
             ;\n\
             library rtl \"rtl/*.sv\", \"ip/\" -incdir \"inc\";\n\
             library empty;\n\
             config cfg; design rtl.top; endconfig\n",
        );
        assert!(map.diagnostics().is_empty(), "{:?}", map.diagnostics());
        assert_eq!(
            map.members(),
            &[
                LibMapMember::Include {
                    file_path: FilePathSpec {
                        raw: "\"common.map\"".into(),
                        line: 2
                    }
                },
                LibMapMember::Empty,
                LibMapMember::Library(LibraryDecl {
                    name: "rtl".into(),
                    file_paths: vec![
                        FilePathSpec {
                            raw: "\"rtl/*.sv\"".into(),
                            line: 4
                        },
                        FilePathSpec {
                            raw: "\"ip/\"".into(),
                            line: 4
                        },
                    ],
                    incdirs: vec![FilePathSpec {
                        raw: "\"inc\"".into(),
                        line: 4
                    }],
                    line: 4,
                }),
                LibMapMember::Library(LibraryDecl {
                    name: "empty".into(),
                    file_paths: vec![],
                    incdirs: vec![],
                    line: 5,
                }),
                LibMapMember::Config { name: "cfg".into() },
            ]
        );
    }

    #[test]
    fn malformed_members_are_skipped_and_reported() {
        let map = parse(
            "library 42 \"a.sv\";\n\
             bogus stuff;\n\
             include \"ok.map\";\n\
             include missing_quotes;\n",
        );
        assert_eq!(map.members().len(), 1);
        assert!(matches!(map.members()[0], LibMapMember::Include { .. }));
        assert_eq!(map.diagnostics().len(), 3);
    }

    #[test]
    fn lex_error_yields_no_members() {
        let map = parse("library rtl \"unterminated;\n");
        assert!(map.members().is_empty());
        assert_eq!(map.diagnostics().len(), 1);
    }
}
