//! Syntactic metadata gathered from a preprocessed token stream.
//!
//! This is not a parser. It recognizes just enough structure to report
//! which design units a file declares and which names it refers to, which
//! is what dependency discovery needs.

use serde::Serialize;

use crate::syntax::lexer::{Spanned, Token};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclKind {
    Module,
    Interface,
    Program,
    Package,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleDecl {
    pub kind: DeclKind,
    pub name: String,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageImport {
    /// Package named by each item of the import declaration.
    pub items: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TreeMetadata {
    pub module_decls: Vec<ModuleDecl>,
    pub class_decls: Vec<String>,
    /// Types instantiated as modules, interfaces or programs.
    pub global_instances: Vec<String>,
    /// Leading qualifiers of scoped names, `pkg` in `pkg::item`.
    pub class_package_names: Vec<String>,
    pub package_imports: Vec<PackageImport>,
    /// Interface types used in ANSI port lists.
    pub interface_ports: Vec<String>,
}

impl TreeMetadata {
    /// Names of the design units and classes this tree declares.
    pub fn declared_names(&self) -> impl Iterator<Item = &str> {
        self.module_decls
            .iter()
            .map(|d| d.name.as_str())
            .chain(self.class_decls.iter().map(String::as_str))
            .filter(|n| !n.is_empty())
    }

    /// Every name this tree refers to that some other file may declare.
    pub fn referenced_names(&self) -> impl Iterator<Item = &str> {
        self.global_instances
            .iter()
            .chain(&self.class_package_names)
            .chain(self.package_imports.iter().flat_map(|i| &i.items))
            .chain(&self.interface_ports)
            .map(String::as_str)
            .filter(|n| !n.is_empty())
    }
}

const KEYWORDS: &[&str] = &[
    "always", "always_comb", "always_ff", "always_latch", "and", "assert", "assign", "assume",
    "automatic", "begin", "bind", "bit", "break", "buf", "bufif0", "bufif1", "byte", "case",
    "casex", "casez", "cell", "chandle", "checker", "class", "clocking", "cmos", "config",
    "const", "constraint", "context", "continue", "cover", "covergroup", "coverpoint", "cross",
    "deassign", "default", "defparam", "design", "disable", "do", "edge", "else", "end",
    "endcase", "endchecker", "endclass", "endclocking", "endconfig", "endfunction",
    "endgenerate", "endgroup", "endinterface", "endmodule", "endpackage", "endprimitive",
    "endprogram", "endproperty", "endsequence", "endspecify", "endtable", "endtask", "enum",
    "event", "expect", "export", "extends", "extern", "final", "for", "force", "foreach",
    "forever", "fork", "function", "generate", "genvar", "if", "iff", "implements", "import",
    "incdir", "include", "initial", "inout", "input", "inside", "instance", "int", "integer",
    "interconnect", "interface", "join", "join_any", "join_none", "let", "liblist", "library",
    "local", "localparam", "logic", "longint", "macromodule", "modport", "module", "nand",
    "negedge", "nettype", "new", "nmos", "nor", "not", "notif0", "notif1", "null", "or",
    "output", "package", "packed", "parameter", "pmos", "posedge", "primitive", "priority",
    "program", "property", "protected", "pull0", "pull1", "pulldown", "pullup", "pure", "rand",
    "randc", "randcase", "randomize", "rcmos", "real", "realtime", "ref", "reg", "release",
    "repeat", "return", "rnmos", "rpmos", "rtran", "rtranif0", "rtranif1", "sequence",
    "shortint", "shortreal", "signed", "specify", "specparam", "static", "string", "struct",
    "super", "supply0", "supply1", "table", "task", "this", "time", "tran", "tranif0",
    "tranif1", "tri", "tri0", "tri1", "triand", "trior", "trireg", "type", "typedef", "union",
    "unique", "unique0", "unsigned", "use", "uwire", "var", "virtual", "void", "wait", "wand",
    "while", "wildcard", "wire", "with", "wor", "xnor", "xor",
];

pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

/// Words after which a new module item may start.
const ITEM_BOUNDARIES: &[&str] = &[
    "begin",
    "end",
    "generate",
    "endgenerate",
    "else",
    "endcase",
    "endfunction",
    "endtask",
    "endclass",
];

/// Scan a preprocessed token stream and append what it finds to `meta`.
pub fn scan_into(tokens: &[Spanned], meta: &mut TreeMetadata) {
    Scanner {
        tokens,
        pos: 0,
        nesting: 0,
        module_depth: 0,
        meta,
    }
    .run();
}

struct Scanner<'a, 'm> {
    tokens: &'a [Spanned],
    pos: usize,
    /// Depth of open parentheses, brackets and braces.
    nesting: usize,
    /// Depth of open module-like declarations.
    module_depth: usize,
    meta: &'m mut TreeMetadata,
}

impl<'a> Scanner<'a, '_> {
    fn tok(&self, i: usize) -> Option<&'a Token> {
        self.tokens.get(i).map(|t| &t.token)
    }

    fn word(&self, i: usize) -> Option<&'a str> {
        match self.tok(i) {
            Some(Token::Ident(w)) => Some(w),
            _ => None,
        }
    }

    fn prev_word_is(&self, w: &str) -> bool {
        self.pos > 0 && self.word(self.pos - 1) == Some(w)
    }

    fn run(mut self) {
        while self.pos < self.tokens.len() {
            match self.tok(self.pos) {
                Some(Token::Punct('(' | '[' | '{')) => {
                    self.nesting += 1;
                    self.pos += 1;
                }
                Some(Token::Punct(')' | ']' | '}')) => {
                    self.nesting = self.nesting.saturating_sub(1);
                    self.pos += 1;
                }
                Some(Token::Ident(word)) => self.word_token(word),
                _ => self.pos += 1,
            }
        }
    }

    fn word_token(&mut self, word: &'a str) {
        if self.tok(self.pos + 1) == Some(&Token::ColonColon)
            && !(self.pos > 0 && self.tok(self.pos - 1) == Some(&Token::ColonColon))
            && !matches!(word, "local" | "this" | "super")
        {
            push_unique(&mut self.meta.class_package_names, word);
        }

        match word {
            "module" | "macromodule" | "interface" | "program" | "package"
                if !self.prev_word_is("extern")
                    && !self.prev_word_is("virtual")
                    && !(word == "interface" && self.word(self.pos + 1) == Some("class")) =>
            {
                self.module_decl(word)
            }
            "endmodule" | "endinterface" | "endprogram" | "endpackage" => {
                self.module_depth = self.module_depth.saturating_sub(1);
                self.pos += 1;
            }
            "class" if !self.prev_word_is("typedef") => self.class_decl(),
            "import" => self.import_decl(),
            "export" => self.skip_statement(),
            _ if self.module_depth > 0
                && self.nesting == 0
                && !is_keyword(word)
                && self.at_item_start() =>
            {
                self.instance(word)
            }
            _ => self.pos += 1,
        }
    }

    fn at_item_start(&self) -> bool {
        if self.pos == 0 {
            return true;
        }
        match self.tok(self.pos - 1) {
            Some(Token::Punct(';' | ')' | ':')) => true,
            Some(Token::Ident(w)) if ITEM_BOUNDARIES.contains(&w.as_str()) => true,
            // `begin : label`
            Some(Token::Ident(_)) => {
                self.pos >= 3
                    && self.tok(self.pos - 2) == Some(&Token::Punct(':'))
                    && matches!(self.word(self.pos - 3), Some("begin" | "end"))
            }
            _ => false,
        }
    }

    fn module_decl(&mut self, keyword: &str) {
        let kind = match keyword {
            "interface" => DeclKind::Interface,
            "program" => DeclKind::Program,
            "package" => DeclKind::Package,
            _ => DeclKind::Module,
        };
        let line = self.tokens[self.pos].line;
        self.pos += 1;
        if matches!(self.word(self.pos), Some("automatic" | "static")) {
            self.pos += 1;
        }
        let Some(name) = self.word(self.pos) else {
            return;
        };
        self.meta.module_decls.push(ModuleDecl {
            kind,
            name: name.to_owned(),
            line,
        });
        self.module_depth += 1;
        self.pos += 1;

        if kind != DeclKind::Package {
            self.interface_ports(self.pos);
        }
    }

    /// Look ahead through a module header and record interface-typed ports.
    /// Does not move the scan position.
    fn interface_ports(&mut self, start: usize) {
        let mut j = start;
        loop {
            match self.tok(j) {
                Some(Token::Ident(w)) if w == "import" => {
                    while !matches!(self.tok(j), Some(Token::Punct(';')) | None) {
                        j += 1;
                    }
                    j += 1;
                }
                Some(Token::Punct('#')) if self.tok(j + 1) == Some(&Token::Punct('(')) => {
                    j = self.skip_group(j + 1);
                }
                _ => break,
            }
        }
        if self.tok(j) != Some(&Token::Punct('(')) {
            return;
        }

        let end = self.skip_group(j);
        let mut depth = 0usize;
        let mut at_port_start = true;
        for k in j + 1..end.saturating_sub(1) {
            match self.tok(k) {
                Some(Token::Punct('(' | '[' | '{')) => {
                    depth += 1;
                    at_port_start = false;
                }
                Some(Token::Punct(')' | ']' | '}')) => depth = depth.saturating_sub(1),
                Some(Token::Punct(',')) if depth == 0 => at_port_start = true,
                Some(Token::Ident(ty)) if at_port_start && depth == 0 => {
                    at_port_start = false;
                    if is_keyword(ty) {
                        continue;
                    }
                    let is_interface = match self.tok(k + 1) {
                        Some(Token::Punct('.')) => {
                            self.word(k + 2).is_some() && self.word(k + 3).is_some()
                        }
                        Some(Token::Ident(port)) => !is_keyword(port),
                        _ => false,
                    };
                    if is_interface {
                        push_unique(&mut self.meta.interface_ports, ty);
                    }
                }
                _ => at_port_start = false,
            }
        }
    }

    fn class_decl(&mut self) {
        self.pos += 1;
        if let Some(name) = self.word(self.pos) {
            self.meta.class_decls.push(name.to_owned());
            self.pos += 1;
        }
    }

    fn import_decl(&mut self) {
        self.pos += 1;
        if matches!(self.tok(self.pos), Some(Token::Str(_))) {
            // DPI import
            self.skip_statement();
            return;
        }

        let mut items = Vec::new();
        while let Some(tok) = self.tok(self.pos) {
            match tok {
                Token::Punct(';') => {
                    self.pos += 1;
                    break;
                }
                Token::Ident(pkg) if self.tok(self.pos + 1) == Some(&Token::ColonColon) => {
                    items.push(pkg.clone());
                    self.pos += 2;
                }
                _ => self.pos += 1,
            }
        }
        if !items.is_empty() {
            self.meta.package_imports.push(PackageImport { items });
        }
    }

    fn skip_statement(&mut self) {
        while let Some(tok) = self.tok(self.pos) {
            self.pos += 1;
            if tok == &Token::Punct(';') {
                break;
            }
        }
    }

    /// Recognize `Type [#(...)] name [dims] (` at a module item boundary.
    fn instance(&mut self, ty: &str) {
        let mut j = self.pos + 1;
        if self.tok(j) == Some(&Token::Punct('#')) {
            j += 1;
            if self.tok(j) == Some(&Token::Punct('(')) {
                j = self.skip_group(j);
            } else {
                j += 1;
            }
        }
        match self.word(j) {
            Some(name) if !is_keyword(name) => j += 1,
            _ => {
                self.pos += 1;
                return;
            }
        }
        while self.tok(j) == Some(&Token::Punct('[')) {
            j = self.skip_group(j);
        }
        if self.tok(j) == Some(&Token::Punct('(')) {
            push_unique(&mut self.meta.global_instances, ty);
        }
        self.pos += 1;
    }

    /// Index just past the group opened at `open`.
    fn skip_group(&self, open: usize) -> usize {
        let mut depth = 0usize;
        let mut j = open;
        while let Some(tok) = self.tok(j) {
            match tok {
                Token::Punct('(' | '[' | '{') => depth += 1,
                Token::Punct(')' | ']' | '}') => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return j + 1;
                    }
                }
                _ => {}
            }
            j += 1;
        }
        j
    }
}

fn push_unique(list: &mut Vec<String>, name: &str) {
    if !list.iter().any(|n| n == name) {
        list.push(name.to_owned());
    }
}
