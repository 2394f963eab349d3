//! Macro definitions, conditional compilation and macro expansion over a
//! token stream.

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::SyntaxDiagnostic;
use crate::syntax::lexer::{self, Spanned, Token};

const MAX_EXPANSION_DEPTH: usize = 32;

/// Directives that take no arguments and have no effect on the loader.
const IGNORED_DIRECTIVES: &[&str] = &[
    "resetall",
    "celldefine",
    "endcelldefine",
    "nounconnected_drive",
    "end_keywords",
    "timescale",
    "include",
    "line",
    "pragma",
    "default_nettype",
    "begin_keywords",
    "unconnected_drive",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MacroDef {
    pub name: String,
    /// Formal argument names for function-like macros.
    pub params: Option<Vec<String>>,
    pub body: String,
}

/// Parse a command-line style predefine, `NAME` or `NAME=value`.
pub fn parse_predefine(spec: &str) -> Option<MacroDef> {
    let (name, body) = match spec.split_once('=') {
        Some((name, body)) => (name.trim(), body.trim()),
        None => (spec.trim(), ""),
    };
    if name.is_empty() {
        return None;
    }
    Some(MacroDef {
        name: name.to_owned(),
        params: None,
        body: body.to_owned(),
    })
}

struct Condition {
    parent_active: bool,
    active: bool,
    taken: bool,
}

pub struct Preprocessor {
    macros: IndexMap<String, MacroDef>,
    conditions: Vec<Condition>,
    undefined: Vec<String>,
    diagnostics: Vec<SyntaxDiagnostic>,
}

impl Preprocessor {
    pub fn new(initial: impl IntoIterator<Item = MacroDef>) -> Self {
        Preprocessor {
            macros: initial
                .into_iter()
                .map(|def| (def.name.clone(), def))
                .collect(),
            conditions: Vec::new(),
            undefined: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    /// Preprocess one file's tokens. Macro state carries over to the next
    /// call; conditional state does not.
    pub fn run(&mut self, tokens: Vec<Spanned>, filename: &str) -> Vec<Spanned> {
        let mut out = Vec::with_capacity(tokens.len());
        self.process(tokens, filename, 0, &mut out);
        if !self.conditions.is_empty() {
            let line = out.last().map_or(1, |t| t.line);
            self.diagnostics.push(SyntaxDiagnostic::new(
                filename,
                line,
                "missing `endif",
            ));
            self.conditions.clear();
        }
        out
    }

    /// Final macro table, names that were used but never defined, and
    /// diagnostics.
    pub fn finish(self) -> (Vec<MacroDef>, Vec<String>, Vec<SyntaxDiagnostic>) {
        (
            self.macros.into_values().collect(),
            self.undefined,
            self.diagnostics,
        )
    }

    fn active(&self) -> bool {
        self.conditions.last().map_or(true, |c| c.active)
    }

    fn process(
        &mut self,
        tokens: Vec<Spanned>,
        filename: &str,
        depth: usize,
        out: &mut Vec<Spanned>,
    ) {
        let mut i = 0;
        while i < tokens.len() {
            let line = tokens[i].line;
            match &tokens[i].token {
                Token::Eof => i += 1,
                Token::Define(def) => {
                    if self.active() {
                        self.macros.insert(def.name.clone(), def.clone());
                    }
                    i += 1;
                }
                Token::Directive(name) => {
                    let name = name.clone();
                    i += 1;
                    match name.as_str() {
                        "ifdef" | "ifndef" => {
                            let defined =
                                self.condition_target(&tokens, &mut i, filename, line, &name);
                            let parent_active = self.active();
                            let cond = defined == Some(name == "ifdef");
                            self.conditions.push(Condition {
                                parent_active,
                                active: parent_active && cond,
                                taken: cond,
                            });
                        }
                        "elsif" => {
                            let defined =
                                self.condition_target(&tokens, &mut i, filename, line, &name);
                            match self.conditions.last_mut() {
                                Some(c) if c.taken => c.active = false,
                                Some(c) => {
                                    let cond = defined == Some(true);
                                    c.active = c.parent_active && cond;
                                    c.taken = cond;
                                }
                                None => self.unexpected(filename, line, &name),
                            }
                        }
                        "else" => match self.conditions.last_mut() {
                            Some(c) => {
                                c.active = c.parent_active && !c.taken;
                                c.taken = true;
                            }
                            None => self.unexpected(filename, line, &name),
                        },
                        "endif" => {
                            if self.conditions.pop().is_none() {
                                self.unexpected(filename, line, &name);
                            }
                        }
                        _ if !self.active() => {}
                        "undef" => {
                            if let Some(target) = ident_at(&tokens, i) {
                                self.macros.shift_remove(target);
                                i += 1;
                            }
                        }
                        "undefineall" => self.macros.clear(),
                        "__FILE__" => out.push(Spanned {
                            token: Token::Str(format!("\"{}\"", filename)),
                            line,
                        }),
                        "__LINE__" => out.push(Spanned {
                            token: Token::Number(line.to_string()),
                            line,
                        }),
                        n if IGNORED_DIRECTIVES.contains(&n) => {}
                        _ => self.expand(&name, &tokens, &mut i, line, filename, depth, out),
                    }
                }
                _ => {
                    if self.active() {
                        out.push(tokens[i].clone());
                    }
                    i += 1;
                }
            }
        }
    }

    /// Read the macro name after a conditional directive and report whether
    /// it is defined.
    fn condition_target(
        &mut self,
        tokens: &[Spanned],
        i: &mut usize,
        filename: &str,
        line: u32,
        directive: &str,
    ) -> Option<bool> {
        match ident_at(tokens, *i) {
            Some(target) => {
                *i += 1;
                Some(self.is_defined(target))
            }
            None => {
                self.diagnostics.push(SyntaxDiagnostic::new(
                    filename,
                    line,
                    format!("expected macro name after `{}", directive),
                ));
                None
            }
        }
    }

    fn unexpected(&mut self, filename: &str, line: u32, directive: &str) {
        self.diagnostics.push(SyntaxDiagnostic::new(
            filename,
            line,
            format!("unexpected `{}", directive),
        ));
    }

    #[allow(clippy::too_many_arguments)]
    fn expand(
        &mut self,
        name: &str,
        tokens: &[Spanned],
        i: &mut usize,
        line: u32,
        filename: &str,
        depth: usize,
        out: &mut Vec<Spanned>,
    ) {
        let Some(def) = self.macros.get(name).cloned() else {
            if !self.undefined.iter().any(|n| n == name) {
                self.undefined.push(name.to_owned());
            }
            self.diagnostics.push(SyntaxDiagnostic::new(
                filename,
                line,
                format!("unknown macro or compiler directive '`{}'", name),
            ));
            return;
        };

        let args = match &def.params {
            Some(_) => match collect_args(tokens, i) {
                Some(args) => args,
                None => {
                    self.diagnostics.push(SyntaxDiagnostic::new(
                        filename,
                        line,
                        format!("expected argument list for macro '{}'", name),
                    ));
                    return;
                }
            },
            None => Vec::new(),
        };

        if depth >= MAX_EXPANSION_DEPTH {
            self.diagnostics.push(SyntaxDiagnostic::new(
                filename,
                line,
                format!("expansion of macro '{}' is nested too deeply", name),
            ));
            return;
        }

        let body = match lexer::lex(&def.body, filename) {
            Ok(body) => body,
            Err(diag) => {
                self.diagnostics.push(diag);
                return;
            }
        };

        let formals = def.params.as_deref().unwrap_or(&[]);
        let mut expanded = Vec::with_capacity(body.len());
        for tok in body {
            let formal = match &tok.token {
                Token::Eof => continue,
                Token::Ident(id) => formals.iter().position(|f| f == id),
                _ => None,
            };
            match formal {
                Some(k) => expanded.extend(args.get(k).into_iter().flatten().map(|a| Spanned {
                    token: a.token.clone(),
                    line,
                })),
                None => expanded.push(Spanned {
                    token: tok.token,
                    line,
                }),
            }
        }
        self.process(expanded, filename, depth + 1, out);
    }
}

fn ident_at(tokens: &[Spanned], i: usize) -> Option<&str> {
    match tokens.get(i).map(|t| &t.token) {
        Some(Token::Ident(name)) => Some(name),
        _ => None,
    }
}

/// Collect the actual arguments of a function-like macro usage, splitting on
/// top-level commas. `i` is left after the closing parenthesis.
fn collect_args(tokens: &[Spanned], i: &mut usize) -> Option<Vec<Vec<Spanned>>> {
    if !matches!(tokens.get(*i).map(|t| &t.token), Some(Token::Punct('('))) {
        return None;
    }
    let mut j = *i + 1;
    let mut depth = 0usize;
    let mut args = vec![Vec::new()];
    while let Some(tok) = tokens.get(j) {
        match tok.token {
            Token::Punct('(' | '[' | '{') => depth += 1,
            Token::Punct(')') if depth == 0 => {
                *i = j + 1;
                return Some(args);
            }
            Token::Punct(')' | ']' | '}') => depth = depth.saturating_sub(1),
            Token::Punct(',') if depth == 0 => {
                args.push(Vec::new());
                j += 1;
                continue;
            }
            Token::Eof => return None,
            _ => {}
        }
        if let Some(current) = args.last_mut() {
            current.push(tok.clone());
        }
        j += 1;
    }
    None
}
