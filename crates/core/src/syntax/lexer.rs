use crate::error::SyntaxDiagnostic;
use crate::syntax::preprocess::MacroDef;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identifiers and keywords, distinguished by the scanner.
    /// Escaped identifiers are stored without their leading backslash.
    Ident(String),
    /// `$name` system identifiers
    System(String),
    /// String literal, kept verbatim including its delimiters
    Str(String),
    /// Any numeric literal, kept as written
    Number(String),
    /// A compiler directive or macro usage, without the backtick
    Directive(String),
    /// A complete `` `define `` with its captured definition
    Define(MacroDef),
    ColonColon,
    Punct(char),
    // End of input
    Eof,
}

#[derive(Debug, Clone)]
pub struct Spanned {
    pub token: Token,
    pub line: u32,
}

/// Directives whose arguments run to the end of the line and carry nothing
/// the loader needs.
const LINE_DIRECTIVES: &[&str] = &[
    "timescale",
    "include",
    "line",
    "pragma",
    "default_nettype",
    "begin_keywords",
    "unconnected_drive",
];

pub fn lex(src: &str, filename: &str) -> Result<Vec<Spanned>, SyntaxDiagnostic> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = src.chars().collect();
    let mut pos = 0usize;
    let mut line: u32 = 1;

    while pos < chars.len() {
        let c = chars[pos];

        // Line comment
        if c == '/' && pos + 1 < chars.len() && chars[pos + 1] == '/' {
            while pos < chars.len() && chars[pos] != '\n' {
                pos += 1;
            }
            continue;
        }

        // Block comment
        if c == '/' && pos + 1 < chars.len() && chars[pos + 1] == '*' {
            let start_line = line;
            pos += 2;
            loop {
                if pos >= chars.len() {
                    return Err(SyntaxDiagnostic::new(
                        filename,
                        start_line,
                        "unterminated block comment",
                    ));
                }
                if chars[pos] == '\n' {
                    line += 1;
                }
                if chars[pos] == '*' && pos + 1 < chars.len() && chars[pos + 1] == '/' {
                    pos += 2;
                    break;
                }
                pos += 1;
            }
            continue;
        }

        if c.is_whitespace() {
            if c == '\n' {
                line += 1;
            }
            pos += 1;
            continue;
        }

        let tok_line = line;

        // String literal
        if c == '"' {
            let start = pos;
            pos += 1;
            loop {
                if pos >= chars.len() || chars[pos] == '\n' {
                    return Err(SyntaxDiagnostic::new(
                        filename,
                        tok_line,
                        "unterminated string literal",
                    ));
                }
                match chars[pos] {
                    '"' => {
                        pos += 1;
                        break;
                    }
                    '\\' if pos + 1 < chars.len() => {
                        if chars[pos + 1] == '\n' {
                            line += 1;
                        }
                        pos += 2;
                    }
                    _ => pos += 1,
                }
            }
            tokens.push(Spanned {
                token: Token::Str(chars[start..pos].iter().collect()),
                line: tok_line,
            });
            continue;
        }

        // Directive or macro usage
        if c == '`' {
            pos += 1;
            let start = pos;
            while pos < chars.len() && is_ident_char(chars[pos]) {
                pos += 1;
            }
            let name: String = chars[start..pos].iter().collect();
            if name.is_empty() {
                // Token pasting and stringification only matter inside
                // macro bodies, which are expanded elsewhere.
                pos += 1;
                continue;
            }
            if name == "define" {
                let def = lex_define(&chars, &mut pos, &mut line, filename, tok_line)?;
                tokens.push(Spanned {
                    token: Token::Define(def),
                    line: tok_line,
                });
                continue;
            }
            if LINE_DIRECTIVES.contains(&name.as_str()) {
                while pos < chars.len() && chars[pos] != '\n' {
                    pos += 1;
                }
            }
            tokens.push(Spanned {
                token: Token::Directive(name),
                line: tok_line,
            });
            continue;
        }

        // Identifier or keyword
        if c.is_ascii_alphabetic() || c == '_' {
            let start = pos;
            while pos < chars.len() && is_ident_char(chars[pos]) {
                pos += 1;
            }
            tokens.push(Spanned {
                token: Token::Ident(chars[start..pos].iter().collect()),
                line: tok_line,
            });
            continue;
        }

        // Escaped identifier
        if c == '\\' {
            pos += 1;
            let start = pos;
            while pos < chars.len() && !chars[pos].is_whitespace() {
                pos += 1;
            }
            tokens.push(Spanned {
                token: Token::Ident(chars[start..pos].iter().collect()),
                line: tok_line,
            });
            continue;
        }

        // System identifier
        if c == '$' && pos + 1 < chars.len() && is_ident_char(chars[pos + 1]) {
            let start = pos;
            pos += 1;
            while pos < chars.len() && is_ident_char(chars[pos]) {
                pos += 1;
            }
            tokens.push(Spanned {
                token: Token::System(chars[start..pos].iter().collect()),
                line: tok_line,
            });
            continue;
        }

        // Numbers, including sized and based literals like 8'hFF and '0
        let based_start =
            c == '\'' && pos + 1 < chars.len() && chars[pos + 1].is_ascii_alphanumeric();
        if c.is_ascii_digit() || based_start {
            let start = pos;
            if based_start {
                pos += 1;
            }
            while pos < chars.len()
                && (chars[pos].is_ascii_alphanumeric() || matches!(chars[pos], '_' | '.' | '?'))
            {
                pos += 1;
            }
            if !based_start
                && pos + 1 < chars.len()
                && chars[pos] == '\''
                && chars[pos + 1].is_ascii_alphanumeric()
            {
                pos += 1;
                while pos < chars.len()
                    && (chars[pos].is_ascii_alphanumeric() || matches!(chars[pos], '_' | '?'))
                {
                    pos += 1;
                }
            }
            tokens.push(Spanned {
                token: Token::Number(chars[start..pos].iter().collect()),
                line: tok_line,
            });
            continue;
        }

        if c == ':' && pos + 1 < chars.len() && chars[pos + 1] == ':' {
            tokens.push(Spanned {
                token: Token::ColonColon,
                line: tok_line,
            });
            pos += 2;
            continue;
        }

        tokens.push(Spanned {
            token: Token::Punct(c),
            line: tok_line,
        });
        pos += 1;
    }

    tokens.push(Spanned {
        token: Token::Eof,
        line,
    });
    Ok(tokens)
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// Capture a macro definition: `` `define NAME[(formals)] body ``, where the
/// body runs to the end of the line and `\` continues it onto the next.
fn lex_define(
    chars: &[char],
    pos: &mut usize,
    line: &mut u32,
    filename: &str,
    tok_line: u32,
) -> Result<MacroDef, SyntaxDiagnostic> {
    while *pos < chars.len() && matches!(chars[*pos], ' ' | '\t') {
        *pos += 1;
    }
    let start = *pos;
    while *pos < chars.len() && is_ident_char(chars[*pos]) {
        *pos += 1;
    }
    let name: String = chars[start..*pos].iter().collect();
    if name.is_empty() {
        return Err(SyntaxDiagnostic::new(
            filename,
            tok_line,
            "expected macro name after `define",
        ));
    }

    let mut params = None;
    if *pos < chars.len() && chars[*pos] == '(' {
        *pos += 1;
        let start = *pos;
        while *pos < chars.len() && chars[*pos] != ')' {
            if chars[*pos] == '\n' {
                *line += 1;
            }
            *pos += 1;
        }
        if *pos >= chars.len() {
            return Err(SyntaxDiagnostic::new(
                filename,
                tok_line,
                format!("unterminated parameter list for macro '{}'", name),
            ));
        }
        let formals: String = chars[start..*pos].iter().collect();
        *pos += 1;
        params = Some(
            formals
                .split(',')
                .map(|p| p.split('=').next().unwrap_or("").trim().to_owned())
                .filter(|p| !p.is_empty())
                .collect(),
        );
    }

    let mut body = String::new();
    while *pos < chars.len() {
        let c = chars[*pos];
        if c == '\\' && *pos + 1 < chars.len() && chars[*pos + 1] == '\n' {
            body.push('\n');
            *line += 1;
            *pos += 2;
            continue;
        }
        if c == '\n' {
            break;
        }
        if c == '/' && *pos + 1 < chars.len() && chars[*pos + 1] == '/' {
            while *pos < chars.len() && chars[*pos] != '\n' {
                *pos += 1;
            }
            break;
        }
        body.push(c);
        *pos += 1;
    }

    Ok(MacroDef {
        name,
        params,
        body: body.trim().to_owned(),
    })
}
