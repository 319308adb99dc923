/*!
# Lexer

Tokenizes the Python-subset source with `logos`, then runs an indentation
pass that turns physical lines into a logical token stream with `Newline`,
`Indent` and `Dedent` tokens. Newlines inside brackets and blank lines are
swallowed; backslash continuations join lines; comments are dropped.
*/

use logos::Logos;

use super::ast::Position;
use crate::core::PoolError;

/// Raw tokens as recognized by logos, before the indentation pass.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\f]+")]
#[logos(skip r"\\\r?\n")]
#[logos(skip r"#[^\n]*")]
pub enum RawTok {
    #[token("\n")]
    #[token("\r\n")]
    Newline,

    // Keywords
    #[token("def")]
    Def,
    #[token("return")]
    Return,
    #[token("if")]
    If,
    #[token("elif")]
    Elif,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("for")]
    For,
    #[token("in")]
    In,
    #[token("not")]
    Not,
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("is")]
    Is,
    #[token("None")]
    NoneLit,
    #[token("True")]
    TrueLit,
    #[token("False")]
    FalseLit,
    #[token("lambda")]
    Lambda,
    #[token("import")]
    Import,
    #[token("from")]
    From,
    #[token("as")]
    As,
    #[token("pass")]
    Pass,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("global")]
    Global,
    #[token("nonlocal")]
    Nonlocal,
    #[token("del")]
    Del,
    #[token("raise")]
    Raise,
    #[token("assert")]
    Assert,
    #[token("async")]
    Async,
    #[token("await")]
    Await,

    // Recognized but unsupported constructs; the grammar reports them with
    // their source span instead of a generic parse error.
    #[token("class")]
    Class,
    #[token("yield")]
    Yield,
    #[token("with")]
    With,
    #[token("try")]
    Try,
    #[token("except")]
    Except,
    #[token("finally")]
    Finally,

    #[regex(r"[\p{L}_][\p{L}\p{N}_]*", |lex| lex.slice().to_string())]
    Ident(String),

    #[regex(r"0[xX][0-9a-fA-F_]+", |lex| decode_radix(lex.slice(), 16))]
    #[regex(r"0[oO][0-7_]+", |lex| decode_radix(lex.slice(), 8))]
    #[regex(r"0[bB][01_]+", |lex| decode_radix(lex.slice(), 2))]
    #[regex(r"[0-9][0-9_]*", |lex| Some(lex.slice().replace('_', "")))]
    Int(String),

    #[regex(r"[0-9][0-9_]*\.[0-9_]*([eE][+-]?[0-9_]+)?", |lex| decode_float(lex.slice()))]
    #[regex(r"\.[0-9][0-9_]*([eE][+-]?[0-9_]+)?", |lex| decode_float(lex.slice()))]
    #[regex(r"[0-9][0-9_]*[eE][+-]?[0-9_]+", |lex| decode_float(lex.slice()))]
    Float(f64),

    #[token("'''", |lex| scan_string(lex, "'''"))]
    #[token("\"\"\"", |lex| scan_string(lex, "\"\"\""))]
    #[token("'", |lex| scan_string(lex, "'"))]
    #[token("\"", |lex| scan_string(lex, "\""))]
    Str(String),

    // f-string prefixes are recognized so they surface as an unsupported
    // construct instead of mis-lexing as an identifier plus a string.
    #[token("f'''")]
    #[token("f\"\"\"")]
    #[token("f'")]
    #[token("f\"")]
    #[token("F'''")]
    #[token("F\"\"\"")]
    #[token("F'")]
    #[token("F\"")]
    FStringStart,

    // Operators and delimiters
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token(".")]
    Dot,
    #[token("->")]
    Arrow,
    #[token("=")]
    Assign,
    #[token("+=")]
    PlusAssign,
    #[token("-=")]
    MinusAssign,
    #[token("*=")]
    StarAssign,
    #[token("/=")]
    SlashAssign,
    #[token("//=")]
    DoubleSlashAssign,
    #[token("%=")]
    PercentAssign,
    #[token("**=")]
    DoubleStarAssign,
    #[token("@=")]
    AtAssign,
    #[token("&=")]
    AmpAssign,
    #[token("|=")]
    PipeAssign,
    #[token("^=")]
    CaretAssign,
    #[token("<<=")]
    LShiftAssign,
    #[token(">>=")]
    RShiftAssign,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("**")]
    DoubleStar,
    #[token("/")]
    Slash,
    #[token("//")]
    DoubleSlash,
    #[token("%")]
    Percent,
    #[token("@")]
    At,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("~")]
    Tilde,
    #[token("<<")]
    LShift,
    #[token(">>")]
    RShift,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    LtE,
    #[token(">")]
    Gt,
    #[token(">=")]
    GtE,
    #[token(":=")]
    Walrus,
}

fn decode_radix(slice: &str, radix: u32) -> Option<String> {
    let digits = slice[2..].replace('_', "");
    u128::from_str_radix(&digits, radix)
        .ok()
        .map(|v| v.to_string())
}

fn decode_float(slice: &str) -> Option<f64> {
    slice.replace('_', "").parse().ok()
}

/// Scan a string literal body after logos matched the opening quote.
/// Consumes up to and including the closing quote, decoding escapes.
fn scan_string(lex: &mut logos::Lexer<RawTok>, quote: &str) -> Option<String> {
    let rest = lex.remainder();
    let triple = quote.len() == 3;
    let quote_char = quote.chars().next().unwrap();
    let mut value = String::new();
    let mut chars = rest.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some((_, esc)) => match esc {
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    'r' => value.push('\r'),
                    '0' => value.push('\0'),
                    '\\' => value.push('\\'),
                    '\'' => value.push('\''),
                    '"' => value.push('"'),
                    '\n' => {}
                    'x' => {
                        let hi = chars.next()?.1;
                        let lo = chars.next()?.1;
                        let code = u32::from_str_radix(&format!("{hi}{lo}"), 16).ok()?;
                        value.push(char::from_u32(code)?);
                    }
                    'u' => {
                        let mut code = String::new();
                        for _ in 0..4 {
                            code.push(chars.next()?.1);
                        }
                        let code = u32::from_str_radix(&code, 16).ok()?;
                        value.push(char::from_u32(code)?);
                    }
                    other => {
                        // Unknown escapes keep the backslash, like CPython.
                        value.push('\\');
                        value.push(other);
                    }
                },
                None => return None,
            }
            continue;
        }
        if c == quote_char {
            if triple {
                if rest[i..].starts_with(quote) {
                    lex.bump(i + quote.len());
                    return Some(value);
                }
                value.push(c);
                continue;
            }
            lex.bump(i + c.len_utf8());
            return Some(value);
        }
        if c == '\n' && !triple {
            return None;
        }
        value.push(c);
    }
    None
}

/// Logical token after the indentation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokKind,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokKind {
    Raw(RawTok),
    Indent,
    Dedent,
    Eof,
}

/// Tokenize `source` into a logical token stream.
///
/// Indentation is measured in characters from the line start, so files must
/// indent consistently (spaces recommended). Inconsistent dedents are
/// malformed input.
pub fn tokenize(source: &str) -> Result<Vec<Token>, PoolError> {
    let line_starts = compute_line_starts(source);
    let mut tokens: Vec<Token> = Vec::new();
    let mut indent_stack: Vec<usize> = vec![0];
    let mut bracket_depth: usize = 0;
    let mut line_has_tokens = false;

    let mut lexer = RawTok::lexer(source);
    while let Some(item) = lexer.next() {
        let span = lexer.span();
        let pos = position_at(&line_starts, source, span.start);
        let raw = match item {
            Ok(raw) => raw,
            Err(()) => {
                return Err(PoolError::MalformedInput {
                    line: pos.line,
                    column: pos.column,
                    message: format!("unexpected character {:?}", lexer.slice()),
                });
            }
        };

        if matches!(raw, RawTok::FStringStart) {
            return Err(PoolError::UnsupportedConstruct {
                construct: "f-strings".to_string(),
                line: pos.line,
                column: pos.column,
            });
        }

        match raw {
            RawTok::Newline => {
                if bracket_depth == 0 && line_has_tokens {
                    tokens.push(Token {
                        kind: TokKind::Raw(RawTok::Newline),
                        pos,
                    });
                    line_has_tokens = false;
                }
            }
            _ => {
                if bracket_depth == 0 && !line_has_tokens {
                    adjust_indent(&mut tokens, &mut indent_stack, pos)?;
                }
                line_has_tokens = true;
                match raw {
                    RawTok::LParen | RawTok::LBracket | RawTok::LBrace => bracket_depth += 1,
                    RawTok::RParen | RawTok::RBracket | RawTok::RBrace => {
                        bracket_depth = bracket_depth.saturating_sub(1)
                    }
                    _ => {}
                }
                tokens.push(Token {
                    kind: TokKind::Raw(raw),
                    pos,
                });
            }
        }
    }

    let end = position_at(&line_starts, source, source.len());
    if line_has_tokens {
        tokens.push(Token {
            kind: TokKind::Raw(RawTok::Newline),
            pos: end,
        });
    }
    while indent_stack.len() > 1 {
        indent_stack.pop();
        tokens.push(Token {
            kind: TokKind::Dedent,
            pos: end,
        });
    }
    tokens.push(Token {
        kind: TokKind::Eof,
        pos: end,
    });
    Ok(tokens)
}

fn adjust_indent(
    tokens: &mut Vec<Token>,
    indent_stack: &mut Vec<usize>,
    pos: Position,
) -> Result<(), PoolError> {
    let level = pos.column;
    let current = *indent_stack.last().unwrap();
    if level > current {
        indent_stack.push(level);
        tokens.push(Token {
            kind: TokKind::Indent,
            pos,
        });
    } else if level < current {
        while *indent_stack.last().unwrap() > level {
            indent_stack.pop();
            tokens.push(Token {
                kind: TokKind::Dedent,
                pos,
            });
        }
        if *indent_stack.last().unwrap() != level {
            return Err(PoolError::MalformedInput {
                line: pos.line,
                column: pos.column,
                message: "unindent does not match any outer indentation level".to_string(),
            });
        }
    }
    Ok(())
}

fn compute_line_starts(source: &str) -> Vec<usize> {
    let mut starts = vec![0];
    for (i, b) in source.bytes().enumerate() {
        if b == b'\n' {
            starts.push(i + 1);
        }
    }
    starts
}

fn position_at(line_starts: &[usize], source: &str, offset: usize) -> Position {
    let line_idx = match line_starts.binary_search(&offset) {
        Ok(i) => i,
        Err(i) => i - 1,
    };
    let column = source[line_starts[line_idx]..offset].chars().count();
    Position::new(line_idx + 1, column)
}
