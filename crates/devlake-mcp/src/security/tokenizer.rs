//! Token stream for the query validator, built on the `sqlparser` MySQL lexer.
//!
//! Tokenizing never fails. An unterminated string, quoted identifier or
//! block comment yields a trailing token with `terminated == false`, and so
//! does any input the lexer refuses. The validator decides what to do with it.

use sqlparser::dialect::MySqlDialect;
use sqlparser::tokenizer::{Location, Token as SqlToken, Tokenizer, Whitespace};

/// Lexical class of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Bare identifier or keyword
    Word,
    /// Backtick-quoted identifier
    QuotedIdentifier,
    /// Single- or double-quoted string literal
    String,
    Number,
    /// `@user_var` or `@@system_var`
    Variable,
    Operator,
    LParen,
    RParen,
    Comma,
    Dot,
    Semicolon,
    /// `-- ` or `#` comment running to end of line
    LineComment,
    /// `/* ... */` comment
    BlockComment,
    /// MySQL `/*! ... */` comment, which the server executes as code
    ExecutableComment,
    /// Input the lexer could not split
    Unrecognized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub offset: usize,
    pub terminated: bool,
}

impl Token<'_> {
    /// Plain comments; executable comments are code and do not count.
    #[must_use]
    pub const fn is_comment(&self) -> bool {
        matches!(self.kind, TokenKind::LineComment | TokenKind::BlockComment)
    }

    #[must_use]
    pub const fn is_literal(&self) -> bool {
        matches!(self.kind, TokenKind::String | TokenKind::Number)
    }

    #[must_use]
    pub fn is_word(&self, word: &str) -> bool {
        self.kind == TokenKind::Word && self.text.eq_ignore_ascii_case(word)
    }

    #[must_use]
    pub const fn end(&self) -> usize {
        self.offset + self.text.len()
    }
}

/// Split `sql` into tokens, skipping whitespace.
pub fn tokenize(sql: &str) -> Vec<Token<'_>> {
    let Some((cut, kind)) = find_unterminated(sql) else {
        return lex(sql);
    };

    let mut tokens = lex(&sql[..cut]);
    tokens.push(Token {
        kind,
        text: &sql[cut..],
        offset: cut,
        terminated: false,
    });
    tokens
}

/// Run the MySQL lexer over `sql`; input it refuses becomes one
/// unterminated [`TokenKind::Unrecognized`] tail.
fn lex(sql: &str) -> Vec<Token<'_>> {
    let dialect = MySqlDialect {};
    let spanned = match Tokenizer::new(&dialect, sql).tokenize_with_location() {
        Ok(spanned) => spanned,
        Err(e) => {
            let lines = LineIndex::new(sql);
            let offset = lines.offset(e.location).min(sql.len());
            // The prefix is strictly shorter, so this terminates.
            let mut tokens = if offset < sql.len() {
                lex(&sql[..offset])
            } else {
                Vec::new()
            };
            let start = if offset < sql.len() { offset } else { 0 };
            tokens.push(Token {
                kind: TokenKind::Unrecognized,
                text: &sql[start..],
                offset: start,
                terminated: false,
            });
            return tokens;
        }
    };

    let lines = LineIndex::new(sql);
    spanned
        .into_iter()
        .filter_map(|spanned| {
            let start = lines.offset(spanned.span.start);
            let end = lines.offset(spanned.span.end).max(start);
            let text = sql.get(start..end)?;
            let kind = classify(&spanned.token, text)?;
            Some(Token {
                kind,
                text,
                offset: start,
                terminated: true,
            })
        })
        .collect()
}

/// Map a lexer token onto the validator's classes; `None` for whitespace.
fn classify(token: &SqlToken, text: &str) -> Option<TokenKind> {
    let kind = match token {
        SqlToken::EOF => return None,
        SqlToken::Whitespace(Whitespace::SingleLineComment { .. }) => TokenKind::LineComment,
        SqlToken::Whitespace(Whitespace::MultiLineComment(body)) if body.starts_with('!') => {
            TokenKind::ExecutableComment
        }
        SqlToken::Whitespace(Whitespace::MultiLineComment(_)) => TokenKind::BlockComment,
        SqlToken::Whitespace(_) => return None,
        SqlToken::Word(word) if word.quote_style.is_some() => TokenKind::QuotedIdentifier,
        SqlToken::Word(_) if text.starts_with('@') => TokenKind::Variable,
        SqlToken::Word(_) => TokenKind::Word,
        SqlToken::Number(..) => TokenKind::Number,
        SqlToken::SingleQuotedString(_)
        | SqlToken::DoubleQuotedString(_)
        | SqlToken::NationalStringLiteral(_)
        | SqlToken::EscapedStringLiteral(_)
        | SqlToken::HexStringLiteral(_)
        | SqlToken::SingleQuotedByteStringLiteral(_)
        | SqlToken::DoubleQuotedByteStringLiteral(_) => TokenKind::String,
        SqlToken::LParen => TokenKind::LParen,
        SqlToken::RParen => TokenKind::RParen,
        SqlToken::Comma => TokenKind::Comma,
        SqlToken::Period => TokenKind::Dot,
        SqlToken::SemiColon => TokenKind::Semicolon,
        _ => TokenKind::Operator,
    };
    Some(kind)
}

/// Byte offsets of line starts, for turning lexer locations into offsets
struct LineIndex<'a> {
    sql: &'a str,
    starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    fn new(sql: &'a str) -> Self {
        let starts = std::iter::once(0)
            .chain(sql.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { sql, starts }
    }

    /// Lines and columns are 1-based and columns count characters.
    fn offset(&self, location: Location) -> usize {
        let line = usize::try_from(location.line.saturating_sub(1)).unwrap_or(usize::MAX);
        let Some(&start) = self.starts.get(line) else {
            return self.sql.len();
        };
        let column = usize::try_from(location.column.saturating_sub(1)).unwrap_or(usize::MAX);
        self.sql[start..]
            .char_indices()
            .nth(column)
            .map_or(self.sql.len(), |(i, _)| start + i)
    }
}

/// Offset and class of a quote or block comment that never closes.
///
/// Tracks only quoting and comment state; everything else is left to the
/// lexer.
fn find_unterminated(sql: &str) -> Option<(usize, TokenKind)> {
    let bytes = sql.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let start = i;
        match bytes[i] {
            quote @ (b'\'' | b'"' | b'`') => {
                let escapes = quote != b'`';
                i += 1;
                loop {
                    match bytes.get(i) {
                        None => {
                            let kind = if escapes {
                                TokenKind::String
                            } else {
                                TokenKind::QuotedIdentifier
                            };
                            return Some((start, kind));
                        }
                        Some(b'\\') if escapes => i += 2,
                        Some(&b) if b == quote => {
                            i += 1;
                            if bytes.get(i) != Some(&quote) {
                                break;
                            }
                            i += 1;
                        }
                        Some(_) => i += 1,
                    }
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => match sql[i + 2..].find("*/") {
                Some(close) => i += close + 4,
                None => return Some((start, TokenKind::BlockComment)),
            },
            b'#' => i = skip_line(sql, i),
            b'-' if bytes.get(i + 1) == Some(&b'-')
                && bytes.get(i + 2).is_none_or(u8::is_ascii_whitespace) =>
            {
                i = skip_line(sql, i);
            }
            _ => i += 1,
        }
    }
    None
}

fn skip_line(sql: &str, from: usize) -> usize {
    sql[from..].find('\n').map_or(sql.len(), |n| from + n + 1)
}
