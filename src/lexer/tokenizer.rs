use super::token::{Span, Token, TokenKind};
use crate::utils::errors::{Diagnostic, DiagnosticSeverity};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexerError {
    #[error("tabs are not allowed for indentation (line {line}, column {column})")]
    TabsNotAllowed {
        line: usize,
        column: usize,
        span: Span,
    },
    #[error("indentation mismatch: expected {expected} spaces, found {found} (line {line})")]
    IndentationMismatch {
        line: usize,
        expected: usize,
        found: usize,
        span: Span,
    },
    #[error("unterminated string literal (line {line}, column {column})")]
    UnterminatedString {
        line: usize,
        column: usize,
        span: Span,
    },
    #[error("unexpected character `{ch}` (line {line}, column {column})")]
    UnexpectedCharacter {
        ch: char,
        line: usize,
        column: usize,
        span: Span,
    },
    #[error("unmatched closing `{ch}` (line {line}, column {column})")]
    UnmatchedDelimiter {
        ch: char,
        line: usize,
        column: usize,
        span: Span,
    },
    #[error("`{ch}` opened on line {line} is never closed")]
    UnclosedDelimiter { ch: char, line: usize, span: Span },
}

impl LexerError {
    pub fn span(&self) -> Span {
        match self {
            LexerError::TabsNotAllowed { span, .. }
            | LexerError::IndentationMismatch { span, .. }
            | LexerError::UnterminatedString { span, .. }
            | LexerError::UnexpectedCharacter { span, .. }
            | LexerError::UnmatchedDelimiter { span, .. }
            | LexerError::UnclosedDelimiter { span, .. } => *span,
        }
    }

    pub fn to_diagnostic(&self, source_id: &str) -> Diagnostic {
        Diagnostic::new(
            DiagnosticSeverity::Error,
            source_id,
            self.span(),
            self.to_string(),
        )
    }
}

pub type LexResult<T> = Result<T, Vec<LexerError>>;

pub fn tokenize(source: &str) -> LexResult<Vec<Token>> {
    Lexer::new(source).run()
}

/// A triple-quoted string whose closing quotes are on a later line.
struct OpenString {
    quote: u8,
    raw: bool,
    format: bool,
    start: usize,
    line: usize,
    column: usize,
    text: String,
}

struct Lexer<'src> {
    source: &'src str,
    tokens: Vec<Token>,
    errors: Vec<LexerError>,
    indent_stack: Vec<usize>,
    /// Open brackets with their line numbers; newlines inside brackets are not significant.
    delimiters: Vec<(u8, usize, Span)>,
    open_string: Option<OpenString>,
    continuation: bool,
    line_open: bool,
}

impl<'src> Lexer<'src> {
    fn new(source: &'src str) -> Self {
        Self {
            source,
            tokens: Vec::new(),
            errors: Vec::new(),
            indent_stack: vec![0],
            delimiters: Vec::new(),
            open_string: None,
            continuation: false,
            line_open: false,
        }
    }

    fn run(mut self) -> LexResult<Vec<Token>> {
        let mut offset = 0usize;
        for (line_idx, chunk) in self.source.split_inclusive('\n').enumerate() {
            let line = chunk.strip_suffix('\n').unwrap_or(chunk);
            let line = line.strip_suffix('\r').unwrap_or(line);
            self.lex_line(line, line_idx + 1, offset);
            offset += chunk.len();
        }
        self.finish(offset)
    }

    fn push(&mut self, kind: TokenKind, span: Span) {
        if !matches!(
            kind,
            TokenKind::Newline | TokenKind::Indent | TokenKind::Dedent
        ) {
            self.line_open = true;
        }
        self.tokens.push(Token::new(kind, span));
    }

    fn lex_line(&mut self, line: &str, line_number: usize, line_offset: usize) {
        let mut start = 0usize;
        let joined = !self.delimiters.is_empty() || std::mem::take(&mut self.continuation);

        if let Some(mut open) = self.open_string.take() {
            match find_closing(line.as_bytes(), 0, open.quote, true) {
                Some(close) => {
                    open.text.push_str(&line[..close]);
                    self.push_string(open, line_offset + close + 3);
                    start = close + 3;
                }
                None => {
                    open.text.push_str(line);
                    open.text.push('\n');
                    self.open_string = Some(open);
                    return;
                }
            }
        } else if !joined {
            let (indent_end, indent_width) = self.measure_indent(line, line_number, line_offset);
            let rest = &line[indent_end..];
            if rest.trim().is_empty() || rest.starts_with('#') {
                return;
            }
            self.apply_indent(indent_width, line_number, line_offset);
            start = indent_end;
        }

        self.scan(line, start, line_number, line_offset);

        if self.delimiters.is_empty()
            && !self.continuation
            && self.open_string.is_none()
            && self.line_open
        {
            let span = Span::new(line_offset + line.len(), line_offset + line.len() + 1);
            self.push(TokenKind::Newline, span);
            self.line_open = false;
        }
    }

    fn measure_indent(&mut self, line: &str, line_number: usize, line_offset: usize) -> (usize, usize) {
        let bytes = line.as_bytes();
        let mut idx = 0usize;
        let mut width = 0usize;
        while idx < bytes.len() {
            match bytes[idx] {
                b' ' => {
                    width += 1;
                    idx += 1;
                }
                b'\t' => {
                    // Tab-only lines are blank and never reach the indentation stack.
                    if !line[idx..].trim().is_empty() {
                        self.errors.push(LexerError::TabsNotAllowed {
                            line: line_number,
                            column: idx + 1,
                            span: Span::new(line_offset + idx, line_offset + idx + 1),
                        });
                    }
                    idx += 1;
                }
                _ => break,
            }
        }
        (idx, width)
    }

    fn apply_indent(&mut self, current: usize, line_number: usize, line_offset: usize) {
        let last = self.indent_stack.last().copied().unwrap_or(0);

        if current > last {
            self.indent_stack.push(current);
            let span = Span::new(line_offset + last, line_offset + current);
            self.push(TokenKind::Indent, span);
        } else if current < last {
            while self.indent_stack.len() > 1
                && current < self.indent_stack.last().copied().unwrap_or(0)
            {
                let top = self.indent_stack.pop().unwrap_or(0);
                let span = Span::new(line_offset + current, line_offset + top);
                self.push(TokenKind::Dedent, span);
            }
            let expected = self.indent_stack.last().copied().unwrap_or(0);
            if current != expected {
                self.errors.push(LexerError::IndentationMismatch {
                    line: line_number,
                    expected,
                    found: current,
                    span: Span::new(line_offset + current, line_offset + current + 1),
                });
            }
        }
    }

    fn scan(&mut self, line: &str, from: usize, line_number: usize, line_offset: usize) {
        let bytes = line.as_bytes();
        let mut i = from;

        while i < bytes.len() {
            let ch = bytes[i];
            let absolute = line_offset + i;
            let column = i + 1;
            let next = bytes.get(i + 1).copied();
            let single = Span::new(absolute, absolute + 1);
            let double = Span::new(absolute, absolute + 2);

            match ch {
                b' ' | b'\t' => i += 1,
                b'#' => break,
                b'\\' if line[i + 1..].trim().is_empty() => {
                    self.continuation = true;
                    break;
                }
                b'(' | b'[' | b'{' => {
                    self.delimiters.push((ch, line_number, single));
                    let kind = match ch {
                        b'(' => TokenKind::LParen,
                        b'[' => TokenKind::LBracket,
                        _ => TokenKind::LBrace,
                    };
                    self.push(kind, single);
                    i += 1;
                }
                b')' | b']' | b'}' => {
                    if self.delimiters.pop().is_none() {
                        self.errors.push(LexerError::UnmatchedDelimiter {
                            ch: ch as char,
                            line: line_number,
                            column,
                            span: single,
                        });
                    }
                    let kind = match ch {
                        b')' => TokenKind::RParen,
                        b']' => TokenKind::RBracket,
                        _ => TokenKind::RBrace,
                    };
                    self.push(kind, single);
                    i += 1;
                }
                b',' => {
                    self.push(TokenKind::Comma, single);
                    i += 1;
                }
                b':' => {
                    self.push(TokenKind::Colon, single);
                    i += 1;
                }
                b'.' if next.is_some_and(|n| n.is_ascii_digit()) => {
                    i = self.lex_number(line, i, line_offset);
                }
                b'.' => {
                    self.push(TokenKind::Dot, single);
                    i += 1;
                }
                b'-' if next == Some(b'>') => {
                    self.push(TokenKind::Arrow, double);
                    i += 2;
                }
                b'-' if next == Some(b'=') => {
                    self.push(TokenKind::MinusEq, double);
                    i += 2;
                }
                b'-' => {
                    self.push(TokenKind::Minus, single);
                    i += 1;
                }
                b'+' if next == Some(b'=') => {
                    self.push(TokenKind::PlusEq, double);
                    i += 2;
                }
                b'+' => {
                    self.push(TokenKind::Plus, single);
                    i += 1;
                }
                b'*' if next == Some(b'*') => {
                    self.push(TokenKind::DoubleStar, double);
                    i += 2;
                }
                b'*' if next == Some(b'=') => {
                    self.push(TokenKind::StarEq, double);
                    i += 2;
                }
                b'*' => {
                    self.push(TokenKind::Star, single);
                    i += 1;
                }
                b'/' if next == Some(b'/') => {
                    if bytes.get(i + 2) == Some(&b'=') {
                        self.push(TokenKind::DoubleSlashEq, Span::new(absolute, absolute + 3));
                        i += 3;
                    } else {
                        self.push(TokenKind::DoubleSlash, double);
                        i += 2;
                    }
                }
                b'/' if next == Some(b'=') => {
                    self.push(TokenKind::SlashEq, double);
                    i += 2;
                }
                b'/' => {
                    self.push(TokenKind::Slash, single);
                    i += 1;
                }
                b'%' if next == Some(b'=') => {
                    self.push(TokenKind::PercentEq, double);
                    i += 2;
                }
                b'%' => {
                    self.push(TokenKind::Percent, single);
                    i += 1;
                }
                b'=' if next == Some(b'=') => {
                    self.push(TokenKind::EqEq, double);
                    i += 2;
                }
                b'=' => {
                    self.push(TokenKind::Equals, single);
                    i += 1;
                }
                b'!' if next == Some(b'=') => {
                    self.push(TokenKind::NotEq, double);
                    i += 2;
                }
                b'<' if next == Some(b'=') => {
                    self.push(TokenKind::LtEq, double);
                    i += 2;
                }
                b'<' => {
                    self.push(TokenKind::Lt, single);
                    i += 1;
                }
                b'>' if next == Some(b'=') => {
                    self.push(TokenKind::GtEq, double);
                    i += 2;
                }
                b'>' => {
                    self.push(TokenKind::Gt, single);
                    i += 1;
                }
                b'"' | b'\'' => {
                    i = self.lex_string(line, i, i, false, false, line_number, line_offset);
                }
                ch if ch.is_ascii_digit() => {
                    i = self.lex_number(line, i, line_offset);
                }
                ch if ch.is_ascii_alphabetic() || ch == b'_' => {
                    let start = i;
                    i += 1;
                    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                        i += 1;
                    }
                    let word = &line[start..i];

                    if matches!(bytes.get(i), Some(b'"') | Some(b'\'')) {
                        if let Some((raw, format)) = string_prefix(word) {
                            i = self.lex_string(line, start, i, raw, format, line_number, line_offset);
                            continue;
                        }
                    }

                    let span = Span::new(line_offset + start, line_offset + i);
                    let kind = TokenKind::keyword(word)
                        .unwrap_or_else(|| TokenKind::Identifier(word.to_string()));
                    self.push(kind, span);
                }
                _ => {
                    let other = line[i..].chars().next().unwrap_or('\u{fffd}');
                    let width = other.len_utf8();
                    self.errors.push(LexerError::UnexpectedCharacter {
                        ch: other,
                        line: line_number,
                        column,
                        span: Span::new(absolute, absolute + width),
                    });
                    i += width;
                }
            }
        }
    }

    fn lex_number(&mut self, line: &str, start: usize, line_offset: usize) -> usize {
        let bytes = line.as_bytes();
        let digits = |mut i: usize| {
            while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'_') {
                i += 1;
            }
            i
        };

        let mut i = digits(start);
        if i < bytes.len()
            && bytes[i] == b'.'
            && !bytes
                .get(i + 1)
                .is_some_and(|n| n.is_ascii_alphabetic() || *n == b'_' || *n == b'.')
        {
            i = digits(i + 1);
        }
        if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
            let mut j = i + 1;
            if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
                j += 1;
            }
            if j < bytes.len() && bytes[j].is_ascii_digit() {
                i = digits(j);
            }
        }

        let value = &line[start..i];
        let span = Span::new(line_offset + start, line_offset + i);
        self.push(TokenKind::Number(value.to_string()), span);
        i
    }

    #[allow(clippy::too_many_arguments)]
    fn lex_string(
        &mut self,
        line: &str,
        prefix_start: usize,
        quote_at: usize,
        raw: bool,
        format: bool,
        line_number: usize,
        line_offset: usize,
    ) -> usize {
        let bytes = line.as_bytes();
        let quote = bytes[quote_at];
        let triple = bytes.get(quote_at + 1) == Some(&quote) && bytes.get(quote_at + 2) == Some(&quote);
        let delimiter = if triple { 3 } else { 1 };
        let content_start = quote_at + delimiter;

        match find_closing(bytes, content_start, quote, triple) {
            Some(close) => {
                let open = OpenString {
                    quote,
                    raw,
                    format,
                    start: line_offset + prefix_start,
                    line: line_number,
                    column: prefix_start + 1,
                    text: line[content_start..close].to_string(),
                };
                self.push_string(open, line_offset + close + delimiter);
                close + delimiter
            }
            None if triple => {
                let mut text = line[content_start..].to_string();
                text.push('\n');
                self.open_string = Some(OpenString {
                    quote,
                    raw,
                    format,
                    start: line_offset + prefix_start,
                    line: line_number,
                    column: prefix_start + 1,
                    text,
                });
                bytes.len()
            }
            None => {
                self.errors.push(LexerError::UnterminatedString {
                    line: line_number,
                    column: prefix_start + 1,
                    span: Span::new(line_offset + prefix_start, line_offset + line.len()),
                });
                bytes.len()
            }
        }
    }

    fn push_string(&mut self, open: OpenString, end: usize) {
        let value = if open.raw {
            open.text
        } else {
            unescape(&open.text)
        };
        let kind = if open.format {
            TokenKind::FString(value)
        } else {
            TokenKind::StringLiteral(value)
        };
        self.push(kind, Span::new(open.start, end));
    }

    fn finish(mut self, offset: usize) -> LexResult<Vec<Token>> {
        if let Some(open) = self.open_string.take() {
            self.errors.push(LexerError::UnterminatedString {
                line: open.line,
                column: open.column,
                span: Span::new(open.start, offset),
            });
        }

        if let Some((ch, line, span)) = self.delimiters.first().copied() {
            self.errors.push(LexerError::UnclosedDelimiter {
                ch: ch as char,
                line,
                span,
            });
        }

        if self.line_open {
            self.push(TokenKind::Newline, Span::new(offset, offset));
        }

        while self.indent_stack.len() > 1 {
            self.indent_stack.pop();
            self.push(TokenKind::Dedent, Span::new(offset, offset));
        }

        let eof_span = self
            .tokens
            .last()
            .map(|token| token.span)
            .unwrap_or_else(|| Span::new(offset, offset));
        self.tokens.push(Token::new(TokenKind::Eof, eof_span));

        if self.errors.is_empty() {
            Ok(self.tokens)
        } else {
            Err(self.errors)
        }
    }
}

fn string_prefix(word: &str) -> Option<(bool, bool)> {
    match word.to_ascii_lowercase().as_str() {
        "r" => Some((true, false)),
        "f" => Some((false, true)),
        "rf" | "fr" => Some((true, true)),
        "u" => Some((false, false)),
        _ => None,
    }
}

fn find_closing(bytes: &[u8], from: usize, quote: u8, triple: bool) -> Option<usize> {
    let mut i = from;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => {
                if !triple {
                    return Some(i);
                }
                if bytes.get(i + 1) == Some(&quote) && bytes.get(i + 2) == Some(&quote) {
                    return Some(i);
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
    None
}

/// Resolves backslash escapes; unknown escapes are kept verbatim.
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some('\n') => {}
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .expect("tokenization should succeed")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn newlines_inside_brackets_are_ignored() {
        let tokens = kinds("x = f(\n    1,\n    2,\n)\n");
        let newlines = tokens
            .iter()
            .filter(|kind| **kind == TokenKind::Newline)
            .count();
        assert_eq!(newlines, 1);
        assert!(!tokens.contains(&TokenKind::Indent));
    }

    #[test]
    fn triple_quoted_strings_span_lines() {
        let tokens = kinds("x = \"\"\"a\nb\"\"\"\n");
        assert!(tokens.contains(&TokenKind::StringLiteral("a\nb".to_string())));
    }

    #[test]
    fn string_prefixes_select_kind() {
        let tokens = kinds("f'{x}' r'\\n'\n");
        assert_eq!(tokens[0], TokenKind::FString("{x}".to_string()));
        assert_eq!(tokens[1], TokenKind::StringLiteral("\\n".to_string()));
    }

    #[test]
    fn unclosed_bracket_is_reported() {
        let errors = tokenize("x = [1, 2\n").expect_err("expected error");
        assert!(matches!(
            errors[0],
            LexerError::UnclosedDelimiter { ch: '[', .. }
        ));
    }

    #[test]
    fn unescape_handles_common_sequences() {
        assert_eq!(unescape(r"a\nb\t\\\q"), "a\nb\t\\\\q");
    }
}
