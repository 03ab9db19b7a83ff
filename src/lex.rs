use std::fmt::Display;

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::unit::{Currency, Unit};

/// Words that end a number's unit suffix scan and are lexed again as operators.
const OPERATOR_WORDS: &[&str] = &["in", "times", "on", "of", "is", "x"];

#[derive(Error, Debug, Diagnostic)]
#[error("Unrecognized token `{token}`")]
pub struct UnrecognizedToken {
    #[source_code]
    src: NamedSource<String>,

    #[label("this token")]
    bad_bit: SourceSpan,

    #[help]
    help: Option<String>,

    pub token: String,
}

impl UnrecognizedToken {
    /// 1-based column of the offending token within its line.
    pub fn column(&self) -> usize {
        self.src.inner()[..self.bad_bit.offset()].chars().count() + 1
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token<'de> {
    pub kind: TokenKind,
    /// The source text of the token. For numbers this is the raw digits,
    /// without any currency symbol or unit word.
    pub literal: &'de str,
    /// Byte offset of `literal` within the line.
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number { units: Option<Unit> },
    Operator(Operator),
    LeftParen,
    RightParen,
    Ident { units: Option<Unit> },
    /// Always the last token of its line.
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Equal,
    Times,
    X,
    On,
    /// Postfix `in <unit>`.
    Convert(Unit),
    /// `of what is`
    OfWhatIs,
}

impl<'de> Token<'de> {
    pub fn is_error(&self) -> bool {
        matches!(self.kind, TokenKind::Error { .. })
    }

    /// Builds a renderable diagnostic for an error token. `source` must be the
    /// line this token was lexed from.
    pub fn diagnostic(&self, name: &str, source: &str) -> Option<UnrecognizedToken> {
        if !self.is_error() {
            return None;
        }
        let help = if self.literal.contains('_') {
            format!("names may only contain letters; remove the `_` from `{}`", self.literal)
        } else {
            format!("`{}` is not a number, operator or name", self.literal)
        };
        Some(UnrecognizedToken {
            src: NamedSource::new(name, source.to_string()),
            bad_bit: SourceSpan::from(self.offset..self.offset + self.literal.len()),
            help: Some(help),
            token: self.literal.to_string(),
        })
    }
}

impl Display for Token<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lit = self.literal;
        let units = |units: &Option<Unit>| match units {
            Some(unit) => unit.to_string(),
            None => "null".to_string(),
        };
        match &self.kind {
            TokenKind::Number { units: u } => write!(f, "NUMBER {lit} {}", units(u)),
            TokenKind::Ident { units: u } => write!(f, "IDENTIFIER {lit} {}", units(u)),
            TokenKind::LeftParen => write!(f, "LEFT_PAREN {lit} null"),
            TokenKind::RightParen => write!(f, "RIGHT_PAREN {lit} null"),
            TokenKind::Error { message } => write!(f, "ERROR {lit} {message}"),
            TokenKind::Operator(op) => match op {
                Operator::Plus => write!(f, "PLUS {lit} null"),
                Operator::Minus => write!(f, "MINUS {lit} null"),
                Operator::Star => write!(f, "STAR {lit} null"),
                Operator::Slash => write!(f, "SLASH {lit} null"),
                Operator::Percent => write!(f, "PERCENT {lit} null"),
                Operator::Caret => write!(f, "CARET {lit} null"),
                Operator::Equal => write!(f, "EQUAL {lit} null"),
                Operator::Times => write!(f, "TIMES {lit} null"),
                Operator::X => write!(f, "X {lit} null"),
                Operator::On => write!(f, "ON {lit} null"),
                Operator::Convert(unit) => write!(f, "CONVERT {lit} {unit}"),
                Operator::OfWhatIs => write!(f, "OF_WHAT_IS {lit} null"),
            },
        }
    }
}

/// Scans one line into tokens. Everything from the first `#` on is a comment.
///
/// The lexer never fails: an unrecognized character or an identifier with an
/// underscore produces a single [`TokenKind::Error`] token, after which the
/// iterator is exhausted.
pub struct Lexer<'de> {
    whole: &'de str,
    rest: &'de str,
    byte: usize,
    finished: bool,
}

impl<'de> Lexer<'de> {
    pub fn new(input: &'de str) -> Self {
        let whole = match input.find('#') {
            Some(comment) => &input[..comment],
            None => input,
        };
        Lexer {
            whole,
            rest: whole,
            byte: 0,
            finished: false,
        }
    }

    fn advance(&mut self, bytes: usize) {
        self.rest = &self.rest[bytes..];
        self.byte += bytes;
    }

    fn take(&mut self, bytes: usize) -> &'de str {
        let literal = &self.rest[..bytes];
        self.advance(bytes);
        literal
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.rest.trim_start();
        self.advance(self.rest.len() - trimmed.len());
    }

    /// Bytes from the current position up to the end of `tail`, a suffix of `rest`.
    fn distance_to(&self, tail: &str) -> usize {
        self.rest.len() - tail.len()
    }

    /// An operator token spanning everything consumed since `start`.
    fn operator(&self, kind: Operator, start: usize) -> Token<'de> {
        Token {
            kind: TokenKind::Operator(kind),
            literal: &self.whole[start..self.byte],
            offset: start,
        }
    }

    fn number(&mut self, units: Option<Unit>) -> Token<'de> {
        let offset = self.byte;
        let literal = self.take(numeric_len(self.rest));
        Token {
            kind: TokenKind::Number { units },
            literal,
            offset,
        }
    }

    /// Reads the optional `%` or unit word after a bare number.
    fn number_suffix(&mut self) -> Option<Unit> {
        self.skip_whitespace();
        if self.rest.starts_with('%') {
            self.advance(1);
            return Some(Unit::Percent);
        }
        let word = letter_run(self.rest);
        if word.is_empty() || OPERATOR_WORDS.contains(&word) {
            return None;
        }
        // Unknown words such as `columns` are swallowed.
        self.advance(word.len());
        Unit::suffix(word)
    }

    fn word(&mut self, start: usize) -> Token<'de> {
        let len = self
            .rest
            .find(|c: char| !(c.is_ascii_alphabetic() || c == '_'))
            .unwrap_or(self.rest.len());
        let literal = self.take(len);

        if literal.contains('_') {
            self.finished = true;
            return Token {
                kind: TokenKind::Error {
                    message: format!("Unrecognized token: {literal}"),
                },
                literal,
                offset: start,
            };
        }

        match literal.to_ascii_lowercase().as_str() {
            "of" => {
                let after = self.rest.trim_start();
                let second = letter_run(after);
                if second.eq_ignore_ascii_case("what") {
                    let after = after[second.len()..].trim_start();
                    let third = letter_run(after);
                    if third.eq_ignore_ascii_case("is") {
                        self.advance(self.distance_to(after) + third.len());
                        return self.operator(Operator::OfWhatIs, start);
                    }
                }
            }
            "in" => {
                let after = self.rest.trim_start();
                let target = letter_run(after);
                if !target.is_empty() {
                    self.advance(self.distance_to(after) + target.len());
                    return self.operator(
                        Operator::Convert(Unit::conversion_target(target)),
                        start,
                    );
                }
            }
            "times" => return self.operator(Operator::Times, start),
            "on" => return self.operator(Operator::On, start),
            "x" => return self.operator(Operator::X, start),
            "today" => {
                return Token {
                    kind: TokenKind::Ident {
                        units: Some(Unit::Date),
                    },
                    literal,
                    offset: start,
                };
            }
            _ => {}
        }

        Token {
            kind: TokenKind::Ident { units: None },
            literal,
            offset: start,
        }
    }
}

impl<'de> Iterator for Lexer<'de> {
    type Item = Token<'de>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        loop {
            self.skip_whitespace();
            let mut chars = self.rest.chars();
            let c = chars.next()?;
            let start = self.byte;

            if let Some(currency) = Currency::from_symbol(c) {
                self.advance(c.len_utf8());
                self.skip_whitespace();
                if self.rest.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
                    return Some(self.number(Some(Unit::Currency(currency))));
                }
                // A symbol without an amount is dropped.
                continue;
            }

            let starts_number = c.is_ascii_digit()
                || (c == '.' && chars.next().is_some_and(|next| next.is_ascii_digit()));
            if starts_number {
                let mut token = self.number(None);
                token.kind = TokenKind::Number {
                    units: self.number_suffix(),
                };
                return Some(token);
            }

            let single = |kind: TokenKind, lexer: &mut Self| {
                let literal = lexer.take(c.len_utf8());
                Some(Token {
                    kind,
                    literal,
                    offset: start,
                })
            };

            return match c {
                '+' => single(TokenKind::Operator(Operator::Plus), self),
                '-' => single(TokenKind::Operator(Operator::Minus), self),
                '*' => single(TokenKind::Operator(Operator::Star), self),
                '/' => single(TokenKind::Operator(Operator::Slash), self),
                '^' => single(TokenKind::Operator(Operator::Caret), self),
                '%' => single(TokenKind::Operator(Operator::Percent), self),
                '=' => single(TokenKind::Operator(Operator::Equal), self),
                '(' => single(TokenKind::LeftParen, self),
                ')' => single(TokenKind::RightParen, self),
                c if c.is_ascii_alphabetic() => Some(self.word(start)),
                c => {
                    self.finished = true;
                    let literal = self.take(c.len_utf8());
                    Some(Token {
                        kind: TokenKind::Error {
                            message: format!("Unrecognized token: {literal}"),
                        },
                        literal,
                        offset: start,
                    })
                }
            };
        }
    }
}

/// Tokenizes a single line. Total: never panics and never fails.
pub fn tokenize(line: &str) -> Vec<Token<'_>> {
    Lexer::new(line).collect()
}

fn numeric_len(s: &str) -> usize {
    s.find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len())
}

fn letter_run(s: &str) -> &str {
    let end = s
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(s.len());
    &s[..end]
}
