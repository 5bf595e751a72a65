//! Tokens produced by the scanner.

use crate::location::SourceRange;

/// Every kind of token the scanner can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Error,
    EndOfFile,
    NewLine,
    Comment,
    Word,

    // Reserved words.
    An,
    And,
    As,
    Else,
    Empty,
    End,
    Exit,
    For,
    Forever,
    Function,
    Global,
    If,
    In,
    Is,
    Local,
    Next,
    Not,
    Or,
    Repeat,
    Return,
    Set,
    Then,
    To,
    Try,
    Until,
    Use,
    Using,
    While,

    // Punctuation.
    Comma,
    Colon,
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    Arrow,

    // Operators.
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Carrot,
    Equal,
    NotEqual,
    Bang,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    /// The closed range operator `...`.
    ThreeDots,
    /// The half-open range operator `..<`.
    OpenRange,

    // Literals.
    IntLiteral,
    FloatLiteral,
    BoolLiteral,
    StringLiteral,
    /// `"text{` — a string literal interrupted by an interpolation.
    OpenInterpolation,
    /// `}text{` — a middle segment between two interpolations.
    Interpolation,
    /// `}text"` — the segment closing an interpolated string.
    ClosedInterpolation,
}

/// A single token with its source range and raw text.
///
/// `text` holds the raw lexeme, including string delimiters; for `Error`
/// tokens it holds the error message instead.
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub range: SourceRange,
    pub text: String,
}

impl Token {
    #[must_use]
    pub fn new(kind: TokenKind, range: SourceRange, text: String) -> Self {
        Self { kind, range, text }
    }

    /// Whether this token may act as a plain word in signatures and calls.
    ///
    /// Most reserved words still count as words so that signatures like
    /// `{} is not {}` or `remove item {} from {}` can use them. `then`,
    /// `else`, `global`, and `local` are deliberately excluded so that call
    /// matching stops at block and scope markers.
    #[must_use]
    pub fn is_word(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Word
                | TokenKind::An
                | TokenKind::And
                | TokenKind::As
                | TokenKind::Empty
                | TokenKind::End
                | TokenKind::Exit
                | TokenKind::For
                | TokenKind::Forever
                | TokenKind::Function
                | TokenKind::If
                | TokenKind::In
                | TokenKind::Is
                | TokenKind::Next
                | TokenKind::Not
                | TokenKind::Or
                | TokenKind::Repeat
                | TokenKind::Return
                | TokenKind::Set
                | TokenKind::To
                | TokenKind::Try
                | TokenKind::Until
                | TokenKind::Use
                | TokenKind::Using
                | TokenKind::While
        )
    }

    /// Whether this token can begin a primary expression or call argument.
    #[must_use]
    pub fn is_primary(&self) -> bool {
        self.is_word()
            || matches!(
                self.kind,
                TokenKind::IntLiteral
                    | TokenKind::FloatLiteral
                    | TokenKind::BoolLiteral
                    | TokenKind::StringLiteral
                    | TokenKind::OpenInterpolation
                    | TokenKind::Empty
                    | TokenKind::LeftParen
                    | TokenKind::LeftBracket
                    | TokenKind::Minus
                    | TokenKind::Global
                    | TokenKind::Local
            )
    }

    /// Whether this token terminates a simple statement.
    #[must_use]
    pub fn is_end_of_statement(&self) -> bool {
        matches!(self.kind, TokenKind::NewLine | TokenKind::EndOfFile)
    }

    /// The token's lowercased word form, used for grammar and variable lookups.
    #[must_use]
    pub fn word(&self) -> String {
        self.text.to_lowercase()
    }

    /// A short human-readable rendering for diagnostics.
    #[must_use]
    pub fn description(&self) -> String {
        match self.kind {
            TokenKind::Error => "$error".to_string(),
            TokenKind::EndOfFile => "$end".to_string(),
            TokenKind::NewLine => "$nl".to_string(),
            _ => self.text.clone(),
        }
    }

    /// The quote character that opened a string-ish literal.
    #[must_use]
    pub fn opening_string_terminal(&self) -> char {
        debug_assert!(matches!(
            self.kind,
            TokenKind::StringLiteral | TokenKind::OpenInterpolation
        ));
        self.text.chars().next().unwrap_or('"')
    }

    /// Decodes the contents of a string-ish literal, stripping delimiters and
    /// resolving escape sequences.
    ///
    /// - `StringLiteral`: `"content"` → `content`
    /// - `OpenInterpolation`: `"content{` → `content`
    /// - `Interpolation`: `}content{` → `content`
    /// - `ClosedInterpolation`: `}content"` → `content`
    #[must_use]
    pub fn string_value(&self) -> String {
        let inner = match self.kind {
            TokenKind::StringLiteral
            | TokenKind::OpenInterpolation
            | TokenKind::Interpolation
            | TokenKind::ClosedInterpolation => {
                let bytes = self.text.as_bytes();
                if bytes.len() >= 2 {
                    &self.text[1..self.text.len() - 1]
                } else {
                    ""
                }
            }
            _ => return self.text.clone(),
        };
        decode_escapes(inner)
    }

    /// The module name named by a `use`/`using` target, which is either a
    /// bare word or a quoted string.
    #[must_use]
    pub fn string_value_or_word(&self) -> String {
        if self.kind == TokenKind::StringLiteral {
            self.string_value()
        } else {
            self.text.clone()
        }
    }
}

fn decode_escapes(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('0') => result.push('\0'),
            Some(c) => result.push(c),
            None => result.push('\\'),
        }
    }
    result
}
