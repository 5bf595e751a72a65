//! Hand-written scanner.
//!
//! Produces one token per `scan` call. The parser owns three pieces of
//! scanner state: `ignore_newlines` (set inside parentheses, brackets, and
//! interpolations), and the `interpolating`/`string_terminal` pair that makes
//! a `}` resume string scanning after an interpolated expression.

use crate::{
    location::{SourceLocation, SourceRange},
    token::{Token, TokenKind},
};

pub struct Scanner {
    source: String,
    start: usize,
    current: usize,
    start_location: SourceLocation,
    current_location: SourceLocation,

    /// Bracket nesting depth; newlines are whitespace while positive.
    skip_newlines: i32,

    /// Set by the parser inside groupings and interpolations.
    pub ignore_newlines: bool,
    /// Whether a `}` should resume string scanning.
    pub interpolating: bool,
    /// The quote character that will close the string being interpolated.
    pub string_terminal: char,
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Scanner {
    #[must_use]
    pub fn new() -> Self {
        Self {
            source: String::new(),
            start: 0,
            current: 0,
            start_location: SourceLocation::start(),
            current_location: SourceLocation::start(),
            skip_newlines: 0,
            ignore_newlines: false,
            interpolating: false,
            string_terminal: '"',
        }
    }

    /// Replaces the source buffer, keeping the current scan position.
    ///
    /// Incremental readers append input; the scanner picks up where the
    /// previous buffer ended.
    pub fn reset(&mut self, source: &str) {
        self.source = source.to_string();
        if self.current > self.source.len() {
            self.current = self.source.len();
        }
    }

    /// Scans the next token.
    pub fn scan(&mut self) -> Token {
        self.skip_whitespace();

        self.start = self.current;
        self.start_location = self.current_location;

        if self.is_at_end() {
            return self.make(TokenKind::EndOfFile);
        }

        let c = self.advance();

        if c.is_ascii_digit() {
            return self.scan_number();
        }
        if c.is_ascii_alphabetic() || c == '_' {
            return self.scan_word();
        }

        match c {
            '\n' | ';' => self.make(TokenKind::NewLine),
            '(' => {
                if self.peek() == '-' && self.peek_next() == '-' {
                    return self.scan_block_comment();
                }
                self.skip_newlines += 1;
                self.make(TokenKind::LeftParen)
            }
            ')' => {
                self.skip_newlines -= 1;
                self.make(TokenKind::RightParen)
            }
            '[' => {
                self.skip_newlines += 1;
                self.make(TokenKind::LeftBracket)
            }
            ']' => {
                self.skip_newlines -= 1;
                self.make(TokenKind::RightBracket)
            }
            '{' => {
                self.skip_newlines += 1;
                self.make(TokenKind::LeftBrace)
            }
            '}' => {
                if self.interpolating {
                    return self.scan_string(self.string_terminal, true);
                }
                self.skip_newlines -= 1;
                self.make(TokenKind::RightBrace)
            }
            '+' => self.make(TokenKind::Plus),
            '-' => {
                if self.matches('>') {
                    self.make(TokenKind::Arrow)
                } else if self.peek() == '-' {
                    self.scan_line_comment()
                } else {
                    self.make(TokenKind::Minus)
                }
            }
            '*' => self.make(TokenKind::Star),
            '/' => self.make(TokenKind::Slash),
            '%' => self.make(TokenKind::Percent),
            '^' => self.make(TokenKind::Carrot),
            ':' => self.make(TokenKind::Colon),
            ',' => self.make(TokenKind::Comma),
            '=' => self.make(TokenKind::Equal),
            '!' => {
                if self.matches('=') {
                    self.make(TokenKind::NotEqual)
                } else {
                    self.make(TokenKind::Bang)
                }
            }
            '<' => {
                if self.matches('=') {
                    self.make(TokenKind::LessThanOrEqual)
                } else {
                    self.make(TokenKind::LessThan)
                }
            }
            '>' => {
                if self.matches('=') {
                    self.make(TokenKind::GreaterThanOrEqual)
                } else {
                    self.make(TokenKind::GreaterThan)
                }
            }
            '"' => self.scan_string('"', false),
            '\'' => self.scan_string('\'', false),
            '#' => self.scan_line_comment(),
            '.' => {
                if self.matches('.') {
                    if self.matches('.') {
                        self.make(TokenKind::ThreeDots)
                    } else if self.matches('<') {
                        self.make(TokenKind::OpenRange)
                    } else {
                        self.make_error("expected '...' or '..<'")
                    }
                } else {
                    self.make_error("unknown character: .")
                }
            }
            _ => self.make_error(format!("unknown character: {c}")),
        }
    }

    fn scan_word(&mut self) -> Token {
        while !self.is_at_end() {
            let c = self.peek();
            if !c.is_ascii_alphanumeric() && c != '_' {
                break;
            }
            self.advance();
        }
        self.make(self.word_kind())
    }

    fn word_kind(&self) -> TokenKind {
        match self.source[self.start..self.current].to_lowercase().as_str() {
            "a" | "an" => TokenKind::An,
            "and" => TokenKind::And,
            "as" => TokenKind::As,
            "else" => TokenKind::Else,
            "empty" => TokenKind::Empty,
            "end" => TokenKind::End,
            "exit" => TokenKind::Exit,
            "for" => TokenKind::For,
            "forever" => TokenKind::Forever,
            "function" => TokenKind::Function,
            "global" => TokenKind::Global,
            "if" => TokenKind::If,
            "in" => TokenKind::In,
            "is" => TokenKind::Is,
            "local" => TokenKind::Local,
            "next" => TokenKind::Next,
            "not" => TokenKind::Not,
            "or" => TokenKind::Or,
            "repeat" => TokenKind::Repeat,
            "return" => TokenKind::Return,
            "set" => TokenKind::Set,
            "then" => TokenKind::Then,
            "to" => TokenKind::To,
            "true" | "false" => TokenKind::BoolLiteral,
            "try" => TokenKind::Try,
            "until" => TokenKind::Until,
            "use" => TokenKind::Use,
            "using" => TokenKind::Using,
            "while" => TokenKind::While,
            _ => TokenKind::Word,
        }
    }

    fn scan_number(&mut self) -> Token {
        while !self.is_at_end() && self.peek().is_ascii_digit() {
            self.advance();
        }
        // A trailing `..` is a range operator, not a decimal point.
        if !self.is_at_end() && self.peek() == '.' && self.peek_next() != '.' {
            self.advance();
            while !self.is_at_end() && self.peek().is_ascii_digit() {
                self.advance();
            }
            return self.make(TokenKind::FloatLiteral);
        }
        self.make(TokenKind::IntLiteral)
    }

    /// Scans a string body until the terminal quote or an interpolation brace.
    ///
    /// `resumed` is true when the body was re-entered through the `}` closing
    /// an interpolated expression; it selects the interpolation token kinds.
    fn scan_string(&mut self, terminal: char, resumed: bool) -> Token {
        while !self.is_at_end() {
            let c = self.peek();
            if c == terminal {
                self.advance();
                return self.make(if resumed {
                    TokenKind::ClosedInterpolation
                } else {
                    TokenKind::StringLiteral
                });
            }
            if c == '{' {
                self.advance();
                return self.make(if resumed {
                    TokenKind::Interpolation
                } else {
                    TokenKind::OpenInterpolation
                });
            }
            if c == '\\' {
                self.advance();
                if self.is_at_end() {
                    break;
                }
                let escaped = self.advance();
                if !matches!(escaped, 'n' | 't' | 'r' | '0' | '\\' | '\'' | '"' | '{' | '}') {
                    return self.make_error(format!("invalid escape sequence: \\{escaped}"));
                }
                continue;
            }
            self.advance();
        }
        if resumed {
            self.make_error("unterminated string interpolation")
        } else {
            self.make_error("unterminated string")
        }
    }

    fn scan_line_comment(&mut self) -> Token {
        while !self.is_at_end() && self.peek() != '\n' {
            self.advance();
        }
        self.make(TokenKind::Comment)
    }

    /// Scans a nestable `(-- ... --)` block comment. The opening `(` has
    /// already been consumed.
    fn scan_block_comment(&mut self) -> Token {
        self.advance();
        self.advance();
        let mut depth = 1;
        while depth > 0 && !self.is_at_end() {
            if self.peek() == '(' && self.peek_next() == '-' && self.peek_at(2) == Some('-') {
                self.advance();
                self.advance();
                self.advance();
                depth += 1;
            } else if self.peek() == '-' && self.peek_next() == '-' && self.peek_at(2) == Some(')')
            {
                self.advance();
                self.advance();
                self.advance();
                depth -= 1;
            } else {
                self.advance();
            }
        }
        if depth > 0 {
            self.make_error("unterminated block comment")
        } else {
            self.make(TokenKind::Comment)
        }
    }

    fn skip_whitespace(&mut self) {
        while !self.is_at_end() {
            match self.peek() {
                ' ' | '\t' | '\r' => {
                    self.advance();
                }
                '\n' => {
                    if self.skip_newlines > 0 || self.ignore_newlines {
                        self.advance();
                    } else {
                        return;
                    }
                }
                '\\' => {
                    if self.peek_next() == '\n' {
                        self.advance();
                        self.advance();
                    } else {
                        return;
                    }
                }
                _ => return,
            }
        }
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn peek(&self) -> char {
        self.source[self.current..].chars().next().unwrap_or('\0')
    }

    fn peek_next(&self) -> char {
        self.peek_at(1).unwrap_or('\0')
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.source[self.current..].chars().nth(offset)
    }

    fn advance(&mut self) -> char {
        let c = self.peek();
        self.current += c.len_utf8();
        self.current_location.offset += c.len_utf8() as u32;
        if c == '\n' {
            self.current_location.line += 1;
            self.current_location.column = 1;
        } else {
            self.current_location.column += 1;
        }
        c
    }

    fn matches(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.peek() != expected {
            return false;
        }
        self.advance();
        true
    }

    fn make(&self, kind: TokenKind) -> Token {
        Token::new(
            kind,
            SourceRange::new(self.start_location, self.current_location),
            self.source[self.start..self.current].to_string(),
        )
    }

    fn make_error(&self, message: impl Into<String>) -> Token {
        Token::new(
            TokenKind::Error,
            SourceRange::new(self.start_location, self.current_location),
            message.into(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_all(source: &str) -> Vec<Token> {
        let mut scanner = Scanner::new();
        scanner.reset(source);
        let mut tokens = Vec::new();
        loop {
            let token = scanner.scan();
            let done = token.kind == TokenKind::EndOfFile;
            tokens.push(token);
            if done {
                break;
            }
        }
        tokens
    }

    fn kinds(source: &str) -> Vec<TokenKind> {
        scan_all(source).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn literals_scan_to_single_tokens() {
        for (source, kind) in [
            ("42", TokenKind::IntLiteral),
            ("3.25", TokenKind::FloatLiteral),
            ("true", TokenKind::BoolLiteral),
            ("false", TokenKind::BoolLiteral),
            ("\"hello\"", TokenKind::StringLiteral),
            ("'hello'", TokenKind::StringLiteral),
            ("empty", TokenKind::Empty),
        ] {
            let tokens = scan_all(source);
            assert_eq!(tokens.len(), 2, "{source}");
            assert_eq!(tokens[0].kind, kind, "{source}");
            assert_eq!(tokens[0].text, source);
        }
    }

    #[test]
    fn string_value_decodes_escapes() {
        let tokens = scan_all(r#""a\nb\"c""#);
        assert_eq!(tokens[0].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[0].string_value(), "a\nb\"c");
    }

    #[test]
    fn range_operator_does_not_eat_decimal_dot() {
        assert_eq!(
            kinds("1...5"),
            vec![
                TokenKind::IntLiteral,
                TokenKind::ThreeDots,
                TokenKind::IntLiteral,
                TokenKind::EndOfFile
            ]
        );
        assert_eq!(
            kinds("1..<5"),
            vec![
                TokenKind::IntLiteral,
                TokenKind::OpenRange,
                TokenKind::IntLiteral,
                TokenKind::EndOfFile
            ]
        );
    }

    #[test]
    fn newlines_suppressed_inside_brackets() {
        assert_eq!(
            kinds("[1,\n2]"),
            vec![
                TokenKind::LeftBracket,
                TokenKind::IntLiteral,
                TokenKind::Comma,
                TokenKind::IntLiteral,
                TokenKind::RightBracket,
                TokenKind::EndOfFile
            ]
        );
    }

    #[test]
    fn backslash_continues_a_line() {
        assert_eq!(
            kinds("1 \\\n+ 2"),
            vec![
                TokenKind::IntLiteral,
                TokenKind::Plus,
                TokenKind::IntLiteral,
                TokenKind::EndOfFile
            ]
        );
    }

    #[test]
    fn interpolation_segments() {
        let mut scanner = Scanner::new();
        scanner.reset("\"a{x}b{y}c\"");

        let open = scanner.scan();
        assert_eq!(open.kind, TokenKind::OpenInterpolation);
        assert_eq!(open.string_value(), "a");

        assert_eq!(scanner.scan().kind, TokenKind::Word);

        scanner.interpolating = true;
        scanner.string_terminal = '"';
        let middle = scanner.scan();
        assert_eq!(middle.kind, TokenKind::Interpolation);
        assert_eq!(middle.string_value(), "b");

        assert_eq!(scanner.scan().kind, TokenKind::Word);

        let closed = scanner.scan();
        assert_eq!(closed.kind, TokenKind::ClosedInterpolation);
        assert_eq!(closed.string_value(), "c");
    }

    #[test]
    fn comments_are_reported_with_kind_comment() {
        assert_eq!(
            kinds("1 # rest\n2 -- also\n(-- block (-- nested --) --) 3"),
            vec![
                TokenKind::IntLiteral,
                TokenKind::Comment,
                TokenKind::NewLine,
                TokenKind::IntLiteral,
                TokenKind::Comment,
                TokenKind::NewLine,
                TokenKind::Comment,
                TokenKind::IntLiteral,
                TokenKind::EndOfFile
            ]
        );
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let tokens = scan_all("\"abc");
        assert_eq!(tokens[0].kind, TokenKind::Error);
        assert_eq!(tokens[0].text, "unterminated string");
    }

    #[test]
    fn semicolon_is_a_newline() {
        assert_eq!(
            kinds("1; 2"),
            vec![
                TokenKind::IntLiteral,
                TokenKind::NewLine,
                TokenKind::IntLiteral,
                TokenKind::EndOfFile
            ]
        );
    }
}
