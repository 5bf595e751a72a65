//! Function signatures.
//!
//! A signature is the ordered template of words, choices, options, and
//! argument slots that names one callable form, e.g.
//! `insert {item} at (the) beginning/end of {list}`. Signatures are compared
//! and stored by their canonical [`name`](Signature::name).

use std::{
    fmt,
    hash::{Hash, Hasher},
};

use crate::{
    scanner::Scanner,
    token::{Token, TokenKind},
};

/// One term of a signature.
#[derive(Debug, Clone)]
pub enum Term {
    /// A literal word.
    Word(Token),
    /// Exactly one of several alternative words, e.g. `char/character`.
    /// Alternates are kept sorted by text.
    Choice(Vec<Token>),
    /// Zero or one of several alternative words, e.g. `(the)` or `(in/of)`.
    Option(Vec<Token>),
    /// An argument slot, e.g. `{x}` or `{key: string}` or `{a, b}`.
    Argument(Argument),
}

/// An argument slot; more than one target means the argument destructures a
/// list into the named pieces.
#[derive(Debug, Clone, Default)]
pub struct Argument {
    pub targets: Vec<ArgumentTarget>,
}

/// One binding inside an argument slot. The name may be omitted in bare `{}`
/// slots, and `_` discards the value. The type name is informational.
#[derive(Debug, Clone, Default)]
pub struct ArgumentTarget {
    pub name: Option<Token>,
    pub type_name: Option<Token>,
}

impl Argument {
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            targets: vec![ArgumentTarget::default()],
        }
    }
}

/// An ordered sequence of terms naming one callable form.
#[derive(Debug, Clone, Default)]
pub struct Signature {
    pub terms: Vec<Term>,
    /// Optional result type from a trailing `-> type`, informational.
    pub type_name: Option<Token>,
}

impl Signature {
    /// Parses a signature from text, e.g. `(the) size of {}`.
    ///
    /// Used for native function catalogs; program-declared signatures go
    /// through the parser, which reports richer errors.
    pub fn parse(source: &str) -> Result<Self, String> {
        let mut scanner = Scanner::new();
        scanner.reset(source);
        let mut tokens = Vec::new();
        loop {
            let token = scanner.scan();
            match token.kind {
                TokenKind::EndOfFile => break,
                TokenKind::Error => return Err(token.text),
                TokenKind::Comment | TokenKind::NewLine => {}
                _ => tokens.push(token),
            }
        }
        SignatureParser { tokens, index: 0 }.parse()
    }

    /// The canonical name: words lowercased, choices and options rendered
    /// `(a/b)` with choice alternates sorted, arguments rendered `(:)`.
    /// Two signatures are the same callable iff their names are equal.
    #[must_use]
    pub fn name(&self) -> String {
        let rendered: Vec<String> = self.terms.iter().map(term_name).collect();
        rendered.join(" ")
    }

    /// The number of argument slots.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.arguments().count()
    }

    /// The argument slots in call order.
    pub fn arguments(&self) -> impl Iterator<Item = &Argument> {
        self.terms.iter().filter_map(|term| match term {
            Term::Argument(argument) => Some(argument),
            _ => None,
        })
    }

    /// A signature must contain at least one literal word or choice; a bare
    /// argument list does not name anything.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.terms
            .iter()
            .any(|term| matches!(term, Term::Word(_) | Term::Choice(_)))
    }
}

fn term_name(term: &Term) -> String {
    match term {
        Term::Word(token) => token.word(),
        Term::Choice(tokens) | Term::Option(tokens) => {
            let words: Vec<String> = tokens.iter().map(Token::word).collect();
            format!("({})", words.join("/"))
        }
        Term::Argument(_) => "(:)".to_string(),
    }
}

/// Sorts choice alternates so that `a/b` and `b/a` canonicalize identically.
pub(crate) fn sort_choice(tokens: &mut [Token]) {
    tokens.sort_by(|lhs, rhs| lhs.word().cmp(&rhs.word()));
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

impl Eq for Signature {}

impl Hash for Signature {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name().hash(state);
    }
}

struct SignatureParser {
    tokens: Vec<Token>,
    index: usize,
}

impl SignatureParser {
    fn parse(mut self) -> Result<Signature, String> {
        let mut signature = Signature::default();
        while let Some(token) = self.peek() {
            match token.kind {
                TokenKind::LeftParen => {
                    self.index += 1;
                    signature.terms.push(Term::Option(self.word_choices()?));
                    self.expect(TokenKind::RightParen, "expected ')'")?;
                }
                TokenKind::LeftBrace => {
                    self.index += 1;
                    signature.terms.push(Term::Argument(self.argument()?));
                    self.expect(TokenKind::RightBrace, "expected '}'")?;
                }
                TokenKind::Arrow => {
                    self.index += 1;
                    signature.type_name = Some(self.word("expected a type name")?);
                    break;
                }
                _ if token.is_word() => {
                    let mut words = self.word_choices()?;
                    if words.len() > 1 {
                        sort_choice(&mut words);
                        signature.terms.push(Term::Choice(words));
                    } else {
                        signature.terms.push(Term::Word(words.remove(0)));
                    }
                }
                _ => return Err(format!("unexpected token in signature: {}", token.description())),
            }
        }
        if !signature.is_valid() {
            return Err("invalid signature".to_string());
        }
        Ok(signature)
    }

    fn word_choices(&mut self) -> Result<Vec<Token>, String> {
        let mut words = vec![self.word("expected a word")?];
        while self.matches(TokenKind::Slash) {
            words.push(self.word("expected a word")?);
        }
        Ok(words)
    }

    fn argument(&mut self) -> Result<Argument, String> {
        let mut argument = Argument::default();
        loop {
            let mut target = ArgumentTarget::default();
            if self.peek().is_some_and(Token::is_word) {
                target.name = Some(self.word("expected a word")?);
            }
            if self.matches(TokenKind::Colon) {
                target.type_name = Some(self.word("expected a type name")?);
            }
            argument.targets.push(target);
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        Ok(argument)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index)
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.peek().is_some_and(|token| token.kind == kind) {
            self.index += 1;
            return true;
        }
        false
    }

    fn word(&mut self, message: &str) -> Result<Token, String> {
        match self.peek() {
            Some(token) if token.is_word() => {
                let token = token.clone();
                self.index += 1;
                Ok(token)
            }
            _ => Err(message.to_string()),
        }
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> Result<(), String> {
        if self.matches(kind) {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_name_lowercases_and_sorts_choices() {
        let a = Signature::parse("remove Char/Character {} from {}").unwrap();
        let b = Signature::parse("remove character/char {} from {}").unwrap();
        assert_eq!(a.name(), "remove (char/character) (:) from (:)");
        assert_eq!(a, b);
    }

    #[test]
    fn options_render_like_choices() {
        let signature = Signature::parse("(the) size of {}").unwrap();
        assert_eq!(signature.name(), "(the) size of (:)");
        assert_eq!(signature.arity(), 1);
    }

    #[test]
    fn destructuring_argument_counts_once() {
        let signature = Signature::parse("zip {a, b} with {c}").unwrap();
        assert_eq!(signature.arity(), 2);
        let first = signature.arguments().next().unwrap();
        assert_eq!(first.targets.len(), 2);
    }

    #[test]
    fn bare_argument_lists_are_invalid() {
        assert!(Signature::parse("{}").is_err());
        assert!(Signature::parse("{a} {b}").is_err());
    }

    #[test]
    fn result_type_annotation() {
        let signature = Signature::parse("the clock -> number").unwrap();
        assert_eq!(signature.name(), "the clock");
        assert_eq!(signature.type_name.unwrap().text, "number");
    }
}
