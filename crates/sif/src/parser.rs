//! Recursive-descent parser.
//!
//! Statements and operator expressions follow a conventional Pratt-style
//! precedence ladder. Calls are the novel part: the parser walks the grammar
//! trie of every signature in scope, preferring known variables over call
//! words and literal words over argument slots, so that an arbitrary
//! multi-word call form declared by the program itself can be recognized
//! mid-expression.
//!
//! The parser owns a scope stack of declared signatures and variables. The
//! grammar trie is rebuilt from the surviving scopes when a scope ends;
//! scopes are shallow, so a rebuild is cheaper than incremental removal.

use ahash::AHashSet;

use crate::{
    ast::{
        Assignment, AssignmentTarget, Block, Call, Expr, ExprKind, FunctionDecl, If, Repeat,
        RepeatCondition, RepeatFor, Return, Statement, StructuredTarget, Try, Use, Using, Variable,
        VariableScope, VariableTarget, BinaryOperator, UnaryOperator,
    },
    error::Error,
    grammar::{Grammar, NodeId},
    location::SourceRange,
    module::{Module, ModuleProvider},
    reader::Reader,
    reporter::Reporter,
    scanner::Scanner,
    signature::{sort_choice, Argument, ArgumentTarget, Signature, Term},
    token::{Token, TokenKind},
};

pub struct ParserConfig {
    pub file_name: String,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            file_name: "<stdin>".to_string(),
        }
    }
}

/// One lexical scope of declared signatures and variables.
#[derive(Debug, Default, Clone)]
pub struct Scope {
    pub signatures: Vec<Signature>,
    pub variables: AHashSet<String>,
}

pub struct Parser<'a> {
    #[expect(dead_code, reason = "carried for diagnostics parity with the reporters")]
    config: ParserConfig,
    scanner: Scanner,
    reader: &'a mut dyn Reader,
    reporter: &'a mut dyn Reporter,
    provider: &'a dyn ModuleProvider,

    scopes: Vec<Scope>,
    /// Union of every scope's variables, plus the implicit `it`.
    variables: AHashSet<String>,
    grammar: Grammar,
    /// Top-level declarations, exported when parsing a module.
    exported: Vec<Signature>,
    comment_ranges: Vec<SourceRange>,

    tokens: Vec<Token>,
    index: usize,
    saved: Vec<usize>,

    parsing_repeat: bool,
    parsing_depth: usize,
    failed: bool,
}

impl<'a> Parser<'a> {
    pub fn new(
        config: ParserConfig,
        reader: &'a mut dyn Reader,
        reporter: &'a mut dyn Reporter,
        provider: &'a dyn ModuleProvider,
    ) -> Self {
        let mut variables = AHashSet::new();
        variables.insert("it".to_string());
        // `empty` is a literal, but the call parser must treat it like a
        // known name so it never starts a trie walk.
        variables.insert("empty".to_string());
        Self {
            config,
            scanner: Scanner::new(),
            reader,
            reporter,
            provider,
            scopes: vec![Scope::default()],
            variables,
            grammar: Grammar::new(),
            exported: Vec::new(),
            comment_ranges: Vec::new(),
            tokens: Vec::new(),
            index: 0,
            saved: Vec::new(),
            parsing_repeat: false,
            parsing_depth: 0,
            failed: false,
        }
    }

    /// Reads available input and parses it as a block of statements.
    pub fn statement(&mut self) -> Option<Statement> {
        if let Err(error) = self.reader.read(0) {
            self.failed = true;
            self.reporter
                .report(&Error::new(SourceRange::default(), error.to_string()));
            return None;
        }
        self.scanner.reset(self.reader.contents());
        Some(self.parse_block(&[]))
    }

    /// Reads available input and parses it as a bare signature.
    pub fn signature(&mut self) -> Option<Signature> {
        if let Err(error) = self.reader.read(0) {
            self.failed = true;
            self.reporter
                .report(&Error::new(SourceRange::default(), error.to_string()));
            return None;
        }
        self.scanner.reset(self.reader.contents());
        let signature = self.parse_signature();
        if self.failed { None } else { Some(signature) }
    }

    /// Declares a signature in the current scope.
    pub fn declare_signature(&mut self, signature: &Signature) {
        self.scopes
            .last_mut()
            .expect("scope stack is never empty")
            .signatures
            .push(signature.clone());
        self.grammar.insert(signature);
    }

    pub fn declare_signatures(&mut self, signatures: &[Signature]) {
        for signature in signatures {
            self.declare_signature(signature);
        }
    }

    /// Declares a variable name in the current scope. `_` is the discard
    /// name and is never declared.
    pub fn declare_variable(&mut self, name: &str) {
        if name == "_" {
            return;
        }
        self.scopes
            .last_mut()
            .expect("scope stack is never empty")
            .variables
            .insert(name.to_string());
        self.variables.insert(name.to_string());
    }

    /// Signatures declared at the top level, i.e. a module's exports.
    #[must_use]
    pub fn declarations(&self) -> &[Signature] {
        &self.exported
    }

    /// Signatures visible in the current (outermost, after parsing) scope.
    /// An interactive session feeds these back into its next parse.
    #[must_use]
    pub fn signatures(&self) -> &[Signature] {
        &self
            .scopes
            .last()
            .expect("scope stack is never empty")
            .signatures
    }

    /// Variables visible in the current scope.
    #[must_use]
    pub fn variables(&self) -> &AHashSet<String> {
        &self
            .scopes
            .last()
            .expect("scope stack is never empty")
            .variables
    }

    #[must_use]
    pub fn failed(&self) -> bool {
        self.failed
    }

    /// Comment ranges seen so far, for editors and annotators.
    #[must_use]
    pub fn comment_ranges(&self) -> &[SourceRange] {
        &self.comment_ranges
    }

    // ---- token plumbing ----

    fn scan_into_buffer(&mut self) {
        loop {
            let token = self.scanner.scan();
            match token.kind {
                TokenKind::Comment => self.comment_ranges.push(token.range),
                TokenKind::Error => {
                    self.emit_error(Error::new(token.range, token.text.clone()));
                    self.tokens.push(token);
                    return;
                }
                _ => {
                    self.tokens.push(token);
                    return;
                }
            }
        }
    }

    fn peek(&mut self) -> Token {
        if self.index == self.tokens.len() {
            self.scan_into_buffer();
        }
        self.tokens[self.index].clone()
    }

    fn previous(&self) -> Token {
        self.tokens[self.index - 1].clone()
    }

    fn advance(&mut self) -> Token {
        if self.index == self.tokens.len() {
            self.scan_into_buffer();
        }
        self.index += 1;
        self.previous()
    }

    fn is_at_end(&mut self) -> bool {
        self.peek().kind == TokenKind::EndOfFile
    }

    fn check(&mut self, kinds: &[TokenKind]) -> bool {
        if self.is_at_end() {
            return false;
        }
        let kind = self.peek().kind;
        kinds.contains(&kind)
    }

    fn matches(&mut self, kinds: &[TokenKind]) -> Option<Token> {
        if self.check(kinds) {
            return Some(self.advance());
        }
        None
    }

    fn consume(&mut self, kind: TokenKind) -> Option<Token> {
        self.matches(&[kind])
    }

    fn consume_word(&mut self) -> Option<Token> {
        if self.peek().is_word() {
            return Some(self.advance());
        }
        None
    }

    /// Consumes `end`, optionally followed by its matching keyword
    /// (`end if`, `end repeat`, ...).
    fn consume_end(&mut self, kind: TokenKind) -> Option<Token> {
        let end = self.consume(TokenKind::End)?;
        if let Some(token) = self.matches(&[kind]) {
            return Some(token);
        }
        Some(end)
    }

    /// Consumes a statement terminator. At the end of input inside an open
    /// block, asks the reader for more (REPL continuation).
    fn consume_newline(&mut self) -> bool {
        if self.is_at_end() && self.parsing_depth > 0 && self.reader.readable() {
            if let Err(error) = self.reader.read(self.parsing_depth) {
                let range = self.peek().range;
                self.emit_error(Error::new(range, error.to_string()));
                return false;
            }
            self.scanner.reset(self.reader.contents());
            self.tokens[self.index].kind = TokenKind::NewLine;
            self.advance();
            return true;
        }
        if self.is_at_end() {
            return true;
        }
        if self.check(&[TokenKind::NewLine]) {
            self.advance();
            return true;
        }
        false
    }

    /// Skips ahead past the next statement terminator.
    fn synchronize(&mut self) {
        while !self.is_at_end() {
            if self.matches(&[TokenKind::NewLine]).is_some() {
                break;
            }
            self.advance();
        }
    }

    /// Skips ahead until one of `kinds` is next, without consuming it.
    fn synchronize_to(&mut self, kinds: &[TokenKind]) {
        while !self.is_at_end() {
            if self.check(kinds) {
                break;
            }
            self.advance();
        }
    }

    fn emit_error(&mut self, error: Error) {
        self.failed = true;
        self.reporter.report(&error);
    }

    fn checkpoint(&mut self) {
        self.saved.push(self.index);
    }

    fn rewind(&mut self) {
        self.index = self.saved.pop().expect("rewind without checkpoint");
    }

    fn commit(&mut self) {
        self.saved.pop().expect("commit without checkpoint");
    }

    // ---- scopes ----

    fn begin_scope(&mut self, scope: Scope) {
        for signature in &scope.signatures {
            self.grammar.insert(signature);
        }
        for variable in &scope.variables {
            self.variables.insert(variable.clone());
        }
        self.scopes.push(scope);
    }

    /// Pops a scope and rebuilds the grammar and variable set from the
    /// scopes that remain.
    fn end_scope(&mut self) {
        self.scopes.pop();

        self.variables.clear();
        self.variables.insert("it".to_string());
        self.variables.insert("empty".to_string());
        self.grammar = Grammar::new();
        for scope in &self.scopes {
            for signature in &scope.signatures {
                self.grammar.insert(signature);
            }
            for variable in &scope.variables {
                self.variables.insert(variable.clone());
            }
        }
    }

    // ---- signatures ----

    /// Parses a signature: words, `a/b` choices, `(a/b)` options, and
    /// `{name: type, ...}` arguments, with an optional `-> type` result.
    fn parse_signature(&mut self) -> Signature {
        let mut signature = Signature::default();
        let mut argument_names: AHashSet<String> = AHashSet::new();

        loop {
            let token = self.peek();
            if token.is_word() {
                self.advance();
                let mut words = vec![token];
                while self.matches(&[TokenKind::Slash]).is_some() {
                    match self.consume_word() {
                        Some(word) => words.push(word),
                        None => {
                            let range = self.peek().range;
                            self.emit_error(Error::new(range, "expected a word"));
                        }
                    }
                }
                if words.len() > 1 {
                    sort_choice(&mut words);
                    signature.terms.push(Term::Choice(words));
                } else {
                    signature.terms.push(Term::Word(words.remove(0)));
                }
            } else if token.kind == TokenKind::LeftParen {
                self.advance();
                let mut words = Vec::new();
                loop {
                    match self.consume_word() {
                        Some(word) => words.push(word),
                        None => {
                            let range = self.peek().range;
                            self.emit_error(Error::new(range, "expected a word"));
                        }
                    }
                    if self.matches(&[TokenKind::Slash]).is_none() {
                        break;
                    }
                }
                if self.consume(TokenKind::RightParen).is_none() {
                    let range = self.peek().range;
                    self.emit_error(Error::new(range, "expected ')'"));
                }
                signature.terms.push(Term::Option(words));
            } else if token.kind == TokenKind::LeftBrace {
                self.advance();
                let mut argument = Argument::default();
                loop {
                    let mut target = ArgumentTarget::default();
                    if let Some(name) = self.consume_word() {
                        if argument_names.contains(&name.word()) {
                            self.emit_error(Error::new(name.range, "duplicate argument name"));
                        }
                        if name.text != "_" {
                            argument_names.insert(name.word());
                        }
                        target.name = Some(name);
                    }
                    if self.matches(&[TokenKind::Colon]).is_some() {
                        match self.consume_word() {
                            Some(type_name) => target.type_name = Some(type_name),
                            None => {
                                let range = self.peek().range;
                                self.emit_error(Error::new(range, "expected a type name"));
                            }
                        }
                    }
                    argument.targets.push(target);
                    if self.matches(&[TokenKind::Comma]).is_none() {
                        break;
                    }
                }
                if self.consume(TokenKind::RightBrace).is_none() {
                    let range = self.peek().range;
                    self.emit_error(Error::new(range, "expected '}'"));
                }
                signature.terms.push(Term::Argument(argument));
            } else {
                break;
            }
        }

        if signature.terms.is_empty() {
            let range = self.peek().range;
            self.emit_error(Error::new(range, "expected a word, '(', or '{'"));
        }
        if self.matches(&[TokenKind::Arrow]).is_some() {
            match self.consume_word() {
                Some(type_name) => signature.type_name = Some(type_name),
                None => {
                    let range = self.peek().range;
                    self.emit_error(Error::new(range, "expected a type name"));
                }
            }
        }
        if !signature.terms.is_empty() && !signature.is_valid() {
            let range = self.peek().range;
            self.emit_error(Error::new(range, "invalid function signature"));
        }
        signature
    }

    // ---- statements ----

    fn parse_block(&mut self, end_kinds: &[TokenKind]) -> Statement {
        let start = self.peek().range;
        let mut statements = Vec::new();
        while !self.is_at_end() {
            if self.matches(&[TokenKind::NewLine]).is_some() {
                continue;
            }
            if self.check(end_kinds) {
                break;
            }
            if let Some(statement) = self.parse_statement() {
                statements.push(statement);
            }
        }
        let range = start.union(self.peek().range);
        Statement::Block(Block { statements, range })
    }

    fn parse_statement(&mut self) -> Option<Statement> {
        if self.matches(&[TokenKind::Function]).is_some() {
            let was_parsing_repeat = self.parsing_repeat;
            self.parsing_repeat = false;
            let statement = self.parse_function();
            self.parsing_repeat = was_parsing_repeat;
            return statement;
        }
        if self.matches(&[TokenKind::If]).is_some() {
            return self.parse_if();
        }
        if self.matches(&[TokenKind::Try]).is_some() {
            return self.parse_try();
        }
        if self.matches(&[TokenKind::Repeat]).is_some() {
            let was_parsing_repeat = self.parsing_repeat;
            self.parsing_repeat = true;
            let statement = self.parse_repeat();
            self.parsing_repeat = was_parsing_repeat;
            return statement;
        }
        if self.matches(&[TokenKind::Use]).is_some() {
            return self.parse_use();
        }
        if self.matches(&[TokenKind::Using]).is_some() {
            return self.parse_using();
        }

        let statement = self.parse_simple_statement();
        if statement.is_none() {
            self.synchronize();
            return None;
        }
        if !self.consume_newline() {
            let range = self.peek().range;
            self.emit_error(Error::new(range, "expected a new line"));
            self.synchronize();
            return None;
        }
        statement
    }

    fn parse_simple_statement(&mut self) -> Option<Statement> {
        if self.matches(&[TokenKind::Set]).is_some() {
            return self.parse_assignment();
        }
        if self.matches(&[TokenKind::Exit]).is_some() {
            return self.parse_exit();
        }
        if self.matches(&[TokenKind::Next]).is_some() {
            return self.parse_next();
        }
        if self.matches(&[TokenKind::Return]).is_some() {
            return self.parse_return();
        }
        let expression = self.parse_expression()?;
        Some(Statement::Expression(expression))
    }

    fn parse_function(&mut self) -> Option<Statement> {
        self.parsing_depth += 1;
        let start = self.previous().range;

        let signature = self.parse_signature();
        if !self.consume_newline() {
            let range = self.peek().range;
            self.emit_error(Error::new(range, "expected a new line"));
            self.synchronize();
        }

        // The declaration is visible to its own body (recursion) and to the
        // rest of the enclosing scope.
        self.scopes
            .last_mut()
            .expect("scope stack is never empty")
            .signatures
            .push(signature.clone());
        if self.scopes.len() == 1 {
            self.exported.push(signature.clone());
        }
        self.grammar.insert(&signature);

        // A function declaration shadows any variable with the same name.
        let name = signature.name();
        self.variables.remove(&name);
        self.scopes
            .last_mut()
            .expect("scope stack is never empty")
            .variables
            .remove(&name);

        self.begin_scope(Scope::default());
        let targets = signature_targets(&signature);
        for argument in signature.arguments() {
            for target in &argument.targets {
                if let Some(token) = &target.name {
                    self.declare_variable(&token.word());
                }
            }
        }

        let body = self.parse_block(&[TokenKind::End]);
        let mut range = start.union(body.range());
        if self.consume_end(TokenKind::Function).is_some() {
            range = range.union(self.previous().range);
        } else {
            let at = self.peek().range;
            self.emit_error(Error::new(at, "expected 'end'"));
        }

        self.parsing_depth -= 1;
        self.end_scope();
        Some(Statement::FunctionDecl(FunctionDecl {
            signature,
            targets,
            body: Box::new(body),
            range,
        }))
    }

    fn parse_if(&mut self) -> Option<Statement> {
        self.parsing_depth += 1;
        let start = self.previous().range;

        let condition = self.parse_expression();
        if condition.is_none() {
            self.synchronize_to(&[TokenKind::Then, TokenKind::NewLine]);
        }

        self.consume_newline();
        if self.consume(TokenKind::Then).is_none() {
            let range = self.peek().range;
            self.emit_error(Error::new(range, "expected 'then'"));
            self.synchronize();
            self.parsing_depth -= 1;
            return None;
        }

        let mut ended = false;
        let mut saw_else = false;
        let then_branch;
        if self.consume_newline() {
            then_branch = self.parse_block(&[TokenKind::End, TokenKind::Else]);
            match self.matches(&[TokenKind::End, TokenKind::Else]) {
                Some(token) if token.kind == TokenKind::End => {
                    let _ = self.matches(&[TokenKind::If]);
                    self.parsing_depth -= 1;
                    self.consume_newline();
                    ended = true;
                }
                Some(_) => saw_else = true,
                None => {
                    let range = self.peek().range;
                    self.emit_error(Error::new(range, "expected 'end' or 'else'"));
                    self.parsing_depth -= 1;
                }
            }
        } else {
            self.parsing_depth -= 1;
            match self.parse_simple_statement() {
                Some(statement) => {
                    then_branch = statement;
                    self.consume_newline();
                }
                None => {
                    self.synchronize();
                    return None;
                }
            }
        }

        let mut else_branch = None;
        if !ended && (saw_else || self.matches(&[TokenKind::Else]).is_some()) {
            if self.consume_newline() {
                let block = self.parse_block(&[TokenKind::End]);
                if self.consume_end(TokenKind::If).is_none() {
                    let range = self.peek().range;
                    self.emit_error(Error::new(range, "expected 'end'"));
                }
                if saw_else {
                    self.parsing_depth -= 1;
                }
                self.consume_newline();
                else_branch = Some(block);
            } else {
                if saw_else {
                    self.parsing_depth -= 1;
                }
                if self.matches(&[TokenKind::If]).is_some() {
                    else_branch = self.parse_if();
                } else {
                    match self.parse_simple_statement() {
                        Some(statement) => {
                            else_branch = Some(statement);
                            self.consume_newline();
                        }
                        None => {
                            self.synchronize();
                        }
                    }
                }
            }
        }

        let condition = condition?;
        let mut range = start.union(then_branch.range());
        if let Some(else_branch) = &else_branch {
            range = range.union(else_branch.range());
        }
        Some(Statement::If(If {
            condition,
            then_branch: Box::new(then_branch),
            else_branch: else_branch.map(Box::new),
            range,
        }))
    }

    fn parse_try(&mut self) -> Option<Statement> {
        let start = self.previous().range;
        self.parsing_depth += 1;

        let body;
        let mut range = start;
        if self.consume_newline() {
            body = self.parse_block(&[TokenKind::End]);
            range = range.union(body.range());
            if self.consume_end(TokenKind::Try).is_none() {
                let at = self.peek().range;
                self.emit_error(Error::new(at, "expected 'end'"));
            } else {
                range = range.union(self.previous().range);
            }
            self.parsing_depth -= 1;
        } else {
            self.parsing_depth -= 1;
            match self.parse_simple_statement() {
                Some(statement) => {
                    range = range.union(statement.range());
                    body = statement;
                    self.consume_newline();
                }
                None => {
                    self.synchronize();
                    return None;
                }
            }
        }
        Some(Statement::Try(Try {
            body: Box::new(body),
            range,
        }))
    }

    fn parse_use(&mut self) -> Option<Statement> {
        let start = self.previous().range;
        let Some(target) = self.matches(&[TokenKind::StringLiteral, TokenKind::Word]) else {
            let range = self.peek().range;
            self.emit_error(Error::new(range, "expected a string or word"));
            self.synchronize();
            return None;
        };
        let range = start.union(target.range);
        self.consume_newline();

        let source = target.string_value_or_word();
        match self.provider.module(&source) {
            Ok(module) => {
                let scope = self.scopes.last_mut().expect("scope stack is never empty");
                for signature in module.signatures() {
                    scope.signatures.push(signature.clone());
                }
                for signature in module.signatures() {
                    self.grammar.insert(signature);
                }
            }
            Err(error) => self.emit_error(Error::new(range, error.message)),
        }
        Some(Statement::Use(Use { target, range }))
    }

    fn parse_using(&mut self) -> Option<Statement> {
        let start = self.previous().range;
        self.parsing_depth += 1;
        let Some(target) = self.matches(&[TokenKind::StringLiteral, TokenKind::Word]) else {
            let range = self.peek().range;
            self.emit_error(Error::new(range, "expected a string or word"));
            self.synchronize();
            self.parsing_depth -= 1;
            return None;
        };

        let source = target.string_value_or_word();
        match self.provider.module(&source) {
            Ok(module) => self.begin_scope(Scope {
                signatures: module.signatures().to_vec(),
                variables: AHashSet::new(),
            }),
            Err(error) => {
                self.emit_error(Error::new(target.range, error.message));
                self.begin_scope(Scope::default());
            }
        }

        let body;
        let mut range = start;
        if self.consume_newline() {
            body = self.parse_block(&[TokenKind::End]);
            range = range.union(body.range());
            if self.consume_end(TokenKind::Using).is_none() {
                let at = self.peek().range;
                self.emit_error(Error::new(at, "expected 'end'"));
            } else {
                range = range.union(self.previous().range);
            }
            self.parsing_depth -= 1;
        } else {
            self.parsing_depth -= 1;
            match self.parse_simple_statement() {
                Some(statement) => {
                    range = range.union(statement.range());
                    body = statement;
                    self.consume_newline();
                }
                None => {
                    self.synchronize();
                    self.end_scope();
                    return None;
                }
            }
        }
        self.end_scope();
        Some(Statement::Using(Using {
            target,
            body: Box::new(body),
            range,
        }))
    }

    fn parse_repeat(&mut self) -> Option<Statement> {
        let repeat_range = self.previous().range;
        self.parsing_depth += 1;

        if self.check(&[TokenKind::NewLine, TokenKind::Forever]) || self.is_at_end() {
            let _ = self.matches(&[TokenKind::Forever]);
            if !self.consume_newline() {
                let range = self.peek().range;
                self.emit_error(Error::new(range, "expected a new line"));
                self.synchronize();
            }
            return self.parse_repeat_forever(repeat_range);
        }
        if let Some(token) = self.matches(&[TokenKind::While, TokenKind::Until]) {
            return self.parse_repeat_condition(repeat_range, token.kind == TokenKind::Until);
        }
        if self.matches(&[TokenKind::For]).is_some() {
            return self.parse_repeat_for(repeat_range);
        }

        let range = self.peek().range;
        self.emit_error(Error::new(range, "expected 'forever', 'while', 'until', or 'for'"));
        self.synchronize();
        self.parse_repeat_forever(repeat_range)
    }

    fn parse_repeat_forever(&mut self, start: SourceRange) -> Option<Statement> {
        let body = self.parse_block(&[TokenKind::End]);
        let mut range = start.union(body.range());
        if self.consume_end(TokenKind::Repeat).is_some() {
            range = range.union(self.previous().range);
        } else {
            let at = self.peek().range;
            self.emit_error(Error::new(at, "expected 'end'"));
        }
        self.parsing_depth -= 1;
        Some(Statement::Repeat(Repeat {
            body: Box::new(body),
            range,
        }))
    }

    fn parse_repeat_condition(&mut self, start: SourceRange, until: bool) -> Option<Statement> {
        let condition = self.parse_expression();
        if !self.consume_newline() {
            let range = self.peek().range;
            self.emit_error(Error::new(range, "expected a new line"));
            self.synchronize();
        }

        let body = self.parse_block(&[TokenKind::End]);
        let mut range = start.union(body.range());
        if self.consume_end(TokenKind::Repeat).is_some() {
            range = range.union(self.previous().range);
        } else {
            let at = self.peek().range;
            self.emit_error(Error::new(at, "expected 'end'"));
        }
        self.parsing_depth -= 1;
        Some(Statement::RepeatCondition(RepeatCondition {
            condition: condition?,
            until,
            body: Box::new(body),
            range,
        }))
    }

    fn parse_repeat_for(&mut self, start: SourceRange) -> Option<Statement> {
        // `repeat for each x in ...` — `each` is a contextual marker, but
        // may also be a loop variable name: `repeat for each in xs`.
        if self.peek().kind == TokenKind::Word && self.peek().word() == "each" {
            self.checkpoint();
            self.advance();
            if self.peek().is_word() && self.peek().kind != TokenKind::In {
                self.commit();
            } else {
                self.rewind();
            }
        }

        let mut variables = Vec::new();
        loop {
            match self.consume_word() {
                Some(token) => {
                    self.declare_variable(&token.word());
                    let range = token.range;
                    variables.push(Variable {
                        name: token,
                        scope: None,
                        range,
                    });
                }
                None => {
                    let range = self.peek().range;
                    self.emit_error(Error::new(range, "expected a variable name"));
                    break;
                }
            }
            if self.matches(&[TokenKind::Comma]).is_none() {
                break;
            }
        }

        let expression;
        if self.consume(TokenKind::In).is_some() {
            expression = self.parse_expression();
            if !self.consume_newline() {
                let range = self.peek().range;
                self.emit_error(Error::new(range, "expected a new line"));
                self.synchronize();
            }
        } else {
            let range = self.peek().range;
            self.emit_error(Error::new(range, "expected 'in'"));
            self.synchronize_to(&[TokenKind::In, TokenKind::NewLine]);
            expression = None;
        }

        let body = self.parse_block(&[TokenKind::End]);
        let mut range = start.union(body.range());
        if self.consume_end(TokenKind::Repeat).is_some() {
            range = range.union(self.previous().range);
        } else {
            let at = self.peek().range;
            self.emit_error(Error::new(at, "expected 'end'"));
        }
        self.parsing_depth -= 1;
        Some(Statement::RepeatFor(RepeatFor {
            variables,
            expression: expression?,
            body: Box::new(body),
            range,
        }))
    }

    fn parse_assignment(&mut self) -> Option<Statement> {
        let start = self.previous().range;
        let mut targets = Vec::new();

        loop {
            let mut scope = None;
            if self.matches(&[TokenKind::Global]).is_some() {
                scope = Some(VariableScope::Global);
            } else if self.matches(&[TokenKind::Local]).is_some() {
                scope = Some(VariableScope::Local);
            }

            let Some(token) = self.consume_word() else {
                let range = self.peek().range;
                self.emit_error(Error::new(range, "expected a variable name"));
                self.synchronize();
                return None;
            };

            let mut type_name = None;
            let mut subscripts = Vec::new();
            if self.matches(&[TokenKind::Colon]).is_some() {
                match self.consume_word() {
                    Some(word) => type_name = Some(word),
                    None => {
                        let range = self.peek().range;
                        self.emit_error(Error::new(range, "expected a type name"));
                        self.synchronize();
                        return None;
                    }
                }
            } else {
                while self.matches(&[TokenKind::LeftBracket]).is_some() {
                    if self.matches(&[TokenKind::RightBracket]).is_some() {
                        let range = self.previous().range;
                        self.emit_error(Error::new(range, "expected an expression"));
                        break;
                    }
                    let Some(subscript) = self.parse_expression() else {
                        self.synchronize();
                        return None;
                    };
                    subscripts.push(subscript);
                    if self.consume(TokenKind::RightBracket).is_none() {
                        let range = self.peek().range;
                        self.emit_error(Error::new(range, "expected ']'"));
                        return None;
                    }
                }
            }

            if subscripts.is_empty() {
                self.declare_variable(&token.word());
            }
            let token_range = token.range;
            let range = token_range.union(self.previous().range);
            targets.push(AssignmentTarget::Variable(VariableTarget {
                variable: Variable {
                    name: token,
                    scope,
                    range: token_range,
                },
                type_name,
                subscripts,
                range,
            }));

            if self.matches(&[TokenKind::Comma]).is_none() {
                break;
            }
        }

        if targets.len() == 1
            && let AssignmentTarget::Variable(target) = &targets[0]
            && target.variable.name.text == "_"
        {
            self.emit_error(Error::new(target.range, "'_' is not allowed here"));
        }

        if self.consume(TokenKind::To).is_none() {
            let range = self.peek().range;
            self.emit_error(Error::new(range, "expected 'to'"));
            self.synchronize();
            return None;
        }

        let expression = self.parse_expression()?;
        let range = start.union(expression.range);
        Some(Statement::Assignment(Assignment {
            targets,
            expression,
            range,
        }))
    }

    fn parse_exit(&mut self) -> Option<Statement> {
        let start = self.previous().range;
        if !self.parsing_repeat {
            let range = self.peek().range;
            self.emit_error(Error::new(range, "unexpected 'exit' outside of a repeat block"));
        }
        let mut range = start;
        if self.consume(TokenKind::Repeat).is_some() {
            range = range.union(self.previous().range);
        } else {
            let at = self.peek().range;
            self.emit_error(Error::new(at, "expected 'repeat'"));
        }
        Some(Statement::ExitRepeat(range))
    }

    fn parse_next(&mut self) -> Option<Statement> {
        let start = self.previous().range;
        if !self.parsing_repeat {
            let range = self.peek().range;
            self.emit_error(Error::new(range, "unexpected 'next' outside of a repeat block"));
        }
        let mut range = start;
        if self.consume(TokenKind::Repeat).is_some() {
            range = range.union(self.previous().range);
        } else {
            let at = self.peek().range;
            self.emit_error(Error::new(at, "expected 'repeat'"));
        }
        Some(Statement::NextRepeat(range))
    }

    fn parse_return(&mut self) -> Option<Statement> {
        let mut range = self.previous().range;
        let mut expression = None;
        if !self.is_at_end() && !self.check(&[TokenKind::NewLine]) {
            expression = self.parse_expression();
            if let Some(expression) = &expression {
                range = range.union(expression.range);
            }
        }
        Some(Statement::Return(Return { expression, range }))
    }

    // ---- expressions ----

    fn parse_expression(&mut self) -> Option<Expr> {
        self.parse_clause()
    }

    fn parse_clause(&mut self) -> Option<Expr> {
        let mut expression = self.parse_equality()?;
        while let Some(token) = self.matches(&[TokenKind::And, TokenKind::Or]) {
            let operator = if token.kind == TokenKind::And {
                BinaryOperator::And
            } else {
                BinaryOperator::Or
            };
            let rhs = self.parse_equality()?;
            let range = expression.range.union(rhs.range);
            expression = Expr::new(
                ExprKind::Binary {
                    operator,
                    lhs: Box::new(expression),
                    rhs: Box::new(rhs),
                },
                range,
            );
        }
        Some(expression)
    }

    fn parse_equality(&mut self) -> Option<Expr> {
        let mut expression = self.parse_comparison()?;
        while let Some(token) =
            self.matches(&[TokenKind::Equal, TokenKind::NotEqual, TokenKind::Is])
        {
            let operator = match token.kind {
                TokenKind::NotEqual => BinaryOperator::NotEqual,
                TokenKind::Is if self.matches(&[TokenKind::Not]).is_some() => {
                    BinaryOperator::NotEqual
                }
                _ => BinaryOperator::Equal,
            };
            let rhs = self.parse_comparison()?;
            let range = expression.range.union(rhs.range);
            expression = Expr::new(
                ExprKind::Binary {
                    operator,
                    lhs: Box::new(expression),
                    rhs: Box::new(rhs),
                },
                range,
            );
        }
        Some(expression)
    }

    fn parse_comparison(&mut self) -> Option<Expr> {
        let mut expression = self.parse_list()?;
        while let Some(token) = self.matches(&[
            TokenKind::LessThan,
            TokenKind::GreaterThan,
            TokenKind::LessThanOrEqual,
            TokenKind::GreaterThanOrEqual,
        ]) {
            let operator = match token.kind {
                TokenKind::LessThan => BinaryOperator::LessThan,
                TokenKind::GreaterThan => BinaryOperator::GreaterThan,
                TokenKind::LessThanOrEqual => BinaryOperator::LessThanOrEqual,
                _ => BinaryOperator::GreaterThanOrEqual,
            };
            let rhs = self.parse_list()?;
            let range = expression.range.union(rhs.range);
            expression = Expr::new(
                ExprKind::Binary {
                    operator,
                    lhs: Box::new(expression),
                    rhs: Box::new(rhs),
                },
                range,
            );
        }
        Some(expression)
    }

    /// A bare comma-list at expression level builds a list value:
    /// `set x to 1, 2, 3`.
    fn parse_list(&mut self) -> Option<Expr> {
        let expression = self.parse_range()?;
        if !self.check(&[TokenKind::Comma]) {
            return Some(expression);
        }
        let start = expression.range;
        let mut expressions = vec![expression];
        while self.matches(&[TokenKind::Comma]).is_some() {
            expressions.push(self.parse_range()?);
        }
        let range = start.union(self.previous().range);
        Some(Expr::new(ExprKind::ListLiteral(expressions), range))
    }

    fn parse_range(&mut self) -> Option<Expr> {
        let mut expression = self.parse_term()?;
        while let Some(token) = self.matches(&[TokenKind::ThreeDots, TokenKind::OpenRange]) {
            let closed = token.kind == TokenKind::ThreeDots;
            let rhs = self.parse_term()?;
            let range = expression.range.union(rhs.range);
            expression = Expr::new(
                ExprKind::RangeLiteral {
                    start: Box::new(expression),
                    end: Box::new(rhs),
                    closed,
                },
                range,
            );
        }
        Some(expression)
    }

    fn parse_term(&mut self) -> Option<Expr> {
        let mut expression = self.parse_factor()?;
        while let Some(token) = self.matches(&[TokenKind::Plus, TokenKind::Minus]) {
            let operator = if token.kind == TokenKind::Plus {
                BinaryOperator::Plus
            } else {
                BinaryOperator::Minus
            };
            let rhs = self.parse_factor()?;
            let range = expression.range.union(rhs.range);
            expression = Expr::new(
                ExprKind::Binary {
                    operator,
                    lhs: Box::new(expression),
                    rhs: Box::new(rhs),
                },
                range,
            );
        }
        Some(expression)
    }

    fn parse_factor(&mut self) -> Option<Expr> {
        let mut expression = self.parse_exponent()?;
        while let Some(token) =
            self.matches(&[TokenKind::Star, TokenKind::Slash, TokenKind::Percent])
        {
            let operator = match token.kind {
                TokenKind::Star => BinaryOperator::Multiply,
                TokenKind::Slash => BinaryOperator::Divide,
                _ => BinaryOperator::Modulo,
            };
            let rhs = self.parse_exponent()?;
            let range = expression.range.union(rhs.range);
            expression = Expr::new(
                ExprKind::Binary {
                    operator,
                    lhs: Box::new(expression),
                    rhs: Box::new(rhs),
                },
                range,
            );
        }
        Some(expression)
    }

    fn parse_exponent(&mut self) -> Option<Expr> {
        let mut expression = self.parse_call(false)?;
        while self.matches(&[TokenKind::Carrot]).is_some() {
            let rhs = self.parse_call(false)?;
            let range = expression.range.union(rhs.range);
            expression = Expr::new(
                ExprKind::Binary {
                    operator: BinaryOperator::Exponent,
                    lhs: Box::new(expression),
                    rhs: Box::new(rhs),
                },
                range,
            );
        }
        Some(expression)
    }

    /// Parses a call by walking the grammar trie.
    ///
    /// `prefix = true` tries call forms that begin with a word
    /// (`sort xs`, `the size of xs`); `prefix = false` first parses an
    /// expression and then tries call forms that begin with an argument
    /// (`x is an integer`, `xs contains 3`).
    fn parse_call(&mut self, prefix: bool) -> Option<Expr> {
        let start = self.peek().range.start;
        let mut matched = Signature::default();
        let mut arguments: Vec<Expr> = Vec::new();
        let mut word_ranges: Vec<SourceRange> = Vec::new();
        let mut node = self.grammar.root();

        if prefix {
            let token = self.peek();
            if !token.is_word() {
                return self.parse_unary();
            }
            // Favor parsing known variable names over call words.
            let word = token.word();
            if self.variables.contains(&word) && self.grammar.argument(node).is_some() {
                return self.parse_unary();
            }
            self.advance();
            let Some(next) = self.grammar.term(node, &word) else {
                self.emit_error(Error::new(
                    token.range,
                    format!("unknown expression \"{}\"", token.text),
                ));
                return None;
            };
            matched.terms.push(Term::Word(token.clone()));
            word_ranges.push(token.range);
            node = next;
        } else {
            // Prefix call forms bind more tightly; try them first.
            let expression = self.parse_call(true)?;
            matched.terms.push(Term::Argument(Argument::anonymous()));
            arguments.push(expression);
            node = self
                .grammar
                .argument(node)
                .expect("the grammar root always has an argument edge");
        }

        // Consume words and argument expressions for as long as the trie has
        // a continuation; prefer literal words (longest match).
        loop {
            let token = self.peek();
            if !token.is_primary() {
                break;
            }
            if token.is_word() {
                let word = token.word();
                if self.variables.contains(&word)
                    && let Some(argument_node) = self.grammar.argument(node)
                {
                    let argument = self.parse_call_argument(argument_node)?;
                    arguments.push(argument);
                    matched.terms.push(Term::Argument(Argument::anonymous()));
                    node = argument_node;
                    continue;
                }
                if let Some(next) = self.grammar.term(node, &word) {
                    matched.terms.push(Term::Word(token.clone()));
                    word_ranges.push(token.range);
                    node = next;
                    self.advance();
                    continue;
                }
            }
            if let Some(argument_node) = self.grammar.argument(node) {
                let argument = self.parse_call_argument(argument_node)?;
                arguments.push(argument);
                matched.terms.push(Term::Argument(Argument::anonymous()));
                node = argument_node;
                continue;
            }
            break;
        }

        // Nothing beyond the initial expression matched; this was not a
        // call after all.
        if arguments.len() == 1 && matched.terms.len() == 1 {
            return Some(arguments.pop().expect("exactly one argument"));
        }

        let range = SourceRange::new(start, self.previous().range.end);
        match self.grammar.signature(node).cloned() {
            Some(signature) => Some(Expr::new(
                ExprKind::Call(Call {
                    signature,
                    arguments,
                    word_ranges,
                }),
                range,
            )),
            None => {
                let candidates = self.grammar.signatures_under(node, 5);
                self.emit_error(Error::new(range, no_matching_function(&matched, &candidates)));
                None
            }
        }
    }

    /// A trailing argument (at a trie leaf) may consume a whole comma-list;
    /// an interior argument binds at call level.
    fn parse_call_argument(&mut self, argument_node: NodeId) -> Option<Expr> {
        if self.grammar.is_leaf(argument_node) {
            self.parse_list()
        } else {
            self.parse_call(false)
        }
    }

    fn parse_unary(&mut self) -> Option<Expr> {
        if let Some(token) = self.matches(&[TokenKind::Minus, TokenKind::Not]) {
            let operator = if token.kind == TokenKind::Minus {
                UnaryOperator::Minus
            } else {
                UnaryOperator::Not
            };
            let expr = self.parse_unary()?;
            let range = token.range.union(expr.range);
            return Some(Expr::new(
                ExprKind::Unary {
                    operator,
                    expr: Box::new(expr),
                },
                range,
            ));
        }
        self.parse_subscript()
    }

    fn parse_subscript(&mut self) -> Option<Expr> {
        let mut expression = self.parse_primary()?;
        while self.matches(&[TokenKind::LeftBracket]).is_some() {
            if self.matches(&[TokenKind::RightBracket]).is_some() {
                let range = self.previous().range;
                self.emit_error(Error::new(range, "expected an expression"));
                break;
            }
            let index = self.parse_expression()?;
            if self.consume(TokenKind::RightBracket).is_none() {
                let range = self.peek().range;
                self.emit_error(Error::new(range, "expected ']'"));
                break;
            }
            let range = expression.range.union(self.previous().range);
            expression = Expr::new(
                ExprKind::Binary {
                    operator: BinaryOperator::Subscript,
                    lhs: Box::new(expression),
                    rhs: Box::new(index),
                },
                range,
            );
        }
        Some(expression)
    }

    fn parse_primary(&mut self) -> Option<Expr> {
        if let Some(token) = self.matches(&[
            TokenKind::BoolLiteral,
            TokenKind::IntLiteral,
            TokenKind::FloatLiteral,
            TokenKind::StringLiteral,
            TokenKind::Empty,
        ]) {
            let range = token.range;
            return Some(Expr::new(ExprKind::Literal(token), range));
        }

        if self.matches(&[TokenKind::OpenInterpolation]).is_some() {
            let interpolating = self.scanner.interpolating;
            let string_terminal = self.scanner.string_terminal;
            let ignore_newlines = self.scanner.ignore_newlines;
            self.scanner.interpolating = true;
            self.scanner.string_terminal = self.previous().opening_string_terminal();
            self.scanner.ignore_newlines = true;

            let interpolation = self.parse_interpolation();

            self.scanner.interpolating = interpolating;
            self.scanner.string_terminal = string_terminal;
            self.scanner.ignore_newlines = ignore_newlines;
            return interpolation;
        }

        if self.matches(&[TokenKind::LeftParen]).is_some() {
            let ignore_newlines = self.scanner.ignore_newlines;
            self.scanner.ignore_newlines = true;

            let grouping = self.parse_grouping();

            self.scanner.ignore_newlines = ignore_newlines;
            return grouping;
        }

        if self.matches(&[TokenKind::LeftBracket]).is_some() {
            let ignore_newlines = self.scanner.ignore_newlines;
            self.scanner.ignore_newlines = true;

            let container = self.parse_container_literal();

            self.scanner.ignore_newlines = ignore_newlines;
            return container;
        }

        let token = self.peek();
        if token.is_word()
            || token.kind == TokenKind::Global
            || token.kind == TokenKind::Local
        {
            return self.parse_variable();
        }

        if token.is_end_of_statement() {
            self.emit_error(Error::new(token.range, "expected an expression"));
            return None;
        }

        self.emit_error(Error::new(
            token.range,
            format!("unexpected token {}", token.description()),
        ));
        None
    }

    fn parse_interpolation(&mut self) -> Option<Expr> {
        let left = self.previous();
        let start = left.range;

        if self.matches(&[TokenKind::ClosedInterpolation]).is_some() {
            let range = self.previous().range;
            self.emit_error(Error::new(range, "empty interpolation"));
            return None;
        }

        let expr = self.parse_expression()?;

        let right = if self.matches(&[TokenKind::ClosedInterpolation]).is_some() {
            let token = self.previous();
            let range = token.range;
            Expr::new(ExprKind::Literal(token), range)
        } else if self.matches(&[TokenKind::Interpolation]).is_some() {
            self.parse_interpolation()?
        } else {
            let range = self.peek().range;
            self.emit_error(Error::new(range, "unterminated string interpolation"));
            return None;
        };

        let range = start.union(right.range);
        Some(Expr::new(
            ExprKind::Interpolation {
                left,
                expr: Box::new(expr),
                right: Box::new(right),
            },
            range,
        ))
    }

    fn parse_variable(&mut self) -> Option<Expr> {
        let start = self.peek().range;
        let mut scope = None;
        if self.matches(&[TokenKind::Global]).is_some() {
            scope = Some(VariableScope::Global);
        } else if self.matches(&[TokenKind::Local]).is_some() {
            scope = Some(VariableScope::Local);
        }

        let Some(token) = self.consume_word() else {
            let range = self.peek().range;
            self.emit_error(Error::new(range, "expected a variable name"));
            return None;
        };
        if token.text == "_" {
            self.emit_error(Error::new(token.range, "'_' is not allowed here"));
        }
        let range = start.union(token.range);
        Some(Expr::new(
            ExprKind::Variable(Variable {
                name: token,
                scope,
                range,
            }),
            range,
        ))
    }

    fn parse_grouping(&mut self) -> Option<Expr> {
        let start = self.previous().range;
        if self.matches(&[TokenKind::RightParen]).is_some() {
            let range = self.previous().range;
            self.emit_error(Error::new(range, "expected an expression"));
            return None;
        }
        let expression = self.parse_expression()?;
        if self.consume(TokenKind::RightParen).is_none() {
            let range = self.peek().range;
            self.emit_error(Error::new(range, "expected ')'"));
        }
        let range = start.union(self.previous().range);
        Some(Expr::new(ExprKind::Grouping(Box::new(expression)), range))
    }

    fn parse_container_literal(&mut self) -> Option<Expr> {
        let start = self.previous().range;

        if self.matches(&[TokenKind::RightBracket]).is_some() {
            let range = start.union(self.previous().range);
            return Some(Expr::new(ExprKind::ListLiteral(Vec::new()), range));
        }
        if self.matches(&[TokenKind::Colon]).is_some() {
            if self.consume(TokenKind::RightBracket).is_none() {
                let range = self.peek().range;
                self.emit_error(Error::new(range, "expected ']'"));
                return None;
            }
            let range = start.union(self.previous().range);
            return Some(Expr::new(ExprKind::DictionaryLiteral(Vec::new()), range));
        }

        let first = self.parse_term()?;
        let expression = if self.matches(&[TokenKind::Colon]).is_some() {
            let value = self.parse_term()?;
            let mut entries = vec![(first, value)];
            while self.matches(&[TokenKind::Comma]).is_some() {
                let key = self.parse_term()?;
                if self.consume(TokenKind::Colon).is_none() {
                    let range = self.peek().range;
                    self.emit_error(Error::new(range, "expected ':'"));
                    return None;
                }
                let value = self.parse_term()?;
                entries.push((key, value));
            }
            ExprKind::DictionaryLiteral(entries)
        } else if self.check(&[TokenKind::Comma]) {
            let mut expressions = vec![first];
            while self.matches(&[TokenKind::Comma]).is_some() {
                expressions.push(self.parse_term()?);
            }
            ExprKind::ListLiteral(expressions)
        } else if self.check(&[TokenKind::RightBracket]) {
            ExprKind::ListLiteral(vec![first])
        } else {
            let range = self.peek().range;
            self.emit_error(Error::new(range, "expected ':', ',', or ']'"));
            return None;
        };

        if self.consume(TokenKind::RightBracket).is_none() {
            let range = self.peek().range;
            self.emit_error(Error::new(range, "expected ']'"));
        }
        let range = start.union(self.previous().range);
        Some(Expr::new(expression, range))
    }
}

/// Builds the parameter-binding targets from a declared signature, one per
/// argument slot. Unnamed slots bind to the discard name.
fn signature_targets(signature: &Signature) -> Vec<AssignmentTarget> {
    signature
        .arguments()
        .map(|argument| {
            if argument.targets.len() == 1 {
                argument_target(&argument.targets[0])
            } else {
                let targets: Vec<AssignmentTarget> =
                    argument.targets.iter().map(argument_target).collect();
                AssignmentTarget::Structured(StructuredTarget {
                    targets,
                    range: SourceRange::default(),
                })
            }
        })
        .collect()
}

fn argument_target(target: &ArgumentTarget) -> AssignmentTarget {
    let name = target.name.clone().unwrap_or_else(|| {
        Token::new(TokenKind::Word, SourceRange::default(), "_".to_string())
    });
    let range = name.range;
    AssignmentTarget::Variable(VariableTarget {
        variable: Variable {
            name,
            scope: None,
            range,
        },
        type_name: target.type_name.clone(),
        subscripts: Vec::new(),
        range,
    })
}

fn no_matching_function(matched: &Signature, candidates: &[Signature]) -> String {
    let mut message = format!("no matching function \"{}\"", matched.name());
    if candidates.len() == 1 {
        message.push_str(&format!(". Did you mean \"{}\"?", candidates[0].name()));
    } else if !candidates.is_empty() && candidates.len() <= 5 {
        message.push_str("\nPossible matches:\n");
        for candidate in candidates {
            message.push_str(&format!("  {}\n", candidate.name()));
        }
    }
    message
}
