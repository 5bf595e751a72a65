//! AST pretty printer.
//!
//! Reconstructs canonical surface syntax from a parsed program; used by the
//! CLI's `-p` flag and handy in tests.

use crate::{
    ast::{
        Assignment, AssignmentTarget, BinaryOperator, Call, Expr, ExprKind, Statement,
        UnaryOperator, Variable, VariableScope,
    },
    signature::{Signature, Term},
};

/// Renders a statement tree as source text.
#[must_use]
pub fn print_statement(statement: &Statement) -> String {
    let mut printer = PrettyPrinter::default();
    printer.statement(statement);
    printer.out
}

#[derive(Default)]
struct PrettyPrinter {
    out: String,
    indent: usize,
}

impl PrettyPrinter {
    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Block(block) => {
                for statement in &block.statements {
                    self.statement(statement);
                }
            }
            Statement::FunctionDecl(decl) => {
                self.line(&format!("function {}", signature_source(&decl.signature)));
                self.indented(&decl.body);
                self.line("end function");
            }
            Statement::If(statement) => {
                self.line(&format!("if {} then", expression(&statement.condition)));
                self.indented(&statement.then_branch);
                if let Some(else_branch) = &statement.else_branch {
                    self.line("else");
                    self.indented(else_branch);
                }
                self.line("end if");
            }
            Statement::Try(statement) => {
                self.line("try");
                self.indented(&statement.body);
                self.line("end try");
            }
            Statement::Use(statement) => {
                self.line(&format!("use {}", statement.target.text));
            }
            Statement::Using(statement) => {
                self.line(&format!("using {}", statement.target.text));
                self.indented(&statement.body);
                self.line("end using");
            }
            Statement::Assignment(statement) => {
                self.line(&assignment(statement));
            }
            Statement::Expression(expr) => {
                self.line(&expression(expr));
            }
            Statement::Return(statement) => match &statement.expression {
                Some(expr) => self.line(&format!("return {}", expression(expr))),
                None => self.line("return"),
            },
            Statement::Repeat(statement) => {
                self.line("repeat");
                self.indented(&statement.body);
                self.line("end repeat");
            }
            Statement::RepeatCondition(statement) => {
                let keyword = if statement.until { "until" } else { "while" };
                self.line(&format!(
                    "repeat {keyword} {}",
                    expression(&statement.condition)
                ));
                self.indented(&statement.body);
                self.line("end repeat");
            }
            Statement::RepeatFor(statement) => {
                let names: Vec<&str> = statement
                    .variables
                    .iter()
                    .map(|variable| variable.name.text.as_str())
                    .collect();
                self.line(&format!(
                    "repeat for each {} in {}",
                    names.join(", "),
                    expression(&statement.expression)
                ));
                self.indented(&statement.body);
                self.line("end repeat");
            }
            Statement::ExitRepeat(_) => self.line("exit repeat"),
            Statement::NextRepeat(_) => self.line("next repeat"),
        }
    }

    fn indented(&mut self, statement: &Statement) {
        self.indent += 1;
        self.statement(statement);
        self.indent -= 1;
    }
}

fn assignment(statement: &Assignment) -> String {
    let targets: Vec<String> = statement.targets.iter().map(target).collect();
    format!(
        "set {} to {}",
        targets.join(", "),
        expression(&statement.expression)
    )
}

fn target(value: &AssignmentTarget) -> String {
    match value {
        AssignmentTarget::Variable(target) => {
            let mut rendered = variable(&target.variable);
            if let Some(type_name) = &target.type_name {
                rendered.push_str(&format!(": {}", type_name.text));
            }
            for subscript in &target.subscripts {
                rendered.push_str(&format!("[{}]", expression(subscript)));
            }
            rendered
        }
        AssignmentTarget::Structured(structured) => {
            let nested: Vec<String> = structured.targets.iter().map(target).collect();
            format!("({})", nested.join(", "))
        }
    }
}

fn variable(variable: &Variable) -> String {
    match variable.scope {
        Some(VariableScope::Global) => format!("global {}", variable.name.text),
        Some(VariableScope::Local) => format!("local {}", variable.name.text),
        None => variable.name.text.clone(),
    }
}

fn expression(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Call(call) => call_source(call),
        ExprKind::Binary { operator, lhs, rhs } => {
            if *operator == BinaryOperator::Subscript {
                format!("{}[{}]", expression(lhs), expression(rhs))
            } else {
                format!(
                    "{} {} {}",
                    expression(lhs),
                    operator.symbol(),
                    expression(rhs)
                )
            }
        }
        ExprKind::Unary { operator, expr } => match operator {
            UnaryOperator::Minus => format!("-{}", expression(expr)),
            UnaryOperator::Not => format!("not {}", expression(expr)),
        },
        ExprKind::Grouping(inner) => format!("({})", expression(inner)),
        ExprKind::Variable(v) => variable(v),
        ExprKind::Literal(token) => token.text.clone(),
        ExprKind::ListLiteral(expressions) => {
            let rendered: Vec<String> = expressions.iter().map(expression).collect();
            format!("[{}]", rendered.join(", "))
        }
        ExprKind::DictionaryLiteral(entries) => {
            if entries.is_empty() {
                return "[:]".to_string();
            }
            let rendered: Vec<String> = entries
                .iter()
                .map(|(key, value)| format!("{}: {}", expression(key), expression(value)))
                .collect();
            format!("[{}]", rendered.join(", "))
        }
        ExprKind::RangeLiteral { start, end, closed } => format!(
            "{}{}{}",
            expression(start),
            if *closed { "..." } else { "..<" },
            expression(end)
        ),
        ExprKind::Interpolation { left, expr, right } => {
            format!("{}{}{}", left.text, expression(expr), expression(right))
        }
    }
}

/// Renders a call by interleaving its signature's words with the argument
/// expressions in source order.
fn call_source(call: &Call) -> String {
    let mut parts = Vec::new();
    let mut arguments = call.arguments.iter();
    for term in &call.signature.terms {
        match term {
            Term::Word(token) => parts.push(token.text.clone()),
            Term::Choice(tokens) | Term::Option(tokens) => {
                if let Some(first) = tokens.first() {
                    parts.push(first.text.clone());
                }
            }
            Term::Argument(_) => {
                if let Some(argument) = arguments.next() {
                    parts.push(expression(argument));
                }
            }
        }
    }
    parts.join(" ")
}

fn signature_source(signature: &Signature) -> String {
    let parts: Vec<String> = signature
        .terms
        .iter()
        .map(|term| match term {
            Term::Word(token) => token.text.clone(),
            Term::Choice(tokens) => {
                let words: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
                words.join("/")
            }
            Term::Option(tokens) => {
                let words: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
                format!("({})", words.join("/"))
            }
            Term::Argument(argument) => {
                let targets: Vec<String> = argument
                    .targets
                    .iter()
                    .map(|target| {
                        let mut rendered = target
                            .name
                            .as_ref()
                            .map_or(String::new(), |name| name.text.clone());
                        if let Some(type_name) = &target.type_name {
                            rendered.push_str(&format!(": {}", type_name.text));
                        }
                        rendered
                    })
                    .collect();
                format!("{{{}}}", targets.join(", "))
            }
        })
        .collect();
    parts.join(" ")
}
