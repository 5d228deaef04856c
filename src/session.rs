//! Interactive sessions: named definitions and the name-resolution hook.
//!
//! A [`Session`] owns the root [`ScopeTable`] all of its input is parsed against and
//! an ordered map of definitions. Definitions are stored as expressions and expanded
//! lazily by [`Session::resolve`], the hook handed to the evaluator, so redefining a
//! name affects every later use of it.
//!
//! ```text
//! let NAME = EXPR      ; store EXPR as parsed
//! let NAME := EXPR     ; store EXPR with every defined name expanded
//! let NAME ::= EXPR    ; store the normal form of EXPR
//! :load FILE           ; run every `let` line of FILE
//! :names               ; list all definitions
//! :name NAME           ; show one definition
//! :undef NAME          ; remove one definition
//! EXPR                 ; evaluate, print, and store the result as `%`
//! ```

use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;

use crate::ast::{Expr, Expression, to_string};
use crate::encoding::to_builtin;
use crate::evaluator::{EvalFlags, Resolver, evaluate, refresh_instances};
use crate::parser::{IDENTIFIER_SPECIAL_CHARS, parse};
use crate::scope::ScopeTable;
use crate::{DEFAULT_DEPTH_LIMIT, DEFINITION_DEPTH_LIMIT, Error, ParseError, ParseErrorKind};

/// Name under which the result of the last evaluation is stored
pub const LAST_VALUE: &str = "%";

const LET_USAGE: &str = "Syntax: let NAME [:]= EXPRESSION";

/// How much work `let` does before storing a definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionMode {
    /// `=`: store the parsed expression
    Raw,
    /// `:=`: expand defined names, reduce nothing
    Expand,
    /// `::=` (or more colons): store the normal form
    Normalize,
}

/// Result of evaluating one expression
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub normal_form: Expr,
    /// Tagged value the normal form encodes, if it is a recognized encoding
    pub builtin: Option<Expr>,
}

#[derive(Debug)]
pub struct Session {
    scope: Rc<ScopeTable>,
    definitions: BTreeMap<String, Expr>,
    depth_limit: usize,
    trace: bool,
}

impl Session {
    pub fn new() -> Self {
        Session {
            scope: Rc::new(ScopeTable::new()),
            definitions: BTreeMap::new(),
            depth_limit: DEFAULT_DEPTH_LIMIT,
            trace: false,
        }
    }

    /// Override the evaluation budget used for plain expressions
    pub fn with_depth_limit(mut self, depth_limit: usize) -> Self {
        self.depth_limit = depth_limit;
        self
    }

    /// Trace every reduction step to stderr
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    pub fn scope(&self) -> &Rc<ScopeTable> {
        &self.scope
    }

    pub fn definitions(&self) -> &BTreeMap<String, Expr> {
        &self.definitions
    }

    /// Render an expression with this session's binder names
    pub fn display(&self, expr: &Expression) -> String {
        to_string(expr, &self.scope)
    }

    /// Name-resolution hook.
    ///
    /// An untagged free reference naming a builtin constant becomes that constant.
    /// A defined name expands to a copy of its definition with fresh binder instances,
    /// and when that copy is itself a bare name the chain is followed until a name
    /// repeats. Any other node is returned unchanged.
    pub fn resolve(&self, expr: &Expr) -> Expr {
        let Expression::Free { name, value: None } = &**expr else {
            return Rc::clone(expr);
        };

        let mut current = Rc::clone(expr);
        let mut name = name.clone();
        let mut seen = HashSet::new();

        loop {
            if let Some(constant) = self.scope.builtins().lookup(&name) {
                return refresh_instances(&constant, self.scope.fresh_instance());
            }
            // Circular definitions stop expanding
            if seen.contains(&name) {
                return current;
            }
            let Some(definition) = self.definitions.get(&name) else {
                return current;
            };

            current = refresh_instances(definition, self.scope.fresh_instance());
            match &*current {
                Expression::Free {
                    name: next,
                    value: None,
                } => {
                    seen.insert(std::mem::replace(&mut name, next.clone()));
                }
                _ => return current,
            }
        }
    }

    fn run(&self, expr: &Expr, depth_limit: usize, flags: EvalFlags) -> Result<Expr, Error> {
        let resolver: &Resolver<'_> = &|e: &Expr| self.resolve(e);
        evaluate(expr, Some(resolver), depth_limit, flags.with_trace(self.trace))
    }

    /// Parse, normalize and store the result as `%`
    pub fn evaluate(&mut self, text: &str) -> Result<Evaluation, Error> {
        let expr = parse(text, &self.scope)?;
        let normal_form = self.run(&expr, self.depth_limit, EvalFlags::LAZY)?;
        let builtin = to_builtin(&normal_form, &self.scope);

        self.definitions
            .insert(LAST_VALUE.to_owned(), Rc::clone(&normal_form));
        Ok(Evaluation {
            normal_form,
            builtin,
        })
    }

    /// Store a definition and return the stored expression
    pub fn define_expression(
        &mut self,
        name: &str,
        text: &str,
        mode: DefinitionMode,
    ) -> Result<Expr, Error> {
        let parsed = parse(text, &self.scope)?;
        let expr = match mode {
            DefinitionMode::Raw => parsed,
            DefinitionMode::Expand => {
                self.run(&parsed, DEFINITION_DEPTH_LIMIT, EvalFlags::RESOLVE_ONLY)?
            }
            DefinitionMode::Normalize => {
                self.run(&parsed, DEFINITION_DEPTH_LIMIT, EvalFlags::NONE)?
            }
        };
        self.definitions.insert(name.to_owned(), Rc::clone(&expr));
        Ok(expr)
    }

    /// Run a `let` command (with or without the leading keyword) and return its echo
    pub fn define(&mut self, line: &str) -> Result<String, Error> {
        let rest = match split_command(line) {
            (keyword, rest) if keyword.eq_ignore_ascii_case("let") => rest,
            _ => line,
        };
        let (name, mode, text) = parse_let(rest)?;
        let expr = self.define_expression(name, text, mode)?;
        Ok(format!("{name} = {}", self.display(&expr)))
    }

    /// Run every `let` line of a file, reporting each line's outcome
    pub fn load(&mut self, path: &str) -> Result<String, Error> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| Error::Io(format!("cannot read '{path}': {e}")))?;

        let output: Vec<String> = source
            .lines()
            .filter(|line| split_command(line).0.eq_ignore_ascii_case("let"))
            .map(|line| self.define(line).unwrap_or_else(|e| format!("Error: {e}")))
            .collect();
        Ok(output.join("\n"))
    }

    /// Show one definition
    pub fn show(&self, name: &str) -> Result<String, Error> {
        self.definitions
            .get(name)
            .map(|expr| format!("{name} = {}", self.display(expr)))
            .ok_or_else(|| Error::UndefinedName(name.to_owned()))
    }

    pub fn undefine(&mut self, name: &str) -> Result<(), Error> {
        self.definitions
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::UndefinedName(name.to_owned()))
    }

    /// Dispatch one line of input and return the text to print
    pub fn execute(&mut self, line: &str) -> Result<String, Error> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(String::new());
        }

        let (command, argument) = split_command(line);
        match command.to_ascii_lowercase().as_str() {
            "let" => self.define(line),
            ":load" => self.load(argument),
            ":names" => Ok(self
                .definitions
                .keys()
                .filter_map(|name| self.show(name).ok())
                .collect::<Vec<_>>()
                .join("\n")),
            ":name" => self.show(argument),
            ":undef" => self.undefine(argument).map(|()| String::new()),
            _ => {
                let evaluation = self.evaluate(line)?;
                let mut output = self.display(&evaluation.normal_form);
                if let Some(builtin) = &evaluation.builtin {
                    output.push_str("\n-> ");
                    output.push_str(&self.display(builtin));
                }
                Ok(output)
            }
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// First whitespace-separated word and the trimmed remainder
fn split_command(line: &str) -> (&str, &str) {
    let line = line.trim();
    match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    }
}

fn usage_error() -> Error {
    Error::ParseError(ParseError::from_message(
        ParseErrorKind::InvalidSyntax,
        LET_USAGE,
    ))
}

/// Split `NAME [:]= EXPRESSION` into its parts
fn parse_let(text: &str) -> Result<(&str, DefinitionMode, &str), Error> {
    let (lhs, rhs) = text.split_once('=').ok_or_else(usage_error)?;

    let mode = match lhs.chars().filter(|c| *c == ':').count() {
        0 => DefinitionMode::Raw,
        1 => DefinitionMode::Expand,
        _ => DefinitionMode::Normalize,
    };
    let name = lhs.trim_end().trim_end_matches(':').trim();
    let rhs = rhs.trim();

    let valid_name = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || IDENTIFIER_SPECIAL_CHARS.contains(c));
    if !valid_name || rhs.is_empty() {
        return Err(usage_error());
    }
    Ok((name, mode, rhs))
}
