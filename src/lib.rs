//! LambdaXP - untyped lambda calculus interpreter
//!
//! This crate parses lambda terms, normalizes them under a configurable reduction
//! strategy, and recognizes the common Church encodings (booleans, numerals, lists,
//! pairs, optionals) so that normal forms can be displayed as native values.
//!
//! ## Syntax
//!
//! ```text
//! \x.x                 ; identity
//! \x,y.x               ; sugar for \x.\y.x
//! (\x.\y.x) a b        ; application is left-associative
//! _Successor _Zero     ; builtin constants
//! ```
//!
//! ## Variable identity
//!
//! Bound variables are not compared by name. Every binder carries a
//! [`ast::SymbolRef`] made of the id handed out by the [`scope::ScopeTable`] when
//! the binder was parsed and an instance counter. Whoever expands a stored
//! definition into a new use site re-stamps its binders with a fresh instance
//! ([`evaluator::refresh_instances`]), which keeps plain structural substitution
//! capture-free without ever renaming variables.
//!
//! ## Modules
//!
//! - `ast`: expression model and canonical display
//! - `scope`: binder registration and the per-session root state
//! - `builtinops`: builtin constants, tagged values and native operations
//! - `evaluator`: normal-order reduction engine
//! - `encoding`: Church-encoding recognition
//! - `parser`: text to expression trees (feature `parser`)
//! - `session`: definitions and the name-resolution hook (feature `parser`)

use std::fmt;

/// Maximum parsing depth to prevent stack overflow attacks
/// This limits deeply nested parentheses and abstractions in the parser
pub const MAX_PARSE_DEPTH: usize = 128;

/// Evaluation budget used for interactive input.
/// Every call of the engine's core step consumes one unit; the budget is shared
/// by the whole evaluation and is the only bound on non-terminating terms. The
/// engine grows its stack on demand, so callers need no particular thread stack size.
pub const DEFAULT_DEPTH_LIMIT: usize = 20_000;

/// Evaluation budget used when a definition is expanded or normalized at `let` time
pub const DEFINITION_DEPTH_LIMIT: usize = 1_000;

/// Categorizes the different kinds of parsing errors.
#[derive(Debug, PartialEq, Clone)]
pub enum ParseErrorKind {
    /// Invalid or unexpected syntax (missing '.', stray ')', empty input)
    InvalidSyntax,
    /// A character that cannot start or continue any token
    UnboundToken,
    /// Input ended before the expression was complete (unclosed parens, dangling binder list)
    Incomplete,
    /// Expression nesting exceeded the maximum parse depth
    TooDeeplyNested,
    /// Extra input found after a complete, valid expression
    TrailingContent,
}

/// A structured error providing detailed information about a parsing failure.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Context snippet from the input showing where the error occurred (max 100 chars)
    pub context: Option<String>,
    /// The problematic token or character encountered, if identifiable
    pub found: Option<String>,
}

impl ParseError {
    /// Create a ParseError with all fields
    pub fn new(
        kind: ParseErrorKind,
        message: impl Into<String>,
        context: Option<String>,
        found: Option<String>,
    ) -> Self {
        ParseError {
            kind,
            message: message.into(),
            context,
            found,
        }
    }

    /// Create a simple ParseError with a kind and message but no context
    pub fn from_message(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, None, None)
    }

    /// Create a ParseError with context extracted from input at a given offset
    pub fn with_context(
        kind: ParseErrorKind,
        message: impl Into<String>,
        input: &str,
        error_offset: usize,
    ) -> Self {
        Self::with_context_and_found(kind, message, input, error_offset, None)
    }

    /// Create a ParseError with context and found token
    pub fn with_context_and_found(
        kind: ParseErrorKind,
        message: impl Into<String>,
        input: &str,
        error_offset: usize,
        found: Option<String>,
    ) -> Self {
        const MAX_CONTEXT: usize = 100;

        let context_start = error_offset.saturating_sub(20);
        let context_str: String = input
            .chars()
            .skip(context_start)
            .take(MAX_CONTEXT)
            .collect();

        let mut display_context = String::new();
        if context_start > 0 {
            display_context.push_str("[...]");
        }
        display_context.push_str(&context_str);
        if context_start + context_str.len() < input.len() {
            display_context.push_str("[...]");
        }

        let display_context = display_context.replace('\n', "\\n").replace('\r', "");

        Self::new(kind, message, Some(display_context), found)
    }
}

/// Error types for the interpreter
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    ParseError(ParseError),
    /// A binder name registered twice in the same scope frame
    DuplicateBinding(String),
    /// The evaluation budget ran out before a normal form was reached
    DepthExceeded { limit: usize },
    /// A session command referred to a definition that does not exist
    UndefinedName(String),
    /// Reading a source file failed
    Io(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ParseError(e) => {
                write!(f, "ParseError: {}", e.message)?;
                if let Some(found) = &e.found {
                    write!(f, "\nFound: {found}")?;
                }
                if let Some(context) = &e.context {
                    write!(f, "\nContext: {context}")?;
                }
                Ok(())
            }
            Error::DuplicateBinding(name) => write!(
                f,
                "DuplicateBinding: the name '{name}' is already used in this context"
            ),
            Error::DepthExceeded { limit } => {
                write!(f, "DepthExceeded: depth limit exceeded (limit: {limit})")
            }
            Error::UndefinedName(name) => write!(f, "'{name}' is not defined."),
            Error::Io(msg) => write!(f, "IoError: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Error::ParseError(err)
    }
}

pub mod ast;
pub mod builtinops;
pub mod encoding;
pub mod evaluator;
pub mod scope;

#[cfg(feature = "parser")]
pub mod parser;

#[cfg(feature = "parser")]
pub mod session;
