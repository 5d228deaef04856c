//! Text to expression trees.
//!
//! The grammar is parsed with nom into a small surface tree which is then lowered
//! against a [`ScopeTable`]: binder names are registered in a fresh child frame per
//! abstraction, names that resolve through the frame chain become bound references,
//! and everything else becomes an untagged free reference for the name-resolution
//! hook to expand later.
//!
//! ```text
//! expr        := lambda | application
//! lambda      := '\' IDENT (',' IDENT)* '.' expr
//! application := primary primary* lambda?
//! primary     := IDENT | '(' expr ')'
//! ```

use std::rc::Rc;

use nom::{
    IResult, Parser,
    bytes::complete::take_while1,
    character::complete::{char, multispace0},
    combinator::{cut, opt},
    error::ErrorKind,
    multi::{many0, separated_list1},
    sequence::{preceded, terminated},
};

use crate::ast::{Expr, abs, app, bound, free};
use crate::scope::ScopeTable;
use crate::{Error, MAX_PARSE_DEPTH, ParseError, ParseErrorKind};

/// Characters allowed in identifiers besides letters and digits
pub const IDENTIFIER_SPECIAL_CHARS: &str = "-_'$%";

/// Single-character punctuation tokens
const PUNCTUATION: &str = "()\\.,";

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || IDENTIFIER_SPECIAL_CHARS.contains(c)
}

/// Parse result before binder names are resolved
#[derive(Debug, Clone, PartialEq)]
enum Surface<'a> {
    Name(&'a str),
    Lambda(Vec<&'a str>, Box<Surface<'a>>),
    Apply(Box<Surface<'a>>, Box<Surface<'a>>),
}

fn too_deep(input: &str) -> nom::Err<nom::error::Error<&str>> {
    nom::Err::Failure(nom::error::Error::new(input, ErrorKind::TooLarge))
}

fn parse_identifier(input: &str) -> IResult<&str, &str> {
    preceded(multispace0, take_while1(is_identifier_char)).parse(input)
}

/// `\a,b.BODY`; everything after the backslash is committed
fn parse_lambda(input: &str, depth: usize) -> IResult<&str, Surface<'_>> {
    let (input, _) = preceded(multispace0, char('\\')).parse(input)?;
    let (input, params) = cut(separated_list1(
        preceded(multispace0, char(',')),
        parse_identifier,
    ))
    .parse(input)?;
    let (input, _) = cut(preceded(multispace0, char('.'))).parse(input)?;
    let (input, body) = cut(|input| parse_expr(input, depth + 1)).parse(input)?;

    Ok((input, Surface::Lambda(params, Box::new(body))))
}

fn parse_parenthesized(input: &str, depth: usize) -> IResult<&str, Surface<'_>> {
    let (input, _) = preceded(multispace0, char('(')).parse(input)?;
    cut(terminated(
        |input| parse_expr(input, depth + 1),
        preceded(multispace0, char(')')),
    ))
    .parse(input)
}

fn parse_primary(input: &str, depth: usize) -> IResult<&str, Surface<'_>> {
    if let Ok((remaining, name)) = parse_identifier(input) {
        return Ok((remaining, Surface::Name(name)));
    }
    parse_parenthesized(input, depth)
}

/// Left-associative sequence of primaries, optionally ending in an abstraction
fn parse_application(input: &str, depth: usize) -> IResult<&str, Surface<'_>> {
    let (input, first) = parse_primary(input, depth)?;
    let (input, rest) = many0(|input| parse_primary(input, depth)).parse(input)?;
    let (input, tail) = opt(|input| parse_lambda(input, depth)).parse(input)?;

    let applied = rest
        .into_iter()
        .chain(tail)
        .fold(first, |func, arg| Surface::Apply(Box::new(func), Box::new(arg)));
    Ok((input, applied))
}

fn parse_expr(input: &str, depth: usize) -> IResult<&str, Surface<'_>> {
    if depth >= MAX_PARSE_DEPTH {
        return Err(too_deep(input));
    }
    match parse_lambda(input, depth) {
        Err(nom::Err::Error(_)) => parse_application(input, depth),
        result => result,
    }
}

/// Number of characters before `rest` within `input`
fn char_offset(input: &str, rest: &str) -> usize {
    let consumed = input.len().saturating_sub(rest.len());
    input.get(..consumed).map_or(0, |prefix| prefix.chars().count())
}

/// Convert nom parsing errors to user-facing parse errors
fn parse_error_from_nom(input: &str, error: nom::Err<nom::error::Error<&str>>) -> ParseError {
    match error {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let offset = char_offset(input, e.input);
            let rest = e.input.trim_start();
            if e.code == ErrorKind::TooLarge {
                ParseError::with_context(
                    ParseErrorKind::TooDeeplyNested,
                    format!("Expression too deeply nested (max depth: {MAX_PARSE_DEPTH})"),
                    input,
                    offset,
                )
            } else if rest.is_empty() {
                ParseError::with_context(
                    ParseErrorKind::Incomplete,
                    "Unexpected end of input",
                    input,
                    offset,
                )
            } else {
                let near: String = rest.chars().take(10).collect();
                ParseError::with_context_and_found(
                    ParseErrorKind::InvalidSyntax,
                    format!("Invalid syntax near '{near}'"),
                    input,
                    offset,
                    rest.chars().next().map(String::from),
                )
            }
        }
        nom::Err::Incomplete(_) => {
            ParseError::from_message(ParseErrorKind::Incomplete, "Incomplete input")
        }
    }
}

/// Reject characters that cannot start or continue any token
fn check_tokens(input: &str) -> Result<(), ParseError> {
    let invalid = input
        .chars()
        .enumerate()
        .find(|(_, c)| !(is_identifier_char(*c) || PUNCTUATION.contains(*c) || c.is_whitespace()));

    match invalid {
        Some((offset, c)) => Err(ParseError::with_context_and_found(
            ParseErrorKind::UnboundToken,
            format!("Unexpected character '{c}'"),
            input,
            offset,
            Some(c.to_string()),
        )),
        None => Ok(()),
    }
}

fn parse_surface(input: &str) -> Result<Surface<'_>, ParseError> {
    check_tokens(input)?;
    if input.trim().is_empty() {
        return Err(ParseError::from_message(
            ParseErrorKind::InvalidSyntax,
            "Empty expression",
        ));
    }

    match terminated(|input| parse_expr(input, 0), multispace0).parse(input) {
        Ok(("", surface)) => Ok(surface),
        Ok((remaining, _)) => Err(ParseError::with_context_and_found(
            ParseErrorKind::TrailingContent,
            format!("Unexpected remaining input: '{remaining}'"),
            input,
            char_offset(input, remaining),
            remaining.chars().next().map(String::from),
        )),
        Err(e) => Err(parse_error_from_nom(input, e)),
    }
}

fn lower(surface: &Surface<'_>, scope: &Rc<ScopeTable>) -> Result<Expr, Error> {
    match surface {
        Surface::Name(name) => Ok(match scope.resolve_name(name) {
            Some(id) => bound(id),
            None => free(name),
        }),
        Surface::Apply(func, arg) => Ok(app(lower(func, scope)?, lower(arg, scope)?)),
        Surface::Lambda(params, body) => {
            let mut frame = scope.child_frame();
            let ids = params
                .iter()
                .map(|param| frame.register(param))
                .collect::<Result<Vec<_>, _>>()?;
            let body = lower(body, &Rc::new(frame))?;
            Ok(ids.into_iter().rev().fold(body, |body, id| abs(id, body)))
        }
    }
}

/// Parse a complete lambda expression, registering its binders under `scope`.
pub fn parse(input: &str, scope: &Rc<ScopeTable>) -> Result<Expr, Error> {
    let surface = parse_surface(input)?;
    lower(&surface, scope)
}
