//! Church-encoding recognition.
//!
//! Structural matchers that decide whether a normal form denotes one of the common
//! encodings and reconstruct the corresponding tagged value. Matching compares
//! binder identities, never names. The matchers assume their input is already
//! normalized and never evaluate or rewrite it.
//!
//! ```text
//! \x.\y.x              ; true
//! \x.\y.y              ; false (also the shape of 0; booleans are tried first)
//! \f.\x.f (f (f x))    ; 3, and \f.f (the eta-reduced 1) is 1
//! \f.f A (\f.f B NIL)  ; list [A, B], where NIL is \x.\y.\z.y
//! \f.f A B             ; pair (A, B)
//! \f.f V               ; present optional V
//! ```

use std::rc::Rc;

use crate::ast::{Expr, Expression, NumberType, SymbolRef};
use crate::scope::ScopeTable;

/// Convert a normal form into its tagged builtin value, trying boolean, integer,
/// list, pair and optional in that order. The first match wins.
pub fn to_builtin(expr: &Expr, table: &ScopeTable) -> Option<Expr> {
    let registry = table.builtins();

    if let Some(value) = recognize_bool(expr) {
        return Some(registry.make_bool(value));
    }
    if let Some(value) = recognize_integer(expr) {
        return Some(registry.make_integer(value));
    }
    if let Some(items) = recognize_list(expr) {
        return Some(registry.make_list(items));
    }
    if let Some((first, second)) = recognize_pair(expr) {
        return Some(registry.make_pair(first, second));
    }
    recognize_optional(expr).map(|value| registry.make_optional(Some(value)))
}

fn as_abstraction(expr: &Expression) -> Option<(SymbolRef, &Expr)> {
    match expr {
        Expression::Abstraction { param, body } => Some((*param, body)),
        _ => None,
    }
}

fn as_application(expr: &Expression) -> Option<(&Expr, &Expr)> {
    match expr {
        Expression::Application { func, arg } => Some((func, arg)),
        _ => None,
    }
}

fn is_bound_to(expr: &Expression, symbol: SymbolRef) -> bool {
    matches!(expr, Expression::Bound(s) if *s == symbol)
}

/// `\x.\y.x` is true, `\x.\y.y` is false
pub fn recognize_bool(expr: &Expression) -> Option<bool> {
    let (first, body) = as_abstraction(expr)?;
    let (second, body) = as_abstraction(body)?;

    match &**body {
        Expression::Bound(s) if *s == first => Some(true),
        Expression::Bound(s) if *s == second => Some(false),
        _ => None,
    }
}

/// Church numerals: `\f.\x.x` is 0, `\f.f` is 1, `\f.\x.f (... (f x))` counts the
/// applications of `f`
pub fn recognize_integer(expr: &Expression) -> Option<NumberType> {
    let (f, body) = as_abstraction(expr)?;

    // 1 after eta-contraction
    if is_bound_to(body, f) {
        return Some(1);
    }

    let (x, mut current) = as_abstraction(body)?;
    let mut count: NumberType = 0;

    while let Some((func, arg)) = as_application(current) {
        if !is_bound_to(func, f) {
            return None;
        }
        count += 1;
        current = arg;
    }

    is_bound_to(current, x).then_some(count)
}

/// Chain of cons cells `\f.f HEAD REST` terminated by `\x.\y.\z.y`.
/// Any other shape anywhere along the chain rejects the whole list.
pub fn recognize_list(expr: &Expression) -> Option<Vec<Expr>> {
    let mut items = Vec::new();
    let mut current = expr;

    loop {
        let (param, body) = as_abstraction(current)?;

        match &**body {
            Expression::Application { func, arg: rest } => {
                let (selector, head) = as_application(func)?;
                if !is_bound_to(selector, param) {
                    return None;
                }
                items.push(Rc::clone(head));
                current = rest;
            }
            Expression::Abstraction { param: second, body } => {
                let (_, body) = as_abstraction(body)?;
                return is_bound_to(body, *second).then_some(items);
            }
            _ => return None,
        }
    }
}

/// `\f.f A B` is the pair (A, B)
pub fn recognize_pair(expr: &Expression) -> Option<(Expr, Expr)> {
    let (param, body) = as_abstraction(expr)?;
    let (func, second) = as_application(body)?;
    let (selector, first) = as_application(func)?;

    is_bound_to(selector, param).then(|| (Rc::clone(first), Rc::clone(second)))
}

/// `\f.f V` is the present optional V. The absent optional is the `_Nothing`
/// sentinel and is never produced by structural matching.
pub fn recognize_optional(expr: &Expression) -> Option<Expr> {
    let (param, body) = as_abstraction(expr)?;
    let (selector, value) = as_application(body)?;

    is_bound_to(selector, param).then(|| Rc::clone(value))
}
