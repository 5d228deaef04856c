//! Builtin constants and tagged native values.
//!
//! The registry is owned by the root of a session's scope table and provides the
//! named constants programs can refer to:
//!
//! ```text
//! _True _False      ; Church booleans, as tagged values
//! _Zero             ; tagged integer 0
//! _Successor        ; \x.<successor x>, native on tagged integers
//! _Null _Nothing    ; empty list and absent optional sentinels
//! ```
//!
//! ## Tagged values
//!
//! A tagged value is a free reference carrying a [`BuiltinValue`]. It is already in
//! normal form and prints as `<TypeName>` followed by its payload:
//!
//! - `<_Bool>True`, `<_Integer>3`
//! - `<_List>(a)(b)(c)`, or `<_List>Null` when empty
//! - `<_Pair>(a)(b)`
//! - `<_Maybe>(v)`, or `<_Maybe>Nothing` when absent
//!
//! Payload expressions are passed through the encoding recognizer before printing,
//! so Church-encoded elements print as values too.
//!
//! ## Native operations
//!
//! Native operations never fail. When their input is not of the expected kind they
//! return `None` and the builtin node stays in the tree as a stuck term, which is a
//! perfectly valid lambda calculus value.

use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::{
    BuiltinNode, BuiltinValue, Expr, Expression, Instance, NativeOp, NumberType, SymbolId,
    SymbolRef, abs_ref, app, apply_all, bound_ref, tagged, to_string,
};
use crate::encoding::to_builtin;
use crate::scope::ScopeTable;

/// Names of the constants provided by every session
pub const BUILTIN_NAMES: [&str; 6] = [
    "_True",
    "_False",
    "_Zero",
    "_Successor",
    "_Null",
    "_Nothing",
];

/// Registry of builtin constants, created once per session root
#[derive(Debug)]
pub struct BuiltinRegistry {
    /// Seeded binders used for the successor abstraction and Church encodings
    x: SymbolId,
    y: SymbolId,
    constants: HashMap<&'static str, Expr>,
}

impl BuiltinRegistry {
    pub(crate) fn new(x: SymbolId, y: SymbolId) -> Self {
        let mut registry = BuiltinRegistry {
            x,
            y,
            constants: HashMap::new(),
        };

        let param = SymbolRef::new(x);
        let successor = abs_ref(
            param,
            Rc::new(Expression::Builtin(BuiltinNode::new(
                Some(bound_ref(param)),
                None,
                Some(successor_op()),
            ))),
        );

        let constants = [
            ("_True", registry.make_bool(true)),
            ("_False", registry.make_bool(false)),
            ("_Zero", registry.make_integer(0)),
            ("_Successor", successor),
            ("_Null", registry.make_list(Vec::new())),
            ("_Nothing", registry.make_optional(None)),
        ];
        registry.constants.extend(constants);
        registry
    }

    /// Exact-name lookup among the registered constants
    pub fn lookup(&self, name: &str) -> Option<Expr> {
        self.constants.get(name).cloned()
    }

    pub fn make_bool(&self, value: bool) -> Expr {
        tagged(BuiltinValue::Bool(value))
    }

    pub fn make_integer(&self, value: NumberType) -> Expr {
        tagged(BuiltinValue::Integer(value))
    }

    pub fn make_list(&self, items: Vec<Expr>) -> Expr {
        tagged(BuiltinValue::List(items))
    }

    pub fn make_pair(&self, first: Expr, second: Expr) -> Expr {
        tagged(BuiltinValue::Pair(first, second))
    }

    pub fn make_optional(&self, value: Option<Expr>) -> Expr {
        tagged(BuiltinValue::Optional(value))
    }

    /// Canonical Church encoding of a tagged value.
    ///
    /// Every abstraction built here is stamped with a fresh instance of the seeded
    /// binders, so encodings never share a binder identity with each other or with
    /// the payload expressions they wrap. Negative integers have no encoding, and
    /// the absent optional is its own sentinel.
    pub fn encode(&self, value: &BuiltinValue, table: &ScopeTable) -> Option<Expr> {
        match value {
            BuiltinValue::Bool(b) => {
                let instance = table.fresh_instance();
                let (x, y) = self.seeded(instance);
                let chosen = if *b { x } else { y };
                Some(abs_ref(x, abs_ref(y, bound_ref(chosen))))
            }
            BuiltinValue::Integer(n) if *n >= 0 => {
                let instance = table.fresh_instance();
                let (f, x) = self.seeded(instance);
                let mut body = bound_ref(x);
                for _ in 0..*n {
                    body = app(bound_ref(f), body);
                }
                Some(abs_ref(f, abs_ref(x, body)))
            }
            BuiltinValue::Integer(_) => None,
            BuiltinValue::List(items) => {
                // \x.\y.\z.y with z taken from a second instance of `x`
                let (x, y) = self.seeded(table.fresh_instance());
                let z = SymbolRef::with_instance(self.x, table.fresh_instance());
                let nil = abs_ref(x, abs_ref(y, abs_ref(z, bound_ref(y))));

                Some(items.iter().rev().fold(nil, |rest, item| {
                    let (f, _) = self.seeded(table.fresh_instance());
                    abs_ref(f, apply_all(bound_ref(f), [Rc::clone(item), rest]))
                }))
            }
            BuiltinValue::Pair(first, second) => {
                let (f, _) = self.seeded(table.fresh_instance());
                Some(abs_ref(
                    f,
                    apply_all(bound_ref(f), [Rc::clone(first), Rc::clone(second)]),
                ))
            }
            BuiltinValue::Optional(Some(value)) => {
                let (f, _) = self.seeded(table.fresh_instance());
                Some(abs_ref(f, app(bound_ref(f), Rc::clone(value))))
            }
            BuiltinValue::Optional(None) => self.lookup("_Nothing"),
        }
    }

    fn seeded(&self, instance: Instance) -> (SymbolRef, SymbolRef) {
        (
            SymbolRef::with_instance(self.x, instance),
            SymbolRef::with_instance(self.y, instance),
        )
    }
}

/// The native successor operation: increments a tagged integer, stuck otherwise
pub fn successor_op() -> NativeOp {
    NativeOp::new("successor", builtin_successor)
}

fn builtin_successor(node: &BuiltinNode) -> Option<Expr> {
    match node.left.as_deref() {
        Some(Expression::Free {
            value: Some(BuiltinValue::Integer(n)),
            ..
        }) => n
            .checked_add(1)
            .map(|next| tagged(BuiltinValue::Integer(next))),
        _ => None,
    }
}

/// Render a payload expression, preferring its recognized builtin form
fn display_payload(expr: &Expr, table: &ScopeTable) -> String {
    let shown = to_builtin(expr, table).unwrap_or_else(|| Rc::clone(expr));
    format!("({})", to_string(&shown, table))
}

/// Printer for tagged free references
pub fn display_value(name: &str, value: &BuiltinValue, table: &ScopeTable) -> String {
    let payload = match value {
        BuiltinValue::Bool(true) => "True".to_owned(),
        BuiltinValue::Bool(false) => "False".to_owned(),
        BuiltinValue::Integer(n) => n.to_string(),
        BuiltinValue::List(items) if items.is_empty() => "Null".to_owned(),
        BuiltinValue::List(items) => items
            .iter()
            .map(|item| display_payload(item, table))
            .collect(),
        BuiltinValue::Pair(first, second) => {
            display_payload(first, table) + &display_payload(second, table)
        }
        BuiltinValue::Optional(Some(value)) => display_payload(value, table),
        BuiltinValue::Optional(None) => "Nothing".to_owned(),
    };
    format!("<{name}>{payload}")
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::free;

    #[test]
    fn test_builtin_registry_constants() {
        let table = ScopeTable::new();
        let registry = table.builtins();

        let test_cases = vec![
            ("_True", "<_Bool>True"),
            ("_False", "<_Bool>False"),
            ("_Zero", "<_Integer>0"),
            ("_Successor", "\\x.<BUILTIN>(x)"),
            ("_Null", "<_List>Null"),
            ("_Nothing", "<_Maybe>Nothing"),
        ];

        for (i, (name, expected)) in test_cases.iter().enumerate() {
            let constant = registry
                .lookup(name)
                .unwrap_or_else(|| panic!("Registry test #{}: '{name}' missing", i + 1));
            assert_eq!(
                to_string(&constant, &table),
                *expected,
                "Registry test #{}: display mismatch for '{name}'",
                i + 1
            );
        }

        assert_eq!(BUILTIN_NAMES.len(), test_cases.len());
        assert!(registry.lookup("_Unknown").is_none());
        assert!(registry.lookup("_true").is_none()); // exact-name lookup
    }

    #[test]
    fn test_tagged_value_display() {
        let table = ScopeTable::new();
        let registry = table.builtins();

        let test_cases = vec![
            (registry.make_integer(42), "<_Integer>42"),
            (registry.make_integer(-3), "<_Integer>-3"),
            (
                registry.make_list(vec![free("a"), free("b"), free("c")]),
                "<_List>(a)(b)(c)",
            ),
            (
                registry.make_list(vec![registry.make_bool(true)]),
                "<_List>(<_Bool>True)",
            ),
            (
                registry.make_pair(free("a"), registry.make_integer(1)),
                "<_Pair>(a)(<_Integer>1)",
            ),
            (registry.make_optional(Some(free("v"))), "<_Maybe>(v)"),
            (registry.make_optional(None), "<_Maybe>Nothing"),
        ];

        for (i, (expr, expected)) in test_cases.iter().enumerate() {
            assert_eq!(
                to_string(expr, &table),
                *expected,
                "Tagged display test #{} failed",
                i + 1
            );
        }
    }

    #[test]
    fn test_payloads_print_recognized_encodings() {
        let table = ScopeTable::new();
        let registry = table.builtins();
        let three = registry
            .encode(&BuiltinValue::Integer(3), &table)
            .unwrap();
        let truth = registry.encode(&BuiltinValue::Bool(true), &table).unwrap();

        let list = registry.make_list(vec![three, truth]);
        assert_eq!(to_string(&list, &table), "<_List>(<_Integer>3)(<_Bool>True)");
    }

    #[test]
    fn test_successor_native_operation() {
        let table = ScopeTable::new();
        let registry = table.builtins();

        let on_integer = BuiltinNode::new(Some(registry.make_integer(3)), None, None);
        assert_eq!(builtin_successor(&on_integer), Some(registry.make_integer(4)));

        // Non-integer input is a stuck term, not an error
        let on_free = BuiltinNode::new(Some(free("foo")), None, None);
        assert_eq!(builtin_successor(&on_free), None);
        let on_bool = BuiltinNode::new(Some(registry.make_bool(true)), None, None);
        assert_eq!(builtin_successor(&on_bool), None);
        let on_nothing = BuiltinNode::new(None, None, None);
        assert_eq!(builtin_successor(&on_nothing), None);

        let at_max = BuiltinNode::new(Some(registry.make_integer(NumberType::MAX)), None, None);
        assert_eq!(builtin_successor(&at_max), None);
    }

    #[test]
    fn test_encode_shapes() {
        let table = ScopeTable::new();
        let registry = table.builtins();

        let test_cases = vec![
            (BuiltinValue::Bool(true), "\\x.\\y.x"),
            (BuiltinValue::Bool(false), "\\x.\\y.y"),
            (BuiltinValue::Integer(0), "\\x.\\y.y"),
            (BuiltinValue::Integer(2), "\\x.\\y.x (x y)"),
            (BuiltinValue::List(vec![]), "\\x.\\y.\\x.y"),
            (
                BuiltinValue::List(vec![free("a")]),
                "\\x.x a (\\x.\\y.\\x.y)",
            ),
            (BuiltinValue::Pair(free("a"), free("b")), "\\x.x a b"),
            (BuiltinValue::Optional(Some(free("v"))), "\\x.x v"),
            (BuiltinValue::Optional(None), "<_Maybe>Nothing"),
        ];

        for (i, (value, expected)) in test_cases.iter().enumerate() {
            let encoded = registry.encode(value, &table).unwrap();
            assert_eq!(
                to_string(&encoded, &table),
                *expected,
                "Encode test #{} failed",
                i + 1
            );
        }

        assert!(registry.encode(&BuiltinValue::Integer(-1), &table).is_none());
    }

    #[test]
    fn test_encodings_use_distinct_instances() {
        let table = ScopeTable::new();
        let registry = table.builtins();
        let first = registry.encode(&BuiltinValue::Bool(true), &table).unwrap();
        let second = registry.encode(&BuiltinValue::Bool(true), &table).unwrap();
        assert_ne!(first, second);
    }
}
