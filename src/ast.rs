//! This module defines the expression tree the interpreter works on. The main enum,
//! [`Expression`], covers the variants produced by the parser (bound and free
//! references, abstractions, applications) as well as the two evaluation-time
//! variants: lazy references into the engine's thunk table and builtin nodes that
//! delegate to a native operation. Trees are immutable and share subtrees through
//! [`Expr`] (`Rc<Expression>`); every rewrite builds new nodes.
//!
//! Ergonomic helper functions such as [`bound`], [`free`], [`abs`] and [`app`] are
//! provided for building trees in code and tests, and [`to_string`] renders the
//! canonical textual form used for output comparison.

use std::fmt;
use std::rc::Rc;

use crate::builtinops::display_value;
use crate::scope::ScopeTable;

/// Type alias for integer values carried by tagged builtin values
pub type NumberType = i64;

/// Identifier handed out by the scope table when a binder name is registered
pub type SymbolId = u32;

/// Instance counter distinguishing independent expansions of the same binder
pub type Instance = u64;

/// Index of a thunk in the per-evaluation lazy table
pub type LazyId = usize;

/// Shared handle to an immutable expression node
pub type Expr = Rc<Expression>;

/// Identity of a bound variable.
///
/// Two references denote the same binding iff both the symbol id and the instance
/// match. The textual name plays no part in equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolRef {
    pub symbol: SymbolId,
    pub instance: Instance,
}

impl SymbolRef {
    /// Reference with the default instance, as produced by the parser
    pub fn new(symbol: SymbolId) -> Self {
        SymbolRef {
            symbol,
            instance: 0,
        }
    }

    pub fn with_instance(symbol: SymbolId, instance: Instance) -> Self {
        SymbolRef { symbol, instance }
    }
}

/// Payload of a tagged free reference: an already-reduced native value.
#[derive(Debug, Clone, PartialEq)]
pub enum BuiltinValue {
    Bool(bool),
    Integer(NumberType),
    /// Ordered elements; the empty list is the `_Null` sentinel
    List(Vec<Expr>),
    Pair(Expr, Expr),
    /// `None` is the `_Nothing` sentinel
    Optional(Option<Expr>),
}

impl BuiltinValue {
    /// Name carried by free references holding this kind of value
    pub fn type_name(&self) -> &'static str {
        match self {
            BuiltinValue::Bool(_) => "_Bool",
            BuiltinValue::Integer(_) => "_Integer",
            BuiltinValue::List(_) => "_List",
            BuiltinValue::Pair(..) => "_Pair",
            BuiltinValue::Optional(_) => "_Maybe",
        }
    }
}

/// Canonical erased native operation type used by builtin nodes.
///
/// The operation receives a copy of its node whose children have already been
/// reduced, and returns the reduced result, or `None` when it cannot reduce further
/// (the node is then a stuck term). Operations must never fail on ill-typed input.
pub type NativeFn = dyn Fn(&BuiltinNode) -> Option<Expr>;

/// Custom printer for a builtin node
pub type DisplayFn = fn(&BuiltinNode, &ScopeTable) -> String;

/// Native operation attached to a builtin node.
/// Uses the id string for equality comparison instead of the function pointer.
#[derive(Clone)]
pub struct NativeOp {
    pub id: String,
    pub func: Rc<NativeFn>,
}

impl NativeOp {
    pub fn new(
        id: impl Into<String>,
        func: impl Fn(&BuiltinNode) -> Option<Expr> + 'static,
    ) -> Self {
        NativeOp {
            id: id.into(),
            func: Rc::new(func),
        }
    }
}

impl fmt::Debug for NativeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeOp({})", self.id)
    }
}

impl PartialEq for NativeOp {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// Extension point whose evaluation is delegated to host logic once its children
/// are reduced.
#[derive(Clone)]
pub struct BuiltinNode {
    pub left: Option<Expr>,
    pub right: Option<Expr>,
    /// `None` makes the node opaque: the engine passes it through untouched
    pub native: Option<NativeOp>,
    pub display: Option<DisplayFn>,
}

impl BuiltinNode {
    pub fn new(left: Option<Expr>, right: Option<Expr>, native: Option<NativeOp>) -> Self {
        BuiltinNode {
            left,
            right,
            native,
            display: None,
        }
    }

    /// Copy of this node with `f` applied to each present child
    pub(crate) fn map_children(&self, mut f: impl FnMut(&Expr) -> Expr) -> BuiltinNode {
        BuiltinNode {
            left: self.left.as_ref().map(&mut f),
            right: self.right.as_ref().map(&mut f),
            native: self.native.clone(),
            display: self.display,
        }
    }

    /// Like [`BuiltinNode::map_children`], stopping at the first child `f` fails on
    pub(crate) fn try_map_children<E>(
        &self,
        mut f: impl FnMut(&Expr) -> Result<Expr, E>,
    ) -> Result<BuiltinNode, E> {
        Ok(BuiltinNode {
            left: self.left.as_ref().map(&mut f).transpose()?,
            right: self.right.as_ref().map(&mut f).transpose()?,
            native: self.native.clone(),
            display: self.display,
        })
    }
}

impl PartialEq for BuiltinNode {
    // The display hook does not take part in equality
    fn eq(&self, other: &Self) -> bool {
        self.left == other.left && self.right == other.right && self.native == other.native
    }
}

/// Core expression type of the interpreter.
///
/// To build a tree, use the helper functions:
/// - `bound(id)` / `bound_ref(symbol)` for variable uses, `free("name")` for free names
/// - `abs(id, body)` / `abs_ref(symbol, body)` for abstractions
/// - `app(func, arg)` and `apply_all(func, args)` for applications
#[derive(Clone, PartialEq)]
pub enum Expression {
    /// Use of a variable introduced by an enclosing abstraction
    Bound(SymbolRef),
    /// Unresolved name, or a native value when `value` is present
    Free {
        name: String,
        value: Option<BuiltinValue>,
    },
    Abstraction {
        param: SymbolRef,
        body: Expr,
    },
    Application {
        func: Expr,
        arg: Expr,
    },
    /// Reference into the thunk table of the evaluation that created it.
    /// Never produced by the parser.
    Lazy(LazyId),
    Builtin(BuiltinNode),
}

impl fmt::Debug for Expression {
    /// Raw form showing symbol ids and instances, e.g. `\3#1.(3#1 y)`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Bound(s) => write!(f, "{}#{}", s.symbol, s.instance),
            Expression::Free { name, value: None } => write!(f, "{name}"),
            Expression::Free {
                name,
                value: Some(value),
            } => write!(f, "{name}{{{value:?}}}"),
            Expression::Abstraction { param, body } => {
                write!(f, "\\{}#{}.{body:?}", param.symbol, param.instance)
            }
            Expression::Application { func, arg } => write!(f, "({func:?} {arg:?})"),
            Expression::Lazy(id) => write!(f, "<#{id}>"),
            Expression::Builtin(node) => {
                match &node.native {
                    Some(op) => write!(f, "<BUILTIN:{}>", op.id)?,
                    None => write!(f, "<BUILTIN>")?,
                }
                if let Some(left) = &node.left {
                    write!(f, "({left:?})")?;
                }
                if let Some(right) = &node.right {
                    write!(f, "({right:?})")?;
                }
                Ok(())
            }
        }
    }
}

/// Helper for creating a bound reference with the default instance
pub fn bound(symbol: SymbolId) -> Expr {
    bound_ref(SymbolRef::new(symbol))
}

pub fn bound_ref(symbol: SymbolRef) -> Expr {
    Rc::new(Expression::Bound(symbol))
}

/// Helper for creating an untagged free reference
pub fn free<S: AsRef<str>>(name: S) -> Expr {
    Rc::new(Expression::Free {
        name: name.as_ref().to_owned(),
        value: None,
    })
}

/// Helper for creating a free reference carrying a native value
pub fn tagged(value: BuiltinValue) -> Expr {
    Rc::new(Expression::Free {
        name: value.type_name().to_owned(),
        value: Some(value),
    })
}

/// Helper for creating an abstraction over a parameter with the default instance
pub fn abs(param: SymbolId, body: Expr) -> Expr {
    abs_ref(SymbolRef::new(param), body)
}

pub fn abs_ref(param: SymbolRef, body: Expr) -> Expr {
    Rc::new(Expression::Abstraction { param, body })
}

pub fn app(func: Expr, arg: Expr) -> Expr {
    Rc::new(Expression::Application { func, arg })
}

/// Left-associative application of `func` to each argument in turn
pub fn apply_all<I: IntoIterator<Item = Expr>>(func: Expr, args: I) -> Expr {
    args.into_iter().fold(func, app)
}

impl Expression {
    /// Pair this expression with a scope table for canonical display
    pub fn display<'a>(&'a self, table: &'a ScopeTable) -> Displayed<'a> {
        Displayed { expr: self, table }
    }

    pub fn is_abstraction(&self) -> bool {
        matches!(self, Expression::Abstraction { .. })
    }

    pub fn is_application(&self) -> bool {
        matches!(self, Expression::Application { .. })
    }
}

/// Canonical textual form of an expression, with binder names taken from `table`
pub fn to_string(expr: &Expression, table: &ScopeTable) -> String {
    expr.display(table).to_string()
}

/// Display adapter produced by [`Expression::display`]
pub struct Displayed<'a> {
    expr: &'a Expression,
    table: &'a ScopeTable,
}

impl Displayed<'_> {
    fn write_symbol(&self, f: &mut fmt::Formatter<'_>, symbol: SymbolRef) -> fmt::Result {
        match self.table.resolve_id(symbol.symbol) {
            Some(name) => write!(f, "{name}"),
            None => write!(f, "#{}", symbol.symbol),
        }
    }
}

impl fmt::Display for Displayed<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.table;
        match self.expr {
            Expression::Bound(symbol) => self.write_symbol(f, *symbol),
            Expression::Free { name, value } => match value {
                Some(value) => write!(f, "{}", display_value(name, value, table)),
                None => write!(f, "{name}"),
            },
            Expression::Abstraction { param, body } => {
                write!(f, "\\")?;
                self.write_symbol(f, *param)?;
                write!(f, ".{}", body.display(table))
            }
            Expression::Application { func, arg } => {
                if func.is_abstraction() {
                    write!(f, "({})", func.display(table))?;
                } else {
                    write!(f, "{}", func.display(table))?;
                }
                write!(f, " ")?;
                if arg.is_abstraction() || arg.is_application() {
                    write!(f, "({})", arg.display(table))
                } else {
                    write!(f, "{}", arg.display(table))
                }
            }
            Expression::Lazy(id) => write!(f, "<#{id}>"),
            Expression::Builtin(node) => {
                if let Some(display) = node.display {
                    return write!(f, "{}", display(node, table));
                }
                let left = node
                    .left
                    .as_ref()
                    .map(|e| e.display(table).to_string())
                    .unwrap_or_default();
                let right = node
                    .right
                    .as_ref()
                    .map(|e| e.display(table).to_string())
                    .unwrap_or_default();
                if right.is_empty() {
                    write!(f, "<BUILTIN>({left})")
                } else {
                    write!(f, "<BUILTIN>({left})({right})")
                }
            }
        }
    }
}
