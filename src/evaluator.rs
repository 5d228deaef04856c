//! Normal-order reduction engine.
//!
//! [`evaluate`] rewrites an expression towards its normal form using beta and eta
//! reduction and native builtin operations. A single core helper does all the work;
//! its `stop` parameter turns it into a weak-head probe that returns as soon as the
//! current node is known to be an abstraction, which is how the function position
//! of an application is examined without normalizing the abstraction's body.
//!
//! Every evaluation owns a budget that each step of the core helper consumes. The
//! budget is shared by the whole call, so a non-terminating term such as
//! `(\x.x x) (\x.x x)` fails with [`Error::DepthExceeded`] instead of hanging.
//!
//! Reduction recurses on the host stack, one level per nested subterm it normalizes.
//! Recursive entry points run through [`stacker::maybe_grow`], which moves onto a new
//! heap-allocated stack segment when the current one runs low, so the budget is the
//! only limit on how deep an evaluation can go.

use std::collections::HashMap;
use std::rc::Rc;

use crate::Error;
use crate::ast::{BuiltinNode, Expr, Expression, Instance, LazyId, SymbolRef};

/// Reduction strategy switches, each independent of the others
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EvalFlags {
    /// Share argument reductions through memoized thunks instead of call-by-name
    pub lazy: bool,
    /// Disable function application; both sides are still normalized
    pub no_beta: bool,
    /// Disable eta-contraction of `\x.M x`
    pub no_eta: bool,
    /// Treat builtin nodes as opaque
    pub no_builtin: bool,
    /// Write one line per reduction step to stderr
    pub trace: bool,
}

impl EvalFlags {
    /// Call-by-name normal order with every rule enabled
    pub const NONE: EvalFlags = EvalFlags {
        lazy: false,
        no_beta: false,
        no_eta: false,
        no_builtin: false,
        trace: false,
    };

    /// Normal order with memoized arguments, used for interactive evaluation
    pub const LAZY: EvalFlags = EvalFlags {
        lazy: true,
        ..EvalFlags::NONE
    };

    /// Only the name-resolution hook runs; nothing is reduced
    pub const RESOLVE_ONLY: EvalFlags = EvalFlags {
        no_beta: true,
        no_eta: true,
        no_builtin: true,
        ..EvalFlags::NONE
    };

    pub fn with_trace(self, trace: bool) -> Self {
        EvalFlags { trace, ..self }
    }
}

/// Remaining stack below which recursion continues on a new segment
const STACK_RED_ZONE: usize = 128 * 1024;
/// Size of each additional stack segment
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

fn with_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, f)
}

/// Name-resolution hook applied to every node before the engine interprets it.
/// Returning the node itself means "nothing to resolve".
pub type Resolver<'a> = dyn Fn(&Expr) -> Expr + 'a;

/// Normalize `expr`.
///
/// `depth_limit` is the total number of core steps the evaluation may take. The
/// thunk table used under [`EvalFlags::lazy`] lives only for this call: the result
/// never refers to it.
pub fn evaluate(
    expr: &Expr,
    resolver: Option<&Resolver<'_>>,
    depth_limit: usize,
    flags: EvalFlags,
) -> Result<Expr, Error> {
    let mut engine = Engine {
        resolver,
        flags,
        budget: depth_limit,
        limit: depth_limit,
        thunks: Vec::new(),
    };
    let result = engine.reduce(expr, false)?;
    Ok(engine.settle(&result, &mut HashMap::new()))
}

/// Slot of the per-evaluation thunk table
#[derive(Debug, Clone)]
enum Thunk {
    Pending(Expr),
    /// Already in normal form; never reduced again
    Forced(Expr),
}

/// Outcome of one step of the core loop
enum Step {
    Done(Expr),
    /// Keep reducing this expression in the same context
    Continue(Expr),
}

struct Engine<'r> {
    resolver: Option<&'r Resolver<'r>>,
    flags: EvalFlags,
    budget: usize,
    limit: usize,
    thunks: Vec<Thunk>,
}

impl Engine<'_> {
    fn consume(&mut self) -> Result<(), Error> {
        if self.budget == 0 {
            return Err(Error::DepthExceeded { limit: self.limit });
        }
        self.budget -= 1;
        Ok(())
    }

    fn trace(&self, rule: &str, expr: &Expr) {
        if self.flags.trace {
            eprintln!("[{rule}] remaining={} {expr:?}", self.budget);
        }
    }

    /// Core helper. With `stop` set, an abstraction is returned without touching its
    /// body.
    fn reduce(&mut self, expr: &Expr, stop: bool) -> Result<Expr, Error> {
        with_stack(|| {
            let mut current = Rc::clone(expr);
            loop {
                self.consume()?;
                if let Some(resolver) = self.resolver {
                    current = resolver(&current);
                }
                match self.step(&current, stop)? {
                    Step::Done(result) => return Ok(result),
                    Step::Continue(next) => current = next,
                }
            }
        })
    }

    fn step(&mut self, expr: &Expr, stop: bool) -> Result<Step, Error> {
        match &**expr {
            Expression::Abstraction { param, body } => {
                if stop {
                    return Ok(Step::Done(Rc::clone(expr)));
                }
                let reduced = self.reduce(body, false)?;

                if !self.flags.no_eta
                    && let Expression::Application { func, arg } = &*reduced
                    && matches!(&**arg, Expression::Bound(s) if s == param)
                    && !contains_bound_symbol(func, *param)
                {
                    self.trace("eta", expr);
                    return Ok(Step::Done(Rc::clone(func)));
                }

                if Rc::ptr_eq(&reduced, body) {
                    Ok(Step::Done(Rc::clone(expr)))
                } else {
                    Ok(Step::Done(Rc::new(Expression::Abstraction {
                        param: *param,
                        body: reduced,
                    })))
                }
            }

            Expression::Application { func, arg } if !self.flags.no_beta => {
                let head = self.reduce(func, true)?;
                if let Expression::Abstraction { param, body } = &*head {
                    self.trace("beta", expr);
                    let replacement = if self.flags.lazy {
                        self.register_thunk(arg)
                    } else {
                        Rc::clone(arg)
                    };
                    return Ok(Step::Continue(substitute(body, *param, &replacement)));
                }

                // Stuck application
                let arg = self.reduce(arg, false)?;
                Ok(Step::Done(rebuild_application(expr, head, arg)))
            }

            Expression::Application { func, arg } => {
                let func = self.reduce(func, false)?;
                let arg = self.reduce(arg, false)?;
                Ok(Step::Done(rebuild_application(expr, func, arg)))
            }

            Expression::Builtin(node) => {
                let Some(native) = node.native.as_ref().filter(|_| !self.flags.no_builtin) else {
                    return Ok(Step::Done(Rc::clone(expr)));
                };

                let reduced = node.try_map_children(|child| self.reduce(child, stop))?;

                match (native.func)(&reduced) {
                    Some(result) => {
                        self.trace("builtin", expr);
                        Ok(Step::Done(result))
                    }
                    None => Ok(Step::Done(Rc::new(Expression::Builtin(reduced)))),
                }
            }

            Expression::Lazy(id) => match self.thunks.get(*id).cloned() {
                Some(Thunk::Forced(value)) => Ok(Step::Done(value)),
                // A probe may stop short of the normal form, so its result is not kept
                Some(Thunk::Pending(pending)) if stop => Ok(Step::Continue(pending)),
                Some(Thunk::Pending(pending)) => {
                    self.trace("force", expr);
                    let value = self.reduce(&pending, false)?;
                    self.thunks[*id] = Thunk::Forced(Rc::clone(&value));
                    Ok(Step::Done(value))
                }
                // Not a slot of this evaluation
                None => Ok(Step::Done(Rc::clone(expr))),
            },

            Expression::Bound(_) | Expression::Free { .. } => Ok(Step::Done(Rc::clone(expr))),
        }
    }

    fn register_thunk(&mut self, expr: &Expr) -> Expr {
        if matches!(&**expr, Expression::Lazy(_)) {
            return Rc::clone(expr);
        }
        let id: LazyId = self.thunks.len();
        self.thunks.push(Thunk::Pending(Rc::clone(expr)));
        Rc::new(Expression::Lazy(id))
    }

    /// Replace every Lazy reference in a finished result with its slot's content:
    /// the forced value, or else the pending expression.
    fn settle(&self, expr: &Expr, settled: &mut HashMap<LazyId, Expr>) -> Expr {
        if self.thunks.is_empty() {
            return Rc::clone(expr);
        }
        with_stack(|| match &**expr {
            Expression::Lazy(id) => {
                if let Some(content) = settled.get(id) {
                    return Rc::clone(content);
                }
                let content = match self.thunks.get(*id) {
                    Some(Thunk::Forced(slot) | Thunk::Pending(slot)) => self.settle(slot, settled),
                    None => return Rc::clone(expr),
                };
                settled.insert(*id, Rc::clone(&content));
                content
            }
            Expression::Abstraction { param, body } => {
                rebuild_abstraction(expr, *param, self.settle(body, settled))
            }
            Expression::Application { func, arg } => {
                let func = self.settle(func, settled);
                let arg = self.settle(arg, settled);
                rebuild_application(expr, func, arg)
            }
            Expression::Builtin(node) => {
                rebuild_builtin(expr, node, |child| self.settle(child, settled))
            }
            Expression::Bound(_) | Expression::Free { .. } => Rc::clone(expr),
        })
    }
}

/// Rebuild an application, reusing `node` when neither side changed
fn rebuild_application(node: &Expr, func: Expr, arg: Expr) -> Expr {
    if let Expression::Application {
        func: old_func,
        arg: old_arg,
    } = &**node
        && Rc::ptr_eq(old_func, &func)
        && Rc::ptr_eq(old_arg, &arg)
    {
        return Rc::clone(node);
    }
    Rc::new(Expression::Application { func, arg })
}

fn rebuild_abstraction(node: &Expr, param: SymbolRef, body: Expr) -> Expr {
    match &**node {
        Expression::Abstraction { body: old_body, .. } if Rc::ptr_eq(old_body, &body) => {
            Rc::clone(node)
        }
        _ => Rc::new(Expression::Abstraction { param, body }),
    }
}

/// Map the children of a builtin node, reusing `node` when none of them changed
fn rebuild_builtin(node: &Expr, builtin: &BuiltinNode, mut f: impl FnMut(&Expr) -> Expr) -> Expr {
    let mut changed = false;
    let new_node = builtin.map_children(|child| {
        let new_child = f(child);
        changed |= !Rc::ptr_eq(&new_child, child);
        new_child
    });
    if changed {
        Rc::new(Expression::Builtin(new_node))
    } else {
        Rc::clone(node)
    }
}

/// Replace every bound reference to `symbol` in `expr` with `replacement`.
///
/// An abstraction binding `symbol` itself shadows it, so its body is left alone.
/// Unchanged subtrees are shared with the input.
pub fn substitute(expr: &Expr, symbol: SymbolRef, replacement: &Expr) -> Expr {
    with_stack(|| match &**expr {
        Expression::Bound(s) if *s == symbol => Rc::clone(replacement),
        Expression::Abstraction { param, body } if *param != symbol => {
            rebuild_abstraction(expr, *param, substitute(body, symbol, replacement))
        }
        Expression::Application { func, arg } => rebuild_application(
            expr,
            substitute(func, symbol, replacement),
            substitute(arg, symbol, replacement),
        ),
        Expression::Builtin(node) => {
            rebuild_builtin(expr, node, |child| substitute(child, symbol, replacement))
        }
        _ => Rc::clone(expr),
    })
}

/// Copy of `expr` with the instance of every binder and bound reference set to
/// `new_instance`. Symbol ids are kept.
pub fn refresh_instances(expr: &Expr, new_instance: Instance) -> Expr {
    let restamp = |s: &SymbolRef| SymbolRef::with_instance(s.symbol, new_instance);
    with_stack(|| match &**expr {
        Expression::Bound(s) => Rc::new(Expression::Bound(restamp(s))),
        Expression::Abstraction { param, body } => Rc::new(Expression::Abstraction {
            param: restamp(param),
            body: refresh_instances(body, new_instance),
        }),
        Expression::Application { func, arg } => Rc::new(Expression::Application {
            func: refresh_instances(func, new_instance),
            arg: refresh_instances(arg, new_instance),
        }),
        Expression::Builtin(node) => Rc::new(Expression::Builtin(
            node.map_children(|child| refresh_instances(child, new_instance)),
        )),
        Expression::Free { .. } | Expression::Lazy(_) => Rc::clone(expr),
    })
}

/// Whether `symbol` occurs free in `expr`
pub fn contains_bound_symbol(expr: &Expression, symbol: SymbolRef) -> bool {
    with_stack(|| match expr {
        Expression::Bound(s) => *s == symbol,
        Expression::Abstraction { param, body } => {
            *param != symbol && contains_bound_symbol(body, symbol)
        }
        Expression::Application { func, arg } => {
            contains_bound_symbol(func, symbol) || contains_bound_symbol(arg, symbol)
        }
        Expression::Builtin(node) => [&node.left, &node.right]
            .into_iter()
            .flatten()
            .any(|child| contains_bound_symbol(child, symbol)),
        Expression::Free { .. } | Expression::Lazy(_) => false,
    })
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{
        NativeOp, SymbolId, abs, abs_ref, app, apply_all, bound, bound_ref, free,
        to_string,
    };
    use crate::scope::ScopeTable;
    use std::cell::Cell;

    fn register_all<const N: usize>(table: &mut ScopeTable, names: [&str; N]) -> [SymbolId; N] {
        names.map(|name| table.register(name).unwrap())
    }

    /// Run (expression, flags, expected display) cases without a resolver
    fn run_eval_tests(table: &ScopeTable, test_cases: Vec<(Expr, EvalFlags, &str)>) {
        for (i, (expr, flags, expected)) in test_cases.iter().enumerate() {
            let result = evaluate(expr, None, 1_000, *flags)
                .unwrap_or_else(|e| panic!("Eval test #{} failed: {e}", i + 1));
            assert_eq!(
                to_string(&result, table),
                *expected,
                "Eval test #{} failed for {expr:?}",
                i + 1
            );
        }
    }

    fn counting_builtin(counter: &Rc<Cell<usize>>, arg: Expr, result: Expr) -> Expr {
        let counter = Rc::clone(counter);
        let op = NativeOp::new("count", move |_: &BuiltinNode| {
            counter.set(counter.get() + 1);
            Some(Rc::clone(&result))
        });
        Rc::new(Expression::Builtin(BuiltinNode::new(Some(arg), None, Some(op))))
    }

    #[test]
    fn test_normal_order_reduction() {
        let mut table = ScopeTable::new();
        let [x, y, f] = register_all(&mut table, ["x", "y", "f"]);

        let k = || abs(x, abs(y, bound(x)));
        let omega_half = || abs(x, app(bound(x), bound(x)));

        let test_cases = vec![
            // K A B -> A
            (apply_all(k(), [free("A"), free("B")]), EvalFlags::NONE, "A"),
            (apply_all(k(), [free("A"), free("B")]), EvalFlags::LAZY, "A"),
            // Discarded argument is never reduced
            (
                apply_all(k(), [free("A"), app(omega_half(), omega_half())]),
                EvalFlags::NONE,
                "A",
            ),
            (
                apply_all(k(), [free("A"), app(omega_half(), omega_half())]),
                EvalFlags::LAZY,
                "A",
            ),
            // Reduction under abstractions
            (abs(y, app(abs(x, bound(x)), bound(y))), EvalFlags::NONE, "\\y.y"),
            // Eta-contraction
            (abs(x, app(free("f"), bound(x))), EvalFlags::NONE, "f"),
            (
                abs(x, app(free("f"), bound(x))),
                EvalFlags {
                    no_eta: true,
                    ..EvalFlags::NONE
                },
                "\\x.f x",
            ),
            // Guard: the parameter occurs in the function position
            (abs(x, app(bound(x), bound(x))), EvalFlags::NONE, "\\x.x x"),
            (
                abs(x, apply_all(free("g"), [bound(x), bound(x)])),
                EvalFlags::NONE,
                "\\x.g x x",
            ),
            // Stuck applications keep their shape with normalized arguments
            (
                app(free("g"), app(abs(x, bound(x)), free("a"))),
                EvalFlags::NONE,
                "g a",
            ),
            // Church arithmetic: succ 1 = 2, with both terms reusing the same binders
            (
                app(
                    abs(
                        y,
                        abs(f, abs(x, app(bound(f), apply_all(bound(y), [bound(f), bound(x)])))),
                    ),
                    abs(f, abs(x, app(bound(f), bound(x)))),
                ),
                EvalFlags::LAZY,
                "\\f.\\x.f (f x)",
            ),
            // No beta: both sides normalized independently
            (
                app(abs(x, bound(x)), free("a")),
                EvalFlags {
                    no_beta: true,
                    ..EvalFlags::NONE
                },
                "(\\x.x) a",
            ),
        ];

        run_eval_tests(&table, test_cases);
    }

    #[test]
    fn test_depth_limit_terminates_omega() {
        let mut table = ScopeTable::new();
        let [x] = register_all(&mut table, ["x"]);
        let half = abs(x, app(bound(x), bound(x)));
        let omega = app(Rc::clone(&half), half);

        for flags in [EvalFlags::NONE, EvalFlags::LAZY] {
            for limit in [0, 1, 10, 5_000] {
                assert_eq!(
                    evaluate(&omega, None, limit, flags),
                    Err(Error::DepthExceeded { limit }),
                    "omega must exhaust a budget of {limit} under {flags:?}"
                );
            }
        }
    }

    #[test]
    fn test_budget_is_shared_across_subterms() {
        let mut table = ScopeTable::new();
        let [x] = register_all(&mut table, ["x"]);
        let id = || abs(x, bound(x));

        // Each redex alone fits in a small budget, all of them together do not
        let many = (0..20).fold(free("g"), |acc, _| app(acc, app(id(), free("a"))));
        assert!(evaluate(&many, None, 1_000, EvalFlags::NONE).is_ok());
        assert_eq!(
            evaluate(&many, None, 20, EvalFlags::NONE),
            Err(Error::DepthExceeded { limit: 20 })
        );
    }

    #[test]
    fn test_lazy_arguments_are_forced_once() {
        let mut table = ScopeTable::new();
        let [x] = register_all(&mut table, ["x"]);

        let run = |flags: EvalFlags| {
            let counter = Rc::new(Cell::new(0));
            let expensive = counting_builtin(&counter, free("a"), free("done"));
            let expr = app(abs(x, apply_all(free("g"), [bound(x), bound(x)])), expensive);
            let result = evaluate(&expr, None, 1_000, flags).unwrap();
            (to_string(&result, &table), counter.get())
        };

        assert_eq!(run(EvalFlags::LAZY), ("g done done".to_owned(), 1));
        // Call-by-name reduces each copy separately
        assert_eq!(run(EvalFlags::NONE), ("g done done".to_owned(), 2));
    }

    #[test]
    fn test_weak_probe_does_not_memoize() {
        let mut table = ScopeTable::new();
        let [t, z] = register_all(&mut table, ["t", "z"]);

        // (\t.t (t a)) <builtin returning \z.z>: both uses of t are in function
        // position, so the thunk is only ever probed
        let counter = Rc::new(Cell::new(0));
        let identity = abs(z, bound(z));
        let thunk_body = counting_builtin(&counter, free("seed"), identity);
        let expr = app(
            abs(t, app(bound(t), app(bound(t), free("a")))),
            thunk_body,
        );

        let result = evaluate(&expr, None, 1_000, EvalFlags::LAZY).unwrap();
        assert_eq!(to_string(&result, &table), "a");
        assert_eq!(counter.get(), 2);
    }

    #[test]
    fn test_result_has_no_lazy_references() {
        let mut table = ScopeTable::new();
        let [t, z] = register_all(&mut table, ["t", "z"]);
        let successor = table.builtins().lookup("_Successor").unwrap();

        // (\t.(_Successor (\z.t)) a) b: the stuck builtin only ever probes its
        // argument, so the thunk holding `b` is never forced
        let expr = app(
            abs(t, apply_all(successor, [abs(z, bound(t)), free("a")])),
            free("b"),
        );

        let result = evaluate(&expr, None, 1_000, EvalFlags::LAZY).unwrap();
        assert_eq!(to_string(&result, &table), "<BUILTIN>(\\z.b) a");
        assert!(!format!("{result:?}").contains("<#"), "got {result:?}");
    }

    #[test]
    fn test_growing_term_exhausts_budget_not_stack() {
        let mut table = ScopeTable::new();
        let [x] = register_all(&mut table, ["x"]);
        // (\x.g (x x)) (\x.g (x x)) nests one more stuck `g` per unfolding
        let half = abs(x, app(free("g"), app(bound(x), bound(x))));
        let growing = app(Rc::clone(&half), half);

        for flags in [EvalFlags::NONE, EvalFlags::LAZY] {
            assert_eq!(
                evaluate(&growing, None, 100_000, flags),
                Err(Error::DepthExceeded { limit: 100_000 })
            );
        }
    }

    #[test]
    fn test_builtin_successor() {
        let table = ScopeTable::new();
        let registry = table.builtins();
        let successor = registry.lookup("_Successor").unwrap();

        let test_cases = vec![
            (
                app(Rc::clone(&successor), registry.make_integer(3)),
                EvalFlags::NONE,
                "<_Integer>4",
            ),
            (
                app(Rc::clone(&successor), registry.make_integer(3)),
                EvalFlags::LAZY,
                "<_Integer>4",
            ),
            (
                app(
                    Rc::clone(&successor),
                    app(Rc::clone(&successor), registry.lookup("_Zero").unwrap()),
                ),
                EvalFlags::LAZY,
                "<_Integer>2",
            ),
            // Non-integer input is a stuck term
            (
                app(Rc::clone(&successor), free("foo")),
                EvalFlags::NONE,
                "<BUILTIN>(foo)",
            ),
            // Opaque builtins keep their children exactly as given
            (
                app(Rc::clone(&successor), registry.make_integer(0)),
                EvalFlags {
                    no_builtin: true,
                    ..EvalFlags::NONE
                },
                "<BUILTIN>(<_Integer>0)",
            ),
        ];

        run_eval_tests(&table, test_cases);
    }

    #[test]
    fn test_builtin_without_native_is_opaque() {
        let mut table = ScopeTable::new();
        let [x] = register_all(&mut table, ["x"]);
        let redex = app(abs(x, bound(x)), free("a"));
        let node = Rc::new(Expression::Builtin(BuiltinNode::new(Some(redex), None, None)));

        let result = evaluate(&node, None, 100, EvalFlags::NONE).unwrap();
        assert!(Rc::ptr_eq(&result, &node));
    }

    #[test]
    fn test_resolver_runs_on_every_node() {
        let mut table = ScopeTable::new();
        let [x] = register_all(&mut table, ["x"]);
        let identity = abs(x, bound(x));

        let hook: &Resolver = &|e: &Expr| match &**e {
            Expression::Free { name, value: None } if name == "I" => Rc::clone(&identity),
            _ => Rc::clone(e),
        };

        let expr = app(free("I"), app(free("g"), app(free("I"), free("a"))));
        let full = evaluate(&expr, Some(hook), 1_000, EvalFlags::LAZY).unwrap();
        assert_eq!(to_string(&full, &table), "g a");

        // Expansion only: definitions are substituted, nothing is reduced
        let expanded = evaluate(&expr, Some(hook), 1_000, EvalFlags::RESOLVE_ONLY).unwrap();
        assert_eq!(to_string(&expanded, &table), "(\\x.x) (g ((\\x.x) a))");
    }

    #[test]
    fn test_refreshed_expansion_avoids_capture() {
        let mut table = ScopeTable::new();
        let [x, y] = register_all(&mut table, ["x", "y"]);
        let k = abs(x, abs(y, bound(x)));

        // \y.K y, where the surrounding binder shares K's inner symbol id
        let context = abs(y, app(free("K"), bound(y)));

        let fresh = Cell::new(0);
        let refreshing: &Resolver = &|e: &Expr| match &**e {
            Expression::Free { name, value: None } if name == "K" => {
                fresh.set(fresh.get() + 1);
                refresh_instances(&k, fresh.get())
            }
            _ => Rc::clone(e),
        };

        let result = evaluate(&context, Some(refreshing), 1_000, EvalFlags::NONE).unwrap();
        let outer = SymbolRef::new(y);
        let inner = SymbolRef::with_instance(y, 1);
        assert_eq!(result, abs_ref(outer, abs_ref(inner, bound_ref(outer))));

        // Applied to two arguments it still returns the first one
        let applied = apply_all(context, [free("a"), free("b")]);
        let result = evaluate(&applied, Some(refreshing), 1_000, EvalFlags::LAZY).unwrap();
        assert_eq!(to_string(&result, &table), "a");
    }

    #[test]
    fn test_substitute_respects_shadowing() {
        let mut table = ScopeTable::new();
        let [x, y] = register_all(&mut table, ["x", "y"]);
        let sx = SymbolRef::new(x);

        let expr = app(bound(x), abs(x, bound(x)));
        let result = substitute(&expr, sx, &free("a"));
        assert_eq!(to_string(&result, &table), "a (\\x.x)");

        // Same id, other instance: a different variable
        let other = abs_ref(SymbolRef::with_instance(x, 5), bound(x));
        assert_eq!(to_string(&substitute(&other, sx, &free("a")), &table), "\\x.a");

        // Untouched subtrees are shared
        let untouched = abs(y, app(bound(y), free("b")));
        assert!(Rc::ptr_eq(&substitute(&untouched, sx, &free("a")), &untouched));
    }

    #[test]
    fn test_refresh_instances_restamps_all_binders() {
        let mut table = ScopeTable::new();
        let [x, y] = register_all(&mut table, ["x", "y"]);
        let expr = abs(x, abs(y, app(bound(x), free("z"))));

        let refreshed = refresh_instances(&expr, 7);
        let expected = abs_ref(
            SymbolRef::with_instance(x, 7),
            abs_ref(
                SymbolRef::with_instance(y, 7),
                app(bound_ref(SymbolRef::with_instance(x, 7)), free("z")),
            ),
        );
        assert_eq!(refreshed, expected);
        assert_eq!(to_string(&refreshed, &table), to_string(&expr, &table));
    }

    #[test]
    fn test_contains_bound_symbol() {
        let mut table = ScopeTable::new();
        let [x, y] = register_all(&mut table, ["x", "y"]);
        let sx = SymbolRef::new(x);

        assert!(contains_bound_symbol(&app(free("f"), bound(x)), sx));
        assert!(!contains_bound_symbol(&app(free("f"), bound(y)), sx));
        assert!(!contains_bound_symbol(&abs(x, bound(x)), sx));
        assert!(contains_bound_symbol(&abs(y, bound(x)), sx));
        assert!(!contains_bound_symbol(
            &bound_ref(SymbolRef::with_instance(x, 3)),
            sx
        ));
        let node = Expression::Builtin(BuiltinNode::new(None, Some(bound(x)), None));
        assert!(contains_bound_symbol(&node, sx));
    }

    #[test]
    fn test_flag_presets() {
        assert_eq!(EvalFlags::default(), EvalFlags::NONE);
        assert!(EvalFlags::LAZY.lazy && !EvalFlags::LAZY.no_beta);
        let r = EvalFlags::RESOLVE_ONLY;
        assert!(r.no_beta && r.no_eta && r.no_builtin && !r.lazy);
        assert!(EvalFlags::LAZY.with_trace(true).trace);
    }
}
