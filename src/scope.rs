//! Binder registration.
//!
//! A [`ScopeTable`] is a chain of frames. Each frame maps the binder names
//! introduced by one abstraction to their symbol ids and falls through to its
//! parent on a miss, so inner binders shadow outer ones. All frames of a session
//! share one root state which owns the id counter, the reverse id-to-name map used
//! for display, the instance counter used to re-stamp expanded definitions, and the
//! [`BuiltinRegistry`].

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::Error;
use crate::ast::{Instance, SymbolId};
use crate::builtinops::BuiltinRegistry;

/// Session-wide state shared by every frame of one scope chain
#[derive(Debug)]
struct SessionRoot {
    next_id: Cell<SymbolId>,
    names: RefCell<HashMap<SymbolId, String>>,
    next_instance: Cell<Instance>,
    builtins: BuiltinRegistry,
}

/// One frame of the binder-name registry
#[derive(Debug)]
pub struct ScopeTable {
    bindings: HashMap<String, SymbolId>,
    parent: Option<Rc<ScopeTable>>,
    root: Rc<SessionRoot>,
}

impl ScopeTable {
    /// Create the root frame of a new session.
    ///
    /// The builtin registry is seeded here: its binders `x` and `y` get the first
    /// two ids and are recorded for display, but they are not visible to name
    /// lookup, so a top-level `x` typed by the user stays a free name.
    pub fn new() -> Self {
        let mut names = HashMap::new();
        let mut next_id: SymbolId = 1;
        let mut seed = |name: &str| {
            let id = next_id;
            next_id += 1;
            names.insert(id, name.to_owned());
            id
        };
        let x = seed("x");
        let y = seed("y");

        ScopeTable {
            bindings: HashMap::new(),
            parent: None,
            root: Rc::new(SessionRoot {
                next_id: Cell::new(next_id),
                names: RefCell::new(names),
                next_instance: Cell::new(1),
                builtins: BuiltinRegistry::new(x, y),
            }),
        }
    }

    /// Register a binder name in this frame and return its fresh id.
    ///
    /// Shadowing a name from an enclosing frame is allowed; declaring the same name
    /// twice in one frame is not.
    pub fn register(&mut self, name: &str) -> Result<SymbolId, Error> {
        if self.bindings.contains_key(name) {
            return Err(Error::DuplicateBinding(name.to_owned()));
        }

        let id = self.root.next_id.get();
        self.root.next_id.set(id + 1);
        self.root.names.borrow_mut().insert(id, name.to_owned());
        self.bindings.insert(name.to_owned(), id);

        Ok(id)
    }

    /// Look a name up from this frame outwards; the innermost binding wins
    pub fn resolve_name(&self, name: &str) -> Option<SymbolId> {
        self.bindings.get(name).copied().or_else(|| {
            self.parent
                .as_ref()
                .and_then(|parent| parent.resolve_name(name))
        })
    }

    /// Display name of a symbol id, from the session-wide reverse map
    pub fn resolve_id(&self, id: SymbolId) -> Option<String> {
        self.root.names.borrow().get(&id).cloned()
    }

    /// New empty frame nested inside this one
    pub fn child_frame(self: &Rc<Self>) -> ScopeTable {
        ScopeTable {
            bindings: HashMap::new(),
            parent: Some(Rc::clone(self)),
            root: Rc::clone(&self.root),
        }
    }

    pub fn builtins(&self) -> &BuiltinRegistry {
        &self.root.builtins
    }

    /// Allocate an instance value never handed out before in this session
    pub fn fresh_instance(&self) -> Instance {
        let instance = self.root.next_instance.get();
        self.root.next_instance.set(instance + 1);
        instance
    }

    /// Names registered directly in this frame, sorted
    #[cfg(test)]
    pub fn local_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.bindings.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for ScopeTable {
    fn default() -> Self {
        Self::new()
    }
}
