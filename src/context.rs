//! Execution context for proxy dispatch
//!
//! Every operation takes an explicit `&mut Context` instead of reaching for
//! ambient runtime state. The context carries the recursion budget (scripted
//! traps may re-enter the dispatcher arbitrarily deep) and, in debug builds,
//! the entered-policy stack used to assert that handlers bracket their
//! reentrant trap calls correctly.

use std::cell::Cell;
use std::rc::Rc;

use crate::error::JsError;
use crate::proxy::Proxy;
use crate::value::{CheapClone, Exotic, JsValue};

#[cfg(debug_assertions)]
use crate::policy::PolicyFrame;
#[cfg(debug_assertions)]
use std::cell::RefCell;

/// Default bound on nested dispatch frames
pub const DEFAULT_RECURSION_LIMIT: usize = 512;

/// Explicit context threaded through every dispatch operation
pub struct Context {
    depth: Rc<Cell<usize>>,
    recursion_limit: usize,
    #[cfg(debug_assertions)]
    pub(crate) policy_stack: Rc<RefCell<Vec<PolicyFrame>>>,
}

impl Context {
    pub fn new() -> Self {
        Self::with_recursion_limit(DEFAULT_RECURSION_LIMIT)
    }

    /// A context with a custom bound on nested dispatch frames
    pub fn with_recursion_limit(limit: usize) -> Self {
        Self {
            depth: Rc::new(Cell::new(0)),
            recursion_limit: limit,
            #[cfg(debug_assertions)]
            policy_stack: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn recursion_limit(&self) -> usize {
        self.recursion_limit
    }

    /// Current nesting depth of dispatch frames
    pub fn recursion_depth(&self) -> usize {
        self.depth.get()
    }

    /// Claim a dispatch frame. Every externally reentrant entry point calls
    /// this first; the frame is released when the guard drops, on every exit
    /// path. Exceeding the bound fails with `RecursionLimitExceeded` instead
    /// of overflowing the native stack.
    pub fn enter_recursion(&self) -> Result<RecursionGuard, JsError> {
        let depth = self.depth.get();
        if depth >= self.recursion_limit {
            return Err(JsError::RecursionLimitExceeded {
                limit: self.recursion_limit,
            });
        }
        self.depth.set(depth + 1);
        Ok(RecursionGuard {
            depth: self.depth.cheap_clone(),
        })
    }

    /// Invoke a callable value: a host function, or a callable proxy (which
    /// dispatches through its handler's call trap)
    pub fn invoke(
        &mut self,
        callee: &JsValue,
        this: JsValue,
        args: &[JsValue],
    ) -> Result<JsValue, JsError> {
        let _frame = self.enter_recursion()?;
        let JsValue::Object(obj) = callee else {
            return Err(JsError::type_error("not a function"));
        };
        enum Kind {
            Function(crate::value::NativeFn),
            Proxy,
        }
        let kind = match &obj.borrow().exotic {
            Exotic::Function(f) => Kind::Function(f.func.cheap_clone()),
            Exotic::Proxy(data) if data.call.is_some() => Kind::Proxy,
            _ => return Err(JsError::type_error("not a function")),
        };
        match kind {
            Kind::Function(func) => func(self, this, args),
            Kind::Proxy => Proxy::call(self, obj, this, args),
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard for one claimed dispatch frame
pub struct RecursionGuard {
    depth: Rc<Cell<usize>>,
}

impl Drop for RecursionGuard {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}
