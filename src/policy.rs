//! Policy gates
//!
//! Before any trap executes, the dispatcher consults the handler's policy
//! (when it declares one) through an [`AutoEnterPolicy`] gate. A denied gate
//! yields a prescribed substitute result, or an error when the operation may
//! surface the denial. In debug builds every allowed entry is recorded on a
//! context-local stack with guaranteed pop-on-drop, so trap implementations
//! can assert they run bracketed by the gate that admitted them.

use crate::context::Context;
use crate::error::JsError;
use crate::handler::ProxyHandler;
use crate::value::{JsObjectRef, PropertyKey};

#[cfg(debug_assertions)]
use crate::value::CheapClone;
#[cfg(debug_assertions)]
use std::cell::RefCell;
#[cfg(debug_assertions)]
use std::rc::Rc;

/// Coarse classification of a trap for policy purposes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Reads, existence checks, enumeration, introspection
    Get,
    /// Definition, assignment, deletion
    Set,
    /// Invocation and construction
    Call,
}

/// Outcome of a policy check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    /// Run the trap
    Allow,
    /// Refuse silently; the caller receives the operation's substitute result
    DenyReturn,
    /// Refuse loudly; the denial surfaces as an error where the operation
    /// may throw
    DenyThrow,
}

/// One recorded policy entry (debug builds)
#[cfg(debug_assertions)]
#[derive(Debug)]
pub(crate) struct PolicyFrame {
    pub(crate) proxy: JsObjectRef,
    pub(crate) key: Option<PropertyKey>,
}

/// Per-operation policy gate with stack-scoped lifetime
pub struct AutoEnterPolicy {
    allowed: bool,
    throw_on_deny: bool,
    key: Option<PropertyKey>,
    #[cfg(debug_assertions)]
    recorded: Option<Rc<RefCell<Vec<PolicyFrame>>>>,
}

impl AutoEnterPolicy {
    /// Evaluate the handler's policy for one operation. Handlers without a
    /// policy are always admitted.
    pub fn new(
        cx: &mut Context,
        handler: &dyn ProxyHandler,
        proxy: &JsObjectRef,
        key: Option<PropertyKey>,
        action: Action,
        may_throw: bool,
    ) -> Result<AutoEnterPolicy, JsError> {
        let decision = if handler.has_policy() {
            handler.enter(cx, proxy, key.as_ref(), action)?
        } else {
            PolicyDecision::Allow
        };
        let allowed = matches!(decision, PolicyDecision::Allow);
        let throw_on_deny = may_throw && matches!(decision, PolicyDecision::DenyThrow);

        #[cfg(debug_assertions)]
        let recorded = if allowed {
            cx.policy_stack.borrow_mut().push(PolicyFrame {
                proxy: proxy.clone(),
                key: key.clone(),
            });
            Some(cx.policy_stack.cheap_clone())
        } else {
            None
        };
        #[cfg(not(debug_assertions))]
        let _ = (cx, proxy);

        Ok(AutoEnterPolicy {
            allowed,
            throw_on_deny,
            key,
            #[cfg(debug_assertions)]
            recorded,
        })
    }

    /// Whether the trap may run
    pub fn allowed(&self) -> bool {
        self.allowed
    }

    /// The result of a denied operation: the substitute value, or the denial
    /// error when the gate is allowed to surface it
    pub fn denial<T>(&self, substitute: T) -> Result<T, JsError> {
        debug_assert!(!self.allowed);
        if self.throw_on_deny {
            Err(JsError::policy_denied(
                self.key.as_ref().map(|key| key.to_string()),
            ))
        } else {
            Ok(substitute)
        }
    }
}

impl Drop for AutoEnterPolicy {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        if let Some(stack) = self.recorded.take() {
            let popped = stack.borrow_mut().pop();
            debug_assert!(popped.is_some(), "policy stack underflow");
        }
    }
}

/// Marks an internal per-key lookup as deliberately policy-waived, so the
/// bracketing assertion holds without re-auditing the access (used by the
/// default `keys` filtering loop)
pub struct AutoWaivePolicy {
    #[cfg(debug_assertions)]
    recorded: Option<Rc<RefCell<Vec<PolicyFrame>>>>,
}

impl AutoWaivePolicy {
    pub fn new(cx: &mut Context, proxy: &JsObjectRef, key: PropertyKey) -> AutoWaivePolicy {
        #[cfg(debug_assertions)]
        {
            cx.policy_stack.borrow_mut().push(PolicyFrame {
                proxy: proxy.clone(),
                key: Some(key),
            });
            AutoWaivePolicy {
                recorded: Some(cx.policy_stack.cheap_clone()),
            }
        }
        #[cfg(not(debug_assertions))]
        {
            let _ = (cx, proxy, key);
            AutoWaivePolicy {}
        }
    }
}

impl Drop for AutoWaivePolicy {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        if let Some(stack) = self.recorded.take() {
            let popped = stack.borrow_mut().pop();
            debug_assert!(popped.is_some(), "policy stack underflow");
        }
    }
}

/// Debug assertion that the innermost entered policy matches this proxy and
/// key; trap default bodies call this on entry
#[inline]
pub fn assert_entered_policy(cx: &Context, proxy: &JsObjectRef, key: Option<&PropertyKey>) {
    #[cfg(debug_assertions)]
    {
        let stack = cx.policy_stack.borrow();
        let top = stack.last();
        debug_assert!(top.is_some(), "trap invoked outside a policy gate");
        if let Some(frame) = top {
            debug_assert!(
                Rc::ptr_eq(&frame.proxy, proxy),
                "trap invoked under a different proxy's policy gate"
            );
            debug_assert!(
                frame.key.as_ref() == key,
                "trap invoked under a different key's policy gate"
            );
        }
    }
    #[cfg(not(debug_assertions))]
    let _ = (cx, proxy, key);
}
