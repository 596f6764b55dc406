//! Proxy handler interface
//!
//! [`ProxyHandler`] is the capability set a proxy dispatches through. The six
//! fundamental traps are required methods; every derived trap carries the
//! spec-derived default body, expressed in terms of the fundamentals, so a
//! handler only overrides what it wants to specialize. The default bodies
//! live in free functions so overriding handlers can still fall back to them
//! explicitly.

pub mod direct;
pub mod scripted_direct;
pub mod scripted_indirect;

pub use direct::DirectHandler;
pub use scripted_direct::ScriptedDirectHandler;
pub use scripted_indirect::ScriptedIndirectHandler;

use crate::context::Context;
use crate::descriptor::PropertyDescriptor;
use crate::error::JsError;
use crate::object::{self, ConversionHint, IterFlags, KeyIterator};
use crate::policy::{Action, AutoWaivePolicy, PolicyDecision, assert_entered_policy};
use crate::proxy;
use crate::value::{CheapClone, EsClass, JsObjectRef, JsString, JsValue, PropertyKey};

/// Closed set of handler families. The family is an opaque identity used for
/// fast-path compatibility checks ("is this proxy still dispatched by the
/// same kind of handler"), not for behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerFamily {
    Direct,
    ScriptedIndirect,
    ScriptedDirect,
    /// Embedder-defined native policy handlers, keyed by an opaque token
    Custom(u64),
}

/// The polymorphic capability set behind every proxy
pub trait ProxyHandler {
    /// Identity token for handler-compatibility checks
    fn family(&self) -> HandlerFamily;

    /// Whether this handler declares a prototype of its own. When true, the
    /// dispatcher synthesizes chain-walking operations from the handler's
    /// own-property traps and never calls `get_property_descriptor`,
    /// `enumerate`, `has`, or chain-aware `get`/`set`/`iterate` directly.
    fn has_prototype(&self) -> bool {
        false
    }

    /// Whether the dispatcher must consult `enter` before each operation
    fn has_policy(&self) -> bool {
        false
    }

    /// Policy check for one operation; only called when `has_policy()`
    fn enter(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: Option<&PropertyKey>,
        action: Action,
    ) -> Result<PolicyDecision, JsError> {
        let _ = (cx, proxy, key, action);
        Ok(PolicyDecision::Allow)
    }

    // ── Fundamental traps ──────────────────────────────────────────────

    /// Chain-aware descriptor lookup. Handlers with a prototype never
    /// receive this call; everything else must override it.
    fn get_property_descriptor(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
    ) -> Result<Option<PropertyDescriptor>, JsError> {
        let _ = (cx, proxy, key);
        Err(JsError::internal_error(
            "handler must implement get_property_descriptor or declare a prototype",
        ))
    }

    fn get_own_property_descriptor(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
    ) -> Result<Option<PropertyDescriptor>, JsError>;

    fn define_property(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
        desc: &PropertyDescriptor,
    ) -> Result<bool, JsError>;

    /// All own property keys, hidden included
    fn get_own_property_names(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
    ) -> Result<Vec<PropertyKey>, JsError>;

    fn delete(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
    ) -> Result<bool, JsError>;

    /// Enumerable keys along the whole chain
    fn enumerate(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
    ) -> Result<Vec<PropertyKey>, JsError>;

    // ── Derived traps ──────────────────────────────────────────────────

    fn has(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
    ) -> Result<bool, JsError> {
        default_has(self, cx, proxy, key)
    }

    fn has_own(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
    ) -> Result<bool, JsError> {
        default_has_own(self, cx, proxy, key)
    }

    fn get(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        receiver: &JsValue,
        key: &PropertyKey,
    ) -> Result<JsValue, JsError> {
        default_get(self, cx, proxy, receiver, key)
    }

    fn set(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        receiver: &JsValue,
        key: &PropertyKey,
        strict: bool,
        value: JsValue,
    ) -> Result<bool, JsError> {
        default_set(self, cx, proxy, receiver, key, strict, value)
    }

    /// Own enumerable keys
    fn keys(&self, cx: &mut Context, proxy: &JsObjectRef) -> Result<Vec<PropertyKey>, JsError> {
        default_keys(self, cx, proxy)
    }

    fn iterate(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        flags: IterFlags,
    ) -> Result<KeyIterator, JsError> {
        default_iterate(self, cx, proxy, flags)
    }

    fn call(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        this: JsValue,
        args: &[JsValue],
    ) -> Result<JsValue, JsError> {
        default_call(self, cx, proxy, this, args)
    }

    fn construct(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        args: &[JsValue],
    ) -> Result<JsValue, JsError> {
        default_construct(self, cx, proxy, args)
    }

    fn get_element_if_present(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        receiver: &JsValue,
        index: u32,
    ) -> Result<Option<JsValue>, JsError> {
        default_get_element_if_present(self, cx, proxy, receiver, index)
    }

    // ── Extension traps ────────────────────────────────────────────────

    fn object_class_is(&self, cx: &mut Context, proxy: &JsObjectRef, class: EsClass) -> bool {
        let _ = (cx, proxy, class);
        false
    }

    fn has_instance(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        value: &JsValue,
    ) -> Result<bool, JsError> {
        assert_entered_policy(cx, proxy, None);
        let _ = value;
        Err(JsError::type_error(
            "invalid 'instanceof' operand: proxy does not support instance checks",
        ))
    }

    fn default_value(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        hint: ConversionHint,
    ) -> Result<JsValue, JsError> {
        object::ordinary_to_primitive(cx, proxy, hint)
    }

    fn obj_to_string(&self, cx: &mut Context, proxy: &JsObjectRef) -> Result<JsString, JsError> {
        let _ = cx;
        Ok(default_obj_to_string(proxy))
    }

    fn fun_to_string(&self, cx: &mut Context, proxy: &JsObjectRef) -> Result<JsString, JsError> {
        default_fun_to_string(cx, proxy)
    }

    /// Pattern and flags of a wrapped regexp
    fn regexp_shared(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
    ) -> Result<(JsString, JsString), JsError> {
        let _ = (cx, proxy);
        Err(JsError::type_error("expected a wrapped regexp"))
    }

    /// Identity to key weak collections on. `None` means the proxy is its
    /// own identity; forwarding handlers answer with the unwrapped target.
    fn weakmap_key_delegate(&self, proxy: &JsObjectRef) -> Option<JsObjectRef> {
        let _ = proxy;
        None
    }

    fn get_prototype_of(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
    ) -> Result<Option<JsObjectRef>, JsError> {
        let _ = cx;
        Ok(proxy.borrow().prototype.clone())
    }

    /// Teardown hook, run by the owning object system
    fn finalize(&self, proxy: &JsObjectRef) {
        let _ = proxy;
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Default trap bodies
// ═══════════════════════════════════════════════════════════════════════════

pub(crate) fn default_has<H: ProxyHandler + ?Sized>(
    handler: &H,
    cx: &mut Context,
    proxy: &JsObjectRef,
    key: &PropertyKey,
) -> Result<bool, JsError> {
    assert_entered_policy(cx, proxy, Some(key));
    Ok(handler.get_property_descriptor(cx, proxy, key)?.is_some())
}

pub(crate) fn default_has_own<H: ProxyHandler + ?Sized>(
    handler: &H,
    cx: &mut Context,
    proxy: &JsObjectRef,
    key: &PropertyKey,
) -> Result<bool, JsError> {
    assert_entered_policy(cx, proxy, Some(key));
    Ok(handler
        .get_own_property_descriptor(cx, proxy, key)?
        .is_some())
}

pub(crate) fn default_get<H: ProxyHandler + ?Sized>(
    handler: &H,
    cx: &mut Context,
    proxy: &JsObjectRef,
    receiver: &JsValue,
    key: &PropertyKey,
) -> Result<JsValue, JsError> {
    assert_entered_policy(cx, proxy, Some(key));
    let Some(desc) = handler.get_property_descriptor(cx, proxy, key)? else {
        return Ok(JsValue::Undefined);
    };
    if desc.attrs.has_getter {
        return match &desc.getter {
            Some(getter) => cx.invoke(
                &JsValue::Object(getter.cheap_clone()),
                receiver.clone(),
                &[],
            ),
            None => Ok(JsValue::Undefined),
        };
    }
    match desc.getter {
        None => {
            if desc.attrs.shared {
                Ok(JsValue::Undefined)
            } else {
                Ok(desc.value)
            }
        }
        Some(op) => {
            // Slotless property op: seeded with the stored value and keyed
            // by the short id when one is present
            let seeded = if desc.attrs.shared {
                JsValue::Undefined
            } else {
                desc.value.clone()
            };
            let key_value = match desc.attrs.short_id {
                Some(short_id) => JsValue::Number(short_id as f64),
                None => key.to_value(),
            };
            cx.invoke(
                &JsValue::Object(op),
                receiver.clone(),
                &[key_value, seeded],
            )
        }
    }
}

pub(crate) fn default_set<H: ProxyHandler + ?Sized>(
    handler: &H,
    cx: &mut Context,
    proxy: &JsObjectRef,
    receiver: &JsValue,
    key: &PropertyKey,
    strict: bool,
    value: JsValue,
) -> Result<bool, JsError> {
    assert_entered_policy(cx, proxy, Some(key));
    // Own descriptor first, then the full chain; both cases run the same
    // descriptor-driven algorithm
    for own_phase in [true, false] {
        let found = if own_phase {
            handler.get_own_property_descriptor(cx, proxy, key)?
        } else {
            handler.get_property_descriptor(cx, proxy, key)?
        };
        let Some(mut desc) = found else {
            continue;
        };

        if desc.is_data() && !desc.attrs.writable {
            return if strict {
                Err(JsError::type_error(format!(
                    "cannot assign to read-only property '{}'",
                    key
                )))
            } else {
                Ok(false)
            };
        }
        if let Some(setter) = desc.setter.clone() {
            cx.invoke(
                &JsValue::Object(setter),
                receiver.clone(),
                &[value.clone()],
            )?;
            // The setter may have re-pointed or unwrapped the proxy; only
            // fall through to the definition step while it still dispatches
            // to this handler family
            let still_ours = proxy::handler_of(proxy)
                .is_some_and(|current| current.family() == handler.family());
            if !still_ours {
                return Ok(true);
            }
            if desc.attrs.shared {
                return Ok(true);
            }
        }
        // An explicitly undefined setter, or no setter at all, falls
        // through to the definition step on the receiver
        desc.value = value;
        let receiver_obj = receiver.to_object("assignment receiver")?;
        return object::define_property(cx, &receiver_obj, key, &desc);
    }

    // Absent along the whole chain: create an own enumerable data property
    let receiver_obj = receiver.to_object("assignment receiver")?;
    object::define_property(cx, &receiver_obj, key, &PropertyDescriptor::data(value))
}

pub(crate) fn default_keys<H: ProxyHandler + ?Sized>(
    handler: &H,
    cx: &mut Context,
    proxy: &JsObjectRef,
) -> Result<Vec<PropertyKey>, JsError> {
    assert_entered_policy(cx, proxy, None);
    let names = handler.get_own_property_names(cx, proxy)?;
    let mut keys = Vec::with_capacity(names.len());
    for key in names {
        // Per-key lookups here are part of the already-audited enumeration;
        // waive the policy instead of auditing each one again
        let _waive = AutoWaivePolicy::new(cx, proxy, key.clone());
        if let Some(desc) = handler.get_own_property_descriptor(cx, proxy, &key)?
            && desc.attrs.enumerable
        {
            keys.push(key);
        }
    }
    Ok(keys)
}

pub(crate) fn default_iterate<H: ProxyHandler + ?Sized>(
    handler: &H,
    cx: &mut Context,
    proxy: &JsObjectRef,
    flags: IterFlags,
) -> Result<KeyIterator, JsError> {
    assert_entered_policy(cx, proxy, None);
    let keys = if flags.own_only {
        handler.keys(cx, proxy)?
    } else {
        handler.enumerate(cx, proxy)?
    };
    Ok(KeyIterator::new(keys))
}

pub(crate) fn default_call<H: ProxyHandler + ?Sized>(
    _handler: &H,
    cx: &mut Context,
    proxy: &JsObjectRef,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    assert_entered_policy(cx, proxy, None);
    let Some(call) = proxy::call_delegate(proxy) else {
        return Err(JsError::type_error("proxy is not callable"));
    };
    cx.invoke(&JsValue::Object(call), this, args)
}

pub(crate) fn default_construct<H: ProxyHandler + ?Sized>(
    _handler: &H,
    cx: &mut Context,
    proxy: &JsObjectRef,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    assert_entered_policy(cx, proxy, None);
    let delegate = proxy::construct_delegate(proxy).or_else(|| proxy::call_delegate(proxy));
    let Some(delegate) = delegate else {
        return Err(JsError::type_error("proxy is not a constructor"));
    };
    cx.invoke(&JsValue::Object(delegate), JsValue::Undefined, args)
}

pub(crate) fn default_get_element_if_present<H: ProxyHandler + ?Sized>(
    handler: &H,
    cx: &mut Context,
    proxy: &JsObjectRef,
    receiver: &JsValue,
    index: u32,
) -> Result<Option<JsValue>, JsError> {
    let key = PropertyKey::Index(index);
    assert_entered_policy(cx, proxy, Some(&key));
    if !handler.has(cx, proxy, &key)? {
        return Ok(None);
    }
    handler.get(cx, proxy, receiver, &key).map(Some)
}

pub(crate) fn default_obj_to_string(proxy: &JsObjectRef) -> JsString {
    if proxy.borrow().is_callable() {
        JsString::from("[object Function]")
    } else {
        JsString::from("[object Object]")
    }
}

pub(crate) fn default_fun_to_string(
    cx: &mut Context,
    proxy: &JsObjectRef,
) -> Result<JsString, JsError> {
    assert_entered_policy(cx, proxy, None);
    let Some(call) = proxy::call_delegate(proxy) else {
        return Err(JsError::type_error(
            "Function.prototype.toString called on incompatible object",
        ));
    };
    object::fun_to_string_helper(cx, &call)
}
