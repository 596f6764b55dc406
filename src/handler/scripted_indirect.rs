//! Legacy script trap-table handler
//!
//! The trap table is the proxy's private object. Fundamental traps dispatch
//! to same-named callables on it with stringified keys and no invariant
//! checking; derived traps fall back to the default bodies (which compute
//! them from the fundamentals, themselves dispatched to script) when the
//! named property is not callable. A failed lookup on the trap table itself
//! propagates; for a fundamental trap an absent function is an invocation
//! failure, not a fallback.

use std::rc::Rc;

use crate::context::Context;
use crate::descriptor::{self, PropertyDescriptor};
use crate::error::JsError;
use crate::object::{self, IterFlags, KeyIterator};
use crate::proxy;
use crate::value::{CheapClone, JsObjectRef, JsValue, PropertyKey};

use super::{HandlerFamily, ProxyHandler};

/// Legacy trap-table handler; stateless, shared by every indirect proxy
#[derive(Debug, Default)]
pub struct ScriptedIndirectHandler;

thread_local! {
    static SINGLETON: Rc<ScriptedIndirectHandler> = Rc::new(ScriptedIndirectHandler);
}

impl ScriptedIndirectHandler {
    /// The shared dispatch table for this family
    pub fn singleton() -> Rc<ScriptedIndirectHandler> {
        SINGLETON.with(Rc::clone)
    }

    fn handler_object(proxy: &JsObjectRef) -> Result<JsObjectRef, JsError> {
        proxy::proxy_private(proxy)?.to_object("proxy handler")
    }
}

/// Look up a fundamental trap on the handler object. The lookup itself may
/// traverse proxies and recurse back into the dispatcher.
fn get_fundamental_trap(
    cx: &mut Context,
    handler: &JsObjectRef,
    name: &str,
) -> Result<JsValue, JsError> {
    let _frame = cx.enter_recursion()?;
    let this = JsValue::Object(handler.cheap_clone());
    object::get_property(cx, handler, &this, &PropertyKey::from(name))
}

fn get_derived_trap(
    cx: &mut Context,
    handler: &JsObjectRef,
    name: &str,
) -> Result<JsValue, JsError> {
    debug_assert!(matches!(
        name,
        "has" | "hasOwn" | "get" | "set" | "keys" | "iterate"
    ));
    let this = JsValue::Object(handler.cheap_clone());
    object::get_property(cx, handler, &this, &PropertyKey::from(name))
}

/// Invoke a trap function with the handler object as its receiver
fn trap(
    cx: &mut Context,
    handler: &JsObjectRef,
    fval: &JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    cx.invoke(fval, JsValue::Object(handler.cheap_clone()), args)
}

fn trap1(
    cx: &mut Context,
    handler: &JsObjectRef,
    fval: &JsValue,
    key: &PropertyKey,
) -> Result<JsValue, JsError> {
    trap(cx, handler, fval, &[key.to_value()])
}

fn trap2(
    cx: &mut Context,
    handler: &JsObjectRef,
    fval: &JsValue,
    key: &PropertyKey,
    value: JsValue,
) -> Result<JsValue, JsError> {
    trap(cx, handler, fval, &[key.to_value(), value])
}

/// Descriptor-shaped trap results must be undefined or an object
fn expect_descriptor_result(
    trap_name: &str,
    value: &JsValue,
) -> Result<(), JsError> {
    if value.is_primitive() {
        return Err(JsError::type_error(format!(
            "trap '{}' returned a primitive value",
            trap_name
        )));
    }
    Ok(())
}

/// Read a returned key array into a key vector, with no invariant checking
/// (legacy protocol); a primitive result reads as empty
fn array_to_keys(cx: &mut Context, value: &JsValue) -> Result<Vec<PropertyKey>, JsError> {
    let Some(array) = value.as_object() else {
        return Ok(Vec::new());
    };
    let array = array.cheap_clone();
    let length = object::length_of(cx, &array)?;
    let mut keys = Vec::with_capacity(length as usize);
    for i in 0..length {
        let item = object::get_element(cx, &array, i)?;
        keys.push(PropertyKey::from_value(&item));
    }
    Ok(keys)
}

impl ProxyHandler for ScriptedIndirectHandler {
    fn family(&self) -> HandlerFamily {
        HandlerFamily::ScriptedIndirect
    }

    fn get_property_descriptor(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
    ) -> Result<Option<PropertyDescriptor>, JsError> {
        let handler = Self::handler_object(proxy)?;
        let fval = get_fundamental_trap(cx, &handler, "getPropertyDescriptor")?;
        let value = trap1(cx, &handler, &fval, key)?;
        if value.is_undefined() {
            return Ok(None);
        }
        expect_descriptor_result("getPropertyDescriptor", &value)?;
        descriptor::parse_descriptor_object(cx, &value, false).map(Some)
    }

    fn get_own_property_descriptor(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
    ) -> Result<Option<PropertyDescriptor>, JsError> {
        let handler = Self::handler_object(proxy)?;
        let fval = get_fundamental_trap(cx, &handler, "getOwnPropertyDescriptor")?;
        let value = trap1(cx, &handler, &fval, key)?;
        if value.is_undefined() {
            return Ok(None);
        }
        expect_descriptor_result("getOwnPropertyDescriptor", &value)?;
        descriptor::parse_descriptor_object(cx, &value, false).map(Some)
    }

    fn define_property(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
        desc: &PropertyDescriptor,
    ) -> Result<bool, JsError> {
        let handler = Self::handler_object(proxy)?;
        let fval = get_fundamental_trap(cx, &handler, "defineProperty")?;
        let desc_obj = descriptor::descriptor_to_object(desc);
        trap2(cx, &handler, &fval, key, JsValue::Object(desc_obj))?;
        Ok(true)
    }

    fn get_own_property_names(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
    ) -> Result<Vec<PropertyKey>, JsError> {
        let handler = Self::handler_object(proxy)?;
        let fval = get_fundamental_trap(cx, &handler, "getOwnPropertyNames")?;
        let value = trap(cx, &handler, &fval, &[])?;
        array_to_keys(cx, &value)
    }

    fn delete(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
    ) -> Result<bool, JsError> {
        let handler = Self::handler_object(proxy)?;
        let fval = get_fundamental_trap(cx, &handler, "delete")?;
        let value = trap1(cx, &handler, &fval, key)?;
        Ok(value.to_boolean())
    }

    fn enumerate(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
    ) -> Result<Vec<PropertyKey>, JsError> {
        let handler = Self::handler_object(proxy)?;
        let fval = get_fundamental_trap(cx, &handler, "enumerate")?;
        let value = trap(cx, &handler, &fval, &[])?;
        array_to_keys(cx, &value)
    }

    fn has(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
    ) -> Result<bool, JsError> {
        let handler = Self::handler_object(proxy)?;
        let fval = get_derived_trap(cx, &handler, "has")?;
        if !fval.is_callable() {
            return super::default_has(self, cx, proxy, key);
        }
        let value = trap1(cx, &handler, &fval, key)?;
        Ok(value.to_boolean())
    }

    fn has_own(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
    ) -> Result<bool, JsError> {
        let handler = Self::handler_object(proxy)?;
        let fval = get_derived_trap(cx, &handler, "hasOwn")?;
        if !fval.is_callable() {
            return super::default_has_own(self, cx, proxy, key);
        }
        let value = trap1(cx, &handler, &fval, key)?;
        Ok(value.to_boolean())
    }

    fn get(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        receiver: &JsValue,
        key: &PropertyKey,
    ) -> Result<JsValue, JsError> {
        let handler = Self::handler_object(proxy)?;
        let fval = get_derived_trap(cx, &handler, "get")?;
        if !fval.is_callable() {
            return super::default_get(self, cx, proxy, receiver, key);
        }
        trap(cx, &handler, &fval, &[receiver.clone(), key.to_value()])
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
        let handler = Self::handler_object(proxy)?;
        let fval = get_derived_trap(cx, &handler, "set")?;
        if !fval.is_callable() {
            return super::default_set(self, cx, proxy, receiver, key, strict, value);
        }
        trap(
            cx,
            &handler,
            &fval,
            &[receiver.clone(), key.to_value(), value],
        )?;
        Ok(true)
    }

    fn keys(&self, cx: &mut Context, proxy: &JsObjectRef) -> Result<Vec<PropertyKey>, JsError> {
        let handler = Self::handler_object(proxy)?;
        let fval = get_derived_trap(cx, &handler, "keys")?;
        if !fval.is_callable() {
            return super::default_keys(self, cx, proxy);
        }
        let value = trap(cx, &handler, &fval, &[])?;
        array_to_keys(cx, &value)
    }

    fn iterate(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        flags: IterFlags,
    ) -> Result<KeyIterator, JsError> {
        let handler = Self::handler_object(proxy)?;
        let fval = get_derived_trap(cx, &handler, "iterate")?;
        if !fval.is_callable() {
            return super::default_iterate(self, cx, proxy, flags);
        }
        let value = trap(cx, &handler, &fval, &[])?;
        expect_descriptor_result("iterate", &value)?;
        Ok(KeyIterator::new(array_to_keys(cx, &value)?))
    }
}
