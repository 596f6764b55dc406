//! Spec-accurate script trap-table handler
//!
//! The trap table lives in the proxy's first extra slot and the wrapped
//! target in its private slot. Every trap follows the same template: look up
//! the trap function by name; when it is undefined, fall through to the
//! transparent direct behavior on the target; otherwise invoke it and
//! validate the result against the target's actual shape before trusting it.
//! A handler whose result contradicts the target's non-configurable or
//! non-extensible state has breached its contract, and the operation halts
//! with an invariant violation rather than continuing.

use std::rc::Rc;

use crate::context::Context;
use crate::descriptor::{self, PropDesc, PropertyDescriptor};
use crate::error::JsError;
use crate::object::{self, IterFlags, KeyIterator};
use crate::proxy::{self, Proxy};
use crate::value::{CheapClone, JsObjectRef, JsValue, PropertyKey, new_array};

use super::{HandlerFamily, ProxyHandler};

/// Spec-accurate trap-table handler; stateless, shared by every direct
/// scripted proxy
#[derive(Debug, Default)]
pub struct ScriptedDirectHandler;

thread_local! {
    static SINGLETON: Rc<ScriptedDirectHandler> = Rc::new(ScriptedDirectHandler);
}

impl ScriptedDirectHandler {
    /// The shared dispatch table for this family
    pub fn singleton() -> Rc<ScriptedDirectHandler> {
        SINGLETON.with(Rc::clone)
    }

    fn handler_object(proxy: &JsObjectRef) -> Result<JsObjectRef, JsError> {
        proxy::proxy_extra(proxy, 0)?.to_object("proxy trap table")
    }

    fn target(proxy: &JsObjectRef) -> Result<JsObjectRef, JsError> {
        proxy::proxy_target(proxy)
    }
}

fn get_trap(cx: &mut Context, handler: &JsObjectRef, name: &str) -> Result<JsValue, JsError> {
    let this = JsValue::Object(handler.cheap_clone());
    object::get_property(cx, handler, &this, &PropertyKey::from(name))
}

fn call_trap(
    cx: &mut Context,
    handler: &JsObjectRef,
    trap: &JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    cx.invoke(trap, JsValue::Object(handler.cheap_clone()), args)
}

/// Own and non-configurable on the target
fn is_sealed(cx: &mut Context, target: &JsObjectRef, key: &PropertyKey) -> Result<bool, JsError> {
    Ok(object::get_own_descriptor(cx, target, key)?
        .is_some_and(|desc| !desc.attrs.configurable))
}

/// Compatibility of a reported partial descriptor with the target's actual
/// property. Reflexive: a descriptor restating the current state is always
/// compatible.
pub fn validate_property(
    cx: &mut Context,
    target: &JsObjectRef,
    key: &PropertyKey,
    desc: &PropDesc,
) -> Result<bool, JsError> {
    let Some(current) = object::get_own_descriptor(cx, target, key)? else {
        // callers only validate fixed properties
        return Err(JsError::internal_error(
            "validate_property called for a property the target does not have",
        ));
    };

    // A descriptor specifying nothing is a pure existence check
    if desc.is_empty() {
        return Ok(true);
    }

    // Every specified attribute matches the current one
    if (!desc.has_writable || desc.writable == current.attrs.writable)
        && (!desc.has_get || object::same_object_slot(&desc.getter, &current.getter))
        && (!desc.has_set || object::same_object_slot(&desc.setter, &current.setter))
        && (!desc.has_enumerable || desc.enumerable == current.attrs.enumerable)
        && (!desc.has_configurable || desc.configurable == current.attrs.configurable)
    {
        if !desc.has_value {
            return Ok(true);
        }
        if desc.value.same_value(&current.value) {
            return Ok(true);
        }
    }

    if !current.attrs.configurable {
        if desc.has_configurable && desc.configurable {
            return Ok(false);
        }
        if desc.has_enumerable && desc.enumerable != current.attrs.enumerable {
            return Ok(false);
        }
    }

    if desc.is_generic_descriptor() {
        return Ok(true);
    }

    if current.is_data() != desc.is_data_descriptor() {
        return Ok(current.attrs.configurable);
    }

    if current.is_data() {
        if !current.attrs.configurable && !current.attrs.writable {
            if desc.has_writable && desc.writable {
                return Ok(false);
            }
            if desc.has_value && !desc.value.same_value(&current.value) {
                return Ok(false);
            }
        }
        return Ok(true);
    }

    // both accessor descriptors
    Ok(current.attrs.configurable
        || ((!desc.has_set || object::same_object_slot(&desc.setter, &current.setter))
            && (!desc.has_get || object::same_object_slot(&desc.getter, &current.getter))))
}

/// The getOwnPropertyDescriptor trap template: invoke, normalize, and check
/// the result against the target before reporting it. Returns undefined or
/// a descriptor object.
fn trap_get_own_property(
    cx: &mut Context,
    proxy: &JsObjectRef,
    key: &PropertyKey,
) -> Result<JsValue, JsError> {
    const TRAP: &str = "getOwnPropertyDescriptor";
    let handler = ScriptedDirectHandler::handler_object(proxy)?;
    let target = ScriptedDirectHandler::target(proxy)?;

    let trap = get_trap(cx, &handler, TRAP)?;
    if trap.is_undefined() {
        let desc = object::get_own_descriptor(cx, &target, key)?;
        return Ok(match desc {
            Some(desc) => JsValue::Object(descriptor::descriptor_to_object(&desc)),
            None => JsValue::Undefined,
        });
    }

    let trap_result = call_trap(
        cx,
        &handler,
        &trap,
        &[JsValue::Object(target.cheap_clone()), key.to_value()],
    )?;
    let trap_result = descriptor::normalize_property_descriptor(cx, &trap_result, true)?;

    if trap_result.is_undefined() {
        if is_sealed(cx, &target, key)? {
            return Err(JsError::invariant(
                TRAP,
                Some(key.to_string()),
                "cannot report a non-configurable own property as non-existent",
            ));
        }
        if !object::is_extensible(&target) && object::has_own(cx, &target, key)? {
            return Err(JsError::invariant(
                TRAP,
                Some(key.to_string()),
                "cannot report an existing own property as non-existent on a non-extensible object",
            ));
        }
        return Ok(JsValue::Undefined);
    }

    let is_fixed = object::has_own(cx, &target, key)?;
    if !object::is_extensible(&target) && !is_fixed {
        return Err(JsError::invariant(
            TRAP,
            Some(key.to_string()),
            "cannot report a new property on a non-extensible object",
        ));
    }

    let desc = PropDesc::parse(cx, &trap_result)?;
    if is_fixed && !validate_property(cx, &target, key, &desc)? {
        return Err(JsError::invariant(
            TRAP,
            Some(key.to_string()),
            "reported descriptor is incompatible with the existing own property",
        ));
    }
    if !desc.configurable && !is_fixed {
        return Err(JsError::invariant(
            TRAP,
            Some(key.to_string()),
            "cannot report a non-existent property as non-configurable",
        ));
    }

    Ok(trap_result)
}

/// The defineProperty trap template: a truthy result commits only when it is
/// consistent with the target's shape
fn trap_define_own_property(
    cx: &mut Context,
    proxy: &JsObjectRef,
    key: &PropertyKey,
    desc_value: &JsValue,
) -> Result<bool, JsError> {
    const TRAP: &str = "defineProperty";
    let handler = ScriptedDirectHandler::handler_object(proxy)?;
    let target = ScriptedDirectHandler::target(proxy)?;

    let trap = get_trap(cx, &handler, TRAP)?;
    if trap.is_undefined() {
        let desc = descriptor::parse_descriptor_object(cx, desc_value, false)?;
        return object::define_property(cx, &target, key, &desc);
    }

    let normalized = descriptor::normalize_property_descriptor(cx, desc_value, false)?;
    let trap_result = call_trap(
        cx,
        &handler,
        &trap,
        &[
            JsValue::Object(target.cheap_clone()),
            key.to_value(),
            normalized.clone(),
        ],
    )?;

    if trap_result.to_boolean() {
        let is_fixed = object::has_own(cx, &target, key)?;
        if !object::is_extensible(&target) && !is_fixed {
            return Err(JsError::invariant(
                TRAP,
                Some(key.to_string()),
                "cannot define a new property on a non-extensible object",
            ));
        }
        let desc = PropDesc::parse(cx, &normalized)?;
        if is_fixed && !validate_property(cx, &target, key, &desc)? {
            return Err(JsError::invariant(
                TRAP,
                Some(key.to_string()),
                "defined descriptor is incompatible with the existing own property",
            ));
        }
        if desc.has_configurable && !desc.configurable && !is_fixed {
            return Err(JsError::invariant(
                TRAP,
                Some(key.to_string()),
                "cannot define a new property as non-configurable",
            ));
        }
        return Ok(true);
    }

    Ok(false)
}

/// Shared between getOwnPropertyNames, enumerate, and keys: read the trap's
/// key list and hold it against the target's actual own keys
fn array_to_key_vector(
    cx: &mut Context,
    target: &JsObjectRef,
    value: &JsValue,
    flags: IterFlags,
    trap_name: &'static str,
) -> Result<Vec<PropertyKey>, JsError> {
    let array = value.to_object("trap result")?;
    let length = object::length_of(cx, &array)?;

    let mut keys: Vec<PropertyKey> = Vec::with_capacity(length as usize);
    for i in 0..length {
        let item = object::get_element(cx, &array, i)?;
        let key = PropertyKey::from_value(&item);

        // Duplicates are a contract breach, not something to dedupe away
        if keys.contains(&key) {
            return Err(JsError::invariant(
                trap_name,
                Some(key.to_string()),
                "duplicate key in trap result",
            ));
        }

        let is_fixed = object::has_own(cx, target, &key)?;
        if !object::is_extensible(target) && !is_fixed {
            return Err(JsError::invariant(
                trap_name,
                Some(key.to_string()),
                "cannot report a new property on a non-extensible object",
            ));
        }

        keys.push(key);
    }

    // Every actual own key missing from the report must be omittable
    let own = object::property_names(cx, target, flags)?;
    for key in own {
        if keys.contains(&key) {
            continue;
        }
        if is_sealed(cx, target, &key)? {
            return Err(JsError::invariant(
                trap_name,
                Some(key.to_string()),
                "cannot skip a non-configurable own property",
            ));
        }
        if !object::is_extensible(target) && object::has_own(cx, target, &key)? {
            return Err(JsError::invariant(
                trap_name,
                Some(key.to_string()),
                "cannot skip an existing own property on a non-extensible object",
            ));
        }
    }

    Ok(keys)
}

fn expect_object_result(trap_name: &str, value: &JsValue) -> Result<(), JsError> {
    if value.is_primitive() {
        return Err(JsError::type_error(format!(
            "trap '{}' returned a primitive value",
            trap_name
        )));
    }
    Ok(())
}

impl ProxyHandler for ScriptedDirectHandler {
    fn family(&self) -> HandlerFamily {
        HandlerFamily::ScriptedDirect
    }

    fn get_property_descriptor(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
    ) -> Result<Option<PropertyDescriptor>, JsError> {
        let _frame = cx.enter_recursion()?;
        let own = Proxy::get_own_property_descriptor(cx, proxy, key)?;
        if own.is_some() {
            return Ok(own);
        }
        let proto = proxy.borrow().prototype.clone();
        match proto {
            Some(proto) => {
                Ok(object::lookup_property(cx, &proto, key)?.map(|(desc, _holder)| desc))
            }
            None => Ok(None),
        }
    }

    fn get_own_property_descriptor(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
    ) -> Result<Option<PropertyDescriptor>, JsError> {
        let value = trap_get_own_property(cx, proxy, key)?;
        if value.is_undefined() {
            return Ok(None);
        }
        descriptor::parse_descriptor_object(cx, &value, true).map(Some)
    }

    fn define_property(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
        desc: &PropertyDescriptor,
    ) -> Result<bool, JsError> {
        let desc_obj = descriptor::descriptor_to_object(desc);
        trap_define_own_property(cx, proxy, key, &JsValue::Object(desc_obj))
    }

    fn get_own_property_names(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
    ) -> Result<Vec<PropertyKey>, JsError> {
        const TRAP: &str = "getOwnPropertyNames";
        let handler = Self::handler_object(proxy)?;
        let target = Self::target(proxy)?;

        let trap = get_trap(cx, &handler, TRAP)?;
        if trap.is_undefined() {
            return object::own_property_names(cx, &target, IterFlags::OWN_HIDDEN);
        }

        let trap_result = call_trap(cx, &handler, &trap, &[JsValue::Object(target.cheap_clone())])?;
        expect_object_result(TRAP, &trap_result)?;
        array_to_key_vector(cx, &target, &trap_result, IterFlags::OWN_HIDDEN, TRAP)
    }

    fn delete(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
    ) -> Result<bool, JsError> {
        const TRAP: &str = "deleteProperty";
        let handler = Self::handler_object(proxy)?;
        let target = Self::target(proxy)?;

        let trap = get_trap(cx, &handler, TRAP)?;
        if trap.is_undefined() {
            return object::delete_property(cx, &target, key);
        }

        let trap_result = call_trap(
            cx,
            &handler,
            &trap,
            &[JsValue::Object(target.cheap_clone()), key.to_value()],
        )?;

        if trap_result.to_boolean() {
            if is_sealed(cx, &target, key)? {
                return Err(JsError::invariant(
                    TRAP,
                    Some(key.to_string()),
                    "cannot delete a non-configurable own property",
                ));
            }
            return Ok(true);
        }
        Ok(false)
    }

    fn enumerate(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
    ) -> Result<Vec<PropertyKey>, JsError> {
        const TRAP: &str = "enumerate";
        let handler = Self::handler_object(proxy)?;
        let target = Self::target(proxy)?;

        let trap = get_trap(cx, &handler, TRAP)?;
        if trap.is_undefined() {
            return object::property_names(cx, &target, IterFlags::ENUMERATE);
        }

        let trap_result = call_trap(cx, &handler, &trap, &[JsValue::Object(target.cheap_clone())])?;
        expect_object_result(TRAP, &trap_result)?;
        array_to_key_vector(cx, &target, &trap_result, IterFlags::ENUMERATE, TRAP)
    }

    fn has(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
    ) -> Result<bool, JsError> {
        const TRAP: &str = "has";
        let handler = Self::handler_object(proxy)?;
        let target = Self::target(proxy)?;

        let trap = get_trap(cx, &handler, TRAP)?;
        if trap.is_undefined() {
            return object::has_property(cx, &target, key);
        }

        let trap_result = call_trap(
            cx,
            &handler,
            &trap,
            &[JsValue::Object(target.cheap_clone()), key.to_value()],
        )?;
        let success = trap_result.to_boolean();

        if !success {
            if is_sealed(cx, &target, key)? {
                return Err(JsError::invariant(
                    TRAP,
                    Some(key.to_string()),
                    "cannot report a non-configurable own property as non-existent",
                ));
            }
            if !object::is_extensible(&target) && object::has_own(cx, &target, key)? {
                return Err(JsError::invariant(
                    TRAP,
                    Some(key.to_string()),
                    "cannot report an existing own property as non-existent on a non-extensible object",
                ));
            }
        }

        Ok(success)
    }

    fn has_own(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
    ) -> Result<bool, JsError> {
        const TRAP: &str = "hasOwn";
        let handler = Self::handler_object(proxy)?;
        let target = Self::target(proxy)?;

        let trap = get_trap(cx, &handler, TRAP)?;
        if trap.is_undefined() {
            return object::has_own(cx, &target, key);
        }

        let trap_result = call_trap(
            cx,
            &handler,
            &trap,
            &[JsValue::Object(target.cheap_clone()), key.to_value()],
        )?;
        let success = trap_result.to_boolean();

        if !success {
            if is_sealed(cx, &target, key)? {
                return Err(JsError::invariant(
                    TRAP,
                    Some(key.to_string()),
                    "cannot report a non-configurable own property as non-existent",
                ));
            }
            if !object::is_extensible(&target) && object::has_own(cx, &target, key)? {
                return Err(JsError::invariant(
                    TRAP,
                    Some(key.to_string()),
                    "cannot report an existing own property as non-existent on a non-extensible object",
                ));
            }
        } else if !object::is_extensible(&target) && !object::has_own(cx, &target, key)? {
            return Err(JsError::invariant(
                TRAP,
                Some(key.to_string()),
                "cannot report a new own property on a non-extensible object",
            ));
        }

        Ok(success)
    }

    fn get(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        receiver: &JsValue,
        key: &PropertyKey,
    ) -> Result<JsValue, JsError> {
        const TRAP: &str = "get";
        let handler = Self::handler_object(proxy)?;
        let target = Self::target(proxy)?;

        let trap = get_trap(cx, &handler, TRAP)?;
        if trap.is_undefined() {
            return object::get_property(cx, &target, receiver, key);
        }

        let trap_result = call_trap(
            cx,
            &handler,
            &trap,
            &[
                JsValue::Object(target.cheap_clone()),
                key.to_value(),
                receiver.clone(),
            ],
        )?;

        if let Some(desc) = object::get_own_descriptor(cx, &target, key)? {
            if desc.is_data()
                && !desc.attrs.configurable
                && !desc.attrs.writable
                && !trap_result.same_value(&desc.value)
            {
                return Err(JsError::invariant(
                    TRAP,
                    Some(key.to_string()),
                    "must report the same value for a non-writable, non-configurable property",
                ));
            }
            if desc.is_accessor()
                && !desc.attrs.configurable
                && desc.getter.is_none()
                && !trap_result.is_undefined()
            {
                return Err(JsError::invariant(
                    TRAP,
                    Some(key.to_string()),
                    "must report undefined for a non-configurable accessor property without a getter",
                ));
            }
        }

        Ok(trap_result)
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
        const TRAP: &str = "set";
        let handler = Self::handler_object(proxy)?;
        let target = Self::target(proxy)?;

        let trap = get_trap(cx, &handler, TRAP)?;
        if trap.is_undefined() {
            return object::set_property(cx, &target, receiver, key, strict, value);
        }

        let trap_result = call_trap(
            cx,
            &handler,
            &trap,
            &[
                JsValue::Object(target.cheap_clone()),
                key.to_value(),
                value.clone(),
                receiver.clone(),
            ],
        )?;
        let success = trap_result.to_boolean();

        if success && let Some(desc) = object::get_own_descriptor(cx, &target, key)? {
            if desc.is_data()
                && !desc.attrs.configurable
                && !desc.attrs.writable
                && !value.same_value(&desc.value)
            {
                return Err(JsError::invariant(
                    TRAP,
                    Some(key.to_string()),
                    "cannot change the value of a non-writable, non-configurable property",
                ));
            }
            if desc.is_accessor() && !desc.attrs.configurable && desc.setter.is_none() {
                return Err(JsError::invariant(
                    TRAP,
                    Some(key.to_string()),
                    "cannot claim success for a non-configurable accessor property without a setter",
                ));
            }
        }

        Ok(success)
    }

    fn keys(&self, cx: &mut Context, proxy: &JsObjectRef) -> Result<Vec<PropertyKey>, JsError> {
        const TRAP: &str = "keys";
        let handler = Self::handler_object(proxy)?;
        let target = Self::target(proxy)?;

        let trap = get_trap(cx, &handler, TRAP)?;
        if trap.is_undefined() {
            return object::own_property_names(cx, &target, IterFlags::OWN);
        }

        let trap_result = call_trap(cx, &handler, &trap, &[JsValue::Object(target.cheap_clone())])?;
        expect_object_result(TRAP, &trap_result)?;
        array_to_key_vector(cx, &target, &trap_result, IterFlags::OWN, TRAP)
    }

    fn iterate(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        flags: IterFlags,
    ) -> Result<KeyIterator, JsError> {
        // No scripted iterate trap in this protocol: snapshot the target
        let target = Self::target(proxy)?;
        Ok(KeyIterator::new(object::property_names(cx, &target, flags)?))
    }

    fn call(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        this: JsValue,
        args: &[JsValue],
    ) -> Result<JsValue, JsError> {
        let handler = Self::handler_object(proxy)?;
        let target = Self::target(proxy)?;

        let trap = get_trap(cx, &handler, "apply")?;
        if trap.is_undefined() {
            return super::default_call(self, cx, proxy, this, args);
        }

        let args_array = new_array(args.to_vec());
        call_trap(
            cx,
            &handler,
            &trap,
            &[
                JsValue::Object(target),
                this,
                JsValue::Object(args_array),
            ],
        )
    }

    fn construct(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        args: &[JsValue],
    ) -> Result<JsValue, JsError> {
        let handler = Self::handler_object(proxy)?;
        let target = Self::target(proxy)?;

        let trap = get_trap(cx, &handler, "construct")?;
        if trap.is_undefined() {
            return super::default_construct(self, cx, proxy, args);
        }

        let args_array = new_array(args.to_vec());
        call_trap(
            cx,
            &handler,
            &trap,
            &[JsValue::Object(target), JsValue::Object(args_array)],
        )
    }
}
