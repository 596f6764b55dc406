//! Proxy objects and the dispatch entry points
//!
//! `Proxy::*` is the only code path the host object system uses to perform a
//! fundamental operation on an object tagged as a proxy. Every operation
//! claims a recursion frame, establishes its denial default, runs the
//! handler's policy gate, and then either dispatches to the handler or — for
//! handlers that declare a prototype — synthesizes the chain-aware operation
//! from the handler's own-property traps plus an explicit walk to the
//! declared prototype with ordinary property semantics.

use std::fmt;
use std::rc::Rc;

use crate::context::Context;
use crate::descriptor::PropertyDescriptor;
use crate::error::JsError;
use crate::handler::{ProxyHandler, ScriptedDirectHandler, ScriptedIndirectHandler, default_obj_to_string};
use crate::object::{self, ConversionHint, IterFlags, KeyIterator};
use crate::policy::{Action, AutoEnterPolicy};
use crate::value::{
    CheapClone, EsClass, Exotic, JsObject, JsObjectRef, JsString, JsValue, PropertyKey,
};

use std::cell::RefCell;

/// The proxy slots of a proxy-tagged object
pub struct ProxyData {
    /// Dispatch table; shared, typically a process-wide stateless singleton
    pub handler: Rc<dyn ProxyHandler>,
    /// The value the handler operates over: the wrapped target for
    /// forwarding handlers, the trap table for indirect scripted ones
    pub private: JsValue,
    /// Handler-specific auxiliary slots
    pub extra: [JsValue; 2],
    /// Delegate invoked by the default call trap; its presence makes the
    /// proxy callable
    pub call: Option<JsObjectRef>,
    /// Delegate invoked by the default construct trap; falls back to `call`
    pub construct: Option<JsObjectRef>,
}

impl fmt::Debug for ProxyData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyData")
            .field("family", &self.handler.family())
            .field("callable", &self.call.is_some())
            .finish()
    }
}

/// Check if an object is tagged as a proxy
pub fn is_proxy(obj: &JsObjectRef) -> bool {
    matches!(obj.borrow().exotic, Exotic::Proxy(_))
}

/// The handler of a proxy, if the object is one
pub fn handler_of(obj: &JsObjectRef) -> Option<Rc<dyn ProxyHandler>> {
    match &obj.borrow().exotic {
        Exotic::Proxy(data) => Some(data.handler.cheap_clone()),
        _ => None,
    }
}

fn proxy_handler(obj: &JsObjectRef) -> Result<Rc<dyn ProxyHandler>, JsError> {
    handler_of(obj).ok_or_else(|| JsError::invalid_argument("expected a proxy object"))
}

/// The proxy's private slot value
pub fn proxy_private(obj: &JsObjectRef) -> Result<JsValue, JsError> {
    match &obj.borrow().exotic {
        Exotic::Proxy(data) => Ok(data.private.clone()),
        _ => Err(JsError::invalid_argument("expected a proxy object")),
    }
}

/// The wrapped target object, for handlers whose private slot holds one
pub fn proxy_target(obj: &JsObjectRef) -> Result<JsObjectRef, JsError> {
    proxy_private(obj)?.to_object("proxy target")
}

/// A handler-specific auxiliary slot
pub fn proxy_extra(obj: &JsObjectRef, index: usize) -> Result<JsValue, JsError> {
    match &obj.borrow().exotic {
        Exotic::Proxy(data) => data
            .extra
            .get(index)
            .cloned()
            .ok_or_else(|| JsError::internal_error("proxy extra slot out of range")),
        _ => Err(JsError::invalid_argument("expected a proxy object")),
    }
}

/// Store into a handler-specific auxiliary slot
pub fn set_proxy_extra(obj: &JsObjectRef, index: usize, value: JsValue) -> Result<(), JsError> {
    match &mut obj.borrow_mut().exotic {
        Exotic::Proxy(data) => {
            let slot = data
                .extra
                .get_mut(index)
                .ok_or_else(|| JsError::internal_error("proxy extra slot out of range"))?;
            *slot = value;
            Ok(())
        }
        _ => Err(JsError::invalid_argument("expected a proxy object")),
    }
}

/// The call delegate, if the proxy is callable
pub fn call_delegate(obj: &JsObjectRef) -> Option<JsObjectRef> {
    match &obj.borrow().exotic {
        Exotic::Proxy(data) => data.call.clone(),
        _ => None,
    }
}

/// The construct delegate, if one was given
pub fn construct_delegate(obj: &JsObjectRef) -> Option<JsObjectRef> {
    match &obj.borrow().exotic {
        Exotic::Proxy(data) => data.construct.clone(),
        _ => None,
    }
}

/// Innermost non-proxy object behind a chain of wrappers
pub fn unwrap_deep(obj: &JsObjectRef) -> JsObjectRef {
    let mut current = obj.cheap_clone();
    // wrapper chains are short; the bound only breaks pathological cycles
    for _ in 0..64 {
        let inner = match &current.borrow().exotic {
            Exotic::Proxy(data) => data.private.as_object().cloned(),
            _ => None,
        };
        match inner {
            Some(inner) => current = inner,
            None => break,
        }
    }
    current
}

/// Create a proxy object
pub fn new_proxy_object(
    handler: Rc<dyn ProxyHandler>,
    private: JsValue,
    prototype: Option<JsObjectRef>,
    call: Option<JsObjectRef>,
    construct: Option<JsObjectRef>,
) -> JsObjectRef {
    let proxy = Rc::new(RefCell::new(JsObject::new()));
    {
        let mut proxy_ref = proxy.borrow_mut();
        proxy_ref.prototype = prototype;
        proxy_ref.exotic = Exotic::Proxy(ProxyData {
            handler,
            private,
            extra: [JsValue::Undefined, JsValue::Undefined],
            call,
            construct,
        });
    }
    proxy
}

/// Re-point an existing proxy at a new handler/private pair without
/// reallocating, clearing the extra slots. Used to revive an object that
/// survived a realm teardown as a dead stub. Callable proxies cannot be
/// renewed.
pub fn renew_proxy_object(
    proxy: &JsObjectRef,
    handler: Rc<dyn ProxyHandler>,
    private: JsValue,
) -> Result<(), JsError> {
    match &mut proxy.borrow_mut().exotic {
        Exotic::Proxy(data) => {
            if data.call.is_some() || data.construct.is_some() {
                return Err(JsError::invalid_argument("cannot renew a callable proxy"));
            }
            data.handler = handler;
            data.private = private;
            data.extra = [JsValue::Undefined, JsValue::Undefined];
            Ok(())
        }
        _ => Err(JsError::invalid_argument("expected a proxy object")),
    }
}

/// Run the handler's teardown hook. The owning object system calls this when
/// it destroys the proxy.
pub fn finalize_proxy(proxy: &JsObjectRef) {
    if let Some(handler) = handler_of(proxy) {
        handler.finalize(proxy);
    }
}

/// Create a spec-accurate scripted proxy over a target: the prototype comes
/// from the target, a callable target doubles as the call/construct
/// delegate, and the trap table rides in the first extra slot
pub fn new_scripted_direct_proxy(
    cx: &mut Context,
    target: JsObjectRef,
    handler_table: JsObjectRef,
) -> Result<JsObjectRef, JsError> {
    let prototype = object::get_prototype(cx, &target)?;
    let fun = target.borrow().is_callable().then(|| target.cheap_clone());
    let proxy = new_proxy_object(
        ScriptedDirectHandler::singleton(),
        JsValue::Object(target),
        prototype,
        fun.clone(),
        fun,
    );
    set_proxy_extra(&proxy, 0, JsValue::Object(handler_table))?;
    Ok(proxy)
}

/// Create a legacy scripted proxy whose private slot is the trap table
pub fn new_scripted_indirect_proxy(
    handler_table: JsObjectRef,
    prototype: Option<JsObjectRef>,
) -> JsObjectRef {
    new_proxy_object(
        ScriptedIndirectHandler::singleton(),
        JsValue::Object(handler_table),
        prototype,
        None,
        None,
    )
}

/// Create a callable legacy scripted proxy
pub fn new_scripted_indirect_function_proxy(
    handler_table: JsObjectRef,
    call: JsObjectRef,
    construct: Option<JsObjectRef>,
) -> Result<JsObjectRef, JsError> {
    if !JsValue::Object(call.cheap_clone()).is_callable() {
        return Err(JsError::invalid_argument("call delegate is not callable"));
    }
    if let Some(construct) = &construct
        && !JsValue::Object(construct.cheap_clone()).is_callable()
    {
        return Err(JsError::invalid_argument(
            "construct delegate is not callable",
        ));
    }
    Ok(new_proxy_object(
        ScriptedIndirectHandler::singleton(),
        JsValue::Object(handler_table),
        None,
        Some(call),
        construct,
    ))
}

/// The dispatch entry points
pub struct Proxy;

impl Proxy {
    pub fn get_property_descriptor(
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
    ) -> Result<Option<PropertyDescriptor>, JsError> {
        let _frame = cx.enter_recursion()?;
        let handler = proxy_handler(proxy)?;
        let policy = AutoEnterPolicy::new(
            cx,
            handler.as_ref(),
            proxy,
            Some(key.clone()),
            Action::Get,
            true,
        )?;
        if !policy.allowed() {
            return policy.denial(None);
        }
        if !handler.has_prototype() {
            return handler.get_property_descriptor(cx, proxy, key);
        }
        if let Some(desc) = handler.get_own_property_descriptor(cx, proxy, key)? {
            return Ok(Some(desc));
        }
        match handler.get_prototype_of(cx, proxy)? {
            Some(proto) => Ok(object::lookup_property(cx, &proto, key)?.map(|(desc, _)| desc)),
            None => Ok(None),
        }
    }

    pub fn get_own_property_descriptor(
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
    ) -> Result<Option<PropertyDescriptor>, JsError> {
        let _frame = cx.enter_recursion()?;
        let handler = proxy_handler(proxy)?;
        let policy = AutoEnterPolicy::new(
            cx,
            handler.as_ref(),
            proxy,
            Some(key.clone()),
            Action::Get,
            true,
        )?;
        if !policy.allowed() {
            return policy.denial(None);
        }
        handler.get_own_property_descriptor(cx, proxy, key)
    }

    pub fn define_property(
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
        desc: &PropertyDescriptor,
    ) -> Result<bool, JsError> {
        let _frame = cx.enter_recursion()?;
        let handler = proxy_handler(proxy)?;
        let policy = AutoEnterPolicy::new(
            cx,
            handler.as_ref(),
            proxy,
            Some(key.clone()),
            Action::Set,
            true,
        )?;
        if !policy.allowed() {
            return policy.denial(true);
        }
        handler.define_property(cx, proxy, key, desc)
    }

    pub fn get_own_property_names(
        cx: &mut Context,
        proxy: &JsObjectRef,
    ) -> Result<Vec<PropertyKey>, JsError> {
        let _frame = cx.enter_recursion()?;
        let handler = proxy_handler(proxy)?;
        let policy = AutoEnterPolicy::new(cx, handler.as_ref(), proxy, None, Action::Get, true)?;
        if !policy.allowed() {
            return policy.denial(Vec::new());
        }
        handler.get_own_property_names(cx, proxy)
    }

    pub fn delete(
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
    ) -> Result<bool, JsError> {
        let _frame = cx.enter_recursion()?;
        let handler = proxy_handler(proxy)?;
        let policy = AutoEnterPolicy::new(
            cx,
            handler.as_ref(),
            proxy,
            Some(key.clone()),
            Action::Set,
            true,
        )?;
        if !policy.allowed() {
            return policy.denial(true);
        }
        handler.delete(cx, proxy, key)
    }

    pub fn enumerate(cx: &mut Context, proxy: &JsObjectRef) -> Result<Vec<PropertyKey>, JsError> {
        let _frame = cx.enter_recursion()?;
        let handler = proxy_handler(proxy)?;
        let policy = AutoEnterPolicy::new(cx, handler.as_ref(), proxy, None, Action::Get, true)?;
        if !policy.allowed() {
            return policy.denial(Vec::new());
        }
        if !handler.has_prototype() {
            return handler.enumerate(cx, proxy);
        }
        let mut props = handler.keys(cx, proxy)?;
        if let Some(proto) = handler.get_prototype_of(cx, proxy)? {
            let proto_props = object::property_names(cx, &proto, IterFlags::ENUMERATE)?;
            object::append_unique(&mut props, proto_props);
        }
        Ok(props)
    }

    pub fn has(cx: &mut Context, proxy: &JsObjectRef, key: &PropertyKey) -> Result<bool, JsError> {
        let _frame = cx.enter_recursion()?;
        let handler = proxy_handler(proxy)?;
        let policy = AutoEnterPolicy::new(
            cx,
            handler.as_ref(),
            proxy,
            Some(key.clone()),
            Action::Get,
            true,
        )?;
        if !policy.allowed() {
            return policy.denial(false);
        }
        if !handler.has_prototype() {
            return handler.has(cx, proxy, key);
        }
        if handler.has_own(cx, proxy, key)? {
            return Ok(true);
        }
        match handler.get_prototype_of(cx, proxy)? {
            Some(proto) => object::has_property(cx, &proto, key),
            None => Ok(false),
        }
    }

    pub fn has_own(
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
    ) -> Result<bool, JsError> {
        let _frame = cx.enter_recursion()?;
        let handler = proxy_handler(proxy)?;
        let policy = AutoEnterPolicy::new(
            cx,
            handler.as_ref(),
            proxy,
            Some(key.clone()),
            Action::Get,
            true,
        )?;
        if !policy.allowed() {
            return policy.denial(false);
        }
        handler.has_own(cx, proxy, key)
    }

    pub fn get(
        cx: &mut Context,
        proxy: &JsObjectRef,
        receiver: &JsValue,
        key: &PropertyKey,
    ) -> Result<JsValue, JsError> {
        let _frame = cx.enter_recursion()?;
        let handler = proxy_handler(proxy)?;
        let policy = AutoEnterPolicy::new(
            cx,
            handler.as_ref(),
            proxy,
            Some(key.clone()),
            Action::Get,
            true,
        )?;
        if !policy.allowed() {
            return policy.denial(JsValue::Undefined);
        }
        let own = if handler.has_prototype() {
            handler.has_own(cx, proxy, key)?
        } else {
            true
        };
        if own {
            return handler.get(cx, proxy, receiver, key);
        }
        match handler.get_prototype_of(cx, proxy)? {
            Some(proto) => object::get_property(cx, &proto, receiver, key),
            None => Ok(JsValue::Undefined),
        }
    }

    pub fn get_element_if_present(
        cx: &mut Context,
        proxy: &JsObjectRef,
        receiver: &JsValue,
        index: u32,
    ) -> Result<Option<JsValue>, JsError> {
        let _frame = cx.enter_recursion()?;
        let key = PropertyKey::Index(index);
        let handler = proxy_handler(proxy)?;
        let policy = AutoEnterPolicy::new(
            cx,
            handler.as_ref(),
            proxy,
            Some(key.clone()),
            Action::Get,
            true,
        )?;
        if !policy.allowed() {
            return policy.denial(None);
        }
        if !handler.has_prototype() {
            return handler.get_element_if_present(cx, proxy, receiver, index);
        }
        if handler.has_own(cx, proxy, &key)? {
            return handler.get(cx, proxy, receiver, &key).map(Some);
        }
        match handler.get_prototype_of(cx, proxy)? {
            Some(proto) => {
                if object::has_property(cx, &proto, &key)? {
                    object::get_property(cx, &proto, receiver, &key).map(Some)
                } else {
                    Ok(None)
                }
            }
            None => Ok(None),
        }
    }

    pub fn set(
        cx: &mut Context,
        proxy: &JsObjectRef,
        receiver: &JsValue,
        key: &PropertyKey,
        strict: bool,
        value: JsValue,
    ) -> Result<bool, JsError> {
        let _frame = cx.enter_recursion()?;
        let handler = proxy_handler(proxy)?;
        let policy = AutoEnterPolicy::new(
            cx,
            handler.as_ref(),
            proxy,
            Some(key.clone()),
            Action::Set,
            true,
        )?;
        if !policy.allowed() {
            return policy.denial(true);
        }
        if handler.has_prototype() {
            // Still use the proxy trap unless a non-own property up the
            // declared prototype chain carries a setter
            let has_own = handler.has_own(cx, proxy, key)?;
            if !has_own
                && let Some(proto) = handler.get_prototype_of(cx, proxy)?
                && let Some((desc, _holder)) = object::lookup_property(cx, &proto, key)?
                && desc.setter.is_some()
            {
                return object::set_property(cx, &proto, receiver, key, strict, value);
            }
        }
        handler.set(cx, proxy, receiver, key, strict, value)
    }

    pub fn keys(cx: &mut Context, proxy: &JsObjectRef) -> Result<Vec<PropertyKey>, JsError> {
        let _frame = cx.enter_recursion()?;
        let handler = proxy_handler(proxy)?;
        let policy = AutoEnterPolicy::new(cx, handler.as_ref(), proxy, None, Action::Get, true)?;
        if !policy.allowed() {
            return policy.denial(Vec::new());
        }
        handler.keys(cx, proxy)
    }

    pub fn iterate(
        cx: &mut Context,
        proxy: &JsObjectRef,
        flags: IterFlags,
    ) -> Result<KeyIterator, JsError> {
        let _frame = cx.enter_recursion()?;
        let handler = proxy_handler(proxy)?;
        if !handler.has_prototype() {
            let policy =
                AutoEnterPolicy::new(cx, handler.as_ref(), proxy, None, Action::Get, true)?;
            // A denial that prescribes success still hands the caller a
            // valid (empty) iterator
            if !policy.allowed() {
                return policy.denial(KeyIterator::empty());
            }
            return handler.iterate(cx, proxy, flags);
        }
        // The other dispatch entry points do the prototype-aware work
        let keys = if flags.own_only {
            Proxy::keys(cx, proxy)?
        } else {
            Proxy::enumerate(cx, proxy)?
        };
        Ok(KeyIterator::new(keys))
    }

    pub fn call(
        cx: &mut Context,
        proxy: &JsObjectRef,
        this: JsValue,
        args: &[JsValue],
    ) -> Result<JsValue, JsError> {
        let _frame = cx.enter_recursion()?;
        let handler = proxy_handler(proxy)?;
        let policy = AutoEnterPolicy::new(cx, handler.as_ref(), proxy, None, Action::Call, true)?;
        if !policy.allowed() {
            return policy.denial(JsValue::Undefined);
        }
        handler.call(cx, proxy, this, args)
    }

    pub fn construct(
        cx: &mut Context,
        proxy: &JsObjectRef,
        args: &[JsValue],
    ) -> Result<JsValue, JsError> {
        let _frame = cx.enter_recursion()?;
        let handler = proxy_handler(proxy)?;
        let policy = AutoEnterPolicy::new(cx, handler.as_ref(), proxy, None, Action::Call, true)?;
        if !policy.allowed() {
            return policy.denial(JsValue::Undefined);
        }
        handler.construct(cx, proxy, args)
    }

    pub fn has_instance(
        cx: &mut Context,
        proxy: &JsObjectRef,
        value: &JsValue,
    ) -> Result<bool, JsError> {
        let _frame = cx.enter_recursion()?;
        let handler = proxy_handler(proxy)?;
        let policy = AutoEnterPolicy::new(cx, handler.as_ref(), proxy, None, Action::Get, true)?;
        if !policy.allowed() {
            return policy.denial(false);
        }
        handler.has_instance(cx, proxy, value)
    }

    pub fn object_class_is(cx: &mut Context, proxy: &JsObjectRef, class: EsClass) -> bool {
        match proxy_handler(proxy) {
            Ok(handler) => handler.object_class_is(cx, proxy, class),
            Err(_) => false,
        }
    }

    pub fn obj_to_string(cx: &mut Context, proxy: &JsObjectRef) -> Result<JsString, JsError> {
        let _frame = cx.enter_recursion()?;
        let handler = proxy_handler(proxy)?;
        let policy = AutoEnterPolicy::new(cx, handler.as_ref(), proxy, None, Action::Get, false)?;
        // Do the safe thing if the policy rejects
        if !policy.allowed() {
            return Ok(default_obj_to_string(proxy));
        }
        handler.obj_to_string(cx, proxy)
    }

    pub fn fun_to_string(cx: &mut Context, proxy: &JsObjectRef) -> Result<JsString, JsError> {
        let _frame = cx.enter_recursion()?;
        let handler = proxy_handler(proxy)?;
        let policy = AutoEnterPolicy::new(cx, handler.as_ref(), proxy, None, Action::Get, false)?;
        if !policy.allowed() {
            if proxy.borrow().is_callable() {
                return Ok(JsString::from("function () {\n    [native code]\n}"));
            }
            return Err(JsError::type_error("object is not a function"));
        }
        handler.fun_to_string(cx, proxy)
    }

    pub fn regexp_shared(
        cx: &mut Context,
        proxy: &JsObjectRef,
    ) -> Result<(JsString, JsString), JsError> {
        let _frame = cx.enter_recursion()?;
        let handler = proxy_handler(proxy)?;
        handler.regexp_shared(cx, proxy)
    }

    pub fn default_value(
        cx: &mut Context,
        proxy: &JsObjectRef,
        hint: ConversionHint,
    ) -> Result<JsValue, JsError> {
        let _frame = cx.enter_recursion()?;
        let handler = proxy_handler(proxy)?;
        handler.default_value(cx, proxy, hint)
    }

    pub fn weakmap_key_delegate(proxy: &JsObjectRef) -> Option<JsObjectRef> {
        handler_of(proxy).and_then(|handler| handler.weakmap_key_delegate(proxy))
    }

    pub fn get_prototype_of(
        cx: &mut Context,
        proxy: &JsObjectRef,
    ) -> Result<Option<JsObjectRef>, JsError> {
        let _frame = cx.enter_recursion()?;
        let handler = proxy_handler(proxy)?;
        handler.get_prototype_of(cx, proxy)
    }
}
