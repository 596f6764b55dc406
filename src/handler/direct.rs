//! Transparent target-forwarding handler
//!
//! Every trap performs the equivalent generic operation directly on the
//! wrapped target, with no script involvement. This is the building block
//! membranes and wrappers compose. Traps that would be redundant through the
//! default-plus-fundamentals composition are specialized directly; this also
//! keeps edge cases correct when the target is itself a proxy, because the
//! generic operations recurse through the target's own proxy protocol.

use std::rc::Rc;

use crate::context::Context;
use crate::descriptor::PropertyDescriptor;
use crate::error::JsError;
use crate::object::{self, ConversionHint, IterFlags, KeyIterator};
use crate::policy::assert_entered_policy;
use crate::proxy;
use crate::value::{EsClass, Exotic, JsObjectRef, JsString, JsValue, PropertyKey};

use super::{HandlerFamily, ProxyHandler};

/// Forwarding handler; stateless, shared by every direct proxy
#[derive(Debug, Default)]
pub struct DirectHandler;

thread_local! {
    static SINGLETON: Rc<DirectHandler> = Rc::new(DirectHandler);
}

impl DirectHandler {
    /// The shared dispatch table for this family
    pub fn singleton() -> Rc<DirectHandler> {
        SINGLETON.with(Rc::clone)
    }

    fn target(proxy: &JsObjectRef) -> Result<JsObjectRef, JsError> {
        proxy::proxy_target(proxy)
    }
}

impl ProxyHandler for DirectHandler {
    fn family(&self) -> HandlerFamily {
        HandlerFamily::Direct
    }

    fn get_property_descriptor(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
    ) -> Result<Option<PropertyDescriptor>, JsError> {
        assert_entered_policy(cx, proxy, Some(key));
        // Never called if there's a prototype; the illusion of inheritance
        // comes entirely from the target's own chain
        debug_assert!(!self.has_prototype());
        let target = Self::target(proxy)?;
        Ok(object::lookup_property(cx, &target, key)?.map(|(desc, _holder)| desc))
    }

    fn get_own_property_descriptor(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
    ) -> Result<Option<PropertyDescriptor>, JsError> {
        assert_entered_policy(cx, proxy, Some(key));
        let target = Self::target(proxy)?;
        object::get_own_descriptor(cx, &target, key)
    }

    fn define_property(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
        desc: &PropertyDescriptor,
    ) -> Result<bool, JsError> {
        assert_entered_policy(cx, proxy, Some(key));
        let target = Self::target(proxy)?;
        object::define_property(cx, &target, key, desc)
    }

    fn get_own_property_names(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
    ) -> Result<Vec<PropertyKey>, JsError> {
        assert_entered_policy(cx, proxy, None);
        let target = Self::target(proxy)?;
        object::own_property_names(cx, &target, IterFlags::OWN_HIDDEN)
    }

    fn delete(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
    ) -> Result<bool, JsError> {
        assert_entered_policy(cx, proxy, Some(key));
        let target = Self::target(proxy)?;
        object::delete_property(cx, &target, key)
    }

    fn enumerate(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
    ) -> Result<Vec<PropertyKey>, JsError> {
        assert_entered_policy(cx, proxy, None);
        debug_assert!(!self.has_prototype());
        let target = Self::target(proxy)?;
        object::property_names(cx, &target, IterFlags::ENUMERATE)
    }

    fn has(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
    ) -> Result<bool, JsError> {
        assert_entered_policy(cx, proxy, Some(key));
        debug_assert!(!self.has_prototype());
        let target = Self::target(proxy)?;
        object::has_property(cx, &target, key)
    }

    fn has_own(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
    ) -> Result<bool, JsError> {
        assert_entered_policy(cx, proxy, Some(key));
        let target = Self::target(proxy)?;
        object::has_own(cx, &target, key)
    }

    fn get(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        receiver: &JsValue,
        key: &PropertyKey,
    ) -> Result<JsValue, JsError> {
        assert_entered_policy(cx, proxy, Some(key));
        let target = Self::target(proxy)?;
        object::get_property(cx, &target, receiver, key)
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
        assert_entered_policy(cx, proxy, Some(key));
        let target = Self::target(proxy)?;
        object::set_property(cx, &target, receiver, key, strict, value)
    }

    fn keys(&self, cx: &mut Context, proxy: &JsObjectRef) -> Result<Vec<PropertyKey>, JsError> {
        assert_entered_policy(cx, proxy, None);
        let target = Self::target(proxy)?;
        object::own_property_names(cx, &target, IterFlags::OWN)
    }

    fn iterate(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        flags: IterFlags,
    ) -> Result<KeyIterator, JsError> {
        assert_entered_policy(cx, proxy, None);
        debug_assert!(!self.has_prototype());
        let target = Self::target(proxy)?;
        Ok(KeyIterator::new(object::property_names(cx, &target, flags)?))
    }

    fn has_instance(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        value: &JsValue,
    ) -> Result<bool, JsError> {
        assert_entered_policy(cx, proxy, None);
        let target = Self::target(proxy)?;
        object::ordinary_has_instance(cx, &target, value)
    }

    fn object_class_is(&self, cx: &mut Context, proxy: &JsObjectRef, class: EsClass) -> bool {
        match Self::target(proxy) {
            Ok(target) => object::object_class_is(cx, &target, class),
            Err(_) => false,
        }
    }

    fn default_value(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        hint: ConversionHint,
    ) -> Result<JsValue, JsError> {
        let target = Self::target(proxy)?;
        object::ordinary_to_primitive(cx, &target, hint)
    }

    fn obj_to_string(&self, cx: &mut Context, proxy: &JsObjectRef) -> Result<JsString, JsError> {
        assert_entered_policy(cx, proxy, None);
        let target = Self::target(proxy)?;
        object::obj_to_string_helper(cx, &target)
    }

    fn fun_to_string(&self, cx: &mut Context, proxy: &JsObjectRef) -> Result<JsString, JsError> {
        assert_entered_policy(cx, proxy, None);
        let target = Self::target(proxy)?;
        object::fun_to_string_helper(cx, &target)
    }

    fn regexp_shared(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
    ) -> Result<(JsString, JsString), JsError> {
        let target = Self::target(proxy)?;
        if proxy::is_proxy(&target) {
            return crate::proxy::Proxy::regexp_shared(cx, &target);
        }
        match &target.borrow().exotic {
            Exotic::RegExp { source, flags } => Ok((source.clone(), flags.clone())),
            _ => Err(JsError::type_error("expected a wrapped regexp")),
        }
    }

    /// Weak collections key on the real object behind the wrapper, not on
    /// the wrapper's own identity
    fn weakmap_key_delegate(&self, proxy: &JsObjectRef) -> Option<JsObjectRef> {
        proxy::proxy_target(proxy).ok().map(|t| proxy::unwrap_deep(&t))
    }
}
