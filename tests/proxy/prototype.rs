//! Prototype-chain synthesis for handlers that declare a prototype
//!
//! A membrane-style handler only implements own-property traps; the
//! dispatcher combines them with an explicit walk to the declared prototype
//! using ordinary property semantics.

use std::cell::RefCell;
use std::rc::Rc;

use super::common::{data, define, get, set};
use trapcore::descriptor::PropertyDescriptor;
use trapcore::object::{self, IterFlags};
use trapcore::proxy::{self, Proxy, new_proxy_object};
use trapcore::value::{new_function, new_object};
use trapcore::{Context, HandlerFamily, JsError, JsObjectRef, JsValue, PropertyKey, ProxyHandler};

/// Own-property traps over the wrapped target; inheritance is the
/// dispatcher's business
struct MembraneHandler;

impl MembraneHandler {
    fn target(proxy: &JsObjectRef) -> Result<JsObjectRef, JsError> {
        proxy::proxy_target(proxy)
    }
}

impl ProxyHandler for MembraneHandler {
    fn family(&self) -> HandlerFamily {
        HandlerFamily::Custom(0x3e3b)
    }

    fn has_prototype(&self) -> bool {
        true
    }

    fn get_own_property_descriptor(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
    ) -> Result<Option<PropertyDescriptor>, JsError> {
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
        let target = Self::target(proxy)?;
        object::define_property(cx, &target, key, desc)
    }

    fn get_own_property_names(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
    ) -> Result<Vec<PropertyKey>, JsError> {
        let target = Self::target(proxy)?;
        object::own_property_names(cx, &target, IterFlags::OWN_HIDDEN)
    }

    fn delete(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
    ) -> Result<bool, JsError> {
        let target = Self::target(proxy)?;
        object::delete_property(cx, &target, key)
    }

    // the dispatcher synthesizes enumeration from keys plus the prototype
    fn enumerate(
        &self,
        _cx: &mut Context,
        _proxy: &JsObjectRef,
    ) -> Result<Vec<PropertyKey>, JsError> {
        Err(JsError::internal_error(
            "enumerate is synthesized for handlers with a prototype",
        ))
    }

    fn has_own(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
    ) -> Result<bool, JsError> {
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
        let target = Self::target(proxy)?;
        object::set_property(cx, &target, receiver, key, strict, value)
    }
}

fn membrane(target: &JsObjectRef, proto: &JsObjectRef) -> JsObjectRef {
    new_proxy_object(
        Rc::new(MembraneHandler),
        JsValue::Object(target.clone()),
        Some(proto.clone()),
        None,
        None,
    )
}

#[test]
fn test_get_falls_through_to_declared_prototype() {
    let mut cx = Context::new();
    let proto = new_object();
    define(&proto, "inherited", data("from proto"));
    let target = new_object();
    define(&target, "own", data("from target"));
    let proxy = membrane(&target, &proto);

    assert_eq!(get(&mut cx, &proxy, "own").unwrap(), JsValue::from("from target"));
    assert_eq!(
        get(&mut cx, &proxy, "inherited").unwrap(),
        JsValue::from("from proto")
    );
    assert_eq!(get(&mut cx, &proxy, "absent").unwrap(), JsValue::Undefined);
}

#[test]
fn test_has_combines_own_and_prototype() {
    let mut cx = Context::new();
    let proto = new_object();
    define(&proto, "inherited", data(1.0));
    let target = new_object();
    define(&target, "own", data(2.0));
    let proxy = membrane(&target, &proto);

    assert!(Proxy::has(&mut cx, &proxy, &PropertyKey::from("own")).unwrap());
    assert!(Proxy::has(&mut cx, &proxy, &PropertyKey::from("inherited")).unwrap());
    assert!(!Proxy::has(&mut cx, &proxy, &PropertyKey::from("absent")).unwrap());
    assert!(!Proxy::has_own(&mut cx, &proxy, &PropertyKey::from("inherited")).unwrap());
}

#[test]
fn test_get_property_descriptor_synthesized_over_chain() {
    let mut cx = Context::new();
    let proto = new_object();
    define(&proto, "inherited", data(7.0));
    let target = new_object();
    let proxy = membrane(&target, &proto);

    let desc = Proxy::get_property_descriptor(&mut cx, &proxy, &PropertyKey::from("inherited"))
        .unwrap()
        .unwrap();
    assert_eq!(desc.value, JsValue::Number(7.0));
    assert!(
        Proxy::get_property_descriptor(&mut cx, &proxy, &PropertyKey::from("absent"))
            .unwrap()
            .is_none()
    );
}

#[test]
fn test_set_routes_to_prototype_setter() {
    let mut cx = Context::new();
    let proto = new_object();
    let written = Rc::new(RefCell::new(JsValue::Undefined));
    let sink = written.clone();
    let setter = new_function("watch", 1, move |_cx, _this, args| {
        *sink.borrow_mut() = args.first().cloned().unwrap_or(JsValue::Undefined);
        Ok(JsValue::Undefined)
    });
    define(
        &proto,
        "watched",
        PropertyDescriptor::accessor(None, Some(setter)),
    );
    let target = new_object();
    let proxy = membrane(&target, &proto);

    assert!(set(&mut cx, &proxy, "watched", "caught").unwrap());
    assert_eq!(*written.borrow(), JsValue::from("caught"));
    // the setter consumed the write; nothing landed on the target
    assert!(!target.borrow().has_own_property(&PropertyKey::from("watched")));
}

#[test]
fn test_set_without_prototype_setter_uses_handler() {
    let mut cx = Context::new();
    let proto = new_object();
    define(&proto, "plain", data(1.0));
    let target = new_object();
    let proxy = membrane(&target, &proto);

    assert!(set(&mut cx, &proxy, "plain", 2.0).unwrap());
    // the handler's set ran against the target and shadowed the prototype
    assert!(target.borrow().has_own_property(&PropertyKey::from("plain")));
    assert_eq!(get(&mut cx, &proxy, "plain").unwrap(), JsValue::Number(2.0));
}

#[test]
fn test_enumerate_unions_keys_and_prototype_names() {
    let mut cx = Context::new();
    let proto = new_object();
    define(&proto, "shared", data(1.0));
    define(&proto, "inherited", data(2.0));
    let target = new_object();
    define(&target, "shared", data(3.0));
    define(&target, "own", data(4.0));
    let proxy = membrane(&target, &proto);

    let keys = Proxy::enumerate(&mut cx, &proxy).unwrap();
    assert_eq!(
        keys,
        vec![
            PropertyKey::from("shared"),
            PropertyKey::from("own"),
            PropertyKey::from("inherited"),
        ]
    );
}

#[test]
fn test_iterate_uses_prototype_aware_paths() {
    let mut cx = Context::new();
    let proto = new_object();
    define(&proto, "inherited", data(1.0));
    let target = new_object();
    define(&target, "own", data(2.0));
    let proxy = membrane(&target, &proto);

    let own_only: Vec<_> = Proxy::iterate(&mut cx, &proxy, IterFlags::OWN)
        .unwrap()
        .collect();
    assert_eq!(own_only, vec![PropertyKey::from("own")]);

    let chain: Vec<_> = Proxy::iterate(&mut cx, &proxy, IterFlags::ENUMERATE)
        .unwrap()
        .collect();
    assert_eq!(
        chain,
        vec![PropertyKey::from("own"), PropertyKey::from("inherited")]
    );
}

#[test]
fn test_get_element_if_present_consults_prototype() {
    let mut cx = Context::new();
    let proto = new_object();
    proto.borrow_mut().properties.insert(
        PropertyKey::Index(3),
        PropertyDescriptor::data(JsValue::from("third")),
    );
    let target = new_object();
    let proxy = membrane(&target, &proto);
    let receiver = JsValue::Object(proxy.clone());

    let found = Proxy::get_element_if_present(&mut cx, &proxy, &receiver, 3).unwrap();
    assert_eq!(found, Some(JsValue::from("third")));
    let missing = Proxy::get_element_if_present(&mut cx, &proxy, &receiver, 9).unwrap();
    assert_eq!(missing, None);
}
