//! Default (derived) trap behavior through a minimal custom handler
//!
//! StoreHandler implements only the fundamental traps over a side-table
//! object and leans on every default body for the derived traps.

use std::cell::RefCell;
use std::rc::Rc;

use super::common::{data, define, get, set};
use trapcore::descriptor::{PropertyAttrs, PropertyDescriptor};
use trapcore::object::{self, IterFlags};
use trapcore::proxy::{self, Proxy, new_proxy_object};
use trapcore::value::{new_function, new_object};
use trapcore::{Context, HandlerFamily, JsError, JsObjectRef, JsValue, PropertyKey, ProxyHandler};

struct StoreHandler;

impl StoreHandler {
    fn store(proxy: &JsObjectRef) -> Result<JsObjectRef, JsError> {
        proxy::proxy_target(proxy)
    }
}

impl ProxyHandler for StoreHandler {
    fn family(&self) -> HandlerFamily {
        HandlerFamily::Custom(0x5702e)
    }

    fn get_property_descriptor(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
    ) -> Result<Option<PropertyDescriptor>, JsError> {
        let store = Self::store(proxy)?;
        Ok(object::lookup_property(cx, &store, key)?.map(|(desc, _)| desc))
    }

    fn get_own_property_descriptor(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
    ) -> Result<Option<PropertyDescriptor>, JsError> {
        let store = Self::store(proxy)?;
        object::get_own_descriptor(cx, &store, key)
    }

    fn define_property(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
        desc: &PropertyDescriptor,
    ) -> Result<bool, JsError> {
        let store = Self::store(proxy)?;
        object::define_property(cx, &store, key, desc)
    }

    fn get_own_property_names(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
    ) -> Result<Vec<PropertyKey>, JsError> {
        let store = Self::store(proxy)?;
        object::own_property_names(cx, &store, IterFlags::OWN_HIDDEN)
    }

    fn delete(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
        key: &PropertyKey,
    ) -> Result<bool, JsError> {
        let store = Self::store(proxy)?;
        object::delete_property(cx, &store, key)
    }

    fn enumerate(
        &self,
        cx: &mut Context,
        proxy: &JsObjectRef,
    ) -> Result<Vec<PropertyKey>, JsError> {
        let store = Self::store(proxy)?;
        object::property_names(cx, &store, IterFlags::ENUMERATE)
    }
}

fn store_proxy(store: &JsObjectRef) -> JsObjectRef {
    new_proxy_object(
        Rc::new(StoreHandler),
        JsValue::Object(store.clone()),
        None,
        None,
        None,
    )
}

#[test]
fn test_default_has_uses_descriptor_lookup() {
    let mut cx = Context::new();
    let store = new_object();
    define(&store, "x", data(1.0));
    let proxy = store_proxy(&store);

    assert!(Proxy::has(&mut cx, &proxy, &PropertyKey::from("x")).unwrap());
    assert!(!Proxy::has(&mut cx, &proxy, &PropertyKey::from("y")).unwrap());
}

#[test]
fn test_default_get_returns_plain_slots_and_absent_as_undefined() {
    let mut cx = Context::new();
    let store = new_object();
    define(&store, "x", data("present"));
    let proxy = store_proxy(&store);

    assert_eq!(get(&mut cx, &proxy, "x").unwrap(), JsValue::from("present"));
    assert_eq!(get(&mut cx, &proxy, "missing").unwrap(), JsValue::Undefined);
}

#[test]
fn test_default_get_treats_shared_slots_as_undefined() {
    let mut cx = Context::new();
    let store = new_object();
    let mut desc = PropertyDescriptor::data(JsValue::Number(9.0));
    desc.attrs = PropertyAttrs {
        enumerable: true,
        configurable: true,
        writable: true,
        shared: true,
        ..Default::default()
    };
    define(&store, "slotless", desc);
    let proxy = store_proxy(&store);

    assert_eq!(get(&mut cx, &proxy, "slotless").unwrap(), JsValue::Undefined);
}

#[test]
fn test_default_get_invokes_getter_bound_to_receiver() {
    let mut cx = Context::new();
    let store = new_object();
    let observed = Rc::new(RefCell::new(JsValue::Undefined));
    let sink = observed.clone();
    let getter = new_function("probe", 0, move |_cx, this, _args| {
        *sink.borrow_mut() = this;
        Ok(JsValue::from("from getter"))
    });
    define(
        &store,
        "probe",
        PropertyDescriptor::accessor(Some(getter), None),
    );
    let proxy = store_proxy(&store);

    let result = get(&mut cx, &proxy, "probe").unwrap();
    assert_eq!(result, JsValue::from("from getter"));
    // the receiver was the proxy itself, not the side table
    assert!(
        observed
            .borrow()
            .strict_equals(&JsValue::Object(proxy.clone()))
    );
}

#[test]
fn test_default_set_creates_own_property_on_receiver() {
    let mut cx = Context::new();
    let store = new_object();
    let proxy = store_proxy(&store);

    assert!(set(&mut cx, &proxy, "fresh", 5.0).unwrap());
    // the default routed the definition back through the proxy's
    // define_property trap into the store
    assert!(store.borrow().has_own_property(&PropertyKey::from("fresh")));
    assert_eq!(get(&mut cx, &proxy, "fresh").unwrap(), JsValue::Number(5.0));
}

#[test]
fn test_default_set_read_only_fails_loud_only_in_strict() {
    let mut cx = Context::new();
    let store = new_object();
    define(
        &store,
        "ro",
        PropertyDescriptor::data_with(JsValue::Number(1.0), false, true, true),
    );
    let proxy = store_proxy(&store);
    let receiver = JsValue::Object(proxy.clone());

    assert!(
        !object::set_property(
            &mut cx,
            &proxy,
            &receiver,
            &PropertyKey::from("ro"),
            false,
            JsValue::Number(2.0),
        )
        .unwrap()
    );
    let err = object::set_property(
        &mut cx,
        &proxy,
        &receiver,
        &PropertyKey::from("ro"),
        true,
        JsValue::Number(2.0),
    )
    .unwrap_err();
    assert!(matches!(err, JsError::TypeError { .. }));
    assert_eq!(get(&mut cx, &proxy, "ro").unwrap(), JsValue::Number(1.0));
}

#[test]
fn test_default_set_invokes_setter() {
    let mut cx = Context::new();
    let store = new_object();
    let written = Rc::new(RefCell::new(JsValue::Undefined));
    let sink = written.clone();
    let setter = new_function("watch", 1, move |_cx, _this, args| {
        *sink.borrow_mut() = args.first().cloned().unwrap_or(JsValue::Undefined);
        Ok(JsValue::Undefined)
    });
    define(
        &store,
        "watched",
        PropertyDescriptor::accessor(None, Some(setter)),
    );
    let proxy = store_proxy(&store);

    assert!(set(&mut cx, &proxy, "watched", "observed").unwrap());
    assert_eq!(*written.borrow(), JsValue::from("observed"));
}

#[test]
fn test_default_keys_filters_enumerability() {
    let mut cx = Context::new();
    let store = new_object();
    define(&store, "visible", data(1.0));
    define(
        &store,
        "hidden",
        PropertyDescriptor::data_with(JsValue::Number(2.0), true, false, true),
    );
    let proxy = store_proxy(&store);

    let keys = Proxy::keys(&mut cx, &proxy).unwrap();
    assert_eq!(keys, vec![PropertyKey::from("visible")]);
}

#[test]
fn test_default_iterate_snapshots() {
    let mut cx = Context::new();
    let store = new_object();
    define(&store, "a", data(1.0));
    define(&store, "b", data(2.0));
    let proxy = store_proxy(&store);

    let keys: Vec<_> = Proxy::iterate(&mut cx, &proxy, IterFlags::OWN)
        .unwrap()
        .collect();
    assert_eq!(keys, vec![PropertyKey::from("a"), PropertyKey::from("b")]);
}

#[test]
fn test_default_call_uses_call_delegate() {
    let mut cx = Context::new();
    let store = new_object();
    let delegate = new_function("impl", 0, |_cx, _this, args| {
        Ok(args.first().cloned().unwrap_or(JsValue::Undefined))
    });
    let proxy = new_proxy_object(
        Rc::new(StoreHandler),
        JsValue::Object(store),
        None,
        Some(delegate),
        None,
    );

    let result = Proxy::call(
        &mut cx,
        &proxy,
        JsValue::Undefined,
        &[JsValue::from("echoed")],
    )
    .unwrap();
    assert_eq!(result, JsValue::from("echoed"));

    // construct falls back to the call delegate when none is given
    let constructed =
        Proxy::construct(&mut cx, &proxy, &[JsValue::from("built")]).unwrap();
    assert_eq!(constructed, JsValue::from("built"));
}

#[test]
fn test_default_weakmap_key_delegate_is_none() {
    let store = new_object();
    let proxy = store_proxy(&store);
    assert!(Proxy::weakmap_key_delegate(&proxy).is_none());
}

#[test]
fn test_default_has_instance_is_a_type_error() {
    let mut cx = Context::new();
    let store = new_object();
    let proxy = store_proxy(&store);
    let err = Proxy::has_instance(&mut cx, &proxy, &JsValue::Object(new_object())).unwrap_err();
    assert!(matches!(err, JsError::TypeError { .. }));
}

#[test]
fn test_default_obj_to_string_reflects_callability() {
    let mut cx = Context::new();
    let store = new_object();
    let proxy = store_proxy(&store);
    assert_eq!(
        Proxy::obj_to_string(&mut cx, &proxy).unwrap().as_str(),
        "[object Object]"
    );

    let delegate = new_function("f", 0, |_cx, _this, _args| Ok(JsValue::Undefined));
    let callable = new_proxy_object(
        Rc::new(StoreHandler),
        JsValue::Object(new_object()),
        None,
        Some(delegate),
        None,
    );
    assert_eq!(
        Proxy::obj_to_string(&mut cx, &callable).unwrap().as_str(),
        "[object Function]"
    );
}
