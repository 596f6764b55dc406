//! Legacy trap-table protocol: fundamental traps in script, derived traps
//! falling back to the defaults

use std::cell::RefCell;
use std::rc::Rc;

use super::common::{arg_key, data, define, get, install_trap, set};
use trapcore::descriptor;
use trapcore::object;
use trapcore::proxy::{
    Proxy, new_scripted_indirect_function_proxy, new_scripted_indirect_proxy,
};
use trapcore::value::{JsObjectRef, new_array, new_function, new_object};
use trapcore::{Context, JsError, JsValue, PropertyKey};

/// A trap table whose fundamental traps expose a captured store object
fn store_backed_table(store: &JsObjectRef) -> JsObjectRef {
    let table = new_object();

    let captured = store.clone();
    install_trap(&table, "getPropertyDescriptor", move |cx, _this, args| {
        let key = arg_key(args, 0);
        Ok(
            match object::lookup_property(cx, &captured, &key)?.map(|(desc, _)| desc) {
                Some(desc) => JsValue::Object(descriptor::descriptor_to_object(&desc)),
                None => JsValue::Undefined,
            },
        )
    });

    let captured = store.clone();
    install_trap(&table, "getOwnPropertyDescriptor", move |cx, _this, args| {
        let key = arg_key(args, 0);
        Ok(match object::get_own_descriptor(cx, &captured, &key)? {
            Some(desc) => JsValue::Object(descriptor::descriptor_to_object(&desc)),
            None => JsValue::Undefined,
        })
    });

    let captured = store.clone();
    install_trap(&table, "defineProperty", move |cx, _this, args| {
        let key = arg_key(args, 0);
        let desc = descriptor::parse_descriptor_object(
            cx,
            args.get(1).unwrap_or(&JsValue::Undefined),
            false,
        )?;
        object::define_property(cx, &captured, &key, &desc)?;
        Ok(JsValue::Undefined)
    });

    let captured = store.clone();
    install_trap(&table, "getOwnPropertyNames", move |cx, _this, _args| {
        let names = object::own_property_names(cx, &captured, trapcore::IterFlags::OWN_HIDDEN)?;
        Ok(JsValue::Object(new_array(
            names.iter().map(PropertyKey::to_value).collect(),
        )))
    });

    let captured = store.clone();
    install_trap(&table, "delete", move |cx, _this, args| {
        let key = arg_key(args, 0);
        Ok(JsValue::Boolean(object::delete_property(
            cx, &captured, &key,
        )?))
    });

    let captured = store.clone();
    install_trap(&table, "enumerate", move |cx, _this, _args| {
        let names = object::property_names(cx, &captured, trapcore::IterFlags::ENUMERATE)?;
        Ok(JsValue::Object(new_array(
            names.iter().map(PropertyKey::to_value).collect(),
        )))
    });

    table
}

#[test]
fn test_fundamental_traps_back_the_derived_defaults() {
    let mut cx = Context::new();
    let store = new_object();
    define(&store, "x", data("stored"));
    let proxy = new_scripted_indirect_proxy(store_backed_table(&store), None);

    // get has no trap here: the default computes it from the scripted
    // getPropertyDescriptor fundamental
    assert_eq!(get(&mut cx, &proxy, "x").unwrap(), JsValue::from("stored"));
    assert_eq!(get(&mut cx, &proxy, "missing").unwrap(), JsValue::Undefined);
    assert!(Proxy::has(&mut cx, &proxy, &PropertyKey::from("x")).unwrap());
    assert!(!Proxy::has_own(&mut cx, &proxy, &PropertyKey::from("absent")).unwrap());

    // keys falls back to getOwnPropertyNames + per-key descriptors
    let keys = Proxy::keys(&mut cx, &proxy).unwrap();
    assert_eq!(keys, vec![PropertyKey::from("x")]);

    // the default set defines through the scripted defineProperty
    assert!(set(&mut cx, &proxy, "y", 9.0).unwrap());
    assert_eq!(get(&mut cx, &proxy, "y").unwrap(), JsValue::Number(9.0));
    assert!(store.borrow().has_own_property(&PropertyKey::from("y")));

    assert!(Proxy::delete(&mut cx, &proxy, &PropertyKey::from("x")).unwrap());
    assert!(!store.borrow().has_own_property(&PropertyKey::from("x")));
}

#[test]
fn test_derived_trap_overrides_default() {
    let mut cx = Context::new();
    let store = new_object();
    define(&store, "x", data("stored"));
    let table = store_backed_table(&store);

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    install_trap(&table, "get", move |_cx, _this, args| {
        // (receiver, key)
        sink.borrow_mut()
            .push(arg_key(args, 1).to_string());
        Ok(JsValue::from("from trap"))
    });
    let proxy = new_scripted_indirect_proxy(table, None);

    assert_eq!(get(&mut cx, &proxy, "x").unwrap(), JsValue::from("from trap"));
    assert_eq!(*seen.borrow(), vec!["x".to_string()]);
}

#[test]
fn test_set_trap_receives_receiver_key_value() {
    let mut cx = Context::new();
    let table = new_object();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    install_trap(&table, "set", move |_cx, _this, args| {
        sink.borrow_mut().push((
            arg_key(args, 1).to_string(),
            args.get(2).cloned().unwrap_or(JsValue::Undefined),
        ));
        Ok(JsValue::Boolean(true))
    });
    let proxy = new_scripted_indirect_proxy(table, None);

    assert!(set(&mut cx, &proxy, "k", 3.0).unwrap());
    let recorded = seen.borrow();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded.first().unwrap().0, "k");
    assert_eq!(recorded.first().unwrap().1, JsValue::Number(3.0));
}

#[test]
fn test_missing_fundamental_trap_is_an_invocation_failure() {
    let mut cx = Context::new();
    let table = new_object();
    let proxy = new_scripted_indirect_proxy(table, None);

    let err = Proxy::get_own_property_descriptor(&mut cx, &proxy, &PropertyKey::from("x"))
        .unwrap_err();
    assert!(matches!(err, JsError::TypeError { .. }));
}

#[test]
fn test_primitive_descriptor_result_is_rejected() {
    let mut cx = Context::new();
    let table = new_object();
    install_trap(&table, "getOwnPropertyDescriptor", |_cx, _this, _args| {
        Ok(JsValue::Number(42.0))
    });
    let proxy = new_scripted_indirect_proxy(table, None);

    let err = Proxy::get_own_property_descriptor(&mut cx, &proxy, &PropertyKey::from("x"))
        .unwrap_err();
    assert!(matches!(err, JsError::TypeError { .. }));
}

#[test]
fn test_define_property_trap_receives_descriptor_object() {
    let mut cx = Context::new();
    let table = new_object();
    let seen = Rc::new(RefCell::new(None));
    let sink = seen.clone();
    install_trap(&table, "defineProperty", move |cx, _this, args| {
        let desc_obj = args
            .get(1)
            .and_then(JsValue::as_object)
            .cloned()
            .ok_or_else(|| JsError::type_error("expected a descriptor object"))?;
        let this = JsValue::Object(desc_obj.clone());
        *sink.borrow_mut() = Some(object::get_property(
            cx,
            &desc_obj,
            &this,
            &PropertyKey::from("value"),
        )?);
        Ok(JsValue::Undefined)
    });
    let proxy = new_scripted_indirect_proxy(table, None);

    assert!(
        Proxy::define_property(
            &mut cx,
            &proxy,
            &PropertyKey::from("k"),
            &trapcore::PropertyDescriptor::data(JsValue::from("payload")),
        )
        .unwrap()
    );
    assert_eq!(seen.borrow().clone().unwrap(), JsValue::from("payload"));
}

#[test]
fn test_function_proxy_routes_calls_to_delegate() {
    let mut cx = Context::new();
    let table = new_object();
    let call = new_function("impl", 1, |_cx, _this, args| {
        Ok(args.first().cloned().unwrap_or(JsValue::Undefined))
    });
    let proxy = new_scripted_indirect_function_proxy(table, call, None).unwrap();

    assert!(JsValue::Object(proxy.clone()).is_callable());
    let result = cx
        .invoke(
            &JsValue::Object(proxy),
            JsValue::Undefined,
            &[JsValue::from("through")],
        )
        .unwrap();
    assert_eq!(result, JsValue::from("through"));
}

#[test]
fn test_iterate_trap_result_must_be_an_object() {
    let mut cx = Context::new();
    let table = new_object();
    install_trap(&table, "iterate", |_cx, _this, _args| {
        Ok(JsValue::Number(1.0))
    });
    let proxy = new_scripted_indirect_proxy(table, None);

    let err = Proxy::iterate(&mut cx, &proxy, trapcore::IterFlags::OWN).unwrap_err();
    assert!(matches!(err, JsError::TypeError { .. }));
}

#[test]
fn test_keys_trap_converts_returned_array() {
    let mut cx = Context::new();
    let table = new_object();
    install_trap(&table, "keys", |_cx, _this, _args| {
        Ok(JsValue::Object(new_array(vec![
            JsValue::from("a"),
            JsValue::from("b"),
        ])))
    });
    let proxy = new_scripted_indirect_proxy(table, None);

    let keys = Proxy::keys(&mut cx, &proxy).unwrap();
    assert_eq!(keys, vec![PropertyKey::from("a"), PropertyKey::from("b")]);
}
