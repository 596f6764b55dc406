//! Proxy object dispatch core for embedding in dynamic-language runtimes
//!
//! An object's fundamental operations (property lookup, assignment,
//! enumeration, deletion, invocation, construction) can be intercepted and
//! redirected to a handler: a native [`ProxyHandler`] implementation, or a
//! script-level trap table whose results are validated against the wrapped
//! target's actual shape. The [`Proxy`] entry points wrap every trap call
//! with a policy gate, an explicit recursion bound, and prototype-chain
//! synthesis for handlers that declare a prototype.
//!
//! # Example
//!
//! ```
//! use trapcore::descriptor::PropertyDescriptor;
//! use trapcore::object;
//! use trapcore::proxy::new_scripted_direct_proxy;
//! use trapcore::value::{new_function, new_object};
//! use trapcore::{Context, JsValue, PropertyKey};
//!
//! let mut cx = Context::new();
//! let target = new_object();
//!
//! // A trap table with a single `get` trap
//! let traps = new_object();
//! let get = new_function("get", 3, |_cx, _this, _args| Ok(JsValue::from("intercepted")));
//! object::define_property(
//!     &mut cx,
//!     &traps,
//!     &PropertyKey::from("get"),
//!     &PropertyDescriptor::data(JsValue::Object(get)),
//! )
//! .unwrap();
//!
//! let proxy = new_scripted_direct_proxy(&mut cx, target, traps).unwrap();
//! let receiver = JsValue::Object(proxy.clone());
//! let value = object::get_property(&mut cx, &proxy, &receiver, &PropertyKey::from("x")).unwrap();
//! assert_eq!(value, JsValue::from("intercepted"));
//! ```

pub mod context;
pub mod descriptor;
pub mod error;
pub mod handler;
pub mod object;
pub mod policy;
pub mod proxy;
pub mod value;

pub use context::Context;
pub use descriptor::{PropDesc, PropertyAttrs, PropertyDescriptor};
pub use error::JsError;
pub use handler::{
    DirectHandler, HandlerFamily, ProxyHandler, ScriptedDirectHandler, ScriptedIndirectHandler,
};
pub use object::{ConversionHint, IterFlags, KeyIterator};
pub use policy::{Action, AutoEnterPolicy, PolicyDecision};
pub use proxy::{
    Proxy, is_proxy, new_proxy_object, new_scripted_direct_proxy, new_scripted_indirect_proxy,
    renew_proxy_object,
};
pub use value::{
    CheapClone, EsClass, JsObject, JsObjectRef, JsString, JsSymbol, JsValue, PropertyKey,
};
