//! Generic object operations
//!
//! The uniform property protocol over heap objects: ordinary storage
//! operations on plain objects, routed through the [`Proxy`](crate::proxy::Proxy)
//! dispatcher whenever the object encountered is tagged as a proxy. Handlers
//! are written against these operations, so a wrapped target that is itself a
//! proxy recurses through the target's own proxy protocol instead of assuming
//! native storage.

use std::rc::Rc;

use crate::context::Context;
use crate::descriptor::PropertyDescriptor;
use crate::error::JsError;
use crate::proxy::{Proxy, is_proxy};
use crate::value::{
    CheapClone, EsClass, Exotic, JsObjectRef, JsString, JsValue, PropertyKey, class_of,
};

/// Key-collection flags: which properties a name walk reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterFlags {
    /// Stop at own properties instead of walking the prototype chain
    pub own_only: bool,
    /// Include non-enumerable properties
    pub include_hidden: bool,
}

impl IterFlags {
    /// Own enumerable properties
    pub const OWN: IterFlags = IterFlags {
        own_only: true,
        include_hidden: false,
    };
    /// All own properties, hidden included
    pub const OWN_HIDDEN: IterFlags = IterFlags {
        own_only: true,
        include_hidden: true,
    };
    /// Enumerable properties along the whole prototype chain
    pub const ENUMERATE: IterFlags = IterFlags {
        own_only: false,
        include_hidden: false,
    };
}

/// Snapshot iterator over a property-key list.
///
/// The snapshot can be restarted exactly once, which is what enumeration
/// callers that need a second pass rely on.
#[derive(Debug, Clone)]
pub struct KeyIterator {
    keys: Vec<PropertyKey>,
    pos: usize,
    restarted: bool,
}

impl KeyIterator {
    pub fn new(keys: Vec<PropertyKey>) -> Self {
        Self {
            keys,
            pos: 0,
            restarted: false,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Rewind to the first key. Succeeds at most once per iterator.
    pub fn restart(&mut self) -> bool {
        if self.restarted {
            return false;
        }
        self.restarted = true;
        self.pos = 0;
        true
    }
}

impl Iterator for KeyIterator {
    type Item = PropertyKey;

    fn next(&mut self) -> Option<PropertyKey> {
        let key = self.keys.get(self.pos).cloned();
        if key.is_some() {
            self.pos += 1;
        }
        key
    }
}

/// ToPrimitive conversion hint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionHint {
    Default,
    Number,
    String,
}

/// Identity comparison for optional accessor slots
pub(crate) fn same_object_slot(a: &Option<JsObjectRef>, b: &Option<JsObjectRef>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Rc::ptr_eq(a, b),
        _ => false,
    }
}

/// Own descriptor of an object: through the proxy protocol for proxies,
/// straight from the property table otherwise
pub fn get_own_descriptor(
    cx: &mut Context,
    obj: &JsObjectRef,
    key: &PropertyKey,
) -> Result<Option<PropertyDescriptor>, JsError> {
    if is_proxy(obj) {
        return Proxy::get_own_property_descriptor(cx, obj, key);
    }
    Ok(obj.borrow().properties.get(key).cloned())
}

/// Find a property along the prototype chain. Returns the descriptor and the
/// object it was found on.
pub fn lookup_property(
    cx: &mut Context,
    obj: &JsObjectRef,
    key: &PropertyKey,
) -> Result<Option<(PropertyDescriptor, JsObjectRef)>, JsError> {
    let mut current = obj.cheap_clone();
    let mut hops = 0usize;
    loop {
        if hops > cx.recursion_limit() {
            return Err(JsError::RecursionLimitExceeded {
                limit: cx.recursion_limit(),
            });
        }
        hops += 1;

        if is_proxy(&current) {
            let desc = Proxy::get_property_descriptor(cx, &current, key)?;
            return Ok(desc.map(|desc| (desc, current)));
        }
        let (own, proto) = {
            let obj_ref = current.borrow();
            (obj_ref.properties.get(key).cloned(), obj_ref.prototype.clone())
        };
        if let Some(desc) = own {
            return Ok(Some((desc, current)));
        }
        match proto {
            Some(proto) => current = proto,
            None => return Ok(None),
        }
    }
}

/// Generic property read with an explicit receiver for accessor invocation
pub fn get_property(
    cx: &mut Context,
    obj: &JsObjectRef,
    receiver: &JsValue,
    key: &PropertyKey,
) -> Result<JsValue, JsError> {
    let _frame = cx.enter_recursion()?;
    let mut current = obj.cheap_clone();
    let mut hops = 0usize;
    loop {
        if hops > cx.recursion_limit() {
            return Err(JsError::RecursionLimitExceeded {
                limit: cx.recursion_limit(),
            });
        }
        hops += 1;

        if is_proxy(&current) {
            return Proxy::get(cx, &current, receiver, key);
        }
        let (own, proto) = {
            let obj_ref = current.borrow();
            (obj_ref.properties.get(key).cloned(), obj_ref.prototype.clone())
        };
        if let Some(desc) = own {
            if desc.is_accessor() {
                return match desc.getter {
                    Some(getter) => cx.invoke(&JsValue::Object(getter), receiver.clone(), &[]),
                    None => Ok(JsValue::Undefined),
                };
            }
            if desc.attrs.shared {
                return Ok(JsValue::Undefined);
            }
            return Ok(desc.value);
        }
        match proto {
            Some(proto) => current = proto,
            None => return Ok(JsValue::Undefined),
        }
    }
}

/// Generic property write with an explicit receiver.
///
/// Walks the chain for an existing property: setters run bound to the
/// receiver; read-only data properties fail (a TypeError under `strict`,
/// silently otherwise); a writable data property is updated in place on the
/// receiver or shadowed onto it; a property absent from the whole chain is
/// created as an own enumerable data property of the receiver.
pub fn set_property(
    cx: &mut Context,
    obj: &JsObjectRef,
    receiver: &JsValue,
    key: &PropertyKey,
    strict: bool,
    value: JsValue,
) -> Result<bool, JsError> {
    let _frame = cx.enter_recursion()?;
    let mut current = obj.cheap_clone();
    let mut hops = 0usize;
    loop {
        if hops > cx.recursion_limit() {
            return Err(JsError::RecursionLimitExceeded {
                limit: cx.recursion_limit(),
            });
        }
        hops += 1;

        if is_proxy(&current) {
            return Proxy::set(cx, &current, receiver, key, strict, value);
        }
        let (own, proto) = {
            let obj_ref = current.borrow();
            (obj_ref.properties.get(key).cloned(), obj_ref.prototype.clone())
        };
        if let Some(desc) = own {
            if desc.is_accessor() {
                return match desc.setter {
                    Some(setter) => {
                        cx.invoke(&JsValue::Object(setter), receiver.clone(), &[value])?;
                        Ok(true)
                    }
                    None => {
                        if strict {
                            Err(JsError::type_error(format!(
                                "cannot set property '{}' which has only a getter",
                                key
                            )))
                        } else {
                            Ok(false)
                        }
                    }
                };
            }
            if !desc.attrs.writable {
                return if strict {
                    Err(JsError::type_error(format!(
                        "cannot assign to read-only property '{}'",
                        key
                    )))
                } else {
                    Ok(false)
                };
            }
            let Some(receiver_obj) = receiver.as_object() else {
                return if strict {
                    Err(JsError::type_error("cannot create property on a primitive"))
                } else {
                    Ok(false)
                };
            };
            if Rc::ptr_eq(receiver_obj, &current) {
                let mut updated = desc;
                updated.value = value;
                current.borrow_mut().properties.insert(key.clone(), updated);
                return Ok(true);
            }
            let receiver_obj = receiver_obj.cheap_clone();
            return define_property(cx, &receiver_obj, key, &PropertyDescriptor::data(value));
        }
        match proto {
            Some(proto) => current = proto,
            None => {
                let Some(receiver_obj) = receiver.as_object() else {
                    return if strict {
                        Err(JsError::type_error("cannot create property on a primitive"))
                    } else {
                        Ok(false)
                    };
                };
                let receiver_obj = receiver_obj.cheap_clone();
                return define_property(cx, &receiver_obj, key, &PropertyDescriptor::data(value));
            }
        }
    }
}

/// Generic property definition
pub fn define_property(
    cx: &mut Context,
    obj: &JsObjectRef,
    key: &PropertyKey,
    desc: &PropertyDescriptor,
) -> Result<bool, JsError> {
    if is_proxy(obj) {
        return Proxy::define_property(cx, obj, key, desc);
    }
    native_define_property(obj, key, desc)
}

/// Ordinary DefineOwnProperty on native storage, validating against
/// non-configurable and non-extensible state
pub(crate) fn native_define_property(
    obj: &JsObjectRef,
    key: &PropertyKey,
    desc: &PropertyDescriptor,
) -> Result<bool, JsError> {
    let mut obj_ref = obj.borrow_mut();
    if let Some(current) = obj_ref.properties.get(key) {
        if !current.attrs.configurable {
            if desc.attrs.configurable {
                return Err(JsError::type_error(format!(
                    "cannot redefine non-configurable property '{}'",
                    key
                )));
            }
            if desc.attrs.enumerable != current.attrs.enumerable {
                return Err(JsError::type_error(format!(
                    "cannot change enumerability of non-configurable property '{}'",
                    key
                )));
            }
            if desc.is_accessor() != current.is_accessor() {
                return Err(JsError::type_error(format!(
                    "cannot change the kind of non-configurable property '{}'",
                    key
                )));
            }
            if current.is_data() && !current.attrs.writable {
                if desc.attrs.writable {
                    return Err(JsError::type_error(format!(
                        "cannot make read-only property '{}' writable",
                        key
                    )));
                }
                if !desc.value.same_value(&current.value) {
                    return Err(JsError::type_error(format!(
                        "cannot change the value of read-only property '{}'",
                        key
                    )));
                }
            }
            if current.is_accessor()
                && (!same_object_slot(&desc.getter, &current.getter)
                    || !same_object_slot(&desc.setter, &current.setter))
            {
                return Err(JsError::type_error(format!(
                    "cannot change accessors of non-configurable property '{}'",
                    key
                )));
            }
        }
        obj_ref.properties.insert(key.clone(), desc.clone());
        return Ok(true);
    }

    if !obj_ref.extensible {
        return Err(JsError::type_error(format!(
            "cannot define property '{}' on a non-extensible object",
            key
        )));
    }
    obj_ref.properties.insert(key.clone(), desc.clone());
    if let PropertyKey::Index(index) = key {
        let new_length = index + 1;
        if let Exotic::Array { length } = &mut obj_ref.exotic
            && new_length > *length
        {
            *length = new_length;
            let length_key = PropertyKey::from("length");
            if let Some(stored) = obj_ref.properties.get_mut(&length_key) {
                stored.value = JsValue::Number(new_length as f64);
            }
        }
    }
    Ok(true)
}

/// Generic property deletion. Deleting an absent property succeeds; deleting
/// a non-configurable property fails without an error.
pub fn delete_property(
    cx: &mut Context,
    obj: &JsObjectRef,
    key: &PropertyKey,
) -> Result<bool, JsError> {
    if is_proxy(obj) {
        return Proxy::delete(cx, obj, key);
    }
    let mut obj_ref = obj.borrow_mut();
    match obj_ref.properties.get(key) {
        None => Ok(true),
        Some(desc) if !desc.attrs.configurable => Ok(false),
        Some(_) => {
            obj_ref.properties.shift_remove(key);
            Ok(true)
        }
    }
}

/// Generic existence check along the prototype chain
pub fn has_property(cx: &mut Context, obj: &JsObjectRef, key: &PropertyKey) -> Result<bool, JsError> {
    let mut current = obj.cheap_clone();
    let mut hops = 0usize;
    loop {
        if hops > cx.recursion_limit() {
            return Err(JsError::RecursionLimitExceeded {
                limit: cx.recursion_limit(),
            });
        }
        hops += 1;

        if is_proxy(&current) {
            return Proxy::has(cx, &current, key);
        }
        let (found, proto) = {
            let obj_ref = current.borrow();
            (obj_ref.properties.contains_key(key), obj_ref.prototype.clone())
        };
        if found {
            return Ok(true);
        }
        match proto {
            Some(proto) => current = proto,
            None => return Ok(false),
        }
    }
}

/// Generic own-existence check
pub fn has_own(cx: &mut Context, obj: &JsObjectRef, key: &PropertyKey) -> Result<bool, JsError> {
    if is_proxy(obj) {
        return Proxy::has_own(cx, obj, key);
    }
    Ok(obj.borrow().properties.contains_key(key))
}

/// Own property keys in storage order, filtered per `flags.include_hidden`
pub fn own_property_names(
    cx: &mut Context,
    obj: &JsObjectRef,
    flags: IterFlags,
) -> Result<Vec<PropertyKey>, JsError> {
    if is_proxy(obj) {
        return if flags.include_hidden {
            Proxy::get_own_property_names(cx, obj)
        } else {
            Proxy::keys(cx, obj)
        };
    }
    let obj_ref = obj.borrow();
    Ok(obj_ref
        .properties
        .iter()
        .filter(|(_, desc)| flags.include_hidden || desc.attrs.enumerable)
        .map(|(key, _)| key.clone())
        .collect())
}

/// Property names per `flags`: own only, or deduplicated along the whole
/// prototype chain. A proxy encountered on the chain contributes through its
/// own enumeration protocol, which already covers the rest of the chain.
pub fn property_names(
    cx: &mut Context,
    obj: &JsObjectRef,
    flags: IterFlags,
) -> Result<Vec<PropertyKey>, JsError> {
    if flags.own_only {
        return own_property_names(cx, obj, flags);
    }
    let mut names = Vec::new();
    let mut current = obj.cheap_clone();
    let mut hops = 0usize;
    loop {
        if hops > cx.recursion_limit() {
            return Err(JsError::RecursionLimitExceeded {
                limit: cx.recursion_limit(),
            });
        }
        hops += 1;

        if is_proxy(&current) {
            append_unique(&mut names, Proxy::enumerate(cx, &current)?);
            return Ok(names);
        }
        let level = own_property_names(
            cx,
            &current,
            IterFlags {
                own_only: true,
                include_hidden: flags.include_hidden,
            },
        )?;
        append_unique(&mut names, level);
        let proto = current.borrow().prototype.clone();
        match proto {
            Some(proto) => current = proto,
            None => return Ok(names),
        }
    }
}

/// Append the keys of `others` that are not already present in `base`
pub fn append_unique(base: &mut Vec<PropertyKey>, others: Vec<PropertyKey>) {
    for key in others {
        if !base.contains(&key) {
            base.push(key);
        }
    }
}

/// Whether new properties may be added. Proxies of this protocol do not
/// track extensibility of their own; they answer as extensible.
pub fn is_extensible(obj: &JsObjectRef) -> bool {
    if is_proxy(obj) {
        return true;
    }
    obj.borrow().extensible
}

/// Forbid adding new properties to a native object
pub fn prevent_extensions(obj: &JsObjectRef) {
    obj.borrow_mut().extensible = false;
}

/// Generic prototype read
pub fn get_prototype(
    cx: &mut Context,
    obj: &JsObjectRef,
) -> Result<Option<JsObjectRef>, JsError> {
    if is_proxy(obj) {
        return Proxy::get_prototype_of(cx, obj);
    }
    Ok(obj.borrow().prototype.clone())
}

/// Class check that recurses through proxies
pub fn object_class_is(cx: &mut Context, obj: &JsObjectRef, class: EsClass) -> bool {
    if is_proxy(obj) {
        return Proxy::object_class_is(cx, obj, class);
    }
    class_of(obj) == class
}

/// Ordinary ToPrimitive: try `valueOf`/`toString` (order per hint) as
/// zero-argument methods of the object and accept the first primitive result
pub fn ordinary_to_primitive(
    cx: &mut Context,
    obj: &JsObjectRef,
    hint: ConversionHint,
) -> Result<JsValue, JsError> {
    let _frame = cx.enter_recursion()?;
    let method_names: [&str; 2] = match hint {
        ConversionHint::String => ["toString", "valueOf"],
        ConversionHint::Number | ConversionHint::Default => ["valueOf", "toString"],
    };
    let this = JsValue::Object(obj.cheap_clone());
    for name in method_names {
        let method = get_property(cx, obj, &this, &PropertyKey::from(name))?;
        if method.is_callable() {
            let result = cx.invoke(&method, this.clone(), &[])?;
            if result.is_primitive() {
                return Ok(result);
            }
        }
    }
    Err(JsError::type_error("cannot convert object to primitive value"))
}

/// Ordinary instanceof: walk the value's prototype chain looking for the
/// callable's `prototype` object
pub fn ordinary_has_instance(
    cx: &mut Context,
    callable: &JsObjectRef,
    value: &JsValue,
) -> Result<bool, JsError> {
    let Some(instance) = value.as_object() else {
        return Ok(false);
    };
    let proto_key = PropertyKey::from("prototype");
    let proto = get_property(cx, callable, &JsValue::Object(callable.cheap_clone()), &proto_key)?;
    let Some(proto) = proto.as_object() else {
        return Err(JsError::type_error(
            "function has a non-object prototype in instanceof check",
        ));
    };

    let mut current = get_prototype(cx, instance)?;
    let mut hops = 0usize;
    while let Some(link) = current {
        if hops > cx.recursion_limit() {
            return Err(JsError::RecursionLimitExceeded {
                limit: cx.recursion_limit(),
            });
        }
        hops += 1;
        if Rc::ptr_eq(&link, proto) {
            return Ok(true);
        }
        current = get_prototype(cx, &link)?;
    }
    Ok(false)
}

/// Class tag string for diagnostics and `obj_to_string` traps
pub fn obj_to_string_helper(cx: &mut Context, obj: &JsObjectRef) -> Result<JsString, JsError> {
    if is_proxy(obj) {
        return Proxy::obj_to_string(cx, obj);
    }
    Ok(JsString::from(format!("[object {}]", class_of(obj).name())))
}

/// Source rendering for callables
pub fn fun_to_string_helper(cx: &mut Context, obj: &JsObjectRef) -> Result<JsString, JsError> {
    if is_proxy(obj) {
        return Proxy::fun_to_string(cx, obj);
    }
    match &obj.borrow().exotic {
        Exotic::Function(f) => Ok(JsString::from(format!(
            "function {}() {{\n    [native code]\n}}",
            f.name
        ))),
        _ => Err(JsError::type_error("Function.prototype.toString called on incompatible object")),
    }
}

/// Array-ish length read through the generic protocol
pub fn length_of(cx: &mut Context, obj: &JsObjectRef) -> Result<u32, JsError> {
    let this = JsValue::Object(obj.cheap_clone());
    let length = get_property(cx, obj, &this, &PropertyKey::from("length"))?;
    Ok(match length {
        JsValue::Number(n) if n.is_finite() && n >= 0.0 => n as u32,
        JsValue::String(s) => s.parse::<u32>().unwrap_or(0),
        _ => 0,
    })
}

/// Indexed element read through the generic protocol
pub fn get_element(cx: &mut Context, obj: &JsObjectRef, index: u32) -> Result<JsValue, JsError> {
    let this = JsValue::Object(obj.cheap_clone());
    get_property(cx, obj, &this, &PropertyKey::Index(index))
}
