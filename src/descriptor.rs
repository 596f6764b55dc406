//! Property descriptors
//!
//! Two descriptor forms flow through the dispatcher: the complete
//! [`PropertyDescriptor`] used for storage and reporting, and the partial
//! [`PropDesc`] in which every field carries a presence bit, as parsed from a
//! script-visible descriptor object. Invariant validation works on the
//! partial form, because "attribute not specified" and "attribute specified
//! as false" are different claims.

use crate::context::Context;
use crate::error::JsError;
use crate::object;
use crate::value::{CheapClone, JsObjectRef, JsValue, PropertyKey, new_object};

/// Property attribute set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyAttrs {
    pub enumerable: bool,
    pub configurable: bool,
    pub writable: bool,
    /// Shared (slotless) data property: reads yield undefined rather than
    /// the stored value
    pub shared: bool,
    /// Accessor presence flags; an accessor may be explicitly undefined,
    /// which is distinct from no accessor at all
    pub has_getter: bool,
    pub has_setter: bool,
    /// Id override handed to slotless property ops
    pub short_id: Option<i32>,
}

/// A complete property descriptor
#[derive(Debug, Clone)]
pub struct PropertyDescriptor {
    pub value: JsValue,
    pub getter: Option<JsObjectRef>,
    pub setter: Option<JsObjectRef>,
    pub attrs: PropertyAttrs,
}

impl PropertyDescriptor {
    /// A plain writable, enumerable, configurable data property
    pub fn data(value: JsValue) -> Self {
        Self {
            value,
            getter: None,
            setter: None,
            attrs: PropertyAttrs {
                enumerable: true,
                configurable: true,
                writable: true,
                ..Default::default()
            },
        }
    }

    /// A data property with explicit attributes
    pub fn data_with(value: JsValue, writable: bool, enumerable: bool, configurable: bool) -> Self {
        Self {
            value,
            getter: None,
            setter: None,
            attrs: PropertyAttrs {
                enumerable,
                configurable,
                writable,
                ..Default::default()
            },
        }
    }

    /// An accessor property; both accessor slots count as specified
    pub fn accessor(getter: Option<JsObjectRef>, setter: Option<JsObjectRef>) -> Self {
        Self {
            value: JsValue::Undefined,
            getter,
            setter,
            attrs: PropertyAttrs {
                enumerable: true,
                configurable: true,
                writable: false,
                has_getter: true,
                has_setter: true,
                ..Default::default()
            },
        }
    }

    /// Whether this descriptor describes an accessor property
    pub fn is_accessor(&self) -> bool {
        self.attrs.has_getter
            || self.attrs.has_setter
            || self.getter.is_some()
            || self.setter.is_some()
    }

    pub fn is_data(&self) -> bool {
        !self.is_accessor()
    }
}

/// A partial descriptor: each field paired with a presence bit
#[derive(Debug, Clone, Default)]
pub struct PropDesc {
    pub has_value: bool,
    pub value: JsValue,
    pub has_writable: bool,
    pub writable: bool,
    pub has_enumerable: bool,
    pub enumerable: bool,
    pub has_configurable: bool,
    pub configurable: bool,
    pub has_get: bool,
    pub getter: Option<JsObjectRef>,
    pub has_set: bool,
    pub setter: Option<JsObjectRef>,
}

impl PropDesc {
    /// Specifies value or writable
    pub fn is_data_descriptor(&self) -> bool {
        self.has_value || self.has_writable
    }

    /// Specifies an accessor slot
    pub fn is_accessor_descriptor(&self) -> bool {
        self.has_get || self.has_set
    }

    /// Specifies neither data nor accessor fields
    pub fn is_generic_descriptor(&self) -> bool {
        !self.is_data_descriptor() && !self.is_accessor_descriptor()
    }

    /// Specifies no field at all (a pure existence check)
    pub fn is_empty(&self) -> bool {
        !self.has_value
            && !self.has_writable
            && !self.has_get
            && !self.has_set
            && !self.has_enumerable
            && !self.has_configurable
    }

    /// Parse a script descriptor object. Accessor fields must be callable or
    /// undefined; any non-object input is a TypeError.
    pub fn parse(cx: &mut Context, value: &JsValue) -> Result<PropDesc, JsError> {
        let obj = value.to_object("property descriptor")?;
        let mut desc = PropDesc::default();

        let value_key = PropertyKey::from("value");
        if object::has_property(cx, &obj, &value_key)? {
            desc.has_value = true;
            desc.value = object::get_property(cx, &obj, &JsValue::Object(obj.cheap_clone()), &value_key)?;
        }

        let writable_key = PropertyKey::from("writable");
        if object::has_property(cx, &obj, &writable_key)? {
            desc.has_writable = true;
            desc.writable = object::get_property(cx, &obj, &JsValue::Object(obj.cheap_clone()), &writable_key)?
                .to_boolean();
        }

        let enumerable_key = PropertyKey::from("enumerable");
        if object::has_property(cx, &obj, &enumerable_key)? {
            desc.has_enumerable = true;
            desc.enumerable =
                object::get_property(cx, &obj, &JsValue::Object(obj.cheap_clone()), &enumerable_key)?
                    .to_boolean();
        }

        let configurable_key = PropertyKey::from("configurable");
        if object::has_property(cx, &obj, &configurable_key)? {
            desc.has_configurable = true;
            desc.configurable =
                object::get_property(cx, &obj, &JsValue::Object(obj.cheap_clone()), &configurable_key)?
                    .to_boolean();
        }

        let get_key = PropertyKey::from("get");
        if object::has_property(cx, &obj, &get_key)? {
            desc.has_get = true;
            desc.getter = parse_accessor(
                object::get_property(cx, &obj, &JsValue::Object(obj.cheap_clone()), &get_key)?,
                "getter",
            )?;
        }

        let set_key = PropertyKey::from("set");
        if object::has_property(cx, &obj, &set_key)? {
            desc.has_set = true;
            desc.setter = parse_accessor(
                object::get_property(cx, &obj, &JsValue::Object(obj.cheap_clone()), &set_key)?,
                "setter",
            )?;
        }

        if (desc.has_get || desc.has_set) && (desc.has_value || desc.has_writable) {
            return Err(JsError::type_error(
                "property descriptor must not specify both accessors and a value or writability",
            ));
        }

        Ok(desc)
    }

    /// Fill unspecified fields with their defaults
    pub fn complete(&mut self) {
        if self.is_generic_descriptor() || self.is_data_descriptor() {
            if !self.has_value {
                self.has_value = true;
                self.value = JsValue::Undefined;
            }
            if !self.has_writable {
                self.has_writable = true;
                self.writable = false;
            }
        } else {
            if !self.has_get {
                self.has_get = true;
                self.getter = None;
            }
            if !self.has_set {
                self.has_set = true;
                self.setter = None;
            }
        }
        if !self.has_enumerable {
            self.has_enumerable = true;
            self.enumerable = false;
        }
        if !self.has_configurable {
            self.has_configurable = true;
            self.configurable = false;
        }
    }

    /// Re-expand a complete descriptor into the partial form, every relevant
    /// field present
    pub fn from_descriptor(desc: &PropertyDescriptor) -> PropDesc {
        if desc.is_accessor() {
            PropDesc {
                has_get: true,
                getter: desc.getter.clone(),
                has_set: true,
                setter: desc.setter.clone(),
                has_enumerable: true,
                enumerable: desc.attrs.enumerable,
                has_configurable: true,
                configurable: desc.attrs.configurable,
                ..Default::default()
            }
        } else {
            PropDesc {
                has_value: true,
                value: desc.value.clone(),
                has_writable: true,
                writable: desc.attrs.writable,
                has_enumerable: true,
                enumerable: desc.attrs.enumerable,
                has_configurable: true,
                configurable: desc.attrs.configurable,
                ..Default::default()
            }
        }
    }

    /// Collapse into a complete descriptor; unspecified attributes read as
    /// their defaults
    pub fn to_descriptor(&self) -> PropertyDescriptor {
        if self.is_accessor_descriptor() {
            PropertyDescriptor {
                value: JsValue::Undefined,
                getter: self.getter.clone(),
                setter: self.setter.clone(),
                attrs: PropertyAttrs {
                    enumerable: self.enumerable,
                    configurable: self.configurable,
                    writable: false,
                    has_getter: self.has_get,
                    has_setter: self.has_set,
                    ..Default::default()
                },
            }
        } else {
            PropertyDescriptor {
                value: self.value.clone(),
                getter: None,
                setter: None,
                attrs: PropertyAttrs {
                    enumerable: self.enumerable,
                    configurable: self.configurable,
                    writable: self.writable,
                    ..Default::default()
                },
            }
        }
    }

    /// Build the script-visible descriptor object for this descriptor
    pub fn make_object(&self) -> JsObjectRef {
        let obj = new_object();
        {
            let mut obj_ref = obj.borrow_mut();
            if self.has_value {
                obj_ref.properties.insert(
                    PropertyKey::from("value"),
                    PropertyDescriptor::data(self.value.clone()),
                );
            }
            if self.has_writable {
                obj_ref.properties.insert(
                    PropertyKey::from("writable"),
                    PropertyDescriptor::data(JsValue::Boolean(self.writable)),
                );
            }
            if self.has_get {
                let getter = match &self.getter {
                    Some(g) => JsValue::Object(g.cheap_clone()),
                    None => JsValue::Undefined,
                };
                obj_ref
                    .properties
                    .insert(PropertyKey::from("get"), PropertyDescriptor::data(getter));
            }
            if self.has_set {
                let setter = match &self.setter {
                    Some(s) => JsValue::Object(s.cheap_clone()),
                    None => JsValue::Undefined,
                };
                obj_ref
                    .properties
                    .insert(PropertyKey::from("set"), PropertyDescriptor::data(setter));
            }
            if self.has_enumerable {
                obj_ref.properties.insert(
                    PropertyKey::from("enumerable"),
                    PropertyDescriptor::data(JsValue::Boolean(self.enumerable)),
                );
            }
            if self.has_configurable {
                obj_ref.properties.insert(
                    PropertyKey::from("configurable"),
                    PropertyDescriptor::data(JsValue::Boolean(self.configurable)),
                );
            }
        }
        obj
    }
}

fn parse_accessor(value: JsValue, what: &str) -> Result<Option<JsObjectRef>, JsError> {
    if value.is_null_or_undefined() {
        return Ok(None);
    }
    if !value.is_callable() {
        return Err(JsError::type_error(format!("{} must be callable", what)));
    }
    match value {
        JsValue::Object(obj) => Ok(Some(obj)),
        _ => Err(JsError::type_error(format!("{} must be callable", what))),
    }
}

/// Build the descriptor object reported to script for a descriptor
pub fn descriptor_to_object(desc: &PropertyDescriptor) -> JsObjectRef {
    PropDesc::from_descriptor(desc).make_object()
}

/// Interpret a trap's return value as a descriptor object
///
/// With `complete`, unspecified fields are filled with defaults, matching
/// what a fully materialized own property would carry.
pub fn parse_descriptor_object(
    cx: &mut Context,
    value: &JsValue,
    complete: bool,
) -> Result<PropertyDescriptor, JsError> {
    let mut desc = PropDesc::parse(cx, value)?;
    if complete {
        desc.complete();
    }
    Ok(desc.to_descriptor())
}

/// Normalize a descriptor object: reparse the standard fields into a fresh
/// object and carry over any non-standard properties untouched.
///
/// With `complete`, an undefined input passes through and the standard
/// fields are defaulted.
pub fn normalize_property_descriptor(
    cx: &mut Context,
    value: &JsValue,
    complete: bool,
) -> Result<JsValue, JsError> {
    if complete && value.is_undefined() {
        return Ok(JsValue::Undefined);
    }

    let attributes = value.to_object("property descriptor")?;
    let mut desc = PropDesc::parse(cx, value)?;
    if complete {
        desc.complete();
    }
    let normalized = desc.make_object();

    let extras = object::own_property_names(cx, &attributes, object::IterFlags::OWN)?;
    for key in extras {
        if key.eq_str("value")
            || key.eq_str("writable")
            || key.eq_str("get")
            || key.eq_str("set")
            || key.eq_str("enumerable")
            || key.eq_str("configurable")
        {
            continue;
        }
        let extra =
            object::get_property(cx, &attributes, &JsValue::Object(attributes.cheap_clone()), &key)?;
        normalized
            .borrow_mut()
            .properties
            .insert(key, PropertyDescriptor::data(extra));
    }

    Ok(JsValue::Object(normalized))
}
