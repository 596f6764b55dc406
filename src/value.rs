//! Value representation for the host object capability
//!
//! The core `JsValue` type and the plain-object storage the dispatcher
//! operates over. The proxy core does not own a garbage collector: objects
//! are reference-counted handles (`Rc<RefCell<JsObject>>`) and the embedding
//! object system is responsible for their lifetime.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;

use crate::context::Context;
use crate::descriptor::PropertyDescriptor;
use crate::error::JsError;
use crate::proxy::ProxyData;

/// Trait for types that have cheap (O(1), reference-counted) clones.
///
/// Makes it explicit when a clone only increments a reference count rather
/// than copying data.
pub trait CheapClone: Clone {
    /// Create a cheap (reference-counted) clone of this value.
    fn cheap_clone(&self) -> Self {
        self.clone()
    }
}

impl<T: ?Sized> CheapClone for Rc<T> {}

/// A dynamic-language value
#[derive(Clone, Default)]
pub enum JsValue {
    #[default]
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(JsString),
    Symbol(JsSymbol),
    Object(JsObjectRef),
}

impl JsValue {
    /// Check if this value is null or undefined
    pub fn is_null_or_undefined(&self) -> bool {
        matches!(self, JsValue::Null | JsValue::Undefined)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, JsValue::Undefined)
    }

    /// Check if this value is a primitive (anything but an object)
    pub fn is_primitive(&self) -> bool {
        !matches!(self, JsValue::Object(_))
    }

    /// Check if this value is callable: a host function, or a proxy carrying
    /// a call delegate
    pub fn is_callable(&self) -> bool {
        match self {
            JsValue::Object(obj) => match &obj.borrow().exotic {
                Exotic::Function(_) => true,
                Exotic::Proxy(data) => data.call.is_some(),
                _ => false,
            },
            _ => false,
        }
    }

    /// Borrow the object reference if this value is an object
    pub fn as_object(&self) -> Option<&JsObjectRef> {
        match self {
            JsValue::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Object reference or a TypeError naming the operation
    pub fn to_object(&self, what: &str) -> Result<JsObjectRef, JsError> {
        match self {
            JsValue::Object(obj) => Ok(obj.cheap_clone()),
            _ => Err(JsError::type_error(format!("{} is not an object", what))),
        }
    }

    /// Get the typeof result for this value
    pub fn type_of(&self) -> &'static str {
        match self {
            JsValue::Undefined => "undefined",
            JsValue::Null => "object", // historical quirk
            JsValue::Boolean(_) => "boolean",
            JsValue::Number(_) => "number",
            JsValue::String(_) => "string",
            JsValue::Symbol(_) => "symbol",
            JsValue::Object(_) => {
                if self.is_callable() {
                    "function"
                } else {
                    "object"
                }
            }
        }
    }

    /// Convert to boolean (ToBoolean)
    pub fn to_boolean(&self) -> bool {
        match self {
            JsValue::Undefined | JsValue::Null => false,
            JsValue::Boolean(b) => *b,
            JsValue::Number(n) => *n != 0.0 && !n.is_nan(),
            JsValue::String(s) => !s.is_empty(),
            JsValue::Symbol(_) => true,
            JsValue::Object(_) => true,
        }
    }

    /// Convert to string (ToString, primitives only; objects render as a tag)
    pub fn to_js_string(&self) -> JsString {
        match self {
            JsValue::Undefined => JsString::from("undefined"),
            JsValue::Null => JsString::from("null"),
            JsValue::Boolean(true) => JsString::from("true"),
            JsValue::Boolean(false) => JsString::from("false"),
            JsValue::Number(n) => {
                if n.is_nan() {
                    JsString::from("NaN")
                } else if n.is_infinite() {
                    if *n > 0.0 {
                        JsString::from("Infinity")
                    } else {
                        JsString::from("-Infinity")
                    }
                } else if *n == 0.0 {
                    JsString::from("0")
                } else {
                    JsString::from(n.to_string())
                }
            }
            JsValue::String(s) => s.cheap_clone(),
            JsValue::Symbol(s) => match &s.description {
                Some(desc) => JsString::from(format!("Symbol({})", desc)),
                None => JsString::from("Symbol()"),
            },
            JsValue::Object(_) => JsString::from("[object Object]"),
        }
    }

    /// Strict equality (===): identity for objects, value for primitives,
    /// NaN unequal to itself
    pub fn strict_equals(&self, other: &JsValue) -> bool {
        match (self, other) {
            (JsValue::Undefined, JsValue::Undefined) => true,
            (JsValue::Null, JsValue::Null) => true,
            (JsValue::Boolean(a), JsValue::Boolean(b)) => a == b,
            (JsValue::Number(a), JsValue::Number(b)) => {
                if a.is_nan() || b.is_nan() {
                    false
                } else {
                    a == b
                }
            }
            (JsValue::String(a), JsValue::String(b)) => a == b,
            (JsValue::Symbol(a), JsValue::Symbol(b)) => a == b,
            (JsValue::Object(a), JsValue::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// SameValue: like strict equality except NaN equals NaN and +0 and -0
    /// are distinguished. This is the identity-level comparison the invariant
    /// checks use; it is never coercive.
    pub fn same_value(&self, other: &JsValue) -> bool {
        match (self, other) {
            (JsValue::Number(a), JsValue::Number(b)) => {
                if a.is_nan() && b.is_nan() {
                    true
                } else {
                    a == b && a.is_sign_positive() == b.is_sign_positive()
                }
            }
            _ => self.strict_equals(other),
        }
    }
}

impl fmt::Debug for JsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsValue::Undefined => write!(f, "undefined"),
            JsValue::Null => write!(f, "null"),
            JsValue::Boolean(b) => write!(f, "{}", b),
            JsValue::Number(n) => write!(f, "{}", n),
            JsValue::String(s) => write!(f, "\"{}\"", s.as_str()),
            JsValue::Symbol(s) => match &s.description {
                Some(desc) => write!(f, "Symbol({})", desc),
                None => write!(f, "Symbol()"),
            },
            JsValue::Object(obj) => match &obj.borrow().exotic {
                Exotic::Ordinary => write!(f, "{{...}}"),
                Exotic::Array { .. } => write!(f, "[...]"),
                Exotic::Function(func) => write!(f, "[Function: {}]", func.name),
                Exotic::RegExp { source, flags } => write!(f, "/{}/{}", source, flags),
                Exotic::Proxy(_) => write!(f, "[object Proxy]"),
            },
        }
    }
}

impl PartialEq for JsValue {
    fn eq(&self, other: &Self) -> bool {
        self.strict_equals(other)
    }
}

impl From<bool> for JsValue {
    fn from(b: bool) -> Self {
        JsValue::Boolean(b)
    }
}

impl From<f64> for JsValue {
    fn from(n: f64) -> Self {
        JsValue::Number(n)
    }
}

impl From<i32> for JsValue {
    fn from(n: i32) -> Self {
        JsValue::Number(n as f64)
    }
}

impl From<&str> for JsValue {
    fn from(s: &str) -> Self {
        JsValue::String(JsString::from(s))
    }
}

impl From<String> for JsValue {
    fn from(s: String) -> Self {
        JsValue::String(JsString::from(s))
    }
}

impl From<JsString> for JsValue {
    fn from(s: JsString) -> Self {
        JsValue::String(s)
    }
}

impl From<JsObjectRef> for JsValue {
    fn from(obj: JsObjectRef) -> Self {
        JsValue::Object(obj)
    }
}

/// Reference-counted string for efficient string handling
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct JsString(Rc<str>);

impl CheapClone for JsString {}

impl JsString {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn parse<F: std::str::FromStr>(&self) -> Result<F, F::Err> {
        self.0.parse()
    }
}

impl AsRef<str> for JsString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for JsString {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for JsString {
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl PartialEq<&str> for JsString {
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

impl From<&str> for JsString {
    fn from(s: &str) -> Self {
        JsString(s.into())
    }
}

impl From<String> for JsString {
    fn from(s: String) -> Self {
        JsString(s.into())
    }
}

impl fmt::Debug for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.0)
    }
}

impl fmt::Display for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique symbol primitive, usable as a property key
#[derive(Clone, Debug)]
pub struct JsSymbol {
    id: u64,
    pub description: Option<String>,
}

thread_local! {
    static NEXT_SYMBOL_ID: std::cell::Cell<u64> = const { std::cell::Cell::new(1) };
}

impl JsSymbol {
    /// Create a fresh symbol, unique within this thread's runtime
    pub fn new(description: Option<String>) -> Self {
        let id = NEXT_SYMBOL_ID.with(|next| {
            let id = next.get();
            next.set(id + 1);
            id
        });
        Self { id, description }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl PartialEq for JsSymbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for JsSymbol {}

impl std::hash::Hash for JsSymbol {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Reference to a heap object, shared with the embedding object system.
///
/// The dispatcher holds non-owning (reference-counted) handles; it never
/// assumes a target outlives a single trap call without revalidating the
/// slot it came from.
pub type JsObjectRef = Rc<RefCell<JsObject>>;

/// Property key (string, index, or symbol)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    String(JsString),
    Index(u32),
    Symbol(JsSymbol),
}

impl PropertyKey {
    pub fn from_value(value: &JsValue) -> Self {
        match value {
            JsValue::Number(n) => {
                let idx = *n as u32;
                if idx as f64 == *n && *n >= 0.0 {
                    PropertyKey::Index(idx)
                } else {
                    PropertyKey::String(value.to_js_string())
                }
            }
            JsValue::String(s) => PropertyKey::from(s.cheap_clone()),
            JsValue::Symbol(s) => PropertyKey::Symbol(s.clone()),
            _ => PropertyKey::String(value.to_js_string()),
        }
    }

    /// The value form of this key, as passed to script trap functions
    /// (indexes are stringified, symbols pass through)
    pub fn to_value(&self) -> JsValue {
        match self {
            PropertyKey::String(s) => JsValue::String(s.cheap_clone()),
            PropertyKey::Index(i) => JsValue::String(JsString::from(i.to_string())),
            PropertyKey::Symbol(s) => JsValue::Symbol(s.clone()),
        }
    }

    pub fn is_symbol(&self) -> bool {
        matches!(self, PropertyKey::Symbol(_))
    }

    /// Check if this key equals a string literal (avoids allocation)
    #[inline]
    pub fn eq_str(&self, s: &str) -> bool {
        match self {
            PropertyKey::String(js_str) => js_str.as_str() == s,
            PropertyKey::Index(_) | PropertyKey::Symbol(_) => false,
        }
    }
}

impl From<&str> for PropertyKey {
    #[inline]
    fn from(s: &str) -> Self {
        // Fast path: check first char is a digit before parsing
        if let Some(first) = s.bytes().next()
            && first.is_ascii_digit()
            && let Ok(idx) = s.parse::<u32>()
            && idx.to_string() == s
        {
            return PropertyKey::Index(idx);
        }
        PropertyKey::String(JsString::from(s))
    }
}

impl From<String> for PropertyKey {
    fn from(s: String) -> Self {
        PropertyKey::from(s.as_str())
    }
}

impl From<JsString> for PropertyKey {
    #[inline]
    fn from(s: JsString) -> Self {
        if let Some(first) = s.as_str().bytes().next()
            && first.is_ascii_digit()
            && let Ok(idx) = s.parse::<u32>()
            && idx.to_string() == s.as_str()
        {
            return PropertyKey::Index(idx);
        }
        PropertyKey::String(s)
    }
}

impl From<u32> for PropertyKey {
    fn from(idx: u32) -> Self {
        PropertyKey::Index(idx)
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::String(s) => write!(f, "{}", s),
            PropertyKey::Index(i) => write!(f, "{}", i),
            PropertyKey::Symbol(s) => match &s.description {
                Some(desc) => write!(f, "Symbol({})", desc),
                None => write!(f, "Symbol()"),
            },
        }
    }
}

/// Ordered own-property table
pub type PropertyMap = IndexMap<PropertyKey, PropertyDescriptor, FxBuildHasher>;

/// A heap object: prototype link, extensibility flag, ordered own
/// properties, and an exotic behavior tag
#[derive(Debug)]
pub struct JsObject {
    /// Prototype link
    pub prototype: Option<JsObjectRef>,
    /// Whether the object can have new properties added
    pub extensible: bool,
    /// Own properties, in insertion order
    pub properties: PropertyMap,
    /// Exotic object behavior
    pub exotic: Exotic,
}

impl JsObject {
    /// Create a new ordinary object
    pub fn new() -> Self {
        Self {
            prototype: None,
            extensible: true,
            properties: PropertyMap::default(),
            exotic: Exotic::Ordinary,
        }
    }

    /// Create a new ordinary object with a prototype
    pub fn with_prototype(prototype: JsObjectRef) -> Self {
        Self {
            prototype: Some(prototype),
            ..Self::new()
        }
    }

    /// Check if this object is callable
    pub fn is_callable(&self) -> bool {
        match &self.exotic {
            Exotic::Function(_) => true,
            Exotic::Proxy(data) => data.call.is_some(),
            _ => false,
        }
    }

    /// Get an own property
    pub fn get_own_property(&self, key: &PropertyKey) -> Option<&PropertyDescriptor> {
        self.properties.get(key)
    }

    /// Check if object has an own property
    pub fn has_own_property(&self, key: &PropertyKey) -> bool {
        self.properties.contains_key(key)
    }

    /// Own property keys in insertion order
    pub fn own_keys(&self) -> Vec<PropertyKey> {
        self.properties.keys().cloned().collect()
    }
}

impl Default for JsObject {
    fn default() -> Self {
        Self::new()
    }
}

/// Exotic object behavior
#[derive(Debug)]
pub enum Exotic {
    /// Ordinary object
    Ordinary,
    /// Array exotic object; indexed properties live in the property table
    Array { length: u32 },
    /// Host function exotic object
    Function(JsFunction),
    /// Inert regular-expression data; the core never evaluates patterns
    RegExp { source: JsString, flags: JsString },
    /// Proxy exotic object
    Proxy(ProxyData),
}

/// Coarse object classification used by class-sensitive callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EsClass {
    Object,
    Array,
    Function,
    RegExp,
}

impl EsClass {
    pub fn name(self) -> &'static str {
        match self {
            EsClass::Object => "Object",
            EsClass::Array => "Array",
            EsClass::Function => "Function",
            EsClass::RegExp => "RegExp",
        }
    }
}

/// Class of a non-proxy object. Proxies answer through their handler's
/// `object_class_is` trap instead.
pub fn class_of(obj: &JsObjectRef) -> EsClass {
    match &obj.borrow().exotic {
        Exotic::Array { .. } => EsClass::Array,
        Exotic::Function(_) => EsClass::Function,
        Exotic::RegExp { .. } => EsClass::RegExp,
        Exotic::Ordinary | Exotic::Proxy(_) => EsClass::Object,
    }
}

/// Host callable signature. Script-level trap functions are modelled as host
/// callables; a parser/evaluator is out of scope for this crate.
pub type NativeFn = Rc<dyn Fn(&mut Context, JsValue, &[JsValue]) -> Result<JsValue, JsError>>;

/// Host function wrapper
#[derive(Clone)]
pub struct JsFunction {
    pub name: JsString,
    pub func: NativeFn,
    pub arity: usize,
}

impl fmt::Debug for JsFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Object constructors
// ═══════════════════════════════════════════════════════════════════════════

/// Create a new ordinary object
pub fn new_object() -> JsObjectRef {
    Rc::new(RefCell::new(JsObject::new()))
}

/// Create a new ordinary object with a prototype
pub fn new_object_with_prototype(prototype: JsObjectRef) -> JsObjectRef {
    Rc::new(RefCell::new(JsObject::with_prototype(prototype)))
}

/// Create an array object from a list of element values
pub fn new_array(elements: Vec<JsValue>) -> JsObjectRef {
    let len = elements.len() as u32;
    let arr = Rc::new(RefCell::new(JsObject::new()));
    {
        let mut arr_ref = arr.borrow_mut();
        arr_ref.exotic = Exotic::Array { length: len };
        for (i, elem) in elements.into_iter().enumerate() {
            arr_ref
                .properties
                .insert(PropertyKey::Index(i as u32), PropertyDescriptor::data(elem));
        }
        arr_ref.properties.insert(
            PropertyKey::from("length"),
            PropertyDescriptor::data_with(JsValue::Number(len as f64), true, false, false),
        );
    }
    arr
}

/// Create a host function object
pub fn new_function(
    name: &str,
    arity: usize,
    func: impl Fn(&mut Context, JsValue, &[JsValue]) -> Result<JsValue, JsError> + 'static,
) -> JsObjectRef {
    let name = JsString::from(name);
    let f = Rc::new(RefCell::new(JsObject::new()));
    {
        let mut f_ref = f.borrow_mut();
        f_ref.exotic = Exotic::Function(JsFunction {
            name: name.cheap_clone(),
            func: Rc::new(func),
            arity,
        });
        f_ref.properties.insert(
            PropertyKey::from("length"),
            PropertyDescriptor::data_with(JsValue::Number(arity as f64), false, false, true),
        );
        f_ref.properties.insert(
            PropertyKey::from("name"),
            PropertyDescriptor::data_with(JsValue::String(name), false, false, true),
        );
    }
    f
}

/// Create an inert regexp object
pub fn new_regexp(source: &str, flags: &str) -> JsObjectRef {
    let re = Rc::new(RefCell::new(JsObject::new()));
    re.borrow_mut().exotic = Exotic::RegExp {
        source: JsString::from(source),
        flags: JsString::from(flags),
    };
    re
}

// ═══════════════════════════════════════════════════════════════════════════
// JSON interop
// ═══════════════════════════════════════════════════════════════════════════

impl JsValue {
    /// Build a value graph from JSON. Objects become ordinary objects with
    /// enumerable data properties, arrays become array objects.
    pub fn from_json(json: &serde_json::Value) -> Result<JsValue, JsError> {
        Ok(match json {
            serde_json::Value::Null => JsValue::Null,
            serde_json::Value::Bool(b) => JsValue::Boolean(*b),
            serde_json::Value::Number(n) => {
                let n = n
                    .as_f64()
                    .ok_or_else(|| JsError::invalid_argument("number out of range"))?;
                JsValue::Number(n)
            }
            serde_json::Value::String(s) => JsValue::String(JsString::from(s.as_str())),
            serde_json::Value::Array(items) => {
                let elements = items
                    .iter()
                    .map(JsValue::from_json)
                    .collect::<Result<Vec<_>, _>>()?;
                JsValue::Object(new_array(elements))
            }
            serde_json::Value::Object(map) => {
                let obj = new_object();
                {
                    let mut obj_ref = obj.borrow_mut();
                    for (name, value) in map {
                        obj_ref.properties.insert(
                            PropertyKey::from(name.as_str()),
                            PropertyDescriptor::data(JsValue::from_json(value)?),
                        );
                    }
                }
                JsValue::Object(obj)
            }
        })
    }

    /// Serialize a plain data value graph to JSON. Functions, proxies, and
    /// symbols have no JSON form and fail with a TypeError.
    pub fn to_json(&self) -> Result<serde_json::Value, JsError> {
        Ok(match self {
            JsValue::Undefined | JsValue::Null => serde_json::Value::Null,
            JsValue::Boolean(b) => serde_json::Value::Bool(*b),
            JsValue::Number(n) => {
                if n.fract() == 0.0 && *n >= i64::MIN as f64 && *n <= i64::MAX as f64 {
                    serde_json::Value::Number(serde_json::Number::from(*n as i64))
                } else {
                    serde_json::Number::from_f64(*n)
                        .map(serde_json::Value::Number)
                        .unwrap_or(serde_json::Value::Null)
                }
            }
            JsValue::String(s) => serde_json::Value::String(s.as_str().to_string()),
            JsValue::Symbol(_) => return Err(JsError::type_error("cannot serialize a symbol")),
            JsValue::Object(obj) => {
                let obj_ref = obj.borrow();
                match &obj_ref.exotic {
                    Exotic::Array { length } => {
                        let mut items = Vec::with_capacity(*length as usize);
                        for i in 0..*length {
                            let elem = obj_ref
                                .properties
                                .get(&PropertyKey::Index(i))
                                .map(|p| p.value.clone())
                                .unwrap_or(JsValue::Undefined);
                            items.push(elem.to_json()?);
                        }
                        serde_json::Value::Array(items)
                    }
                    Exotic::Ordinary => {
                        let mut map = serde_json::Map::new();
                        for (key, prop) in &obj_ref.properties {
                            if !prop.attrs.enumerable || prop.is_accessor() {
                                continue;
                            }
                            map.insert(key.to_string(), prop.value.to_json()?);
                        }
                        serde_json::Value::Object(map)
                    }
                    _ => {
                        return Err(JsError::type_error(
                            "cannot serialize a function, regexp, or proxy",
                        ));
                    }
                }
            }
        })
    }
}
