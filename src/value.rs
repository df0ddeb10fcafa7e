//! Dynamic values understood by the equality oracle.
//!
//! Tracked fields normally hold plain Rust types (see [`Classify`](crate::Classify)),
//! but a field can also hold a [`Value`] when its shape is only known at
//! runtime. `Value` is a closed set of shapes, each with a fixed [`TypeTag`].

use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Semantic type of a value, as seen by [`equals`](crate::equals).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeTag {
    /// No value.
    Undefined,
    /// Explicit absence.
    Null,
    /// Text.
    String,
    /// Any numeric type.
    Number,
    /// `true` or `false`.
    Boolean,
    /// Callable.
    Function,
    /// Shared mutable sequence.
    Array,
    /// Regular expression.
    RegExp,
    /// Point in time.
    Date,
    /// Read-only sequence that is not an array.
    ListLike,
    /// Error value.
    Error,
    /// Anything else; compared by identity.
    Object,
}

impl TypeTag {
    /// Lowercase name used in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            TypeTag::Undefined => "undefined",
            TypeTag::Null => "null",
            TypeTag::String => "string",
            TypeTag::Number => "number",
            TypeTag::Boolean => "boolean",
            TypeTag::Function => "function",
            TypeTag::Array => "array",
            TypeTag::RegExp => "regexp",
            TypeTag::Date => "date",
            TypeTag::ListLike => "list-like",
            TypeTag::Error => "error",
            TypeTag::Object => "object",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Callable stored in [`Value::Function`].
pub type NativeFn = dyn Fn(&[Value]) -> Value;

/// A dynamically shaped value.
///
/// Scalars (`Bool`, `Number`, `String`, `Date`) compare by value. `Function`,
/// `RegExp`, `Error` and `Object` are reference types and compare by `Rc`
/// identity. `Array` is shared and mutable (so it can end up containing
/// itself); `List` is a read-only list-like sequence. Both compare
/// element-wise.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    /// No value. The default.
    Undefined,
    /// Explicit absence.
    Null,
    /// A boolean.
    Bool(bool),
    /// A number. Integers are stored as `f64`.
    Number(f64),
    /// A string.
    String(Rc<str>),
    /// A callable, compared by identity.
    Function(Rc<NativeFn>),
    /// Shared, growable sequence. May contain itself.
    Array(Rc<RefCell<Vec<Value>>>),
    /// Pattern source.
    RegExp(Rc<str>),
    /// Milliseconds since the Unix epoch. `NaN` is an invalid date.
    Date(f64),
    /// Read-only sequence.
    List(Rc<[Value]>),
    /// Error message.
    Error(Rc<str>),
    /// Keyed entries in insertion order, compared by identity.
    Object(Rc<RefCell<IndexMap<String, Value>>>),
}

impl Value {
    /// Tag of this value. Every variant maps to exactly one tag.
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::Undefined => TypeTag::Undefined,
            Value::Null => TypeTag::Null,
            Value::Bool(_) => TypeTag::Boolean,
            Value::Number(_) => TypeTag::Number,
            Value::String(_) => TypeTag::String,
            Value::Function(_) => TypeTag::Function,
            Value::Array(_) => TypeTag::Array,
            Value::RegExp(_) => TypeTag::RegExp,
            Value::Date(_) => TypeTag::Date,
            Value::List(_) => TypeTag::ListLike,
            Value::Error(_) => TypeTag::Error,
            Value::Object(_) => TypeTag::Object,
        }
    }

    /// New `Array` holding `items`.
    pub fn array(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items.into_iter().collect())))
    }

    /// New `List` holding `items`.
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(items.into_iter().collect())
    }

    /// New `Object` with `entries`, keeping their order.
    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        let map = entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Value::Object(Rc::new(RefCell::new(map)))
    }

    /// Wrap a callable.
    pub fn function(f: impl Fn(&[Value]) -> Value + 'static) -> Self {
        Value::Function(Rc::new(f))
    }

    /// Regular expression from its pattern source.
    pub fn regexp(source: &str) -> Self {
        Value::RegExp(source.into())
    }

    /// Error carrying `message`.
    pub fn error(message: &str) -> Self {
        Value::Error(message.into())
    }

    /// Date from epoch milliseconds.
    pub fn date(millis: f64) -> Self {
        Value::Date(millis)
    }

    /// Appends to an `Array`. Returns `false` for any other variant.
    pub fn push(&self, item: Value) -> bool {
        match self {
            Value::Array(items) => {
                items.borrow_mut().push(item);
                true
            }
            _ => false,
        }
    }

    /// Number of elements of an `Array` or `List`.
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Array(items) => Some(items.borrow().len()),
            Value::List(items) => Some(items.len()),
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Function(func) => write!(f, "function@{:p}", Rc::as_ptr(func).cast::<()>()),
            // Arrays may be cyclic, so only the shape is printed.
            Value::Array(items) => match items.try_borrow() {
                Ok(items) => write!(f, "array({})", items.len()),
                Err(_) => f.write_str("array(..)"),
            },
            Value::RegExp(src) => write!(f, "/{src}/"),
            Value::Date(ms) => write!(f, "date({ms})"),
            Value::List(items) => f.debug_list().entries(items.iter()).finish(),
            Value::Error(msg) => write!(f, "error({msg:?})"),
            Value::Object(map) => write!(f, "object@{:p}", Rc::as_ptr(map)),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(f64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value.into())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }
}

impl From<SystemTime> for Value {
    fn from(time: SystemTime) -> Self {
        let millis = match time.duration_since(UNIX_EPOCH) {
            Ok(after) => after.as_secs_f64() * 1000.0,
            Err(before) => -(before.duration().as_secs_f64() * 1000.0),
        };
        Value::Date(millis)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}
