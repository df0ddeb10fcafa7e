//! The equality oracle used to suppress redundant notifications.
//!
//! [`equals`] is the full comparison over dynamic [`Value`]s. The
//! [`Classify`] trait carries the same rules over to the ordinary Rust types
//! that tracked fields usually hold, so a `Tracked<i64>` and a
//! `Tracked<Value>` decide "did this write change anything" the same way.

use crate::hash::FastHashSet;
use crate::value::{TypeTag, Value};
use std::rc::Rc;
use std::time::SystemTime;

/// How two values are compared.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Comparison {
    /// Type tags must match, then values compare by the per-tag rule.
    #[default]
    Strict,
    /// Loose, coercing comparison. No tag check.
    Weak,
}

/// Returns the semantic type tag of `value`.
pub fn classify<T: Classify + ?Sized>(value: &T) -> TypeTag {
    value.classify()
}

/// Compares two dynamic values.
///
/// Under [`Comparison::Strict`]:
/// - values with different tags are never equal;
/// - `Bool`, `Number`, `String` compare by value (`NaN` is not equal to itself);
/// - `Function`, `RegExp`, `Error`, `Object` compare by identity, so two
///   distinct objects with the same entries are *not* equal;
/// - `Date` compares the instant;
/// - `Array` and `List` compare length, then every element pair in order.
///
/// An array that (directly or not) contains itself terminates: a pair of
/// arrays already being compared further up the walk is assumed equal.
///
/// Under [`Comparison::Weak`] see [`loose_eq`].
pub fn equals(a: &Value, b: &Value, comparison: Comparison) -> bool {
    match comparison {
        Comparison::Weak => loose_eq(a, b),
        Comparison::Strict => StrictEq::default().eq(a, b),
    }
}

/// Loose equality with a small coercion table:
///
/// | left            | right    | rule                                  |
/// |-----------------|----------|---------------------------------------|
/// | null/undefined  | null/undefined | equal                           |
/// | null/undefined  | other    | not equal                             |
/// | boolean         | any      | boolean becomes `0`/`1`, compare again|
/// | number          | string   | string parsed as a number             |
/// | date            | number   | timestamp compared to the number      |
/// | same tag        | same tag | strict rule                           |
///
/// Anything else is not equal.
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    use Value::*;

    match (a, b) {
        (Undefined | Null, Undefined | Null) => true,
        (Undefined | Null, _) | (_, Undefined | Null) => false,
        (Bool(x), Bool(y)) => x == y,
        (Bool(flag), other) | (other, Bool(flag)) => {
            loose_eq(&Number(if *flag { 1.0 } else { 0.0 }), other)
        }
        (Number(n), String(s)) | (String(s), Number(n)) => parse_number(s) == *n,
        (Date(t), Number(n)) | (Number(n), Date(t)) => t == n,
        _ => a.type_tag() == b.type_tag() && StrictEq::default().eq(a, b),
    }
}

/// String to number the way loose comparison expects: surrounding
/// whitespace is ignored, the empty string is zero, `0x` prefixes are hex,
/// and anything unparseable is `NaN`.
fn parse_number(s: &str) -> f64 {
    let s = s.trim();
    if s.is_empty() {
        return 0.0;
    }
    match s {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).map_or(f64::NAN, |v| v as f64);
    }
    // Rust accepts "inf"/"nan" spellings that are not numbers here.
    if s.bytes().any(|c| c.is_ascii_alphabetic() && c != b'e' && c != b'E') {
        return f64::NAN;
    }
    s.parse().unwrap_or(f64::NAN)
}

/// Strict comparison walk. Holds the array pairs currently being compared.
#[derive(Default)]
struct StrictEq {
    in_progress: FastHashSet<(usize, usize)>,
}

impl StrictEq {
    fn eq(&mut self, a: &Value, b: &Value) -> bool {
        use Value::*;

        if a.type_tag() != b.type_tag() {
            return false;
        }
        match (a, b) {
            (Undefined, Undefined) | (Null, Null) => true,
            (Bool(x), Bool(y)) => x == y,
            (Number(x), Number(y)) | (Date(x), Date(y)) => x == y,
            (String(x), String(y)) => x == y,
            (Function(x), Function(y)) => Rc::ptr_eq(x, y),
            (RegExp(x), RegExp(y)) | (Error(x), Error(y)) => Rc::ptr_eq(x, y),
            (Object(x), Object(y)) => Rc::ptr_eq(x, y),
            (List(x), List(y)) => self.elements(x, y),
            (Array(x), Array(y)) => {
                let key = (Rc::as_ptr(x) as usize, Rc::as_ptr(y) as usize);
                if !self.in_progress.insert(key) {
                    cov_mark::hit!(cyclic_array_pair_revisited);
                    return true;
                }
                let equal = self.elements(&x.borrow(), &y.borrow());
                self.in_progress.remove(&key);
                equal
            }
            _ => false,
        }
    }

    fn elements(&mut self, a: &[Value], b: &[Value]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(l, r)| self.eq(l, r))
    }
}

/// Classification and same-value comparison for a type that can sit in a
/// tracked field.
///
/// `same_value` is the strict rule of [`equals`] restricted to `Self`: a
/// tracked write is dropped when it returns `true`.
pub trait Classify {
    /// Semantic type tag of `self`.
    fn classify(&self) -> TypeTag;

    /// Whether writing `other` over `self` would change nothing.
    fn same_value(&self, other: &Self) -> bool;
}

impl Classify for Value {
    fn classify(&self) -> TypeTag {
        self.type_tag()
    }

    fn same_value(&self, other: &Self) -> bool {
        equals(self, other, Comparison::Strict)
    }
}

macro_rules! classify_as_number {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Classify for $ty {
                fn classify(&self) -> TypeTag {
                    TypeTag::Number
                }

                #[allow(clippy::float_cmp)]
                fn same_value(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

classify_as_number!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);

impl Classify for bool {
    fn classify(&self) -> TypeTag {
        TypeTag::Boolean
    }

    fn same_value(&self, other: &Self) -> bool {
        self == other
    }
}

impl Classify for str {
    fn classify(&self) -> TypeTag {
        TypeTag::String
    }

    fn same_value(&self, other: &Self) -> bool {
        self == other
    }
}

impl Classify for String {
    fn classify(&self) -> TypeTag {
        TypeTag::String
    }

    fn same_value(&self, other: &Self) -> bool {
        self == other
    }
}

impl Classify for char {
    fn classify(&self) -> TypeTag {
        TypeTag::String
    }

    fn same_value(&self, other: &Self) -> bool {
        self == other
    }
}

impl Classify for () {
    fn classify(&self) -> TypeTag {
        TypeTag::Undefined
    }

    fn same_value(&self, _other: &Self) -> bool {
        true
    }
}

impl Classify for SystemTime {
    fn classify(&self) -> TypeTag {
        TypeTag::Date
    }

    fn same_value(&self, other: &Self) -> bool {
        self == other
    }
}

impl<T: Classify> Classify for Option<T> {
    fn classify(&self) -> TypeTag {
        self.as_ref().map_or(TypeTag::Null, Classify::classify)
    }

    fn same_value(&self, other: &Self) -> bool {
        match (self, other) {
            (None, None) => true,
            (Some(a), Some(b)) => a.same_value(b),
            _ => false,
        }
    }
}

/// Shared references are plain objects: same allocation or not equal.
impl<T> Classify for Rc<T> {
    fn classify(&self) -> TypeTag {
        TypeTag::Object
    }

    fn same_value(&self, other: &Self) -> bool {
        Rc::ptr_eq(self, other)
    }
}

/// Shared strings are strings: compared by contents, not by allocation.
impl Classify for Rc<str> {
    fn classify(&self) -> TypeTag {
        TypeTag::String
    }

    fn same_value(&self, other: &Self) -> bool {
        **self == **other
    }
}

impl<T: Classify + ?Sized> Classify for &T {
    fn classify(&self) -> TypeTag {
        (**self).classify()
    }

    fn same_value(&self, other: &Self) -> bool {
        (**self).same_value(other)
    }
}

impl<T: Classify> Classify for [T] {
    fn classify(&self) -> TypeTag {
        TypeTag::Array
    }

    fn same_value(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other).all(|(a, b)| a.same_value(b))
    }
}

impl<T: Classify, const N: usize> Classify for [T; N] {
    fn classify(&self) -> TypeTag {
        TypeTag::Array
    }

    fn same_value(&self, other: &Self) -> bool {
        self.as_slice().same_value(other.as_slice())
    }
}

impl<T: Classify> Classify for Vec<T> {
    fn classify(&self) -> TypeTag {
        TypeTag::Array
    }

    fn same_value(&self, other: &Self) -> bool {
        self.as_slice().same_value(other.as_slice())
    }
}

impl<T: Classify> Classify for Box<[T]> {
    fn classify(&self) -> TypeTag {
        TypeTag::Array
    }

    fn same_value(&self, other: &Self) -> bool {
        (**self).same_value(&**other)
    }
}
