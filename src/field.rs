//! Tracked fields: backing storage and field keys.
//!
//! A tracked field is a [`Tracked<T>`] slot inside a [`Trackable`] struct,
//! plus a [`Field`] key that knows the field's name and how to reach the
//! slot. Writing through the key compares the old and new value and touches
//! the store only on a real change.
//!
//! [`tracked_fields!`](crate::tracked_fields) declares the keys and accessor
//! pairs for a type in one place:
//!
//! ```ignore
//! struct Counter {
//!     tracking: Tracking<Counter>,
//!     count: Tracked<i64>,
//! }
//!
//! tracked_fields! {
//!     Counter {
//!         pub count / set_count: i64 => COUNT;
//!     }
//! }
//!
//! counter.set_count(1);                   // notifies
//! counter.set_count(1);                   // same value, nothing happens
//! silent_set(&*counter, Counter::COUNT, 6); // writes, never notifies
//! ```

use crate::equality::Classify;
use crate::tracking::Trackable;
use std::cell::RefCell;
use std::fmt;

/// Backing storage of one tracked field.
///
/// Each declared field gets its own slot, so two fields can never alias.
/// The slot itself never notifies; writes go through a [`Field`] key.
#[derive(Default)]
pub struct Tracked<T> {
    value: RefCell<T>,
}

impl<T> Tracked<T> {
    /// Slot holding `value`.
    pub const fn new(value: T) -> Self {
        Self {
            value: RefCell::new(value),
        }
    }

    /// Clone of the current value.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.value.borrow().clone()
    }

    /// Borrow the current value.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.value.borrow())
    }

    /// Write without comparing or notifying. Returns the previous value.
    pub fn replace(&self, value: T) -> T {
        self.value.replace(value)
    }

    /// Write only if `value` differs from the current value.
    fn replace_if_changed(&self, value: T) -> bool
    where
        T: Classify,
    {
        if self.value.borrow().same_value(&value) {
            return false;
        }
        *self.value.borrow_mut() = value;
        true
    }

    /// Consume the slot, returning its value.
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T: fmt::Debug> fmt::Debug for Tracked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value.try_borrow() {
            Ok(value) => f.debug_tuple("Tracked").field(&*value).finish(),
            Err(_) => f.write_str("Tracked(<borrowed>)"),
        }
    }
}

/// Key of a tracked field of `S` holding a `T`.
///
/// Keys are plain constants, usually generated by
/// [`tracked_fields!`](crate::tracked_fields).
pub struct Field<S: ?Sized, T> {
    name: &'static str,
    slot: fn(&S) -> &Tracked<T>,
}

impl<S: ?Sized, T> Clone for Field<S, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: ?Sized, T> Copy for Field<S, T> {}

impl<S: ?Sized, T> Field<S, T> {
    /// Key named `name` whose storage `slot` returns.
    pub const fn new(name: &'static str, slot: fn(&S) -> &Tracked<T>) -> Self {
        Self { name, slot }
    }

    /// Declared field name, used in log events.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Backing slot of this field on `instance`.
    pub fn slot<'a>(&self, instance: &'a S) -> &'a Tracked<T> {
        (self.slot)(instance)
    }
}

impl<S: Trackable + ?Sized, T: Classify> Field<S, T> {
    /// Current value on `instance`.
    pub fn get(&self, instance: &S) -> T
    where
        T: Clone,
    {
        self.slot(instance).get()
    }

    /// Borrow the current value on `instance`.
    pub fn with<R>(&self, instance: &S, f: impl FnOnce(&T) -> R) -> R {
        self.slot(instance).with(f)
    }

    /// The tracked write.
    ///
    /// If `value` is the same value as the current one the call does nothing
    /// at all: the slot is not written and nobody is notified. Otherwise the
    /// value is stored and, unless the store is disabled, `instance` is
    /// touched. Returns whether the value changed.
    pub fn set(&self, instance: &S, value: T) -> bool {
        if !self.slot(instance).replace_if_changed(value) {
            cov_mark::hit!(unchanged_write_skipped);
            tracing::trace!(field = self.name, "same value, write skipped");
            return false;
        }
        if instance.is_tracking_enabled() {
            instance.touch();
        } else {
            tracing::trace!(field = self.name, "tracking disabled, change not published");
        }
        true
    }

    /// Tracked write of a value derived from the current one.
    pub fn update(&self, instance: &S, f: impl FnOnce(&T) -> T) -> bool {
        let next = self.with(instance, f);
        self.set(instance, next)
    }

    /// Write without comparing and without notifying. Returns the previous
    /// value.
    pub fn set_silent(&self, instance: &S, value: T) -> T {
        self.slot(instance).replace(value)
    }
}

impl<S: ?Sized, T> fmt::Debug for Field<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Field").field(&self.name).finish()
    }
}

/// Write a tracked field of `instance` without comparison or notification.
///
/// Returns the previous value. Pair with [`trigger_update`](crate::trigger_update)
/// to publish a forced value once.
pub fn silent_set<S, T>(instance: &S, field: Field<S, T>, value: T) -> T
where
    S: Trackable + ?Sized,
    T: Classify,
{
    field.set_silent(instance, value)
}

/// Declare the tracked fields of a [`Trackable`] type.
///
/// For every `name / setter: Type => KEY;` line this emits, on the type:
/// - `const KEY: Field<Self, Type>`, the field key;
/// - `fn name(&self) -> Type`, the getter (`Type: Clone`);
/// - `fn setter(&self, value: Type) -> bool`, the tracked setter.
///
/// The struct must have a `name: Tracked<Type>` field for each line.
///
/// ```ignore
/// tracked_fields! {
///     DoubleCounter {
///         pub count / set_count: i64 => COUNT;
///         pub count2 / set_count2: i64 => COUNT2;
///     }
/// }
/// ```
///
/// Declaring a name twice is rejected when the type is compiled:
///
/// ```compile_fail
/// use autotrack::{Link, Trackable, Tracked, Tracking, tracked_fields};
///
/// struct Twice {
///     tracking: Tracking<Twice>,
///     count: Tracked<i64>,
/// }
///
/// impl Trackable for Twice {
///     type Root = Twice;
///     fn link(&self) -> Link<'_, Twice> {
///         Link::Root(&self.tracking)
///     }
/// }
///
/// tracked_fields! {
///     Twice {
///         count / set_count: i64 => COUNT;
///         count / set_other: i64 => OTHER;
///     }
/// }
/// ```
#[macro_export]
macro_rules! tracked_fields {
    (
        $ty:ty {
            $(
                $(#[$meta:meta])*
                $vis:vis $field:ident / $setter:ident : $fty:ty => $key:ident;
            )+
        }
    ) => {
        #[allow(dead_code)]
        impl $ty {
            $(
                #[doc = concat!("Key of the tracked `", stringify!($field), "` field.")]
                $vis const $key: $crate::Field<$ty, $fty> =
                    $crate::Field::<$ty, $fty>::new(stringify!($field), |this| &this.$field);

                #[doc = concat!("Current `", stringify!($field), "`.")]
                $(#[$meta])*
                $vis fn $field(&self) -> $fty {
                    Self::$key.get(self)
                }

                #[doc = concat!("Tracked write of `", stringify!($field), "`. Returns whether it changed.")]
                $vis fn $setter(&self, value: $fty) -> bool {
                    Self::$key.set(self, value)
                }
            )+
        }
    };
}
