#![deny(missing_docs)]

//! Property tracking for plain Rust objects.
//!
//! Mark fields of a struct as tracked and every real change to one of them
//! notifies the subscribers of the object's store, with the object itself
//! as the payload. Nested objects can hand their notifications to an owner,
//! so a change deep in a graph publishes the top-level instance.
//!
//! # Quick Start
//!
//! ```ignore
//! use autotrack::{Link, Trackable, Tracked, Tracking, get_store, tracked_fields};
//! use std::rc::Rc;
//!
//! struct Counter {
//!     tracking: Tracking<Counter>,
//!     count: Tracked<i64>,
//! }
//!
//! impl Trackable for Counter {
//!     type Root = Counter;
//!     fn link(&self) -> Link<'_, Counter> {
//!         Link::Root(&self.tracking)
//!     }
//! }
//!
//! tracked_fields! {
//!     Counter {
//!         pub count / set_count: i64 => COUNT;
//!     }
//! }
//!
//! let counter = Rc::new_cyclic(|this| Counter {
//!     tracking: Tracking::new(this.clone()),
//!     count: Tracked::new(0),
//! });
//!
//! let _sub = get_store(&*counter)?.subscribe(|c| println!("count = {}", c.count()));
//! // prints "count = 0"
//! counter.set_count(1); // prints "count = 1"
//! counter.set_count(1); // same value, nothing printed
//! ```
//!
//! # Core Types
//!
//! - [`Trackable`] - Capability of a type that publishes through a store.
//! - [`Tracking`] - Store state embedded in a root instance.
//! - [`Delegation`] - Owner slot of a nested instance.
//! - [`Tracked`] / [`Field`] - Storage and key of a tracked field.
//! - [`Store`] - Subscribable channel delivering the root instance.
//! - [`Writable`] - The underlying value-holding channel.
//!
//! # Writing
//!
//! ```ignore
//! counter.set_count(2);                        // tracked: notifies on change
//! silent_set(&*counter, Counter::COUNT, 5);    // never notifies
//! trigger_update(&*counter);                   // notifies unconditionally
//!
//! // Several writes, one notification
//! update_action(&*counter, |c| {
//!     Counter::COUNT.set_silent(c, 7);
//!     Counter::COUNT.set_silent(c, 8);
//! });
//! ```
//!
//! # Delivery control
//!
//! ```ignore
//! let store = get_store(&*counter)?;
//! store.disable();             // tracked writes stop notifying
//! store.enable();              // nothing is replayed
//!
//! let _quiet = store.suspend(); // disabled until the guard drops
//! ```
//!
//! # Equality
//!
//! ```ignore
//! equals(&Value::from(1), &Value::from("1"), Comparison::Strict); // false
//! equals(&Value::from(1), &Value::from("1"), Comparison::Weak);   // true
//! ```

// Internal modules
mod config;
mod equality;
mod error;
mod field;
mod hash;
mod store;
mod tracking;
mod value;
mod writable;

// Core types
pub use field::{Field, Tracked};
pub use store::{Store, SuspendGuard};
pub use tracking::{Delegation, Link, Trackable, Tracking};
pub use writable::{Subscription, Writable};

// Key functions
pub use field::silent_set;
pub use tracking::{get_store, trigger_update, try_update_action, update_action};

// Equality oracle
pub use equality::{Classify, Comparison, classify, equals, loose_eq};
pub use value::{NativeFn, TypeTag, Value};

pub use config::{DEFAULT_LABEL, StoreConfig};
pub use error::{Result, TrackError};
