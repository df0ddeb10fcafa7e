//! Minimal subscribable value, the primitive stores are built on.
//!
//! A [`Writable`] holds one value and a list of subscribers. It guarantees:
//! - a new subscriber is called once, immediately, with the current value;
//! - every `set`/`update` calls each subscriber once, in subscription order,
//!   before returning;
//! - a `set` issued from inside a subscriber is queued behind the round in
//!   progress instead of interleaving with it.

use crate::config::StoreConfig;
use crate::hash::FastHashBuilder;
use indexmap::IndexMap;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

type Callback<T> = Rc<RefCell<dyn FnMut(&T)>>;

struct WritableInner<T> {
    value: RefCell<T>,
    /// Insertion-ordered so delivery follows subscription order.
    subscribers: RefCell<IndexMap<u64, Callback<T>, FastHashBuilder>>,
    next_id: Cell<u64>,
    /// Deliveries waiting for the current round to finish.
    queue: RefCell<VecDeque<(u64, T)>>,
    flushing: Cell<bool>,
    config: StoreConfig,
}

/// Shared, subscribable value. Clones share the same value and subscribers.
pub struct Writable<T> {
    inner: Rc<WritableInner<T>>,
}

impl<T> Clone for Writable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + 'static> Writable<T> {
    /// Writable holding `value`, with default settings.
    pub fn new(value: T) -> Self {
        Self::with_config(value, StoreConfig::new())
    }

    /// Writable holding `value`, configured by `config`.
    pub fn with_config(value: T, config: StoreConfig) -> Self {
        Self {
            inner: Rc::new(WritableInner {
                value: RefCell::new(value),
                subscribers: RefCell::new(IndexMap::default()),
                next_id: Cell::new(0),
                queue: RefCell::new(VecDeque::new()),
                flushing: Cell::new(false),
                config,
            }),
        }
    }

    /// Register `callback` and call it right away with the current value.
    ///
    /// The returned [`Subscription`] removes the callback when dropped or
    /// when [`Subscription::unsubscribe`] is called.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(&self, callback: impl FnMut(&T) + 'static) -> Subscription {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);

        let callback: Callback<T> = Rc::new(RefCell::new(callback));
        self.inner
            .subscribers
            .borrow_mut()
            .insert(id, Rc::clone(&callback));

        let current = self.get();
        self.inner.deliver_first(id, &callback, &current);

        let weak: Weak<dyn Unsubscribe> = Rc::downgrade(&self.inner) as Weak<dyn Unsubscribe>;
        Subscription {
            target: Some((weak, id)),
        }
    }

    /// Replace the value and notify every subscriber.
    pub fn set(&self, value: T) {
        *self.inner.value.borrow_mut() = value.clone();
        {
            let subscribers = self.inner.subscribers.borrow();
            let mut queue = self.inner.queue.borrow_mut();
            queue.extend(subscribers.keys().map(|id| (*id, value.clone())));
        }
        tracing::trace!(
            store = self.inner.config.label,
            subscribers = self.subscriber_count(),
            "value set"
        );
        self.inner.flush();
    }

    /// Derive the next value from the current one, then [`set`](Self::set) it.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = f(&self.inner.value.borrow());
        self.set(next);
    }

    /// Current value.
    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }

    /// Whether both handles share the same value and subscribers.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }

    /// Settings this writable was built with.
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }
}

impl<T> WritableInner<T> {
    /// Drain the delivery queue unless an outer call is already draining it.
    fn flush(&self) {
        if self.flushing.replace(true) {
            cov_mark::hit!(reentrant_set_queued);
            return;
        }
        let _guard = FlushGuard { inner: self };

        loop {
            let next = self.queue.borrow_mut().pop_front();
            let Some((id, value)) = next else {
                break;
            };
            // The subscriber may have been removed by an earlier callback.
            let callback = self.subscribers.borrow().get(&id).cloned();
            if let Some(callback) = callback {
                self.call(id, &callback, &value);
            }
        }
    }

    /// First delivery to a new subscriber. Sets issued from inside it are
    /// queued and delivered once it returns.
    fn deliver_first(&self, id: u64, callback: &Callback<T>, value: &T) {
        if self.flushing.replace(true) {
            // An outer round drains whatever this call queues.
            self.call(id, callback, value);
            return;
        }
        {
            let _guard = FlushGuard { inner: self };
            self.call(id, callback, value);
        }
        self.flush();
    }

    fn call(&self, id: u64, callback: &Callback<T>, value: &T) {
        if !self.config.isolate_panics {
            (&mut *callback.borrow_mut())(value);
            return;
        }
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (&mut *callback.borrow_mut())(value)));
        if let Err(payload) = outcome {
            cov_mark::hit!(subscriber_panic_isolated);
            tracing::error!(
                store = self.config.label,
                subscriber = id,
                panic = panic_message(payload.as_ref()),
                "subscriber panicked, continuing delivery"
            );
        }
    }
}

/// Resets the flushing flag, also when a subscriber panic unwinds through
/// [`WritableInner::flush`]. Queued deliveries of an aborted round are
/// dropped so they do not leak into the next one.
struct FlushGuard<'a, T> {
    inner: &'a WritableInner<T>,
}

impl<T> Drop for FlushGuard<'_, T> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.inner.queue.borrow_mut().clear();
        }
        self.inner.flushing.set(false);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "<non-string panic payload>"
    }
}

/// Type-erased removal, so [`Subscription`] does not carry `T`.
trait Unsubscribe {
    fn remove(&self, id: u64) -> bool;

    fn contains(&self, id: u64) -> bool;
}

impl<T> Unsubscribe for WritableInner<T> {
    fn remove(&self, id: u64) -> bool {
        self.subscribers.borrow_mut().shift_remove(&id).is_some()
    }

    fn contains(&self, id: u64) -> bool {
        self.subscribers.borrow().contains_key(&id)
    }
}

/// Handle to one registered subscriber.
///
/// Dropping it unsubscribes. Use [`detach`](Subscription::detach) to keep the
/// subscriber alive for as long as the store itself.
pub struct Subscription {
    target: Option<(Weak<dyn Unsubscribe>, u64)>,
}

impl Subscription {
    /// Remove the subscriber. Other subscribers are unaffected.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    /// Keep the subscriber registered without holding the handle.
    pub fn detach(mut self) {
        self.target = None;
    }

    /// Whether the subscriber is still registered.
    pub fn is_active(&self) -> bool {
        self.target
            .as_ref()
            .and_then(|(store, id)| Some((store.upgrade()?, *id)))
            .is_some_and(|(store, id)| store.contains(id))
    }

    fn release(&mut self) {
        if let Some((store, id)) = self.target.take()
            && let Some(store) = store.upgrade()
        {
            store.remove(id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.target.as_ref().map(|(_, id)| *id))
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder<T: Clone + 'static>() -> (Rc<RefCell<Vec<T>>>, impl FnMut(&T) + 'static) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        (seen, move |v: &T| sink.borrow_mut().push(v.clone()))
    }

    #[test]
    fn subscribe_delivers_current_value_immediately() {
        let store = Writable::new(1);
        let (seen, cb) = recorder();
        let _sub = store.subscribe(cb);
        assert_eq!(*seen.borrow(), vec![1]);

        store.set(2);
        store.update(|v| v * 10);
        assert_eq!(*seen.borrow(), vec![1, 2, 20]);
        assert_eq!(store.get(), 20);
    }

    #[test]
    fn subscribers_run_in_registration_order() {
        let store = Writable::new(0);
        let order = Rc::new(RefCell::new(Vec::new()));
        let subs: Vec<_> = ["a", "b", "c"]
            .into_iter()
            .map(|name| {
                let order = Rc::clone(&order);
                store.subscribe(move |v: &i32| order.borrow_mut().push((name, *v)))
            })
            .collect();

        order.borrow_mut().clear();
        store.set(7);
        assert_eq!(*order.borrow(), vec![("a", 7), ("b", 7), ("c", 7)]);
        drop(subs);
    }

    #[test]
    fn unsubscribing_one_leaves_the_others() {
        let store = Writable::new(0);
        let (first, cb1) = recorder();
        let (second, cb2) = recorder();
        let sub1 = store.subscribe(cb1);
        let sub2 = store.subscribe(cb2);

        sub1.unsubscribe();
        store.set(5);

        assert_eq!(*first.borrow(), vec![0]);
        assert_eq!(*second.borrow(), vec![0, 5]);
        assert_eq!(store.subscriber_count(), 1);
        assert!(sub2.is_active());

        drop(sub2);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn detached_subscription_outlives_handle() {
        let store = Writable::new(0);
        let (seen, cb) = recorder();
        store.subscribe(cb).detach();
        store.set(3);
        assert_eq!(*seen.borrow(), vec![0, 3]);
        assert_eq!(store.subscriber_count(), 1);
    }

    #[test]
    fn set_from_inside_a_subscriber_is_queued() {
        cov_mark::check!(reentrant_set_queued);

        let store = Writable::new(0);
        let log = Rc::new(RefCell::new(Vec::new()));

        let inner_store = store.clone();
        let first_log = Rc::clone(&log);
        let _first = store.subscribe(move |v: &i32| {
            first_log.borrow_mut().push(("first", *v));
            if *v == 1 {
                inner_store.set(2);
            }
        });
        let second_log = Rc::clone(&log);
        let _second = store.subscribe(move |v: &i32| second_log.borrow_mut().push(("second", *v)));

        log.borrow_mut().clear();
        store.set(1);

        // The round for 1 completes before the round for 2 starts.
        assert_eq!(
            *log.borrow(),
            vec![("first", 1), ("second", 1), ("first", 2), ("second", 2)]
        );
        assert_eq!(store.get(), 2);
    }

    #[test]
    fn set_during_first_delivery_waits_for_it() {
        let store = Writable::with_config(5, StoreConfig::new().isolate_panics(false));
        let (seen, mut record) = recorder();
        let inner_store = store.clone();
        let _clamp = store.subscribe(move |v: &i32| {
            record(v);
            if *v > 3 {
                inner_store.set(3);
            }
        });

        assert_eq!(*seen.borrow(), vec![5, 3]);
        assert_eq!(store.get(), 3);
    }

    #[test]
    fn subscribe_inside_a_round_delivers_in_place() {
        let store = Writable::new(0);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let late: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

        let outer_store = store.clone();
        let outer_seen = Rc::clone(&seen);
        let late_slot = Rc::clone(&late);
        let _outer = store.subscribe(move |v: &i32| {
            if *v == 1 && late_slot.borrow().is_none() {
                let sink = Rc::clone(&outer_seen);
                let sub = outer_store.subscribe(move |v: &i32| sink.borrow_mut().push(*v));
                *late_slot.borrow_mut() = Some(sub);
            }
        });

        store.set(1);
        assert_eq!(*seen.borrow(), vec![1]);
        store.set(2);
        assert_eq!(*seen.borrow(), vec![1, 2]);
    }

    #[test]
    fn unsubscribe_during_delivery_skips_pending_call() {
        let store = Writable::new(0);
        let victim: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

        let victim_slot = Rc::clone(&victim);
        let _killer = store.subscribe(move |v: &i32| {
            if *v == 1 {
                victim_slot.borrow_mut().take();
            }
        });
        let (seen, cb) = recorder();
        *victim.borrow_mut() = Some(store.subscribe(cb));

        store.set(1);
        assert_eq!(*seen.borrow(), vec![0]);
    }

    #[tracing_test::traced_test]
    #[test]
    fn panicking_subscriber_is_isolated() {
        cov_mark::check!(subscriber_panic_isolated);

        let store = Writable::with_config(0, StoreConfig::new().label("isolated"));
        let _bad = store.subscribe(|v: &i32| {
            if *v > 0 {
                panic!("boom");
            }
        });
        let (seen, cb) = recorder();
        let _good = store.subscribe(cb);

        store.set(1);
        store.set(2);

        assert_eq!(*seen.borrow(), vec![0, 1, 2]);
        assert!(logs_contain("subscriber panicked"));
        assert!(logs_contain("boom"));
    }

    #[test]
    fn panic_propagates_when_not_isolated() {
        let store = Writable::with_config(0, StoreConfig::new().isolate_panics(false));
        let _bad = store.subscribe(|v: &i32| {
            if *v == 1 {
                panic!("boom");
            }
        });
        let (seen, cb) = recorder();
        let _good = store.subscribe(cb);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| store.set(1)));
        assert!(outcome.is_err());
        assert_eq!(*seen.borrow(), vec![0]);

        // Delivery state was restored: the next round reaches everyone.
        store.set(2);
        assert_eq!(*seen.borrow(), vec![0, 2]);
    }

    #[test]
    fn subscription_outliving_store_is_inert() {
        let store = Writable::new(0);
        let sub = store.subscribe(|_| {});
        assert!(sub.is_active());
        drop(store);
        assert!(!sub.is_active());
        sub.unsubscribe();
    }
}
