use crate::config::StoreConfig;
use crate::writable::{Subscription, Writable};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

/// Subscribable channel that publishes a tracked instance.
///
/// The payload is the instance itself (an `Rc`), never a copy: state lives
/// in the instance's fields and subscribers read it from there. The root
/// that owns the store is held weakly, so the store does not keep it alive;
/// any other instance handed to [`set`](Store::set) or
/// [`update`](Store::update) is held strongly for as long as it is the
/// payload.
///
/// A store is shared by everything that delegates to the same root, and
/// clones of a `Store` are the same store (see [`Store::ptr_eq`]).
///
/// # Example
/// ```ignore
/// let counter = Counter::new();
/// let store = get_store(&*counter)?;
///
/// let _sub = store.subscribe(|c: &Rc<Counter>| println!("count = {}", c.count()));
/// counter.increment();       // prints "count = 1"
///
/// store.disable();
/// counter.increment();       // nothing printed
/// store.enable();
/// store.touch();             // prints "count = 2"
/// ```
pub struct Store<R: 'static> {
    inner: Rc<StoreInner<R>>,
}

struct StoreInner<R: 'static> {
    writable: Writable<Weak<R>>,
    /// The instance that owns this store.
    root: Weak<R>,
    /// Strong handle on the payload while it is not the root.
    pinned: RefCell<Option<Rc<R>>>,
    enabled: Cell<bool>,
    config: StoreConfig,
}

impl<R: 'static> Clone for Store<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<R: 'static> Store<R> {
    pub(crate) fn new(instance: Weak<R>, config: StoreConfig) -> Self {
        tracing::debug!(store = config.label, enabled = config.enabled, "store created");
        Self {
            inner: Rc::new(StoreInner {
                writable: Writable::with_config(instance.clone(), config),
                root: instance,
                pinned: RefCell::new(None),
                enabled: Cell::new(config.enabled),
                config,
            }),
        }
    }

    /// Register `callback` and call it once right away with the current
    /// instance.
    ///
    /// Delivery ignores the enabled flag: a new subscriber always receives
    /// the current instance.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(&self, mut callback: impl FnMut(&Rc<R>) + 'static) -> Subscription {
        let label = self.inner.config.label;
        self.inner
            .writable
            .subscribe(move |instance: &Weak<R>| match instance.upgrade() {
                Some(instance) => callback(&instance),
                None => {
                    cov_mark::hit!(dropped_instance_not_delivered);
                    tracing::warn!(store = label, "instance dropped, nothing to deliver");
                }
            })
    }

    /// Compute the next payload from the current one and deliver it.
    ///
    /// Does nothing while the store is disabled; `producer` is not called.
    pub fn update(&self, producer: impl FnOnce(&Rc<R>) -> Rc<R>) {
        if !self.is_enabled() {
            cov_mark::hit!(update_while_disabled);
            tracing::trace!(store = self.label(), "store disabled, update dropped");
            return;
        }
        let Some(current) = self.current() else {
            tracing::warn!(store = self.label(), "instance dropped, update dropped");
            return;
        };
        let next = producer(&current);
        self.publish(next);
    }

    /// Deliver `value` as the new payload. Does nothing while disabled.
    pub fn set(&self, value: Rc<R>) {
        if !self.is_enabled() {
            cov_mark::hit!(update_while_disabled);
            tracing::trace!(store = self.label(), "store disabled, set dropped");
            return;
        }
        self.publish(value);
    }

    fn publish(&self, value: Rc<R>) {
        let weak = Rc::downgrade(&value);
        let pinned = if Weak::ptr_eq(&weak, &self.inner.root) {
            None
        } else {
            cov_mark::hit!(foreign_payload_pinned);
            Some(value)
        };
        let previous = self.inner.pinned.replace(pinned);
        self.inner.writable.set(weak);
        drop(previous);
    }

    /// Deliver the current payload again.
    pub fn touch(&self) {
        self.update(Rc::clone);
    }

    /// The instance currently published, if it is still alive.
    pub fn current(&self) -> Option<Rc<R>> {
        self.inner.writable.get().upgrade()
    }

    /// Resume delivery. Takes effect from the next update on; nothing that
    /// was dropped while disabled is replayed.
    pub fn enable(&self) {
        if !self.inner.enabled.replace(true) {
            tracing::debug!(store = self.label(), "delivery enabled");
        }
    }

    /// Stop delivery until [`enable`](Self::enable) is called.
    pub fn disable(&self) {
        if self.inner.enabled.replace(false) {
            tracing::debug!(store = self.label(), "delivery disabled");
        }
    }

    /// Whether updates are currently delivered.
    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.get()
    }

    /// Disable delivery until the returned guard is dropped.
    ///
    /// The guard restores whatever state the store had before, so suspending
    /// an already disabled store leaves it disabled. It also restores on
    /// unwind.
    ///
    /// ```ignore
    /// {
    ///     let _quiet = store.suspend();
    ///     counter.increment();
    ///     counter.increment();
    /// }
    /// store.touch(); // one delivery with both increments applied
    /// ```
    #[must_use = "delivery resumes as soon as the guard is dropped"]
    pub fn suspend(&self) -> SuspendGuard<R> {
        let was_enabled = self.is_enabled();
        self.disable();
        SuspendGuard {
            store: self.clone(),
            was_enabled,
        }
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.writable.subscriber_count()
    }

    /// Label attached to this store's log events.
    pub fn label(&self) -> &'static str {
        self.inner.config.label
    }

    /// Settings this store was built with.
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Whether `a` and `b` are the same store.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }
}

impl<R: 'static> fmt::Debug for Store<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("label", &self.label())
            .field("enabled", &self.is_enabled())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Keeps a store disabled while alive. See [`Store::suspend`].
pub struct SuspendGuard<R: 'static> {
    store: Store<R>,
    was_enabled: bool,
}

impl<R: 'static> Drop for SuspendGuard<R> {
    fn drop(&mut self) {
        if self.was_enabled {
            self.store.enable();
        }
    }
}
