use crate::config::StoreConfig;
use crate::error::{Result, TrackError};
use crate::store::Store;
use std::any::type_name;
use std::cell::{OnceCell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

/// Capability of a type whose tracked fields publish through a [`Store`].
///
/// Implementors only describe where their store lives via [`link`]:
/// either in an embedded [`Tracking`] (a root), or in an owner resolved at
/// call time (a delegate). Everything else is provided.
///
/// `Root` is the type subscribers receive. A root uses itself; a delegate
/// uses its owner's `Root`, so a mutation deep inside an object graph
/// publishes the top-level instance.
///
/// # Example
/// ```ignore
/// struct Owner {
///     tracking: Tracking<Owner>,
///     nested: Nested,
/// }
///
/// impl Trackable for Owner {
///     type Root = Owner;
///     fn link(&self) -> Link<'_, Owner> {
///         Link::Root(&self.tracking)
///     }
/// }
///
/// struct Nested {
///     owner: Delegation<Owner>,
///     count: Tracked<i64>,
/// }
///
/// impl Trackable for Nested {
///     type Root = Owner;
///     fn link(&self) -> Link<'_, Owner> {
///         self.owner.link()
///     }
/// }
/// ```
///
/// [`link`]: Trackable::link
pub trait Trackable {
    /// Type delivered to subscribers.
    type Root: 'static;

    /// Where this instance's store lives. Called on every store access and
    /// every touch; the result is never cached.
    fn link(&self) -> Link<'_, Self::Root>;

    /// The store of this instance, created on first use for a root.
    ///
    /// Repeated calls (and calls through any delegate of the same root)
    /// return the same store.
    fn store(&self) -> Result<Store<Self::Root>> {
        match self.link() {
            Link::Root(tracking) => tracking.store(),
            Link::Owner(Some(owner)) => owner.store(),
            Link::Owner(None) => Err(TrackError::Unowned {
                type_name: type_name::<Self>(),
            }),
        }
    }

    /// Ask the store to deliver the root instance again.
    ///
    /// A delegate without an owner ignores the request.
    fn touch(&self) {
        match self.link() {
            Link::Root(tracking) => tracking.touch(),
            Link::Owner(Some(owner)) => owner.touch(),
            Link::Owner(None) => {
                cov_mark::hit!(unowned_touch_ignored);
                tracing::trace!(delegate = type_name::<Self>(), "no owner, touch ignored");
            }
        }
    }

    /// Whether a changed tracked field should touch the store.
    fn is_tracking_enabled(&self) -> bool {
        match self.link() {
            Link::Root(tracking) => tracking.is_enabled(),
            Link::Owner(Some(owner)) => owner.is_tracking_enabled(),
            Link::Owner(None) => false,
        }
    }
}

/// Resolution of a [`Trackable`]'s store, see [`Trackable::link`].
pub enum Link<'a, R: 'static> {
    /// The instance owns its store.
    Root(&'a Tracking<R>),
    /// The instance forwards to this owner; `None` while it has none.
    Owner(Option<Rc<dyn Trackable<Root = R>>>),
}

impl<R: 'static> Link<'_, R> {
    /// Forward to `owner`.
    pub fn owner<O>(owner: &Rc<O>) -> Self
    where
        O: Trackable<Root = R> + 'static,
    {
        Link::Owner(Some(Rc::clone(owner) as Rc<dyn Trackable<Root = R>>))
    }

    /// Forward to `owner` if it is still alive.
    pub fn weak_owner<O>(owner: &Weak<O>) -> Self
    where
        O: Trackable<Root = R> + 'static,
    {
        Link::Owner(owner.upgrade().map(|o| o as Rc<dyn Trackable<Root = R>>))
    }
}

/// Store state embedded in a root trackable.
///
/// It holds a `Weak` back to the instance it is embedded in, which is what
/// the store publishes. Build the instance with [`Rc::new_cyclic`]:
///
/// ```ignore
/// let counter = Rc::new_cyclic(|this| Counter {
///     tracking: Tracking::new(this.clone()),
///     count: Tracked::new(0),
/// });
/// ```
///
/// The store itself is created lazily on the first [`store`](Self::store)
/// call and keeps its identity afterwards.
pub struct Tracking<T: 'static> {
    this: Weak<T>,
    store: OnceCell<Store<T>>,
    config: StoreConfig,
}

impl<T: 'static> Tracking<T> {
    /// Tracking for the instance behind `this`, with default settings.
    pub fn new(this: Weak<T>) -> Self {
        Self::with_config(this, StoreConfig::new())
    }

    /// Tracking for the instance behind `this`, configured by `config`.
    pub fn with_config(this: Weak<T>, config: StoreConfig) -> Self {
        Self {
            this,
            store: OnceCell::new(),
            config,
        }
    }

    /// Tracking that is not bound to any instance. Asking it for a store
    /// fails with [`TrackError::Detached`].
    pub fn detached() -> Self {
        Self::new(Weak::new())
    }

    /// The instance's store, created on first call.
    pub fn store(&self) -> Result<Store<T>> {
        if let Some(store) = self.store.get() {
            return Ok(store.clone());
        }
        if self.this.strong_count() == 0 {
            return Err(TrackError::Detached {
                type_name: type_name::<T>(),
            });
        }
        let store = self
            .store
            .get_or_init(|| Store::new(self.this.clone(), self.config));
        Ok(store.clone())
    }

    /// Deliver through the store if one exists. Without a store there is
    /// nobody subscribed, so there is nothing to do.
    pub fn touch(&self) {
        match self.store.get() {
            Some(store) => store.touch(),
            None => tracing::trace!(store = self.config.label, "no store yet, touch skipped"),
        }
    }

    /// Whether changes are published. Before the store exists this is the
    /// configured initial state.
    pub fn is_enabled(&self) -> bool {
        self.store
            .get()
            .map_or(self.config.enabled, Store::is_enabled)
    }

    /// Whether the store has been created yet.
    pub fn has_store(&self) -> bool {
        self.store.get().is_some()
    }
}

impl<T: 'static> Default for Tracking<T> {
    fn default() -> Self {
        Self::detached()
    }
}

impl<T: 'static> fmt::Debug for Tracking<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracking")
            .field("attached", &(self.this.strong_count() > 0))
            .field("store", &self.store.get())
            .finish()
    }
}

/// Settable owner slot for a delegate.
///
/// The owner is held weakly, so a child does not keep its parent alive, and
/// can be set, replaced or cleared after construction.
pub struct Delegation<R: 'static> {
    owner: RefCell<Option<Weak<dyn Trackable<Root = R>>>>,
}

impl<R: 'static> Delegation<R> {
    /// A delegate with no owner yet.
    pub fn new() -> Self {
        Self {
            owner: RefCell::new(None),
        }
    }

    /// A delegate forwarding to `owner`.
    pub fn owned_by<O>(owner: &Rc<O>) -> Self
    where
        O: Trackable<Root = R> + 'static,
    {
        Self::from_weak(Rc::downgrade(owner))
    }

    /// Useful inside the owner's `Rc::new_cyclic`, where only a `Weak` to
    /// it exists yet.
    pub fn from_weak<O>(owner: Weak<O>) -> Self
    where
        O: Trackable<Root = R> + 'static,
    {
        Self {
            owner: RefCell::new(Some(owner as Weak<dyn Trackable<Root = R>>)),
        }
    }

    /// Forward to `owner` from now on.
    pub fn set_owner<O>(&self, owner: &Rc<O>)
    where
        O: Trackable<Root = R> + 'static,
    {
        let owner = Rc::downgrade(owner) as Weak<dyn Trackable<Root = R>>;
        *self.owner.borrow_mut() = Some(owner);
    }

    /// Drop the owner. The delegate is unowned until the next `set_owner`.
    pub fn clear_owner(&self) {
        self.owner.borrow_mut().take();
    }

    /// Current owner, if set and still alive.
    pub fn owner(&self) -> Option<Rc<dyn Trackable<Root = R>>> {
        self.owner.borrow().as_ref().and_then(Weak::upgrade)
    }

    /// Link to the current owner, for [`Trackable::link`].
    pub fn link(&self) -> Link<'_, R> {
        Link::Owner(self.owner())
    }
}

impl<R: 'static> Default for Delegation<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: 'static> fmt::Debug for Delegation<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delegation")
            .field("owned", &self.owner().is_some())
            .finish()
    }
}

/// Store of any trackable instance, resolved through delegation.
pub fn get_store<S: Trackable + ?Sized>(instance: &S) -> Result<Store<S::Root>> {
    instance.store()
}

/// Deliver the instance's root to its subscribers even if nothing changed.
pub fn trigger_update<S: Trackable + ?Sized>(instance: &S) {
    instance.touch();
}

/// Run `body`, then touch `instance` exactly once.
///
/// Lets a method apply several silent writes (or mutate untracked state)
/// and publish a single notification for all of them. A panic in `body`
/// propagates and skips the touch.
///
/// ```ignore
/// impl DoubleCounter {
///     fn increment_both(&self) {
///         update_action(self, |this| {
///             this.count.set_silent(this.count() + 1);
///             this.count2.set_silent(this.count2() + 1);
///         });
///     }
/// }
/// ```
pub fn update_action<S, R>(instance: &S, body: impl FnOnce(&S) -> R) -> R
where
    S: Trackable + ?Sized,
{
    let result = body(instance);
    instance.touch();
    result
}

/// [`update_action`] for fallible bodies: an `Err` is returned without
/// touching.
pub fn try_update_action<S, T, E>(
    instance: &S,
    body: impl FnOnce(&S) -> std::result::Result<T, E>,
) -> std::result::Result<T, E>
where
    S: Trackable + ?Sized,
{
    let value = body(instance)?;
    instance.touch();
    Ok(value)
}
