#![forbid(unsafe_code)]

//! Minimal host component model.
//!
//! A [`ComponentClass`] describes a kind of component and owns its two
//! lifecycle hooks: *on-activate* (run when an instance connects, before it
//! first renders) and *on-deactivate* (run after it is removed). An
//! [`Element`] is one live instance of a class, holding the component's
//! fields and the [`BindingScope`] its store bindings live in.
//!
//! Field access goes through the [`Component`] trait, so any struct can take
//! part without a derive or registration step.
//!
//! # Invariants
//!
//! 1. `connect()` runs the activate hook once per connection; calling it on a
//!    connected element is a no-op. `disconnect()` mirrors this.
//! 2. A class is marked activated as soon as any of its elements connects.
//! 3. Dropping the last handle of an element releases all of its bindings.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::reactive::{BindingScope, BindingState, FieldBinding};

static NEXT_ELEMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Field access contract for synchronized components.
///
/// `None` means the field is unset. A binding only seeds and tracks fields
/// that are unset when the component activates.
///
/// ```
/// # use storesync_runtime::component::Component;
/// #[derive(Default)]
/// struct Greeting {
///     name: Option<String>,
/// }
///
/// impl Component for Greeting {
///     type Value = String;
///
///     fn field(&self, name: &str) -> Option<String> {
///         match name {
///             "name" => self.name.clone(),
///             _ => None,
///         }
///     }
///
///     fn set_field(&mut self, name: &str, value: Option<String>) {
///         if name == "name" {
///             self.name = value;
///         }
///     }
/// }
/// ```
pub trait Component: 'static {
    /// Payload type shared with the store.
    type Value: Clone + PartialEq + 'static;

    /// Current local value of `name`.
    fn field(&self, name: &str) -> Option<Self::Value>;

    /// Assign the local value of `name`.
    fn set_field(&mut self, name: &str, value: Option<Self::Value>);
}

/// Lifecycle hook invoked with the element being (de)activated.
pub type Hook<C> = Rc<dyn Fn(&Element<C>)>;

struct LifecycleHooks<C: Component> {
    on_activate: Option<Hook<C>>,
    on_deactivate: Option<Hook<C>>,
}

/// A component definition with its lifecycle hooks.
pub struct ComponentClass<C: Component> {
    name: String,
    hooks: RefCell<LifecycleHooks<C>>,
    synced: RefCell<Vec<String>>,
    activated: Cell<bool>,
}

impl<C: Component> std::fmt::Debug for ComponentClass<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hooks = self.hooks.borrow();
        f.debug_struct("ComponentClass")
            .field("name", &self.name)
            .field("on_activate", &hooks.on_activate.is_some())
            .field("on_deactivate", &hooks.on_deactivate.is_some())
            .field("synced", &self.synced.borrow())
            .field("activated", &self.activated.get())
            .finish()
    }
}

impl<C: Component> ComponentClass<C> {
    /// Create a class with no hooks.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hooks: RefCell::new(LifecycleHooks {
                on_activate: None,
                on_deactivate: None,
            }),
            synced: RefCell::new(Vec::new()),
            activated: Cell::new(false),
        }
    }

    /// Set the class's own activate hook.
    #[must_use]
    pub fn on_activate(self, hook: impl Fn(&Element<C>) + 'static) -> Self {
        self.hooks.borrow_mut().on_activate = Some(Rc::new(hook));
        self
    }

    /// Set the class's own deactivate hook.
    #[must_use]
    pub fn on_deactivate(self, hook: impl Fn(&Element<C>) + 'static) -> Self {
        self.hooks.borrow_mut().on_deactivate = Some(Rc::new(hook));
        self
    }

    /// Wrap the class in an `Rc` so elements can share it.
    #[must_use]
    pub fn build(self) -> Rc<Self> {
        Rc::new(self)
    }

    /// Class name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether any instance of this class has connected.
    #[must_use]
    pub fn has_activated(&self) -> bool {
        self.activated.get()
    }

    /// Fields attached to the store through the declarator, in attach order.
    #[must_use]
    pub fn synced_fields(&self) -> Vec<String> {
        self.synced.borrow().clone()
    }

    /// Record `field` as synced. Returns `false` if it already was.
    pub(crate) fn claim_field(&self, field: &str) -> bool {
        let mut synced = self.synced.borrow_mut();
        if synced.iter().any(|f| f == field) {
            return false;
        }
        synced.push(field.to_owned());
        true
    }

    /// Replace the activate hook with one built from the previous hook.
    pub(crate) fn wrap_activate(&self, wrap: impl FnOnce(Option<Hook<C>>) -> Hook<C>) {
        let mut hooks = self.hooks.borrow_mut();
        let previous = hooks.on_activate.take();
        hooks.on_activate = Some(wrap(previous));
    }

    /// Replace the deactivate hook with one built from the previous hook.
    pub(crate) fn wrap_deactivate(&self, wrap: impl FnOnce(Option<Hook<C>>) -> Hook<C>) {
        let mut hooks = self.hooks.borrow_mut();
        let previous = hooks.on_deactivate.take();
        hooks.on_deactivate = Some(wrap(previous));
    }

    fn activate_hook(&self) -> Option<Hook<C>> {
        self.hooks.borrow().on_activate.clone()
    }

    fn deactivate_hook(&self) -> Option<Hook<C>> {
        self.hooks.borrow().on_deactivate.clone()
    }
}

struct ElementInner<C: Component> {
    id: u64,
    class: Rc<ComponentClass<C>>,
    props: RefCell<C>,
    bindings: RefCell<BindingScope<C::Value>>,
    connected: Cell<bool>,
}

/// A live component instance.
///
/// Cloning an `Element` creates a new handle to the **same** instance.
pub struct Element<C: Component> {
    inner: Rc<ElementInner<C>>,
}

impl<C: Component> Clone for Element<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<C: Component> std::fmt::Debug for Element<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Element")
            .field("id", &self.inner.id)
            .field("class", &self.inner.class.name)
            .field("connected", &self.inner.connected.get())
            .field("binding_count", &self.binding_count())
            .finish()
    }
}

impl<C: Component> Element<C> {
    /// Create a disconnected instance of `class` with the given fields.
    #[must_use]
    pub fn new(class: &Rc<ComponentClass<C>>, props: C) -> Self {
        Self {
            inner: Rc::new(ElementInner {
                id: NEXT_ELEMENT_ID.fetch_add(1, Ordering::Relaxed),
                class: Rc::clone(class),
                props: RefCell::new(props),
                bindings: RefCell::new(BindingScope::new()),
                connected: Cell::new(false),
            }),
        }
    }

    /// Process-unique instance id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// The class this element was created from.
    #[must_use]
    pub fn class(&self) -> &Rc<ComponentClass<C>> {
        &self.inner.class
    }

    /// Activate the element and run the class's activate hook.
    ///
    /// Returns `false` if the element was already connected.
    pub fn connect(&self) -> bool {
        if self.inner.connected.replace(true) {
            return false;
        }
        self.inner.class.activated.set(true);
        if let Some(hook) = self.inner.class.activate_hook() {
            hook(self);
        }
        true
    }

    /// Deactivate the element and run the class's deactivate hook.
    ///
    /// Returns `false` if the element was not connected.
    pub fn disconnect(&self) -> bool {
        if !self.inner.connected.replace(false) {
            return false;
        }
        if let Some(hook) = self.inner.class.deactivate_hook() {
            hook(self);
        }
        true
    }

    /// Whether the element is currently connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.connected.get()
    }

    /// Current local value of `field`.
    ///
    /// # Panics
    ///
    /// Panics if called while the component is mutably borrowed, i.e. from
    /// inside [`update`](Self::update) or `Component::set_field`.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<C::Value> {
        self.inner.props.borrow().field(field)
    }

    /// Assign `field` directly, bypassing the store.
    ///
    /// A store-driven binding on this field notices the change on the next
    /// store write and stops syncing.
    ///
    /// # Panics
    ///
    /// Panics if the component is already borrowed.
    pub fn set(&self, field: &str, value: Option<C::Value>) {
        self.inner.props.borrow_mut().set_field(field, value);
    }

    /// Read the component by reference.
    pub fn with<R>(&self, f: impl FnOnce(&C) -> R) -> R {
        f(&self.inner.props.borrow())
    }

    /// Mutate the component in place. Changes bypass the store.
    pub fn update<R>(&self, f: impl FnOnce(&mut C) -> R) -> R {
        f(&mut self.inner.props.borrow_mut())
    }

    /// State of this element's binding for `field`.
    #[must_use]
    pub fn binding_state(&self, field: &str) -> BindingState {
        self.inner.bindings.borrow().state(field)
    }

    /// Number of bindings held by this element, whatever their state.
    #[must_use]
    pub fn binding_count(&self) -> usize {
        self.inner.bindings.borrow().binding_count()
    }

    /// Create a weak handle that does not keep the element alive.
    #[must_use]
    pub fn downgrade(&self) -> WeakElement<C> {
        WeakElement {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Read `field` unless the component is mutably borrowed.
    pub(crate) fn try_get(&self, field: &str) -> Option<Option<C::Value>> {
        self.inner
            .props
            .try_borrow()
            .ok()
            .map(|props| props.field(field))
    }

    /// Assign `field` unless the component is already borrowed.
    pub(crate) fn try_set(&self, field: &str, value: Option<C::Value>) -> bool {
        match self.inner.props.try_borrow_mut() {
            Ok(mut props) => {
                props.set_field(field, value);
                true
            }
            Err(_) => false,
        }
    }

    /// Store `binding`, releasing any previous binding for the same field.
    pub(crate) fn hold(&self, binding: FieldBinding<C::Value>) {
        // Take the replaced binding out before dropping it so its release
        // runs without the scope borrowed.
        let replaced = self.inner.bindings.borrow_mut().insert(binding);
        drop(replaced);
    }

    /// Release the binding for `field`. Returns whether one was held.
    pub(crate) fn release(&self, field: &str) -> bool {
        let released = self.inner.bindings.borrow_mut().remove(field);
        released.is_some()
    }
}

/// Non-owning handle to an [`Element`].
pub struct WeakElement<C: Component> {
    inner: Weak<ElementInner<C>>,
}

impl<C: Component> Clone for WeakElement<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<C: Component> WeakElement<C> {
    /// Upgrade to a strong handle if the element is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Element<C>> {
        self.inner.upgrade().map(|inner| Element { inner })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
