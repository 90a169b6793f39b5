#![forbid(unsafe_code)]

//! Field bindings between an [`Element`] and a [`Store`].
//!
//! A [`FieldBinding<V>`] ties one component field to the store field of the
//! same name for one connection of the element.
//!
//! # Lifecycle
//!
//! ```text
//!            connect (local unset)             dispatch, local == old
//! Unbound ───────────────────────► StoreDriven ◄──────────────┐
//!    ▲  connect (local set):             │  └─────────────────┘
//!    │  stays Unbound                    │ dispatch, local != old
//!    │                                   ▼
//!    └──────── release / drop ──── LocallyOverridden
//! ```
//!
//! On connect the binding seeds the element from the store (if the store has
//! a value) and registers a listener. On each dispatch the listener compares
//! the element's current value with the store's *previous* value: if they
//! match, only the store moved and the new value is applied; if not, the
//! element was changed out-of-band and the binding unregisters for good.
//!
//! # Invariants
//!
//! 1. A binding has a registered listener iff its state is `StoreDriven`.
//! 2. A `LocallyOverridden` binding never registers again; a fresh connect
//!    creates a new binding.
//! 3. Dropping a `FieldBinding` unregisters its listener.
//! 4. Listeners hold only weak references to the element, the binding and
//!    the registry.
//!
//! # Failure Modes
//!
//! - **Element dropped**: the next dispatch unregisters the listener.
//! - **Element busy**: if a dispatch reaches an element that is mutably
//!   borrowed (a nested write issued from its own `set_field`), the update is
//!   skipped and a warning logged. The element and store then disagree, so
//!   the following write cuts the binding.
//!
//! [`Element`]: crate::component::Element
//! [`Store`]: super::Store

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use super::registry::{CallbackRegistry, Listener, WeakRegistry};
use super::store::Store;
use crate::component::{Component, Element, WeakElement};

// ---------------------------------------------------------------------------
// BindingState
// ---------------------------------------------------------------------------

/// Whether a binding still receives store-pushed updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BindingState {
    /// Not syncing: never connected, released, or the element had its own
    /// value at connect time.
    #[default]
    Unbound,
    /// Tracking the store; a listener is registered.
    StoreDriven,
    /// The element was changed out-of-band; no further store updates for
    /// this connection.
    LocallyOverridden,
}

impl BindingState {
    /// Whether store writes still reach the element.
    #[must_use]
    pub const fn is_store_driven(self) -> bool {
        matches!(self, Self::StoreDriven)
    }
}

// ---------------------------------------------------------------------------
// FieldBinding<V>
// ---------------------------------------------------------------------------

struct BindingCore<V> {
    field: String,
    registry: WeakRegistry<V>,
    listener: RefCell<Option<Listener<V>>>,
    state: Cell<BindingState>,
}

impl<V: 'static> BindingCore<V> {
    fn detach(&self, next: BindingState) {
        let listener = self.listener.borrow_mut().take();
        if let (Some(listener), Some(registry)) = (listener, self.registry.upgrade()) {
            registry.unregister(&self.field, &listener);
        }
        self.state.set(next);
    }
}

/// One element field bound to one store field for one connection.
///
/// Drop the `FieldBinding` (or call [`release`](Self::release)) to stop
/// syncing.
pub struct FieldBinding<V: 'static> {
    core: Rc<BindingCore<V>>,
}

impl<V: 'static> std::fmt::Debug for FieldBinding<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldBinding")
            .field("field", &self.core.field)
            .field("state", &self.core.state.get())
            .finish()
    }
}

impl<V: Clone + PartialEq + 'static> FieldBinding<V> {
    /// Connect `element`'s `field` to the store.
    ///
    /// If the element already has a value for `field`, that value wins: the
    /// store is not read and no listener is registered (state `Unbound`).
    /// Otherwise the element is seeded from the store when the store has a
    /// value, and a listener is registered either way (state `StoreDriven`).
    pub fn connect<C>(
        store: &Store<V>,
        registry: &CallbackRegistry<V>,
        element: &Element<C>,
        field: &str,
    ) -> Self
    where
        C: Component<Value = V>,
    {
        let binding = Self {
            core: Rc::new(BindingCore {
                field: field.to_owned(),
                registry: registry.downgrade(),
                listener: RefCell::new(None),
                state: Cell::new(BindingState::Unbound),
            }),
        };

        if element.get(field).is_some() {
            tracing::debug!(
                target: "storesync",
                field,
                element = element.id(),
                "local value present; not syncing"
            );
            return binding;
        }

        if let Some(value) = store.read(field) {
            element.set(field, Some(value));
            tracing::debug!(target: "storesync", field, element = element.id(), "seeded from store");
        }

        let listener = Self::listener(Rc::downgrade(&binding.core), element.downgrade());
        registry.register(field, &listener);
        *binding.core.listener.borrow_mut() = Some(listener);
        binding.core.state.set(BindingState::StoreDriven);
        tracing::debug!(target: "storesync", field, element = element.id(), "binding connected");
        binding
    }

    fn listener<C>(core: Weak<BindingCore<V>>, element: WeakElement<C>) -> Listener<V>
    where
        C: Component<Value = V>,
    {
        Rc::new(move |new: Option<&V>, old: Option<&V>| {
            let Some(core) = core.upgrade() else {
                return;
            };
            // A nested dispatch may have cut this binding while an outer
            // dispatch still holds it in its snapshot.
            if !core.state.get().is_store_driven() {
                return;
            }
            let Some(element) = element.upgrade() else {
                core.detach(BindingState::Unbound);
                return;
            };
            let field = core.field.as_str();
            let Some(current) = element.try_get(field) else {
                tracing::warn!(
                    target: "storesync",
                    field,
                    element = element.id(),
                    "element busy; store update skipped"
                );
                return;
            };
            if current.as_ref() != old {
                core.detach(BindingState::LocallyOverridden);
                tracing::debug!(
                    target: "storesync",
                    field,
                    element = element.id(),
                    "local override detected; binding released"
                );
                return;
            }
            if !element.try_set(field, new.cloned()) {
                tracing::warn!(
                    target: "storesync",
                    field,
                    element = element.id(),
                    "element busy; store update skipped"
                );
            }
        })
    }
}

impl<V: 'static> FieldBinding<V> {
    /// Bound field name.
    #[must_use]
    pub fn field(&self) -> &str {
        &self.core.field
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> BindingState {
        self.core.state.get()
    }

    /// Whether store writes still reach the element.
    #[must_use]
    pub fn is_store_driven(&self) -> bool {
        self.state().is_store_driven()
    }

    /// Unregister the listener (if any) and return to `Unbound`.
    pub fn release(&self) {
        self.core.detach(BindingState::Unbound);
    }
}

impl<V: 'static> Drop for FieldBinding<V> {
    fn drop(&mut self) {
        self.core.detach(BindingState::Unbound);
    }
}

// ---------------------------------------------------------------------------
// BindingScope — lifecycle management
// ---------------------------------------------------------------------------

/// Holds the field bindings of one element.
///
/// At most one binding per field: inserting a binding for a field that is
/// already bound hands the old one back to the caller.
///
/// # Invariants
///
/// 1. Bindings are released in reverse insertion order on drop.
/// 2. After drop or `clear()`, no listener from this scope will fire.
/// 3. `clear()` leaves the scope empty but reusable.
pub struct BindingScope<V: 'static> {
    bindings: Vec<FieldBinding<V>>,
}

impl<V: 'static> BindingScope<V> {
    /// Create an empty binding scope.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bindings: Vec::new(),
        }
    }

    /// Add `binding`, returning the binding it replaces for the same field.
    pub fn insert(&mut self, binding: FieldBinding<V>) -> Option<FieldBinding<V>> {
        let replaced = self.remove(binding.field());
        self.bindings.push(binding);
        replaced
    }

    /// Take the binding for `field` out of the scope.
    pub fn remove(&mut self, field: &str) -> Option<FieldBinding<V>> {
        let index = self.bindings.iter().position(|b| b.field() == field)?;
        Some(self.bindings.remove(index))
    }

    /// Binding for `field`, if held.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldBinding<V>> {
        self.bindings.iter().find(|b| b.field() == field)
    }

    /// State of the binding for `field`; `Unbound` when none is held.
    #[must_use]
    pub fn state(&self, field: &str) -> BindingState {
        self.get(field).map_or(BindingState::Unbound, FieldBinding::state)
    }

    /// Bound field names in insertion order.
    #[must_use]
    pub fn fields(&self) -> Vec<&str> {
        self.bindings.iter().map(FieldBinding::field).collect()
    }

    /// Number of held bindings.
    #[must_use]
    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    /// Whether the scope holds no bindings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Release all bindings immediately (scope becomes empty but reusable).
    pub fn clear(&mut self) {
        while let Some(binding) = self.bindings.pop() {
            drop(binding);
        }
    }
}

impl<V: 'static> Default for BindingScope<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: 'static> Drop for BindingScope<V> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<V: 'static> std::fmt::Debug for BindingScope<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingScope")
            .field("binding_count", &self.bindings.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
