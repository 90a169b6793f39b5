#![forbid(unsafe_code)]

//! Store factory and field declarator.
//!
//! [`create_store_sync`] builds a [`Store`] together with its own
//! [`CallbackRegistry`] and wires the store's single change hook to the
//! registry's fan-out. It also returns a [`SyncWithStore`] declarator that
//! component authors use to bind named fields of a [`ComponentClass`] to the
//! store:
//!
//! ```
//! use storesync_runtime::component::{Component, ComponentClass, Element};
//! use storesync_runtime::reactive::InitialState;
//! use storesync_runtime::sync::create_store_sync;
//!
//! #[derive(Default)]
//! struct Badge {
//!     user: Option<String>,
//! }
//!
//! impl Component for Badge {
//!     type Value = String;
//!
//!     fn field(&self, name: &str) -> Option<String> {
//!         (name == "user").then(|| self.user.clone()).flatten()
//!     }
//!
//!     fn set_field(&mut self, name: &str, value: Option<String>) {
//!         if name == "user" {
//!             self.user = value;
//!         }
//!     }
//! }
//!
//! let sync = create_store_sync(InitialState::new().with("user", "ada".to_string()));
//! let class = ComponentClass::<Badge>::new("badge").build();
//! sync.declarator().attach(&class, "user").unwrap();
//!
//! let badge = Element::new(&class, Badge::default());
//! badge.connect();
//! assert_eq!(badge.get("user").as_deref(), Some("ada"));
//!
//! sync.store().write("user", "grace".to_string());
//! assert_eq!(badge.get("user").as_deref(), Some("grace"));
//! ```
//!
//! Every factory call creates an independent registry; two stores never
//! share listeners.

use std::rc::Rc;

use crate::component::{Component, ComponentClass, Element, Hook};
use crate::error::SyncError;
use crate::reactive::{BindingState, CallbackRegistry, FieldBinding, InitialState, Store};

/// A store and its declarator, as returned by [`create_store_sync`].
pub struct StoreSync<V: 'static> {
    store: Store<V>,
    declarator: SyncWithStore<V>,
}

impl<V: std::fmt::Debug + 'static> std::fmt::Debug for StoreSync<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreSync")
            .field("store", &self.store)
            .field("registry", &self.declarator.registry)
            .finish()
    }
}

impl<V: Clone + PartialEq + 'static> StoreSync<V> {
    /// The shared store.
    #[must_use]
    pub fn store(&self) -> &Store<V> {
        &self.store
    }

    /// The registry fed by the store's change hook.
    #[must_use]
    pub fn registry(&self) -> &CallbackRegistry<V> {
        &self.declarator.registry
    }

    /// The field declarator bound to this store.
    #[must_use]
    pub fn declarator(&self) -> &SyncWithStore<V> {
        &self.declarator
    }

    /// Split into the store handle and the declarator.
    #[must_use]
    pub fn into_parts(self) -> (Store<V>, SyncWithStore<V>) {
        (self.store, self.declarator)
    }
}

/// Create a store from `initial` plus a declarator bound to it.
#[must_use]
pub fn create_store_sync<V: Clone + PartialEq + 'static>(initial: InitialState<V>) -> StoreSync<V> {
    let store = Store::new(initial);
    let registry = CallbackRegistry::new();
    let fan_out = registry.clone();
    store.on_change(move |field, new, old| {
        fan_out.dispatch(field, new, old);
    });
    StoreSync {
        declarator: SyncWithStore {
            store: store.clone(),
            registry,
        },
        store,
    }
}

/// Declarator that binds component fields to one store.
///
/// Cloning shares the same store and registry.
pub struct SyncWithStore<V: 'static> {
    store: Store<V>,
    registry: CallbackRegistry<V>,
}

impl<V: 'static> Clone for SyncWithStore<V> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            registry: self.registry.clone(),
        }
    }
}

impl<V: 'static> std::fmt::Debug for SyncWithStore<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncWithStore")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl<V: Clone + PartialEq + 'static> SyncWithStore<V> {
    /// Bind `field` of every future instance of `class` to the store.
    ///
    /// Wraps the class's activate and deactivate hooks: the sync step runs
    /// first, then the previous hook (if any) is forwarded to.
    ///
    /// # Errors
    ///
    /// - [`SyncError::ClassAlreadyActivated`] if an instance of `class` has
    ///   already connected. Fields must be declared up front.
    /// - [`SyncError::DuplicateField`] if `field` is already attached.
    pub fn attach<C>(&self, class: &ComponentClass<C>, field: &str) -> Result<(), SyncError>
    where
        C: Component<Value = V>,
    {
        if class.has_activated() {
            return Err(SyncError::ClassAlreadyActivated {
                class: class.name().to_owned(),
                field: field.to_owned(),
            });
        }
        if !class.claim_field(field) {
            return Err(SyncError::DuplicateField {
                class: class.name().to_owned(),
                field: field.to_owned(),
            });
        }
        if !self.store.contains(field) {
            tracing::warn!(
                target: "storesync",
                field,
                class = class.name(),
                "field is not part of the initial state; reads stay absent until written"
            );
        }

        let sync = self.clone();
        let name: Rc<str> = Rc::from(field);
        class.wrap_activate(move |previous| -> Hook<C> {
            Rc::new(move |element: &Element<C>| {
                sync.connect(element, &name);
                if let Some(previous) = &previous {
                    previous(element);
                }
            })
        });

        let sync = self.clone();
        let name: Rc<str> = Rc::from(field);
        class.wrap_deactivate(move |previous| -> Hook<C> {
            Rc::new(move |element: &Element<C>| {
                sync.disconnect(element, &name);
                if let Some(previous) = &previous {
                    previous(element);
                }
            })
        });

        tracing::debug!(target: "storesync", field, class = class.name(), "field attached");
        Ok(())
    }

    /// Connect `element`'s `field` now, replacing any binding it holds for
    /// that field. Returns the new binding's state.
    pub fn connect<C>(&self, element: &Element<C>, field: &str) -> BindingState
    where
        C: Component<Value = V>,
    {
        // Release first so a re-connect never has two listeners live.
        element.release(field);
        let binding = FieldBinding::connect(&self.store, &self.registry, element, field);
        let state = binding.state();
        element.hold(binding);
        state
    }

    /// Release `element`'s binding for `field`. No-op if none is held.
    pub fn disconnect<C>(&self, element: &Element<C>, field: &str)
    where
        C: Component<Value = V>,
    {
        if element.release(field) {
            tracing::debug!(target: "storesync", field, element = element.id(), "binding released");
        }
    }

    /// The store this declarator writes to.
    #[must_use]
    pub fn store(&self) -> &Store<V> {
        &self.store
    }

    /// The registry this declarator registers with.
    #[must_use]
    pub fn registry(&self) -> &CallbackRegistry<V> {
        &self.registry
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
