#![forbid(unsafe_code)]

//! Keep component fields mirrored against a shared key-value store.
//!
//! # Modules
//!
//! - [`reactive`]: the store, the per-store callback registry and the field
//!   bindings with local-override detection.
//! - [`component`]: a minimal host component model with activate and
//!   deactivate hooks.
//! - [`sync`]: the [`create_store_sync`] factory and the [`SyncWithStore`]
//!   declarator that wires the two together.
//! - `config` (feature `state-config`): load the initial state from JSON or
//!   TOML.
//!
//! Everything is single-threaded (`Rc`/`RefCell`); a store write updates all
//! store-driven elements before it returns.

pub mod component;
#[cfg(feature = "state-config")]
pub mod config;
pub mod error;
pub mod reactive;
pub mod sync;

pub use component::{Component, ComponentClass, Element, WeakElement};
pub use error::SyncError;
pub use reactive::{
    BindingScope, BindingState, CallbackRegistry, FieldBinding, InitialState, Shared, Store,
};
pub use sync::{StoreSync, SyncWithStore, create_store_sync};
