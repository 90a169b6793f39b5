#![forbid(unsafe_code)]

//! storesync public facade crate.
//!
//! This crate provides the stable, ergonomic surface area for users.

pub use storesync_runtime as runtime;

pub use storesync_runtime::{
    BindingState, Component, ComponentClass, Element, InitialState, Shared, Store, StoreSync,
    SyncError, SyncWithStore, create_store_sync,
};

pub mod prelude {
    pub use storesync_runtime::SyncError;
    pub use storesync_runtime::component::{Component, ComponentClass, Element};
    pub use storesync_runtime::reactive::{BindingState, InitialState, Shared, Store};
    pub use storesync_runtime::sync::{StoreSync, SyncWithStore, create_store_sync};
}
