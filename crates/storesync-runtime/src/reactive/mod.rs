#![forbid(unsafe_code)]

//! Store-to-field synchronization primitives.
//!
//! - [`Store`]: a shared, versioned field map with global change handlers.
//! - [`CallbackRegistry`]: per-store fan-out from field changes to listeners.
//! - [`FieldBinding`]: one element field bound to one store field, with
//!   local-override detection.
//! - [`BindingScope`]: holds an element's bindings and releases them on drop.
//! - [`Shared`]: identity-compared values for reference equality semantics.
//!
//! # Architecture
//!
//! All types use `Rc<RefCell<..>>` for single-threaded shared ownership. A
//! store write runs its handlers, the registry fan-out and the element
//! updates on the caller's stack before returning. Listeners capture only
//! `Weak` handles, so dropping an element or a store frees everything.
//!
//! # Invariants
//!
//! 1. Store version increments exactly once per mutation that changes a value.
//! 2. Writing a value equal to the current one is a no-op.
//! 3. The registry never holds an empty listener set.
//! 4. A binding whose element diverged from the store's previous value
//!    unregisters before the write returns and never re-registers.
//! 5. After a binding is released or dropped its listener is never invoked.

pub mod binding;
pub mod identity;
pub mod registry;
pub mod store;

pub use binding::{BindingScope, BindingState, FieldBinding};
pub use identity::Shared;
pub use registry::{CallbackRegistry, Listener, WeakRegistry};
pub use store::{ChangeHandler, InitialState, Store};
