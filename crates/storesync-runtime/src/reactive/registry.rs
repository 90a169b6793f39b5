#![forbid(unsafe_code)]

//! Per-store registry of field listeners.
//!
//! # Design
//!
//! The [`Store`](super::Store) only exposes one global, non-removable change
//! hook. [`CallbackRegistry<V>`] sits behind that hook and fans each change out
//! to the listeners registered for the changed field, so that individual
//! bindings can come and go without touching the store.
//!
//! Listeners are `Rc<dyn Fn(Option<&V>, Option<&V>)>` and are compared by
//! pointer identity: registering the same `Rc` twice keeps one listener.
//!
//! # Invariants
//!
//! 1. A field key exists only while at least one listener is registered for it.
//! 2. `unregister` of an unknown field or listener is a no-op.
//! 3. `dispatch` iterates a snapshot taken before the first call, so listeners
//!    that register or unregister during dispatch never cause a peer to be
//!    skipped or invoked twice for that dispatch.
//!
//! # Failure Modes
//!
//! - **Listener panics**: propagates to the caller of `dispatch` (and so to
//!   the store writer). The registry itself stays consistent since no borrow
//!   is held while listeners run.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use ahash::AHashMap;

/// A field listener, invoked with `(new, old)` on every change of its field.
pub type Listener<V> = Rc<dyn Fn(Option<&V>, Option<&V>)>;

type ListenerMap<V> = AHashMap<String, Vec<Listener<V>>>;

/// Field name to listener-set mapping shared by every binding of one store.
///
/// Cloning a `CallbackRegistry` creates a new handle to the **same** map.
pub struct CallbackRegistry<V> {
    inner: Rc<RefCell<ListenerMap<V>>>,
}

impl<V> Clone for CallbackRegistry<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<V> Default for CallbackRegistry<V> {
    fn default() -> Self {
        Self {
            inner: Rc::new(RefCell::new(AHashMap::new())),
        }
    }
}

impl<V> std::fmt::Debug for CallbackRegistry<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        let listeners: usize = inner.values().map(Vec::len).sum();
        f.debug_struct("CallbackRegistry")
            .field("field_count", &inner.len())
            .field("listener_count", &listeners)
            .finish()
    }
}

impl<V: 'static> CallbackRegistry<V> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `listener` to the set for `field`, creating the set if needed.
    ///
    /// Registering a listener that is already present is a no-op.
    pub fn register(&self, field: &str, listener: &Listener<V>) {
        let mut inner = self.inner.borrow_mut();
        let set = inner.entry(field.to_owned()).or_default();
        if !set.iter().any(|l| Rc::ptr_eq(l, listener)) {
            set.push(Rc::clone(listener));
        }
    }

    /// Remove `listener` from the set for `field`.
    ///
    /// Prunes the field entry once its set is empty. Returns whether a
    /// listener was actually removed.
    pub fn unregister(&self, field: &str, listener: &Listener<V>) -> bool {
        let mut inner = self.inner.borrow_mut();
        let Some(set) = inner.get_mut(field) else {
            return false;
        };
        let before = set.len();
        set.retain(|l| !Rc::ptr_eq(l, listener));
        let removed = set.len() != before;
        if set.is_empty() {
            inner.remove(field);
        }
        removed
    }

    /// Invoke every listener of `field` with `(new, old)`.
    ///
    /// Returns the number of listeners invoked. Unobserved fields are a no-op.
    pub fn dispatch(&self, field: &str, new: Option<&V>, old: Option<&V>) -> usize {
        // Snapshot, then release the borrow so listeners may mutate the map.
        let snapshot: Vec<Listener<V>> = match self.inner.borrow().get(field) {
            Some(set) => set.clone(),
            None => return 0,
        };
        tracing::trace!(
            target: "storesync",
            field,
            listeners = snapshot.len(),
            "dispatch"
        );
        for listener in &snapshot {
            listener(new, old);
        }
        snapshot.len()
    }

    /// Number of listeners registered for `field`.
    #[must_use]
    pub fn listener_count(&self, field: &str) -> usize {
        self.inner.borrow().get(field).map_or(0, Vec::len)
    }

    /// Number of fields with at least one listener.
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.inner.borrow().len()
    }

    /// Whether any listener is registered for `field`.
    #[must_use]
    pub fn is_observed(&self, field: &str) -> bool {
        self.inner.borrow().contains_key(field)
    }

    /// Observed field names, sorted.
    #[must_use]
    pub fn fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = self.inner.borrow().keys().cloned().collect();
        fields.sort_unstable();
        fields
    }

    /// Whether no listener is registered at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }

    /// Create a weak handle that does not keep the registry alive.
    #[must_use]
    pub fn downgrade(&self) -> WeakRegistry<V> {
        WeakRegistry {
            inner: Rc::downgrade(&self.inner),
        }
    }
}

/// Non-owning handle to a [`CallbackRegistry`].
///
/// Listeners hold this to unregister themselves without forming a cycle
/// through the registry that stores them.
pub struct WeakRegistry<V> {
    inner: Weak<RefCell<ListenerMap<V>>>,
}

impl<V> Clone for WeakRegistry<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<V> std::fmt::Debug for WeakRegistry<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakRegistry")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl<V> WeakRegistry<V> {
    /// Upgrade to a strong handle if the registry is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<CallbackRegistry<V>> {
        self.inner.upgrade().map(|inner| CallbackRegistry { inner })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn counting(count: &Rc<Cell<u32>>) -> Listener<i32> {
        let c = Rc::clone(count);
        Rc::new(move |_new, _old| c.set(c.get() + 1))
    }

    #[test]
    fn register_creates_field_entry() {
        let registry = CallbackRegistry::<i32>::new();
        assert!(registry.is_empty());

        let listener: Listener<i32> = Rc::new(|_, _| {});
        registry.register("user", &listener);
        assert!(registry.is_observed("user"));
        assert_eq!(registry.listener_count("user"), 1);
        assert_eq!(registry.field_count(), 1);
    }

    #[test]
    fn duplicate_register_keeps_one_listener() {
        let registry = CallbackRegistry::<i32>::new();
        let count = Rc::new(Cell::new(0));
        let listener = counting(&count);

        registry.register("user", &listener);
        registry.register("user", &listener);
        assert_eq!(registry.listener_count("user"), 1);

        registry.dispatch("user", Some(&1), None);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn distinct_closures_are_distinct_listeners() {
        let registry = CallbackRegistry::<i32>::new();
        let a: Listener<i32> = Rc::new(|_, _| {});
        let b: Listener<i32> = Rc::new(|_, _| {});
        registry.register("user", &a);
        registry.register("user", &b);
        assert_eq!(registry.listener_count("user"), 2);
    }

    #[test]
    fn unregister_prunes_empty_field() {
        let registry = CallbackRegistry::<i32>::new();
        let a: Listener<i32> = Rc::new(|_, _| {});
        let b: Listener<i32> = Rc::new(|_, _| {});
        registry.register("data", &a);
        registry.register("data", &b);

        assert!(registry.unregister("data", &a));
        assert!(registry.is_observed("data"));

        assert!(registry.unregister("data", &b));
        assert!(!registry.is_observed("data"));
        assert_eq!(registry.field_count(), 0);
    }

    #[test]
    fn unregister_unknown_is_noop() {
        let registry = CallbackRegistry::<i32>::new();
        let a: Listener<i32> = Rc::new(|_, _| {});
        let b: Listener<i32> = Rc::new(|_, _| {});

        assert!(!registry.unregister("missing", &a));

        registry.register("user", &a);
        assert!(!registry.unregister("user", &b));
        assert_eq!(registry.listener_count("user"), 1);
    }

    #[test]
    fn dispatch_passes_new_and_old() {
        let registry = CallbackRegistry::<i32>::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let listener: Listener<i32> =
            Rc::new(move |new, old| s.borrow_mut().push((new.copied(), old.copied())));
        registry.register("count", &listener);

        registry.dispatch("count", Some(&2), Some(&1));
        registry.dispatch("count", None, Some(&2));
        assert_eq!(*seen.borrow(), vec![(Some(2), Some(1)), (None, Some(2))]);
    }

    #[test]
    fn dispatch_only_reaches_matching_field() {
        let registry = CallbackRegistry::<i32>::new();
        let user = Rc::new(Cell::new(0));
        let data = Rc::new(Cell::new(0));
        registry.register("user", &counting(&user));
        registry.register("data", &counting(&data));

        assert_eq!(registry.dispatch("user", Some(&1), None), 1);
        assert_eq!(user.get(), 1);
        assert_eq!(data.get(), 0);
    }

    #[test]
    fn dispatch_unobserved_field_is_silent() {
        let registry = CallbackRegistry::<i32>::new();
        assert_eq!(registry.dispatch("nobody", Some(&1), None), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn self_unregister_during_dispatch_does_not_skip_peers() {
        let registry = CallbackRegistry::<i32>::new();
        let count = Rc::new(Cell::new(0));

        let slot: Rc<RefCell<Option<Listener<i32>>>> = Rc::new(RefCell::new(None));
        let reg = registry.downgrade();
        let me = Rc::clone(&slot);
        let c = Rc::clone(&count);
        let first: Listener<i32> = Rc::new(move |_, _| {
            c.set(c.get() + 1);
            if let (Some(reg), Some(me)) = (reg.upgrade(), me.borrow().as_ref()) {
                reg.unregister("field", me);
            }
        });
        *slot.borrow_mut() = Some(Rc::clone(&first));

        registry.register("field", &first);
        registry.register("field", &counting(&count));
        registry.register("field", &counting(&count));

        assert_eq!(registry.dispatch("field", Some(&1), None), 3);
        assert_eq!(count.get(), 3);
        assert_eq!(registry.listener_count("field"), 2);

        // Second dispatch no longer reaches the removed listener.
        assert_eq!(registry.dispatch("field", Some(&2), Some(&1)), 2);
        assert_eq!(count.get(), 5);
    }

    #[test]
    fn listener_added_during_dispatch_waits_for_next_dispatch() {
        let registry = CallbackRegistry::<i32>::new();
        let late = Rc::new(Cell::new(0));
        let late_listener = counting(&late);

        let reg = registry.clone();
        let to_add = Rc::clone(&late_listener);
        let adder: Listener<i32> = Rc::new(move |_, _| reg.register("field", &to_add));
        registry.register("field", &adder);

        registry.dispatch("field", Some(&1), None);
        assert_eq!(late.get(), 0);

        registry.dispatch("field", Some(&2), Some(&1));
        assert_eq!(late.get(), 1);
    }

    #[test]
    fn clone_shares_map() {
        let a = CallbackRegistry::<i32>::new();
        let b = a.clone();
        let listener: Listener<i32> = Rc::new(|_, _| {});
        a.register("user", &listener);
        assert!(b.is_observed("user"));
    }

    #[test]
    fn weak_handle_does_not_keep_registry_alive() {
        let registry = CallbackRegistry::<i32>::new();
        let weak = registry.downgrade();
        assert!(weak.upgrade().is_some());
        drop(registry);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn fields_are_sorted() {
        let registry = CallbackRegistry::<i32>::new();
        let listener: Listener<i32> = Rc::new(|_, _| {});
        registry.register("zeta", &listener);
        registry.register("alpha", &listener);
        assert_eq!(registry.fields(), vec!["alpha".to_string(), "zeta".to_string()]);
    }

    #[test]
    fn debug_format() {
        let registry = CallbackRegistry::<i32>::new();
        let listener: Listener<i32> = Rc::new(|_, _| {});
        registry.register("user", &listener);
        let dbg = format!("{registry:?}");
        assert!(dbg.contains("field_count: 1"));
        assert!(dbg.contains("listener_count: 1"));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Register(usize, usize),
            Unregister(usize, usize),
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0..3usize, 0..4usize).prop_map(|(f, l)| Op::Register(f, l)),
                (0..3usize, 0..4usize).prop_map(|(f, l)| Op::Unregister(f, l)),
            ]
        }

        proptest! {
            /// The registry matches a reference set model and never keeps an
            /// empty field entry.
            #[test]
            fn registry_matches_set_model(ops in proptest::collection::vec(op(), 0..64)) {
                const FIELDS: [&str; 3] = ["user", "data", "theme"];
                let registry = CallbackRegistry::<i32>::new();
                let listeners: Vec<Listener<i32>> =
                    (0..4).map(|_| Rc::new(|_: Option<&i32>, _: Option<&i32>| {}) as Listener<i32>).collect();
                let mut model = [[false; 4]; 3];

                for op in ops {
                    match op {
                        Op::Register(f, l) => {
                            registry.register(FIELDS[f], &listeners[l]);
                            model[f][l] = true;
                        }
                        Op::Unregister(f, l) => {
                            let removed = registry.unregister(FIELDS[f], &listeners[l]);
                            prop_assert_eq!(removed, model[f][l]);
                            model[f][l] = false;
                        }
                    }
                }

                for (f, field) in FIELDS.iter().enumerate() {
                    let expected = model[f].iter().filter(|b| **b).count();
                    prop_assert_eq!(registry.listener_count(field), expected);
                    prop_assert_eq!(registry.is_observed(field), expected > 0);
                    prop_assert_eq!(registry.dispatch(field, Some(&1), None), expected);
                }
            }
        }
    }
}
