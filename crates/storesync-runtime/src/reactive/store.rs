#![forbid(unsafe_code)]

//! Shared key-value store with global change notification.
//!
//! # Design
//!
//! [`Store<V>`] maps field names to optional values of type `V` in shared,
//! reference-counted storage (`Rc<RefCell<..>>`). A field may be *declared*
//! without a value; reads of it return `None`.
//!
//! Change handlers are global (not per field) and cannot be removed. Every
//! write that changes a value (determined by `PartialEq`) calls each handler
//! with `(field, new, old)` before `write` returns.
//!
//! # Invariants
//!
//! 1. `version` increments by exactly 1 on each value-changing mutation.
//! 2. Writing a value equal to the current one is a no-op.
//! 3. Handlers are called in registration order.
//! 4. No internal borrow is held while handlers run, so handlers may read
//!    and write the store (nested dispatch).
//!
//! # Failure Modes
//!
//! - **Write ping-pong**: a handler that keeps writing new, different values
//!   back into the field it was notified about never terminates. Equal
//!   writes stop the chain.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use ahash::AHashMap;

/// Global change handler: `(field, new, old)`.
pub type ChangeHandler<V> = Rc<dyn Fn(&str, Option<&V>, Option<&V>)>;

/// Ordered initial state for a [`Store`].
///
/// Fields declared without a value start absent but are still reported by
/// [`Store::keys`].
///
/// ```
/// # use storesync_runtime::reactive::InitialState;
/// let initial = InitialState::new()
///     .with("user", "Vaibhav Shinde".to_string())
///     .declare("data");
/// assert_eq!(initial.len(), 2);
/// assert!(initial.contains("data"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct InitialState<V> {
    fields: Vec<(String, Option<V>)>,
}

impl<V> Default for InitialState<V> {
    fn default() -> Self {
        Self { fields: Vec::new() }
    }
}

impl<V> InitialState<V> {
    /// Create an empty initial state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field with an initial value. Replaces an earlier entry.
    #[must_use]
    pub fn with(self, field: impl Into<String>, value: V) -> Self {
        self.entry(field, Some(value))
    }

    /// Declare a field with no initial value.
    #[must_use]
    pub fn declare(self, field: impl Into<String>) -> Self {
        self.entry(field, None)
    }

    /// Add a field with an optional initial value. Replaces an earlier entry.
    #[must_use]
    pub fn entry(mut self, field: impl Into<String>, value: Option<V>) -> Self {
        self.insert(field.into(), value);
        self
    }

    /// Insert in place. Replaces an earlier entry for the same field.
    pub fn insert(&mut self, field: String, value: Option<V>) {
        match self.fields.iter_mut().find(|(name, _)| *name == field) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((field, value)),
        }
    }

    /// Whether `field` is part of the initial state.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.fields.iter().any(|(name, _)| name == field)
    }

    /// Initial value of `field`, if any.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&V> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .and_then(|(_, value)| value.as_ref())
    }

    /// Number of declared fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no field is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate `(field, value)` in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&V>)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_ref()))
    }
}

impl<K: Into<String>, V> FromIterator<(K, Option<V>)> for InitialState<V> {
    fn from_iter<I: IntoIterator<Item = (K, Option<V>)>>(iter: I) -> Self {
        let mut state = Self::new();
        for (field, value) in iter {
            state.insert(field.into(), value);
        }
        state
    }
}

/// Shared interior for [`Store<V>`].
struct StoreInner<V> {
    state: AHashMap<String, Option<V>>,
    initial: InitialState<V>,
    version: u64,
    handlers: Vec<ChangeHandler<V>>,
}

/// A shared, versioned field map with change notification.
///
/// Cloning a `Store` creates a new handle to the **same** state and handlers.
pub struct Store<V> {
    inner: Rc<RefCell<StoreInner<V>>>,
}

impl<V> Clone for Store<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<V: std::fmt::Debug> std::fmt::Debug for Store<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        let state: BTreeMap<&str, &Option<V>> =
            inner.state.iter().map(|(k, v)| (k.as_str(), v)).collect();
        f.debug_struct("Store")
            .field("state", &state)
            .field("version", &inner.version)
            .field("handler_count", &inner.handlers.len())
            .finish()
    }
}

impl<V: Clone + PartialEq + 'static> Store<V> {
    /// Create a store seeded from `initial`. The initial version is 0.
    #[must_use]
    pub fn new(initial: InitialState<V>) -> Self {
        let state = initial
            .iter()
            .map(|(field, value)| (field.to_owned(), value.cloned()))
            .collect();
        Self {
            inner: Rc::new(RefCell::new(StoreInner {
                state,
                initial,
                version: 0,
                handlers: Vec::new(),
            })),
        }
    }

    /// Get a clone of the current value of `field`.
    #[must_use]
    pub fn read(&self, field: &str) -> Option<V> {
        self.inner.borrow().state.get(field).cloned().flatten()
    }

    /// Access the current value of `field` by reference without cloning.
    pub fn with<R>(&self, field: &str, f: impl FnOnce(Option<&V>) -> R) -> R {
        let inner = self.inner.borrow();
        f(inner.state.get(field).and_then(Option::as_ref))
    }

    /// Set `field` to `value`, notifying handlers if it changed.
    ///
    /// Returns whether the value changed.
    pub fn write(&self, field: &str, value: V) -> bool {
        self.replace(field, Some(value))
    }

    /// Make `field` absent, notifying handlers if it held a value.
    pub fn clear(&self, field: &str) -> bool {
        self.replace(field, None)
    }

    /// Restore every field to its initial value.
    ///
    /// Fields added after construction are cleared. Handlers see one
    /// notification per field that actually changes. Returns that count.
    pub fn reset(&self) -> usize {
        let plan: Vec<(String, Option<V>)> = {
            let inner = self.inner.borrow();
            let mut plan: Vec<(String, Option<V>)> = inner
                .initial
                .iter()
                .map(|(field, value)| (field.to_owned(), value.cloned()))
                .collect();
            let mut extra: Vec<&String> = inner
                .state
                .keys()
                .filter(|k| !inner.initial.contains(k))
                .collect();
            extra.sort_unstable();
            plan.extend(extra.into_iter().map(|k| (k.clone(), None)));
            plan
        };
        let changed = plan
            .into_iter()
            .filter(|(field, value)| self.replace(field, value.clone()))
            .count();
        tracing::debug!(target: "storesync", changed, "store reset");
        changed
    }

    /// Register a global change handler. Handlers cannot be removed.
    pub fn on_change(&self, handler: impl Fn(&str, Option<&V>, Option<&V>) + 'static) {
        self.inner.borrow_mut().handlers.push(Rc::new(handler));
    }

    /// Current version number. Increments by 1 on each value-changing write.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Known field names (declared or written), sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.borrow().state.keys().cloned().collect();
        keys.sort_unstable();
        keys
    }

    /// Whether `field` is known to the store, with or without a value.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.inner.borrow().state.contains_key(field)
    }

    /// Ordered copy of the fields that currently hold a value.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, V> {
        self.inner
            .borrow()
            .state
            .iter()
            .filter_map(|(k, v)| v.as_ref().map(|v| (k.clone(), v.clone())))
            .collect()
    }

    /// Number of registered change handlers.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.inner.borrow().handlers.len()
    }

    fn replace(&self, field: &str, value: Option<V>) -> bool {
        let (old, handlers) = {
            let mut inner = self.inner.borrow_mut();
            let slot = inner.state.entry(field.to_owned()).or_insert(None);
            if *slot == value {
                return false;
            }
            let old = std::mem::replace(slot, value.clone());
            inner.version += 1;
            (old, inner.handlers.clone())
        };
        tracing::trace!(
            target: "storesync",
            field,
            handlers = handlers.len(),
            cleared = value.is_none(),
            "store write"
        );
        for handler in &handlers {
            handler(field, value.as_ref(), old.as_ref());
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn sample() -> Store<String> {
        Store::new(
            InitialState::new()
                .with("user", "Vaibhav Shinde".to_string())
                .declare("data"),
        )
    }

    #[test]
    fn read_initial_values() {
        let store = sample();
        assert_eq!(store.read("user").as_deref(), Some("Vaibhav Shinde"));
        assert_eq!(store.read("data"), None);
        assert_eq!(store.read("missing"), None);
        assert_eq!(store.version(), 0);
    }

    #[test]
    fn declared_fields_are_known() {
        let store = sample();
        assert!(store.contains("data"));
        assert!(!store.contains("missing"));
        assert_eq!(store.keys(), vec!["data".to_string(), "user".to_string()]);
    }

    #[test]
    fn write_notifies_with_new_and_old() {
        let store = sample();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        store.on_change(move |field, new, old| {
            s.borrow_mut()
                .push((field.to_string(), new.cloned(), old.cloned()));
        });

        assert!(store.write("user", "xyz".to_string()));
        assert_eq!(
            *seen.borrow(),
            vec![(
                "user".to_string(),
                Some("xyz".to_string()),
                Some("Vaibhav Shinde".to_string())
            )]
        );
        assert_eq!(store.version(), 1);
    }

    #[test]
    fn equal_write_is_noop() {
        let store = sample();
        let count = Rc::new(Cell::new(0u32));
        let c = Rc::clone(&count);
        store.on_change(move |_, _, _| c.set(c.get() + 1));

        assert!(!store.write("user", "Vaibhav Shinde".to_string()));
        assert!(!store.clear("data"));
        assert_eq!(count.get(), 0);
        assert_eq!(store.version(), 0);
    }

    #[test]
    fn clear_notifies_absent_new_value() {
        let store = sample();
        let last = Rc::new(RefCell::new(None));
        let l = Rc::clone(&last);
        store.on_change(move |_, new, old| {
            *l.borrow_mut() = Some((new.cloned(), old.cloned()));
        });

        assert!(store.clear("user"));
        assert_eq!(
            *last.borrow(),
            Some((None, Some("Vaibhav Shinde".to_string())))
        );
        assert_eq!(store.read("user"), None);
        assert!(store.contains("user"));
    }

    #[test]
    fn write_declares_unknown_field() {
        let store = sample();
        store.write("theme", "dark".to_string());
        assert!(store.contains("theme"));
        assert_eq!(store.read("theme").as_deref(), Some("dark"));
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let store = sample();
        let log = Rc::new(RefCell::new(Vec::new()));
        for tag in ['A', 'B', 'C'] {
            let l = Rc::clone(&log);
            store.on_change(move |_, _, _| l.borrow_mut().push(tag));
        }
        store.write("user", "x".to_string());
        assert_eq!(*log.borrow(), vec!['A', 'B', 'C']);
        assert_eq!(store.handler_count(), 3);
    }

    #[test]
    fn nested_write_from_handler() {
        let store = sample();
        let inner = store.clone();
        store.on_change(move |field, new, _| {
            if field == "user" {
                inner.write("data", format!("derived:{}", new.map_or("", String::as_str)));
            }
        });

        store.write("user", "abc".to_string());
        assert_eq!(store.read("data").as_deref(), Some("derived:abc"));
        assert_eq!(store.version(), 2);
    }

    #[test]
    fn handler_sees_committed_value() {
        let store = sample();
        let reader = store.clone();
        let seen = Rc::new(RefCell::new(None));
        let s = Rc::clone(&seen);
        store.on_change(move |field, _, _| *s.borrow_mut() = reader.read(field));

        store.write("user", "fresh".to_string());
        assert_eq!(seen.borrow().as_deref(), Some("fresh"));
    }

    #[test]
    fn with_borrows_without_clone() {
        let store = sample();
        let len = store.with("user", |v| v.map_or(0, String::len));
        assert_eq!(len, "Vaibhav Shinde".len());
        assert!(store.with("data", |v| v.is_none()));
    }

    #[test]
    fn reset_restores_initial_and_clears_extras() {
        let store = sample();
        let count = Rc::new(Cell::new(0u32));
        let c = Rc::clone(&count);
        store.on_change(move |_, _, _| c.set(c.get() + 1));

        store.write("user", "other".to_string());
        store.write("data", "token".to_string());
        store.write("theme", "dark".to_string());
        count.set(0);

        assert_eq!(store.reset(), 3);
        assert_eq!(count.get(), 3);
        assert_eq!(store.read("user").as_deref(), Some("Vaibhav Shinde"));
        assert_eq!(store.read("data"), None);
        assert_eq!(store.read("theme"), None);

        // Already at initial state.
        assert_eq!(store.reset(), 0);
    }

    #[test]
    fn snapshot_skips_absent_fields() {
        let store = sample();
        let snap = store.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap.get("user").map(String::as_str), Some("Vaibhav Shinde"));
    }

    #[test]
    fn clone_shares_state() {
        let a = sample();
        let b = a.clone();
        a.write("data", "t".to_string());
        assert_eq!(b.read("data").as_deref(), Some("t"));
        assert_eq!(b.version(), 1);
    }

    #[test]
    fn initial_state_replaces_duplicate_entries() {
        let initial = InitialState::new().with("a", 1).with("a", 2).declare("b");
        assert_eq!(initial.len(), 2);
        assert_eq!(initial.get("a"), Some(&2));
        assert_eq!(initial.get("b"), None);
    }

    #[test]
    fn initial_state_from_iter() {
        let initial: InitialState<i32> = vec![("a", Some(1)), ("b", None)].into_iter().collect();
        let fields: Vec<(&str, Option<&i32>)> = initial.iter().collect();
        assert_eq!(fields, vec![("a", Some(&1)), ("b", None)]);
    }

    #[test]
    fn debug_format() {
        let store = sample();
        let dbg = format!("{store:?}");
        assert!(dbg.contains("Store"));
        assert!(dbg.contains("Vaibhav Shinde"));
        assert!(dbg.contains("version"));
    }

    #[test]
    fn many_writes_version_monotonic() {
        let store = Store::new(InitialState::new().with("n", 0));
        for i in 1..=100 {
            store.write("n", i);
        }
        assert_eq!(store.version(), 100);
        assert_eq!(store.read("n"), Some(100));
    }
}
