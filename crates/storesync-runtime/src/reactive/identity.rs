#![forbid(unsafe_code)]

//! Identity-compared shared values.
//!
//! Bindings detect local overrides by comparing a component's current value
//! with the store's previous value using `PartialEq`. For plain data this is
//! structural equality: a component that locally assigns a value equal to
//! the store's is indistinguishable from an untouched one.
//!
//! [`Shared<T>`] opts into reference semantics instead. Two `Shared` values
//! are equal only if they point at the same allocation, so re-assigning an
//! equal-looking but freshly built value counts as a local change.

use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

/// An `Rc<T>` whose equality is pointer identity.
///
/// ```
/// # use storesync_runtime::reactive::Shared;
/// let a = Shared::new(String::from("abc"));
/// let b = a.clone();
/// let c = Shared::new(String::from("abc"));
/// assert_eq!(a, b);
/// assert_ne!(a, c);
/// assert_eq!(*a, *c);
/// ```
pub struct Shared<T: ?Sized>(Rc<T>);

impl<T> Shared<T> {
    /// Allocate a new shared value with a fresh identity.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self(Rc::new(value))
    }
}

impl<T: ?Sized> Shared<T> {
    /// Borrow the underlying `Rc`.
    #[must_use]
    pub fn as_rc(&self) -> &Rc<T> {
        &self.0
    }

    /// Whether two handles share one allocation.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: ?Sized> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: ?Sized> PartialEq for Shared<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T: ?Sized> Eq for Shared<T> {}

impl<T: ?Sized> Deref for Shared<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> From<Rc<T>> for Shared<T> {
    fn from(rc: Rc<T>) -> Self {
        Self(rc)
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Shared").field(&&*self.0).finish()
    }
}
