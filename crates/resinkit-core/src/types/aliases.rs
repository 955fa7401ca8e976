//! Type aliases for commonly used shared-ownership types.
//!
//! The reactor thread owns the print engine through [`Shared`] handles; state
//! that must cross into timer tasks or the background image worker uses the
//! `ThreadSafe*` family, backed by `parking_lot` mutexes.

use parking_lot::Mutex;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;

// =============================================================================
// SINGLE-THREADED SHARED TYPES (Rc<RefCell<T>>)
// =============================================================================

/// A reference-counted, interior-mutable wrapper for the reactor thread.
///
/// Reactor callbacks never run concurrently, so a `RefCell` is sufficient.
pub type Shared<T> = Rc<RefCell<T>>;

// =============================================================================
// THREAD-SAFE SHARED TYPES (Arc<Mutex<T>>)
// =============================================================================

/// A thread-safe optional slot, e.g. the projector's pending image.
pub type ThreadSafeOption<T> = Arc<Mutex<Option<T>>>;

/// A thread-safe vector, mostly used by recording test doubles.
pub type ThreadSafeVec<T> = Arc<Mutex<Vec<T>>>;

/// A thread-safe queue for payloads handed from producers to the reactor.
pub type ThreadSafeDeque<T> = Arc<Mutex<VecDeque<T>>>;

// =============================================================================
// CONSTRUCTOR HELPERS
// =============================================================================

/// Create a new [`Shared`] value.
#[inline]
pub fn shared<T>(value: T) -> Shared<T> {
    Rc::new(RefCell::new(value))
}

/// Create an empty [`ThreadSafeOption`].
#[inline]
pub fn thread_safe_none<T>() -> ThreadSafeOption<T> {
    Arc::new(Mutex::new(None))
}

/// Create an empty [`ThreadSafeVec`].
#[inline]
pub fn thread_safe_vec<T>() -> ThreadSafeVec<T> {
    Arc::new(Mutex::new(Vec::new()))
}

/// Create an empty [`ThreadSafeDeque`].
#[inline]
pub fn thread_safe_deque<T>() -> ThreadSafeDeque<T> {
    Arc::new(Mutex::new(VecDeque::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_creation() {
        let value: Shared<i32> = shared(42);
        assert_eq!(*value.borrow(), 42);
        *value.borrow_mut() = 100;
        assert_eq!(*value.borrow(), 100);
    }

    #[test]
    fn test_thread_safe_option() {
        let slot: ThreadSafeOption<String> = thread_safe_none();
        assert!(slot.lock().is_none());
        *slot.lock() = Some("image".to_string());
        assert_eq!(slot.lock().take().as_deref(), Some("image"));
    }

    #[test]
    fn test_thread_safe_deque() {
        let deque: ThreadSafeDeque<i32> = thread_safe_deque();
        deque.lock().push_back(1);
        deque.lock().push_back(2);
        assert_eq!(deque.lock().drain(..).collect::<Vec<_>>(), vec![1, 2]);
    }
}
