//! Type system utilities and aliases.
//!
//! - [`aliases`]: Type aliases for `Rc<RefCell<T>>`, `Arc<Mutex<Option<T>>>` and friends.

pub mod aliases;

pub use aliases::*;
