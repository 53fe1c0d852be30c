use crate::error::Error;
use core::cell::RefCell;

/// Module state touched only from event handlers on the main loop.
pub struct StaticState<T> {
    state: RefCell<Option<T>>,
}

impl<T> StaticState<T> {
    pub const fn new() -> Self {
        Self {
            state: RefCell::new(None),
        }
    }

    pub fn set(&self, state: T) {
        *self.state.borrow_mut() = Some(state);
    }

    pub fn with<F, R>(&self, f: F) -> Result<R, Error>
    where
        F: FnOnce(&mut T) -> Result<R, Error>,
    {
        let mut stref = self.state.borrow_mut();
        let state = stref.as_mut().ok_or(Error::Uninitialized)?;

        f(state)
    }
}

// StaticState is only accessed from the main thread via EventQueue.
// Therefore, no locking is necessary.
#[allow(unsafe_code)]
unsafe impl<T> Sync for StaticState<T> {}
