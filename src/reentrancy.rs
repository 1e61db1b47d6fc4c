//! Reentrancy detection for handles shared with foreign code.
//!
//! A C caller holds a raw table pointer and may call back into the same
//! table from a hash or free callback while an operation is in progress.
//! Each entry point takes the guard first and reports misuse instead of
//! creating a second mutable view of the table.

use core::cell::Cell;
use core::marker::PhantomData;

#[derive(Debug)]
pub(crate) struct Reentrancy {
    busy: Cell<bool>,
    // Single-threaded: keep !Send + !Sync.
    _nosend: PhantomData<*mut ()>,
}

impl Reentrancy {
    pub(crate) const fn new() -> Self {
        Self {
            busy: Cell::new(false),
            _nosend: PhantomData,
        }
    }

    /// `None` if an operation is already running on this owner.
    #[inline]
    pub(crate) fn try_enter(&self) -> Option<ReentryGuard<'_>> {
        if self.busy.replace(true) {
            return None;
        }
        Some(ReentryGuard { owner: self })
    }
}

/// Clears the busy flag on drop.
pub(crate) struct ReentryGuard<'a> {
    owner: &'a Reentrancy,
}

impl Drop for ReentryGuard<'_> {
    fn drop(&mut self) {
        debug_assert!(self.owner.busy.get());
        self.owner.busy.set(false);
    }
}
