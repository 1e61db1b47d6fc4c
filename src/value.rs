//! Per-entry value ownership.
//!
//! Every insert picks how the table holds the value:
//! - [`Ownership::Copy`]: the table allocates its own copy and frees it.
//! - [`Ownership::Borrowed`]: the table keeps a borrow and never frees it.
//!   The borrow must outlive the table (`'v`).
//! - [`Ownership::Custom`]: the table holds a [`Release`] capability and
//!   calls [`Release::release`] exactly once, when the entry is removed or
//!   the table is dropped.
//!
//! A custom value whose insert fails is dropped without being released;
//! its data is dropped normally.

use std::collections::TryReserveError;

/// Value whose release is delegated to caller code.
pub trait Release {
    /// The bytes returned by lookups.
    fn bytes(&self) -> &[u8];

    /// Consume the value. Called at most once, after the entry has been
    /// unlinked from the table.
    fn release(self: Box<Self>);
}

/// A [`Release`] built from owned data and a closure receiving it back.
pub struct Custom<T, F> {
    data: T,
    release: F,
}

impl<T, F> Custom<T, F>
where
    T: AsRef<[u8]>,
    F: FnOnce(T),
{
    pub fn new(data: T, release: F) -> Self {
        Self { data, release }
    }
}

impl<T, F> Release for Custom<T, F>
where
    T: AsRef<[u8]>,
    F: FnOnce(T),
{
    fn bytes(&self) -> &[u8] {
        self.data.as_ref()
    }

    fn release(self: Box<Self>) {
        let Custom { data, release } = *self;
        release(data)
    }
}

/// Ownership tag plus value, as passed to insert.
pub enum Ownership<'a, 'v> {
    Copy(&'a [u8]),
    Borrowed(&'v [u8]),
    Custom(Box<dyn Release + 'v>),
}

impl<'a, 'v> Ownership<'a, 'v> {
    /// Shorthand for `Ownership::Custom(Box::new(Custom::new(data, release)))`.
    pub fn custom<T, F>(data: T, release: F) -> Self
    where
        T: AsRef<[u8]> + 'v,
        F: FnOnce(T) + 'v,
    {
        Ownership::Custom(Box::new(Custom::new(data, release)))
    }

    pub(crate) fn into_stored(self) -> Result<Stored<'v>, TryReserveError> {
        Ok(match self {
            Ownership::Copy(bytes) => Stored::Owned(copy_bytes(bytes)?),
            Ownership::Borrowed(bytes) => Stored::Borrowed(bytes),
            Ownership::Custom(r) => Stored::Custom(Some(r)),
        })
    }
}

/// Copy `src` into a fresh exact-size allocation, reporting failure
/// instead of aborting.
pub(crate) fn copy_bytes(src: &[u8]) -> Result<Box<[u8]>, TryReserveError> {
    let mut v = Vec::new();
    v.try_reserve_exact(src.len())?;
    v.extend_from_slice(src);
    Ok(v.into_boxed_slice())
}

/// Value as held by an entry. Dropping it applies the release policy.
pub(crate) enum Stored<'v> {
    Owned(Box<[u8]>),
    Borrowed(&'v [u8]),
    // `None` only transiently inside `drop`.
    Custom(Option<Box<dyn Release + 'v>>),
}

impl<'v> Stored<'v> {
    pub(crate) fn bytes(&self) -> &[u8] {
        match self {
            Stored::Owned(b) => &b[..],
            Stored::Borrowed(b) => *b,
            Stored::Custom(r) => r.as_deref().map_or(&[][..], |r| r.bytes()),
        }
    }
}

impl Drop for Stored<'_> {
    fn drop(&mut self) {
        if let Stored::Custom(slot) = self {
            if let Some(r) = slot.take() {
                r.release();
            }
        }
    }
}

impl core::fmt::Debug for Stored<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let tag = match self {
            Stored::Owned(_) => "Owned",
            Stored::Borrowed(_) => "Borrowed",
            Stored::Custom(_) => "Custom",
        };
        f.debug_struct(tag).field("len", &self.bytes().len()).finish()
    }
}
