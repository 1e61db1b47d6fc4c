//! Creation-time settings for a [`ChainTable`](crate::ChainTable).

use crate::error::TableError;
use crate::hash::{KeyHash, Sdbm};
use crate::table::ChainTable;

/// Initial bucket count. Prime, to spread `hash % capacity`.
pub const DEFAULT_CAPACITY: usize = 31;
/// Bucket array multiplier applied on growth.
pub const DEFAULT_GROWTH_FACTOR: usize = 2;
/// Growth triggers when `len + 1 > capacity * load_factor`.
pub const DEFAULT_LOAD_FACTOR: f64 = 0.7;

/// Builder for a table. Validation happens in [`TableConfig::build`].
pub struct TableConfig {
    pub(crate) capacity: usize,
    pub(crate) growth_factor: usize,
    pub(crate) load_factor: f64,
    pub(crate) hasher: Box<dyn KeyHash>,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            growth_factor: DEFAULT_GROWTH_FACTOR,
            load_factor: DEFAULT_LOAD_FACTOR,
            hasher: Box::new(Sdbm),
        }
    }
}

impl core::fmt::Debug for TableConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TableConfig")
            .field("capacity", &self.capacity)
            .field("growth_factor", &self.growth_factor)
            .field("load_factor", &self.load_factor)
            .finish_non_exhaustive()
    }
}

impl TableConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of buckets allocated up front. Must be non-zero.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Multiplier for the bucket count on growth. Must be at least 2.
    pub fn growth_factor(mut self, factor: usize) -> Self {
        self.growth_factor = factor;
        self
    }

    /// Maximum `len / capacity` ratio tolerated after an insert. Must be
    /// finite and positive; values above 1.0 are allowed since chains hold
    /// any number of entries.
    pub fn load_factor(mut self, load_factor: f64) -> Self {
        self.load_factor = load_factor;
        self
    }

    pub fn hasher<H: KeyHash + 'static>(mut self, hasher: H) -> Self {
        self.hasher = Box::new(hasher);
        self
    }

    pub(crate) fn validate(&self) -> Result<(), TableError> {
        if self.capacity == 0 {
            return Err(TableError::InvalidArgument("capacity must be non-zero"));
        }
        if self.growth_factor < 2 {
            return Err(TableError::InvalidArgument("growth factor must be at least 2"));
        }
        if !self.load_factor.is_finite() || self.load_factor <= 0.0 {
            return Err(TableError::InvalidArgument(
                "load factor must be finite and positive",
            ));
        }
        Ok(())
    }

    pub fn build<'v>(self) -> Result<ChainTable<'v>, TableError> {
        ChainTable::from_config(self)
    }
}
