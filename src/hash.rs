//! Key hashing: the default SDBM function and the replaceable-hash seam.
//!
//! The table hashes raw key bytes exactly as given. Nothing here appends a
//! length prefix or a terminator, so `hash_key(b"ab")` and
//! `hash_key(b"ab\0")` differ.

use core::hash::{BuildHasher, Hasher};

/// A hash function over raw key bytes, installed on a table.
///
/// Implemented for every `Fn(&[u8]) -> u64`, so plain functions and
/// closures can be passed directly.
pub trait KeyHash {
    fn hash_key(&self, key: &[u8]) -> u64;
}

impl<F> KeyHash for F
where
    F: Fn(&[u8]) -> u64,
{
    #[inline]
    fn hash_key(&self, key: &[u8]) -> u64 {
        self(key)
    }
}

/// SDBM over `key`: `h = byte + (h << 6) + (h << 16) - h`, wrapping.
#[inline]
pub fn sdbm(key: &[u8]) -> u64 {
    key.iter().fold(0u64, |h, &b| sdbm_step(h, b))
}

#[inline]
fn sdbm_step(h: u64, b: u8) -> u64 {
    (b as u64)
        .wrapping_add(h << 6)
        .wrapping_add(h << 16)
        .wrapping_sub(h)
}

/// The default table hash function.
#[derive(Copy, Clone, Debug, Default)]
pub struct Sdbm;

impl KeyHash for Sdbm {
    #[inline]
    fn hash_key(&self, key: &[u8]) -> u64 {
        sdbm(key)
    }
}

/// Streaming SDBM state, usable anywhere a `core::hash::Hasher` is.
#[derive(Copy, Clone, Debug, Default)]
pub struct SdbmHasher {
    state: u64,
}

impl Hasher for SdbmHasher {
    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        self.state = bytes.iter().fold(self.state, |h, &b| sdbm_step(h, b));
    }

    #[inline]
    fn finish(&self) -> u64 {
        self.state
    }
}

#[derive(Copy, Clone, Debug, Default)]
pub struct SdbmBuildHasher;

impl BuildHasher for SdbmBuildHasher {
    type Hasher = SdbmHasher;
    fn build_hasher(&self) -> Self::Hasher {
        SdbmHasher::default()
    }
}

/// Adapts a `BuildHasher` into a table hash function by writing the key
/// bytes once into a fresh hasher.
#[derive(Clone, Debug, Default)]
pub struct BuildHasherKeyHash<S>(pub S);

impl<S: BuildHasher> KeyHash for BuildHasherKeyHash<S> {
    fn hash_key(&self, key: &[u8]) -> u64 {
        let mut h = self.0.build_hasher();
        h.write(key);
        h.finish()
    }
}
