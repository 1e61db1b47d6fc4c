//! Text keys. A key is its bytes plus the terminating NUL, forwarded to
//! the byte-key operations unchanged, so `insert_str(c"k")` and
//! `insert(b"k\0")` address the same entry.

use crate::error::TableError;
use crate::table::ChainTable;
use crate::value::Ownership;
use std::ffi::CStr;

fn with_nul(key: &str) -> Result<Vec<u8>, TableError> {
    if key.as_bytes().contains(&0) {
        return Err(TableError::InvalidArgument("text key contains a NUL byte"));
    }
    let mut out = Vec::new();
    out.try_reserve_exact(key.len() + 1)?;
    out.extend_from_slice(key.as_bytes());
    out.push(0);
    Ok(out)
}

impl<'v> ChainTable<'v> {
    pub fn insert_str(&mut self, key: &CStr, value: Ownership<'_, 'v>) -> Result<(), TableError> {
        self.insert(key.to_bytes_with_nul(), value)
    }

    pub fn get_str(&self, key: &CStr) -> Option<&[u8]> {
        self.get(key.to_bytes_with_nul())
    }

    pub fn contains_str(&self, key: &CStr) -> bool {
        self.contains_key(key.to_bytes_with_nul())
    }

    pub fn remove_str(&mut self, key: &CStr) -> Result<(), TableError> {
        self.remove(key.to_bytes_with_nul())
    }

    /// Like [`insert_str`](Self::insert_str); rejects keys with interior NULs.
    pub fn insert_text(&mut self, key: &str, value: Ownership<'_, 'v>) -> Result<(), TableError> {
        let key = with_nul(key)?;
        self.insert(&key, value)
    }

    pub fn get_text(&self, key: &str) -> Result<Option<&[u8]>, TableError> {
        let key = with_nul(key)?;
        Ok(self.get(&key))
    }

    /// `false` for absent keys and for keys that cannot be text keys.
    pub fn contains_text(&self, key: &str) -> bool {
        with_nul(key).map_or(false, |k| self.contains_key(&k))
    }

    pub fn remove_text(&mut self, key: &str) -> Result<(), TableError> {
        let key = with_nul(key)?;
        self.remove(&key)
    }
}
