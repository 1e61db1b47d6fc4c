//! C ABI over [`ChainTable`] with integer status codes.
//!
//! Handles are opaque `HashTable` pointers from [`ht_init`] and must be
//! released exactly once with [`ht_free`]. Values are passed as
//! pointer + size with a free-function tag:
//! - null (`HT_TRANSIENT`): the table copies the bytes;
//! - `(void*)-1` (`HT_STATIC`): the table keeps the pointer, never frees it;
//! - any other function: the table keeps the pointer and calls the
//!   function on it once, at removal or teardown.
//!
//! A call made on a handle from inside one of its own hash or free
//! callbacks is rejected with `HT_MISUSE` (`false` for `ht_has_key`).
#![allow(non_camel_case_types)]

use crate::error::{ErrorKind, TableError};
use crate::hash::KeyHash;
use crate::reentrancy::Reentrancy;
use crate::table::ChainTable;
use crate::value::{Ownership, Release};
use core::cell::UnsafeCell;
use core::ffi::{c_char, c_int, c_void};
use std::ffi::CStr;

pub const HT_OK: c_int = 0;
pub const HT_NOT_FOUND: c_int = 10;
pub const HT_DUPLICATE: c_int = 11;
pub const HT_ALLOC_ERR: c_int = 12;
pub const HT_ARG_NULL: c_int = 13;
/// Reserved; no operation currently reports it.
pub const HT_CORRUPTED: c_int = 14;
pub const HT_MISUSE: c_int = 15;

/// Size reported for a null handle or a missing item.
pub const HT_NO_SIZE: ht_size_t = ht_size_t::MAX;

/// Address of the `HT_STATIC` free-function sentinel.
pub const HT_STATIC_ADDR: usize = usize::MAX;

pub type ht_size_t = u32;
pub type ht_hash_t = u64;
pub type ht_free_func_t = Option<unsafe extern "C" fn(*mut c_void)>;
pub type ht_hash_func_t = Option<unsafe extern "C" fn(*const c_void, ht_size_t) -> ht_hash_t>;

/// The `HT_STATIC` tag as a Rust value. Never called.
pub fn ht_static() -> ht_free_func_t {
    // SAFETY: function pointers only need to be non-null; this one is
    // compared by address and never invoked.
    Some(unsafe {
        core::mem::transmute::<usize, unsafe extern "C" fn(*mut c_void)>(HT_STATIC_ADDR)
    })
}

fn is_static(f: unsafe extern "C" fn(*mut c_void)) -> bool {
    f as usize == HT_STATIC_ADDR
}

/// Opaque table handle.
pub struct HashTable {
    guard: Reentrancy,
    // `None` only while `ht_free` is tearing the table down.
    table: UnsafeCell<Option<ChainTable<'static>>>,
}

/// Caller memory released through a C free function.
struct ForeignValue {
    data: *mut c_void,
    len: usize,
    free: unsafe extern "C" fn(*mut c_void),
}

impl Release for ForeignValue {
    fn bytes(&self) -> &[u8] {
        // SAFETY: the inserting caller guarantees `data` is valid for
        // `len` bytes until the table frees it.
        unsafe { core::slice::from_raw_parts(self.data as *const u8, self.len) }
    }

    fn release(self: Box<Self>) {
        // SAFETY: called once, with the pointer the caller handed over.
        unsafe { (self.free)(self.data) }
    }
}

struct ForeignHash(unsafe extern "C" fn(*const c_void, ht_size_t) -> ht_hash_t);

impl KeyHash for ForeignHash {
    fn hash_key(&self, key: &[u8]) -> u64 {
        // Keys only enter through this module, and `cstr_key` rejects any
        // longer than ht_size_t can describe.
        // SAFETY: the callback receives a pointer valid for `key.len()` bytes.
        unsafe { (self.0)(key.as_ptr() as *const c_void, key.len() as ht_size_t) }
    }
}

fn status(e: &TableError) -> c_int {
    match e.kind() {
        ErrorKind::InvalidArgument => HT_ARG_NULL,
        ErrorKind::Alloc => HT_ALLOC_ERR,
        ErrorKind::DuplicateKey => HT_DUPLICATE,
        ErrorKind::NotFound => HT_NOT_FOUND,
        ErrorKind::Misuse => HT_MISUSE,
    }
}

fn to_status(r: Result<(), TableError>) -> c_int {
    match r {
        Ok(()) => HT_OK,
        Err(e) => status(&e),
    }
}

/// Run `f` on the table behind `pht`. `Err` carries the status for a null
/// handle or a reentrant call.
unsafe fn with_table<R>(
    pht: *mut HashTable,
    f: impl FnOnce(&mut ChainTable<'static>) -> R,
) -> Result<R, c_int> {
    let Some(handle) = pht.as_ref() else {
        return Err(HT_ARG_NULL);
    };
    let Some(_g) = handle.guard.try_enter() else {
        return Err(HT_MISUSE);
    };
    match &mut *handle.table.get() {
        Some(t) => Ok(f(t)),
        None => Err(HT_MISUSE),
    }
}

unsafe fn bytes<'a>(p: *const c_void, len: ht_size_t) -> &'a [u8] {
    core::slice::from_raw_parts(p as *const u8, len as usize)
}

/// Create a table and store its handle in `*pp_ht`.
///
/// # Safety
/// `pp_ht` must be null or valid for writes.
#[no_mangle]
pub unsafe extern "C" fn ht_init(pp_ht: *mut *mut HashTable) -> c_int {
    if pp_ht.is_null() {
        return HT_ARG_NULL;
    }
    match ChainTable::new() {
        Ok(table) => {
            let handle = Box::new(HashTable {
                guard: Reentrancy::new(),
                table: UnsafeCell::new(Some(table)),
            });
            *pp_ht = Box::into_raw(handle);
            HT_OK
        }
        Err(e) => status(&e),
    }
}

/// Release the table and every entry. Null is a no-op, as is a call from
/// inside one of the table's own callbacks.
///
/// # Safety
/// `p_ht` must be null or a live handle from [`ht_init`]; it is invalid
/// afterwards.
#[no_mangle]
pub unsafe extern "C" fn ht_free(p_ht: *mut HashTable) {
    let Some(handle) = p_ht.as_ref() else {
        return;
    };
    {
        let Some(_g) = handle.guard.try_enter() else {
            return;
        };
        // Free callbacks run here, with the guard held.
        drop((*handle.table.get()).take());
    }
    drop(Box::from_raw(p_ht));
}

unsafe fn insert_bytes(
    p_ht: *mut HashTable,
    key: &[u8],
    p_data: *mut c_void,
    data_size: ht_size_t,
    pfn_free: ht_free_func_t,
) -> c_int {
    let value = match pfn_free {
        None => Ownership::Copy(bytes(p_data, data_size)),
        Some(f) if is_static(f) => Ownership::Borrowed(bytes(p_data, data_size)),
        Some(free) => Ownership::Custom(Box::new(ForeignValue {
            data: p_data,
            len: data_size as usize,
            free,
        })),
    };
    with_table(p_ht, |t| to_status(t.insert(key, value))).unwrap_or_else(|s| s)
}

/// Insert a copy of the key and the value under the `pfn_free` policy.
/// Returns `HT_DUPLICATE` if the key exists; nothing is freed then.
///
/// # Safety
/// `p_key` must be valid for `key_size` bytes and `p_data` for
/// `data_size` bytes. Unless `pfn_free` is null, `p_data` must stay valid
/// until the entry is removed or the table freed.
#[no_mangle]
pub unsafe extern "C" fn ht_insert(
    p_ht: *mut HashTable,
    p_key: *const c_void,
    key_size: ht_size_t,
    p_data: *mut c_void,
    data_size: ht_size_t,
    pfn_free: ht_free_func_t,
) -> c_int {
    if p_ht.is_null() || p_key.is_null() || p_data.is_null() {
        return HT_ARG_NULL;
    }
    insert_bytes(p_ht, bytes(p_key, key_size), p_data, data_size, pfn_free)
}

unsafe fn get_bytes(
    p_ht: *mut HashTable,
    key: &[u8],
    pp_data: *mut *mut c_void,
    p_data_size: *mut ht_size_t,
) -> c_int {
    let found = with_table(p_ht, |t| {
        t.get(key).map(|v| (v.as_ptr() as *mut c_void, v.len() as ht_size_t))
    });
    match found {
        Ok(Some((data, size))) => {
            *pp_data = data;
            *p_data_size = size;
            HT_OK
        }
        Ok(None) => {
            *pp_data = core::ptr::null_mut();
            *p_data_size = HT_NO_SIZE;
            HT_NOT_FOUND
        }
        Err(s) => s,
    }
}

/// Look up `p_key`, writing the stored value pointer and size.
///
/// # Safety
/// `p_key` must be valid for `key_size` bytes; the out-pointers must be
/// valid for writes.
#[no_mangle]
pub unsafe extern "C" fn ht_get_item(
    p_ht: *mut HashTable,
    p_key: *const c_void,
    key_size: ht_size_t,
    pp_data: *mut *mut c_void,
    p_data_size: *mut ht_size_t,
) -> c_int {
    if p_ht.is_null() || p_key.is_null() || pp_data.is_null() || p_data_size.is_null() {
        return HT_ARG_NULL;
    }
    get_bytes(p_ht, bytes(p_key, key_size), pp_data, p_data_size)
}

/// Number of entries, or `HT_NO_SIZE` for a null handle.
///
/// # Safety
/// `p_ht` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn ht_get_size(p_ht: *mut HashTable) -> ht_size_t {
    with_table(p_ht, |t| ht_size_t::try_from(t.len()).unwrap_or(HT_NO_SIZE - 1))
        .unwrap_or(HT_NO_SIZE)
}

/// 1 if the key is present, 0 otherwise, including for null arguments.
///
/// # Safety
/// `p_key` must be null or valid for `key_size` bytes.
#[no_mangle]
pub unsafe extern "C" fn ht_has_key(
    p_ht: *mut HashTable,
    p_key: *const c_void,
    key_size: ht_size_t,
) -> c_int {
    if p_key.is_null() {
        return 0;
    }
    let key = bytes(p_key, key_size);
    with_table(p_ht, |t| t.contains_key(key) as c_int).unwrap_or(0)
}

/// Remove `p_key`, freeing its value under the policy it was inserted with.
///
/// # Safety
/// `p_key` must be valid for `key_size` bytes.
#[no_mangle]
pub unsafe extern "C" fn ht_remove(
    p_ht: *mut HashTable,
    p_key: *const c_void,
    key_size: ht_size_t,
) -> c_int {
    if p_ht.is_null() || p_key.is_null() {
        return HT_ARG_NULL;
    }
    let key = bytes(p_key, key_size);
    with_table(p_ht, |t| to_status(t.remove(key))).unwrap_or_else(|s| s)
}

/// Replace the hash function; `HT_MISUSE` unless the table is empty.
///
/// # Safety
/// `p_ht` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn ht_set_hash_func(p_ht: *mut HashTable, pfn: ht_hash_func_t) -> c_int {
    let Some(f) = pfn else {
        return HT_ARG_NULL;
    };
    with_table(p_ht, |t| to_status(t.set_hash_function(ForeignHash(f)))).unwrap_or_else(|s| s)
}

fn key_len_fits(len: usize) -> bool {
    ht_size_t::try_from(len).is_ok()
}

/// Key bytes of a C string, terminator included. `None` for a null pointer
/// or a key too long to pass to a hash callback.
unsafe fn cstr_key<'a>(pz_key: *const c_char) -> Option<&'a [u8]> {
    if pz_key.is_null() {
        return None;
    }
    let key = CStr::from_ptr(pz_key).to_bytes_with_nul();
    key_len_fits(key.len()).then_some(key)
}

/// [`ht_get_item`] with a NUL-terminated key, terminator included.
///
/// # Safety
/// `pz_key` must be null or a valid C string; see [`ht_get_item`].
#[no_mangle]
pub unsafe extern "C" fn ht_strk_get_item(
    p_ht: *mut HashTable,
    pz_key: *const c_char,
    pp_data: *mut *mut c_void,
    p_data_size: *mut ht_size_t,
) -> c_int {
    let Some(key) = cstr_key(pz_key) else {
        return HT_ARG_NULL;
    };
    if p_ht.is_null() || pp_data.is_null() || p_data_size.is_null() {
        return HT_ARG_NULL;
    }
    get_bytes(p_ht, key, pp_data, p_data_size)
}

/// [`ht_has_key`] with a NUL-terminated key.
///
/// # Safety
/// `pz_key` must be null or a valid C string.
#[no_mangle]
pub unsafe extern "C" fn ht_strk_has_key(p_ht: *mut HashTable, pz_key: *const c_char) -> c_int {
    let Some(key) = cstr_key(pz_key) else {
        return 0;
    };
    with_table(p_ht, |t| t.contains_key(key) as c_int).unwrap_or(0)
}

/// [`ht_insert`] with a NUL-terminated key.
///
/// # Safety
/// `pz_key` must be null or a valid C string; see [`ht_insert`].
#[no_mangle]
pub unsafe extern "C" fn ht_strk_insert(
    p_ht: *mut HashTable,
    pz_key: *const c_char,
    p_data: *mut c_void,
    data_size: ht_size_t,
    pfn_free: ht_free_func_t,
) -> c_int {
    let Some(key) = cstr_key(pz_key) else {
        return HT_ARG_NULL;
    };
    if p_ht.is_null() || p_data.is_null() {
        return HT_ARG_NULL;
    }
    insert_bytes(p_ht, key, p_data, data_size, pfn_free)
}

/// [`ht_remove`] with a NUL-terminated key.
///
/// # Safety
/// `pz_key` must be null or a valid C string.
#[no_mangle]
pub unsafe extern "C" fn ht_strk_remove(p_ht: *mut HashTable, pz_key: *const c_char) -> c_int {
    let Some(key) = cstr_key(pz_key) else {
        return HT_ARG_NULL;
    };
    with_table(p_ht, |t| to_status(t.remove(key))).unwrap_or_else(|s| s)
}
