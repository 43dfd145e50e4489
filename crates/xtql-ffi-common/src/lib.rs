//! Ownership helpers for the XTQL compiler's C-compatible interface.
//!
//! Every string that leaves Rust through the C ABI is allocated here and
//! every release entry point comes back here, so there is exactly one
//! allocation path and one deallocation path for output buffers.
//!
//! # Memory Ownership
//!
//! - Functions returning `*mut c_char` transfer ownership to the caller
//! - The caller hands the pointer back to a release entry point built on
//!   [`release_owned_cstring`], exactly once
//! - Input strings are only borrowed; nothing here keeps a reference to them
//! - NULL pointers are handled safely (no-op for release functions)
//!
//! Outstanding buffers are counted so hosts can detect leaks through
//! [`live_buffers`].

use std::any::Any;
use std::ffi::{CStr, CString, NulError};
use std::os::raw::c_char;
use std::panic::{self, UnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;

/// Number of output buffers handed to the host and not yet released.
static LIVE_BUFFERS: AtomicUsize = AtomicUsize::new(0);

/// Errors from reading a borrowed C string.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum InputError {
    /// The host passed a NULL pointer
    #[error("null query pointer")]
    Null,

    /// The bytes before the terminator are not UTF-8
    #[error("invalid UTF-8 in query at byte {valid_up_to}")]
    InvalidUtf8 { valid_up_to: usize },
}

/// Move a Rust string into a NUL-terminated buffer owned by the caller.
///
/// Fails only if `s` contains an interior NUL byte; nothing is allocated
/// for the caller in that case.
pub fn into_owned_cstring(s: String) -> Result<*mut c_char, NulError> {
    let c_string = CString::new(s)?;
    LIVE_BUFFERS.fetch_add(1, Ordering::Relaxed);
    Ok(c_string.into_raw())
}

/// Like [`into_owned_cstring`], but substitutes `fallback` when `s` holds
/// an interior NUL byte. Used for diagnostic messages, which must always
/// reach the host.
pub fn owned_cstring_or_fallback(s: &str, fallback: &'static str) -> *mut c_char {
    into_owned_cstring(s.to_owned())
        .or_else(|_| into_owned_cstring(fallback.to_owned()))
        .unwrap_or(std::ptr::null_mut())
}

/// Release a buffer previously returned by [`into_owned_cstring`].
///
/// Does nothing if the pointer is null.
///
/// # Safety
/// The pointer must have come from [`into_owned_cstring`] (or
/// [`owned_cstring_or_fallback`]) and must not have been released before.
/// Any other pointer, or a second release of the same pointer, is undefined
/// behavior.
pub unsafe fn release_owned_cstring(ptr: *mut c_char) {
    if ptr.is_null() {
        return;
    }
    unsafe {
        drop(CString::from_raw(ptr));
    }
    LIVE_BUFFERS.fetch_sub(1, Ordering::Relaxed);
}

/// Number of output buffers currently owned by the host.
pub fn live_buffers() -> usize {
    LIVE_BUFFERS.load(Ordering::Relaxed)
}

/// Borrow the bytes of a NUL-terminated C string, excluding the terminator.
///
/// # Safety
/// The pointer must be null or point to a NUL-terminated buffer that stays
/// valid and unmodified for `'a`.
pub unsafe fn cstr_to_bytes<'a>(ptr: *const c_char) -> Result<&'a [u8], InputError> {
    if ptr.is_null() {
        return Err(InputError::Null);
    }
    Ok(unsafe { CStr::from_ptr(ptr) }.to_bytes())
}

/// Borrow a NUL-terminated C string as `&str`.
///
/// # Safety
/// Same contract as [`cstr_to_bytes`].
pub unsafe fn cstr_to_str<'a>(ptr: *const c_char) -> Result<&'a str, InputError> {
    let bytes = unsafe { cstr_to_bytes(ptr) }?;
    std::str::from_utf8(bytes).map_err(|e| InputError::InvalidUtf8 {
        valid_up_to: e.valid_up_to(),
    })
}

/// Run `f`, converting a panic into its message so it never unwinds
/// across the C ABI.
pub fn catch_panic<T, F>(f: F) -> Result<T, String>
where
    F: FnOnce() -> T + UnwindSafe,
{
    panic::catch_unwind(f).map_err(|payload| panic_message(payload.as_ref()))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}

/// Trait for `#[repr(C)]` result structs that carry a status and an
/// optional owned error message.
///
/// # Example
/// ```ignore
/// impl FfiResult for MyResultC {
///     type Status = MyStatus;
///     const ERROR_FALLBACK: &'static str = "unknown error";
///
///     fn error_fields(status: MyStatus, error_msg: *mut c_char) -> Self {
///         Self { status, error_msg, data: ptr::null_mut() }
///     }
/// }
///
/// let result = MyResultC::error(MyStatus::InvalidInput, "null query pointer");
/// ```
pub trait FfiResult: Sized {
    /// Status discriminant reported to the host
    type Status: Copy;

    /// Fallback message used when the error message contains NUL bytes.
    const ERROR_FALLBACK: &'static str;

    /// Build the error-state struct around an already-allocated message.
    fn error_fields(status: Self::Status, error_msg: *mut c_char) -> Self;

    /// Create an error result with the given status and message.
    #[inline]
    fn error(status: Self::Status, msg: &str) -> Self {
        let error_msg = owned_cstring_or_fallback(msg, Self::ERROR_FALLBACK);
        Self::error_fields(status, error_msg)
    }
}

/// Generate a version function that returns a static C string.
///
/// The returned pointer is not owned by the caller and must never be
/// released.
#[macro_export]
macro_rules! define_version_fn {
    ($fn_name:ident) => {
        #[no_mangle]
        pub extern "C" fn $fn_name() -> *const std::os::raw::c_char {
            concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr() as *const std::os::raw::c_char
        }
    };
}

/// Generate the release entry point paired with [`into_owned_cstring`].
#[macro_export]
macro_rules! define_string_free {
    ($fn_name:ident) => {
        #[no_mangle]
        #[allow(clippy::not_unsafe_ptr_arg_deref)]
        pub extern "C" fn $fn_name(s: *mut std::os::raw::c_char) {
            unsafe { $crate::release_owned_cstring(s) };
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;

    #[test]
    fn test_into_owned_cstring_roundtrip() {
        let ptr = into_owned_cstring("hello".to_string()).unwrap();
        assert!(!ptr.is_null());
        let s = unsafe { CStr::from_ptr(ptr) }.to_str().unwrap();
        assert_eq!(s, "hello");
        unsafe { release_owned_cstring(ptr) };
    }

    #[test]
    fn test_into_owned_cstring_rejects_interior_nul() {
        assert!(into_owned_cstring("hel\0lo".to_string()).is_err());
    }

    #[test]
    fn test_fallback_used_for_interior_nul() {
        let ptr = owned_cstring_or_fallback("hel\0lo", "fallback");
        assert!(!ptr.is_null());
        let s = unsafe { CStr::from_ptr(ptr) }.to_str().unwrap();
        assert_eq!(s, "fallback");
        unsafe { release_owned_cstring(ptr) };
    }

    #[test]
    fn test_release_null_is_safe() {
        unsafe { release_owned_cstring(ptr::null_mut()) };
    }

    #[test]
    fn test_cstr_to_str_null() {
        let result = unsafe { cstr_to_str(ptr::null()) };
        assert_eq!(result, Err(InputError::Null));
    }

    #[test]
    fn test_cstr_to_str_invalid_utf8() {
        let bytes = CString::new(vec![b'a', b'b', 0xff, b'c']).unwrap();
        let result = unsafe { cstr_to_str(bytes.as_ptr()) };
        assert_eq!(result, Err(InputError::InvalidUtf8 { valid_up_to: 2 }));
    }

    #[test]
    fn test_cstr_to_bytes_stops_at_terminator() {
        let s = CString::new("query").unwrap();
        let bytes = unsafe { cstr_to_bytes(s.as_ptr()) }.unwrap();
        assert_eq!(bytes, b"query");
    }

    #[test]
    fn test_catch_panic_returns_message() {
        let result: Result<(), String> = catch_panic(|| panic!("boom"));
        assert_eq!(result.unwrap_err(), "boom");

        let formatted: Result<(), String> = catch_panic(|| panic!("code {}", 7));
        assert_eq!(formatted.unwrap_err(), "code 7");
    }

    #[test]
    fn test_catch_panic_passes_value_through() {
        assert_eq!(catch_panic(|| 42), Ok(42));
    }
}
