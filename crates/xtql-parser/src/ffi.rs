//! C-compatible FFI interface for the XTQL compiler
//!
//! # Memory Ownership Rules
//!
//! - Input strings are borrowed for the duration of the call and never
//!   mutated or retained
//! - A non-NULL pointer returned by `xtql_compile_to_json` belongs to the
//!   caller and must be passed to `xtql_release_output` exactly once
//! - A result from `xtql_compile` must be passed to `xtql_result_free`
//!   exactly once; it releases both `json` and `error_msg`
//! - `xtql_version()` returns a static string that must not be released
//!
//! # Thread Safety
//!
//! The compiler is stateless and thread-safe. Multiple threads can compile
//! concurrently without synchronization.

use std::os::raw::c_char;
use std::ptr;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, warn};
use xtql_ffi_common::{
    catch_panic, cstr_to_bytes, define_string_free, define_version_fn, into_owned_cstring,
    live_buffers, release_owned_cstring, FfiResult, InputError,
};

use crate::compiler::{compile_bytes, CompileOptions};
use crate::xtql::{CompileError, Position};

/// Outcome of a call to `xtql_compile`
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XtqlStatus {
    /// `json` holds the compiled query
    Ok = 0,
    /// The query text is not valid XTQL; position fields are set
    ParseError = 1,
    /// NULL pointer, invalid UTF-8 or oversized input
    InvalidInput = 2,
    /// A bug in the compiler was caught at the boundary
    InternalError = 3,
}

/// C-compatible compile result
#[repr(C)]
#[derive(Debug)]
pub struct XtqlCompileResultC {
    pub status: XtqlStatus,
    /// Compact JSON if status is Ok, else NULL (owned)
    pub json: *mut c_char,
    /// Error message if status is not Ok, else NULL (owned)
    pub error_msg: *mut c_char,
    /// Byte offset of the error (ParseError only)
    pub error_offset: usize,
    /// 1-based line of the error, 0 if unknown
    pub error_line: usize,
    /// 1-based column of the error, 0 if unknown
    pub error_column: usize,
    /// Compile time in microseconds
    pub compile_time_us: u64,
}

impl FfiResult for XtqlCompileResultC {
    type Status = XtqlStatus;
    const ERROR_FALLBACK: &'static str = "xtql compile error";

    fn error_fields(status: XtqlStatus, error_msg: *mut c_char) -> Self {
        Self {
            status,
            json: ptr::null_mut(),
            error_msg,
            error_offset: 0,
            error_line: 0,
            error_column: 0,
            compile_time_us: 0,
        }
    }
}

impl XtqlCompileResultC {
    fn success(json: *mut c_char) -> Self {
        Self {
            status: XtqlStatus::Ok,
            json,
            error_msg: ptr::null_mut(),
            error_offset: 0,
            error_line: 0,
            error_column: 0,
            compile_time_us: 0,
        }
    }

    fn with_position(mut self, position: Position) -> Self {
        self.error_offset = position.offset;
        self.error_line = position.line;
        self.error_column = position.column;
        self
    }
}

/// Why a boundary call produced no JSON
#[derive(Debug, Error)]
enum BoundaryError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Compile(#[from] CompileError),
}

impl BoundaryError {
    fn status(&self) -> XtqlStatus {
        match self {
            BoundaryError::Input(_) => XtqlStatus::InvalidInput,
            BoundaryError::Compile(CompileError::Parse(_)) => XtqlStatus::ParseError,
            BoundaryError::Compile(CompileError::InvalidUtf8 { .. })
            | BoundaryError::Compile(CompileError::InputTooLarge { .. }) => {
                XtqlStatus::InvalidInput
            }
            BoundaryError::Compile(CompileError::Serialization(_)) => XtqlStatus::InternalError,
        }
    }

    fn into_result(self) -> XtqlCompileResultC {
        let status = self.status();
        match self {
            BoundaryError::Compile(CompileError::Parse(e)) => {
                XtqlCompileResultC::error(status, &e.message).with_position(e.position)
            }
            other => XtqlCompileResultC::error(status, &other.to_string()),
        }
    }
}

/// Read the borrowed query and compile it to compact JSON.
///
/// # Safety
/// `query` must be NULL or a valid NUL-terminated string.
unsafe fn compile_input(query: *const c_char) -> Result<String, BoundaryError> {
    let bytes = unsafe { cstr_to_bytes(query) }?;
    let doc = compile_bytes(bytes, &CompileOptions::default())?;
    Ok(doc.to_json_string())
}

// ============================================================================
// Compile Functions
// ============================================================================

/// Compile an XTQL query to JSON.
///
/// # Arguments
/// - `query`: Null-terminated UTF-8 query string
///
/// # Returns
/// A newly allocated NUL-terminated JSON string, or NULL on any failure.
/// Nothing needs releasing when NULL is returned. Use `xtql_compile` to
/// learn why a query failed.
///
/// # Safety
/// - `query` must be NULL or a valid null-terminated string
/// - The returned pointer must be passed to `xtql_release_output` exactly once
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn xtql_compile_to_json(query: *const c_char) -> *mut c_char {
    match catch_panic(|| unsafe { compile_input(query) }) {
        Ok(Ok(json)) => into_owned_cstring(json).unwrap_or_else(|_| {
            warn!("compiled JSON contains a NUL byte");
            ptr::null_mut()
        }),
        Ok(Err(e)) => {
            debug!(error = %e, "xtql_compile_to_json failed");
            ptr::null_mut()
        }
        Err(panic) => {
            warn!(panic = %panic, "panic caught in xtql_compile_to_json");
            ptr::null_mut()
        }
    }
}

/// Compile an XTQL query, reporting failures in detail.
///
/// # Arguments
/// - `query`: Null-terminated UTF-8 query string
///
/// # Returns
/// XtqlCompileResultC with either `json` or `error_msg` set. Caller must
/// call `xtql_result_free` to deallocate.
///
/// # Safety
/// - `query` must be NULL or a valid null-terminated string
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn xtql_compile(query: *const c_char) -> XtqlCompileResultC {
    let start_time = Instant::now();

    let mut result = match catch_panic(|| unsafe { compile_input(query) }) {
        Ok(Ok(json)) => match into_owned_cstring(json) {
            Ok(ptr) => XtqlCompileResultC::success(ptr),
            Err(_) => XtqlCompileResultC::error(
                XtqlStatus::InternalError,
                "compiled JSON contains a NUL byte",
            ),
        },
        Ok(Err(e)) => {
            debug!(error = %e, "xtql_compile failed");
            e.into_result()
        }
        Err(panic) => {
            warn!(panic = %panic, "panic caught in xtql_compile");
            XtqlCompileResultC::error(
                XtqlStatus::InternalError,
                &format!("internal compiler error: {}", panic),
            )
        }
    };

    result.compile_time_us = start_time.elapsed().as_micros() as u64;
    result
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free an XtqlCompileResultC and both of its strings.
///
/// # Safety
/// - `result` must be from `xtql_compile`
/// - `result` must not be used after this call
#[no_mangle]
pub extern "C" fn xtql_result_free(result: XtqlCompileResultC) {
    unsafe {
        release_owned_cstring(result.json);
        release_owned_cstring(result.error_msg);
    }
}

define_string_free!(xtql_release_output);

// ============================================================================
// Housekeeping
// ============================================================================

define_version_fn!(xtql_version);

/// Install the tracing subscriber. Later calls are no-ops.
#[no_mangle]
pub extern "C" fn xtql_init_logger() {
    crate::logging::init();
}

/// Number of output buffers handed out and not yet released.
#[no_mangle]
pub extern "C" fn xtql_live_buffers() -> usize {
    live_buffers()
}
