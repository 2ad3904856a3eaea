///
/// Native status code protocol.
///
/// A zero status is success. Anything else becomes `Error::NativeFailure`
/// carrying the engine's message: `sqlite3_errmsg` for the connection when
/// one exists, `sqlite3_errstr` for the bare code otherwise.
///

use std::ffi::{c_char, c_int, CStr};

use rusqlite::ffi;
use sqlo_core::{Error, Result};

pub(crate) fn check(code: c_int, db: *mut ffi::sqlite3) -> Result<()> {
    if code == ffi::SQLITE_OK {
        Ok(())
    } else {
        Err(native_failure(code, db))
    }
}

pub(crate) fn native_failure(code: c_int, db: *mut ffi::sqlite3) -> Error {
    let message = if db.is_null() {
        None
    } else {
        unsafe { text_from(ffi::sqlite3_errmsg(db)) }
    };
    Error::NativeFailure {
        code,
        message: message.unwrap_or_else(|| errstr(code)),
    }
}

/// Failure for a code raised without a connection, e.g. an allocation that
/// the engine could not satisfy.
pub(crate) fn code_failure(code: c_int) -> Error {
    Error::NativeFailure {
        code,
        message: errstr(code),
    }
}

pub(crate) fn errstr(code: c_int) -> String {
    unsafe { text_from(ffi::sqlite3_errstr(code)) }.unwrap_or_default()
}

/// Interprets the status of one `sqlite3_step` call.
/// Returns true when a row is available.
pub(crate) fn step_result(code: c_int, db: *mut ffi::sqlite3) -> Result<bool> {
    match code {
        ffi::SQLITE_ROW => Ok(true),
        ffi::SQLITE_DONE => Ok(false),
        _ => Err(native_failure(code, db)),
    }
}

/// Copies a NUL-terminated engine string.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string that stays valid
/// for the duration of the call.
pub(crate) unsafe fn text_from(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    let text = unsafe { CStr::from_ptr(ptr) };
    Some(text.to_string_lossy().into_owned())
}
