///
/// Dispatch of classified values to the native bind setters.
///
/// Routing:
/// - Null    -> sqlite3_bind_null
/// - Number  -> sqlite3_bind_int / sqlite3_bind_int64 / sqlite3_bind_double
/// - Boolean -> sqlite3_bind_int with 0 or 1
/// - Text    -> engine-heap copy, sqlite3_bind_text64 (UTF-8)
/// - Blob    -> engine-heap copy, sqlite3_bind_blob64
///
/// Once the engine accepts a binding, whatever buffer previously backed the
/// same position is released. When it rejects one, the previous binding and
/// its buffer stay in place and the rejected buffer is freed.
///

use std::ffi::{c_int, c_uchar};

use rusqlite::ffi;
use sqlo_core::{BindValue, NumberBinding, Result};
use tracing::trace;

use crate::memory::ForeignBuffer;
use crate::param::{self, ParamKey};
use crate::result::{check, code_failure};
use crate::statement::StatementState;

pub(crate) struct Binder<'s> {
    db: *mut ffi::sqlite3,
    state: &'s mut StatementState,
    parameter_count: usize,
}

impl<'s> Binder<'s> {
    pub(crate) fn new(
        db: *mut ffi::sqlite3,
        state: &'s mut StatementState,
        parameter_count: usize,
    ) -> Self {
        Self {
            db,
            state,
            parameter_count,
        }
    }

    /// Resolves `key` and binds the already-classified `value` there.
    pub(crate) fn bind(&mut self, key: &ParamKey<'_>, value: BindValue<'_>) -> Result<()> {
        let position = param::resolve(self.state.raw(), self.parameter_count, key)?;
        trace!(%key, position, kind = %value.bind_type(), "bind");
        self.dispatch(position, value)
    }

    fn dispatch(&mut self, position: c_int, value: BindValue<'_>) -> Result<()> {
        let stmt = self.state.raw();
        let rc = match value {
            BindValue::Null => unsafe { ffi::sqlite3_bind_null(stmt, position) },
            BindValue::Number(n) => match n.binding() {
                NumberBinding::Int32(v) => unsafe { ffi::sqlite3_bind_int(stmt, position, v) },
                NumberBinding::Int64(v) => unsafe { ffi::sqlite3_bind_int64(stmt, position, v) },
                NumberBinding::Double(v) => unsafe {
                    ffi::sqlite3_bind_double(stmt, position, v)
                },
            },
            BindValue::Boolean(b) => unsafe {
                ffi::sqlite3_bind_int(stmt, position, c_int::from(b))
            },
            BindValue::Text(s) => return self.bind_buffer(position, s.as_bytes(), true),
            BindValue::Blob(b) => return self.bind_buffer(position, b, false),
        };
        check(rc, self.db)?;
        self.state.allocations_mut().release_position(position);
        Ok(())
    }

    fn bind_buffer(&mut self, position: c_int, bytes: &[u8], text: bool) -> Result<()> {
        let stmt = self.state.raw();
        let buffer =
            ForeignBuffer::copy_from(bytes).ok_or_else(|| code_failure(ffi::SQLITE_NOMEM))?;
        let len = buffer.len() as u64;
        // No destructor: the engine must not free the buffer, the tracker does.
        let rc = unsafe {
            if text {
                ffi::sqlite3_bind_text64(
                    stmt,
                    position,
                    buffer.as_ptr().cast(),
                    len,
                    None,
                    ffi::SQLITE_UTF8 as c_uchar,
                )
            } else {
                ffi::sqlite3_bind_blob64(stmt, position, buffer.as_ptr(), len, None)
            }
        };
        check(rc, self.db)?;
        self.state.allocations_mut().record(position, buffer);
        Ok(())
    }
}
