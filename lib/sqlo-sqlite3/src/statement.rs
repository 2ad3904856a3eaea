///
/// Prepared statements.
///
/// A statement is live from `Database::prepare` until it is finalized,
/// either explicitly, by being dropped, or by its connection closing.
/// Finalization is one-way. Every operation on a finalized statement except
/// `finalize` itself fails with `ResourceClosed`.
///
/// The native handle and the bind buffers live in a `StatementState` owned
/// by the connection's registry. `Statement` only names that entry, so it
/// can never keep a handle alive past the connection's close.
///

use std::cell::RefCell;
use std::ffi::c_int;
use std::fmt;
use std::ptr::NonNull;
use std::rc::Weak;

use rusqlite::ffi;
use sqlo_core::{BindValue, Bindable, ColumnType, Error, Resource, Result, Value};
use tracing::{debug, warn};

use crate::bind::Binder;
use crate::connection::Connection;
use crate::memory::AllocationTracker;
use crate::param::ParamKey;
use crate::result::{step_result, text_from};

/// Connection-local identity of a statement.
///
/// The engine may hand out a freed handle address again, so registry entries
/// are keyed by a counter instead of the handle value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct StatementId(pub(crate) u64);

/// Native statement handle plus the buffers backing its bound values.
pub(crate) struct StatementState {
    raw: NonNull<ffi::sqlite3_stmt>,
    allocations: AllocationTracker,
}

impl StatementState {
    pub(crate) fn new(raw: NonNull<ffi::sqlite3_stmt>) -> Self {
        Self {
            raw,
            allocations: AllocationTracker::default(),
        }
    }

    pub(crate) fn raw(&self) -> *mut ffi::sqlite3_stmt {
        self.raw.as_ptr()
    }

    pub(crate) fn allocations(&self) -> &AllocationTracker {
        &self.allocations
    }

    pub(crate) fn allocations_mut(&mut self) -> &mut AllocationTracker {
        &mut self.allocations
    }

    /// Finalizes the native handle, then frees every bind buffer.
    ///
    /// The finalize status repeats the error of the most recent failed step,
    /// which was already reported by that step, so it is only logged.
    pub(crate) fn finalize(mut self) {
        let rc = unsafe { ffi::sqlite3_finalize(self.raw.as_ptr()) };
        let released = self.allocations.release_all();
        debug!(rc, released, "finalized statement");
    }
}

/// A compiled SQL statement.
pub struct Statement {
    connection: Weak<RefCell<Connection>>,
    id: StatementId,
    column_count: usize,
    parameter_count: usize,
}

impl Statement {
    pub(crate) fn new(
        connection: Weak<RefCell<Connection>>,
        id: StatementId,
        column_count: usize,
        parameter_count: usize,
    ) -> Self {
        Self {
            connection,
            id,
            column_count,
            parameter_count,
        }
    }

    pub fn column_count(&self) -> usize {
        self.column_count
    }

    pub fn parameter_count(&self) -> usize {
        self.parameter_count
    }

    pub fn is_finalized(&self) -> bool {
        self.connection
            .upgrade()
            .is_none_or(|connection| !connection.borrow().has_statement(self.id))
    }

    /// Runs `op` against the live native state of this statement.
    fn with_state<T>(
        &self,
        op: impl FnOnce(*mut ffi::sqlite3, &mut StatementState) -> Result<T>,
    ) -> Result<T> {
        let shared = self
            .connection
            .upgrade()
            .ok_or(Error::closed(Resource::Statement))?;
        let mut connection = shared.borrow_mut();
        let db = connection
            .raw_handle()
            .ok_or(Error::closed(Resource::Statement))?;
        let state = connection
            .statement_mut(self.id)
            .ok_or(Error::closed(Resource::Statement))?;
        op(db, state)
    }

    fn with_binder(&self, op: impl FnOnce(&mut Binder<'_>) -> Result<()>) -> Result<&Self> {
        let parameter_count = self.parameter_count;
        self.with_state(|db, state| {
            if parameter_count == 0 {
                return Err(Error::NoBindableParameters);
            }
            op(&mut Binder::new(db, state, parameter_count))
        })?;
        Ok(self)
    }

    /// Binds `value` at position 1.
    pub fn bind<V: Bindable + ?Sized>(&self, value: &V) -> Result<&Self> {
        self.bind_at(1, value)
    }

    /// Binds `value` at a 1-based position or a named parameter.
    pub fn bind_at<'k, K, V>(&self, key: K, value: &V) -> Result<&Self>
    where
        K: Into<ParamKey<'k>>,
        V: Bindable + ?Sized,
    {
        let key = key.into();
        self.with_binder(|binder| binder.bind(&key, value.classify()?))
    }

    /// Binds `values[i]` at position `i + 1`, stopping at the first failure.
    pub fn bind_values(&self, values: &[&dyn Bindable]) -> Result<&Self> {
        self.with_binder(|binder| {
            for (i, value) in values.iter().enumerate() {
                binder.bind(&ParamKey::from(i + 1), value.classify()?)?;
            }
            Ok(())
        })
    }

    /// Binds each `(name, value)` pair by name, in order, stopping at the
    /// first failure.
    pub fn bind_named(&self, values: &[(&str, &dyn Bindable)]) -> Result<&Self> {
        self.with_binder(|binder| {
            for (name, value) in values {
                binder.bind(&ParamKey::from(*name), value.classify()?)?;
            }
            Ok(())
        })
    }

    /// Binds a dynamic argument: an array binds positionally, an object binds
    /// by name in insertion order, and a scalar binds at position 1.
    pub fn bind_json(&self, args: &serde_json::Value) -> Result<&Self> {
        use serde_json::Value as Json;

        match args {
            Json::Array(values) => self.with_binder(|binder| {
                for (i, value) in values.iter().enumerate() {
                    binder.bind(&ParamKey::from(i + 1), value.classify()?)?;
                }
                Ok(())
            }),
            Json::Object(entries) => self.with_binder(|binder| {
                for (name, value) in entries {
                    binder.bind(&ParamKey::from(name), value.classify()?)?;
                }
                Ok(())
            }),
            scalar => self.bind_at(1, scalar),
        }
    }

    /// Binds a dynamic scalar at an explicit target. Arrays and objects are
    /// rejected because they carry their own targets.
    pub fn bind_json_at<'k, K>(&self, key: K, value: &serde_json::Value) -> Result<&Self>
    where
        K: Into<ParamKey<'k>>,
    {
        use serde_json::Value as Json;

        match value {
            Json::Array(_) => Err(Error::InvalidArguments(
                "when binding an array, an index argument is not permitted".to_string(),
            )),
            Json::Object(_) => Err(Error::InvalidArguments(
                "when binding an object, an index argument is not permitted".to_string(),
            )),
            scalar => self.bind_at(key, scalar),
        }
    }

    /// Binds `value` at position 1 through the blob setter.
    pub fn bind_as_blob<V: Bindable + ?Sized>(&self, value: &V) -> Result<&Self> {
        self.bind_as_blob_at(1, value)
    }

    /// Binds text, blob or null through the blob setter. Text is bound as its
    /// UTF-8 bytes and null as SQL NULL; other categories are rejected.
    pub fn bind_as_blob_at<'k, K, V>(&self, key: K, value: &V) -> Result<&Self>
    where
        K: Into<ParamKey<'k>>,
        V: Bindable + ?Sized,
    {
        let key = key.into();
        self.with_binder(|binder| {
            let classified = value.classify()?;
            let blob = as_blob(classified)?;
            binder.bind(&key, blob)
        })
    }

    /// Unbinds every parameter and frees their buffers.
    pub fn clear_bindings(&self) -> Result<&Self> {
        self.with_state(|_, state| {
            unsafe { ffi::sqlite3_clear_bindings(state.raw()) };
            state.allocations_mut().release_all();
            Ok(())
        })?;
        Ok(self)
    }

    /// Rewinds execution to before the first row. Bindings are retained
    /// unless `also_clear_bindings` is set.
    ///
    /// The reset status repeats the error of the most recent failed step,
    /// which that step already reported, so it is not raised again.
    pub fn reset(&self, also_clear_bindings: bool) -> Result<&Self> {
        if also_clear_bindings {
            self.clear_bindings()?;
        }
        self.with_state(|_, state| {
            unsafe { ffi::sqlite3_reset(state.raw()) };
            Ok(())
        })?;
        Ok(self)
    }

    /// Finalizes the statement. No-op when already finalized.
    pub fn finalize(&self) {
        let Some(shared) = self.connection.upgrade() else {
            return;
        };
        let state = shared.borrow_mut().take_statement(self.id);
        if let Some(state) = state {
            state.finalize();
        }
    }

    /// Advances to the next row. Returns true when a row is available and
    /// false once the statement has run to completion.
    pub fn step(&self) -> Result<bool> {
        self.with_state(|db, state| {
            let rc = unsafe { ffi::sqlite3_step(state.raw()) };
            step_result(rc, db)
        })
    }

    /// Number of columns holding data in the current row; zero when no row
    /// is available.
    pub fn data_count(&self) -> Result<usize> {
        self.with_state(|_, state| {
            let count = unsafe { ffi::sqlite3_data_count(state.raw()) };
            Ok(usize::try_from(count).unwrap_or(0))
        })
    }

    /// Reads column `index` (0-based) of the current row.
    pub fn get(&self, index: usize) -> Result<Value> {
        let column = self.column_index(index)?;
        self.with_state(|_, state| Ok(unsafe { read_column(state.raw(), column) }))
    }

    /// Reads every column of the current row.
    pub fn row(&self) -> Result<Vec<Value>> {
        let column_count = self.column_count;
        self.with_state(|_, state| {
            let raw = state.raw();
            let mut values = Vec::with_capacity(column_count);
            for column in 0..column_count {
                // column_count came from the engine as a c_int.
                values.push(unsafe { read_column(raw, column as c_int) });
            }
            Ok(values)
        })
    }

    /// Storage class of column `index` in the current row.
    pub fn column_type(&self, index: usize) -> Result<ColumnType> {
        let column = self.column_index(index)?;
        self.with_state(|_, state| {
            let kind = unsafe { ffi::sqlite3_column_type(state.raw(), column) };
            Ok(column_type_from(kind))
        })
    }

    pub fn column_name(&self, index: usize) -> Result<String> {
        let column = self.column_index(index)?;
        self.with_state(|_, state| {
            let name = unsafe { text_from(ffi::sqlite3_column_name(state.raw(), column)) };
            Ok(name.unwrap_or_default())
        })
    }

    pub fn column_names(&self) -> Result<Vec<String>> {
        (0..self.column_count).map(|i| self.column_name(i)).collect()
    }

    /// Number of engine-heap buffers currently backing bound values.
    pub fn pending_allocations(&self) -> Result<usize> {
        self.with_state(|_, state| Ok(state.allocations().len()))
    }

    fn column_index(&self, index: usize) -> Result<c_int> {
        if index >= self.column_count {
            return Err(Error::InvalidArguments(format!(
                "column index {} is out of range for {} columns",
                index, self.column_count
            )));
        }
        c_int::try_from(index)
            .map_err(|_| Error::InvalidArguments(format!("column index {} is out of range", index)))
    }
}

impl Drop for Statement {
    fn drop(&mut self) {
        let Some(shared) = self.connection.upgrade() else {
            return;
        };
        let Ok(mut connection) = shared.try_borrow_mut() else {
            warn!(id = self.id.0, "statement dropped while its connection was busy");
            return;
        };
        let state = connection.take_statement(self.id);
        drop(connection);
        if let Some(state) = state {
            state.finalize();
        }
    }
}

impl fmt::Debug for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statement")
            .field("id", &self.id.0)
            .field("column_count", &self.column_count)
            .field("parameter_count", &self.parameter_count)
            .field("finalized", &self.is_finalized())
            .finish()
    }
}

fn as_blob(value: BindValue<'_>) -> Result<BindValue<'_>> {
    let kind = value.bind_type();
    value.into_blob().ok_or(Error::UnsupportedValueType {
        type_name: kind.name(),
        context: "bind_as_blob()",
    })
}

fn column_type_from(kind: c_int) -> ColumnType {
    match kind {
        ffi::SQLITE_INTEGER => ColumnType::Integer,
        ffi::SQLITE_FLOAT => ColumnType::Float,
        ffi::SQLITE_TEXT => ColumnType::Text,
        ffi::SQLITE_BLOB => ColumnType::Blob,
        _ => ColumnType::Null,
    }
}

/// Copies one column of the current row out of the engine.
///
/// # Safety
/// `stmt` must be a live statement handle and `column` a valid column index.
unsafe fn read_column(stmt: *mut ffi::sqlite3_stmt, column: c_int) -> Value {
    unsafe {
        match column_type_from(ffi::sqlite3_column_type(stmt, column)) {
            ColumnType::Integer => Value::Integer(ffi::sqlite3_column_int64(stmt, column)),
            ColumnType::Float => Value::Real(ffi::sqlite3_column_double(stmt, column)),
            ColumnType::Text => {
                // Fetch the pointer before the length so the byte count
                // describes the UTF-8 form.
                let ptr = ffi::sqlite3_column_text(stmt, column);
                let len = usize::try_from(ffi::sqlite3_column_bytes(stmt, column)).unwrap_or(0);
                if ptr.is_null() {
                    Value::Text(String::new())
                } else {
                    let bytes = std::slice::from_raw_parts(ptr, len);
                    Value::Text(String::from_utf8_lossy(bytes).into_owned())
                }
            }
            ColumnType::Blob => {
                let ptr = ffi::sqlite3_column_blob(stmt, column);
                let len = usize::try_from(ffi::sqlite3_column_bytes(stmt, column)).unwrap_or(0);
                if ptr.is_null() {
                    Value::Blob(Vec::new())
                } else {
                    Value::Blob(std::slice::from_raw_parts(ptr.cast::<u8>(), len).to_vec())
                }
            }
            ColumnType::Null => Value::Null,
        }
    }
}
