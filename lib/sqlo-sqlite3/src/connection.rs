///
/// Database connections.
///
/// `Database` exclusively owns one native connection handle and the state of
/// every statement prepared on it. The registry invariant: it holds exactly
/// the statements of this connection that have not been finalized.
///
/// Teardown order on close:
/// 1. finalize every registered statement (freeing its bind buffers)
/// 2. close the native handle
/// 3. forget the handle; later calls fail with `ResourceClosed`
///
/// Out-parameters of native calls (new connection and statement handles)
/// are received in stack locals scoped to the single call that fills them.
///

use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::{c_int, CString};
use std::fmt;
use std::path::Path;
use std::ptr::{self, NonNull};
use std::rc::Rc;

use rusqlite::ffi;
use sqlo_core::{Error, Resource, Result};
use tracing::{debug, warn};

use crate::config::OpenConfig;
use crate::result::{check, code_failure, native_failure, text_from};
use crate::statement::{Statement, StatementId, StatementState};

/// Name of the in-memory database.
pub const MEMORY: &str = ":memory:";

pub(crate) struct Connection {
    raw: Option<NonNull<ffi::sqlite3>>,
    name: String,
    statements: HashMap<StatementId, StatementState>,
    next_statement: u64,
}

impl Connection {
    fn new(raw: NonNull<ffi::sqlite3>, name: String) -> Self {
        Self {
            raw: Some(raw),
            name,
            statements: HashMap::new(),
            next_statement: 1,
        }
    }

    pub(crate) fn raw_handle(&self) -> Option<*mut ffi::sqlite3> {
        self.raw.map(NonNull::as_ptr)
    }

    fn handle(&self) -> Result<*mut ffi::sqlite3> {
        self.raw_handle().ok_or(Error::closed(Resource::Database))
    }

    pub(crate) fn has_statement(&self, id: StatementId) -> bool {
        self.statements.contains_key(&id)
    }

    pub(crate) fn statement_mut(&mut self, id: StatementId) -> Option<&mut StatementState> {
        self.statements.get_mut(&id)
    }

    pub(crate) fn take_statement(&mut self, id: StatementId) -> Option<StatementState> {
        self.statements.remove(&id)
    }

    fn register(&mut self, state: StatementState) -> StatementId {
        let id = StatementId(self.next_statement);
        self.next_statement += 1;
        self.statements.insert(id, state);
        id
    }

    fn close(&mut self) -> Result<()> {
        let Some(raw) = self.raw else {
            return Ok(());
        };
        let pending = self.statements.len();
        for (_, state) in self.statements.drain() {
            state.finalize();
        }
        let rc = unsafe { ffi::sqlite3_close_v2(raw.as_ptr()) };
        check(rc, raw.as_ptr())?;
        self.raw = None;
        debug!(name = %self.name, finalized = pending, "closed database");
        Ok(())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(name = %self.name, error = %e, "failed to close database");
        }
    }
}

/// An open database connection.
pub struct Database {
    inner: Rc<RefCell<Connection>>,
}

impl Database {
    pub fn open_in_memory() -> Result<Self> {
        Self::open(MEMORY)
    }

    /// Opens (creating if needed) the database `name`. An empty name opens an
    /// in-memory database. Only textual names are accepted; database images
    /// are not supported.
    pub fn open<P: AsRef<Path>>(name: P) -> Result<Self> {
        Self::open_with(name, &OpenConfig::default())
    }

    /// Opens the database named by `config`, or an in-memory one when the
    /// config has no name.
    pub fn from_config(config: &OpenConfig) -> Result<Self> {
        Self::open_with(config.name.as_deref().unwrap_or(MEMORY), config)
    }

    pub fn open_with<P: AsRef<Path>>(name: P, config: &OpenConfig) -> Result<Self> {
        let name = database_name(name.as_ref())?;
        let c_name = CString::new(name.as_str()).map_err(|_| {
            Error::InvalidArguments("database name contains a NUL byte".to_string())
        })?;

        let mut raw: *mut ffi::sqlite3 = ptr::null_mut();
        let rc = unsafe {
            ffi::sqlite3_open_v2(c_name.as_ptr(), &mut raw, config.flags(), ptr::null())
        };
        if rc != ffi::SQLITE_OK {
            let err = native_failure(rc, raw);
            // A failed open may still hand back a handle that must be released.
            if !raw.is_null() {
                unsafe { ffi::sqlite3_close_v2(raw) };
            }
            return Err(err);
        }
        let raw = NonNull::new(raw).ok_or_else(|| code_failure(ffi::SQLITE_NOMEM))?;

        debug!(name = %name, read_only = config.read_only, "opened database");
        Ok(Self {
            inner: Rc::new(RefCell::new(Connection::new(raw, name))),
        })
    }

    /// Compiles the first statement in `sql`. This is the only way to create
    /// a `Statement`.
    pub fn prepare(&self, sql: &str) -> Result<Statement> {
        let mut connection = self.inner.borrow_mut();
        let db = connection.handle()?;
        let len = c_int::try_from(sql.len()).map_err(|_| code_failure(ffi::SQLITE_TOOBIG))?;

        let mut out: *mut ffi::sqlite3_stmt = ptr::null_mut();
        let rc = unsafe {
            ffi::sqlite3_prepare_v2(db, sql.as_ptr().cast(), len, &mut out, ptr::null_mut())
        };
        check(rc, db)?;
        let raw = NonNull::new(out).ok_or(Error::EmptyStatement)?;

        let (column_count, parameter_count) = unsafe {
            (
                ffi::sqlite3_column_count(raw.as_ptr()),
                ffi::sqlite3_bind_parameter_count(raw.as_ptr()),
            )
        };
        let column_count = usize::try_from(column_count).unwrap_or(0);
        let parameter_count = usize::try_from(parameter_count).unwrap_or(0);

        let id = connection.register(StatementState::new(raw));
        debug!(id = id.0, column_count, parameter_count, "prepared statement");
        Ok(Statement::new(
            Rc::downgrade(&self.inner),
            id,
            column_count,
            parameter_count,
        ))
    }

    /// Runs every statement in `sql`, discarding any rows.
    pub fn exec(&self, sql: &str) -> Result<&Self> {
        let connection = self.inner.borrow();
        let db = connection.handle()?;
        let c_sql = CString::new(sql)
            .map_err(|_| Error::InvalidArguments("SQL contains a NUL byte".to_string()))?;
        let rc = unsafe {
            ffi::sqlite3_exec(db, c_sql.as_ptr(), None, ptr::null_mut(), ptr::null_mut())
        };
        check(rc, db)?;
        Ok(self)
    }

    /// Finalizes every open statement, then closes the connection. No-op when
    /// already closed.
    pub fn close(&self) -> Result<()> {
        self.inner.borrow_mut().close()
    }

    pub fn is_open(&self) -> bool {
        self.inner.borrow().raw.is_some()
    }

    /// The name this connection was opened with.
    pub fn name(&self) -> String {
        self.inner.borrow().name.clone()
    }

    /// Number of statements prepared on this connection and not yet
    /// finalized.
    pub fn open_statement_count(&self) -> usize {
        self.inner.borrow().statements.len()
    }

    /// Storage location of the attached database `schema` (default `main`).
    /// `None` for in-memory and temporary databases and for unknown schemas.
    pub fn file_name(&self, schema: Option<&str>) -> Result<Option<String>> {
        let connection = self.inner.borrow();
        let db = connection.handle()?;
        let c_schema = CString::new(schema.unwrap_or("main"))
            .map_err(|_| Error::InvalidArguments("schema name contains a NUL byte".to_string()))?;
        let path = unsafe { text_from(ffi::sqlite3_db_filename(db, c_schema.as_ptr())) };
        Ok(path.filter(|p| !p.is_empty()))
    }

    /// Rows modified by the most recently completed statement.
    pub fn changes(&self) -> Result<usize> {
        let connection = self.inner.borrow();
        let db = connection.handle()?;
        let changes = unsafe { ffi::sqlite3_changes(db) };
        Ok(usize::try_from(changes).unwrap_or(0))
    }

    /// Asks running statements to abort. Their next `step` fails with an
    /// ordinary `NativeFailure`.
    pub fn interrupt(&self) -> Result<()> {
        let connection = self.inner.borrow();
        let db = connection.handle()?;
        unsafe { ffi::sqlite3_interrupt(db) };
        Ok(())
    }

    /// Maps a native status code through this connection's error message.
    pub fn check_rc(&self, code: i32) -> Result<&Self> {
        let db = self.inner.borrow().raw_handle().unwrap_or(ptr::null_mut());
        check(code, db)?;
        Ok(self)
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let connection = self.inner.borrow();
        f.debug_struct("Database")
            .field("name", &connection.name)
            .field("open", &connection.raw.is_some())
            .field("statements", &connection.statements.len())
            .finish()
    }
}

fn database_name(name: &Path) -> Result<String> {
    let name = name.to_str().ok_or_else(|| {
        Error::InvalidArguments(
            "database name must be text; database images are not supported".to_string(),
        )
    })?;
    if name.is_empty() {
        Ok(MEMORY.to_string())
    } else {
        Ok(name.to_string())
    }
}
