//! One read-only SQLite session per execution.
//!
//! A session is opened read-only, pinned with `PRAGMA query_only`, and wrapped
//! in a deferred transaction that is rolled back when the session drops. The
//! open-session gauge is bumped before the connection opens and released after
//! it closes, so it reads zero only when no connection is alive.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rusqlite::{Connection, InterruptHandle, OpenFlags};

use crate::result::{QueryResult, ScalarValue};

fn interrupted() -> rusqlite::Error {
    rusqlite::Error::SqliteFailure(
        rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_INTERRUPT),
        None,
    )
}

struct GaugeGuard(Arc<AtomicUsize>);

impl GaugeGuard {
    fn acquire(gauge: Arc<AtomicUsize>) -> Self {
        gauge.fetch_add(1, Ordering::SeqCst);
        Self(gauge)
    }
}

impl Drop for GaugeGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Shared between the async caller and the blocking thread running the query.
#[derive(Default)]
pub struct Cancellation {
    cancelled: AtomicBool,
    handle: Mutex<Option<InterruptHandle>>,
}

impl Cancellation {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Interrupts the running statement, or makes the next one stop at its first row.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Ok(guard) = self.handle.lock() {
            if let Some(handle) = guard.as_ref() {
                handle.interrupt();
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn register(&self, handle: InterruptHandle) {
        if let Ok(mut guard) = self.handle.lock() {
            *guard = Some(handle);
        }
    }
}

pub struct StoreSession {
    // Field order matters: the connection closes before the gauge is released.
    conn: Connection,
    _gauge: GaugeGuard,
}

impl StoreSession {
    pub fn open(path: &Path, gauge: Arc<AtomicUsize>) -> rusqlite::Result<Self> {
        let gauge = GaugeGuard::acquire(gauge);
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.pragma_update(None, "query_only", true)?;
        conn.execute_batch("BEGIN DEFERRED")?;
        Ok(Self {
            conn,
            _gauge: gauge,
        })
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.conn.get_interrupt_handle()
    }

    /// Runs `sql`, keeping at most `max_rows` rows. One extra row is stepped to
    /// learn whether the result was truncated.
    pub fn query(
        &self,
        sql: &str,
        max_rows: usize,
        cancellation: &Cancellation,
    ) -> rusqlite::Result<QueryResult> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();

        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        let mut truncated = false;
        while let Some(row) = rows.next()? {
            if cancellation.is_cancelled() {
                return Err(interrupted());
            }
            if out.len() == max_rows {
                truncated = true;
                break;
            }
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                values.push(ScalarValue::from(row.get_ref(i)?));
            }
            out.push(values);
        }

        Ok(QueryResult::new(columns, out, truncated))
    }
}

impl Drop for StoreSession {
    fn drop(&mut self) {
        if !self.conn.is_autocommit() {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                tracing::debug!("session rollback failed: {}", e);
            }
        }
    }
}

/// Opens a session and runs one query on the current (blocking) thread.
pub fn run_blocking(
    path: &Path,
    sql: &str,
    max_rows: usize,
    gauge: Arc<AtomicUsize>,
    cancellation: &Cancellation,
) -> rusqlite::Result<QueryResult> {
    let session = StoreSession::open(path, gauge)?;
    cancellation.register(session.interrupt_handle());
    if cancellation.is_cancelled() {
        return Err(interrupted());
    }
    session.query(sql, max_rows, cancellation)
}
