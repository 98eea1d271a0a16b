//! Query Executor
//!
//! Runs [`AcceptedQuery`] values against the SQLite store.
//!
//! 1. **Slots**: a semaphore of `max_concurrent_sessions` permits; the wait for a
//!    slot counts against the execution budget.
//! 2. **Sessions**: every execution opens its own read-only session on a
//!    blocking thread (see [`crate::session`]). Nothing is pooled or shared.
//! 3. **Budget**: `tokio::time::timeout` bounds the run; on expiry the statement
//!    is interrupted through the SQLite interrupt handle.
//! 4. **Cancellation**: dropping the `execute` future interrupts the statement,
//!    which releases the session and its slot.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use econsql_common::config::{QueryLimits, StoreSettings};
use econsql_common::scrubber::scrub_for_log;
use econsql_error::{EconError, ErrorCode};
use econsql_sql::AcceptedQuery;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::error::ExecutionFailure;
use crate::result::QueryResult;
use crate::session::{run_blocking, Cancellation};

/// How long a timed-out execution gets to unwind after being interrupted.
const INTERRUPT_GRACE: Duration = Duration::from_secs(1);

pub struct QueryExecutor {
    path: PathBuf,
    limits: QueryLimits,
    slots: Arc<Semaphore>,
    active_sessions: Arc<AtomicUsize>,
}

/// Interrupts the statement if the `execute` future is dropped mid-flight.
struct InterruptOnDrop {
    cancellation: Arc<Cancellation>,
    armed: bool,
}

impl Drop for InterruptOnDrop {
    fn drop(&mut self) {
        if self.armed {
            debug!("execution cancelled by caller, interrupting statement");
            self.cancellation.cancel();
        }
    }
}

impl QueryExecutor {
    /// Builds an executor without touching the store.
    pub fn new(path: impl Into<PathBuf>, limits: QueryLimits) -> Self {
        Self {
            path: path.into(),
            limits,
            slots: Arc::new(Semaphore::new(limits.max_concurrent_sessions)),
            active_sessions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Builds an executor for the configured store, failing fast when the
    /// database file is missing.
    pub fn open(settings: &StoreSettings, limits: QueryLimits) -> Result<Self, EconError> {
        let path = PathBuf::from(&settings.path);
        if !path.is_file() {
            return Err(
                EconError::new(
                    ErrorCode::StoreUnavailable,
                    format!("SQLite store not found at {}", path.display()),
                )
                .with_hint("Set store.path or ECONSQL_STORE__PATH to the economic database file"),
            );
        }
        info!(path = %path.display(), max_sessions = limits.max_concurrent_sessions, "query executor ready");
        Ok(Self::new(path, limits))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn limits(&self) -> QueryLimits {
        self.limits
    }

    /// Number of store sessions currently open.
    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::SeqCst)
    }

    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    pub fn is_closed(&self) -> bool {
        self.slots.is_closed()
    }

    pub async fn execute(&self, query: &AcceptedQuery) -> Result<QueryResult, ExecutionFailure> {
        let budget = self.limits.timeout();
        let budget_ms = self.limits.timeout_ms;
        let started = Instant::now();

        let permit = match tokio::time::timeout(budget, self.slots.clone().acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => {
                return Err(ExecutionFailure::StoreError(
                    "executor is shut down".to_string(),
                ))
            }
            Err(_) => {
                warn!(budget_ms, "no store session slot became free within the budget");
                return Err(ExecutionFailure::SessionUnavailable { budget_ms });
            }
        };

        let max_rows = usize::try_from(query.row_limit())
            .unwrap_or(usize::MAX)
            .min(self.limits.max_rows);
        let cancellation = Cancellation::new();
        let mut guard = InterruptOnDrop {
            cancellation: cancellation.clone(),
            armed: true,
        };

        let path = self.path.clone();
        let sql = query.sql().to_string();
        let gauge = self.active_sessions.clone();
        let task_cancellation = cancellation.clone();
        let mut task = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            run_blocking(&path, &sql, max_rows, gauge, &task_cancellation)
        });

        let remaining = budget.saturating_sub(started.elapsed());
        let outcome = tokio::time::timeout(remaining, &mut task).await;
        guard.armed = false;

        match outcome {
            Ok(Ok(Ok(result))) => {
                info!(
                    target: "queries",
                    rows_returned = result.row_count,
                    truncated = result.truncated,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "query executed"
                );
                Ok(result)
            }
            Ok(Ok(Err(e))) => {
                if cancellation.is_cancelled() {
                    return Err(ExecutionFailure::Timeout { budget_ms });
                }
                let detail = scrub_for_log(&e.to_string());
                error!(target: "queries", error = %detail, "store rejected query");
                Err(ExecutionFailure::StoreError(detail))
            }
            Ok(Err(join_error)) => {
                error!("query task failed: {}", join_error);
                Err(ExecutionFailure::StoreError(
                    "query task failed".to_string(),
                ))
            }
            Err(_) => {
                cancellation.cancel();
                if tokio::time::timeout(INTERRUPT_GRACE, task).await.is_err() {
                    warn!("interrupted query did not unwind within the grace period");
                }
                warn!(target: "queries", budget_ms, "query exceeded its time budget");
                Err(ExecutionFailure::Timeout { budget_ms })
            }
        }
    }

    /// Opens a session and reads one row of `table`. Used for readiness checks.
    pub async fn probe(&self, table: &str) -> Result<(), EconError> {
        let permit = self.slots.clone().acquire_owned().await.map_err(|_| {
            EconError::new(ErrorCode::StoreUnavailable, "executor is shut down")
        })?;
        let path = self.path.clone();
        let gauge = self.active_sessions.clone();
        let sql = format!("SELECT 1 FROM \"{}\" LIMIT 1", table.replace('"', "\"\""));

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            run_blocking(&path, &sql, 1, gauge, &Cancellation::default()).map(|_| ())
        })
        .await
        .map_err(|e| EconError::new(ErrorCode::Internal, format!("probe task failed: {}", e)))?
        .map_err(EconError::from)
    }

    /// Stops accepting work and waits for in-flight sessions to finish.
    pub async fn close(&self) {
        if self.slots.is_closed() {
            return;
        }
        let total = u32::try_from(self.limits.max_concurrent_sessions).unwrap_or(u32::MAX);
        match self.slots.acquire_many(total).await {
            Ok(permits) => {
                self.slots.close();
                drop(permits);
            }
            Err(_) => self.slots.close(),
        }
        info!("query executor closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use econsql_sql::{QueryValidator, SchemaRegistry};
    use tempfile::NamedTempFile;

    fn accept(sql: &str) -> AcceptedQuery {
        let registry = SchemaRegistry::economic_indicators("indicators").unwrap();
        QueryValidator::new(Arc::new(registry), 100)
            .validate(sql)
            .into_result()
            .unwrap()
    }

    fn store() -> NamedTempFile {
        let file = NamedTempFile::new().unwrap();
        let conn = rusqlite::Connection::open(file.path()).unwrap();
        conn.execute_batch(
            "CREATE TABLE indicators (country_id TEXT, year INTEGER, gdp REAL, inflation REAL);
             INSERT INTO indicators VALUES ('US', 2024, 28.0, 2.9), ('US', 2025, 29.1, 2.7);",
        )
        .unwrap();
        file
    }

    #[tokio::test]
    async fn test_open_requires_file() {
        let settings = StoreSettings {
            path: "/nonexistent/economic.db".into(),
            table: "indicators".into(),
        };
        let err = QueryExecutor::open(&settings, QueryLimits::default())
            .err()
            .unwrap();
        assert_eq!(err.code, ErrorCode::StoreUnavailable);
    }

    #[tokio::test]
    async fn test_row_ceiling_applies_below_query_limit() {
        let file = store();
        let limits = QueryLimits {
            max_rows: 1,
            ..QueryLimits::default()
        };
        let executor = QueryExecutor::new(file.path(), limits);
        let result = executor
            .execute(&accept("SELECT gdp FROM indicators"))
            .await
            .unwrap();
        assert_eq!(result.row_count, 1);
        assert!(result.truncated);
        assert_eq!(executor.active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_probe() {
        let file = store();
        let executor = QueryExecutor::new(file.path(), QueryLimits::default());
        executor.probe("indicators").await.unwrap();

        let err = executor.probe("missing_table").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::StoreError);
        assert_eq!(executor.active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_close_rejects_new_work() {
        let file = store();
        let executor = QueryExecutor::new(file.path(), QueryLimits::default());
        executor.close().await;
        assert!(executor.is_closed());

        let err = executor
            .execute(&accept("SELECT gdp FROM indicators"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionFailure::StoreError(_)));
    }
}
