#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use econsql_common::config::QueryLimits;
use econsql_runtime::{
    AnswerSynthesizer, CollaboratorError, Pipeline, QueryExecutor, QueryGenerator, QueryResult,
};
use econsql_sql::{AcceptedQuery, QueryValidator, SchemaContext, SchemaRegistry};
use tempfile::NamedTempFile;

pub const COUNTRIES: &[(&str, &str)] = &[
    ("United States", "US"),
    ("Germany", "DE"),
    ("Japan", "JP"),
];

/// SQLite file holding the full indicators table, one row per country and
/// year from 2020 to 2025, inserted country by country.
pub fn seeded_store() -> NamedTempFile {
    seeded_store_with(1)
}

/// Same as [`seeded_store`] with every country/year row repeated `copies` times.
pub fn seeded_store_with(copies: usize) -> NamedTempFile {
    let file = NamedTempFile::new().unwrap();
    let mut conn = rusqlite::Connection::open(file.path()).unwrap();
    conn.execute_batch(
        "CREATE TABLE indicators (
            country_name TEXT, country_id TEXT, year INTEGER,
            inflation REAL, gdp REAL, gdp_per_capita REAL, unemployment_rate REAL,
            interest_rate REAL, inflation_gdp_deflator REAL, gdp_growth REAL,
            current_account_balance REAL, government_expense REAL, government_revenue REAL,
            tax_revenue REAL, gross_national_income REAL, public_debt REAL
        );",
    )
    .unwrap();

    let tx = conn.transaction().unwrap();
    for _ in 0..copies {
        for (i, (name, id)) in COUNTRIES.iter().enumerate() {
            for year in 2020..=2025i64 {
                let gdp = (i as f64 + 1.0) * 1000.0 + (year - 2020) as f64;
                tx.execute(
                    "INSERT INTO indicators (country_name, country_id, year, inflation, gdp, public_debt)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    rusqlite::params![name, id, year, 2.0 + i as f64, gdp, 60.0],
                )
                .unwrap();
            }
        }
    }
    tx.commit().unwrap();
    file
}

pub fn row_count(file: &NamedTempFile) -> i64 {
    let conn = rusqlite::Connection::open(file.path()).unwrap();
    conn.query_row("SELECT COUNT(*) FROM indicators", [], |r| r.get(0))
        .unwrap()
}

pub fn validator(max_rows: u64) -> QueryValidator {
    let registry = SchemaRegistry::economic_indicators("indicators").unwrap();
    QueryValidator::new(Arc::new(registry), max_rows)
}

pub fn accept(sql: &str) -> AcceptedQuery {
    validator(500).validate(sql).into_result().unwrap()
}

pub fn limits(timeout_ms: u64, max_concurrent_sessions: usize) -> QueryLimits {
    QueryLimits {
        max_rows: 500,
        timeout_ms,
        max_concurrent_sessions,
    }
}

/// Waits for the session gauge to drop back to zero.
pub async fn wait_for_idle(executor: &QueryExecutor) {
    for _ in 0..200 {
        if executor.active_sessions() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("store session leaked: {} open", executor.active_sessions());
}

pub enum Reply {
    Text(String),
    Fail,
}

/// Canned generator that returns a fixed candidate.
pub struct ScriptedGenerator(pub Reply);

impl ScriptedGenerator {
    pub fn sql(sql: &str) -> Arc<Self> {
        Arc::new(Self(Reply::Text(sql.to_string())))
    }
}

#[async_trait]
impl QueryGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        _question: &str,
        _schema: &SchemaContext,
    ) -> Result<String, CollaboratorError> {
        match &self.0 {
            Reply::Text(s) => Ok(s.clone()),
            Reply::Fail => Err(CollaboratorError::Request("connection refused".into())),
        }
    }
}

/// Synthesizer that summarizes the row count and records how often it ran.
#[derive(Default)]
pub struct CountingSynthesizer {
    pub calls: AtomicUsize,
    pub fail: bool,
}

impl CountingSynthesizer {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnswerSynthesizer for CountingSynthesizer {
    async fn synthesize(
        &self,
        _question: &str,
        result: &QueryResult,
    ) -> Result<String, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(CollaboratorError::Status {
                status: 503,
                body: String::new(),
            });
        }
        Ok(format!("{} rows", result.row_count))
    }
}

pub fn pipeline(
    generator: Arc<dyn QueryGenerator>,
    synthesizer: Arc<CountingSynthesizer>,
    executor: Arc<QueryExecutor>,
) -> Pipeline {
    Pipeline::new(generator, synthesizer, validator(500), executor)
}
