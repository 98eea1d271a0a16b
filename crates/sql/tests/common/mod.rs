use std::sync::Arc;

use econsql_sql::{QueryValidator, Rejection, SchemaRegistry, ValidationVerdict};

pub const MAX_ROWS: u64 = 200;

pub fn validator() -> QueryValidator {
    let registry = SchemaRegistry::economic_indicators("indicators").unwrap();
    QueryValidator::new(Arc::new(registry), MAX_ROWS)
}

#[allow(dead_code)]
pub fn reject(sql: &str) -> Rejection {
    match validator().validate(sql) {
        ValidationVerdict::Rejected(r) => r,
        ValidationVerdict::Accepted(q) => panic!("expected rejection, accepted: {}", q.sql()),
    }
}
