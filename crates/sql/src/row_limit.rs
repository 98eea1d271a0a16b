//! Top-level row cap rewriting.

use sqlparser::ast::{Expr, LimitClause, Query, Value, ValueWithSpan};

fn number(n: u64) -> Expr {
    Expr::Value(Value::Number(n.to_string(), false).into())
}

/// Limit expressed as a plain non-negative integer literal, if it is one.
pub fn literal_limit(expr: &Expr) -> Option<u64> {
    match expr {
        Expr::Value(ValueWithSpan {
            value: Value::Number(n, _),
            ..
        }) => n.parse().ok(),
        Expr::Nested(inner) => literal_limit(inner),
        _ => None,
    }
}

fn clamp(limit: Option<Expr>, max_rows: u64) -> Expr {
    match limit.as_ref().and_then(literal_limit) {
        Some(n) if n <= max_rows => number(n),
        _ => number(max_rows),
    }
}

/// Rewrites the outermost `LIMIT` so it never exceeds `max_rows`.
///
/// Missing limits are injected, larger ones clamped, and anything that is not
/// an integer literal (`LIMIT -1`, `LIMIT gdp`, `LIMIT ALL`) replaced. The
/// offset, if any, is kept as written.
pub fn enforce_row_limit(query: &mut Query, max_rows: u64) {
    query.limit_clause = Some(match query.limit_clause.take() {
        None => LimitClause::LimitOffset {
            limit: Some(number(max_rows)),
            offset: None,
            limit_by: vec![],
        },
        Some(LimitClause::LimitOffset {
            limit,
            offset,
            limit_by,
        }) => LimitClause::LimitOffset {
            limit: Some(clamp(limit, max_rows)),
            offset,
            limit_by,
        },
        Some(LimitClause::OffsetCommaLimit { offset, limit }) => LimitClause::OffsetCommaLimit {
            offset,
            limit: clamp(Some(limit), max_rows),
        },
    });
}

/// The literal row cap on the outermost query, if present.
pub fn effective_limit(query: &Query) -> Option<u64> {
    match query.limit_clause.as_ref()? {
        LimitClause::LimitOffset { limit, .. } => limit.as_ref().and_then(literal_limit),
        LimitClause::OffsetCommaLimit { limit, .. } => literal_limit(limit),
    }
}
