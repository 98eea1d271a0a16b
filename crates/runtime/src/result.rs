use serde::Serialize;
use serde_json::{Map, Value};

/// A single cell as SQLite hands it back.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl From<rusqlite::types::ValueRef<'_>> for ScalarValue {
    fn from(value: rusqlite::types::ValueRef<'_>) -> Self {
        use rusqlite::types::ValueRef;
        match value {
            ValueRef::Null => ScalarValue::Null,
            ValueRef::Integer(i) => ScalarValue::Integer(i),
            ValueRef::Real(f) => ScalarValue::Real(f),
            ValueRef::Text(t) => ScalarValue::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => ScalarValue::Text(String::from_utf8_lossy(b).into_owned()),
        }
    }
}

impl From<&ScalarValue> for Value {
    fn from(value: &ScalarValue) -> Self {
        match value {
            ScalarValue::Null => Value::Null,
            ScalarValue::Integer(i) => Value::from(*i),
            ScalarValue::Real(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ScalarValue::Text(s) => Value::String(s.clone()),
        }
    }
}

/// Rows returned by one execution, in the order the store yielded them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<ScalarValue>>,
    pub row_count: usize,
    /// More rows were available than the ceiling allowed.
    pub truncated: bool,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<ScalarValue>>, truncated: bool) -> Self {
        let row_count = rows.len();
        Self {
            columns,
            rows,
            row_count,
            truncated,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows as column-name keyed objects.
    pub fn records(&self) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().map(Value::from))
                    .collect()
            })
            .collect()
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&ScalarValue> {
        let index = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> QueryResult {
        QueryResult::new(
            vec!["country_id".into(), "gdp".into(), "inflation".into()],
            vec![
                vec![
                    ScalarValue::Text("US".into()),
                    ScalarValue::Real(27.7),
                    ScalarValue::Null,
                ],
                vec![
                    ScalarValue::Text("DE".into()),
                    ScalarValue::Integer(4),
                    ScalarValue::Real(2.5),
                ],
            ],
            false,
        )
    }

    #[test]
    fn test_records_keep_column_order() {
        let records = sample().records();
        assert_eq!(records.len(), 2);
        let keys: Vec<&str> = records[0].keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["country_id", "gdp", "inflation"]);
        assert_eq!(records[0]["inflation"], Value::Null);
        assert_eq!(records[1]["gdp"], Value::from(4));
    }

    #[test]
    fn test_get_by_name() {
        let result = sample();
        assert_eq!(result.row_count, 2);
        assert_eq!(result.get(1, "country_id"), Some(&ScalarValue::Text("DE".into())));
        assert_eq!(result.get(0, "population"), None);
        assert_eq!(result.get(5, "gdp"), None);
    }

    #[test]
    fn test_serializes_scalars_untagged() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["rows"][0][0], "US");
        assert_eq!(json["rows"][0][2], Value::Null);
        assert_eq!(json["truncated"], false);
    }
}
