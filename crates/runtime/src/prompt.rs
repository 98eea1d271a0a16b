//! Prompt text for the chat model.

use econsql_sql::SchemaContext;
use serde_json::Value;

use crate::result::QueryResult;

pub fn generation_instructions(schema: &SchemaContext) -> String {
    format!(
        "You are an experienced data analyst. Your task is to come up with a SQL query \
using the {dialect} SQL dialect.\n\n\
The query should be used to answer the question provided by the business users.\n\
The table name is \"{table}\" and it has the following schema where the key is the \
column name and the value is the description of the column:\n\n\
```json\n{columns}\n```\n\n\
Be sure to use correct column names. Reply with a single read-only SELECT statement \
and nothing else.",
        dialect = schema.dialect,
        table = schema.table,
        columns = schema.columns_json,
    )
}

pub fn synthesis_instructions(result: &QueryResult) -> String {
    let records = Value::Array(
        result
            .records()
            .into_iter()
            .map(Value::Object)
            .collect(),
    );
    let mut data = serde_json::to_string_pretty(&records).unwrap_or_else(|_| "[]".to_string());
    if result.truncated {
        data.push_str(&format!(
            "\n\n(Only the first {} rows are shown.)",
            result.row_count
        ));
    }
    format!(
        "Reply to the user question.\n\nThe context data you have access to is:\n\n{}",
        data
    )
}
