mod common;

use common::{reject, validator};
use econsql_sql::Rejection;

#[test]
fn test_select_into_is_forbidden() {
    // SQLite has no SELECT INTO; either refusal is fine as long as nothing runs.
    assert!(matches!(
        reject("SELECT gdp INTO backup FROM indicators"),
        Rejection::ForbiddenOperation(_) | Rejection::SyntaxError(_)
    ));
}

#[test]
fn test_explain_is_not_a_query() {
    assert!(matches!(
        reject("EXPLAIN SELECT gdp FROM indicators"),
        Rejection::ForbiddenOperation(_)
    ));
}

#[test]
fn test_fetch_is_schema_mismatch() {
    assert!(matches!(
        reject("SELECT gdp FROM indicators FETCH FIRST 10 ROWS ONLY"),
        Rejection::SchemaMismatch(_) | Rejection::SyntaxError(_)
    ));
}

#[test]
fn test_table_valued_pragma_is_unknown_table() {
    assert_eq!(
        reject("SELECT name FROM pragma_table_info('indicators')"),
        Rejection::UnknownTable("pragma_table_info".into())
    );
}

#[test]
fn test_unknown_table_wins_over_unknown_column() {
    assert_eq!(
        reject("SELECT nonexistent_col FROM other_table"),
        Rejection::UnknownTable("other_table".into())
    );
}

#[test]
fn test_quoted_keywords_are_identifiers() {
    // A quoted "delete" is a column name, unknown here but not forbidden.
    assert_eq!(
        reject("SELECT \"delete\" FROM indicators"),
        Rejection::UnknownColumn {
            table: "indicators".into(),
            column: "delete".into()
        }
    );
}

#[test]
fn test_correlated_subquery_accepted() {
    let verdict = validator().validate(
        "SELECT a.country_name, a.gdp FROM indicators a \
         WHERE a.gdp = (SELECT MAX(b.gdp) FROM indicators b WHERE b.year = a.year)",
    );
    assert!(verdict.is_accepted(), "{:?}", verdict);
}

#[test]
fn test_case_insensitive_identifiers_accepted() {
    let verdict = validator().validate("select GDP, Country_Name from INDICATORS where YEAR = 2020");
    assert!(verdict.is_accepted(), "{:?}", verdict);
}
