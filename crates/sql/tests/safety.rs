mod common;

use common::{reject, validator, MAX_ROWS};
use econsql_sql::row_limit::effective_limit;
use econsql_sql::{parser, Rejection, ValidationVerdict};
use sqlparser::ast::Statement;

const MUTATIONS: &[&str] = &[
    "INSERT INTO indicators (gdp) VALUES (1)",
    "UPDATE indicators SET gdp = 0",
    "DELETE FROM indicators",
    "DROP TABLE indicators",
    "ALTER TABLE indicators ADD COLUMN x TEXT",
    "CREATE TABLE x (a INT)",
    "TRUNCATE TABLE indicators",
    "ATTACH DATABASE '/tmp/x.db' AS x",
    "PRAGMA writable_schema = 1",
    "VACUUM",
    "WITH d AS (DELETE FROM indicators RETURNING *) SELECT * FROM d",
    "SELECT gdp FROM indicators WHERE year = (DELETE FROM indicators)",
    "select gdp from indicators where 1 = 1 union select 1 from (drop table indicators)",
];

#[test]
fn test_mutations_are_forbidden() {
    for sql in MUTATIONS {
        assert!(
            matches!(reject(sql), Rejection::ForbiddenOperation(_)),
            "{sql}"
        );
    }
}

#[test]
fn test_piggybacked_statements_are_forbidden() {
    let payloads = [
        "SELECT gdp FROM indicators; DROP TABLE indicators",
        "SELECT gdp FROM indicators;",
        "SELECT gdp FROM indicators;\n-- trailing comment",
        "SELECT gdp FROM indicators WHERE country_id = 'US';SELECT 1",
        "SELECT gdp FROM indicators; garbage that does not parse",
    ];
    for sql in payloads {
        assert!(
            matches!(reject(sql), Rejection::ForbiddenOperation(_)),
            "{sql}"
        );
    }
}

#[test]
fn test_whitespace_and_case_variants_still_caught() {
    let payloads = [
        "dElEtE FROM indicators",
        "DELETE\tFROM\nindicators",
        "SELECT gdp FROM indicators WHERE year = 1/**/;/**/DROP TABLE indicators",
    ];
    for sql in payloads {
        assert!(
            matches!(reject(sql), Rejection::ForbiddenOperation(_)),
            "{sql}"
        );
    }
}

#[test]
fn test_unknown_columns_in_every_clause() {
    let cases = [
        "SELECT population FROM indicators",
        "SELECT gdp FROM indicators WHERE population > 10",
        "SELECT gdp FROM indicators ORDER BY population",
        "SELECT COUNT(*) FROM indicators GROUP BY population",
        "SELECT country_id FROM indicators GROUP BY country_id HAVING MAX(population) > 1",
        "SELECT ROUND(population, 2) FROM indicators",
        "SELECT a.gdp FROM indicators a JOIN indicators b ON a.population = b.gdp",
        "SELECT population AS population FROM indicators",
        "SELECT gdp FROM indicators WHERE population > 0 UNION SELECT 1 AS population FROM indicators",
        "SELECT a.gdp FROM indicators a JOIN indicators b USING (population)",
        "WITH r AS (SELECT population FROM indicators) SELECT * FROM r",
    ];
    for sql in cases {
        assert_eq!(
            reject(sql),
            Rejection::UnknownColumn {
                table: "indicators".into(),
                column: "population".into()
            },
            "{sql}"
        );
    }
}

#[test]
fn test_accepted_queries_carry_the_ceiling() {
    let candidates = [
        "SELECT gdp FROM indicators",
        "SELECT gdp FROM indicators LIMIT 10",
        "SELECT gdp FROM indicators LIMIT 999999",
        "SELECT gdp FROM indicators LIMIT 50 OFFSET 10",
        "SELECT country_id, AVG(inflation) AS avg_inflation FROM indicators GROUP BY country_id",
        "SELECT gdp FROM indicators UNION SELECT gdp_per_capita FROM indicators",
    ];
    for sql in candidates {
        let ValidationVerdict::Accepted(accepted) = validator().validate(sql) else {
            panic!("rejected: {sql}");
        };

        let statements = parser::parse(accepted.sql()).unwrap();
        let Statement::Query(query) = &statements[0] else {
            panic!("not a query: {}", accepted.sql());
        };
        let limit = effective_limit(query).expect("limit present");
        assert!(limit <= MAX_ROWS, "{} -> {}", sql, accepted.sql());
    }
}

#[test]
fn test_verdicts_are_stable() {
    let candidates = [
        "SELECT gdp, inflation FROM indicators WHERE country_id='US' AND year=2025",
        "DELETE FROM indicators WHERE year=2020",
        "SELECT nonexistent_col FROM indicators",
        "SELECT * FROM other_table",
        "SELEC broken",
    ];
    let validator = validator();
    for sql in candidates {
        assert_eq!(validator.validate(sql), validator.validate(sql), "{sql}");
    }
}
