//! Thin wrappers over `sqlparser` configured for the SQLite store.

use sqlparser::ast::{ObjectName, ObjectNamePart, Statement};
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::{Parser, ParserOptions};
use sqlparser::tokenizer::{Token, Tokenizer};

use crate::error::Rejection;

/// Nesting depth accepted from generated SQL. Deeper input is a syntax error.
pub const RECURSION_LIMIT: usize = 64;

pub fn tokenize(sql: &str) -> Result<Vec<Token>, Rejection> {
    Tokenizer::new(&SQLiteDialect {}, sql)
        .tokenize()
        .map_err(|e| Rejection::SyntaxError(e.to_string()))
}

pub fn parse(sql: &str) -> Result<Vec<Statement>, Rejection> {
    let dialect = SQLiteDialect {};
    Parser::new(&dialect)
        .with_options(ParserOptions::new().with_trailing_commas(false))
        .with_recursion_limit(RECURSION_LIMIT)
        .try_with_sql(sql)
        .and_then(|mut parser| parser.parse_statements())
        .map_err(|e| Rejection::SyntaxError(e.to_string()))
}

/// True when the token stream holds nothing but whitespace and comments.
pub fn is_blank(tokens: &[Token]) -> bool {
    tokens
        .iter()
        .all(|t| matches!(t, Token::Whitespace(_) | Token::EOF))
}

/// Unquoted identifier parts of an object name, e.g. `main.indicators` -> `["main", "indicators"]`.
pub fn name_parts(name: &ObjectName) -> Vec<String> {
    name.0
        .iter()
        .map(|part| match part {
            ObjectNamePart::Identifier(ident) => ident.value.clone(),
            ObjectNamePart::Function(function) => function.to_string(),
        })
        .collect()
}

pub fn display_name(name: &ObjectName) -> String {
    name_parts(name).join(".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlparser::ast::{SetExpr, TableFactor};

    #[test]
    fn test_parse_single_select() {
        let statements = parse("SELECT gdp FROM indicators").unwrap();
        assert_eq!(statements.len(), 1);
        assert!(matches!(statements[0], Statement::Query(_)));
    }

    #[test]
    fn test_parse_error_is_syntax_error() {
        assert!(matches!(
            parse("SELEC gdp FROM indicators"),
            Err(Rejection::SyntaxError(_))
        ));
        assert!(matches!(
            parse("SELECT gdp, FROM indicators"),
            Err(Rejection::SyntaxError(_))
        ));
    }

    #[test]
    fn test_recursion_limit() {
        let deep = format!(
            "SELECT {}1{} FROM indicators",
            "(".repeat(RECURSION_LIMIT * 2),
            ")".repeat(RECURSION_LIMIT * 2)
        );
        assert!(matches!(parse(&deep), Err(Rejection::SyntaxError(_))));
    }

    #[test]
    fn test_name_parts_drop_quotes() {
        let statements = parse("SELECT gdp FROM main.\"Indicators\"").unwrap();
        let Statement::Query(query) = &statements[0] else {
            panic!("not a query");
        };
        let SetExpr::Select(select) = query.body.as_ref() else {
            panic!("not a select");
        };
        let TableFactor::Table { name, .. } = &select.from[0].relation else {
            panic!("not a table");
        };
        assert_eq!(name_parts(name), vec!["main", "Indicators"]);
        assert_eq!(display_name(name), "main.Indicators");
    }

    #[test]
    fn test_blank_input() {
        assert!(is_blank(&tokenize("").unwrap()));
        assert!(is_blank(&tokenize("  -- just a comment\n /* and another */ ").unwrap()));
        assert!(!is_blank(&tokenize("SELECT 1").unwrap()));
    }

    #[test]
    fn test_unterminated_string_fails_tokenizing() {
        assert!(matches!(
            tokenize("SELECT 'oops FROM indicators"),
            Err(Rejection::SyntaxError(_))
        ));
    }
}
