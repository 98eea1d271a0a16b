//! Schema Registry
//!
//! In-memory description of the tables a generated query may touch. The
//! validator treats it as ground truth; nothing else reads it except the
//! prompt builder, which renders [`SchemaContext`] for the generation model.
//!
//! Identifier lookups are ASCII case-insensitive, matching SQLite.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::error::RegistryError;
use crate::sanitize::validate_identifier;

/// Declared column type, using SQLite storage class names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScalarType {
    Text,
    Integer,
    Real,
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarType::Text => write!(f, "TEXT"),
            ScalarType::Integer => write!(f, "INTEGER"),
            ScalarType::Real => write!(f, "REAL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: ScalarType,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

/// What the generation model is told about the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaContext {
    pub dialect: &'static str,
    pub table: String,
    /// JSON object of column name to description, in declaration order.
    pub columns_json: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchemaRegistry {
    tables: Vec<TableSchema>,
}

impl SchemaRegistry {
    pub fn new(tables: Vec<TableSchema>) -> Result<Self, RegistryError> {
        let mut seen_tables = BTreeSet::new();
        for table in &tables {
            validate_identifier(&table.name)?;
            if !seen_tables.insert(table.name.to_ascii_lowercase()) {
                return Err(RegistryError::DuplicateTable(table.name.clone()));
            }

            let mut seen_columns = BTreeSet::new();
            for column in &table.columns {
                validate_identifier(&column.name)?;
                if !seen_columns.insert(column.name.to_ascii_lowercase()) {
                    return Err(RegistryError::DuplicateColumn {
                        table: table.name.clone(),
                        column: column.name.clone(),
                    });
                }
            }
        }
        Ok(Self { tables })
    }

    /// The World Bank style indicators table, one row per country and year.
    pub fn economic_indicators(table_name: &str) -> Result<Self, RegistryError> {
        use ScalarType::*;

        const COLUMNS: &[(&str, ScalarType, &str)] = &[
            ("country_name", Text, "Extended country name the data refers to."),
            ("country_id", Text, "2 letters id of the country."),
            ("year", Integer, "Year the data refers to."),
            ("inflation", Real, "Inflation figures (CPI %)."),
            ("gdp", Real, "GDP figure."),
            ("gdp_per_capita", Real, "GDP per capita numbers."),
            ("unemployment_rate", Real, "Unemployment rate."),
            ("interest_rate", Real, "Real interest rate."),
            ("inflation_gdp_deflator", Real, "Inflation as GDP deflator."),
            ("gdp_growth", Real, "GDP growth as annual percentage."),
            (
                "current_account_balance",
                Real,
                "Current Account Balance as % of GDP.",
            ),
            ("government_expense", Real, "Government expense as % of GDP."),
            ("government_revenue", Real, "Government revenue as % of GDP."),
            ("tax_revenue", Real, "Tax revenue as % of GDP."),
            ("gross_national_income", Real, "Gross national income in USD."),
            ("public_debt", Real, "Public debt as percent of GDP."),
        ];

        let columns = COLUMNS
            .iter()
            .map(|(name, data_type, description)| ColumnSchema {
                name: name.to_string(),
                data_type: *data_type,
                description: description.to_string(),
            })
            .collect();

        Self::new(vec![TableSchema {
            name: table_name.to_string(),
            columns,
        }])
    }

    pub fn describe(&self, table: &str) -> Option<&TableSchema> {
        self.tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(table))
    }

    pub fn columns_of(&self, table: &str) -> Option<BTreeSet<&str>> {
        self.describe(table).map(|t| t.column_names().collect())
    }

    pub fn type_of(&self, table: &str, column: &str) -> Option<ScalarType> {
        self.describe(table)?.column(column).map(|c| c.data_type)
    }

    pub fn contains_table(&self, table: &str) -> bool {
        self.describe(table).is_some()
    }

    pub fn tables(&self) -> &[TableSchema] {
        &self.tables
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.iter().map(|t| t.name.clone()).collect()
    }

    /// Context for the generation prompt. Describes the first table, which is
    /// the only one the economic registry declares.
    pub fn schema_context(&self) -> SchemaContext {
        let Some(table) = self.tables.first() else {
            return SchemaContext {
                dialect: "SQLite",
                table: String::new(),
                columns_json: "{}".to_string(),
            };
        };

        let columns: serde_json::Map<String, serde_json::Value> = table
            .columns
            .iter()
            .map(|c| (c.name.clone(), serde_json::Value::String(c.description.clone())))
            .collect();

        SchemaContext {
            dialect: "SQLite",
            table: table.name.clone(),
            columns_json: serde_json::to_string_pretty(&columns)
                .unwrap_or_else(|_| "{}".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::economic_indicators("indicators").unwrap()
    }

    #[test]
    fn test_economic_indicators_layout() {
        let registry = registry();
        let table = registry.describe("indicators").unwrap();
        assert_eq!(table.columns.len(), 16);
        assert_eq!(table.columns[0].name, "country_name");
        assert_eq!(table.columns[15].name, "public_debt");
    }

    #[test]
    fn test_lookups_are_case_insensitive() {
        let registry = registry();
        assert!(registry.describe("INDICATORS").is_some());
        assert_eq!(registry.type_of("Indicators", "YEAR"), Some(ScalarType::Integer));
        assert_eq!(registry.type_of("indicators", "gdp"), Some(ScalarType::Real));
        assert_eq!(registry.type_of("indicators", "country_id"), Some(ScalarType::Text));
        assert_eq!(registry.type_of("indicators", "population"), None);
        assert_eq!(registry.type_of("other_table", "gdp"), None);
    }

    #[test]
    fn test_columns_of() {
        let registry = registry();
        let columns = registry.columns_of("indicators").unwrap();
        assert!(columns.contains("gdp"));
        assert!(columns.contains("inflation"));
        assert!(!columns.contains("nonexistent_col"));
        assert!(registry.columns_of("missing").is_none());
    }

    #[test]
    fn test_rejects_bad_table_name() {
        assert!(matches!(
            SchemaRegistry::economic_indicators("indicators; DROP TABLE x"),
            Err(RegistryError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_rejects_duplicates() {
        let column = ColumnSchema {
            name: "gdp".into(),
            data_type: ScalarType::Real,
            description: String::new(),
        };
        let table = TableSchema {
            name: "t".into(),
            columns: vec![column.clone(), ColumnSchema { name: "GDP".into(), ..column }],
        };
        assert!(matches!(
            SchemaRegistry::new(vec![table]),
            Err(RegistryError::DuplicateColumn { .. })
        ));
    }

    #[test]
    fn test_schema_context_keeps_declaration_order() {
        let context = registry().schema_context();
        assert_eq!(context.table, "indicators");
        assert_eq!(context.dialect, "SQLite");

        let country = context.columns_json.find("\"country_name\"").unwrap();
        let debt = context.columns_json.find("\"public_debt\"").unwrap();
        assert!(country < debt);

        let parsed: serde_json::Value = serde_json::from_str(&context.columns_json).unwrap();
        assert_eq!(parsed["gdp"], "GDP figure.");
    }
}
