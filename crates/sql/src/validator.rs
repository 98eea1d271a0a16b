//! Query Validator
//!
//! Decides whether a model-generated SQL string may run against the store.
//! Checks run in a fixed order and the first failure wins:
//!
//! 1. the string must tokenize and parse as SQLite SQL,
//! 2. it must be exactly one read-only `SELECT` with no side-effecting calls,
//! 3. every relation must be a registry table or a CTE declared in the statement,
//! 4. every column reference must resolve against the relations and aliases in its own scope,
//! 5. it must read at least one registry table and carry a cap the store can enforce.
//!
//! Keyword and separator detection runs on parser tokens, so comments and
//! string literals never trigger it and case or whitespace tricks never hide it.
//! That token scan runs before the full parse: a candidate that smuggles a
//! mutation keyword is refused as forbidden even when the rest of it is garbage.

use std::collections::HashSet;
use std::ops::ControlFlow;
use std::sync::Arc;

use sqlparser::ast::{
    Expr, GroupByExpr, JoinConstraint, JoinOperator, ObjectName, OrderBy, Query, Select,
    SelectItem, SelectItemQualifiedWildcardKind, SetExpr, Statement, TableAlias, TableFactor,
    TableWithJoins, Visit, Visitor,
};
use sqlparser::tokenizer::Token;
use tracing::debug;

use crate::error::Rejection;
use crate::parser::{display_name, is_blank, name_parts, parse, tokenize};
use crate::registry::SchemaRegistry;
use crate::row_limit::enforce_row_limit;

const MUTATION_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "CREATE", "TRUNCATE", "ATTACH", "DETACH",
    "PRAGMA", "VACUUM", "REINDEX", "GRANT", "REVOKE", "MERGE", "UPSERT",
];

/// SQLite functions that touch the filesystem, load code or alter tokenizers.
const SIDE_EFFECT_FUNCTIONS: &[&str] = &[
    "load_extension",
    "readfile",
    "writefile",
    "edit",
    "fts3_tokenizer",
];

/// A query that passed every check, rewritten with an enforced row cap.
///
/// Only [`QueryValidator::validate`] can build one, so the executor cannot be
/// handed SQL that skipped validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedQuery {
    sql: String,
    row_limit: u64,
}

impl AcceptedQuery {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn row_limit(&self) -> u64 {
        self.row_limit
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationVerdict {
    Accepted(AcceptedQuery),
    Rejected(Rejection),
}

impl ValidationVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ValidationVerdict::Accepted(_))
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            ValidationVerdict::Rejected(r) => Some(r),
            ValidationVerdict::Accepted(_) => None,
        }
    }

    pub fn into_result(self) -> Result<AcceptedQuery, Rejection> {
        match self {
            ValidationVerdict::Accepted(q) => Ok(q),
            ValidationVerdict::Rejected(r) => Err(r),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueryValidator {
    registry: Arc<SchemaRegistry>,
    max_rows: u64,
}

impl QueryValidator {
    pub fn new(registry: Arc<SchemaRegistry>, max_rows: u64) -> Self {
        Self { registry, max_rows }
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    pub fn max_rows(&self) -> u64 {
        self.max_rows
    }

    pub fn validate(&self, candidate: &str) -> ValidationVerdict {
        match self.check(candidate) {
            Ok(accepted) => {
                debug!(row_limit = accepted.row_limit, "candidate query accepted");
                ValidationVerdict::Accepted(accepted)
            }
            Err(rejection) => {
                debug!(reason = rejection.reason(), "candidate query rejected");
                ValidationVerdict::Rejected(rejection)
            }
        }
    }

    fn check(&self, candidate: &str) -> Result<AcceptedQuery, Rejection> {
        let tokens = tokenize(candidate)?;
        if is_blank(&tokens) {
            return Err(Rejection::SyntaxError("empty query".to_string()));
        }
        scan_tokens(&tokens)?;

        let mut statements = parse(candidate)?;
        if statements.len() != 1 {
            return Err(Rejection::ForbiddenOperation(format!(
                "expected one statement, found {}",
                statements.len()
            )));
        }
        let mut statement = statements.remove(0);
        let Statement::Query(query) = &mut statement else {
            return Err(Rejection::ForbiddenOperation(
                "only SELECT queries are allowed".to_string(),
            ));
        };

        let mut inspector = Inspector::default();
        if let ControlFlow::Break(rejection) = query.visit(&mut inspector) {
            return Err(rejection);
        }
        inspector.check_tables(&self.registry)?;

        let mut resolver = Resolver::new(&self.registry);
        resolver.query(query)?;

        if resolver.registry_tables.is_empty() {
            return Err(Rejection::SchemaMismatch(
                "query does not read any known table".to_string(),
            ));
        }
        if query.fetch.is_some() {
            return Err(Rejection::SchemaMismatch(
                "FETCH clauses cannot carry an enforceable row cap".to_string(),
            ));
        }

        enforce_row_limit(query, self.max_rows);
        Ok(AcceptedQuery {
            sql: statement.to_string(),
            row_limit: self.max_rows,
        })
    }
}

fn scan_tokens(tokens: &[Token]) -> Result<(), Rejection> {
    for token in tokens {
        match token {
            Token::SemiColon => {
                return Err(Rejection::ForbiddenOperation(
                    "statement separator".to_string(),
                ))
            }
            Token::Word(word) if word.quote_style.is_none() => {
                let upper = word.value.to_ascii_uppercase();
                if MUTATION_KEYWORDS.contains(&upper.as_str()) {
                    return Err(Rejection::ForbiddenOperation(upper));
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Single walk over the query that rejects forbidden constructs on the spot
/// and records every table name it reads.
#[derive(Debug, Default)]
struct Inspector {
    tables: Vec<String>,
    cte_names: HashSet<String>,
}

impl Visitor for Inspector {
    type Break = Rejection;

    /// The walk starts at the query, so any statement reached is nested DML.
    fn pre_visit_statement(&mut self, _statement: &Statement) -> ControlFlow<Rejection> {
        ControlFlow::Break(Rejection::ForbiddenOperation(
            "nested statement".to_string(),
        ))
    }

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<Rejection> {
        if !query.locks.is_empty() {
            return ControlFlow::Break(Rejection::ForbiddenOperation(
                "row locking clause".to_string(),
            ));
        }
        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                self.cte_names
                    .insert(cte.alias.name.value.to_ascii_lowercase());
            }
        }
        reject_select_into(&query.body)
    }

    fn pre_visit_table_factor(&mut self, factor: &TableFactor) -> ControlFlow<Rejection> {
        match factor {
            TableFactor::Table { name, .. } => self.tables.push(display_name(name)),
            TableFactor::Derived { .. } | TableFactor::NestedJoin { .. } => {}
            _ => {
                return ControlFlow::Break(Rejection::SchemaMismatch(
                    "unsupported table source".to_string(),
                ))
            }
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_expr(&mut self, expr: &Expr) -> ControlFlow<Rejection> {
        if let Expr::Function(function) = expr {
            let name = name_parts(&function.name)
                .last()
                .map(|n| n.to_ascii_lowercase())
                .unwrap_or_default();
            if SIDE_EFFECT_FUNCTIONS.contains(&name.as_str()) {
                return ControlFlow::Break(Rejection::ForbiddenOperation(format!(
                    "function {}",
                    name
                )));
            }
        }
        ControlFlow::Continue(())
    }
}

impl Inspector {
    /// Unknown tables are reported before any column, wherever they appear.
    fn check_tables(&self, registry: &SchemaRegistry) -> Result<(), Rejection> {
        for table in &self.tables {
            if !self.cte_names.contains(&table.to_ascii_lowercase())
                && !registry.contains_table(table)
            {
                return Err(Rejection::UnknownTable(table.clone()));
            }
        }
        Ok(())
    }
}

/// Nested queries get their own `pre_visit_query` call, so only the
/// branches of this body are inspected.
fn reject_select_into(body: &SetExpr) -> ControlFlow<Rejection> {
    match body {
        SetExpr::Select(select) if select.into.is_some() => ControlFlow::Break(
            Rejection::ForbiddenOperation("SELECT INTO".to_string()),
        ),
        SetExpr::SetOperation { left, right, .. } => {
            reject_select_into(left)?;
            reject_select_into(right)
        }
        _ => ControlFlow::Continue(()),
    }
}

/// Columns a relation in a FROM clause exposes.
#[derive(Debug, Clone)]
enum Columns {
    Registry(String),
    /// Output names of a CTE or derived table, lowercased.
    Named(Vec<String>),
    /// Self-reference of a recursive CTE declared without a column list.
    Unchecked,
}

/// A relation visible to column references in one SELECT.
#[derive(Debug, Clone)]
struct Binding {
    /// Lowercased alias or table name. Unaliased subqueries have none.
    key: Option<String>,
    /// Name used when a column lookup against this relation fails.
    label: String,
    columns: Columns,
}

/// Column and subquery references that belong to one expression, not
/// counting anything inside the subqueries themselves.
#[derive(Debug, Default)]
struct References {
    depth: usize,
    columns: Vec<Vec<String>>,
    subqueries: Vec<Query>,
}

impl References {
    fn collect<V: Visit>(node: &V) -> Self {
        let mut references = Self::default();
        let _ = node.visit(&mut references);
        references
    }
}

impl Visitor for References {
    type Break = ();

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<()> {
        if self.depth == 0 {
            self.subqueries.push(query.clone());
        }
        self.depth += 1;
        ControlFlow::Continue(())
    }

    fn post_visit_query(&mut self, _query: &Query) -> ControlFlow<()> {
        self.depth -= 1;
        ControlFlow::Continue(())
    }

    fn pre_visit_expr(&mut self, expr: &Expr) -> ControlFlow<()> {
        if self.depth > 0 {
            return ControlFlow::Continue(());
        }
        match expr {
            Expr::Identifier(ident) => self.columns.push(vec![ident.value.clone()]),
            Expr::CompoundIdentifier(parts) => {
                self.columns
                    .push(parts.iter().map(|p| p.value.clone()).collect());
            }
            _ => {}
        }
        ControlFlow::Continue(())
    }
}

/// Resolves every column reference against the relations in its own scope.
///
/// Each SELECT sees the relations of its FROM clause plus those of the
/// queries enclosing it, so correlated subqueries resolve. A projection
/// alias is only visible to GROUP BY, HAVING and ORDER BY of the SELECT
/// that declares it. CTEs and derived tables expose exactly the columns
/// they project.
struct Resolver<'a> {
    registry: &'a SchemaRegistry,
    /// Canonical registry table names, in order of first reference.
    registry_tables: Vec<String>,
    /// CTEs in scope, innermost last.
    ctes: Vec<(String, Columns)>,
    /// FROM bindings of the enclosing SELECTs, innermost last.
    frames: Vec<Vec<Binding>>,
}

impl<'a> Resolver<'a> {
    fn new(registry: &'a SchemaRegistry) -> Self {
        Self {
            registry,
            registry_tables: Vec::new(),
            ctes: Vec::new(),
            frames: Vec::new(),
        }
    }

    /// Checks a query and returns the names of its output columns.
    fn query(&mut self, query: &Query) -> Result<Vec<String>, Rejection> {
        let mark = self.ctes.len();
        let result = self.query_in_scope(query);
        self.ctes.truncate(mark);
        result
    }

    fn query_in_scope(&mut self, query: &Query) -> Result<Vec<String>, Rejection> {
        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                let name = cte.alias.name.value.to_ascii_lowercase();
                let declared: Vec<String> = cte
                    .alias
                    .columns
                    .iter()
                    .map(|c| c.name.value.to_ascii_lowercase())
                    .collect();

                let mark = self.ctes.len();
                if with.recursive {
                    let provisional = if declared.is_empty() {
                        Columns::Unchecked
                    } else {
                        Columns::Named(declared.clone())
                    };
                    self.ctes.push((name.clone(), provisional));
                }
                let projected = self.query(&cte.query)?;
                self.ctes.truncate(mark);

                let columns = if declared.is_empty() { projected } else { declared };
                self.ctes.push((name, Columns::Named(columns)));
            }
        }

        let order_by = query.order_by.as_ref();
        let output = match query.body.as_ref() {
            SetExpr::Select(select) => self.select(select, order_by)?,
            body => {
                let output = self.set_expr(body)?;
                if let Some(order_by) = order_by {
                    self.compound_order_by(order_by, &output)?;
                }
                output
            }
        };

        if let Some(limit) = &query.limit_clause {
            self.resolve(limit, &[])?;
        }
        Ok(output)
    }

    fn set_expr(&mut self, body: &SetExpr) -> Result<Vec<String>, Rejection> {
        match body {
            SetExpr::Select(select) => self.select(select, None),
            SetExpr::Query(query) => self.query(query),
            SetExpr::SetOperation { left, right, .. } => {
                let output = self.set_expr(left)?;
                self.set_expr(right)?;
                Ok(output)
            }
            SetExpr::Values(values) => {
                self.resolve(&values.rows, &[])?;
                let width = values.rows.first().map_or(0, Vec::len);
                Ok((1..=width).map(|i| format!("column{i}")).collect())
            }
            other => Err(Rejection::SchemaMismatch(format!(
                "unsupported query body: {}",
                other
            ))),
        }
    }

    /// ORDER BY on a compound query may only name its output columns.
    fn compound_order_by(
        &mut self,
        order_by: &OrderBy,
        output: &[String],
    ) -> Result<(), Rejection> {
        let references = References::collect(order_by);
        for parts in &references.columns {
            let Some(column) = parts.last() else {
                continue;
            };
            if !output.contains(&column.to_ascii_lowercase()) {
                return Err(Rejection::UnknownColumn {
                    table: self.fallback_table(),
                    column: column.clone(),
                });
            }
        }
        for subquery in &references.subqueries {
            self.query(subquery)?;
        }
        Ok(())
    }

    fn select(
        &mut self,
        select: &Select,
        order_by: Option<&OrderBy>,
    ) -> Result<Vec<String>, Rejection> {
        let mut frame = Vec::new();
        let mut conditions = Vec::new();
        for from in &select.from {
            self.table_with_joins(from, &mut frame, &mut conditions)?;
        }

        self.frames.push(frame);
        let result = self.select_clauses(select, &conditions, order_by);
        self.frames.pop();
        result
    }

    fn select_clauses(
        &mut self,
        select: &Select,
        conditions: &[&Expr],
        order_by: Option<&OrderBy>,
    ) -> Result<Vec<String>, Rejection> {
        for condition in conditions {
            self.resolve(*condition, &[])?;
        }

        let mut aliases = Vec::new();
        let mut output = Vec::new();
        for item in &select.projection {
            match item {
                SelectItem::UnnamedExpr(expr) => {
                    self.resolve(expr, &[])?;
                    output.push(output_name(expr));
                }
                SelectItem::ExprWithAlias { expr, alias } => {
                    self.resolve(expr, &[])?;
                    let alias = alias.value.to_ascii_lowercase();
                    aliases.push(alias.clone());
                    output.push(alias);
                }
                SelectItem::Wildcard(_) => {
                    let frame = self.frames.last().map(Vec::as_slice).unwrap_or_default();
                    for binding in frame {
                        output.extend(self.columns_of(binding));
                    }
                }
                SelectItem::QualifiedWildcard(kind, _) => {
                    let SelectItemQualifiedWildcardKind::ObjectName(name) = kind else {
                        return Err(Rejection::SchemaMismatch(format!(
                            "unsupported projection: {}",
                            kind
                        )));
                    };
                    let qualifier = display_name(name);
                    let binding = self
                        .binding(&qualifier)
                        .cloned()
                        .ok_or_else(|| Rejection::UnknownTable(qualifier.clone()))?;
                    output.extend(self.columns_of(&binding));
                }
            }
        }

        if let Some(selection) = &select.selection {
            self.resolve(selection, &[])?;
        }
        if let GroupByExpr::Expressions(exprs, _) = &select.group_by {
            self.resolve(exprs, &aliases)?;
        }
        if let Some(having) = &select.having {
            self.resolve(having, &aliases)?;
        }
        self.resolve(&select.named_window, &aliases)?;
        if let Some(order_by) = order_by {
            self.resolve(order_by, &aliases)?;
        }
        Ok(output)
    }

    fn table_with_joins<'q>(
        &mut self,
        from: &'q TableWithJoins,
        frame: &mut Vec<Binding>,
        conditions: &mut Vec<&'q Expr>,
    ) -> Result<(), Rejection> {
        self.relation(&from.relation, frame, conditions)?;
        for join in &from.joins {
            let left = frame.len();
            self.relation(&join.relation, frame, conditions)?;

            let constraint = match &join.join_operator {
                JoinOperator::Join(c)
                | JoinOperator::Inner(c)
                | JoinOperator::Left(c)
                | JoinOperator::LeftOuter(c)
                | JoinOperator::Right(c)
                | JoinOperator::RightOuter(c)
                | JoinOperator::FullOuter(c)
                | JoinOperator::Semi(c)
                | JoinOperator::LeftSemi(c)
                | JoinOperator::RightSemi(c)
                | JoinOperator::Anti(c)
                | JoinOperator::LeftAnti(c)
                | JoinOperator::RightAnti(c)
                | JoinOperator::StraightJoin(c) => Some(c),
                JoinOperator::AsOf {
                    match_condition,
                    constraint,
                } => {
                    conditions.push(match_condition);
                    Some(constraint)
                }
                JoinOperator::CrossJoin
                | JoinOperator::CrossApply
                | JoinOperator::OuterApply => None,
            };
            match constraint {
                Some(JoinConstraint::On(expr)) => conditions.push(expr),
                Some(JoinConstraint::Using(names)) => {
                    let (before, after) = frame.split_at(left);
                    self.check_using(names, before, after)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn relation<'q>(
        &mut self,
        factor: &'q TableFactor,
        frame: &mut Vec<Binding>,
        conditions: &mut Vec<&'q Expr>,
    ) -> Result<(), Rejection> {
        match factor {
            TableFactor::Table { name, alias, .. } => {
                let table = display_name(name);
                let lowered = table.to_ascii_lowercase();
                let cte = self
                    .ctes
                    .iter()
                    .rev()
                    .find(|(cte, _)| *cte == lowered)
                    .map(|(_, columns)| columns.clone());

                let (label, columns) = if let Some(columns) = cte {
                    (table.clone(), columns)
                } else if let Some(schema) = self.registry.describe(&table) {
                    if !self.registry_tables.contains(&schema.name) {
                        self.registry_tables.push(schema.name.clone());
                    }
                    (schema.name.clone(), Columns::Registry(schema.name.clone()))
                } else {
                    return Err(Rejection::UnknownTable(table));
                };

                let visible = alias
                    .as_ref()
                    .map_or(lowered, |a| a.name.value.to_ascii_lowercase());
                frame.push(Binding {
                    key: Some(visible),
                    label,
                    columns: renamed(alias.as_ref(), columns),
                });
            }
            TableFactor::Derived {
                subquery, alias, ..
            } => {
                let projected = self.query(subquery)?;
                frame.push(Binding {
                    key: alias.as_ref().map(|a| a.name.value.to_ascii_lowercase()),
                    label: alias
                        .as_ref()
                        .map_or_else(|| "subquery".to_string(), |a| a.name.value.clone()),
                    columns: renamed(alias.as_ref(), Columns::Named(projected)),
                });
            }
            TableFactor::NestedJoin {
                table_with_joins, ..
            } => self.table_with_joins(table_with_joins, frame, conditions)?,
            _ => {
                return Err(Rejection::SchemaMismatch(
                    "unsupported table source".to_string(),
                ))
            }
        }
        Ok(())
    }

    /// Each `USING` column must exist on the joined relation and on some
    /// relation to its left.
    fn check_using(
        &self,
        names: &[ObjectName],
        left: &[Binding],
        right: &[Binding],
    ) -> Result<(), Rejection> {
        for name in names {
            let column = display_name(name);
            if let Some(missing) = right.iter().find(|b| !self.has_column(b, &column)) {
                return Err(Rejection::UnknownColumn {
                    table: missing.label.clone(),
                    column,
                });
            }
            if !left.iter().any(|b| self.has_column(b, &column)) {
                return Err(Rejection::UnknownColumn {
                    table: left
                        .first()
                        .map_or_else(|| self.fallback_table(), |b| b.label.clone()),
                    column,
                });
            }
        }
        Ok(())
    }

    /// Checks the column references of one clause, then the subqueries it
    /// holds with the current FROM bindings in scope.
    fn resolve<V: Visit>(&mut self, node: &V, aliases: &[String]) -> Result<(), Rejection> {
        let references = References::collect(node);
        for parts in &references.columns {
            self.column(parts, aliases)?;
        }
        for subquery in &references.subqueries {
            self.query(subquery)?;
        }
        Ok(())
    }

    fn column(&self, parts: &[String], aliases: &[String]) -> Result<(), Rejection> {
        let Some((column, qualifier)) = parts.split_last() else {
            return Ok(());
        };

        if qualifier.is_empty() {
            if aliases.contains(&column.to_ascii_lowercase()) {
                return Ok(());
            }
            let known = self
                .frames
                .iter()
                .rev()
                .flatten()
                .any(|binding| self.has_column(binding, column));
            if known {
                return Ok(());
            }
            return Err(Rejection::UnknownColumn {
                table: self.fallback_table(),
                column: column.clone(),
            });
        }

        let qualifier = qualifier.join(".");
        let Some(binding) = self.binding(&qualifier) else {
            return Err(Rejection::UnknownTable(qualifier));
        };
        if self.has_column(binding, column) {
            Ok(())
        } else {
            Err(Rejection::UnknownColumn {
                table: binding.label.clone(),
                column: column.clone(),
            })
        }
    }

    /// Innermost binding visible under `qualifier`.
    fn binding(&self, qualifier: &str) -> Option<&Binding> {
        let key = qualifier.to_ascii_lowercase();
        self.frames
            .iter()
            .rev()
            .flat_map(|frame| frame.iter())
            .find(|binding| binding.key.as_deref() == Some(key.as_str()))
    }

    fn has_column(&self, binding: &Binding, column: &str) -> bool {
        match &binding.columns {
            Columns::Registry(table) => self
                .registry
                .describe(table)
                .is_some_and(|t| t.has_column(column)),
            Columns::Named(names) => names.contains(&column.to_ascii_lowercase()),
            Columns::Unchecked => true,
        }
    }

    fn columns_of(&self, binding: &Binding) -> Vec<String> {
        match &binding.columns {
            Columns::Registry(table) => self
                .registry
                .describe(table)
                .map(|t| t.column_names().map(str::to_ascii_lowercase).collect())
                .unwrap_or_default(),
            Columns::Named(names) => names.clone(),
            Columns::Unchecked => Vec::new(),
        }
    }

    /// Relation blamed for an unqualified column nobody in scope exposes.
    fn fallback_table(&self) -> String {
        self.frames
            .iter()
            .rev()
            .flatten()
            .next()
            .map(|binding| binding.label.clone())
            .or_else(|| self.registry.table_names().into_iter().next())
            .unwrap_or_default()
    }
}

/// A column list on the alias, as in `AS t(a, b)`, replaces the names the
/// relation would otherwise expose.
fn renamed(alias: Option<&TableAlias>, columns: Columns) -> Columns {
    match alias {
        Some(alias) if !alias.columns.is_empty() => Columns::Named(
            alias
                .columns
                .iter()
                .map(|c| c.name.value.to_ascii_lowercase())
                .collect(),
        ),
        _ => columns,
    }
}

/// Name SQLite gives an unaliased result column.
fn output_name(expr: &Expr) -> String {
    match expr {
        Expr::Identifier(ident) => ident.value.to_ascii_lowercase(),
        Expr::CompoundIdentifier(parts) => parts
            .last()
            .map(|p| p.value.to_ascii_lowercase())
            .unwrap_or_default(),
        other => other.to_string().to_ascii_lowercase(),
    }
}
