//! Read-only statement validation.
//!
//! Generated SQL is only executed if it is exactly one query that reads data:
//! no second statement, no data-modifying CTE, no `SELECT ... INTO` and no
//! row-locking clause.

use sqlparser::ast::{Query, SetExpr, Statement, TableFactor, TableWithJoins};

use super::parser::{classify_statement, SqlClassifier};
use super::SafetyLevel;
use crate::error::{AskError, Result};

/// Checks that `sql` is a single read-only query.
///
/// A single trailing `;` is accepted. Rejections are `AskError::Execution`
/// carrying the reason.
pub fn validate_read_only(sql: &str) -> Result<()> {
    let statements = SqlClassifier::new().parse(sql).map_err(|e| {
        AskError::execution(format!("Generated SQL could not be parsed: {}", e))
    })?;

    let statement = match statements.as_slice() {
        [] => return Err(AskError::execution("Generated SQL is empty")),
        [statement] => statement,
        many => {
            return Err(AskError::execution(format!(
                "Generated SQL contains {} statements, only a single SELECT is allowed",
                many.len()
            )))
        }
    };

    let (level, stmt_type) = classify_statement(statement);
    let query = match statement {
        Statement::Query(query) if level == SafetyLevel::Safe => query,
        _ => {
            return Err(AskError::execution(format!(
                "Only a single read-only SELECT is allowed, got {} ({})",
                stmt_type, level
            )))
        }
    };

    check_query(query)
}

fn check_query(query: &Query) -> Result<()> {
    if !query.locks.is_empty() {
        return Err(AskError::execution(
            "Row-locking clauses (FOR UPDATE / FOR SHARE) are not allowed",
        ));
    }

    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            check_query(&cte.query)?;
        }
    }

    check_set_expr(&query.body)
}

fn check_set_expr(set_expr: &SetExpr) -> Result<()> {
    match set_expr {
        SetExpr::Select(select) => {
            if select.into.is_some() {
                return Err(AskError::execution(
                    "SELECT ... INTO creates a table and is not allowed",
                ));
            }
            select.from.iter().try_for_each(check_table_with_joins)
        }
        SetExpr::Query(query) => check_query(query),
        SetExpr::SetOperation { left, right, .. } => {
            check_set_expr(left)?;
            check_set_expr(right)
        }
        // Classification already rejected anything that is not read-only.
        _ => Ok(()),
    }
}

fn check_table_with_joins(twj: &TableWithJoins) -> Result<()> {
    check_table_factor(&twj.relation)?;
    twj.joins
        .iter()
        .try_for_each(|join| check_table_factor(&join.relation))
}

fn check_table_factor(factor: &TableFactor) -> Result<()> {
    match factor {
        TableFactor::Derived { subquery, .. } => check_query(subquery),
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => check_table_with_joins(table_with_joins),
        _ => Ok(()),
    }
}
