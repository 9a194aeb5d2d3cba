//! SQL parsing and classification logic.
//!
//! Uses sqlparser-rs with the PostgreSQL dialect to parse SQL and classify
//! statements by their safety level.

use sqlparser::ast::{Query, Select, SetExpr, Statement, TableFactor, TableWithJoins};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::{Parser, ParserError};

use super::{ClassificationResult, SafetyLevel, StatementType};

type Classified = (SafetyLevel, StatementType);

/// SQL classifier that parses and classifies SQL statements.
#[derive(Debug)]
pub struct SqlClassifier {
    dialect: PostgreSqlDialect,
}

impl Default for SqlClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlClassifier {
    /// Creates a new SQL classifier.
    pub fn new() -> Self {
        Self {
            dialect: PostgreSqlDialect {},
        }
    }

    /// Parses SQL into statements using the PostgreSQL dialect.
    pub fn parse(&self, sql: &str) -> Result<Vec<Statement>, ParserError> {
        Parser::parse_sql(&self.dialect, sql)
    }

    /// Classifies a SQL string.
    ///
    /// SQL that cannot be parsed is treated as destructive.
    pub fn classify(&self, sql: &str) -> ClassificationResult {
        let statements = match self.parse(sql) {
            Ok(statements) => statements,
            Err(e) => {
                return ClassificationResult::with_note(
                    SafetyLevel::Destructive,
                    StatementType::Unknown,
                    format!("Could not parse SQL: {}", e),
                )
            }
        };

        match statements.as_slice() {
            [] => ClassificationResult::with_note(
                SafetyLevel::Destructive,
                StatementType::Unknown,
                "Empty SQL statement",
            ),
            [statement] => {
                let (level, stmt_type) = classify_statement(statement);
                ClassificationResult::new(level, stmt_type)
            }
            many => {
                let (level, stmt_type) = most_dangerous(many.iter().map(classify_statement));
                ClassificationResult::new(level, StatementType::Multiple(Box::new(stmt_type)))
            }
        }
    }
}

/// Convenience function to classify SQL without creating a classifier instance.
pub fn classify_sql(sql: &str) -> ClassificationResult {
    SqlClassifier::new().classify(sql)
}

/// Picks the most dangerous classification; the first one wins ties.
fn most_dangerous(items: impl IntoIterator<Item = Classified>) -> Classified {
    items
        .into_iter()
        .fold((SafetyLevel::Safe, StatementType::Select), |max, item| {
            if item.0 > max.0 {
                item
            } else {
                max
            }
        })
}

/// Classifies a single parsed statement.
pub(super) fn classify_statement(statement: &Statement) -> Classified {
    match statement {
        // Query: may contain data-modifying CTEs, so recurse
        Statement::Query(query) => classify_query(query),
        Statement::Explain {
            analyze, statement, ..
        } => {
            if *analyze {
                // EXPLAIN ANALYZE runs the statement
                let (inner_level, _) = classify_statement(statement);
                (inner_level, StatementType::Explain)
            } else {
                (SafetyLevel::Safe, StatementType::Explain)
            }
        }
        Statement::ShowVariable { .. } => (SafetyLevel::Safe, StatementType::Show),

        Statement::Insert(_) => (SafetyLevel::Mutating, StatementType::Insert),
        Statement::Update { .. } => (SafetyLevel::Mutating, StatementType::Update),
        Statement::Merge { .. } => (SafetyLevel::Mutating, StatementType::Merge),

        Statement::Delete(_) => (SafetyLevel::Destructive, StatementType::Delete),
        Statement::Drop { .. } => (SafetyLevel::Destructive, StatementType::Drop),
        Statement::Truncate { .. } => (SafetyLevel::Destructive, StatementType::Truncate),
        Statement::AlterTable { .. }
        | Statement::AlterIndex { .. }
        | Statement::AlterView { .. }
        | Statement::AlterRole { .. } => (SafetyLevel::Destructive, StatementType::Alter),
        Statement::CreateTable { .. }
        | Statement::CreateIndex { .. }
        | Statement::CreateView { .. }
        | Statement::CreateSchema { .. }
        | Statement::CreateDatabase { .. }
        | Statement::CreateFunction { .. }
        | Statement::CreateRole { .. }
        | Statement::CreateSequence { .. } => (SafetyLevel::Destructive, StatementType::Create),
        Statement::Grant { .. } => (SafetyLevel::Destructive, StatementType::Grant),
        Statement::Revoke { .. } => (SafetyLevel::Destructive, StatementType::Revoke),

        // CALL, SET, COPY, transaction control and everything else
        _ => (SafetyLevel::Destructive, StatementType::Unknown),
    }
}

/// Classifies a Query by recursively inspecting for data-modifying operations.
fn classify_query(query: &Query) -> Classified {
    let ctes = query
        .with
        .iter()
        .flat_map(|with| with.cte_tables.iter())
        .map(|cte| classify_query(&cte.query));

    most_dangerous(ctes.chain(std::iter::once(classify_set_expr(&query.body))))
}

/// Classifies a SetExpr, detecting mutations and recursing into nested queries.
fn classify_set_expr(set_expr: &SetExpr) -> Classified {
    match set_expr {
        SetExpr::Select(select) => classify_select(select),
        SetExpr::Query(query) => classify_query(query),
        SetExpr::SetOperation { left, right, .. } => {
            most_dangerous([classify_set_expr(left), classify_set_expr(right)])
        }
        SetExpr::Values(_) | SetExpr::Table(_) => (SafetyLevel::Safe, StatementType::Select),
        // Data-modifying CTE bodies
        SetExpr::Insert(stmt) | SetExpr::Update(stmt) => classify_statement(stmt),
        #[allow(unreachable_patterns)]
        _ => (SafetyLevel::Destructive, StatementType::Unknown),
    }
}

/// Classifies a Select by checking its FROM clause for subqueries.
fn classify_select(select: &Select) -> Classified {
    most_dangerous(select.from.iter().map(classify_table_with_joins))
}

/// Classifies a TableWithJoins, checking the main relation and all joins.
fn classify_table_with_joins(twj: &TableWithJoins) -> Classified {
    let joins = twj.joins.iter().map(|join| classify_table_factor(&join.relation));
    most_dangerous(std::iter::once(classify_table_factor(&twj.relation)).chain(joins))
}

/// Classifies a TableFactor, recursing into derived tables (subqueries).
fn classify_table_factor(factor: &TableFactor) -> Classified {
    match factor {
        TableFactor::Derived { subquery, .. } => classify_query(subquery),
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => classify_table_with_joins(table_with_joins),
        _ => (SafetyLevel::Safe, StatementType::Select),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_classification(sql: &str, expected_level: SafetyLevel, expected_type: StatementType) {
        let result = classify_sql(sql);
        assert_eq!(
            result.level, expected_level,
            "SQL: '{}' - expected level {:?}, got {:?}",
            sql, expected_level, result.level
        );
        assert_eq!(
            result.statement_type, expected_type,
            "SQL: '{}' - expected type {:?}, got {:?}",
            sql, expected_type, result.statement_type
        );
    }

    #[test]
    fn test_select_is_safe() {
        assert_classification(
            "SELECT * FROM klustercost.tbl_nodes",
            SafetyLevel::Safe,
            StatementType::Select,
        );
    }

    #[test]
    fn test_select_with_join_is_safe() {
        assert_classification(
            "SELECT s.service_name, o.own_kind FROM klustercost.tbl_services s \
             JOIN klustercost.tbl_owners o ON s.own_uid = o.own_uid",
            SafetyLevel::Safe,
            StatementType::Select,
        );
    }

    #[test]
    fn test_select_with_subquery_is_safe() {
        assert_classification(
            "SELECT * FROM (SELECT idx, price_per_hour FROM klustercost.tbl_nodes) n \
             WHERE n.price_per_hour > 1",
            SafetyLevel::Safe,
            StatementType::Select,
        );
    }

    #[test]
    fn test_union_is_safe() {
        assert_classification(
            "SELECT namespace FROM klustercost.tbl_owners UNION SELECT namespace FROM klustercost.tbl_services",
            SafetyLevel::Safe,
            StatementType::Select,
        );
    }

    #[test]
    fn test_cte_select_is_safe() {
        assert_classification(
            "WITH priced AS (SELECT * FROM klustercost.tbl_nodes WHERE price_per_hour IS NOT NULL) \
             SELECT count(*) FROM priced",
            SafetyLevel::Safe,
            StatementType::Select,
        );
    }

    #[test]
    fn test_explain_without_analyze_is_safe() {
        assert_classification(
            "EXPLAIN DELETE FROM klustercost.tbl_nodes",
            SafetyLevel::Safe,
            StatementType::Explain,
        );
    }

    #[test]
    fn test_explain_analyze_delete_is_destructive() {
        assert_classification(
            "EXPLAIN ANALYZE DELETE FROM klustercost.tbl_nodes",
            SafetyLevel::Destructive,
            StatementType::Explain,
        );
    }

    #[test]
    fn test_show_is_safe() {
        assert_classification("SHOW search_path", SafetyLevel::Safe, StatementType::Show);
    }

    #[test]
    fn test_insert_is_mutating() {
        assert_classification(
            "INSERT INTO klustercost.tbl_services (service_name, namespace) VALUES ('api', 'default')",
            SafetyLevel::Mutating,
            StatementType::Insert,
        );
    }

    #[test]
    fn test_update_is_mutating() {
        assert_classification(
            "UPDATE klustercost.tbl_nodes SET price_per_hour = 0.1 WHERE idx = 3",
            SafetyLevel::Mutating,
            StatementType::Update,
        );
    }

    #[test]
    fn test_delete_is_destructive() {
        assert_classification(
            "DELETE FROM klustercost.tbl_owners",
            SafetyLevel::Destructive,
            StatementType::Delete,
        );
    }

    #[test]
    fn test_drop_table_is_destructive() {
        assert_classification(
            "DROP TABLE klustercost.tbl_nodes",
            SafetyLevel::Destructive,
            StatementType::Drop,
        );
    }

    #[test]
    fn test_truncate_is_destructive() {
        assert_classification(
            "TRUNCATE TABLE klustercost.tbl_services",
            SafetyLevel::Destructive,
            StatementType::Truncate,
        );
    }

    #[test]
    fn test_alter_table_is_destructive() {
        assert_classification(
            "ALTER TABLE klustercost.tbl_nodes ADD COLUMN zone TEXT",
            SafetyLevel::Destructive,
            StatementType::Alter,
        );
    }

    #[test]
    fn test_create_table_is_destructive() {
        assert_classification(
            "CREATE TABLE t (id SERIAL PRIMARY KEY)",
            SafetyLevel::Destructive,
            StatementType::Create,
        );
    }

    #[test]
    fn test_grant_is_destructive() {
        assert_classification(
            "GRANT SELECT ON klustercost.tbl_nodes TO reader",
            SafetyLevel::Destructive,
            StatementType::Grant,
        );
    }

    #[test]
    fn test_data_modifying_cte_is_not_safe() {
        let result = classify_sql(
            "WITH gone AS (UPDATE klustercost.tbl_nodes SET price_per_hour = 0 RETURNING idx) \
             SELECT * FROM gone",
        );
        assert_eq!(result.level, SafetyLevel::Mutating);
        assert_eq!(result.statement_type, StatementType::Update);
    }

    #[test]
    fn test_procedure_call_is_destructive() {
        assert_classification(
            "CALL klustercost.register_pod_data('p', 'ns', 'node', 1, 2)",
            SafetyLevel::Destructive,
            StatementType::Unknown,
        );
    }

    #[test]
    fn test_multi_statement_uses_most_dangerous() {
        let result = classify_sql("SELECT 1; DELETE FROM klustercost.tbl_nodes");
        assert_eq!(result.level, SafetyLevel::Destructive);
        assert_eq!(
            result.statement_type,
            StatementType::Multiple(Box::new(StatementType::Delete))
        );
    }

    #[test]
    fn test_multi_statement_all_safe() {
        let result = classify_sql("SELECT 1; SELECT 2");
        assert_eq!(result.level, SafetyLevel::Safe);
        assert!(matches!(result.statement_type, StatementType::Multiple(_)));
    }

    #[test]
    fn test_parse_failure_is_destructive() {
        let result = classify_sql("THIS IS NOT VALID SQL AT ALL");
        assert_eq!(result.level, SafetyLevel::Destructive);
        assert!(result.note.unwrap().contains("Could not parse SQL"));
    }

    #[test]
    fn test_empty_sql_is_destructive() {
        let result = classify_sql("   \n\t  ");
        assert_eq!(result.level, SafetyLevel::Destructive);
        assert_eq!(result.statement_type, StatementType::Unknown);
    }

    #[test]
    fn test_case_insensitive() {
        assert_classification(
            "select * from klustercost.tbl_nodes",
            SafetyLevel::Safe,
            StatementType::Select,
        );
        assert_classification(
            "delete from klustercost.tbl_nodes",
            SafetyLevel::Destructive,
            StatementType::Delete,
        );
    }
}
