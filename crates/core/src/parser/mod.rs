/*
Copyright 2024-2025 The Canonica Authors

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

     https://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! The SQL parser (§4.2): pre-parse rejections, syntactic parsing, statement
//! dispatch, table extraction, and time-travel detection — producing a
//! `LogicalPlan` or a typed rejection.

pub mod rejections;
pub mod tables;
pub mod time_travel;

use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

use crate::error::{self, Error};
use crate::model::capability::OperationType;
use crate::model::plan::LogicalPlan;

/// Parses a single SQL string into a `LogicalPlan`, or fails with a typed,
/// explainable rejection (§4.2).
pub fn parse(sql: &str) -> Result<LogicalPlan, Error> {
    rejections::check(sql)?;

    let trimmed = sql.trim().trim_end_matches(';').trim();
    let operation = classify_operation(trimmed)?;

    let statements = Parser::parse_sql(&GenericDialect {}, trimmed).map_err(|e| Error::QueryRejected {
        detail: format!("SQL syntax error: {e}"),
    })?;
    let statement = statements
        .into_iter()
        .next()
        .ok_or_else(|| Error::QueryRejected { detail: "query rejected: no statement found".to_string() })?;

    let mut tables = Vec::new();
    for raw in tables::extract_tables(&statement) {
        tables::validate_qualified_name(&raw)?;
        tables.push(raw);
    }

    let tt = time_travel::detect(sql);

    Ok(LogicalPlan {
        raw_sql: sql.to_string(),
        operation,
        tables,
        has_time_travel: tt.has_time_travel,
        global_time_travel: tt.global,
        per_table_time_travel: tt.per_table,
    })
}

/// Dispatches on the statement's leading keyword. Classification over the
/// text rather than matching `sqlparser::ast::Statement` variant shapes
/// directly keeps this resilient to the exact struct/tuple shape a given
/// `sqlparser` release gives each statement kind; the syntactic validity
/// check (and all structural work — table extraction) still goes through
/// the real parser and its AST.
fn classify_operation(sql: &str) -> Result<OperationType, Error> {
    let unwrapped = sql.trim_start().trim_start_matches('(').trim_start();
    let first_word = unwrapped
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or("")
        .to_uppercase();

    match first_word.as_str() {
        "SELECT" => Ok(OperationType::Select),
        "INSERT" => error::WriteNotAllowedSnafu { op: OperationType::Insert }.fail(),
        "UPDATE" => error::WriteNotAllowedSnafu { op: OperationType::Update }.fail(),
        "DELETE" => error::WriteNotAllowedSnafu { op: OperationType::Delete }.fail(),
        "CREATE" | "DROP" | "ALTER" | "TRUNCATE" => error::UnsupportedSyntaxSnafu {
            construct: "DDL statement".to_string(),
            alternative: Some(
                "DDL is not supported; manage tables through the metadata repository".to_string(),
            ),
        }
        .fail(),
        "SHOW" => error::UnsupportedSyntaxSnafu {
            construct: "SHOW statement".to_string(),
            alternative: Some("query the metadata repository directly instead of SHOW".to_string()),
        }
        .fail(),
        "SET" => error::UnsupportedSyntaxSnafu {
            construct: "SET statement".to_string(),
            alternative: Some("session variables are not supported".to_string()),
        }
        .fail(),
        other => error::QueryRejectedSnafu { detail: format!("unrecognized statement kind: {other}") }.fail(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_single_engine_select() {
        let plan = parse("SELECT id FROM analytics.sales_orders").unwrap();
        assert_eq!(plan.operation, OperationType::Select);
        assert_eq!(plan.tables, vec!["analytics.sales_orders".to_string()]);
        assert!(!plan.has_time_travel);
    }

    #[test]
    fn accepts_union() {
        let plan = parse("SELECT * FROM sales.orders_us UNION SELECT * FROM sales.orders_eu").unwrap();
        assert_eq!(plan.tables.len(), 2);
    }

    #[test]
    fn rejects_insert_as_write_not_allowed() {
        let err = parse("INSERT INTO sales.orders VALUES (1)").unwrap_err();
        assert!(matches!(err, Error::WriteNotAllowed { op: OperationType::Insert }));
    }

    #[test]
    fn rejects_update_as_write_not_allowed() {
        let err = parse("UPDATE sales.orders SET status = 'x'").unwrap_err();
        assert!(matches!(err, Error::WriteNotAllowed { op: OperationType::Update }));
    }

    #[test]
    fn rejects_delete_as_write_not_allowed() {
        let err = parse("DELETE FROM sales.orders").unwrap_err();
        assert!(matches!(err, Error::WriteNotAllowed { op: OperationType::Delete }));
    }

    #[test]
    fn rejects_ddl() {
        assert!(matches!(
            parse("CREATE TABLE sales.orders (id INT)"),
            Err(Error::UnsupportedSyntax { .. })
        ));
    }

    #[test]
    fn rejects_show() {
        assert!(matches!(parse("SHOW TABLES"), Err(Error::UnsupportedSyntax { .. })));
    }

    #[test]
    fn rejects_set() {
        assert!(matches!(parse("SET search_path = sales"), Err(Error::UnsupportedSyntax { .. })));
    }

    #[test]
    fn rejects_malformed_sql() {
        assert!(parse("SELECT FROM").is_err());
    }

    #[test]
    fn populates_global_and_per_table_time_travel() {
        let sql = "SELECT * FROM sales.orders FOR SYSTEM_TIME AS OF TIMESTAMP '2024-01-01T00:00:00Z' \
                   JOIN sales.customers FOR SYSTEM_TIME AS OF TIMESTAMP '2024-01-02T00:00:00Z' \
                   ON orders.customer_id = customers.id";
        let plan = parse(sql).unwrap();
        assert!(plan.has_time_travel);
        assert_eq!(plan.per_table_time_travel.len(), 2);
        assert!(plan.global_time_travel.is_some());
    }
}
