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

//! Table reference extraction (§4.2): walks the whole AST — FROM, JOINs,
//! parenthesized groups, subqueries anywhere, EXISTS, UNION arms, function
//! arguments, CASE arms — via `sqlparser`'s `Visitor`, so aliases are never
//! mistaken for table names (§9 Open Question a).

use std::collections::HashSet;
use std::ops::ControlFlow;

use sqlparser::ast::{ObjectName, Statement, Visit, Visitor};

use crate::error::{self, Error};

fn object_name_to_string(name: &ObjectName) -> String {
    name.0.iter().map(|ident| ident.value.as_str()).collect::<Vec<_>>().join(".")
}

#[derive(Default)]
struct TableNameVisitor {
    names: Vec<String>,
    seen: HashSet<String>,
}

impl Visitor for TableNameVisitor {
    type Break = ();

    fn pre_visit_relation(&mut self, relation: &ObjectName) -> ControlFlow<Self::Break> {
        let name = object_name_to_string(relation);
        if self.seen.insert(name.clone()) {
            self.names.push(name);
        }
        ControlFlow::Continue(())
    }
}

/// Resolved, deduplicated (first-seen order), alias-free table names.
pub fn extract_tables(statement: &Statement) -> Vec<String> {
    let mut visitor = TableNameVisitor::default();
    let _ = statement.visit(&mut visitor);
    visitor.names
}

/// Every table reference must be `<non-empty>.<non-empty>` (§4.2).
pub fn validate_qualified_name(name: &str) -> Result<(), Error> {
    let parts: Vec<&str> = name.split('.').collect();
    let valid = parts.len() == 2 && !parts[0].is_empty() && !parts[1].is_empty();
    if !valid {
        return error::QueryRejectedSnafu {
            detail: format!(
                "table reference '{name}' must be of the form <schema>.<table>, e.g. 'analytics.sales_orders'"
            ),
        }
        .fail();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use sqlparser::dialect::GenericDialect;
    use sqlparser::parser::Parser;

    use super::*;

    fn parse(sql: &str) -> Statement {
        Parser::parse_sql(&GenericDialect {}, sql).unwrap().remove(0)
    }

    #[test]
    fn extracts_simple_table() {
        let stmt = parse("SELECT id FROM analytics.sales_orders");
        assert_eq!(extract_tables(&stmt), vec!["analytics.sales_orders".to_string()]);
    }

    #[test]
    fn extracts_joins_in_first_seen_order() {
        let stmt = parse(
            "SELECT * FROM sales.orders o JOIN sales.customers c ON o.customer_id = c.id",
        );
        assert_eq!(
            extract_tables(&stmt),
            vec!["sales.orders".to_string(), "sales.customers".to_string()]
        );
    }

    #[test]
    fn dedups_repeated_table() {
        let stmt = parse(
            "SELECT * FROM sales.orders o JOIN sales.orders o2 ON o.id = o2.parent_id",
        );
        assert_eq!(extract_tables(&stmt), vec!["sales.orders".to_string()]);
    }

    #[test]
    fn extracts_table_names_not_aliases() {
        let stmt = parse("SELECT o.id FROM sales.orders AS o");
        assert_eq!(extract_tables(&stmt), vec!["sales.orders".to_string()]);
    }

    #[test]
    fn extracts_from_subquery_and_exists() {
        let stmt = parse(
            "SELECT * FROM sales.orders o WHERE EXISTS (SELECT 1 FROM sales.returns r WHERE r.order_id = o.id)",
        );
        assert_eq!(
            extract_tables(&stmt),
            vec!["sales.orders".to_string(), "sales.returns".to_string()]
        );
    }

    #[test]
    fn extracts_from_union_arms() {
        let stmt = parse("SELECT * FROM sales.orders_us UNION SELECT * FROM sales.orders_eu");
        assert_eq!(
            extract_tables(&stmt),
            vec!["sales.orders_us".to_string(), "sales.orders_eu".to_string()]
        );
    }

    #[test]
    fn rejects_unqualified_name() {
        assert!(matches!(validate_qualified_name("orders"), Err(Error::QueryRejected { .. })));
    }

    #[test]
    fn rejects_leading_and_double_dot() {
        assert!(validate_qualified_name(".orders").is_err());
        assert!(validate_qualified_name("sales..orders").is_err());
        assert!(validate_qualified_name("sales.orders.").is_err());
    }

    #[test]
    fn accepts_well_formed_name() {
        validate_qualified_name("sales.orders").unwrap();
    }
}
