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

//! Federation analyzer (§4.7): groups a query's tables by engine and, when
//! the query is cross-engine, extracts joins, pushable predicates, required
//! columns, aggregations, order-by, and limit.
//!
//! Like `parser::time_travel`, this works over the raw SQL text rather than
//! the `sqlparser` AST: join conditions, predicate pushability, and
//! aggregate-function detection here are all MVP-level ("simple predicates",
//! per §4.7) and do not need the full expression tree, so a handful of
//! narrowly-scoped regexes are more robust than depending on the exact shape
//! `Select`/`Join`/`Expr` take in a given `sqlparser` release.
//!
//! Because the alias group in `from_join_re`/`join_re` is optional and
//! unanchored, a bare table reference immediately followed by a clause
//! keyword (`WHERE`, `JOIN`, `ON`, ...) would otherwise be captured as if
//! that keyword were the alias; `accept_alias` skips it explicitly.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;

use crate::error::Error;
use crate::model::federation::{Aggregation, JoinCondition, JoinType, OrderByClause, QueryAnalysis, SortDirection};
use crate::model::plan::LogicalPlan;
use crate::repository::MetadataRepository;

fn from_join_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)\bFROM\s+([A-Za-z_][\w]*\.[A-Za-z_][\w]*)\s*(?:(?:AS\s+)?([A-Za-z_]\w*)\b)?")
            .expect("valid regex")
    })
}

fn join_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?is)\b(INNER|LEFT(?:\s+OUTER)?|RIGHT(?:\s+OUTER)?|FULL(?:\s+OUTER)?|CROSS)?\s*JOIN\s+([A-Za-z_][\w]*\.[A-Za-z_][\w]*)\s*(?:(?:AS\s+)?([A-Za-z_]\w*)\b)?(?:\s+ON\s+([A-Za-z_]\w*)\.(\w+)\s*=\s*([A-Za-z_]\w*)\.(\w+))?",
        )
        .expect("valid regex")
    })
}

/// Keywords that can immediately follow a table expression in the SQL this
/// analyzer supports. `from_join_re`/`join_re`'s alias group is optional and
/// unanchored, so without this guard `FROM sales.orders WHERE ...` would
/// greedily capture `WHERE` as if it were an alias.
const FOLLOWING_KEYWORDS: &[&str] =
    &["WHERE", "JOIN", "INNER", "LEFT", "RIGHT", "FULL", "CROSS", "ON", "GROUP", "ORDER", "LIMIT", "AND", "OR", "UNION"];

fn is_keyword(candidate: &str) -> bool {
    FOLLOWING_KEYWORDS.contains(&candidate.to_uppercase().as_str())
}

/// Accepts a regex-captured alias candidate only if it isn't one of the
/// keywords in `FOLLOWING_KEYWORDS`; otherwise falls back to the table's own
/// name as its alias, same as when no alias group matched at all.
fn accept_alias(table: &str, candidate: Option<&str>) -> String {
    match candidate {
        Some(alias) if !is_keyword(alias) => alias.to_string(),
        _ => table.to_string(),
    }
}

fn alias_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([A-Za-z_]\w*)\.(\w+)\b").expect("valid regex"))
}

fn where_clause_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)\bWHERE\s+(.+?)(?:\bGROUP\s+BY\b|\bORDER\s+BY\b|\bLIMIT\b|$)").expect("valid regex")
    })
}

fn aggregate_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)\b(SUM|COUNT|AVG|MIN|MAX)\s*\(\s*([\w.*]+)\s*\)(?:\s+AS\s+(\w+))?").expect("valid regex")
    })
}

fn order_by_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)\bORDER\s+BY\s+(.+?)(?:\bLIMIT\b|$)").expect("valid regex"))
}

fn limit_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)\bLIMIT\s+(\d+)").expect("valid regex"))
}

/// Resolves `FROM`/`JOIN` clauses to an alias -> fully-qualified-table map,
/// falling back to the table's own name as its alias.
fn alias_map(sql: &str) -> HashMap<String, String> {
    let mut aliases = HashMap::new();
    if let Some(caps) = from_join_re().captures(sql) {
        let table = caps[1].to_string();
        let alias = accept_alias(&table, caps.get(2).map(|m| m.as_str()));
        aliases.insert(alias, table.clone());
        aliases.insert(table.clone(), table);
    }
    for caps in join_re().captures_iter(sql) {
        let table = caps[2].to_string();
        let alias = accept_alias(&table, caps.get(3).map(|m| m.as_str()));
        aliases.insert(alias, table.clone());
        aliases.insert(table.clone(), table);
    }
    aliases
}

fn join_type_from(keyword: Option<&str>) -> JoinType {
    match keyword.map(str::to_uppercase).as_deref() {
        Some(kw) if kw.starts_with("LEFT") => JoinType::Left,
        Some(kw) if kw.starts_with("RIGHT") => JoinType::Right,
        Some(kw) if kw.starts_with("FULL") => JoinType::Full,
        Some("CROSS") => JoinType::Cross,
        _ => JoinType::Inner,
    }
}

fn extract_joins(sql: &str, aliases: &HashMap<String, String>) -> Vec<JoinCondition> {
    let mut joins = Vec::new();
    for caps in join_re().captures_iter(sql) {
        let Some(left_alias) = caps.get(4) else { continue };
        let right_alias = &caps[6];
        let left_col = &caps[5];
        let right_col = &caps[7];
        let join_type = join_type_from(caps.get(1).map(|m| m.as_str()));
        let left_table = aliases.get(left_alias.as_str()).cloned().unwrap_or_else(|| left_alias.as_str().to_string());
        let right_table = aliases.get(right_alias).cloned().unwrap_or_else(|| right_alias.to_string());
        joins.push(JoinCondition {
            join_type,
            left_table,
            left_column: left_col.to_string(),
            right_table,
            right_column: right_col.to_string(),
        });
    }
    joins
}

fn tables_referenced_in(expr: &str, aliases: &HashMap<String, String>) -> HashSet<String> {
    alias_ref_re()
        .captures_iter(expr)
        .filter_map(|c| aliases.get(&c[1]).cloned())
        .collect()
}

fn extract_predicates(
    sql: &str,
    aliases: &HashMap<String, String>,
) -> (HashMap<String, Vec<String>>, HashMap<String, Vec<String>>) {
    let mut pushable: HashMap<String, Vec<String>> = HashMap::new();
    let mut with_subquery: HashMap<String, Vec<String>> = HashMap::new();

    let Some(caps) = where_clause_re().captures(sql) else {
        return (pushable, with_subquery);
    };
    let clause = caps[1].trim();

    for conjunct in clause.split("AND").chain(clause.split("and")) {
        let conjunct = conjunct.trim();
        if conjunct.is_empty() {
            continue;
        }
        let tables = tables_referenced_in(conjunct, aliases);
        if tables.len() != 1 {
            continue;
        }
        let table = tables.into_iter().next().expect("exactly one table");
        if conjunct.to_uppercase().contains("SELECT") {
            with_subquery.entry(table).or_default().push(conjunct.to_string());
        } else {
            pushable.entry(table).or_default().push(conjunct.to_string());
        }
    }

    (pushable, with_subquery)
}

fn extract_required_columns(sql: &str, joins: &[JoinCondition], aliases: &HashMap<String, String>) -> HashMap<String, Vec<String>> {
    let mut columns: HashMap<String, Vec<String>> = HashMap::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();

    for caps in alias_ref_re().captures_iter(sql) {
        let Some(table) = aliases.get(&caps[1]) else { continue };
        let column = caps[2].to_string();
        if seen.insert((table.clone(), column.clone())) {
            columns.entry(table.clone()).or_default().push(column);
        }
    }

    for join in joins {
        if seen.insert((join.left_table.clone(), join.left_column.clone())) {
            columns.entry(join.left_table.clone()).or_default().push(join.left_column.clone());
        }
        if seen.insert((join.right_table.clone(), join.right_column.clone())) {
            columns.entry(join.right_table.clone()).or_default().push(join.right_column.clone());
        }
    }

    columns
}

fn extract_aggregations(sql: &str) -> Vec<Aggregation> {
    aggregate_re()
        .captures_iter(sql)
        .map(|c| Aggregation {
            func: c[1].to_uppercase(),
            column: c[2].to_string(),
            alias: c.get(3).map(|m| m.as_str().to_string()),
        })
        .collect()
}

fn extract_order_by(sql: &str) -> Vec<OrderByClause> {
    let Some(caps) = order_by_re().captures(sql) else { return Vec::new() };
    caps[1]
        .split(',')
        .filter_map(|part| {
            let part = part.trim();
            if part.is_empty() {
                return None;
            }
            let upper = part.to_uppercase();
            let direction = if upper.ends_with(" DESC") { SortDirection::Desc } else { SortDirection::Asc };
            let column = part
                .trim_end_matches(|c: char| c.is_alphabetic() || c.is_whitespace())
                .trim();
            let column = if column.is_empty() { part.split_whitespace().next().unwrap_or(part) } else { column };
            Some(OrderByClause { column: column.to_string(), direction })
        })
        .collect()
}

fn extract_limit(sql: &str) -> Option<u64> {
    limit_re().captures(sql).and_then(|c| c[1].parse().ok())
}

/// Resolves every table in `logical_plan` via the repository, groups them by
/// preferred engine, and — only when the grouping spans more than one engine
/// — extracts the cross-engine structure from the raw SQL.
pub async fn analyze(repository: &dyn MetadataRepository, logical_plan: &LogicalPlan) -> Result<QueryAnalysis, Error> {
    let mut engines: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for table_name in &logical_plan.tables {
        let table = repository.get(table_name).await?;
        engines.entry(table.preferred_engine().to_string()).or_default().push(table_name.clone());
    }

    let is_cross_engine = engines.len() > 1;
    if !is_cross_engine {
        return Ok(QueryAnalysis { raw_sql: logical_plan.raw_sql.clone(), engines, is_cross_engine, ..Default::default() });
    }

    let aliases = alias_map(&logical_plan.raw_sql);
    let joins = extract_joins(&logical_plan.raw_sql, &aliases);
    let (pushable_predicates, subquery_predicates) = extract_predicates(&logical_plan.raw_sql, &aliases);
    let required_columns = extract_required_columns(&logical_plan.raw_sql, &joins, &aliases);
    let aggregations = extract_aggregations(&logical_plan.raw_sql);
    let order_by = extract_order_by(&logical_plan.raw_sql);
    let limit = extract_limit(&logical_plan.raw_sql);

    Ok(QueryAnalysis {
        raw_sql: logical_plan.raw_sql.clone(),
        engines,
        is_cross_engine,
        joins,
        pushable_predicates,
        subquery_predicates,
        required_columns,
        aggregations,
        order_by,
        limit,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::model::capability::Capability;
    use crate::model::virtual_table::{Format, PhysicalSource, VirtualTable};
    use crate::repository::InMemoryRepository;

    fn table(name: &str, format: Format, engine: &str) -> VirtualTable {
        VirtualTable::new(
            name,
            "",
            vec![PhysicalSource { format, location: "s3://x".into(), engine: Some(engine.to_string()) }],
            HashSet::from([Capability::Read]),
            HashSet::new(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn single_engine_query_is_not_cross_engine() {
        let repo = InMemoryRepository::shared();
        repo.create(table("analytics.sales_orders", Format::Parquet, "duckdb")).await.unwrap();
        let logical = crate::parser::parse("SELECT id FROM analytics.sales_orders").unwrap();
        let analysis = analyze(repo.as_ref(), &logical).await.unwrap();
        assert!(!analysis.is_cross_engine);
        assert_eq!(analysis.engines.len(), 1);
    }

    #[tokio::test]
    async fn cross_engine_join_extracts_join_condition_and_predicates() {
        let repo = InMemoryRepository::shared();
        repo.create(table("sales.orders", Format::Iceberg, "trino")).await.unwrap();
        repo.create(table("sales.customers", Format::Delta, "spark")).await.unwrap();
        let sql = "SELECT o.id, c.name FROM sales.orders o JOIN sales.customers c ON o.customer_id = c.id \
                   WHERE o.status = 'paid' AND o.amount > 100";
        let logical = crate::parser::parse(sql).unwrap();
        let analysis = analyze(repo.as_ref(), &logical).await.unwrap();
        assert!(analysis.is_cross_engine);
        assert_eq!(analysis.engines.len(), 2);
        assert_eq!(analysis.joins.len(), 1);
        let join = &analysis.joins[0];
        assert_eq!(join.left_table, "sales.orders");
        assert_eq!(join.right_table, "sales.customers");
        assert_eq!(analysis.pushable_predicates["sales.orders"].len(), 2);
        assert!(analysis.pushable_predicates.get("sales.customers").is_none());
    }

    #[tokio::test]
    async fn unaliased_table_followed_by_where_is_not_mistaken_for_an_alias() {
        let repo = InMemoryRepository::shared();
        repo.create(table("sales.orders", Format::Iceberg, "trino")).await.unwrap();
        repo.create(table("sales.customers", Format::Delta, "spark")).await.unwrap();
        let sql = "SELECT sales.orders.id FROM sales.orders JOIN sales.customers ON sales.orders.customer_id = sales.customers.id \
                   WHERE sales.orders.status = 'paid'";
        let logical = crate::parser::parse(sql).unwrap();
        let analysis = analyze(repo.as_ref(), &logical).await.unwrap();
        assert_eq!(analysis.joins.len(), 1);
        assert_eq!(analysis.joins[0].left_table, "sales.orders");
        assert_eq!(analysis.joins[0].right_table, "sales.customers");
        assert_eq!(analysis.pushable_predicates["sales.orders"].len(), 1);
    }

    #[tokio::test]
    async fn aggregates_order_by_and_limit_are_extracted() {
        let repo = InMemoryRepository::shared();
        repo.create(table("sales.orders", Format::Iceberg, "trino")).await.unwrap();
        repo.create(table("sales.customers", Format::Delta, "spark")).await.unwrap();
        let sql = "SELECT SUM(o.amount) AS total FROM sales.orders o JOIN sales.customers c ON o.customer_id = c.id \
                   ORDER BY total DESC LIMIT 10";
        let logical = crate::parser::parse(sql).unwrap();
        let analysis = analyze(repo.as_ref(), &logical).await.unwrap();
        assert_eq!(analysis.aggregations.len(), 1);
        assert_eq!(analysis.aggregations[0].func, "SUM");
        assert_eq!(analysis.limit, Some(10));
        assert_eq!(analysis.order_by.len(), 1);
    }
}
