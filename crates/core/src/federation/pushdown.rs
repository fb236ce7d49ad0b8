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

//! Pushdown optimizer (§4.8): rewrites each sub-query's SQL text, in rule
//! order, to move filtering/projection/aggregation/limit closer to the
//! source engine. Pure: every rule returns a fresh `SubQuery`; the join plan
//! and post-join ops are untouched. Confluent: re-applying the same rules to
//! an already-optimized sub-query is a no-op (§8 "Pushdown is confluent").

use crate::model::federation::{QueryAnalysis, SubQuery};

/// Engines that can evaluate a correlated/sub-select filter themselves
/// (§4.8 "Filter pushdown").
const SUBQUERY_CAPABLE_ENGINES: &[&str] = &["duckdb", "snowflake", "bigquery"];

fn push_subquery_predicates(sub: &SubQuery, analysis: &QueryAnalysis) -> SubQuery {
    if !SUBQUERY_CAPABLE_ENGINES.contains(&sub.engine.as_str()) {
        return sub.clone();
    }

    let mut extra = Vec::new();
    for table in &sub.tables {
        if let Some(preds) = analysis.subquery_predicates.get(table) {
            extra.extend(preds.iter().cloned());
        }
    }
    if extra.is_empty() {
        return sub.clone();
    }

    let mut out = sub.clone();
    for pred in &extra {
        if out.sql.contains(pred.as_str()) {
            continue;
        }
        out.sql = format!("{} AND {}", out.sql, pred);
    }
    out.pushed_predicates.extend(extra);
    out
}

/// Aggregation pushdown (§4.8): only when every aggregate input belongs to a
/// single table that this sub-query alone serves.
fn push_aggregations(sub: &SubQuery, analysis: &QueryAnalysis) -> SubQuery {
    if sub.tables.len() != 1 || analysis.aggregations.is_empty() {
        return sub.clone();
    }
    let owner = &sub.tables[0];

    let mut exprs = Vec::new();
    for agg in &analysis.aggregations {
        let bare_column = agg.column.rsplit('.').next().unwrap_or(&agg.column);
        let belongs_here = agg.column.starts_with(owner.as_str()) || sub.projected_columns.iter().any(|c| c.ends_with(bare_column));
        if !belongs_here {
            return sub.clone();
        }
        let alias = agg.alias.clone().unwrap_or_else(|| format!("{}_{}", agg.func.to_lowercase(), bare_column));
        exprs.push(format!("{}({}) AS {}", agg.func, bare_column, alias));
    }
    if exprs.is_empty() {
        return sub.clone();
    }

    let mut out = sub.clone();
    out.sql = format!("SELECT {} FROM ({}) aggregated", exprs.join(", "), sub.sql);
    out
}

/// Limit pushdown (§4.8): only when the limit applies to the final result —
/// no join reorders cardinality, and this sub-query is the sole source.
fn push_limit(sub: &SubQuery, analysis: &QueryAnalysis, is_sole_source: bool) -> SubQuery {
    let Some(limit) = analysis.limit else { return sub.clone() };
    if !analysis.joins.is_empty() || !is_sole_source {
        return sub.clone();
    }
    if sub.sql.to_uppercase().contains("LIMIT") {
        return sub.clone();
    }
    let mut out = sub.clone();
    out.sql = format!("{} LIMIT {}", sub.sql, limit);
    out
}

/// Applies the pushdown rules, in order, to every sub-query.
pub fn optimize(analysis: &QueryAnalysis, sub_queries: Vec<SubQuery>) -> Vec<SubQuery> {
    let is_sole_source = sub_queries.len() == 1;
    sub_queries
        .into_iter()
        .map(|sq| {
            let sq = push_subquery_predicates(&sq, analysis);
            let sq = push_aggregations(&sq, analysis);
            push_limit(&sq, analysis, is_sole_source)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub(engine: &str, tables: &[&str], sql: &str) -> SubQuery {
        SubQuery {
            id: "sq_0".to_string(),
            engine: engine.to_string(),
            sql: sql.to_string(),
            tables: tables.iter().map(|t| t.to_string()).collect(),
            pushed_predicates: Vec::new(),
            projected_columns: vec!["amount".to_string()],
            estimated_rows: -1,
        }
    }

    #[test]
    fn subquery_predicate_is_pushed_only_for_capable_engines() {
        let mut analysis = QueryAnalysis::default();
        analysis
            .subquery_predicates
            .insert("sales.orders".to_string(), vec!["o.id IN (SELECT id FROM x)".to_string()]);

        let duckdb = sub("duckdb", &["sales.orders"], "SELECT sales.orders.* FROM sales.orders WHERE 1=1");
        let trino = sub("trino", &["sales.orders"], "SELECT sales.orders.* FROM sales.orders WHERE 1=1");

        let optimized = optimize(&analysis, vec![duckdb, trino]);
        assert!(optimized[0].sql.contains("SELECT id FROM x"));
        assert!(!optimized[1].sql.contains("SELECT id FROM x"));
    }

    #[test]
    fn limit_pushes_only_for_sole_source_with_no_joins() {
        let mut analysis = QueryAnalysis::default();
        analysis.limit = Some(10);
        let only = sub("duckdb", &["analytics.sales_orders"], "SELECT analytics.sales_orders.* FROM analytics.sales_orders WHERE 1=1");
        let optimized = optimize(&analysis, vec![only]);
        assert!(optimized[0].sql.ends_with("LIMIT 10"));
    }

    #[test]
    fn limit_does_not_push_when_a_join_is_present() {
        let mut analysis = QueryAnalysis::default();
        analysis.limit = Some(10);
        analysis.joins.push(crate::model::federation::JoinCondition {
            join_type: crate::model::federation::JoinType::Inner,
            left_table: "a.b".to_string(),
            left_column: "x".to_string(),
            right_table: "c.d".to_string(),
            right_column: "y".to_string(),
        });
        let only = sub("duckdb", &["a.b"], "SELECT a.b.* FROM a.b WHERE 1=1");
        let optimized = optimize(&analysis, vec![only]);
        assert!(!optimized[0].sql.to_uppercase().contains("LIMIT"));
    }
}
