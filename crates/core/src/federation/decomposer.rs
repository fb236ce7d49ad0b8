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

//! Federation decomposer (§4.9): turns a cross-engine `QueryAnalysis` into a
//! `DecomposedQuery` — one sub-query per engine, a left-deep join plan, and
//! post-join operations carried verbatim.

use std::collections::{HashMap, HashSet};

use crate::error::{self, Error};
use crate::model::federation::{
    DecomposedQuery, JoinPlan, JoinStep, JoinStrategy, JoinType, PostJoinOps, QueryAnalysis, SubQuery,
};

/// Every generated sub-query embeds an always-true sentinel conjunct so that
/// pushdown (§4.8) can unconditionally append further predicates with
/// `AND ...` without having to detect whether a `WHERE` clause already exists.
const WHERE_SENTINEL: &str = "1=1";

fn build_sub_query(index: usize, engine: &str, tables: &[String], analysis: &QueryAnalysis) -> SubQuery {
    let id = format!("sq_{index}_{engine}");

    let mut columns: Vec<String> = Vec::new();
    let mut seen = HashSet::new();
    for table in tables {
        if let Some(cols) = analysis.required_columns.get(table) {
            for col in cols {
                let qualified = format!("{table}.{col}");
                if seen.insert(qualified.clone()) {
                    columns.push(qualified);
                }
            }
        }
    }

    let projected_columns = if columns.is_empty() {
        tables.iter().map(|t| format!("{t}.*")).collect()
    } else {
        columns
    };

    let mut predicates: Vec<String> = Vec::new();
    for table in tables {
        if let Some(preds) = analysis.pushable_predicates.get(table) {
            predicates.extend(preds.iter().cloned());
        }
    }

    let from_clause = tables.join(", ");
    let where_clause =
        std::iter::once(WHERE_SENTINEL.to_string()).chain(predicates.iter().cloned()).collect::<Vec<_>>().join(" AND ");
    let sql = format!("SELECT {} FROM {} WHERE {}", projected_columns.join(", "), from_clause, where_clause);

    SubQuery {
        id,
        engine: engine.to_string(),
        sql,
        tables: tables.to_vec(),
        pushed_predicates: predicates,
        projected_columns,
        estimated_rows: -1,
    }
}

/// Builds the left-deep join plan (§4.9 step 2). `table_to_subquery` maps
/// each fully-qualified table to the id of the sub-query that owns it.
fn build_join_plan(analysis: &QueryAnalysis, sub_queries: &[SubQuery], table_to_subquery: &HashMap<String, String>) -> JoinPlan {
    let mut steps = Vec::new();

    if analysis.joins.is_empty() {
        if sub_queries.len() >= 2 {
            steps.push(JoinStep {
                id: "step_0".to_string(),
                join_type: JoinType::Cross,
                left_input: sub_queries[0].id.clone(),
                right_input: sub_queries[1].id.clone(),
                left_key: String::new(),
                right_key: String::new(),
                strategy: JoinStrategy::NestedLoop,
            });
        }
        return JoinPlan { steps };
    }

    let mut consumed: HashSet<String> = HashSet::new();
    let mut prev_step_id: Option<String> = None;

    for (i, join) in analysis.joins.iter().enumerate() {
        let left_sq = table_to_subquery.get(&join.left_table).cloned().unwrap_or_default();
        let right_sq = table_to_subquery.get(&join.right_table).cloned().unwrap_or_default();

        let left_input = if let Some(prev) = prev_step_id.clone() {
            prev
        } else {
            consumed.insert(left_sq.clone());
            left_sq.clone()
        };

        let right_input = if !consumed.contains(&right_sq) {
            consumed.insert(right_sq.clone());
            right_sq.clone()
        } else if !consumed.contains(&left_sq) {
            consumed.insert(left_sq.clone());
            left_sq.clone()
        } else {
            // Self-join: both sides already consumed; the newer side wins.
            right_sq.clone()
        };

        let step_id = format!("step_{i}");
        steps.push(JoinStep {
            id: step_id.clone(),
            join_type: join.join_type,
            left_input,
            right_input,
            left_key: join.left_key(),
            right_key: join.right_key(),
            strategy: JoinStrategy::Hash,
        });
        prev_step_id = Some(step_id);
    }

    JoinPlan { steps }
}

/// §4.9: validates and builds the `DecomposedQuery`. Only called once the
/// analyzer has already determined the query is cross-engine.
pub fn decompose(analysis: &QueryAnalysis) -> Result<DecomposedQuery, Error> {
    let mut sub_queries = Vec::new();
    let mut table_to_subquery = HashMap::new();

    for (index, (engine, tables)) in analysis.engines.iter().enumerate() {
        let sub_query = build_sub_query(index, engine, tables, analysis);
        for table in tables {
            table_to_subquery.insert(table.clone(), sub_query.id.clone());
        }
        sub_queries.push(sub_query);
    }

    if sub_queries.is_empty() {
        return error::PlannerErrorSnafu { detail: "federation requires at least one sub-query".to_string() }.fail();
    }
    for sq in &sub_queries {
        if sq.engine.is_empty() || sq.sql.trim().is_empty() {
            return error::PlannerErrorSnafu { detail: format!("sub-query {} has no engine or SQL", sq.id) }.fail();
        }
    }

    let join_plan = build_join_plan(analysis, &sub_queries, &table_to_subquery);
    if sub_queries.len() >= 2 && join_plan.steps.is_empty() {
        return error::PlannerErrorSnafu {
            detail: "cross-engine query with multiple sub-queries requires at least one join step".to_string(),
        }
        .fail();
    }

    let post_ops = PostJoinOps {
        aggregations: analysis.aggregations.clone(),
        order_by: analysis.order_by.clone(),
        limit: analysis.limit,
    };

    Ok(DecomposedQuery { raw_sql: analysis.raw_sql.clone(), sub_queries, join_plan, post_ops })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap as StdHashMap;

    use super::*;
    use crate::model::federation::JoinCondition;

    fn base_analysis() -> QueryAnalysis {
        let mut engines = std::collections::BTreeMap::new();
        engines.insert("trino".to_string(), vec!["sales.orders".to_string()]);
        engines.insert("spark".to_string(), vec!["sales.customers".to_string()]);

        let mut required_columns = StdHashMap::new();
        required_columns.insert("sales.orders".to_string(), vec!["id".to_string(), "customer_id".to_string()]);
        required_columns.insert("sales.customers".to_string(), vec!["id".to_string(), "name".to_string()]);

        let mut pushable_predicates = StdHashMap::new();
        pushable_predicates.insert("sales.orders".to_string(), vec!["o.status = 'paid'".to_string()]);

        QueryAnalysis {
            raw_sql: "SELECT * FROM sales.orders o JOIN sales.customers c ON o.customer_id = c.id".to_string(),
            engines,
            is_cross_engine: true,
            joins: vec![JoinCondition {
                join_type: JoinType::Inner,
                left_table: "sales.orders".to_string(),
                left_column: "customer_id".to_string(),
                right_table: "sales.customers".to_string(),
                right_column: "id".to_string(),
            }],
            pushable_predicates,
            required_columns,
            ..Default::default()
        }
    }

    #[test]
    fn builds_two_sub_queries_and_one_join_step() {
        let decomposed = decompose(&base_analysis()).unwrap();
        assert_eq!(decomposed.sub_queries.len(), 2);
        assert_eq!(decomposed.sub_queries[0].id, "sq_0_spark");
        assert_eq!(decomposed.sub_queries[1].id, "sq_1_trino");
        assert_eq!(decomposed.join_plan.steps.len(), 1);
        assert_eq!(decomposed.join_plan.steps[0].join_type, JoinType::Inner);
    }

    #[test]
    fn pushable_predicate_lands_only_on_its_own_table_sub_query() {
        let decomposed = decompose(&base_analysis()).unwrap();
        let trino_sq = decomposed.sub_queries.iter().find(|s| s.engine == "trino").unwrap();
        let spark_sq = decomposed.sub_queries.iter().find(|s| s.engine == "spark").unwrap();
        assert!(trino_sq.sql.contains("o.status = 'paid'"));
        assert!(!spark_sq.sql.contains("o.status = 'paid'"));
    }

    #[test]
    fn no_join_clause_falls_back_to_cross_step() {
        let mut analysis = base_analysis();
        analysis.joins.clear();
        let decomposed = decompose(&analysis).unwrap();
        assert_eq!(decomposed.join_plan.steps.len(), 1);
        assert_eq!(decomposed.join_plan.steps[0].join_type, JoinType::Cross);
        assert_eq!(decomposed.join_plan.steps[0].strategy, JoinStrategy::NestedLoop);
    }

    #[test]
    fn empty_column_set_falls_back_to_star() {
        let mut analysis = base_analysis();
        analysis.required_columns.clear();
        let decomposed = decompose(&analysis).unwrap();
        assert!(decomposed.sub_queries.iter().all(|s| s.projected_columns.iter().all(|c| c.ends_with(".*"))));
    }
}
