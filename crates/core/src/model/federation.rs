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

//! Federation data model (§3): `QueryAnalysis`, `DecomposedQuery`, `JoinPlan`,
//! `JoinStep`, `PostJoinOps`. The join plan is a DAG represented as an
//! ordered list of steps referencing sub-query/step ids rather than direct
//! pointers (§9 "Cyclic graphs").

use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinStrategy {
    Hash,
    NestedLoop,
}

/// A join condition as extracted from SQL: `left(alias.col) op right(alias.col)`,
/// with aliases already resolved to fully-qualified table names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinCondition {
    pub join_type: JoinType,
    pub left_table: String,
    pub left_column: String,
    pub right_table: String,
    pub right_column: String,
}

impl JoinCondition {
    pub fn left_key(&self) -> String {
        format!("{}.{}", self.left_table, self.left_column)
    }

    pub fn right_key(&self) -> String {
        format!("{}.{}", self.right_table, self.right_column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregation {
    pub func: String,
    pub column: String,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderByClause {
    pub column: String,
    pub direction: SortDirection,
}

/// Produced by the analyzer (§4.7); consumed by the pushdown optimizer and
/// the decomposer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryAnalysis {
    pub raw_sql: String,
    /// engine name -> fully-qualified tables resolved onto it, in first-seen order.
    pub engines: BTreeMap<String, Vec<String>>,
    pub is_cross_engine: bool,
    pub joins: Vec<JoinCondition>,
    /// table -> simple single-table predicates (§4.7), already rendered as SQL text.
    pub pushable_predicates: HashMap<String, Vec<String>>,
    /// table -> predicates containing a subquery; pushable only on engines
    /// that support correlated/sub-select filters (§4.8).
    pub subquery_predicates: HashMap<String, Vec<String>>,
    /// table -> bare column names referenced anywhere in the query.
    pub required_columns: HashMap<String, Vec<String>>,
    pub aggregations: Vec<Aggregation>,
    pub order_by: Vec<OrderByClause>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubQuery {
    pub id: String,
    pub engine: String,
    pub sql: String,
    pub tables: Vec<String>,
    pub pushed_predicates: Vec<String>,
    pub projected_columns: Vec<String>,
    pub estimated_rows: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinStep {
    pub id: String,
    pub join_type: JoinType,
    /// A sub-query id or a prior step's id (§9 "resolve via a side map").
    pub left_input: String,
    /// Always a sub-query id.
    pub right_input: String,
    pub left_key: String,
    pub right_key: String,
    pub strategy: JoinStrategy,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinPlan {
    pub steps: Vec<JoinStep>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostJoinOps {
    pub aggregations: Vec<Aggregation>,
    pub order_by: Vec<OrderByClause>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecomposedQuery {
    pub raw_sql: String,
    pub sub_queries: Vec<SubQuery>,
    pub join_plan: JoinPlan,
    pub post_ops: PostJoinOps,
}
