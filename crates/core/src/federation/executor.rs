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

//! Federation executor (§4.10): plans sub-query order from estimated row
//! counts, launches sub-queries concurrently, runs the join plan
//! sequentially, and wraps the result in post-join operators.

use std::cmp::Ordering;
use std::collections::HashMap;

use snafu::{OptionExt, ResultExt, Snafu};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::adapter::{AdapterError, AdapterRegistry};
use crate::error::Error;
use crate::join::{self, HashJoin, NestedLoopJoin};
use crate::model::federation::{Aggregation, DecomposedQuery, JoinStrategy, OrderByClause, PostJoinOps, SortDirection};
use crate::model::stream::{drain, MaterializedStream, ResultSchema, ResultStream, Row, StreamError, Value};
use async_trait::async_trait;

/// Below this, a missing table-stats lookup is assumed to mean a small
/// table rather than an unknown-cost one (§4.10 "default 1000 when absent").
const DEFAULT_ESTIMATED_ROWS: u64 = 1000;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ExecutorError {
    #[snafu(display("engine adapter not registered: {engine}"))]
    AdapterMissing { engine: String },

    #[snafu(display("sub-query {index} ({id}) failed: {source}"))]
    SubQueryFailed { index: usize, id: String, source: AdapterError },

    #[snafu(display("{source}"))]
    Stream { source: StreamError },

    #[snafu(display("federation plan has no join steps to execute"))]
    EmptyJoinPlan,

    #[snafu(display("join input {id} was not found among sub-query or step results"))]
    MissingInput { id: String },

    #[snafu(display("{source}"))]
    Planner { source: Error },
}

enum InputState {
    Materialized(Vec<Row>),
    Streaming(Box<dyn ResultStream>),
}

struct ResolvedInput {
    schema: ResultSchema,
    estimated_rows: i64,
    state: InputState,
}

pub struct FederationExecutor {
    adapters: AdapterRegistry,
}

impl FederationExecutor {
    pub fn new(adapters: AdapterRegistry) -> Self {
        FederationExecutor { adapters }
    }

    /// §4.10 "Plan": orders sub-queries ascending by estimated rows so the
    /// build side of a downstream hash join is the small one.
    async fn plan(&self, ctx: &CancellationToken, query: &DecomposedQuery) -> Result<Vec<(usize, i64)>, ExecutorError> {
        let mut estimates = Vec::with_capacity(query.sub_queries.len());
        for (index, sub) in query.sub_queries.iter().enumerate() {
            let adapter = self
                .adapters
                .get(&sub.engine)
                .await
                .context(AdapterMissingSnafu { engine: sub.engine.clone() })?;

            let mut total: u64 = 0;
            for table in &sub.tables {
                let stats = adapter.table_stats(ctx, table).await;
                total += stats.and_then(|s| s.row_count).unwrap_or(DEFAULT_ESTIMATED_ROWS);
            }
            if sub.tables.is_empty() {
                total = DEFAULT_ESTIMATED_ROWS;
            }
            estimates.push((index, total as i64));
        }
        estimates.sort_by_key(|(_, rows)| *rows);
        Ok(estimates)
    }

    /// Launches every sub-query concurrently. All but the one that executes
    /// last (in the ascending-estimate order) are fully materialized; that
    /// last one may stream straight into the join phase. Failure of any
    /// sub-query cancels the shared token and surfaces the first failure
    /// with its sub-query index (§4.10).
    async fn run_sub_queries(
        &self,
        ctx: &CancellationToken,
        query: &DecomposedQuery,
        ordered: Vec<(usize, i64)>,
    ) -> Result<HashMap<String, ResolvedInput>, ExecutorError> {
        let cancel = ctx.child_token();
        let mut set: JoinSet<Result<(String, ResultSchema, i64, InputState), ExecutorError>> = JoinSet::new();
        let last_index = ordered.len().saturating_sub(1);

        for (order_pos, (sub_index, estimated_rows)) in ordered.into_iter().enumerate() {
            let sub = query.sub_queries[sub_index].clone();
            let adapter = self
                .adapters
                .get(&sub.engine)
                .await
                .context(AdapterMissingSnafu { engine: sub.engine.clone() })?;
            let token = cancel.clone();
            let materialize = order_pos != last_index;

            set.spawn(async move {
                let mut stream = adapter.execute(&token, &sub.sql).await.context(SubQueryFailedSnafu {
                    index: sub_index,
                    id: sub.id.clone(),
                })?;
                let schema = stream.schema().clone();
                if materialize {
                    let rows = drain(stream.as_mut(), &token).await.context(StreamSnafu)?;
                    Ok((sub.id.clone(), schema, estimated_rows, InputState::Materialized(rows)))
                } else {
                    Ok((sub.id.clone(), schema, estimated_rows, InputState::Streaming(stream)))
                }
            });
        }

        let mut inputs = HashMap::new();
        let mut first_error = None;
        while let Some(joined) = set.join_next().await {
            match joined.expect("sub-query task panicked") {
                Ok((id, schema, estimated_rows, state)) => {
                    inputs.insert(id, ResolvedInput { schema, estimated_rows, state });
                }
                Err(e) => {
                    cancel.cancel();
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }
        Ok(inputs)
    }

    fn take_stream(input: ResolvedInput) -> (Box<dyn ResultStream>, ResultSchema, i64) {
        let stream: Box<dyn ResultStream> = match input.state {
            InputState::Streaming(s) => s,
            InputState::Materialized(rows) => Box::new(MaterializedStream::new(input.schema.clone(), rows)),
        };
        (stream, input.schema, input.estimated_rows)
    }

    /// §4.10 join phase: steps execute sequentially; each step's output
    /// feeds the next as its left input, except the final step, which stays
    /// streaming into the post-join operators.
    async fn run_joins(
        &self,
        ctx: &CancellationToken,
        query: &DecomposedQuery,
        mut inputs: HashMap<String, ResolvedInput>,
    ) -> Result<(Box<dyn ResultStream>, ResultSchema), ExecutorError> {
        if query.join_plan.steps.is_empty() {
            let (_, single) = inputs.into_iter().next().ok_or(ExecutorError::EmptyJoinPlan)?;
            let (stream, schema, _) = Self::take_stream(single);
            return Ok((stream, schema));
        }

        let mut carry: Option<(Box<dyn ResultStream>, ResultSchema, i64)> = None;
        let last = query.join_plan.steps.len() - 1;

        for (i, step) in query.join_plan.steps.iter().enumerate() {
            let (left_stream, left_schema, left_rows) = if let Some(c) = carry.take() {
                c
            } else {
                let input = inputs.remove(&step.left_input).ok_or_else(|| ExecutorError::MissingInput { id: step.left_input.clone() })?;
                Self::take_stream(input)
            };
            let right_input = inputs.remove(&step.right_input).ok_or_else(|| ExecutorError::MissingInput { id: step.right_input.clone() })?;
            let (right_stream, right_schema, right_rows) = Self::take_stream(right_input);

            let (config, left_is_build) =
                join::select_strategy(step.join_type, &step.left_key, &step.right_key, left_rows, right_rows, true);
            let merged_schema = left_schema.union(&right_schema);

            let joined: Box<dyn ResultStream> = match config.strategy {
                JoinStrategy::Hash => {
                    let (mut build_stream, build_schema, probe_stream, probe_schema) = if left_is_build {
                        (left_stream, left_schema, right_stream, right_schema)
                    } else {
                        (right_stream, right_schema, left_stream, left_schema)
                    };
                    let table = join::hash::build(ctx, build_stream.as_mut(), &config.build_key).await.context(StreamSnafu)?;
                    Box::new(HashJoin::new(step.join_type, build_schema, table, probe_stream, probe_schema, config.probe_key.clone()))
                }
                JoinStrategy::NestedLoop => {
                    // CROSS materializes its left side, streams the right (§4.10).
                    let mut left_stream = left_stream;
                    let left_rows_vec = drain(left_stream.as_mut(), ctx).await.context(StreamSnafu)?;
                    Box::new(NestedLoopJoin::new(left_schema, left_rows_vec, right_stream, right_schema))
                }
            };

            if i == last {
                carry = Some((joined, merged_schema, -1));
            } else {
                let mut joined = joined;
                let rows = drain(joined.as_mut(), ctx).await.context(StreamSnafu)?;
                let len = rows.len() as i64;
                carry = Some((Box::new(MaterializedStream::new(merged_schema.clone(), rows)), merged_schema, len));
            }
        }

        let (stream, schema, _) = carry.expect("join plan is non-empty");
        Ok((stream, schema))
    }

    /// Runs the full federation pipeline: plan sub-query order, execute them
    /// concurrently, run the join plan, and wrap the result in the
    /// post-join operators (§4.10).
    pub async fn execute(&self, ctx: &CancellationToken, query: &DecomposedQuery) -> Result<Box<dyn ResultStream>, ExecutorError> {
        let ordered = self.plan(ctx, query).await?;
        let inputs = self.run_sub_queries(ctx, query, ordered).await?;
        let (stream, schema) = self.run_joins(ctx, query, inputs).await?;
        Ok(wrap_post_ops(stream, schema, &query.post_ops))
    }

    /// §4.10 "Explain mode": a textual plan, not an execution.
    pub fn explain(query: &DecomposedQuery) -> String {
        let mut lines = Vec::new();
        for sq in &query.sub_queries {
            lines.push(format!(
                "sub_query {} engine={} estimated_rows={} sql={}",
                sq.id, sq.engine, sq.estimated_rows, sq.sql
            ));
        }
        for step in &query.join_plan.steps {
            lines.push(format!(
                "join {} type={:?} left={} right={} strategy={:?} on {}={}",
                step.id, step.join_type, step.left_input, step.right_input, step.strategy, step.left_key, step.right_key
            ));
        }
        lines.join("\n")
    }
}

/// §4.10 "Post-join operations": each wrapper preserves forward-only
/// iteration and closes its source on close.
fn wrap_post_ops(stream: Box<dyn ResultStream>, _schema: ResultSchema, ops: &PostJoinOps) -> Box<dyn ResultStream> {
    let mut current = stream;

    if !ops.aggregations.is_empty() {
        current = Box::new(AggregateStream::new(current, ops.aggregations.clone()));
    }
    if !ops.order_by.is_empty() {
        current = Box::new(OrderByStream::new(current, ops.order_by.clone()));
    }
    if let Some(limit) = ops.limit {
        current = Box::new(LimitStream::new(current, limit));
    }
    current
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

/// Buffers every row and produces a single aggregate row (§4.10 "MVP semantics").
struct AggregateStream {
    schema: ResultSchema,
    row: Option<Row>,
    emitted: bool,
    inner: Box<dyn ResultStream>,
    aggregations: Vec<Aggregation>,
}

impl AggregateStream {
    fn new(inner: Box<dyn ResultStream>, aggregations: Vec<Aggregation>) -> Self {
        let names: Vec<String> = aggregations
            .iter()
            .map(|a| a.alias.clone().unwrap_or_else(|| format!("{}_{}", a.func.to_lowercase(), a.column)))
            .collect();
        AggregateStream { schema: ResultSchema::new(names), row: None, emitted: false, inner, aggregations }
    }

    fn compute(&self, rows: &[Row]) -> Row {
        let mut out = Row::new();
        for agg in &self.aggregations {
            let alias = agg.alias.clone().unwrap_or_else(|| format!("{}_{}", agg.func.to_lowercase(), agg.column));
            let bare = agg.column.rsplit('.').next().unwrap_or(&agg.column);
            let values: Vec<f64> = rows.iter().filter_map(|r| r.get(bare).and_then(numeric)).collect();
            let value = match agg.func.as_str() {
                "COUNT" => Value::Int(rows.len() as i64),
                "SUM" => Value::Float(values.iter().sum()),
                "AVG" => {
                    if values.is_empty() {
                        Value::Null
                    } else {
                        Value::Float(values.iter().sum::<f64>() / values.len() as f64)
                    }
                }
                "MIN" => values.iter().cloned().fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v)))).map(Value::Float).unwrap_or(Value::Null),
                "MAX" => values.iter().cloned().fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v)))).map(Value::Float).unwrap_or(Value::Null),
                _ => Value::Null,
            };
            out.insert(alias, value);
        }
        out
    }
}

#[async_trait]
impl ResultStream for AggregateStream {
    fn schema(&self) -> &ResultSchema {
        &self.schema
    }

    fn estimated_rows(&self) -> i64 {
        1
    }

    async fn next(&mut self, ctx: &CancellationToken) -> Result<Option<Row>, StreamError> {
        if self.emitted {
            return Ok(None);
        }
        let rows = drain(self.inner.as_mut(), ctx).await?;
        self.row = Some(self.compute(&rows));
        self.emitted = true;
        Ok(self.row.take())
    }

    async fn close(&mut self) -> Result<(), StreamError> {
        self.inner.close().await
    }
}

/// Buffers every row and sorts by the declared keys, ties broken by
/// original arrival order (a stable sort preserves this, §5 "Ordering guarantees").
struct OrderByStream {
    schema: ResultSchema,
    inner: Box<dyn ResultStream>,
    order_by: Vec<OrderByClause>,
    sorted: Option<std::vec::IntoIter<Row>>,
}

impl OrderByStream {
    fn new(inner: Box<dyn ResultStream>, order_by: Vec<OrderByClause>) -> Self {
        let schema = inner.schema().clone();
        OrderByStream { schema, inner, order_by, sorted: None }
    }

    fn compare(&self, a: &Row, b: &Row) -> Ordering {
        for clause in &self.order_by {
            let bare = clause.column.rsplit('.').next().unwrap_or(&clause.column);
            let av = a.get(bare);
            let bv = b.get(bare);
            let ordering = match (av, bv) {
                (Some(x), Some(y)) => compare_values(x, y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            let ordering = if clause.direction == SortDirection::Desc { ordering.reverse() } else { ordering };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (numeric(a), numeric(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

#[async_trait]
impl ResultStream for OrderByStream {
    fn schema(&self) -> &ResultSchema {
        &self.schema
    }

    fn estimated_rows(&self) -> i64 {
        self.inner.estimated_rows()
    }

    async fn next(&mut self, ctx: &CancellationToken) -> Result<Option<Row>, StreamError> {
        if self.sorted.is_none() {
            let mut rows = drain(self.inner.as_mut(), ctx).await?;
            rows.sort_by(|a, b| self.compare(a, b));
            self.sorted = Some(rows.into_iter());
        }
        Ok(self.sorted.as_mut().expect("sorted buffer is initialized").next())
    }

    async fn close(&mut self) -> Result<(), StreamError> {
        self.sorted = Some(Vec::new().into_iter());
        self.inner.close().await
    }
}

/// Forwards at most `limit` rows then stops (§4.10).
struct LimitStream {
    inner: Box<dyn ResultStream>,
    remaining: u64,
}

impl LimitStream {
    fn new(inner: Box<dyn ResultStream>, limit: u64) -> Self {
        LimitStream { inner, remaining: limit }
    }
}

#[async_trait]
impl ResultStream for LimitStream {
    fn schema(&self) -> &ResultSchema {
        self.inner.schema()
    }

    fn estimated_rows(&self) -> i64 {
        self.remaining as i64
    }

    async fn next(&mut self, ctx: &CancellationToken) -> Result<Option<Row>, StreamError> {
        if self.remaining == 0 {
            return Ok(None);
        }
        match self.inner.next(ctx).await? {
            Some(row) => {
                self.remaining -= 1;
                Ok(Some(row))
            }
            None => {
                self.remaining = 0;
                Ok(None)
            }
        }
    }

    async fn close(&mut self) -> Result<(), StreamError> {
        self.inner.close().await
    }
}
