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

//! Hash join (§4.10, §9 "Arena+index"): the build side is drained into a
//! row arena plus a `key -> list<row index>` index; the probe side streams
//! one row at a time, emitting merged rows per match.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::model::federation::JoinType;
use crate::model::stream::{CancelledSnafu, ResultSchema, ResultStream, Row, StreamError, Value};

/// The build side's materialized shape: a row arena and a `key -> indices`
/// index. NULL build keys are never indexed (NULL never equals NULL).
pub struct HashTable {
    pub arena: Vec<Row>,
    pub index: HashMap<String, Vec<usize>>,
}

/// Drains `stream` fully, building the hash table keyed by `key_column`
/// (§5 "the shared hash-table build phase drains the build stream").
pub async fn build(ctx: &CancellationToken, stream: &mut dyn ResultStream, key_column: &str) -> Result<HashTable, StreamError> {
    let mut arena = Vec::new();
    let mut index: HashMap<String, Vec<usize>> = HashMap::new();

    while let Some(row) = stream.next(ctx).await? {
        let idx = arena.len();
        if let Some(value) = row.get(key_column) {
            if !matches!(value, Value::Null) {
                index.entry(value.to_string()).or_default().push(idx);
            }
        }
        arena.push(row);
    }

    Ok(HashTable { arena, index })
}

fn merge_probe_and_build(probe_row: &Row, build_row: Option<&Row>, build_schema: &ResultSchema) -> Row {
    let mut out = probe_row.clone();
    match build_row {
        Some(row) => {
            // Build side wins column-name collisions (§4.10).
            for (k, v) in row {
                out.insert(k.clone(), v.clone());
            }
        }
        None => {
            for col in &build_schema.columns {
                out.entry(col.name.clone()).or_insert(Value::Null);
            }
        }
    }
    out
}

fn pad_unmatched_build_row(build_row: &Row, probe_schema: &ResultSchema) -> Row {
    let mut out = Row::new();
    for col in &probe_schema.columns {
        out.insert(col.name.clone(), Value::Null);
    }
    for (k, v) in build_row {
        out.insert(k.clone(), v.clone());
    }
    out
}

/// A streaming hash join: probe rows pull one at a time; for RIGHT/FULL,
/// unmatched build rows are emitted once the probe side is exhausted.
pub struct HashJoin {
    schema: ResultSchema,
    join_type: JoinType,
    build_schema: ResultSchema,
    probe_schema: ResultSchema,
    arena: Vec<Row>,
    index: HashMap<String, Vec<usize>>,
    matched: Vec<bool>,
    probe: Box<dyn ResultStream>,
    probe_key: String,
    pending: VecDeque<Row>,
    probe_done: bool,
    unmatched_emitted: bool,
}

impl HashJoin {
    pub fn new(
        join_type: JoinType,
        build_schema: ResultSchema,
        table: HashTable,
        probe: Box<dyn ResultStream>,
        probe_schema: ResultSchema,
        probe_key: String,
    ) -> Self {
        let schema = probe_schema.union(&build_schema);
        let matched = vec![false; table.arena.len()];
        HashJoin {
            schema,
            join_type,
            build_schema,
            probe_schema,
            arena: table.arena,
            index: table.index,
            matched,
            probe,
            probe_key,
            pending: VecDeque::new(),
            probe_done: false,
            unmatched_emitted: false,
        }
    }

    fn consume_probe_row(&mut self, probe_row: Row) {
        let key = probe_row.get(&self.probe_key).map(Value::to_string);
        let indices = key.as_ref().and_then(|k| self.index.get(k)).cloned().unwrap_or_default();

        if indices.is_empty() {
            if matches!(self.join_type, JoinType::Left | JoinType::Full) {
                self.pending.push_back(merge_probe_and_build(&probe_row, None, &self.build_schema));
            }
            return;
        }

        // Insertion order over the match list keeps hash-join output
        // deterministic for a deterministic probe order (§5 "Ordering guarantees").
        for &idx in &indices {
            self.matched[idx] = true;
            self.pending.push_back(merge_probe_and_build(&probe_row, Some(&self.arena[idx]), &self.build_schema));
        }
    }

    fn emit_unmatched_build_rows(&mut self) {
        if !matches!(self.join_type, JoinType::Right | JoinType::Full) {
            return;
        }
        for (idx, row) in self.arena.iter().enumerate() {
            if !self.matched[idx] {
                self.pending.push_back(pad_unmatched_build_row(row, &self.probe_schema));
            }
        }
    }
}

#[async_trait]
impl ResultStream for HashJoin {
    fn schema(&self) -> &ResultSchema {
        &self.schema
    }

    fn estimated_rows(&self) -> i64 {
        -1
    }

    async fn next(&mut self, ctx: &CancellationToken) -> Result<Option<Row>, StreamError> {
        loop {
            if ctx.is_cancelled() {
                return CancelledSnafu.fail();
            }
            if let Some(row) = self.pending.pop_front() {
                return Ok(Some(row));
            }
            if self.probe_done {
                if self.unmatched_emitted {
                    return Ok(None);
                }
                self.unmatched_emitted = true;
                self.emit_unmatched_build_rows();
                continue;
            }
            match self.probe.next(ctx).await? {
                Some(row) => self.consume_probe_row(row),
                None => self.probe_done = true,
            }
        }
    }

    async fn close(&mut self) -> Result<(), StreamError> {
        self.pending.clear();
        self.probe.close().await
    }
}

#[cfg(test)]
mod tests {
    use crate::model::stream::MaterializedStream;

    use super::*;

    fn schema(cols: &[&str]) -> ResultSchema {
        ResultSchema::new(cols.iter().map(|c| c.to_string()))
    }

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn build_rows() -> Vec<Row> {
        vec![
            row(&[("id", Value::Int(1)), ("name", Value::Text("alice".into()))]),
            row(&[("id", Value::Int(2)), ("name", Value::Text("bob".into()))]),
        ]
    }

    fn probe_rows() -> Vec<Row> {
        vec![
            row(&[("customer_id", Value::Int(1)), ("amount", Value::Int(10))]),
            row(&[("customer_id", Value::Int(1)), ("amount", Value::Int(20))]),
            row(&[("customer_id", Value::Int(99)), ("amount", Value::Int(30))]),
        ]
    }

    async fn build_table() -> HashTable {
        let ctx = CancellationToken::new();
        let mut stream = MaterializedStream::new(schema(&["id", "name"]), build_rows());
        build(&ctx, &mut stream, "id").await.unwrap()
    }

    #[tokio::test]
    async fn inner_join_emits_one_row_per_match_and_skips_unmatched_probe() {
        let ctx = CancellationToken::new();
        let table = build_table().await;
        let probe = Box::new(MaterializedStream::new(schema(&["customer_id", "amount"]), probe_rows()));
        let mut join = HashJoin::new(JoinType::Inner, schema(&["id", "name"]), table, probe, schema(&["customer_id", "amount"]), "customer_id".to_string());

        let rows = crate::model::stream::drain(&mut join, &ctx).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.get("name") == Some(&Value::Text("alice".into()))));
    }

    #[tokio::test]
    async fn left_join_pads_unmatched_probe_rows_with_null() {
        let ctx = CancellationToken::new();
        let table = build_table().await;
        let probe = Box::new(MaterializedStream::new(schema(&["customer_id", "amount"]), probe_rows()));
        let mut join = HashJoin::new(JoinType::Left, schema(&["id", "name"]), table, probe, schema(&["customer_id", "amount"]), "customer_id".to_string());

        let rows = crate::model::stream::drain(&mut join, &ctx).await.unwrap();
        assert_eq!(rows.len(), 3);
        let unmatched = rows.iter().find(|r| r.get("customer_id") == Some(&Value::Int(99))).unwrap();
        assert_eq!(unmatched.get("name"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn full_join_emits_every_build_row_at_least_once() {
        let ctx = CancellationToken::new();
        let table = build_table().await;
        let probe = Box::new(MaterializedStream::new(schema(&["customer_id", "amount"]), probe_rows()));
        let mut join = HashJoin::new(JoinType::Full, schema(&["id", "name"]), table, probe, schema(&["customer_id", "amount"]), "customer_id".to_string());

        let rows = crate::model::stream::drain(&mut join, &ctx).await.unwrap();
        let bob_present = rows.iter().any(|r| r.get("name") == Some(&Value::Text("bob".into())));
        assert!(bob_present);
    }
}
