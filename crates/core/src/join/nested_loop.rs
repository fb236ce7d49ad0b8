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

//! Nested-loop join (§4.10): used for `CROSS` joins. The left side is
//! materialized; for each right-side row, every (left × right) combination
//! is emitted.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::model::stream::{CancelledSnafu, ResultSchema, ResultStream, Row, StreamError};

pub struct NestedLoopJoin {
    schema: ResultSchema,
    left_rows: Vec<Row>,
    right: Box<dyn ResultStream>,
    pending: VecDeque<Row>,
    right_done: bool,
}

impl NestedLoopJoin {
    pub fn new(left_schema: ResultSchema, left_rows: Vec<Row>, right: Box<dyn ResultStream>, right_schema: ResultSchema) -> Self {
        let schema = left_schema.union(&right_schema);
        NestedLoopJoin { schema, left_rows, right, pending: VecDeque::new(), right_done: false }
    }

    fn cross_with(&mut self, right_row: Row) {
        if self.left_rows.is_empty() {
            self.pending.push_back(right_row);
            return;
        }
        for left_row in &self.left_rows {
            let mut merged = left_row.clone();
            for (k, v) in &right_row {
                merged.insert(k.clone(), v.clone());
            }
            self.pending.push_back(merged);
        }
    }
}

#[async_trait]
impl ResultStream for NestedLoopJoin {
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
            if self.right_done {
                return Ok(None);
            }
            match self.right.next(ctx).await? {
                Some(row) => self.cross_with(row),
                None => self.right_done = true,
            }
        }
    }

    async fn close(&mut self) -> Result<(), StreamError> {
        self.pending.clear();
        self.right.close().await
    }
}

#[cfg(test)]
mod tests {
    use crate::model::stream::{drain, MaterializedStream, Value};

    use super::*;

    fn schema(cols: &[&str]) -> ResultSchema {
        ResultSchema::new(cols.iter().map(|c| c.to_string()))
    }

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[tokio::test]
    async fn emits_full_cartesian_product() {
        let ctx = CancellationToken::new();
        let left = vec![row(&[("a", Value::Int(1))]), row(&[("a", Value::Int(2))])];
        let right = Box::new(MaterializedStream::new(
            schema(&["b"]),
            vec![row(&[("b", Value::Int(10))]), row(&[("b", Value::Int(20))])],
        ));
        let mut join = NestedLoopJoin::new(schema(&["a"]), left, right, schema(&["b"]));
        let rows = drain(&mut join, &ctx).await.unwrap();
        assert_eq!(rows.len(), 4);
    }
}
