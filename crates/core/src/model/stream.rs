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

//! The streaming contract of §3/§9: `ResultStream` is any type exposing
//! `schema()`, `next(ctx)`, `close()`, and `estimated_rows()` — three
//! functions plus a pure accessor, replacing callback- or iterator-object
//! patterns.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use snafu::Snafu;
use tokio_util::sync::CancellationToken;

/// A column value. Closed over the shapes the control plane itself needs to
/// reason about (joins, predicates, aggregates) — anything richer is the
/// concern of the out-of-scope per-engine adapters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
        }
    }
}

/// A single output row: a mapping from column name to value. `BTreeMap`
/// keeps column order deterministic for snapshot tests without requiring a
/// parallel ordered-columns vector on every row.
pub type Row = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub nullable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSchema {
    pub columns: Vec<ColumnDef>,
}

impl ResultSchema {
    pub fn new(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        ResultSchema {
            columns: names
                .into_iter()
                .map(|name| ColumnDef { name: name.into(), nullable: true })
                .collect(),
        }
    }

    pub fn union(&self, other: &ResultSchema) -> ResultSchema {
        let mut columns = self.columns.clone();
        for col in &other.columns {
            if !columns.iter().any(|c| c.name == col.name) {
                columns.push(col.clone());
            }
        }
        ResultSchema { columns }
    }
}

#[derive(Debug, Snafu)]
pub enum StreamError {
    #[snafu(display("stream cancelled"))]
    Cancelled,
    #[snafu(display("{source}"))]
    Adapter { source: crate::adapter::AdapterError },
}

/// A lazy, forward-only, finite sequence of `Row`, honoring cancellation on
/// every pull (§3, §5).
#[async_trait]
pub trait ResultStream: Send {
    fn schema(&self) -> &ResultSchema;

    /// `-1` means unknown.
    fn estimated_rows(&self) -> i64;

    async fn next(&mut self, ctx: &CancellationToken) -> Result<Option<Row>, StreamError>;

    async fn close(&mut self) -> Result<(), StreamError>;
}

/// An in-memory `ResultStream` over already-materialized rows — the shape
/// every materialization step in the federation executor produces.
pub struct MaterializedStream {
    schema: ResultSchema,
    rows: std::vec::IntoIter<Row>,
    estimated_rows: i64,
}

impl MaterializedStream {
    pub fn new(schema: ResultSchema, rows: Vec<Row>) -> Self {
        let estimated_rows = rows.len() as i64;
        MaterializedStream { schema, rows: rows.into_iter(), estimated_rows }
    }
}

#[async_trait]
impl ResultStream for MaterializedStream {
    fn schema(&self) -> &ResultSchema {
        &self.schema
    }

    fn estimated_rows(&self) -> i64 {
        self.estimated_rows
    }

    async fn next(&mut self, ctx: &CancellationToken) -> Result<Option<Row>, StreamError> {
        if ctx.is_cancelled() {
            return CancelledSnafu.fail();
        }
        Ok(self.rows.next())
    }

    async fn close(&mut self) -> Result<(), StreamError> {
        self.rows = Vec::new().into_iter();
        Ok(())
    }
}

/// Drains a stream to completion, honoring cancellation (§5 "the shared
/// hash-table build phase drains the build stream").
pub async fn drain(
    stream: &mut dyn ResultStream,
    ctx: &CancellationToken,
) -> Result<Vec<Row>, StreamError> {
    let mut rows = Vec::new();
    while let Some(row) = stream.next(ctx).await? {
        rows.push(row);
    }
    Ok(rows)
}
