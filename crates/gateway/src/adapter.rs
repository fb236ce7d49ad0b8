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

//! The per-engine network adapters (Trino/Spark/DuckDB/Snowflake/...) are
//! out-of-scope external collaborators (§1); this crate only has a
//! `CanonicaConfig` declaring which engine names exist, not a driver for
//! any of them. `LoopbackAdapter` stands in for that missing driver so the
//! `query`/`explain` CLI paths have something to dispatch to locally —
//! every execution succeeds with zero rows rather than connecting out.

use async_trait::async_trait;
use canonica_core::adapter::{AdapterError, EngineAdapter, TableStats};
use canonica_core::model::stream::{MaterializedStream, ResultSchema, ResultStream};
use tokio_util::sync::CancellationToken;

pub struct LoopbackAdapter {
    name: String,
}

impl LoopbackAdapter {
    pub fn new(name: impl Into<String>) -> Self {
        LoopbackAdapter { name: name.into() }
    }
}

#[async_trait]
impl EngineAdapter for LoopbackAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &CancellationToken, sql: &str) -> Result<Box<dyn ResultStream>, AdapterError> {
        if ctx.is_cancelled() {
            return Err(AdapterError::ContextCancelled);
        }
        if sql.trim().is_empty() {
            return Err(AdapterError::EmptySql);
        }
        Ok(Box::new(MaterializedStream::new(ResultSchema::default(), Vec::new())))
    }

    async fn table_stats(&self, _ctx: &CancellationToken, _table: &str) -> Option<TableStats> {
        None
    }

    async fn health_check(&self, _ctx: &CancellationToken) -> bool {
        true
    }
}
