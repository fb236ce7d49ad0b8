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

//! The engine adapter contract (§6) and the per-engine adapter registry.
//! Adapters themselves are out-of-scope external collaborators; only their
//! minimal contract lives here.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use snafu::Snafu;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::model::stream::{ResultSchema, Row};

#[derive(Debug, Clone)]
pub struct TableStats {
    pub row_count: Option<u64>,
    pub distinct_values: HashMap<String, u64>,
    pub min: HashMap<String, String>,
    pub max: HashMap<String, String>,
}

/// Engine-adapter failures (§4.11). Carries a retryability flag so the
/// retry policy never has to guess.
#[derive(Debug, Snafu, Clone)]
pub enum AdapterError {
    #[snafu(display("adapter execution cancelled"))]
    ContextCancelled,

    #[snafu(display("adapter deadline exceeded"))]
    DeadlineExceeded,

    #[snafu(display("adapter authentication error: {detail}"))]
    AuthError { detail: String },

    #[snafu(display("adapter semantic error: {detail}"))]
    SemanticError { detail: String },

    #[snafu(display("adapter transport error: {detail}"))]
    Transport { detail: String },

    #[snafu(display("nil execution plan"))]
    NilPlan,

    #[snafu(display("empty SQL"))]
    EmptySql,

    #[snafu(display("adapter is closed"))]
    Closed,

    #[snafu(display("missing required adapter configuration: {field}"))]
    MissingConfiguration { field: String },
}

impl AdapterError {
    /// `IsRetryable` per §4.11: only transient transport errors may be
    /// retried; everything else — including a nil adapter-error value,
    /// which callers represent as `None` rather than constructing this
    /// type — is not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AdapterError::Transport { .. })
    }
}

/// `Execute(ctx, SQL) -> ResultStream`, `TableStats`, `HealthCheck` (§6).
#[async_trait]
pub trait EngineAdapter: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(
        &self,
        ctx: &CancellationToken,
        sql: &str,
    ) -> Result<Box<dyn crate::model::stream::ResultStream>, AdapterError>;

    async fn table_stats(&self, ctx: &CancellationToken, table: &str) -> Option<TableStats>;

    async fn health_check(&self, ctx: &CancellationToken) -> bool;
}

/// A stub schema-only adapter output, used when composing a plan before any
/// rows have been produced.
pub fn empty_schema() -> ResultSchema {
    ResultSchema { columns: Vec::new() }
}

pub type Rows = Vec<Row>;

/// Process-wide registry of engine adapters, read-mostly (§5).
#[derive(Default, Clone)]
pub struct AdapterRegistry {
    inner: Arc<RwLock<HashMap<String, Arc<dyn EngineAdapter>>>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, adapter: Arc<dyn EngineAdapter>) {
        let mut guard = self.inner.write().await;
        guard.insert(adapter.name().to_string(), adapter);
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn EngineAdapter>> {
        let guard = self.inner.read().await;
        guard.get(name).cloned()
    }
}
