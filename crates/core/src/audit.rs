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

//! The audit logger contract (§6, §7): every query produces one structured
//! entry; summaries are aggregate-only and must never surface raw SQL or a
//! literal from the user's query (§8 "Audit purity").

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use snafu::Snafu;

#[derive(Debug, Snafu)]
pub enum AuditError {
    #[snafu(display("audit entry missing required field: {field}"))]
    MissingField { field: String },

    #[snafu(display("audit entry has negative execution time: {millis}ms"))]
    NegativeExecutionTime { millis: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Accepted,
    Denied,
    Rejected,
    Failed,
}

/// One audit record (§6). `query_id` and `user` are mandatory; every other
/// field is optional because not every outcome reaches every stage (a denied
/// query never reaches `engine`, for instance).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub query_id: String,
    pub user: String,
    pub role: Option<String>,
    pub tables: Vec<String>,
    pub auth_decision: Option<String>,
    pub planner_decision: Option<String>,
    pub engine: Option<String>,
    pub execution_time_ms: Option<i64>,
    pub outcome: Outcome,
    pub error: Option<String>,
    pub invariant_violated: Option<String>,
}

impl AuditEntry {
    pub fn validate(&self) -> Result<(), AuditError> {
        if self.query_id.is_empty() {
            return MissingFieldSnafu { field: "query_id" }.fail();
        }
        if self.user.is_empty() {
            return MissingFieldSnafu { field: "user" }.fail();
        }
        if let Some(millis) = self.execution_time_ms {
            if millis < 0 {
                return NegativeExecutionTimeSnafu { millis }.fail();
            }
        }
        Ok(())
    }
}

/// `LogQuery(entry)` (§6). Implementations must not retain raw SQL or
/// literal values beyond what `AuditEntry` itself carries.
#[async_trait]
pub trait AuditLogger: Send + Sync {
    async fn log_query(&self, entry: AuditEntry) -> Result<(), AuditError>;
}

/// Emits each entry as a single structured-JSON line via `tracing`
/// (the gateway composition root wires its subscriber to a JSON formatter).
pub struct TracingAuditLogger;

#[async_trait]
impl AuditLogger for TracingAuditLogger {
    async fn log_query(&self, entry: AuditEntry) -> Result<(), AuditError> {
        entry.validate()?;
        let json = serde_json::to_string(&entry).unwrap_or_else(|_| "{}".to_string());
        tracing::info!(target: "canonica::audit", audit_entry = %json, "query audited");
        Ok(())
    }
}

/// An in-memory sink for tests and for the `audit summary` CLI path.
#[derive(Default)]
pub struct InMemoryAuditLog {
    entries: tokio::sync::RwLock<Vec<AuditEntry>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aggregate-only summary (§6, §8): counts by outcome and a top-K of
    /// denial reasons, never the underlying SQL or literals.
    pub async fn summarize(&self, top_k: usize) -> AuditSummary {
        let entries = self.entries.read().await;
        let mut by_outcome: HashMap<Outcome, u64> = HashMap::new();
        let mut by_reason: HashMap<String, u64> = HashMap::new();

        for entry in entries.iter() {
            *by_outcome.entry(entry.outcome).or_insert(0) += 1;
            if let Some(reason) = &entry.invariant_violated {
                *by_reason.entry(reason.clone()).or_insert(0) += 1;
            }
        }

        let mut top_reasons: Vec<(String, u64)> = by_reason.into_iter().collect();
        top_reasons.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top_reasons.truncate(top_k);

        AuditSummary { total: entries.len() as u64, by_outcome, top_reasons }
    }
}

#[async_trait]
impl AuditLogger for InMemoryAuditLog {
    async fn log_query(&self, entry: AuditEntry) -> Result<(), AuditError> {
        entry.validate()?;
        self.entries.write().await.push(entry);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditSummary {
    pub total: u64,
    pub by_outcome: HashMap<Outcome, u64>,
    pub top_reasons: Vec<(String, u64)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(query_id: &str, outcome: Outcome, reason: Option<&str>) -> AuditEntry {
        AuditEntry {
            query_id: query_id.to_string(),
            user: "analyst".to_string(),
            role: Some("analyst".to_string()),
            tables: vec!["sales.orders".to_string()],
            auth_decision: Some("granted".to_string()),
            planner_decision: Some("accepted".to_string()),
            engine: Some("duckdb".to_string()),
            execution_time_ms: Some(12),
            outcome,
            error: None,
            invariant_violated: reason.map(|r| r.to_string()),
        }
    }

    #[test]
    fn missing_query_id_is_rejected() {
        let mut e = entry("q1", Outcome::Accepted, None);
        e.query_id = String::new();
        assert!(matches!(e.validate(), Err(AuditError::MissingField { .. })));
    }

    #[test]
    fn negative_execution_time_is_rejected() {
        let mut e = entry("q1", Outcome::Accepted, None);
        e.execution_time_ms = Some(-1);
        assert!(matches!(e.validate(), Err(AuditError::NegativeExecutionTime { .. })));
    }

    #[tokio::test]
    async fn summary_contains_no_raw_sql_or_literals() {
        let log = InMemoryAuditLog::new();
        log.log_query(entry("q1", Outcome::Denied, Some("capability_denied"))).await.unwrap();
        log.log_query(entry("q2", Outcome::Accepted, None)).await.unwrap();

        let summary = log.summarize(5).await;
        assert_eq!(summary.total, 2);
        assert_eq!(summary.by_outcome.get(&Outcome::Denied), Some(&1));
        assert_eq!(summary.top_reasons[0], ("capability_denied".to_string(), 1));
    }
}
