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

//! The planner (§4.5): resolves tables, enforces the cross-engine and
//! `SNAPSHOT_CONSISTENT` invariants, computes required capabilities, and
//! selects a single engine. Each step short-circuits on error. `explain()`
//! runs the identical steps and must be deterministic and parity-true with
//! runtime rejection (§8).

use std::sync::Arc;

use crate::error::{self, Error};
use crate::model::capability::{Capability, Constraint, OperationType};
use crate::model::plan::{ExecutionPlan, LogicalPlan};
use crate::model::virtual_table::VirtualTable;
use crate::repository::MetadataRepository;
use crate::router::EngineRouter;

fn capability_rank(capability: Capability) -> u8 {
    match capability {
        Capability::Read => 0,
        Capability::TimeTravel => 1,
        Capability::Insert => 2,
        Capability::Update => 3,
        Capability::Delete => 4,
    }
}

fn constraint_rank(constraint: Constraint) -> u8 {
    match constraint {
        Constraint::ReadOnly => 0,
        Constraint::SnapshotConsistent => 1,
    }
}

fn sorted_capabilities(caps: impl IntoIterator<Item = Capability>) -> Vec<Capability> {
    let mut v: Vec<Capability> = caps.into_iter().collect();
    v.sort_by_key(|c| capability_rank(*c));
    v
}

fn sorted_constraints(constraints: impl IntoIterator<Item = Constraint>) -> Vec<Constraint> {
    let mut v: Vec<Constraint> = constraints.into_iter().collect();
    v.sort_by_key(|c| constraint_rank(*c));
    v
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTableInfo {
    pub name: String,
    pub capabilities: Vec<Capability>,
    pub constraints: Vec<Constraint>,
}

/// The structured record `explain()` returns (§4.5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplainRecord {
    pub accepted: bool,
    pub engine: Option<String>,
    pub resolved_tables: Vec<ResolvedTableInfo>,
    pub required_capabilities: Vec<Capability>,
    pub authorization_result: String,
    pub refusal_reason: Option<String>,
}

impl ExplainRecord {
    pub fn refused(authorization_result: &str, reason: &Error) -> Self {
        ExplainRecord {
            accepted: false,
            engine: None,
            resolved_tables: Vec::new(),
            required_capabilities: Vec::new(),
            authorization_result: authorization_result.to_string(),
            refusal_reason: Some(reason.user_facing()),
        }
    }
}

pub struct Planner {
    repository: Arc<dyn MetadataRepository>,
    router: EngineRouter,
}

impl Planner {
    pub fn new(repository: Arc<dyn MetadataRepository>, router: EngineRouter) -> Self {
        Planner { repository, router }
    }

    async fn resolve_tables(&self, logical_plan: &LogicalPlan) -> Result<Vec<VirtualTable>, Error> {
        let mut resolved = Vec::with_capacity(logical_plan.tables.len());
        for name in &logical_plan.tables {
            resolved.push(self.repository.get(name).await?);
        }
        Ok(resolved)
    }

    /// §4.5 step 2: when ≥ 2 tables are referenced, every table's preferred
    /// engine must agree, or the query is cross-engine.
    fn check_cross_engine(&self, tables: &[VirtualTable]) -> Result<(), Error> {
        if tables.len() < 2 {
            return Ok(());
        }
        let mut engines: Vec<&str> = tables.iter().map(|t| t.preferred_engine()).collect();
        engines.sort_unstable();
        engines.dedup();
        if engines.len() > 1 {
            return error::CrossEngineSnafu { engines: engines.into_iter().map(str::to_string).collect() }.fail();
        }
        Ok(())
    }

    /// §4.5 step 3: `SNAPSHOT_CONSISTENT` enforcement.
    fn check_snapshot_consistency(&self, tables: &[VirtualTable], logical_plan: &LogicalPlan) -> Result<(), Error> {
        let snapshot: Vec<&VirtualTable> =
            tables.iter().filter(|t| t.constraints.contains(&Constraint::SnapshotConsistent)).collect();
        let non_snapshot: Vec<&VirtualTable> =
            tables.iter().filter(|t| !t.constraints.contains(&Constraint::SnapshotConsistent)).collect();

        if snapshot.is_empty() {
            return Ok(());
        }

        if !logical_plan.has_time_travel {
            return error::ConstraintViolationSnafu {
                table: snapshot[0].name.clone(),
                constraint: Constraint::SnapshotConsistent,
                op: logical_plan.operation,
                detail: "query must include AS OF".to_string(),
            }
            .fail();
        }

        if !non_snapshot.is_empty() {
            return error::ConstraintViolationSnafu {
                table: snapshot[0].name.clone(),
                constraint: Constraint::SnapshotConsistent,
                op: logical_plan.operation,
                detail: "cannot mix snapshot-consistent and non-snapshot tables".to_string(),
            }
            .fail();
        }

        if snapshot.len() > 1 {
            let mut timestamps: Vec<(&str, &str)> = Vec::new();
            for table in &snapshot {
                if let Some(ts) = logical_plan.time_travel_for(&table.name) {
                    timestamps.push((table.name.as_str(), ts));
                }
            }
            if timestamps.len() > 1 {
                let first = timestamps[0].1;
                if let Some(mismatch) = timestamps.iter().find(|(_, ts)| *ts != first) {
                    return error::ConstraintViolationSnafu {
                        table: snapshot[0].name.clone(),
                        constraint: Constraint::SnapshotConsistent,
                        op: logical_plan.operation,
                        detail: format!(
                            "timestamps disagree across snapshot-consistent tables: {} ({}) vs {} ({})",
                            timestamps[0].0, timestamps[0].1, mismatch.0, mismatch.1
                        ),
                    }
                    .fail();
                }
            }
        }

        Ok(())
    }

    fn required_capabilities(&self, logical_plan: &LogicalPlan) -> Vec<Capability> {
        let mut required = vec![logical_plan.operation.required_capability()];
        if logical_plan.has_time_travel {
            required.push(Capability::TimeTravel);
        }
        required
    }

    fn check_table_capabilities(
        &self,
        tables: &[VirtualTable],
        logical_plan: &LogicalPlan,
        required: &[Capability],
    ) -> Result<(), Error> {
        for table in tables {
            table.can_perform(logical_plan.operation)?;
            for capability in required {
                if !table.capabilities.contains(capability) {
                    return error::CapabilityDeniedSnafu {
                        table: table.name.clone(),
                        capability: *capability,
                        op: logical_plan.operation,
                    }
                    .fail();
                }
            }
        }
        Ok(())
    }

    /// §4.5 steps 1-6, producing an `ExecutionPlan`. Authorization (§4.3) is
    /// the caller's responsibility and must have already succeeded.
    pub async fn plan(&self, logical_plan: LogicalPlan) -> Result<ExecutionPlan, Error> {
        let resolved_tables = self.resolve_tables(&logical_plan).await?;
        self.check_cross_engine(&resolved_tables)?;
        self.check_snapshot_consistency(&resolved_tables, &logical_plan)?;
        let required_capabilities = self.required_capabilities(&logical_plan);
        self.check_table_capabilities(&resolved_tables, &logical_plan, &required_capabilities)?;
        let engine = self.router.select_engine(&required_capabilities).await?;

        Ok(ExecutionPlan { logical_plan, engine, resolved_tables, required_capabilities })
    }

    /// Same steps as `plan()`, returning a structured, deterministic record
    /// instead of stopping at the first error (§4.5, §8 "Planner
    /// determinism", "Runtime parity"). `authorization_result` is filled by
    /// the caller, since authorization runs ahead of planning.
    pub async fn explain(&self, logical_plan: LogicalPlan, authorization_result: &str) -> ExplainRecord {
        let required_capabilities = self.required_capabilities(&logical_plan);

        let resolved_tables = match self.resolve_tables(&logical_plan).await {
            Ok(tables) => tables,
            Err(e) => return ExplainRecord::refused(authorization_result, &e),
        };

        if let Err(e) = self.check_cross_engine(&resolved_tables) {
            return ExplainRecord::refused(authorization_result, &e);
        }
        if let Err(e) = self.check_snapshot_consistency(&resolved_tables, &logical_plan) {
            return ExplainRecord::refused(authorization_result, &e);
        }
        if let Err(e) = self.check_table_capabilities(&resolved_tables, &logical_plan, &required_capabilities) {
            return ExplainRecord::refused(authorization_result, &e);
        }

        let engine = match self.router.select_engine(&required_capabilities).await {
            Ok(engine) => engine,
            Err(e) => return ExplainRecord::refused(authorization_result, &e),
        };

        ExplainRecord {
            accepted: true,
            engine: Some(engine),
            resolved_tables: resolved_tables
                .iter()
                .map(|t| ResolvedTableInfo {
                    name: t.name.clone(),
                    capabilities: sorted_capabilities(t.capabilities.iter().copied()),
                    constraints: sorted_constraints(t.constraints.iter().copied()),
                })
                .collect(),
            required_capabilities,
            authorization_result: authorization_result.to_string(),
            refusal_reason: None,
        }
    }
}
