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

//! Canonica's query pipeline: parse -> authorize -> plan -> (single-engine
//! execute) or (federate: analyze -> optimize -> decompose -> execute ->
//! join -> post-ops) -> stream rows -> audit (§2 "Control flow of a single
//! request"). Authentication, the HTTP transport, and the configuration
//! loader are out-of-scope external collaborators (§1) driven by the
//! `canonica-gateway` crate.

pub mod adapter;
pub mod audit;
pub mod auth;
pub mod dialect;
pub mod error;
pub mod federation;
pub mod join;
pub mod model;
pub mod parser;
pub mod planner;
pub mod repository;
pub mod retry;
pub mod router;

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::adapter::AdapterRegistry;
use crate::audit::{AuditEntry, AuditLogger, Outcome};
use crate::auth::AuthorizationService;
use crate::error::Error;
use crate::federation::{FederationExecutor, ExecutorError};
use crate::model::capability::Capability;
use crate::model::stream::ResultStream;
use crate::model::user::User;
use crate::planner::{ExplainRecord, Planner};
use crate::repository::MetadataRepository;
use crate::router::EngineRouter;

/// The composition root named in §9 "Global mutable state": the repository,
/// authorization service, router, and adapter registry are held as
/// explicitly constructed services, not hidden statics.
pub struct Engine {
    repository: Arc<dyn MetadataRepository>,
    auth: AuthorizationService,
    planner: Planner,
    adapters: AdapterRegistry,
    federation: FederationExecutor,
    audit: Arc<dyn AuditLogger>,
}

impl Engine {
    pub fn new(
        repository: Arc<dyn MetadataRepository>,
        auth: AuthorizationService,
        router: EngineRouter,
        adapters: AdapterRegistry,
        audit: Arc<dyn AuditLogger>,
    ) -> Self {
        let planner = Planner::new(repository.clone(), router);
        let federation = FederationExecutor::new(adapters.clone());
        Engine { repository, auth, planner, adapters, federation, audit }
    }

    /// Runs the full pipeline for one SQL statement (§2). On the
    /// single-engine path this dispatches directly to that engine's adapter;
    /// on the cross-engine path it runs the federation pipeline. Every call
    /// produces exactly one audit entry, whatever the outcome.
    pub async fn query(&self, ctx: &CancellationToken, user: Option<&User>, sql: &str) -> Result<Box<dyn ResultStream>, Error> {
        let query_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        let user_name = user.map(|u| u.id.clone()).unwrap_or_else(|| "anonymous".to_string());
        let role = user.and_then(|u| u.roles.first().cloned());

        let result = self.run_query(ctx, user, sql).await;

        let (outcome, engine, error, invariant_violated, tables) = match &result {
            Ok(dispatch) => (Outcome::Accepted, Some(dispatch.engine.clone()), None, None, dispatch.tables.clone()),
            Err(e) => (Outcome::Denied, None, Some(e.user_facing()), Some(e.reason()), Vec::new()),
        };

        let entry = AuditEntry {
            query_id,
            user: user_name,
            role,
            tables,
            auth_decision: Some(if matches!(&result, Err(Error::AuthFailed { .. } | Error::AccessDenied { .. })) {
                "denied".to_string()
            } else {
                "granted".to_string()
            }),
            planner_decision: Some(if result.is_ok() { "accepted".to_string() } else { "rejected".to_string() }),
            engine,
            execution_time_ms: Some(started.elapsed().as_millis() as i64),
            outcome,
            error,
            invariant_violated,
        };
        let _ = self.audit.log_query(entry).await;

        result.map(|dispatch| dispatch.stream)
    }

    /// §4.5 step 2 deliberately rejects any query spanning more than one
    /// preferred engine with `Error::CrossEngine`; per §4.2 "the transport
    /// layer may catch this error and route to the federation pipeline", that
    /// catch happens here rather than inside the planner itself.
    async fn run_query(&self, ctx: &CancellationToken, user: Option<&User>, sql: &str) -> Result<Dispatch, Error> {
        let logical_plan = crate::parser::parse(sql)?;
        self.auth.authorize(user, &logical_plan.tables, Capability::Read).await?;

        match self.planner.plan(logical_plan.clone()).await {
            Ok(execution_plan) => {
                let adapter = self
                    .adapters
                    .get(&execution_plan.engine)
                    .await
                    .ok_or_else(|| Error::EngineUnavailable { required: execution_plan.required_capabilities.clone() })?;
                let stream = adapter
                    .execute(ctx, &execution_plan.logical_plan.raw_sql)
                    .await
                    .map_err(|e| Error::PlannerError { detail: e.to_string() })?;
                Ok(Dispatch { stream, engine: execution_plan.engine, tables: execution_plan.logical_plan.tables })
            }
            Err(Error::CrossEngine { .. }) => {
                let analysis = federation::analyze(self.repository.as_ref(), &logical_plan).await?;
                let mut decomposed = federation::decompose(&analysis)?;
                decomposed.sub_queries = federation::optimize_pushdown(&analysis, decomposed.sub_queries);
                let stream = self
                    .federation
                    .execute(ctx, &decomposed)
                    .await
                    .map_err(|e| executor_error_to_planner_error(&e))?;
                Ok(Dispatch { stream, engine: "federated".to_string(), tables: logical_plan.tables })
            }
            Err(e) => Err(e),
        }
    }

    /// `ExplainCanonic` (§8 scenario 6): the identical decision path as
    /// `query`, returning a structured record instead of executing.
    pub async fn explain(&self, user: Option<&User>, sql: &str) -> Result<ExplainRecord, Error> {
        let logical_plan = crate::parser::parse(sql)?;
        let auth_result = self.auth.authorize(user, &logical_plan.tables, Capability::Read).await;
        let authorization_result = if auth_result.is_ok() { "granted" } else { "denied" };

        if let Err(e) = auth_result {
            return Ok(ExplainRecord::refused(authorization_result, &e));
        }

        Ok(self.planner.explain(logical_plan, authorization_result).await)
    }
}

struct Dispatch {
    stream: Box<dyn ResultStream>,
    engine: String,
    tables: Vec<String>,
}

fn executor_error_to_planner_error(e: &ExecutorError) -> Error {
    Error::PlannerError { detail: e.to_string() }
}
