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

//! Turns a loaded, validated `CanonicaConfig` into a running `Engine` (§9
//! "Global mutable state": the registries and authorization service are
//! explicitly constructed here, once, by the composition root — never as
//! hidden statics).

use std::collections::HashSet;
use std::sync::Arc;

use canonica_config::token::parse_capability;
use canonica_config::{apply, plan_diff, CanonicaConfig, Validated};
use canonica_core::audit::{AuditLogger, TracingAuditLogger};
use canonica_core::auth::AuthorizationService;
use canonica_core::model::capability::Capability;
use canonica_core::repository::{InMemoryRepository, MetadataRepository};
use canonica_core::router::{EngineRouter, RegisteredEngine};
use canonica_core::Engine;

use crate::adapter::LoopbackAdapter;
use crate::error::Error;

pub struct Bootstrapped {
    pub engine: Engine,
    pub repository: Arc<dyn MetadataRepository>,
}

/// Builds the full pipeline from a validated config: repository seeded with
/// every declared table, a router with one `RegisteredEngine` per declared
/// engine, an adapter per engine (§1's out-of-scope connectors, stood in for
/// by `LoopbackAdapter`), and a role→table→capability authorization grant
/// per `roles.<role>.tables.<schema.table>`.
pub async fn bootstrap(config: &CanonicaConfig) -> Result<Bootstrapped, Error> {
    let validated = Validated::new(config.clone())?;
    let repository = InMemoryRepository::shared();

    let diff = plan_diff(repository.as_ref(), &validated).await?;
    apply(repository.as_ref(), diff, true).await?;

    let router = EngineRouter::new();
    let adapters = canonica_core::adapter::AdapterRegistry::new();
    for (name, engine_config) in &config.engines {
        let capabilities: HashSet<Capability> =
            engine_config.capabilities.iter().map(|t| parse_capability(t)).collect::<Result<_, _>>()?;
        router
            .register(RegisteredEngine { name: name.clone(), capabilities, available: engine_config.enabled, priority: 0 })
            .await;
        adapters.register(Arc::new(LoopbackAdapter::new(name.clone()))).await;
    }

    let auth = AuthorizationService::new();
    for (role, role_config) in &config.roles {
        for (table, tokens) in &role_config.tables {
            for token in tokens {
                let capability = parse_capability(token)?;
                auth.grant(role, table, capability).await;
            }
        }
    }

    let audit: Arc<dyn AuditLogger> = Arc::new(TracingAuditLogger);
    let engine = Engine::new(repository.clone(), auth, router, adapters, audit);

    Ok(Bootstrapped { engine, repository })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use canonica_config::schema::{EngineConfig, GatewayConfig, PostgresConfig, RepositoryConfig, RoleConfig, SourceConfig, TableConfig};
    use canonica_core::model::user::User;
    use tokio_util::sync::CancellationToken;

    use super::*;

    fn minimal_config() -> CanonicaConfig {
        CanonicaConfig {
            gateway: GatewayConfig { listen: "0.0.0.0:8080".to_string() },
            repository: RepositoryConfig { postgres: PostgresConfig { dsn: "postgres://x".to_string() } },
            engines: HashMap::from([(
                "duckdb".to_string(),
                EngineConfig { enabled: true, endpoint: "local".to_string(), database: None, capabilities: vec!["READ".to_string()] },
            )]),
            roles: HashMap::from([(
                "analyst".to_string(),
                RoleConfig { tables: HashMap::from([("sales.orders".to_string(), vec!["READ".to_string()])]) },
            )]),
            tables: HashMap::from([(
                "sales.orders".to_string(),
                TableConfig {
                    description: String::new(),
                    sources: vec![SourceConfig { engine: "duckdb".to_string(), format: "PARQUET".to_string(), location: "s3://x".to_string() }],
                    capabilities: vec!["READ".to_string()],
                    constraints: vec![],
                },
            )]),
        }
    }

    #[tokio::test]
    async fn bootstrap_seeds_the_repository_and_runs_a_query_end_to_end() {
        let bootstrapped = bootstrap(&minimal_config()).await.unwrap();
        assert!(bootstrapped.repository.exists("sales.orders").await.unwrap());

        let user = User { id: "u1".to_string(), name: "analyst".to_string(), roles: vec!["analyst".to_string()], token_expiry: None };
        let ctx = CancellationToken::new();
        let mut stream = bootstrapped.engine.query(&ctx, Some(&user), "SELECT * FROM sales.orders").await.unwrap();
        let rows = canonica_core::model::stream::drain(stream.as_mut(), &ctx).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn bootstrap_rejects_an_invalid_config() {
        let mut config = minimal_config();
        config.tables.insert(
            "unqualified".to_string(),
            TableConfig { description: String::new(), sources: vec![], capabilities: vec![], constraints: vec![] },
        );
        let err = bootstrap(&config).await.unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }
}
