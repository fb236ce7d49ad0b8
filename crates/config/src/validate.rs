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

//! The semantic half of §6's "Validate": cross-references that a type alone
//! can't reject. `Apply` (in `crate::apply`) refuses to run without this
//! having succeeded first.

use crate::error::{self, ConfigError};
use crate::schema::CanonicaConfig;
use crate::token::{parse_capability, parse_constraint};

fn is_qualified(name: &str) -> bool {
    let parts: Vec<&str> = name.splitn(2, '.').collect();
    parts.len() == 2 && !parts[0].is_empty() && !parts[1].is_empty() && !name.contains("..")
}

/// A config that has passed `validate` at least once. `apply::plan_diff`
/// only accepts this type, not a bare `CanonicaConfig`, so "Apply requires a
/// prior Validate" (§6) is enforced by the compiler rather than by
/// convention.
pub struct Validated(pub(crate) CanonicaConfig);

impl Validated {
    pub fn new(config: CanonicaConfig) -> Result<Self, ConfigError> {
        validate(&config)?;
        Ok(Validated(config))
    }

    pub fn config(&self) -> &CanonicaConfig {
        &self.0
    }
}

/// Validates a config already parsed and key-checked by `loader::load`.
/// A config that passes this is safe to hand to `apply::plan_diff`.
pub fn validate(config: &CanonicaConfig) -> Result<(), ConfigError> {
    if config.gateway.listen.is_empty() {
        return error::MissingRequiredSnafu { path: "gateway.listen".to_string() }.fail();
    }
    if config.repository.postgres.dsn.is_empty() {
        return error::MissingRequiredSnafu { path: "repository.postgres.dsn".to_string() }.fail();
    }
    if config.engines.is_empty() {
        return error::MissingRequiredSnafu { path: "engines".to_string() }.fail();
    }

    for (name, table) in &config.tables {
        if !is_qualified(name) {
            return error::UnqualifiedTableNameSnafu { name: name.clone() }.fail();
        }
        for token in &table.capabilities {
            parse_capability(token)?;
        }
        for token in &table.constraints {
            parse_constraint(token)?;
        }
        for source in &table.sources {
            if !config.engines.contains_key(&source.engine) {
                return error::UndeclaredEngineSnafu { table: name.clone(), engine: source.engine.clone() }.fail();
            }
        }
    }

    for (role, role_config) in &config.roles {
        for (table, capabilities) in &role_config.tables {
            if !is_qualified(table) {
                return error::UnqualifiedTableNameSnafu { name: table.clone() }.fail();
            }
            if !config.tables.contains_key(table) {
                return error::UndeclaredTableSnafu { role: role.clone(), table: table.clone() }.fail();
            }
            for token in capabilities {
                parse_capability(token)?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::schema::{EngineConfig, GatewayConfig, PostgresConfig, RepositoryConfig, RoleConfig, SourceConfig, TableConfig};

    fn base_config() -> CanonicaConfig {
        CanonicaConfig {
            gateway: GatewayConfig { listen: "0.0.0.0:8080".to_string() },
            repository: RepositoryConfig { postgres: PostgresConfig { dsn: "postgres://x".to_string() } },
            engines: HashMap::from([("duckdb".to_string(), EngineConfig { endpoint: "local".to_string(), ..Default::default() })]),
            roles: HashMap::new(),
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

    #[test]
    fn accepts_a_well_formed_config() {
        validate(&base_config()).unwrap();
    }

    #[test]
    fn rejects_unqualified_table_name() {
        let mut config = base_config();
        let table = config.tables.remove("sales.orders").unwrap();
        config.tables.insert("orders".to_string(), table);
        assert!(matches!(validate(&config), Err(ConfigError::UnqualifiedTableName { .. })));
    }

    #[test]
    fn rejects_unknown_capability_token() {
        let mut config = base_config();
        config.tables.get_mut("sales.orders").unwrap().capabilities = vec!["FLY".to_string()];
        assert!(matches!(validate(&config), Err(ConfigError::UnknownCapability { .. })));
    }

    #[test]
    fn rejects_source_referencing_undeclared_engine() {
        let mut config = base_config();
        config.tables.get_mut("sales.orders").unwrap().sources[0].engine = "trino".to_string();
        assert!(matches!(validate(&config), Err(ConfigError::UndeclaredEngine { .. })));
    }

    #[test]
    fn rejects_role_grant_on_undeclared_table() {
        let mut config = base_config();
        config.roles.insert(
            "analyst".to_string(),
            RoleConfig { tables: HashMap::from([("sales.customers".to_string(), vec!["READ".to_string()])]) },
        );
        assert!(matches!(validate(&config), Err(ConfigError::UndeclaredTable { .. })));
    }
}
