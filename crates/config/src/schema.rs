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

//! The typed shape of §6's "Configuration file": `CanonicaConfig` and its
//! components. Capabilities and constraints are kept as plain `String`
//! tokens here, not `canonica_core` enums directly — the YAML author's
//! typo (`"Read"` vs `"READ"`, an unknown token entirely) is a validation
//! error with a specific message (§6), not a generic deserialization
//! failure.

use std::collections::HashMap;

#[cfg(feature = "schemars")]
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

fn is_default<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

const fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[cfg_attr(feature = "schemars", derive(JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct CanonicaConfig {
    pub gateway: GatewayConfig,
    pub repository: RepositoryConfig,
    pub engines: HashMap<String, EngineConfig>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub roles: HashMap<String, RoleConfig>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub tables: HashMap<String, TableConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[cfg_attr(feature = "schemars", derive(JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    pub listen: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[cfg_attr(feature = "schemars", derive(JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct RepositoryConfig {
    pub postgres: PostgresConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[cfg_attr(feature = "schemars", derive(JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct PostgresConfig {
    pub dsn: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "schemars", derive(JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig { enabled: true, endpoint: String::new(), database: None, capabilities: Vec::new() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[cfg_attr(feature = "schemars", derive(JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct RoleConfig {
    /// `schema.table` -> capability tokens granted to this role on that table.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub tables: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[cfg_attr(feature = "schemars", derive(JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct TableConfig {
    #[serde(default, skip_serializing_if = "is_default")]
    pub description: String,
    pub sources: Vec<SourceConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "schemars", derive(JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    pub engine: String,
    pub format: String,
    pub location: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_the_minimal_required_shape() {
        let yaml = r#"
gateway:
  listen: "0.0.0.0:8080"
repository:
  postgres:
    dsn: "postgres://localhost/canonica"
engines:
  duckdb:
    endpoint: "local"
    capabilities: ["READ"]
"#;
        let config: CanonicaConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.gateway.listen, "0.0.0.0:8080");
        assert_eq!(config.engines["duckdb"].enabled, true);
        assert!(config.roles.is_empty());
        assert!(config.tables.is_empty());
    }

    #[test]
    fn rejects_unknown_top_level_key_via_deny_unknown_fields() {
        let yaml = r#"
gateway:
  listen: "0.0.0.0:8080"
repository:
  postgres:
    dsn: "postgres://localhost/canonica"
engines: {}
wat: true
"#;
        assert!(serde_yaml::from_str::<CanonicaConfig>(yaml).is_err());
    }
}
