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

//! Loads §6's YAML shape, rejecting unknown top-level/`gateway`/`repository`
//! keys with the exact `"unknown configuration key: X"` message the spec
//! mandates, ahead of the typed `serde_yaml` deserialization (whose own
//! `deny_unknown_fields` error text is not in that shape, and which never
//! runs for `engines`/`roles`/`tables` since those are open maps).

use serde_yaml::Value;
use snafu::ResultExt;

use crate::error::{self, ConfigError};
use crate::schema::CanonicaConfig;

const TOP_LEVEL_KEYS: &[&str] = &["gateway", "repository", "engines", "roles", "tables"];
const GATEWAY_KEYS: &[&str] = &["listen"];
const REPOSITORY_KEYS: &[&str] = &["postgres"];

fn reject_unknown_keys(value: &Value, allowed: &[&str]) -> Result<(), ConfigError> {
    let Value::Mapping(map) = value else {
        return Ok(());
    };
    for key in map.keys() {
        if let Value::String(key) = key {
            if !allowed.contains(&key.as_str()) {
                return error::UnknownKeySnafu { key: key.clone() }.fail();
            }
        }
    }
    Ok(())
}

/// Parses and key-validates `yaml`, returning the typed config. Does not run
/// `validate::validate` (cross-reference checks like undeclared engines) —
/// callers run that separately so a syntactically valid but
/// semantically-inconsistent config can still be inspected.
pub fn load(yaml: &str) -> Result<CanonicaConfig, ConfigError> {
    let value: Value = serde_yaml::from_str(yaml).context(error::InvalidYamlSnafu)?;

    reject_unknown_keys(&value, TOP_LEVEL_KEYS)?;
    if let Some(gateway) = value.get("gateway") {
        reject_unknown_keys(gateway, GATEWAY_KEYS)?;
    }
    if let Some(repository) = value.get("repository") {
        reject_unknown_keys(repository, REPOSITORY_KEYS)?;
    }
    if let Some(Value::Mapping(postgres)) = value.get("repository").and_then(|r| r.get("postgres")) {
        reject_unknown_keys(&Value::Mapping(postgres.clone()), &["dsn"])?;
    }

    serde_yaml::from_value(value).context(error::InvalidYamlSnafu)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_yaml() -> &'static str {
        r#"
gateway:
  listen: "0.0.0.0:8080"
repository:
  postgres:
    dsn: "postgres://localhost/canonica"
engines:
  duckdb:
    endpoint: "local"
    capabilities: ["READ"]
"#
    }

    #[test]
    fn loads_a_minimal_valid_config() {
        let config = load(valid_yaml()).unwrap();
        assert_eq!(config.gateway.listen, "0.0.0.0:8080");
    }

    #[test]
    fn rejects_unknown_top_level_key_with_the_exact_message() {
        let yaml = format!("{}\nwat: true\n", valid_yaml());
        let err = load(&yaml).unwrap_err();
        assert_eq!(err.to_string(), "unknown configuration key: wat");
    }

    #[test]
    fn rejects_unknown_gateway_key() {
        let yaml = r#"
gateway:
  listen: "0.0.0.0:8080"
  bogus: 1
repository:
  postgres:
    dsn: "postgres://localhost/canonica"
engines: {}
"#;
        let err = load(yaml).unwrap_err();
        assert_eq!(err.to_string(), "unknown configuration key: bogus");
    }

    #[test]
    fn rejects_unknown_repository_key() {
        let yaml = r#"
gateway:
  listen: "0.0.0.0:8080"
repository:
  postgres:
    dsn: "postgres://localhost/canonica"
  bogus: 1
engines: {}
"#;
        let err = load(yaml).unwrap_err();
        assert_eq!(err.to_string(), "unknown configuration key: bogus");
    }
}
