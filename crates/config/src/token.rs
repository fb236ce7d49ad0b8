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

//! Parses the string tokens §6's YAML uses for capabilities, constraints,
//! and source formats against `canonica_core`'s own closed enums, by
//! reusing their `Deserialize` impls rather than hand-rolling a second
//! match statement that could drift from the core definitions.

use canonica_core::model::capability::{Capability, Constraint};
use canonica_core::model::virtual_table::Format;

use crate::error::{self, ConfigError};

pub fn parse_capability(token: &str) -> Result<Capability, ConfigError> {
    serde_yaml::from_value(serde_yaml::Value::String(token.to_string()))
        .map_err(|_| error::UnknownCapabilitySnafu { token: token.to_string() }.build())
}

pub fn parse_constraint(token: &str) -> Result<Constraint, ConfigError> {
    serde_yaml::from_value(serde_yaml::Value::String(token.to_string()))
        .map_err(|_| error::UnknownConstraintSnafu { token: token.to_string() }.build())
}

pub fn parse_format(token: &str) -> Result<Format, ConfigError> {
    serde_yaml::from_value(serde_yaml::Value::String(token.to_string()))
        .map_err(|_| error::UnknownFormatSnafu { token: token.to_string() }.build())
}
