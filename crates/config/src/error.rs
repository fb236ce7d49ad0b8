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

//! §6's configuration error taxonomy, kept a separate closed enum from
//! `canonica_core::error::Error` but composing into it at the point
//! `Apply` starts touching `MetadataRepository` (`TableError`).

use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    #[snafu(display("invalid YAML: {source}"))]
    InvalidYaml { source: serde_yaml::Error },

    #[snafu(display("unknown configuration key: {key}"))]
    UnknownKey { key: String },

    #[snafu(display("missing required configuration: {path}"))]
    MissingRequired { path: String },

    #[snafu(display("unqualified table name: {name} (expected schema.table)"))]
    UnqualifiedTableName { name: String },

    #[snafu(display("unknown capability: {token}"))]
    UnknownCapability { token: String },

    #[snafu(display("unknown constraint: {token}"))]
    UnknownConstraint { token: String },

    #[snafu(display("unknown source format: {token}"))]
    UnknownFormat { token: String },

    #[snafu(display("table {table} references undeclared engine: {engine}"))]
    UndeclaredEngine { table: String, engine: String },

    #[snafu(display("role {role} grants table {table} which is not declared in `tables`"))]
    UndeclaredTable { role: String, table: String },

    #[snafu(display("Apply was called without a prior successful Validate"))]
    ApplyWithoutValidate,

    #[snafu(display(
        "destructive diff requires explicit confirmation: would delete {}",
        deletes.join(", ")
    ))]
    RequiresConfirmation { deletes: Vec<String> },

    #[snafu(display("{source}"))]
    Table { source: canonica_core::error::Error },
}

impl From<canonica_core::error::Error> for ConfigError {
    fn from(source: canonica_core::error::Error) -> Self {
        ConfigError::Table { source }
    }
}
