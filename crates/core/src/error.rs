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

//! The closed error taxonomy of §7: every rejection carries a numeric
//! `code`, a human message, a one-line machine-readable `reason`, and a
//! `suggestion`. Construction only ever happens through the enum's own
//! variants (via the `snafu`-generated context selectors), never through a
//! bare `String` — so `reason`/`suggestion` can never be forgotten.

use snafu::Snafu;

use crate::model::capability::{Capability, Constraint, OperationType};

/// Exit-code family from §6 ("Exit codes from errors").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Validation = 1,
    Auth = 2,
    Engine = 3,
    Internal = 4,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    // ---- Validation (1) ----
    #[snafu(display("table {table} does not have capability {capability:?} required for {op:?}"))]
    CapabilityDenied {
        table: String,
        capability: Capability,
        op: OperationType,
    },

    #[snafu(display("table {table} violates constraint {constraint:?} for {op:?}: {detail}"))]
    ConstraintViolation {
        table: String,
        constraint: Constraint,
        op: OperationType,
        detail: String,
    },

    #[snafu(display("table not found: {table}"))]
    TableNotFound { table: String },

    #[snafu(display("table already exists: {table}"))]
    TableAlreadyExists { table: String },

    #[snafu(display("invalid table definition: field {field}: {reason}"))]
    InvalidTableDefinition { field: String, reason: String },

    #[snafu(display("ambiguous table reference, candidates: {}", matches.join(", ")))]
    AmbiguousTable { matches: Vec<String> },

    #[snafu(display("query rejected: {detail}"))]
    QueryRejected { detail: String },

    #[snafu(display("write not allowed: {op:?}"))]
    WriteNotAllowed { op: OperationType },

    #[snafu(display("unsupported syntax: {construct}"))]
    UnsupportedSyntax {
        construct: String,
        alternative: Option<String>,
    },

    #[snafu(display("vendor hint not supported: {hint}"))]
    VendorHint { hint: String },

    #[snafu(display("cross-engine query spans engines: {}", engines.join(", ")))]
    CrossEngine { engines: Vec<String> },

    #[snafu(display("planner error: {detail}"))]
    PlannerError { detail: String },

    // ---- Auth (2) ----
    #[snafu(display("authorization failed: {reason}"))]
    AuthFailed { reason: String },

    #[snafu(display("authorization expired"))]
    AuthExpired,

    #[snafu(display("access denied: table {table}, capability {capability:?}: {reason}"))]
    AccessDenied {
        table: String,
        capability: Capability,
        reason: String,
    },

    // ---- Engine (3) ----
    #[snafu(display("no available engine covers required capabilities: {:?}", required))]
    EngineUnavailable { required: Vec<Capability> },

    // ---- Internal (4) ----
    #[snafu(display("gateway unavailable: {endpoint}"))]
    GatewayUnavailable { endpoint: String },

    #[snafu(display("metadata database unavailable"))]
    DatabaseUnavailable,

    #[snafu(display("metadata conflict on {resource}: {source1} vs {source2}"))]
    MetadataConflict {
        resource: String,
        source1: String,
        source2: String,
    },

    #[snafu(display("migration {name} failed: {cause}"))]
    MigrationFailed { name: String, cause: String },

    #[snafu(display("bootstrap error: {detail}"))]
    BootstrapError { detail: String },
}

impl Error {
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::CapabilityDenied { .. }
            | Error::ConstraintViolation { .. }
            | Error::TableNotFound { .. }
            | Error::TableAlreadyExists { .. }
            | Error::InvalidTableDefinition { .. }
            | Error::AmbiguousTable { .. }
            | Error::QueryRejected { .. }
            | Error::WriteNotAllowed { .. }
            | Error::UnsupportedSyntax { .. }
            | Error::VendorHint { .. }
            | Error::CrossEngine { .. }
            | Error::PlannerError { .. } => ErrorCode::Validation,

            Error::AuthFailed { .. } | Error::AuthExpired | Error::AccessDenied { .. } => {
                ErrorCode::Auth
            }

            Error::EngineUnavailable { .. } => ErrorCode::Engine,

            Error::GatewayUnavailable { .. }
            | Error::DatabaseUnavailable
            | Error::MetadataConflict { .. }
            | Error::MigrationFailed { .. }
            | Error::BootstrapError { .. } => ErrorCode::Internal,
        }
    }

    /// One-line machine-readable reason, stable across runtime and explain mode.
    pub fn reason(&self) -> String {
        match self {
            Error::CapabilityDenied { capability, op, .. } => {
                format!("capability_denied:{capability:?}:{op:?}")
            }
            Error::ConstraintViolation { constraint, .. } => {
                format!("constraint_violation:{constraint:?}")
            }
            Error::TableNotFound { table } => format!("table_not_found:{table}"),
            Error::TableAlreadyExists { table } => format!("table_already_exists:{table}"),
            Error::InvalidTableDefinition { field, .. } => {
                format!("invalid_table_definition:{field}")
            }
            Error::AmbiguousTable { .. } => "ambiguous_table".to_string(),
            Error::QueryRejected { .. } => "query_rejected".to_string(),
            Error::WriteNotAllowed { op } => format!("write_not_allowed:{op:?}"),
            Error::UnsupportedSyntax { construct, .. } => {
                format!("unsupported_syntax:{construct}")
            }
            Error::VendorHint { hint } => format!("vendor_hint:{hint}"),
            Error::CrossEngine { .. } => "cross_engine".to_string(),
            Error::PlannerError { .. } => "planner_error".to_string(),
            Error::AuthFailed { .. } => "auth_failed".to_string(),
            Error::AuthExpired => "auth_expired".to_string(),
            Error::AccessDenied { table, capability, .. } => {
                format!("access_denied:{table}:{capability:?}")
            }
            Error::EngineUnavailable { .. } => "engine_unavailable".to_string(),
            Error::GatewayUnavailable { .. } => "gateway_unavailable".to_string(),
            Error::DatabaseUnavailable => "database_unavailable".to_string(),
            Error::MetadataConflict { resource, .. } => format!("metadata_conflict:{resource}"),
            Error::MigrationFailed { name, .. } => format!("migration_failed:{name}"),
            Error::BootstrapError { .. } => "bootstrap_error".to_string(),
        }
    }

    /// A one-line actionable suggestion, always non-empty.
    pub fn suggestion(&self) -> String {
        match self {
            Error::CapabilityDenied { .. } => {
                "grant the table the required capability or pick another table".to_string()
            }
            Error::ConstraintViolation { constraint, .. } => match constraint {
                Constraint::ReadOnly => "remove the write operation".to_string(),
                Constraint::SnapshotConsistent => {
                    "include a matching FOR SYSTEM_TIME AS OF / FOR VERSION AS OF clause on every snapshot-consistent table".to_string()
                }
            },
            Error::TableNotFound { .. } => "check the table name or register it first".to_string(),
            Error::TableAlreadyExists { .. } => {
                "use a different name or update the existing table".to_string()
            }
            Error::InvalidTableDefinition { .. } => "fix the referenced field".to_string(),
            Error::AmbiguousTable { .. } => "qualify the table with its schema".to_string(),
            Error::QueryRejected { .. } => "submit a single non-empty SQL statement".to_string(),
            Error::WriteNotAllowed { .. } => {
                "writes are not supported in this release; submit a read-only query".to_string()
            }
            Error::UnsupportedSyntax { alternative, .. } => alternative
                .clone()
                .unwrap_or_else(|| "remove the unsupported construct".to_string()),
            Error::VendorHint { .. } => "remove the hint".to_string(),
            Error::CrossEngine { .. } => {
                "route through the federation pipeline or split the query by engine".to_string()
            }
            Error::PlannerError { .. } => "review the query against the table's capabilities".to_string(),
            Error::AuthFailed { .. } => "authenticate with a valid token".to_string(),
            Error::AuthExpired => "re-authenticate and retry".to_string(),
            Error::AccessDenied { .. } => {
                "request the missing capability from an administrator".to_string()
            }
            Error::EngineUnavailable { .. } => {
                "register an available engine covering the required capabilities".to_string()
            }
            Error::GatewayUnavailable { .. } => "retry once the endpoint is reachable".to_string(),
            Error::DatabaseUnavailable => "retry once the metadata database is reachable".to_string(),
            Error::MetadataConflict { .. } => "resolve the conflicting source and retry".to_string(),
            Error::MigrationFailed { .. } => "inspect the migration cause and re-run it".to_string(),
            Error::BootstrapError { .. } => "fix the startup configuration and restart".to_string(),
        }
    }

    /// message + reason + suggestion, byte-identical between runtime and
    /// explain-mode refusals (§7, §8 "Runtime parity").
    pub fn user_facing(&self) -> String {
        format!("{self} | {} | {}", self.reason(), self.suggestion())
    }
}
