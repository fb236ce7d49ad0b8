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

//! `LogicalPlan` and `ExecutionPlan` (§3).

use std::collections::HashMap;

use crate::model::capability::{Capability, OperationType};
use crate::model::virtual_table::VirtualTable;

/// Produced by the parser; ephemeral per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalPlan {
    pub raw_sql: String,
    pub operation: OperationType,
    /// Resolved, deduplicated, first-seen-order fully-qualified table names.
    pub tables: Vec<String>,
    pub has_time_travel: bool,
    pub global_time_travel: Option<String>,
    /// Per-table time-travel expression, when a table carries its own
    /// `FOR SYSTEM_TIME AS OF` / `FOR VERSION AS OF` clause.
    pub per_table_time_travel: HashMap<String, String>,
}

impl LogicalPlan {
    /// The time-travel expression that applies to `table`: its own clause if
    /// present, else the query-wide one (§7 "empty optional lookups" — a
    /// missing per-table clause is legal when a global one is set).
    pub fn time_travel_for(&self, table: &str) -> Option<&str> {
        self.per_table_time_travel
            .get(table)
            .map(String::as_str)
            .or(self.global_time_travel.as_deref())
    }
}

/// Produced by the planner (§4.5).
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub logical_plan: LogicalPlan,
    pub engine: String,
    pub resolved_tables: Vec<VirtualTable>,
    pub required_capabilities: Vec<Capability>,
}
