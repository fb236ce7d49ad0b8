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

//! Closed enums for §3: `Capability`, `Constraint`, `OperationType`.

use serde::{Deserialize, Serialize};

/// A declared power a virtual table supports. Write capabilities exist in
/// the enum per §3 but are never exposed in the read-only MVP surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Capability {
    Read,
    TimeTravel,
    Insert,
    Update,
    Delete,
}

/// A declared restriction on a virtual table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Constraint {
    ReadOnly,
    SnapshotConsistent,
}

/// The statement kind a `LogicalPlan` was produced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationType {
    Select,
    Insert,
    Update,
    Delete,
}

impl OperationType {
    /// Whether this operation mutates data.
    pub fn is_write(self) -> bool {
        matches!(
            self,
            OperationType::Insert | OperationType::Update | OperationType::Delete
        )
    }

    /// The single base capability an operation maps to (§3, §4.1).
    pub fn required_capability(self) -> Capability {
        match self {
            OperationType::Select => Capability::Read,
            OperationType::Insert => Capability::Insert,
            OperationType::Update => Capability::Update,
            OperationType::Delete => Capability::Delete,
        }
    }
}
