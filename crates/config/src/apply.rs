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

//! `Apply` (§6): diffs a `Validated` config against the repository's
//! current table graph and reconciles it. Idempotent by construction — the
//! diff is always recomputed from the repository's live state, so applying
//! twice in a row produces an empty second diff. Destructive diffs (a
//! table present in the repository but absent from the config) are
//! refused unless the caller explicitly confirms.

use std::collections::{HashSet, HashMap};

use canonica_core::model::capability::{Capability, Constraint};
use canonica_core::model::virtual_table::{PhysicalSource, VirtualTable};
use canonica_core::repository::MetadataRepository;

use crate::error::{self, ConfigError};
use crate::schema::{SourceConfig, TableConfig};
use crate::token::{parse_capability, parse_constraint, parse_format};
use crate::validate::Validated;

fn to_virtual_table(name: &str, table: &TableConfig) -> Result<VirtualTable, ConfigError> {
    let capabilities: HashSet<Capability> = table.capabilities.iter().map(|t| parse_capability(t)).collect::<Result<_, _>>()?;
    let constraints: HashSet<Constraint> = table.constraints.iter().map(|t| parse_constraint(t)).collect::<Result<_, _>>()?;
    let sources: Vec<PhysicalSource> = table
        .sources
        .iter()
        .map(|s: &SourceConfig| -> Result<PhysicalSource, ConfigError> {
            Ok(PhysicalSource { format: parse_format(&s.format)?, location: s.location.clone(), engine: Some(s.engine.clone()) })
        })
        .collect::<Result<_, _>>()?;

    Ok(VirtualTable::new(name, table.description.clone(), sources, capabilities, constraints)?)
}

/// Definition equality ignores `created_at`/`updated_at`: those are stamped
/// fresh every time a config is turned back into a `VirtualTable`, so
/// comparing them would make every `Apply` look destructive-then-creative.
fn same_definition(a: &VirtualTable, b: &VirtualTable) -> bool {
    a.name == b.name && a.description == b.description && a.sources == b.sources && a.capabilities == b.capabilities && a.constraints == b.constraints
}

/// The three reconciliation sets §6 describes: tables to create, tables
/// whose definition changed, and tables present in the repository but
/// dropped from the config.
#[derive(Debug, Default)]
pub struct Diff {
    pub creates: Vec<VirtualTable>,
    pub updates: Vec<VirtualTable>,
    pub deletes: Vec<String>,
}

impl Diff {
    pub fn is_destructive(&self) -> bool {
        !self.deletes.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct ApplyReport {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub deleted: Vec<String>,
}

/// Computes the diff between `validated`'s desired table set and the
/// repository's current one. Pure with respect to the repository — read
/// only, no mutation.
pub async fn plan_diff(repository: &dyn MetadataRepository, validated: &Validated) -> Result<Diff, ConfigError> {
    let desired: HashMap<String, VirtualTable> = validated
        .config()
        .tables
        .iter()
        .map(|(name, table)| to_virtual_table(name, table).map(|vt| (name.clone(), vt)))
        .collect::<Result<_, _>>()?;

    let existing: HashMap<String, VirtualTable> =
        repository.list().await?.into_iter().map(|t| (t.name.clone(), t)).collect();

    let mut diff = Diff::default();
    for (name, table) in &desired {
        match existing.get(name) {
            None => diff.creates.push(table.clone()),
            Some(current) if !same_definition(current, table) => diff.updates.push(table.clone()),
            Some(_) => {}
        }
    }
    for name in existing.keys() {
        if !desired.contains_key(name) {
            diff.deletes.push(name.clone());
        }
    }
    diff.deletes.sort();

    Ok(diff)
}

/// Applies a previously computed `Diff`. Refuses outright if the diff is
/// destructive and `confirm_destructive` is false (§6).
pub async fn apply(repository: &dyn MetadataRepository, diff: Diff, confirm_destructive: bool) -> Result<ApplyReport, ConfigError> {
    if diff.is_destructive() && !confirm_destructive {
        return error::RequiresConfirmationSnafu { deletes: diff.deletes.clone() }.fail();
    }

    let mut report = ApplyReport::default();
    for table in diff.creates {
        let name = table.name.clone();
        repository.create(table).await?;
        report.created.push(name);
    }
    for table in diff.updates {
        let name = table.name.clone();
        repository.update(table).await?;
        report.updated.push(name);
    }
    for name in diff.deletes {
        repository.delete(&name).await?;
        report.deleted.push(name);
    }

    Ok(report)
}
