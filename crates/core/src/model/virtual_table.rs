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

//! `VirtualTable` and `PhysicalSource` (§3).

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use snafu::ensure;

use crate::error::{self, Error};
use crate::model::capability::{Capability, Constraint, OperationType};

/// The physical storage format behind a source, driving engine-preference
/// fallback per §3's format table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Format {
    Delta,
    Iceberg,
    Parquet,
    Hudi,
    Csv,
    Orc,
}

impl Format {
    /// The engine this format prefers absent an explicit override.
    pub fn default_engine(self) -> &'static str {
        match self {
            Format::Iceberg => "trino",
            Format::Delta => "spark",
            Format::Hudi => "spark",
            Format::Parquet | Format::Csv => "duckdb",
            Format::Orc => "trino",
        }
    }
}

/// A concrete storage location + format + optional engine binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalSource {
    pub format: Format,
    pub location: String,
    pub engine: Option<String>,
}

impl PhysicalSource {
    /// The engine this source resolves to: explicit binding, else the
    /// format's default.
    pub fn preferred_engine(&self) -> &str {
        self.engine.as_deref().unwrap_or_else(|| self.format.default_engine())
    }
}

/// A named abstraction over one or more physical sources with a
/// capability/constraint profile (§3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualTable {
    pub name: String,
    pub description: String,
    pub sources: Vec<PhysicalSource>,
    pub capabilities: HashSet<Capability>,
    pub constraints: HashSet<Constraint>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VirtualTable {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        sources: Vec<PhysicalSource>,
        capabilities: HashSet<Capability>,
        constraints: HashSet<Constraint>,
    ) -> Result<Self, Error> {
        let now = Utc::now();
        let table = VirtualTable {
            name: name.into(),
            description: description.into(),
            sources,
            capabilities,
            constraints,
            created_at: now,
            updated_at: now,
        };
        table.validate()?;
        Ok(table)
    }

    /// §3 invariants: `schema.table` shape, non-empty source list, no two
    /// sources sharing a format with different locations.
    pub fn validate(&self) -> Result<(), Error> {
        let parts: Vec<&str> = self.name.splitn(2, '.').collect();
        ensure!(
            parts.len() == 2 && !parts[0].is_empty() && !parts[1].is_empty() && !self.name.contains(".."),
            error::InvalidTableDefinitionSnafu {
                field: "name".to_string(),
                reason: format!("'{}' must be schema.table with both parts non-empty", self.name),
            }
        );

        ensure!(
            !self.sources.is_empty(),
            error::InvalidTableDefinitionSnafu {
                field: "sources".to_string(),
                reason: "at least one physical source is required".to_string(),
            }
        );

        let mut seen_formats: std::collections::HashMap<Format, &str> = std::collections::HashMap::new();
        for source in &self.sources {
            if let Some(existing) = seen_formats.insert(source.format, source.location.as_str()) {
                ensure!(
                    existing == source.location,
                    error::InvalidTableDefinitionSnafu {
                        field: "sources".to_string(),
                        reason: format!(
                            "format {:?} is bound to two different locations: {} and {}",
                            source.format, existing, source.location
                        ),
                    }
                );
            }
        }

        Ok(())
    }

    /// §3: `can_perform(op)` — constraint violation first, then capability
    /// gate, else ok.
    pub fn can_perform(&self, op: OperationType) -> Result<(), Error> {
        if op.is_write() && self.constraints.contains(&Constraint::ReadOnly) {
            return error::ConstraintViolationSnafu {
                table: self.name.clone(),
                constraint: Constraint::ReadOnly,
                op,
                detail: "READ_ONLY forbids all writes regardless of capability".to_string(),
            }
            .fail();
        }

        let required = op.required_capability();
        if !self.capabilities.contains(&required) {
            return error::CapabilityDeniedSnafu {
                table: self.name.clone(),
                capability: required,
                op,
            }
            .fail();
        }

        Ok(())
    }

    /// The preferred engine per §4.5 step 2: the first source's explicit
    /// engine if set, else that source's format default.
    pub fn preferred_engine(&self) -> &str {
        self.sources[0].preferred_engine()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(format: Format, location: &str) -> PhysicalSource {
        PhysicalSource { format, location: location.to_string(), engine: None }
    }

    #[test]
    fn rejects_unqualified_name() {
        let err = VirtualTable::new(
            "orders",
            "",
            vec![source(Format::Parquet, "s3://x")],
            HashSet::from([Capability::Read]),
            HashSet::new(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidTableDefinition { .. }));
    }

    #[test]
    fn rejects_double_dot() {
        let err = VirtualTable::new(
            "sales..orders",
            "",
            vec![source(Format::Parquet, "s3://x")],
            HashSet::from([Capability::Read]),
            HashSet::new(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidTableDefinition { .. }));
    }

    #[test]
    fn rejects_empty_sources() {
        let err = VirtualTable::new(
            "sales.orders",
            "",
            vec![],
            HashSet::from([Capability::Read]),
            HashSet::new(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidTableDefinition { .. }));
    }

    #[test]
    fn rejects_conflicting_locations_same_format() {
        let err = VirtualTable::new(
            "sales.orders",
            "",
            vec![source(Format::Parquet, "s3://a"), source(Format::Parquet, "s3://b")],
            HashSet::from([Capability::Read]),
            HashSet::new(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidTableDefinition { .. }));
    }

    #[test]
    fn read_only_blocks_writes_regardless_of_capability() {
        let table = VirtualTable::new(
            "sales.orders",
            "",
            vec![source(Format::Parquet, "s3://a")],
            HashSet::from([Capability::Read, Capability::Insert]),
            HashSet::from([Constraint::ReadOnly]),
        )
        .unwrap();
        assert!(matches!(
            table.can_perform(OperationType::Insert),
            Err(Error::ConstraintViolation { .. })
        ));
    }

    #[test]
    fn preferred_engine_falls_back_to_format_default() {
        let table = VirtualTable::new(
            "sales.orders",
            "",
            vec![source(Format::Iceberg, "s3://a")],
            HashSet::from([Capability::Read]),
            HashSet::new(),
        )
        .unwrap();
        assert_eq!(table.preferred_engine(), "trino");
    }
}
