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

//! Time-travel detection (§4.2): `FOR SYSTEM_TIME AS OF '...'` and
//! `FOR VERSION AS OF ...`, including per-table occurrences inside JOINs.
//!
//! This is the one part of the parser that works over the raw SQL text
//! rather than the `sqlparser` AST: neither vendor extension is part of
//! ANSI SQL, and pinning to the AST shape of a single `sqlparser` release
//! for non-standard syntax would be more fragile than a narrowly-scoped
//! regex anchored on the literal `FOR ... AS OF` grammar.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

fn time_travel_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?is)(?P<table>[A-Za-z_][A-Za-z0-9_]*\.[A-Za-z_][A-Za-z0-9_]*)\s*(?:AS\s+[A-Za-z_][A-Za-z0-9_]*\s+)?(?:[A-Za-z_][A-Za-z0-9_]*\s+)?FOR\s+(?P<kind>SYSTEM_TIME|VERSION)\s+AS\s+OF\s+(?P<value>TIMESTAMP\s+'[^']*'|'[^']*'|[0-9]+)",
        )
        .expect("valid regex")
    })
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TimeTravelInfo {
    pub has_time_travel: bool,
    pub global: Option<String>,
    pub per_table: HashMap<String, String>,
}

/// Scans raw SQL for time-travel clauses, populating both the global flag
/// and the per-table map.
pub fn detect(sql: &str) -> TimeTravelInfo {
    let mut per_table = HashMap::new();
    let mut global = None;

    for caps in time_travel_re().captures_iter(sql) {
        let table = caps["table"].to_string();
        let kind = caps["kind"].to_uppercase();
        let value = caps["value"].trim();
        let expr = format!("FOR {kind} AS OF {value}");
        if global.is_none() {
            global = Some(expr.clone());
        }
        per_table.insert(table, expr);
    }

    TimeTravelInfo { has_time_travel: !per_table.is_empty(), global, per_table }
}
