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

//! The CLI standing in for the out-of-scope HTTP transport (§1, SPEC_FULL
//! "Supplemented features"): `explain`, `query`, `validate-config`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[clap(name = "canonica", about = "Canonica SQL control plane")]
#[clap(rename_all = "kebab-case")]
pub struct Args {
    /// Path to the YAML configuration file (§6).
    #[arg(long, global = true, default_value = "canonica.yaml", env = "CANONICA_CONFIG")]
    pub config: PathBuf,

    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the planner's decision path for a statement without executing it.
    Explain(QueryArgs),

    /// Run the full pipeline for a statement and print the resulting rows.
    Query(QueryArgs),

    /// Parse and cross-reference-check the configuration file, optionally applying it.
    ValidateConfig(ValidateConfigArgs),
}

#[derive(Parser, Debug)]
pub struct QueryArgs {
    pub sql: String,

    /// The caller's identity; omit to run unauthenticated (always denied).
    #[arg(long)]
    pub user: Option<String>,

    /// Repeatable: a role granted to `--user`.
    #[arg(long = "role")]
    pub roles: Vec<String>,
}

#[derive(Parser, Debug)]
pub struct ValidateConfigArgs {
    /// Reconcile the repository's table graph to match the config after validating it.
    #[arg(long)]
    pub apply: bool,

    /// Required to let `--apply` perform a destructive diff (table deletions).
    #[arg(long)]
    pub confirm: bool,
}
