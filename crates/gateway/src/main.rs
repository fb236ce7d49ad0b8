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

//! `canonica`: the composition-root binary standing in for the out-of-scope
//! HTTP transport (§1). Wires `crates/config` and `crates/core` together and
//! exposes `explain`/`query`/`validate-config` as CLI subcommands.

mod adapter;
mod bootstrap;
mod cli;
mod error;

use std::fs;

use canonica_core::model::user::User;
use canonica_core::model::stream::drain;
use clap::Parser;
use error::{Error, ReadConfigSnafu};
use snafu::ResultExt;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: u8) {
    let default_directive = if verbose >= 2 { "debug" } else if verbose == 1 { "info" } else { "warn" };
    let filter = EnvFilter::try_from_env("CANONICA_LOG").unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn read_config(path: &std::path::Path) -> Result<canonica_config::CanonicaConfig, Error> {
    let yaml = fs::read_to_string(path).context(ReadConfigSnafu { path: path.display().to_string() })?;
    Ok(canonica_config::load(&yaml)?)
}

fn user_from_args(user: Option<String>, roles: Vec<String>) -> Option<User> {
    user.map(|id| User { id: id.clone(), name: id, roles, token_expiry: None })
}

#[tokio::main]
async fn main() {
    let args = cli::Args::parse();
    init_tracing(args.verbose);

    if let Err(e) = run(args).await {
        tracing::error!(error = %e, "command failed");
        eprintln!("{e}");
        std::process::exit(e.exit_code());
    }
}

async fn run(args: cli::Args) -> Result<(), Error> {
    match args.command {
        cli::Command::Explain(query_args) => {
            let config = read_config(&args.config)?;
            let bootstrapped = bootstrap::bootstrap(&config).await?;
            let user = user_from_args(query_args.user, query_args.roles);
            let record = bootstrapped.engine.explain(user.as_ref(), &query_args.sql).await?;
            println!("{record:#?}");
            Ok(())
        }
        cli::Command::Query(query_args) => {
            let config = read_config(&args.config)?;
            let bootstrapped = bootstrap::bootstrap(&config).await?;
            let user = user_from_args(query_args.user, query_args.roles);
            let ctx = CancellationToken::new();
            let mut stream = bootstrapped.engine.query(&ctx, user.as_ref(), &query_args.sql).await?;
            let rows = drain(stream.as_mut(), &ctx).await.map_err(|e| canonica_core::error::Error::PlannerError { detail: e.to_string() })?;
            for row in rows {
                println!("{row:?}");
            }
            Ok(())
        }
        cli::Command::ValidateConfig(validate_args) => {
            let config = read_config(&args.config)?;
            let validated = canonica_config::Validated::new(config)?;
            println!("configuration is valid");

            if validate_args.apply {
                let repository = canonica_core::repository::InMemoryRepository::shared();
                let diff = canonica_config::plan_diff(repository.as_ref(), &validated).await?;
                let report = canonica_config::apply(repository.as_ref(), diff, validate_args.confirm).await?;
                println!(
                    "applied: {} created, {} updated, {} deleted",
                    report.created.len(),
                    report.updated.len(),
                    report.deleted.len()
                );
            }
            Ok(())
        }
    }
}
