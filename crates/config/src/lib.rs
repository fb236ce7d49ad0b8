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

//! Canonica's configuration layer (§6 "Configuration file"): YAML schema,
//! key-validated loading, cross-reference validation, and the
//! `Validate`-then-`Apply` reconciliation the composition root drives.

pub mod apply;
pub mod error;
pub mod loader;
pub mod schema;
pub mod token;
pub mod validate;

pub use apply::{apply, plan_diff, ApplyReport, Diff};
pub use error::ConfigError;
pub use loader::load;
pub use schema::CanonicaConfig;
pub use validate::{validate, Validated};
