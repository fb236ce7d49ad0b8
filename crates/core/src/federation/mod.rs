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

//! Cross-engine query federation (§4.7-§4.10): analyze a resolved query for
//! cross-engine span, push predicates/aggregations/limits down where the
//! target engine supports them, decompose into one sub-query per engine plus
//! a left-deep join plan, and execute it.

pub mod analyzer;
pub mod decomposer;
pub mod executor;
pub mod pushdown;

pub use analyzer::analyze;
pub use decomposer::decompose;
pub use executor::{ExecutorError, FederationExecutor};
pub use pushdown::optimize as optimize_pushdown;
