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

//! The join engine (§4.10): hash join, nested-loop join, and the strategy
//! selector that picks between them.

pub mod hash;
pub mod nested_loop;
pub mod strategy;

pub use hash::{HashJoin, HashTable};
pub use nested_loop::NestedLoopJoin;
pub use strategy::{select as select_strategy, JoinConfig};
