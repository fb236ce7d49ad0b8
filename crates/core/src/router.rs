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

//! The engine router (§4.4): pick a single engine covering the required
//! capabilities, gated by availability and priority. No implicit default
//! engine — registration is always explicit (§9 Open Question c).

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::{self, Error};
use crate::model::capability::Capability;

#[derive(Debug, Clone)]
pub struct RegisteredEngine {
    pub name: String,
    pub capabilities: HashSet<Capability>,
    pub available: bool,
    pub priority: i32,
}

#[derive(Default, Clone)]
pub struct EngineRouter {
    engines: Arc<RwLock<Vec<RegisteredEngine>>>,
}

impl EngineRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, engine: RegisteredEngine) {
        let mut guard = self.engines.write().await;
        guard.retain(|e| e.name != engine.name);
        guard.push(engine);
    }

    pub async fn set_available(&self, name: &str, available: bool) {
        let mut guard = self.engines.write().await;
        if let Some(engine) = guard.iter_mut().find(|e| e.name == name) {
            engine.available = available;
        }
    }

    /// Among available engines whose capability set is a superset of
    /// `required`, return the highest-priority one; ties break
    /// lexicographically by name. An empty registry, or one whose entries
    /// are all unavailable, always fails.
    pub async fn select_engine(&self, required: &[Capability]) -> Result<String, Error> {
        let guard = self.engines.read().await;
        let required_set: HashSet<Capability> = required.iter().copied().collect();

        let mut candidates: Vec<&RegisteredEngine> = guard
            .iter()
            .filter(|e| e.available && required_set.is_subset(&e.capabilities))
            .collect();

        candidates.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.name.cmp(&b.name)));

        candidates
            .first()
            .map(|e| e.name.clone())
            .ok_or_else(|| Error::EngineUnavailable { required: required.to_vec() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(name: &str, caps: &[Capability], available: bool, priority: i32) -> RegisteredEngine {
        RegisteredEngine {
            name: name.to_string(),
            capabilities: caps.iter().copied().collect(),
            available,
            priority,
        }
    }

    #[tokio::test]
    async fn picks_highest_priority_superset() {
        let router = EngineRouter::new();
        router.register(engine("trino", &[Capability::Read, Capability::TimeTravel], true, 1)).await;
        router.register(engine("duckdb", &[Capability::Read, Capability::TimeTravel], true, 5)).await;
        let chosen = router.select_engine(&[Capability::Read]).await.unwrap();
        assert_eq!(chosen, "duckdb");
    }

    #[tokio::test]
    async fn ties_break_lexicographically() {
        let router = EngineRouter::new();
        router.register(engine("spark", &[Capability::Read], true, 3)).await;
        router.register(engine("duckdb", &[Capability::Read], true, 3)).await;
        let chosen = router.select_engine(&[Capability::Read]).await.unwrap();
        assert_eq!(chosen, "duckdb");
    }

    #[tokio::test]
    async fn empty_registry_fails() {
        let router = EngineRouter::new();
        assert!(matches!(
            router.select_engine(&[Capability::Read]).await,
            Err(Error::EngineUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn all_unavailable_fails() {
        let router = EngineRouter::new();
        router.register(engine("trino", &[Capability::Read], false, 1)).await;
        assert!(matches!(
            router.select_engine(&[Capability::Read]).await,
            Err(Error::EngineUnavailable { .. })
        ));
    }
}
