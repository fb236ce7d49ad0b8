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

//! The metadata repository contract (§6) — the sole authority over the
//! virtual-table graph. `InMemoryRepository` is the test-harness shadow
//! registry §5 allows; it must never back a production path.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{self, Error};
use crate::model::virtual_table::VirtualTable;

#[async_trait]
pub trait MetadataRepository: Send + Sync {
    async fn create(&self, table: VirtualTable) -> Result<(), Error>;
    async fn get(&self, name: &str) -> Result<VirtualTable, Error>;
    async fn update(&self, table: VirtualTable) -> Result<(), Error>;
    async fn delete(&self, name: &str) -> Result<(), Error>;
    async fn list(&self) -> Result<Vec<VirtualTable>, Error>;
    async fn exists(&self, name: &str) -> Result<bool, Error>;
    async fn check_connectivity(&self) -> Result<(), Error>;
}

#[derive(Default)]
pub struct InMemoryRepository {
    tables: RwLock<HashMap<String, VirtualTable>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl MetadataRepository for InMemoryRepository {
    async fn create(&self, table: VirtualTable) -> Result<(), Error> {
        table.validate()?;
        let mut guard = self.tables.write().await;
        if guard.contains_key(&table.name) {
            return error::TableAlreadyExistsSnafu { table: table.name.clone() }.fail();
        }
        guard.insert(table.name.clone(), table);
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<VirtualTable, Error> {
        let guard = self.tables.read().await;
        guard
            .get(name)
            .cloned()
            .ok_or_else(|| error::Error::TableNotFound { table: name.to_string() })
    }

    async fn update(&self, table: VirtualTable) -> Result<(), Error> {
        table.validate()?;
        let mut guard = self.tables.write().await;
        if !guard.contains_key(&table.name) {
            return error::TableNotFoundSnafu { table: table.name.clone() }.fail();
        }
        guard.insert(table.name.clone(), table);
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), Error> {
        let mut guard = self.tables.write().await;
        if guard.remove(name).is_none() {
            return error::TableNotFoundSnafu { table: name.to_string() }.fail();
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<VirtualTable>, Error> {
        let guard = self.tables.read().await;
        Ok(guard.values().cloned().collect())
    }

    async fn exists(&self, name: &str) -> Result<bool, Error> {
        let guard = self.tables.read().await;
        Ok(guard.contains_key(name))
    }

    async fn check_connectivity(&self) -> Result<(), Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::model::capability::Capability;
    use crate::model::virtual_table::{Format, PhysicalSource};

    fn table(name: &str) -> VirtualTable {
        VirtualTable::new(
            name,
            "",
            vec![PhysicalSource { format: Format::Parquet, location: "s3://x".into(), engine: None }],
            HashSet::from([Capability::Read]),
            HashSet::new(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn create_rejects_duplicate_name() {
        let repo = InMemoryRepository::new();
        repo.create(table("a.b")).await.unwrap();
        let err = repo.create(table("a.b")).await.unwrap_err();
        assert!(matches!(err, Error::TableAlreadyExists { .. }));
    }

    #[tokio::test]
    async fn update_and_delete_fail_on_missing() {
        let repo = InMemoryRepository::new();
        assert!(matches!(repo.update(table("a.b")).await, Err(Error::TableNotFound { .. })));
        assert!(matches!(repo.delete("a.b").await, Err(Error::TableNotFound { .. })));
    }

    #[tokio::test]
    async fn get_returns_table_not_found() {
        let repo = InMemoryRepository::new();
        assert!(matches!(repo.get("a.b").await, Err(Error::TableNotFound { .. })));
    }
}
