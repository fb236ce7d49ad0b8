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

//! The authorization service (§4.3): role→table→capability, deny-by-default,
//! multi-table ALL-or-nothing.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::{self, Error};
use crate::model::capability::Capability;
use crate::model::user::User;

#[derive(Default)]
struct Grants {
    // role -> table -> capabilities
    by_role: HashMap<String, HashMap<String, HashSet<Capability>>>,
}

/// Process-wide singleton (§5, §9); reads are the hot path, grants/revokes
/// are rare and serialized behind the same lock.
#[derive(Default, Clone)]
pub struct AuthorizationService {
    grants: Arc<RwLock<Grants>>,
}

impl AuthorizationService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent: granting the same triple twice is a no-op.
    pub async fn grant(&self, role: &str, table: &str, capability: Capability) {
        let mut guard = self.grants.write().await;
        guard
            .by_role
            .entry(role.to_string())
            .or_default()
            .entry(table.to_string())
            .or_default()
            .insert(capability);
    }

    pub async fn revoke(&self, role: &str, table: &str, capability: Capability) {
        let mut guard = self.grants.write().await;
        if let Some(tables) = guard.by_role.get_mut(role) {
            if let Some(caps) = tables.get_mut(table) {
                caps.remove(&capability);
            }
        }
    }

    async fn role_has(&self, role: &str, table: &str, capability: Capability) -> bool {
        let guard = self.grants.read().await;
        guard
            .by_role
            .get(role)
            .and_then(|tables| tables.get(table))
            .is_some_and(|caps| caps.contains(&capability))
    }

    /// Deny-by-default at every missing edge. Multi-table: must succeed on
    /// *every* referenced table, or the whole request is rejected — the
    /// first unauthorized table names the failure (§4.3, §8).
    pub async fn authorize(
        &self,
        user: Option<&User>,
        tables: &[String],
        required: Capability,
    ) -> Result<(), Error> {
        let Some(user) = user else {
            return error::AuthFailedSnafu { reason: "no authenticated user".to_string() }.fail();
        };

        for table in tables {
            let mut allowed = false;
            for role in &user.roles {
                if self.role_has(role, table, required).await {
                    allowed = true;
                    break;
                }
            }
            if !allowed {
                return error::AccessDeniedSnafu {
                    table: table.clone(),
                    capability: required,
                    reason: "no role of this user grants the required capability".to_string(),
                }
                .fail();
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(roles: &[&str]) -> User {
        User {
            id: "u1".to_string(),
            name: "analyst".to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            token_expiry: None,
        }
    }

    #[tokio::test]
    async fn deny_by_default_for_empty_permissions() {
        let auth = AuthorizationService::new();
        let u = user(&["analyst"]);
        let err = auth
            .authorize(Some(&u), &["sales.orders".to_string()], Capability::Read)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AccessDenied { .. }));
    }

    #[tokio::test]
    async fn nil_user_is_denied() {
        let auth = AuthorizationService::new();
        let err = auth
            .authorize(None, &["sales.orders".to_string()], Capability::Read)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AuthFailed { .. }));
    }

    #[tokio::test]
    async fn grant_is_idempotent() {
        let auth = AuthorizationService::new();
        auth.grant("analyst", "sales.orders", Capability::Read).await;
        auth.grant("analyst", "sales.orders", Capability::Read).await;
        let u = user(&["analyst"]);
        auth.authorize(Some(&u), &["sales.orders".to_string()], Capability::Read)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn multi_table_requires_every_table_authorized() {
        let auth = AuthorizationService::new();
        auth.grant("analyst", "sales.orders", Capability::Read).await;
        let u = user(&["analyst"]);
        let err = auth
            .authorize(
                Some(&u),
                &["sales.orders".to_string(), "sales.customers".to_string()],
                Capability::Read,
            )
            .await
            .unwrap_err();
        match err {
            Error::AccessDenied { table, .. } => assert_eq!(table, "sales.customers"),
            other => panic!("expected AccessDenied, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn revoke_removes_single_pair() {
        let auth = AuthorizationService::new();
        auth.grant("analyst", "sales.orders", Capability::Read).await;
        auth.grant("analyst", "sales.orders", Capability::TimeTravel).await;
        auth.revoke("analyst", "sales.orders", Capability::Read).await;
        let u = user(&["analyst"]);
        assert!(auth
            .authorize(Some(&u), &["sales.orders".to_string()], Capability::Read)
            .await
            .is_err());
        assert!(auth
            .authorize(Some(&u), &["sales.orders".to_string()], Capability::TimeTravel)
            .await
            .is_ok());
    }
}
