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

//! `User`/`Role`/`Token`/`Permission` (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::capability::Capability;

pub type Role = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub roles: Vec<Role>,
    pub token_expiry: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.token_expiry.is_some_and(|expiry| now >= expiry)
    }
}

/// A bearer token resolving to a `User`; validated by the (out-of-scope)
/// transport layer and handed to the authorization service already resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub raw: String,
    pub user: User,
}

/// The triple `(role, qualified-table, capability)` the authorization
/// service's grant map is built from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    pub role: Role,
    pub table: String,
    pub capability: Capability,
}
