// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Module key repository.
//!
//! Holds exactly one active key hash per module at
//! `modules/{module}/key.json`. Rotation overwrites the document; there is
//! no key history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::super::{FileStorage, StorageResult};

/// A module's active key hash.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredModuleKey {
    /// Module identifier
    pub module_id: String,
    /// Lowercase hex SHA-256 of the module secret
    pub key_hash: String,
    /// When this hash became active
    pub created_at: DateTime<Utc>,
}

/// Repository for module key hashes.
pub struct ModuleKeyRepository<'a> {
    storage: &'a FileStorage,
}

impl<'a> ModuleKeyRepository<'a> {
    pub fn new(storage: &'a FileStorage) -> Self {
        Self { storage }
    }

    /// Look up the active key for a module. `None` if the module is unknown.
    pub fn get(&self, module_id: &str) -> StorageResult<Option<StoredModuleKey>> {
        self.storage
            .read_json_optional(self.storage.paths().module_key(module_id))
    }

    /// Install `key_hash` as the module's only active hash.
    pub fn put(&self, module_id: &str, key_hash: impl Into<String>) -> StorageResult<StoredModuleKey> {
        let key = StoredModuleKey {
            module_id: module_id.to_string(),
            key_hash: key_hash.into(),
            created_at: Utc::now(),
        };
        self.storage
            .write_json(self.storage.paths().module_key(module_id), &key)?;
        Ok(key)
    }
}
