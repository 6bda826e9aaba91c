// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Module data record repository.
//!
//! One JSON document per `(module_id, user_id)` under
//! `modules/{module}/records/{user}.json`. The path is the primary key, so a
//! second write for the same pair replaces the first instead of adding a row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::{FileStorage, StorageError, StorageResult};
use crate::gateway::Visibility;

/// A module's data record for one user.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredModuleRecord {
    /// Module that owns the record
    pub module_id: String,
    /// User the record belongs to
    pub user_id: String,
    /// Visibility tier governing non-module reads
    pub visibility: Visibility,
    /// Opaque module-defined JSON
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
    /// Last write time
    pub updated_at: DateTime<Utc>,
}

/// Repository for module data records.
pub struct ModuleDataRepository<'a> {
    storage: &'a FileStorage,
}

impl<'a> ModuleDataRepository<'a> {
    pub fn new(storage: &'a FileStorage) -> Self {
        Self { storage }
    }

    /// Get the record for `(module_id, user_id)`, if any.
    pub fn get(&self, module_id: &str, user_id: &str) -> StorageResult<Option<StoredModuleRecord>> {
        self.storage
            .read_json_optional(self.storage.paths().module_record(module_id, user_id))
    }

    /// Insert or replace the record addressed by its `(module_id, user_id)`.
    pub fn upsert(&self, record: &StoredModuleRecord) -> StorageResult<()> {
        self.storage.write_json(
            self.storage
                .paths()
                .module_record(&record.module_id, &record.user_id),
            record,
        )
    }

    /// List every record stored for a module, in no particular order.
    pub fn list_by_module(&self, module_id: &str) -> StorageResult<Vec<StoredModuleRecord>> {
        let dir = self.storage.paths().module_records_dir(module_id);
        let stems = self.storage.list_files(&dir, "json")?;

        let mut records = Vec::with_capacity(stems.len());
        for stem in stems {
            match self.storage.read_json(dir.join(format!("{stem}.json"))) {
                Ok(record) => records.push(record),
                // Listed then replaced or removed underneath us.
                Err(StorageError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(records)
    }
}
