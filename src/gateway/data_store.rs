// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Validated, visibility-scoped access to module data records.

use chrono::Utc;
use serde_json::Value;

use super::{GatewayError, ReadAccess, Visibility};
use crate::storage::{FileStorage, ModuleDataRepository, StoredModuleRecord};

/// Read-side filter and caller context.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListFilter<'a> {
    /// Only return the record owned by this user.
    pub user_id: Option<&'a str>,
    /// The caller presented a valid key for the module being read.
    pub module_authorized: bool,
    /// Signed-in end user making the request, if any.
    pub viewer_id: Option<&'a str>,
}

/// Module data store over file storage.
pub struct ModuleDataStore<'a> {
    records: ModuleDataRepository<'a>,
}

impl<'a> ModuleDataStore<'a> {
    pub fn new(storage: &'a FileStorage) -> Self {
        Self {
            records: ModuleDataRepository::new(storage),
        }
    }

    /// Insert or replace the record for `(module_id, user_id)`.
    ///
    /// Callers must already have verified the module key.
    pub fn upsert(
        &self,
        module_id: &str,
        user_id: &str,
        visibility: Option<&str>,
        payload: Value,
    ) -> Result<StoredModuleRecord, GatewayError> {
        require_id("moduleId", module_id)?;
        require_id("userId", user_id)?;
        if payload.is_null() {
            return Err(GatewayError::Validation("payload is required".to_string()));
        }

        let record = StoredModuleRecord {
            module_id: module_id.to_string(),
            user_id: user_id.to_string(),
            visibility: Visibility::coerce(visibility),
            payload,
            updated_at: Utc::now(),
        };
        self.records.upsert(&record)?;

        tracing::debug!(
            module_id,
            user_id,
            visibility = %record.visibility,
            "Module record written"
        );
        Ok(record)
    }

    /// List the module's records readable under `filter`, ordered by user id.
    pub fn list(
        &self,
        module_id: &str,
        filter: &ListFilter<'_>,
    ) -> Result<Vec<StoredModuleRecord>, GatewayError> {
        require_id("moduleId", module_id)?;
        if let Some(user_id) = filter.user_id {
            require_id("userId", user_id)?;
        }

        let access = ReadAccess::new(filter.module_authorized, filter.viewer_id);
        let mut records: Vec<_> = self
            .records
            .list_by_module(module_id)?
            .into_iter()
            .filter(|r| filter.user_id.map_or(true, |u| r.user_id == u))
            .filter(|r| access.can_read(r.visibility, &r.user_id))
            .collect();
        records.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(records)
    }
}

fn require_id(field: &str, value: &str) -> Result<(), GatewayError> {
    if value.trim().is_empty() {
        Err(GatewayError::Validation(format!("{field} is required")))
    } else {
        Ok(())
    }
}
