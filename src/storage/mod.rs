// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Durable storage behind the module data store and the module key table.
//!
//! ## Storage Layout
//!
//! ```text
//! {DATA_DIR}/
//!   modules/{module}/
//!     key.json            # Active key hash (one per module)
//!     records/
//!       {user}.json       # One record per (module, user)
//!   audit/
//!     {date}/events.jsonl # Daily audit logs
//! ```
//!
//! `{module}` and `{user}` are URL-safe base64 encodings of the identifiers.

pub mod audit;
pub mod fs;
pub mod paths;
pub mod repository;

pub use audit::{AuditEvent, AuditEventType, AuditRepository};
pub use fs::{FileStorage, StorageError, StorageResult};
pub use paths::StoragePaths;
pub use repository::{
    ModuleDataRepository, ModuleKeyRepository, StoredModuleKey, StoredModuleRecord,
};
