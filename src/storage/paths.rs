// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path constants and utilities for the gateway storage layout.
//!
//! Module and user identifiers are chosen by module operators and end-user
//! identity providers, so they are never used verbatim as path components.
//! Each identifier is replaced by the hex SHA-256 of its bytes, which keeps
//! every component at 64 characters regardless of the identifier's length.
//! Records carry their own identifiers, so listings never decode file names.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

/// Default base directory for persistent gateway storage.
pub const DATA_ROOT: &str = "./data";

/// Encode an arbitrary identifier into a filesystem-safe path component.
pub fn encode_id(id: &str) -> String {
    format!("{:x}", Sha256::digest(id.as_bytes()))
}

/// Storage path utilities.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DATA_ROOT)
    }
}

impl StoragePaths {
    /// Create a new StoragePaths with a custom root (useful for testing).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory for all gateway data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // ========== Module Paths ==========

    /// Directory containing one subdirectory per registered module.
    pub fn modules_dir(&self) -> PathBuf {
        self.root.join("modules")
    }

    /// Directory for a specific module.
    pub fn module_dir(&self, module_id: &str) -> PathBuf {
        self.modules_dir().join(encode_id(module_id))
    }

    /// Path to the module's active key hash.
    pub fn module_key(&self, module_id: &str) -> PathBuf {
        self.module_dir(module_id).join("key.json")
    }

    /// Directory holding the module's per-user data records.
    pub fn module_records_dir(&self, module_id: &str) -> PathBuf {
        self.module_dir(module_id).join("records")
    }

    /// Path to the record addressed by `(module_id, user_id)`.
    pub fn module_record(&self, module_id: &str, user_id: &str) -> PathBuf {
        self.module_records_dir(module_id)
            .join(format!("{}.json", encode_id(user_id)))
    }

    // ========== Audit Log Paths ==========

    /// Directory containing audit logs.
    pub fn audit_dir(&self) -> PathBuf {
        self.root.join("audit")
    }

    /// Directory for a specific date's audit logs.
    pub fn audit_date_dir(&self, date: &str) -> PathBuf {
        self.audit_dir().join(date)
    }

    /// Path to a daily audit events file (JSONL format).
    pub fn audit_events_file(&self, date: &str) -> PathBuf {
        self.audit_date_dir(date).join("events.jsonl")
    }
}
