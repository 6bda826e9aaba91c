// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Module key verification.
//!
//! Module secrets are minted out-of-band and only their SHA-256 digest is
//! stored. An unknown module and a wrong secret produce the same `false`, so
//! a caller cannot learn which module ids exist.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::storage::{
    AuditEvent, AuditEventType, AuditRepository, FileStorage, ModuleKeyRepository,
    StorageResult, StoredModuleKey,
};

/// Lowercase hex SHA-256 of a module secret.
pub fn hash_module_secret(secret: &str) -> String {
    format!("{:x}", Sha256::digest(secret.as_bytes()))
}

/// Generate a fresh module secret for operator tooling.
pub fn mint_module_secret() -> String {
    format!(
        "mk_{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}

/// Replace a module's active key with the hash of `secret`.
pub fn rotate_module_key(
    storage: &FileStorage,
    module_id: &str,
    secret: &str,
) -> StorageResult<StoredModuleKey> {
    let key = ModuleKeyRepository::new(storage).put(module_id, hash_module_secret(secret))?;
    AuditRepository::new(storage)
        .record(AuditEvent::new(AuditEventType::ModuleKeyRotated).with_module(module_id));
    Ok(key)
}

/// Checks module secrets against stored hashes.
pub struct KeyVerifier<'a> {
    keys: ModuleKeyRepository<'a>,
}

impl<'a> KeyVerifier<'a> {
    pub fn new(storage: &'a FileStorage) -> Self {
        Self {
            keys: ModuleKeyRepository::new(storage),
        }
    }

    /// `true` iff `module_id` has a stored hash equal to SHA-256(`candidate`).
    ///
    /// Lookup failures fail closed.
    pub fn verify(&self, module_id: &str, candidate: &str) -> bool {
        let stored = match self.keys.get(module_id) {
            Ok(Some(key)) => key,
            Ok(None) => {
                debug!(module_id, "No key registered for module");
                return false;
            }
            Err(e) => {
                warn!(module_id, error = %e, "Module key lookup failed");
                return false;
            }
        };

        let candidate_hash = hash_module_secret(candidate);
        stored
            .key_hash
            .as_bytes()
            .ct_eq(candidate_hash.as_bytes())
            .into()
    }
}
