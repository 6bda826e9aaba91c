// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Module Integration Gateway
//!
//! Server-side half of the module boundary:
//!
//! - `key_verifier` - module secret hashing, verification and rotation
//! - `visibility` - visibility tiers and the read decision table
//! - `data_store` - validated upsert and visibility-filtered listing
//!
//! Writes are only reachable after [`KeyVerifier::verify`] succeeds; there is
//! no end-user write path.

pub mod data_store;
pub mod key_verifier;
pub mod visibility;

pub use data_store::{ListFilter, ModuleDataStore};
pub use key_verifier::{hash_module_secret, mint_module_secret, rotate_module_key, KeyVerifier};
pub use visibility::{is_readable, ReadAccess, Visibility};

use crate::storage::StorageError;

/// Errors raised by gateway operations.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Malformed input.
    #[error("validation failed: {0}")]
    Validation(String),
    /// The backing store failed; surfaced as-is, never retried here.
    #[error("storage unavailable: {0}")]
    Infrastructure(#[from] StorageError),
}
