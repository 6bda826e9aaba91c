// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Two independent credentials reach the gateway:
//!
//! - **Module key** (`X-Module-Key` header on reads, `moduleKey` field on
//!   writes) - a shared secret checked by [`crate::gateway::KeyVerifier`].
//! - **Bearer token** (`Authorization: Bearer <jwt>`) - an end-user session
//!   issued by the identity provider. The gateway never issues tokens; it
//!   only verifies them against the provider's JWKS and reads `sub`.
//!
//! ## Security
//!
//! - A credential that is present but invalid is rejected with 401. It is
//!   never downgraded to an anonymous request.
//! - JWKS is fetched over HTTPS and cached with a TTL.
//! - Clock skew tolerance is 60 seconds.

pub mod claims;
pub mod error;
pub mod extractor;
pub mod identity;
pub mod jwks;

pub use claims::AuthenticatedUser;
pub use error::AuthError;
pub use extractor::{ModuleKeyHeader, Viewer, MODULE_KEY_HEADER};
pub use identity::{IdentityConfig, IdentityResolver};
pub use jwks::JwksManager;
