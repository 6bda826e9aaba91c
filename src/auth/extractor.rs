// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for the optional read-path credentials.
//!
//! ```rust,ignore
//! async fn handler(
//!     Viewer(viewer): Viewer,
//!     ModuleKeyHeader(module_key): ModuleKeyHeader,
//! ) -> impl IntoResponse {
//!     // viewer: Option<AuthenticatedUser>, module_key: Option<String>
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use super::{AuthError, AuthenticatedUser};
use crate::state::AppState;

/// Header carrying a module secret on read requests.
pub const MODULE_KEY_HEADER: &str = "x-module-key";

/// Optional end-user identity from `Authorization: Bearer <jwt>`.
///
/// Absent header yields `Viewer(None)`; a present but invalid token rejects
/// the request.
pub struct Viewer(pub Option<AuthenticatedUser>);

impl FromRequestParts<AppState> for Viewer {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = state
            .identity
            .resolve_header(parts.headers.get(AUTHORIZATION))
            .await?;
        Ok(Viewer(user))
    }
}

/// Optional module secret from the `X-Module-Key` header.
pub struct ModuleKeyHeader(pub Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for ModuleKeyHeader {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.headers.get(MODULE_KEY_HEADER) {
            None => Ok(ModuleKeyHeader(None)),
            Some(value) => {
                let key = value.to_str().map_err(|_| AuthError::InvalidModuleKey)?;
                Ok(ModuleKeyHeader(Some(key.to_string())))
            }
        }
    }
}
