// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWT claims and authenticated user representation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Claims read from an identity provider session token.
///
/// Only `sub` is required; the rest are validated by `jsonwebtoken` or kept
/// for logging.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Expiration timestamp
    #[serde(default)]
    pub exp: i64,
    /// Issuer
    #[serde(default)]
    pub iss: String,
    /// Session ID
    #[serde(default)]
    pub sid: Option<String>,
}

/// End user resolved from a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// Canonical user ID (`sub` claim)
    pub user_id: String,

    /// Session ID (if available)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    #[serde(skip)]
    pub issuer: String,

    /// Unix timestamp
    #[serde(skip)]
    pub expires_at: i64,
}

impl AuthenticatedUser {
    pub fn from_claims(claims: IdentityClaims) -> Self {
        Self {
            user_id: claims.sub,
            session_id: claims.sid,
            issuer: claims.iss,
            expires_at: claims.exp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_claims_extracts_subject_and_session() {
        let claims: IdentityClaims = serde_json::from_str(
            r#"{"sub":"user_123","exp":1700003600,"iss":"https://id.example.com","sid":"sess_abc","iat":1}"#,
        )
        .unwrap();
        let user = AuthenticatedUser::from_claims(claims);
        assert_eq!(user.user_id, "user_123");
        assert_eq!(user.session_id.as_deref(), Some("sess_abc"));
        assert_eq!(user.issuer, "https://id.example.com");
        assert_eq!(user.expires_at, 1700003600);
    }

    #[test]
    fn optional_claims_default() {
        let claims: IdentityClaims = serde_json::from_str(r#"{"sub":"u"}"#).unwrap();
        let user = AuthenticatedUser::from_claims(claims);
        assert_eq!(user.session_id, None);
        assert_eq!(user.expires_at, 0);
    }
}
