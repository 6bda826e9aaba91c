// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer credential to end-user identity.
//!
//! Verification belongs to the identity provider: this resolver only shapes
//! the call (header parsing, JWKS key selection, issuer/audience checks) and
//! turns the outcome into an optional [`AuthenticatedUser`].
//!
//! ## Modes
//!
//! - **JWKS configured**: full signature, expiry, issuer and audience checks.
//! - **No JWKS**: bearer tokens are refused with
//!   [`AuthError::IdentityProviderNotConfigured`]. Builds with the `dev`
//!   feature (and unit tests) instead decode without checking the signature.

use std::sync::Arc;

use axum::http::HeaderValue;
use jsonwebtoken::{decode, decode_header, errors::ErrorKind, Validation};

use super::{claims::IdentityClaims, AuthError, AuthenticatedUser, JwksManager};

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Identity provider settings.
#[derive(Clone, Default)]
pub struct IdentityConfig {
    /// JWKS manager for key fetching
    pub jwks: Option<Arc<JwksManager>>,
    /// Expected issuer
    pub issuer: Option<String>,
    /// Expected audience
    pub audience: Option<String>,
}

impl IdentityConfig {
    pub fn new(jwks_url: impl Into<String>) -> Self {
        Self {
            jwks: Some(Arc::new(JwksManager::new(jwks_url))),
            issuer: None,
            audience: None,
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }
}

/// Resolves bearer credentials into end-user identities.
#[derive(Clone, Default)]
pub struct IdentityResolver {
    config: IdentityConfig,
}

impl IdentityResolver {
    pub fn new(config: IdentityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IdentityConfig {
        &self.config
    }

    /// Resolve an optional `Authorization` header.
    ///
    /// No header is `Ok(None)`. A header that is present but unusable is an
    /// error, never an anonymous identity.
    pub async fn resolve_header(
        &self,
        header: Option<&HeaderValue>,
    ) -> Result<Option<AuthenticatedUser>, AuthError> {
        let Some(header) = header else {
            return Ok(None);
        };

        let token = header
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader)?
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::InvalidAuthHeader)?;

        self.resolve(token).await.map(Some)
    }

    /// Verify a raw bearer token.
    pub async fn resolve(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        match &self.config.jwks {
            Some(jwks) => self.verify_with_jwks(token, jwks).await,
            None => verify_without_provider(token),
        }
    }

    async fn verify_with_jwks(
        &self,
        token: &str,
        jwks: &JwksManager,
    ) -> Result<AuthenticatedUser, AuthError> {
        let header = decode_header(token).map_err(|_| AuthError::MalformedToken)?;

        let (decoding_key, algorithm) = match &header.kid {
            Some(kid) => jwks.get_decoding_key(kid).await?,
            None => jwks.get_any_decoding_key().await?,
        };

        let mut validation = Validation::new(algorithm);
        validation.leeway = CLOCK_SKEW_LEEWAY;
        if let Some(issuer) = &self.config.issuer {
            validation.set_issuer(&[issuer]);
        }
        match &self.config.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        let token_data =
            decode::<IdentityClaims>(token, &decoding_key, &validation).map_err(|e| {
                match e.kind() {
                    ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                    ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                    ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
                    ErrorKind::InvalidAudience => AuthError::InvalidAudience,
                    ErrorKind::ImmatureSignature => AuthError::TokenNotYetValid,
                    _ => AuthError::MalformedToken,
                }
            })?;

        Ok(AuthenticatedUser::from_claims(token_data.claims))
    }
}

#[cfg(not(any(test, feature = "dev")))]
fn verify_without_provider(_token: &str) -> Result<AuthenticatedUser, AuthError> {
    Err(AuthError::IdentityProviderNotConfigured)
}

/// Development decoding: structure and expiry only, no signature check.
#[cfg(any(test, feature = "dev"))]
fn verify_without_provider(token: &str) -> Result<AuthenticatedUser, AuthError> {
    let token_data = jsonwebtoken::dangerous::insecure_decode::<IdentityClaims>(token)
        .map_err(|_| AuthError::MalformedToken)?;
    let claims = token_data.claims;

    let now = chrono::Utc::now().timestamp();
    if claims.exp > 0 && claims.exp < now - CLOCK_SKEW_LEEWAY as i64 {
        return Err(AuthError::TokenExpired);
    }

    Ok(AuthenticatedUser::from_claims(claims))
}

/// Unsigned JWT for exercising the development decoder in tests.
#[cfg(test)]
pub(crate) fn unsigned_test_token(user_id: &str, exp: i64) -> String {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

    let header = r#"{"alg":"RS256","typ":"JWT"}"#;
    let claims = format!(
        r#"{{"sub":"{user_id}","iat":1609459200,"exp":{exp},"iss":"test","sid":"sess_123"}}"#
    );
    format!(
        "{}.{}.fake_signature",
        URL_SAFE_NO_PAD.encode(header.as_bytes()),
        URL_SAFE_NO_PAD.encode(claims.as_bytes())
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bearer(token: &str) -> HeaderValue {
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap()
    }

    #[tokio::test]
    async fn no_header_is_anonymous() {
        let resolver = IdentityResolver::default();
        assert_eq!(resolver.resolve_header(None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn resolves_subject_from_token() {
        let resolver = IdentityResolver::default();
        let header = bearer(&unsigned_test_token("user_123", 9999999999));
        let user = resolver.resolve_header(Some(&header)).await.unwrap().unwrap();
        assert_eq!(user.user_id, "user_123");
        assert_eq!(user.session_id.as_deref(), Some("sess_123"));
    }

    #[tokio::test]
    async fn non_bearer_header_is_rejected() {
        let resolver = IdentityResolver::default();
        for raw in ["Basic abc", "Bearer ", "bearer abc"] {
            let header = HeaderValue::from_static(raw);
            let result = resolver.resolve_header(Some(&header)).await;
            assert!(matches!(result, Err(AuthError::InvalidAuthHeader)), "{raw}");
        }
    }

    #[tokio::test]
    async fn garbage_token_is_malformed() {
        let resolver = IdentityResolver::default();
        let result = resolver.resolve_header(Some(&bearer("not.a.jwt"))).await;
        assert!(matches!(result, Err(AuthError::MalformedToken)));
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let resolver = IdentityResolver::default();
        let header = bearer(&unsigned_test_token("user_123", 1_000_000));
        let result = resolver.resolve_header(Some(&header)).await;
        assert!(matches!(result, Err(AuthError::TokenExpired)));
    }

    #[test]
    fn config_builder_sets_fields() {
        let config = IdentityConfig::new("https://id.example.com/.well-known/jwks.json")
            .with_issuer("https://id.example.com")
            .with_audience("portal");
        assert!(config.jwks.is_some());
        assert_eq!(config.issuer.as_deref(), Some("https://id.example.com"));
        assert_eq!(config.audience.as_deref(), Some("portal"));
    }
}
