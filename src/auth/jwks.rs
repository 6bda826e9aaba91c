// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity provider JWKS fetching and caching.
//!
//! - Keys are cached for a TTL (default 5 minutes).
//! - If a refresh fails while a stale set is cached, the stale set is served
//!   and the failure is logged.
//! - A token whose `kid` is not in the cached set triggers one forced refresh
//!   before giving up, so provider key rotation does not wait out the TTL.
//!   Forced refreshes are rate limited: none happens while the cached set is
//!   younger than the cooldown or within the cooldown of the previous one.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, JwkSet, KeyAlgorithm};
use jsonwebtoken::{Algorithm, DecodingKey};
use tokio::sync::RwLock;

use super::error::AuthError;

const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_REFRESH_COOLDOWN: Duration = Duration::from_secs(30);

struct CacheEntry {
    jwks: JwkSet,
    fetched_at: Instant,
}

/// Fetches and caches the identity provider's signing keys.
#[derive(Clone)]
pub struct JwksManager {
    jwks_url: String,
    cache_ttl: Duration,
    cache: Arc<RwLock<Option<CacheEntry>>>,
    refresh_cooldown: Duration,
    last_forced_refresh: Arc<Mutex<Option<Instant>>>,
    client: reqwest::Client,
}

impl JwksManager {
    /// Create a manager for the given JWKS endpoint
    /// (e.g. `https://id.example.com/.well-known/jwks.json`).
    pub fn new(jwks_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            jwks_url: jwks_url.into(),
            cache_ttl: DEFAULT_CACHE_TTL,
            cache: Arc::new(RwLock::new(None)),
            refresh_cooldown: DEFAULT_REFRESH_COOLDOWN,
            last_forced_refresh: Arc::new(Mutex::new(None)),
            client,
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Minimum spacing between refreshes forced by unknown key ids.
    pub fn with_refresh_cooldown(mut self, cooldown: Duration) -> Self {
        self.refresh_cooldown = cooldown;
        self
    }

    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    /// Cached key set, refreshed when older than the TTL.
    async fn get_jwks(&self) -> Result<JwkSet, AuthError> {
        let stale = {
            let cache = self.cache.read().await;
            match &*cache {
                Some(entry) if entry.fetched_at.elapsed() < self.cache_ttl => {
                    return Ok(entry.jwks.clone());
                }
                Some(entry) => Some(entry.jwks.clone()),
                None => None,
            }
        };

        match self.refresh().await {
            Ok(jwks) => Ok(jwks),
            Err(e) => match stale {
                Some(jwks) => {
                    tracing::warn!(error = %e, jwks_url = %self.jwks_url, "JWKS refresh failed, serving stale keys");
                    Ok(jwks)
                }
                None => Err(e),
            },
        }
    }

    async fn fetch_jwks(&self) -> Result<JwkSet, AuthError> {
        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| AuthError::JwksFetchError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::JwksFetchError(format!(
                "HTTP {} from JWKS endpoint",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::JwksFetchError(e.to_string()))
    }

    /// Force a fetch and replace the cache.
    pub async fn refresh(&self) -> Result<JwkSet, AuthError> {
        let jwks = self.fetch_jwks().await?;
        *self.cache.write().await = Some(CacheEntry {
            jwks: jwks.clone(),
            fetched_at: Instant::now(),
        });
        Ok(jwks)
    }

    /// Decoding key for `kid`, refreshing once if the id is unknown.
    pub async fn get_decoding_key(&self, kid: &str) -> Result<(DecodingKey, Algorithm), AuthError> {
        let find = |jwks: &JwkSet| {
            jwks.keys
                .iter()
                .find(|k| k.common.key_id.as_deref() == Some(kid))
                .map(jwk_to_decoding_key)
        };

        if let Some(found) = find(&self.get_jwks().await?) {
            return found;
        }

        if !self.claim_forced_refresh().await {
            tracing::debug!(kid, "Unknown key id, JWKS refresh on cooldown");
            return Err(AuthError::NoMatchingKey);
        }

        tracing::debug!(kid, "Unknown key id, refreshing JWKS");
        find(&self.refresh().await?).unwrap_or(Err(AuthError::NoMatchingKey))
    }

    async fn claim_forced_refresh(&self) -> bool {
        let recently_fetched = self
            .cache
            .read()
            .await
            .as_ref()
            .is_some_and(|entry| entry.fetched_at.elapsed() < self.refresh_cooldown);
        if recently_fetched {
            return false;
        }

        let mut last = self
            .last_forced_refresh
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if last.is_some_and(|at| at.elapsed() < self.refresh_cooldown) {
            return false;
        }
        *last = Some(Instant::now());
        true
    }

    /// First usable key, for tokens without a `kid`.
    pub async fn get_any_decoding_key(&self) -> Result<(DecodingKey, Algorithm), AuthError> {
        self.get_jwks()
            .await?
            .keys
            .iter()
            .find_map(|jwk| jwk_to_decoding_key(jwk).ok())
            .ok_or(AuthError::NoMatchingKey)
    }

    /// Whether a fresh key set is cached.
    pub async fn is_cached(&self) -> bool {
        self.cache
            .read()
            .await
            .as_ref()
            .is_some_and(|entry| entry.fetched_at.elapsed() < self.cache_ttl)
    }
}

fn jwk_to_decoding_key(jwk: &Jwk) -> Result<(DecodingKey, Algorithm), AuthError> {
    match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => {
            let key = DecodingKey::from_rsa_components(&rsa.n, &rsa.e)
                .map_err(|e| AuthError::InternalError(format!("Failed to create RSA key: {e}")))?;
            let alg = match jwk.common.key_algorithm {
                Some(KeyAlgorithm::RS384) => Algorithm::RS384,
                Some(KeyAlgorithm::RS512) => Algorithm::RS512,
                Some(KeyAlgorithm::PS256) => Algorithm::PS256,
                _ => Algorithm::RS256,
            };
            Ok((key, alg))
        }
        AlgorithmParameters::EllipticCurve(ec) => {
            let key = DecodingKey::from_ec_components(&ec.x, &ec.y)
                .map_err(|e| AuthError::InternalError(format!("Failed to create EC key: {e}")))?;
            let alg = match jwk.common.key_algorithm {
                Some(KeyAlgorithm::ES384) => Algorithm::ES384,
                _ => Algorithm::ES256,
            };
            Ok((key, alg))
        }
        _ => Err(AuthError::InternalError(
            "Unsupported key type in JWKS".to_string(),
        )),
    }
}
