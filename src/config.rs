// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read from the environment once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Root directory for module keys, records and audit logs | `./data` |
//! | `IDENTITY_JWKS_URL` | Identity provider JWKS endpoint | Required to accept bearer tokens |
//! | `IDENTITY_ISSUER` | Expected JWT issuer claim | Optional |
//! | `IDENTITY_AUDIENCE` | Expected JWT audience claim | Optional |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM certificate chain and key; both or neither | Plain HTTP |
//! | `SEED_MODULE_KEYS` | `moduleId:secret;moduleId:secret` registered at startup | None |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::path::PathBuf;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::auth::IdentityConfig;
use crate::storage::paths::DATA_ROOT;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Environment variable name for the data directory path.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

/// JWKS endpoint of the identity provider.
///
/// When unset, bearer tokens are refused (release builds) or decoded without
/// signature verification (`dev` feature).
pub const IDENTITY_JWKS_URL_ENV: &str = "IDENTITY_JWKS_URL";
pub const IDENTITY_ISSUER_ENV: &str = "IDENTITY_ISSUER";
pub const IDENTITY_AUDIENCE_ENV: &str = "IDENTITY_AUDIENCE";

pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";

/// Module secrets to register at startup, `id:secret` pairs separated by `;`.
pub const SEED_MODULE_KEYS_ENV: &str = "SEED_MODULE_KEYS";

pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
    #[error("TLS_CERT_PATH and TLS_KEY_PATH must be set together")]
    IncompleteTls,
}

/// PEM files for HTTPS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentitySettings {
    pub jwks_url: String,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

impl IdentitySettings {
    pub fn to_config(&self) -> IdentityConfig {
        let mut config = IdentityConfig::new(&self.jwks_url);
        if let Some(issuer) = &self.issuer {
            config = config.with_issuer(issuer);
        }
        if let Some(audience) = &self.audience {
            config = config.with_audience(audience);
        }
        config
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub identity: Option<IdentitySettings>,
    pub tls: Option<TlsPaths>,
    /// `(module_id, secret)` pairs.
    pub seed_module_keys: Vec<(String, String)>,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let host = var(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match var(PORT_ENV) {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| ConfigError::Invalid {
                name: PORT_ENV,
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };
        let bind_addr = format!("{host}:{port}")
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                name: HOST_ENV,
                reason: e.to_string(),
            })?;

        let data_dir = PathBuf::from(var(DATA_DIR_ENV).unwrap_or_else(|| DATA_ROOT.to_string()));

        let identity = var(IDENTITY_JWKS_URL_ENV).map(|jwks_url| IdentitySettings {
            jwks_url,
            issuer: var(IDENTITY_ISSUER_ENV),
            audience: var(IDENTITY_AUDIENCE_ENV),
        });

        let tls = match (var(TLS_CERT_PATH_ENV), var(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            _ => return Err(ConfigError::IncompleteTls),
        };

        let seed_module_keys = match var(SEED_MODULE_KEYS_ENV) {
            Some(raw) => parse_seed_module_keys(&raw)?,
            None => Vec::new(),
        };

        Ok(Self {
            bind_addr,
            data_dir,
            identity,
            tls,
            seed_module_keys,
        })
    }
}

/// Parse `id:secret;id:secret`. Blank entries are skipped.
pub fn parse_seed_module_keys(raw: &str) -> Result<Vec<(String, String)>, ConfigError> {
    raw.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (module_id, secret) = entry
                .split_once(':')
                .map(|(id, secret)| (id.trim(), secret.trim()))
                .filter(|(id, secret)| !id.is_empty() && !secret.is_empty())
                .ok_or_else(|| ConfigError::Invalid {
                    name: SEED_MODULE_KEYS_ENV,
                    reason: "expected moduleId:secret".to_string(),
                })?;
            Ok((module_id.to_string(), secret.to_string()))
        })
        .collect()
}

/// Install the global tracing subscriber.
///
/// `LOG_FORMAT=json` switches to one JSON object per line; the filter comes
/// from `RUST_LOG`.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var(LOG_FORMAT_ENV)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<GatewayConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        GatewayConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert!(config.identity.is_none());
        assert!(config.tls.is_none());
        assert!(config.seed_module_keys.is_empty());
    }

    #[test]
    fn reads_all_settings() {
        let config = config(&[
            (HOST_ENV, "127.0.0.1"),
            (PORT_ENV, "9000"),
            (DATA_DIR_ENV, "/var/lib/gateway"),
            (IDENTITY_JWKS_URL_ENV, "https://id.example.com/jwks.json"),
            (IDENTITY_ISSUER_ENV, "https://id.example.com"),
            (TLS_CERT_PATH_ENV, "/tls/cert.pem"),
            (TLS_KEY_PATH_ENV, "/tls/key.pem"),
            (SEED_MODULE_KEYS_ENV, "m1:k1;m2:k2"),
        ])
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/gateway"));
        let identity = config.identity.unwrap();
        assert_eq!(identity.issuer.as_deref(), Some("https://id.example.com"));
        assert!(identity.audience.is_none());
        assert!(identity.to_config().jwks.is_some());
        assert_eq!(config.tls.unwrap().key, PathBuf::from("/tls/key.pem"));
        assert_eq!(
            config.seed_module_keys,
            vec![
                ("m1".to_string(), "k1".to_string()),
                ("m2".to_string(), "k2".to_string())
            ]
        );
    }

    #[test]
    fn rejects_bad_port() {
        assert!(matches!(
            config(&[(PORT_ENV, "eighty")]),
            Err(ConfigError::Invalid { name: PORT_ENV, .. })
        ));
    }

    #[test]
    fn tls_paths_come_in_pairs() {
        assert!(matches!(
            config(&[(TLS_CERT_PATH_ENV, "/tls/cert.pem")]),
            Err(ConfigError::IncompleteTls)
        ));
    }

    #[test]
    fn seed_keys_parse() {
        assert_eq!(
            parse_seed_module_keys(" m1 : mk_abc ; ;m2:with:colon").unwrap(),
            vec![
                ("m1".to_string(), "mk_abc".to_string()),
                ("m2".to_string(), "with:colon".to_string())
            ]
        );
        assert!(parse_seed_module_keys("m1").is_err());
        assert!(parse_seed_module_keys(":secret").is_err());
        assert!(parse_seed_module_keys("m1:").is_err());
    }
}
