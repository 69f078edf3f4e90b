// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names, default values and the
//! typed [`Config`] loaded from the environment at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `KEYCLOAK_URL` | Keycloak base URL (issuer host) | Required |
//! | `KEYCLOAK_REALM` | Realm whose signing keys verify tokens | Required |
//! | `KEYCLOAK_TIMEOUT_SECS` | Timeout for the signing-key fetch | `10` |
//! | `JWKS_CACHE_TTL_SECS` | Signing key cache TTL (`0` disables caching) | `300` |
//! | `JWT_LEEWAY_SECS` | Clock skew tolerance applied to `exp` | `0` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `3003` |
//! | `DATA_DIR` | Directory holding `users.redb` (unset: in-memory users) | unset |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM files; HTTPS when both are set | unset |
//! | `SEED_USER_IDENTITY_ID` | Keycloak subject of a user created at startup | unset |
//! | `SEED_USER_EMAIL` | Email of the seeded user | unset |
//! | `SEED_USER_FULL_NAME` | Full name of the seeded user | empty |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use url::Url;

pub const KEYCLOAK_URL_ENV: &str = "KEYCLOAK_URL";
pub const KEYCLOAK_REALM_ENV: &str = "KEYCLOAK_REALM";
pub const KEYCLOAK_TIMEOUT_ENV: &str = "KEYCLOAK_TIMEOUT_SECS";
pub const JWKS_CACHE_TTL_ENV: &str = "JWKS_CACHE_TTL_SECS";
pub const JWT_LEEWAY_ENV: &str = "JWT_LEEWAY_SECS";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Environment variable name for the user database directory.
///
/// When set, users are persisted in `{DATA_DIR}/users.redb`. When unset the
/// server keeps users in memory, which is only useful for local development.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const SEED_USER_IDENTITY_ENV: &str = "SEED_USER_IDENTITY_ID";
pub const SEED_USER_EMAIL_ENV: &str = "SEED_USER_EMAIL";
pub const SEED_USER_FULL_NAME_ENV: &str = "SEED_USER_FULL_NAME";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3003;
pub const DEFAULT_KEYCLOAK_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_JWKS_CACHE_TTL: Duration = Duration::from_secs(300);

/// Default `RUST_LOG` filter when the variable is absent.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

/// File name of the embedded user database inside `DATA_DIR`.
pub const USER_DB_FILE: &str = "users.redb";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("expected `json` or `pretty`, got `{other}`")),
        }
    }
}

/// Keycloak issuer settings used by the token gate.
#[derive(Debug, Clone)]
pub struct KeycloakConfig {
    /// Base URL of the Keycloak server (may include a path prefix such as `/auth`)
    pub url: Url,
    /// Realm that issues the access tokens
    pub realm: String,
    /// Upper bound on a single signing-key fetch
    pub timeout: Duration,
    /// Signing key cache TTL; zero means every verification refetches
    pub cache_ttl: Duration,
    /// Clock skew tolerance in seconds for `exp`
    pub leeway_secs: u64,
}

impl KeycloakConfig {
    pub fn new(url: Url, realm: impl Into<String>) -> Self {
        Self {
            url,
            realm: realm.into(),
            timeout: DEFAULT_KEYCLOAK_TIMEOUT,
            cache_ttl: DEFAULT_JWKS_CACHE_TTL,
            leeway_secs: 0,
        }
    }

    /// The realm's signing key endpoint:
    /// `{url}/realms/{realm}/protocol/openid-connect/certs`.
    pub fn certs_url(&self) -> Result<Url, ConfigError> {
        let mut url = self.url.clone();
        url.path_segments_mut()
            .map_err(|_| ConfigError::Invalid {
                name: KEYCLOAK_URL_ENV,
                reason: "URL cannot be used as a base".to_string(),
            })?
            .pop_if_empty()
            .extend(["realms", self.realm.as_str(), "protocol", "openid-connect", "certs"]);
        Ok(url)
    }
}

/// Seed user created at startup if absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedUser {
    pub identity_id: String,
    pub email: String,
    pub full_name: String,
}

/// PEM certificate and key used to serve HTTPS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Complete server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub keycloak: KeycloakConfig,
    pub bind_addr: SocketAddr,
    pub data_dir: Option<PathBuf>,
    pub tls: Option<TlsPaths>,
    pub seed_user: Option<SeedUser>,
    pub log_format: LogFormat,
}

impl Config {
    /// Load the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load the configuration through an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let raw_url = get(KEYCLOAK_URL_ENV).ok_or(ConfigError::Missing(KEYCLOAK_URL_ENV))?;
        let url = Url::parse(raw_url.trim()).map_err(|e| ConfigError::Invalid {
            name: KEYCLOAK_URL_ENV,
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                name: KEYCLOAK_URL_ENV,
                reason: format!("unsupported scheme `{}`", url.scheme()),
            });
        }

        let realm = get(KEYCLOAK_REALM_ENV).ok_or(ConfigError::Missing(KEYCLOAK_REALM_ENV))?;

        let mut keycloak = KeycloakConfig::new(url, realm.trim());
        if let Some(secs) = parse_var::<u64>(&get, KEYCLOAK_TIMEOUT_ENV)? {
            if secs == 0 {
                return Err(ConfigError::Invalid {
                    name: KEYCLOAK_TIMEOUT_ENV,
                    reason: "timeout must be greater than zero".to_string(),
                });
            }
            keycloak.timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(&get, JWKS_CACHE_TTL_ENV)? {
            keycloak.cache_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(&get, JWT_LEEWAY_ENV)? {
            keycloak.leeway_secs = secs;
        }
        // Fail at startup rather than on the first request.
        keycloak.certs_url()?;

        let host = get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = parse_var::<u16>(&get, PORT_ENV)?.unwrap_or(DEFAULT_PORT);
        let bind_addr: SocketAddr =
            format!("{host}:{port}")
                .parse()
                .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                    name: HOST_ENV,
                    reason: e.to_string(),
                })?;

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing(TLS_KEY_PATH_ENV)),
            (None, Some(_)) => return Err(ConfigError::Missing(TLS_CERT_PATH_ENV)),
        };

        let seed_user = match (get(SEED_USER_IDENTITY_ENV), get(SEED_USER_EMAIL_ENV)) {
            (Some(identity_id), Some(email)) => Some(SeedUser {
                identity_id,
                email,
                full_name: get(SEED_USER_FULL_NAME_ENV).unwrap_or_default(),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing(SEED_USER_EMAIL_ENV)),
            (None, Some(_)) => return Err(ConfigError::Missing(SEED_USER_IDENTITY_ENV)),
        };

        let log_format = match get(LOG_FORMAT_ENV) {
            Some(raw) => raw.parse().map_err(|reason| ConfigError::Invalid {
                name: LOG_FORMAT_ENV,
                reason,
            })?,
            None => LogFormat::default(),
        };

        Ok(Self {
            keycloak,
            bind_addr,
            data_dir: get(DATA_DIR_ENV).map(PathBuf::from),
            tls,
            seed_user,
            log_format,
        })
    }
}

fn parse_var<T>(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get(name)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
                name,
                reason: e.to_string(),
            })
        })
        .transpose()
}
