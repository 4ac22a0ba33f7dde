use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use meterdeck_core::token::SESSION_TOKEN_TTL_DAYS;

/// Upper bound for `SESSION_TTL_DAYS`.
pub const MAX_SESSION_TTL_DAYS: i64 = 365;

/// Configuration could not be loaded; startup aborts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("{var} must be set when {reason}")]
    Missing { var: &'static str, reason: &'static str },
}

/// Which login backend the server runs with. Selected once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// One shared dashboard password, stateless signed session cookie.
    Legacy,
    /// Per-user email/password accounts with persisted sessions.
    Accounts,
}

impl AuthMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthMode::Legacy => "legacy",
            AuthMode::Accounts => "accounts",
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" => Ok(AuthMode::Legacy),
            "accounts" => Ok(AuthMode::Accounts),
            other => Err(format!("expected 'legacy' or 'accounts', got '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("expected 'pretty' or 'json', got '{other}'")),
        }
    }
}

/// Credentials for seeding the first admin account.
#[derive(Clone)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Authentication settings. Secrets are read once and never rotated.
#[derive(Clone)]
pub struct AuthConfig {
    /// Signing secret for session, share and CSRF tokens. `None` disables auth.
    pub secret: Option<String>,
    pub mode: AuthMode,
    /// Shared password for [`AuthMode::Legacy`].
    pub dashboard_password: Option<String>,
    /// Whether cookies carry the `Secure` attribute.
    pub cookie_secure: bool,
    pub session_ttl_days: i64,
    /// Base URL that generated share links point at.
    pub public_base_url: url::Url,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret_set", &self.secret.is_some())
            .field("mode", &self.mode)
            .field("dashboard_password_set", &self.dashboard_password.is_some())
            .field("cookie_secure", &self.cookie_secure)
            .field("session_ttl_days", &self.session_ttl_days)
            .field("public_base_url", &self.public_base_url.as_str())
            .field("bootstrap_admin", &self.bootstrap_admin)
            .finish()
    }
}

impl AuthConfig {
    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.session_ttl_days)
    }
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Budget for draining background jobs on shutdown (default: `30`).
    pub shutdown_timeout_secs: u64,
    pub rate_limit_sweep_secs: u64,
    pub cleanup_interval_secs: u64,
    pub database_url: Option<String>,
    pub usage_snapshot_path: Option<PathBuf>,
    pub log_format: LogFormat,
    /// Honour `x-forwarded-for` / `x-real-ip` for the client address.
    /// Only safe behind a proxy that overwrites them.
    pub trust_proxy_headers: bool,
    pub auth: AuthConfig,
}

impl ServerConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                    | Default                          |
    /// |----------------------------|----------------------------------|
    /// | `HOST`                     | `0.0.0.0`                        |
    /// | `PORT`                     | `3000`                           |
    /// | `CORS_ORIGINS`             | `http://localhost:5173`          |
    /// | `REQUEST_TIMEOUT_SECS`     | `30`                             |
    /// | `SHUTDOWN_TIMEOUT_SECS`    | `30`                             |
    /// | `RATE_LIMIT_SWEEP_SECS`    | `60`                             |
    /// | `CLEANUP_INTERVAL_SECS`    | `3600`                           |
    /// | `AUTH_SECRET`              | unset (auth not configured)      |
    /// | `AUTH_MODE`                | `legacy`                         |
    /// | `DASHBOARD_PASSWORD`       | unset                            |
    /// | `COOKIE_SECURE`            | `true` when `APP_ENV=production` |
    /// | `SESSION_TTL_DAYS`         | `7`                              |
    /// | `PUBLIC_BASE_URL`          | `http://localhost:5173`          |
    /// | `DATABASE_URL`             | unset (in-memory store)          |
    /// | `BOOTSTRAP_ADMIN_EMAIL`    | unset                            |
    /// | `BOOTSTRAP_ADMIN_PASSWORD` | unset                            |
    /// | `USAGE_SNAPSHOT_PATH`      | unset (empty dashboard)          |
    /// | `LOG_FORMAT`               | `pretty`                         |
    /// | `TRUST_PROXY_HEADERS`      | `false`                          |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = var("HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = parse_or(&var, "PORT", 3000u16)?;

        let cors_origins: Vec<String> = var("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs = parse_or(&var, "REQUEST_TIMEOUT_SECS", 30u64)?;
        let shutdown_timeout_secs = parse_or(&var, "SHUTDOWN_TIMEOUT_SECS", 30u64)?;
        let rate_limit_sweep_secs =
            positive("RATE_LIMIT_SWEEP_SECS", parse_or(&var, "RATE_LIMIT_SWEEP_SECS", 60u64)?)?;
        let cleanup_interval_secs =
            positive("CLEANUP_INTERVAL_SECS", parse_or(&var, "CLEANUP_INTERVAL_SECS", 3600u64)?)?;

        let database_url = var("DATABASE_URL");
        let usage_snapshot_path = var("USAGE_SNAPSHOT_PATH").map(PathBuf::from);
        let log_format = parse_or(&var, "LOG_FORMAT", LogFormat::Pretty)?;
        let trust_proxy_headers = parse_or(&var, "TRUST_PROXY_HEADERS", false)?;

        let mode = parse_or(&var, "AUTH_MODE", AuthMode::Legacy)?;
        let production = var("APP_ENV").is_some_and(|v| v.eq_ignore_ascii_case("production"));
        let cookie_secure = parse_or(&var, "COOKIE_SECURE", production)?;
        let session_ttl_days = parse_or(&var, "SESSION_TTL_DAYS", SESSION_TOKEN_TTL_DAYS)?;
        if !(1..=MAX_SESSION_TTL_DAYS).contains(&session_ttl_days) {
            return Err(invalid(
                "SESSION_TTL_DAYS",
                session_ttl_days,
                format!("must be between 1 and {MAX_SESSION_TTL_DAYS}"),
            ));
        }

        let base = var("PUBLIC_BASE_URL").unwrap_or_else(|| "http://localhost:5173".into());
        let public_base_url =
            url::Url::parse(&base).map_err(|e| invalid("PUBLIC_BASE_URL", &base, e))?;

        let bootstrap_admin = match (var("BOOTSTRAP_ADMIN_EMAIL"), var("BOOTSTRAP_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(BootstrapAdmin { email, password }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigError::Missing {
                    var: "BOOTSTRAP_ADMIN_PASSWORD",
                    reason: "BOOTSTRAP_ADMIN_EMAIL is set",
                })
            }
            (None, Some(_)) => {
                return Err(ConfigError::Missing {
                    var: "BOOTSTRAP_ADMIN_EMAIL",
                    reason: "BOOTSTRAP_ADMIN_PASSWORD is set",
                })
            }
        };

        if mode == AuthMode::Accounts && database_url.is_none() {
            return Err(ConfigError::Missing {
                var: "DATABASE_URL",
                reason: "AUTH_MODE=accounts",
            });
        }

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            rate_limit_sweep_secs,
            cleanup_interval_secs,
            database_url,
            usage_snapshot_path,
            log_format,
            trust_proxy_headers,
            auth: AuthConfig {
                secret: var("AUTH_SECRET"),
                mode,
                dashboard_password: var("DASHBOARD_PASSWORD"),
                cookie_secure,
                session_ttl_days,
                public_base_url,
                bootstrap_admin,
            },
        })
    }
}

fn parse_or<T>(
    var: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match var(key) {
        Some(raw) => raw.trim().parse().map_err(|e| invalid(key, &raw, e)),
        None => Ok(default),
    }
}

fn positive(key: &'static str, value: u64) -> Result<u64, ConfigError> {
    if value == 0 {
        return Err(invalid(key, value, "must be greater than zero"));
    }
    Ok(value)
}

fn invalid(var: &'static str, value: impl fmt::Display, reason: impl fmt::Display) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.cors_origins, vec!["http://localhost:5173"]);
        assert_eq!(config.rate_limit_sweep_secs, 60);
        assert_eq!(config.auth.mode, AuthMode::Legacy);
        assert!(config.auth.secret.is_none());
        assert!(!config.auth.cookie_secure);
        assert_eq!(config.auth.session_ttl_days, 7);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn production_defaults_to_secure_cookies() {
        let config = load(&[("APP_ENV", "production")]).unwrap();
        assert!(config.auth.cookie_secure);

        let config = load(&[("APP_ENV", "production"), ("COOKIE_SECURE", "false")]).unwrap();
        assert!(!config.auth.cookie_secure);
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert_matches!(
            load(&[("PORT", "eighty")]),
            Err(ConfigError::Invalid { var: "PORT", .. })
        );
        assert_matches!(
            load(&[("AUTH_MODE", "ldap")]),
            Err(ConfigError::Invalid { var: "AUTH_MODE", .. })
        );
        assert_matches!(
            load(&[("PUBLIC_BASE_URL", "not a url")]),
            Err(ConfigError::Invalid { var: "PUBLIC_BASE_URL", .. })
        );
        assert_matches!(
            load(&[("RATE_LIMIT_SWEEP_SECS", "0")]),
            Err(ConfigError::Invalid { .. })
        );
    }

    #[test]
    fn session_ttl_is_bounded() {
        assert_matches!(
            load(&[("SESSION_TTL_DAYS", "0")]),
            Err(ConfigError::Invalid { var: "SESSION_TTL_DAYS", .. })
        );
        assert_matches!(
            load(&[("SESSION_TTL_DAYS", "9223372036854775807")]),
            Err(ConfigError::Invalid { var: "SESSION_TTL_DAYS", .. })
        );
        let config = load(&[("SESSION_TTL_DAYS", "365")]).unwrap();
        assert_eq!(config.auth.session_ttl_days, MAX_SESSION_TTL_DAYS);
    }

    #[test]
    fn proxy_headers_are_untrusted_by_default() {
        assert!(!load(&[]).unwrap().trust_proxy_headers);
        assert!(load(&[("TRUST_PROXY_HEADERS", "true")]).unwrap().trust_proxy_headers);
    }

    #[test]
    fn accounts_mode_requires_database() {
        assert_matches!(
            load(&[("AUTH_MODE", "accounts")]),
            Err(ConfigError::Missing { var: "DATABASE_URL", .. })
        );
        let config = load(&[
            ("AUTH_MODE", "Accounts"),
            ("DATABASE_URL", "postgres://localhost/meterdeck"),
        ])
        .unwrap();
        assert_eq!(config.auth.mode, AuthMode::Accounts);
    }

    #[test]
    fn bootstrap_admin_needs_both_halves() {
        assert_matches!(
            load(&[("BOOTSTRAP_ADMIN_EMAIL", "root@example.com")]),
            Err(ConfigError::Missing { var: "BOOTSTRAP_ADMIN_PASSWORD", .. })
        );
        let config = load(&[
            ("BOOTSTRAP_ADMIN_EMAIL", "root@example.com"),
            ("BOOTSTRAP_ADMIN_PASSWORD", "a-long-enough-password"),
        ])
        .unwrap();
        assert_eq!(config.auth.bootstrap_admin.unwrap().email, "root@example.com");
    }

    #[test]
    fn debug_output_hides_secrets() {
        let config = load(&[
            ("AUTH_SECRET", "s3cr3t-value"),
            ("DASHBOARD_PASSWORD", "hunter2"),
        ])
        .unwrap();
        let rendered = format!("{:?}", config.auth);
        assert!(!rendered.contains("s3cr3t-value"));
        assert!(!rendered.contains("hunter2"));
    }
}
