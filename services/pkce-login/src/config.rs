//! Configuration types and loading
//!
//! Config precedence: env vars > config file > defaults. The config file is
//! optional; every setting can come from the environment alone, which is how
//! the demo is usually run (`.env` next to the binary).

use common::Secret;
use pkce_auth::ProviderConfig;
use pkce_auth::provider::{DEFAULT_CLAIM, DEFAULT_SCOPE};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Config file picked up from the working directory when nothing else is given.
pub const DEFAULT_CONFIG_FILE: &str = "pkce-login.toml";

/// Bytes of entropy behind a generated session secret.
const GENERATED_SECRET_BYTES: usize = 64;

/// Validated configuration
#[derive(Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub provider: ProviderConfig,
}

/// Listener, TLS and session settings
#[derive(Debug)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// `None` serves plain HTTP.
    pub tls: Option<TlsConfig>,
    pub session_secret: Secret<String>,
    /// True when no secret was configured and one was drawn at startup.
    /// Sessions then do not survive a restart.
    pub session_secret_generated: bool,
    /// Served at `/` when set, in place of the built-in index page.
    pub static_dir: Option<PathBuf>,
    pub max_connections: usize,
}

/// PEM files for the HTTPS listener
#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub key_path: PathBuf,
    pub cert_path: PathBuf,
}

/// File layout before validation. Everything is optional here; the env
/// overlay may still fill the gaps.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    server: RawServer,
    #[serde(default)]
    provider: RawProvider,
}

#[derive(Debug, Default, Deserialize)]
struct RawServer {
    bind_address: Option<IpAddr>,
    port: Option<u16>,
    use_https: Option<bool>,
    tls_key: Option<PathBuf>,
    tls_cert: Option<PathBuf>,
    session_secret: Option<Secret<String>>,
    static_dir: Option<PathBuf>,
    max_connections: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct RawProvider {
    authorization_url: Option<String>,
    token_url: Option<String>,
    userinfo_url: Option<String>,
    logout_url: Option<String>,
    client_id: Option<String>,
    scope: Option<String>,
    redirect_uri: Option<String>,
    post_logout_redirect_uri: Option<String>,
    claim: Option<String>,
    timeout_secs: Option<u64>,
}

fn default_port() -> u16 {
    8080
}

fn default_max_connections() -> usize {
    1000
}

fn default_timeout_secs() -> u64 {
    15
}

impl RawConfig {
    /// Overlay environment variables. Set variables win over the file.
    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> common::Result<()> {
        let server = &mut self.server;
        if let Some(port) = env("PORT") {
            server.port = Some(port.trim().parse().map_err(|_| {
                common::Error::Config(format!("PORT must be a port number, got: {port}"))
            })?);
        }
        if let Some(flag) = env("USE_HTTPS") {
            server.use_https = Some(flag.trim().eq_ignore_ascii_case("true"));
        }
        if let Some(path) = env("TLS_KEY") {
            server.tls_key = Some(PathBuf::from(path));
        }
        if let Some(path) = env("TLS_CERT") {
            server.tls_cert = Some(PathBuf::from(path));
        }
        if let Some(secret) = env("SESSION_SECRET") {
            server.session_secret = Some(Secret::new(secret));
        }
        if let Some(dir) = env("STATIC_DIR") {
            server.static_dir = Some(PathBuf::from(dir));
        }

        let provider = &mut self.provider;
        for (var, slot) in [
            ("AUTH_URL", &mut provider.authorization_url),
            ("TOKEN_URL", &mut provider.token_url),
            ("USERINFO_URL", &mut provider.userinfo_url),
            ("LOGOUT_URL", &mut provider.logout_url),
            ("CLIENT_ID", &mut provider.client_id),
            ("SCOPE", &mut provider.scope),
            ("REDIRECT_URI", &mut provider.redirect_uri),
            ("POST_LOGOUT_REDIRECT_URI", &mut provider.post_logout_redirect_uri),
            ("USERINFO_CLAIM", &mut provider.claim),
        ] {
            if let Some(value) = env(var) {
                *slot = Some(value);
            }
        }
        Ok(())
    }

    fn validate(self) -> common::Result<Config> {
        let server = self.server;
        let port = server.port.unwrap_or_else(default_port);
        let listen_addr = SocketAddr::new(
            server
                .bind_address
                .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
            port,
        );

        let use_https = server.use_https.unwrap_or(true);
        let tls = if use_https {
            Some(TlsConfig {
                key_path: server.tls_key.ok_or(common::Error::MissingSetting {
                    section: "server",
                    key: "tls_key",
                    env: "TLS_KEY",
                })?,
                cert_path: server.tls_cert.ok_or(common::Error::MissingSetting {
                    section: "server",
                    key: "tls_cert",
                    env: "TLS_CERT",
                })?,
            })
        } else {
            None
        };

        let max_connections = server
            .max_connections
            .unwrap_or_else(default_max_connections);
        if max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        let (session_secret, session_secret_generated) = match server
            .session_secret
            .filter(|s| !s.expose().is_empty())
        {
            Some(secret) => (secret, false),
            None => {
                let secret = pkce_auth::random_token(GENERATED_SECRET_BYTES).map_err(|e| {
                    common::Error::Config(format!("cannot generate a session secret: {e}"))
                })?;
                (Secret::new(secret), true)
            }
        };

        let provider = self.provider;
        let client_id = required(provider.client_id, "client_id", "CLIENT_ID")?;
        if client_id.trim().is_empty() {
            return Err(common::Error::Config("client_id must not be empty".into()));
        }

        let timeout_secs = provider.timeout_secs.unwrap_or_else(default_timeout_secs);
        if timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        let post_logout_redirect_uri = match provider.post_logout_redirect_uri {
            Some(raw) => parse_url("post_logout_redirect_uri", &raw)?,
            None => {
                let scheme = if use_https { "https" } else { "http" };
                parse_url(
                    "post_logout_redirect_uri",
                    &format!("{scheme}://localhost:{port}/"),
                )?
            }
        };

        let mut provider_config = ProviderConfig::new(
            endpoint(provider.authorization_url, "authorization_url", "AUTH_URL")?,
            endpoint(provider.token_url, "token_url", "TOKEN_URL")?,
            endpoint(provider.userinfo_url, "userinfo_url", "USERINFO_URL")?,
            endpoint(provider.logout_url, "logout_url", "LOGOUT_URL")?,
            client_id,
            endpoint(provider.redirect_uri, "redirect_uri", "REDIRECT_URI")?,
            post_logout_redirect_uri,
        );
        provider_config.scope = provider.scope.unwrap_or_else(|| DEFAULT_SCOPE.to_string());
        provider_config.claim = provider
            .claim
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CLAIM.to_string());
        provider_config.request_timeout = Duration::from_secs(timeout_secs);

        Ok(Config {
            server: ServerConfig {
                listen_addr,
                tls,
                session_secret,
                session_secret_generated,
                static_dir: server.static_dir,
                max_connections,
            },
            provider: provider_config,
        })
    }
}

fn required(value: Option<String>, key: &'static str, env: &'static str) -> common::Result<String> {
    value.ok_or(common::Error::MissingSetting {
        section: "provider",
        key,
        env,
    })
}

fn endpoint(value: Option<String>, key: &'static str, env: &'static str) -> common::Result<Url> {
    parse_url(key, &required(value, key, env)?)
}

/// Parse a provider or redirect URL, accepting only http(s).
fn parse_url(key: &str, raw: &str) -> common::Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| common::Error::Config(format!("{key} is not a valid URL ({e}): {raw}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(common::Error::Config(format!(
            "{key} must start with http:// or https://, got: {raw}"
        ))),
    }
}

impl Config {
    /// Load configuration from an optional TOML file, then overlay
    /// environment variables.
    pub fn load(path: Option<&Path>) -> common::Result<Self> {
        let contents = match path {
            Some(path) => Some(std::fs::read_to_string(path)?),
            None => None,
        };
        Self::from_sources(contents.as_deref(), |key| {
            std::env::var(key).ok().filter(|v| !v.is_empty())
        })
    }

    /// Build from file contents and an env lookup. `load` wires in the
    /// process environment; tests pass a map.
    pub fn from_sources(
        contents: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> common::Result<Self> {
        let mut raw: RawConfig = match contents {
            Some(contents) => toml::from_str(contents)?,
            None => RawConfig::default(),
        };
        raw.apply_env(env)?;
        raw.validate()
    }

    /// Resolve config file path from CLI arg, CONFIG_PATH env var, or the
    /// default file if it exists. `None` means env-only configuration.
    pub fn resolve_path(cli_path: Option<&str>) -> Option<PathBuf> {
        if let Some(p) = cli_path {
            return Some(PathBuf::from(p));
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return Some(PathBuf::from(p));
        }
        let default = PathBuf::from(DEFAULT_CONFIG_FILE);
        default.exists().then_some(default)
    }
}
