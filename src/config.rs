use serde::Deserialize;
use std::path::Path;

const DEFAULTS: &str = include_str!("../config/default.toml");

/// Minimum secret length below which a warning is emitted at startup.
const RECOMMENDED_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory served for everything no API route claims (public site and admin pages).
    pub static_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Preferred hostname; requests for any other non-local host are redirected here.
    pub canonical_domain: String,
    /// Hostnames (without port) that are never redirected.
    pub local_hosts: Vec<String>,
}

#[derive(Clone, Deserialize)]
pub struct AuthConfig {
    pub session_secret: String,
    pub session_ttl_secs: i64,
    pub admin_prefix: String,
    pub login_path: String,
    /// Paths under `admin_prefix` reachable without a session.
    pub public_paths: Vec<String>,
    pub secure_cookies: bool,
}

// Hand-written so the secret never ends up in logs via `{:?}`.
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("session_secret", &"<redacted>")
            .field("session_ttl_secs", &self.session_ttl_secs)
            .field("admin_prefix", &self.admin_prefix)
            .field("login_path", &self.login_path)
            .field("public_paths", &self.public_paths)
            .field("secure_cookies", &self.secure_cookies)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub limit: usize,
    pub window_ms: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitsConfig {
    pub login: RateLimitPolicy,
    pub user_create: RateLimitPolicy,
    pub user_update: RateLimitPolicy,
    pub user_delete: RateLimitPolicy,
}

impl RateLimitsConfig {
    fn all(&self) -> [(&'static str, RateLimitPolicy); 4] {
        [
            ("login", self.login),
            ("user_create", self.user_create),
            ("user_update", self.user_update),
            ("user_delete", self.user_delete),
        ]
    }

    /// Longest configured window; entries older than this can never affect a decision.
    pub fn max_window_ms(&self) -> i64 {
        self.all().iter().map(|(_, p)| p.window_ms).max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SecurityConfig {
    pub enable_hsts: Option<bool>,
    pub hsts_max_age: Option<u64>,
    pub hsts_include_subdomains: Option<bool>,
    pub csp: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub site: SiteConfig,
    pub auth: AuthConfig,
    pub rate_limits: RateLimitsConfig,
    pub security: Option<SecurityConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        // Fallback: parse the embedded default TOML
        match ::config::Config::builder()
            .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
            .build()
        {
            Ok(cfg) => match cfg.try_deserialize() {
                Ok(app_cfg) => app_cfg,
                Err(e) => {
                    eprintln!("FATAL: Failed to deserialize default config: {}", e);
                    panic!("Failed to deserialize default config: {}", e);
                }
            },
            Err(e) => {
                eprintln!("FATAL: Failed to parse default config: {}", e);
                panic!("Failed to parse default config: {}", e);
            }
        }
    }
}

pub fn load() -> anyhow::Result<AppConfig> {
    // Load .env first (optional)
    let _ = dotenvy::dotenv();

    let mut builder = ::config::Config::builder()
        .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
        // Optional local file: brightline.toml (in CWD)
        .add_source(::config::File::with_name("brightline").required(false));

    if let Ok(custom_path) = std::env::var("BRIGHTLINE_CONFIG") {
        builder = builder.add_source(::config::File::with_name(&custom_path).required(false));
    }
    // Environment variables last to have highest precedence
    builder = builder.add_source(::config::Environment::with_prefix("BRIGHTLINE").separator("__"));

    let cfg = builder.build()?;
    let mut app_cfg: AppConfig = cfg.try_deserialize()?;
    apply_legacy_env(&mut app_cfg);
    validate(&app_cfg)?;
    Ok(app_cfg)
}

/// Older deployments configure the secret and domain through flat variables.
fn apply_legacy_env(cfg: &mut AppConfig) {
    if cfg.auth.session_secret.is_empty() {
        if let Ok(secret) = std::env::var("ADMIN_SESSION_SECRET") {
            cfg.auth.session_secret = secret;
        }
    }
    if cfg.site.canonical_domain.trim().is_empty() {
        if let Ok(domain) = std::env::var("PRIMARY_DOMAIN") {
            cfg.site.canonical_domain = domain;
        }
    }
    cfg.site.canonical_domain = cfg.site.canonical_domain.trim().to_ascii_lowercase();
}

pub fn validate(cfg: &AppConfig) -> anyhow::Result<()> {
    // Server
    if cfg.server.port == 0 {
        return Err(anyhow::anyhow!("invalid server.port: {}", cfg.server.port));
    }
    // Warn for privileged ports on Unix-like systems
    #[cfg(unix)]
    if cfg.server.port < 1024 {
        tracing::warn!("Using privileged port {} - may require elevated permissions", cfg.server.port);
    }

    // Site
    let domain = cfg.site.canonical_domain.trim();
    if domain.is_empty() {
        return Err(anyhow::anyhow!("site.canonical_domain must be set"));
    }
    if domain.contains('/') || domain.contains(':') || domain.contains(char::is_whitespace) {
        return Err(anyhow::anyhow!("site.canonical_domain must be a bare hostname, got {:?}", domain));
    }

    // Auth
    if cfg.auth.session_secret.is_empty() {
        return Err(anyhow::anyhow!(
            "auth.session_secret must be set (BRIGHTLINE__AUTH__SESSION_SECRET or ADMIN_SESSION_SECRET)"
        ));
    }
    if cfg.auth.session_secret.len() < RECOMMENDED_SECRET_LEN {
        tracing::warn!(
            "auth.session_secret is shorter than {} bytes; use a longer random value",
            RECOMMENDED_SECRET_LEN
        );
    }
    if cfg.auth.session_ttl_secs <= 0 {
        return Err(anyhow::anyhow!("auth.session_ttl_secs must be > 0"));
    }
    let prefix = &cfg.auth.admin_prefix;
    if !prefix.starts_with('/') || prefix.len() < 2 || prefix.ends_with('/') {
        return Err(anyhow::anyhow!("auth.admin_prefix must look like \"/admin\", got {:?}", prefix));
    }
    if !cfg.auth.login_path.starts_with('/') {
        return Err(anyhow::anyhow!("auth.login_path must start with '/'"));
    }
    // The login page must stay reachable, otherwise every redirect loops.
    if cfg.auth.login_path.starts_with(prefix.as_str())
        && !cfg.auth.public_paths.iter().any(|p| p == &cfg.auth.login_path)
    {
        return Err(anyhow::anyhow!("auth.login_path must be listed in auth.public_paths"));
    }

    // Rate limits
    for (name, policy) in cfg.rate_limits.all() {
        if policy.limit == 0 {
            return Err(anyhow::anyhow!("rate_limits.{}.limit must be > 0", name));
        }
        if policy.window_ms <= 0 {
            return Err(anyhow::anyhow!("rate_limits.{}.window_ms must be > 0", name));
        }
    }

    Ok(())
}

pub fn ensure_sqlite_parent_dir(url: &str) -> anyhow::Result<()> {
    if let Some(path) = url.strip_prefix("sqlite://") {
        let p = Path::new(path);
        if let Some(parent) = p.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }
    Ok(())
}
