use anyhow::anyhow;
use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub keystore: KeyStoreConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
    /// `compact` or `json`
    #[serde(default)]
    pub log_format: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".into(), port: 8080, worker_threads: Some(4), log_format: None }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_max_lifetime")]
    pub max_lifetime_secs: u64,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
    #[serde(default)]
    pub sqlx_logging: bool,
    /// Apply pending migrations at startup.
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
            max_lifetime_secs: default_max_lifetime(),
            acquire_timeout_secs: default_acquire_timeout(),
            sqlx_logging: false,
            run_migrations: true,
        }
    }
}

/// What to do when the initial table scan fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoadPolicy {
    /// Start with an empty cache and report the store as degraded.
    #[default]
    FailOpen,
    /// Refuse to start.
    FailClosed,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct KeyStoreConfig {
    #[serde(default)]
    pub load_policy: LoadPolicy,
    /// Deadline for a single write statement; unset means no deadline.
    #[serde(default)]
    pub write_timeout_secs: Option<u64>,
    /// Deadline for the full table scan; unset means no deadline.
    #[serde(default)]
    pub load_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Credential for the `/admin` routes, sent as `X-Admin-Key`. Unset
    /// disables the admin routes.
    #[serde(default)]
    pub admin_key: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { key_prefix: default_key_prefix(), admin_key: None }
    }
}

fn default_max_connections() -> u32 { 10 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 30 }
fn default_idle_timeout() -> u64 { 600 }
fn default_max_lifetime() -> u64 { 3600 }
fn default_acquire_timeout() -> u64 { 30 }
fn default_true() -> bool { true }
fn default_key_prefix() -> String { "JGP-".to_string() }

pub fn load_default() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    load_from_str(&content)
}

pub fn load_from_str(content: &str) -> Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(content)?;
    Ok(cfg)
}

impl AppConfig {
    /// Load `config.toml` (or `CONFIG_PATH`), falling back to defaults plus
    /// environment variables when no file is present, then validate.
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = match load_default() {
            Ok(cfg) => cfg,
            Err(e) if is_missing_file(&e) => Self::default(),
            Err(e) => return Err(e),
        };
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.server.normalize_from_env();
        self.server.normalize()?;
        self.database.normalize_from_env();
        self.database.validate()?;
        self.keystore.validate()?;
        self.auth.normalize_from_env();
        self.auth.validate()?;
        Ok(())
    }
}

fn is_missing_file(e: &anyhow::Error) -> bool {
    e.downcast_ref::<std::io::Error>()
        .is_some_and(|io| io.kind() == std::io::ErrorKind::NotFound)
}

impl ServerConfig {
    fn normalize_from_env(&mut self) {
        if let Ok(host) = std::env::var("SERVER_HOST") {
            if !host.trim().is_empty() { self.host = host; }
        }
        if let Some(port) = std::env::var("SERVER_PORT").ok().and_then(|p| p.parse::<u16>().ok()) {
            self.port = port;
        }
        if self.log_format.is_none() {
            self.log_format = std::env::var("LOG_FORMAT").ok();
        }
    }

    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = "127.0.0.1".to_string();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port must be in 1..=65535"));
        }
        match self.worker_threads {
            Some(0) | None => self.worker_threads = Some(4),
            Some(_) => {}
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl DatabaseConfig {
    pub fn normalize_from_env(&mut self) {
        // the environment only fills in a URL the file left empty
        if self.url.trim().is_empty() {
            if let Ok(url) = std::env::var("DATABASE_URL") {
                self.url = url;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(anyhow!("database.url is empty; set it in config.toml or DATABASE_URL"));
        }
        let lower = self.url.to_lowercase();
        if !(lower.starts_with("postgresql://") || lower.starts_with("postgres://")) {
            return Err(anyhow!("database.url must start with postgresql:// or postgres://"));
        }
        if self.min_connections == 0 {
            return Err(anyhow!("database.min_connections must be >= 1"));
        }
        if self.max_connections < self.min_connections {
            return Err(anyhow!("database.max_connections must be >= min_connections"));
        }
        if self.connect_timeout_secs == 0 || self.acquire_timeout_secs == 0 {
            return Err(anyhow!("database timeouts must be positive seconds"));
        }
        Ok(())
    }
}

impl KeyStoreConfig {
    pub fn validate(&self) -> Result<()> {
        if self.write_timeout_secs == Some(0) || self.load_timeout_secs == Some(0) {
            return Err(anyhow!("keystore timeouts must be positive seconds when set"));
        }
        Ok(())
    }
}

impl AuthConfig {
    pub fn normalize_from_env(&mut self) {
        if self.admin_key.is_none() {
            self.admin_key = std::env::var("ADMIN_API_KEY").ok();
        }
        if self.admin_key.as_deref().is_some_and(|k| k.trim().is_empty()) {
            self.admin_key = None;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(key) = &self.admin_key {
            if key.chars().count() < 16 || key.chars().any(char::is_whitespace) {
                return Err(anyhow!("auth.admin_key must be at least 16 characters without whitespace"));
            }
        }
        let prefix = self.key_prefix.trim();
        if prefix.is_empty() {
            return Err(anyhow!("auth.key_prefix must not be empty"));
        }
        if prefix.chars().any(|c| c.is_whitespace() || c == '/' || c == '+' || c == '=') {
            return Err(anyhow!("auth.key_prefix contains characters not allowed in keys"));
        }
        Ok(())
    }
}
