/// Configuration management for the API server
///
/// Loaded from environment variables, with an optional `.env` file for
/// development.
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: 10)
/// - `API_HOST` / `API_PORT`: bind address (default: 0.0.0.0:8080)
/// - `APP_BASE_URL`: public URL used in sign-in links (default: http://localhost:8080)
/// - `CORS_ORIGINS`: comma-separated allowed origins, `*` for any (default: *)
/// - `PRODUCTION`: `true` enables HSTS (default: false)
/// - `JWT_SECRET`: session signing key, at least 32 characters (required)
/// - `MAGIC_LINK_TTL_MINUTES`: sign-in link lifetime (default: 15)
/// - `EMAIL_API_URL`, `EMAIL_API_KEY`, `EMAIL_FROM`: transactional email
///   provider; without a key, sign-in links are only logged
/// - `RUST_LOG`, `LOG_FORMAT`: read by `main` when setting up tracing
///
/// # Example
///
/// ```no_run
/// use cofound_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::env;

/// Default transactional email endpoint
pub const DEFAULT_EMAIL_API_URL: &str = "https://api.resend.com/emails";

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub magic_link: MagicLinkConfig,
    pub email: EmailConfig,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Public URL of this server, without trailing slash
    pub base_url: String,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,

    /// Enables production-only headers
    pub production: bool,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// JWT configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Signing key, at least 32 bytes. Generate with `openssl rand -hex 32`.
    #[serde(skip_serializing)]
    pub secret: String,
}

/// Magic-link sign-in configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MagicLinkConfig {
    pub ttl_minutes: i64,
}

/// Transactional email configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub api_url: String,

    /// None disables delivery; links are logged instead
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    pub from: String,
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

impl Config {
    /// Loads configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value does
    /// not parse
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let port = var("API_PORT", "8080")
            .parse::<u16>()
            .context("API_PORT must be a port number")?;

        let base_url = var("APP_BASE_URL", "http://localhost:8080")
            .trim_end_matches('/')
            .to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            anyhow::bail!("APP_BASE_URL must start with http:// or https://");
        }

        let cors_origins = var("CORS_ORIGINS", "*")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let database_url = lookup("DATABASE_URL")
            .context("DATABASE_URL environment variable is required")?;

        let max_connections = var("DATABASE_MAX_CONNECTIONS", "10")
            .parse::<u32>()
            .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?;

        let jwt_secret =
            lookup("JWT_SECRET").context("JWT_SECRET environment variable is required")?;
        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let ttl_minutes = var("MAGIC_LINK_TTL_MINUTES", "15")
            .parse::<i64>()
            .context("MAGIC_LINK_TTL_MINUTES must be an integer")?;
        if ttl_minutes <= 0 {
            anyhow::bail!("MAGIC_LINK_TTL_MINUTES must be positive");
        }

        Ok(Self {
            api: ApiConfig {
                host: var("API_HOST", "0.0.0.0"),
                port,
                base_url,
                cors_origins,
                production: parse_bool(&var("PRODUCTION", "false")),
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            jwt: JwtConfig { secret: jwt_secret },
            magic_link: MagicLinkConfig { ttl_minutes },
            email: EmailConfig {
                api_url: var("EMAIL_API_URL", DEFAULT_EMAIL_API_URL),
                api_key: lookup("EMAIL_API_KEY").filter(|k| !k.is_empty()),
                from: var("EMAIL_FROM", "Cofound <login@localhost>"),
            },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Sign-in link lifetime
    pub fn magic_link_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.magic_link.ttl_minutes)
    }

    /// Minimal configuration for tests
    pub fn for_tests(database_url: impl Into<String>) -> Self {
        Self {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                base_url: "http://localhost:8080".to_string(),
                cors_origins: vec!["*".to_string()],
                production: false,
            },
            database: DatabaseConfig {
                url: database_url.into(),
                max_connections: 5,
            },
            jwt: JwtConfig {
                secret: "test-secret-key-at-least-32-bytes-long".to_string(),
            },
            magic_link: MagicLinkConfig { ttl_minutes: 15 },
            email: EmailConfig {
                api_url: DEFAULT_EMAIL_API_URL.to_string(),
                api_key: None,
                from: "Cofound <login@localhost>".to_string(),
            },
        }
    }
}
