use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::Deserialize;
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub booking: BookingConfig,
    pub google: Option<GoogleConfig>,
    pub email: Option<EmailConfig>,
    pub turnstile: Option<TurnstileConfig>,
    pub app: AppConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
}

/// Scheduling settings that vary per deployment. The fixed policy
/// constants (horizons, lead time, buffer) live in the availability and
/// booking modules.
#[derive(Debug, Clone, Deserialize)]
pub struct BookingConfig {
    /// Timezone the availability settings are authored in.
    pub owner_timezone: Tz,
    /// Public base URL used to build verification/approval links and
    /// post-click redirect targets.
    pub public_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    /// Calendars consulted for free/busy. Empty means just `primary`.
    pub calendar_ids: Vec<String>,
    /// Calendar that approved meetings are inserted into.
    pub target_calendar_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub resend_api_key: String,
    pub from_address: String,
    pub owner_email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TurnstileConfig {
    pub secret_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub name: String,
    pub environment: Environment,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let host = env::var("SERVER_HOST")
            .unwrap_or_else(|_| "0.0.0.0".to_string())
            .parse::<IpAddr>()
            .context("Failed to parse SERVER_HOST")?;

        let port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse::<u16>()
            .context("Failed to parse SERVER_PORT")?;

        let db_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let db_max_connections = match env::var("DATABASE_MAX_CONNECTIONS") {
            Ok(val) => Some(
                val.parse()
                    .context("Failed to parse DATABASE_MAX_CONNECTIONS")?,
            ),
            Err(_) => Some(10),
        };
        let db_min_connections = match env::var("DATABASE_MIN_CONNECTIONS") {
            Ok(val) => Some(
                val.parse()
                    .context("Failed to parse DATABASE_MIN_CONNECTIONS")?,
            ),
            Err(_) => Some(1),
        };

        let owner_timezone = env::var("OWNER_TIMEZONE")
            .unwrap_or_else(|_| "America/New_York".to_string())
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("Failed to parse OWNER_TIMEZONE: {e}"))?;

        let public_url = env::var("PUBLIC_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string();

        // Google Calendar credentials (optional): without them the
        // service computes availability from stored settings alone.
        let google = if let Ok(client_id) = env::var("GOOGLE_CLIENT_ID") {
            let client_secret = env::var("GOOGLE_CLIENT_SECRET")
                .context("GOOGLE_CLIENT_SECRET must be set when GOOGLE_CLIENT_ID is provided")?;
            let refresh_token = env::var("GOOGLE_REFRESH_TOKEN")
                .context("GOOGLE_REFRESH_TOKEN must be set when GOOGLE_CLIENT_ID is provided")?;
            let calendar_ids = env::var("GOOGLE_CALENDAR_IDS")
                .map(|ids| {
                    ids.split(',')
                        .map(|id| id.trim().to_string())
                        .filter(|id| !id.is_empty())
                        .collect()
                })
                .unwrap_or_default();
            let target_calendar_id =
                env::var("GOOGLE_CALENDAR_TARGET_ID").unwrap_or_else(|_| "primary".to_string());

            Some(GoogleConfig {
                client_id,
                client_secret,
                refresh_token,
                calendar_ids,
                target_calendar_id,
            })
        } else {
            None
        };

        // Email delivery (optional): without an API key sends are logged
        // instead of delivered.
        let email = if let Ok(resend_api_key) = env::var("RESEND_API_KEY") {
            let owner_email = env::var("OWNER_EMAIL")
                .context("OWNER_EMAIL must be set when RESEND_API_KEY is provided")?;
            let from_address =
                env::var("EMAIL_FROM").unwrap_or_else(|_| "onboarding@resend.dev".to_string());

            Some(EmailConfig {
                resend_api_key,
                from_address,
                owner_email,
            })
        } else {
            None
        };

        let turnstile = env::var("TURNSTILE_SECRET_KEY")
            .ok()
            .map(|secret_key| TurnstileConfig { secret_key });

        let environment = env::var("APP_ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string())
            .parse::<Environment>()
            .unwrap_or(Environment::Development);

        let app_name = env::var("APP_NAME").unwrap_or_else(|_| "meetline".to_string());

        Ok(Config {
            server: ServerConfig { host, port },
            database: DatabaseConfig {
                url: db_url,
                max_connections: db_max_connections,
                min_connections: db_min_connections,
            },
            booking: BookingConfig {
                owner_timezone,
                public_url,
            },
            google,
            email,
            turnstile,
            app: AppConfig {
                name: app_name,
                environment,
            },
        })
    }

    pub fn server_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server.host, self.server.port)
    }

    #[allow(unused)]
    pub fn is_production(&self) -> bool {
        self.app.environment == Environment::Production
    }

    #[allow(unused)]
    pub fn is_development(&self) -> bool {
        self.app.environment == Environment::Development
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::Development
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" => Ok(Environment::Production),
            "staging" => Ok(Environment::Staging),
            "development" => Ok(Environment::Development),
            _ => Err(format!("Unknown environment: {}", s)),
        }
    }
}

// Use once_cell for a global config instance that's initialized once
use once_cell::sync::OnceCell;

static CONFIG: OnceCell<Config> = OnceCell::new();

pub fn init() -> Result<&'static Config> {
    CONFIG.get_or_try_init(Config::from_env)
}

pub fn get() -> &'static Config {
    CONFIG.get().expect("Config is not initialized")
}
