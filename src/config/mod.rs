use std::env;

/// Default bound of every connection's outbound queue.
pub const DEFAULT_OUTBOUND_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub database_url: String,
    pub session_cookie_name: String,
    pub outbound_queue_capacity: usize,
    pub max_db_connections: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "0.0.0.0".to_string(),
            server_port: 8080,
            database_url: "sqlite://social.db".to_string(),
            session_cookie_name: "session_token".to_string(),
            outbound_queue_capacity: DEFAULT_OUTBOUND_QUEUE_CAPACITY,
            max_db_connections: 5,
        }
    }
}

impl Config {
    /// Load configuration from the environment, reading a `.env` file first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let server_port = match lookup("SERVER_PORT") {
            Some(port) => port.parse().map_err(|_| ConfigError::InvalidPort(port))?,
            None => defaults.server_port,
        };

        let outbound_queue_capacity = match lookup("OUTBOUND_QUEUE_CAPACITY") {
            Some(raw) => match raw.parse::<usize>() {
                Ok(capacity) if capacity > 0 => capacity,
                _ => return Err(ConfigError::InvalidQueueCapacity(raw)),
            },
            None => defaults.outbound_queue_capacity,
        };

        Ok(Self {
            server_host: lookup("SERVER_HOST").unwrap_or(defaults.server_host),
            server_port,
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            session_cookie_name: lookup("SESSION_COOKIE_NAME")
                .unwrap_or(defaults.session_cookie_name),
            outbound_queue_capacity,
            max_db_connections: lookup("MAX_DB_CONNECTIONS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_db_connections),
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid port number: {0}")]
    InvalidPort(String),
    #[error("Outbound queue capacity must be a positive integer, got {0}")]
    InvalidQueueCapacity(String),
}
