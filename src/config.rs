//! Service configuration, read once at startup.
//!
//! Every recognised option lives in the closed struct below. Missing
//! mandatory values abort startup; optional ones fall back to the defaults
//! noted next to each field.

use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub message_stream: MessageStreamConfig,
    pub http_client: HttpClientConfig,
    pub user_service: ServiceAddr,
    pub ticket_service: ServiceAddr,
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub db: u8,
}

#[derive(Debug, Clone)]
pub struct MessageStreamConfig {
    /// Broker bootstrap address list, comma separated.
    pub url: String,
    /// Logical exchange name; doubles as the consumer-group prefix.
    pub exchange: String,
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Per-request timeout in seconds.
    pub timeout: u64,
    /// Retry cap for transient upstream failures.
    pub threshold: u32,
}

#[derive(Debug, Clone)]
pub struct ServiceAddr {
    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            http: HttpConfig {
                port: parse_or("HTTP_PORT", 8080),
            },
            database: DatabaseConfig {
                host: mandatory("DB_HOST"),
                port: parse_or("DB_PORT", 5432),
                user: mandatory("DB_USER"),
                pass: mandatory("DB_PASS"),
                name: mandatory("DB_NAME"),
            },
            redis: RedisConfig {
                host: mandatory("REDIS_HOST"),
                port: parse_or("REDIS_PORT", 6379),
                password: optional("REDIS_PASSWORD"),
                db: parse_or("REDIS_DB", 0),
            },
            message_stream: MessageStreamConfig {
                url: mandatory("MESSAGE_STREAM_URL"),
                exchange: env::var("MESSAGE_STREAM_EXCHANGE")
                    .unwrap_or_else(|_| "loket".to_string()),
            },
            http_client: HttpClientConfig {
                timeout: parse_or("HTTP_CLIENT_TIMEOUT", 10),
                threshold: parse_or("HTTP_CLIENT_THRESHOLD", 3),
            },
            user_service: ServiceAddr {
                host: mandatory("USER_SERVICE_HOST"),
                port: parse_or("USER_SERVICE_PORT", 8081),
            },
            ticket_service: ServiceAddr {
                host: mandatory("TICKET_SERVICE_HOST"),
                port: parse_or("TICKET_SERVICE_PORT", 8082),
            },
        }
    }
}

impl DatabaseConfig {
    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.pass, self.host, self.port, self.name
        )
    }
}

impl RedisConfig {
    pub fn url(&self) -> String {
        if self.password.is_empty() {
            format!("redis://{}:{}/{}", self.host, self.port, self.db)
        } else {
            format!("redis://:{}@{}:{}/{}", self.password, self.host, self.port, self.db)
        }
    }
}

impl ServiceAddr {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

fn mandatory(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} is not set in the environment"))
}

fn optional(key: &str) -> String {
    env::var(key).unwrap_or_default()
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{key} has an unparseable value: {raw}")),
        Err(_) => default,
    }
}
