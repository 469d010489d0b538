//! Environment-driven server configuration.

pub struct Config {
    pub port: u16,
    pub redis_url: String,
    pub webdriver_url: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: std::env::var("KBC_PORT")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(8008),
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            webdriver_url: std::env::var("WEBDRIVER_URL")
                .unwrap_or_else(|_| "http://localhost:9515".to_string()),
        }
    }
}
