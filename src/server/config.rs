use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tonic::Status;

use crate::token::SigningKey;
use crate::Result;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Hostname or IP address to bind to.
    pub host: String,
    /// Port number to listen on.
    pub port: u16,
    /// Challenge lifecycle settings.
    pub challenge: ChallengeSettings,
    /// Bearer token settings.
    pub token: TokenSettings,
    /// Rate limiting configuration.
    pub rate_limit: RateLimitSettings,
    /// Metrics exporter configuration.
    pub metrics: MetricsSettings,
}

impl ServerConfig {
    /// Converts host and port into a socket address.
    ///
    /// # Panics
    /// Panics if the host and port cannot be parsed into a valid socket
    /// address, which only happens with malformed configuration.
    pub fn addr(&self) -> SocketAddr {
        format!("{}:{}", self.host, self.port)
            .parse()
            .unwrap_or_else(|e| {
                panic!(
                    "Invalid server address configuration (host: {}, port: {}): {}",
                    self.host, self.port, e
                )
            })
    }

    /// Loads configuration from `.env` file, TOML file, and environment
    /// variables.
    ///
    /// Priority (highest to lowest): `SERVER_`-prefixed environment variables,
    /// the TOML file named by `SERVER_CONFIG_PATH` (default
    /// `config/server.toml`), `.env` contents, built-in defaults. Missing
    /// files are silently skipped.
    ///
    /// Nested keys use a double underscore in environment variables, since
    /// the key names themselves contain single underscores:
    ///
    /// ```text
    /// SERVER_PORT=8080
    /// SERVER_CHALLENGE__TTL_SECS=60
    /// SERVER_TOKEN__LIFETIME_SECS=1800
    /// SERVER_RATE_LIMIT__REQUESTS_PER_MINUTE=200
    /// SERVER_RATE_LIMIT__BURST=20
    /// SERVER_METRICS__ENABLED=true
    /// ```
    #[allow(clippy::result_large_err)]
    pub fn from_env() -> figment::error::Result<Self> {
        use figment::providers::{Env, Format, Serialized, Toml};
        use figment::Figment;

        let _ = dotenvy::dotenv();

        let config_path = std::env::var("SERVER_CONFIG_PATH")
            .unwrap_or_else(|_| "config/server.toml".to_string());

        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(&config_path).nested())
            .merge(Env::prefixed("SERVER_").split("__"))
            .extract()
    }

    /// Validates the configuration for production readiness.
    pub fn validate(&self) -> core::result::Result<(), String> {
        if self.challenge.ttl_secs == 0 {
            return Err("Challenge ttl_secs cannot be zero".to_string());
        }

        if self.token.lifetime_secs == 0 {
            return Err("Token lifetime_secs cannot be zero".to_string());
        }

        if !self.token.secret.is_empty() && hex::decode(&self.token.secret).is_err() {
            return Err("Token secret must be hex-encoded".to_string());
        }

        if self.rate_limit.requests_per_minute == 0 {
            return Err("Rate limit requests_per_minute cannot be zero".to_string());
        }

        if self.rate_limit.burst == 0 {
            return Err("Rate limit burst cannot be zero".to_string());
        }

        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 50051,
            challenge: ChallengeSettings { ttl_secs: 120 },
            token: TokenSettings {
                secret: String::new(),
                lifetime_secs: 3600,
            },
            rate_limit: RateLimitSettings {
                requests_per_minute: 100,
                burst: 10,
            },
            metrics: MetricsSettings {
                enabled: false,
                host: "127.0.0.1".to_string(),
                port: 9090,
            },
        }
    }
}

/// Challenge lifecycle settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChallengeSettings {
    /// Seconds a challenge stays redeemable after issuance.
    pub ttl_secs: u64,
}

/// Bearer token settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenSettings {
    /// Hex-encoded signing secret. Empty means a fresh random key per
    /// process, which invalidates outstanding tokens on restart.
    pub secret: String,
    /// Seconds an issued token stays valid.
    pub lifetime_secs: u64,
}

impl TokenSettings {
    /// Builds the signing key these settings describe.
    pub fn signing_key(&self) -> Result<SigningKey> {
        if self.secret.is_empty() {
            Ok(SigningKey::random())
        } else {
            SigningKey::from_hex(&self.secret)
        }
    }
}

/// Rate limiting settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RateLimitSettings {
    /// Maximum requests per minute per client.
    pub requests_per_minute: u64,
    /// Burst capacity for short-term spikes.
    pub burst: u64,
}

impl RateLimitSettings {
    /// Creates a rate limiter from these settings.
    pub fn build_limiter(&self) -> RateLimiter {
        RateLimiter::new(self.requests_per_minute, self.burst)
    }
}

/// Metrics exporter settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetricsSettings {
    /// Whether metrics export is enabled.
    pub enabled: bool,
    /// Hostname or IP address for the metrics server.
    pub host: String,
    /// Port number for the metrics server.
    pub port: u16,
}

impl MetricsSettings {
    /// Converts host and port into a socket address for the metrics server.
    ///
    /// # Panics
    /// Panics if the host and port cannot be parsed into a valid socket
    /// address, which only happens with malformed configuration.
    pub fn addr(&self) -> SocketAddr {
        format!("{}:{}", self.host, self.port)
            .parse()
            .unwrap_or_else(|e| {
                panic!(
                    "Invalid metrics address configuration (host: {}, port: {}): {}",
                    self.host, self.port, e
                )
            })
    }
}

/// Rate limiter using the token bucket algorithm.
///
/// Thread-safe and suitable for concurrent access.
#[derive(Clone)]
pub struct RateLimiter {
    state: Arc<Mutex<RateLimiterState>>,
    rate: u64,
    burst: u64,
}

struct RateLimiterState {
    tokens: f64,
    last_update: Instant,
}

impl RateLimiter {
    /// Creates a new rate limiter.
    ///
    /// # Arguments
    /// * `requests_per_minute` - Maximum sustained request rate
    /// * `burst` - Maximum burst capacity
    pub fn new(requests_per_minute: u64, burst: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(RateLimiterState {
                tokens: burst as f64,
                last_update: Instant::now(),
            })),
            rate: requests_per_minute,
            burst,
        }
    }

    /// Attempts to acquire a token for a request.
    #[allow(clippy::result_large_err)]
    pub async fn check_rate_limit(&self) -> core::result::Result<(), Status> {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_update).as_secs_f64();

        let tokens_per_second = self.rate as f64 / 60.0;
        state.tokens = (state.tokens + elapsed * tokens_per_second).min(self.burst as f64);

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            state.last_update = now;
            Ok(())
        } else {
            Err(Status::resource_exhausted("Rate limit exceeded"))
        }
    }
}
