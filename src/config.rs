//! Application configuration loaded from environment variables.
//!
//! Configuration is loaded once at startup and validated before the server starts.
//!
//! ## Redis
//!
//! ```bash
//! export REDIS_URL="redis://localhost:6379/0"
//! ```
//!
//! or, component-wise:
//!
//! ```bash
//! export REDIS_HOST="localhost"
//! export REDIS_PORT="6379"
//! export REDIS_PASSWORD=""
//! export REDIS_DB="0"
//! ```
//!
//! Without Redis the service caches in process memory.
//!
//! ## Optional Variables
//!
//! - `LISTEN` - Bind address (default: `0.0.0.0:8080`)
//! - `RUST_LOG` - Log level (default: `info`)
//! - `LOG_FORMAT` - Log format: `text` or `json` (default: `text`)
//! - `BEHIND_PROXY` - Read client IP from forwarding headers (default: `false`)
//! - `UPSTREAM_BASE_URL` - Pokemon collection URL (default: `https://pokeapi.co/api/v2/pokemon`)
//! - `UPSTREAM_TIMEOUT_SECONDS` - Per-request upstream timeout (default: 10)
//! - `FETCH_CONCURRENCY` - Detail fetches in flight per page (default: 32)
//! - `CACHE_TTL_SECONDS` - Entry lifetime (default: 60)
//! - `MEMORY_CACHE_CAPACITY` - In-process cache size (default: 10000)
//! - `CIRCUIT_FAILURE_RATE_THRESHOLD` - Failure percentage that opens a breaker (default: 50)
//! - `CIRCUIT_SLIDING_WINDOW_SIZE` - Calls kept in the breaker window (default: 10)
//! - `CIRCUIT_MINIMUM_CALLS` - Calls required before the rate is evaluated (default: 5)
//! - `CIRCUIT_OPEN_TIMEOUT_SECONDS` - Cooldown before a probe is allowed (default: 60)
//!
//! ## Query Queue
//!
//! The queue consumer starts only when `QUEUE_URL` (the list name) is set.
//!
//! - `QUEUE_ENDPOINT` - Broker Redis URL (default: the cache Redis URL)
//! - `QUEUE_REGION` - Informational, reported in the summary
//! - `QUEUE_WAIT_TIME_SECONDS` - Long-poll duration (default: 20)
//! - `QUEUE_MAX_MESSAGES` - Batch size (default: 10)
//! - `QUEUE_VISIBILITY_TIMEOUT_SECONDS` - Processing deadline (default: 30)
//! - `QUEUE_WORKERS` - Consumer loops (default: 1)

use anyhow::Result;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::application::circuit_breaker::CircuitBreakerConfig;
use crate::application::query_worker::WorkerSettings;
use crate::application::services::ServiceSettings;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: String,
    pub log_level: String,
    pub log_format: String,
    /// When true, rate limiting reads client IP from X-Forwarded-For / X-Real-IP headers.
    /// Enable only when the service is behind a trusted reverse proxy.
    pub behind_proxy: bool,

    pub upstream_base_url: String,
    pub upstream_timeout_seconds: u64,
    pub fetch_concurrency: usize,

    pub redis_url: Option<String>,
    pub cache_ttl_seconds: u64,
    /// Entry capacity of the in-process fallback cache.
    pub memory_cache_capacity: u64,

    pub circuit_failure_rate_threshold: f64,
    pub circuit_sliding_window_size: usize,
    pub circuit_minimum_calls: usize,
    pub circuit_open_timeout_seconds: u64,

    // ── Query queue ─────────────────────────────────────────────────────────
    pub queue_url: Option<String>,
    pub queue_endpoint: Option<String>,
    pub queue_region: Option<String>,
    pub queue_wait_time_seconds: u64,
    pub queue_max_messages: usize,
    pub queue_visibility_timeout_seconds: u64,
    pub queue_workers: usize,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Kept fallible for parity with [`load_from_env`]; malformed numbers
    /// fall back to their defaults.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            listen_addr: env::var("LISTEN").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string()),
            behind_proxy: env::var("BEHIND_PROXY")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(false),

            upstream_base_url: env::var("UPSTREAM_BASE_URL")
                .unwrap_or_else(|_| "https://pokeapi.co/api/v2/pokemon".to_string()),
            upstream_timeout_seconds: env_or("UPSTREAM_TIMEOUT_SECONDS", 10),
            fetch_concurrency: env_or("FETCH_CONCURRENCY", 32),

            redis_url: Self::load_redis_url(),
            cache_ttl_seconds: env_or("CACHE_TTL_SECONDS", 60),
            memory_cache_capacity: env_or("MEMORY_CACHE_CAPACITY", 10_000),

            circuit_failure_rate_threshold: env_or("CIRCUIT_FAILURE_RATE_THRESHOLD", 50.0),
            circuit_sliding_window_size: env_or("CIRCUIT_SLIDING_WINDOW_SIZE", 10),
            circuit_minimum_calls: env_or("CIRCUIT_MINIMUM_CALLS", 5),
            circuit_open_timeout_seconds: env_or("CIRCUIT_OPEN_TIMEOUT_SECONDS", 60),

            queue_url: non_empty_var("QUEUE_URL"),
            queue_endpoint: non_empty_var("QUEUE_ENDPOINT"),
            queue_region: non_empty_var("QUEUE_REGION"),
            queue_wait_time_seconds: env_or("QUEUE_WAIT_TIME_SECONDS", 20),
            queue_max_messages: env_or("QUEUE_MAX_MESSAGES", 10),
            queue_visibility_timeout_seconds: env_or("QUEUE_VISIBILITY_TIMEOUT_SECONDS", 30),
            queue_workers: env_or("QUEUE_WORKERS", 1),
        })
    }

    /// Loads Redis URL with fallback to component-based configuration.
    ///
    /// Priority:
    /// 1. `REDIS_URL` environment variable
    /// 2. Constructed from `REDIS_HOST`, `REDIS_PORT`, `REDIS_PASSWORD`, `REDIS_DB`
    ///
    /// Returns `None` if Redis is not configured.
    fn load_redis_url() -> Option<String> {
        if let Ok(url) = env::var("REDIS_URL") {
            return Some(url);
        }

        let host = env::var("REDIS_HOST").ok()?;
        let port = env::var("REDIS_PORT").unwrap_or_else(|_| "6379".to_string());
        let db = env::var("REDIS_DB").unwrap_or_else(|_| "0".to_string());

        // Empty password means no authentication
        let url = match env::var("REDIS_PASSWORD") {
            Ok(pwd) if !pwd.is_empty() => format!("redis://:{}@{}:{}/{}", pwd, host, port, db),
            _ => format!("redis://{}:{}/{}", host, port, db),
        };

        Some(url)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if self.log_format != "text" && self.log_format != "json" {
            anyhow::bail!(
                "LOG_FORMAT must be 'text' or 'json', got '{}'",
                self.log_format
            );
        }

        if !self.listen_addr.contains(':') {
            anyhow::bail!(
                "LISTEN must be in format 'host:port', got '{}'",
                self.listen_addr
            );
        }

        match Url::parse(&self.upstream_base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => anyhow::bail!(
                "UPSTREAM_BASE_URL must be an absolute http(s) URL, got '{}'",
                self.upstream_base_url
            ),
        }

        if self.upstream_timeout_seconds == 0 {
            anyhow::bail!("UPSTREAM_TIMEOUT_SECONDS must be greater than 0");
        }

        if self.fetch_concurrency == 0 || self.fetch_concurrency > 256 {
            anyhow::bail!(
                "FETCH_CONCURRENCY must be between 1 and 256, got {}",
                self.fetch_concurrency
            );
        }

        for (name, url) in [
            ("REDIS_URL", self.redis_url.as_deref()),
            ("QUEUE_ENDPOINT", self.queue_endpoint.as_deref()),
        ] {
            if let Some(url) = url
                && !url.starts_with("redis://")
                && !url.starts_with("rediss://")
            {
                anyhow::bail!(
                    "{} must start with 'redis://' or 'rediss://', got '{}'",
                    name,
                    mask_connection_string(url)
                );
            }
        }

        if self.cache_ttl_seconds == 0 {
            anyhow::bail!("CACHE_TTL_SECONDS must be greater than 0");
        }

        if self.memory_cache_capacity == 0 {
            anyhow::bail!("MEMORY_CACHE_CAPACITY must be at least 1");
        }

        if !(self.circuit_failure_rate_threshold > 0.0
            && self.circuit_failure_rate_threshold <= 100.0)
        {
            anyhow::bail!(
                "CIRCUIT_FAILURE_RATE_THRESHOLD must be in (0, 100], got {}",
                self.circuit_failure_rate_threshold
            );
        }

        if self.circuit_sliding_window_size == 0 {
            anyhow::bail!("CIRCUIT_SLIDING_WINDOW_SIZE must be at least 1");
        }

        if self.circuit_minimum_calls == 0 {
            anyhow::bail!("CIRCUIT_MINIMUM_CALLS must be at least 1");
        }

        // The window never holds more outcomes than its size, so a larger
        // minimum would keep the breaker closed forever.
        if self.circuit_minimum_calls > self.circuit_sliding_window_size {
            anyhow::bail!(
                "CIRCUIT_MINIMUM_CALLS ({}) must not exceed CIRCUIT_SLIDING_WINDOW_SIZE ({})",
                self.circuit_minimum_calls,
                self.circuit_sliding_window_size
            );
        }

        if self.queue_url.is_some() {
            if self.queue_broker_url().is_none() {
                anyhow::bail!("QUEUE_URL requires QUEUE_ENDPOINT or a Redis cache configuration");
            }

            if !(1..=10).contains(&self.queue_max_messages) {
                anyhow::bail!(
                    "QUEUE_MAX_MESSAGES must be between 1 and 10, got {}",
                    self.queue_max_messages
                );
            }

            if self.queue_wait_time_seconds > 20 {
                anyhow::bail!(
                    "QUEUE_WAIT_TIME_SECONDS must be at most 20, got {}",
                    self.queue_wait_time_seconds
                );
            }

            if self.queue_visibility_timeout_seconds == 0 {
                anyhow::bail!("QUEUE_VISIBILITY_TIMEOUT_SECONDS must be greater than 0");
            }

            if self.queue_workers == 0 || self.queue_workers > 64 {
                anyhow::bail!(
                    "QUEUE_WORKERS must be between 1 and 64, got {}",
                    self.queue_workers
                );
            }
        }

        Ok(())
    }

    /// Broker used by the query consumer.
    pub fn queue_broker_url(&self) -> Option<&str> {
        self.queue_endpoint.as_deref().or(self.redis_url.as_deref())
    }

    pub fn circuit_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_rate_threshold: self.circuit_failure_rate_threshold,
            sliding_window_size: self.circuit_sliding_window_size,
            minimum_calls: self.circuit_minimum_calls,
            open_timeout: Duration::from_secs(self.circuit_open_timeout_seconds),
        }
    }

    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            cache_ttl: Duration::from_secs(self.cache_ttl_seconds),
            fetch_concurrency: self.fetch_concurrency,
        }
    }

    pub fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            wait_time: Duration::from_secs(self.queue_wait_time_seconds),
            max_messages: self.queue_max_messages,
            visibility_timeout: Duration::from_secs(self.queue_visibility_timeout_seconds),
            workers: self.queue_workers,
        }
    }

    /// Prints configuration summary (without sensitive data).
    pub fn print_summary(&self) {
        tracing::info!("Configuration loaded:");
        tracing::info!("  Listen address: {}", self.listen_addr);
        tracing::info!(
            "  Upstream: {} (timeout {}s, concurrency {})",
            self.upstream_base_url,
            self.upstream_timeout_seconds,
            self.fetch_concurrency
        );

        if let Some(ref redis_url) = self.redis_url {
            tracing::info!("  Redis: {} (enabled)", mask_connection_string(redis_url));
        } else {
            tracing::info!(
                "  Redis: disabled (in-memory cache, capacity {})",
                self.memory_cache_capacity
            );
        }
        tracing::info!("  Cache TTL: {}s", self.cache_ttl_seconds);

        tracing::info!(
            "  Circuit breaker: {}% over {} calls (min {}), open for {}s",
            self.circuit_failure_rate_threshold,
            self.circuit_sliding_window_size,
            self.circuit_minimum_calls,
            self.circuit_open_timeout_seconds
        );

        match (&self.queue_url, self.queue_broker_url()) {
            (Some(queue), Some(broker)) => tracing::info!(
                "  Queue: '{}' on {} (region {}, {} worker(s))",
                queue,
                mask_connection_string(broker),
                self.queue_region.as_deref().unwrap_or("-"),
                self.queue_workers
            ),
            _ => tracing::info!("  Queue: disabled"),
        }

        tracing::info!("  Log level: {}", self.log_level);
        tracing::info!("  Log format: {}", self.log_format);
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Masks sensitive information in connection strings for logging.
///
/// Replaces password with `***` in URLs like
/// `redis://:password@host:port/db` → `redis://:***@host:port/db`.
fn mask_connection_string(url: &str) -> String {
    if let Some(start) = url.find("://") {
        let scheme_end = start + 3;
        let rest = &url[scheme_end..];

        if let Some(at_pos) = rest.find('@') {
            let credentials = &rest[..at_pos];
            let host_part = &rest[at_pos..];

            if let Some(colon_pos) = credentials.rfind(':') {
                let username = &credentials[..colon_pos];
                return format!("{}://{}:***{}", &url[..start], username, host_part);
            }
        }
    }

    url.to_string()
}

/// Loads and validates configuration from environment variables.
///
/// # Errors
///
/// Returns an error if validation fails.
///
/// # Note
///
/// This function expects environment variables to be already loaded
/// (e.g., via `dotenvy::dotenv()` in `main.rs`).
pub fn load_from_env() -> Result<Config> {
    let config = Config::from_env()?;
    config.validate()?;
    Ok(config)
}
