//! Rate limiting for external API calls
//!
//! Wraps the HTTP client behind a token-bucket limiter so the tool can never
//! hammer the server, independent of the configured inter-item pause.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use reqwest::header::HeaderMap;
use reqwest::{Client, Response};
use tracing::debug;

/// Configuration for rate limiting
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests per second
    pub requests_per_second: u32,
    /// Burst capacity (allows short bursts above the rate)
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 2,
            burst_size: 5,
        }
    }
}

/// A rate-limited HTTP client wrapper
pub struct RateLimitedClient {
    client: Client,
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    name: String,
}

impl RateLimitedClient {
    /// Create a new rate-limited client with the given per-call timeout and
    /// default headers applied to every request
    pub fn new(
        name: &str,
        config: RateLimitConfig,
        timeout: Duration,
        default_headers: HeaderMap,
    ) -> Result<Self> {
        let quota = Quota::per_second(
            NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN),
        )
        .allow_burst(NonZeroU32::new(config.burst_size).unwrap_or(NonZeroU32::MIN));

        Ok(Self {
            client: Client::builder()
                .timeout(timeout)
                .default_headers(default_headers)
                .build()
                .context("Failed to create HTTP client")?,
            limiter: Arc::new(RateLimiter::direct(quota)),
            name: name.to_string(),
        })
    }

    /// Create a client for the Jellyfin API
    pub fn for_jellyfin(timeout: Duration, default_headers: HeaderMap) -> Result<Self> {
        // Jellyfin publishes no hard limits; stay conservative
        Self::new(
            "jellyfin",
            RateLimitConfig {
                requests_per_second: 4,
                burst_size: 8,
            },
            timeout,
            default_headers,
        )
    }

    /// Wait for rate limit and make a GET request
    pub async fn get(&self, url: &str) -> reqwest::Result<Response> {
        self.wait_for_permit().await;
        debug!(client = %self.name, url = %url, "Making rate-limited GET request");

        self.client.get(url).send().await
    }

    /// Wait for rate limit and make a GET request with query parameters
    pub async fn get_with_query<T: serde::Serialize + ?Sized>(
        &self,
        url: &str,
        query: &T,
    ) -> reqwest::Result<Response> {
        self.wait_for_permit().await;
        debug!(client = %self.name, url = %url, "Making rate-limited GET request with query");

        self.client.get(url).query(query).send().await
    }

    /// Wait for rate limit and make a POST request with a JSON body
    pub async fn post_json<T: serde::Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
    ) -> reqwest::Result<Response> {
        self.wait_for_permit().await;
        debug!(client = %self.name, url = %url, "Making rate-limited POST request");

        self.client.post(url).json(body).send().await
    }

    /// Wait for a rate limit permit
    pub async fn wait_for_permit(&self) {
        self.limiter.until_ready().await;
    }
}
