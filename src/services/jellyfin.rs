//! Jellyfin API client for movie listing, playback probing, and tagging
//!
//! The validation core consumes the server through the [MediaServer] trait;
//! [JellyfinClient] is the concrete implementation, authenticating every
//! request with an X-Emby-Token header. All calls flow through the
//! rate-limited client.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::rate_limiter::RateLimitedClient;

/// Device profile advertised when probing playback.
const MAX_STATIC_BITRATE: u64 = 140_000_000;
const MUSIC_TRANSCODING_BITRATE: u64 = 384_000;

/// Error kinds at the remote API boundary.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Connectivity failure, timeout, or response decode failure.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The server answered with a non-success status.
    #[error("server returned {0}")]
    Status(StatusCode),
}

/// One movie from the library listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieItem {
    pub id: String,
    pub name: String,
    /// Filesystem path as reported by the server; may be empty.
    pub path: String,
    pub year: Option<i32>,
}

/// Capability interface the validation core consumes.
#[async_trait]
pub trait MediaServer: Send + Sync {
    /// Full movie listing, in server sort order.
    async fn list_movies(&self) -> Result<Vec<MovieItem>, ApiError>;

    /// Playback probe for one item.
    async fn playback_info(&self, item_id: &str) -> Result<PlaybackInfo, ApiError>;

    /// Add `tag` to the item. Returns true when the tag is present after the
    /// call, including the already-present no-op case.
    async fn add_tag(&self, item_id: &str, tag: &str) -> Result<bool, ApiError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ItemsResponse {
    #[serde(default)]
    items: Vec<ItemDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ItemDto {
    id: String,
    name: Option<String>,
    path: Option<String>,
    production_year: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ItemDetailDto {
    #[serde(default)]
    tags: Vec<String>,
}

/// Normalized playback probe response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlaybackInfo {
    #[serde(default)]
    pub media_sources: Vec<MediaSource>,
    pub error_code: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaSource {
    pub path: Option<String>,
    pub size: Option<i64>,
    #[serde(default)]
    pub media_streams: Vec<MediaStream>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaStream {
    /// Stream kind as reported by the server: "Video", "Audio", "Subtitle".
    #[serde(rename = "Type")]
    pub kind: String,
}

/// Client for the Jellyfin HTTP API.
pub struct JellyfinClient {
    client: RateLimitedClient,
    base_url: String,
    user_id: String,
}

impl JellyfinClient {
    /// Build a client for `base_url`, authenticating every request with
    /// `api_key` and scoping listing/tag reads to `user_id`.
    pub fn new(
        base_url: &str,
        api_key: &str,
        user_id: &str,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "X-Emby-Token",
            HeaderValue::from_str(api_key).context("API key contains invalid characters")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(Self {
            client: RateLimitedClient::for_jellyfin(timeout, headers)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_id: user_id.to_string(),
        })
    }

    fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if !response.status().is_success() {
            return Err(ApiError::Status(response.status()));
        }
        Ok(response)
    }
}

#[async_trait]
impl MediaServer for JellyfinClient {
    async fn list_movies(&self) -> Result<Vec<MovieItem>, ApiError> {
        let url = format!("{}/Users/{}/Items", self.base_url, self.user_id);
        let query = [
            ("IncludeItemTypes", "Movie"),
            ("Recursive", "true"),
            ("Fields", "Path,ProductionYear"),
            ("SortBy", "SortName"),
            ("SortOrder", "Ascending"),
        ];

        let response = Self::check_status(self.client.get_with_query(&url, &query).await?)?;
        let data: ItemsResponse = response.json().await?;

        let movies: Vec<MovieItem> = data
            .items
            .into_iter()
            .map(|item| MovieItem {
                id: item.id,
                name: item.name.unwrap_or_else(|| "Unknown".to_string()),
                path: item.path.unwrap_or_default(),
                year: item.production_year,
            })
            .collect();

        info!(count = movies.len(), "Retrieved movie listing");
        Ok(movies)
    }

    async fn playback_info(&self, item_id: &str) -> Result<PlaybackInfo, ApiError> {
        let url = format!("{}/Items/{}/PlaybackInfo", self.base_url, item_id);
        let payload = json!({
            "UserId": self.user_id,
            "DeviceProfile": {
                "MaxStaticBitrate": MAX_STATIC_BITRATE,
                "MusicStreamingTranscodingBitrate": MUSIC_TRANSCODING_BITRATE,
            }
        });

        let response = Self::check_status(self.client.post_json(&url, &payload).await?)?;
        let playback: PlaybackInfo = response.json().await?;

        debug!(
            item = %item_id,
            sources = playback.media_sources.len(),
            "Playback probe completed"
        );
        Ok(playback)
    }

    async fn add_tag(&self, item_id: &str, tag: &str) -> Result<bool, ApiError> {
        // Read current tags first; adding an existing tag is a no-op.
        let url = format!("{}/Users/{}/Items/{}", self.base_url, self.user_id, item_id);
        let response = Self::check_status(self.client.get(&url).await?)?;
        let detail: ItemDetailDto = response.json().await?;

        let mut tags = detail.tags;
        if tags.iter().any(|t| t == tag) {
            info!(item = %item_id, tag = %tag, "Tag already present");
            return Ok(true);
        }
        tags.push(tag.to_string());

        let update_url = format!("{}/Items/{}", self.base_url, item_id);
        Self::check_status(self.client.post_json(&update_url, &json!({ "Tags": tags })).await?)?;

        info!(item = %item_id, tag = %tag, "Tag added");
        Ok(true)
    }
}
