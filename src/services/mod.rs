//! External service integrations

pub mod jellyfin;
pub mod rate_limiter;

pub use jellyfin::{
    ApiError, JellyfinClient, MediaServer, MediaSource, MediaStream, MovieItem, PlaybackInfo,
};
pub use rate_limiter::{RateLimitConfig, RateLimitedClient};
