//! Per-movie validation: probe, classify, tag, archive, pace.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::archive::DefectArchive;
use crate::services::{MediaServer, MovieItem, PlaybackInfo};

/// Classification policy over a playback probe response.
///
/// A movie is playable when the probe returned a media source whose first
/// candidate has a resolved path, a positive size, and a video stream, and
/// the response carries no error code. This is the single place the policy
/// lives; orchestration never inspects probe responses directly.
pub fn playable(playback: &PlaybackInfo) -> bool {
    if playback.error_code.is_some() {
        return false;
    }
    let Some(source) = playback.media_sources.first() else {
        return false;
    };
    source.path.as_deref().is_some_and(|p| !p.is_empty())
        && source.size.is_some_and(|s| s > 0)
        && source.media_streams.iter().any(|s| s.kind == "Video")
}

/// Validates one movie at a time and handles the defect side effects.
pub struct MovieValidator {
    server: Arc<dyn MediaServer>,
    archive: DefectArchive,
    defect_tag: String,
    pause_between: Duration,
    cancel: CancellationToken,
}

impl MovieValidator {
    pub fn new(
        server: Arc<dyn MediaServer>,
        archive: DefectArchive,
        defect_tag: impl Into<String>,
        pause_between: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            server,
            archive,
            defect_tag: defect_tag.into(),
            pause_between,
            cancel,
        }
    }

    /// Probe one movie and classify it. Returns true when playable.
    ///
    /// Probe failures classify the movie as defective and are not retried
    /// within the run. Always paces before returning, whatever the outcome.
    pub async fn validate(&self, movie: &MovieItem) -> bool {
        info!(movie = %movie.name, year = ?movie.year, "Validating");

        let is_playable = match self.server.playback_info(&movie.id).await {
            Ok(playback) => playable(&playback),
            Err(e) => {
                warn!(movie = %movie.name, error = %e, "Playback probe failed");
                false
            }
        };

        if is_playable {
            debug!(movie = %movie.name, "Playback OK");
        } else {
            warn!(movie = %movie.name, "Defect found");
            self.handle_defect(movie).await;
        }

        self.pace().await;
        is_playable
    }

    /// Tag the movie on the server and archive it locally. A failed tag
    /// never blocks the archive write.
    async fn handle_defect(&self, movie: &MovieItem) {
        match self.server.add_tag(&movie.id, &self.defect_tag).await {
            Ok(true) => {
                info!(movie = %movie.name, tag = %self.defect_tag, "Tagged defective movie");
            }
            Ok(false) => {
                warn!(movie = %movie.name, tag = %self.defect_tag, "Server refused tag");
            }
            Err(e) => {
                error!(movie = %movie.name, error = %e, "Failed to tag defective movie");
            }
        }

        if let Err(e) = self.archive.record(movie) {
            error!(movie = %movie.name, error = %e, "Failed to write defect archive");
        }
    }

    /// Inter-item pacing delay; returns early when the run is cancelled.
    async fn pace(&self) {
        if self.pause_between.is_zero() {
            return;
        }
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = tokio::time::sleep(self.pause_between) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use reqwest::StatusCode;
    use tempfile::tempdir;

    use super::*;
    use crate::services::{ApiError, MediaSource, MediaStream};

    fn playable_info() -> PlaybackInfo {
        PlaybackInfo {
            media_sources: vec![MediaSource {
                path: Some("/movies/alien.mkv".to_string()),
                size: Some(734_003_200),
                media_streams: vec![
                    MediaStream {
                        kind: "Video".to_string(),
                    },
                    MediaStream {
                        kind: "Audio".to_string(),
                    },
                ],
            }],
            error_code: None,
        }
    }

    #[test]
    fn test_playable_accepts_complete_source() {
        assert!(playable(&playable_info()));
    }

    #[test]
    fn test_playable_rejects_empty_sources() {
        assert!(!playable(&PlaybackInfo::default()));
    }

    #[test]
    fn test_playable_rejects_missing_path() {
        let mut playback = playable_info();
        playback.media_sources[0].path = None;
        assert!(!playable(&playback));

        playback.media_sources[0].path = Some(String::new());
        assert!(!playable(&playback));
    }

    #[test]
    fn test_playable_rejects_zero_size() {
        let mut playback = playable_info();
        playback.media_sources[0].size = Some(0);
        assert!(!playable(&playback));

        playback.media_sources[0].size = None;
        assert!(!playable(&playback));
    }

    #[test]
    fn test_playable_requires_video_stream() {
        let mut playback = playable_info();
        playback.media_sources[0].media_streams = vec![MediaStream {
            kind: "Audio".to_string(),
        }];
        assert!(!playable(&playback));
    }

    #[test]
    fn test_playable_rejects_error_code() {
        let mut playback = playable_info();
        playback.error_code = Some("NoCompatibleStream".to_string());
        assert!(!playable(&playback));
    }

    /// Stub server with scriptable probe/tag behavior.
    struct StubServer {
        playback: Result<PlaybackInfo, ()>,
        tag_fails: bool,
        tags_added: AtomicUsize,
    }

    impl StubServer {
        fn returning(playback: PlaybackInfo) -> Self {
            Self {
                playback: Ok(playback),
                tag_fails: false,
                tags_added: AtomicUsize::new(0),
            }
        }

        fn probe_error() -> Self {
            Self {
                playback: Err(()),
                tag_fails: false,
                tags_added: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl MediaServer for StubServer {
        async fn list_movies(&self) -> Result<Vec<MovieItem>, ApiError> {
            Ok(vec![])
        }

        async fn playback_info(&self, _item_id: &str) -> Result<PlaybackInfo, ApiError> {
            self.playback
                .clone()
                .map_err(|_| ApiError::Status(StatusCode::INTERNAL_SERVER_ERROR))
        }

        async fn add_tag(&self, _item_id: &str, _tag: &str) -> Result<bool, ApiError> {
            if self.tag_fails {
                Err(ApiError::Status(StatusCode::BAD_GATEWAY))
            } else {
                self.tags_added.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            }
        }
    }

    fn movie() -> MovieItem {
        MovieItem {
            id: "m1".to_string(),
            name: "Alien".to_string(),
            path: "/movies/alien.mkv".to_string(),
            year: Some(1979),
        }
    }

    fn validator_with(server: Arc<StubServer>, dir: &tempfile::TempDir) -> MovieValidator {
        MovieValidator::new(
            server,
            DefectArchive::new(dir.path().join("defects.txt")),
            "DEFECTIVE",
            Duration::ZERO,
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn test_playable_movie_leaves_no_trace() {
        let dir = tempdir().unwrap();
        let server = Arc::new(StubServer::returning(playable_info()));
        let validator = validator_with(server.clone(), &dir);

        assert!(validator.validate(&movie()).await);
        assert!(!dir.path().join("defects.txt").exists());
        assert_eq!(server.tags_added.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_probe_archives_exactly_one_entry() {
        let dir = tempdir().unwrap();
        let server = Arc::new(StubServer::returning(PlaybackInfo::default()));
        let validator = validator_with(server.clone(), &dir);

        assert!(!validator.validate(&movie()).await);

        let contents = fs::read_to_string(dir.path().join("defects.txt")).unwrap();
        assert_eq!(contents.matches("- Alien (1979)").count(), 1);
        assert_eq!(server.tags_added.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_probe_error_classifies_defective() {
        let dir = tempdir().unwrap();
        let validator = validator_with(Arc::new(StubServer::probe_error()), &dir);

        assert!(!validator.validate(&movie()).await);
        assert!(dir.path().join("defects.txt").exists());
    }

    #[tokio::test]
    async fn test_tag_failure_does_not_block_archive() {
        let dir = tempdir().unwrap();
        let server = Arc::new(StubServer {
            playback: Ok(PlaybackInfo::default()),
            tag_fails: true,
            tags_added: AtomicUsize::new(0),
        });
        let validator = validator_with(server, &dir);

        assert!(!validator.validate(&movie()).await);

        let contents = fs::read_to_string(dir.path().join("defects.txt")).unwrap();
        assert!(contents.contains("- Alien (1979)"));
    }
}
