use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use url::Url;

use super::domain::{AttemptId, VideoKind, VideoRef};

/// Skills video as received from the candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoArtifact {
    Upload(VideoUpload),
    Link { url: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Persists uploaded video files.
#[async_trait]
pub trait VideoStore: Send + Sync {
    async fn store(
        &self,
        quiz_id: &AttemptId,
        upload: &VideoUpload,
        received_at: DateTime<Utc>,
    ) -> Result<VideoRef, VideoStoreError>;

    /// Drop a stored artifact that never made it onto the attempt.
    async fn discard(&self, video: &VideoRef) -> Result<(), VideoStoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum VideoStoreError {
    #[error("video storage failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Writes uploads to `<root>/<quiz_id>_<file name>`.
#[derive(Debug, Clone)]
pub struct LocalVideoStore {
    root: PathBuf,
}

impl LocalVideoStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl VideoStore for LocalVideoStore {
    async fn store(
        &self,
        quiz_id: &AttemptId,
        upload: &VideoUpload,
        received_at: DateTime<Utc>,
    ) -> Result<VideoRef, VideoStoreError> {
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self
            .root
            .join(format!("{}_{}", quiz_id, sanitize_file_name(&upload.file_name)));
        tokio::fs::write(&path, &upload.bytes).await?;

        Ok(VideoRef {
            kind: VideoKind::Upload,
            location: path.to_string_lossy().into_owned(),
            received_at,
        })
    }

    async fn discard(&self, video: &VideoRef) -> Result<(), VideoStoreError> {
        match tokio::fs::remove_file(&video.location).await {
            Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }
}

/// Keep only the final path component and a conservative character set.
pub fn sanitize_file_name(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "video.bin".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Extract the video id from a YouTube watch, shorts, embed, or youtu.be link.
pub fn youtube_video_id(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    let host = url.host_str()?.trim_start_matches("www.").trim_start_matches("m.");

    let id = match host {
        "youtu.be" => url.path_segments()?.next().map(str::to_string),
        "youtube.com" => {
            let mut segments = url.path_segments()?;
            match segments.next() {
                Some("watch") => url
                    .query_pairs()
                    .find(|(key, _)| key == "v")
                    .map(|(_, value)| value.into_owned()),
                Some("shorts") | Some("embed") => segments.next().map(str::to_string),
                _ => None,
            }
        }
        _ => None,
    }?;

    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    valid.then_some(id)
}
