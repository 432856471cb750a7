use super::DraftError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn mime_prefix(self) -> &'static str {
        match self {
            MediaKind::Image => "image/",
            MediaKind::Video => "video/",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Size ceiling for one selection. Ceilings belong to the call site, not the
/// pipeline: each field that accepts media passes its own limits in.
#[derive(Debug, Clone, Copy)]
pub struct MediaLimits {
    pub max_bytes: u64,
}

impl MediaLimits {
    pub fn from_env(kind: MediaKind) -> Self {
        let (var, default) = match kind {
            MediaKind::Image => ("MAX_IMAGE_BYTES", 10 * 1024 * 1024),
            MediaKind::Video => ("MAX_VIDEO_BYTES", 100 * 1024 * 1024),
        };
        let max_bytes = std::env::var(var)
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(default);
        Self { max_bytes }
    }
}

/// One file picked by the user, already read into memory.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// All-or-nothing check over a selection: the first invalid file rejects the
/// whole batch, before any preview handle is minted.
pub fn validate_batch(
    files: &[SelectedFile],
    kind: MediaKind,
    limits: MediaLimits,
) -> Result<(), DraftError> {
    for file in files {
        if !file.content_type.starts_with(kind.mime_prefix()) {
            return Err(DraftError::InvalidMediaType {
                content_type: file.content_type.clone(),
                kind,
            });
        }
        if file.size() > limits.max_bytes {
            return Err(DraftError::MediaTooLarge {
                file_name: file.file_name.clone(),
                size: file.size(),
                limit: limits.max_bytes,
            });
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UploadStatus {
    Pending,
    Confirmed { url: String },
    Failed { reason: String },
}

/// Bookkeeping for one selected file: the preview handle shown immediately,
/// the ordinal it was inserted at, and where the upload stands. The ticket
/// is the only handle the upload task keeps; dropping the slot abandons the
/// upload, so a late completion has nowhere to land.
#[derive(Debug, Clone, Serialize)]
pub struct UploadSlot {
    pub ticket: Uuid,
    pub preview: String,
    pub ordinal: usize,
    #[serde(flatten)]
    pub status: UploadStatus,
}

/// Ephemeral local handle, never submitted anywhere.
pub fn mint_preview_handle(file_name: &str) -> String {
    format!(
        "preview://{}/{}",
        Uuid::new_v4().simple(),
        urlencoding::encode(file_name)
    )
}
