pub mod import;
pub mod item;
pub mod media;
pub mod step;
pub mod store;
pub mod variant;

pub use item::{ItemDraft, ItemPatch};
pub use media::{MediaKind, MediaLimits, SelectedFile};
pub use step::{FlowKind, Step};
pub use store::{DraftStore, RequestDraft};
pub use variant::{AttributeName, PredefinedAttribute, RowPatch, RowSelection};

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DraftError {
    #[error("`{content_type}` is not an accepted {kind} type")]
    InvalidMediaType {
        content_type: String,
        kind: MediaKind,
    },
    #[error("`{file_name}` is {size} bytes, over the {limit}-byte ceiling")]
    MediaTooLarge {
        file_name: String,
        size: u64,
        limit: u64,
    },
    #[error("no item with id {0}")]
    UnknownItem(Uuid),
    #[error("{0}")]
    Validation(String),
}

impl DraftError {
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidMediaType { .. } => "invalid_media_type",
            Self::MediaTooLarge { .. } => "media_too_large",
            Self::UnknownItem(_) => "unknown_item",
            Self::Validation(_) => "validation",
        }
    }
}
