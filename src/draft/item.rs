use super::DraftError;
use super::media::{UploadSlot, UploadStatus, mint_preview_handle};
use super::variant::VariantAttributeSet;
use serde::Deserialize;
use serde::Serialize;
use serde_with::skip_serializing_none;
use uuid::Uuid;

pub const QUANTITY_MIN: u32 = 1;
pub const QUANTITY_MAX: u32 = 10;

/// One product entry within a draft. The id is minted locally and is the
/// sole handle callers use to address the item; positions shift on removal,
/// ids never do.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct ItemDraft {
    pub id: Uuid,
    pub link: Option<String>,
    pub source_platform: String,
    pub name: String,
    pub description: String,
    pub quantity: u32,
    pub product_url: Option<String>,
    /// Confirmed remote URLs, the only media list that is ever submitted.
    /// Ordered by upload completion, not by selection.
    pub images: Vec<String>,
    /// Ephemeral preview handles, strictly in selection order.
    pub local_previews: Vec<String>,
    pub variant_attributes: VariantAttributeSet,
    pub uploads: Vec<UploadSlot>,
}

/// Partial field mutation for one item. Applying the patch is the one edit
/// boundary that validates; a rejected patch leaves the item untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub link: Option<String>,
}

impl ItemDraft {
    pub fn empty() -> Self {
        Self {
            id: Uuid::new_v4(),
            link: None,
            source_platform: String::new(),
            name: String::new(),
            description: String::new(),
            quantity: QUANTITY_MIN,
            product_url: None,
            images: Vec::new(),
            local_previews: Vec::new(),
            variant_attributes: VariantAttributeSet::default(),
            uploads: Vec::new(),
        }
    }

    pub fn linked(link: &str) -> Self {
        let mut item = Self::empty();
        item.source_platform = source_platform(link);
        item.product_url = Some(link.to_string());
        item.link = Some(link.to_string());
        item
    }

    pub fn is_blank(&self) -> bool {
        self.name.trim().is_empty()
    }

    pub fn apply(&mut self, patch: ItemPatch) -> Result<(), DraftError> {
        if let Some(quantity) = patch.quantity
            && !(QUANTITY_MIN..=QUANTITY_MAX).contains(&quantity)
        {
            return Err(DraftError::validation(format!(
                "quantity must be between {QUANTITY_MIN} and {QUANTITY_MAX}"
            )));
        }
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(quantity) = patch.quantity {
            self.quantity = quantity;
        }
        if let Some(link) = patch.link {
            self.source_platform = source_platform(&link);
            self.product_url = Some(link.clone());
            self.link = Some(link);
        }
        Ok(())
    }

    /// Mints a preview handle for one accepted file and registers its upload
    /// slot. The preview lands before any network call starts; the returned
    /// ticket is what the upload task reports back with.
    pub(crate) fn begin_upload(&mut self, file_name: &str) -> (Uuid, String) {
        let preview = mint_preview_handle(file_name);
        let ticket = Uuid::new_v4();
        let ordinal = self.local_previews.len();
        self.local_previews.push(preview.clone());
        self.uploads.push(UploadSlot {
            ticket,
            preview: preview.clone(),
            ordinal,
            status: UploadStatus::Pending,
        });
        (ticket, preview)
    }

    /// Settles one upload. A confirmed URL is appended to `images` at the
    /// moment of completion; a `None` marks the slot failed and leaves
    /// `images` alone. Returns false when the ticket is gone (the preview
    /// was removed, or the slot cleared), in which case the result is
    /// dropped rather than orphaned into `images`.
    pub(crate) fn resolve_upload(&mut self, ticket: Uuid, result: Option<String>) -> bool {
        let Some(slot) = self.uploads.iter_mut().find(|slot| slot.ticket == ticket) else {
            return false;
        };
        match result {
            Some(url) => {
                slot.status = UploadStatus::Confirmed { url: url.clone() };
                self.images.push(url);
            }
            None => {
                slot.status = UploadStatus::Failed {
                    reason: "media host returned no url".into(),
                };
            }
        }
        true
    }

    /// Removes a preview and its upload slot. An in-flight upload for this
    /// preview keeps running; its completion finds no ticket and is
    /// discarded.
    pub(crate) fn remove_preview(&mut self, index: usize) -> Result<(), DraftError> {
        if index >= self.local_previews.len() {
            return Err(DraftError::validation(format!("no preview at index {index}")));
        }
        let handle = self.local_previews.remove(index);
        self.uploads.retain(|slot| slot.preview != handle);
        Ok(())
    }

    /// Drops a confirmed URL. Previews and slots are untouched.
    pub(crate) fn remove_image(&mut self, index: usize) -> Result<(), DraftError> {
        if index >= self.images.len() {
            return Err(DraftError::validation(format!("no image at index {index}")));
        }
        self.images.remove(index);
        Ok(())
    }
}

/// The host component of the product link, lowercased; empty when there is
/// no parseable link. Derived once at creation and again whenever a patch
/// rewrites the link.
pub fn source_platform(link: &str) -> String {
    reqwest::Url::parse(link)
        .ok()
        .and_then(|url| url.host_str().map(|host| host.to_lowercase()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linked_item_derives_platform_from_host() {
        let item = ItemDraft::linked("https://www.example.com/p/1");
        assert_eq!(item.source_platform, "www.example.com");
        assert_eq!(item.product_url.as_deref(), Some("https://www.example.com/p/1"));
        assert_eq!(item.quantity, 1);
    }

    #[test]
    fn unparseable_link_leaves_platform_empty() {
        assert_eq!(source_platform("not a url"), "");
        assert_eq!(source_platform(""), "");
    }

    #[test]
    fn out_of_range_quantity_is_rejected_not_clamped() {
        let mut item = ItemDraft::empty();
        item.quantity = 3;
        let err = item.apply(ItemPatch {
            quantity: Some(11),
            ..ItemPatch::default()
        });
        assert!(err.is_err());
        assert_eq!(item.quantity, 3);
        assert!(item
            .apply(ItemPatch {
                quantity: Some(0),
                ..ItemPatch::default()
            })
            .is_err());
        assert_eq!(item.quantity, 3);
    }

    #[test]
    fn rejected_patch_leaves_every_field_untouched() {
        let mut item = ItemDraft::empty();
        let err = item.apply(ItemPatch {
            name: Some("Teapot".into()),
            quantity: Some(99),
            ..ItemPatch::default()
        });
        assert!(err.is_err());
        assert_eq!(item.name, "");
    }

    #[test]
    fn patching_the_link_rederives_the_platform() {
        let mut item = ItemDraft::linked("https://shop-a.example/p/1");
        item.apply(ItemPatch {
            link: Some("https://shop-b.example/p/2".into()),
            ..ItemPatch::default()
        })
        .expect("patch");
        assert_eq!(item.source_platform, "shop-b.example");
        assert_eq!(item.product_url.as_deref(), Some("https://shop-b.example/p/2"));
    }

    #[test]
    fn removing_a_preview_drops_its_slot() {
        let mut item = ItemDraft::empty();
        let (ticket, _) = item.begin_upload("a.png");
        item.begin_upload("b.png");
        item.remove_preview(0).expect("remove");
        assert_eq!(item.local_previews.len(), 1);
        assert_eq!(item.uploads.len(), 1);
        assert!(!item.resolve_upload(ticket, Some("https://cdn/a.png".into())));
        assert!(item.images.is_empty());
    }
}
