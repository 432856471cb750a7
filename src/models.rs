use crate::draft::item::ItemDraft;
use crate::draft::store::RequestDraft;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Free-text shop details for the manual flow. Nothing here references any
/// other entity; it is carried verbatim into the submission payload.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopInfo {
    pub shop_name: String,
    #[serde(default)]
    pub shop_email: Option<String>,
    #[serde(default)]
    pub shop_address: Option<String>,
    #[serde(default)]
    pub shop_site: Option<String>,
}

/// Partial update of the draft-level metadata.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DraftPatch {
    #[serde(default)]
    pub shop_info: Option<ShopInfo>,
    #[serde(default)]
    pub shipping_address_id: Option<String>,
}

/// One product stub from the companion browser tool. camelCase is the wire
/// form the tool sends.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportStub {
    pub url: String,
    pub name: String,
    #[serde(default)]
    pub main_image: Option<String>,
}

/// What the order-intake service receives: the committed items plus the
/// draft-level shop and address fields as siblings.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionPayload {
    pub draft_id: Uuid,
    pub items: Vec<SubmissionItem>,
    pub shop_info: Option<ShopInfo>,
    pub shipping_address_id: Option<String>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionItem {
    pub name: String,
    pub description: String,
    pub quantity: u32,
    pub product_url: Option<String>,
    pub images: Vec<String>,
    pub variant_attributes: Vec<SubmissionAttribute>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionAttribute {
    pub attribute_name: String,
    pub field_value: String,
}

impl SubmissionPayload {
    pub fn from_draft(draft: &RequestDraft) -> Self {
        Self {
            draft_id: draft.id,
            items: draft.items.iter().map(SubmissionItem::from_item).collect(),
            shop_info: draft.shop_info.clone(),
            shipping_address_id: draft.shipping_address_id.clone(),
        }
    }
}

impl SubmissionItem {
    fn from_item(item: &ItemDraft) -> Self {
        Self {
            name: item.name.clone(),
            description: item.description.clone(),
            quantity: item.quantity,
            product_url: item.product_url.clone(),
            images: item.images.clone(),
            variant_attributes: item
                .variant_attributes
                .rows()
                .iter()
                .map(|row| SubmissionAttribute {
                    attribute_name: row.name.label(),
                    field_value: row.value.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub request_id: String,
    pub item_count: usize,
    pub submitted_at: DateTime<Utc>,
}
