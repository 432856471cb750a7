use super::item::ItemDraft;
use crate::models::ImportStub;

/// Turns an externally supplied batch (e.g. from the companion browser
/// tool) into fresh item drafts: link and name from the stub, the single
/// representative image pre-confirmed, quantity 1, no variant rows. The
/// store decides what happens to the existing list; this only builds the
/// replacements.
pub fn drafts_from_batch(products: &[ImportStub]) -> Vec<ItemDraft> {
    products
        .iter()
        .map(|stub| {
            let mut item = ItemDraft::linked(&stub.url);
            item.name = stub.name.clone();
            if let Some(image) = &stub.main_image
                && !image.trim().is_empty()
            {
                item.images.push(image.clone());
            }
            item
        })
        .collect()
}
