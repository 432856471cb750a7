use super::DraftError;
use super::import;
use super::item::{ItemDraft, ItemPatch};
use super::media::{self, MediaKind, MediaLimits, SelectedFile};
use super::step::{FlowKind, Step};
use super::variant::{RowPatch, RowSelection};
use crate::media_host::MediaHost;
use crate::models::{DraftPatch, ImportStub, ShopInfo, SubmissionPayload};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_with::skip_serializing_none;
use std::sync::Arc;
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// The aggregate: every piece of in-progress request state. Exactly one per
/// draft; serialized as the snapshot the intake surface returns.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct RequestDraft {
    pub id: Uuid,
    pub flow: FlowKind,
    pub step: Step,
    pub items: Vec<ItemDraft>,
    /// Manual-flow scratch item, edited in place until committed.
    pub current: Option<ItemDraft>,
    pub shop_info: Option<ShopInfo>,
    /// Opaque reference into the address collaborator; never resolved here.
    pub shipping_address_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RequestDraft {
    fn new(flow: FlowKind) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            flow,
            step: Step::first(flow),
            items: Vec::new(),
            current: match flow {
                FlowKind::Manual => Some(ItemDraft::empty()),
                FlowKind::Linked => None,
            },
            shop_info: None,
            shipping_address_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Items are addressed by id only; the manual-flow scratch answers to
    /// its id like any committed item.
    fn item_mut(&mut self, id: Uuid) -> Option<&mut ItemDraft> {
        if let Some(current) = self.current.as_mut()
            && current.id == id
        {
            return Some(current);
        }
        self.items.iter_mut().find(|item| item.id == id)
    }

    pub fn can_advance(&self) -> bool {
        self.step.advance(!self.items.is_empty()).is_some()
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Result of accepting a file batch: the preview handles minted for the
/// caller, the upload tickets, and the spawned upload tasks. The intake
/// surface drops the handles (fire-and-forget); tests await them.
#[derive(Debug)]
pub struct MediaBatch {
    pub previews: Vec<String>,
    pub tickets: Vec<Uuid>,
    pub tasks: Vec<JoinHandle<()>>,
}

/// Explicitly owned handle to one draft. All mutation funnels through the
/// inner lock, so concurrent upload completions only ever act as producers
/// of input to a single writer.
pub struct DraftStore<H> {
    draft: Arc<Mutex<RequestDraft>>,
    media: Arc<H>,
}

impl<H> Clone for DraftStore<H> {
    fn clone(&self) -> Self {
        Self {
            draft: self.draft.clone(),
            media: self.media.clone(),
        }
    }
}

impl<H: MediaHost> DraftStore<H> {
    pub fn new(flow: FlowKind, media: Arc<H>) -> Self {
        Self {
            draft: Arc::new(Mutex::new(RequestDraft::new(flow))),
            media,
        }
    }

    pub async fn snapshot(&self) -> RequestDraft {
        self.draft.lock().await.clone()
    }

    pub async fn update_meta(&self, patch: DraftPatch) {
        let mut draft = self.draft.lock().await;
        if let Some(shop_info) = patch.shop_info {
            draft.shop_info = Some(shop_info);
        }
        if let Some(address) = patch.shipping_address_id {
            draft.shipping_address_id = Some(address);
        }
        draft.touch();
    }

    /// Appends a fresh linked item; never replaces existing ones. The link
    /// may still be blank when the user adds the row before pasting.
    pub async fn add_linked_item(&self, link: &str) -> Uuid {
        let mut draft = self.draft.lock().await;
        let item = ItemDraft::linked(link);
        let id = item.id;
        debug!(
            target = "porter.draft",
            draft = %draft.id,
            item = %id,
            platform = %item.source_platform,
            "linked item added"
        );
        draft.items.push(item);
        draft.touch();
        id
    }

    /// No-op when the id is unknown; removal must not disturb the identity
    /// of the remaining items.
    pub async fn remove_item(&self, id: Uuid) -> bool {
        let mut draft = self.draft.lock().await;
        let before = draft.items.len();
        draft.items.retain(|item| item.id != id);
        let removed = draft.items.len() != before;
        if removed {
            draft.touch();
        }
        removed
    }

    pub async fn update_item(&self, id: Uuid, patch: ItemPatch) -> Result<(), DraftError> {
        let mut draft = self.draft.lock().await;
        let item = draft.item_mut(id).ok_or(DraftError::UnknownItem(id))?;
        item.apply(patch)?;
        draft.touch();
        Ok(())
    }

    /// Manual flow only: moves the scratch item into the committed list and
    /// resets the scratch to an empty template. The scratch's id travels
    /// with the committed item so in-flight uploads keep resolving; the new
    /// template mints its own id.
    pub async fn commit_current(&self) -> Result<Uuid, DraftError> {
        let mut draft = self.draft.lock().await;
        let Some(current) = draft.current.take() else {
            return Err(DraftError::validation(
                "committing applies to the manual flow",
            ));
        };
        if current.is_blank() {
            draft.current = Some(current);
            return Err(DraftError::validation("item name must not be blank"));
        }
        let id = current.id;
        draft.items.push(current);
        draft.current = Some(ItemDraft::empty());
        draft.touch();
        info!(target = "porter.draft", draft = %draft.id, item = %id, "scratch item committed");
        Ok(id)
    }

    /// Accepts a file batch for one item. Validation is all-or-nothing and
    /// happens before any state changes; previews land synchronously, in
    /// file order, before the first upload task starts. Uploads then run
    /// back-to-back without awaiting each other, so completions interleave
    /// arbitrarily and `images` fills in completion order.
    pub async fn select_files(
        &self,
        item_id: Uuid,
        kind: MediaKind,
        limits: MediaLimits,
        files: Vec<SelectedFile>,
    ) -> Result<MediaBatch, DraftError> {
        media::validate_batch(&files, kind, limits)?;

        let mut previews = Vec::with_capacity(files.len());
        let mut tickets = Vec::with_capacity(files.len());
        {
            let mut draft = self.draft.lock().await;
            let item = draft.item_mut(item_id).ok_or(DraftError::UnknownItem(item_id))?;
            for file in &files {
                let (ticket, preview) = item.begin_upload(&file.file_name);
                tickets.push(ticket);
                previews.push(preview);
            }
            draft.touch();
        }

        let mut tasks = Vec::with_capacity(files.len());
        for (file, ticket) in files.into_iter().zip(tickets.iter().copied()) {
            let media = self.media.clone();
            let draft = self.draft.clone();
            let file_name = file.file_name.clone();
            tasks.push(tokio::spawn(async move {
                let started = std::time::Instant::now();
                let result = media.upload(file, kind).await;
                crate::metrics::upload_elapsed(kind.as_str(), started.elapsed().as_millis());
                finish_upload(&draft, item_id, ticket, &file_name, result).await;
            }));
        }

        Ok(MediaBatch {
            previews,
            tickets,
            tasks,
        })
    }

    /// Removes either a preview (revoking its pending slot, so a late
    /// completion is discarded) or a confirmed image URL.
    pub async fn remove_attachment(
        &self,
        item_id: Uuid,
        index: usize,
        preview_only: bool,
    ) -> Result<(), DraftError> {
        let mut draft = self.draft.lock().await;
        let item = draft.item_mut(item_id).ok_or(DraftError::UnknownItem(item_id))?;
        if preview_only {
            item.remove_preview(index)?;
        } else {
            item.remove_image(index)?;
        }
        draft.touch();
        Ok(())
    }

    /// Returns whether a row was appended; a duplicate predefined name is a
    /// silent refusal, not an error.
    pub async fn add_variant_row(
        &self,
        item_id: Uuid,
        selection: RowSelection,
    ) -> Result<bool, DraftError> {
        let mut draft = self.draft.lock().await;
        let item = draft.item_mut(item_id).ok_or(DraftError::UnknownItem(item_id))?;
        let appended = item.variant_attributes.add_row(selection);
        if appended {
            draft.touch();
        }
        Ok(appended)
    }

    pub async fn update_variant_row(
        &self,
        item_id: Uuid,
        index: usize,
        patch: RowPatch,
    ) -> Result<(), DraftError> {
        let mut draft = self.draft.lock().await;
        let item = draft.item_mut(item_id).ok_or(DraftError::UnknownItem(item_id))?;
        if !item.variant_attributes.update_row(index, patch) {
            return Err(DraftError::validation(format!("no attribute row at index {index}")));
        }
        draft.touch();
        Ok(())
    }

    pub async fn remove_variant_row(&self, item_id: Uuid, index: usize) -> Result<(), DraftError> {
        let mut draft = self.draft.lock().await;
        let item = draft.item_mut(item_id).ok_or(DraftError::UnknownItem(item_id))?;
        if !item.variant_attributes.remove_row(index) {
            return Err(DraftError::validation(format!("no attribute row at index {index}")));
        }
        draft.touch();
        Ok(())
    }

    /// Predefined names the add-row menu may still offer for this item.
    pub async fn available_attributes(
        &self,
        item_id: Uuid,
    ) -> Result<Vec<super::variant::PredefinedAttribute>, DraftError> {
        let mut draft = self.draft.lock().await;
        let item = draft.item_mut(item_id).ok_or(DraftError::UnknownItem(item_id))?;
        Ok(item.variant_attributes.available())
    }

    /// An empty batch is ignored outright: a spurious empty signal must not
    /// destroy user-entered items. A non-empty batch replaces the whole
    /// list. Returns how many items the list now holds from the import.
    pub async fn import_batch(&self, products: &[ImportStub]) -> usize {
        if products.is_empty() {
            return 0;
        }
        let replacements = import::drafts_from_batch(products);
        let count = replacements.len();
        let mut draft = self.draft.lock().await;
        draft.items = replacements;
        draft.touch();
        info!(
            target = "porter.draft",
            draft = %draft.id,
            count,
            "external import replaced the item list"
        );
        count
    }

    pub async fn can_advance(&self) -> bool {
        self.draft.lock().await.can_advance()
    }

    pub async fn advance(&self) -> Result<Step, DraftError> {
        let mut draft = self.draft.lock().await;
        let has_items = !draft.items.is_empty();
        match draft.step.advance(has_items) {
            Some(next) => {
                draft.step = next;
                draft.touch();
                Ok(next)
            }
            None if draft.step.is_terminal() => {
                Err(DraftError::validation("the flow is already complete"))
            }
            None => Err(DraftError::validation("at least one item is required")),
        }
    }

    pub async fn back(&self) -> Step {
        let mut draft = self.draft.lock().await;
        let next = draft.step.back(draft.flow);
        if next != draft.step {
            draft.step = next;
            draft.touch();
        }
        next
    }

    /// Wholesale reset back to the first step. In-flight uploads are not
    /// cancelled; their tickets are gone, so completions are discarded at
    /// the reconciliation step.
    pub async fn reset(&self) {
        let mut draft = self.draft.lock().await;
        draft.items.clear();
        if draft.flow == FlowKind::Manual {
            draft.current = Some(ItemDraft::empty());
        }
        draft.shop_info = None;
        draft.shipping_address_id = None;
        draft.step = Step::first(draft.flow);
        draft.touch();
    }

    /// Builds the outward payload. Only the committed list and confirmed
    /// images go out; the manual-flow scratch and local previews never do.
    pub async fn submission_payload(&self) -> Result<SubmissionPayload, DraftError> {
        let draft = self.draft.lock().await;
        if draft.step != Step::Confirmation {
            return Err(DraftError::validation(
                "the draft is not at the confirmation step",
            ));
        }
        if draft.items.is_empty() {
            return Err(DraftError::validation("at least one item is required"));
        }
        Ok(SubmissionPayload::from_draft(&draft))
    }

    pub async fn finish_submission(&self) {
        let mut draft = self.draft.lock().await;
        draft.step = Step::Success;
        draft.touch();
    }
}

/// The single state-mutating step of an upload task. Checks that the item
/// and the ticket still exist before touching the draft, so results for
/// removed previews, removed items, or reset drafts are dropped instead of
/// landing as orphaned URLs.
async fn finish_upload(
    draft: &Arc<Mutex<RequestDraft>>,
    item_id: Uuid,
    ticket: Uuid,
    file_name: &str,
    result: Option<String>,
) {
    if result.is_none() {
        warn!(target = "porter.media", file = file_name, "upload failed");
    }
    let mut guard = draft.lock().await;
    let Some(item) = guard.item_mut(item_id) else {
        debug!(target = "porter.media", %ticket, "upload finished for a missing item; dropped");
        return;
    };
    if !item.resolve_upload(ticket, result) {
        debug!(target = "porter.media", %ticket, "upload ticket abandoned; result dropped");
        return;
    }
    guard.touch();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::media::UploadStatus;
    use crate::draft::variant::PredefinedAttribute;
    use crate::media_host::MediaHost;
    use std::collections::{HashMap, HashSet};
    use std::future::Future;
    use tokio::time::{Duration, sleep};

    /// Answers every upload with `https://cdn.test/<file>`, after an
    /// optional per-file delay; names in `fail` resolve to `None`.
    #[derive(Default)]
    struct StubHost {
        delays: HashMap<String, u64>,
        fail: HashSet<String>,
    }

    impl MediaHost for StubHost {
        fn upload(
            &self,
            file: SelectedFile,
            _kind: MediaKind,
        ) -> impl Future<Output = Option<String>> + Send {
            let delay = self.delays.get(&file.file_name).copied().unwrap_or(0);
            let failed = self.fail.contains(&file.file_name);
            async move {
                if delay > 0 {
                    sleep(Duration::from_millis(delay)).await;
                }
                if failed {
                    None
                } else {
                    Some(format!("https://cdn.test/{}", file.file_name))
                }
            }
        }
    }

    const LIMITS: MediaLimits = MediaLimits { max_bytes: 1024 };

    fn store(flow: FlowKind) -> DraftStore<StubHost> {
        DraftStore::new(flow, Arc::new(StubHost::default()))
    }

    fn store_with(host: StubHost) -> DraftStore<StubHost> {
        DraftStore::new(FlowKind::Linked, Arc::new(host))
    }

    fn image(name: &str) -> SelectedFile {
        SelectedFile {
            file_name: name.to_string(),
            content_type: "image/png".to_string(),
            bytes: vec![0u8; 64],
        }
    }

    async fn drain(batch: MediaBatch) {
        for task in batch.tasks {
            task.await.expect("upload task");
        }
    }

    #[tokio::test]
    async fn previews_land_synchronously_before_uploads_resolve() {
        let store = store_with(StubHost {
            delays: HashMap::from([
                ("a.png".to_string(), 40),
                ("b.png".to_string(), 40),
                ("c.png".to_string(), 40),
            ]),
            ..StubHost::default()
        });
        let item = store.add_linked_item("https://www.example.com/p/1").await;
        let batch = store
            .select_files(
                item,
                MediaKind::Image,
                LIMITS,
                vec![image("a.png"), image("b.png"), image("c.png")],
            )
            .await
            .expect("select");

        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.items[0].local_previews.len(), 3);
        assert!(snapshot.items[0].images.is_empty());

        drain(batch).await;
        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.items[0].images.len(), 3);
        let distinct: HashSet<&String> = snapshot.items[0].images.iter().collect();
        assert_eq!(distinct.len(), 3);
        assert!(snapshot.items[0].images.iter().all(|url| !url.is_empty()));
    }

    #[tokio::test]
    async fn images_fill_in_completion_order_not_selection_order() {
        let store = store_with(StubHost {
            delays: HashMap::from([
                ("a.png".to_string(), 60),
                ("b.png".to_string(), 30),
                ("c.png".to_string(), 5),
            ]),
            ..StubHost::default()
        });
        let item = store.add_linked_item("").await;
        let batch = store
            .select_files(
                item,
                MediaKind::Image,
                LIMITS,
                vec![image("a.png"), image("b.png"), image("c.png")],
            )
            .await
            .expect("select");
        drain(batch).await;

        let snapshot = store.snapshot().await;
        assert_eq!(
            snapshot.items[0].images,
            vec![
                "https://cdn.test/c.png",
                "https://cdn.test/b.png",
                "https://cdn.test/a.png",
            ]
        );
        // previews keep selection order regardless
        assert_eq!(snapshot.items[0].uploads[0].preview, snapshot.items[0].local_previews[0]);
    }

    #[tokio::test]
    async fn failed_upload_marks_the_slot_and_spares_its_siblings() {
        let store = store_with(StubHost {
            fail: HashSet::from(["bad.png".to_string()]),
            ..StubHost::default()
        });
        let item = store.add_linked_item("").await;
        let batch = store
            .select_files(
                item,
                MediaKind::Image,
                LIMITS,
                vec![image("ok.png"), image("bad.png")],
            )
            .await
            .expect("select");
        drain(batch).await;

        let snapshot = store.snapshot().await;
        let item = &snapshot.items[0];
        assert_eq!(item.images, vec!["https://cdn.test/ok.png"]);
        // the failed file's preview stays visible, just unconfirmed
        assert_eq!(item.local_previews.len(), 2);
        assert!(matches!(item.uploads[1].status, UploadStatus::Failed { .. }));
    }

    #[tokio::test]
    async fn invalid_batch_is_rejected_wholesale() {
        let store = store(FlowKind::Linked);
        let item = store.add_linked_item("").await;
        let mut oversized = image("huge.png");
        oversized.bytes = vec![0u8; 4096];
        let err = store
            .select_files(
                item,
                MediaKind::Image,
                LIMITS,
                vec![oversized, image("ok.png")],
            )
            .await
            .expect_err("must reject");
        assert!(matches!(err, DraftError::MediaTooLarge { .. }));

        let snapshot = store.snapshot().await;
        assert!(snapshot.items[0].local_previews.is_empty());
        assert!(snapshot.items[0].images.is_empty());
    }

    #[tokio::test]
    async fn removing_a_preview_suppresses_the_late_url() {
        let store = store_with(StubHost {
            delays: HashMap::from([("slow.png".to_string(), 50)]),
            ..StubHost::default()
        });
        let item = store.add_linked_item("").await;
        let batch = store
            .select_files(item, MediaKind::Image, LIMITS, vec![image("slow.png")])
            .await
            .expect("select");
        store
            .remove_attachment(item, 0, true)
            .await
            .expect("remove preview");
        drain(batch).await;

        let snapshot = store.snapshot().await;
        assert!(snapshot.items[0].images.is_empty());
        assert!(snapshot.items[0].uploads.is_empty());
    }

    #[tokio::test]
    async fn reset_discards_completions_from_before_the_reset() {
        let store = store_with(StubHost {
            delays: HashMap::from([("slow.png".to_string(), 50)]),
            ..StubHost::default()
        });
        let item = store.add_linked_item("").await;
        let batch = store
            .select_files(item, MediaKind::Image, LIMITS, vec![image("slow.png")])
            .await
            .expect("select");
        store.reset().await;
        drain(batch).await;

        let snapshot = store.snapshot().await;
        assert!(snapshot.items.is_empty());
        assert_eq!(snapshot.step, Step::LinkInput);
    }

    #[tokio::test]
    async fn commit_with_blank_name_changes_nothing() {
        let store = store(FlowKind::Manual);
        let err = store.commit_current().await.expect_err("blank name");
        assert!(matches!(err, DraftError::Validation(_)));
        let snapshot = store.snapshot().await;
        assert!(snapshot.items.is_empty());
        assert!(snapshot.current.is_some());
    }

    #[tokio::test]
    async fn commit_moves_the_scratch_and_resets_it() {
        let store = store(FlowKind::Manual);
        let scratch_id = store.snapshot().await.current.expect("scratch").id;
        store
            .update_item(
                scratch_id,
                ItemPatch {
                    name: Some("Tea set".into()),
                    quantity: Some(2),
                    ..ItemPatch::default()
                },
            )
            .await
            .expect("patch scratch");
        let committed = store.commit_current().await.expect("commit");
        assert_eq!(committed, scratch_id);

        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.items.len(), 1);
        assert_eq!(snapshot.items[0].name, "Tea set");
        let fresh = snapshot.current.expect("fresh scratch");
        assert_ne!(fresh.id, scratch_id);
        assert!(fresh.is_blank());
    }

    #[tokio::test]
    async fn commit_is_refused_on_the_linked_flow() {
        let store = store(FlowKind::Linked);
        assert!(store.commit_current().await.is_err());
    }

    #[tokio::test]
    async fn empty_import_leaves_the_draft_untouched() {
        let store = store(FlowKind::Linked);
        let id = store.add_linked_item("https://www.example.com/p/1").await;
        store
            .update_item(
                id,
                ItemPatch {
                    name: Some("Hand-edited".into()),
                    ..ItemPatch::default()
                },
            )
            .await
            .expect("patch");
        let before = store.snapshot().await;

        assert_eq!(store.import_batch(&[]).await, 0);

        let after = store.snapshot().await;
        assert_eq!(after.items.len(), 1);
        assert_eq!(after.items[0].id, before.items[0].id);
        assert_eq!(after.items[0].name, "Hand-edited");
    }

    #[tokio::test]
    async fn nonempty_import_replaces_the_whole_list() {
        let store = store(FlowKind::Linked);
        let old = store.add_linked_item("https://old.example/p/0").await;

        let stubs = vec![
            ImportStub {
                url: "https://www.shop.example/p/1".into(),
                name: "Enamel mug".into(),
                main_image: Some("https://img.shop.example/1.jpg".into()),
            },
            ImportStub {
                url: "https://www.shop.example/p/2".into(),
                name: "Linen tote".into(),
                main_image: None,
            },
        ];
        assert_eq!(store.import_batch(&stubs).await, 2);

        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.items.len(), 2);
        assert!(snapshot.items.iter().all(|item| item.id != old));
        assert_eq!(snapshot.items[0].link.as_deref(), Some("https://www.shop.example/p/1"));
        assert_eq!(snapshot.items[0].name, "Enamel mug");
        assert_eq!(snapshot.items[0].images, vec!["https://img.shop.example/1.jpg"]);
        assert_eq!(snapshot.items[1].name, "Linen tote");
    }

    #[tokio::test]
    async fn advance_is_gated_until_an_item_exists() {
        let store = store(FlowKind::Linked);
        assert_eq!(store.advance().await.expect("into items"), Step::RequestItems);
        for _ in 0..3 {
            assert!(store.advance().await.is_err());
            assert!(!store.can_advance().await);
        }
        store.add_linked_item("https://www.example.com/p/1").await;
        assert_eq!(store.advance().await.expect("confirm"), Step::Confirmation);
        assert_eq!(store.advance().await.expect("success"), Step::Success);
        assert!(store.advance().await.is_err());
    }

    #[tokio::test]
    async fn remove_item_is_a_noop_for_unknown_ids() {
        let store = store(FlowKind::Linked);
        store.add_linked_item("https://www.example.com/p/1").await;
        assert!(!store.remove_item(Uuid::new_v4()).await);
        assert_eq!(store.snapshot().await.items.len(), 1);
    }

    #[tokio::test]
    async fn surviving_items_keep_their_ids_after_removal() {
        let store = store(FlowKind::Linked);
        let first = store.add_linked_item("https://a.example/1").await;
        let second = store.add_linked_item("https://b.example/2").await;
        let third = store.add_linked_item("https://c.example/3").await;
        assert!(store.remove_item(second).await);
        let snapshot = store.snapshot().await;
        let ids: Vec<Uuid> = snapshot.items.iter().map(|item| item.id).collect();
        assert_eq!(ids, vec![first, third]);
    }

    #[tokio::test]
    async fn duplicate_predefined_row_is_a_silent_noop() {
        let store = store(FlowKind::Linked);
        let item = store.add_linked_item("").await;
        let selection = RowSelection::Predefined(PredefinedAttribute::Color);
        assert!(store.add_variant_row(item, selection).await.expect("first"));
        assert!(!store.add_variant_row(item, selection).await.expect("second"));
        assert_eq!(store.snapshot().await.items[0].variant_attributes.len(), 1);
    }

    #[tokio::test]
    async fn submission_payload_requires_confirmation_step() {
        let store = store(FlowKind::Linked);
        store.add_linked_item("https://www.example.com/p/1").await;
        assert!(store.submission_payload().await.is_err());
        store.advance().await.expect("items");
        store.advance().await.expect("confirmation");
        let payload = store.submission_payload().await.expect("payload");
        assert_eq!(payload.items.len(), 1);
    }

    #[tokio::test]
    async fn submission_payload_carries_items_and_sibling_fields() {
        let store = store(FlowKind::Manual);
        store
            .update_meta(DraftPatch {
                shop_info: Some(ShopInfo {
                    shop_name: "Kyoto Crafts".into(),
                    shop_email: Some("owner@kyoto-crafts.example".into()),
                    shop_address: None,
                    shop_site: None,
                }),
                shipping_address_id: Some("addr-42".into()),
            })
            .await;
        let scratch = store.snapshot().await.current.expect("scratch").id;
        store
            .update_item(
                scratch,
                ItemPatch {
                    name: Some("Tea set".into()),
                    description: Some("12 pieces".into()),
                    quantity: Some(2),
                    link: Some("https://www.example.com/p/9".into()),
                },
            )
            .await
            .expect("patch");
        store
            .add_variant_row(scratch, RowSelection::Predefined(PredefinedAttribute::Color))
            .await
            .expect("row");
        store
            .update_variant_row(
                scratch,
                0,
                RowPatch {
                    name: None,
                    value: Some("celadon".into()),
                },
            )
            .await
            .expect("value");
        store.commit_current().await.expect("commit");
        store.advance().await.expect("items");
        store.advance().await.expect("confirmation");

        let payload = store.submission_payload().await.expect("payload");
        assert_eq!(payload.shipping_address_id.as_deref(), Some("addr-42"));
        assert_eq!(payload.shop_info.as_ref().map(|s| s.shop_name.as_str()), Some("Kyoto Crafts"));
        let item = &payload.items[0];
        assert_eq!(item.name, "Tea set");
        assert_eq!(item.quantity, 2);
        assert_eq!(item.product_url.as_deref(), Some("https://www.example.com/p/9"));
        assert_eq!(item.variant_attributes.len(), 1);
        assert_eq!(item.variant_attributes[0].attribute_name, "Color");
        assert_eq!(item.variant_attributes[0].field_value, "celadon");
    }
}
