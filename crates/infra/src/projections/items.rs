use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use lendloop_core::UserId;
use lendloop_events::EventEnvelope;
use lendloop_lending::{
    CategoryCode, ItemEvent, ItemId, LendingStatus, RegionCode, ITEM_AGGREGATE_TYPE,
};

use crate::read_model::Store;

use super::{decode_item_event, sort_for_replay, ItemProjectionError, StreamCursors};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentReadModel {
    pub author: UserId,
    pub text: String,
    pub posted_at: DateTime<Utc>,
}

/// Denormalized catalog entry for one live item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemReadModel {
    pub item_id: ItemId,
    pub owner: UserId,
    pub title: String,
    pub description: String,
    pub images: Vec<String>,
    pub region: RegionCode,
    pub category: CategoryCode,
    pub status: LendingStatus,
    pub borrower: Option<UserId>,
    pub likes: HashSet<UserId>,
    pub comments: Vec<CommentReadModel>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ItemReadModel {
    pub fn like_count(&self) -> usize {
        self.likes.len()
    }
}

/// Catalog query filter. All present criteria must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogFilter {
    pub region: Option<RegionCode>,
    pub category: Option<CategoryCode>,
    /// Case-insensitive substring match against title or description.
    pub search: Option<String>,
}

impl CatalogFilter {
    pub fn matches(&self, item: &ItemReadModel) -> bool {
        if let Some(region) = self.region {
            if item.region != region {
                return false;
            }
        }
        if let Some(category) = self.category {
            if item.category != category {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            let in_title = item.title.to_lowercase().contains(&needle);
            let in_description = item.description.to_lowercase().contains(&needle);
            if !in_title && !in_description {
                return false;
            }
        }
        true
    }
}

/// The browsable item catalog, derived from item events.
///
/// Deleted items disappear from the catalog; everything else (likes,
/// comments, lending status) is folded into one record per item so queries
/// never touch the event store.
#[derive(Debug)]
pub struct ItemCatalogProjection<S>
where
    S: Store<ItemId, ItemReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> ItemCatalogProjection<S>
where
    S: Store<ItemId, ItemReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, item_id: &ItemId) -> Option<ItemReadModel> {
        self.store.get(item_id)
    }

    /// Matching items, newest listing first.
    pub fn list(&self, filter: &CatalogFilter) -> Vec<ItemReadModel> {
        let mut items: Vec<ItemReadModel> = self
            .store
            .list()
            .into_iter()
            .filter(|item| filter.matches(item))
            .collect();
        items.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(b.item_id.cmp(&a.item_id))
        });
        items
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ItemProjectionError> {
        if envelope.aggregate_type() != ITEM_AGGREGATE_TYPE {
            return Ok(());
        }

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        if !self.cursors.should_apply(aggregate_id, seq)? {
            return Ok(());
        }

        let ev = decode_item_event(envelope)?;
        match ev {
            ItemEvent::ItemCreated(e) => {
                self.store.upsert(
                    e.item_id,
                    ItemReadModel {
                        item_id: e.item_id,
                        owner: e.owner,
                        title: e.title,
                        description: e.description,
                        images: e.images,
                        region: e.region,
                        category: e.category,
                        status: LendingStatus::Available,
                        borrower: None,
                        likes: HashSet::new(),
                        comments: Vec::new(),
                        created_at: e.occurred_at,
                        updated_at: e.occurred_at,
                    },
                );
            }
            ItemEvent::ItemUpdated(e) => {
                if let Some(mut rm) = self.store.get(&e.item_id) {
                    if let Some(title) = e.patch.title {
                        rm.title = title;
                    }
                    if let Some(description) = e.patch.description {
                        rm.description = description;
                    }
                    if let Some(region) = e.patch.region {
                        rm.region = region;
                    }
                    if let Some(category) = e.patch.category {
                        rm.category = category;
                    }
                    rm.images.extend(e.patch.add_images);
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(e.item_id, rm);
                }
            }
            ItemEvent::ItemDeleted(e) => {
                self.store.remove(&e.item_id);
            }
            ItemEvent::LikeToggled(e) => {
                if let Some(mut rm) = self.store.get(&e.item_id) {
                    if e.liked {
                        rm.likes.insert(e.user);
                    } else {
                        rm.likes.remove(&e.user);
                    }
                    self.store.upsert(e.item_id, rm);
                }
            }
            ItemEvent::CommentAdded(e) => {
                if let Some(mut rm) = self.store.get(&e.item_id) {
                    rm.comments.push(CommentReadModel {
                        author: e.author,
                        text: e.text,
                        posted_at: e.occurred_at,
                    });
                    self.store.upsert(e.item_id, rm);
                }
            }
            ItemEvent::BorrowRequested(e) => {
                if let Some(mut rm) = self.store.get(&e.item_id) {
                    rm.status = LendingStatus::Reserved;
                    rm.borrower = Some(e.requester);
                    self.store.upsert(e.item_id, rm);
                }
            }
            ItemEvent::LendConfirmed(e) => {
                if let Some(mut rm) = self.store.get(&e.item_id) {
                    rm.status = LendingStatus::Borrowed;
                    rm.borrower = Some(e.borrower);
                    self.store.upsert(e.item_id, rm);
                }
            }
            ItemEvent::ReturnRequested(_) => {}
            ItemEvent::ReturnConfirmed(e) => {
                if let Some(mut rm) = self.store.get(&e.item_id) {
                    rm.status = LendingStatus::Available;
                    rm.borrower = None;
                    self.store.upsert(e.item_id, rm);
                }
            }
        }

        self.cursors.advance(aggregate_id, seq);
        Ok(())
    }

    /// Rebuild from the full event history.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ItemProjectionError> {
        self.store.clear();
        self.cursors.clear();

        let mut envs: Vec<_> = envelopes.into_iter().collect();
        sort_for_replay(&mut envs);

        for env in &envs {
            self.apply_envelope(env)?;
        }
        Ok(())
    }
}
