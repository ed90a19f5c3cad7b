use std::sync::Arc;

use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::info;

use lendloop_core::{AggregateId, UserId};
use lendloop_events::{Command as _, InMemoryEventBus};
use lendloop_identity::Principal;
use lendloop_infra::{
    BorrowedItemsProjection, CatalogFilter, CommandDispatcher, InMemoryEventStore, InMemoryStore,
    ItemCatalogProjection, ItemReadModel, OwnerItemsProjection, StoredEvent,
};
use lendloop_lending::{
    AddComment, ConfirmBorrow, ConfirmLend, ConfirmReturn, CreateItem, DeleteItem, Item,
    ItemCommand, ItemDescriptor, ItemEvent, ItemId, ItemPatch, RequestBorrow, RequestReturn,
    ToggleLike, UpdateItem, ITEM_AGGREGATE_TYPE,
};
use lendloop_messaging::{
    InMemoryMessageStore, Message, MessageId, MessageStore, NotificationEmitter,
};

use crate::error::ServiceError;

type Bus = InMemoryEventBus<lendloop_events::EventEnvelope<JsonValue>>;
type Catalog = ItemCatalogProjection<InMemoryStore<ItemId, ItemReadModel>>;
type Borrowed = BorrowedItemsProjection<InMemoryStore<UserId, Vec<ItemId>>>;
type Owners = OwnerItemsProjection<InMemoryStore<UserId, Vec<ItemId>>>;

/// The lending platform core, fully wired with in-memory infrastructure.
///
/// Every write goes through the command dispatcher; the committed events are
/// folded into the projections and the notification emitter before the call
/// returns, so a caller immediately sees the effect of their own command.
pub struct LendingService {
    dispatcher: CommandDispatcher<Arc<InMemoryEventStore>, Arc<Bus>>,
    catalog: Catalog,
    borrowed: Borrowed,
    owners: Owners,
    messages: Arc<InMemoryMessageStore>,
    emitter: NotificationEmitter,
}

impl Default for LendingService {
    fn default() -> Self {
        Self::new()
    }
}

impl LendingService {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryEventStore::new());
        let bus = Arc::new(Bus::new());
        let messages = Arc::new(InMemoryMessageStore::new());
        Self {
            dispatcher: CommandDispatcher::new(store, bus),
            catalog: ItemCatalogProjection::new(InMemoryStore::new()),
            borrowed: BorrowedItemsProjection::new(InMemoryStore::new()),
            owners: OwnerItemsProjection::new(InMemoryStore::new()),
            messages: messages.clone(),
            emitter: NotificationEmitter::new(messages),
        }
    }

    fn dispatch_item(&self, command: ItemCommand) -> Result<Vec<StoredEvent>, ServiceError> {
        let aggregate_id = command.target_aggregate_id();
        let committed =
            self.dispatcher
                .dispatch::<Item>(aggregate_id, ITEM_AGGREGATE_TYPE, command, |id| {
                    Item::empty(ItemId::new(id))
                })?;

        // Fold committed events into the read side before returning.
        for stored in &committed {
            let envelope = stored.to_envelope();
            self.catalog.apply_envelope(&envelope)?;
            self.borrowed.apply_envelope(&envelope)?;
            self.owners.apply_envelope(&envelope)?;
            self.emitter
                .handle_envelope(&envelope)
                .map_err(|e| ServiceError::Pipeline(e.to_string()))?;
        }

        Ok(committed)
    }

    // --- item lifecycle ---

    pub fn create_item(
        &self,
        principal: &Principal,
        descriptor: ItemDescriptor,
    ) -> Result<ItemId, ServiceError> {
        let item_id = ItemId::new(AggregateId::new());
        self.dispatch_item(
            ItemCommand::CreateItem(CreateItem {
                item_id,
                owner: principal.user_id(),
                descriptor,
                occurred_at: Utc::now(),
            }),
        )?;
        info!(item_id = %item_id, owner = %principal.user_id(), "item listed");
        Ok(item_id)
    }

    pub fn update_item(
        &self,
        principal: &Principal,
        item_id: ItemId,
        patch: ItemPatch,
    ) -> Result<(), ServiceError> {
        self.dispatch_item(
            ItemCommand::UpdateItem(UpdateItem {
                item_id,
                actor: principal.user_id(),
                patch,
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(())
    }

    pub fn delete_item(&self, principal: &Principal, item_id: ItemId) -> Result<(), ServiceError> {
        self.dispatch_item(
            ItemCommand::DeleteItem(DeleteItem {
                item_id,
                actor: principal.user_id(),
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(())
    }

    /// Flip like membership; returns whether the caller now likes the item.
    pub fn toggle_like(&self, principal: &Principal, item_id: ItemId) -> Result<bool, ServiceError> {
        let committed = self.dispatch_item(
            ItemCommand::ToggleLike(ToggleLike {
                item_id,
                actor: principal.user_id(),
                occurred_at: Utc::now(),
            }),
        )?;

        committed
            .iter()
            .find_map(|stored| {
                serde_json::from_value::<ItemEvent>(stored.payload.clone())
                    .ok()
                    .and_then(|ev| match ev {
                        ItemEvent::LikeToggled(e) => Some(e.liked),
                        _ => None,
                    })
            })
            .ok_or_else(|| ServiceError::Pipeline("like toggle committed no event".to_string()))
    }

    pub fn add_comment(
        &self,
        principal: &Principal,
        item_id: ItemId,
        text: impl Into<String>,
    ) -> Result<(), ServiceError> {
        self.dispatch_item(
            ItemCommand::AddComment(AddComment {
                item_id,
                actor: principal.user_id(),
                text: text.into(),
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(())
    }

    // --- catalog queries ---

    pub fn get_item(&self, item_id: ItemId) -> Result<ItemReadModel, ServiceError> {
        self.catalog
            .get(&item_id)
            .ok_or_else(|| lendloop_core::DomainError::NotFound.into())
    }

    pub fn list_items(&self, filter: &CatalogFilter) -> Vec<ItemReadModel> {
        self.catalog.list(filter)
    }

    pub fn items_owned_by(&self, user: UserId) -> Vec<ItemId> {
        self.owners.items_owned_by(user)
    }

    pub fn items_borrowed_by(&self, user: UserId) -> Vec<ItemId> {
        self.borrowed.items_borrowed_by(user)
    }

    // --- lending protocol ---

    pub fn request_borrow(&self, principal: &Principal, item_id: ItemId) -> Result<(), ServiceError> {
        self.dispatch_item(
            ItemCommand::RequestBorrow(RequestBorrow {
                item_id,
                actor: principal.user_id(),
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(())
    }

    pub fn confirm_lend(
        &self,
        principal: &Principal,
        item_id: ItemId,
        borrower: UserId,
    ) -> Result<(), ServiceError> {
        self.dispatch_item(
            ItemCommand::ConfirmLend(ConfirmLend {
                item_id,
                actor: principal.user_id(),
                borrower,
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(())
    }

    pub fn confirm_borrow(&self, principal: &Principal, item_id: ItemId) -> Result<(), ServiceError> {
        self.dispatch_item(
            ItemCommand::ConfirmBorrow(ConfirmBorrow {
                item_id,
                actor: principal.user_id(),
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(())
    }

    pub fn request_return(&self, principal: &Principal, item_id: ItemId) -> Result<(), ServiceError> {
        self.dispatch_item(
            ItemCommand::RequestReturn(RequestReturn {
                item_id,
                actor: principal.user_id(),
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(())
    }

    pub fn confirm_return(&self, principal: &Principal, item_id: ItemId) -> Result<(), ServiceError> {
        self.dispatch_item(
            ItemCommand::ConfirmReturn(ConfirmReturn {
                item_id,
                actor: principal.user_id(),
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(())
    }

    // --- messaging ---

    pub fn send_message(
        &self,
        principal: &Principal,
        receiver: UserId,
        content: impl Into<String>,
        item: Option<ItemId>,
    ) -> Result<MessageId, ServiceError> {
        let message = Message::direct(principal.user_id(), receiver, content, item, Utc::now())?;
        let message_id = message.message_id;
        self.messages.append(message)?;
        Ok(message_id)
    }

    /// The caller's inbox and outbox, newest first.
    pub fn messages_for_user(&self, principal: &Principal) -> Result<Vec<Message>, ServiceError> {
        Ok(self.messages.messages_for_user(principal.user_id())?)
    }

    /// Conversation between the caller and another user, oldest first.
    pub fn conversation(
        &self,
        principal: &Principal,
        other: UserId,
    ) -> Result<Vec<Message>, ServiceError> {
        Ok(self.messages.conversation(principal.user_id(), other)?)
    }

    pub fn mark_read(&self, principal: &Principal, message_id: MessageId) -> Result<(), ServiceError> {
        Ok(self.messages.mark_read(message_id, principal.user_id())?)
    }

    pub fn unread_count(&self, principal: &Principal) -> Result<usize, ServiceError> {
        Ok(self.messages.unread_count(principal.user_id())?)
    }
}
