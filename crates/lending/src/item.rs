use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lendloop_core::{Aggregate, AggregateId, AggregateRoot, DomainError, DomainResult, UserId};
use lendloop_events::Event;

use crate::descriptor::{CategoryCode, ItemDescriptor, ItemPatch, RegionCode};

/// Aggregate type identifier for item streams.
pub const ITEM_AGGREGATE_TYPE: &str = "lending.item";

/// Item identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub AggregateId);

impl ItemId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ItemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Lending status lifecycle. Wire codes 0/1/2 match the original data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LendingStatus {
    Available,
    Borrowed,
    Reserved,
}

impl LendingStatus {
    pub fn as_code(self) -> u8 {
        match self {
            LendingStatus::Available => 0,
            LendingStatus::Borrowed => 1,
            LendingStatus::Reserved => 2,
        }
    }

    pub fn from_code(code: u8) -> DomainResult<Self> {
        match code {
            0 => Ok(LendingStatus::Available),
            1 => Ok(LendingStatus::Borrowed),
            2 => Ok(LendingStatus::Reserved),
            other => Err(DomainError::validation(format!(
                "unknown lending status code {other}"
            ))),
        }
    }
}

/// A comment on an item (append-only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub author: UserId,
    pub text: String,
    pub posted_at: DateTime<Utc>,
}

/// Aggregate root: a listed physical item.
///
/// Holds the descriptor, the social state (likes, comments) and the lending
/// state machine. The borrower is recorded from the moment a reservation is
/// made, so `borrower.is_some()` exactly tracks `status != Available`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    id: ItemId,
    owner: Option<UserId>,
    title: String,
    description: String,
    images: Vec<String>,
    region: Option<RegionCode>,
    category: Option<CategoryCode>,
    status: LendingStatus,
    borrower: Option<UserId>,
    likes: HashSet<UserId>,
    comments: Vec<Comment>,
    version: u64,
    created: bool,
    deleted: bool,
}

impl Item {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ItemId) -> Self {
        Self {
            id,
            owner: None,
            title: String::new(),
            description: String::new(),
            images: Vec::new(),
            region: None,
            category: None,
            status: LendingStatus::Available,
            borrower: None,
            likes: HashSet::new(),
            comments: Vec::new(),
            version: 0,
            created: false,
            deleted: false,
        }
    }

    pub fn id_typed(&self) -> ItemId {
        self.id
    }

    pub fn owner(&self) -> Option<UserId> {
        self.owner
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn status(&self) -> LendingStatus {
        self.status
    }

    pub fn borrower(&self) -> Option<UserId> {
        self.borrower
    }

    pub fn likes(&self) -> &HashSet<UserId> {
        &self.likes
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn is_live(&self) -> bool {
        self.created && !self.deleted
    }

    pub fn is_available(&self) -> bool {
        matches!(self.status, LendingStatus::Available)
    }
}

impl AggregateRoot for Item {
    type Id = ItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateItem (list a new item).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateItem {
    pub item_id: ItemId,
    pub owner: UserId,
    pub descriptor: ItemDescriptor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateItem (owner edits descriptive fields).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateItem {
    pub item_id: ItemId,
    pub actor: UserId,
    pub patch: ItemPatch,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteItem (owner removes the listing).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteItem {
    pub item_id: ItemId,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ToggleLike (flip like membership for the acting user).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleLike {
    pub item_id: ItemId,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddComment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddComment {
    pub item_id: ItemId,
    pub actor: UserId,
    pub text: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RequestBorrow (any user other than the owner asks to borrow).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestBorrow {
    pub item_id: ItemId,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ConfirmLend (owner hands the item to the designated borrower).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmLend {
    pub item_id: ItemId,
    pub actor: UserId,
    pub borrower: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ConfirmBorrow (borrower acknowledges receipt; no state change).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmBorrow {
    pub item_id: ItemId,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RequestReturn (borrower asks to give the item back).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestReturn {
    pub item_id: ItemId,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ConfirmReturn (owner confirms the item came back).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmReturn {
    pub item_id: ItemId,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemCommand {
    CreateItem(CreateItem),
    UpdateItem(UpdateItem),
    DeleteItem(DeleteItem),
    ToggleLike(ToggleLike),
    AddComment(AddComment),
    RequestBorrow(RequestBorrow),
    ConfirmLend(ConfirmLend),
    ConfirmBorrow(ConfirmBorrow),
    RequestReturn(RequestReturn),
    ConfirmReturn(ConfirmReturn),
}

impl lendloop_events::Command for ItemCommand {
    fn target_aggregate_id(&self) -> AggregateId {
        match self {
            ItemCommand::CreateItem(c) => c.item_id.0,
            ItemCommand::UpdateItem(c) => c.item_id.0,
            ItemCommand::DeleteItem(c) => c.item_id.0,
            ItemCommand::ToggleLike(c) => c.item_id.0,
            ItemCommand::AddComment(c) => c.item_id.0,
            ItemCommand::RequestBorrow(c) => c.item_id.0,
            ItemCommand::ConfirmLend(c) => c.item_id.0,
            ItemCommand::ConfirmBorrow(c) => c.item_id.0,
            ItemCommand::RequestReturn(c) => c.item_id.0,
            ItemCommand::ConfirmReturn(c) => c.item_id.0,
        }
    }
}

/// Event: ItemCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCreated {
    pub item_id: ItemId,
    pub owner: UserId,
    pub title: String,
    pub description: String,
    pub images: Vec<String>,
    pub region: RegionCode,
    pub category: CategoryCode,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemUpdated (patch semantics; `add_images` appends).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemUpdated {
    pub item_id: ItemId,
    pub patch: ItemPatch,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDeleted {
    pub item_id: ItemId,
    pub owner: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LikeToggled. `liked` is the resulting membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeToggled {
    pub item_id: ItemId,
    pub user: UserId,
    pub liked: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CommentAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentAdded {
    pub item_id: ItemId,
    pub author: UserId,
    pub text: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BorrowRequested. The requester becomes the pending borrower.
///
/// Carries owner and title so the notification emitter needs no extra lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowRequested {
    pub item_id: ItemId,
    pub requester: UserId,
    pub owner: UserId,
    pub title: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LendConfirmed. Possession passes to `borrower`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LendConfirmed {
    pub item_id: ItemId,
    pub owner: UserId,
    pub borrower: UserId,
    pub title: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReturnRequested. Intent only; status stays Borrowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnRequested {
    pub item_id: ItemId,
    pub borrower: UserId,
    pub owner: UserId,
    pub title: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReturnConfirmed. The item is available again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnConfirmed {
    pub item_id: ItemId,
    pub owner: UserId,
    pub borrower: UserId,
    pub title: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemEvent {
    ItemCreated(ItemCreated),
    ItemUpdated(ItemUpdated),
    ItemDeleted(ItemDeleted),
    LikeToggled(LikeToggled),
    CommentAdded(CommentAdded),
    BorrowRequested(BorrowRequested),
    LendConfirmed(LendConfirmed),
    ReturnRequested(ReturnRequested),
    ReturnConfirmed(ReturnConfirmed),
}

impl Event for ItemEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ItemEvent::ItemCreated(_) => "lending.item.created",
            ItemEvent::ItemUpdated(_) => "lending.item.updated",
            ItemEvent::ItemDeleted(_) => "lending.item.deleted",
            ItemEvent::LikeToggled(_) => "lending.item.like_toggled",
            ItemEvent::CommentAdded(_) => "lending.item.comment_added",
            ItemEvent::BorrowRequested(_) => "lending.item.borrow_requested",
            ItemEvent::LendConfirmed(_) => "lending.item.lend_confirmed",
            ItemEvent::ReturnRequested(_) => "lending.item.return_requested",
            ItemEvent::ReturnConfirmed(_) => "lending.item.return_confirmed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ItemEvent::ItemCreated(e) => e.occurred_at,
            ItemEvent::ItemUpdated(e) => e.occurred_at,
            ItemEvent::ItemDeleted(e) => e.occurred_at,
            ItemEvent::LikeToggled(e) => e.occurred_at,
            ItemEvent::CommentAdded(e) => e.occurred_at,
            ItemEvent::BorrowRequested(e) => e.occurred_at,
            ItemEvent::LendConfirmed(e) => e.occurred_at,
            ItemEvent::ReturnRequested(e) => e.occurred_at,
            ItemEvent::ReturnConfirmed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Item {
    type Command = ItemCommand;
    type Event = ItemEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ItemEvent::ItemCreated(e) => {
                self.id = e.item_id;
                self.owner = Some(e.owner);
                self.title = e.title.clone();
                self.description = e.description.clone();
                self.images = e.images.clone();
                self.region = Some(e.region);
                self.category = Some(e.category);
                self.status = LendingStatus::Available;
                self.borrower = None;
                self.likes.clear();
                self.comments.clear();
                self.created = true;
                self.deleted = false;
            }
            ItemEvent::ItemUpdated(e) => {
                if let Some(title) = &e.patch.title {
                    self.title = title.clone();
                }
                if let Some(description) = &e.patch.description {
                    self.description = description.clone();
                }
                if let Some(region) = e.patch.region {
                    self.region = Some(region);
                }
                if let Some(category) = e.patch.category {
                    self.category = Some(category);
                }
                self.images.extend(e.patch.add_images.iter().cloned());
            }
            ItemEvent::ItemDeleted(_) => {
                self.deleted = true;
            }
            ItemEvent::LikeToggled(e) => {
                if e.liked {
                    self.likes.insert(e.user);
                } else {
                    self.likes.remove(&e.user);
                }
            }
            ItemEvent::CommentAdded(e) => {
                self.comments.push(Comment {
                    author: e.author,
                    text: e.text.clone(),
                    posted_at: e.occurred_at,
                });
            }
            ItemEvent::BorrowRequested(e) => {
                self.status = LendingStatus::Reserved;
                self.borrower = Some(e.requester);
            }
            ItemEvent::LendConfirmed(e) => {
                self.status = LendingStatus::Borrowed;
                self.borrower = Some(e.borrower);
            }
            ItemEvent::ReturnRequested(_) => {
                // Intent only; possession does not change until the owner confirms.
            }
            ItemEvent::ReturnConfirmed(_) => {
                self.status = LendingStatus::Available;
                self.borrower = None;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ItemCommand::CreateItem(cmd) => self.handle_create(cmd),
            ItemCommand::UpdateItem(cmd) => self.handle_update(cmd),
            ItemCommand::DeleteItem(cmd) => self.handle_delete(cmd),
            ItemCommand::ToggleLike(cmd) => self.handle_toggle_like(cmd),
            ItemCommand::AddComment(cmd) => self.handle_add_comment(cmd),
            ItemCommand::RequestBorrow(cmd) => self.handle_request_borrow(cmd),
            ItemCommand::ConfirmLend(cmd) => self.handle_confirm_lend(cmd),
            ItemCommand::ConfirmBorrow(cmd) => self.handle_confirm_borrow(cmd),
            ItemCommand::RequestReturn(cmd) => self.handle_request_return(cmd),
            ItemCommand::ConfirmReturn(cmd) => self.handle_confirm_return(cmd),
        }
    }
}

impl Item {
    fn ensure_item_id(&self, item_id: ItemId) -> DomainResult<()> {
        if self.id != item_id {
            return Err(DomainError::validation("item_id mismatch"));
        }
        Ok(())
    }

    fn ensure_live(&self) -> DomainResult<()> {
        if !self.created || self.deleted {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn live_owner(&self) -> DomainResult<UserId> {
        self.ensure_live()?;
        self.owner.ok_or_else(DomainError::not_found)
    }

    fn ensure_owner(&self, actor: UserId, action: &str) -> DomainResult<UserId> {
        let owner = self.live_owner()?;
        if owner != actor {
            return Err(DomainError::forbidden(format!(
                "only the item owner may {action}"
            )));
        }
        Ok(owner)
    }

    fn handle_create(&self, cmd: &CreateItem) -> DomainResult<Vec<ItemEvent>> {
        self.ensure_item_id(cmd.item_id)?;
        if self.created {
            return Err(DomainError::conflict("item already exists"));
        }

        Ok(vec![ItemEvent::ItemCreated(ItemCreated {
            item_id: cmd.item_id,
            owner: cmd.owner,
            title: cmd.descriptor.title().to_string(),
            description: cmd.descriptor.description().to_string(),
            images: cmd.descriptor.images().to_vec(),
            region: cmd.descriptor.region(),
            category: cmd.descriptor.category(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateItem) -> DomainResult<Vec<ItemEvent>> {
        self.ensure_item_id(cmd.item_id)?;
        self.ensure_owner(cmd.actor, "update the item")?;
        cmd.patch.validate()?;

        if cmd.patch.is_empty() {
            return Ok(vec![]);
        }

        Ok(vec![ItemEvent::ItemUpdated(ItemUpdated {
            item_id: cmd.item_id,
            patch: cmd.patch.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeleteItem) -> DomainResult<Vec<ItemEvent>> {
        self.ensure_item_id(cmd.item_id)?;
        let owner = self.ensure_owner(cmd.actor, "delete the item")?;

        Ok(vec![ItemEvent::ItemDeleted(ItemDeleted {
            item_id: cmd.item_id,
            owner,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_toggle_like(&self, cmd: &ToggleLike) -> DomainResult<Vec<ItemEvent>> {
        self.ensure_item_id(cmd.item_id)?;
        self.ensure_live()?;

        Ok(vec![ItemEvent::LikeToggled(LikeToggled {
            item_id: cmd.item_id,
            user: cmd.actor,
            liked: !self.likes.contains(&cmd.actor),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_comment(&self, cmd: &AddComment) -> DomainResult<Vec<ItemEvent>> {
        self.ensure_item_id(cmd.item_id)?;
        self.ensure_live()?;

        if cmd.text.trim().is_empty() {
            return Err(DomainError::validation("comment text must not be empty"));
        }

        Ok(vec![ItemEvent::CommentAdded(CommentAdded {
            item_id: cmd.item_id,
            author: cmd.actor,
            text: cmd.text.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_request_borrow(&self, cmd: &RequestBorrow) -> DomainResult<Vec<ItemEvent>> {
        self.ensure_item_id(cmd.item_id)?;
        let owner = self.live_owner()?;

        if self.status != LendingStatus::Available {
            return Err(DomainError::invalid_state(
                "item is not available for borrowing",
            ));
        }
        if owner == cmd.actor {
            return Err(DomainError::self_reference("cannot borrow your own item"));
        }

        Ok(vec![ItemEvent::BorrowRequested(BorrowRequested {
            item_id: cmd.item_id,
            requester: cmd.actor,
            owner,
            title: self.title.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_confirm_lend(&self, cmd: &ConfirmLend) -> DomainResult<Vec<ItemEvent>> {
        self.ensure_item_id(cmd.item_id)?;
        let owner = self.ensure_owner(cmd.actor, "confirm a lend")?;

        if self.status != LendingStatus::Reserved {
            return Err(DomainError::invalid_state("item is not reserved"));
        }

        Ok(vec![ItemEvent::LendConfirmed(LendConfirmed {
            item_id: cmd.item_id,
            owner,
            borrower: cmd.borrower,
            title: self.title.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_confirm_borrow(&self, cmd: &ConfirmBorrow) -> DomainResult<Vec<ItemEvent>> {
        self.ensure_item_id(cmd.item_id)?;
        self.ensure_live()?;

        if self.status != LendingStatus::Borrowed {
            return Err(DomainError::invalid_state("item is not currently borrowed"));
        }
        if self.borrower != Some(cmd.actor) {
            return Err(DomainError::forbidden(
                "only the borrower may confirm receipt",
            ));
        }

        // Acknowledgement only: preconditions are enforced but nothing changes.
        Ok(vec![])
    }

    fn handle_request_return(&self, cmd: &RequestReturn) -> DomainResult<Vec<ItemEvent>> {
        self.ensure_item_id(cmd.item_id)?;
        let owner = self.live_owner()?;

        if self.borrower != Some(cmd.actor) {
            return Err(DomainError::forbidden(
                "only the borrower may request a return",
            ));
        }
        if self.status != LendingStatus::Borrowed {
            return Err(DomainError::invalid_state("item is not currently borrowed"));
        }

        Ok(vec![ItemEvent::ReturnRequested(ReturnRequested {
            item_id: cmd.item_id,
            borrower: cmd.actor,
            owner,
            title: self.title.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_confirm_return(&self, cmd: &ConfirmReturn) -> DomainResult<Vec<ItemEvent>> {
        self.ensure_item_id(cmd.item_id)?;
        let owner = self.ensure_owner(cmd.actor, "confirm a return")?;

        if self.status != LendingStatus::Borrowed {
            return Err(DomainError::invalid_state("item is not currently borrowed"));
        }

        let borrower = self.borrower.ok_or_else(|| {
            // Unreachable while the availability invariant holds.
            DomainError::invalid_state("borrowed item has no borrower")
        })?;

        Ok(vec![ItemEvent::ReturnConfirmed(ReturnConfirmed {
            item_id: cmd.item_id,
            owner,
            borrower,
            title: self.title.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lendloop_events::execute;

    fn test_user() -> UserId {
        UserId::new()
    }

    fn test_item_id() -> ItemId {
        ItemId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn descriptor() -> ItemDescriptor {
        ItemDescriptor::new(
            "Camping lamp",
            "Bright LED lamp, USB-rechargeable",
            vec!["lamp-front.jpg".to_string()],
            RegionCode::new(3).unwrap(),
            CategoryCode::new(2).unwrap(),
        )
        .unwrap()
    }

    fn created_item(owner: UserId) -> Item {
        let item_id = test_item_id();
        let mut item = Item::empty(item_id);
        execute(
            &mut item,
            &ItemCommand::CreateItem(CreateItem {
                item_id,
                owner,
                descriptor: descriptor(),
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        item
    }

    fn borrowed_item(owner: UserId, borrower: UserId) -> Item {
        let mut item = created_item(owner);
        let item_id = item.id_typed();
        execute(
            &mut item,
            &ItemCommand::RequestBorrow(RequestBorrow {
                item_id,
                actor: borrower,
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        execute(
            &mut item,
            &ItemCommand::ConfirmLend(ConfirmLend {
                item_id,
                actor: owner,
                borrower,
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        item
    }

    fn assert_availability_invariant(item: &Item) {
        assert_eq!(
            item.status() == LendingStatus::Available,
            item.borrower().is_none(),
            "status/borrower invariant violated: status={:?}, borrower={:?}",
            item.status(),
            item.borrower()
        );
    }

    #[test]
    fn create_item_emits_item_created() {
        let item_id = test_item_id();
        let owner = test_user();
        let item = Item::empty(item_id);

        let events = item
            .handle(&ItemCommand::CreateItem(CreateItem {
                item_id,
                owner,
                descriptor: descriptor(),
                occurred_at: test_time(),
            }))
            .unwrap();
        assert_eq!(events.len(), 1);

        match &events[0] {
            ItemEvent::ItemCreated(e) => {
                assert_eq!(e.owner, owner);
                assert_eq!(e.title, "Camping lamp");
                assert_eq!(e.region.code(), 3);
            }
            other => panic!("expected ItemCreated, got {other:?}"),
        }
    }

    #[test]
    fn create_twice_conflicts() {
        let owner = test_user();
        let item = created_item(owner);
        let err = item
            .handle(&ItemCommand::CreateItem(CreateItem {
                item_id: item.id_typed(),
                owner,
                descriptor: descriptor(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn update_by_non_owner_is_forbidden() {
        let item = created_item(test_user());
        let err = item
            .handle(&ItemCommand::UpdateItem(UpdateItem {
                item_id: item.id_typed(),
                actor: test_user(),
                patch: ItemPatch {
                    title: Some("New title".to_string()),
                    ..ItemPatch::default()
                },
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[test]
    fn update_patch_replaces_fields_and_appends_images() {
        let owner = test_user();
        let mut item = created_item(owner);

        let item_id = item.id_typed();
        execute(
            &mut item,
            &ItemCommand::UpdateItem(UpdateItem {
                item_id,
                actor: owner,
                patch: ItemPatch {
                    title: Some("Camping lamp (v2)".to_string()),
                    add_images: vec!["lamp-side.jpg".to_string()],
                    ..ItemPatch::default()
                },
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        assert_eq!(item.title(), "Camping lamp (v2)");
        assert_eq!(item.images.len(), 2);
        assert_eq!(item.description, "Bright LED lamp, USB-rechargeable");
    }

    #[test]
    fn empty_patch_emits_nothing() {
        let owner = test_user();
        let item = created_item(owner);
        let events = item
            .handle(&ItemCommand::UpdateItem(UpdateItem {
                item_id: item.id_typed(),
                actor: owner,
                patch: ItemPatch::default(),
                occurred_at: test_time(),
            }))
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn deleted_item_rejects_further_commands_with_not_found() {
        let owner = test_user();
        let mut item = created_item(owner);
        let item_id = item.id_typed();

        execute(
            &mut item,
            &ItemCommand::DeleteItem(DeleteItem {
                item_id,
                actor: owner,
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        let err = item
            .handle(&ItemCommand::RequestBorrow(RequestBorrow {
                item_id,
                actor: test_user(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn toggle_like_twice_restores_membership() {
        let owner = test_user();
        let liker = test_user();
        let mut item = created_item(owner);
        let item_id = item.id_typed();

        let events = execute(
            &mut item,
            &ItemCommand::ToggleLike(ToggleLike {
                item_id,
                actor: liker,
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        match &events[0] {
            ItemEvent::LikeToggled(e) => assert!(e.liked),
            other => panic!("expected LikeToggled, got {other:?}"),
        }
        assert!(item.likes().contains(&liker));

        let events = execute(
            &mut item,
            &ItemCommand::ToggleLike(ToggleLike {
                item_id,
                actor: liker,
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        match &events[0] {
            ItemEvent::LikeToggled(e) => assert!(!e.liked),
            other => panic!("expected LikeToggled, got {other:?}"),
        }
        assert!(!item.likes().contains(&liker));
    }

    #[test]
    fn empty_comment_is_rejected() {
        let item = created_item(test_user());
        let err = item
            .handle(&ItemCommand::AddComment(AddComment {
                item_id: item.id_typed(),
                actor: test_user(),
                text: "   ".to_string(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn request_borrow_reserves_and_records_requester() {
        let owner = test_user();
        let requester = test_user();
        let mut item = created_item(owner);

        let item_id = item.id_typed();
        let events = execute(
            &mut item,
            &ItemCommand::RequestBorrow(RequestBorrow {
                item_id,
                actor: requester,
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        match &events[0] {
            ItemEvent::BorrowRequested(e) => {
                assert_eq!(e.requester, requester);
                assert_eq!(e.owner, owner);
                assert_eq!(e.title, "Camping lamp");
            }
            other => panic!("expected BorrowRequested, got {other:?}"),
        }
        assert_eq!(item.status(), LendingStatus::Reserved);
        assert_eq!(item.borrower(), Some(requester));
        assert_availability_invariant(&item);
    }

    #[test]
    fn request_borrow_on_reserved_item_is_invalid_state() {
        let owner = test_user();
        let mut item = created_item(owner);
        let item_id = item.id_typed();

        execute(
            &mut item,
            &ItemCommand::RequestBorrow(RequestBorrow {
                item_id,
                actor: test_user(),
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        let before = item.clone();
        let err = item
            .handle(&ItemCommand::RequestBorrow(RequestBorrow {
                item_id,
                actor: test_user(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
        assert_eq!(item, before);
    }

    #[test]
    fn request_borrow_by_owner_is_self_reference() {
        let owner = test_user();
        let item = created_item(owner);
        let err = item
            .handle(&ItemCommand::RequestBorrow(RequestBorrow {
                item_id: item.id_typed(),
                actor: owner,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::SelfReference(_)));
    }

    #[test]
    fn confirm_lend_by_non_owner_is_forbidden() {
        let owner = test_user();
        let requester = test_user();
        let mut item = created_item(owner);
        let item_id = item.id_typed();

        execute(
            &mut item,
            &ItemCommand::RequestBorrow(RequestBorrow {
                item_id,
                actor: requester,
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        let err = item
            .handle(&ItemCommand::ConfirmLend(ConfirmLend {
                item_id,
                actor: requester,
                borrower: requester,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[test]
    fn confirm_lend_twice_is_invalid_state() {
        let owner = test_user();
        let borrower = test_user();
        let item = borrowed_item(owner, borrower);

        let err = item
            .handle(&ItemCommand::ConfirmLend(ConfirmLend {
                item_id: item.id_typed(),
                actor: owner,
                borrower,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
    }

    #[test]
    fn confirm_borrow_is_a_checked_noop() {
        let owner = test_user();
        let borrower = test_user();
        let item = borrowed_item(owner, borrower);
        let before = item.clone();

        let events = item
            .handle(&ItemCommand::ConfirmBorrow(ConfirmBorrow {
                item_id: item.id_typed(),
                actor: borrower,
                occurred_at: test_time(),
            }))
            .unwrap();
        assert!(events.is_empty());
        assert_eq!(item, before);
    }

    #[test]
    fn confirm_borrow_by_other_user_is_forbidden() {
        let owner = test_user();
        let borrower = test_user();
        let item = borrowed_item(owner, borrower);

        let err = item
            .handle(&ItemCommand::ConfirmBorrow(ConfirmBorrow {
                item_id: item.id_typed(),
                actor: test_user(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[test]
    fn request_return_keeps_status_borrowed() {
        let owner = test_user();
        let borrower = test_user();
        let mut item = borrowed_item(owner, borrower);

        let item_id = item.id_typed();
        let events = execute(
            &mut item,
            &ItemCommand::RequestReturn(RequestReturn {
                item_id,
                actor: borrower,
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        match &events[0] {
            ItemEvent::ReturnRequested(e) => {
                assert_eq!(e.borrower, borrower);
                assert_eq!(e.owner, owner);
            }
            other => panic!("expected ReturnRequested, got {other:?}"),
        }
        assert_eq!(item.status(), LendingStatus::Borrowed);
        assert_eq!(item.borrower(), Some(borrower));
    }

    #[test]
    fn request_return_while_only_reserved_is_invalid_state() {
        let owner = test_user();
        let requester = test_user();
        let mut item = created_item(owner);
        let item_id = item.id_typed();

        execute(
            &mut item,
            &ItemCommand::RequestBorrow(RequestBorrow {
                item_id,
                actor: requester,
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        let err = item
            .handle(&ItemCommand::RequestReturn(RequestReturn {
                item_id,
                actor: requester,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
    }

    #[test]
    fn confirm_return_restores_availability() {
        let owner = test_user();
        let borrower = test_user();
        let mut item = borrowed_item(owner, borrower);

        let item_id = item.id_typed();
        let events = execute(
            &mut item,
            &ItemCommand::ConfirmReturn(ConfirmReturn {
                item_id,
                actor: owner,
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        match &events[0] {
            ItemEvent::ReturnConfirmed(e) => assert_eq!(e.borrower, borrower),
            other => panic!("expected ReturnConfirmed, got {other:?}"),
        }
        assert_eq!(item.status(), LendingStatus::Available);
        assert_eq!(item.borrower(), None);
        assert_availability_invariant(&item);
    }

    #[test]
    fn confirm_return_by_non_owner_is_forbidden() {
        let owner = test_user();
        let borrower = test_user();
        let item = borrowed_item(owner, borrower);

        let err = item
            .handle(&ItemCommand::ConfirmReturn(ConfirmReturn {
                item_id: item.id_typed(),
                actor: borrower,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[test]
    fn confirm_return_twice_is_invalid_state() {
        let owner = test_user();
        let borrower = test_user();
        let mut item = borrowed_item(owner, borrower);
        let item_id = item.id_typed();

        execute(
            &mut item,
            &ItemCommand::ConfirmReturn(ConfirmReturn {
                item_id,
                actor: owner,
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        let err = item
            .handle(&ItemCommand::ConfirmReturn(ConfirmReturn {
                item_id,
                actor: owner,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
    }

    #[test]
    fn full_lifecycle_cycles_back_to_available() {
        let owner = test_user();
        let borrower = test_user();
        let mut item = created_item(owner);
        let item_id = item.id_typed();
        assert_eq!(item.status(), LendingStatus::Available);

        execute(
            &mut item,
            &ItemCommand::RequestBorrow(RequestBorrow {
                item_id,
                actor: borrower,
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        assert_eq!(item.status(), LendingStatus::Reserved);
        assert_availability_invariant(&item);

        execute(
            &mut item,
            &ItemCommand::ConfirmLend(ConfirmLend {
                item_id,
                actor: owner,
                borrower,
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        assert_eq!(item.status(), LendingStatus::Borrowed);
        assert_availability_invariant(&item);

        execute(
            &mut item,
            &ItemCommand::RequestReturn(RequestReturn {
                item_id,
                actor: borrower,
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        assert_eq!(item.status(), LendingStatus::Borrowed);

        execute(
            &mut item,
            &ItemCommand::ConfirmReturn(ConfirmReturn {
                item_id,
                actor: owner,
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        assert_eq!(item.status(), LendingStatus::Available);
        assert_availability_invariant(&item);

        // The cycle repeats: a second borrow round still works.
        execute(
            &mut item,
            &ItemCommand::RequestBorrow(RequestBorrow {
                item_id,
                actor: borrower,
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        assert_eq!(item.status(), LendingStatus::Reserved);
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let owner = test_user();
        let item = created_item(owner);
        let before = item.clone();

        let cmd = ItemCommand::RequestBorrow(RequestBorrow {
            item_id: item.id_typed(),
            actor: test_user(),
            occurred_at: test_time(),
        });
        let _ = item.handle(&cmd).unwrap();
        let _ = item.handle(&cmd).unwrap();

        assert_eq!(item, before);
    }

    #[test]
    fn status_codes_round_trip() {
        for status in [
            LendingStatus::Available,
            LendingStatus::Borrowed,
            LendingStatus::Reserved,
        ] {
            assert_eq!(LendingStatus::from_code(status.as_code()).unwrap(), status);
        }
        assert!(LendingStatus::from_code(3).is_err());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        /// One of the five protocol operations with an actor drawn from a
        /// small cast (owner, two strangers).
        fn protocol_step() -> impl Strategy<Value = (u8, u8)> {
            (0u8..5, 0u8..3)
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 500,
                ..ProptestConfig::default()
            })]

            /// Property: the availability invariant holds after every
            /// accepted transition, no matter the order of attempts.
            #[test]
            fn availability_invariant_holds_under_random_protocols(
                steps in proptest::collection::vec(protocol_step(), 0..40)
            ) {
                let owner = test_user();
                let strangers = [test_user(), test_user()];
                let mut item = created_item(owner);
                let item_id = item.id_typed();

                for (op, actor_idx) in steps {
                    let actor = match actor_idx {
                        0 => owner,
                        i => strangers[(i - 1) as usize],
                    };
                    let cmd = match op {
                        0 => ItemCommand::RequestBorrow(RequestBorrow {
                            item_id, actor, occurred_at: test_time(),
                        }),
                        1 => ItemCommand::ConfirmLend(ConfirmLend {
                            item_id, actor, borrower: strangers[0], occurred_at: test_time(),
                        }),
                        2 => ItemCommand::ConfirmBorrow(ConfirmBorrow {
                            item_id, actor, occurred_at: test_time(),
                        }),
                        3 => ItemCommand::RequestReturn(RequestReturn {
                            item_id, actor, occurred_at: test_time(),
                        }),
                        _ => ItemCommand::ConfirmReturn(ConfirmReturn {
                            item_id, actor, occurred_at: test_time(),
                        }),
                    };

                    // Rejected commands must leave state untouched; accepted
                    // ones must preserve the invariant.
                    let before = item.clone();
                    match execute(&mut item, &cmd) {
                        Ok(_) => assert_availability_invariant(&item),
                        Err(_) => prop_assert_eq!(&item, &before),
                    }
                }
            }

            /// Property: handle is deterministic (same state + command =
            /// same decision).
            #[test]
            fn handle_is_deterministic(seed in 0u8..5) {
                let owner = test_user();
                let borrower = test_user();
                let item = borrowed_item(owner, borrower);
                let item_id = item.id_typed();
                let at = test_time();

                let cmd = match seed {
                    0 => ItemCommand::RequestBorrow(RequestBorrow { item_id, actor: borrower, occurred_at: at }),
                    1 => ItemCommand::ConfirmLend(ConfirmLend { item_id, actor: owner, borrower, occurred_at: at }),
                    2 => ItemCommand::ConfirmBorrow(ConfirmBorrow { item_id, actor: borrower, occurred_at: at }),
                    3 => ItemCommand::RequestReturn(RequestReturn { item_id, actor: borrower, occurred_at: at }),
                    _ => ItemCommand::ConfirmReturn(ConfirmReturn { item_id, actor: owner, occurred_at: at }),
                };

                let first = item.handle(&cmd);
                let second = item.handle(&cmd);
                prop_assert_eq!(first, second);
            }
        }
    }
}
