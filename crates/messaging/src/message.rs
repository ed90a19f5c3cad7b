use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use lendloop_core::{DomainError, DomainResult, Entity, UserId};
use lendloop_lending::ItemId;

/// Message identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for MessageId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Message kind. Wire codes 0..=4 match the original data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Plain,
    BorrowRequest,
    LendConfirmed,
    ReturnRequest,
    ReturnConfirmed,
}

impl MessageKind {
    pub fn as_code(self) -> u8 {
        match self {
            MessageKind::Plain => 0,
            MessageKind::BorrowRequest => 1,
            MessageKind::LendConfirmed => 2,
            MessageKind::ReturnRequest => 3,
            MessageKind::ReturnConfirmed => 4,
        }
    }

    pub fn from_code(code: u8) -> DomainResult<Self> {
        match code {
            0 => Ok(MessageKind::Plain),
            1 => Ok(MessageKind::BorrowRequest),
            2 => Ok(MessageKind::LendConfirmed),
            3 => Ok(MessageKind::ReturnRequest),
            4 => Ok(MessageKind::ReturnConfirmed),
            other => Err(DomainError::validation(format!(
                "unknown message kind code {other}"
            ))),
        }
    }

    /// Protocol notifications carry an item reference; plain chat does not
    /// have to.
    pub fn is_notification(self) -> bool {
        !matches!(self, MessageKind::Plain)
    }
}

/// A message from one user to another, optionally tied to an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: MessageId,
    pub sender: UserId,
    pub receiver: UserId,
    pub content: String,
    pub item: Option<ItemId>,
    pub kind: MessageKind,
    pub is_read: bool,
    pub sent_at: DateTime<Utc>,
}

impl Message {
    /// Build a plain direct message. Self-messaging and empty content are
    /// rejected here so no invalid message can reach a store.
    pub fn direct(
        sender: UserId,
        receiver: UserId,
        content: impl Into<String>,
        item: Option<ItemId>,
        sent_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let content = content.into();
        if sender == receiver {
            return Err(DomainError::self_reference(
                "cannot send a message to yourself",
            ));
        }
        if content.trim().is_empty() {
            return Err(DomainError::validation("message content must not be empty"));
        }

        Ok(Self {
            message_id: MessageId::new(),
            sender,
            receiver,
            content,
            item,
            kind: MessageKind::Plain,
            is_read: false,
            sent_at,
        })
    }

    /// Build a protocol notification. Callers derive these from item events,
    /// which already guarantee distinct parties and a real item.
    pub fn notification(
        sender: UserId,
        receiver: UserId,
        content: impl Into<String>,
        item: ItemId,
        kind: MessageKind,
        sent_at: DateTime<Utc>,
    ) -> Self {
        Self {
            message_id: MessageId::new(),
            sender,
            receiver,
            content: content.into(),
            item: Some(item),
            kind,
            is_read: false,
            sent_at,
        }
    }
}

impl Entity for Message {
    type Id = MessageId;

    fn id(&self) -> &Self::Id {
        &self.message_id
    }
}
