use std::sync::RwLock;

use lendloop_core::{DomainError, DomainResult, UserId};

use crate::message::{Message, MessageId};

/// Message persistence and inbox queries.
///
/// Read receipts are receiver-only: marking a message read with any other
/// caller is `Forbidden`.
pub trait MessageStore: Send + Sync {
    fn append(&self, message: Message) -> DomainResult<()>;

    fn get(&self, message_id: MessageId) -> DomainResult<Message>;

    /// Mark a message read. Idempotent for the receiver.
    fn mark_read(&self, message_id: MessageId, caller: UserId) -> DomainResult<()>;

    /// All messages sent or received by the user, newest first.
    fn messages_for_user(&self, user: UserId) -> DomainResult<Vec<Message>>;

    /// The two-party conversation, oldest first.
    fn conversation(&self, a: UserId, b: UserId) -> DomainResult<Vec<Message>>;

    fn unread_count(&self, user: UserId) -> DomainResult<usize>;
}

/// In-memory message store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryMessageStore {
    messages: RwLock<Vec<Message>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InMemoryMessageStore {
    fn read_guard(&self) -> DomainResult<std::sync::RwLockReadGuard<'_, Vec<Message>>> {
        self.messages
            .read()
            .map_err(|_| DomainError::conflict("message store lock poisoned"))
    }

    fn write_guard(&self) -> DomainResult<std::sync::RwLockWriteGuard<'_, Vec<Message>>> {
        self.messages
            .write()
            .map_err(|_| DomainError::conflict("message store lock poisoned"))
    }
}

impl MessageStore for InMemoryMessageStore {
    fn append(&self, message: Message) -> DomainResult<()> {
        self.write_guard()?.push(message);
        Ok(())
    }

    fn get(&self, message_id: MessageId) -> DomainResult<Message> {
        self.read_guard()?
            .iter()
            .find(|m| m.message_id == message_id)
            .cloned()
            .ok_or(DomainError::NotFound)
    }

    fn mark_read(&self, message_id: MessageId, caller: UserId) -> DomainResult<()> {
        let mut messages = self.write_guard()?;
        let message = messages
            .iter_mut()
            .find(|m| m.message_id == message_id)
            .ok_or(DomainError::NotFound)?;

        if message.receiver != caller {
            return Err(DomainError::forbidden(
                "only the receiver may mark a message read",
            ));
        }

        message.is_read = true;
        Ok(())
    }

    fn messages_for_user(&self, user: UserId) -> DomainResult<Vec<Message>> {
        let mut result: Vec<Message> = self
            .read_guard()?
            .iter()
            .filter(|m| m.sender == user || m.receiver == user)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.sent_at.cmp(&a.sent_at));
        Ok(result)
    }

    fn conversation(&self, a: UserId, b: UserId) -> DomainResult<Vec<Message>> {
        let mut result: Vec<Message> = self
            .read_guard()?
            .iter()
            .filter(|m| {
                (m.sender == a && m.receiver == b) || (m.sender == b && m.receiver == a)
            })
            .cloned()
            .collect();
        result.sort_by(|a, b| a.sent_at.cmp(&b.sent_at));
        Ok(result)
    }

    fn unread_count(&self, user: UserId) -> DomainResult<usize> {
        Ok(self
            .read_guard()?
            .iter()
            .filter(|m| m.receiver == user && !m.is_read)
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn seeded_store(a: UserId, b: UserId) -> InMemoryMessageStore {
        let store = InMemoryMessageStore::new();
        let base = Utc::now();
        store
            .append(Message::direct(a, b, "first", None, base).unwrap())
            .unwrap();
        store
            .append(Message::direct(b, a, "second", None, base + Duration::seconds(1)).unwrap())
            .unwrap();
        store
            .append(Message::direct(a, b, "third", None, base + Duration::seconds(2)).unwrap())
            .unwrap();
        store
    }

    #[test]
    fn inbox_is_newest_first() {
        let (a, b) = (UserId::new(), UserId::new());
        let store = seeded_store(a, b);

        let inbox = store.messages_for_user(a).unwrap();
        assert_eq!(inbox.len(), 3);
        assert_eq!(inbox[0].content, "third");
        assert_eq!(inbox[2].content, "first");
    }

    #[test]
    fn conversation_is_oldest_first_and_symmetric() {
        let (a, b) = (UserId::new(), UserId::new());
        let store = seeded_store(a, b);

        let ab = store.conversation(a, b).unwrap();
        let ba = store.conversation(b, a).unwrap();
        assert_eq!(ab, ba);
        assert_eq!(ab[0].content, "first");
        assert_eq!(ab[2].content, "third");
    }

    #[test]
    fn conversation_excludes_third_parties() {
        let (a, b, c) = (UserId::new(), UserId::new(), UserId::new());
        let store = seeded_store(a, b);
        store
            .append(Message::direct(c, a, "intruder", None, Utc::now()).unwrap())
            .unwrap();

        let ab = store.conversation(a, b).unwrap();
        assert!(ab.iter().all(|m| m.content != "intruder"));
    }

    #[test]
    fn mark_read_is_receiver_only_and_idempotent() {
        let (a, b) = (UserId::new(), UserId::new());
        let store = InMemoryMessageStore::new();
        let msg = Message::direct(a, b, "hi", None, Utc::now()).unwrap();
        let id = msg.message_id;
        store.append(msg).unwrap();

        let err = store.mark_read(id, a).unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
        assert_eq!(store.unread_count(b).unwrap(), 1);

        store.mark_read(id, b).unwrap();
        store.mark_read(id, b).unwrap();
        assert_eq!(store.unread_count(b).unwrap(), 0);
    }

    #[test]
    fn mark_read_on_unknown_message_is_not_found() {
        let store = InMemoryMessageStore::new();
        let err = store.mark_read(MessageId::new(), UserId::new()).unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn unread_count_only_counts_received() {
        let (a, b) = (UserId::new(), UserId::new());
        let store = seeded_store(a, b);

        // a sent two and received one.
        assert_eq!(store.unread_count(a).unwrap(), 1);
        assert_eq!(store.unread_count(b).unwrap(), 2);
    }
}
