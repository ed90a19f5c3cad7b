//! `lendloop-messaging` — direct messages and protocol notifications.
//!
//! Users exchange plain messages; the lending protocol additionally emits
//! typed notification messages derived from item events, so each step of a
//! loan shows up in both parties' conversation history.

pub mod emitter;
pub mod message;
pub mod store;

pub use emitter::NotificationEmitter;
pub use message::{Message, MessageId, MessageKind};
pub use store::{InMemoryMessageStore, MessageStore};
