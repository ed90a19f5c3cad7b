//! `lendloop-lending` — the Item aggregate and lending state machine.
//!
//! Items cycle through `Available → Reserved → Borrowed → Available`
//! indefinitely. Every transition is a command carrying the acting user's
//! identity; decisions are pure and produce events, which are the only way
//! state changes.

pub mod descriptor;
pub mod item;

pub use descriptor::{CategoryCode, ItemDescriptor, ItemPatch, RegionCode};
pub use item::{
    AddComment, BorrowRequested, Comment, CommentAdded, ConfirmBorrow, ConfirmLend, ConfirmReturn,
    CreateItem, DeleteItem, Item, ItemCommand, ItemCreated, ItemDeleted, ItemEvent, ItemId,
    ItemUpdated, LendConfirmed, LendingStatus, LikeToggled, RequestBorrow, RequestReturn,
    ReturnConfirmed, ReturnRequested, ToggleLike, UpdateItem, ITEM_AGGREGATE_TYPE,
};
