//! `lendloop-infra` — infrastructure composition for the lending core.
//!
//! Hosts the event store abstraction (plus the in-memory implementation),
//! the command dispatcher that runs the load/rehydrate/decide/append/publish
//! pipeline, and the read-model projections the catalog queries are served
//! from. No IO beyond what the injected store/bus implementations do.

pub mod command_dispatcher;
pub mod event_store;
pub mod projections;
pub mod read_model;


pub use command_dispatcher::{CommandDispatcher, DispatchError};
pub use event_store::{EventStore, EventStoreError, InMemoryEventStore, StoredEvent, UncommittedEvent};
pub use projections::{
    BorrowedItemsProjection, CatalogFilter, CommentReadModel, ItemCatalogProjection,
    ItemProjectionError, ItemReadModel, OwnerItemsProjection,
};
pub use read_model::{InMemoryStore, Store};
