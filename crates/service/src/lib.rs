//! `lendloop-service` — the application facade.
//!
//! One entry point per user-facing operation, each taking the resolved
//! `Principal` of the caller. The facade owns the command dispatcher, the
//! read-model projections, the message store and the notification emitter,
//! and keeps the read side synchronized with every committed event so reads
//! observe the caller's own writes.

pub mod error;
pub mod service;


pub use error::ServiceError;
pub use service::LendingService;
