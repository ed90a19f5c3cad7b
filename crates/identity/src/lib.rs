//! `lendloop-identity` — the identity-resolution boundary.
//!
//! Registration, credentials and token issuance live in the external Identity
//! service; the core only needs "who is acting". Identity is resolved **once**
//! at the boundary and passed into every operation as an explicit
//! [`Principal`] — there is no ambient session.

pub mod principal;
pub mod resolver;

pub use principal::Principal;
pub use resolver::{IdentityResolver, StaticTokenResolver};
