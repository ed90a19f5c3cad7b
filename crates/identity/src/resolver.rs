use std::collections::HashMap;
use std::sync::RwLock;

use lendloop_core::{DomainError, DomainResult, UserId};

use crate::Principal;

/// Resolves a bearer token to an authenticated principal.
///
/// This is the seam to the external Identity service. An unresolvable token
/// (or no token at all) is `Unauthenticated` — no core operation may proceed
/// without a resolved principal.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, token: &str) -> DomainResult<Principal>;
}

/// In-memory token registry for tests/dev.
///
/// Stands in for the external Identity service: tokens are registered up
/// front and resolved by exact match.
#[derive(Debug, Default)]
pub struct StaticTokenResolver {
    tokens: RwLock<HashMap<String, UserId>>,
}

impl StaticTokenResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token for a user, returning self for chained setup.
    pub fn register(&self, token: impl Into<String>, user_id: UserId) {
        if let Ok(mut tokens) = self.tokens.write() {
            tokens.insert(token.into(), user_id);
        }
    }
}

impl IdentityResolver for StaticTokenResolver {
    fn resolve(&self, token: &str) -> DomainResult<Principal> {
        let tokens = self
            .tokens
            .read()
            .map_err(|_| DomainError::Unauthenticated)?;

        tokens
            .get(token)
            .map(|user_id| Principal::new(*user_id))
            .ok_or(DomainError::Unauthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_token_resolves_to_principal() {
        let resolver = StaticTokenResolver::new();
        let user = UserId::new();
        resolver.register("tok-1", user);

        let principal = resolver.resolve("tok-1").unwrap();
        assert_eq!(principal.user_id(), user);
    }

    #[test]
    fn unknown_token_is_unauthenticated() {
        let resolver = StaticTokenResolver::new();
        let err = resolver.resolve("nope").unwrap_err();
        assert_eq!(err, DomainError::Unauthenticated);
    }
}
