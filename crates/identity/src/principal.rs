use serde::{Deserialize, Serialize};

use lendloop_core::UserId;

/// Identity of an authenticated principal.
///
/// Constructed only by an [`IdentityResolver`](crate::IdentityResolver) (or
/// directly in tests); holding one means authentication already happened.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    user_id: UserId,
}

impl Principal {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}

impl core::fmt::Display for Principal {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.user_id, f)
    }
}
