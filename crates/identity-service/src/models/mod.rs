//! Data models shared by the resolver, cache and handlers.

use common::types::IdentityId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity record as returned by the identity issuer.
///
/// The record is a plain value: the cache stores copies and callers receive
/// copies, so no caller can mutate a cached entry.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub id: IdentityId,
    pub email: String,
    pub name: String,
    pub activated: bool,
}

/// Custom Debug implementation that redacts the email address.
impl fmt::Debug for IdentityRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityRecord")
            .field("id", &self.id)
            .field("email", &"[REDACTED]")
            .field("name", &self.name)
            .field("activated", &self.activated)
            .finish()
    }
}
