//! Common data types for storefront services.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Identifier of an identity (end user) as assigned by the identity issuer.
///
/// Always strictly positive. Serialized as a bare JSON integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct IdentityId(i64);

/// Error returned when a value is not a valid identity id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("identity id must be a positive integer")]
pub struct InvalidIdentityId;

impl IdentityId {
    /// Create an identity id, rejecting zero and negative values.
    #[must_use]
    pub fn new(id: i64) -> Option<Self> {
        (id > 0).then_some(Self(id))
    }

    /// The raw integer value.
    #[must_use]
    pub fn get(self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for IdentityId {
    type Error = InvalidIdentityId;

    fn try_from(id: i64) -> Result<Self, Self::Error> {
        Self::new(id).ok_or(InvalidIdentityId)
    }
}

impl From<IdentityId> for i64 {
    fn from(id: IdentityId) -> Self {
        id.0
    }
}

/// Parses the decimal form carried in a token `sub` claim.
///
/// Only ASCII digits are accepted: no sign, no whitespace.
impl FromStr for IdentityId {
    type Err = InvalidIdentityId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidIdentityId);
        }
        let id: i64 = s.parse().map_err(|_| InvalidIdentityId)?;
        Self::try_from(id)
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
