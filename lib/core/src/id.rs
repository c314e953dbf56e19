//! Request identifiers.
//!
//! Ids are ULIDs, so request logs sort by arrival.

use std::fmt;
use ulid::Ulid;

/// Unique identifier for one inbound HTTP request.
///
/// Generated at ingress and echoed in every error body so client reports
/// can be correlated with server logs. Displays as `req_<ulid>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestId(Ulid);

impl RequestId {
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req_{}", self.0)
    }
}
