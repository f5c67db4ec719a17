//! Record lifecycle status.

use crate::error::CoreError;
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a stored file. The status is the leading key field,
/// so records are grouped by status in store order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Status {
    /// Not yet classified.
    #[default]
    Unknown,
    /// Uploaded and awaiting review.
    Received,
    /// Under review.
    Applying,
    /// Accepted.
    Approved,
    /// Refused.
    Rejected,
    /// Removed by its owner. Deleted records do not count as existing.
    Deleted,
}

impl Status {
    /// Every status, in the order lookups try them.
    pub const ALL: [Status; 6] = [
        Status::Unknown,
        Status::Received,
        Status::Applying,
        Status::Approved,
        Status::Rejected,
        Status::Deleted,
    ];

    /// The stored name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Status::Unknown => "unknown",
            Status::Received => "received",
            Status::Applying => "applying",
            Status::Approved => "approved",
            Status::Rejected => "rejected",
            Status::Deleted => "deleted",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CoreError::UnknownStatus { name: s.to_owned() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for status in Status::ALL {
            assert_eq!(status.as_str().parse::<Status>().unwrap(), status);
        }
    }

    #[test]
    fn unregistered_name_is_rejected() {
        let err = "archived".parse::<Status>().unwrap_err();
        assert!(matches!(err, CoreError::UnknownStatus { name } if name == "archived"));
        assert!("Received".parse::<Status>().is_err());
    }
}
