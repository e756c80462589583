//! Identifier newtypes
//!
//! Subjects, tags and collections are all platform snowflakes (`u64`). Wrapping
//! them keeps a subject id from ever being passed where a tag id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A member whose tags are reconciled
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(pub u64);

/// A status marker (platform role)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagId(pub u64);

/// The collection (guild) that declares tags and holds subjects
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionId(pub u64);

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SubjectId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<u64> for TagId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_serialize_as_bare_numbers() {
        let json = serde_json::to_string(&TagId(1434629510031999269)).unwrap();
        assert_eq!(json, "1434629510031999269");

        let subject: SubjectId = serde_json::from_str("42").unwrap();
        assert_eq!(subject, SubjectId(42));
    }

    #[test]
    fn test_ids_order_numerically() {
        let mut tags = vec![TagId(30), TagId(4), TagId(100)];
        tags.sort();
        assert_eq!(tags, vec![TagId(4), TagId(30), TagId(100)]);
    }
}
