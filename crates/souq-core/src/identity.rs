//! # Domain Identity Newtypes
//!
//! Newtype wrappers for the identifier namespaces of the catalog. These
//! prevent accidental identifier confusion — you cannot pass an `ItemId`
//! where a `CategoryId` is expected.
//!
//! Identifiers are stored as plain strings because they double as document
//! keys in the backing store: item ids are generated UUIDs, category ids are
//! human-readable slugs (`"electronics"`), and seller ids come from the
//! external account system.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a catalog item. Also the item's document key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub String);

/// Identifier for a catalog category — a stable slug, not a UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CategoryId(pub String);

/// Identifier for a user account (seller or buyer), issued externally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl ItemId {
    /// Generate a new random item identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Access the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl CategoryId {
    /// Sentinel category assigned to items whose raw document carries no
    /// usable category field.
    pub const UNCATEGORIZED: &'static str = "uncategorized";

    /// Wrap a category slug.
    pub fn new(slug: impl Into<String>) -> Self {
        Self(slug.into())
    }

    /// The sentinel category for items with no category.
    pub fn uncategorized() -> Self {
        Self(Self::UNCATEGORIZED.to_string())
    }

    /// Access the slug as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl UserId {
    /// Wrap an externally issued account identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Access the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for CategoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_ids_are_unique() {
        assert_ne!(ItemId::new(), ItemId::new());
    }

    #[test]
    fn test_uncategorized_sentinel() {
        assert_eq!(CategoryId::uncategorized().as_str(), "uncategorized");
    }

    #[test]
    fn test_display_is_plain() {
        let cat = CategoryId::new("electronics");
        assert_eq!(format!("{cat}"), "electronics");
    }
}
