//! # Catalog Item Normalization
//!
//! Raw store documents are written by several producers (listing forms, bulk
//! imports, admin tooling) and arrive with missing or malformed fields.
//! `CatalogItem::from_document` turns any raw document into a well-formed
//! record using field-level fallbacks — a malformed document degrades, it
//! never fails a whole page of results.
//!
//! ## Invariant
//!
//! Normalization is total and idempotent: it accepts any JSON map, and
//! normalizing the document written by [`CatalogItem::to_document`] yields
//! the same record back.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::identity::{CategoryId, ItemId, UserId};
use crate::temporal::Timestamp;

/// Lifecycle status of a catalog item.
///
/// Only `active` items are visible in search results and counted in the
/// per-category aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// Listed and purchasable.
    Active,
    /// Hidden by the seller (draft, paused).
    Inactive,
    /// Hidden by moderation.
    Blocked,
    /// Deleted by the seller; retained for audit.
    Removed,
}

impl ItemStatus {
    /// The wire representation stored in documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Blocked => "blocked",
            Self::Removed => "removed",
        }
    }

    /// Parse a raw status string. Unknown values map to `Inactive` so that
    /// a corrupt status field hides an item rather than exposing it.
    pub fn from_raw(s: &str) -> Self {
        match s {
            "active" => Self::Active,
            "blocked" => Self::Blocked,
            "removed" => Self::Removed,
            _ => Self::Inactive,
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Physical condition of a second-hand item, a filterable attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionTag {
    New,
    LikeNew,
    Good,
    Fair,
    Poor,
}

impl ConditionTag {
    /// The wire representation stored in documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::LikeNew => "like_new",
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Poor => "poor",
        }
    }

    /// Parse a raw condition string, if recognized.
    pub fn from_raw(s: &str) -> Option<Self> {
        match s {
            "new" => Some(Self::New),
            "like_new" => Some(Self::LikeNew),
            "good" => Some(Self::Good),
            "fair" => Some(Self::Fair),
            "poor" => Some(Self::Poor),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConditionTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized catalog item — the record search results are made of.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub id: ItemId,
    pub title: String,
    pub price: f64,
    pub category: CategoryId,
    pub condition: Option<ConditionTag>,
    pub status: ItemStatus,
    pub seller_id: Option<UserId>,
    pub image_urls: Vec<String>,
    pub tags: Vec<String>,
    pub created_at: Timestamp,
    pub view_count: u64,
    pub in_stock: bool,
    pub on_sale: bool,
}

impl CatalogItem {
    /// Normalize a raw store document into a `CatalogItem`.
    ///
    /// Total over any input map. Fallbacks: missing `imageUrls` → empty,
    /// missing `price` → 0, missing/empty `category` → `uncategorized`,
    /// missing `status` → `inactive`, unparseable `createdAt` → epoch.
    pub fn from_document(id: &str, fields: &Map<String, Value>) -> Self {
        let title = str_field(fields, "title").unwrap_or_default();
        let price = fields
            .get("price")
            .and_then(Value::as_f64)
            .filter(|p| p.is_finite())
            .unwrap_or(0.0);
        let category = match str_field(fields, "category") {
            Some(slug) if !slug.is_empty() => CategoryId::new(slug),
            _ => CategoryId::uncategorized(),
        };
        let condition = str_field(fields, "condition")
            .as_deref()
            .and_then(ConditionTag::from_raw);
        let status = str_field(fields, "status")
            .map(|s| ItemStatus::from_raw(&s))
            .unwrap_or(ItemStatus::Inactive);
        let seller_id = str_field(fields, "sellerId")
            .filter(|s| !s.is_empty())
            .map(UserId::new);
        let image_urls = string_array(fields.get("imageUrls"));
        let tags = string_array(fields.get("tags"));
        let created_at = str_field(fields, "createdAt")
            .and_then(|s| Timestamp::parse(&s).ok())
            .unwrap_or_else(Timestamp::epoch);
        let view_count = fields
            .get("viewCount")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let in_stock = fields
            .get("inStock")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let on_sale = fields
            .get("onSale")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Self {
            id: ItemId(id.to_string()),
            title,
            price,
            category,
            condition,
            status,
            seller_id,
            image_urls,
            tags,
            created_at,
            view_count,
            in_stock,
            on_sale,
        }
    }

    /// Render the item as a raw store document.
    ///
    /// Writes the derived `titleLc` field used by the free-text prefix
    /// window. Round-trips through [`CatalogItem::from_document`].
    pub fn to_document(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("title".into(), Value::String(self.title.clone()));
        fields.insert(
            "titleLc".into(),
            Value::String(self.title.to_lowercase()),
        );
        fields.insert("price".into(), json_number(self.price));
        fields.insert(
            "category".into(),
            Value::String(self.category.as_str().to_string()),
        );
        if let Some(cond) = self.condition {
            fields.insert("condition".into(), Value::String(cond.as_str().into()));
        }
        fields.insert("status".into(), Value::String(self.status.as_str().into()));
        if let Some(seller) = &self.seller_id {
            fields.insert("sellerId".into(), Value::String(seller.as_str().into()));
        }
        fields.insert(
            "imageUrls".into(),
            Value::Array(
                self.image_urls
                    .iter()
                    .map(|u| Value::String(u.clone()))
                    .collect(),
            ),
        );
        fields.insert(
            "tags".into(),
            Value::Array(self.tags.iter().map(|t| Value::String(t.clone())).collect()),
        );
        fields.insert(
            "createdAt".into(),
            Value::String(self.created_at.to_iso8601()),
        );
        fields.insert("viewCount".into(), Value::from(self.view_count));
        fields.insert("inStock".into(), Value::Bool(self.in_stock));
        fields.insert("onSale".into(), Value::Bool(self.on_sale));
        fields
    }
}

fn str_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Collect the string entries of an array field, skipping non-strings.
fn string_array(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// A finite f64 as a JSON number; non-finite values degrade to 0.
fn json_number(v: f64) -> Value {
    serde_json::Number::from_f64(v)
        .map(Value::Number)
        .unwrap_or_else(|| Value::from(0))
}
