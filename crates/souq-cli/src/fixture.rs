//! # Catalog Fixtures
//!
//! JSON fixture loading for local development and one-shot maintenance runs.
//! A fixture seeds the in-memory document store with category documents and
//! raw item documents:
//!
//! ```json
//! {
//!   "categories": [{ "id": "books", "name": "Books" }],
//!   "items": [{ "id": "p1", "title": "Novel", "category": "books", "status": "active" }]
//! }
//! ```
//!
//! Item documents are stored as-is; field normalization happens at read time
//! in the search layer, so a fixture may carry the same partial documents a
//! live catalog would.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use serde_json::{Map, Value};

use souq_core::ItemId;
use souq_search::{CATEGORIES_COLLECTION, PRODUCTS_COLLECTION};
use souq_store::{DocId, DocumentStore};

/// A catalog fixture: provisioned categories plus raw item documents.
#[derive(Debug, Deserialize)]
pub struct CatalogFixture {
    #[serde(default)]
    pub categories: Vec<FixtureCategory>,
    #[serde(default)]
    pub items: Vec<FixtureItem>,
}

/// One category to provision. Counts start at zero and are owned by the
/// reconciler from then on.
#[derive(Debug, Deserialize)]
pub struct FixtureCategory {
    pub id: String,
    pub name: String,
}

/// One item document. The `id` is optional; absent ids are generated.
#[derive(Debug, Deserialize)]
pub struct FixtureItem {
    pub id: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl CatalogFixture {
    /// Read and parse a fixture file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading catalog fixture {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parsing catalog fixture {}", path.display()))
    }

    /// Seed a store with the fixture contents in a single batch.
    pub async fn load_into(self, store: &DocumentStore) -> anyhow::Result<()> {
        let categories = self.categories.len();
        let items = self.items.len();

        let mut batch = store.write_batch();
        for category in self.categories {
            let mut doc = Map::new();
            doc.insert("name".into(), Value::String(category.name));
            doc.insert("productCount".into(), Value::from(0));
            batch.set(CATEGORIES_COLLECTION, DocId::from(category.id.as_str()), doc);
        }
        for item in self.items {
            let id = item.id.unwrap_or_else(|| ItemId::new().to_string());
            batch.set(PRODUCTS_COLLECTION, DocId::from(id.as_str()), item.fields);
        }
        batch
            .commit()
            .await
            .context("seeding store from catalog fixture")?;

        tracing::info!(categories, items, "loaded catalog fixture");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use souq_store::Query;
    use std::io::Write;

    fn write_fixture(value: &Value) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(value.to_string().as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_fixture_seeds_store() {
        let file = write_fixture(&json!({
            "categories": [{ "id": "books", "name": "Books" }],
            "items": [
                { "id": "p1", "title": "Novel", "category": "books", "status": "active" },
                { "title": "No id", "category": "books" },
            ],
        }));

        let store = DocumentStore::new();
        let fixture = CatalogFixture::load(file.path()).unwrap();
        fixture.load_into(&store).await.unwrap();

        let categories = store
            .get_docs(&Query::collection(CATEGORIES_COLLECTION))
            .await
            .unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories.docs[0].fields["productCount"], json!(0));

        let products = store
            .get_docs(&Query::collection(PRODUCTS_COLLECTION))
            .await
            .unwrap();
        assert_eq!(products.len(), 2);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = CatalogFixture::load(Path::new("/nonexistent/fixture.json"))
            .err()
            .unwrap();
        assert!(err.to_string().contains("fixture"));
    }

    #[test]
    fn test_empty_sections_default() {
        let fixture: CatalogFixture = serde_json::from_value(json!({})).unwrap();
        assert!(fixture.categories.is_empty());
        assert!(fixture.items.is_empty());
    }
}
