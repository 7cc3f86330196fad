//! # Sync-Counts Command
//!
//! One-shot batch reconciliation over a catalog fixture: seed an in-memory
//! store, recompute every category's count from the active items, and print
//! the report as JSON. Useful for validating a fixture before serving it.

use std::path::PathBuf;

use clap::Args;

use souq_search::CategoryCountReconciler;
use souq_store::DocumentStore;

use crate::fixture::CatalogFixture;

/// Arguments for `souq sync-counts`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Catalog fixture to reconcile.
    #[arg(long, env = "SOUQ_CATALOG")]
    pub catalog: PathBuf,
}

/// Run one batch reconciliation and print the report.
pub async fn run(args: SyncArgs) -> anyhow::Result<()> {
    let store = DocumentStore::new();
    CatalogFixture::load(&args.catalog)?
        .load_into(&store)
        .await?;

    let reconciler = CategoryCountReconciler::new(store);
    let report = reconciler.synchronize_category_counts().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[tokio::test]
    async fn test_sync_over_fixture() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            json!({
                "categories": [
                    { "id": "books", "name": "Books" },
                    { "id": "toys", "name": "Toys" },
                ],
                "items": [
                    { "id": "p1", "title": "Novel", "category": "books", "status": "active" },
                    { "id": "p2", "title": "Atlas", "category": "books", "status": "active" },
                    { "id": "p3", "title": "Kite", "category": "toys", "status": "inactive" },
                ],
            })
            .to_string()
            .as_bytes(),
        )
        .unwrap();

        let store = DocumentStore::new();
        CatalogFixture::load(file.path())
            .unwrap()
            .load_into(&store)
            .await
            .unwrap();

        let report = CategoryCountReconciler::new(store)
            .synchronize_category_counts()
            .await
            .unwrap();
        assert_eq!(report.updated_categories, 2);
        assert_eq!(report.zero_count_categories.len(), 1);
        assert_eq!(report.zero_count_categories[0].id.as_str(), "toys");
    }
}
