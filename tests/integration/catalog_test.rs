//! Schema catalog behaviour seen through the question service.

use std::sync::Arc;
use std::time::Duration;

use klustercost_ask::catalog::{CatalogPolicy, SchemaCatalog};
use klustercost_ask::db::MockDatabaseClient;
use pretty_assertions::assert_eq;

use super::common::pods_schema;

fn slow_store() -> Arc<MockDatabaseClient> {
    Arc::new(
        MockDatabaseClient::with_schema(pods_schema())
            .with_catalog_delay(Duration::from_millis(50)),
    )
}

#[tokio::test]
async fn test_concurrent_first_access_fetches_once() {
    let db = slow_store();
    let catalog = Arc::new(SchemaCatalog::new(
        db.clone(),
        CatalogPolicy::new("klustercost"),
    ));

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let catalog = Arc::clone(&catalog);
            tokio::spawn(async move { catalog.get().await })
        })
        .collect();

    let mut snapshots = Vec::new();
    for handle in handles {
        snapshots.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(db.catalog_calls(), 1);
    assert!(snapshots
        .iter()
        .all(|snapshot| Arc::ptr_eq(snapshot, &snapshots[0])));
    assert_eq!(snapshots[0].version, 1);
}

#[tokio::test]
async fn test_snapshot_text_lists_columns_in_order() {
    let catalog = SchemaCatalog::new(
        Arc::new(MockDatabaseClient::with_schema(pods_schema())),
        CatalogPolicy::new("klustercost"),
    );

    let snapshot = catalog.get().await.unwrap();
    assert_eq!(
        snapshot.text,
        "klustercost.pods: name (text), namespace (text)"
    );
}

#[tokio::test]
async fn test_expired_snapshot_is_refetched_once() {
    let db = Arc::new(MockDatabaseClient::with_schema(pods_schema()));
    let catalog = Arc::new(SchemaCatalog::new(
        db.clone(),
        CatalogPolicy::new("klustercost").with_ttl(Some(Duration::from_millis(20))),
    ));

    assert_eq!(catalog.get().await.unwrap().version, 1);
    tokio::time::sleep(Duration::from_millis(40)).await;

    let results = futures::future::join_all((0..8).map(|_| catalog.get())).await;

    assert!(results
        .iter()
        .all(|result| result.as_ref().map(|s| s.version).ok() == Some(2)));
    assert_eq!(db.catalog_calls(), 2);
}

#[tokio::test]
async fn test_refresh_replaces_snapshot_for_later_readers() {
    let db = Arc::new(MockDatabaseClient::with_schema(pods_schema()));
    let catalog = SchemaCatalog::new(db.clone(), CatalogPolicy::new("klustercost"));

    let first = catalog.get().await.unwrap();
    let refreshed = catalog.refresh().await.unwrap();
    let after = catalog.get().await.unwrap();

    assert_eq!(first.version, 1);
    assert_eq!(refreshed.version, 2);
    assert!(Arc::ptr_eq(&refreshed, &after));
    assert_eq!(db.catalog_calls(), 2);
}
