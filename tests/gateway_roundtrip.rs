use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use blockflow::editor::{GridSize, InstanceIdGenerator, RawPoint, place_at, template};
use blockflow::gateway::{PersistenceGateway, diagram_path};
use blockflow::identity::Principal;
use blockflow::model::{BlockInstance, BlockKind, PropertyValue};
use blockflow::store::{DocumentStore, FsStore, MemoryStore};
use camino::Utf8PathBuf;
use futures::StreamExt;
use serde_json::json;

fn block(kind: BlockKind, x: f64, y: f64, ids: &mut InstanceIdGenerator) -> BlockInstance {
    place_at(template(kind), RawPoint::new(x, y), GridSize::default(), ids).unwrap()
}

fn sample_blocks() -> Vec<BlockInstance> {
    let mut ids = InstanceIdGenerator::new();
    let mut esp = block(BlockKind::Esp32, 103.0, 77.0, &mut ids);
    esp.properties.insert("pin".into(), PropertyValue::Int(4));
    esp.properties.insert("label".into(), PropertyValue::Text("door".into()));
    vec![
        block(BlockKind::User, 0.0, 0.0, &mut ids),
        esp,
        block(BlockKind::Environment, 400.0, 20.0, &mut ids),
    ]
}

#[tokio::test]
async fn test_memory_save_then_load_preserves_order_and_properties() -> Result<()> {
    let gateway = PersistenceGateway::new(Arc::new(MemoryStore::new()), "lab");
    let blocks = sample_blocks();

    let record = gateway.save(&blocks, &Principal::new("u-1")).await?;
    assert_eq!(record.updated_by, "u-1");
    assert!(record.updated_at > 0);

    let loaded = gateway.load().await?;
    assert_eq!(loaded, blocks);
    assert_eq!(loaded[1].properties.get("pin"), Some(&PropertyValue::Int(4)));
    Ok(())
}

#[tokio::test]
async fn test_stored_record_shape() -> Result<()> {
    let store = MemoryStore::new();
    let gateway = PersistenceGateway::new(Arc::new(store.clone()), "lab");
    gateway
        .save_at(&sample_blocks()[..1], &Principal::new("u-9"), 1_700_000_000_000)
        .await?;

    let doc = store.get(&diagram_path("lab")).await?.unwrap();
    assert_eq!(doc["updatedAt"], 1_700_000_000_000i64);
    assert_eq!(doc["updatedBy"], "u-9");
    let blocks: serde_json::Value = serde_json::from_str(doc["blocks"].as_str().unwrap())?;
    assert_eq!(blocks[0]["id"], "user");
    assert_eq!(blocks[0]["type"], "Required Block");
    assert_eq!(blocks[0]["position"], json!({"x": 0, "y": 0}));
    Ok(())
}

#[tokio::test]
async fn test_empty_canvas_save_clears_diagram() -> Result<()> {
    let gateway = PersistenceGateway::new(Arc::new(MemoryStore::new()), "lab");
    gateway.save(&sample_blocks(), &Principal::new("u")).await?;
    gateway.save(&[], &Principal::new("u")).await?;
    assert!(gateway.load().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_subscription_delivers_initial_then_commits_in_order() -> Result<()> {
    let store = MemoryStore::new();
    let gateway = PersistenceGateway::new(Arc::new(store.clone()), "lab");
    let mut sub = gateway.subscribe().await?;

    let blocks = sample_blocks();
    gateway.save(&blocks[..1], &Principal::new("a")).await?;
    gateway.save(&blocks, &Principal::new("b")).await?;

    assert!(sub.next().await.unwrap().is_empty());
    assert_eq!(sub.next().await.unwrap().len(), 1);
    assert_eq!(sub.next().await.unwrap().len(), 3);
    assert!(sub.try_next().is_none());
    Ok(())
}

#[tokio::test]
async fn test_malformed_payload_is_skipped() -> Result<()> {
    let store = MemoryStore::new();
    let path = diagram_path("lab");
    let gateway = PersistenceGateway::new(Arc::new(store.clone()), "lab");
    gateway.save(&sample_blocks(), &Principal::new("a")).await?;

    let mut sub = gateway.subscribe().await?;
    assert_eq!(sub.next().await.unwrap().len(), 3);

    let bad = json!({"blocks": "[{\"id\": \"user\"", "updatedAt": 1, "updatedBy": "x"});
    store.set(&path, bad.as_object().cloned().unwrap()).await?;
    let missing = json!({"updatedAt": 2, "updatedBy": "x"});
    store.set(&path, missing.as_object().cloned().unwrap()).await?;
    gateway.save(&sample_blocks()[..2], &Principal::new("a")).await?;

    // The two bad writes never surface; the next snapshot is the good one.
    assert_eq!(sub.next().await.unwrap().len(), 2);
    assert!(gateway.load().await.is_ok());
    Ok(())
}

#[tokio::test]
async fn test_last_write_wins_between_sessions() -> Result<()> {
    let store = MemoryStore::new();
    let alice = PersistenceGateway::new(Arc::new(store.clone()), "lab");
    let bob = PersistenceGateway::new(Arc::new(store.clone()), "lab");
    let blocks = sample_blocks();

    alice.save(&blocks, &Principal::new("alice")).await?;
    bob.save(&blocks[2..], &Principal::new("bob")).await?;

    let loaded = alice.load().await?;
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].kind(), BlockKind::Environment);
    let doc = store.get(alice.path()).await?.unwrap();
    assert_eq!(doc["updatedBy"], "bob");
    Ok(())
}

#[tokio::test]
async fn test_unsubscribe_ends_stream() -> Result<()> {
    let store = MemoryStore::new();
    let gateway = PersistenceGateway::new(Arc::new(store.clone()), "lab");
    let mut sub = gateway.subscribe().await?;
    assert_eq!(store.watcher_count(gateway.path()), 1);

    sub.unsubscribe();
    sub.unsubscribe();
    assert!(!sub.is_active());
    assert!(StreamExt::next(&mut sub).await.is_none());
    assert_eq!(store.watcher_count(gateway.path()), 0);
    Ok(())
}

#[tokio::test]
async fn test_fs_store_roundtrip_and_watch() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    let store = FsStore::new(&root).with_poll_interval(Duration::from_millis(20));
    let gateway = PersistenceGateway::new(Arc::new(store.clone()), "lab");

    let mut sub = gateway.subscribe().await?;
    let first = tokio::time::timeout(Duration::from_secs(5), sub.next()).await?;
    assert_eq!(first, Some(Vec::new()));

    let blocks = sample_blocks();
    gateway.save(&blocks, &Principal::new("u")).await?;
    assert!(
        root.join("artifacts/lab/public/data/block_diagrams/main_flow.json")
            .exists()
    );

    let next = tokio::time::timeout(Duration::from_secs(5), sub.next()).await?;
    assert_eq!(next, Some(blocks.clone()));

    // A second handle on the same directory sees the same diagram.
    let other = PersistenceGateway::new(Arc::new(FsStore::new(&root)), "lab");
    assert_eq!(other.load().await?, blocks);
    Ok(())
}
