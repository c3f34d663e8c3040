//! Runs the shared contract against a real bucket. Set
//! `OBJSTASH_S3_TEST_BUCKET` (plus the usual AWS credentials, and
//! `OBJSTASH_S3_ENDPOINT` for MinIO and friends) to enable; skipped otherwise.

#![cfg(feature = "s3")]

mod common;

use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use objstash_storage::{MemoryObjectStore, ObjectStore, S3Config, S3ObjectStore};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

async fn test_store() -> Option<S3ObjectStore> {
    let bucket = std::env::var("OBJSTASH_S3_TEST_BUCKET").ok()?;
    let mut config = S3Config::new(bucket);
    if let Ok(region) = std::env::var("OBJSTASH_S3_REGION") {
        config = config.with_region(region);
    }
    if let Ok(endpoint) = std::env::var("OBJSTASH_S3_ENDPOINT") {
        config = config.with_endpoint(endpoint);
    }
    Some(S3ObjectStore::new(config).await.expect("S3 store should build"))
}

fn unique_base(name: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("objstash-tests/{name}-{nanos}/")
}

#[tokio::test]
async fn test_s3_store_contract() {
    common::init_tracing();
    let Some(store) = test_store().await else {
        eprintln!("OBJSTASH_S3_TEST_BUCKET not set, skipping");
        return;
    };
    let base = unique_base("contract");

    common::run_all(&store, &base).await;

    store.delete_recursive(&base).await.unwrap();
    assert!(!store.exists_under_prefix(&base).await.unwrap());
}

#[tokio::test]
async fn test_s3_native_copy_drops_source_metadata() {
    let Some(store) = test_store().await else {
        return;
    };
    let base = unique_base("metadata");
    let source_key = format!("{base}tagged");
    let destination_key = format!("{base}plain");

    store
        .client()
        .put_object()
        .bucket(store.bucket())
        .key(&source_key)
        .body(ByteStream::from_static(b"helloworld"))
        .set_metadata(Some(HashMap::from([(
            "owner".to_string(),
            "billing".to_string(),
        )])))
        .website_redirect_location("/elsewhere")
        .tagging("team=storage")
        .send()
        .await
        .unwrap();

    store
        .copy_single(&store, &source_key, &destination_key)
        .await
        .unwrap();

    let head = store
        .client()
        .head_object()
        .bucket(store.bucket())
        .key(&destination_key)
        .send()
        .await
        .unwrap();
    assert!(head.metadata().map_or(true, |m| m.is_empty()));
    assert_eq!(head.website_redirect_location(), None);

    let tags = store
        .client()
        .get_object_tagging()
        .bucket(store.bucket())
        .key(&destination_key)
        .send()
        .await
        .unwrap();
    assert!(tags.tag_set().is_empty());
    assert_eq!(store.get_or_fail(&destination_key).await.unwrap(), "helloworld");

    store.delete_recursive(&base).await.unwrap();
}

#[tokio::test]
async fn test_s3_copies_to_and_from_memory() {
    let Some(store) = test_store().await else {
        return;
    };
    let base = unique_base("cross");
    let memory = MemoryObjectStore::new();
    memory
        .put("local", Bytes::from_static(b"from memory"))
        .await
        .unwrap();

    let remote_key = format!("{base}remote");
    store.copy_single(&memory, "local", &remote_key).await.unwrap();
    memory
        .copy_single(&store, &remote_key, "back")
        .await
        .unwrap();

    assert_eq!(memory.get_or_fail("back").await.unwrap(), "from memory");
    store.delete_recursive(&base).await.unwrap();
}

#[tokio::test]
async fn test_s3_copy_recursive_into_own_subprefix() {
    let Some(store) = test_store().await else {
        return;
    };
    let base = unique_base("subprefix");
    for i in 0..5 {
        store
            .put(&format!("{base}a/{i}"), Bytes::from(format!("v{i}")))
            .await
            .unwrap();
    }

    store
        .copy_recursive(&format!("{base}a/"), &format!("{base}a/copy/"))
        .await
        .unwrap();

    for i in 0..5 {
        assert_eq!(
            store
                .get_or_fail(&format!("{base}a/copy/{i}"))
                .await
                .unwrap(),
            format!("v{i}")
        );
    }
    assert!(!store
        .exists_under_prefix(&format!("{base}a/copy/copy/"))
        .await
        .unwrap());

    store.delete_recursive(&base).await.unwrap();
}
