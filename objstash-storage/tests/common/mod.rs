//! Behaviour every backend must share. Each check works under its own
//! key prefix so the suite can run against a shared bucket.

#![allow(dead_code)]

use bytes::Bytes;
use futures::TryStreamExt;
use objstash_storage::{stream_from_chunks, ObjectInfo, ObjectStore};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn payload(s: &'static str) -> Bytes {
    Bytes::from_static(s.as_bytes())
}

pub async fn put_get_delete_round_trip(store: &dyn ObjectStore, base: &str) {
    let key = format!("{base}roundtrip/object");
    store.put(&key, payload("some bytes")).await.unwrap();

    assert!(store.exists(&key).await.unwrap());
    assert_eq!(store.get(&key).await.unwrap().unwrap(), "some bytes");
    assert_eq!(store.head(&key).await.unwrap(), Some(ObjectInfo::new(10)));

    store.delete_single(&key).await.unwrap();
    assert!(!store.exists(&key).await.unwrap());
    assert!(store.get(&key).await.unwrap().is_none());
    assert!(store.head(&key).await.unwrap().is_none());
}

pub async fn missing_key_contract(store: &dyn ObjectStore, base: &str) {
    let key = format!("{base}nonexistent");
    assert!(store.get(&key).await.unwrap().is_none());
    assert!(!store.exists(&key).await.unwrap());
    assert!(store.head(&key).await.unwrap().is_none());
    assert!(store.get_as_chunks(&key, 3).await.unwrap().is_none());

    assert!(store.get_or_fail(&key).await.unwrap_err().is_not_found());
    assert!(store
        .get_as_chunks_or_fail(&key, 3)
        .await
        .err()
        .unwrap()
        .is_not_found());

    store.delete_single(&key).await.unwrap();
    store.delete_many(&[key.clone(), format!("{key}-2")]).await.unwrap();
}

pub async fn chunked_read_and_write(store: &dyn ObjectStore, base: &str) {
    let key = format!("{base}chunks/whole");
    store.put(&key, payload("abcdefg")).await.unwrap();

    let chunks: Vec<Bytes> = store
        .get_as_chunks_or_fail(&key, 3)
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    assert_eq!(chunks, vec!["abc", "def", "g"]);

    let assembled = format!("{base}chunks/assembled");
    let input = stream_from_chunks(vec![payload("abc"), payload("def"), payload("g")]);
    store.put_chunks(&assembled, input).await.unwrap();
    assert_eq!(store.get_or_fail(&assembled).await.unwrap(), "abcdefg");

    let empty = format!("{base}chunks/empty");
    store.put(&empty, Bytes::new()).await.unwrap();
    let chunks: Vec<Bytes> = store
        .get_as_chunks_or_fail(&empty, 3)
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    assert_eq!(chunks, vec![Bytes::new()]);
}

pub async fn copy_single_within_store(store: &dyn ObjectStore, base: &str) {
    let source = format!("{base}test/copyObject1");
    let destination = format!("{base}test/copyObject2");
    store.put(&source, payload("helloworld")).await.unwrap();

    store.copy_single(store, &source, &destination).await.unwrap();

    assert_eq!(store.get(&destination).await.unwrap().unwrap(), "helloworld");
    assert!(store.exists(&source).await.unwrap());

    let missing = format!("{base}test/missing");
    let err = store
        .copy_single(store, &missing, &destination)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

pub async fn copy_recursive_scenario(store: &dyn ObjectStore, base: &str) {
    store
        .put(&format!("{base}test/copyObject1"), payload("helloworld"))
        .await
        .unwrap();
    store
        .put(&format!("{base}test/nested/copyObject3"), payload("nested"))
        .await
        .unwrap();

    store
        .copy_recursive(&format!("{base}test/"), &format!("{base}test2/"))
        .await
        .unwrap();

    assert_eq!(
        store
            .get(&format!("{base}test2/copyObject1"))
            .await
            .unwrap()
            .unwrap(),
        "helloworld"
    );
    assert_eq!(
        store
            .get_or_fail(&format!("{base}test2/nested/copyObject3"))
            .await
            .unwrap(),
        "nested"
    );

    store
        .copy_recursive(&format!("{base}absent/"), &format!("{base}never/"))
        .await
        .unwrap();
    assert!(!store
        .exists_under_prefix(&format!("{base}never/"))
        .await
        .unwrap());
}

pub async fn delete_recursive_scenario(store: &dyn ObjectStore, base: &str) {
    for key in ["a/1", "a/2", "b/1"] {
        store
            .put(&format!("{base}{key}"), payload("x"))
            .await
            .unwrap();
    }

    store.delete_recursive(&format!("{base}a/")).await.unwrap();

    assert!(!store.exists(&format!("{base}a/1")).await.unwrap());
    assert!(!store.exists(&format!("{base}a/2")).await.unwrap());
    assert!(store.exists(&format!("{base}b/1")).await.unwrap());
    assert!(!store.exists_under_prefix(&format!("{base}a/")).await.unwrap());
    assert!(store.exists_under_prefix(&format!("{base}b/")).await.unwrap());

    store.delete_recursive(&format!("{base}zzz/")).await.unwrap();
}

pub async fn move_object_scenario(store: &dyn ObjectStore, base: &str) {
    let from = format!("{base}move/from");
    let to = format!("{base}move/to");
    store.put(&from, payload("moving")).await.unwrap();

    store.move_object(&from, &to).await.unwrap();

    assert!(!store.exists(&from).await.unwrap());
    assert_eq!(store.get_or_fail(&to).await.unwrap(), "moving");
}

pub async fn run_all(store: &dyn ObjectStore, base: &str) {
    put_get_delete_round_trip(store, base).await;
    missing_key_contract(store, base).await;
    chunked_read_and_write(store, base).await;
    copy_single_within_store(store, base).await;
    copy_recursive_scenario(store, base).await;
    delete_recursive_scenario(store, base).await;
    move_object_scenario(store, base).await;
}
