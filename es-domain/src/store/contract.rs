//! 存储契约测试套件
//!
//! 各存储后端在自身测试中调用 `run_all`，以验证与内存实现一致的语义。
//! 每个用例使用独立的聚合 ID，可在共享的后端实例上运行。
//!
use super::Store;
use crate::error::ErrorCode;
use crate::record::Record;
use chrono::Utc;
use std::sync::Arc;

fn unique_id(name: &str) -> String {
    format!("{name}-{}", Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

fn rec(version: u64, data: &str) -> Record {
    Record::new(version, data.as_bytes().to_vec())
}

fn versions(records: &[Record]) -> Vec<u64> {
    records.iter().map(|r| r.version).collect()
}

pub async fn run_all<S: Store + ?Sized>(store: &S) {
    empty_save_is_noop(store).await;
    idempotent_replay(store).await;
    optimistic_conflict(store).await;
    failed_save_writes_nothing(store).await;
    range_filter(store).await;
    not_found_distinction(store).await;
    duplicate_versions_rejected(store).await;
    unsorted_input_accepted(store).await;
}

pub async fn empty_save_is_noop<S: Store + ?Sized>(store: &S) {
    let id = unique_id("empty");
    store.save(&id, vec![]).await.unwrap();
    let err = store.load(&id, 0, 0).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::AggregateNotFound);
}

pub async fn idempotent_replay<S: Store + ?Sized>(store: &S) {
    let id = unique_id("replay");
    let history = vec![rec(1, "a"), rec(2, "b")];
    store.save(&id, history.clone()).await.unwrap();
    store.save(&id, history.clone()).await.unwrap();
    store.save(&id, vec![rec(2, "b")]).await.unwrap();

    let loaded = store.load(&id, 0, 0).await.unwrap();
    assert_eq!(loaded.into_records(), history);
}

pub async fn optimistic_conflict<S: Store + ?Sized>(store: &S) {
    let id = unique_id("conflict");
    store.save(&id, vec![rec(1, "a"), rec(2, "b")]).await.unwrap();

    let err = store
        .save(&id, vec![rec(2, "c"), rec(3, "d")])
        .await
        .unwrap_err();
    assert!(err.is_conflict(), "expected conflict, got {err:?}");
}

pub async fn failed_save_writes_nothing<S: Store + ?Sized>(store: &S) {
    let id = unique_id("atomic");
    store.save(&id, vec![rec(1, "a"), rec(2, "b")]).await.unwrap();

    let _ = store.save(&id, vec![rec(2, "b"), rec(3, "c")]).await;

    let loaded = store.load(&id, 0, 0).await.unwrap();
    assert_eq!(versions(&loaded), vec![1, 2]);
}

pub async fn range_filter<S: Store + ?Sized>(store: &S) {
    let id = unique_id("range");
    store
        .save(&id, vec![rec(1, "a"), rec(2, "b"), rec(3, "c")])
        .await
        .unwrap();

    assert_eq!(versions(&store.load(&id, 2, 0).await.unwrap()), vec![2, 3]);
    assert_eq!(versions(&store.load(&id, 1, 2).await.unwrap()), vec![1, 2]);
    assert_eq!(versions(&store.load(&id, 2, 2).await.unwrap()), vec![2]);
}

pub async fn not_found_distinction<S: Store + ?Sized>(store: &S) {
    let id = unique_id("missing");
    let err = store.load(&id, 0, 0).await.unwrap_err();
    assert!(err.is_not_found(), "expected not found, got {err:?}");

    store.save(&id, vec![rec(1, "a")]).await.unwrap();
    let empty = store.load(&id, 5, 0).await.unwrap();
    assert!(empty.is_empty());
}

pub async fn duplicate_versions_rejected<S: Store + ?Sized>(store: &S) {
    let id = unique_id("dup");
    let err = store
        .save(&id, vec![rec(1, "a"), rec(1, "b")])
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::DuplicateVersion);
}

pub async fn unsorted_input_accepted<S: Store + ?Sized>(store: &S) {
    let id = unique_id("unsorted");
    store
        .save(&id, vec![rec(2, "b"), rec(3, "c"), rec(1, "a")])
        .await
        .unwrap();
    let loaded = store.load(&id, 0, 0).await.unwrap();
    assert_eq!(versions(&loaded), vec![1, 2, 3]);
}

/// 多个写入者并发写入同一版本：恰有一个成功，其余均得到冲突
///
/// 需要在多线程运行时中调用。
pub async fn concurrent_writers<S>(store: Arc<S>, writers: usize)
where
    S: Store + ?Sized + 'static,
{
    let id = unique_id("race");
    let handles: Vec<_> = (0..writers)
        .map(|n| {
            let store = store.clone();
            let id = id.clone();
            tokio::spawn(async move {
                store
                    .save(&id, vec![rec(1, &format!("writer-{n}"))])
                    .await
            })
        })
        .collect();

    let (mut ok, mut conflicts) = (0, 0);
    for handle in handles {
        match handle.await.expect("writer task panicked") {
            Ok(()) => ok += 1,
            Err(err) if err.is_conflict() => conflicts += 1,
            Err(err) => panic!("unexpected error from concurrent writer: {err:?}"),
        }
    }
    assert_eq!((ok, conflicts), (1, writers - 1));

    let loaded = store.load(&id, 0, 0).await.unwrap();
    assert_eq!(versions(&loaded), vec![1]);
}
