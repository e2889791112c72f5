use std::sync::Arc;

use soultrace_core_types::{EventRecord, EventType, TaskId};
use soultrace_task_store::{
    export_task, update_task, InMemoryTaskStore, JsonFileTaskStore, TaskRecord, TaskStatus,
    TaskStore, TsErrorKind,
};

fn record(id: &str, start: i64) -> TaskRecord {
    TaskRecord::new(TaskId::from(id), "https://a/", start)
}

#[tokio::test]
async fn file_store_round_trips_and_lists() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileTaskStore::open(dir.path().join("tasks")).unwrap();

    let mut first = record("T1", 20);
    first.append_events([EventRecord::new(EventType::PageLoad, 20, "https://a/")]);
    store.put(&TaskId::from("T1"), first).await.unwrap();
    store.put(&TaskId::from("T0"), record("T0", 10)).await.unwrap();

    let loaded = store.get(&TaskId::from("T1")).await.unwrap().unwrap();
    assert_eq!(loaded.revision, 1);
    assert_eq!(loaded.events.len(), 1);

    let summaries = store.summaries().await.unwrap();
    let ids: Vec<_> = summaries.iter().map(|s| s.id.as_str().to_string()).collect();
    assert_eq!(ids, ["T0", "T1"]);
    assert_eq!(summaries[1].event_count, 1);

    assert!(store.delete(&TaskId::from("T0")).await.unwrap());
    assert!(!store.delete(&TaskId::from("T0")).await.unwrap());
    assert!(store.get(&TaskId::from("T0")).await.unwrap().is_none());
}

#[tokio::test]
async fn file_store_rejects_stale_writes() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileTaskStore::open(dir.path()).unwrap();
    let stored = store.put_if_revision(record("T1", 0), None).await.unwrap();

    let mut stale = stored.clone();
    stale.title = "stale".into();
    store.put(&stored.id, stored.clone()).await.unwrap();

    let err = store
        .put_if_revision(stale, Some(stored.revision))
        .await
        .unwrap_err();
    match err.kind() {
        TsErrorKind::Conflict {
            expected, actual, ..
        } => {
            assert_eq!(*expected, Some(1));
            assert_eq!(*actual, Some(2));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_updates_do_not_lose_events() {
    let store = InMemoryTaskStore::new();
    let id = TaskId::from("T1");
    store.put(&id, record("T1", 0)).await.unwrap();

    let mut handles = Vec::new();
    for n in 0..8i64 {
        let store = Arc::clone(&store);
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            update_task(store.as_ref(), &id, 100, |current| {
                let mut record = current?;
                record.append_events([EventRecord::new(EventType::Click, n, "https://a/")]);
                Some(record)
            })
            .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let stored = store.get(&id).await.unwrap().unwrap();
    assert_eq!(stored.events.len(), 8);
    assert_eq!(stored.revision, 9);
}

#[tokio::test]
async fn update_task_can_skip_and_create() {
    let store = InMemoryTaskStore::new();
    let id = TaskId::from("T9");

    let skipped = update_task(store.as_ref(), &id, 3, |current| current)
        .await
        .unwrap();
    assert!(skipped.is_none());
    assert!(store.is_empty());

    let created = update_task(store.as_ref(), &id, 3, |current| {
        Some(current.unwrap_or_else(|| record("T9", 5)))
    })
    .await
    .unwrap()
    .unwrap();
    assert_eq!(created.revision, 1);
    assert_eq!(created.status, TaskStatus::Recording);
}

#[tokio::test]
async fn export_writes_the_serialized_record() {
    let dir = tempfile::tempdir().unwrap();
    let store = InMemoryTaskStore::new();
    let id = TaskId::from("T1");
    let mut task = record("T1", 0);
    task.append_events([EventRecord::new(EventType::PageLoad, 0, "https://a/")]);
    task.complete(10);
    store.put(&id, task).await.unwrap();

    let out = dir.path().join("exports/T1.json");
    let count = export_task(store.as_ref(), &id, &out).await.unwrap();
    assert_eq!(count, 1);

    let body = std::fs::read_to_string(&out).unwrap();
    let value: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value["id"], "T1");
    assert_eq!(value["status"], "completed");
    assert_eq!(value["endTime"], 10);

    let missing = export_task(store.as_ref(), &TaskId::from("nope"), &out)
        .await
        .unwrap_err();
    assert!(matches!(missing.kind(), TsErrorKind::NotFound(_)));
}

#[tokio::test]
async fn file_store_keeps_ids_that_differ_only_in_punctuation() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileTaskStore::open(dir.path()).unwrap();
    store.put(&TaskId::from("a_b"), record("a_b", 1)).await.unwrap();

    let created = update_task(&store, &TaskId::from("a/b"), 3, |current| {
        assert!(current.is_none());
        Some(record("a/b", 2))
    })
    .await
    .unwrap();
    assert!(created.is_some());

    assert_eq!(
        store.get(&TaskId::from("a_b")).await.unwrap().unwrap().start_time,
        1
    );
    assert_eq!(
        store.get(&TaskId::from("a/b")).await.unwrap().unwrap().start_time,
        2
    );
    let ids: Vec<_> = store.list_all().await.unwrap().into_keys().collect();
    assert_eq!(ids, [TaskId::from("a/b"), TaskId::from("a_b")]);
}
