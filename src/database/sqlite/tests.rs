use super::*;
use std::collections::HashSet;
use tempfile::TempDir;

async fn create_test_store() -> (TempDir, ConversationStore) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = ConversationStore::initialize_from_config_dir(temp_dir.path())
        .await
        .expect("should open store");
    (temp_dir, store)
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(ToString::to_string).collect()
}

#[tokio::test]
async fn integration_schema_migration() {
    let (temp_dir, store) = create_test_store().await;

    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name NOT LIKE '_sqlx%'",
    )
    .fetch_all(store.pool())
    .await
    .expect("should list tables");

    let actual: HashSet<&str> = tables.iter().map(String::as_str).collect();
    assert_eq!(actual, HashSet::from(["conversations"]));
    assert!(temp_dir.path().join(DATABASE_FILE_NAME).exists());
}

#[tokio::test]
async fn ids_strictly_increase_across_deletes() {
    let (_temp_dir, store) = create_test_store().await;

    let mut ids = Vec::new();
    for i in 0..3 {
        ids.push(
            store
                .record(&format!("q{}", i), "a", &[])
                .await
                .expect("should record"),
        );
    }
    store.delete(ids[2]).await.expect("should delete");
    let next = store.record("q3", "a", &[]).await.expect("should record");

    assert!(ids.windows(2).all(|w| w[0] < w[1]));
    assert!(next > ids[2], "deleted id {} was reused", ids[2]);
}

#[tokio::test]
async fn get_after_delete_is_not_found() {
    let (_temp_dir, store) = create_test_store().await;

    let id = store
        .record("How long do refunds take?", "14 days.", &names(&["faq.pdf"]))
        .await
        .expect("should record");

    let record = store.get(id).await.expect("should fetch record");
    assert_eq!(record.question, "How long do refunds take?");
    assert_eq!(record.source_document_names, names(&["faq.pdf"]));
    assert!(record.parsed_timestamp().is_some());

    store.delete(id).await.expect("should delete");
    assert!(matches!(store.get(id).await, Err(RagError::NotFound(missing)) if missing == id));

    store.delete(id).await.expect("deleting twice should succeed");
    assert_eq!(store.count().await.expect("should count"), 0);
}

#[tokio::test]
async fn summaries_are_in_id_order() {
    let (_temp_dir, store) = create_test_store().await;

    store.record("first", "a", &[]).await.expect("should record");
    store.record("second", "b", &[]).await.expect("should record");

    let summaries = store.summaries().await.expect("should list");
    let labels: Vec<&str> = summaries.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(labels, vec!["Conversation 1", "Conversation 2"]);
    assert!(summaries[0].id < summaries[1].id);
}

#[tokio::test]
async fn log_survives_reopen() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let id = {
        let store = ConversationStore::initialize_from_config_dir(temp_dir.path())
            .await
            .expect("should open store");
        let id = store.record("q", "a", &[]).await.expect("should record");
        store.pool().close().await;
        id
    };

    let reopened = ConversationStore::initialize_from_config_dir(temp_dir.path())
        .await
        .expect("should reopen store");
    assert_eq!(reopened.get(id).await.expect("should fetch").answer, "a");
}

#[tokio::test]
async fn timestamps_are_recorded_in_utc() {
    let (_temp_dir, store) = create_test_store().await;

    let before = Utc::now().naive_utc();
    let id = store.record("q", "a", &[]).await.expect("should record");
    let after = Utc::now().naive_utc();

    let stamped = store
        .get(id)
        .await
        .expect("should fetch record")
        .parsed_timestamp()
        .expect("timestamp should parse");
    // Stored at whole-second precision
    assert!(stamped >= before - chrono::Duration::seconds(1));
    assert!(stamped <= after);
}
