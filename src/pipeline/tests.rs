use super::*;
use crate::ingest::Chunk;
use crate::providers::{EmbeddingError, SynthesisError};
use crate::test_support::{KeywordEmbedder, ScriptedChatModel};
use std::fs;
use tempfile::TempDir;

const VOCABULARY: [&str; 4] = ["refund", "shipping", "warranty", "password"];

struct Harness {
    _temp_dir: TempDir,
    embedder: Arc<KeywordEmbedder>,
    chat: Arc<ScriptedChatModel>,
    store: ConversationStore,
    pipeline: RagPipeline,
}

async fn harness_with(embedder: KeywordEmbedder, chat: ScriptedChatModel) -> Harness {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = ConversationStore::initialize_from_config_dir(temp_dir.path())
        .await
        .expect("should open store");
    let embedder = Arc::new(embedder);
    let chat = Arc::new(chat);
    let pipeline = RagPipeline::new(
        Arc::clone(&embedder) as Arc<dyn Embedder>,
        Arc::clone(&chat) as Arc<dyn ChatModel>,
        store.clone(),
        RetrieverConfig::default(),
    );
    Harness {
        _temp_dir: temp_dir,
        embedder,
        chat,
        store,
        pipeline,
    }
}

async fn harness(reply: &str) -> Harness {
    harness_with(
        KeywordEmbedder::new(&VOCABULARY),
        ScriptedChatModel::replying(reply),
    )
    .await
}

fn chunk(document: &str, position: usize, text: &str) -> Chunk {
    Chunk {
        text: text.to_string(),
        source_document: document.to_string(),
        position,
    }
}

/// Refund material spread over two documents, plus unrelated chunks
fn policy_and_faq_corpus(embedder: &KeywordEmbedder) -> CorpusHandle {
    let chunks = vec![
        chunk("policy.pdf", 0, "Refunds are granted within 30 days of purchase."),
        chunk("policy.pdf", 1, "Warranty claims require a receipt."),
        chunk("faq.pdf", 0, "How do I get a refund? Contact support for a refund."),
        chunk("faq.pdf", 1, "Shipping is free over $50."),
        chunk("it.txt", 0, "Reset your password from the login page."),
    ];
    let items = chunks
        .into_iter()
        .map(|c| (embedder.vector_for(&c.text), c))
        .collect();
    CorpusHandle::new(VectorIndex::build(DistanceMetric::Cosine, items).expect("should build"))
}

#[tokio::test]
async fn answer_cites_each_contributing_document_once() {
    let h = harness("Refunds are available for 30 days.").await;
    let corpus = policy_and_faq_corpus(&h.embedder);
    let pipeline = RagPipeline {
        retrieval: RetrieverConfig {
            k: 2,
            ..RetrieverConfig::default()
        },
        ..h.pipeline
    };

    let response = pipeline
        .ask("What is the refund policy?", &corpus)
        .await
        .expect("ask should succeed");

    assert_eq!(response.answer, "Refunds are available for 30 days.");
    assert_eq!(response.source_document_names, vec!["faq.pdf", "policy.pdf"]);

    let record = pipeline
        .get_record(response.record_id)
        .await
        .expect("record should exist");
    assert_eq!(record.question, "What is the refund policy?");
    assert_eq!(record.answer, response.answer);
    assert_eq!(record.source_document_names, vec!["faq.pdf", "policy.pdf"]);
    assert_eq!(record.name, "Conversation 1");
}

#[tokio::test]
async fn context_holds_only_retrieved_chunks() {
    let h = harness("ok").await;
    let corpus = policy_and_faq_corpus(&h.embedder);

    h.pipeline
        .ask("refund", &corpus)
        .await
        .expect("ask should succeed");

    let calls = h.chat.calls();
    assert_eq!(calls.len(), 1);
    let system = &calls[0][0].content;
    assert!(system.contains("Refunds are granted within 30 days of purchase."));
    assert!(system.contains("Contact support for a refund."));
    assert_eq!(calls[0][1].content, "refund");
}

#[tokio::test]
async fn blank_question_is_rejected_before_any_call() {
    let h = harness("unused").await;
    let corpus = policy_and_faq_corpus(&h.embedder);
    let requests_after_build = h.embedder.request_count();

    for question in ["", "   ", "\n\t"] {
        let result = h.pipeline.ask(question, &corpus).await;
        assert!(
            matches!(result, Err(RagError::InvalidQuestion(_))),
            "{:?} was accepted",
            question
        );
    }

    assert_eq!(h.embedder.request_count(), requests_after_build);
    assert!(h.chat.calls().is_empty());
    assert_eq!(h.store.count().await.expect("should count"), 0);
}

#[tokio::test]
async fn provider_failures_leave_history_untouched() {
    let failing_embedder = harness_with(
        KeywordEmbedder::failing(&VOCABULARY, EmbeddingError::Http(500)),
        ScriptedChatModel::replying("unused"),
    )
    .await;
    let corpus = policy_and_faq_corpus(&KeywordEmbedder::new(&VOCABULARY));

    let result = failing_embedder.pipeline.ask("refund", &corpus).await;
    assert!(matches!(
        result,
        Err(RagError::Embedding(EmbeddingError::Http(500)))
    ));
    assert!(failing_embedder.chat.calls().is_empty());
    assert_eq!(failing_embedder.store.count().await.expect("should count"), 0);

    let failing_chat = harness_with(
        KeywordEmbedder::new(&VOCABULARY),
        ScriptedChatModel::failing(SynthesisError::RateLimited),
    )
    .await;

    let result = failing_chat.pipeline.ask("refund", &corpus).await;
    assert!(matches!(
        result,
        Err(RagError::Synthesis(SynthesisError::RateLimited))
    ));
    assert_eq!(failing_chat.store.count().await.expect("should count"), 0);
}

#[tokio::test]
async fn history_lists_each_question_in_order() {
    let h = harness("answer").await;
    let corpus = policy_and_faq_corpus(&h.embedder);

    let first = h
        .pipeline
        .ask("refund?", &corpus)
        .await
        .expect("ask should succeed");
    let second = h
        .pipeline
        .ask("shipping?", &corpus)
        .await
        .expect("ask should succeed");

    let history = h.pipeline.history().await.expect("history should load");

    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, first.record_id);
    assert_eq!(history[1].id, second.record_id);
    assert_eq!(history[0].name, "Conversation 1");
    assert_eq!(history[1].name, "Conversation 2");
    assert!(first.record_id < second.record_id);

    let first_at = h
        .pipeline
        .get_record(first.record_id)
        .await
        .expect("record should exist")
        .parsed_timestamp()
        .expect("timestamp should parse");
    let second_at = h
        .pipeline
        .get_record(second.record_id)
        .await
        .expect("record should exist")
        .parsed_timestamp()
        .expect("timestamp should parse");
    assert!(first_at <= second_at, "{} after {}", first_at, second_at);
    assert_eq!(history[0].timestamp, first_at.format("%Y-%m-%d %H:%M:%S").to_string());
}

#[tokio::test]
async fn deleted_record_is_gone() {
    let h = harness("answer").await;
    let corpus = policy_and_faq_corpus(&h.embedder);
    let response = h
        .pipeline
        .ask("warranty?", &corpus)
        .await
        .expect("ask should succeed");

    h.pipeline
        .delete_record(response.record_id)
        .await
        .expect("delete should succeed");
    h.pipeline
        .delete_record(response.record_id)
        .await
        .expect("repeat delete should succeed");

    assert!(matches!(
        h.pipeline.get_record(response.record_id).await,
        Err(RagError::NotFound(id)) if id == response.record_id
    ));
    assert!(h.pipeline.history().await.expect("history should load").is_empty());
}

#[tokio::test]
async fn unmatched_question_still_gets_an_answer() {
    let h = harness("I don't know.").await;
    let corpus = policy_and_faq_corpus(&h.embedder);
    let pipeline = RagPipeline {
        retrieval: RetrieverConfig {
            score_threshold: Some(0.5),
            ..RetrieverConfig::default()
        },
        ..h.pipeline
    };

    let response = pipeline
        .ask("What is the capital of France?", &corpus)
        .await
        .expect("ask should succeed");

    assert_eq!(response.answer, "I don't know.");
    assert!(response.source_document_names.is_empty());
    let record = pipeline
        .get_record(response.record_id)
        .await
        .expect("record should exist");
    assert!(record.source_document_names.is_empty());
}

#[test]
fn ingest_builds_corpus_and_reports_skipped_files() {
    let docs = TempDir::new().expect("should create temp dir");
    fs::write(
        docs.path().join("policy.txt"),
        "Refunds are granted within 30 days.\n\nWarranty claims require a receipt.",
    )
    .expect("should write doc");
    fs::write(docs.path().join("faq.md"), "Shipping is free.").expect("should write doc");
    fs::write(docs.path().join("broken.pdf"), "not a pdf").expect("should write doc");

    let embedder = Arc::new(KeywordEmbedder::new(&VOCABULARY));
    let ingestor = Ingestor::new(
        Arc::clone(&embedder) as Arc<dyn Embedder>,
        ChunkingConfig::default(),
        DistanceMetric::Cosine,
    );

    let outcome = ingestor.ingest(docs.path()).expect("ingest should succeed");

    assert_eq!(outcome.documents, 2);
    assert_eq!(outcome.chunks, outcome.corpus.index().len());
    assert!(outcome.chunks >= 2);
    assert_eq!(outcome.warnings.len(), 1);
    assert_eq!(outcome.warnings[0].file, docs.path().join("broken.pdf"));
    assert_eq!(
        outcome.corpus.index().document_names(),
        vec!["faq.md", "policy.txt"]
    );
    assert_eq!(outcome.corpus.index().dimension(), VOCABULARY.len());
}

#[test]
fn ingest_of_empty_directory_gives_empty_corpus() {
    let docs = TempDir::new().expect("should create temp dir");
    let embedder = Arc::new(KeywordEmbedder::new(&VOCABULARY));
    let ingestor = Ingestor::new(
        Arc::clone(&embedder) as Arc<dyn Embedder>,
        ChunkingConfig::default(),
        DistanceMetric::Cosine,
    );

    let outcome = ingestor.ingest(docs.path()).expect("ingest should succeed");

    assert!(outcome.corpus.index().is_empty());
    assert_eq!(embedder.request_count(), 0);
}

#[test]
fn ingest_aborts_on_embedding_failure() {
    let docs = TempDir::new().expect("should create temp dir");
    fs::write(docs.path().join("a.txt"), "Refunds are granted.").expect("should write doc");
    let ingestor = Ingestor::new(
        Arc::new(KeywordEmbedder::failing(&VOCABULARY, EmbeddingError::Auth(401))),
        ChunkingConfig::default(),
        DistanceMetric::Cosine,
    );

    let result = ingestor.ingest(docs.path());

    assert!(matches!(
        result,
        Err(RagError::Embedding(EmbeddingError::Auth(401)))
    ));
}

#[test]
fn corpus_survives_save_and_load() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("index.bin");
    let embedder = KeywordEmbedder::new(&VOCABULARY);
    let corpus = policy_and_faq_corpus(&embedder);

    corpus.save(&path).expect("should save corpus");
    let loaded = CorpusHandle::load(&path, VOCABULARY.len()).expect("should load corpus");

    assert_eq!(loaded.index().as_ref(), corpus.index().as_ref());
    assert!(matches!(
        CorpusHandle::load(&path, 1536),
        Err(RagError::IndexLoad(_))
    ));
    assert!(matches!(
        CorpusHandle::load(&temp_dir.path().join("missing.bin"), 4),
        Err(RagError::IndexLoad(_))
    ));
}
