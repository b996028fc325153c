use super::estimate_token_count as estimate_token_count_impl;
use super::*;
use std::path::PathBuf;

fn document(name: &str, text: &str) -> LoadedDocument {
    LoadedDocument {
        name: name.to_string(),
        path: PathBuf::from(name),
        text: text.to_string(),
    }
}

fn long_document() -> LoadedDocument {
    let paragraphs: Vec<String> = (0..40)
        .map(|i| {
            format!(
                "Paragraph {} explains the refund policy in detail. Customers may return goods within thirty days. \
                 Shipping costs are not refundable unless the item arrived damaged.",
                i
            )
        })
        .collect();
    document("policy.pdf", &paragraphs.join("\n\n"))
}

#[test]
fn estimate_token_count() {
    assert_eq!(estimate_token_count_impl("hello world"), 2);
    assert_eq!(estimate_token_count_impl("This is a test."), 5);
    assert_eq!(estimate_token_count_impl(""), 0);
    assert_eq!(estimate_token_count_impl(&"a".repeat(400)), 100);
}

#[test]
fn small_document_is_single_chunk() {
    let doc = document("faq.pdf", "Refunds are processed within 14 days.");
    let chunks = chunk_document(&doc, &ChunkingConfig::default());

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].text, "Refunds are processed within 14 days.");
    assert_eq!(chunks[0].source_document, "faq.pdf");
    assert_eq!(chunks[0].position, 0);
}

#[test]
fn empty_document_has_no_chunks() {
    let doc = document("empty.txt", "   \n\n  ");
    assert!(chunk_document(&doc, &ChunkingConfig::default()).is_empty());
}

#[test]
fn large_document_is_split_with_sequential_positions() {
    let config = ChunkingConfig {
        target_chunk_size: 120,
        max_chunk_size: 240,
        min_chunk_size: 20,
        overlap_size: 0,
        sentence_boundary_splitting: true,
    };
    let chunks = chunk_document(&long_document(), &config);

    assert!(chunks.len() > 1);
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.position, i);
        assert_eq!(chunk.source_document, "policy.pdf");
        assert!(estimate_token_count_impl(&chunk.text) <= config.max_chunk_size);
    }
}

#[test]
fn chunking_is_deterministic() {
    let config = ChunkingConfig {
        target_chunk_size: 120,
        max_chunk_size: 240,
        min_chunk_size: 20,
        overlap_size: 20,
        sentence_boundary_splitting: true,
    };
    let first = chunk_document(&long_document(), &config);
    let second = chunk_document(&long_document(), &config);
    assert_eq!(first, second);
}

#[test]
fn overlap_repeats_tail_of_previous_chunk() {
    let config = ChunkingConfig {
        target_chunk_size: 120,
        max_chunk_size: 240,
        min_chunk_size: 20,
        overlap_size: 20,
        sentence_boundary_splitting: true,
    };
    let chunks = chunk_document(&long_document(), &config);
    assert!(chunks.len() > 1);

    let without_overlap = chunk_document(
        &long_document(),
        &ChunkingConfig {
            overlap_size: 0,
            ..config
        },
    );
    assert_eq!(chunks.len(), without_overlap.len());

    let tail = extract_overlap_text(&without_overlap[0].text, 20);
    assert!(!tail.is_empty());
    assert!(chunks[1].text.starts_with(&tail));
    assert_eq!(chunks[0].text, without_overlap[0].text);
}

#[test]
fn oversized_sentence_falls_back_to_words() {
    let run_on = "word ".repeat(2000);
    let doc = document("runon.txt", &run_on);
    let config = ChunkingConfig {
        target_chunk_size: 100,
        max_chunk_size: 200,
        min_chunk_size: 10,
        overlap_size: 0,
        sentence_boundary_splitting: true,
    };
    let chunks = chunk_document(&doc, &config);

    assert!(chunks.len() > 10);
    assert!(
        chunks
            .iter()
            .all(|c| estimate_token_count_impl(&c.text) <= config.max_chunk_size)
    );
}

#[test]
fn form_feeds_and_carriage_returns_are_normalized() {
    assert_eq!(normalize_text("a\r\nb\u{c}c\rd"), "a\nb\n\nc\nd");
}

#[test]
fn small_trailing_pieces_are_merged() {
    let pieces = vec![
        "alpha beta gamma delta epsilon zeta eta theta".to_string(),
        "tiny".to_string(),
    ];
    let config = ChunkingConfig {
        min_chunk_size: 5,
        ..ChunkingConfig::default()
    };
    let merged = merge_small_pieces(pieces, &config);
    assert_eq!(merged.len(), 1);
    assert!(merged[0].ends_with("tiny"));
}

#[test]
fn unspaced_text_is_bounded() {
    let doc = document("policy_zh.pdf", &"退款须在购买后三十天内申请。".repeat(3000));
    let config = ChunkingConfig::default();
    let chunks = chunk_document(&doc, &config);

    assert!(chunks.len() > 1);
    for chunk in &chunks {
        assert!(estimate_token_count_impl(&chunk.text) <= config.max_chunk_size);
        assert!(chunk.text.chars().count() <= config.max_chunk_size * CHARS_PER_TOKEN);
    }
    assert!(chunks.last().is_some_and(|c| c.text.ends_with("申请。")));
}

#[test]
fn long_token_without_breaks_is_cut_on_char_boundaries() {
    let blob = "QUJDREVGR0hJSktMTU5PUFFSU1RVVldYWVo".repeat(600);
    let doc = document("dump.txt", &format!("Attachment follows {} end of file", blob));
    let config = ChunkingConfig {
        target_chunk_size: 100,
        max_chunk_size: 200,
        min_chunk_size: 10,
        overlap_size: 0,
        sentence_boundary_splitting: true,
    };
    let chunks = chunk_document(&doc, &config);

    assert!(chunks.len() > 10);
    assert!(
        chunks
            .iter()
            .all(|c| estimate_token_count_impl(&c.text) <= config.max_chunk_size)
    );
    assert!(chunks[0].text.starts_with("Attachment follows"));
    assert!(chunks.last().is_some_and(|c| c.text.ends_with("end of file")));
}
