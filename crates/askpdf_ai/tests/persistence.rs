use std::fs;

use askpdf_ai::embeddings::Embedder;
use askpdf_ai::index::{IndexBuildInput, IndexStore, VectorIndex};
use askpdf_core::chunking::ChunkingPolicy;
use askpdf_core::error::AppError;
use pretty_assertions::assert_eq;
use tempfile::tempdir;

struct LetterEmbedder {
    model: &'static str,
    dims: Option<usize>,
}

impl LetterEmbedder {
    fn v1() -> Self {
        Self {
            model: "letters-v1",
            dims: None,
        }
    }
}

impl Embedder for LetterEmbedder {
    fn model(&self) -> &str {
        self.model
    }

    fn dims(&self) -> Option<usize> {
        self.dims
    }

    fn embed(&self, input: &str) -> Result<Vec<f32>, AppError> {
        let mut v = vec![0.0f32; 3];
        for ch in input.chars().map(|c| c.to_ascii_lowercase()) {
            match ch {
                'a' => v[0] += 1.0,
                'b' => v[1] += 1.0,
                'c' => v[2] += 1.0,
                _ => {}
            }
        }
        Ok(v)
    }
}

fn sample_index() -> VectorIndex {
    let text = format!("{}{}{}", "a".repeat(280), "b".repeat(260), "c".repeat(300));
    let chunks = ChunkingPolicy::default().split(&text);
    VectorIndex::build(
        &chunks,
        &LetterEmbedder::v1(),
        IndexBuildInput {
            chunk_size: 300,
            chunk_overlap: 50,
            built_at: "2026-02-10T00:00:00Z".to_string(),
            source_label: Some("letters.pdf".to_string()),
        },
    )
    .expect("build")
}

#[test]
fn save_then_load_returns_identical_search_results() {
    let dir = tempdir().unwrap();
    let store = IndexStore::open(dir.path().join("kb_index"));
    let index = sample_index();

    store.save(&index).expect("save");
    assert!(store.exists());
    let loaded = store.load(&LetterEmbedder::v1()).expect("load");

    assert_eq!(loaded, index);
    let query = LetterEmbedder::v1().embed("bbbbbc").expect("embed");
    assert_eq!(
        loaded.search(&query, 2).expect("search loaded"),
        index.search(&query, 2).expect("search original")
    );
}

#[test]
fn missing_index_is_a_persistence_error() {
    let dir = tempdir().unwrap();
    let store = IndexStore::open(dir.path().join("kb_index"));
    assert!(!store.exists());
    let err = store.load(&LetterEmbedder::v1()).expect_err("missing");
    assert_eq!(err.code, "INDEX_PERSIST_FAILED");
}

#[test]
fn corrupt_index_is_a_persistence_error() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("kb_index");
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join("index.json"), b"{ not json").unwrap();

    let store = IndexStore::open(root);
    let err = store.load(&LetterEmbedder::v1()).expect_err("corrupt");
    assert_eq!(err.code, "INDEX_PERSIST_FAILED");
}

#[test]
fn inconsistent_index_file_is_rejected() {
    let dir = tempdir().unwrap();
    let store = IndexStore::open(dir.path().join("kb_index"));
    store.save(&sample_index()).expect("save");

    let path = dir.path().join("kb_index").join("index.json");
    let mut doc: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    doc["manifest"]["chunk_count"] = serde_json::json!(99);
    fs::write(&path, serde_json::to_vec(&doc).unwrap()).unwrap();

    let err = store.load(&LetterEmbedder::v1()).expect_err("inconsistent");
    assert_eq!(err.code, "INDEX_PERSIST_FAILED");
}

#[test]
fn index_from_another_embedding_model_is_rejected() {
    let dir = tempdir().unwrap();
    let store = IndexStore::open(dir.path().join("kb_index"));
    store.save(&sample_index()).expect("save");

    let other = LetterEmbedder {
        model: "letters-v2",
        dims: None,
    };
    let err = store.load(&other).expect_err("model mismatch");
    assert_eq!(err.code, "INDEX_PERSIST_FAILED");
    assert!(err.details.unwrap_or_default().contains("letters-v2"));

    let wrong_dims = LetterEmbedder {
        model: "letters-v1",
        dims: Some(1536),
    };
    let err = store.load(&wrong_dims).expect_err("dims mismatch");
    assert_eq!(err.code, "INDEX_PERSIST_FAILED");
}

#[test]
fn save_replaces_previous_index_and_leaves_no_temp_file() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("kb_index");
    let store = IndexStore::open(root.clone());

    store.save(&sample_index()).expect("save first");
    let smaller = VectorIndex::build(
        &ChunkingPolicy::default().split("abc"),
        &LetterEmbedder::v1(),
        IndexBuildInput {
            chunk_size: 300,
            chunk_overlap: 50,
            built_at: "2026-02-11T00:00:00Z".to_string(),
            source_label: Some("tiny.pdf".to_string()),
        },
    )
    .expect("build");
    store.save(&smaller).expect("save second");

    let manifest = store.read_manifest().expect("manifest");
    assert_eq!(manifest.chunk_count, 1);
    assert_eq!(manifest.source_label.as_deref(), Some("tiny.pdf"));

    let names: Vec<String> = fs::read_dir(&root)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, vec!["index.json".to_string()]);
}

#[test]
fn edited_chunk_text_is_rejected_on_load() {
    let dir = tempdir().unwrap();
    let store = IndexStore::open(dir.path().join("kb_index"));
    store.save(&sample_index()).expect("save");

    let path = dir.path().join("kb_index").join("index.json");
    let mut doc: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    doc["documents"][1]["text"] = serde_json::json!("rewritten by hand");
    fs::write(&path, serde_json::to_vec(&doc).unwrap()).unwrap();

    let err = store.load(&LetterEmbedder::v1()).expect_err("tampered text");
    assert_eq!(err.code, "INDEX_PERSIST_FAILED");
    assert_eq!(err.details.as_deref(), Some("ordinal=1"));
}
