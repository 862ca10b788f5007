//! Tests for configuration, collaborator loaders and command wiring.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use larder::cli::{build_evaluator, cmd_init_kb, cmd_learn};
use larder::config::LarderConfig;
use larder::loader::{
    load_catalog, load_dataset, load_knowledge, load_model, load_prior, parse_dataset_csv,
    save_model,
};
use larder_core::{
    BayesNetwork, Difficulty, InferenceMode, LarderError, RecipeId, TimeBucket, TrainingRecord,
};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const CATALOG_JSON: &str = r#"[
  {"id": 1, "name": "Omelette", "required_ingredients": ["egg", "butter"],
   "prep_time": 10, "difficulty": "easy", "tags": ["breakfast", "vegetarian"]},
  {"id": 2, "name": "Pancakes", "required_ingredients": ["egg", "flour", "milk"],
   "prep_time": 25, "difficulty": "medium", "tags": ["breakfast"]},
  {"id": 3, "name": "Risotto", "required_ingredients": ["rice", "cheese"],
   "prep_time": 45, "difficulty": "hard"}
]"#;

const KB_JSON: &str = r#"[
  {"id": 1, "name": "Omelette", "prep_time": 10, "category": "Breakfast", "alternatives": [3]},
  {"id": 2, "name": "Pancakes", "prep_time": 25, "category": "breakfast"},
  {"id": 3, "name": "Risotto", "description": "Slow stirred rice", "prep_time": 45,
   "category": "dinner"}
]"#;

fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).expect("write fixture");
    path
}

// =============================================================================
// DATASET PARSING
// =============================================================================

#[test]
fn test_csv_dataset_parsed() {
    let rows = parse_dataset_csv(
        "time,difficulty,success\n15,easy,1\n45,medium,false\n\n# comment\n90,2,yes\n",
    )
    .expect("parse");

    assert_eq!(
        rows,
        vec![
            TrainingRecord::new(15, Difficulty::Easy, true),
            TrainingRecord::new(45, Difficulty::Medium, false),
            TrainingRecord::new(90, Difficulty::Hard, true),
        ]
    );
}

#[test]
fn test_csv_columns_found_by_name() {
    let rows = parse_dataset_csv("success,time,difficulty\n0,12,hard\n").expect("parse");
    assert_eq!(rows, vec![TrainingRecord::new(12, Difficulty::Hard, false)]);
}

#[test]
fn test_csv_missing_column_rejected() {
    let result = parse_dataset_csv("time,success\n10,1\n");
    assert!(matches!(result, Err(LarderError::InvalidDataset(_))));
}

#[test]
fn test_csv_bad_row_reports_line() {
    let Err(LarderError::InvalidDataset(message)) =
        parse_dataset_csv("time,difficulty,success\n10,easy,1\n10,tricky,1\n")
    else {
        panic!("expected an invalid dataset error");
    };
    assert!(message.contains("line 3"), "{}", message);
}

#[test]
fn test_csv_empty_input_is_empty_dataset() {
    assert!(parse_dataset_csv("").expect("parse").is_empty());
}

#[test]
fn test_json_dataset_loaded() {
    let dir = TempDir::new().expect("tempdir");
    let path = write(
        &dir,
        "history.json",
        r#"[{"time": 20, "difficulty": "easy", "success": true}]"#,
    );

    let rows = load_dataset(&path).expect("load");
    assert_eq!(rows, vec![TrainingRecord::new(20, Difficulty::Easy, true)]);
}

// =============================================================================
// CATALOG & KNOWLEDGE BASE
// =============================================================================

#[test]
fn test_catalog_loaded() {
    let dir = TempDir::new().expect("tempdir");
    let path = write(&dir, "recipes.json", CATALOG_JSON);

    let catalog = load_catalog(&path).expect("load");
    assert_eq!(catalog.len(), 3);
    assert_eq!(
        catalog.get(RecipeId(3)).map(|r| r.difficulty),
        Some(Difficulty::Hard)
    );
}

#[test]
fn test_missing_catalog_is_io_error() {
    let result = load_catalog(Path::new("/nonexistent/recipes.json"));
    assert!(matches!(result, Err(LarderError::IoError(_))));
}

#[test]
fn test_knowledge_derived_from_catalog_by_default() {
    let dir = TempDir::new().expect("tempdir");
    let catalog = load_catalog(&write(&dir, "recipes.json", CATALOG_JSON)).expect("catalog");

    let kb = load_knowledge(None, &catalog).expect("knowledge");
    assert_eq!(kb.record_count().expect("count"), 3);
    let omelette = kb.lookup(RecipeId(1)).expect("lookup").expect("present");
    assert_eq!(omelette.category, "breakfast");
}

#[test]
fn test_json_knowledge_base_normalises_categories() {
    let dir = TempDir::new().expect("tempdir");
    let catalog = load_catalog(&write(&dir, "recipes.json", CATALOG_JSON)).expect("catalog");
    let kb_path = write(&dir, "kb.json", KB_JSON);

    let kb = load_knowledge(Some(&kb_path), &catalog).expect("knowledge");
    let breakfast = kb.by_category("breakfast").expect("category");
    let ids: Vec<u64> = breakfast.iter().map(|d| d.id.0).collect();
    assert_eq!(ids, vec![1, 2]);
}

#[test]
fn test_init_kb_then_open_redb() {
    let dir = TempDir::new().expect("tempdir");
    let catalog = load_catalog(&write(&dir, "recipes.json", CATALOG_JSON)).expect("catalog");
    let input = write(&dir, "kb.json", KB_JSON);
    let output = dir.path().join("kb.redb");

    cmd_init_kb(true, &input, &output, false).expect("init");
    assert!(cmd_init_kb(true, &input, &output, false).is_err());
    cmd_init_kb(true, &input, &output, true).expect("forced init");

    let kb = load_knowledge(Some(&output), &catalog).expect("open redb");
    assert_eq!(kb.record_count().expect("count"), 3);
    let risotto = kb.lookup(RecipeId(3)).expect("lookup").expect("present");
    assert_eq!(risotto.description, "Slow stirred rice");
}

#[test]
fn test_forced_init_kb_with_bad_input_keeps_database() {
    let dir = TempDir::new().expect("tempdir");
    let catalog = load_catalog(&write(&dir, "recipes.json", CATALOG_JSON)).expect("catalog");
    let output = dir.path().join("kb.redb");
    cmd_init_kb(true, &write(&dir, "kb.json", KB_JSON), &output, false).expect("init");

    let malformed = write(&dir, "bad.json", "[{\"id\": 1, \"name\": ");
    assert!(cmd_init_kb(true, &malformed, &output, true).is_err());

    let duplicated = write(
        &dir,
        "dup.json",
        r#"[{"id": 1, "name": "Soup", "prep_time": 10, "category": "soup"},
            {"id": 1, "name": "Soup", "prep_time": 10, "category": "salad"}]"#,
    );
    assert!(matches!(
        cmd_init_kb(true, &duplicated, &output, true),
        Err(LarderError::InvalidCatalog(_))
    ));

    let kb = load_knowledge(Some(&output), &catalog).expect("open redb");
    assert_eq!(kb.record_count().expect("count"), 3);
    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .expect("read dir")
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(".staging"))
        .collect();
    assert!(leftovers.is_empty());
}

// =============================================================================
// NETWORKS
// =============================================================================

#[test]
fn test_default_prior_is_expert() {
    let prior = load_prior(None).expect("prior");
    assert_eq!(prior, BayesNetwork::expert().expect("expert"));
}

#[test]
fn test_prior_json_validated() {
    let dir = TempDir::new().expect("tempdir");
    let good = BayesNetwork::from_success_table([[0.8; 3]; 3]).expect("network");
    let path = write(
        &dir,
        "prior.json",
        &serde_json::to_string(&good).expect("serialize"),
    );
    assert_eq!(load_prior(Some(&path)).expect("load"), good);

    let bad = write(&dir, "bad.json", r#"{"not": "a network"}"#);
    assert!(matches!(
        load_prior(Some(&bad)),
        Err(LarderError::InvalidModel(_))
    ));
}

#[test]
fn test_model_file_roundtrip() {
    let dir = TempDir::new().expect("tempdir");
    let network = BayesNetwork::expert().expect("expert");

    let path = save_model(&network, &dir.path().join("model.lrdr")).expect("save");
    assert_eq!(load_model(&path).expect("load"), network);
}

#[test]
fn test_corrupt_model_rejected() {
    let dir = TempDir::new().expect("tempdir");
    let path = write(&dir, "model.lrdr", "definitely not a model");
    assert!(load_model(&path).is_err());
}

// =============================================================================
// CONFIGURATION & EVALUATOR WIRING
// =============================================================================

#[test]
fn test_config_file_loaded() {
    let dir = TempDir::new().expect("tempdir");
    let path = write(
        &dir,
        "larder.toml",
        "[inference]\nmode = \"posterior\"\npseudo_count = 2.0\n\n[resolver]\ntime_tolerance = 0.25\n",
    );

    let config = LarderConfig::load(Some(&path)).expect("config");
    assert_eq!(config.inference.mode, InferenceMode::Posterior);
    assert!((config.inference.pseudo_count - 2.0).abs() < 1e-12);
    assert!((config.resolver.time_tolerance - 0.25).abs() < 1e-12);
}

#[test]
fn test_explicit_missing_config_is_error() {
    assert!(LarderConfig::load(Some(Path::new("/nonexistent/larder.toml"))).is_err());
}

#[test]
fn test_posterior_without_dataset_is_error() {
    let mut config = LarderConfig::default();
    config.inference.mode = InferenceMode::Posterior;

    assert!(matches!(
        build_evaluator(&config),
        Err(LarderError::InvalidDataset(_))
    ));
}

#[test]
fn test_learned_model_resumed_by_posterior_mode() {
    let dir = TempDir::new().expect("tempdir");
    let dataset = write(
        &dir,
        "history.csv",
        "time,difficulty,success\n10,easy,1\n12,easy,1\n15,easy,0\n90,hard,0\n",
    );
    let model = dir.path().join("model.lrdr");

    let mut config = LarderConfig::default();
    config.inference.mode = InferenceMode::Posterior;
    config.data.dataset = Some(dataset);
    cmd_learn(&config, true, &model).expect("learn");

    let fitted = build_evaluator(&config).expect("fit from dataset");
    config.data.model = Some(model);
    let resumed = build_evaluator(&config).expect("resume from model");

    assert_eq!(resumed.mode(), InferenceMode::Posterior);
    for time in TimeBucket::ALL {
        for difficulty in Difficulty::ALL {
            let a = fitted.snapshot().network().success_probability(time, difficulty);
            let b = resumed.snapshot().network().success_probability(time, difficulty);
            assert!((a - b).abs() < 1e-12);
        }
    }
    // Short/easy: 2 of 3 rows succeeded, Laplace-smoothed toward 0.5.
    let p = resumed
        .snapshot()
        .network()
        .success_probability(TimeBucket::Short, Difficulty::Easy);
    assert!((p - 3.0 / 5.0).abs() < 1e-9);
}
