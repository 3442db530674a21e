use anyload::hub::{AUTODOC_BEGIN, AUTODOC_END};
use anyload::payload::Table;
use anyload::{AnyloadError, HubPathRule, LoaderConfig, Payload};
use serde_json::{json, Value};

mod common;

use common::Harness;

fn people() -> Table {
    Table::from_records(vec![
        json!({"name": "ada", "age": 36}),
        json!({"name": "alan", "age": 41}),
        json!({"name": "ada", "age": 36}),
    ])
}

#[test]
fn dataset_save_pushes_parquet_and_summary() {
    let h = Harness::new();
    h.hub.put(
        "org/people",
        "README.md",
        "---\nlicense: mit\n---\n# People\nHand-written intro.\n",
    );

    h.anyload
        .save(Payload::Table(people()), "hf://org/people")
        .expect("save dataset");

    assert_eq!(h.hub.created_repos(), vec![("org/people".to_string(), true)]);
    assert!(h
        .hub
        .get("org/people", "data/train-00000-of-00001.parquet")
        .is_some());

    let readme = String::from_utf8(h.hub.get("org/people", "README.md").expect("readme"))
        .expect("utf8");
    assert!(readme.starts_with("---\nlicense: mit\n---\n# People\nHand-written intro.\n"));
    assert!(readme.contains(AUTODOC_BEGIN));
    assert!(readme.contains(AUTODOC_END));
    assert!(readme.contains("# Dataset Summary: org/people"));
}

#[test]
fn dataset_save_then_load_returns_the_table() {
    let h = Harness::new();
    h.anyload
        .save(Payload::Table(people()), "hf://org/people")
        .expect("save dataset");

    let loaded = h.anyload.load("hf://org/people").expect("load dataset");
    assert_eq!(loaded.as_table(), Some(&people()));
}

#[test]
fn dataset_with_several_splits() {
    let h = Harness::new();
    let mut splits = std::collections::BTreeMap::new();
    splits.insert("train".to_string(), people());
    splits.insert(
        "test".to_string(),
        Table::from_records(vec![json!({"name": "grace", "age": 45})]),
    );
    h.anyload
        .save(Payload::Splits(splits), "hf://org/people")
        .expect("save splits");

    let all = h.anyload.load("hf://org/people").expect("load all");
    let Payload::Splits(loaded) = all else {
        panic!("expected splits");
    };
    assert_eq!(loaded.keys().collect::<Vec<_>>(), vec!["test", "train"]);

    let config = LoaderConfig::new().with("split", "test");
    let test = h
        .anyload
        .load_with("hf://org/people", &config)
        .expect("load split");
    assert_eq!(test.as_table().map(Table::num_rows), Some(1));

    let missing = LoaderConfig::new().with("split", "validation");
    let err = h
        .anyload
        .load_with("hf://org/people", &missing)
        .expect_err("unknown split");
    assert!(matches!(err, AnyloadError::HubApi { .. }));
}

#[test]
fn dataset_streaming_and_records() {
    let h = Harness::new();
    h.hub.put(
        "org/lines",
        "train/part-0.jsonl",
        "{\"i\": 0}\n{\"i\": 1}\n",
    );
    h.hub.put("org/lines", "train/part-1.jsonl", "{\"i\": 2}\n");

    let streaming = LoaderConfig::new().with("streaming", true);
    let Payload::Stream(stream) = h
        .anyload
        .load_with("hf://org/lines", &streaming)
        .expect("stream")
    else {
        panic!("expected a stream");
    };
    let records: Vec<Value> = stream.collect::<Result<_, _>>().expect("records");
    assert_eq!(records, vec![json!({"i": 0}), json!({"i": 1}), json!({"i": 2})]);

    let as_records = LoaderConfig::new().with("to_table", false);
    let loaded = h
        .anyload
        .load_with("hf://org/lines", &as_records)
        .expect("records");
    assert_eq!(loaded.as_records().map(<[_]>::len), Some(3));
}

#[test]
fn single_hub_file_round_trip_and_listing() {
    let h = Harness::new();
    h.anyload
        .save(
            Payload::Lines(vec!["a".into(), "b".into()]),
            "hf://org/repo/notes/a.txt",
        )
        .expect("save file");
    assert_eq!(h.hub.get("org/repo", "notes/a.txt"), Some(b"a\nb\n".to_vec()));

    let loaded = h.anyload.load("hf://org/repo/notes/a.txt").expect("load file");
    assert_eq!(
        loaded.as_lines(),
        Some(&["a".to_string(), "b".to_string()][..])
    );

    h.hub.put("org/repo", "notes/b.md", "x");
    h.hub.put("org/repo", "notesheet.txt", "x");
    let relative = h
        .anyload
        .list("hf://org/repo/notes", &["txt"], true)
        .expect("list");
    assert_eq!(relative, vec!["a.txt".to_string()]);

    let absolute = h
        .anyload
        .list("hf://org/repo/notes/", &[] as &[&str], false)
        .expect("list");
    assert_eq!(
        absolute,
        vec![
            "hf://org/repo/notes/a.txt".to_string(),
            "hf://org/repo/notes/b.md".to_string(),
        ]
    );

    assert!(h.anyload.exists("hf://org/repo/notes/a.txt").expect("exists"));
    assert!(!h.anyload.exists("hf://org/repo/notes/zzz.txt").expect("exists"));
}

#[test]
fn path_rule_override_treats_extensionless_file_as_file() {
    let h = Harness::with_settings(|s| s.with_hub_path_rule(HubPathRule::AlwaysFile));
    h.hub.put("org/repo", "data.json", "{\"k\": 1}");

    let loaded = h.anyload.load("hf://org/repo/data.json").expect("load");
    assert_eq!(loaded.as_json(), Some(&json!({"k": 1})));

    // An extension-less file has no loader, but is not mistaken for a dataset.
    h.hub.put("org/repo", "LICENSE", "MIT");
    let err = h.anyload.load("hf://org/repo/LICENSE").expect_err("no loader");
    assert!(matches!(err, AnyloadError::NoLoader { .. }));
}

#[test]
fn traversal_in_subpath_is_rejected() {
    let h = Harness::new();
    let err = h
        .anyload
        .load("hf://org/repo/../secret.json")
        .expect_err("invalid");
    assert!(matches!(err, AnyloadError::InvalidUri { .. }));
}
