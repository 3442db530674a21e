#![allow(dead_code)]

use proptest::prelude::*;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};
use serde_json::{Map, Value};

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

/// Any string, including ones that look like URIs.
pub fn arb_uri_like() -> BoxedStrategy<String> {
    prop_oneof![
        any::<String>(),
        "[a-z0-9]{1,8}://[a-zA-Z0-9._/-]{0,24}",
        "hf://[a-z]{1,6}/[a-z]{1,6}(/[a-z0-9_.]{0,10}){0,3}",
        "s3://[a-z]{1,6}/[a-z0-9_./]{0,20}",
        "[a-zA-Z0-9_./\\\\-]{0,30}",
    ]
    .boxed()
}

/// JSON leaves that survive a text round trip unchanged.
fn arb_leaf() -> BoxedStrategy<Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z0-9 _NaN\"\\\\]{0,12}".prop_map(Value::String),
    ]
    .boxed()
}

/// A flat JSON object with up to `max_keys` keys.
pub fn arb_record(max_keys: usize) -> BoxedStrategy<Value> {
    prop::collection::btree_map("[a-z]{1,6}", arb_leaf(), 0..=max_keys)
        .prop_map(|map| Value::Object(map.into_iter().collect::<Map<String, Value>>()))
        .boxed()
}

pub fn arb_records(max_records: usize, max_keys: usize) -> BoxedStrategy<Vec<Value>> {
    prop::collection::vec(arb_record(max_keys), 0..=max_records).boxed()
}
