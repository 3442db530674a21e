//! Fuzz target for JSON Lines parsing, including the `NaN` rewrite.

#![no_main]

use anyload::formats::io_jsonl::{from_jsonl_slice, fuzz_parse_strict, JsonlReadOptions};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let _ = from_jsonl_slice(data, &JsonlReadOptions::default());
    let _ = fuzz_parse_strict(data);
});
