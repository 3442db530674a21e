//! Fuzz target for CSV parsing with type inference.

#![no_main]

use anyload::formats::io_csv::{from_csv_str, CsvReadOptions};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let _ = from_csv_str(text, &CsvReadOptions::default());
});
