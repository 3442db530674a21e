//! Fuzz target for URI classification, hub URI parsing and loader routing.
//!
//! None of these may panic on arbitrary input.

#![no_main]

use anyload::formats::route_for_path;
use anyload::hub::HubUri;
use anyload::uri::{classify, final_segment};
use anyload::HubPathRule;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(uri) = std::str::from_utf8(data) else {
        return;
    };

    let _ = classify(uri);
    let _ = final_segment(uri);
    let _ = HubUri::parse(uri);
    for rule in [
        HubPathRule::Heuristic,
        HubPathRule::AlwaysFile,
        HubPathRule::AlwaysDataset,
    ] {
        let _ = route_for_path(uri, rule);
    }
});
