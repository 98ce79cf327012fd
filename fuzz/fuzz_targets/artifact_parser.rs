#![no_main]

use libfuzzer_sys::fuzz_target;
use pairbench::config::default_counters;
use pairbench::extract::{extract, parse_wall_clock};

fuzz_target!(|data: &[u8]| {
    // Artifacts are read lossily, so any byte sequence is a valid input
    let text = String::from_utf8_lossy(data);
    let _ = parse_wall_clock(&text);
    let _ = extract(&text, &default_counters());
});
