#![no_main]
use libfuzzer_sys::fuzz_target;

extern crate code_call_lens;

use code_call_lens::{scan, LensSettings, GRAMMAR_TABLE};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let settings = LensSettings::default();
        for grammar in GRAMMAR_TABLE.iter() {
            if let Ok(sites) = scan(grammar, s, &settings) {
                for site in sites {
                    assert!(usize::from(site.range.end()) <= s.len());
                    assert!(site.range.start() <= site.range.end());
                }
            }
        }
    }
});
