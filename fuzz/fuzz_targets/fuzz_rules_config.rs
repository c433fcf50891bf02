#![no_main]

use libfuzzer_sys::fuzz_target;
use roundkeeper::config::RulesConfig;
use roundkeeper::phase::MatchBuilder;
use roundkeeper::rules;

fuzz_target!(|data: &[u8]| {
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };
    let Ok(config) = serde_json::from_value::<RulesConfig>(value) else {
        return;
    };
    // Unmet requirements are errors, never panics.
    let _ = MatchBuilder::new("fuzz")
        .modules(rules::from_config(&config))
        .build();
});
