#![no_main]

use std::path::Path;

use libfuzzer_sys::fuzz_target;
use roundkeeper::config::ConfigLoader;

fuzz_target!(|data: &[u8]| {
    if let Ok(yaml) = std::str::from_utf8(data) {
        // Any input may be rejected; none may panic.
        let _ = ConfigLoader::with_defaults().load_str(yaml, Path::new("fuzz.yaml"));
    }
});
