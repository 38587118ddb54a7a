#![no_main]

use libfuzzer_sys::fuzz_target;
use rest_authz::{ActionSchema, HttpVerb};

fuzz_target!(|data: &[u8]| {
    if data.len() > 4096 {
        return;
    }
    if let Ok(s) = std::str::from_utf8(data)
        && let Ok(schema) = ActionSchema::compile(s)
    {
        // Don't panic on resolution of any compiled schema
        for verb in HttpVerb::ALL {
            let _ = schema.table().resolve(verb, "/a/b/c?x=1");
        }
        let _ = schema.table().overlaps();
    }
});
