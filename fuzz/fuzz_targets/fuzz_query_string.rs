#![no_main]

use libfuzzer_sys::fuzz_target;
use rest_authz::{flatten_query_string, parse_query_string};

fuzz_target!(|data: &[u8]| {
    if data.len() > 1024 {
        return;
    }
    if let Ok(s) = std::str::from_utf8(data) {
        let params = parse_query_string(s);
        let _ = flatten_query_string(&params);
    }
});
