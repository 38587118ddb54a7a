#![no_main]

use libfuzzer_sys::fuzz_target;
use rest_authz::{RouteMatcher, convert_path_template};

fuzz_target!(|data: &[u8]| {
    // Limit input size to avoid OOM on pathological inputs
    if data.len() > 1024 {
        return;
    }
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };

    // First line is the template, the rest is the request path
    let (template, path) = s.split_once('\n').unwrap_or((s, s));
    if let Ok(route) = convert_path_template(template)
        && let Ok(matcher) = RouteMatcher::compile(&route)
    {
        let _ = matcher.matches(path);
        let _ = matcher.overlaps(&matcher);
    }
    if let Ok(matcher) = RouteMatcher::from_template(template) {
        let _ = matcher.matches(path);
    }
});
