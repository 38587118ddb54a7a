#![no_main]

use figment::Figment;
use figment::providers::{Format, Yaml};
use libfuzzer_sys::fuzz_target;
use rest_authz::AuthzConfig;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Extraction and validation may fail, but never panic
        if let Ok(config) = Figment::new().merge(Yaml::string(s)).extract::<AuthzConfig>() {
            let _ = config.validate();
        }
    }
});
