#![no_main]

use libfuzzer_sys::fuzz_target;
use lockmon::config::MonitorConfig;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Parsing and validation must reject bad input without panicking
        if let Ok(config) = MonitorConfig::from_toml_str(input) {
            let _ = config.validate();
        }
    }
});
