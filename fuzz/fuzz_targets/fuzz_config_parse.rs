#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // parse() must never panic on arbitrary text; malformed configs are
    // rejected with a `ConfigError`.
    let _ = infrasim_rendezvous::core::config::Config::parse(data);
});
