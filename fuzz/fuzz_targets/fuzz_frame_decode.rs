#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // decode() must never panic regardless of input; malformed frames are
    // rejected with a `FrameError`, never a panic.
    let _ = infrasim_rendezvous::rendezvous::codec::decode(data);
});
