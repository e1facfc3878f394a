#![no_main]
use crdt_sync_fuzz::test_utils::{fuzzing, FuzzInput};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: FuzzInput| { fuzzing(input) });
