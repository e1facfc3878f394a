#![no_main]
use crdt_sync_fuzz::{text::SharedText, Operation, OperationPlanner};
use libfuzzer_sys::fuzz_target;
use rand::{rngs::StdRng, SeedableRng};

fuzz_target!(|input: (u64, u8)| {
    let (seed, rounds) = input;
    let planner = OperationPlanner::default();
    let mut rng = StdRng::seed_from_u64(seed);
    let text = SharedText::new("hello");
    for _ in 0..rounds {
        let before = text.len_utf16();
        let Some(op) = planner.plan(&mut rng, &text.to_string()) else {
            continue;
        };
        match &op {
            Operation::Insert { offset, text: s } => text.insert(*offset, s).unwrap(),
            Operation::Delete { offset, len } => text.delete(*offset, *len).unwrap(),
        }
        assert_eq!(text.len_utf16() as isize, before as isize + op.len_diff());
        assert!(text.len_utf16() >= 1);
    }
});
