use rand::{rngs::StdRng, SeedableRng};

use super::*;
use crate::{generator::DEFAULT_ALPHABET, text::SharedText, utf16::is_char_boundary};

fn doc(rng: &mut StdRng, len: usize) -> String {
    RandomTextGenerator::default().generate(rng, len)
}

fn on_boundaries(text: &str, op: &Operation) -> bool {
    match op {
        Operation::Insert { offset, .. } => is_char_boundary(text, *offset),
        Operation::Delete { offset, len } => {
            is_char_boundary(text, *offset) && is_char_boundary(text, offset + len)
        }
    }
}

#[test]
fn single_unit_doc_never_deleted() {
    let planner = OperationPlanner::default();
    let mut rng = StdRng::seed_from_u64(0);
    for _ in 0..1000 {
        match planner.plan(&mut rng, "a") {
            Some(Operation::Delete { .. }) => panic!("deleted from a single unit doc"),
            Some(op) => assert!(op.fits(1), "{op:?}"),
            None => {}
        }
    }
}

#[test]
fn single_wide_char_never_deleted() {
    let planner = OperationPlanner::default();
    let mut rng = StdRng::seed_from_u64(10);
    for _ in 0..1000 {
        match planner.plan(&mut rng, "🥕") {
            Some(Operation::Delete { .. }) => panic!("deleted the only character"),
            Some(Operation::Insert { offset, .. }) => assert!(offset == 0 || offset == 2),
            None => {}
        }
    }
}

#[test]
fn ops_fit_document() {
    let planner = OperationPlanner::default();
    let mut rng = StdRng::seed_from_u64(1);
    for len in 1..64 {
        let text = doc(&mut rng, len);
        for _ in 0..100 {
            if let Some(op) = planner.plan(&mut rng, &text) {
                assert!(op.fits(len), "{op:?} does not fit {text:?}");
                assert!(on_boundaries(&text, &op), "{op:?} splits {text:?}");
                if let Operation::Delete { len: del, .. } = op {
                    assert!(del < len);
                }
            }
        }
    }
}

#[test]
fn offsets_inside_pairs_are_moved() {
    let planner = OperationPlanner::default();
    let mut rng = StdRng::seed_from_u64(11);
    let text = "a🥕bcd";
    let mut deletes = 0;
    for _ in 0..1000 {
        if let Some(op) = planner.plan(&mut rng, text) {
            assert!(on_boundaries(text, &op), "{op:?}");
            if matches!(op, Operation::Delete { offset: 1, .. }) {
                deletes += 1;
            }
        }
    }

    assert!(deletes > 0);
}

#[test]
fn both_branches_taken() {
    let planner = OperationPlanner::default();
    let mut rng = StdRng::seed_from_u64(2);
    let mut inserts = 0;
    let mut deletes = 0;
    for _ in 0..1000 {
        match planner.plan(&mut rng, "abcdefghijklmnopqrst") {
            Some(Operation::Insert { text, .. }) => {
                assert!(get_utf16_len(&text) < DEFAULT_MAX_INSERT_LEN);
                inserts += 1;
            }
            Some(Operation::Delete { .. }) => deletes += 1,
            None => {}
        }
    }

    assert!(inserts > 300);
    assert!(deletes > 300);
}

#[test]
fn insert_at_end() {
    let planner = OperationPlanner::default();
    let mut rng = StdRng::seed_from_u64(3);
    let hit_end = (0..1000).any(|_| {
        matches!(
            planner.plan(&mut rng, "hello"),
            Some(Operation::Insert { offset: 5, .. })
        )
    });
    assert!(hit_end);
}

#[test]
fn zero_max_insert_len_only_deletes() {
    let planner = OperationPlanner::new(RandomTextGenerator::default(), 0);
    let mut rng = StdRng::seed_from_u64(4);
    for _ in 0..100 {
        assert!(!matches!(
            planner.plan(&mut rng, "0123456789"),
            Some(Operation::Insert { .. })
        ));
    }
}

/// Applies planned ops to a one-sided document and checks the length accounting.
#[test]
fn length_accounting() {
    let planner = OperationPlanner::new(RandomTextGenerator::new(DEFAULT_ALPHABET).unwrap(), 10);
    let mut rng = StdRng::seed_from_u64(5);
    let text = SharedText::new("hello");
    for _ in 0..2000 {
        let current = text.to_string();
        let before = text.len_utf16();
        let Some(op) = planner.plan(&mut rng, &current) else {
            continue;
        };
        match &op {
            Operation::Insert { offset, text: s } => text.insert(*offset, s).unwrap(),
            Operation::Delete { offset, len } => text.delete(*offset, *len).unwrap(),
        }
        assert_eq!(text.len_utf16() as isize, before as isize + op.len_diff());
        assert!(text.len_utf16() >= 1);
    }
}

#[test]
fn arb_planner_safety() {
    arbtest::arbtest(|u| {
        let seed: u64 = u.arbitrary()?;
        let len: usize = u.int_in_range(1..=500)?;
        let planner = OperationPlanner::default();
        let mut rng = StdRng::seed_from_u64(seed);
        let text = doc(&mut rng, len);
        if let Some(op) = planner.plan(&mut rng, &text) {
            assert!(op.fits(len));
            assert!(on_boundaries(&text, &op));
            assert!(op.len_diff() + (len as isize) >= 1);
        }
        Ok(())
    });
}

#[test]
fn empty_doc_only_gets_inserts() {
    let planner = OperationPlanner::default();
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..200 {
        if let Some(op) = planner.plan(&mut rng, "") {
            assert!(matches!(op, Operation::Insert { offset: 0, .. }), "{op:?}");
        }
    }
}
