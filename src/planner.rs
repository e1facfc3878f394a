use rand::Rng;

use crate::{
    generator::RandomTextGenerator,
    utf16::{ceil_char_boundary, floor_char_boundary, get_utf16_len},
    Operation,
};

#[cfg(test)]
mod test;

pub const DEFAULT_MAX_INSERT_LEN: usize = 10;

/// Plans one random edit against the current text of a document.
#[derive(Debug, Clone)]
pub struct OperationPlanner {
    generator: RandomTextGenerator,
    /// Insert lengths are drawn from `0..max_insert_len`
    max_insert_len: usize,
}

impl OperationPlanner {
    pub fn new(generator: RandomTextGenerator, max_insert_len: usize) -> Self {
        Self {
            generator,
            max_insert_len,
        }
    }

    /// Returns None when the round should be skipped.
    ///
    /// Offsets are drawn over the UTF-16 units of `current` and moved onto the
    /// surrounding character boundaries, so no op splits a surrogate pair.
    /// Deletions always leave at least one unit behind, so the length stays
    /// positive across any sequence of planned ops. An empty document only
    /// ever gets inserts.
    pub fn plan<R: Rng>(&self, rng: &mut R, current: &str) -> Option<Operation> {
        let current_len = get_utf16_len(current);
        if rng.gen_bool(0.5) {
            self.plan_delete(rng, current, current_len)
        } else {
            self.plan_insert(rng, current, current_len)
        }
    }

    fn plan_delete<R: Rng>(
        &self,
        rng: &mut R,
        current: &str,
        current_len: usize,
    ) -> Option<Operation> {
        if current_len == 0 {
            return None;
        }

        let start = floor_char_boundary(current, rng.gen_range(0..current_len));
        let max_delete_len = current_len - start - 1;
        // the length range 1..max is empty unless max >= 2
        if max_delete_len <= 1 {
            debug_log::debug_log!("skip delete at {start} (len = {current_len})");
            return None;
        }

        // end <= current_len - 2 before snapping, so one unit always survives
        let end = ceil_char_boundary(current, start + rng.gen_range(1..max_delete_len));
        Some(Operation::Delete {
            offset: start,
            len: end - start,
        })
    }

    fn plan_insert<R: Rng>(
        &self,
        rng: &mut R,
        current: &str,
        current_len: usize,
    ) -> Option<Operation> {
        let start = floor_char_boundary(current, rng.gen_range(0..=current_len));
        let len = if self.max_insert_len == 0 {
            0
        } else {
            rng.gen_range(0..self.max_insert_len)
        };
        if len == 0 {
            debug_log::debug_log!("skip empty insert at {start}");
            return None;
        }

        let text = self.generator.generate(rng, len);
        Some(Operation::Insert {
            offset: start,
            text,
        })
    }
}

impl Default for OperationPlanner {
    fn default() -> Self {
        Self::new(RandomTextGenerator::default(), DEFAULT_MAX_INSERT_LEN)
    }
}
