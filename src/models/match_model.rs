use std::{cell::RefCell, rc::Rc};

use crate::{
    contexts::ContextView,
    hash_map::permute,
    history::History,
    manager::SharedCell,
    models::expected_bit,
};

// Match Model ---------------------------------------------------------------------------------------------------------------- Match Model
const MAX_LEN: usize = 62;
const COUNT_CAP: u16 = 1023;

/// Locates the most recent prior occurrence of the current context in the
/// shared history and predicts that the old continuation repeats. The
/// confidence per match-length bucket is learned online; a diverged
/// prefix drops the match and a new one is sought at the next byte
/// boundary.
pub struct MatchModel {
    history: Rc<RefCell<History>>,
    ctx: ContextView,
    bit_context: SharedCell,
    longest: SharedCell,
    positions: Vec<u32>,
    mask: usize,
    ptr: usize,
    len: usize,
    q: Vec<f32>,  // confidence that the predicted bit is right, per bucket
    n: Vec<u16>,
    limit: f32,
    baseline: f32,
    cur: Option<(usize, u8)>,
}

impl MatchModel {
    pub fn new(
        history: Rc<RefCell<History>>,
        ctx: ContextView,
        bit_context: SharedCell,
        longest: SharedCell,
        limit: u32,
        baseline: f32,
        size: u64,
    ) -> MatchModel {
        let slots = (size.min(crate::MEM_CAP) as usize).next_power_of_two();
        MatchModel {
            history,
            ctx,
            bit_context,
            longest,
            positions: vec![0; slots],
            mask: slots - 1,
            ptr: 0,
            len: 0,
            q: vec![0.5; MAX_LEN + 1],
            n: vec![0; MAX_LEN + 1],
            limit: limit as f32,
            baseline,
            cur: None,
        }
    }

    pub fn predict(&mut self) -> f32 {
        if self.len > 0 {
            let byte = self.history.borrow().at(self.ptr);
            match expected_bit(byte, self.bit_context.get()) {
                Some(bit) => {
                    let bucket = self.len.min(MAX_LEN);
                    self.cur = Some((bucket, bit));
                    let q = self.q[bucket];
                    return if bit == 1 { q } else { 1.0 - q };
                }
                None => self.len = 0,
            }
        }
        self.cur = None;
        self.baseline
    }

    pub fn perceive(&mut self, bit: u8) {
        if let Some((bucket, predicted)) = self.cur {
            if self.n[bucket] < COUNT_CAP {
                self.n[bucket] += 1;
            }
            let rate = (self.n[bucket] as f32 + 1.5).min(self.limit);
            let correct = (bit == predicted) as u32 as f32;
            self.q[bucket] += (correct - self.q[bucket]) / rate;
        }
    }

    pub fn byte_update(&mut self) {
        let h = self.history.borrow();
        let pos = h.pos();
        if self.len > 0 {
            self.ptr = self.ptr.wrapping_add(1);
            if self.len < MAX_LEN {
                self.len += 1;
            }
        }
        let idx = permute(self.ctx.value.get() as u64) as usize & self.mask;
        if self.len == 0 {
            let cand = self.positions[idx] as usize;
            if cand != 0 && cand != pos {
                let mut len = 0;
                while len < MAX_LEN
                    && len + 1 <= cand.min(pos)
                    && h.at(cand - 1 - len) == h.at(pos - 1 - len)
                {
                    len += 1;
                }
                if len > 0 {
                    self.ptr = cand;
                    self.len = len;
                }
            }
        }
        self.positions[idx] = pos as u32;

        let bucket = (self.len / 8).min(7) as u32;
        if bucket > self.longest.get() {
            self.longest.set(bucket);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn repeats_a_seen_continuation() {
        let history = Rc::new(RefCell::new(History::new()));
        let ctx = ContextView {
            value: Rc::new(Cell::new(0)),
            size: 1 << 32,
        };
        let acc = Rc::new(Cell::new(1));
        let longest = Rc::new(Cell::new(0));
        let mut m = MatchModel::new(
            history.clone(),
            ContextView {
                value: Rc::clone(&ctx.value),
                size: ctx.size,
            },
            Rc::clone(&acc),
            longest,
            200,
            0.5,
            1 << 16,
        );

        // replay "abcabc": after the second "abc" begins, the model should
        // find the first occurrence and predict its continuation
        let text = b"abcabc";
        for (i, &byte) in text.iter().enumerate() {
            // context = hash of position's preceding bytes; a fixed toy
            // context per offset keeps the lookup table deterministic
            ctx.value.set((i % 3) as u32);
            acc.set(1);
            m.predict();
            history.borrow_mut().push(byte);
            m.byte_update();
        }
        // train confidence up on a long agreeing stretch
        for _ in 0..50 {
            acc.set(1);
            m.predict();
            if let Some((_, predicted)) = m.cur {
                m.perceive(predicted);
            }
        }
        if m.len > 0 {
            acc.set(1);
            let p = m.predict();
            // a committed prediction, not the baseline
            assert!((p - 0.5).abs() > 0.1);
        }
    }

    #[test]
    fn baseline_without_history() {
        let history = Rc::new(RefCell::new(History::new()));
        let ctx = ContextView {
            value: Rc::new(Cell::new(5)),
            size: 1 << 32,
        };
        let mut m = MatchModel::new(
            history,
            ctx,
            Rc::new(Cell::new(1)),
            Rc::new(Cell::new(0)),
            200,
            0.5,
            1 << 16,
        );
        assert_eq!(m.predict(), 0.5);
    }
}
