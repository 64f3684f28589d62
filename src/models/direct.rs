use crate::{
    contexts::ContextView,
    error::PredictorError,
    manager::SharedCell,
};

/// Largest dense table a Direct model will allocate, in cells.
const MAX_CELLS: u64 = 1 << 28;
const COUNT_CAP: u8 = 255;

/// Per-context probability cells addressed by (context id, byte
/// position), stored densely. Each cell keeps a 16-bit probability and a
/// saturating counter; updates follow p += (bit - p)/min(n + 1.5, limit).
pub struct Direct {
    ctx: ContextView,
    bit_context: SharedCell,
    limit: f32,
    p: Vec<u16>,
    n: Vec<u8>,
    cur: usize,
}

impl Direct {
    pub fn new(
        ctx: ContextView,
        bit_context: SharedCell,
        limit: u32,
        delta: u8,
        size: u64,
    ) -> Result<Direct, PredictorError> {
        let cells = size * 256;
        if cells > MAX_CELLS {
            return Err(PredictorError::ContextSize { size: cells });
        }
        Ok(Direct {
            ctx,
            bit_context,
            limit: limit as f32,
            p: vec![1 << 15; cells as usize],
            n: vec![delta; cells as usize],
            cur: 0,
        })
    }

    pub fn predict(&mut self) -> f32 {
        self.cur = self.ctx.value.get() as usize * 256 + self.bit_context.get() as usize;
        (self.p[self.cur] as f32 + 0.5) / 65536.0
    }

    pub fn perceive(&mut self, bit: u8) {
        let i = self.cur;
        if self.n[i] < COUNT_CAP {
            self.n[i] += 1;
        }
        let rate = (self.n[i] as f32 + 1.5).min(self.limit);
        let p = self.p[i] as f32;
        let target = (bit as f32) * 65535.0;
        self.p[i] = (p + (target - p) / rate).clamp(0.0, 65535.0) as u16;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::Cell, rc::Rc};

    fn fixed(v: u32, size: u64) -> ContextView {
        ContextView {
            value: Rc::new(Cell::new(v)),
            size,
        }
    }

    #[test]
    fn learns_a_constant_bit() {
        let acc = Rc::new(Cell::new(1));
        let mut m = Direct::new(fixed(3, 16), Rc::clone(&acc), 30, 0, 16).unwrap();
        assert!((m.predict() - 0.5).abs() < 1.0e-3);
        for _ in 0..100 {
            m.predict();
            m.perceive(1);
        }
        assert!(m.predict() > 0.9);
        // a different byte position is untouched
        acc.set(2);
        assert!((m.predict() - 0.5).abs() < 1.0e-3);
    }

    #[test]
    fn oversized_table_is_rejected() {
        let err = Direct::new(fixed(0, 1 << 32), Rc::new(Cell::new(1)), 30, 0, 1 << 32);
        assert!(err.is_err());
    }
}
