use crate::{
    contexts::ContextView,
    hash_map::RunMap,
    manager::SharedCell,
    models::expected_bit,
};

/// Tracks the dominant byte under a context and its run length. While the
/// in-flight prefix stays consistent with the dominant byte, the model
/// backs that byte's next bit with confidence monotone in the run; once
/// the prefix diverges it abstains at 0.5.
pub struct ByteRun {
    table: RunMap,
    ctx: ContextView,
    bit_context: SharedCell,
    recent0: SharedCell,
    delta: f32,
    slot: usize,
}

impl ByteRun {
    pub fn new(
        ctx: ContextView,
        bit_context: SharedCell,
        recent0: SharedCell,
        delta: f32,
        size: u64,
    ) -> ByteRun {
        let slots = (size.min(crate::MEM_CAP) as usize).next_power_of_two();
        ByteRun {
            table: RunMap::new(slots),
            ctx,
            bit_context,
            recent0,
            delta,
            slot: 0,
        }
    }

    pub fn predict(&mut self) -> f32 {
        self.slot = self.table.slot(self.ctx.value.get() as u64);
        let (byte, run) = self.table.run(self.slot);
        if run == 0 {
            return 0.5;
        }
        match expected_bit(byte, self.bit_context.get()) {
            Some(bit) => {
                let s = run as f32 * self.delta / 100.0;
                if bit == 1 {
                    (0.5 + s) / (1.0 + s)
                } else {
                    0.5 / (1.0 + s)
                }
            }
            None => 0.5,
        }
    }

    pub fn perceive(&mut self, _bit: u8) {}

    pub fn byte_update(&mut self) {
        self.table.observe(self.slot, self.recent0.get() as u8);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::Cell, rc::Rc};

    #[test]
    fn repeated_byte_builds_confidence() {
        let ctx = ContextView {
            value: Rc::new(Cell::new(7)),
            size: 1 << 32,
        };
        let acc = Rc::new(Cell::new(1));
        let recent0 = Rc::new(Cell::new(0));
        let mut m = ByteRun::new(ctx, Rc::clone(&acc), Rc::clone(&recent0), 200.0, 1 << 16);

        recent0.set(0x00);
        let mut last = 0.5;
        for _ in 0..5 {
            let p = m.predict();
            assert!(p <= last + 1.0e-6);
            last = p;
            m.byte_update();
        }
        // dominant byte 0x00: first bit should be strongly predicted 0
        assert!(m.predict() < 0.1);
    }
}
