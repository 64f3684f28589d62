use std::{cell::RefCell, rc::Rc};

use crate::{
    contexts::ContextView,
    hash_map::{NonstationaryMap, RunMap},
    manager::SharedCell,
    models::expected_bit,
    shared_map::SharedMap,
    state_table::next_state,
};

/// First-level table an Indirect model reads its state id from.
pub enum IndirectSource {
    Nonstationary(Rc<RefCell<NonstationaryMap>>),
    RunMap(Rc<RefCell<RunMap>>),
}

/// Two-stage model: the derived context selects a slot holding a compact
/// state id, and the id indexes the shared probability map. Nonstationary
/// slots are keyed per byte position and transition on every observed
/// bit; run-map slots are keyed per context and encode the dominant
/// byte's run.
pub struct Indirect {
    source: IndirectSource,
    ctx: ContextView,
    bit_context: SharedCell,
    recent0: SharedCell,
    limit: f32,
    shared: Rc<RefCell<SharedMap>>,
    slot: usize,
    state: u8,
}

impl Indirect {
    pub fn new(
        source: IndirectSource,
        ctx: ContextView,
        bit_context: SharedCell,
        recent0: SharedCell,
        limit: u32,
        shared: Rc<RefCell<SharedMap>>,
    ) -> Indirect {
        Indirect {
            source,
            ctx,
            bit_context,
            recent0,
            limit: limit as f32,
            shared,
            slot: 0,
            state: 0,
        }
    }

    pub fn predict(&mut self) -> f32 {
        let acc = self.bit_context.get();
        match &self.source {
            IndirectSource::Nonstationary(m) => {
                let key = (self.ctx.value.get() as u64) << 8 | acc as u64;
                let mut m = m.borrow_mut();
                self.slot = m.slot(key);
                self.state = m.state(self.slot);
            }
            IndirectSource::RunMap(m) => {
                self.slot = m.borrow_mut().slot(self.ctx.value.get() as u64);
                let (byte, run) = m.borrow().run(self.slot);
                self.state = if run == 0 {
                    0
                } else {
                    match expected_bit(byte, acc) {
                        Some(bit) => (run.min(62) + 1) << 2 | 2 | bit,
                        None => 1,
                    }
                };
            }
        }
        self.shared.borrow().predict(self.state, acc)
    }

    pub fn perceive(&mut self, bit: u8) {
        let acc = self.bit_context.get();
        self.shared
            .borrow_mut()
            .update(self.state, acc, bit, self.limit);
        if let IndirectSource::Nonstationary(m) = &self.source {
            m.borrow_mut()
                .set_state(self.slot, next_state(self.state, bit));
        }
    }

    pub fn byte_update(&mut self) {
        if let IndirectSource::RunMap(m) = &self.source {
            m.borrow_mut()
                .observe(self.slot, self.recent0.get() as u8);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn nonstationary_states_learn_a_run() {
        let map = Rc::new(RefCell::new(NonstationaryMap::new(1 << 10)));
        let shared = Rc::new(RefCell::new(SharedMap::new()));
        let ctx = ContextView {
            value: Rc::new(Cell::new(42)),
            size: 1 << 32,
        };
        let mut m = Indirect::new(
            IndirectSource::Nonstationary(map),
            ctx,
            Rc::new(Cell::new(1)),
            Rc::new(Cell::new(0)),
            500,
            shared,
        );
        for _ in 0..100 {
            m.predict();
            m.perceive(1);
        }
        assert!(m.predict() > 0.8);
    }
}
