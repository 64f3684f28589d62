use std::{cell::Cell, rc::Rc};

use crate::{contexts::ContextView, manager::SharedCell};

/// Joint selector: a coarse context widened by a fine one below 256
/// (usually the byte-position accumulator). Re-evaluated every bit so
/// mixers gated by it resolve within the in-flight byte.
pub struct BitContext {
    out: Rc<Cell<u32>>,
    fine: SharedCell,
    coarse: SharedCell,
    size: u64,
}

impl BitContext {
    pub fn new(fine: SharedCell, coarse: SharedCell, coarse_size: u64) -> BitContext {
        BitContext {
            out: Rc::new(Cell::new(0)),
            fine,
            coarse,
            size: coarse_size * 256,
        }
    }

    pub fn view(&self) -> ContextView {
        ContextView {
            value: Rc::clone(&self.out),
            size: self.size,
        }
    }

    pub fn evaluate(&self) {
        let fine = self.fine.get();
        debug_assert!(fine < 256);
        self.out.set(self.coarse.get() * 256 + fine);
    }
}
