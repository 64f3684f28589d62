mod bit_context;
mod bracket_context;
mod context_hash;
mod indirect_hash;
mod interval;
mod sparse;

pub use bit_context::BitContext;
pub use bracket_context::BracketContext;
pub use context_hash::ContextHash;
pub use indirect_hash::IndirectHash;
pub use interval::{Interval, IntervalHash};
pub use sparse::{Sparse, SparseSource};

use std::{cell::Cell, rc::Rc};

/// Read handle to a registered context: the current id and the fixed id
/// space declared at construction. Models and mixers clone the handle;
/// the registry owns the evaluation.
#[derive(Clone)]
pub struct ContextView {
    pub value: Rc<Cell<u32>>,
    pub size: u64,
}

/// The closed set of derived context kinds. The roster is part of the
/// format contract, so there is no open extension seam here.
pub enum ContextKind {
    Hash(ContextHash),
    Bracket(BracketContext),
    Sparse(Sparse),
    Indirect(IndirectHash),
    Interval(Interval),
    IntervalHash(IntervalHash),
}

impl ContextKind {
    pub fn size(&self) -> u64 {
        match self {
            ContextKind::Hash(c) => c.size(),
            ContextKind::Bracket(c) => c.size(),
            ContextKind::Sparse(c) => c.size(),
            ContextKind::Indirect(c) => c.size(),
            ContextKind::Interval(c) => c.size(),
            ContextKind::IntervalHash(c) => c.size(),
        }
    }

    fn evaluate(&mut self) -> u32 {
        match self {
            ContextKind::Hash(c) => c.evaluate(),
            ContextKind::Bracket(c) => c.evaluate(),
            ContextKind::Sparse(c) => c.evaluate(),
            ContextKind::Indirect(c) => c.evaluate(),
            ContextKind::Interval(c) => c.evaluate(),
            ContextKind::IntervalHash(c) => c.evaluate(),
        }
    }
}

/// A registered context. Re-evaluated by the manager once per completed
/// byte, in registration order.
pub struct DerivedContext {
    out: Rc<Cell<u32>>,
    size: u64,
    kind: ContextKind,
}

impl DerivedContext {
    pub fn new(kind: ContextKind) -> DerivedContext {
        DerivedContext {
            out: Rc::new(Cell::new(0)),
            size: kind.size(),
            kind,
        }
    }

    pub fn view(&self) -> ContextView {
        ContextView {
            value: Rc::clone(&self.out),
            size: self.size,
        }
    }

    pub fn evaluate(&mut self) {
        let v = self.kind.evaluate();
        debug_assert!((v as u64) < self.size);
        self.out.set(v);
    }
}

/// Rolling multiplicative byte mix shared by the hashing contexts.
pub(crate) fn mix(h: u32, v: u32) -> u32 {
    h.wrapping_mul(11 << 5)
        .wrapping_add(v.wrapping_mul(13))
        .wrapping_add(1)
}
