use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use crate::{
    contexts::{BitContext, ContextKind, ContextView, DerivedContext},
    hash_map::{NonstationaryMap, RunMap},
    history::{ByteWindow, History, WordWindow},
    shared_map::SharedMap,
};

/// A published scalar: models, contexts and mixers hold clones and read
/// the value the manager last stored.
pub type SharedCell = Rc<Cell<u32>>;

/// Slot count of the shared nonstationary map.
const NONSTATIONARY_SLOTS: usize = 1 << 22;
/// Slot count of the shared run map.
const RUN_MAP_SLOTS: usize = 1 << 20;
/// Open pairs deeper than this are not tracked.
const BRACKET_DEPTH: usize = 10;
/// An open pair further back than this many bytes is abandoned.
const BRACKET_DISTANCE: usize = 100_000;

const BRACKET_PAIRS: [(u8, u8); 6] = [
    (b'(', b')'),
    (b'[', b']'),
    (b'{', b'}'),
    (b'<', b'>'),
    (b'"', b'"'),
    (b'\'', b'\''),
];

/// Stack of currently open bracket/quote pairs, advanced once per
/// completed byte.
pub struct BracketState {
    stack: Vec<(u8, usize)>, // (expected closer, position opened)
    pos: usize,
}

impl BracketState {
    pub(crate) fn new() -> BracketState {
        BracketState {
            stack: Vec::with_capacity(BRACKET_DEPTH),
            pos: 0,
        }
    }

    pub(crate) fn observe(&mut self, byte: u8) {
        self.pos += 1;
        while let Some(&(_, at)) = self.stack.last() {
            if self.pos - at > BRACKET_DISTANCE {
                self.stack.pop();
            } else {
                break;
            }
        }
        if let Some(&(close, _)) = self.stack.last() {
            if byte == close {
                self.stack.pop();
                return;
            }
        }
        for &(open, close) in &BRACKET_PAIRS {
            if byte == open {
                if self.stack.len() < BRACKET_DEPTH {
                    self.stack.push((close, self.pos));
                }
                return;
            }
        }
    }

    /// The closer that would resolve the innermost open pair.
    pub fn expected(&self) -> Option<u8> {
        self.stack.last().map(|&(close, _)| close)
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

/// Owns all state shared between models and advances it once per observed
/// bit. Everything published here is read-only to the models between
/// `perceive` calls, which is what makes the single-threaded schedule
/// correct without locks.
pub struct ContextManager {
    /// The in-flight byte: sentinel bit followed by the bits seen so far,
    /// MSB first. Equals 1 exactly when the next bit starts a new byte.
    /// Models index their cells through this handle.
    pub bit_context: SharedCell,
    /// Second published view of the accumulator, advanced in lockstep.
    /// Mixer gates and the final estimator select on this one.
    pub long_bit_context: SharedCell,
    pub zero_context: SharedCell,
    /// Bytes since the last line feed, capped at 99.
    pub line_break: SharedCell,
    /// Bucketed length of the longest active match, 0..8. Reset at each
    /// byte boundary and re-published by the match models.
    pub longest_match: SharedCell,
    pub recent_bytes: [SharedCell; 4],

    pub bytes: Rc<RefCell<ByteWindow>>,
    pub words: Rc<RefCell<WordWindow>>,
    pub history: Rc<RefCell<History>>,
    pub brackets: Rc<RefCell<BracketState>>,

    pub nonstationary: Rc<RefCell<NonstationaryMap>>,
    pub run_map: Rc<RefCell<RunMap>>,
    pub shared_map: Rc<RefCell<SharedMap>>,

    contexts: Vec<DerivedContext>,
    bit_contexts: Vec<BitContext>,
}

impl ContextManager {
    pub fn new() -> ContextManager {
        ContextManager {
            bit_context: Rc::new(Cell::new(1)),
            long_bit_context: Rc::new(Cell::new(1)),
            zero_context: Rc::new(Cell::new(0)),
            line_break: Rc::new(Cell::new(0)),
            longest_match: Rc::new(Cell::new(0)),
            recent_bytes: [
                Rc::new(Cell::new(0)),
                Rc::new(Cell::new(0)),
                Rc::new(Cell::new(0)),
                Rc::new(Cell::new(0)),
            ],
            bytes: Rc::new(RefCell::new(ByteWindow::new())),
            words: Rc::new(RefCell::new(WordWindow::new())),
            history: Rc::new(RefCell::new(History::new())),
            brackets: Rc::new(RefCell::new(BracketState::new())),
            nonstationary: Rc::new(RefCell::new(NonstationaryMap::new(NONSTATIONARY_SLOTS))),
            run_map: Rc::new(RefCell::new(RunMap::new(RUN_MAP_SLOTS))),
            shared_map: Rc::new(RefCell::new(SharedMap::new())),
            contexts: Vec::new(),
            bit_contexts: Vec::new(),
        }
    }

    /// Register a derived context. Registration order is evaluation order.
    pub fn add_context(&mut self, kind: ContextKind) -> ContextView {
        let ctx = DerivedContext::new(kind);
        let view = ctx.view();
        self.contexts.push(ctx);
        view
    }

    /// Register a bit-extended context; unlike the byte-level registry it
    /// is refreshed after every bit.
    pub fn add_bit_context(
        &mut self,
        fine: SharedCell,
        coarse: SharedCell,
        coarse_size: u64,
    ) -> ContextView {
        let ctx = BitContext::new(fine, coarse, coarse_size);
        let view = ctx.view();
        self.bit_contexts.push(ctx);
        view
    }

    /// Consume one observed bit. Returns true when it completed a byte,
    /// in which case all byte-level state has been rolled and every
    /// registered context re-evaluated.
    pub fn perceive(&mut self, bit: u8) -> bool {
        debug_assert!(bit < 2);
        let acc = self.bit_context.get() * 2 + bit as u32;
        let byte_done = acc >= 256;
        if byte_done {
            let byte = (acc - 256) as u8;
            self.history.borrow_mut().push(byte);
            self.bytes.borrow_mut().push(byte);
            self.words.borrow_mut().push_byte(byte);
            self.brackets.borrow_mut().observe(byte);
            {
                let w = self.bytes.borrow();
                for (i, cell) in self.recent_bytes.iter().enumerate() {
                    cell.set(w.at(i) as u32);
                }
            }
            if byte == b'\n' {
                self.line_break.set(0);
            } else {
                self.line_break.set((self.line_break.get() + 1).min(99));
            }
            self.longest_match.set(0);
            self.bit_context.set(1);
            self.long_bit_context.set(1);
            for ctx in &mut self.contexts {
                ctx.evaluate();
            }
        } else {
            self.bit_context.set(acc);
            self.long_bit_context.set(acc);
        }
        for ctx in &self.bit_contexts {
            ctx.evaluate();
        }
        byte_done
    }
}
