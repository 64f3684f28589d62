use std::{cell::RefCell, rc::Rc};

use crate::{
    contexts::mix,
    hash_map::permute,
    history::ByteWindow,
};

/// Two-level hash: `near` recent bytes at offset zero combined with
/// `far` bytes starting `offset` back, salted with `salt`. Pairs a local
/// context with a displaced one so periodic structure hashes apart.
pub struct IndirectHash {
    window: Rc<RefCell<ByteWindow>>,
    near: usize,
    offset: usize,
    far: usize,
    salt: u32,
}

impl IndirectHash {
    pub fn new(
        window: Rc<RefCell<ByteWindow>>,
        near: usize,
        offset: usize,
        far: usize,
        salt: u32,
    ) -> IndirectHash {
        IndirectHash {
            window,
            near,
            offset,
            far,
            salt,
        }
    }

    pub fn size(&self) -> u64 {
        1 << 32
    }

    pub fn evaluate(&mut self) -> u32 {
        let w = self.window.borrow();
        let mut h1 = 0u32;
        for i in (0..self.near).rev() {
            h1 = mix(h1, w.at(i) as u32);
        }
        let mut h2 = 0u32;
        for i in (self.offset..self.offset + self.far).rev() {
            h2 = mix(h2, w.at(i) as u32);
        }
        permute((h1 as u64) << 32 | (h2.wrapping_add(self.salt)) as u64)
    }
}
