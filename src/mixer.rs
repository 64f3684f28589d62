use std::{cell::RefCell, collections::HashMap, rc::Rc};

use crate::{
    error::PredictorError,
    logistic::{squash, stretch, MAX_STRETCH, MIN_PROB},
    manager::SharedCell,
};

// Mixer ---------------------------------------------------------------------------------------------------------------------------- Mixer

/// Weights are clipped into this range after every gradient step.
const MAX_WEIGHT: f32 = 8192.0;

/// Input vectors shared by every mixer of a layer: the raw probabilities
/// and their stretched form, kept in parallel. Probabilities are clamped
/// away from 0 and 1 before stretching so the gradient stays bounded.
pub struct MixerInput {
    p: Vec<f32>,
    stretched: Vec<f32>,
}

pub type SharedInput = Rc<RefCell<MixerInput>>;

impl MixerInput {
    pub fn new(n: usize) -> SharedInput {
        Rc::new(RefCell::new(MixerInput {
            p: vec![0.5; n],
            stretched: vec![0.0; n],
        }))
    }

    pub fn len(&self) -> usize {
        self.stretched.len()
    }

    pub fn set_input(&mut self, i: usize, p: f32) {
        let p = p.clamp(MIN_PROB, 1.0 - MIN_PROB);
        self.p[i] = p;
        self.stretched[i] = stretch(p);
    }

    pub fn set_stretched_input(&mut self, i: usize, s: f32) {
        let s = s.clamp(-MAX_STRETCH, MAX_STRETCH);
        self.stretched[i] = s;
        self.p[i] = squash(s);
    }

    pub fn stretched(&self, i: usize) -> f32 {
        self.stretched[i]
    }
}

/// A logistic-regression neuron over its layer's stretched inputs. The
/// configured context selects a weight row, allocated the first time it
/// is addressed; `mix` returns the stretched output and `perceive` takes
/// one gradient step on the row just used.
pub struct Mixer {
    input: SharedInput,
    ctx: SharedCell,
    lr: f32,
    size: u64,
    n_inputs: usize,
    rows: HashMap<u32, Vec<f32>>,
    last_ctx: u32,
    last_dot: f32,
}

impl Mixer {
    pub fn new(
        input: SharedInput,
        ctx: SharedCell,
        lr: f32,
        size: u64,
        n_inputs: usize,
    ) -> Result<Mixer, PredictorError> {
        let found = input.borrow().len();
        if n_inputs > found {
            return Err(PredictorError::MixerShape {
                expected: n_inputs,
                found,
            });
        }
        Ok(Mixer {
            input,
            ctx,
            lr,
            size,
            n_inputs,
            rows: HashMap::new(),
            last_ctx: 0,
            last_dot: 0.0,
        })
    }

    /// Stretched output for the currently selected weight row.
    pub fn mix(&mut self) -> f32 {
        let ctx = self.ctx.get();
        debug_assert!((ctx as u64) < self.size);
        let row = self
            .rows
            .entry(ctx)
            .or_insert_with(|| vec![0.0; self.n_inputs]);
        let input = self.input.borrow();
        let mut dot = 0.0;
        for (i, w) in row.iter().enumerate() {
            dot += w * input.stretched(i);
        }
        self.last_ctx = ctx;
        self.last_dot = dot;
        dot
    }

    pub fn perceive(&mut self, bit: u8) {
        let p = squash(self.last_dot);
        let err = self.lr * (bit as f32 - p);
        let input = self.input.borrow();
        if let Some(row) = self.rows.get_mut(&self.last_ctx) {
            for (i, w) in row.iter_mut().enumerate() {
                *w = (*w + err * input.stretched(i)).clamp(-MAX_WEIGHT, MAX_WEIGHT);
            }
        }
    }

    pub fn num_neurons(&self) -> usize {
        self.rows.len()
    }

    pub fn num_connections(&self) -> usize {
        self.rows.len() * self.n_inputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn rejects_an_undersized_layer() {
        let input = MixerInput::new(3);
        let err = Mixer::new(input, Rc::new(Cell::new(0)), 0.005, 1, 8);
        assert!(err.is_err());
    }

    #[test]
    fn learns_to_trust_a_good_input() {
        let input = MixerInput::new(2);
        let ctx = Rc::new(Cell::new(0));
        let mut m = Mixer::new(Rc::clone(&input), ctx, 0.01, 1, 2).unwrap();
        for _ in 0..2000 {
            input.borrow_mut().set_input(0, 0.95); // consistently right
            input.borrow_mut().set_input(1, 0.05); // consistently wrong
            m.mix();
            m.perceive(1);
        }
        input.borrow_mut().set_input(0, 0.95);
        input.borrow_mut().set_input(1, 0.05);
        assert!(squash(m.mix()) > 0.8);
    }

    #[test]
    fn rows_allocate_lazily() {
        let input = MixerInput::new(2);
        let ctx = Rc::new(Cell::new(7));
        let mut m = Mixer::new(Rc::clone(&input), Rc::clone(&ctx), 0.01, 256, 2).unwrap();
        assert_eq!(m.num_neurons(), 0);
        m.mix();
        assert_eq!(m.num_neurons(), 1);
        ctx.set(9);
        m.mix();
        assert_eq!(m.num_neurons(), 2);
    }
}
