use std::rc::Rc;

use rand::{rngs::StdRng, Rng};

use crate::{
    byte_model::bit_probability,
    logistic::squash,
    manager::SharedCell,
};

// Byte Mixer ------------------------------------------------------------------------------------------------------------------ Byte Mixer

const INIT_SPAN: f32 = 0.05;

/// Two-layer perceptron over the byte models' distributions. Trained by
/// backpropagation once per byte against the byte that actually arrived;
/// the output distribution is masked to the vocabulary and renormalised,
/// so with a single admissible symbol every bit query collapses to 0 or
/// 1 and short-circuits the outer predictor.
pub struct ByteMixer {
    n_in: usize,
    hidden: usize,
    lr: f32,
    vocab: Rc<[bool; 256]>,
    bit_context: SharedCell,
    w1: Vec<f32>,
    b1: Vec<f32>,
    w2: Vec<f32>,
    b2: Vec<f32>,
    input: Vec<f32>,
    hidden_act: Vec<f32>,
    raw_out: [f32; 256],
    dist: [f32; 256],
    pending: u32,
    primed: bool,
}

impl ByteMixer {
    pub fn new(
        n_models: usize,
        hidden: usize,
        lr: f32,
        bit_context: SharedCell,
        vocab: Rc<[bool; 256]>,
        rng: &mut StdRng,
    ) -> ByteMixer {
        let n_in = n_models * 256;
        let allowed = vocab.iter().filter(|&&v| v).count().max(1);
        let mut dist = [0.0f32; 256];
        for (i, d) in dist.iter_mut().enumerate() {
            if vocab[i] {
                *d = 1.0 / allowed as f32;
            }
        }
        ByteMixer {
            n_in,
            hidden,
            lr,
            vocab,
            bit_context,
            w1: (0..hidden * n_in)
                .map(|_| rng.gen_range(-INIT_SPAN..INIT_SPAN))
                .collect(),
            b1: vec![0.0; hidden],
            w2: (0..256 * hidden)
                .map(|_| rng.gen_range(-INIT_SPAN..INIT_SPAN))
                .collect(),
            b2: vec![0.0; 256],
            input: vec![0.0; n_in],
            hidden_act: vec![0.0; hidden],
            raw_out: [0.5; 256],
            dist,
            pending: 1,
            primed: false,
        }
    }

    pub fn set_input(&mut self, model: usize, dist: &[f32; 256]) {
        self.input[model * 256..model * 256 + 256].copy_from_slice(dist);
    }

    pub fn predict(&mut self) -> f32 {
        bit_probability(&self.dist, self.bit_context.get())
    }

    pub fn perceive(&mut self, bit: u8) {
        self.pending = self.pending * 2 + bit as u32;
    }

    pub fn byte_update(&mut self) {
        let byte = (self.pending - 256) as u8;
        self.pending = 1;
        if self.primed {
            self.train(byte);
        }
        self.forward();
        self.primed = true;
    }

    fn forward(&mut self) {
        for k in 0..self.hidden {
            let row = &self.w1[k * self.n_in..(k + 1) * self.n_in];
            let mut z = self.b1[k];
            for (w, x) in row.iter().zip(self.input.iter()) {
                z += w * x;
            }
            self.hidden_act[k] = squash(z);
        }
        for o in 0..256 {
            let row = &self.w2[o * self.hidden..(o + 1) * self.hidden];
            let mut z = self.b2[o];
            for (w, h) in row.iter().zip(self.hidden_act.iter()) {
                z += w * h;
            }
            self.raw_out[o] = squash(z);
        }
        let mut sum = 0.0;
        for o in 0..256 {
            self.dist[o] = if self.vocab[o] { self.raw_out[o] } else { 0.0 };
            sum += self.dist[o];
        }
        debug_assert!(sum > 0.0);
        for d in self.dist.iter_mut() {
            *d /= sum;
        }
    }

    fn train(&mut self, target: u8) {
        let mut delta2 = [0.0f32; 256];
        for o in 0..256 {
            let want = (o == target as usize) as u32 as f32;
            let out = self.raw_out[o];
            delta2[o] = (want - out) * out * (1.0 - out);
        }
        // hidden deltas against the pre-update output weights
        let mut delta1 = vec![0.0f32; self.hidden];
        for o in 0..256 {
            let row = &self.w2[o * self.hidden..(o + 1) * self.hidden];
            for (d1, w) in delta1.iter_mut().zip(row.iter()) {
                *d1 += delta2[o] * w;
            }
        }
        for (d1, h) in delta1.iter_mut().zip(self.hidden_act.iter()) {
            *d1 *= h * (1.0 - h);
        }

        for o in 0..256 {
            let row = &mut self.w2[o * self.hidden..(o + 1) * self.hidden];
            for (w, h) in row.iter_mut().zip(self.hidden_act.iter()) {
                *w += self.lr * delta2[o] * h;
            }
            self.b2[o] += self.lr * delta2[o];
        }
        for k in 0..self.hidden {
            let row = &mut self.w1[k * self.n_in..(k + 1) * self.n_in];
            for (w, x) in row.iter_mut().zip(self.input.iter()) {
                *w += self.lr * delta1[k] * x;
            }
            self.b1[k] += self.lr * delta1[k];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use std::cell::Cell;

    fn feed(m: &mut ByteMixer, byte: u8) {
        for i in (0..8).rev() {
            m.perceive((byte >> i) & 1);
        }
        m.byte_update();
    }

    #[test]
    fn single_symbol_vocab_is_degenerate() {
        let mut vocab = [false; 256];
        vocab[b'A' as usize] = true;
        let acc = Rc::new(Cell::new(1));
        let mut rng = StdRng::seed_from_u64(0xDEAD_BEEF);
        let mut m = ByteMixer::new(2, 40, 0.03, Rc::clone(&acc), Rc::new(vocab), &mut rng);

        let mut a = 1u32;
        for i in (0..8).rev() {
            let bit = (b'A' >> i) & 1;
            acc.set(a);
            assert_eq!(m.predict(), bit as f32);
            a = a * 2 + bit as u32;
        }
    }

    #[test]
    fn learns_the_dominant_input() {
        let acc = Rc::new(Cell::new(1));
        let mut rng = StdRng::seed_from_u64(0xDEAD_BEEF);
        let mut m = ByteMixer::new(1, 40, 0.03, Rc::clone(&acc), Rc::new([true; 256]), &mut rng);

        let mut hint = [0.0f32; 256];
        hint[b'e' as usize] = 1.0;
        for _ in 0..400 {
            m.set_input(0, &hint);
            feed(&mut m, b'e');
        }
        let best = (0..256).max_by(|&a, &b| m.dist[a].total_cmp(&m.dist[b])).unwrap();
        assert_eq!(best, b'e' as usize);
        assert!(m.dist[b'e' as usize] > 5.0 / 256.0);
        let sum: f32 = m.dist.iter().sum();
        assert!((sum - 1.0).abs() < 1.0e-4);
    }
}
