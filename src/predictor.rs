use std::rc::Rc;

use rand::{rngs::StdRng, SeedableRng};

use crate::{
    byte_model::{ByteMixer, ByteModel, Ppm, Ppmd},
    contexts::{
        BracketContext, ContextHash, ContextKind, ContextView, IndirectHash, Interval,
        IntervalHash, Sparse, SparseSource,
    },
    error::PredictorError,
    logistic::squash,
    manager::ContextManager,
    mixer::{Mixer, MixerInput, SharedInput},
    models::{
        BitModel, Bracket, ByteRun, Direct, DirectHash, Dmc, Facade, Indirect, IndirectSource,
        MatchModel, Paq,
    },
    sse::Sse,
};

// Predictor -------------------------------------------------------------------------------------------------------------------- Predictor

/// Seed for every stochastic initialisation; fixed by the format.
const SEED: u64 = 0xDEAD_BEEF;

/// PPM x2 plus the frequency model.
const BYTE_MODEL_COUNT: usize = 3;
const BYTE_MIXER_HIDDEN: usize = 40;
const BYTE_MIXER_LR: f32 = 0.03;

// Word-context patterns, indices into the word history.
const ENGLISH_PATTERNS: &[&[usize]] = &[
    &[0],
    &[0, 1],
    &[7, 2],
    &[7],
    &[1],
    &[1, 2],
    &[1, 2, 3],
    &[1, 3],
    &[1, 4],
    &[1, 5],
    &[2, 3],
    &[3, 4],
    &[1, 2, 4],
    &[1, 2, 3, 4],
    &[2, 3, 4],
    &[2],
    &[1, 2, 3, 4, 5],
    &[1, 2, 3, 4, 5, 6],
];
const ENGLISH_MATCH_PATTERNS: &[&[usize]] = &[&[0], &[1], &[7], &[1, 3], &[1, 2, 3], &[7, 2]];

// Byte-gap patterns, indices into the recent-byte window.
const SPARSE_PATTERNS: &[&[usize]] = &[
    &[1],
    &[2],
    &[3],
    &[4],
    &[5],
    &[0, 2],
    &[0, 3],
    &[0, 4],
    &[0, 5],
    &[0, 6],
    &[0, 7],
    &[1, 2],
    &[1, 3],
    &[2, 3],
    &[2, 5],
    &[3, 4],
    &[3, 5],
    &[3, 7],
];
const SPARSE_MATCH_PATTERNS: &[&[usize]] = &[&[1], &[0, 2], &[0, 4], &[1, 2], &[2, 3], &[3, 4], &[3, 7]];

// (near, offset, far, salt) tuples for the displaced-context hashes.
const DOUBLE_INDIRECT_PARAMS: [(usize, usize, usize, u32); 11] = [
    (1, 8, 1, 8),
    (2, 8, 1, 8),
    (1, 8, 2, 8),
    (2, 8, 2, 8),
    (1, 8, 3, 8),
    (3, 8, 1, 8),
    (4, 6, 4, 8),
    (5, 5, 5, 5),
    (1, 8, 4, 8),
    (1, 8, 5, 6),
    (6, 4, 6, 4),
];

fn interval_map_text() -> [u8; 256] {
    let thresholds = [41, 92, 124, 58, 11, 46, 36, 47, 64, 4, 61, 97, 125, 45, 48];
    bucket_map(&thresholds)
}

fn interval_map_coarse() -> [u8; 256] {
    let thresholds = [1, 32, 64, 128, 255, 142, 138, 140, 137, 97];
    bucket_map(&thresholds)
}

fn bucket_map(thresholds: &[i32]) -> [u8; 256] {
    let mut map = [0u8; 256];
    for (i, m) in map.iter_mut().enumerate() {
        *m = thresholds.iter().map(|&t| ((i as i32) < t) as u8).sum();
    }
    map
}

/// The ensemble: every statistical model, the shared context manager
/// feeding them, three mixing layers and the final estimator, driven in a
/// fixed per-bit schedule. The exact roster, registration order and
/// parameters below are part of the format contract; a change to any of
/// them alters the wire format.
pub struct Predictor {
    manager: ContextManager,
    models: Vec<BitModel>,
    byte_models: Vec<ByteModel>,
    byte_mixer: ByteMixer,
    layers: Vec<SharedInput>,
    mixers: Vec<Vec<Mixer>>,
    auxiliary: Vec<usize>,
    sse: Sse,
    vocab: Rc<[bool; 256]>,
    byte_mixer_p: f32,
}

impl Predictor {
    pub fn new(vocab: [bool; 256]) -> Result<Predictor, PredictorError> {
        if !vocab.iter().any(|&v| v) {
            return Err(PredictorError::EmptyVocabulary);
        }
        let vocab = Rc::new(vocab);
        let mut rng = StdRng::seed_from_u64(SEED);
        let manager = ContextManager::new();
        let byte_mixer = ByteMixer::new(
            BYTE_MODEL_COUNT,
            BYTE_MIXER_HIDDEN,
            BYTE_MIXER_LR,
            Rc::clone(&manager.bit_context),
            Rc::clone(&vocab),
            &mut rng,
        );
        let sse = Sse::new(Rc::clone(&manager.long_bit_context));

        let mut p = Predictor {
            manager,
            models: Vec::new(),
            byte_models: Vec::new(),
            byte_mixer,
            layers: Vec::new(),
            mixers: Vec::new(),
            auxiliary: Vec::new(),
            sse,
            vocab,
            byte_mixer_p: 0.5,
        };

        p.add_bracket()?;
        p.add_paq();
        p.add_ppm();
        p.add_ppmd();
        p.add_dmc();
        p.add_byte_run();
        p.add_nonstationary();
        p.add_english();
        p.add_sparse();
        p.add_direct()?;
        p.add_run_map();
        p.add_match();
        p.add_double_indirect();
        p.add_interval();
        p.add_mixers()?;

        Ok(p)
    }

    // registration helpers ------------------------------------------------

    fn hash_context(&mut self, order: usize, bits: u32) -> ContextView {
        let window = Rc::clone(&self.manager.bytes);
        self.manager
            .add_context(ContextKind::Hash(ContextHash::new(window, order, bits)))
    }

    fn nonstationary_indirect(&self, ctx: ContextView, limit: u32) -> BitModel {
        BitModel::Indirect(Indirect::new(
            IndirectSource::Nonstationary(Rc::clone(&self.manager.nonstationary)),
            ctx,
            Rc::clone(&self.manager.bit_context),
            Rc::clone(&self.manager.recent_bytes[0]),
            limit,
            Rc::clone(&self.manager.shared_map),
        ))
    }

    fn run_map_indirect(&self, ctx: ContextView, limit: u32) -> BitModel {
        BitModel::Indirect(Indirect::new(
            IndirectSource::RunMap(Rc::clone(&self.manager.run_map)),
            ctx,
            Rc::clone(&self.manager.bit_context),
            Rc::clone(&self.manager.recent_bytes[0]),
            limit,
            Rc::clone(&self.manager.shared_map),
        ))
    }

    fn match_model(&self, ctx: ContextView, size: u64) -> BitModel {
        BitModel::Match(MatchModel::new(
            Rc::clone(&self.manager.history),
            ctx,
            Rc::clone(&self.manager.bit_context),
            Rc::clone(&self.manager.longest_match),
            200,
            0.5,
            size,
        ))
    }

    fn byte_run(&self, ctx: ContextView, delta: f32, size: u64) -> BitModel {
        BitModel::ByteRun(ByteRun::new(
            ctx,
            Rc::clone(&self.manager.bit_context),
            Rc::clone(&self.manager.recent_bytes[0]),
            delta,
            size,
        ))
    }

    // model roster --------------------------------------------------------

    fn add_bracket(&mut self) -> Result<(), PredictorError> {
        self.models.push(BitModel::Bracket(Bracket::new(
            Rc::clone(&self.manager.brackets),
            Rc::clone(&self.manager.bit_context),
            200,
            Rc::clone(&self.vocab),
        )));
        let ctx = self
            .manager
            .add_context(ContextKind::Bracket(BracketContext::new(
                Rc::clone(&self.manager.brackets),
                256,
                15,
            )));
        self.models.push(BitModel::Direct(Direct::new(
            ctx.clone(),
            Rc::clone(&self.manager.bit_context),
            30,
            0,
            ctx.size,
        )?));
        self.models.push(self.nonstationary_indirect(ctx, 300));
        Ok(())
    }

    /// Two legacy-ensemble instances; each exports its sub-model
    /// predictions as individually mixable facades and its own output slot
    /// is forwarded to the upper layers.
    fn add_paq(&mut self) {
        for mem_bits in [11u32, 11] {
            self.auxiliary.push(self.models.len());
            let paq = Paq::new(mem_bits);
            let predictions = paq.model_predictions();
            self.models.push(BitModel::Paq(paq));
            for cell in predictions {
                self.models.push(BitModel::Facade(Facade::new(cell)));
            }
        }
    }

    fn add_ppm(&mut self) {
        self.byte_models.push(ByteModel::Ppm(Ppm::new(
            7,
            Rc::clone(&self.manager.bit_context),
            10_000,
            11_000_000,
            Rc::clone(&self.vocab),
        )));
        self.byte_models.push(ByteModel::Ppm(Ppm::new(
            5,
            Rc::clone(&self.manager.bit_context),
            10_000,
            7_000_000,
            Rc::clone(&self.vocab),
        )));
    }

    fn add_ppmd(&mut self) {
        self.byte_models.push(ByteModel::Ppmd(Ppmd::new(
            16,
            1680,
            Rc::clone(&self.manager.bit_context),
            Rc::clone(&self.vocab),
        )));
    }

    fn add_dmc(&mut self) {
        self.models.push(BitModel::Dmc(Dmc::new(0.02, 70_000_000)));
    }

    fn add_byte_run(&mut self) {
        let max_size = 10_000_000;
        for (order, bits) in [(0, 8), (1, 5), (1, 8), (2, 8)] {
            let ctx = self.hash_context(order, bits);
            let size = ctx.size.min(max_size);
            self.models.push(self.byte_run(ctx, 200.0, size));
        }
    }

    fn add_nonstationary(&mut self) {
        for (order, bits) in [(0, 8), (2, 8), (4, 7), (8, 3), (12, 1), (16, 1)] {
            let ctx = self.hash_context(order, bits);
            self.models.push(self.nonstationary_indirect(ctx, 500));
        }
    }

    fn add_english(&mut self) {
        for pattern in ENGLISH_PATTERNS {
            let ctx = self.word_sparse(pattern);
            self.models.push(self.nonstationary_indirect(ctx, 200));
        }
        for pattern in ENGLISH_MATCH_PATTERNS {
            let ctx = self.word_sparse(pattern);
            self.models.push(self.match_model(ctx.clone(), 10_000_000));
            self.models.push(self.byte_run(ctx.clone(), 100.0, 10_000_000));
            if pattern.len() == 1 && pattern[0] == 1 {
                self.models.push(self.run_map_indirect(ctx.clone(), 200));
                self.models.push(BitModel::DirectHash(DirectHash::new(
                    ctx,
                    Rc::clone(&self.manager.bit_context),
                    30,
                    0,
                    500_000,
                )));
            }
        }
    }

    fn add_sparse(&mut self) {
        for pattern in SPARSE_PATTERNS {
            let ctx = self.byte_sparse(pattern);
            self.models.push(self.nonstationary_indirect(ctx, 300));
        }
        for pattern in SPARSE_MATCH_PATTERNS {
            let ctx = self.byte_sparse(pattern);
            self.models.push(self.match_model(ctx.clone(), 10_000_000));
            self.models.push(self.byte_run(ctx, 100.0, 10_000_000));
        }
    }

    fn word_sparse(&mut self, pattern: &[usize]) -> ContextView {
        let words = Rc::clone(&self.manager.words);
        self.manager.add_context(ContextKind::Sparse(Sparse::new(
            SparseSource::Words(words),
            pattern,
        )))
    }

    fn byte_sparse(&mut self, pattern: &[usize]) -> ContextView {
        let bytes = Rc::clone(&self.manager.bytes);
        self.manager.add_context(ContextKind::Sparse(Sparse::new(
            SparseSource::Bytes(bytes),
            pattern,
        )))
    }

    fn add_direct(&mut self) -> Result<(), PredictorError> {
        let limit = 30;
        for (order, bits) in [(0, 8), (1, 8), (2, 8), (3, 8)] {
            let ctx = self.hash_context(order, bits);
            if order < 3 {
                self.models.push(BitModel::Direct(Direct::new(
                    ctx.clone(),
                    Rc::clone(&self.manager.bit_context),
                    limit,
                    0,
                    ctx.size,
                )?));
            } else {
                self.models.push(BitModel::DirectHash(DirectHash::new(
                    ctx,
                    Rc::clone(&self.manager.bit_context),
                    limit,
                    0,
                    100_000,
                )));
            }
        }
        Ok(())
    }

    fn add_run_map(&mut self) {
        for (order, bits) in [(0, 8), (1, 5), (1, 7), (1, 8)] {
            let ctx = self.hash_context(order, bits);
            self.models.push(self.run_map_indirect(ctx, 200));
        }
    }

    fn add_match(&mut self) {
        let max_size = 20_000_000;
        for (order, bits) in [
            (0, 8),
            (1, 8),
            (2, 8),
            (7, 4),
            (11, 3),
            (13, 2),
            (15, 2),
            (17, 2),
            (20, 1),
            (25, 1),
        ] {
            let ctx = self.hash_context(order, bits);
            let size = ctx.size.min(max_size);
            self.models.push(self.match_model(ctx, size));
        }
    }

    fn add_double_indirect(&mut self) {
        for (near, offset, far, salt) in DOUBLE_INDIRECT_PARAMS {
            let window = Rc::clone(&self.manager.bytes);
            let ctx = self
                .manager
                .add_context(ContextKind::Indirect(IndirectHash::new(
                    window, near, offset, far, salt,
                )));
            self.models.push(self.nonstationary_indirect(ctx, 400));
        }
    }

    fn add_interval(&mut self) {
        let map = interval_map_text();
        for (order, bits) in [(2, 8), (4, 7), (8, 3), (12, 1), (16, 1)] {
            let window = Rc::clone(&self.manager.bytes);
            let ctx = self
                .manager
                .add_context(ContextKind::IntervalHash(IntervalHash::new(
                    window, map, order, bits,
                )));
            self.models.push(self.nonstationary_indirect(ctx, 400));
        }
    }

    // mixing layers -------------------------------------------------------

    fn add_mixers(&mut self) -> Result<(), PredictorError> {
        self.auxiliary
            .push(self.models.len() + self.byte_models.len());

        let input_size = self.num_models();
        let layer0 = MixerInput::new(input_size);
        let mut mixers0 = Vec::new();

        for (order, bits, lr) in [
            (0, 8, 0.005),
            (0, 8, 0.0005),
            (1, 8, 0.005),
            (1, 8, 0.0005),
            (2, 4, 0.005),
            (3, 2, 0.002),
        ] {
            let ctx = self.hash_context(order, bits);
            let fine = Rc::clone(&self.manager.long_bit_context);
            let gate = self
                .manager
                .add_bit_context(fine, Rc::clone(&ctx.value), ctx.size);
            mixers0.push(Mixer::new(
                Rc::clone(&layer0),
                Rc::clone(&gate.value),
                lr,
                gate.size,
                input_size,
            )?);
        }

        for (i, lr) in [(0, 0.001), (2, 0.002), (3, 0.005)] {
            mixers0.push(Mixer::new(
                Rc::clone(&layer0),
                Rc::clone(&self.manager.recent_bytes[i]),
                lr,
                256,
                input_size,
            )?);
        }
        mixers0.push(Mixer::new(
            Rc::clone(&layer0),
            Rc::clone(&self.manager.zero_context),
            0.000_05,
            1,
            input_size,
        )?);
        mixers0.push(Mixer::new(
            Rc::clone(&layer0),
            Rc::clone(&self.manager.line_break),
            0.0007,
            100,
            input_size,
        )?);
        mixers0.push(Mixer::new(
            Rc::clone(&layer0),
            Rc::clone(&self.manager.longest_match),
            0.0005,
            8,
            input_size,
        )?);

        let window = Rc::clone(&self.manager.bytes);
        let interval1 = self.manager.add_context(ContextKind::Interval(Interval::new(
            window,
            interval_map_coarse(),
        )));
        mixers0.push(Mixer::new(
            Rc::clone(&layer0),
            Rc::clone(&interval1.value),
            0.001,
            interval1.size,
            input_size,
        )?);
        let window = Rc::clone(&self.manager.bytes);
        let interval2 = self.manager.add_context(ContextKind::Interval(Interval::new(
            window,
            interval_map_text(),
        )));
        mixers0.push(Mixer::new(
            Rc::clone(&layer0),
            Rc::clone(&interval2.value),
            0.001,
            interval2.size,
            input_size,
        )?);

        let fine = Rc::clone(&self.manager.long_bit_context);
        let coarse = Rc::clone(&self.manager.recent_bytes[1]);
        let gate1 = self.manager.add_bit_context(fine, coarse, 256);
        mixers0.push(Mixer::new(
            Rc::clone(&layer0),
            Rc::clone(&gate1.value),
            0.005,
            gate1.size,
            input_size,
        )?);
        let fine = Rc::clone(&self.manager.recent_bytes[1]);
        let coarse = Rc::clone(&self.manager.recent_bytes[0]);
        let gate2 = self.manager.add_bit_context(fine, coarse, 256);
        mixers0.push(Mixer::new(
            Rc::clone(&layer0),
            Rc::clone(&gate2.value),
            0.005,
            gate2.size,
            input_size,
        )?);
        let fine = Rc::clone(&self.manager.recent_bytes[2]);
        let coarse = Rc::clone(&self.manager.recent_bytes[1]);
        let gate3 = self.manager.add_bit_context(fine, coarse, 256);
        mixers0.push(Mixer::new(
            Rc::clone(&layer0),
            Rc::clone(&gate3.value),
            0.003,
            gate3.size,
            input_size,
        )?);

        let input_size1 = mixers0.len() + self.auxiliary.len();
        let layer1 = MixerInput::new(input_size1);
        let mut mixers1 = Vec::new();
        for lr in [0.005, 0.0005] {
            mixers1.push(Mixer::new(
                Rc::clone(&layer1),
                Rc::clone(&self.manager.zero_context),
                lr,
                1,
                input_size1,
            )?);
        }
        for lr in [0.005, 0.0005, 0.000_01] {
            mixers1.push(Mixer::new(
                Rc::clone(&layer1),
                Rc::clone(&self.manager.long_bit_context),
                lr,
                256,
                input_size1,
            )?);
        }
        for i in 0..3 {
            mixers1.push(Mixer::new(
                Rc::clone(&layer1),
                Rc::clone(&self.manager.recent_bytes[i]),
                0.005,
                256,
                input_size1,
            )?);
        }
        mixers1.push(Mixer::new(
            Rc::clone(&layer1),
            Rc::clone(&self.manager.longest_match),
            0.0005,
            8,
            input_size1,
        )?);
        mixers1.push(Mixer::new(
            Rc::clone(&layer1),
            Rc::clone(&interval1.value),
            0.001,
            interval1.size,
            input_size1,
        )?);
        mixers1.push(Mixer::new(
            Rc::clone(&layer1),
            Rc::clone(&interval2.value),
            0.001,
            interval2.size,
            input_size1,
        )?);

        let input_size2 = mixers1.len() + self.auxiliary.len();
        let layer2 = MixerInput::new(input_size2);
        let mixers2 = vec![Mixer::new(
            Rc::clone(&layer2),
            Rc::clone(&self.manager.zero_context),
            0.0003,
            1,
            input_size2,
        )?];

        self.layers = vec![layer0, layer1, layer2];
        self.mixers = vec![mixers0, mixers1, mixers2];
        Ok(())
    }

    // statistics ----------------------------------------------------------

    pub fn num_models(&self) -> usize {
        self.models.len() + self.byte_models.len() + 1
    }

    pub fn num_neurons(&self) -> usize {
        let mut neurons = self.num_models();
        for layer in &self.mixers {
            for mixer in layer {
                neurons += mixer.num_neurons();
            }
        }
        neurons
    }

    pub fn num_connections(&self) -> usize {
        let mut connections = 0;
        for layer in &self.mixers {
            for mixer in layer {
                connections += mixer.num_connections();
            }
        }
        connections
    }

    // the per-bit schedule ------------------------------------------------

    /// Probability that the next bit of the stream is 1. Pure with
    /// respect to predictor state.
    pub fn predict(&mut self) -> f32 {
        let layer0 = Rc::clone(&self.layers[0]);
        let n_models = self.models.len();
        for (i, model) in self.models.iter_mut().enumerate() {
            let p = model.predict();
            debug_assert!(p.is_finite() && (0.0..=1.0).contains(&p));
            layer0.borrow_mut().set_input(i, p);
        }
        for (i, model) in self.byte_models.iter_mut().enumerate() {
            layer0.borrow_mut().set_input(n_models + i, model.predict());
        }
        self.byte_mixer_p = self.byte_mixer.predict();
        layer0
            .borrow_mut()
            .set_input(n_models + self.byte_models.len(), self.byte_mixer_p);

        for layer in 1..3 {
            let n_prev = self.mixers[layer - 1].len();
            for i in 0..n_prev {
                let s = self.mixers[layer - 1][i].mix();
                self.layers[layer].borrow_mut().set_stretched_input(i, s);
            }
            for (j, &aux) in self.auxiliary.iter().enumerate() {
                let s = self.layers[0].borrow().stretched(aux);
                self.layers[layer]
                    .borrow_mut()
                    .set_stretched_input(n_prev + j, s);
            }
        }

        let p = squash(self.mixers[2][0].mix());
        let p = self.sse.process(p);
        if self.byte_mixer_p == 0.0 || self.byte_mixer_p == 1.0 {
            return self.byte_mixer_p;
        }
        p
    }

    /// Consume the observed bit: update every model, mixer and the
    /// estimator, then advance the shared context state. Completing a
    /// byte triggers the byte-level rollover.
    pub fn perceive(&mut self, bit: u8) {
        debug_assert!(bit < 2);
        for model in &mut self.models {
            model.perceive(bit);
        }
        for model in &mut self.byte_models {
            model.perceive(bit);
        }
        self.byte_mixer.perceive(bit);
        for layer in &mut self.mixers {
            for mixer in layer {
                mixer.perceive(bit);
            }
        }
        self.sse.perceive(bit);

        let byte_done = self.manager.perceive(bit);
        if byte_done {
            for model in &mut self.models {
                model.byte_update();
            }
            for model in &mut self.byte_models {
                model.byte_update();
            }
            for (i, model) in self.byte_models.iter().enumerate() {
                self.byte_mixer.set_input(i, model.byte_predict());
            }
            self.byte_mixer.byte_update();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_byte(p: &mut Predictor, byte: u8) {
        for i in (0..8).rev() {
            let bit = (byte >> i) & 1;
            let pr = p.predict();
            assert!(pr.is_finite() && (0.0..=1.0).contains(&pr));
            p.perceive(bit);
        }
    }

    #[test]
    fn roster_is_stable() {
        let p = Predictor::new([true; 256]).unwrap();
        // bracket group 3, two ensembles of 1 + 6 facades, dmc 1,
        // byte runs 4, nonstationary 6, english 32, sparse 32, direct 4,
        // run map 4, match 10, double indirect 11, interval 5,
        // plus two ppm, the frequency model and the byte mixer slot
        assert_eq!(p.num_models(), 130);
        assert_eq!(p.auxiliary.len(), 3);
        assert_eq!(p.mixers[0].len(), 17);
        assert_eq!(p.mixers[1].len(), 11);
        assert_eq!(p.mixers[2].len(), 1);
    }

    #[test]
    fn empty_vocabulary_is_fatal() {
        assert!(Predictor::new([false; 256]).is_err());
    }

    #[test]
    fn auxiliary_slots_pass_through() {
        let mut p = Predictor::new([true; 256]).unwrap();
        for &b in b"auxiliary " {
            feed_byte(&mut p, b);
        }
        p.predict();
        let n1 = p.mixers[0].len();
        let n2 = p.mixers[1].len();
        for (j, &aux) in p.auxiliary.iter().enumerate() {
            let origin = p.layers[0].borrow().stretched(aux);
            assert_eq!(p.layers[1].borrow().stretched(n1 + j), origin);
            assert_eq!(p.layers[2].borrow().stretched(n2 + j), origin);
        }
    }
}
