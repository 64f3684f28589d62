use crate::{
    logistic::{squash, stretch, MIN_PROB},
    manager::SharedCell,
};

// SSE -------------------------------------------------------------------------------------------------------------------------------- SSE

/// Interpolation points per context across the stretched domain.
const BINS: usize = 33;
const COUNT_CAP: u16 = 1023;
const LIMIT: f32 = 128.0;

/// Secondary symbol estimation: the mixed probability is stretched,
/// quantised onto 33 bins gated by the byte-position accumulator, and
/// replaced by an interpolated, adaptively trained estimate. The refined
/// value is blended 3:1 with the incoming one.
pub struct Sse {
    ctx: SharedCell,
    bins: Vec<f32>,
    n: Vec<u16>,
    cur: usize,
    weight: f32,
}

impl Sse {
    pub fn new(ctx: SharedCell) -> Sse {
        let mut bins = Vec::with_capacity(256 * BINS);
        for _ in 0..256 {
            for i in 0..BINS {
                bins.push(squash((i as f32 - 16.0) * 0.5));
            }
        }
        Sse {
            ctx,
            n: vec![0; bins.len()],
            bins,
            cur: 0,
            weight: 0.0,
        }
    }

    pub fn process(&mut self, p: f32) -> f32 {
        let s = stretch(p.clamp(MIN_PROB, 1.0 - MIN_PROB));
        let x = (s * 2.0 + 16.0).clamp(0.0, (BINS - 2) as f32 + 0.999);
        let i = x as usize;
        self.weight = x - i as f32;
        self.cur = self.ctx.get() as usize * BINS + i;
        let refined =
            self.bins[self.cur] * (1.0 - self.weight) + self.bins[self.cur + 1] * self.weight;
        (p + 3.0 * refined) / 4.0
    }

    pub fn perceive(&mut self, bit: u8) {
        for j in [self.cur, self.cur + 1] {
            if self.n[j] < COUNT_CAP {
                self.n[j] += 1;
            }
            let rate = (self.n[j] as f32 + 1.5).min(LIMIT);
            self.bins[j] += (bit as f32 - self.bins[j]) / rate;
        }
    }
}
