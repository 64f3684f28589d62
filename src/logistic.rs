use std::sync::OnceLock;

// Logistic Functions

/// Resolution of the stretch lookup table.
const TABLE_SIZE: usize = 10_000;

/// Largest magnitude representable in the stretch table,
/// ln((1 - 1/10000)/(1/10000)).
pub const MAX_STRETCH: f32 = 9.2102404;

/// Smallest probability accepted by a mixer layer. Model outputs are
/// clamped into [MIN_PROB, 1 - MIN_PROB] before stretching.
pub const MIN_PROB: f32 = 1.0e-4;

/// Returns p = 1/(1 + exp(-x)) (inverse of stretch).
pub fn squash(x: f32) -> f32 {
    let x = x.clamp(-MAX_STRETCH, MAX_STRETCH);
    1.0 / (1.0 + (-x).exp())
}

/// Returns ln(p/(1-p)) (inverse of squash), looked up at fixed resolution.
/// Inputs outside (0,1) saturate to the table ends.
pub fn stretch(p: f32) -> f32 {
    let t = stretch_table();
    let i = (p * TABLE_SIZE as f32) as isize;
    t[i.clamp(1, TABLE_SIZE as isize - 1) as usize]
}

fn stretch_table() -> &'static [f32] {
    static TABLE: OnceLock<Vec<f32>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut t = vec![0.0; TABLE_SIZE];
        for (i, v) in t.iter_mut().enumerate().skip(1) {
            let p = i as f32 / TABLE_SIZE as f32;
            *v = (p / (1.0 - p)).ln();
        }
        t[0] = -MAX_STRETCH;
        t
    })
}
