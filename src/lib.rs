//! Prediction core of a context-mixing text compressor. At every
//! position the predictor emits a probability that the next bit of the
//! stream is 1; an external arithmetic coder turns that probability into
//! the compressed stream and feeds the observed bit back through
//! `perceive`. Compression and decompression run the same predictor in
//! lockstep, so everything here is bit-exact deterministic: the model
//! roster, registration order and parameters are the format.

mod byte_model;
mod contexts;
mod error;
mod hash_map;
mod history;
mod logistic;
mod manager;
mod mixer;
mod models;
mod predictor;
mod shared_map;
mod sse;
mod state_table;

pub use crate::{error::PredictorError, predictor::Predictor};

/// Ceiling on the cell count of any single model table. The roster's
/// nominal sizes are capped here; the cap is itself part of the format.
pub(crate) const MEM_CAP: u64 = 1 << 19;
