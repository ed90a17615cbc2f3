//! Benchmarks for synthesis primitives.

mod channel;
mod envelope;

pub use channel::bench_channel;
pub use envelope::bench_envelope;
