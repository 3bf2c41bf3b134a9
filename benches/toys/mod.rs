//! Benchmarks for the toys as the front end drives them.

mod held;

pub use held::{bench_churn, bench_held};
