//! Zweep Benchmark Library
//!
//! Provides workload generation shared by the join, curve and sweep-area
//! benchmarks.

pub mod data_gen;
