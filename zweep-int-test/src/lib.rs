//! Shared helpers for the zweep integration tests.

pub mod test_util;
