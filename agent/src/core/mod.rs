//! Deterministic, pure logic shared by the tools and the loop.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data and return deterministic outputs suitable for tests.

pub mod error;
pub mod path;
pub mod report;
pub mod types;
