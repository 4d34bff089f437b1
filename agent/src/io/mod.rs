//! Side-effecting operations: filesystem, child processes, config and the
//! model transport.

pub mod actions;
pub mod config;
pub mod files;
pub mod gemini;
pub mod model;
pub mod process;
pub mod prompt;
pub mod workspace;
