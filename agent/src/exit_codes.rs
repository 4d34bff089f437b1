//! Stable exit codes for the agent CLI.

/// The model produced a final answer.
pub const OK: i32 = 0;
/// Bad arguments, config or working root, or a model/transport failure.
pub const INVALID: i32 = 1;
/// The action budget ran out before the model answered.
pub const EXHAUSTED: i32 = 2;
