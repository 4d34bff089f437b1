//! A tool-using coding agent confined to one working directory.
//!
//! A language model is asked, round after round, what to do next. It either
//! answers with text, which ends the run, or requests one of four actions
//! (list a directory, read a file, write a file, run a script). Every action
//! is resolved against a fixed working root and its outcome, success or
//! failure, is fed back to the model as text.
//!
//! - **[`core`]**: Pure data and formatting: transcript types, action errors,
//!   path normalization and result text.
//! - **[`io`]**: Filesystem, child processes, config and the model transport.
//!
//! [`looping`] ties the two together.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod looping;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
