//! Model abstraction for the agent loop.
//!
//! The [`Model`] trait decouples the loop from the actual language-model
//! transport (currently Gemini). Tests use scripted models that return
//! predetermined replies without any network access.

use anyhow::Result;

use crate::core::types::{ModelReply, Transcript};
use crate::io::actions::ActionSpec;

/// Everything sent to the model for one round.
#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    pub system_instruction: &'a str,
    pub transcript: &'a Transcript,
    pub actions: &'a [ActionSpec],
}

/// Abstraction over language-model backends.
pub trait Model {
    /// Produce the next agent turn. An `Err` aborts the loop.
    fn respond(&self, request: &ModelRequest<'_>) -> Result<ModelReply>;
}

impl<M: Model + ?Sized> Model for &M {
    fn respond(&self, request: &ModelRequest<'_>) -> Result<ModelReply> {
        (**self).respond(request)
    }
}

impl<M: Model + ?Sized> Model for Box<M> {
    fn respond(&self, request: &ModelRequest<'_>) -> Result<ModelReply> {
        (**self).respond(request)
    }
}
