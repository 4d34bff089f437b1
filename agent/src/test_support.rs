//! Test-only helpers: scripted models and throwaway working roots.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use tempfile::TempDir;

use crate::core::types::{ActionRequest, ModelReply};
use crate::io::actions::{ActionContext, Dispatcher};
use crate::io::files::DEFAULT_READ_LIMIT_CHARS;
use crate::io::model::{Model, ModelRequest};
use crate::io::process::{DEFAULT_OUTPUT_LIMIT_BYTES, ScriptPolicy};
use crate::io::workspace::WorkingRoot;

/// Shorthand for an [`ActionRequest`] built from a JSON object literal.
pub fn action(name: &str, arguments: Value) -> ActionRequest {
    ActionRequest::new(name, arguments)
}

/// Model that replays a fixed script of replies.
///
/// Each call records the transcript length it was shown. Once the script
/// runs out, calls fail unless the model was built with [`ScriptedModel::repeating`].
pub struct ScriptedModel {
    replies: RefCell<VecDeque<ModelReply>>,
    repeat: Option<ModelReply>,
    transcript_lengths: RefCell<Vec<usize>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<ModelReply>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            repeat: None,
            transcript_lengths: RefCell::new(Vec::new()),
        }
    }

    /// Answer every request with `reply`, forever.
    pub fn repeating(reply: ModelReply) -> Self {
        Self {
            repeat: Some(reply),
            ..Self::new(Vec::new())
        }
    }

    pub fn transcript_lengths(&self) -> Vec<usize> {
        self.transcript_lengths.borrow().clone()
    }

    pub fn calls(&self) -> usize {
        self.transcript_lengths.borrow().len()
    }
}

impl Model for ScriptedModel {
    fn respond(&self, request: &ModelRequest<'_>) -> Result<ModelReply> {
        self.transcript_lengths
            .borrow_mut()
            .push(request.transcript.len());
        if let Some(reply) = self.replies.borrow_mut().pop_front() {
            return Ok(reply);
        }
        self.repeat
            .clone()
            .ok_or_else(|| anyhow!("scripted model has no more replies"))
    }
}

/// A temporary working root. Scripts run through `sh` with a `.sh` extension.
pub struct TestRoot {
    temp: TempDir,
    root: WorkingRoot,
}

impl TestRoot {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("create temp root")?;
        let root = WorkingRoot::open(temp.path())?;
        Ok(Self { temp, root })
    }

    /// Canonical path of the root.
    pub fn path(&self) -> &Path {
        self.root.path()
    }

    /// The temp directory holding the root; siblings of the root live here too.
    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }

    /// Write `contents` to `relative`, creating parent directories.
    pub fn write(&self, relative: &str, contents: &str) -> Result<()> {
        let path = self.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }

    pub fn read(&self, relative: &str) -> Result<String> {
        let path = self.path().join(relative);
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))
    }

    pub fn context(&self) -> ActionContext {
        ActionContext {
            root: self.root.clone(),
            read_limit_chars: DEFAULT_READ_LIMIT_CHARS,
            script: sh_policy(Duration::from_secs(5)),
        }
    }

    pub fn dispatcher(&self) -> Dispatcher {
        self.dispatcher_with(self.context())
    }

    pub fn dispatcher_with(&self, context: ActionContext) -> Dispatcher {
        match Dispatcher::new(context) {
            Ok(dispatcher) => dispatcher,
            Err(err) => panic!("action schemas must compile: {err:#}"),
        }
    }
}

/// Script policy that runs `.sh` files through `sh`.
pub fn sh_policy(timeout: Duration) -> ScriptPolicy {
    ScriptPolicy {
        interpreter: "sh".to_string(),
        extension: "sh".to_string(),
        timeout,
        output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
    }
}
