//! The closed catalog of actions the model may request, and the dispatcher
//! that runs them against the fixed working root.
//!
//! Every failure is folded into the returned [`ActionResult`]; `dispatch`
//! never returns an error to the loop.

use anyhow::{Result, anyhow};
use jsonschema::{Validator, validator_for};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::{debug, info, instrument, warn};

use crate::core::error::{ActionError, ActionOutcome};
use crate::core::types::{ActionRequest, ActionResult};
use crate::io::files::{list_directory, read_file, write_file};
use crate::io::process::{ScriptPolicy, run_script};
use crate::io::workspace::WorkingRoot;

/// Argument keys a caller might use to pick its own root. Always discarded.
const ROOT_ARGUMENT_KEYS: &[&str] = &["working_directory", "working_dir", "workdir", "root", "cwd"];

/// Everything an action needs besides its own arguments.
#[derive(Debug, Clone)]
pub struct ActionContext {
    pub root: WorkingRoot,
    pub read_limit_chars: usize,
    pub script: ScriptPolicy,
}

/// Name, description and parameter schema advertised to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ListDirectory,
    ReadFile,
    RunScript,
    WriteFile,
}

#[derive(Debug, Deserialize)]
struct ListDirectoryArgs {
    #[serde(default)]
    directory: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReadFileArgs {
    file_path: String,
}

#[derive(Debug, Deserialize)]
struct RunScriptArgs {
    file_path: String,
    #[serde(default)]
    args: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct WriteFileArgs {
    file_path: String,
    content: String,
}

impl Action {
    pub const ALL: [Action; 4] = [
        Action::ListDirectory,
        Action::ReadFile,
        Action::RunScript,
        Action::WriteFile,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Action::ListDirectory => "list_directory",
            Action::ReadFile => "read_file",
            Action::RunScript => "run_script",
            Action::WriteFile => "write_file",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.name() == name)
    }

    pub fn description(self) -> &'static str {
        match self {
            Action::ListDirectory => {
                "Lists files in the specified directory along with their sizes, constrained to the working directory."
            }
            Action::ReadFile => {
                "Reads the content of a file, constrained to the working directory. Long files are truncated."
            }
            Action::RunScript => {
                "Runs a script file with optional arguments, constrained to the working directory, and returns its output."
            }
            Action::WriteFile => {
                "Writes content to a file, creating missing parent directories and overwriting existing content."
            }
        }
    }

    /// JSON Schema of the arguments object.
    pub fn parameters(self) -> Value {
        match self {
            Action::ListDirectory => json!({
                "type": "object",
                "properties": {
                    "directory": {
                        "type": "string",
                        "description": "The directory to list, relative to the working directory. Defaults to the working directory itself."
                    }
                }
            }),
            Action::ReadFile => json!({
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "description": "Path to the file to read, relative to the working directory."
                    }
                },
                "required": ["file_path"]
            }),
            Action::RunScript => json!({
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "description": "Path to the script to execute, relative to the working directory."
                    },
                    "args": {
                        "type": "array",
                        "description": "Optional arguments passed to the script.",
                        "items": { "type": "string" }
                    }
                },
                "required": ["file_path"]
            }),
            Action::WriteFile => json!({
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "description": "Path to the file to write, relative to the working directory."
                    },
                    "content": {
                        "type": "string",
                        "description": "The content to write to the file."
                    }
                },
                "required": ["file_path", "content"]
            }),
        }
    }

    pub fn spec(self) -> ActionSpec {
        ActionSpec {
            name: self.name(),
            description: self.description(),
            parameters: self.parameters(),
        }
    }

    /// Run the action. `arguments` must already be free of root overrides.
    pub fn invoke(self, arguments: Map<String, Value>, context: &ActionContext) -> ActionOutcome {
        match self {
            Action::ListDirectory => {
                let args: ListDirectoryArgs = parse_arguments(self, arguments)?;
                let directory = args.directory.unwrap_or_else(|| ".".to_string());
                list_directory(&context.root, &directory)
            }
            Action::ReadFile => {
                let args: ReadFileArgs = parse_arguments(self, arguments)?;
                read_file(&context.root, &args.file_path, context.read_limit_chars)
            }
            Action::RunScript => {
                let args: RunScriptArgs = parse_arguments(self, arguments)?;
                run_script(&context.root, &context.script, &args.file_path, &args.args)
            }
            Action::WriteFile => {
                let args: WriteFileArgs = parse_arguments(self, arguments)?;
                write_file(&context.root, &args.file_path, &args.content)
            }
        }
    }
}

fn parse_arguments<T: DeserializeOwned>(
    action: Action,
    arguments: Map<String, Value>,
) -> Result<T, ActionError> {
    serde_json::from_value(Value::Object(arguments)).map_err(|err| ActionError::InvalidArguments {
        name: action.name().to_string(),
        detail: err.to_string(),
    })
}

/// Routes action requests to their implementation.
pub struct Dispatcher {
    context: ActionContext,
    /// Compiled argument schemas, indexed by `Action as usize`.
    validators: [Validator; Action::ALL.len()],
}

impl Dispatcher {
    pub fn new(context: ActionContext) -> Result<Self> {
        let compile = |action: Action| {
            validator_for(&action.parameters())
                .map_err(|err| anyhow!("invalid schema for {}: {}", action.name(), err))
        };
        let validators = [
            compile(Action::ListDirectory)?,
            compile(Action::ReadFile)?,
            compile(Action::RunScript)?,
            compile(Action::WriteFile)?,
        ];
        Ok(Self {
            context,
            validators,
        })
    }

    pub fn context(&self) -> &ActionContext {
        &self.context
    }

    /// Specs for every action, in catalog order.
    pub fn catalog(&self) -> Vec<ActionSpec> {
        Action::ALL.into_iter().map(Action::spec).collect()
    }

    /// Run one request and describe the outcome as text.
    #[instrument(skip_all, fields(action = %request.name))]
    pub fn dispatch(&self, request: &ActionRequest) -> ActionResult {
        let outcome = self.try_dispatch(request);
        match outcome {
            Ok(payload) => {
                debug!(bytes = payload.len(), "action succeeded");
                ActionResult {
                    name: request.name.clone(),
                    payload,
                    is_error: false,
                }
            }
            Err(err) => {
                info!(kind = ?err.kind(), error = %err, "action failed");
                ActionResult {
                    name: request.name.clone(),
                    payload: err.render(),
                    is_error: true,
                }
            }
        }
    }

    fn try_dispatch(&self, request: &ActionRequest) -> ActionOutcome {
        let action = Action::from_name(&request.name).ok_or_else(|| ActionError::UnknownAction {
            name: request.name.clone(),
        })?;
        let arguments = strip_root_overrides(request.arguments.clone());
        self.validate(action, &arguments)?;
        action.invoke(arguments, &self.context)
    }

    fn validate(&self, action: Action, arguments: &Map<String, Value>) -> Result<(), ActionError> {
        let validator = &self.validators[action as usize];
        let instance = Value::Object(arguments.clone());
        let messages = validator
            .iter_errors(&instance)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        if messages.is_empty() {
            return Ok(());
        }
        Err(ActionError::InvalidArguments {
            name: action.name().to_string(),
            detail: messages.join("; "),
        })
    }
}

/// Drop any argument that would let the caller choose its own root.
///
/// The root always comes from [`ActionContext`].
fn strip_root_overrides(mut arguments: Map<String, Value>) -> Map<String, Value> {
    for key in ROOT_ARGUMENT_KEYS {
        if let Some(value) = arguments.remove(*key) {
            warn!(key, %value, "ignoring caller-supplied root argument");
        }
    }
    arguments
}
