//! Confined coding agent CLI.
//!
//! Sends the prompt to the configured model and lets it inspect, edit and run
//! files inside the working root until it answers.

use std::env;
use std::path::PathBuf;
use std::process;

use agent::core::types::Usage;
use agent::exit_codes;
use agent::io::actions::{ActionContext, Dispatcher};
use agent::io::config::{AgentConfig, DEFAULT_CONFIG_PATH, load_config};
use agent::io::gemini::GeminiModel;
use agent::io::prompt::render_system_instruction;
use agent::io::workspace::WorkingRoot;
use agent::logging;
use agent::looping::{LoopConfig, LoopEvent, LoopStop, run_loop};
use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(
    name = "agent",
    version,
    about = "Tool-using coding agent confined to one working directory"
)]
struct Cli {
    /// Print the prompt, every action with its result, and token usage.
    #[arg(long)]
    verbose: bool,

    /// Config file (missing file means defaults).
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// What to ask the agent. Multiple words are joined with spaces.
    #[arg(required = true, num_args = 1.., value_name = "PROMPT")]
    prompt: Vec<String>,
}

impl Cli {
    fn prompt_text(&self) -> Result<String> {
        let prompt = self.prompt.join(" ");
        if prompt.trim().is_empty() {
            bail!("prompt must not be empty");
        }
        Ok(prompt)
    }
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    match run(&cli) {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("Error: {err:#}");
            process::exit(exit_codes::INVALID);
        }
    }
}

fn run(cli: &Cli) -> Result<i32> {
    let prompt = cli.prompt_text()?;
    let config = load_config(&cli.config)?;
    if let Err(err) = dotenvy::dotenv() {
        debug!(error = %err, "no .env loaded");
    }
    let api_key = env::var(&config.model.api_key_env)
        .with_context(|| format!("read API key from ${}", config.model.api_key_env))?;

    let dispatcher = build_dispatcher(&config)?;
    let system_instruction =
        render_system_instruction(&dispatcher.catalog(), config.max_iterations)?;
    let model = GeminiModel::new(&config.model, api_key)?;
    let loop_config = LoopConfig {
        max_iterations: config.max_iterations,
        system_instruction,
    };

    if cli.verbose {
        println!("User prompt: {prompt}");
    }
    let outcome = run_loop(&model, &dispatcher, &loop_config, &prompt, |event| {
        report_event(event, cli.verbose);
    })?;

    if cli.verbose {
        print_usage(&outcome.usage);
    }
    match outcome.stop {
        LoopStop::Answered { text } => {
            println!("Final response:");
            println!("{text}");
            Ok(exit_codes::OK)
        }
        LoopStop::BudgetExhausted { max_iterations } => {
            eprintln!(
                "Stopped after {max_iterations} actions without a final response from the model."
            );
            Ok(exit_codes::EXHAUSTED)
        }
    }
}

fn build_dispatcher(config: &AgentConfig) -> Result<Dispatcher> {
    let root = WorkingRoot::open(&config.working_root)
        .with_context(|| format!("open working root {}", config.working_root.display()))?;
    Dispatcher::new(ActionContext {
        root,
        read_limit_chars: config.tools.read_limit_chars,
        script: config.script_policy(),
    })
}

fn report_event(event: LoopEvent<'_>, verbose: bool) {
    match event {
        LoopEvent::ActionRequested { request, .. } if verbose => {
            println!(
                "Calling function: {}({})",
                request.name,
                serde_json::Value::Object(request.arguments.clone())
            );
        }
        LoopEvent::ActionRequested { request, .. } => {
            println!(" - Calling function: {}", request.name);
        }
        LoopEvent::ActionCompleted { result, .. } if verbose => {
            println!("-> {}", result.payload);
        }
        LoopEvent::ActionCompleted { .. } => {}
    }
}

fn print_usage(usage: &Usage) {
    println!("Prompt tokens: {}", usage.prompt_tokens);
    println!("Response tokens: {}", usage.response_tokens);
}
