//! System instruction rendering.

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use serde::Serialize;

use crate::io::actions::ActionSpec;

const SYSTEM_TEMPLATE: &str = include_str!("prompts/system.md");

#[derive(Debug, Serialize)]
struct ActionLine<'a> {
    name: &'a str,
    description: &'a str,
}

/// Render the system instruction advertising `actions`.
pub fn render_system_instruction(actions: &[ActionSpec], max_iterations: u32) -> Result<String> {
    let mut env = Environment::new();
    env.add_template("system", SYSTEM_TEMPLATE)
        .context("load system template")?;
    let template = env.get_template("system").context("get system template")?;
    let lines: Vec<ActionLine<'_>> = actions
        .iter()
        .map(|spec| ActionLine {
            name: spec.name,
            description: spec.description,
        })
        .collect();
    let rendered = template
        .render(context! {
            actions => lines,
            max_iterations => max_iterations,
        })
        .context("render system template")?;
    Ok(rendered.trim().to_string())
}
