//! The bounded request/dispatch loop between the model and the tools.

use anyhow::{Context, Result, bail};
use tracing::{debug, info, instrument, warn};

use crate::core::types::{ActionRequest, ActionResult, ModelReply, Transcript, Turn, Usage};
use crate::io::actions::Dispatcher;
use crate::io::model::{Model, ModelRequest};

pub const DEFAULT_MAX_ITERATIONS: u32 = 20;

/// Settings for one loop invocation.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Actions dispatched before the loop stops asking the model.
    pub max_iterations: u32,
    pub system_instruction: String,
}

/// Reason why `run_loop` stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopStop {
    /// The model produced final text.
    Answered { text: String },
    /// `max_iterations` actions ran without the model producing final text.
    BudgetExhausted { max_iterations: u32 },
}

/// Summary of a loop invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopOutcome {
    pub transcript: Transcript,
    /// Model requests made.
    pub rounds: u32,
    pub actions_dispatched: u32,
    /// Token usage summed over all rounds.
    pub usage: Usage,
    pub stop: LoopStop,
}

impl LoopOutcome {
    pub fn answer(&self) -> Option<&str> {
        match &self.stop {
            LoopStop::Answered { text } => Some(text),
            LoopStop::BudgetExhausted { .. } => None,
        }
    }
}

/// Progress notifications for callers that report to a console.
#[derive(Debug, Clone, Copy)]
pub enum LoopEvent<'a> {
    ActionRequested {
        round: u32,
        request: &'a ActionRequest,
    },
    ActionCompleted {
        round: u32,
        result: &'a ActionResult,
    },
}

enum LoopState {
    Requesting,
    Dispatching(ActionRequest),
    Terminated(LoopStop),
}

/// Drive the conversation until the model answers or the action budget runs out.
///
/// Only the first action of a reply is dispatched; any others in the same
/// reply are logged and skipped. Tool failures come back to the model as
/// text. Model errors and replies with neither text nor actions abort the
/// loop with an error.
#[instrument(skip_all, fields(max_iterations = config.max_iterations))]
pub fn run_loop<M: Model, F: FnMut(LoopEvent<'_>)>(
    model: &M,
    dispatcher: &Dispatcher,
    config: &LoopConfig,
    prompt: &str,
    mut on_event: F,
) -> Result<LoopOutcome> {
    let catalog = dispatcher.catalog();
    let mut transcript = Transcript::seeded(prompt);
    let mut usage = Usage::default();
    let mut rounds = 0u32;
    let mut actions_dispatched = 0u32;
    let mut state = LoopState::Requesting;

    let stop = loop {
        state = match state {
            LoopState::Requesting => {
                rounds += 1;
                let reply = model
                    .respond(&ModelRequest {
                        system_instruction: &config.system_instruction,
                        transcript: &transcript,
                        actions: &catalog,
                    })
                    .with_context(|| format!("model request failed in round {rounds}"))?;
                usage.add(reply.usage);
                let next = next_state(&reply, rounds)?;
                transcript.push(Turn::Agent {
                    text: reply.text,
                    actions: reply.actions,
                });
                next
            }
            LoopState::Dispatching(request) => {
                on_event(LoopEvent::ActionRequested {
                    round: rounds,
                    request: &request,
                });
                let result = dispatcher.dispatch(&request);
                on_event(LoopEvent::ActionCompleted {
                    round: rounds,
                    result: &result,
                });
                transcript.push(Turn::Tool { result });
                actions_dispatched += 1;

                if actions_dispatched >= config.max_iterations {
                    warn!(
                        max_iterations = config.max_iterations,
                        "action budget exhausted without a final answer"
                    );
                    LoopState::Terminated(LoopStop::BudgetExhausted {
                        max_iterations: config.max_iterations,
                    })
                } else {
                    LoopState::Requesting
                }
            }
            LoopState::Terminated(stop) => break stop,
        };
    };

    info!(rounds, actions_dispatched, stop = ?stop, "loop finished");
    Ok(LoopOutcome {
        transcript,
        rounds,
        actions_dispatched,
        usage,
        stop,
    })
}

fn next_state(reply: &ModelReply, round: u32) -> Result<LoopState> {
    if let Some((first, ignored)) = reply.actions.split_first() {
        if !ignored.is_empty() {
            warn!(
                round,
                dispatched = %first.name,
                ignored = ?ignored.iter().map(|a| a.name.as_str()).collect::<Vec<_>>(),
                "model requested several actions; only the first runs"
            );
        }
        debug!(round, action = %first.name, "model requested action");
        return Ok(LoopState::Dispatching(first.clone()));
    }
    if let Some(text) = reply.final_text() {
        return Ok(LoopState::Terminated(LoopStop::Answered {
            text: text.to_string(),
        }));
    }
    bail!("model reply in round {round} carried neither an action request nor text")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Role;
    use crate::test_support::{ScriptedModel, TestRoot, action};
    use serde_json::json;

    fn config(max_iterations: u32) -> LoopConfig {
        LoopConfig {
            max_iterations,
            system_instruction: "system".to_string(),
        }
    }

    #[test]
    fn one_action_then_answer_takes_two_rounds() {
        let root = TestRoot::new().expect("root");
        root.write("main.py", "print(1)\n").expect("write");
        let model = ScriptedModel::new(vec![
            ModelReply::action(action("read_file", json!({"file_path": "main.py"}))),
            ModelReply::text("It prints 1."),
        ]);

        let outcome = run_loop(
            &model,
            &root.dispatcher(),
            &config(DEFAULT_MAX_ITERATIONS),
            "what does main.py print?",
            |_| {},
        )
        .expect("loop");

        assert_eq!(outcome.rounds, 2);
        assert_eq!(outcome.actions_dispatched, 1);
        assert_eq!(outcome.answer(), Some("It prints 1."));
        assert_eq!(
            outcome.transcript.roles(),
            vec![Role::User, Role::Agent, Role::Tool, Role::Agent]
        );
        let Turn::Tool { result } = &outcome.transcript.turns()[2] else {
            panic!("expected tool turn");
        };
        assert_eq!(result.payload, "print(1)\n");
        assert_eq!(model.transcript_lengths(), vec![1, 3]);
    }

    #[test]
    fn never_answering_model_exhausts_the_budget() {
        let root = TestRoot::new().expect("root");
        let model = ScriptedModel::repeating(ModelReply::action(action(
            "list_directory",
            json!({}),
        )));

        let outcome =
            run_loop(&model, &root.dispatcher(), &config(20), "loop forever", |_| {})
                .expect("loop");

        assert_eq!(outcome.rounds, 20);
        assert_eq!(outcome.actions_dispatched, 20);
        assert_eq!(outcome.answer(), None);
        assert_eq!(
            outcome.stop,
            LoopStop::BudgetExhausted { max_iterations: 20 }
        );
        assert_eq!(outcome.transcript.len(), 41);
    }

    #[test]
    fn only_the_first_of_several_actions_runs() {
        let root = TestRoot::new().expect("root");
        let model = ScriptedModel::new(vec![
            ModelReply {
                actions: vec![
                    action("write_file", json!({"file_path": "a.txt", "content": "a"})),
                    action("write_file", json!({"file_path": "b.txt", "content": "b"})),
                ],
                ..ModelReply::default()
            },
            ModelReply::text("done"),
        ]);

        let mut requested = Vec::new();
        let outcome = run_loop(&model, &root.dispatcher(), &config(5), "write", |event| {
            if let LoopEvent::ActionRequested { request, .. } = event {
                requested.push(request.arguments["file_path"].clone());
            }
        })
        .expect("loop");

        assert_eq!(outcome.actions_dispatched, 1);
        assert_eq!(requested, vec![json!("a.txt")]);
        assert!(root.path().join("a.txt").exists());
        assert!(!root.path().join("b.txt").exists());
        let Turn::Agent { actions, .. } = &outcome.transcript.turns()[1] else {
            panic!("expected agent turn");
        };
        assert_eq!(actions.len(), 2);
    }

    #[test]
    fn tool_failures_are_fed_back_not_raised() {
        let root = TestRoot::new().expect("root");
        let model = ScriptedModel::new(vec![
            ModelReply::action(action("read_file", json!({"file_path": "../etc/passwd"}))),
            ModelReply::action(action("format_disk", json!({}))),
            ModelReply::text("gave up"),
        ]);

        let outcome = run_loop(&model, &root.dispatcher(), &config(5), "read", |_| {})
            .expect("loop");

        let payloads: Vec<&str> = outcome
            .transcript
            .turns()
            .iter()
            .filter_map(|turn| match turn {
                Turn::Tool { result } => Some(result.payload.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            payloads,
            vec![
                "Error: Cannot read \"../etc/passwd\" as it is outside the permitted working directory",
                "Error: Unknown action: format_disk",
            ]
        );
        assert_eq!(outcome.answer(), Some("gave up"));
    }

    #[test]
    fn empty_reply_aborts_the_loop() {
        let root = TestRoot::new().expect("root");
        let model = ScriptedModel::new(vec![ModelReply::text("   ")]);
        let err = run_loop(&model, &root.dispatcher(), &config(5), "hi", |_| {}).unwrap_err();
        assert!(err.to_string().contains("neither an action request nor text"));
    }

    #[test]
    fn model_errors_abort_the_loop() {
        let root = TestRoot::new().expect("root");
        let model = ScriptedModel::new(Vec::new());
        let err = run_loop(&model, &root.dispatcher(), &config(5), "hi", |_| {}).unwrap_err();
        assert!(err.to_string().contains("round 1"));
    }

    #[test]
    fn usage_is_summed_across_rounds() {
        let root = TestRoot::new().expect("root");
        let mut first = ModelReply::action(action("list_directory", json!({})));
        first.usage = Usage {
            prompt_tokens: 100,
            response_tokens: 5,
        };
        let mut second = ModelReply::text("ok");
        second.usage = Usage {
            prompt_tokens: 150,
            response_tokens: 7,
        };
        let model = ScriptedModel::new(vec![first, second]);

        let outcome = run_loop(&model, &root.dispatcher(), &config(5), "hi", |_| {})
            .expect("loop");
        assert_eq!(
            outcome.usage,
            Usage {
                prompt_tokens: 250,
                response_tokens: 12
            }
        );
    }
}
