//! End-to-end loop runs against a temp working root with a scripted model.

use agent::core::types::{ModelReply, Role, Turn};
use agent::looping::{LoopConfig, LoopStop, run_loop};
use agent::test_support::{ScriptedModel, TestRoot, action};
use serde_json::json;

fn loop_config() -> LoopConfig {
    LoopConfig {
        max_iterations: 20,
        system_instruction: "You are a helpful coding agent.".to_string(),
    }
}

fn tool_payloads(turns: &[Turn]) -> Vec<String> {
    turns
        .iter()
        .filter_map(|turn| match turn {
            Turn::Tool { result } => Some(result.payload.clone()),
            _ => None,
        })
        .collect()
}

#[cfg(unix)]
#[test]
fn agent_fixes_a_script_and_reruns_it() {
    let root = TestRoot::new().expect("root");
    root.write("calc.sh", "echo \"3 + 5 = 9\"\n").expect("write");

    let model = ScriptedModel::new(vec![
        ModelReply::action(action("list_directory", json!({}))),
        ModelReply::action(action("run_script", json!({"file_path": "calc.sh"}))),
        ModelReply::action(action(
            "write_file",
            json!({"file_path": "calc.sh", "content": "echo \"3 + 5 = 8\"\n"}),
        )),
        ModelReply::action(action("run_script", json!({"file_path": "calc.sh"}))),
        ModelReply::text("Fixed: calc.sh now prints 3 + 5 = 8."),
    ]);

    let outcome = run_loop(
        &model,
        &root.dispatcher(),
        &loop_config(),
        "fix the calculator",
        |_| {},
    )
    .expect("loop");

    assert_eq!(outcome.rounds, 5);
    assert_eq!(outcome.actions_dispatched, 4);
    assert_eq!(
        outcome.stop,
        LoopStop::Answered {
            text: "Fixed: calc.sh now prints 3 + 5 = 8.".to_string()
        }
    );
    assert_eq!(root.read("calc.sh").expect("read"), "echo \"3 + 5 = 8\"\n");

    let payloads = tool_payloads(outcome.transcript.turns());
    assert_eq!(payloads[0], "- calc.sh: file_size=17, is_dir=false");
    assert_eq!(payloads[1], "STDOUT: 3 + 5 = 9");
    assert_eq!(
        payloads[2],
        "Successfully wrote to \"calc.sh\" (17 characters written)"
    );
    assert_eq!(payloads[3], "STDOUT: 3 + 5 = 8");
    assert_eq!(model.transcript_lengths(), vec![1, 3, 5, 7, 9]);
}

#[test]
fn transcript_alternates_agent_and_tool_turns() {
    let root = TestRoot::new().expect("root");
    root.write("notes/todo.txt", "ship it").expect("write");
    let model = ScriptedModel::new(vec![
        ModelReply::action(action("list_directory", json!({"directory": "notes"}))),
        ModelReply::action(action("read_file", json!({"file_path": "notes/todo.txt"}))),
        ModelReply::text("The todo says: ship it"),
    ]);

    let outcome = run_loop(&model, &root.dispatcher(), &loop_config(), "what's left?", |_| {})
        .expect("loop");

    assert_eq!(
        outcome.transcript.roles(),
        vec![
            Role::User,
            Role::Agent,
            Role::Tool,
            Role::Agent,
            Role::Tool,
            Role::Agent
        ]
    );
    assert_eq!(
        tool_payloads(outcome.transcript.turns()),
        vec![
            "- todo.txt: file_size=7, is_dir=false".to_string(),
            "ship it".to_string()
        ]
    );
}

#[test]
fn budget_of_one_stops_after_a_single_action() {
    let root = TestRoot::new().expect("root");
    let model = ScriptedModel::repeating(ModelReply::action(action("list_directory", json!({}))));
    let config = LoopConfig {
        max_iterations: 1,
        ..loop_config()
    };

    let outcome = run_loop(&model, &root.dispatcher(), &config, "hi", |_| {}).expect("loop");
    assert_eq!(outcome.rounds, 1);
    assert_eq!(outcome.stop, LoopStop::BudgetExhausted { max_iterations: 1 });
    assert_eq!(model.calls(), 1);
}
