//! CLI tests that spawn the agent binary without network access.

use std::fs;
use std::process::Command;

use agent::exit_codes;

#[test]
fn missing_api_key_exits_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::create_dir(temp.path().join("calculator")).expect("root");
    fs::write(
        temp.path().join("agent.toml"),
        "[model]\napi_key_env = \"AGENT_TEST_UNSET_KEY\"\n",
    )
    .expect("config");

    let output = Command::new(env!("CARGO_BIN_EXE_agent"))
        .current_dir(temp.path())
        .env_remove("AGENT_TEST_UNSET_KEY")
        .arg("hello")
        .output()
        .expect("run agent");

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("AGENT_TEST_UNSET_KEY"), "{stderr}");
}

#[test]
fn invalid_config_exits_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(temp.path().join("agent.toml"), "max_iterations = 0\n").expect("config");

    let output = Command::new(env!("CARGO_BIN_EXE_agent"))
        .current_dir(temp.path())
        .arg("hello")
        .output()
        .expect("run agent");

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("max_iterations"), "{stderr}");
}

#[test]
fn missing_prompt_is_a_usage_error() {
    let status = Command::new(env!("CARGO_BIN_EXE_agent"))
        .status()
        .expect("run agent");
    assert!(!status.success());
}
