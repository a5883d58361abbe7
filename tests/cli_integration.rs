// CLI integration tests: output envelopes and exit codes of the `brokeradm` binary.
mod common;

use std::process::{Command, Output};

use common::{Canned, StubServer, closed_port_url, fixture_text};
use serde_json::{Value, json};

fn cmd(base_url: &str) -> Command {
    let exe = env!("CARGO_BIN_EXE_brokeradm");
    let mut command = Command::new(exe);
    for var in [
        "BROKERADM_URL",
        "BROKERADM_USER",
        "BROKERADM_PASSWORD",
        "BROKERADM_CA_FILE",
        "BROKERADM_TIMEOUT_MS",
        "RUST_LOG",
    ] {
        command.env_remove(var);
    }
    command.args(["--url", base_url, "--color", "never"]);
    command
}

fn parse_json(output: &[u8]) -> Value {
    let text = String::from_utf8_lossy(output);
    let line = text.lines().next().expect("json line");
    serde_json::from_str(line).expect("valid json")
}

fn run(command: &mut Command) -> Output {
    command.output().expect("spawn brokeradm")
}

#[test]
fn get_prints_compact_dynamic_json() {
    let server = StubServer::start(vec![Canned::json(
        200,
        r#"{"name":"orders","idle_since":"2013-08-05 11:09:48","arguments":{"x-max-length":10}}"#,
    )])
    .expect("stub");

    let output = run(cmd(&server.base_url).args(["get", "queues", "/", "orders"]));
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("utf8");
    assert_eq!(
        stdout.trim_end(),
        r#"{"name":"orders","idle_since":"2013-08-05T11:09:48Z","arguments":{"x-max-length":10}}"#
    );
    assert_eq!(
        server.next_request().expect("request").path,
        "/api/queues/%2F/orders"
    );
}

#[test]
fn queue_get_keeps_date_like_name() {
    let server = StubServer::start(vec![Canned::json(
        200,
        r#"{"name":"2013-08-05 11:09:48","vhost":"/","durable":true,"arguments":{},"idle_since":"2013-08-05 11:09:48"}"#,
    )])
    .expect("stub");

    let output = run(cmd(&server.base_url).args(["queue", "get", "/", "2013-08-05 11:09:48"]));
    assert!(output.status.success());
    let value = parse_json(&output.stdout);
    assert_eq!(value["name"], "2013-08-05 11:09:48");
    assert_eq!(value["idle_since"], "2013-08-05T11:09:48Z");
    assert_eq!(
        server.next_request().expect("request").path,
        "/api/queues/%2F/2013-08-05%2011:09:48"
    );
}

#[test]
fn overview_prints_typed_model() {
    let overviews: Value =
        serde_json::from_str(&fixture_text("overviews.json").expect("fixture")).expect("json");
    let server = StubServer::start(vec![Canned::json(200, overviews[0].to_string())]).expect("stub");

    let output = run(cmd(&server.base_url).arg("overview"));
    assert!(output.status.success());
    let value = parse_json(&output.stdout);
    assert_eq!(value["object_totals"]["exchanges"], 7);
    assert_eq!(value["listeners"][0]["socket_opts"]["backlog"], 128);
    assert!(value.get("rates_mode").is_none());
}

#[test]
fn policy_put_sends_definition_and_acknowledges() {
    let server = StubServer::start(vec![Canned::empty(201)]).expect("stub");

    let output = run(cmd(&server.base_url).args([
        "policy",
        "put",
        "/",
        "ttl",
        "--pattern",
        "^tmp\\.",
        "--definition",
        r#"{"message-ttl":60000,"expires":1800000}"#,
        "--apply-to",
        "queues",
    ]));
    assert!(output.status.success());
    assert_eq!(
        parse_json(&output.stdout),
        json!({"ok": true, "action": "put", "vhost": "/", "name": "ttl"})
    );

    let request = server.next_request().expect("request");
    assert_eq!(request.path, "/api/policies/%2F/ttl");
    assert!(
        request
            .body
            .contains(r#""definition":{"message-ttl":60000,"expires":1800000}"#)
    );
}

#[test]
fn not_found_exit_code() {
    let server = StubServer::start(vec![Canned::json(
        404,
        r#"{"error":"Object Not Found","reason":"Not Found"}"#,
    )])
    .expect("stub");

    let output = run(cmd(&server.base_url).args(["queue", "get", "/", "missing"]));
    assert_eq!(output.status.code(), Some(3));
    let err = parse_json(&output.stderr);
    assert_eq!(err["error"]["kind"], "NotFound");
    assert_eq!(err["error"]["status"], 404);
    assert_eq!(err["error"]["message"], "Object Not Found: Not Found");
}

#[test]
fn usage_exit_code_for_invalid_definition() {
    let url = closed_port_url().expect("port");
    let output = run(cmd(&url).args([
        "policy",
        "put",
        "/",
        "broken",
        "--pattern",
        ".*",
        "--definition",
        "[1,2]",
    ]));
    assert_eq!(output.status.code(), Some(2));
    let err = parse_json(&output.stderr);
    assert_eq!(err["error"]["kind"], "Usage");
}

#[test]
fn duplicate_keys_in_arguments_are_rejected() {
    let url = closed_port_url().expect("port");
    let output = run(cmd(&url).args([
        "queue",
        "declare",
        "/",
        "q",
        "--arguments",
        r#"{"x-max-length":1,"x-max-length":2}"#,
    ]));
    assert_eq!(output.status.code(), Some(9));
    let err = parse_json(&output.stderr);
    assert_eq!(err["error"]["kind"], "DuplicateKey");
    assert_eq!(err["error"]["path"], "$.x-max-length");
}

#[test]
fn unreachable_broker_does_not_leak_password() {
    let url = closed_port_url().expect("port");
    let output = run(cmd(&url).args(["--password", "hunter2", "--timeout-ms", "2000", "vhosts"]));
    assert_eq!(output.status.code(), Some(7));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!stderr.contains("hunter2"));
    let err = parse_json(&output.stderr);
    assert_eq!(err["error"]["kind"], "Io");
    assert!(err["error"]["hint"].as_str().unwrap_or_default().contains("--url"));
}

#[test]
fn unknown_flag_is_usage_error_with_hint() {
    let url = closed_port_url().expect("port");
    let output = run(cmd(&url).args(["queue", "list", "--bogus"]));
    assert_eq!(output.status.code(), Some(2));
    let err = parse_json(&output.stderr);
    assert_eq!(err["error"]["kind"], "Usage");
    assert_eq!(err["error"]["hint"], "Try `brokeradm queue list --help`.");
}

#[test]
fn completions_generate_script() {
    let url = closed_port_url().expect("port");
    let output = run(cmd(&url).args(["completions", "bash"]));
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("brokeradm"));
}
