use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!(
        "vnet-sim-{prefix}-{}-{nanos}",
        std::process::id()
    ));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn run_echo(args: &[&str]) -> Value {
    let output = Command::new(env!("CARGO_BIN_EXE_socket_echo"))
        .args(args)
        .output()
        .expect("run socket_echo");
    assert!(
        output.status.success(),
        "socket_echo failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8(output.stdout).expect("utf8 stdout");
    let last = stdout.lines().last().expect("summary line");
    serde_json::from_str(last).expect("summary json")
}

#[test]
fn echo_over_default_two_tier_topology() {
    let summary = run_echo(&[]);

    assert_eq!(summary["client_state"], "connected");
    assert_eq!(summary["server_state"], "connected");
    assert_eq!(summary["sent"], 4);
    let echoed = summary["echoed"].as_array().expect("echoed array");
    assert_eq!(echoed.len(), 4);
    for (i, msg) in echoed.iter().enumerate() {
        assert_eq!(msg["seq"], i);
    }
    assert_eq!(summary["stats"]["dropped_pkts"], 0);
}

#[test]
fn unplugged_server_closes_both_sockets() {
    let summary = run_echo(&["--unplug-server-at", "40", "--until-ticks", "300"]);

    assert_eq!(summary["client_state"], "closed");
    assert_eq!(summary["server_state"], "closed");
    assert_eq!(summary["echoed"].as_array().map(Vec::len), Some(4));
    assert!(summary["stats"]["dropped_pkts"].as_u64().unwrap_or(0) > 0);
}

#[test]
fn scenario_file_drives_the_topology() {
    let dir = unique_temp_dir("scenario");
    let scenario = dir.join("scenario.json");
    fs::write(
        &scenario,
        r#"
{
    "schema_version": 1,
    "networks": [ { "name": "lan" } ],
    "nodes": [
        { "name": "sw", "kind": "bridge" },
        { "name": "a", "kind": "device" },
        { "name": "b", "kind": "device" }
    ],
    "connections": [
        { "network": "lan", "a": "sw", "b": "a" },
        { "network": "lan", "a": "sw", "b": "b" }
    ],
    "computers": [
        { "name": "alice", "device": "a" },
        { "name": "bob", "device": "b" }
    ]
}
        "#,
    )
    .expect("write scenario");
    let topo_out = dir.join("topology.json");

    let summary = run_echo(&[
        "--scenario",
        scenario.to_str().unwrap(),
        "--client",
        "alice",
        "--server",
        "bob",
        "--messages",
        "2",
        "--until-ticks",
        "50",
        "--dump-topology",
        topo_out.to_str().unwrap(),
    ]);

    assert_eq!(summary["client_state"], "connected");
    assert_eq!(summary["echoed"].as_array().map(Vec::len), Some(2));
    assert_eq!(summary["tick"], 50);

    let topo: Value = serde_json::from_str(&fs::read_to_string(&topo_out).expect("read topology"))
        .expect("topology json");
    assert_eq!(topo["nodes"].as_array().map(Vec::len), Some(3));
}

#[test]
fn unknown_client_is_an_error() {
    let output = Command::new(env!("CARGO_BIN_EXE_socket_echo"))
        .args(["--client", "nobody"])
        .output()
        .expect("run socket_echo");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("nobody"));
}
