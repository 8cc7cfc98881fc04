#![cfg(feature = "cli")]

use std::io::{Read, Write};
use std::net::TcpListener;
use std::process::{Command, Output};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const REMOTE_VERIFIED: &str = ":X19170456N050101010009;";

/// One-client GridConnect hub that answers scripted triggers.
///
/// Each `(trigger, reply)` pair fires once, in order, as soon as the text
/// received so far contains `trigger`. Returns everything the client sent.
fn spawn_hub(script: &'static [(&'static str, &'static str)]) -> (u16, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("hub should bind");
    let port = listener.local_addr().expect("hub should have an address").port();

    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("client should connect");
        stream
            .set_read_timeout(Some(Duration::from_secs(10)))
            .expect("read timeout should apply");

        let mut seen = String::new();
        let mut next = 0;
        let mut buf = [0u8; 512];
        loop {
            match stream.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => seen.push_str(&String::from_utf8_lossy(&buf[..n])),
            }
            while let Some((trigger, reply)) = script.get(next) {
                if !seen.contains(trigger) {
                    break;
                }
                stream
                    .write_all(reply.as_bytes())
                    .expect("hub reply should write");
                next += 1;
            }
        }
        seen
    });

    (port, handle)
}

fn olcbprims(port: u16, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_olcbprims"))
        .args(["--log-level", "error", "--host", "127.0.0.1"])
        .args(["--port", &port.to_string()])
        .args(["--node-id", "05.01.01.01.00.0A", "--timeout", "1s"])
        .args(args)
        .output()
        .expect("olcbprims should run")
}

fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
    listener
        .local_addr()
        .expect("listener should have an address")
        .port()
}

#[test]
fn frame_writes_text_to_hub() {
    let (port, hub) = spawn_hub(&[]);

    let output = olcbprims(port, &["frame", ":X19490123N;"]);
    assert!(output.status.success(), "{output:?}");

    let seen = hub.join().expect("hub should finish");
    assert_eq!(seen, ":X19490123N;");
}

#[test]
fn frame_wait_prints_replies() {
    let (port, hub) = spawn_hub(&[(":X19490123N;", REMOTE_VERIFIED)]);

    let output = olcbprims(port, &["--format", "json", "frame", ":X19490123N;", "--wait"]);
    assert!(output.status.success(), "{output:?}");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let line = stdout.lines().next().expect("one frame should print");
    let payload: serde_json::Value = serde_json::from_str(line).expect("frame should emit json");
    assert_eq!(payload["kind"], "MTI");
    assert_eq!(payload["gridconnect"], REMOTE_VERIFIED);
    assert_eq!(payload["data"], "050101010009");
    hub.join().expect("hub should finish");
}

#[test]
fn frame_rejects_malformed_text() {
    let output = olcbprims(closed_port(), &["frame", ":Xnope;"]);
    assert_eq!(output.status.code(), Some(60));
}

#[test]
fn verify_prints_answering_nodes() {
    let (port, hub) = spawn_hub(&[(":X19490", REMOTE_VERIFIED)]);

    let output = olcbprims(port, &["--format", "json", "verify"]);
    assert!(output.status.success(), "{output:?}");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("message-received.schema.json"));
    assert!(stdout.contains("\"mti\":\"0x170\""));
    assert!(stdout.contains("\"source\":\"05.01.01.01.00.09\""));

    let seen = hub.join().expect("hub should finish");
    // The alias is claimed before the query goes out.
    let claim = seen.find(":X10701").expect("AMD should be sent");
    let query = seen.find(":X19490").expect("verify should be sent");
    assert!(claim < query, "{seen}");
}

#[test]
fn verify_without_answers_exits_124() {
    let (port, hub) = spawn_hub(&[]);

    let output = olcbprims(port, &["verify"]);
    assert_eq!(output.status.code(), Some(124));
    hub.join().expect("hub should finish");
}

#[test]
fn send_event_report_carries_event_id() {
    let (port, hub) = spawn_hub(&[]);

    let output = olcbprims(port, &["send", "0x5B4", "--event", "05.01.01.01.22.60.00.01"]);
    assert!(output.status.success(), "{output:?}");

    let seen = hub.join().expect("hub should finish");
    let report = seen
        .split_inclusive(';')
        .find(|frame| frame.starts_with(":X195B4"))
        .expect("event report should be sent");
    assert!(report.ends_with("N0501010122600001;"), "{report}");
}

#[test]
fn send_event_mti_without_event_is_usage_error() {
    let output = olcbprims(closed_port(), &["send", "0x5B4"]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn resolve_alias_asks_the_node() {
    let (port, hub) = spawn_hub(&[(":X19488", REMOTE_VERIFIED)]);

    let output = olcbprims(port, &["--format", "json", "resolve", "0x456"]);
    assert!(output.status.success(), "{output:?}");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let payload: serde_json::Value =
        serde_json::from_str(stdout.trim()).expect("resolve should emit json");
    assert_eq!(payload["node_id"], "05.01.01.01.00.09");
    assert_eq!(payload["alias"], "0x456");

    let seen = hub.join().expect("hub should finish");
    assert!(seen.contains("N0456;"), "{seen}");
}

#[test]
fn resolve_unknown_node_exits_124_after_three_enquiries() {
    let (port, hub) = spawn_hub(&[]);

    let output = olcbprims(port, &["resolve", "05.01.01.01.00.09"]);
    assert_eq!(output.status.code(), Some(124));

    let seen = hub.join().expect("hub should finish");
    assert_eq!(seen.matches(":X10702").count(), 3, "{seen}");
}

#[test]
fn refused_connection_exits_3() {
    let output = olcbprims(closed_port(), &["verify"]);
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn version_prints_package_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_olcbprims"))
        .arg("version")
        .output()
        .expect("version should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout.trim(),
        format!("olcbprims {}", env!("CARGO_PKG_VERSION"))
    );
}
