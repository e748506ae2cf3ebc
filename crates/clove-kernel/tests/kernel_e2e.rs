//! End-to-end tests: a real kernel served on a Unix socket in a tempdir,
//! driven by a minimal wire client.

use clove_kernel::{Kernel, KernelConfig};
use clove_protocol::{Frame, HEADER_LEN, MAGIC, read_frame, write_frame};
use serde_json::{Value, json};
use std::io::Write as _;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{UnixListener, UnixStream};

struct TestKernel {
    socket_path: PathBuf,
    _dir: tempfile::TempDir,
}

async fn start_kernel(mutate: impl FnOnce(&mut KernelConfig)) -> TestKernel {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("clove.sock");
    let mut config = KernelConfig {
        socket_path: socket_path.clone(),
        working_area: dir.path().to_path_buf(),
        ..KernelConfig::default()
    };
    mutate(&mut config);

    let kernel = Kernel::new(config);
    let listener = UnixListener::bind(&socket_path).unwrap();
    tokio::spawn(kernel.serve(listener));

    TestKernel {
        socket_path,
        _dir: dir,
    }
}

struct Client {
    stream: UnixStream,
    agent_id: u32,
}

impl Client {
    async fn connect(kernel: &TestKernel) -> Self {
        let stream = UnixStream::connect(&kernel.socket_path).await.unwrap();
        Self {
            stream,
            agent_id: 0,
        }
    }

    async fn call_raw(&mut self, opcode: u8, payload: Vec<u8>) -> Frame {
        let frame = Frame::new(self.agent_id.into(), opcode, payload);
        write_frame(&mut self.stream, &frame).await.unwrap();
        let response = read_frame(&mut self.stream).await.unwrap().unwrap();
        self.agent_id = response.agent_id.0;
        response
    }

    async fn call(&mut self, opcode: u8, payload: Value) -> Value {
        let response = self
            .call_raw(opcode, payload.to_string().into_bytes())
            .await;
        serde_json::from_slice(&response.payload).unwrap()
    }
}

fn stub_worker(dir: &std::path::Path, body: &str) -> Vec<String> {
    let path = dir.join("worker.sh");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "#!/bin/sh\n{body}").unwrap();
    vec!["/bin/sh".to_string(), path.display().to_string()]
}

// ---------------------------------------------------------------------------
// Framing & session basics
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_noop_echo_assigns_agent_id() {
    let kernel = start_kernel(|_| {}).await;
    let mut client = Client::connect(&kernel).await;

    let response = client.call_raw(0x00, b"hi".to_vec()).await;
    assert_eq!(response.payload, b"hi");
    assert!(response.agent_id.0 > 0);

    // Subsequent frames keep the same id.
    let first_id = client.agent_id;
    let response = client.call_raw(0x00, b"again".to_vec()).await;
    assert_eq!(response.agent_id.0, first_id);
}

#[tokio::test]
async fn test_unknown_opcode_keeps_session_alive() {
    let kernel = start_kernel(|_| {}).await;
    let mut client = Client::connect(&kernel).await;

    let response = client.call(0x13, json!({})).await;
    assert_eq!(response["success"], false);
    assert_eq!(response["error"], "unknown opcode");

    // The session survives the bad opcode.
    let echo = client.call_raw(0x00, b"alive".to_vec()).await;
    assert_eq!(echo.payload, b"alive");
}

#[tokio::test]
async fn test_exit_replies_then_closes() {
    let kernel = start_kernel(|_| {}).await;
    let mut client = Client::connect(&kernel).await;

    let response = client.call(0xFF, json!({})).await;
    assert_eq!(response["success"], true);
    assert!(read_frame(&mut client.stream).await.unwrap().is_none());
}

#[tokio::test]
async fn test_invalid_magic_closes_without_response() {
    let kernel = start_kernel(|_| {}).await;
    let mut client = Client::connect(&kernel).await;

    let mut raw = Frame::new(0.into(), 0x00, b"x".to_vec()).encode();
    raw[..4].copy_from_slice(&0xdead_beefu32.to_le_bytes());
    client.stream.write_all(&raw).await.unwrap();
    client.stream.flush().await.unwrap();

    assert!(read_frame(&mut client.stream).await.unwrap().is_none());
}

#[tokio::test]
async fn test_payload_cap_boundary() {
    let kernel = start_kernel(|_| {}).await;

    // Exactly 1 MiB is accepted and echoed.
    let mut client = Client::connect(&kernel).await;
    let response = client.call_raw(0x00, vec![0x61; 1024 * 1024]).await;
    assert_eq!(response.payload.len(), 1024 * 1024);

    // 1 MiB + 1 is rejected and the connection closed.
    let mut client = Client::connect(&kernel).await;
    let mut raw = Vec::with_capacity(HEADER_LEN);
    raw.extend_from_slice(&MAGIC.to_le_bytes());
    raw.extend_from_slice(&0u32.to_le_bytes());
    raw.push(0x00);
    raw.extend_from_slice(&(1024u64 * 1024 + 1).to_le_bytes());
    client.stream.write_all(&raw).await.unwrap();
    client.stream.flush().await.unwrap();

    let response = read_frame(&mut client.stream).await.unwrap().unwrap();
    let body: Value = serde_json::from_slice(&response.payload).unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "frame too large");
    assert!(read_frame(&mut client.stream).await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// IPC
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_register_send_recv_ordering() {
    let kernel = start_kernel(|_| {}).await;
    let mut alice = Client::connect(&kernel).await;
    let mut bob = Client::connect(&kernel).await;

    let response = alice.call(0x23, json!({"name": "alice"})).await;
    assert_eq!(response["success"], true);
    assert_eq!(response["name"], "alice");
    let alice_id = response["agent_id"].as_u64().unwrap();

    let response = bob.call(0x23, json!({"name": "bob"})).await;
    let bob_id = response["agent_id"].as_u64().unwrap();
    assert_ne!(alice_id, bob_id);

    // Send two messages; FIFO order must hold on receive.
    let response = alice
        .call(0x20, json!({"to_name": "bob", "message": {"greeting": "hi"}}))
        .await;
    assert_eq!(response["success"], true);
    assert_eq!(response["delivered_to"], bob_id);
    alice
        .call(0x20, json!({"to_name": "bob", "message": {"greeting": "again"}}))
        .await;

    let response = bob.call(0x21, json!({"max": 10})).await;
    assert_eq!(response["count"], 2);
    let messages = response["messages"].as_array().unwrap();
    assert_eq!(messages[0]["from"], alice_id);
    assert_eq!(messages[0]["from_name"], "alice");
    assert_eq!(messages[0]["message"]["greeting"], "hi");
    assert_eq!(messages[1]["message"]["greeting"], "again");
    assert!(messages[0]["age_ms"].as_u64().unwrap() < 5_000);
}

#[tokio::test]
async fn test_send_to_unknown_recipient() {
    let kernel = start_kernel(|_| {}).await;
    let mut client = Client::connect(&kernel).await;
    let response = client
        .call(0x20, json!({"to_name": "nobody", "message": {}}))
        .await;
    assert_eq!(response["success"], false);
    assert_eq!(response["error"], "unknown recipient");
}

#[tokio::test]
async fn test_mailbox_overflow_boundary() {
    let kernel = start_kernel(|c| c.mailbox_capacity = 2).await;
    let mut sender = Client::connect(&kernel).await;
    let mut receiver = Client::connect(&kernel).await;
    receiver.call(0x23, json!({"name": "rx"})).await;

    // Capacity - 1, then the last slot, then refusal.
    for n in 0..2 {
        let response = sender
            .call(0x20, json!({"to_name": "rx", "message": {"n": n}}))
            .await;
        assert_eq!(response["success"], true, "send {n} should fit");
    }
    let response = sender
        .call(0x20, json!({"to_name": "rx", "message": {"n": 2}}))
        .await;
    assert_eq!(response["success"], false);
    assert_eq!(response["error"], "mailbox full");

    let response = receiver.call(0x21, json!({"max": 10})).await;
    assert_eq!(response["count"], 2);
}

#[tokio::test]
async fn test_broadcast_counts() {
    let kernel = start_kernel(|_| {}).await;
    let mut a = Client::connect(&kernel).await;
    let mut b = Client::connect(&kernel).await;
    let mut c = Client::connect(&kernel).await;
    a.call(0x23, json!({"name": "a"})).await;
    b.call(0x23, json!({"name": "b"})).await;
    c.call(0x23, json!({"name": "c"})).await;

    let response = a
        .call(0x22, json!({"message": {"k": 1}, "include_self": false}))
        .await;
    assert_eq!(response["delivered_count"], 2);

    let response = b.call(0x21, json!({"max": 10})).await;
    assert_eq!(response["count"], 1);
    assert_eq!(response["messages"][0]["from_name"], "a");
}

// ---------------------------------------------------------------------------
// State store
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_store_fetch_delete_keys() {
    let kernel = start_kernel(|_| {}).await;
    let mut client = Client::connect(&kernel).await;

    let response = client
        .call(0x30, json!({"key": "task:1", "value": {"status": "open"}, "scope": "global"}))
        .await;
    assert_eq!(response["success"], true);
    client
        .call(0x30, json!({"key": "task:2", "value": 2, "scope": "agent"}))
        .await;

    let response = client.call(0x31, json!({"key": "task:1"})).await;
    assert_eq!(response["exists"], true);
    assert_eq!(response["value"]["status"], "open");

    let response = client.call(0x33, json!({"prefix": "task:"})).await;
    let keys = response["keys"].as_array().unwrap();
    assert_eq!(keys.len(), 2);

    let response = client.call(0x32, json!({"key": "task:1"})).await;
    assert_eq!(response["deleted"], true);
    let response = client.call(0x31, json!({"key": "task:1"})).await;
    assert_eq!(response["exists"], false);
}

#[tokio::test]
async fn test_ttl_expiry() {
    let kernel = start_kernel(|_| {}).await;
    let mut client = Client::connect(&kernel).await;

    client
        .call(0x30, json!({"key": "ephemeral", "value": 1, "scope": "global", "ttl": 1}))
        .await;
    let response = client.call(0x31, json!({"key": "ephemeral"})).await;
    assert_eq!(response["exists"], true);

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    let response = client.call(0x31, json!({"key": "ephemeral"})).await;
    assert_eq!(response["exists"], false);

    // TTL 0 pins "never expire".
    client
        .call(0x30, json!({"key": "pinned", "value": 1, "scope": "global", "ttl": 0}))
        .await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    let response = client.call(0x31, json!({"key": "pinned"})).await;
    assert_eq!(response["exists"], true);
}

#[tokio::test]
async fn test_agent_scope_is_private() {
    let kernel = start_kernel(|_| {}).await;
    let mut a = Client::connect(&kernel).await;
    let mut b = Client::connect(&kernel).await;

    a.call(0x30, json!({"key": "mine", "value": 1, "scope": "agent"}))
        .await;
    let response = b.call(0x31, json!({"key": "mine"})).await;
    assert_eq!(response["exists"], false);
}

// ---------------------------------------------------------------------------
// Permissions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_denied_write_leaves_no_side_effect() {
    let kernel = start_kernel(|_| {}).await;
    let mut client = Client::connect(&kernel).await;

    let response = client
        .call(0x04, json!({"path": "/denied-path/file.txt", "content": "x", "mode": "write"}))
        .await;
    assert_eq!(response["success"], false);
    assert_eq!(response["error"], "permission denied");
    assert!(!std::path::Path::new("/denied-path/file.txt").exists());

    // The denial landed in the security audit.
    let response = client
        .call(0x76, json!({"category": "SECURITY", "limit": 10}))
        .await;
    let entries = response["entries"].as_array().unwrap();
    assert!(
        entries
            .iter()
            .any(|e| e["event_type"] == "PERMISSION_DENIED")
    );
}

#[tokio::test]
async fn test_get_and_set_perms() {
    let kernel = start_kernel(|_| {}).await;
    let mut client = Client::connect(&kernel).await;

    let response = client.call(0x40, json!({})).await;
    assert_eq!(response["permissions"]["level"], "standard");

    let response = client.call(0x41, json!({"level": "unrestricted"})).await;
    assert_eq!(response["success"], true);
    let response = client.call(0x40, json!({})).await;
    assert_eq!(response["permissions"]["level"], "unrestricted");
    assert_eq!(response["permissions"]["can_spawn"], true);
}

#[tokio::test]
async fn test_minimal_level_blocks_store() {
    let kernel = start_kernel(|_| {}).await;
    let mut client = Client::connect(&kernel).await;
    client.call(0x41, json!({"level": "minimal"})).await;

    let response = client
        .call(0x30, json!({"key": "k", "value": 1, "scope": "global"}))
        .await;
    assert_eq!(response["error"], "permission denied");

    // Noop still works at minimal.
    let echo = client.call_raw(0x00, b"ok".to_vec()).await;
    assert_eq!(echo.payload, b"ok");
}

#[tokio::test]
async fn test_file_roundtrip_in_working_area() {
    let kernel = start_kernel(|_| {}).await;
    let dir = kernel._dir.path().to_path_buf();
    let mut client = Client::connect(&kernel).await;

    let path = dir.join("notes.txt").display().to_string();
    let response = client
        .call(0x04, json!({"path": path, "content": "hello", "mode": "write"}))
        .await;
    assert_eq!(response["success"], true);
    assert_eq!(response["bytes_written"], 5);

    client
        .call(0x04, json!({"path": path, "content": " world", "mode": "append"}))
        .await;

    let response = client.call(0x03, json!({"path": path})).await;
    assert_eq!(response["success"], true);
    assert_eq!(response["content"], "hello world");
    assert_eq!(response["size"], 11);
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_emit_and_poll_custom_events() {
    let kernel = start_kernel(|_| {}).await;
    let mut subscriber = Client::connect(&kernel).await;
    let mut emitter = Client::connect(&kernel).await;

    let response = subscriber
        .call(0x60, json!({"event_types": ["CUSTOM", "AGENT_EXITED"]}))
        .await;
    assert_eq!(
        response["subscribed"],
        json!(["AGENT_EXITED", "CUSTOM"])
    );

    let response = emitter
        .call(0x63, json!({"event_type": "CUSTOM", "data": {"count": 42}}))
        .await;
    assert_eq!(response["delivered_to"], 1);

    let response = subscriber.call(0x62, json!({"max": 10})).await;
    assert_eq!(response["count"], 1);
    let event = &response["events"][0];
    assert_eq!(event["type"], "CUSTOM");
    assert_eq!(event["data"]["count"], 42);

    let response = subscriber
        .call(0x61, json!({"event_types": ["CUSTOM"]}))
        .await;
    assert_eq!(response["unsubscribed"], json!(["AGENT_EXITED"]));
}

// ---------------------------------------------------------------------------
// LLM scheduler
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_think_fifo_across_connections() {
    // The stub numbers its responses, exposing the order the worker saw
    // requests in.
    let dir = tempfile::tempdir().unwrap();
    let command = stub_worker(
        dir.path(),
        r#"n=0
while IFS= read -r line; do
  n=$((n+1))
  printf '{"success":true,"content":"reply-%s"}\n' "$n"
done"#,
    );
    let socket_path = dir.path().join("clove.sock");
    let config = KernelConfig {
        socket_path: socket_path.clone(),
        working_area: dir.path().to_path_buf(),
        llm: clove_kernel::config::LlmSection {
            worker_command: command,
            request_timeout_s: 10,
        },
        ..KernelConfig::default()
    };
    let k = Kernel::new(config);
    let listener = UnixListener::bind(&socket_path).unwrap();
    tokio::spawn(k.serve(listener));
    let kernel = TestKernel {
        socket_path,
        _dir: dir,
    };

    let mut first = Client::connect(&kernel).await;
    let mut second = Client::connect(&kernel).await;

    // Sequential requests observe strict FIFO numbering.
    let response = first.call(0x01, json!({"prompt": "one"})).await;
    assert_eq!(response["content"], "reply-1");
    let response = second.call(0x01, json!({"prompt": "two"})).await;
    assert_eq!(response["content"], "reply-2");

    // Concurrent requests: each connection gets exactly one distinct reply.
    let task_a = tokio::spawn(async move { first.call(0x01, json!({"prompt": "a"})).await });
    let task_b = tokio::spawn(async move { second.call(0x01, json!({"prompt": "b"})).await });
    let a = task_a.await.unwrap();
    let b = task_b.await.unwrap();
    assert!(a["success"].as_bool().unwrap() && b["success"].as_bool().unwrap());
    assert_ne!(a["content"], b["content"]);
}

#[tokio::test]
async fn test_think_without_worker_is_unavailable() {
    let kernel = start_kernel(|_| {}).await;
    let mut client = Client::connect(&kernel).await;
    let response = client.call(0x01, json!({"prompt": "hi"})).await;
    assert_eq!(response["success"], false);
    assert_eq!(response["error"], "llm worker unavailable");
}

// ---------------------------------------------------------------------------
// Worlds
// ---------------------------------------------------------------------------

async fn create_and_join_vfs_world(client: &mut Client) -> String {
    let response = client
        .call(
            0xA0,
            json!({
                "name": "vfs-test",
                "config": {
                    "virtual_filesystem": {
                        "initial_files": {
                            "/config.json": {"content": "{\"env\": \"test\"}", "mode": "r"},
                            "/data/input.txt": {"content": "seed", "mode": "rw"}
                        },
                        "writable_patterns": ["/data/*"],
                        "readonly_patterns": ["/config.json"]
                    }
                }
            }),
        )
        .await;
    assert_eq!(response["success"], true);
    let world_id = response["world_id"].as_str().unwrap().to_string();

    let response = client.call(0xA3, json!({"world_id": &world_id})).await;
    assert_eq!(response["success"], true);
    world_id
}

#[tokio::test]
async fn test_world_vfs_readonly_write_denied() {
    let kernel = start_kernel(|_| {}).await;
    let mut client = Client::connect(&kernel).await;
    let world_id = create_and_join_vfs_world(&mut client).await;

    let response = client
        .call(0x04, json!({"path": "/config.json", "content": "hacked", "mode": "write"}))
        .await;
    assert_eq!(response["success"], false);
    assert_eq!(response["error"], "permission denied");

    // The file is unchanged.
    let response = client.call(0x03, json!({"path": "/config.json"})).await;
    assert_eq!(response["content"], "{\"env\": \"test\"}");

    // Writable pattern paths work.
    let response = client
        .call(0x04, json!({"path": "/data/out.txt", "content": "v", "mode": "write"}))
        .await;
    assert_eq!(response["success"], true);

    client.call(0xA4, json!({})).await;
    let response = client
        .call(0xA1, json!({"world_id": world_id, "force": false}))
        .await;
    assert_eq!(response["success"], true);
}

#[tokio::test]
async fn test_world_snapshot_restore() {
    let kernel = start_kernel(|_| {}).await;
    let mut client = Client::connect(&kernel).await;
    let world_id = create_and_join_vfs_world(&mut client).await;

    client
        .call(0x04, json!({"path": "/data/counter.txt", "content": "3", "mode": "write"}))
        .await;
    client.call(0xA4, json!({})).await;

    let response = client.call(0xA7, json!({"world_id": &world_id})).await;
    assert_eq!(response["success"], true);
    let snapshot = response["snapshot"].clone();

    client
        .call(0xA1, json!({"world_id": world_id, "force": false}))
        .await;

    let response = client
        .call(0xA8, json!({"snapshot": snapshot, "new_world_id": "restored"}))
        .await;
    assert_eq!(response["world_id"], "restored");

    client.call(0xA3, json!({"world_id": "restored"})).await;
    let response = client.call(0x03, json!({"path": "/data/counter.txt"})).await;
    assert_eq!(response["content"], "3");
}

#[tokio::test]
async fn test_world_mock_network() {
    let kernel = start_kernel(|_| {}).await;
    let mut client = Client::connect(&kernel).await;
    client.call(0x41, json!({"level": "unrestricted"})).await;

    let response = client
        .call(
            0xA0,
            json!({
                "name": "net-test",
                "config": {
                    "network": {
                        "mode": "mock",
                        "mock_responses": {
                            "https://api.example.com/users": {"status": 200, "body": "[1]"},
                            "https://api.example.com/*": {"status": 404, "body": "nope"}
                        },
                        "fail_unmatched": true
                    }
                }
            }),
        )
        .await;
    let world_id = response["world_id"].as_str().unwrap().to_string();
    client.call(0xA3, json!({"world_id": world_id})).await;

    let response = client
        .call(0x50, json!({"url": "https://api.example.com/users", "method": "GET"}))
        .await;
    assert_eq!(response["status_code"], 200);
    assert_eq!(response["mocked"], true);
    assert_eq!(response["body"], "[1]");

    let response = client
        .call(0x50, json!({"url": "https://api.example.com/missing", "method": "GET"}))
        .await;
    assert_eq!(response["status_code"], 404);

    let response = client
        .call(0x50, json!({"url": "https://elsewhere.org/", "method": "GET"}))
        .await;
    assert_eq!(response["success"], false);
    assert_eq!(response["error"], "no mock matches");
}

// ---------------------------------------------------------------------------
// Supervisor
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_spawn_restart_escalation_event_order() {
    let kernel = start_kernel(|c| {
        c.supervisor.backoff_base_s = 0;
        c.supervisor.kill_grace_s = 0;
    })
    .await;
    let dir = kernel._dir.path().to_path_buf();
    let mut client = Client::connect(&kernel).await;
    client.call(0x41, json!({"level": "unrestricted"})).await;

    client
        .call(
            0x60,
            json!({"event_types": [
                "AGENT_SPAWNED", "AGENT_EXITED", "AGENT_RESTARTING", "AGENT_ESCALATED"
            ]}),
        )
        .await;

    let script = dir.join("flaky.sh");
    std::fs::write(&script, "exit 1\n").unwrap();

    let response = client
        .call(
            0x10,
            json!({
                "name": "flaky",
                "script": script.display().to_string(),
                "sandboxed": false,
                "restart_policy": "on-failure",
                "max_restarts": 3,
                "restart_window": 60
            }),
        )
        .await;
    assert_eq!(response["success"], true);
    assert_eq!(response["restart_policy"], "on-failure");

    // Poll events until escalation shows up.
    let mut seen: Vec<String> = Vec::new();
    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    while !seen.iter().any(|t| t == "AGENT_ESCALATED") {
        assert!(std::time::Instant::now() < deadline, "never escalated: {seen:?}");
        let response = client.call(0x62, json!({"max": 50})).await;
        for event in response["events"].as_array().unwrap() {
            seen.push(event["type"].as_str().unwrap().to_string());
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    // Exactly SPAWNED, (EXITED, RESTARTING) x max_restarts, ESCALATED: the
    // over-budget exit escalates directly instead of emitting a fourth
    // EXITED.
    let seen_refs: Vec<&str> = seen.iter().map(String::as_str).collect();
    assert_eq!(
        seen_refs,
        vec![
            "AGENT_SPAWNED",
            "AGENT_EXITED",
            "AGENT_RESTARTING",
            "AGENT_EXITED",
            "AGENT_RESTARTING",
            "AGENT_EXITED",
            "AGENT_RESTARTING",
            "AGENT_ESCALATED",
        ]
    );
    assert_eq!(seen.iter().filter(|t| *t == "AGENT_EXITED").count(), 3);
    assert_eq!(seen[seen.len() - 2], "AGENT_RESTARTING");

    // SYS_LIST reflects the final state.
    let response = client.call(0x12, json!({})).await;
    let agents = response.as_array().unwrap();
    assert_eq!(agents[0]["name"], "flaky");
    assert_eq!(agents[0]["state"], "ESCALATED");
}

#[tokio::test]
async fn test_spawn_requires_capability() {
    let kernel = start_kernel(|_| {}).await;
    let mut client = Client::connect(&kernel).await;
    let response = client
        .call(0x10, json!({"name": "x", "script": "/tmp/x.sh", "sandboxed": false}))
        .await;
    assert_eq!(response["error"], "permission denied");
}

#[tokio::test]
async fn test_spawn_kill_pause_resume() {
    let kernel = start_kernel(|c| c.supervisor.kill_grace_s = 0).await;
    let dir = kernel._dir.path().to_path_buf();
    let mut client = Client::connect(&kernel).await;
    client.call(0x41, json!({"level": "unrestricted"})).await;

    let script = dir.join("sleeper.sh");
    std::fs::write(&script, "sleep 30\n").unwrap();

    let response = client
        .call(
            0x10,
            json!({"name": "sleeper", "script": script.display().to_string(), "sandboxed": false}),
        )
        .await;
    let child_id = response["id"].as_u64().unwrap();

    let response = client.call(0x14, json!({"id": child_id})).await;
    assert_eq!(response["success"], true);
    let response = client.call(0x12, json!({})).await;
    assert_eq!(response[0]["state"], "PAUSED");

    let response = client.call(0x15, json!({"name": "sleeper"})).await;
    assert_eq!(response["success"], true);

    let response = client.call(0x11, json!({"id": child_id})).await;
    assert_eq!(response["killed"], true);
    let response = client.call(0x12, json!({})).await;
    assert_eq!(response[0]["state"], "STOPPED");
}

// ---------------------------------------------------------------------------
// Audit & record/replay
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_audit_pagination_ids_increase() {
    let kernel = start_kernel(|_| {}).await;
    let mut a = Client::connect(&kernel).await;
    let mut b = Client::connect(&kernel).await;
    a.call(0x23, json!({"name": "a"})).await;
    b.call(0x23, json!({"name": "b"})).await;
    for _ in 0..5 {
        a.call(0x20, json!({"to_name": "b", "message": {}})).await;
    }

    let response = a.call(0x76, json!({"limit": 3})).await;
    let first: Vec<u64> = response["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["id"].as_u64().unwrap())
        .collect();
    assert!(first.windows(2).all(|w| w[0] < w[1]));

    let since = *first.last().unwrap();
    let response = a.call(0x76, json!({"since_id": since, "limit": 100})).await;
    assert!(
        response["entries"]
            .as_array()
            .unwrap()
            .iter()
            .all(|e| e["id"].as_u64().unwrap() > since)
    );
}

#[tokio::test]
async fn test_set_audit_config() {
    let kernel = start_kernel(|_| {}).await;
    let mut client = Client::connect(&kernel).await;
    let response = client
        .call(0x77, json!({"log_syscalls": true, "max_entries": 500}))
        .await;
    assert_eq!(response["success"], true);
    assert_eq!(response["config"]["log_syscalls"], true);
    assert_eq!(response["config"]["max_entries"], 500);

    // With syscall logging on, a noop lands in the ring.
    client.call_raw(0x00, b"x".to_vec()).await;
    let response = client
        .call(0x76, json!({"category": "SYSCALL", "limit": 10}))
        .await;
    assert!(response["count"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn test_record_replay_reproduces_store() {
    let kernel = start_kernel(|_| {}).await;
    let mut client = Client::connect(&kernel).await;

    let response = client.call(0x70, json!({"max_entries": 100})).await;
    assert_eq!(response["success"], true);
    // Double start conflicts.
    let response = client.call(0x70, json!({})).await;
    assert_eq!(response["success"], false);

    client
        .call(0x30, json!({"key": "replayed", "value": {"n": 7}, "scope": "global"}))
        .await;

    let response = client.call(0x71, json!({})).await;
    assert_eq!(response["success"], true);
    assert!(response["entry_count"].as_u64().unwrap() >= 1);

    let response = client.call(0x72, json!({"export": true})).await;
    let recording = response["recording_data"].as_str().unwrap().to_string();

    // Wipe the effect, then replay it back.
    client.call(0x32, json!({"key": "replayed"})).await;
    let response = client.call(0x31, json!({"key": "replayed"})).await;
    assert_eq!(response["exists"], false);

    let response = client.call(0x73, json!({"recording": recording})).await;
    assert_eq!(response["success"], true);

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    loop {
        let status = client.call(0x74, json!({})).await;
        if status["state"] == "DONE" {
            assert!(status["entries_replayed"].as_u64().unwrap() >= 1);
            break;
        }
        assert!(std::time::Instant::now() < deadline, "replay never finished");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let response = client.call(0x31, json!({"key": "replayed"})).await;
    assert_eq!(response["exists"], true);
    assert_eq!(response["value"]["n"], 7);
}

// ---------------------------------------------------------------------------
// Metrics & tunnel stubs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_system_metrics_snapshot() {
    let kernel = start_kernel(|_| {}).await;
    let mut client = Client::connect(&kernel).await;
    let response = client.call(0xC0, json!({})).await;
    assert_eq!(response["success"], true);
    let metrics = &response["metrics"];
    assert!(metrics["cpu_percent"].is_number());
    assert!(metrics["memory"]["total_kb"].as_u64().unwrap() > 0);
    assert_eq!(metrics["llm_queue_depth"], 0);
}

#[tokio::test]
async fn test_tunnel_opcodes_disabled() {
    let kernel = start_kernel(|_| {}).await;
    let mut client = Client::connect(&kernel).await;
    let response = client.call(0xB2, json!({})).await;
    assert_eq!(response["success"], false);
    assert_eq!(response["error"], "tunnel support disabled");
}

// ---------------------------------------------------------------------------
// Session teardown
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_name_released_on_disconnect() {
    let kernel = start_kernel(|_| {}).await;
    {
        let mut transient = Client::connect(&kernel).await;
        transient.call(0x23, json!({"name": "ghost"})).await;
        transient.call(0xFF, json!({})).await;
    }
    // Give the kernel a beat to run teardown.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut client = Client::connect(&kernel).await;
    let response = client.call(0x23, json!({"name": "ghost"})).await;
    assert_eq!(response["success"], true, "name should be claimable again");
}
