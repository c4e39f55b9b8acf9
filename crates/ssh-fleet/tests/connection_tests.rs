//! Connection lifecycle and command execution against the mock transport.

use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use ssh_fleet::config::DEFAULT_COMMAND_PREFIX;
use ssh_fleet::{
    AuthOutcome, Connection, ConnectionConfig, ConnectionState, Error, EventHooks, ExecOutput,
    MockExec, MockTransport, StreamKind,
};

fn config() -> ConnectionConfig {
    ConnectionConfig::new("web01")
        .username("deploy")
        .password("hunter2")
}

fn position(journal: &[String], entry: &str) -> usize {
    journal
        .iter()
        .position(|e| e == entry)
        .unwrap_or_else(|| panic!("journal missing '{entry}': {journal:?}"))
}

#[tokio::test]
async fn empty_host_fails_without_touching_transport() {
    let mut conn = Connection::new(ConnectionConfig::new(""), MockTransport::new());
    let err = conn.connect().await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument { .. }));
    assert!(conn.transport().journal().is_empty());
    assert_eq!(conn.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn successful_connect_reaches_ready() {
    let mut conn = Connection::new(config(), MockTransport::new());
    conn.connect().await.unwrap();
    assert_eq!(conn.state(), ConnectionState::Ready);
    assert!(conn.is_connected());
}

#[tokio::test]
async fn matching_fingerprint_is_accepted() {
    let transport = MockTransport::new().with_fingerprint("aa:bb:cc");
    let mut conn = Connection::new(config().fingerprint("aa:bb:cc"), transport);
    conn.connect().await.unwrap();
    assert_eq!(conn.state(), ConnectionState::Ready);
}

#[tokio::test]
async fn fingerprint_mismatch_disconnects_before_failing() {
    let transport = MockTransport::new().with_fingerprint("aa:bb:cc");
    let mut conn = Connection::new(config().fingerprint("dd:ee:ff"), transport);
    let err = conn.connect().await.unwrap_err();

    assert!(err.is_authentication());
    assert!(err.to_string().contains("can't be established"));
    assert!(!conn.is_connected());
    assert_eq!(conn.transport().handle_closes(), 1);
}

#[tokio::test]
async fn auth_rejection_lists_alternative_methods() {
    let transport = MockTransport::new()
        .with_auth_outcome(AuthOutcome::rejected(["publickey", "keyboard-interactive"]));
    let mut conn = Connection::new(config(), transport);
    let err = conn.connect().await.unwrap_err();

    assert!(err.is_authentication());
    let msg = err.to_string();
    assert!(msg.contains("method not allowed"));
    assert!(msg.contains("'publickey', 'keyboard-interactive'"));
    assert!(!conn.is_connected());
}

#[tokio::test]
async fn auth_rejection_without_alternatives_is_generic() {
    let transport =
        MockTransport::new().with_auth_outcome(AuthOutcome::rejected(Vec::<String>::new()));
    let mut conn = Connection::new(config(), transport);
    let err = conn.connect().await.unwrap_err();
    assert!(err.to_string().contains("Host key verification failed."));
}

#[tokio::test]
async fn key_pair_config_uses_key_auth() {
    let mut conn = Connection::new(
        config().key_pair("/keys/id.pub", "/keys/id", None),
        MockTransport::new(),
    );
    conn.connect().await.unwrap();
    assert!(
        conn.transport()
            .journal()
            .iter()
            .any(|e| e == "auth_key_pair deploy /keys/id")
    );
}

#[tokio::test]
async fn empty_password_uses_none_auth() {
    let mut conn = Connection::new(
        ConnectionConfig::new("web01").username("deploy"),
        MockTransport::new(),
    );
    conn.connect().await.unwrap();
    assert!(
        conn.transport()
            .journal()
            .iter()
            .any(|e| e == "auth_none deploy")
    );
}

#[tokio::test]
async fn reconnect_tears_down_previous_handle() {
    let mut conn = Connection::new(config(), MockTransport::new());
    conn.connect().await.unwrap();
    conn.connect().await.unwrap();
    assert_eq!(conn.transport().handle_closes(), 1);
    assert!(conn.is_connected());
}

#[tokio::test]
async fn execute_splits_stdio_and_stderr() {
    let transport = MockTransport::new().with_exec(MockExec::new("hello\n").stderr("warning\n"));
    let mut conn = Connection::new(config(), transport);
    conn.connect().await.unwrap();

    let output = conn.execute("greet").await.unwrap();
    assert_eq!(output.stdio, "hello\n");
    assert_eq!(output.stderr, "warning\n");
}

#[tokio::test]
async fn wire_command_carries_prefix_only_when_logging() {
    let mut conn = Connection::new(config(), MockTransport::new());
    conn.connect().await.unwrap();
    let _ = conn.execute("ls").await.unwrap();
    assert_eq!(
        conn.transport().wire_commands(),
        [format!("{DEFAULT_COMMAND_PREFIX}ls")]
    );

    conn.set_log_enabled(false);
    let _ = conn.execute("pwd").await.unwrap();
    assert_eq!(conn.transport().wire_commands()[1], "pwd");
}

#[tokio::test]
async fn log_entries_are_index_aligned_and_unprefixed() {
    let transport = MockTransport::new()
        .with_exec(MockExec::new("a"))
        .with_exec(MockExec::new("b"))
        .with_exec(MockExec::new("c"));
    let mut conn = Connection::new(config(), transport);
    conn.connect().await.unwrap();

    for command in ["first", "second", "third"] {
        let _ = conn.execute(command).await.unwrap();
    }

    let log = conn.log();
    assert_eq!(log.len(), 3);
    assert_eq!(log.inputs(), ["first", "second", "third"]);
    assert_eq!(log.outputs()[0].map(|o| o.stdio.as_str()), Some("a"));
    assert_eq!(log.outputs()[2].map(|o| o.stdio.as_str()), Some("c"));
}

#[tokio::test]
async fn disabled_logging_leaves_log_empty() {
    let mut conn = Connection::new(config().log_enabled(false), MockTransport::new());
    conn.connect().await.unwrap();
    let _ = conn.execute("ls").await.unwrap();
    assert!(conn.log().is_empty());
}

#[tokio::test]
async fn drain_protocol_orders_closes_and_reads() {
    let transport = MockTransport::new().with_exec(MockExec::new("out").stderr("err"));
    let mut conn = Connection::new(config(), transport);
    conn.connect().await.unwrap();
    let _ = conn.execute("ls").await.unwrap();

    let journal = conn.transport().journal();
    let close_channel = position(&journal, "close_channel");
    let read_stdio = position(&journal, "read stdio");
    let read_stderr = position(&journal, "read stderr");
    let close_stdio = position(&journal, "close_stream stdio");
    let close_stderr = position(&journal, "close_stream stderr");

    assert!(close_channel < read_stdio);
    assert!(read_stdio < read_stderr);
    assert!(read_stderr < close_stdio);
    assert!(close_stdio < close_stderr);
}

#[tokio::test]
async fn large_output_is_read_in_buffer_size_chunks() {
    let payload = "x".repeat(10_000);
    let transport = MockTransport::new().with_exec(MockExec::new(payload.clone()));
    let mut conn = Connection::new(config().buffer_size(4096), transport);
    conn.connect().await.unwrap();

    let output = conn.execute("cat big").await.unwrap();
    assert_eq!(output.stdio, payload);

    // 3 data chunks plus the final empty read signalling end of stream
    let stdio_reads = conn
        .transport()
        .journal()
        .iter()
        .filter(|e| *e == "read stdio")
        .count();
    assert_eq!(stdio_reads, 4);
}

#[tokio::test]
async fn channel_open_failure_is_recovered_into_output() {
    let transport = MockTransport::new().with_exec(MockExec::new("").fail_open("no channel"));
    let mut conn = Connection::new(config(), transport);
    conn.connect().await.unwrap();

    let output = conn.execute("ls").await.unwrap();
    assert!(output.stdio.contains("no channel"));
    assert_eq!(output.stderr, "");
    // recovered result still lands at the matching log index
    assert_eq!(conn.log().outputs()[0].map(|o| o.stdio.as_str()), Some(output.stdio.as_str()));
}

#[tokio::test]
async fn channel_close_failure_reports_connection_closed() {
    let transport =
        MockTransport::new().with_exec(MockExec::new("lost").fail_close_channel("broken"));
    let mut conn = Connection::new(config(), transport);
    conn.connect().await.unwrap();

    let output = conn.execute("ls").await.unwrap();
    assert!(output.stdio.contains("Connection to web01 closed."));
    // channel close fails before any stream read, so no partial output leaks
    assert!(!output.stdio.contains("lost"));
}

#[tokio::test]
async fn read_failure_embeds_partial_output() {
    let transport = MockTransport::new()
        .with_exec(MockExec::new("partial data".repeat(600)).fail_read_after(StreamKind::Stdio, 1));
    let mut conn = Connection::new(config().buffer_size(64), transport);
    conn.connect().await.unwrap();

    let output = conn.execute("ls").await.unwrap();
    assert!(output.stdio.contains("Connection to web01 closed."));
    assert!(output.stdio.contains("partial data"));
    assert_eq!(output.stderr, "");
}

#[tokio::test]
async fn stream_close_failure_embeds_both_outputs() {
    let transport = MockTransport::new()
        .with_exec(MockExec::new("out").stderr("err").fail_close_stream(StreamKind::Stdio));
    let mut conn = Connection::new(config(), transport);
    conn.connect().await.unwrap();

    let output = conn.execute("ls").await.unwrap();
    assert!(output.stdio.contains("out"));
    assert!(output.stdio.contains("err"));
}

#[tokio::test]
async fn execute_on_disconnected_connection_fails() {
    let mut conn = Connection::new(config(), MockTransport::new());
    let err = conn.execute("ls").await.unwrap_err();
    assert!(err.is_connection());
}

#[tokio::test]
async fn disconnect_sends_exit_command() {
    let mut conn = Connection::new(config(), MockTransport::new());
    conn.connect().await.unwrap();
    conn.disconnect().await;

    assert!(!conn.is_connected());
    assert_eq!(conn.state(), ConnectionState::Disconnected);
    let exit_wire = format!("{DEFAULT_COMMAND_PREFIX}echo \"EXITING\" && exit;");
    assert_eq!(conn.transport().wire_commands(), [exit_wire]);
}

#[tokio::test]
async fn disconnect_without_handle_is_a_no_op() {
    let mut conn = Connection::new(config(), MockTransport::new());
    conn.disconnect().await;
    assert!(conn.transport().wire_commands().is_empty());
    assert_eq!(conn.transport().handle_closes(), 0);
}

#[tokio::test]
async fn destroy_is_idempotent_and_clears_log() {
    let mut conn = Connection::new(config(), MockTransport::new());
    conn.connect().await.unwrap();
    let _ = conn.execute("ls").await.unwrap();

    conn.destroy().await;
    conn.destroy().await;

    assert!(!conn.is_connected());
    assert!(conn.log().is_empty());
    assert_eq!(conn.transport().handle_closes(), 1);
}

#[tokio::test]
async fn channel_close_failure_fires_the_disconnect_hook() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let hooks = EventHooks::new().on_disconnect(move |message| {
        sink.lock().unwrap().push(message.to_string());
    });
    let transport =
        MockTransport::new().with_exec(MockExec::new("lost").fail_close_channel("broken"));
    let mut conn = Connection::new(config().event_hooks(hooks), transport);
    conn.connect().await.unwrap();

    let _ = conn.execute("ls").await.unwrap();
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn exec_output_round_trips_through_json() {
    let transport = MockTransport::new().with_exec(MockExec::new("hello\n").stderr("warning\n"));
    let mut conn = Connection::new(config(), transport);
    conn.connect().await.unwrap();

    let output = conn.execute("greet").await.unwrap();
    let json = serde_json::to_value(&output).unwrap();
    assert_eq!(json["stdio"], "hello\n");
    assert_eq!(json["stderr"], "warning\n");

    let back: ExecOutput = serde_json::from_value(json).unwrap();
    assert_eq!(back, output);
}

#[tokio::test]
async fn connect_failure_maps_to_connection_error() {
    let transport = MockTransport::new().fail_next_open("refused");
    let mut conn = Connection::new(config(), transport);
    let err = conn.connect().await.unwrap_err();
    assert!(err.is_connection());
    assert!(err.to_string().contains("error connecting to server"));
}
