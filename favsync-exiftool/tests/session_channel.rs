#![cfg(unix)]
//! Session channel against a shell script speaking the stay-open protocol.

use std::time::{Duration, Instant};

use favsync_exiftool::{
    open_channel, ChannelConfig, ChannelError, ChannelMode, ProcessChannel, SessionChannel,
};
use serde_json::json;

/// Answers each call with the number of frames it received.
const ECHO_TOOL: &str = r#"count=0
while IFS= read -r line; do
  case "$line" in
    '#[CSTR]-execute'*)
      id=${line#'#[CSTR]-execute'}
      printf '[{"SourceFile":"fake","Args":%s}]\n{ready%s}\n' "$count" "$id"
      count=0 ;;
    '#[CSTR]'*) count=$((count+1)) ;;
    'False') exit 0 ;;
  esac
done"#;

fn config(script: &str) -> ChannelConfig {
    ChannelConfig {
        program: "sh".into(),
        program_args: vec!["-c".into(), script.into(), "fake-exiftool".into()],
        mode: ChannelMode::Session,
        call_timeout: Duration::from_secs(5),
        shutdown_timeout: Duration::from_secs(5),
    }
}

fn args(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[test]
fn calls_get_increasing_ids_and_their_own_documents() {
    let channel = SessionChannel::open(&config(ECHO_TOOL)).unwrap();

    let first = channel.call(&args(&["a.xmp"])).unwrap();
    assert_eq!(first.call_id, 1000);
    assert_eq!(
        first.document().unwrap(),
        Some(json!([{"SourceFile": "fake", "Args": 2}]))
    );

    let second = channel.call(&args(&["-Tag=x", "-Tag=y", "b.xmp"])).unwrap();
    assert_eq!(second.call_id, 1001);
    assert_eq!(
        second.document().unwrap(),
        Some(json!([{"SourceFile": "fake", "Args": 4}]))
    );

    channel.close().unwrap();
}

#[test]
fn arguments_with_line_breaks_stay_one_frame() {
    let channel = SessionChannel::open(&config(ECHO_TOOL)).unwrap();
    let response = channel
        .call(&args(&["-Description=line one\nline two"]))
        .unwrap();
    assert_eq!(
        response.document().unwrap(),
        Some(json!([{"SourceFile": "fake", "Args": 2}]))
    );
    channel.close().unwrap();
}

#[test]
fn open_channel_selects_session_mode() {
    let channel = open_channel(&config(ECHO_TOOL)).unwrap();
    assert_eq!(channel.mode(), ChannelMode::Session);
    channel.call(&args(&["a.xmp"])).unwrap();
    channel.close().unwrap();
}

#[test]
fn calls_after_close_are_rejected() {
    let channel = SessionChannel::open(&config(ECHO_TOOL)).unwrap();
    channel.close().unwrap();
    channel.close().unwrap();
    assert!(matches!(
        channel.call(&args(&["a.xmp"])),
        Err(ChannelError::Closed)
    ));
}

#[test]
fn timeout_poisons_the_session() {
    let mut cfg = config("while IFS= read -r line; do :; done");
    cfg.call_timeout = Duration::from_millis(200);
    let channel = SessionChannel::open(&cfg).unwrap();

    let err = channel.call(&args(&["a.xmp"])).unwrap_err();
    assert!(matches!(err, ChannelError::Timeout { call_id: 1000, .. }), "{err:?}");

    let err = channel.call(&args(&["a.xmp"])).unwrap_err();
    assert!(matches!(err, ChannelError::Protocol(_)), "{err:?}");

    channel.close().unwrap();
}

#[test]
fn unresponsive_tool_is_killed_on_close() {
    let mut cfg = config("exec sleep 30");
    cfg.shutdown_timeout = Duration::from_millis(200);
    let channel = SessionChannel::open(&cfg).unwrap();

    let started = Instant::now();
    channel.close().unwrap();
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[test]
fn tool_exiting_early_is_reported() {
    let channel = SessionChannel::open(&config("exit 0")).unwrap();
    std::thread::sleep(Duration::from_millis(100));
    let err = channel.call(&args(&["a.xmp"])).unwrap_err();
    assert!(
        matches!(err, ChannelError::Protocol(_) | ChannelError::Io { .. }),
        "{err:?}"
    );
}

#[test]
fn missing_program_fails_to_spawn() {
    let cfg = ChannelConfig {
        program: "/nonexistent/favsync-fake-exiftool".into(),
        ..ChannelConfig::default()
    };
    let err = SessionChannel::open(&cfg).err().unwrap();
    assert!(matches!(err, ChannelError::Spawn { .. }), "{err:?}");
}

/// Echoes a foreign sentinel inside the payload and splits its own sentinel
/// across two writes.
const SPLIT_SENTINEL_TOOL: &str = r#"while IFS= read -r line; do
  case "$line" in
    '#[CSTR]-execute'*)
      id=${line#'#[CSTR]-execute'}
      printf '[{"SourceFile":"fake","Description":"see {ready4242}"}]\n{rea'
      sleep 0.1
      printf 'dy%s}\n' "$id" ;;
    'False') exit 0 ;;
  esac
done"#;

#[test]
fn foreign_sentinel_in_payload_and_split_sentinel() {
    let channel = SessionChannel::open(&config(SPLIT_SENTINEL_TOOL)).unwrap();

    let response = channel.call(&args(&["a.xmp"])).unwrap();
    assert_eq!(response.call_id, 1000);
    assert_eq!(
        response.document().unwrap(),
        Some(json!([{"SourceFile": "fake", "Description": "see {ready4242}"}]))
    );

    let next = channel.call(&args(&["b.xmp"])).unwrap();
    assert_eq!(next.call_id, 1001);
    assert!(next.document().unwrap().is_some());

    channel.close().unwrap();
}
