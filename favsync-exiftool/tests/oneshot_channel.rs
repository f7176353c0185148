#![cfg(unix)]
//! One-shot (pool mode) channel against small shell scripts.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use favsync_exiftool::{
    open_channel, ChannelConfig, ChannelError, ChannelMode, OneShotChannel, ProcessChannel,
};
use serde_json::json;

fn config(script: &str) -> ChannelConfig {
    ChannelConfig {
        program: "sh".into(),
        program_args: vec!["-c".into(), script.into(), "fake-exiftool".into()],
        mode: ChannelMode::Pool,
        call_timeout: Duration::from_secs(5),
        shutdown_timeout: Duration::from_secs(5),
    }
}

fn args(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

const JSON_TOOL: &str = r#"printf '[{"SourceFile":"%s","Argc":%s,"Format":"%s"}]\n' "$2" "$#" "$1""#;

#[test]
fn call_passes_json_flag_before_arguments() {
    let channel = OneShotChannel::new(&config(JSON_TOOL));
    let response = channel.call(&args(&["a.xmp"])).unwrap();
    assert_eq!(
        response.document().unwrap(),
        Some(json!([{"SourceFile": "a.xmp", "Argc": 2, "Format": "-j"}]))
    );
}

#[test]
fn non_zero_exit_is_a_tool_error() {
    let channel = OneShotChannel::new(&config("echo partial; echo boom >&2; exit 3"));
    match channel.call(&args(&["a.xmp"])).unwrap_err() {
        ChannelError::Tool {
            status,
            stdout,
            stderr,
        } => {
            assert!(status.contains('3'), "{status}");
            assert_eq!(stdout, "partial");
            assert_eq!(stderr, "boom");
        }
        other => panic!("expected tool error, got {other:?}"),
    }
}

#[test]
fn slow_call_times_out() {
    let mut cfg = config("sleep 5");
    cfg.call_timeout = Duration::from_millis(200);
    let channel = OneShotChannel::new(&cfg);
    let err = channel.call(&args(&["a.xmp"])).unwrap_err();
    assert!(matches!(err, ChannelError::Timeout { .. }), "{err:?}");
}

#[test]
fn write_failures_surface_through_the_summary() {
    let channel = OneShotChannel::new(&config(
        "echo \"    0 image files updated\"; echo \"    1 files weren't updated due to errors\"",
    ));
    let response = channel.call(&args(&["-Tag=x", "a.xmp"])).unwrap();
    assert_eq!(response.write_summary().failed, 1);
    assert!(matches!(
        response.ensure_written(),
        Err(ChannelError::Tool { .. })
    ));
}

#[test]
fn concurrent_calls_all_complete() {
    let channel = Arc::new(OneShotChannel::new(&config(JSON_TOOL)));
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let channel = Arc::clone(&channel);
            thread::spawn(move || channel.call(&[format!("{i}.xmp")]))
        })
        .collect();

    let mut ids: Vec<u64> = handles
        .into_iter()
        .map(|h| h.join().unwrap().unwrap().call_id)
        .collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 4);
}

#[test]
fn close_waits_for_in_flight_calls_then_rejects_new_ones() {
    let channel = Arc::new(OneShotChannel::new(&config(
        "sleep 0.3; printf '[{}]\\n'",
    )));
    let worker = {
        let channel = Arc::clone(&channel);
        thread::spawn(move || channel.call(&args(&["a.xmp"])))
    };
    thread::sleep(Duration::from_millis(50));

    channel.close().unwrap();
    assert!(worker.join().unwrap().is_ok());
    assert!(matches!(
        channel.call(&args(&["a.xmp"])),
        Err(ChannelError::Closed)
    ));
}

#[test]
fn open_channel_selects_pool_mode() {
    let channel = open_channel(&config(JSON_TOOL)).unwrap();
    assert_eq!(channel.mode(), ChannelMode::Pool);
}
