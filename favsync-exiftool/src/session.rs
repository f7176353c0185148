//! Session mode: one `-stay_open` process serving calls over its pipes.
//!
//! Calls are serialized by a mutex around the session; the
//! read-until-sentinel loop cannot tell interleaved responses apart.
//! A reader thread forwards stdout chunks over a channel so a call can
//! give up after `call_timeout` instead of blocking forever on a hung tool.

use std::io::{BufRead, BufReader, ErrorKind, Read, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use wait_timeout::ChildExt;

use crate::config::{ChannelConfig, ChannelMode};
use crate::channel::ProcessChannel;
use crate::error::{io_err, ChannelError};
use crate::frame::{encode_request, ResponseBuffer, SHUTDOWN_DIRECTIVE};
use crate::response::ToolResponse;

/// First correlation id handed out by a fresh session.
pub const FIRST_CALL_ID: u64 = 1000;

const READ_CHUNK: usize = 4096;

pub struct SessionChannel {
    call_timeout: Duration,
    shutdown_timeout: Duration,
    state: Mutex<Option<Session>>,
}

struct Session {
    child: Child,
    stdin: ChildStdin,
    chunks: Receiver<Vec<u8>>,
    buffer: ResponseBuffer,
    next_id: u64,
    /// Set once the stream can no longer be trusted to line up with calls.
    poisoned: Option<String>,
}

impl SessionChannel {
    /// Start the tool in stay-open mode, reading arguments from stdin.
    pub fn open(config: &ChannelConfig) -> Result<Self, ChannelError> {
        let mut command = Command::new(&config.program);
        command
            .args(&config.program_args)
            .args(["-stay_open", "True", "-@", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command.spawn().map_err(|source| ChannelError::Spawn {
            program: config.program.clone(),
            source,
        })?;

        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ChannelError::Protocol(
                "exiftool started without piped stdio".to_string(),
            ));
        };

        let (tx, chunks) = mpsc::channel();
        thread::spawn(move || pump_stdout(stdout, tx));
        thread::spawn(move || {
            for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                if !line.trim().is_empty() {
                    tracing::warn!(line = %line, "exiftool stderr");
                }
            }
        });

        tracing::info!(pid = child.id(), "exiftool session started");
        Ok(Self {
            call_timeout: config.call_timeout,
            shutdown_timeout: config.shutdown_timeout,
            state: Mutex::new(Some(Session {
                child,
                stdin,
                chunks,
                buffer: ResponseBuffer::new(),
                next_id: FIRST_CALL_ID,
                poisoned: None,
            })),
        })
    }
}

impl ProcessChannel for SessionChannel {
    fn call(&self, args: &[String]) -> Result<ToolResponse, ChannelError> {
        let mut guard = self
            .state
            .lock()
            .map_err(|_| ChannelError::Protocol("session lock poisoned".to_string()))?;
        let session = guard.as_mut().ok_or(ChannelError::Closed)?;
        session.call(args, self.call_timeout)
    }

    fn mode(&self) -> ChannelMode {
        ChannelMode::Session
    }

    fn close(&self) -> Result<(), ChannelError> {
        let session = match self.state.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match session {
            Some(session) => session.shutdown(self.shutdown_timeout),
            None => Ok(()),
        }
    }
}

impl Drop for SessionChannel {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(error = %err, "exiftool session teardown failed");
        }
    }
}

impl Session {
    fn call(&mut self, args: &[String], timeout: Duration) -> Result<ToolResponse, ChannelError> {
        if let Some(reason) = &self.poisoned {
            return Err(ChannelError::Protocol(format!(
                "session unusable after earlier failure: {reason}"
            )));
        }

        let call_id = self.next_id;
        self.next_id += 1;
        tracing::debug!(call_id, ?args, "exiftool call");

        let request = encode_request(args, call_id);
        if let Err(err) = self
            .stdin
            .write_all(&request)
            .and_then(|()| self.stdin.flush())
        {
            self.poisoned = Some(format!("write of call {call_id} failed: {err}"));
            return Err(io_err("exiftool stdin", err));
        }

        let payload = self.await_response(call_id, timeout)?;
        let text = String::from_utf8(payload)?.trim().to_string();
        tracing::debug!(call_id, response = %text, "exiftool response");
        Ok(ToolResponse::new(call_id, text))
    }

    fn await_response(&mut self, call_id: u64, timeout: Duration) -> Result<Vec<u8>, ChannelError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(payload) = self.buffer.take_response(call_id) {
                return Ok(payload);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.chunks.recv_timeout(remaining) {
                Ok(chunk) => self.buffer.push(&chunk),
                Err(RecvTimeoutError::Timeout) => {
                    self.poisoned = Some(format!("call {call_id} timed out"));
                    return Err(ChannelError::Timeout {
                        call_id,
                        waited: timeout,
                    });
                }
                Err(RecvTimeoutError::Disconnected) => {
                    let status = match self.child.try_wait() {
                        Ok(Some(status)) => status.to_string(),
                        Ok(None) => "stdout closed".to_string(),
                        Err(err) => err.to_string(),
                    };
                    self.poisoned = Some(format!("exiftool exited ({status})"));
                    return Err(ChannelError::Protocol(format!(
                        "exiftool exited before answering call {call_id} ({status})"
                    )));
                }
            }
        }
    }

    /// Ask the tool to leave stay-open mode; kill it if it does not exit
    /// within `timeout`.
    fn shutdown(self, timeout: Duration) -> Result<(), ChannelError> {
        let Session {
            mut child,
            mut stdin,
            ..
        } = self;

        if let Err(err) = stdin
            .write_all(SHUTDOWN_DIRECTIVE)
            .and_then(|()| stdin.flush())
        {
            tracing::debug!(error = %err, "exiftool shutdown directive not delivered");
        }
        drop(stdin);

        match child
            .wait_timeout(timeout)
            .map_err(|e| io_err("exiftool wait", e))?
        {
            Some(status) => {
                tracing::info!(%status, "exiftool session exited");
                Ok(())
            }
            None => {
                tracing::warn!(?timeout, "exiftool did not exit in time, killing it");
                match child.kill() {
                    Ok(()) => {}
                    Err(err) if err.kind() == ErrorKind::InvalidInput => {}
                    Err(err) => return Err(io_err("exiftool kill", err)),
                }
                child.wait().map_err(|e| io_err("exiftool wait", e))?;
                Ok(())
            }
        }
    }
}

fn pump_stdout(mut stdout: ChildStdout, tx: Sender<Vec<u8>>) {
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        match stdout.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(chunk[..n].to_vec()).is_err() {
                    break;
                }
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                tracing::warn!(error = %err, "exiftool stdout read failed");
                break;
            }
        }
    }
}
