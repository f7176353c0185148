//! Pool mode: a fresh tool process per call.
//!
//! Calls run independently and may overlap. `close` refuses new calls and
//! waits, up to the shutdown timeout, for the ones already running.

use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Condvar, Mutex};
use std::thread;
use std::time::Instant;

use wait_timeout::ChildExt;

use crate::channel::ProcessChannel;
use crate::config::{ChannelConfig, ChannelMode};
use crate::error::{io_err, ChannelError};
use crate::frame::OUTPUT_JSON;
use crate::response::ToolResponse;

pub struct OneShotChannel {
    config: ChannelConfig,
    next_id: AtomicU64,
    closed: AtomicBool,
    active: Mutex<usize>,
    idle: Condvar,
}

impl OneShotChannel {
    pub fn new(config: &ChannelConfig) -> Self {
        Self {
            config: config.clone(),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            active: Mutex::new(0),
            idle: Condvar::new(),
        }
    }

    fn enter(&self) -> Result<ActiveCall<'_>, ChannelError> {
        let mut active = self
            .active
            .lock()
            .map_err(|_| ChannelError::Protocol("pool lock poisoned".to_string()))?;
        if self.closed.load(Ordering::SeqCst) {
            return Err(ChannelError::Closed);
        }
        *active += 1;
        Ok(ActiveCall { channel: self })
    }

    fn run(&self, call_id: u64, args: &[String]) -> Result<ToolResponse, ChannelError> {
        let mut child = Command::new(&self.config.program)
            .args(&self.config.program_args)
            .arg(OUTPUT_JSON)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ChannelError::Spawn {
                program: self.config.program.clone(),
                source,
            })?;

        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let status = match child
            .wait_timeout(self.config.call_timeout)
            .map_err(|e| io_err("exiftool wait", e))?
        {
            Some(status) => status,
            None => {
                tracing::warn!(call_id, timeout = ?self.config.call_timeout, "exiftool call timed out, killing it");
                let _ = child.kill();
                let _ = child.wait();
                return Err(ChannelError::Timeout {
                    call_id,
                    waited: self.config.call_timeout,
                });
            }
        };

        let stdout = collect(stdout)?;
        let stderr = String::from_utf8_lossy(&collect(stderr)?).trim().to_string();

        if !status.success() {
            let stdout = String::from_utf8_lossy(&stdout).trim().to_string();
            tracing::error!(call_id, %status, stderr = %stderr, "exiftool call failed");
            return Err(ChannelError::Tool {
                status: status.to_string(),
                stdout,
                stderr,
            });
        }
        if !stderr.is_empty() {
            tracing::warn!(call_id, stderr = %stderr, "exiftool stderr");
        }

        let text = String::from_utf8(stdout)?.trim().to_string();
        tracing::debug!(call_id, response = %text, "exiftool response");
        Ok(ToolResponse::new(call_id, text))
    }
}

impl ProcessChannel for OneShotChannel {
    fn call(&self, args: &[String]) -> Result<ToolResponse, ChannelError> {
        let _active = self.enter()?;
        let call_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(call_id, ?args, "exiftool call");
        self.run(call_id, args)
    }

    fn mode(&self) -> ChannelMode {
        ChannelMode::Pool
    }

    fn close(&self) -> Result<(), ChannelError> {
        let deadline = Instant::now() + self.config.shutdown_timeout;
        let mut active = self
            .active
            .lock()
            .map_err(|_| ChannelError::Protocol("pool lock poisoned".to_string()))?;
        self.closed.store(true, Ordering::SeqCst);
        while *active > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                tracing::warn!(in_flight = *active, "closing pool with calls still running");
                break;
            }
            let (guard, _) = self
                .idle
                .wait_timeout(active, remaining)
                .map_err(|_| ChannelError::Protocol("pool lock poisoned".to_string()))?;
            active = guard;
        }
        Ok(())
    }
}

impl Drop for OneShotChannel {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

struct ActiveCall<'a> {
    channel: &'a OneShotChannel,
}

impl Drop for ActiveCall<'_> {
    fn drop(&mut self) {
        let mut active = match self.channel.active.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *active = active.saturating_sub(1);
        if *active == 0 {
            self.channel.idle.notify_all();
        }
    }
}

type Drain = thread::JoinHandle<std::io::Result<Vec<u8>>>;

fn drain<R: Read + Send + 'static>(mut reader: R) -> Drain {
    thread::spawn(move || {
        let mut out = Vec::new();
        reader.read_to_end(&mut out)?;
        Ok(out)
    })
}

fn collect(handle: Option<Drain>) -> Result<Vec<u8>, ChannelError> {
    match handle {
        None => Ok(Vec::new()),
        Some(handle) => handle
            .join()
            .map_err(|_| ChannelError::Protocol("output reader panicked".to_string()))?
            .map_err(|e| io_err("exiftool output", e)),
    }
}

