//! Stay-open argfile framing.
//!
//! ## Request
//!
//! Each argument is one line of the tool's argfile stream, prefixed with
//! `#[CSTR]` so the rest of the line is read as a C string. A request ends
//! with the JSON output flag and `-execute<id>`:
//!
//! ```text
//! #[CSTR]-Description=two\nlines
//! #[CSTR]/lib/2021/05/01/42.png.xmp
//! #[CSTR]-j
//! #[CSTR]-execute1000
//! ```
//!
//! ## Response
//!
//! The tool answers with free-form output followed by `{ready<id>}`. The
//! stream has no other message boundary, so [`ResponseBuffer`] accumulates
//! bytes until it sees the sentinel carrying the caller's own id.

pub const FRAME_PREFIX: &str = "#[CSTR]";
pub const OUTPUT_JSON: &str = "-j";
pub const SHUTDOWN_DIRECTIVE: &[u8] = b"-stay_open\nFalse\n";

/// C-string escape one argument so it stays on a single line and its bytes
/// survive the pipe unchanged.
pub fn escape_cstr(arg: &str) -> String {
    let mut out = String::with_capacity(arg.len());
    for &byte in arg.as_bytes() {
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'"' => out.push_str("\\\""),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7e => out.push(byte as char),
            _ => out.push_str(&format!("\\x{byte:02x}")),
        }
    }
    out
}

/// Append one `#[CSTR]` frame for `arg` to `out`.
pub fn encode_frame(arg: &str, out: &mut Vec<u8>) {
    out.extend_from_slice(FRAME_PREFIX.as_bytes());
    out.extend_from_slice(escape_cstr(arg).as_bytes());
    out.push(b'\n');
}

/// Frames for `args`, the JSON output flag, and the execute directive.
pub fn encode_request(args: &[String], call_id: u64) -> Vec<u8> {
    let mut out = Vec::new();
    for arg in args {
        encode_frame(arg, &mut out);
    }
    encode_frame(OUTPUT_JSON, &mut out);
    encode_frame(&format!("-execute{call_id}"), &mut out);
    out
}

/// `{ready<id>}`
pub fn sentinel(call_id: u64) -> String {
    format!("{{ready{call_id}}}")
}

/// Accumulates tool output across reads and splits off complete responses.
///
/// Bytes after a matched sentinel stay buffered for the next call, so a
/// read never discards output that belongs to someone else.
#[derive(Debug, Default)]
pub struct ResponseBuffer {
    buf: Vec<u8>,
}

impl ResponseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Split off the response for `call_id` if its sentinel has arrived.
    ///
    /// A sentinel only terminates the response when it ends the buffer or
    /// is followed by a line ending; the same text quoted inside a payload
    /// is left alone. Sentinels of other ids never match.
    pub fn take_response(&mut self, call_id: u64) -> Option<Vec<u8>> {
        let marker = sentinel(call_id);
        let marker = marker.as_bytes();
        let mut from = 0;
        while let Some(found) = find(&self.buf[from..], marker) {
            let start = from + found;
            let end = start + marker.len();
            let rest = &self.buf[end..];
            if rest.is_empty() || rest.starts_with(b"\n") || rest.starts_with(b"\r\n") {
                let skip = if rest.starts_with(b"\r\n") {
                    2
                } else {
                    usize::from(rest.starts_with(b"\n"))
                };
                let remainder = self.buf.split_off(end + skip);
                self.buf.truncate(start);
                let payload = std::mem::replace(&mut self.buf, remainder);
                return Some(payload);
            }
            from = start + 1;
        }
        None
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}
