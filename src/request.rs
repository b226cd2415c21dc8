//! The pending-command representation: a [`Request`] carries its own
//! pre-encoded wire bytes plus enough structure (`args`, `key`) for the
//! cluster router and for debug logging, unifying the two parallel Request
//! shapes the original implementation carried (see `DESIGN.md`).
use std::fmt;

use bytes::Bytes;

use crate::writer::append_arg_frame;

/// One argument value. The writer encodes each variant differently, but
/// every command in this crate's scope only ever needs this small set.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Bytes(Bytes),
    Int(i64),
    Str(String),
    Float(f64),
}

impl Arg {
    /// Coerces this argument to a byte view, for key extraction and
    /// debug rendering. Matches the original `ArgToString` helper.
    pub fn as_bytes_view(&self) -> Vec<u8> {
        match self {
            Arg::Bytes(b) => b.to_vec(),
            Arg::Int(i) => i.to_string().into_bytes(),
            Arg::Str(s) => s.clone().into_bytes(),
            Arg::Float(f) => f.to_string().into_bytes(),
        }
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Arg::Str(s.to_string())
    }
}
impl From<String> for Arg {
    fn from(s: String) -> Self {
        Arg::Str(s)
    }
}
impl From<Bytes> for Arg {
    fn from(b: Bytes) -> Self {
        Arg::Bytes(b)
    }
}
impl From<Vec<u8>> for Arg {
    fn from(b: Vec<u8>) -> Self {
        Arg::Bytes(Bytes::from(b))
    }
}
impl From<i64> for Arg {
    fn from(i: i64) -> Self {
        Arg::Int(i)
    }
}
impl From<f64> for Arg {
    fn from(f: f64) -> Self {
        Arg::Float(f)
    }
}

/// A command to be sent to Redis: the command name, its arguments, a
/// growing buffer of pre-encoded argument frames, and an optional cached
/// routing key.
///
/// `raw`/`raw_appends` are maintained incrementally as arguments are
/// appended (via [`Request::arg`] or [`Request::set_key`]), so the writer
/// only has to prepend the array/command header — see
/// [`crate::writer::write_request`].
#[derive(Debug, Clone)]
pub struct Request {
    pub(crate) cmd: String,
    pub(crate) args: Vec<Arg>,
    pub(crate) raw: Vec<u8>,
    pub(crate) raw_appends: usize,
    pub(crate) key: Option<Bytes>,
}

const KEY_INDEX_BY_CMD: &[(&str, usize)] = &[
    ("EVAL", 2),
    ("EVALSHA", 2),
    ("FCALL", 2),
    ("FCALL_RO", 2),
    ("BITOP", 1),
];

impl Request {
    pub fn new(cmd: impl Into<String>) -> Self {
        Request {
            cmd: cmd.into(),
            args: Vec::new(),
            raw: Vec::new(),
            raw_appends: 0,
            key: None,
        }
    }

    /// Appends one argument, builder-style.
    pub fn arg(mut self, arg: impl Into<Arg>) -> Self {
        self.append_arg(arg.into());
        self
    }

    /// Appends a byte-blob argument and increments `raw_appends`.
    pub fn append_bytes(&mut self, arg: impl Into<Bytes>) {
        self.append_arg(Arg::Bytes(arg.into()));
    }

    /// Appends a signed integer argument and increments `raw_appends`.
    pub fn append_int(&mut self, arg: i64) {
        self.append_arg(Arg::Int(arg));
    }

    fn append_arg(&mut self, arg: Arg) {
        append_arg_frame(&mut self.raw, &arg);
        self.raw_appends += 1;
        self.args.push(arg);
    }

    /// Sets the cached routing key, *and* appends it as the next argument
    /// frame — mirrors the original `SetKey`, which is used when the key
    /// is itself part of the command's argument list (e.g. `GET <key>`).
    pub fn set_key(&mut self, key: impl Into<Bytes>) {
        let key = key.into();
        self.key = Some(key.clone());
        self.append_bytes(key);
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }

    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    /// Extracts the routing key for this request (§4.E).
    ///
    /// Returns `(key_bytes, has_key)`. `has_key=false` with a non-empty
    /// `RANDOMKEY` sentinel tells the cluster router "no real key, but
    /// dispatch it somewhere at random".
    pub fn key_of(&self) -> (Vec<u8>, bool) {
        if let Some(key) = &self.key {
            return (key.to_vec(), true);
        }

        if self.cmd == "RANDOMKEY" {
            return (b"RANDOMKEY".to_vec(), false);
        }

        let index = KEY_INDEX_BY_CMD
            .iter()
            .find(|(cmd, _)| *cmd == self.cmd)
            .map(|(_, idx)| *idx)
            .unwrap_or(0);

        match self.args.get(index) {
            Some(arg) => (arg.as_bytes_view(), true),
            None => (Vec::new(), false),
        }
    }
}

impl fmt::Display for Request {
    /// Truncates each rendered argument to 32 characters and caps the
    /// argument count at 5 with a trailing ellipsis (§4.E debug
    /// stringification).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = self.args.iter().take(5).map(|a| {
            let s = String::from_utf8_lossy(&a.as_bytes_view()).into_owned();
            if s.len() > 32 {
                // `from_utf8_lossy` can place a multi-byte char (or a
                // multi-byte U+FFFD replacement) across the 32-byte mark,
                // so truncate on a char boundary rather than a raw offset.
                let cut = s
                    .char_indices()
                    .map(|(i, _)| i)
                    .take_while(|&i| i <= 32)
                    .last()
                    .unwrap_or(0);
                format!("{}...", &s[..cut])
            } else {
                s
            }
        });
        let mut rendered: Vec<String> = shown.collect();
        if self.args.len() > 5 {
            rendered.push("...".to_string());
        }
        write!(f, "Req({:?}, {:?})", self.cmd, rendered)
    }
}

/// The completion contract a Sender consumes to deliver a request's result.
///
/// Named `ReplyFuture` (rather than `Future`) to avoid colliding with
/// `std::future::Future` — this is a callback-shaped handle, not an
/// `async`/`await` future.
pub trait ReplyFuture: Send + Sync {
    /// Delivers the result for logical request `n` within a batch. Called
    /// at most once per `n`.
    fn resolve(&self, result: crate::resp::Reply, n: u64);

    /// Queried by the Sender before the request is put on the wire. A
    /// `Some(cause)` return means the Sender must skip the network send
    /// and resolve with `RespError::RequestCancelled(cause)` instead.
    fn cancelled(&self) -> Option<crate::error::RespError> {
        None
    }
}

/// Adapts a plain closure into a [`ReplyFuture`] that never cancels,
/// analogous to the original `FuncFuture`.
pub struct FnFuture<F: Fn(crate::resp::Reply, u64) + Send + Sync>(pub F);

impl<F: Fn(crate::resp::Reply, u64) + Send + Sync> ReplyFuture for FnFuture<F> {
    fn resolve(&self, result: crate::resp::Reply, n: u64) {
        (self.0)(result, n);
    }
}
