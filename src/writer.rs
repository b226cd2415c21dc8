//! Encodes a [`Request`](crate::request::Request) into the wire frame RESP2
//! expects: an array of bulk strings, `*N\r\n` followed by `$len\r\n..\r\n`
//! per element. The writer only ever emits this portable subset — no
//! inline commands, no non-bulk array elements.
use bytes::BytesMut;
use tokio_util::codec::Encoder;

use crate::error::RespError;
use crate::intcodec::append_head;
use crate::request::{Arg, Request};

/// Splits `cmd` on its first embedded space, if any, so forms like
/// `"CLIENT KILL"` serialise as two command frames (`CLIENT`, `KILL`)
/// rather than one literal frame containing a space.
pub(crate) fn split_cmd(cmd: &str) -> (&str, Option<&str>) {
    match cmd.find(' ') {
        Some(idx) => (&cmd[..idx], Some(&cmd[idx + 1..])),
        None => (cmd, None),
    }
}

/// Appends one argument as a `$len\r\n..\r\n` frame.
pub(crate) fn append_bytes_frame(buf: &mut Vec<u8>, bytes: &[u8]) {
    append_head(buf, b'$', bytes.len() as i64);
    buf.extend_from_slice(bytes);
    buf.extend_from_slice(b"\r\n");
}

/// Appends one argument frame for an already-typed [`Arg`].
pub(crate) fn append_arg_frame(buf: &mut Vec<u8>, arg: &Arg) {
    match arg {
        Arg::Bytes(b) => append_bytes_frame(buf, b),
        Arg::Int(i) => {
            let mut tmp = Vec::new();
            crate::intcodec::append_bulk_int(&mut tmp, *i);
            append_bytes_frame(buf, &tmp);
        }
        Arg::Str(s) => append_bytes_frame(buf, s.as_bytes()),
        Arg::Float(f) => append_bytes_frame(buf, f.to_string().as_bytes()),
    }
}

/// Builds the complete wire frame for `request`: the array header plus the
/// command frame(s) plus every argument frame, in order.
pub fn write_request(request: &Request) -> Vec<u8> {
    let (first, second) = split_cmd(&request.cmd);
    let cmd_frames = if second.is_some() { 2 } else { 1 };
    let count = cmd_frames + request.raw_appends as i64;

    let mut buf = Vec::with_capacity(request.raw.len() + 32);
    append_head(&mut buf, b'*', count);
    append_bytes_frame(&mut buf, first.as_bytes());
    if let Some(second) = second {
        append_bytes_frame(&mut buf, second.as_bytes());
    }
    buf.extend_from_slice(&request.raw);
    buf
}

/// A [`tokio_util::codec::Encoder`] adapter for collaborators that frame an
/// outgoing `AsyncWrite` with `Framed`/`FramedWrite`. Encoding a request is
/// always a single complete write — there's no partial-frame state to keep
/// between calls, unlike a decoder.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestEncoder;

impl Encoder<&Request> for RequestEncoder {
    type Error = RespError;

    fn encode(&mut self, item: &Request, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&write_request(item));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Request;

    #[test]
    fn splits_command_with_embedded_space() {
        assert_eq!(split_cmd("CLIENT KILL"), ("CLIENT", Some("KILL")));
        assert_eq!(split_cmd("GET"), ("GET", None));
    }

    #[test]
    fn frames_single_word_command() {
        let req = Request::new("GET").arg("key");
        assert_eq!(write_request(&req), b"*2\r\n$3\r\nGET\r\n$3\r\nkey\r\n");
    }

    #[test]
    fn frames_two_word_command() {
        let req = Request::new("CLIENT KILL").arg("ID").arg("7");
        assert_eq!(
            write_request(&req),
            b"*4\r\n$6\r\nCLIENT\r\n$4\r\nKILL\r\n$2\r\nID\r\n$1\r\n7\r\n"
        );
    }

    #[test]
    fn frames_integer_argument() {
        let req = Request::new("SET").arg("counter").arg(42i64);
        assert_eq!(
            write_request(&req),
            b"*3\r\n$3\r\nSET\r\n$7\r\ncounter\r\n$2\r\n42\r\n"
        );
    }
}
