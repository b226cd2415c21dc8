//! The RESP2 reply type and the zero-copy reader that decodes it.
//!
//! Mirrors the recursive-descent shape of the teacher's `parser.rs`, but
//! targets the spec's contract directly: one `read_response` call consumes
//! exactly one top-level value from an async buffered byte stream, bulk
//! payloads are backed by a [`BufferPool`](crate::bufpool::BufferPool), and
//! server-reported conditions (redirects, `LOADING`, a plain command error)
//! come back as an `Ok(Reply::Err(..))` value rather than a Rust `Err` —
//! only genuinely fatal transport/framing failures take the `Err` path.
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::bufpool::BufferPool;
use crate::error::RespError;
use crate::intcodec::parse_int;

/// Bound on a single RESP header line (everything up to, but not including,
/// the terminating `\r\n`). Exceeding it yields `HeaderlineTooLarge` instead
/// of unbounded buffering.
pub const MAX_HEADER_LINE: usize = 64 * 1024;

/// A decoded bulk string, distinguishing nil from empty and from
/// pool-backed storage that must be released exactly once.
#[derive(Debug)]
pub enum Bulk {
    Nil,
    /// An owned, caller-held copy (used when wrapping is off).
    Owned(Bytes),
    /// A pool-backed buffer; dropping this releases it back to the pool.
    Pooled(PooledBulk),
}

impl Bulk {
    pub fn as_slice(&self) -> Option<&[u8]> {
        match self {
            Bulk::Nil => None,
            Bulk::Owned(b) => Some(b),
            Bulk::Pooled(p) => Some(p.as_slice()),
        }
    }
}

impl PartialEq for Bulk {
    fn eq(&self, other: &Self) -> bool {
        matches!(self, Bulk::Nil) == matches!(other, Bulk::Nil) && self.as_slice() == other.as_slice()
    }
}

/// A pool-backed bulk string. The buffer returns to its
/// [`BufferPool`](crate::bufpool::BufferPool) when this value is dropped —
/// Rust's ownership model gives us the "exactly one release" invariant for
/// free, so there's no separate `release()` call to forget.
pub struct PooledBulk {
    buf: Vec<u8>,
    len: usize,
    pool: Arc<BufferPool>,
}

impl PooledBulk {
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

impl std::fmt::Debug for PooledBulk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PooledBulk").field(&self.as_slice()).finish()
    }
}

impl Drop for PooledBulk {
    fn drop(&mut self) {
        self.pool.put(std::mem::take(&mut self.buf));
    }
}

/// The decoded RESP value: a tagged union so that nil bulk/array and
/// server-reported error conditions are distinct, inspectable variants
/// rather than a sentinel null or a side-channel exception.
#[derive(Debug, PartialEq)]
pub enum Reply {
    Status(Bytes),
    Int(i64),
    Bulk(Bulk),
    /// `None` is a nil array (`*-1\r\n`).
    Array(Option<Vec<Reply>>),
    /// A server-reported condition: a plain command error, a cluster
    /// redirect, or a transient-state notice. See
    /// [`RespError::is_result_error`] for which kinds are legitimate array
    /// elements versus which ones short-circuit array decoding.
    Err(RespError),
}

impl PartialEq for RespError {
    fn eq(&self, other: &Self) -> bool {
        format!("{self:?}") == format!("{other:?}")
    }
}

fn classify_error_line(body: &[u8]) -> RespError {
    let text = String::from_utf8_lossy(body).into_owned();

    if let Some(rest) = text.strip_prefix("MOVED ").or_else(|| text.strip_prefix("ASK ")) {
        let is_moved = text.starts_with("MOVED ");
        let mut fields = rest.splitn(2, ' ');
        let (slot_field, endpoint_field) = (fields.next(), fields.next());
        return match (slot_field, endpoint_field) {
            (Some(slot_str), Some(endpoint)) => match slot_str.parse::<u16>() {
                Ok(slot) if is_moved => {
                    tracing::trace!(slot, moved_to = endpoint, "MOVED redirect");
                    RespError::Moved {
                        moved_to: endpoint.to_string(),
                        slot,
                    }
                }
                Ok(slot) => {
                    tracing::trace!(slot, moved_to = endpoint, "ASK redirect");
                    RespError::Ask {
                        moved_to: endpoint.to_string(),
                        slot,
                    }
                }
                Err(_) => RespError::ResponseFormat {
                    line: body.to_vec(),
                },
            },
            _ => RespError::ResponseFormat {
                line: body.to_vec(),
            },
        };
    }

    if text.starts_with("LOADING") {
        return RespError::Loading(text);
    }
    if text.starts_with("EXECABORT") {
        return RespError::ExecAbort(text);
    }
    if text.starts_with("TRYAGAIN") {
        return RespError::TryAgain(text);
    }
    RespError::Result(text)
}

/// Reads one RESP header line (the bytes up to but excluding `\r\n`),
/// bounded by [`MAX_HEADER_LINE`].
async fn read_header_line<R: AsyncBufRead + Unpin>(stream: &mut R) -> Result<Vec<u8>, RespError> {
    let mut line = Vec::new();
    loop {
        let avail = stream.fill_buf().await?;
        if avail.is_empty() {
            return Err(RespError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed while reading a header line",
            )));
        }
        match memchr::memchr(b'\n', avail) {
            Some(pos) => {
                if line.len() + pos > MAX_HEADER_LINE {
                    let room = MAX_HEADER_LINE.saturating_sub(line.len());
                    line.extend_from_slice(&avail[..room]);
                    stream.consume(pos + 1);
                    return Err(RespError::HeaderlineTooLarge { line });
                }
                line.extend_from_slice(&avail[..pos]);
                stream.consume(pos + 1);
                break;
            }
            None => {
                let n = avail.len();
                if line.len() + n > MAX_HEADER_LINE {
                    let room = MAX_HEADER_LINE.saturating_sub(line.len());
                    line.extend_from_slice(&avail[..room]);
                    stream.consume(n);
                    return Err(RespError::HeaderlineTooLarge { line });
                }
                line.extend_from_slice(avail);
                stream.consume(n);
            }
        }
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Ok(line)
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Decodes exactly one RESP value from `stream`.
///
/// `wrap_bulk_bytes` selects the ownership mode for bulk strings: `false`
/// returns an owned [`Bulk::Owned`] copy, `true` returns a [`Bulk::Pooled`]
/// handle backed by `pool` (see module docs). Array elements are always
/// read with `wrap_bulk_bytes=false`, per §4.C.
pub fn read_response<'a, R>(
    stream: &'a mut R,
    pool: &'a Arc<BufferPool>,
    wrap_bulk_bytes: bool,
) -> BoxFuture<'a, Result<Reply, RespError>>
where
    R: AsyncBufRead + Unpin + Send,
{
    Box::pin(async move {
        let line = read_header_line(stream).await?;
        if line.is_empty() {
            return Err(RespError::HeaderlineEmpty);
        }

        match line[0] {
            b'+' => Ok(Reply::Status(Bytes::copy_from_slice(&line[1..]))),
            b'-' => Ok(Reply::Err(classify_error_line(&line[1..]))),
            b':' => Ok(Reply::Int(parse_int(&line[1..])?)),
            b'$' => read_bulk(stream, pool, &line, wrap_bulk_bytes).await,
            b'*' => read_array(stream, pool, &line).await,
            _ => Err(RespError::UnknownHeaderType),
        }
    })
}

async fn read_bulk<R>(
    stream: &mut R,
    pool: &Arc<BufferPool>,
    line: &[u8],
    wrap_bulk_bytes: bool,
) -> Result<Reply, RespError>
where
    R: AsyncBufRead + Unpin + Send,
{
    let len = parse_int(&line[1..])?;
    if len < 0 {
        return Ok(Reply::Bulk(Bulk::Nil));
    }
    let len = len as usize;

    let mut buf = pool.get(len + 2);
    if let Err(e) = stream.read_exact(&mut buf).await {
        pool.put(buf);
        return Err(RespError::Io(e));
    }

    if buf[len] != b'\r' || buf[len + 1] != b'\n' {
        pool.put(buf);
        return Err(RespError::NoFinalRn);
    }

    if wrap_bulk_bytes {
        Ok(Reply::Bulk(Bulk::Pooled(PooledBulk {
            buf,
            len,
            pool: Arc::clone(pool),
        })))
    } else {
        let owned = Bytes::copy_from_slice(&buf[..len]);
        pool.put(buf);
        Ok(Reply::Bulk(Bulk::Owned(owned)))
    }
}

async fn read_array<R>(
    stream: &mut R,
    pool: &Arc<BufferPool>,
    line: &[u8],
) -> Result<Reply, RespError>
where
    R: AsyncBufRead + Unpin + Send,
{
    let len = parse_int(&line[1..])?;
    if len < 0 {
        return Ok(Reply::Array(None));
    }
    let mut values = Vec::with_capacity(len as usize);
    for _ in 0..len {
        let elem = read_response(stream, pool, false).await?;
        if let Reply::Err(e) = elem {
            if e.is_result_error() {
                values.push(Reply::Err(e));
            } else {
                return Err(e);
            }
        } else {
            values.push(elem);
        }
    }
    Ok(Reply::Array(Some(values)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tokio::io::BufReader;

    async fn decode(bytes: &[u8], pool: &Arc<BufferPool>, wrap: bool) -> Result<Reply, RespError> {
        let mut reader = BufReader::new(Cursor::new(bytes));
        read_response(&mut reader, pool, wrap).await
    }

    #[tokio::test]
    async fn decodes_simple_string() {
        let pool = Arc::new(BufferPool::new());
        let reply = decode(b"+OK\r\n", &pool, false).await.unwrap();
        assert_eq!(reply, Reply::Status(Bytes::from_static(b"OK")));
    }

    #[tokio::test]
    async fn decodes_integer() {
        let pool = Arc::new(BufferPool::new());
        let reply = decode(b":1000\r\n", &pool, false).await.unwrap();
        assert_eq!(reply, Reply::Int(1000));
    }

    #[tokio::test]
    async fn decodes_nil_bulk() {
        let pool = Arc::new(BufferPool::new());
        let reply = decode(b"$-1\r\n", &pool, false).await.unwrap();
        assert_eq!(reply, Reply::Bulk(Bulk::Nil));
    }

    #[tokio::test]
    async fn decodes_bulk_owned() {
        let pool = Arc::new(BufferPool::new());
        let reply = decode(b"$5\r\nhello\r\n", &pool, false).await.unwrap();
        assert_eq!(reply, Reply::Bulk(Bulk::Owned(Bytes::from_static(b"hello"))));
    }

    #[tokio::test]
    async fn decodes_bulk_wrapped_and_releases_on_drop() {
        let pool = Arc::new(BufferPool::new());
        let reply = decode(b"$5\r\nhello\r\n", &pool, true).await.unwrap();
        let Reply::Bulk(Bulk::Pooled(p)) = reply else {
            panic!("expected pooled bulk");
        };
        assert_eq!(p.as_slice(), b"hello");
        let class_size = p.buf.capacity();
        drop(p);
        // the buffer should be back in the pool, recycled on the next get().
        let recycled = pool.get(class_size);
        assert_eq!(recycled.capacity(), class_size);
    }

    #[tokio::test]
    async fn missing_trailing_crlf_is_an_error() {
        let pool = Arc::new(BufferPool::new());
        let err = decode(b"$5\r\nhelloXX", &pool, false).await.unwrap_err();
        assert!(matches!(err, RespError::NoFinalRn));
    }

    #[tokio::test]
    async fn decodes_nil_array() {
        let pool = Arc::new(BufferPool::new());
        let reply = decode(b"*-1\r\n", &pool, false).await.unwrap();
        assert_eq!(reply, Reply::Array(None));
    }

    #[tokio::test]
    async fn decodes_array_of_bulks() {
        let pool = Arc::new(BufferPool::new());
        let reply = decode(b"*2\r\n$4\r\nECHO\r\n$3\r\nhey\r\n", &pool, false)
            .await
            .unwrap();
        assert_eq!(
            reply,
            Reply::Array(Some(vec![
                Reply::Bulk(Bulk::Owned(Bytes::from_static(b"ECHO"))),
                Reply::Bulk(Bulk::Owned(Bytes::from_static(b"hey"))),
            ]))
        );
    }

    #[tokio::test]
    async fn array_preserves_result_error_elements() {
        let pool = Arc::new(BufferPool::new());
        let reply = decode(
            b"*2\r\n$2\r\nok\r\n-WRONGTYPE Operation against a key\r\n",
            &pool,
            false,
        )
        .await
        .unwrap();
        let Reply::Array(Some(elems)) = reply else {
            panic!("expected array");
        };
        assert_eq!(elems.len(), 2);
        assert!(matches!(elems[1], Reply::Err(RespError::Result(_))));
    }

    #[tokio::test]
    async fn array_short_circuits_on_transport_error() {
        // Second element is a bulk string with a bad length header.
        let pool = Arc::new(BufferPool::new());
        let err = decode(b"*2\r\n$2\r\nok\r\n$abc\r\n", &pool, false)
            .await
            .unwrap_err();
        assert!(matches!(err, RespError::IntegerParsing { .. }));
    }

    #[tokio::test]
    async fn array_short_circuits_on_moved() {
        let pool = Arc::new(BufferPool::new());
        let err = decode(
            b"*2\r\n$2\r\nok\r\n-MOVED 1234 10.0.0.1:6379\r\n",
            &pool,
            false,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RespError::Moved { slot: 1234, .. }));
    }

    #[tokio::test]
    async fn decodes_moved_redirect() {
        let pool = Arc::new(BufferPool::new());
        let reply = decode(b"-MOVED 1234 10.0.0.1:6379\r\n", &pool, false)
            .await
            .unwrap();
        assert_eq!(
            reply,
            Reply::Err(RespError::Moved {
                moved_to: "10.0.0.1:6379".into(),
                slot: 1234
            })
        );
    }

    #[tokio::test]
    async fn decodes_ask_redirect() {
        let pool = Arc::new(BufferPool::new());
        let reply = decode(b"-ASK 7 host:1\r\n", &pool, false).await.unwrap();
        assert_eq!(
            reply,
            Reply::Err(RespError::Ask {
                moved_to: "host:1".into(),
                slot: 7
            })
        );
    }

    #[tokio::test]
    async fn malformed_moved_is_response_format_error() {
        let pool = Arc::new(BufferPool::new());
        let reply = decode(b"-MOVED notaslot x\r\n", &pool, false).await.unwrap();
        assert!(matches!(reply, Reply::Err(RespError::ResponseFormat { .. })));
    }

    #[tokio::test]
    async fn unknown_header_byte_is_an_error() {
        let pool = Arc::new(BufferPool::new());
        let err = decode(b"^nope\r\n", &pool, false).await.unwrap_err();
        assert!(matches!(err, RespError::UnknownHeaderType));
    }

    #[tokio::test]
    async fn empty_header_line_is_an_error() {
        let pool = Arc::new(BufferPool::new());
        let err = decode(b"\r\n", &pool, false).await.unwrap_err();
        assert!(matches!(err, RespError::HeaderlineEmpty));
    }

    #[tokio::test]
    async fn oversized_header_line_in_a_single_chunk_is_an_error() {
        // Size the reader's internal buffer to comfortably hold the whole
        // line plus its trailing `\n`, so `fill_buf()` returns it all in
        // one call and `read_header_line` finds the newline on its first
        // pass — this exercises the `Some(pos)` branch, not the
        // incremental "need more data" (`None`) branch.
        let pool = Arc::new(BufferPool::new());
        let mut line = vec![b'+'];
        line.extend(std::iter::repeat(b'x').take(MAX_HEADER_LINE + 10));
        line.extend_from_slice(b"\r\n");
        let mut reader = BufReader::with_capacity(line.len() + 16, Cursor::new(line));
        let err = read_response(&mut reader, &pool, false).await.unwrap_err();
        assert!(matches!(err, RespError::HeaderlineTooLarge { .. }));
    }
}
