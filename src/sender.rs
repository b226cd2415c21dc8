//! The seam between this crate's codec/request/reconnect core and the
//! network layer. No implementation ships here — the connection-pool task
//! that owns the actual socket lives downstream and implements this trait.
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::request::{ReplyFuture, Request};

/// Puts requests on the wire and guarantees exactly one completion per
/// request.
///
/// `send` must deliver exactly one `future.resolve(result, n)` call, unless
/// `future.cancelled()` already returned a cause when `send` was entered —
/// in that case no network write happens and the Sender instead resolves
/// with `RespError::RequestCancelled(cause)`.
///
/// On connection loss mid-flight, in-flight requests are resolved with an
/// `Io` error; requests still queued for send may be re-enqueued on another
/// connection or failed, at the Sender's discretion.
pub trait Sender: Send + Sync {
    /// Sends `request` and arranges for `future` to be resolved with its
    /// result, tagged with the logical index `n` within whatever batch it
    /// belongs to.
    fn send<'a>(
        &'a self,
        request: Request,
        future: Arc<dyn ReplyFuture>,
        n: u64,
    ) -> BoxFuture<'a, ()>;
}
