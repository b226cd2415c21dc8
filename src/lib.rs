//! Wire-protocol and routing core for a pipelined Redis client.
//!
//! This crate owns three tightly coupled subsystems: the RESP2 codec
//! ([`resp`], [`writer`], [`intcodec`], [`bufpool`]), the pending-request
//! model ([`request`]), and cluster/reconnect support ([`cluster`],
//! [`reconnect`]). The TCP connection task, the topology cache, and the
//! MOVED/ASK retry loop are external collaborators, represented here only
//! by the [`sender::Sender`] trait boundary — no network I/O lives in this
//! crate.
pub mod bufpool;
pub mod cluster;
pub mod config;
pub mod error;
pub mod intcodec;
pub mod reconnect;
pub mod request;
pub mod resp;
pub mod sender;
pub mod writer;

pub use bufpool::BufferPool;
pub use config::{BackoffConfig, PoolConfig};
pub use error::RespError;
pub use reconnect::{
    ConnId, DurationReconnect, ExpBackoffReconnect, NoReconnect, ReconnectThrottle,
};
pub use request::{Arg, FnFuture, ReplyFuture, Request};
pub use resp::{read_response, Bulk, Reply, MAX_HEADER_LINE};
pub use sender::Sender;
pub use writer::{write_request, RequestEncoder};
