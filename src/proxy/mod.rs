//! Proxy module
//!
//! This module implements the fixed TCP proxy: an accept loop that hands each
//! client connection to a setup task, a dialer abstraction that produces the
//! remote side, two pumps per session, and a bookkeeping loop that owns the
//! registry of open legs and drives shutdown.
//!
//! Only the bookkeeping loop touches the registry. Everything else reports
//! to it over a channel, so the registry needs no lock.

pub mod server;
pub mod dialer;
mod handler;
mod forwarder;
mod message;
mod registry;

pub use server::Proxy;
pub use dialer::{dialer_fn, BoxedStream, FnDialer, ProxyStream, RemoteDialer};
