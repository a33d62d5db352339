//! Graceful-shutdown primitives shared by every long-running component
//! (the Stream Consumer, the Replicator's retry loop, the Supervisor
//! itself).

use std::future::Future;

/// A component that can shut down immediately, with no pending I/O.
pub trait SyncShutdown {
    type Result;
    fn shutdown(&mut self) -> Self::Result;
}

/// A component whose shutdown requires awaiting something — flushing a
/// buffered audit write, finishing an in-flight broker call, closing a
/// socket.
pub trait AsyncShutdown {
    type Result;
    fn shutdown(&mut self) -> impl Future<Output = Self::Result>;
}

/// Marker broadcast on the internal shutdown channel when the
/// Supervisor enters `DRAINING`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Shutdown;
