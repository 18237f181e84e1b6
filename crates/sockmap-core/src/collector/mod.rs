//! Raw enumerators over the Linux `/proc` introspection surfaces.
//!
//! Three enumerators, all read-only:
//! - socket tables (`/proc/net/tcp`, `/proc/net/udp`)
//! - per-process identity and counters (`/proc/[pid]/{stat,status,comm}`)
//! - per-process memory maps (`/proc/[pid]/maps`)
//!
//! All of them sit on top of the `FileSystem` trait so that tests run
//! against an in-memory `MockFs` with pre-built scenarios instead of a
//! live kernel.
//!
//! Failure policy: an unreadable resource inside a scan (a process that
//! exited mid-enumeration, a permission-denied maps file) is skipped and
//! surfaces only as a soft-failure count. Callers decide which resources
//! are fatal; for the tracer that is solely the primary TCP socket table.

pub mod mock;
pub mod procfs;
pub mod traits;

pub use mock::MockFs;
pub use procfs::{
    EnumerationError, MapsCollector, ProcessCollector, RawProcess, RawSocket, SocketTableCollector,
};
pub use traits::{FileSystem, RealFs};
