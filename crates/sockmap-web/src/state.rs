//! Shared application state and the global allocator.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::sync::{Arc, Mutex};

use axum::extract::State;

#[cfg(target_os = "linux")]
use sockmap_core::collector::RealFs;
#[cfg(not(target_os = "linux"))]
use sockmap_core::collector::MockFs;
use sockmap_core::tracer::Tracer;

/// Filesystem backing the tracer: the live kernel on Linux, a mock
/// system elsewhere so the server stays runnable in development.
#[cfg(target_os = "linux")]
pub(crate) type Fs = RealFs;
#[cfg(not(target_os = "linux"))]
pub(crate) type Fs = MockFs;

/// One tracer behind a mutex. Traces are serialized: the classifier
/// keeps cross-snapshot history and concurrent traces would race it.
pub(crate) type SharedTracer = Arc<Mutex<Tracer<Fs>>>;

pub(crate) type AppState = State<SharedTracer>;
