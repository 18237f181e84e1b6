//! `/proc` filesystem enumerators and their shared error type.

pub mod maps;
pub mod net;
pub mod parser;
pub mod process;

pub use maps::MapsCollector;
pub use net::{RawSocket, SocketScan, SocketTableCollector};
pub use process::{ProcessCollector, ProcessScan, RawProcess};

use std::io;

/// Error type for enumeration failures against an OS introspection surface.
#[derive(Debug)]
pub enum EnumerationError {
    /// The resource could not be read at all (permission denied,
    /// interface absent).
    Unreadable { resource: String, source: io::Error },
    /// The resource was read but its content did not parse.
    Parse { resource: String, message: String },
    /// A process disappeared between discovery and collection.
    ProcessGone(u32),
}

impl std::fmt::Display for EnumerationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnumerationError::Unreadable { resource, source } => {
                write!(f, "cannot read {}: {}", resource, source)
            }
            EnumerationError::Parse { resource, message } => {
                write!(f, "cannot parse {}: {}", resource, message)
            }
            EnumerationError::ProcessGone(pid) => write!(f, "process {} disappeared", pid),
        }
    }
}

impl std::error::Error for EnumerationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EnumerationError::Unreadable { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl EnumerationError {
    pub(crate) fn unreadable(resource: impl Into<String>, source: io::Error) -> Self {
        EnumerationError::Unreadable {
            resource: resource.into(),
            source,
        }
    }
}
