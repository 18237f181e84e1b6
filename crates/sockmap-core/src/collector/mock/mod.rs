//! Mock filesystem and scenario fixtures for off-Linux testing.

mod filesystem;
mod scenarios;

pub use filesystem::MockFs;
