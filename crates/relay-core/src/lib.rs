pub mod agent;
pub mod artifact;
pub mod catalog;
pub mod config;
pub mod error;
pub mod executor;
pub mod graph;
pub mod io;
pub mod paths;
pub mod preset;
pub mod registry;
pub mod run;
pub mod runner;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{RelayError, Result};
