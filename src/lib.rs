//! Discogs version-identification cliques - shared modules for the
//! `clique-finder` binary and the tests.

pub mod artists;
pub mod cliques;
pub mod config;
pub mod error;
pub mod merge;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod progress;
pub mod safety;
pub mod serialize;
pub mod tracks;
pub mod versions;

pub use config::{ClusterOptions, RunConfig, TitleKeySource};
pub use error::ClusterError;
pub use pipeline::{cluster_streams, run, RunSummary};
