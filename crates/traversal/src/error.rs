//! Error types for the traversal crate.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TraversalError>;

#[derive(Error, Debug)]
pub enum TraversalError {
    /// Config file could not be read
    #[error("failed to read config {}: {source}", path.display())]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid RON for `TraversalConfig`
    #[error("failed to parse config {}: {message}", path.display())]
    ConfigParse { path: PathBuf, message: String },

    /// Config parsed but holds values the state machines cannot run with
    #[error("invalid config value `{field}`: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    /// Ladder anchors missing, coincident, or parallel to the ladder face
    #[error("invalid ladder geometry: {0}")]
    LadderGeometry(String),
}
