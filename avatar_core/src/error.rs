use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the avatar update core.
///
/// Stepping itself never fails. These cover construction, configuration and
/// thread creation only.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// Target simulation rate must be at least one tick per second.
    #[error("invalid target simrate: {0} (must be > 0)")]
    InvalidRate(u32),

    /// The OS refused to create the background update thread.
    #[error("failed to spawn avatar update thread: {0}")]
    Spawn(#[source] io::Error),

    #[error("failed to read config file {path:?}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file {path:?}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

pub type UpdateResult<T> = Result<T, UpdateError>;
