//! Error types for the closure engine
//!
//! Two tiers, matching how failures are handled at run time:
//! - `ClosureError`: setup and run-level failures. Fatal.
//! - `ShardError`: one shard could not be decoded. Logged, counted, skipped.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClosureError>;

#[derive(Error, Debug)]
pub enum ClosureError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot read seed file '{path}': {source}")]
    SeedFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot open corpus '{path}': {reason}")]
    Corpus { path: PathBuf, reason: String },

    #[error("Cannot write output '{path}': {source}")]
    Output {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Worker {id} panicked")]
    WorkerPanicked { id: usize },

    #[error("Worker pool channel closed unexpectedly")]
    PoolDisconnected,
}

/// Failure to decode a single shard. Never fatal to the run.
#[derive(Error, Debug)]
pub enum ShardError {
    #[error("Failed to open shard '{path}': {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read shard '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to decompress shard '{path}': {source}")]
    Gzip {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed shard '{path}': {source}")]
    Decode {
        path: PathBuf,
        source: prost::DecodeError,
    },

    #[error("Worker panicked while processing shard '{path}'")]
    Panicked { path: PathBuf },
}

impl ShardError {
    /// Path of the shard that failed.
    pub fn path(&self) -> &PathBuf {
        match self {
            ShardError::Open { path, .. }
            | ShardError::Read { path, .. }
            | ShardError::Gzip { path, .. }
            | ShardError::Decode { path, .. }
            | ShardError::Panicked { path } => path,
        }
    }

    /// True when the failure came from the gzip layer rather than the payload.
    pub fn is_compression(&self) -> bool {
        matches!(self, ShardError::Gzip { .. })
    }
}

/// Invalid run configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount { count: usize, max: usize },

    #[error("Invalid queue size {size}: must be at least {min}")]
    InvalidQueueSize { size: usize, min: usize },

    #[error("Invalid iteration cap {cap}: must be at least 1")]
    InvalidIterationCap { cap: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_error_path() {
        let err = ShardError::Panicked {
            path: PathBuf::from("/corpus/part-0001.pb"),
        };
        assert_eq!(err.path(), &PathBuf::from("/corpus/part-0001.pb"));
        assert!(!err.is_compression());
    }

    #[test]
    fn test_gzip_error_is_compression() {
        let err = ShardError::Gzip {
            path: PathBuf::from("a.pb.gz"),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, "bad header"),
        };
        assert!(err.is_compression());
        assert!(err.to_string().contains("a.pb.gz"));
    }

    #[test]
    fn test_config_error_conversion() {
        let err: ClosureError = ConfigError::InvalidIterationCap { cap: 0 }.into();
        assert!(matches!(err, ClosureError::Config(_)));
        assert_eq!(
            err.to_string(),
            "Configuration error: Invalid iteration cap 0: must be at least 1"
        );
    }
}
