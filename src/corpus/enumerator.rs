//! Shard enumeration for a corpus root.
//!
//! A corpus is either a single shard file or a directory whose every entry
//! is a shard. Directory listings are streamed from `read_dir` and never
//! collected, so a pass over a corpus of several hundred thousand shards
//! only holds the references currently in flight in the worker queue.
//!
//! The root is validated once by `ShardEnumerator::open`; each pass calls
//! `shards()` again to re-list the same directory.

use std::fs::{self, File, ReadDir};
use std::io;
use std::iter;
use std::path::{Path, PathBuf};

use crate::corpus::format::is_compressed_name;
use crate::error::{ClosureError, Result};

/// Handle naming one independently decodable shard.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShardRef {
    pub path: PathBuf,
    pub compressed: bool,
}

impl ShardRef {
    /// Build a reference, inferring compression from the file name.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let compressed = is_compressed_name(&path);
        Self { path, compressed }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorpusKind {
    File,
    Directory,
}

/// Lists the shards of a corpus root.
#[derive(Debug, Clone)]
pub struct ShardEnumerator {
    root: PathBuf,
    kind: CorpusKind,
}

impl ShardEnumerator {
    /// Validate the corpus root.
    ///
    /// Fails when the path does not exist, a directory cannot be listed, or
    /// a single-file corpus cannot be opened. This is the only place corpus
    /// unreadability is fatal.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let corpus_err = |e: io::Error| ClosureError::Corpus {
            path: root.clone(),
            reason: e.to_string(),
        };

        let meta = fs::metadata(&root).map_err(corpus_err)?;
        let kind = if meta.is_dir() {
            fs::read_dir(&root).map_err(corpus_err)?;
            CorpusKind::Directory
        } else {
            File::open(&root).map_err(corpus_err)?;
            CorpusKind::File
        };

        Ok(Self { root, kind })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn kind(&self) -> CorpusKind {
        self.kind
    }

    /// Start a fresh listing of every shard in the corpus.
    pub fn shards(&self) -> Result<Shards> {
        match self.kind {
            CorpusKind::File => Ok(Shards::Single(iter::once(ShardRef::new(&self.root)))),
            CorpusKind::Directory => {
                let entries = fs::read_dir(&self.root).map_err(|e| ClosureError::Corpus {
                    path: self.root.clone(),
                    reason: e.to_string(),
                })?;
                Ok(Shards::Directory(entries))
            }
        }
    }
}

/// Lazy sequence of shard references for one pass.
///
/// Yields `Err` for directory entries that could not be read; callers
/// count those as failed shards and keep going.
pub enum Shards {
    Single(iter::Once<ShardRef>),
    Directory(ReadDir),
}

impl Iterator for Shards {
    type Item = io::Result<ShardRef>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Shards::Single(once) => once.next().map(Ok),
            Shards::Directory(entries) => entries
                .next()
                .map(|entry| entry.map(|e| ShardRef::new(e.path()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn collect(enumerator: &ShardEnumerator) -> HashSet<ShardRef> {
        enumerator
            .shards()
            .unwrap()
            .map(|s| s.unwrap())
            .collect()
    }

    #[test]
    fn test_single_file_yields_one_shard() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("people.pb.gz");
        fs::write(&path, b"").unwrap();

        let enumerator = ShardEnumerator::open(&path).unwrap();
        assert_eq!(enumerator.kind(), CorpusKind::File);

        let shards = collect(&enumerator);
        assert_eq!(shards.len(), 1);
        let shard = shards.into_iter().next().unwrap();
        assert_eq!(shard.path, path);
        assert!(shard.compressed);
    }

    #[test]
    fn test_directory_yields_every_entry() {
        let dir = TempDir::new().unwrap();
        for i in 0..25 {
            fs::write(dir.path().join(format!("part-{i:05}.pb")), b"").unwrap();
        }

        let enumerator = ShardEnumerator::open(dir.path()).unwrap();
        assert_eq!(enumerator.kind(), CorpusKind::Directory);
        let shards = collect(&enumerator);
        assert_eq!(shards.len(), 25);
        assert!(shards.iter().all(|s| !s.compressed));
    }

    #[test]
    fn test_relisting_is_stable_across_passes() {
        let dir = TempDir::new().unwrap();
        for i in 0..10 {
            fs::write(dir.path().join(format!("s{i}.pb.gz")), b"").unwrap();
        }

        let enumerator = ShardEnumerator::open(dir.path()).unwrap();
        let first = collect(&enumerator);
        let second = collect(&enumerator);
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let dir = TempDir::new().unwrap();
        let err = ShardEnumerator::open(dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, ClosureError::Corpus { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_unopenable_single_file_is_fatal() {
        use std::os::unix::net::UnixListener;

        // A socket has metadata but cannot be opened for reading.
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("corpus.sock");
        let _listener = UnixListener::bind(&path).unwrap();

        let err = ShardEnumerator::open(&path).unwrap_err();
        assert!(matches!(err, ClosureError::Corpus { .. }));
    }

    #[test]
    fn test_root_is_kept() {
        let dir = TempDir::new().unwrap();
        let enumerator = ShardEnumerator::open(dir.path()).unwrap();
        assert_eq!(enumerator.root(), dir.path());
    }

    #[test]
    fn test_empty_directory_yields_nothing() {
        let dir = TempDir::new().unwrap();
        let enumerator = ShardEnumerator::open(dir.path()).unwrap();
        assert_eq!(enumerator.shards().unwrap().count(), 0);
    }
}
