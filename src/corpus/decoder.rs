//! Shard decoding: open, optionally gunzip, decode protobuf.
//!
//! Each worker owns one `ShardDecoder` and reuses its read buffer across
//! shards. A shard either decodes completely or contributes nothing: there
//! is no partial-record recovery inside a corrupt shard.

use std::fs::File;
use std::io::Read;

use flate2::read::MultiGzDecoder;
use prost::Message;

use crate::corpus::enumerator::ShardRef;
use crate::corpus::format::{EntityRecord, EntityShard};
use crate::error::ShardError;

/// Read buffers larger than this are released after use.
const MAX_RETAINED_BUFFER: usize = 64 * 1024 * 1024;

#[derive(Debug, Default)]
pub struct ShardDecoder {
    buf: Vec<u8>,
}

impl ShardDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode every record of one shard.
    pub fn decode(&mut self, shard: &ShardRef) -> Result<Vec<EntityRecord>, ShardError> {
        self.buf.clear();

        let decoded = self.fill(shard).and_then(|()| {
            EntityShard::decode(self.buf.as_slice()).map_err(|source| ShardError::Decode {
                path: shard.path.clone(),
                source,
            })
        });

        if self.buf.capacity() > MAX_RETAINED_BUFFER {
            self.buf = Vec::new();
        }

        Ok(decoded?.records)
    }

    /// Read the raw (decompressed) shard bytes into `buf`.
    fn fill(&mut self, shard: &ShardRef) -> Result<(), ShardError> {
        let mut file = File::open(&shard.path).map_err(|source| ShardError::Open {
            path: shard.path.clone(),
            source,
        })?;

        if shard.compressed {
            MultiGzDecoder::new(file)
                .read_to_end(&mut self.buf)
                .map_err(|source| ShardError::Gzip {
                    path: shard.path.clone(),
                    source,
                })?;
        } else {
            if let Ok(meta) = file.metadata() {
                self.buf.reserve(meta.len() as usize);
            }
            file.read_to_end(&mut self.buf)
                .map_err(|source| ShardError::Read {
                    path: shard.path.clone(),
                    source,
                })?;
        }
        Ok(())
    }
}

/// One-shot convenience wrapper around `ShardDecoder`.
pub fn decode_shard(shard: &ShardRef) -> Result<Vec<EntityRecord>, ShardError> {
    ShardDecoder::new().decode(shard)
}
