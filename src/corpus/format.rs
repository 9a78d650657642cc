//! Binary shard format.
//!
//! A shard file holds one protobuf-encoded `EntityShard`. Files whose name
//! ends in `.gz` carry the same bytes inside a gzip stream.
//!
//! ```text
//! message EntityRecord { string id = 1; repeated string children = 2; }
//! message EntityShard  { repeated EntityRecord records = 1; }
//! ```

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use prost::Message;
use serde::Serialize;

/// Filename suffix that marks a gzip-compressed shard.
pub const GZIP_SUFFIX: &str = ".gz";

/// One entity and the ids of its children.
#[derive(Clone, PartialEq, Eq, Message, Serialize)]
pub struct EntityRecord {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, repeated, tag = "2")]
    pub children: Vec<String>,
}

impl EntityRecord {
    pub fn new<I, S>(id: impl Into<String>, children: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            children: children.into_iter().map(Into::into).collect(),
        }
    }
}

/// Top-level message of a shard file.
#[derive(Clone, PartialEq, Message)]
pub struct EntityShard {
    #[prost(message, repeated, tag = "1")]
    pub records: Vec<EntityRecord>,
}

/// Whether a shard name signals gzip compression.
pub fn is_compressed_name(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(GZIP_SUFFIX))
}

/// Encode records into raw (uncompressed) shard bytes.
pub fn encode_shard(records: &[EntityRecord]) -> Vec<u8> {
    let shard = EntityShard {
        records: records.to_vec(),
    };
    shard.encode_to_vec()
}

/// Write a shard file, gzip-compressing it when the name ends in `.gz`.
pub fn write_shard(path: &Path, records: &[EntityRecord]) -> io::Result<()> {
    let bytes = encode_shard(records);
    let file = File::create(path)?;

    if is_compressed_name(path) {
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        encoder.write_all(&bytes)?;
        encoder.finish()?.flush()?;
    } else {
        let mut writer = BufWriter::new(file);
        writer.write_all(&bytes)?;
        writer.flush()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compressed_name_detection() {
        assert!(is_compressed_name(Path::new("/data/part-00001.pb.gz")));
        assert!(!is_compressed_name(Path::new("/data/part-00001.pb")));
        assert!(!is_compressed_name(Path::new("/data.gz/part-00001.pb")));
    }

    #[test]
    fn test_empty_shard_encodes_to_empty_payload() {
        assert!(encode_shard(&[]).is_empty());
    }

    #[test]
    fn test_record_field_layout() {
        // tag 1 (id), length 1, "A"; tag 2 (children), length 1, "B"
        let bytes = EntityRecord::new("A", ["B"]).encode_to_vec();
        assert_eq!(bytes, vec![0x0a, 0x01, b'A', 0x12, 0x01, b'B']);
    }
}
