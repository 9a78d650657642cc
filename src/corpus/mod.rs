//! External shard corpus: format, enumeration and decoding.

pub mod decoder;
pub mod enumerator;
pub mod format;

pub use decoder::{decode_shard, ShardDecoder};
pub use enumerator::{CorpusKind, ShardEnumerator, ShardRef, Shards};
pub use format::{encode_shard, write_shard, EntityRecord, EntityShard};
