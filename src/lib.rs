//! # rdbsplit
//!
//! `rdbsplit` splits one large Redis RDB snapshot into several smaller,
//! independently loadable snapshots (`part1.rdb`, `part2.rdb`, ...), each
//! holding roughly a target number of bytes of key data.
//!
//! ## Key Features
//!
//! * **Streaming**: Records are decoded and re-encoded one at a time.
//! * **Order Preserving**: Keys keep their source order across parts.
//! * **Loadable Parts**: Every part is a complete RDB with its own database
//!   section headers and CRC64 trailer.
//! * **Wide Input Support**: RDB versions 1 through 12, including ziplist,
//!   listpack, intset and quicklist encodings.
//!
//! ## Example
//!
//! ```no_run
//! use rdbsplit::{SplitOptions, split_file};
//! use std::path::Path;
//!
//! # fn main() -> rdbsplit::Result<()> {
//! let options = SplitOptions::new("rdb_dir").with_target_size_gb(4);
//! let report = split_file(Path::new("dump.rdb"), &options)?;
//! println!("{} parts", report.parts());
//! # Ok(())
//! # }
//! ```

mod config;
mod decoder;
mod encoder;
mod error;
pub mod format;
pub mod logging;
mod lzf;
mod output;
mod packed;
mod record;
mod shard;
mod source;
mod split;
mod splitter;
mod util;

// Re-exports for the flat public API
pub use config::{GIB, ReadStrategy, SectionCounts, SplitOptions};
pub use decoder::{Decoder, RecordSource};
pub use encoder::{ContainerWriter, Encoder};
pub use error::{Error, Result};
pub use output::{DirOutput, MemoryOutput, SharedBuffer, ShardOutput, warn_stale};
pub use record::{Payload, Record, UnsupportedKind, ZSetEntry};
pub use shard::{AUX_FIELDS, Shard, ShardSummary};
pub use source::SourceReader;
pub use split::split_file;
pub use splitter::{SplitReport, Splitter};
pub use util::{list_shards, parse_shard_index, shard_filename};
