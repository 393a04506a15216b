//! Chunked, compressed tar archives for backup and restore.
//!
//! # Architecture
//!
//! - `create.rs` - Walk, filter, serialize, compress, split
//! - `extract.rs` - Join, decompress, check, materialize
//! - `format.rs` - Compression codecs keyed by a one-letter tag
//! - `filter.rs` - Regex inclusion/exclusion of relative paths
//! - `sanitize.rs` - Path sanitization (zip-slip prevention)
//! - `remap.rs` - Symlink target rewriting under `/data/app`
//! - `walk.rs` - Source tree traversal
//! - `entry.rs` - Archive records and their tar headers
//! - `report.rs` - Extraction outcome

pub use create::create;
pub use entry::{ArchiveEntry, EntryKind};
pub use error::{Error, Result};
pub use extract::extract;
pub use filter::{Filter, FilterSpec};
pub use format::{CompressionKind, Decoder, Encoder};
pub use options::{CreateOptions, DEFAULT_CHUNK_SIZE, ExtractOptions};
pub use remap::{PathRemapRule, VOLATILE_APP_ROOT};
pub use report::{ExtractReport, MetadataFailure, MetadataField};
pub use sanitize::{SanitizedPath, ensure_within, sanitize_entry_path};
pub use walk::{TreeWalker, WalkEntry};

mod create;
pub mod entry;
mod error;
mod extract;
pub mod filter;
mod format;
pub mod options;
pub mod remap;
mod report;
mod sanitize;
mod walk;
