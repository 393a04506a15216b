//! Filesystem primitives shared by the burrow archive codec.
//!
//! - `split.rs` - chunked byte streams (`<prefix>.0`, `<prefix>.1`, ...)
//! - `metadata.rs` - POSIX mode/owner/mtime accessors
//! - `symlink.rs` - symlink creation over placeholders

mod error;
pub mod metadata;
pub mod split;
mod symlink;

pub use error::{Error, Result};
pub use metadata::{PosixMetadata, apply_mode, apply_mtime, apply_owner};
pub use split::{SplitReader, SplitWriter, chunk_name};
pub use symlink::replace_symlink;
