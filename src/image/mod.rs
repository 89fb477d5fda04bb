//! EspFs image parsing and file access.
//!
//! ## Architecture
//!
//! - [`structures`]: the on-image entry header and its constants
//! - [`parser`]: image validation and the directory scan behind `open`
//! - [`file`]: open file handles with streaming reads and seeking
//! - [`store`]: an optional holder for a single active image
//!
//! ## Image Format Overview
//!
//! An image is a sequence of entries, each laid out as:
//! 1. A 16-byte little-endian header (magic, flags, compression, name
//!    length, compressed length, decompressed length)
//! 2. The NUL-terminated name, `name_len` bytes
//! 3. The payload, `compressed_len` bytes
//! 4. Zero padding to the next 4-byte boundary
//!
//! The last entry carries `FLAG_LAST_FILE` and ends the image. There is no
//! index; lookups scan from the start.
//!
//! ## Limitations
//!
//! - No directory listing
//! - Compressed entries cannot seek anywhere but back to the start

mod file;
mod parser;
mod store;
mod structures;

pub use file::{EspFsFile, Whence};
pub use parser::EspFs;
pub use store::Store;
pub use structures::*;
