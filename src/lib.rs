//! # espfs
//!
//! A read-only reader for EspFs images with streaming heatshrink decompression.
//!
//! An EspFs image is a flat blob, usually sitting in flash, holding a run of
//! named entries that are either stored as-is or heatshrink compressed. This
//! library validates such an image, looks files up by path and streams their
//! decompressed content without ever holding a whole file in memory.
//!
//! ## Features
//!
//! - Images from memory (`&[u8]`, `Vec<u8>`) or from a local file
//! - Aligned-only access path for word-addressed flash
//! - Bounded-memory streaming heatshrink decoding
//! - Exact seeking for stored entries, rewind for compressed ones
//! - `std::io::Read` / `std::io::Seek` on open files
//!
//! ## Example
//!
//! ```
//! use espfs::{Compression, EspFs, ImageBuilder};
//!
//! fn main() -> espfs::Result<()> {
//!     // Build an image in memory (normally it comes from flash or a file)
//!     let image = ImageBuilder::new()
//!         .add("index.html", b"<h1>It works!</h1>", Compression::Heatshrink)
//!         .build();
//!
//!     // Validate the image
//!     let fs = EspFs::init(image.as_slice())?;
//!
//!     // Open and stream a file
//!     let mut file = fs.open("/index.html")?;
//!     let mut buf = [0u8; 8];
//!     let mut content = Vec::new();
//!     loop {
//!         let n = file.read(&mut buf)?;
//!         if n == 0 {
//!             break;
//!         }
//!         content.extend_from_slice(&buf[..n]);
//!     }
//!     file.close();
//!
//!     assert_eq!(content, b"<h1>It works!</h1>");
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod image;
pub mod io;

pub use builder::ImageBuilder;
pub use cli::Cli;
pub use codec::{HeatshrinkDecoder, HeatshrinkEncoder, HeatshrinkParams, StreamDecoder};
pub use config::Config;
pub use error::{Error, Result};
pub use image::{Compression, EntryHeader, EspFs, EspFsFile, Store, Whence};
pub use io::{LocalFileReader, ReadAt};
