//! Image validation and directory scanning.
//!
//! An image is a flat run of entries starting at offset 0. Lookup walks it
//! front to back:
//! 1. Decode the header at the current offset and check its magic
//! 2. Stop at the terminal entry (`FLAG_LAST_FILE`)
//! 3. Compare the stored name against the requested path
//! 4. Otherwise skip header, name and payload, align to 4 bytes, repeat
//!
//! Offsets only ever grow, and every read is checked against the image size,
//! so a scan over any input either matches, reaches the terminal entry or
//! reports corruption.

use tracing::{debug, error, trace};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::io::ReadAt;

use super::file::EspFsFile;
use super::structures::*;

/// An initialized EspFs image.
///
/// Created by [`EspFs::init`] after the first header's magic checks out. All
/// files opened from it borrow it, so it outlives every handle.
pub struct EspFs<R: ReadAt> {
    /// The underlying image bytes
    reader: R,
    /// Total size of the image in bytes
    size: u64,
    config: Config,
}

impl<R: ReadAt> EspFs<R> {
    /// Validate the image behind `reader` with default options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoImage`] if the image does not start with an EspFs
    /// header.
    pub fn init(reader: R) -> Result<Self> {
        Self::with_config(reader, Config::default())
    }

    /// Validate the image behind `reader` with explicit options.
    pub fn with_config(reader: R, config: Config) -> Result<Self> {
        let size = reader.size();

        let mut buf = [0u8; EntryHeader::SIZE];
        let n = reader.read_at(0, &mut buf)?;
        let header = EntryHeader::from_bytes(&buf)?;
        if n < EntryHeader::SIZE || !header.has_valid_magic() {
            error!(
                "Esp magic: {:#x} (should be {:#x}), image size {}",
                header.magic, ESPFS_MAGIC, size
            );
            return Err(Error::NoImage {
                found: header.magic,
            });
        }

        debug!(size, "EspFs image ready");

        Ok(Self {
            reader,
            size,
            config: config.sanitized(),
        })
    }

    /// Get a reference to the underlying reader.
    pub fn reader(&self) -> &R {
        &self.reader
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Decode the entry header at `offset`.
    ///
    /// Headers always sit on 4-byte boundaries, so this goes through the
    /// aligned read path. The magic is not checked here.
    pub fn header_at(&self, offset: u64) -> Result<EntryHeader> {
        let mut buf = [0u8; EntryHeader::SIZE];
        self.reader.read_aligned(offset, &mut buf)?;
        EntryHeader::from_bytes(&buf)
    }

    /// Raw flags byte of the entry whose header starts at `header_offset`.
    pub fn flags_at(&self, header_offset: u64) -> Result<u8> {
        let mut flags = [0u8; 1];
        self.reader
            .read_exact_at(header_offset + EntryHeader::FLAGS_OFFSET, &mut flags)?;
        Ok(flags[0])
    }

    /// Stored name of an entry, up to its NUL terminator.
    ///
    /// At most `max_name_len` bytes are read. Returns `None` when the name
    /// does not fit in that buffer, since a cut-off name must never match.
    fn read_name(&self, offset: u64, name_len: u16) -> Result<Option<Vec<u8>>> {
        let stored = usize::from(name_len);
        let len = stored.min(self.config.max_name_len);
        let mut name = vec![0u8; len];
        self.reader.read_aligned(offset, &mut name)?;
        match name.iter().position(|&b| b == 0) {
            Some(nul) => name.truncate(nul),
            None if stored > len => return Ok(None),
            None => {}
        }
        Ok(Some(name))
    }

    /// Open the file stored under `path`.
    ///
    /// One leading `/` is stripped from both the path and the stored names
    /// before comparing. Further slashes are kept on purpose: `//secret.html`
    /// must not resolve to `secret.html`, or it could slip past a prefix-based
    /// access check done by the caller. The first matching entry wins.
    /// Entries whose name does not fit in `max_name_len` bytes are skipped.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if the scan reaches the terminal entry
    /// - [`Error::Corrupt`] on a bad header magic, a truncated entry or an
    ///   unsupported compression kind
    pub fn open(&self, path: &str) -> Result<EspFsFile<'_, R>> {
        let wanted = normalize_path(path);
        let mut offset = 0u64;

        loop {
            let header = self.header_at(offset)?;

            if !header.has_valid_magic() {
                error!(offset, magic = header.magic, "Magic mismatch. EspFs image broken.");
                return Err(Error::corrupt(format!(
                    "bad entry magic {:#010x} at offset {offset:#x}",
                    header.magic
                )));
            }
            if header.is_last() {
                trace!(offset, "End of image");
                return Err(Error::NotFound(path.to_string()));
            }

            let name_offset = offset + EntryHeader::SIZE as u64;
            let name = self.read_name(name_offset, header.name_len)?;

            match &name {
                Some(name) => trace!(
                    offset,
                    name = %String::from_utf8_lossy(name),
                    name_len = header.name_len,
                    compressed_len = header.compressed_len,
                    compression = header.compression.as_u8(),
                    flags = header.flags,
                    "Found file"
                ),
                None => debug!(
                    offset,
                    name_len = header.name_len,
                    max_name_len = self.config.max_name_len,
                    "Skipping file with oversized name"
                ),
            }

            let matches = name.as_deref().is_some_and(|name| {
                name.strip_prefix(b"/").unwrap_or(name) == wanted.as_bytes()
            });
            if matches {
                let payload = name_offset + u64::from(header.name_len);
                if payload + u64::from(header.compressed_len) > self.size {
                    return Err(Error::corrupt(format!(
                        "entry {wanted} at offset {offset:#x} runs past the end of the image"
                    )));
                }
                return EspFsFile::open(self, offset, &header, payload, wanted);
            }

            offset = align_up(offset + header.entry_len());
        }
    }
}

/// Strip exactly one leading separator.
pub(crate) fn normalize_path(path: &str) -> &str {
    path.strip_prefix('/').unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ImageBuilder;

    fn sample() -> Vec<u8> {
        ImageBuilder::new()
            .add("index.html", b"<h1>hi</h1>", Compression::None)
            .add("style.css", b"body{}", Compression::Heatshrink)
            .build()
    }

    #[test]
    fn init_rejects_foreign_data() {
        assert!(matches!(
            EspFs::init(b"PK\x03\x04 definitely not espfs".to_vec()),
            Err(Error::NoImage { found: 0x0403_4b50 })
        ));
        assert!(matches!(
            EspFs::init(Vec::new()),
            Err(Error::NoImage { found: 0 })
        ));
    }

    #[test]
    fn init_rejects_image_shorter_than_a_header() {
        let mut image = sample();
        image.truncate(EntryHeader::SIZE - 1);
        assert!(matches!(EspFs::init(image), Err(Error::NoImage { .. })));
    }

    #[test]
    fn header_at_walks_entries() {
        let fs = EspFs::init(sample()).unwrap();
        let first = fs.header_at(0).unwrap();
        assert!(first.has_valid_magic());
        assert_eq!(first.decompressed_len, 11);
        assert_eq!(fs.flags_at(0).unwrap(), first.flags);

        let second = fs.header_at(align_up(first.entry_len())).unwrap();
        assert_eq!(second.compression, Compression::Heatshrink);
        assert_eq!(second.decompressed_len, 6);
    }

    #[test]
    fn missing_path_is_not_found() {
        let fs = EspFs::init(sample()).unwrap();
        match fs.open("missing.html") {
            Err(Error::NotFound(path)) => assert_eq!(path, "missing.html"),
            other => panic!("expected NotFound, got {:?}", other.err()),
        }
    }

    #[test]
    fn only_one_leading_slash_is_stripped() {
        assert_eq!(normalize_path("/a.html"), "a.html");
        assert_eq!(normalize_path("a.html"), "a.html");
        assert_eq!(normalize_path("//a.html"), "/a.html");
        assert_eq!(normalize_path(""), "");
    }

    #[test]
    fn oversized_names_never_match() {
        let long = format!("{}.html", "a".repeat(300));
        let image = ImageBuilder::new()
            .add(&long, b"long", Compression::None)
            .add("short.html", b"short", Compression::None)
            .build();
        let fs = EspFs::init(image).unwrap();

        assert!(matches!(fs.open(&"a".repeat(256)), Err(Error::NotFound(_))));
        assert!(matches!(fs.open(&long), Err(Error::NotFound(_))));
        assert!(fs.open("short.html").is_ok());
    }

    #[test]
    fn names_within_the_buffer_still_match() {
        let image = ImageBuilder::new()
            .add("assets/very-long-name.js", b"x", Compression::None)
            .add("app.js", b"y", Compression::None)
            .build();
        let config = Config {
            max_name_len: 8,
            ..Config::default()
        };
        let fs = EspFs::with_config(image, config).unwrap();
        // "app.js\0\0" fits in 8 bytes, the first name does not.
        assert!(fs.open("app.js").is_ok());
        assert!(matches!(fs.open("assets/v"), Err(Error::NotFound(_))));
        assert!(matches!(
            fs.open("assets/very-long-name.js"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn truncated_payload_is_corrupt() {
        let mut image = ImageBuilder::new()
            .add("big.bin", &[7u8; 64], Compression::None)
            .build();
        image.truncate(40);
        let fs = EspFs::init(image).unwrap();
        assert!(matches!(fs.open("big.bin"), Err(Error::Corrupt(_))));
    }
}
