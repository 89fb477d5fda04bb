//! In-memory image builder.
//!
//! Lays entries out exactly as the image tool does, so tests and tools can
//! produce synthetic images without it.

use crate::codec::{HeatshrinkEncoder, HeatshrinkParams};
use crate::image::{Compression, ENTRY_ALIGN, ESPFS_MAGIC, EntryHeader, FLAG_LAST_FILE, align_up};

struct PendingEntry {
    name: String,
    content: Vec<u8>,
    compression: Compression,
    flags: u8,
}

/// Builds an EspFs image from named contents.
///
/// ```
/// use espfs::{Compression, EspFs, ImageBuilder};
///
/// let image = ImageBuilder::new()
///     .add("index.html", b"<h1>hello</h1>", Compression::Heatshrink)
///     .build();
/// let fs = EspFs::init(image).unwrap();
/// assert_eq!(fs.open("/index.html").unwrap().len(), 14);
/// ```
#[derive(Default)]
pub struct ImageBuilder {
    entries: Vec<PendingEntry>,
    params: HeatshrinkParams,
}

impl ImageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parameters used for every heatshrink entry.
    pub fn heatshrink_params(mut self, params: HeatshrinkParams) -> Self {
        self.params = params;
        self
    }

    pub fn add(self, name: &str, content: &[u8], compression: Compression) -> Self {
        self.add_with_flags(name, content, compression, 0)
    }

    /// Add an entry with extra flag bits (e.g. `FLAG_GZIP`).
    ///
    /// `FLAG_LAST_FILE` is managed by the builder and stripped here.
    pub fn add_with_flags(
        mut self,
        name: &str,
        content: &[u8],
        compression: Compression,
        flags: u8,
    ) -> Self {
        self.entries.push(PendingEntry {
            name: name.to_string(),
            content: content.to_vec(),
            compression,
            flags: flags & !FLAG_LAST_FILE,
        });
        self
    }

    pub fn build(&self) -> Vec<u8> {
        self.build_with_offsets().0
    }

    /// Build the image and return the header offset of every entry, the
    /// terminal entry last.
    ///
    /// # Panics
    ///
    /// Panics if a padded name exceeds 65535 bytes or a payload exceeds
    /// 4 GiB, as neither fits the header fields.
    pub fn build_with_offsets(&self) -> (Vec<u8>, Vec<u64>) {
        let mut image = Vec::new();
        let mut offsets = Vec::with_capacity(self.entries.len() + 1);

        for entry in &self.entries {
            offsets.push(image.len() as u64);

            let payload = match entry.compression {
                Compression::Heatshrink => {
                    let mut payload = vec![self.params.to_byte()];
                    payload.extend(HeatshrinkEncoder::new(self.params).compress(&entry.content));
                    payload
                }
                // Unknown kinds are stored raw so readers can be tested against them.
                Compression::None | Compression::Unknown(_) => entry.content.clone(),
            };

            let mut name = entry.name.as_bytes().to_vec();
            name.push(0);
            name.resize(align_up(name.len() as u64) as usize, 0);

            let Ok(name_len) = u16::try_from(name.len()) else {
                panic!("name of {} bytes does not fit an EspFs header", name.len());
            };
            let (Ok(compressed_len), Ok(decompressed_len)) = (
                u32::try_from(payload.len()),
                u32::try_from(entry.content.len()),
            ) else {
                panic!("{}: content does not fit an EspFs header", entry.name);
            };

            let header = EntryHeader {
                magic: ESPFS_MAGIC,
                flags: entry.flags,
                compression: entry.compression,
                name_len,
                compressed_len,
                decompressed_len,
            };
            image.extend_from_slice(&header.to_bytes());
            image.extend_from_slice(&name);
            image.extend_from_slice(&payload);
            image.resize(align_up(image.len() as u64) as usize, 0);
        }

        offsets.push(image.len() as u64);
        let terminal = EntryHeader {
            magic: ESPFS_MAGIC,
            flags: FLAG_LAST_FILE,
            compression: Compression::None,
            name_len: 0,
            compressed_len: 0,
            decompressed_len: 0,
        };
        image.extend_from_slice(&terminal.to_bytes());

        debug_assert!(offsets.iter().all(|o| o % ENTRY_ALIGN == 0));
        (image, offsets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lays_out_entries_on_word_boundaries() {
        let (image, offsets) = ImageBuilder::new()
            .add("a", b"12345", Compression::None)
            .add("bc", b"", Compression::None)
            .build_with_offsets();

        // 16 header + 4 name ("a\0" padded) + 5 payload -> 25, padded to 28
        assert_eq!(offsets, [0, 28, 48]);
        assert_eq!(image.len(), 48 + EntryHeader::SIZE);
        assert_eq!(&image[16..20], b"a\0\0\0");
        assert_eq!(&image[20..25], b"12345");
        assert_eq!(&image[25..28], [0, 0, 0]);

        let terminal = EntryHeader::from_bytes(&image[48..]).unwrap();
        assert!(terminal.is_last());
        assert!(terminal.has_valid_magic());
    }

    #[test]
    fn heatshrink_payload_starts_with_parameters() {
        let params = HeatshrinkParams::new(8, 4).unwrap();
        let image = ImageBuilder::new()
            .heatshrink_params(params)
            .add("a", b"a", Compression::Heatshrink)
            .build();
        let header = EntryHeader::from_bytes(&image).unwrap();
        assert_eq!(header.compressed_len, 3);
        assert_eq!(header.decompressed_len, 1);
        assert_eq!(&image[20..23], [0x84, 0xb0, 0x80]);
    }

    #[test]
    #[should_panic(expected = "does not fit an EspFs header")]
    fn oversized_name_is_rejected() {
        ImageBuilder::new()
            .add(&"n".repeat(70_000), b"x", Compression::None)
            .build();
    }

    #[test]
    fn last_file_flag_is_reserved() {
        let image = ImageBuilder::new()
            .add_with_flags("a", b"x", Compression::None, 0xff)
            .build();
        let header = EntryHeader::from_bytes(&image).unwrap();
        assert_eq!(header.flags, 0xfe);
    }
}
