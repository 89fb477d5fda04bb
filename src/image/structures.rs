use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use std::io::Cursor;

use crate::error::{Error, Result};

/// Magic value at the start of every entry header (`"ESfs"` little-endian)
pub const ESPFS_MAGIC: u32 = 0x7366_5345;

/// Entries start on this boundary relative to the image base
pub const ENTRY_ALIGN: u64 = 4;

/// Set on the terminal entry; nothing after it is part of the image
pub const FLAG_LAST_FILE: u8 = 1 << 0;

/// Payload is a gzip stream to be served with `Content-Encoding: gzip`
pub const FLAG_GZIP: u8 = 1 << 1;

/// Entry compression kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Heatshrink,
    Unknown(u8),
}

impl Compression {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Compression::None,
            1 => Compression::Heatshrink,
            _ => Compression::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            Compression::None => 0,
            Compression::Heatshrink => 1,
            Compression::Unknown(v) => *v,
        }
    }

    /// Whether reads go through a streaming decoder
    pub fn is_compressed(&self) -> bool {
        !matches!(self, Compression::None)
    }
}

/// Fixed-size header at the start of every entry - 16 bytes
///
/// Followed by `name_len` bytes of NUL-terminated name, then
/// `compressed_len` bytes of payload, then zero padding up to the next
/// [`ENTRY_ALIGN`] boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryHeader {
    pub magic: u32,
    pub flags: u8,
    pub compression: Compression,
    pub name_len: u16,
    pub compressed_len: u32,
    pub decompressed_len: u32,
}

impl EntryHeader {
    pub const SIZE: usize = 16;

    /// Byte offset of the flags field within the header
    pub const FLAGS_OFFSET: u64 = 4;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::corrupt(format!(
                "entry header needs {} bytes, got {}",
                Self::SIZE,
                data.len()
            )));
        }

        let mut cursor = Cursor::new(data);

        Ok(Self {
            magic: cursor.read_u32::<LittleEndian>()?,
            flags: cursor.read_u8()?,
            compression: Compression::from_u8(cursor.read_u8()?),
            name_len: cursor.read_u16::<LittleEndian>()?,
            compressed_len: cursor.read_u32::<LittleEndian>()?,
            decompressed_len: cursor.read_u32::<LittleEndian>()?,
        })
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        LittleEndian::write_u32(&mut out[0..4], self.magic);
        out[4] = self.flags;
        out[5] = self.compression.as_u8();
        LittleEndian::write_u16(&mut out[6..8], self.name_len);
        LittleEndian::write_u32(&mut out[8..12], self.compressed_len);
        LittleEndian::write_u32(&mut out[12..16], self.decompressed_len);
        out
    }

    pub fn has_valid_magic(&self) -> bool {
        self.magic == ESPFS_MAGIC
    }

    pub fn is_last(&self) -> bool {
        self.flags & FLAG_LAST_FILE != 0
    }

    pub fn is_gzip(&self) -> bool {
        self.flags & FLAG_GZIP != 0
    }

    /// Bytes covered by header, name and payload, before alignment padding
    pub fn entry_len(&self) -> u64 {
        Self::SIZE as u64 + u64::from(self.name_len) + u64::from(self.compressed_len)
    }
}

/// Round `offset` up to the next entry boundary
pub fn align_up(offset: u64) -> u64 {
    offset.next_multiple_of(ENTRY_ALIGN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_little_endian() {
        let raw = [
            b'E', b'S', b'f', b's', // magic
            0x02, 0x01, // flags, compression
            0x0c, 0x00, // name_len
            0x34, 0x12, 0x00, 0x00, // compressed_len
            0x78, 0x56, 0x00, 0x00, // decompressed_len
        ];
        let header = EntryHeader::from_bytes(&raw).unwrap();

        assert!(header.has_valid_magic());
        assert!(header.is_gzip());
        assert!(!header.is_last());
        assert_eq!(header.compression, Compression::Heatshrink);
        assert_eq!(header.name_len, 12);
        assert_eq!(header.compressed_len, 0x1234);
        assert_eq!(header.decompressed_len, 0x5678);
        assert_eq!(header.entry_len(), 16 + 12 + 0x1234);
        assert_eq!(header.to_bytes(), raw);
    }

    #[test]
    fn short_header_is_corrupt() {
        assert!(matches!(
            EntryHeader::from_bytes(&[0u8; 15]),
            Err(Error::Corrupt(_))
        ));
    }

    #[test]
    fn unknown_compression_keeps_its_value() {
        assert_eq!(Compression::from_u8(7), Compression::Unknown(7));
        assert_eq!(Compression::Unknown(7).as_u8(), 7);
        assert!(!Compression::None.is_compressed());
        assert!(Compression::Heatshrink.is_compressed());
    }

    #[test]
    fn alignment_rounds_up_to_words() {
        assert_eq!(align_up(0), 0);
        assert_eq!(align_up(1), 4);
        assert_eq!(align_up(4), 4);
        assert_eq!(align_up(37), 40);
    }
}
