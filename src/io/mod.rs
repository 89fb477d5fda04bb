mod local;
mod memory;

pub use local::LocalFileReader;

use crate::error::{Error, Result};

/// Width of a single aligned read on word-addressed media
pub const WORD_SIZE: u64 = 4;

/// Trait for random access reading from the backing image
///
/// The image is an immutable byte array; offsets are relative to its first
/// byte. Implementations only have to provide [`read_at`](ReadAt::read_at)
/// and [`size`](ReadAt::size).
pub trait ReadAt {
    /// Read data at the specified offset into the buffer
    ///
    /// Returns the number of bytes copied, which is short only when the read
    /// runs off the end of the source.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Get the total size of the data source
    fn size(&self) -> u64;

    /// Fill `buf` from `offset`, failing if the range leaves the image.
    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        check_range(self.size(), offset, buf.len())?;

        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read_at(offset + filled as u64, &mut buf[filled..])?;
            if n == 0 {
                return Err(Error::corrupt(format!(
                    "short read at offset {:#x}",
                    offset + filled as u64
                )));
            }
            filled += n;
        }
        Ok(())
    }

    /// Fill `buf` from `offset` using only whole-word reads at aligned addresses.
    ///
    /// Memory-mapped flash on some targets faults on unaligned word access,
    /// so this fetches every 4-byte word covering the range and copies the
    /// wanted bytes out of it. Media without that restriction may override
    /// this with a plain copy.
    fn read_aligned(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        let size = self.size();
        check_range(size, offset, buf.len())?;

        let mut word = [0u8; WORD_SIZE as usize];
        let mut addr = offset & !(WORD_SIZE - 1);
        let mut written = 0;

        while written < buf.len() {
            // The final word may hang off the end of the image.
            let avail = (size - addr).min(WORD_SIZE) as usize;
            self.read_exact_at(addr, &mut word[..avail])?;

            let skip = offset.saturating_sub(addr) as usize;
            let take = (avail - skip).min(buf.len() - written);
            buf[written..written + take].copy_from_slice(&word[skip..skip + take]);

            written += take;
            addr += WORD_SIZE;
        }
        Ok(())
    }
}

fn check_range(size: u64, offset: u64, len: usize) -> Result<()> {
    match offset.checked_add(len as u64) {
        Some(end) if end <= size => Ok(()),
        _ => Err(Error::corrupt(format!(
            "read of {len} bytes at offset {offset:#x} exceeds image size {size:#x}"
        ))),
    }
}

impl<R: ReadAt + ?Sized> ReadAt for &R {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        (**self).read_at(offset, buf)
    }

    fn size(&self) -> u64 {
        (**self).size()
    }

    fn read_aligned(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        (**self).read_aligned(offset, buf)
    }
}

impl<R: ReadAt + ?Sized> ReadAt for std::sync::Arc<R> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        (**self).read_at(offset, buf)
    }

    fn size(&self) -> u64 {
        (**self).size()
    }

    fn read_aligned(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        (**self).read_aligned(offset, buf)
    }
}
