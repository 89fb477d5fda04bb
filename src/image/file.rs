//! Open file handles: streaming reads and seeking.

use std::fmt;
use std::io;

use tracing::{debug, error, trace};

use crate::codec::{HeatshrinkDecoder, HeatshrinkParams, StreamDecoder};
use crate::error::{Error, Result};
use crate::io::ReadAt;

use super::parser::EspFs;
use super::structures::{Compression, EntryHeader, FLAG_GZIP};

/// Reference point for [`EspFsFile::seek`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Start,
    Current,
    End,
}

impl fmt::Display for Whence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Whence::Start => f.write_str("start"),
            Whence::Current => f.write_str("current"),
            Whence::End => f.write_str("end"),
        }
    }
}

/// A file opened from an [`EspFs`] image.
///
/// Tracks two cursors: the compressed cursor into the stored payload and the
/// decompressed cursor into the logical content. For stored entries they
/// move in lock-step; for compressed entries the decompressed cursor only
/// moves forward as data is decoded, and seeking is limited to rewinding.
pub struct EspFsFile<'fs, R: ReadAt> {
    fs: &'fs EspFs<R>,
    name: String,
    /// Offset of this entry's header in the image
    header_offset: u64,
    compression: Compression,
    /// Absolute offset of the first payload byte
    pos_start: u64,
    /// Payload offset where the codec stream begins (after any parameter byte)
    stream_start: u64,
    compressed_len: u64,
    decompressed_len: u64,
    /// Compressed cursor, relative to `pos_start`
    pos_comp: u64,
    /// Decompressed cursor
    pos_decomp: u64,
    decoder: Option<Box<dyn StreamDecoder>>,
    scratch: Vec<u8>,
    closed: bool,
}

impl<'fs, R: ReadAt> EspFsFile<'fs, R> {
    /// Bind a handle to the entry whose header sits at `header_offset`.
    ///
    /// Anything constructed before an error is dropped on the way out.
    pub(crate) fn open(
        fs: &'fs EspFs<R>,
        header_offset: u64,
        header: &EntryHeader,
        pos_start: u64,
        name: &str,
    ) -> Result<Self> {
        let config = fs.config();
        let compressed_len = u64::from(header.compressed_len);

        let (decoder, stream_start): (Option<Box<dyn StreamDecoder>>, u64) =
            match header.compression {
                Compression::None => (None, 0),
                Compression::Heatshrink => {
                    if compressed_len == 0 {
                        return Err(Error::corrupt(format!(
                            "heatshrink entry {name} has no decoder parameters"
                        )));
                    }
                    // Decoder parameters are stored in the first payload byte.
                    let mut parm = [0u8; 1];
                    fs.reader().read_exact_at(pos_start, &mut parm)?;
                    let params = HeatshrinkParams::from_byte(parm[0])?;
                    debug!(
                        name,
                        window = params.window_sz2(),
                        lookahead = params.lookahead_sz2(),
                        "Heatshrink compressed file"
                    );
                    let decoder: Box<dyn StreamDecoder> = Box::new(HeatshrinkDecoder::new(
                        params,
                        config.decoder_input_buffer,
                    ));
                    (Some(decoder), 1)
                }
                Compression::Unknown(kind) => {
                    error!(name, "Invalid compression: {kind}");
                    return Err(Error::corrupt(format!(
                        "unsupported compression kind {kind} for {name}"
                    )));
                }
            };

        let scratch = if decoder.is_some() {
            vec![0u8; config.feed_chunk]
        } else {
            Vec::new()
        };

        debug!(
            name,
            header_offset,
            compressed_len,
            decompressed_len = header.decompressed_len,
            "Opened file"
        );

        Ok(Self {
            fs,
            name: name.to_string(),
            header_offset,
            compression: header.compression,
            pos_start,
            stream_start,
            compressed_len,
            decompressed_len: u64::from(header.decompressed_len),
            pos_comp: stream_start,
            pos_decomp: 0,
            decoder,
            scratch,
            closed: false,
        })
    }

    /// Name of the entry, without the leading separator
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Length of the decompressed content
    pub fn len(&self) -> u64 {
        self.decompressed_len
    }

    pub fn is_empty(&self) -> bool {
        self.decompressed_len == 0
    }

    /// Bytes of payload as stored in the image
    pub fn compressed_len(&self) -> u64 {
        self.compressed_len
    }

    /// Current decompressed cursor
    pub fn position(&self) -> u64 {
        self.pos_decomp
    }

    /// Current compressed cursor, measured from the first payload byte.
    ///
    /// For heatshrink entries the payload starts with the decoder parameter
    /// byte, so the cursor sits at 1 after open or a rewind.
    pub fn compressed_position(&self) -> u64 {
        self.pos_comp
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Raw flags byte of the entry, re-read from the image.
    pub fn flags(&self) -> Result<u8> {
        if self.closed {
            return Err(Error::Closed);
        }
        self.fs.flags_at(self.header_offset)
    }

    /// Whether the payload is gzip data meant to be served as-is.
    pub fn is_gzip(&self) -> Result<bool> {
        Ok(self.flags()? & FLAG_GZIP != 0)
    }

    /// Read up to `buf.len()` decompressed bytes.
    ///
    /// Returns 0 at end of file, and on every call after that. For compressed
    /// entries a short count does not mean end of file; call again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Corrupt`] if the payload runs out before the declared
    /// length is produced, or the decoder stops making progress.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.closed || buf.is_empty() {
            return Ok(0);
        }
        if self.decoder.is_some() {
            self.read_compressed(buf)
        } else {
            self.read_stored(buf)
        }
    }

    fn read_stored(&mut self, buf: &mut [u8]) -> Result<usize> {
        let remaining = self.compressed_len - self.pos_comp;
        let len = (buf.len() as u64).min(remaining) as usize;
        if len == 0 {
            return Ok(0);
        }

        trace!(len, pos = self.pos_comp, "Reading stored bytes");
        self.fs
            .reader()
            .read_exact_at(self.pos_start + self.pos_comp, &mut buf[..len])?;
        self.pos_comp += len as u64;
        self.pos_decomp += len as u64;
        Ok(len)
    }

    /// Feed-then-drain loop over the entry's codec stream.
    ///
    /// Each pass pushes at most one scratch chunk of compressed bytes into the
    /// decoder and drains whatever it has ready into `buf`. The loop keeps
    /// going until `buf` is full or the compressed input is exhausted, in
    /// which case the bytes produced so far are returned.
    fn read_compressed(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.pos_decomp >= self.decompressed_len {
            return Ok(0);
        }

        let fs = self.fs;
        let stall_limit = fs.config().stall_limit;
        let Some(decoder) = self.decoder.as_mut() else {
            return Ok(0);
        };

        // Never decode past the declared length, even if the stream would.
        let want = (buf.len() as u64).min(self.decompressed_len - self.pos_decomp) as usize;
        let mut decoded = 0;
        let mut stalled = 0u32;

        while decoded < want {
            let remaining = self.compressed_len - self.pos_comp;
            let mut accepted = 0;
            if remaining > 0 {
                let len = remaining.min(self.scratch.len() as u64) as usize;
                let chunk = &mut self.scratch[..len];
                fs.reader()
                    .read_exact_at(self.pos_start + self.pos_comp, chunk)?;
                accepted = decoder.sink(chunk);
                self.pos_comp += accepted as u64;
            }

            let produced = decoder.poll(&mut buf[decoded..want]);
            self.pos_decomp += produced as u64;
            decoded += produced;

            trace!(
                remaining,
                accepted,
                produced,
                decoded,
                pos_decomp = self.pos_decomp,
                "Feed/poll pass"
            );

            if remaining == 0 {
                if self.pos_decomp == self.decompressed_len {
                    if !decoder.finish() {
                        debug!(name = %self.name, "Decoder still busy at end of stream");
                    }
                    return Ok(decoded);
                }
                if decoded == 0 {
                    return Err(Error::corrupt(format!(
                        "{}: compressed stream ended at {} of {} bytes",
                        self.name, self.pos_decomp, self.decompressed_len
                    )));
                }
                return Ok(decoded);
            }

            if accepted == 0 && produced == 0 {
                stalled += 1;
                if stalled >= stall_limit {
                    return Err(Error::corrupt(format!(
                        "{}: decoder stalled at compressed offset {}",
                        self.name, self.pos_comp
                    )));
                }
            } else {
                stalled = 0;
            }
        }

        Ok(decoded)
    }

    /// Move the decompressed cursor and return its new value.
    ///
    /// Stored entries support every `whence`; the target is clamped to
    /// `0..=len`. Compressed entries only support rewinding to the start and
    /// querying the position (`0` from [`Whence::Current`]).
    pub fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        if self.closed {
            return Err(Error::Closed);
        }

        if self.compression.is_compressed() {
            return match (whence, offset) {
                (Whence::Start, 0) => {
                    self.rewind();
                    Ok(0)
                }
                (Whence::Current, 0) => Ok(self.pos_decomp),
                _ => Err(Error::InvalidSeek { offset, whence }),
            };
        }

        let len = self.compressed_len as i64;
        let base = match whence {
            Whence::Start => 0,
            Whence::Current => self.pos_decomp as i64,
            Whence::End => len,
        };
        let target = base.saturating_add(offset).clamp(0, len) as u64;

        self.pos_comp = target;
        self.pos_decomp = target;
        Ok(target)
    }

    /// Restart the stream from its first byte.
    fn rewind(&mut self) {
        self.pos_comp = self.stream_start;
        self.pos_decomp = 0;
        if let Some(decoder) = self.decoder.as_mut() {
            decoder.reset();
        }
    }

    /// Release the decoder. Closing an already closed handle does nothing.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        if self.decoder.take().is_some() {
            debug!(name = %self.name, "Freed decoder");
        }
        self.scratch = Vec::new();
        self.closed = true;
    }
}

impl<R: ReadAt> io::Read for EspFsFile<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(EspFsFile::read(self, buf)?)
    }
}

impl<R: ReadAt> io::Seek for EspFsFile<'_, R> {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let (offset, whence) = match pos {
            io::SeekFrom::Start(n) => {
                let offset = i64::try_from(n).map_err(|_| {
                    io::Error::new(io::ErrorKind::InvalidInput, "seek offset out of range")
                })?;
                (offset, Whence::Start)
            }
            io::SeekFrom::Current(n) => (n, Whence::Current),
            io::SeekFrom::End(n) => (n, Whence::End),
        };
        Ok(EspFsFile::seek(self, offset, whence)?)
    }
}
