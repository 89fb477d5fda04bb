//! Heatshrink LZSS bit-stream codec.
//!
//! The stream is a sequence of MSB-first bit fields. A `1` tag bit is
//! followed by an 8-bit literal; a `0` tag bit is followed by a backreference
//! of `window_sz2` bits (distance - 1) and `lookahead_sz2` bits (length - 1)
//! into the last `2^window_sz2` decoded bytes. The final byte is zero padded.

mod decoder;
mod encoder;

pub use decoder::HeatshrinkDecoder;
pub use encoder::HeatshrinkEncoder;

use crate::error::{Error, Result};

/// Window and lookahead exponents shared by encoder and decoder.
///
/// Stored in images as a single byte ahead of the compressed stream: the high
/// nibble is the window exponent, the low nibble the lookahead exponent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeatshrinkParams {
    window_sz2: u8,
    lookahead_sz2: u8,
}

impl HeatshrinkParams {
    pub const MIN_WINDOW_BITS: u8 = 4;
    pub const MAX_WINDOW_BITS: u8 = 15;
    pub const MIN_LOOKAHEAD_BITS: u8 = 3;

    pub fn new(window_sz2: u8, lookahead_sz2: u8) -> Result<Self> {
        if !(Self::MIN_WINDOW_BITS..=Self::MAX_WINDOW_BITS).contains(&window_sz2)
            || lookahead_sz2 < Self::MIN_LOOKAHEAD_BITS
            || lookahead_sz2 >= window_sz2
        {
            return Err(Error::corrupt(format!(
                "invalid heatshrink parameters: window {window_sz2}, lookahead {lookahead_sz2}"
            )));
        }
        Ok(Self {
            window_sz2,
            lookahead_sz2,
        })
    }

    pub fn from_byte(byte: u8) -> Result<Self> {
        Self::new(byte >> 4, byte & 0x0f)
    }

    pub fn to_byte(&self) -> u8 {
        (self.window_sz2 << 4) | self.lookahead_sz2
    }

    pub fn window_sz2(&self) -> u8 {
        self.window_sz2
    }

    pub fn lookahead_sz2(&self) -> u8 {
        self.lookahead_sz2
    }
}

impl Default for HeatshrinkParams {
    fn default() -> Self {
        Self {
            window_sz2: 11,
            lookahead_sz2: 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::StreamDecoder;

    fn decode_all(params: HeatshrinkParams, compressed: &[u8], out_len: usize) -> Vec<u8> {
        let mut decoder = HeatshrinkDecoder::new(params, 16);
        let mut out = Vec::new();
        let mut buf = [0u8; 3];
        let mut input = compressed;
        while out.len() < out_len {
            let accepted = decoder.sink(input);
            input = &input[accepted..];
            let n = decoder.poll(&mut buf);
            out.extend_from_slice(&buf[..n]);
            if accepted == 0 && n == 0 {
                break;
            }
        }
        out
    }

    #[test]
    fn params_round_trip_through_a_byte() {
        let params = HeatshrinkParams::from_byte(0xb4).unwrap();
        assert_eq!(params.window_sz2(), 11);
        assert_eq!(params.lookahead_sz2(), 4);
        assert_eq!(params.to_byte(), 0xb4);
        assert_eq!(HeatshrinkParams::default(), params);
    }

    #[test]
    fn out_of_range_params_are_rejected() {
        for byte in [0x00, 0x34, 0x44, 0x82, 0x88, 0xf0] {
            assert!(
                matches!(HeatshrinkParams::from_byte(byte), Err(Error::Corrupt(_))),
                "{byte:#04x} accepted"
            );
        }
        assert!(HeatshrinkParams::from_byte(0x43).is_ok());
        assert!(HeatshrinkParams::from_byte(0xfe).is_ok());
    }

    #[test]
    fn decodes_single_literal() {
        // 1 01100001 0000000
        let params = HeatshrinkParams::new(8, 4).unwrap();
        assert_eq!(decode_all(params, &[0xb0, 0x80], 1), b"a");
    }

    #[test]
    fn decodes_overlapping_backref() {
        // literal 'a', then backref distance 1 length 3
        let params = HeatshrinkParams::new(4, 3).unwrap();
        assert_eq!(decode_all(params, &[0xb0, 0x81, 0x00], 4), b"aaaa");
    }

    #[test]
    fn encoder_emits_the_same_stream() {
        let params = HeatshrinkParams::new(4, 3).unwrap();
        assert_eq!(
            HeatshrinkEncoder::new(params).compress(b"aaaa"),
            [0xb0, 0x81, 0x00]
        );
        let params = HeatshrinkParams::new(8, 4).unwrap();
        assert_eq!(HeatshrinkEncoder::new(params).compress(b"a"), [0xb0, 0x80]);
    }

    #[test]
    fn round_trips_across_parameter_sets() {
        let text = b"<html><body><p>espfs espfs espfs</p><p>espfs espfs</p></body></html>\n"
            .repeat(40);
        for (w, l) in [(4, 3), (8, 4), (9, 8), (11, 4), (12, 10), (15, 14)] {
            let params = HeatshrinkParams::new(w, l).unwrap();
            let compressed = HeatshrinkEncoder::new(params).compress(&text);
            assert!(compressed.len() < text.len(), "w={w} l={l} did not compress");
            assert_eq!(decode_all(params, &compressed, text.len()), text, "w={w} l={l}");
        }
    }
}
