use super::HeatshrinkParams;
use crate::codec::StreamDecoder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    TagBit,
    YieldLiteral,
    BackrefIndexMsb,
    BackrefIndexLsb,
    BackrefCountMsb,
    BackrefCountLsb,
    YieldBackref,
}

/// Output sink for one `poll` call
struct Output<'a> {
    buf: &'a mut [u8],
    written: usize,
}

impl Output<'_> {
    fn has_room(&self) -> bool {
        self.written < self.buf.len()
    }

    fn room(&self) -> usize {
        self.buf.len() - self.written
    }

    fn push(&mut self, byte: u8) {
        self.buf[self.written] = byte;
        self.written += 1;
    }
}

/// Streaming heatshrink decoder with a bounded input buffer.
///
/// Holds a `2^window_sz2` byte history window plus an input buffer of fixed
/// size; nothing else grows with the stream.
pub struct HeatshrinkDecoder {
    params: HeatshrinkParams,
    input: Vec<u8>,
    /// Bytes currently buffered in `input`
    input_size: usize,
    /// Next unread byte in `input`
    input_index: usize,
    window: Vec<u8>,
    head_index: u16,
    /// Remaining bytes of the current backreference
    output_count: u16,
    /// Distance of the current backreference
    output_index: u16,
    state: State,
    current_byte: u8,
    /// Mask of the next bit to read from `current_byte`, 0 when exhausted
    bit_index: u8,
}

impl HeatshrinkDecoder {
    pub fn new(params: HeatshrinkParams, input_buffer_size: usize) -> Self {
        Self {
            params,
            input: vec![0; input_buffer_size.max(1)],
            input_size: 0,
            input_index: 0,
            window: vec![0; 1 << params.window_sz2()],
            head_index: 0,
            output_count: 0,
            output_index: 0,
            state: State::TagBit,
            current_byte: 0,
            bit_index: 0,
        }
    }

    pub fn params(&self) -> HeatshrinkParams {
        self.params
    }

    fn window_mask(&self) -> u16 {
        ((1u32 << self.params.window_sz2()) - 1) as u16
    }

    /// Pull `count` bits MSB-first, or `None` if the input cannot supply
    /// all of them yet.
    fn get_bits(&mut self, count: u8) -> Option<u16> {
        debug_assert!((1..=15).contains(&count));

        // With nothing buffered, only proceed if the current byte alone has
        // enough bits left; otherwise bits would be consumed and then lost.
        if self.input_size == 0 && u16::from(self.bit_index) < (1u16 << (count - 1)) {
            return None;
        }

        let mut acc = 0u16;
        for _ in 0..count {
            if self.bit_index == 0 {
                if self.input_size == 0 {
                    return None;
                }
                self.current_byte = self.input[self.input_index];
                self.input_index += 1;
                if self.input_index == self.input_size {
                    self.input_index = 0;
                    self.input_size = 0;
                }
                self.bit_index = 0x80;
            }
            acc <<= 1;
            if self.current_byte & self.bit_index != 0 {
                acc |= 1;
            }
            self.bit_index >>= 1;
        }
        Some(acc)
    }

    fn st_tag_bit(&mut self) -> State {
        match self.get_bits(1) {
            None => State::TagBit,
            Some(0) if self.params.window_sz2() > 8 => State::BackrefIndexMsb,
            Some(0) => {
                self.output_index = 0;
                State::BackrefIndexLsb
            }
            Some(_) => State::YieldLiteral,
        }
    }

    fn st_yield_literal(&mut self, out: &mut Output<'_>) -> State {
        if !out.has_room() {
            return State::YieldLiteral;
        }
        let Some(bits) = self.get_bits(8) else {
            return State::YieldLiteral;
        };
        let byte = bits as u8;
        let mask = self.window_mask();
        self.window[usize::from(self.head_index & mask)] = byte;
        self.head_index = self.head_index.wrapping_add(1);
        out.push(byte);
        State::TagBit
    }

    fn st_backref_index_msb(&mut self) -> State {
        let Some(bits) = self.get_bits(self.params.window_sz2() - 8) else {
            return State::BackrefIndexMsb;
        };
        self.output_index = bits << 8;
        State::BackrefIndexLsb
    }

    fn st_backref_index_lsb(&mut self) -> State {
        let Some(bits) = self.get_bits(self.params.window_sz2().min(8)) else {
            return State::BackrefIndexLsb;
        };
        self.output_index |= bits;
        self.output_index += 1;
        self.output_count = 0;
        if self.params.lookahead_sz2() > 8 {
            State::BackrefCountMsb
        } else {
            State::BackrefCountLsb
        }
    }

    fn st_backref_count_msb(&mut self) -> State {
        let Some(bits) = self.get_bits(self.params.lookahead_sz2() - 8) else {
            return State::BackrefCountMsb;
        };
        self.output_count = bits << 8;
        State::BackrefCountLsb
    }

    fn st_backref_count_lsb(&mut self) -> State {
        let Some(bits) = self.get_bits(self.params.lookahead_sz2().min(8)) else {
            return State::BackrefCountLsb;
        };
        self.output_count |= bits;
        self.output_count += 1;
        State::YieldBackref
    }

    fn st_yield_backref(&mut self, out: &mut Output<'_>) -> State {
        let room = out.room();
        if room == 0 {
            return State::YieldBackref;
        }

        let count = room.min(usize::from(self.output_count));
        let mask = self.window_mask();
        let distance = self.output_index;
        for _ in 0..count {
            let byte = self.window[usize::from(self.head_index.wrapping_sub(distance) & mask)];
            out.push(byte);
            self.window[usize::from(self.head_index & mask)] = byte;
            self.head_index = self.head_index.wrapping_add(1);
        }

        self.output_count -= count as u16;
        if self.output_count == 0 {
            State::TagBit
        } else {
            State::YieldBackref
        }
    }
}

impl StreamDecoder for HeatshrinkDecoder {
    fn sink(&mut self, input: &[u8]) -> usize {
        let free = self.input.len() - self.input_size;
        let n = free.min(input.len());
        self.input[self.input_size..self.input_size + n].copy_from_slice(&input[..n]);
        self.input_size += n;
        n
    }

    fn poll(&mut self, output: &mut [u8]) -> usize {
        let mut out = Output {
            buf: output,
            written: 0,
        };

        loop {
            let before = self.state;
            self.state = match self.state {
                State::TagBit => self.st_tag_bit(),
                State::YieldLiteral => self.st_yield_literal(&mut out),
                State::BackrefIndexMsb => self.st_backref_index_msb(),
                State::BackrefIndexLsb => self.st_backref_index_lsb(),
                State::BackrefCountMsb => self.st_backref_count_msb(),
                State::BackrefCountLsb => self.st_backref_count_lsb(),
                State::YieldBackref => self.st_yield_backref(&mut out),
            };
            if self.state == before {
                return out.written;
            }
        }
    }

    fn finish(&mut self) -> bool {
        match self.state {
            // Zero padding in the last byte reads like the start of a
            // backreference, so these states are a clean end too.
            State::TagBit
            | State::YieldLiteral
            | State::BackrefIndexMsb
            | State::BackrefIndexLsb
            | State::BackrefCountMsb
            | State::BackrefCountLsb => self.input_size == 0,
            State::YieldBackref => false,
        }
    }

    fn reset(&mut self) {
        self.input_size = 0;
        self.input_index = 0;
        self.window.fill(0);
        self.head_index = 0;
        self.output_count = 0;
        self.output_index = 0;
        self.state = State::TagBit;
        self.current_byte = 0;
        self.bit_index = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_accepts_only_free_space() {
        let params = HeatshrinkParams::new(8, 4).unwrap();
        let mut decoder = HeatshrinkDecoder::new(params, 4);
        assert_eq!(decoder.sink(&[0xff; 3]), 3);
        assert_eq!(decoder.sink(&[0xff; 3]), 1);
        assert_eq!(decoder.sink(&[0xff; 3]), 0);
    }

    #[test]
    fn poll_stops_at_output_capacity_and_resumes() {
        // literal 'a', then backref distance 1 length 3
        let params = HeatshrinkParams::new(4, 3).unwrap();
        let mut decoder = HeatshrinkDecoder::new(params, 16);
        decoder.sink(&[0xb0, 0x81, 0x00]);

        let mut out = [0u8; 2];
        assert_eq!(decoder.poll(&mut out), 2);
        assert_eq!(&out, b"aa");
        assert!(!decoder.finish());
        assert_eq!(decoder.poll(&mut out), 2);
        assert_eq!(&out, b"aa");
        assert_eq!(decoder.poll(&mut out), 0);
        assert!(decoder.finish());
    }

    #[test]
    fn reset_restores_a_fresh_decoder() {
        let params = HeatshrinkParams::new(8, 4).unwrap();
        let mut decoder = HeatshrinkDecoder::new(params, 16);
        let mut out = [0u8; 4];

        decoder.sink(&[0xb0, 0x80]);
        assert_eq!(decoder.poll(&mut out), 1);
        decoder.reset();
        decoder.sink(&[0xb0, 0x80]);
        assert_eq!(decoder.poll(&mut out), 1);
        assert_eq!(out[0], b'a');
        assert_eq!(decoder.params(), params);
    }
}
