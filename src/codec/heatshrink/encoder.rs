use super::HeatshrinkParams;

/// MSB-first bit packer
#[derive(Default)]
struct BitWriter {
    out: Vec<u8>,
    current: u8,
    used: u8,
}

impl BitWriter {
    fn push(&mut self, value: u16, bits: u8) {
        for shift in (0..bits).rev() {
            self.current = (self.current << 1) | ((value >> shift) & 1) as u8;
            self.used += 1;
            if self.used == 8 {
                self.out.push(self.current);
                self.current = 0;
                self.used = 0;
            }
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if self.used > 0 {
            self.out.push(self.current << (8 - self.used));
        }
        self.out
    }
}

/// Greedy heatshrink encoder.
///
/// Produces the bit-stream [`HeatshrinkDecoder`](super::HeatshrinkDecoder)
/// consumes. It searches the whole window for the longest match at every
/// position, which is slow but simple; it is meant for building images, not
/// for the read path.
pub struct HeatshrinkEncoder {
    params: HeatshrinkParams,
}

impl HeatshrinkEncoder {
    pub fn new(params: HeatshrinkParams) -> Self {
        Self { params }
    }

    pub fn compress(&self, data: &[u8]) -> Vec<u8> {
        let window_bits = self.params.window_sz2();
        let count_bits = self.params.lookahead_sz2();
        let window = 1usize << window_bits;
        let max_len = 1usize << count_bits;
        // A backreference only pays off once it replaces more 9-bit literals
        // than its own size.
        let backref_cost = 1 + usize::from(window_bits) + usize::from(count_bits);

        let mut bits = BitWriter::default();
        let mut pos = 0;
        while pos < data.len() {
            let (distance, len) = longest_match(data, pos, window, max_len);
            if len * 9 > backref_cost {
                bits.push(0, 1);
                bits.push((distance - 1) as u16, window_bits);
                bits.push((len - 1) as u16, count_bits);
                pos += len;
            } else {
                bits.push(1, 1);
                bits.push(u16::from(data[pos]), 8);
                pos += 1;
            }
        }
        bits.finish()
    }
}

/// Longest match for `data[pos..]` starting within `window` bytes back.
///
/// Matches may run into the bytes they produce (distance shorter than length).
fn longest_match(data: &[u8], pos: usize, window: usize, max_len: usize) -> (usize, usize) {
    let limit = max_len.min(data.len() - pos);
    let mut best = (0, 0);
    for distance in 1..=pos.min(window) {
        let start = pos - distance;
        let len = (0..limit)
            .take_while(|&i| data[start + i] == data[pos + i])
            .count();
        if len > best.1 {
            best = (distance, len);
            if len == limit {
                break;
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_writer_pads_the_last_byte() {
        let mut bits = BitWriter::default();
        bits.push(1, 1);
        bits.push(0x61, 8);
        assert_eq!(bits.finish(), [0xb0, 0x80]);
    }

    #[test]
    fn empty_input_encodes_to_nothing() {
        let encoder = HeatshrinkEncoder::new(HeatshrinkParams::default());
        assert!(encoder.compress(b"").is_empty());
    }

    #[test]
    fn finds_nearest_longest_match() {
        assert_eq!(longest_match(b"abcabcabc", 3, 16, 8), (3, 6));
        assert_eq!(longest_match(b"abcd", 2, 16, 8), (0, 0));
        assert_eq!(longest_match(b"aaaaaaaaaa", 1, 16, 4), (1, 4));
    }
}
