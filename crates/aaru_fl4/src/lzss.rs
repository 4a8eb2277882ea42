//! LZSS dictionary codec used for `PD2A` compressed blocks.
//!
//! This is the classic 4 KiB sliding window coder: the window doubles as the
//! dictionary, and every window position is indexed in one of 256 binary
//! search trees keyed by its first byte. Output is grouped into units of up
//! to eight behind a flag byte, a set bit marking a literal and a clear bit
//! marking a two byte `(position, length)` pair.
//!
//! All working state is allocated per call, so any number of entries can be
//! coded at once.

use tracing::instrument;

/// Size of the ring buffer
pub const WINDOW_SIZE: usize = 4096;

/// Upper limit for a match length
pub const MAX_MATCH: usize = 18;

/// Matches of this length or shorter are sent as literals
pub const THRESHOLD: usize = 2;

/// Link value meaning "no node"
const NIL: usize = WINDOW_SIZE;

/// Position where the first input byte is placed in the ring
const START: usize = WINDOW_SIZE - MAX_MATCH;

const RING_MASK: usize = WINDOW_SIZE - 1;

/// Match index over the ring buffer.
///
/// Nodes are ring positions; `right[N + 1 + c]` is the root of the tree for
/// strings starting with byte `c`.
struct MatchTree {
    text: Vec<u8>,
    left: Vec<usize>,
    right: Vec<usize>,
    parent: Vec<usize>,
    match_position: usize,
    match_length: usize,
}

impl MatchTree {
    fn new() -> Self {
        // every link array spans the roots too, so a parent that is a root
        // can be looked up without special casing
        let links = WINDOW_SIZE + 257;
        Self {
            text: vec![0; WINDOW_SIZE + MAX_MATCH - 1],
            left: vec![NIL; links],
            right: vec![NIL; links],
            parent: vec![NIL; links],
            match_position: 0,
            match_length: 0,
        }
    }

    /// Insert the string `text[r..r + F]` into its tree, recording the
    /// longest match found on the way.
    ///
    /// A match of full length replaces the old node, which would otherwise
    /// leave the window first.
    fn insert(&mut self, r: usize) {
        let mut cmp: i32 = 1;
        let mut p = WINDOW_SIZE + 1 + self.text[r] as usize;

        self.left[r] = NIL;
        self.right[r] = NIL;
        self.match_length = 0;

        loop {
            if cmp >= 0 {
                if self.right[p] == NIL {
                    self.right[p] = r;
                    self.parent[r] = p;
                    return;
                }
                p = self.right[p];
            } else {
                if self.left[p] == NIL {
                    self.left[p] = r;
                    self.parent[r] = p;
                    return;
                }
                p = self.left[p];
            }

            let mut i = 1;
            while i < MAX_MATCH {
                cmp = self.text[r + i] as i32 - self.text[p + i] as i32;
                if cmp != 0 {
                    break;
                }
                i += 1;
            }

            if i > self.match_length {
                self.match_position = p;
                self.match_length = i;
                if i >= MAX_MATCH {
                    break;
                }
            }
        }

        // r takes over p's place in the tree
        let (p_left, p_right, p_parent) = (self.left[p], self.right[p], self.parent[p]);
        self.parent[r] = p_parent;
        self.left[r] = p_left;
        self.right[r] = p_right;
        self.parent[p_left] = r;
        self.parent[p_right] = r;
        self.replace_child(p_parent, p, r);
        self.parent[p] = NIL;
    }

    /// Remove node `p` from its tree, if it is in one.
    fn delete(&mut self, p: usize) {
        if self.parent[p] == NIL {
            return;
        }

        let q = if self.right[p] == NIL {
            self.left[p]
        } else if self.left[p] == NIL {
            self.right[p]
        } else {
            // splice in the rightmost node of the left subtree
            let mut q = self.left[p];
            if self.right[q] != NIL {
                while self.right[q] != NIL {
                    q = self.right[q];
                }
                let q_parent = self.parent[q];
                let q_left = self.left[q];
                self.right[q_parent] = q_left;
                self.parent[q_left] = q_parent;

                let p_left = self.left[p];
                self.left[q] = p_left;
                self.parent[p_left] = q;
            }
            let p_right = self.right[p];
            self.right[q] = p_right;
            self.parent[p_right] = q;
            q
        };

        let p_parent = self.parent[p];
        self.parent[q] = p_parent;
        self.replace_child(p_parent, p, q);
        self.parent[p] = NIL;
    }

    fn replace_child(&mut self, parent: usize, old: usize, new: usize) {
        if self.right[parent] == old {
            self.right[parent] = new;
        } else {
            self.left[parent] = new;
        }
    }
}

/// Accumulates up to eight coded units behind their flag byte.
struct UnitBuffer {
    code: [u8; 17],
    len: usize,
    mask: u8,
}

impl UnitBuffer {
    fn new() -> Self {
        Self {
            code: [0; 17],
            len: 1,
            mask: 1,
        }
    }

    fn literal(&mut self, byte: u8) {
        self.code[0] |= self.mask;
        self.code[self.len] = byte;
        self.len += 1;
    }

    fn pair(&mut self, position: usize, length: usize) {
        self.code[self.len] = position as u8;
        self.code[self.len + 1] =
            (((position >> 4) & 0xF0) | (length - (THRESHOLD + 1))) as u8;
        self.len += 2;
    }

    /// Move on to the next unit, flushing a full group into `output`.
    fn advance(&mut self, output: &mut Vec<u8>) {
        self.mask <<= 1;
        if self.mask == 0 {
            self.flush(output);
        }
    }

    fn flush(&mut self, output: &mut Vec<u8>) {
        if self.len > 1 {
            output.extend_from_slice(&self.code[..self.len]);
        }
        self.code[0] = 0;
        self.len = 1;
        self.mask = 1;
    }
}

/// Compress `input`.
///
/// The output is bit-exact with the encoder shipped with the games. Empty
/// input produces empty output.
#[instrument(skip_all, fields(size = input.len()))]
pub fn compress(input: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(input.len() / 2 + 16);
    let mut bytes = input.iter().copied();
    let mut tree = MatchTree::new();
    let mut units = UnitBuffer::new();

    let mut s = 0;
    let mut r = START;

    let mut len = 0;
    while len < MAX_MATCH {
        let Some(c) = bytes.next() else {
            break;
        };
        tree.text[r + len] = c;
        len += 1;
    }
    if len == 0 {
        return output;
    }

    // the zero filled prefix goes in first, back to front
    for i in 1..=MAX_MATCH {
        tree.insert(r - i);
    }
    tree.insert(r);

    while len > 0 {
        if tree.match_length > len {
            tree.match_length = len;
        }

        if tree.match_length <= THRESHOLD {
            tree.match_length = 1;
            units.literal(tree.text[r]);
        } else {
            units.pair(tree.match_position, tree.match_length);
        }
        units.advance(&mut output);

        let last_match_length = tree.match_length;
        let mut i = 0;
        while i < last_match_length {
            let Some(c) = bytes.next() else {
                break;
            };
            tree.delete(s);
            tree.text[s] = c;
            if s < MAX_MATCH - 1 {
                // mirror the head past the end so comparisons never wrap
                tree.text[s + WINDOW_SIZE] = c;
            }
            s = (s + 1) & RING_MASK;
            r = (r + 1) & RING_MASK;
            tree.insert(r);
            i += 1;
        }

        // input is exhausted, drain the lookahead
        while i < last_match_length {
            i += 1;
            tree.delete(s);
            s = (s + 1) & RING_MASK;
            r = (r + 1) & RING_MASK;
            len -= 1;
            if len != 0 {
                tree.insert(r);
            }
        }
    }

    units.flush(&mut output);
    output
}

/// Write side of the decoder's ring buffer.
struct Ring {
    buffer: Vec<u8>,
    cursor: usize,
}

impl Ring {
    fn push(&mut self, output: &mut Vec<u8>, c: u8) {
        output.push(c);
        self.buffer[self.cursor] = c;
        self.cursor = (self.cursor + 1) & RING_MASK;
    }

    fn get(&self, position: usize) -> u8 {
        self.buffer[position & RING_MASK]
    }
}

/// Decompress `input`.
///
/// Decoding is driven purely by the input length and stops quietly when the
/// input runs out, even in the middle of a unit.
#[instrument(skip_all, fields(size = input.len()))]
pub fn decompress(input: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(input.len() * 2);
    let mut ring = Ring {
        buffer: vec![0; WINDOW_SIZE],
        cursor: START,
    };
    let mut bytes = input.iter().copied();
    let mut flags: u32 = 0;

    loop {
        flags >>= 1;
        if flags & 0x100 == 0 {
            let Some(c) = bytes.next() else {
                break;
            };
            // the high byte counts down the eight units
            flags = c as u32 | 0xFF00;
        }

        if flags & 1 != 0 {
            let Some(c) = bytes.next() else {
                break;
            };
            ring.push(&mut output, c);
        } else {
            let (Some(low), Some(high)) = (bytes.next(), bytes.next()) else {
                break;
            };
            let position = low as usize | ((high as usize & 0xF0) << 4);
            let length = (high as usize & 0x0F) + THRESHOLD + 1;
            for k in 0..length {
                let c = ring.get(position + k);
                ring.push(&mut output, c);
            }
        }
    }

    output
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{compress, decompress};

    fn sample(len: usize, alphabet: &[u8]) -> Vec<u8> {
        // xorshift keeps the data deterministic without pulling in rand
        let mut state: u32 = 0x9E37_79B9;
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                alphabet[state as usize % alphabet.len()]
            })
            .collect()
    }

    #[test]
    fn empty_input() {
        assert!(compress(&[]).is_empty());
        assert!(decompress(&[]).is_empty());
    }

    #[test]
    fn compress_literals() {
        assert_eq!(compress(b"hi"), vec![0x03, 0x68, 0x69]);
    }

    #[test]
    fn compress_matches_legacy_output() {
        assert_eq!(
            compress(b"ABABABABABABABAB"),
            vec![0x03, 0x41, 0x42, 0xEE, 0xFB]
        );
        assert_eq!(
            compress(b"hello hello hello hello"),
            vec![0x3F, 0x68, 0x65, 0x6C, 0x6C, 0x6F, 0x20, 0xEE, 0xFE]
        );
        assert_eq!(
            compress(&[b'a'; 40]),
            vec![0x01, 0x61, 0xEE, 0xFF, 0x00, 0x0F, 0x04, 0x00]
        );
    }

    #[test]
    fn compress_matches_into_zeroed_window() {
        assert_eq!(compress(&[0u8; 20]), vec![0x06, 0xDC, 0xFF, 0x00, 0x00]);
    }

    #[test]
    fn decompress_overlapping_copy() {
        // one literal, then a pair copying from itself
        assert_eq!(decompress(&[0x01, b'a', 0xEE, 0xF0]), b"aaaa");
    }

    #[test]
    fn decompress_reads_zeroed_window() {
        assert_eq!(decompress(&[0x00, 0x00, 0x00]), vec![0u8; 3]);
    }

    #[test]
    fn decompress_stops_at_truncated_unit() {
        assert_eq!(decompress(&[0x03, b'h']), b"h");
        assert_eq!(decompress(&[0x00, 0xEE]), b"");
    }

    #[test]
    fn round_trip_repetitive() {
        let input = b"AaruSystem ".repeat(2000);
        let compressed = compress(&input);
        assert!(compressed.len() * 4 < input.len());
        assert_eq!(decompress(&compressed), input);
    }

    #[test]
    fn round_trip_small_alphabet() {
        for len in [1, 2, 3, 17, 18, 19, 4095, 4096, 4097, 20_000] {
            let input = sample(len, b"abcde");
            assert_eq!(decompress(&compress(&input)), input, "length {len}");
        }
    }

    #[test]
    fn round_trip_noise() {
        let alphabet: Vec<u8> = (0..=255).collect();
        let input = sample(12_000, &alphabet);
        assert_eq!(decompress(&compress(&input)), input);
    }
}
