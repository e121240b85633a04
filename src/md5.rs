use crate::{Digest, Hasher, DIGEST_LEN};

const BLOCK_SIZE: usize = 64;
const LENGTH_SUFFIX_OFFSET: usize = BLOCK_SIZE - 8;
const INITIALISATION_CONSTANTS: [u32; 4] = [0x67452301, 0xEFCDAB89, 0x98BADCFE, 0x10325476];

// K[i] = floor(2^32 * abs(sin(i + 1)))
const K: [u32; 64] = [
    0xD76AA478, 0xE8C7B756, 0x242070DB, 0xC1BDCEEE, 0xF57C0FAF, 0x4787C62A, 0xA8304613,
    0xFD469501, 0x698098D8, 0x8B44F7AF, 0xFFFF5BB1, 0x895CD7BE, 0x6B901122, 0xFD987193,
    0xA679438E, 0x49B40821, 0xF61E2562, 0xC040B340, 0x265E5A51, 0xE9B6C7AA, 0xD62F105D,
    0x02441453, 0xD8A1E681, 0xE7D3FBC8, 0x21E1CDE6, 0xC33707D6, 0xF4D50D87, 0x455A14ED,
    0xA9E3E905, 0xFCEFA3F8, 0x676F02D9, 0x8D2A4C8A, 0xFFFA3942, 0x8771F681, 0x6D9D6122,
    0xFDE5380C, 0xA4BEEA44, 0x4BDECFA9, 0xF6BB4B60, 0xBEBFBC70, 0x289B7EC6, 0xEAA127FA,
    0xD4EF3085, 0x04881D05, 0xD9D4D039, 0xE6DB99E5, 0x1FA27CF8, 0xC4AC5665, 0xF4292244,
    0x432AFF97, 0xAB9423A7, 0xFC93A039, 0x655B59C3, 0x8F0CCC92, 0xFFEFF47D, 0x85845DD1,
    0x6FA87E4F, 0xFE2CE6E0, 0xA3014314, 0x4E0811A1, 0xF7537E82, 0xBD3AF235, 0x2AD7D2BB,
    0xEB86D391,
];

#[rustfmt::skip]
const S: [u32; 64] = [
    7, 12, 17, 22, 7, 12, 17, 22, 7, 12, 17, 22, 7, 12, 17, 22,
    5, 9, 14, 20, 5, 9, 14, 20, 5, 9, 14, 20, 5, 9, 14, 20,
    4, 11, 16, 23, 4, 11, 16, 23, 4, 11, 16, 23, 4, 11, 16, 23,
    6, 10, 15, 21, 6, 10, 15, 21, 6, 10, 15, 21, 6, 10, 15, 21,
];

/// Incremental MD5 state.
///
/// Bytes may be fed through [`Md5::update`] in chunks of any size; the
/// digest only depends on the concatenation of everything fed in.
#[derive(Debug, Clone)]
pub struct Md5 {
    buffer: [u8; BLOCK_SIZE],
    buffer_len: usize,
    state: [u32; 4],
    message_bit_len: u64,
}

impl Md5 {
    pub fn new() -> Self {
        Self {
            buffer: [0u8; BLOCK_SIZE],
            buffer_len: 0,
            state: INITIALISATION_CONSTANTS,
            message_bit_len: 0,
        }
    }

    pub fn digest_message(message: &[u8]) -> Digest {
        let mut hasher = Md5::new();
        hasher.update(message);
        hasher.finalize()
    }

    pub fn update(&mut self, message: &[u8]) {
        self.message_bit_len = self
            .message_bit_len
            .wrapping_add((message.len() as u64).wrapping_mul(8));

        let mut offset = 0;
        if self.buffer_len > 0 {
            let needed = BLOCK_SIZE - self.buffer_len;
            let to_copy = needed.min(message.len());
            self.buffer[self.buffer_len..self.buffer_len + to_copy]
                .copy_from_slice(&message[..to_copy]);
            self.buffer_len += to_copy;
            offset += to_copy;

            if self.buffer_len < BLOCK_SIZE {
                return;
            }
            let block = self.buffer;
            self.process_block(&block);
            self.buffer_len = 0;
        }

        let mut blocks = message[offset..].chunks_exact(BLOCK_SIZE);
        for block in &mut blocks {
            self.process_block(block.try_into().unwrap());
        }

        let tail = blocks.remainder();
        self.buffer[..tail.len()].copy_from_slice(tail);
        self.buffer_len = tail.len();
    }

    pub fn finalize(mut self) -> Digest {
        // Length is taken before the padding goes through `update`.
        let bit_len_bytes = self.message_bit_len.to_le_bytes();

        let zeros = padding_len(self.buffer_len);
        self.update(&[0x80]);
        self.update(&[0u8; BLOCK_SIZE][..zeros]);
        debug_assert_eq!(self.buffer_len, LENGTH_SUFFIX_OFFSET);
        self.update(&bit_len_bytes);
        debug_assert_eq!(self.buffer_len, 0);

        let mut digest = [0u8; DIGEST_LEN];
        for (out, word) in digest.chunks_exact_mut(4).zip(self.state) {
            out.copy_from_slice(&word.to_le_bytes());
        }
        Digest::from(digest)
    }

    fn process_block(&mut self, block: &[u8; BLOCK_SIZE]) {
        let m: [u32; 16] = std::array::from_fn(|i| {
            u32::from_le_bytes(block[(4 * i)..(4 + 4 * i)].try_into().unwrap())
        });

        let [mut a, mut b, mut c, mut d] = self.state;
        for i in 0..64 {
            let (f, g) = match i {
                0..=15 => ((b & c) | (!b & d), i),
                16..=31 => ((b & d) | (c & !d), (5 * i + 1) % 16),
                32..=47 => (b ^ c ^ d, (3 * i + 5) % 16),
                _ => (c ^ (b | !d), (7 * i) % 16),
            };

            let rotated = a
                .wrapping_add(f)
                .wrapping_add(K[i])
                .wrapping_add(m[g])
                .rotate_left(S[i]);
            a = d;
            d = c;
            c = b;
            b = b.wrapping_add(rotated);
        }

        for (state, value) in self.state.iter_mut().zip([a, b, c, d]) {
            *state = state.wrapping_add(value);
        }
    }
}

impl Default for Md5 {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher<DIGEST_LEN> for Md5 {
    fn update(&mut self, data: &[u8]) {
        Md5::update(self, data);
    }

    fn finalize(self) -> [u8; DIGEST_LEN] {
        Md5::finalize(self).into()
    }
}

impl std::io::Write for Md5 {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Number of zero bytes that follow the `0x80` marker so the length suffix
/// starts at offset 56 of a block.
fn padding_len(buffer_len: usize) -> usize {
    let after_marker = (buffer_len + 1) % BLOCK_SIZE;
    if after_marker <= LENGTH_SUFFIX_OFFSET {
        LENGTH_SUFFIX_OFFSET - after_marker
    } else {
        BLOCK_SIZE + LENGTH_SUFFIX_OFFSET - after_marker
    }
}
