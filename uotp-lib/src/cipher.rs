//! 128-bit block cipher used for packet bodies.
//!
//! The protocol encrypts with KISA SEED (RFC 4269). [`SeedCipher`] implements
//! the RustCrypto `cipher` traits, so the envelope works with any conformant
//! 128-bit block cipher.

use crate::constants::BLOCK_SIZE;
use cipher::consts::{U1, U16};
use cipher::inout::InOut;
use cipher::{
    Block, BlockBackend, BlockCipher, BlockClosure, BlockDecrypt, BlockEncrypt, BlockSizeUser, Key, KeyInit,
    KeySizeUser, ParBlocksSizeUser,
};

/// SEED with its 16-round key schedule expanded up front.
#[derive(Clone)]
pub struct SeedCipher {
    round_keys: [u32; 32],
}

// Key schedule constants (golden ratio rotations)
const KC: [u32; 16] = [
    0x9e3779b9, 0x3c6ef373, 0x78dde6e6, 0xf1bbcdcc, 0xe3779b99, 0xc6ef3733, 0x8dde6e67, 0x1bbcdccf,
    0x3779b99e, 0x6ef3733c, 0xdde6e678, 0xbbcdccf1, 0x779b99e3, 0xef3733c6, 0xde6e678d, 0xbcdccf1b,
];

const S1: [u8; 256] = [
    0xa9, 0x85, 0xd6, 0xd3, 0x54, 0x1d, 0xac, 0x25, 0x5d, 0x43, 0x18, 0x1e, 0x51, 0xfc, 0xca, 0x63,
    0x28, 0x44, 0x20, 0x9d, 0xe0, 0xe2, 0xc8, 0x17, 0xa5, 0x8f, 0x03, 0x7b, 0xbb, 0x13, 0xd2, 0xee,
    0x70, 0x8c, 0x3f, 0xa8, 0x32, 0xdd, 0xf6, 0x74, 0xec, 0x95, 0x0b, 0x57, 0x5c, 0x5b, 0xbd, 0x01,
    0x24, 0x1c, 0x73, 0x98, 0x10, 0xcc, 0xf2, 0xd9, 0x2c, 0xe7, 0x72, 0x83, 0x9b, 0xd1, 0x86, 0xc9,
    0x60, 0x50, 0xa3, 0xeb, 0x0d, 0xb6, 0x9e, 0x4f, 0xb7, 0x5a, 0xc6, 0x78, 0xa6, 0x12, 0xaf, 0xd5,
    0x61, 0xc3, 0xb4, 0x41, 0x52, 0x7d, 0x8d, 0x08, 0x1f, 0x99, 0x00, 0x19, 0x04, 0x53, 0xf7, 0xe1,
    0xfd, 0x76, 0x2f, 0x27, 0xb0, 0x8b, 0x0e, 0xab, 0xa2, 0x6e, 0x93, 0x4d, 0x69, 0x7c, 0x09, 0x0a,
    0xbf, 0xef, 0xf3, 0xc5, 0x87, 0x14, 0xfe, 0x64, 0xde, 0x2e, 0x4b, 0x1a, 0x06, 0x21, 0x6b, 0x66,
    0x02, 0xf5, 0x92, 0x8a, 0x0c, 0xb3, 0x7e, 0xd0, 0x7a, 0x47, 0x96, 0xe5, 0x26, 0x80, 0xad, 0xdf,
    0xa1, 0x30, 0x37, 0xae, 0x36, 0x15, 0x22, 0x38, 0xf4, 0xa7, 0x45, 0x4c, 0x81, 0xe9, 0x84, 0x97,
    0x35, 0xcb, 0xce, 0x3c, 0x71, 0x11, 0xc7, 0x89, 0x75, 0xfb, 0xda, 0xf8, 0x94, 0x59, 0x82, 0xc4,
    0xff, 0x49, 0x39, 0x67, 0xc0, 0xcf, 0xd7, 0xb8, 0x0f, 0x8e, 0x42, 0x23, 0x91, 0x6c, 0xdb, 0xa4,
    0x34, 0xf1, 0x48, 0xc2, 0x6f, 0x3d, 0x2d, 0x40, 0xbe, 0x3e, 0xbc, 0xc1, 0xaa, 0xba, 0x4e, 0x55,
    0x3b, 0xdc, 0x68, 0x7f, 0x9c, 0xd8, 0x4a, 0x56, 0x77, 0xa0, 0xed, 0x46, 0xb5, 0x2b, 0x65, 0xfa,
    0xe3, 0xb9, 0xb1, 0x9f, 0x5e, 0xf9, 0xe6, 0xb2, 0x31, 0xea, 0x6d, 0x5f, 0xe4, 0xf0, 0xcd, 0x88,
    0x16, 0x3a, 0x58, 0xd4, 0x62, 0x29, 0x07, 0x33, 0xe8, 0x1b, 0x05, 0x79, 0x90, 0x6a, 0x2a, 0x9a,
];

const S2: [u8; 256] = [
    0x38, 0xe8, 0x2d, 0xa6, 0xcf, 0xde, 0xb3, 0xb8, 0xaf, 0x60, 0x55, 0xc7, 0x44, 0x6f, 0x6b, 0x5b,
    0xc3, 0x62, 0x33, 0xb5, 0x29, 0xa0, 0xe2, 0xa7, 0xd3, 0x91, 0x11, 0x06, 0x1c, 0xbc, 0x36, 0x4b,
    0xef, 0x88, 0x6c, 0xa8, 0x17, 0xc4, 0x16, 0xf4, 0xc2, 0x45, 0xe1, 0xd6, 0x3f, 0x3d, 0x8e, 0x98,
    0x28, 0x4e, 0xf6, 0x3e, 0xa5, 0xf9, 0x0d, 0xdf, 0xd8, 0x2b, 0x66, 0x7a, 0x27, 0x2f, 0xf1, 0x72,
    0x42, 0xd4, 0x41, 0xc0, 0x73, 0x67, 0xac, 0x8b, 0xf7, 0xad, 0x80, 0x1f, 0xca, 0x2c, 0xaa, 0x34,
    0xd2, 0x0b, 0xee, 0xe9, 0x5d, 0x94, 0x18, 0xf8, 0x57, 0xae, 0x08, 0xc5, 0x13, 0xcd, 0x86, 0xb9,
    0xff, 0x7d, 0xc1, 0x31, 0xf5, 0x8a, 0x6a, 0xb1, 0xd1, 0x20, 0xd7, 0x02, 0x22, 0x04, 0x68, 0x71,
    0x07, 0xdb, 0x9d, 0x99, 0x61, 0xbe, 0xe6, 0x59, 0xdd, 0x51, 0x90, 0xdc, 0x9a, 0xa3, 0xab, 0xd0,
    0x81, 0x0f, 0x47, 0x1a, 0xe3, 0xec, 0x8d, 0xbf, 0x96, 0x7b, 0x5c, 0xa2, 0xa1, 0x63, 0x23, 0x4d,
    0xc8, 0x9e, 0x9c, 0x3a, 0x0c, 0x2e, 0xba, 0x6e, 0x9f, 0x5a, 0xf2, 0x92, 0xf3, 0x49, 0x78, 0xcc,
    0x15, 0xfb, 0x70, 0x75, 0x7f, 0x35, 0x10, 0x03, 0x64, 0x6d, 0xc6, 0x74, 0xd5, 0xb4, 0xea, 0x09,
    0x76, 0x19, 0xfe, 0x40, 0x12, 0xe0, 0xbd, 0x05, 0xfa, 0x01, 0xf0, 0x2a, 0x5e, 0xa9, 0x56, 0x43,
    0x85, 0x14, 0x89, 0x9b, 0xb0, 0xe5, 0x48, 0x79, 0x97, 0xfc, 0x1e, 0x82, 0x21, 0x8c, 0x1b, 0x5f,
    0x77, 0x54, 0xb2, 0x1d, 0x25, 0x4f, 0x00, 0x46, 0xed, 0x58, 0x52, 0xeb, 0x7e, 0xda, 0xc9, 0xfd,
    0x30, 0x95, 0x65, 0x3c, 0xb6, 0xe4, 0xbb, 0x7c, 0x0e, 0x50, 0x39, 0x26, 0x32, 0x84, 0x69, 0x93,
    0x37, 0xe7, 0x24, 0xa4, 0xcb, 0x53, 0x0a, 0x87, 0xd9, 0x4c, 0x83, 0x8f, 0xce, 0x3b, 0x4a, 0xb7,
];

impl KeySizeUser for SeedCipher {
    type KeySize = U16;
}

impl BlockSizeUser for SeedCipher {
    type BlockSize = U16;
}

impl BlockCipher for SeedCipher {}

impl KeyInit for SeedCipher {
    fn new(key: &Key<Self>) -> Self {
        let [mut x1, mut x2, mut x3, mut x4] = load_words(key);
        let mut round_keys = [0u32; 32];

        for (round, kc) in KC.iter().copied().enumerate() {
            if round > 0 {
                if round % 2 == 1 {
                    // rotate x1||x2 right by one byte
                    let t = x1;
                    x1 = (x1 >> 8) ^ (x2 << 24);
                    x2 = (x2 >> 8) ^ (t << 24);
                } else {
                    // rotate x3||x4 left by one byte
                    let t = x3;
                    x3 = (x3 << 8) ^ (x4 >> 24);
                    x4 = (x4 << 8) ^ (t >> 24);
                }
            }
            let t0 = x1.wrapping_add(x3).wrapping_sub(kc);
            let t1 = x2.wrapping_add(kc).wrapping_sub(x4);
            round_keys[2 * round] = g(t0);
            round_keys[2 * round + 1] = g(t1);
        }

        Self { round_keys }
    }
}

impl SeedCipher {
    fn round(&self, round: usize, r0: u32, r1: u32) -> (u32, u32) {
        let mut t0 = r0 ^ self.round_keys[2 * round];
        let mut t1 = r1 ^ self.round_keys[2 * round + 1];
        t1 ^= t0;
        t1 = g(t1);
        t0 = g(t0.wrapping_add(t1));
        t1 = g(t1.wrapping_add(t0));
        t0 = t0.wrapping_add(t1);
        (t0, t1)
    }

    fn crypt(&self, block: &mut [u8; BLOCK_SIZE], rounds: impl Iterator<Item = usize>) {
        let [mut x1, mut x2, mut x3, mut x4] = load_words(block);

        for (i, round) in rounds.enumerate() {
            if i % 2 == 0 {
                let (t0, t1) = self.round(round, x3, x4);
                x1 ^= t0;
                x2 ^= t1;
            } else {
                let (t0, t1) = self.round(round, x1, x2);
                x3 ^= t0;
                x4 ^= t1;
            }
        }

        for (chunk, word) in block.chunks_exact_mut(4).zip([x3, x4, x1, x2]) {
            chunk.copy_from_slice(&word.to_be_bytes());
        }
    }
}

impl BlockEncrypt for SeedCipher {
    fn encrypt_with_backend(&self, f: impl BlockClosure<BlockSize = U16>) {
        f.call(&mut SeedBackend {
            cipher: self,
            decrypt: false,
        })
    }
}

impl BlockDecrypt for SeedCipher {
    fn decrypt_with_backend(&self, f: impl BlockClosure<BlockSize = U16>) {
        f.call(&mut SeedBackend {
            cipher: self,
            decrypt: true,
        })
    }
}

/// One block at a time, in either direction.
struct SeedBackend<'a> {
    cipher: &'a SeedCipher,
    decrypt: bool,
}

impl BlockSizeUser for SeedBackend<'_> {
    type BlockSize = U16;
}

impl ParBlocksSizeUser for SeedBackend<'_> {
    type ParBlocksSize = U1;
}

impl BlockBackend for SeedBackend<'_> {
    fn proc_block(&mut self, mut block: InOut<'_, '_, Block<Self>>) {
        let mut data = [0u8; BLOCK_SIZE];
        data.copy_from_slice(block.get_in());
        if self.decrypt {
            self.cipher.crypt(&mut data, (0..16).rev());
        } else {
            self.cipher.crypt(&mut data, 0..16);
        }
        block.get_out().copy_from_slice(&data);
    }
}

fn load_words(bytes: &[u8]) -> [u32; 4] {
    let mut words = [0u32; 4];
    for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(4)) {
        *word = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    words
}

/// The SEED G function: byte substitution followed by the masked mixing layer.
fn g(v: u32) -> u32 {
    let s0 = S1[(v & 0xff) as usize] as u32;
    let s1 = S2[((v >> 8) & 0xff) as usize] as u32;
    let s2 = S1[((v >> 16) & 0xff) as usize] as u32;
    let s3 = S2[((v >> 24) & 0xff) as usize] as u32;

    let z0 = (s0 & 0xfc) ^ (s1 & 0xf3) ^ (s2 & 0xcf) ^ (s3 & 0x3f);
    let z1 = (s0 & 0xf3) ^ (s1 & 0xcf) ^ (s2 & 0x3f) ^ (s3 & 0xfc);
    let z2 = (s0 & 0xcf) ^ (s1 & 0x3f) ^ (s2 & 0xfc) ^ (s3 & 0xf3);
    let z3 = (s0 & 0x3f) ^ (s1 & 0xfc) ^ (s2 & 0xf3) ^ (s3 & 0xcf);

    z0 | (z1 << 8) | (z2 << 16) | (z3 << 24)
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 4269, appendix B
    #[test]
    fn test_rfc4269_zero_key() {
        let cipher = SeedCipher::new(&[0u8; 16].into());
        let mut block: [u8; 16] = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap().try_into().unwrap();
        cipher.encrypt_block((&mut block).into());
        assert_eq!(hex::encode(block), "5ebac6e0054e166819aff1cc6d346cdb");

        cipher.decrypt_block((&mut block).into());
        assert_eq!(hex::encode(block), "000102030405060708090a0b0c0d0e0f");
    }

    #[test]
    fn test_rfc4269_zero_plaintext() {
        let key: [u8; 16] = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap().try_into().unwrap();
        let cipher = SeedCipher::new(&key.into());
        let mut block = [0u8; 16];
        cipher.encrypt_block((&mut block).into());
        assert_eq!(hex::encode(block), "c11f22f20140505084483597e4370f43");
    }

    #[test]
    fn test_block_roundtrip_random_key() {
        let key: [u8; 16] = rand::random();
        let plaintext: [u8; 16] = rand::random();
        let cipher = SeedCipher::new_from_slice(&key).unwrap();

        let mut block = plaintext;
        cipher.encrypt_block((&mut block).into());
        assert_ne!(block, plaintext);
        cipher.decrypt_block((&mut block).into());
        assert_eq!(block, plaintext);
    }

    #[test]
    fn test_rejects_wrong_key_length() {
        assert!(SeedCipher::new_from_slice(&[0u8; 15]).is_err());
        assert!(SeedCipher::new_from_slice(&[0u8; 32]).is_err());
    }
}
