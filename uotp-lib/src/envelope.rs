//! Encryption envelope for packet bodies.
//!
//! # Key derivation
//!
//! The packet key and IV come from a bespoke SHA-1 chain over the shared key:
//!
//! 1. `r = SHA1(shared_key)`, then `r = SHA1(r)` four more times
//! 2. key = `r[0..16]`
//! 3. IV = `SHA1(r[16..20])[0..16]`
//!
//! Bodies are SEED-CBC encrypted with PKCS#7-style padding. Decryption strips
//! padding permissively: bytes that do not look like padding are kept.

use crate::cipher::SeedCipher;
use crate::constants::BLOCK_SIZE;
use crate::error::UotpError;
use cipher::consts::U16;
use cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use sha1::{Digest, Sha1};
use sha2::Sha256;
use tracing::trace;

/// Re-hashes applied after the first SHA-1 of the shared key
pub const KEY_REHASH_ROUNDS: usize = 4;

/// Derive the cipher key and IV for a shared key.
pub fn derive_key(shared_key: &[u8]) -> ([u8; BLOCK_SIZE], [u8; BLOCK_SIZE]) {
    let mut r = Sha1::digest(shared_key);
    for _ in 0..KEY_REHASH_ROUNDS {
        r = Sha1::digest(r);
    }

    let mut key = [0u8; BLOCK_SIZE];
    key.copy_from_slice(&r[..BLOCK_SIZE]);

    let mut iv = [0u8; BLOCK_SIZE];
    iv.copy_from_slice(&Sha1::digest(&r[BLOCK_SIZE..])[..BLOCK_SIZE]);

    (key, iv)
}

/// Pad and CBC-encrypt `plaintext` under a key derived from `shared_key`.
pub fn encrypt(shared_key: &[u8], plaintext: &[u8]) -> Vec<u8> {
    let (key, iv) = derive_key(shared_key);
    encrypt_with(&SeedCipher::new(&key.into()), iv, plaintext)
}

/// CBC-decrypt `ciphertext` and strip padding if it is well formed.
pub fn decrypt(shared_key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, UotpError> {
    let (key, iv) = derive_key(shared_key);
    decrypt_with(&SeedCipher::new(&key.into()), iv, ciphertext)
}

/// CBC-encrypt with any 128-bit block cipher.
pub fn encrypt_with<C: BlockEncrypt<BlockSize = U16>>(cipher: &C, iv: [u8; BLOCK_SIZE], plaintext: &[u8]) -> Vec<u8> {
    let pad = BLOCK_SIZE - plaintext.len() % BLOCK_SIZE;
    let mut output = Vec::with_capacity(plaintext.len() + pad);
    output.extend_from_slice(plaintext);
    output.resize(plaintext.len() + pad, pad as u8);

    let mut chain = iv;
    for chunk in output.chunks_exact_mut(BLOCK_SIZE) {
        let mut block = [0u8; BLOCK_SIZE];
        for ((b, p), c) in block.iter_mut().zip(chunk.iter()).zip(chain.iter()) {
            *b = p ^ c;
        }
        cipher.encrypt_block((&mut block).into());
        chunk.copy_from_slice(&block);
        chain = block;
    }

    output
}

/// CBC-decrypt with any 128-bit block cipher.
pub fn decrypt_with<C: BlockDecrypt<BlockSize = U16>>(
    cipher: &C,
    iv: [u8; BLOCK_SIZE],
    ciphertext: &[u8],
) -> Result<Vec<u8>, UotpError> {
    if !ciphertext.len().is_multiple_of(BLOCK_SIZE) {
        return Err(UotpError::InvalidPacket(format!(
            "ciphertext length {} is not a multiple of {BLOCK_SIZE}",
            ciphertext.len()
        )));
    }

    let mut output = ciphertext.to_vec();
    let mut chain = iv;
    for chunk in output.chunks_exact_mut(BLOCK_SIZE) {
        let mut block: [u8; BLOCK_SIZE] = (&*chunk).try_into()?;
        let next_chain = block;
        cipher.decrypt_block((&mut block).into());
        for ((out, b), c) in chunk.iter_mut().zip(block.iter()).zip(chain.iter()) {
            *out = b ^ c;
        }
        chain = next_chain;
    }

    strip_padding(&mut output);
    Ok(output)
}

/// Remove trailing padding only when the last byte is below the block size
/// and that many trailing bytes all carry it. A full 0x10 block stays.
fn strip_padding(data: &mut Vec<u8>) {
    let Some(&last) = data.last() else {
        return;
    };
    let pad = last as usize;
    if pad >= BLOCK_SIZE {
        trace!("trailing byte {pad:#04x} is not padding, keeping {} bytes", data.len());
        return;
    }
    let start = data.len() - pad;
    if data[start..].iter().all(|&b| b == last) {
        data.truncate(start);
    } else {
        trace!("malformed padding, keeping {} bytes", data.len());
    }
}

/// Fresh shared key for an issuance handshake: lowercase hex of
/// SHA-256 over the big-endian protocol epoch.
pub fn new_shared_key(epoch: u32) -> Vec<u8> {
    hex::encode(Sha256::digest(epoch.to_be_bytes())).into_bytes()
}

/// Cipher key input for an authenticated request:
/// `SHA1(hex_decode(shared_key) || extra_token)`.
pub fn combine_key(shared_key: &[u8], extra_token: &[u8]) -> Result<Vec<u8>, UotpError> {
    let raw = hex::decode(shared_key)
        .map_err(|e| UotpError::InvalidAccount(format!("account id is not hex: {e}")))?;
    let mut hasher = Sha1::new();
    hasher.update(&raw);
    hasher.update(extra_token);
    Ok(hasher.finalize().to_vec())
}
