//! Local OTP code generation.
//!
//! # Algorithm
//!
//! - time step = `now / 10`
//! - HMAC key = `SHA1(oid as 11-byte BE || seed)`
//! - digest = `HMAC-SHA1(key, step as 11-byte BE)`
//! - dynamic truncation at `digest[19] & 0xF`, masked with `0xFFFFDB`
//! - flag `0x04` or `0x20` records which third of the 30 s window `now` falls in
//! - code = value mod 10^7, zero-padded to 7 digits

use crate::constants::{OID_DIGITS, SEED_SIZE, TOKEN_DIGITS};
use crate::text::group_chars;
use hmac::digest::KeyInit;
use hmac::digest::generic_array::GenericArray;
use hmac::{Hmac, Mac};
use sha1::{Digest, Sha1};

type HmacSha1 = Hmac<Sha1>;

/// Seconds per time step
pub const TIME_STEP: u32 = 10;

/// Length of the flag window
pub const FLAG_WINDOW: u32 = 30;

const TRUNCATION_MASK: u32 = 0x00FF_FFDB;
const MIDDLE_THIRD_FLAG: u32 = 0x04;
const LAST_THIRD_FLAG: u32 = 0x20;
const CODE_MODULUS: u32 = 10_000_000;
const HMAC_BLOCK_SIZE: usize = 64;

/// Apply a clock offset to a local protocol epoch.
pub fn adjusted_now(epoch: u32, time_diff: i64) -> u32 {
    (epoch as i64).wrapping_add(time_diff) as u32
}

/// Raw 7-digit code for an account at protocol time `now`.
pub fn token_code(oid: u64, seed: &[u8; SEED_SIZE], now: u32) -> String {
    let oid_bytes = be_field(oid);
    let step_bytes = be_field((now / TIME_STEP) as u64);

    let mut material = Vec::with_capacity(OID_DIGITS + SEED_SIZE);
    material.extend_from_slice(&oid_bytes);
    material.extend_from_slice(seed);

    let mut key = [0u8; HMAC_BLOCK_SIZE];
    key[..20].copy_from_slice(&Sha1::digest(&material));

    let mut mac = <HmacSha1 as KeyInit>::new(GenericArray::from_slice(&key));
    mac.update(&step_bytes);
    let digest = mac.finalize().into_bytes();

    let offset = (digest[19] & 0x0f) as usize;
    let mut value = u32::from_be_bytes([digest[offset], digest[offset + 1], digest[offset + 2], digest[offset + 3]]);
    value &= TRUNCATION_MASK;

    match now % FLAG_WINDOW {
        10..20 => value |= MIDDLE_THIRD_FLAG,
        20..30 => value |= LAST_THIRD_FLAG,
        _ => {}
    }

    format!("{:0width$}", value % CODE_MODULUS, width = TOKEN_DIGITS)
}

/// Display form of a code: first three digits, a dash, then the rest.
pub fn display_token(code: &str) -> String {
    group_chars(code, "-", 3, Some(2))
}

/// Value as an 11-byte big-endian field (top bytes zero).
fn be_field(value: u64) -> [u8; OID_DIGITS] {
    let mut out = [0u8; OID_DIGITS];
    out[OID_DIGITS - 8..].copy_from_slice(&value.to_be_bytes());
    out
}
