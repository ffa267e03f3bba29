//! Block cipher adapter — AES-128 in ECB mode.
//!
//! The frame protocol encrypts a body one 16-byte block at a time, in
//! order, with no chaining and no IV. ECB is a deliberate, inherited
//! weakness: identical plaintext blocks at the same offset across frames
//! produce identical ciphertext blocks. The cipher key is shared across
//! the whole transport (coarse confidentiality); per-vehicle authenticity
//! comes from the integrity tag layer, not from here.

use aes::Aes128;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};

/// Cipher block length in bytes. Frame bodies are multiples of this.
pub const BLOCK_LEN: usize = 16;

/// A 128-bit block cipher applied per block, independently.
///
/// Kept as a trait so the frame protocol never names a concrete cipher;
/// swapping the primitive (or a mode wrapper) touches only this module.
pub trait FrameCipher {
    fn encrypt_block(&self, block: &mut [u8; BLOCK_LEN]);
    fn decrypt_block(&self, block: &mut [u8; BLOCK_LEN]);
}

/// AES-128-ECB over the shared transport key.
pub struct Aes128Ecb {
    inner: Aes128,
}

impl Aes128Ecb {
    pub fn new(key: &[u8; BLOCK_LEN]) -> Self {
        Self {
            inner: Aes128::new(key.into()),
        }
    }
}

impl FrameCipher for Aes128Ecb {
    fn encrypt_block(&self, block: &mut [u8; BLOCK_LEN]) {
        self.inner.encrypt_block(block.into());
    }

    fn decrypt_block(&self, block: &mut [u8; BLOCK_LEN]) {
        self.inner.decrypt_block(block.into());
    }
}
