//! AES-128-CBC payload encryption.
//!
//! Broadlink pads plaintext with zero bytes up to the block boundary and never
//! records the original length in the cipher layer. Decryption therefore
//! returns the padded buffer as-is; callers that care about trailing bytes
//! track the payload length themselves (the protocol stores it inside the
//! decrypted structures).

use aes::Aes128;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{BLOCK_SIZE, DEFAULT_AES_IV, DEFAULT_AES_KEY};

/// Key material for one device.
///
/// `CipherKey::default()` holds the well-known key and IV every device
/// accepts before authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherKey {
    pub key: [u8; 16],
    pub iv: [u8; 16],
}

impl Default for CipherKey {
    fn default() -> Self {
        Self {
            key: DEFAULT_AES_KEY,
            iv: DEFAULT_AES_IV,
        }
    }
}

impl CipherKey {
    pub fn new(key: [u8; 16], iv: [u8; 16]) -> Self {
        Self { key, iv }
    }

    /// A device-specific key paired with the default IV.
    pub fn with_key(key: [u8; 16]) -> Self {
        Self {
            key,
            iv: DEFAULT_AES_IV,
        }
    }

    pub fn is_default_key(&self) -> bool {
        self.key == DEFAULT_AES_KEY
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Vec<u8> {
        encrypt(&self.key, &self.iv, plaintext)
    }

    pub fn decrypt(&self, ciphertext: &[u8]) -> Vec<u8> {
        decrypt(&self.key, &self.iv, ciphertext)
    }
}

/// AES-128-CBC encrypt with zero padding.
///
/// Empty input yields empty output. Otherwise the output length is the input
/// length rounded up to the next multiple of 16.
pub fn encrypt(key: &[u8; 16], iv: &[u8; 16], plaintext: &[u8]) -> Vec<u8> {
    if plaintext.is_empty() {
        return Vec::new();
    }

    let cipher = Aes128::new(key.into());
    let mut output = Vec::with_capacity(plaintext.len().div_ceil(BLOCK_SIZE) * BLOCK_SIZE);
    let mut chain = *iv;

    // The trailing chunk may be short; it is zero-filled to a full block.
    for chunk in plaintext.chunks(BLOCK_SIZE) {
        let mut block = [0u8; BLOCK_SIZE];
        block[..chunk.len()].copy_from_slice(chunk);
        xor_block(&mut block, &chain);
        cipher.encrypt_block((&mut block).into());
        output.extend_from_slice(&block);
        chain = block;
    }

    output
}

/// AES-128-CBC decrypt. Padding is left in place.
///
/// A trailing partial block cannot be decrypted and is dropped.
pub fn decrypt(key: &[u8; 16], iv: &[u8; 16], ciphertext: &[u8]) -> Vec<u8> {
    let cipher = Aes128::new(key.into());
    let mut output = Vec::with_capacity(ciphertext.len());
    let mut chain = *iv;

    let blocks = ciphertext.chunks_exact(BLOCK_SIZE);
    let tail = blocks.remainder();
    if !tail.is_empty() {
        debug!(
            len = ciphertext.len(),
            dropped = hex::encode(tail),
            "Ciphertext is not block aligned, dropping partial block"
        );
    }

    for chunk in blocks {
        let mut block = [0u8; BLOCK_SIZE];
        block.copy_from_slice(chunk);
        let next_chain = block;
        cipher.decrypt_block((&mut block).into());
        xor_block(&mut block, &chain);
        output.extend_from_slice(&block);
        chain = next_chain;
    }

    output
}

fn xor_block(block: &mut [u8; BLOCK_SIZE], other: &[u8; BLOCK_SIZE]) {
    for (b, o) in block.iter_mut().zip(other) {
        *b ^= o;
    }
}
