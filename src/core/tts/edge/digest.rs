//! SHA-256 digest with a portable fallback.
//!
//! The engine prefers a primary backend (the `sha2` crate). If no backend is
//! configured, or the backend reports an error, the digest is computed by
//! [`PortableSha256`], a self-contained implementation of FIPS 180-4.
//! Callers never see an error.

use sha2::{Digest, Sha256};
use tracing::warn;

/// Round constants: first 32 bits of the fractional parts of the cube roots
/// of the first 64 primes.
const K: [u32; 64] = [
    0x428a2f98, 0x71374491, 0xb5c0fbcf, 0xe9b5dba5, 0x3956c25b, 0x59f111f1, 0x923f82a4, 0xab1c5ed5,
    0xd807aa98, 0x12835b01, 0x243185be, 0x550c7dc3, 0x72be5d74, 0x80deb1fe, 0x9bdc06a7, 0xc19bf174,
    0xe49b69c1, 0xefbe4786, 0x0fc19dc6, 0x240ca1cc, 0x2de92c6f, 0x4a7484aa, 0x5cb0a9dc, 0x76f988da,
    0x983e5152, 0xa831c66d, 0xb00327c8, 0xbf597fc7, 0xc6e00bf3, 0xd5a79147, 0x06ca6351, 0x14292967,
    0x27b70a85, 0x2e1b2138, 0x4d2c6dfc, 0x53380d13, 0x650a7354, 0x766a0abb, 0x81c2c92e, 0x92722c85,
    0xa2bfe8a1, 0xa81a664b, 0xc24b8b70, 0xc76c51a3, 0xd192e819, 0xd6990624, 0xf40e3585, 0x106aa070,
    0x19a4c116, 0x1e376c08, 0x2748774c, 0x34b0bcb5, 0x391c0cb3, 0x4ed8aa4a, 0x5b9cca4f, 0x682e6ff3,
    0x748f82ee, 0x78a5636f, 0x84c87814, 0x8cc70208, 0x90befffa, 0xa4506ceb, 0xbef9a3f7, 0xc67178f2,
];

/// Initial hash state: first 32 bits of the fractional parts of the square
/// roots of the first 8 primes.
const H0: [u32; 8] = [
    0x6a09e667, 0xbb67ae85, 0x3c6ef372, 0xa54ff53a, 0x510e527f, 0x9b05688c, 0x1f83d9ab, 0x5be0cd19,
];

/// A SHA-256 implementation that may be unavailable or fail.
pub trait DigestBackend: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &'static str;

    /// Compute the 32-byte digest of `input`.
    fn sha256(&self, input: &[u8]) -> Result<[u8; 32], String>;
}

/// Backend on the `sha2` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha2Backend;

impl DigestBackend for Sha2Backend {
    fn name(&self) -> &'static str {
        "sha2"
    }

    fn sha256(&self, input: &[u8]) -> Result<[u8; 32], String> {
        Ok(Sha256::digest(input).into())
    }
}

/// Self-contained SHA-256.
#[derive(Debug, Clone, Copy, Default)]
pub struct PortableSha256;

impl PortableSha256 {
    /// Compute the digest as eight big-endian state words.
    pub fn digest_words(input: &[u8]) -> [u32; 8] {
        let mut state = H0;

        for block in Self::pad(input).chunks_exact(64) {
            Self::compress(&mut state, block);
        }

        state
    }

    /// Pad to a multiple of 64 bytes: 0x80 marker, zeros, 64-bit BE bit length.
    fn pad(input: &[u8]) -> Vec<u8> {
        let bit_len = (input.len() as u64).wrapping_mul(8);
        let mut message = Vec::with_capacity(input.len() + 72);
        message.extend_from_slice(input);
        message.push(0x80);
        while message.len() % 64 != 56 {
            message.push(0);
        }
        message.extend_from_slice(&bit_len.to_be_bytes());
        message
    }

    fn compress(state: &mut [u32; 8], block: &[u8]) {
        let mut w = [0u32; 64];
        for (i, word) in block.chunks_exact(4).enumerate() {
            w[i] = u32::from_be_bytes([word[0], word[1], word[2], word[3]]);
        }
        for i in 16..64 {
            let s0 = w[i - 15].rotate_right(7) ^ w[i - 15].rotate_right(18) ^ (w[i - 15] >> 3);
            let s1 = w[i - 2].rotate_right(17) ^ w[i - 2].rotate_right(19) ^ (w[i - 2] >> 10);
            w[i] = w[i - 16]
                .wrapping_add(s0)
                .wrapping_add(w[i - 7])
                .wrapping_add(s1);
        }

        let [mut a, mut b, mut c, mut d, mut e, mut f, mut g, mut h] = *state;

        for i in 0..64 {
            let big_s1 = e.rotate_right(6) ^ e.rotate_right(11) ^ e.rotate_right(25);
            let ch = (e & f) ^ (!e & g);
            let temp1 = h
                .wrapping_add(big_s1)
                .wrapping_add(ch)
                .wrapping_add(K[i])
                .wrapping_add(w[i]);
            let big_s0 = a.rotate_right(2) ^ a.rotate_right(13) ^ a.rotate_right(22);
            let maj = (a & b) ^ (a & c) ^ (b & c);
            let temp2 = big_s0.wrapping_add(maj);

            h = g;
            g = f;
            f = e;
            e = d.wrapping_add(temp1);
            d = c;
            c = b;
            b = a;
            a = temp1.wrapping_add(temp2);
        }

        for (slot, value) in state.iter_mut().zip([a, b, c, d, e, f, g, h]) {
            *slot = slot.wrapping_add(value);
        }
    }

    /// Uppercase hex rendering: eight zero-padded 8-digit groups.
    pub fn hex_upper(input: &[u8]) -> String {
        Self::digest_words(input)
            .iter()
            .map(|word| format!("{word:08x}"))
            .collect::<String>()
            .to_uppercase()
    }
}

impl DigestBackend for PortableSha256 {
    fn name(&self) -> &'static str {
        "portable"
    }

    fn sha256(&self, input: &[u8]) -> Result<[u8; 32], String> {
        let mut out = [0u8; 32];
        for (chunk, word) in out.chunks_exact_mut(4).zip(Self::digest_words(input)) {
            chunk.copy_from_slice(&word.to_be_bytes());
        }
        Ok(out)
    }
}

/// Digest engine with primary-then-portable fallback.
pub struct DigestEngine {
    primary: Option<Box<dyn DigestBackend>>,
}

impl Default for DigestEngine {
    fn default() -> Self {
        Self::new(Some(Box::new(Sha2Backend)))
    }
}

impl DigestEngine {
    pub fn new(primary: Option<Box<dyn DigestBackend>>) -> Self {
        Self { primary }
    }

    /// Engine that always uses the portable implementation.
    pub fn portable_only() -> Self {
        Self::new(None)
    }

    /// SHA-256 of `input` as 64 uppercase hex characters.
    pub fn digest_hex_upper(&self, input: &[u8]) -> String {
        if let Some(backend) = &self.primary {
            match backend.sha256(input) {
                Ok(digest) => return hex::encode_upper(digest),
                Err(e) => {
                    warn!(
                        "Digest backend '{}' failed, using portable SHA-256: {}",
                        backend.name(),
                        e
                    );
                }
            }
        }

        PortableSha256::hex_upper(input)
    }
}
