//! Authenticated encryption for the on-disk catalog blob.
//!
//! AES-GCM keyed by 16/24/32 bytes; a fresh 12-byte nonce prefixes each
//! ciphertext.

use aes_gcm::aead::consts::U12;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::aes::Aes192;
use aes_gcm::{Aes128Gcm, Aes256Gcm, AesGcm, Nonce};
use rand::RngCore;
use rand::rngs::OsRng;

/// Nonce length prefixed to every ciphertext.
const NONCE_LEN: usize = 12;

/// `aes-gcm` only aliases the 128/256 variants.
type Aes192Gcm = AesGcm<Aes192, U12>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CryptoError {
    KeyLength(usize),
    Encrypt,
    Decrypt,
}

/// Cipher selected by key length.
pub(crate) enum Cipher {
    Aes128(Aes128Gcm),
    Aes192(Aes192Gcm),
    Aes256(Aes256Gcm),
}

impl Cipher {
    pub(crate) fn new(key: &[u8]) -> Result<Self, CryptoError> {
        match key.len() {
            16 => Aes128Gcm::new_from_slice(key)
                .map(Cipher::Aes128)
                .map_err(|_| CryptoError::KeyLength(16)),
            24 => Aes192Gcm::new_from_slice(key)
                .map(Cipher::Aes192)
                .map_err(|_| CryptoError::KeyLength(24)),
            32 => Aes256Gcm::new_from_slice(key)
                .map(Cipher::Aes256)
                .map_err(|_| CryptoError::KeyLength(32)),
            other => Err(CryptoError::KeyLength(other)),
        }
    }

    /// Encrypt `plaintext`, returning `nonce || ciphertext`.
    pub(crate) fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = match self {
            Cipher::Aes128(cipher) => cipher.encrypt(nonce, plaintext),
            Cipher::Aes192(cipher) => cipher.encrypt(nonce, plaintext),
            Cipher::Aes256(cipher) => cipher.encrypt(nonce, plaintext),
        }
        .map_err(|_| CryptoError::Encrypt)?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    /// Decrypt a `nonce || ciphertext` blob. Truncated input, a wrong key,
    /// and tampered bytes all surface as `Decrypt`.
    pub(crate) fn open(&self, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if sealed.len() < NONCE_LEN {
            return Err(CryptoError::Decrypt);
        }
        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        match self {
            Cipher::Aes128(cipher) => cipher.decrypt(nonce, ciphertext),
            Cipher::Aes192(cipher) => cipher.decrypt(nonce, ciphertext),
            Cipher::Aes256(cipher) => cipher.decrypt(nonce, ciphertext),
        }
        .map_err(|_| CryptoError::Decrypt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_for_every_key_length() {
        for len in [16usize, 24, 32] {
            let key = vec![0x42u8; len];
            let cipher = Cipher::new(&key).expect("valid key length");
            let sealed = cipher.seal(b"hello").expect("seal");
            assert_ne!(&sealed[NONCE_LEN..], b"hello");
            assert_eq!(cipher.open(&sealed).expect("open"), b"hello");
        }
    }

    #[test]
    fn rejects_bad_key_lengths() {
        for len in [0usize, 15, 17, 31, 33] {
            let key = vec![0u8; len];
            assert_eq!(
                Cipher::new(&key).err(),
                Some(CryptoError::KeyLength(len)),
                "length {len} must be rejected"
            );
        }
    }

    #[test]
    fn wrong_key_fails_to_open() {
        let cipher = Cipher::new(&[1u8; 32]).expect("key");
        let other = Cipher::new(&[2u8; 32]).expect("key");
        let sealed = cipher.seal(b"secret").expect("seal");
        assert_eq!(other.open(&sealed).err(), Some(CryptoError::Decrypt));
    }

    #[test]
    fn tampered_ciphertext_fails_to_open() {
        let cipher = Cipher::new(&[1u8; 16]).expect("key");
        let mut sealed = cipher.seal(b"secret").expect("seal");
        let last = sealed.len() - 1;
        sealed[last] ^= 0xff;
        assert_eq!(cipher.open(&sealed).err(), Some(CryptoError::Decrypt));
    }

    #[test]
    fn truncated_blob_fails_to_open() {
        let cipher = Cipher::new(&[1u8; 16]).expect("key");
        assert_eq!(cipher.open(&[0u8; 4]).err(), Some(CryptoError::Decrypt));
    }

    #[test]
    fn nonces_are_fresh_per_seal() {
        let cipher = Cipher::new(&[1u8; 32]).expect("key");
        let a = cipher.seal(b"same").expect("seal");
        let b = cipher.seal(b"same").expect("seal");
        assert_ne!(a[..NONCE_LEN], b[..NONCE_LEN]);
    }
}
