//! Cryptographic primitives for backup archives.
//!
//! # Algorithms
//!
//! - **Key Derivation**: Argon2id (memory-hard, brute-force resistant)
//! - **Encryption**: ChaCha20-Poly1305 (authenticated encryption)
//!
//! Every archive gets its own random salt and nonce. The password is never
//! used as a key directly, and a (key, nonce) pair is never reused.

use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::{aead::Aead, ChaCha20Poly1305, Key, KeyInit, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use super::KdfSettings;
use crate::error::{HerdError, Result};

/// Salt length for key derivation (16 bytes)
pub const SALT_LEN: usize = 16;

/// Nonce length for ChaCha20-Poly1305 (12 bytes)
pub const NONCE_LEN: usize = 12;

/// Derived key length (32 bytes)
pub const KEY_LEN: usize = 32;

/// ChaCha20-Poly1305 auth tag length (16 bytes)
pub const AUTH_TAG_LEN: usize = 16;

/// Upper bound on Argon2 memory accepted from an archive (1 GiB)
const MAX_MEMORY_KIB: u32 = 1024 * 1024;

/// Upper bound on Argon2 passes accepted from an archive
const MAX_ITERATIONS: u32 = 64;

/// Generate cryptographically secure random bytes.
pub fn generate_random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Derive a 256-bit encryption key from a password using Argon2id.
///
/// Parameters come from the archive envelope on restore, so they are
/// bounds-checked before use.
pub fn derive_key(password: &[u8], salt: &[u8], kdf: &KdfSettings) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    if kdf.algorithm != super::KDF_ALGORITHM {
        return Err(HerdError::InvalidArchive(format!(
            "unsupported key derivation algorithm: {}",
            kdf.algorithm
        )));
    }
    if kdf.memory_kib > MAX_MEMORY_KIB {
        return Err(HerdError::InvalidArchive(format!(
            "key derivation memory too large: {} KiB",
            kdf.memory_kib
        )));
    }
    if kdf.iterations > MAX_ITERATIONS {
        return Err(HerdError::InvalidArchive(format!(
            "key derivation iterations too large: {}",
            kdf.iterations
        )));
    }

    let params = Params::new(kdf.memory_kib, kdf.iterations, kdf.parallelism, Some(KEY_LEN))
        .map_err(|e| HerdError::InvalidArchive(format!("invalid Argon2 params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(password, salt, key.as_mut_slice())
        .map_err(|e| HerdError::Internal(format!("Key derivation failed: {e}")))?;

    Ok(key)
}

/// Encrypt `plaintext` with ChaCha20-Poly1305.
///
/// Output is the ciphertext followed by the 16-byte auth tag.
pub fn encrypt(plaintext: &[u8], key: &[u8; KEY_LEN], nonce: &[u8; NONCE_LEN]) -> Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|e| HerdError::Internal(format!("Encryption failed: {e}")))
}

/// Decrypt and authenticate a ciphertext.
///
/// A wrong key and tampered data are indistinguishable to the AEAD;
/// both surface as [`HerdError::Crypto`].
pub fn decrypt(ciphertext: &[u8], key: &[u8; KEY_LEN], nonce: &[u8; NONCE_LEN]) -> Result<Zeroizing<Vec<u8>>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| HerdError::Crypto)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KdfConfig;

    fn fast_kdf() -> KdfSettings {
        KdfConfig::insecure_fast().into()
    }

    #[test]
    fn test_random_bytes() {
        let bytes1: [u8; SALT_LEN] = generate_random_bytes();
        let bytes2: [u8; SALT_LEN] = generate_random_bytes();
        assert_ne!(bytes1, bytes2);
    }

    #[test]
    fn test_key_derivation() {
        let salt: [u8; SALT_LEN] = generate_random_bytes();

        let key1 = derive_key(b"hay-and-oats", &salt, &fast_kdf()).unwrap();
        let key2 = derive_key(b"hay-and-oats", &salt, &fast_kdf()).unwrap();
        assert_eq!(*key1, *key2);

        let salt2: [u8; SALT_LEN] = generate_random_bytes();
        let key3 = derive_key(b"hay-and-oats", &salt2, &fast_kdf()).unwrap();
        assert_ne!(*key1, *key3);
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let salt: [u8; SALT_LEN] = generate_random_bytes();
        let nonce: [u8; NONCE_LEN] = generate_random_bytes();
        let key = derive_key(b"pw", &salt, &fast_kdf()).unwrap();

        let ciphertext = encrypt(b"goats", &key, &nonce).unwrap();
        assert_eq!(ciphertext.len(), 5 + AUTH_TAG_LEN);

        let plaintext = decrypt(&ciphertext, &key, &nonce).unwrap();
        assert_eq!(plaintext.as_slice(), b"goats");
    }

    #[test]
    fn test_decrypt_wrong_password_fails() {
        let salt: [u8; SALT_LEN] = generate_random_bytes();
        let nonce: [u8; NONCE_LEN] = generate_random_bytes();

        let key = derive_key(b"correct", &salt, &fast_kdf()).unwrap();
        let ciphertext = encrypt(b"goats", &key, &nonce).unwrap();

        let wrong = derive_key(b"wrong", &salt, &fast_kdf()).unwrap();
        assert!(matches!(decrypt(&ciphertext, &wrong, &nonce), Err(HerdError::Crypto)));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let salt: [u8; SALT_LEN] = generate_random_bytes();
        let nonce: [u8; NONCE_LEN] = generate_random_bytes();
        let key = derive_key(b"pw", &salt, &fast_kdf()).unwrap();

        let mut ciphertext = encrypt(b"goats", &key, &nonce).unwrap();
        ciphertext[0] ^= 0x01;
        assert!(matches!(decrypt(&ciphertext, &key, &nonce), Err(HerdError::Crypto)));
    }

    #[test]
    fn test_rejects_hostile_kdf_params() {
        let mut kdf = fast_kdf();
        kdf.memory_kib = u32::MAX;
        assert!(matches!(
            derive_key(b"pw", &[0u8; SALT_LEN], &kdf),
            Err(HerdError::InvalidArchive(_))
        ));

        let mut kdf = fast_kdf();
        kdf.iterations = u32::MAX;
        assert!(matches!(
            derive_key(b"pw", &[0u8; SALT_LEN], &kdf),
            Err(HerdError::InvalidArchive(_))
        ));

        let mut kdf = fast_kdf();
        kdf.algorithm = "pbkdf2".into();
        assert!(derive_key(b"pw", &[0u8; SALT_LEN], &kdf).is_err());
    }
}
