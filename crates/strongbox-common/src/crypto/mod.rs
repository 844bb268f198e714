//! RSA key wrapping and AES-128-CBC payload cryptography.
//!
//! Key exchange: the server generates a fresh AES-128 key per client and
//! wraps it with RSA-OAEP (SHA-1 digest and MGF1, empty label) under the
//! client's own public key, so only the holder of the matching private key
//! can recover it. File contents are then exchanged under that AES key in
//! CBC mode with a random IV prepended to the ciphertext and PKCS#7 padding.

use crate::error::CryptoError;
use aes::Aes128;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit, generic_array::GenericArray};
use rand::RngCore;
use rand::rngs::OsRng;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::{Oaep, RsaPublicKey};
use sha1::Sha1;

/// AES-128 key size in bytes.
pub const AES_KEY_SIZE: usize = 16;

/// AES block size in bytes (also the IV size for CBC mode).
const BLOCK_SIZE: usize = 16;

/// Generate a fresh 16-byte client id (UUID v4).
pub fn generate_client_id() -> [u8; 16] {
    *uuid::Uuid::new_v4().as_bytes()
}

/// Generate a fresh, cryptographically random AES-128 key.
pub fn generate_aes_key() -> [u8; AES_KEY_SIZE] {
    let mut key = [0u8; AES_KEY_SIZE];
    OsRng.fill_bytes(&mut key);
    key
}

/// Parse an RSA public key from PKCS#1 DER bytes, as received in the
/// SEND_PUBLIC_KEY payload.
pub fn parse_public_key_der(der: &[u8]) -> Result<RsaPublicKey, CryptoError> {
    RsaPublicKey::from_pkcs1_der(der).map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
}

/// Wrap `aes_key` with RSA-OAEP (SHA-1, empty label) under `public_key`.
pub fn encrypt_aes_key(aes_key: &[u8], public_key: &RsaPublicKey) -> Result<Vec<u8>, CryptoError> {
    let mut rng = OsRng;
    public_key
        .encrypt(&mut rng, Oaep::new::<Sha1>(), aes_key)
        .map_err(|e| CryptoError::RsaEncrypt(e.to_string()))
}

/// Decrypt an AES-128-CBC payload whose first 16 bytes are the IV and whose
/// remainder is PKCS#7-padded ciphertext, returning the unpadded plaintext.
pub fn decrypt_cbc(payload: &[u8], key: &[u8; AES_KEY_SIZE]) -> Result<Vec<u8>, CryptoError> {
    if payload.len() < BLOCK_SIZE {
        return Err(CryptoError::ShortCiphertext);
    }
    let (iv, ciphertext) = payload.split_at(BLOCK_SIZE);
    if !ciphertext.len().is_multiple_of(BLOCK_SIZE) {
        return Err(CryptoError::UnalignedCiphertext(ciphertext.len()));
    }

    let cipher = Aes128::new(GenericArray::from_slice(key));
    let mut prev = GenericArray::clone_from_slice(iv);
    let mut plaintext = Vec::with_capacity(ciphertext.len());

    for chunk in ciphertext.chunks(BLOCK_SIZE) {
        let cipher_block = GenericArray::clone_from_slice(chunk);
        let mut block = cipher_block;
        cipher.decrypt_block(&mut block);
        for (b, p) in block.iter_mut().zip(prev.iter()) {
            *b ^= p;
        }
        plaintext.extend_from_slice(&block);
        prev = cipher_block;
    }

    strip_pkcs7(&mut plaintext)?;
    Ok(plaintext)
}

/// Encrypt `plaintext` with AES-128-CBC under a fresh random IV, PKCS#7
/// padding the plaintext first. Returns `IV || ciphertext`. Used by tests and
/// any client-side tooling exercising the round-trip law.
pub fn encrypt_cbc(plaintext: &[u8], key: &[u8; AES_KEY_SIZE]) -> Vec<u8> {
    let cipher = Aes128::new(GenericArray::from_slice(key));

    let mut iv = [0u8; BLOCK_SIZE];
    OsRng.fill_bytes(&mut iv);

    let mut padded = plaintext.to_vec();
    let padding_len = BLOCK_SIZE - (plaintext.len() % BLOCK_SIZE);
    padded.extend(std::iter::repeat_n(padding_len as u8, padding_len));

    let mut out = Vec::with_capacity(BLOCK_SIZE + padded.len());
    out.extend_from_slice(&iv);

    let mut prev = GenericArray::clone_from_slice(&iv);
    for chunk in padded.chunks(BLOCK_SIZE) {
        let mut block = GenericArray::clone_from_slice(chunk);
        for (b, p) in block.iter_mut().zip(prev.iter()) {
            *b ^= p;
        }
        cipher.encrypt_block(&mut block);
        out.extend_from_slice(&block);
        prev = block;
    }

    out
}

fn strip_pkcs7(data: &mut Vec<u8>) -> Result<(), CryptoError> {
    let padding_len = match data.last() {
        Some(&b) if b > 0 && (b as usize) <= BLOCK_SIZE => b as usize,
        _ => return Err(CryptoError::BadPadding),
    };
    if data.len() < padding_len {
        return Err(CryptoError::BadPadding);
    }
    let tail = &data[data.len() - padding_len..];
    if tail.iter().any(|&b| b as usize != padding_len) {
        return Err(CryptoError::BadPadding);
    }
    let new_len = data.len() - padding_len;
    data.truncate(new_len);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::RsaPrivateKey;

    #[test]
    fn aes_cbc_roundtrip_arbitrary_lengths() {
        let key = generate_aes_key();
        for len in [0usize, 1, 15, 16, 17, 255, 1000] {
            let plaintext: Vec<u8> = (0..len).map(|i| (i % 256) as u8).collect();
            let ciphertext = encrypt_cbc(&plaintext, &key);
            let decrypted = decrypt_cbc(&ciphertext, &key).unwrap();
            assert_eq!(decrypted, plaintext, "failed roundtrip for len {len}");
        }
    }

    #[test]
    fn aes_cbc_rejects_bad_padding() {
        let key = generate_aes_key();
        let mut ciphertext = encrypt_cbc(b"hello", &key);
        // Corrupt the last byte so the final decrypted block has garbage padding.
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0xFF;
        let result = decrypt_cbc(&ciphertext, &key);
        assert!(result.is_err() || result.unwrap() != b"hello");
    }

    #[test]
    fn aes_cbc_rejects_short_ciphertext() {
        let key = generate_aes_key();
        let err = decrypt_cbc(&[0u8; 8], &key).unwrap_err();
        assert!(matches!(err, CryptoError::ShortCiphertext));
    }

    #[test]
    fn rsa_oaep_roundtrip() {
        let mut rng = OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, 1024).unwrap();
        let public_key = RsaPublicKey::from(&private_key);

        let aes_key = generate_aes_key();
        let wrapped = encrypt_aes_key(&aes_key, &public_key).unwrap();

        let unwrapped = private_key.decrypt(Oaep::new::<Sha1>(), &wrapped).unwrap();
        assert_eq!(unwrapped, aes_key);
    }

    #[test]
    fn generate_client_id_is_not_all_zero_and_varies() {
        let a = generate_client_id();
        let b = generate_client_id();
        assert_ne!(a, [0u8; 16]);
        assert_ne!(a, b);
    }
}
