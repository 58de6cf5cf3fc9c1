//! Cryptographic operations for the import core.
//!
//! - SHA-256 identifies headers and transactions (content hashes)
//! - BLAKE3 hashes Merkle nodes and bloom inputs
//! - Ed25519 signs transactions and block seals
//!
//! All operations are deterministic; only key generation touches randomness.

use crate::error::SignatureError;
use crate::types::Hash;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

/// Compute BLAKE3 hash of the input data.
pub fn hash_blake3(data: &[u8]) -> Hash {
    *blake3::hash(data).as_bytes()
}

/// Compute SHA-256 hash of the input data.
pub fn hash_sha256(data: &[u8]) -> Hash {
    use sha2::Digest;
    let result = sha2::Sha256::digest(data);
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// Verify an Ed25519 signature over `message`.
pub fn verify_ed25519(
    message: &[u8],
    signature: &[u8; 64],
    public_key: &[u8; 32],
) -> Result<(), SignatureError> {
    let verifying_key =
        VerifyingKey::from_bytes(public_key).map_err(|_| SignatureError::InvalidPublicKey)?;
    let sig = Signature::from_bytes(signature);
    verifying_key
        .verify(message, &sig)
        .map_err(|_| SignatureError::InvalidSignature)
}

/// Sign a message with an Ed25519 private key.
pub fn sign_ed25519(message: &[u8], secret_key: &SigningKey) -> [u8; 64] {
    secret_key.sign(message).to_bytes()
}

/// Generate an Ed25519 keypair from OS randomness.
///
/// Never used on the validation path.
pub fn generate_keypair() -> (VerifyingKey, SigningKey) {
    let mut rng = rand::rngs::OsRng;
    let signing_key = SigningKey::generate(&mut rng);
    let verifying_key = signing_key.verifying_key();
    (verifying_key, signing_key)
}

/// Derive a signing key from a fixed 32-byte seed (deterministic fixtures).
pub fn signing_key_from_seed(seed: &[u8; 32]) -> SigningKey {
    SigningKey::from_bytes(seed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blake3_deterministic() {
        let data = b"hello strata";
        let h1 = hash_blake3(data);
        let h2 = hash_blake3(data);
        assert_eq!(h1, h2);
        assert_ne!(h1, hash_blake3(b"hello strata!"));
    }

    #[test]
    fn test_sha256_known_vector() {
        // SHA-256("") = e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855
        let h = hash_sha256(b"");
        assert_eq!(h[0], 0xe3);
        assert_eq!(h[1], 0xb0);
        assert_eq!(h[31], 0x55);
    }

    #[test]
    fn test_ed25519_sign_verify_roundtrip() {
        let (verifying_key, signing_key) = generate_keypair();
        let message = b"strata block seal";
        let signature = sign_ed25519(message, &signing_key);
        assert!(verify_ed25519(message, &signature, verifying_key.as_bytes()).is_ok());
    }

    #[test]
    fn test_ed25519_reject_wrong_message() {
        let (verifying_key, signing_key) = generate_keypair();
        let signature = sign_ed25519(b"correct message", &signing_key);
        assert_eq!(
            verify_ed25519(b"wrong message", &signature, verifying_key.as_bytes()),
            Err(SignatureError::InvalidSignature)
        );
    }

    #[test]
    fn test_ed25519_reject_wrong_key() {
        let (_vk1, signing_key) = generate_keypair();
        let (vk2, _sk2) = generate_keypair();
        let signature = sign_ed25519(b"test message", &signing_key);
        assert!(verify_ed25519(b"test message", &signature, vk2.as_bytes()).is_err());
    }

    #[test]
    fn test_seeded_keys_are_stable() {
        let a = signing_key_from_seed(&[7u8; 32]);
        let b = signing_key_from_seed(&[7u8; 32]);
        assert_eq!(a.verifying_key(), b.verifying_key());
    }
}
