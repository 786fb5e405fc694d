use sha2::{Digest, Sha256};

/// A keyed, length-preserving byte transform.
///
/// Implementations must satisfy `decrypt(&encrypt(x, k), k) == x` for every
/// input and key id, and must return output of the same length as the input.
pub trait Cipher: Send + Sync + 'static {
    /// Short human-readable description, shown by the status command.
    fn name(&self) -> &str;

    fn encrypt(&self, plaintext: &[u8], key_id: u32) -> Vec<u8>;

    fn decrypt(&self, ciphertext: &[u8], key_id: u32) -> Vec<u8>;
}

/// XOR against a SHA-256 counter-mode keystream derived from the key id.
///
/// Not a confidentiality primitive. It exists so the stored copy can be
/// checked against the plaintext on the way out.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeystreamCipher;

impl KeystreamCipher {
    fn apply(input: &[u8], key_id: u32) -> Vec<u8> {
        let mut out = Vec::with_capacity(input.len());
        for (block_idx, chunk) in input.chunks(32).enumerate() {
            let mut hasher = Sha256::new();
            hasher.update(key_id.to_be_bytes());
            hasher.update((block_idx as u64).to_be_bytes());
            let pad = hasher.finalize();
            out.extend(chunk.iter().zip(pad.iter()).map(|(b, k)| b ^ k));
        }
        out
    }
}

impl Cipher for KeystreamCipher {
    fn name(&self) -> &str {
        "sha256 keystream xor"
    }

    fn encrypt(&self, plaintext: &[u8], key_id: u32) -> Vec<u8> {
        Self::apply(plaintext, key_id)
    }

    fn decrypt(&self, ciphertext: &[u8], key_id: u32) -> Vec<u8> {
        Self::apply(ciphertext, key_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EVENT_KEY_ID;

    /// Longest event body, mirrored from murmur-types to avoid a dependency.
    const MAX_LEN: usize = 479;

    #[test]
    fn roundtrip_every_length() {
        let cipher = KeystreamCipher;
        let source: Vec<u8> = (0..MAX_LEN).map(|i| (i % 251) as u8).collect();

        for len in 1..=MAX_LEN {
            let plaintext = &source[..len];
            let ciphertext = cipher.encrypt(plaintext, EVENT_KEY_ID);
            assert_eq!(ciphertext.len(), len);
            assert_eq!(cipher.decrypt(&ciphertext, EVENT_KEY_ID), plaintext);
        }
    }

    #[test]
    fn ciphertext_differs_from_plaintext() {
        let cipher = KeystreamCipher;
        let message = b"Hello from murmur!";
        assert_ne!(cipher.encrypt(message, EVENT_KEY_ID), message);
    }

    #[test]
    fn wrong_key_does_not_roundtrip() {
        let cipher = KeystreamCipher;
        let message = b"Secret message";

        let ciphertext = cipher.encrypt(message, 1);
        assert_ne!(cipher.decrypt(&ciphertext, 2), message);
    }

    #[test]
    fn empty_input_gives_empty_output() {
        assert!(KeystreamCipher.encrypt(b"", EVENT_KEY_ID).is_empty());
    }
}
