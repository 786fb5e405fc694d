use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use tracing::warn;

use crate::cipher::Cipher;

#[derive(Debug, Clone, Copy)]
enum Direction {
    Encrypt,
    Decrypt,
}

/// Latency-bounded front for a [`Cipher`] strategy.
///
/// Each call runs the strategy on a short-lived worker thread and waits at
/// most `timeout` for it. A panic, a timeout or a length-changing result is
/// reported as `None`. A timed-out worker is left to finish on its own; its
/// result is dropped.
#[derive(Clone)]
pub struct CipherGateway {
    cipher: Arc<dyn Cipher>,
    key_id: u32,
    timeout: Duration,
}

impl CipherGateway {
    pub fn new(cipher: Arc<dyn Cipher>, key_id: u32, timeout: Duration) -> Self {
        Self {
            cipher,
            key_id,
            timeout,
        }
    }

    pub fn name(&self) -> &str {
        self.cipher.name()
    }

    pub fn key_id(&self) -> u32 {
        self.key_id
    }

    /// Encrypt `plaintext`. Empty input produces no ciphertext.
    pub fn encrypt(&self, plaintext: &[u8]) -> Option<Vec<u8>> {
        if plaintext.is_empty() {
            return None;
        }
        self.run(Direction::Encrypt, plaintext.to_vec())
    }

    pub fn decrypt(&self, ciphertext: &[u8]) -> Option<Vec<u8>> {
        if ciphertext.is_empty() {
            return None;
        }
        self.run(Direction::Decrypt, ciphertext.to_vec())
    }

    /// Decrypt `ciphertext` and compare it with `plaintext`.
    /// Returns `None` when no comparison could be made.
    pub fn verify(&self, plaintext: &[u8], ciphertext: &[u8]) -> Option<bool> {
        self.decrypt(ciphertext).map(|decrypted| decrypted == plaintext)
    }

    fn run(&self, direction: Direction, input: Vec<u8>) -> Option<Vec<u8>> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let cipher = Arc::clone(&self.cipher);
        let key_id = self.key_id;
        let expected_len = input.len();

        let spawned = std::thread::Builder::new()
            .name("cipher".into())
            .spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| match direction {
                    Direction::Encrypt => cipher.encrypt(&input, key_id),
                    Direction::Decrypt => cipher.decrypt(&input, key_id),
                }));
                // Receiver may have given up already
                let _ = tx.send(result);
            });
        if let Err(e) = spawned {
            warn!("Cipher worker spawn failed: {}", e);
            return None;
        }

        match rx.recv_timeout(self.timeout) {
            Ok(Ok(output)) if output.len() == expected_len => Some(output),
            Ok(Ok(output)) => {
                warn!(
                    "Cipher {:?} changed length ({} -> {}), discarding",
                    direction,
                    expected_len,
                    output.len()
                );
                None
            }
            Ok(Err(_)) => {
                warn!("Cipher {:?} panicked", direction);
                None
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!("Cipher {:?} timed out after {:?}", direction, self.timeout);
                None
            }
            Err(RecvTimeoutError::Disconnected) => {
                warn!("Cipher {:?} worker vanished", direction);
                None
            }
        }
    }
}
