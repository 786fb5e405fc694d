/// Murmur Crypto Library
///
/// Every stored chat event carries a ciphertext copy of its text that is
/// decrypted again at poll time as an integrity self-check. The transform
/// is an injected [`Cipher`] strategy; the [`CipherGateway`] wraps it with
/// a latency bound so a misbehaving strategy degrades to "no ciphertext"
/// instead of stalling the caller.

pub mod cipher;
pub mod gateway;

pub use cipher::{Cipher, KeystreamCipher};
pub use gateway::CipherGateway;

/// Process-wide key id used for event text.
pub const EVENT_KEY_ID: u32 = 0xCAFE;
