pub mod error;
pub mod ledger;
pub mod registry;
pub mod visibility;

use std::sync::Mutex;

use murmur_crypto::CipherGateway;
use tracing::info;

pub use error::StoreError;
pub use ledger::{Ledger, verify_event, verify_events};
pub use registry::{Registry, SessionId};

/// Default number of events kept in memory.
pub const DEFAULT_MAX_EVENTS: usize = 500;

/// Default number of concurrent sessions.
pub const DEFAULT_MAX_SESSIONS: usize = 64;

/// Ledger and registry, mutated together under one lock.
pub struct State {
    pub ledger: Ledger,
    pub registry: Registry,
}

/// Shared in-memory chat state.
///
/// Every caller goes through [`Store::with_state`], so an append (with its
/// eviction) or a registry mutation is never observed half done.
pub struct Store {
    state: Mutex<State>,
}

impl Store {
    pub fn new(max_events: usize, max_sessions: usize, cipher: CipherGateway) -> Self {
        info!(
            "Store ready: {} events, {} sessions, cipher '{}'",
            max_events,
            max_sessions,
            cipher.name()
        );
        Self {
            state: Mutex::new(State {
                ledger: Ledger::new(max_events, cipher),
                registry: Registry::new(max_sessions),
            }),
        }
    }

    pub fn with_state<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut State) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut state = self.state.lock().map_err(|_| StoreError::LockPoisoned)?;
        f(&mut state)
    }
}
