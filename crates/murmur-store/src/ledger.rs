use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use murmur_crypto::CipherGateway;
use murmur_types::models::{Event, NewEvent};
use tracing::{debug, warn};

/// Bounded, append-only event log.
///
/// Ids come from a counter that only ever grows, so they stay unique and
/// sorted across evictions. When full, the oldest quarter of the log is
/// dropped in one go before the next insert.
pub struct Ledger {
    events: VecDeque<Event>,
    capacity: usize,
    next_id: u64,
    cipher: CipherGateway,
}

impl Ledger {
    pub fn new(capacity: usize, cipher: CipherGateway) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
            next_id: 1,
            cipher,
        }
    }

    /// Store `event` and return its id.
    ///
    /// The text is encrypted on the way in. If the cipher fails the event is
    /// stored with an empty ciphertext and is delivered all the same.
    pub fn append(&mut self, event: NewEvent, now: DateTime<Utc>) -> u64 {
        if self.events.len() >= self.capacity {
            let evict = (self.capacity / 4).max(1);
            self.events.drain(..evict);
            debug!(
                "Ledger full, evicted {} oldest events (oldest kept: {:?})",
                evict,
                self.events.front().map(|e| e.id)
            );
        }

        let ciphertext = self.cipher.encrypt(event.text.as_bytes()).unwrap_or_default();

        let id = self.next_id;
        self.next_id += 1;

        self.events.push_back(Event {
            id,
            kind: event.kind,
            author: event.author,
            room: event.room,
            text: event.text,
            ciphertext,
            created_at: now,
        });

        id
    }

    /// Up to `limit` events with id greater than `after_id` that pass
    /// `visible`, oldest first.
    pub fn query<F>(&self, after_id: u64, limit: usize, visible: F) -> Vec<Event>
    where
        F: Fn(&Event) -> bool,
    {
        let start = self.events.partition_point(|e| e.id <= after_id);
        self.events
            .range(start..)
            .filter(|e| visible(e))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Check the stored ciphertext against the plaintext.
    pub fn verify(&self, event: &Event) -> bool {
        verify_event(&self.cipher, event)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Id the next appended event will receive.
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Id of the newest stored event, 0 when empty.
    pub fn latest_id(&self) -> u64 {
        self.events.back().map_or(0, |e| e.id)
    }

    pub fn cipher(&self) -> &CipherGateway {
        &self.cipher
    }
}

/// Decrypt an event's stored ciphertext and compare it with its text.
///
/// Returns `true` when they agree or when there is nothing to check. Usable
/// outside the store lock with a clone of the ledger's cipher.
pub fn verify_event(cipher: &CipherGateway, event: &Event) -> bool {
    if event.ciphertext.is_empty() {
        return true;
    }
    match cipher.verify(event.text.as_bytes(), &event.ciphertext) {
        Some(true) | None => true,
        Some(false) => {
            warn!("Event {} failed cipher verification", event.id);
            false
        }
    }
}

/// Verify a batch of events, returning how many failed.
///
/// Stops at the first event the cipher cannot check at all, so a stalled
/// cipher costs one timeout per batch rather than one per event.
pub fn verify_events(cipher: &CipherGateway, events: &[Event]) -> usize {
    let mut mismatched = 0;
    for event in events.iter().filter(|e| !e.ciphertext.is_empty()) {
        match cipher.verify(event.text.as_bytes(), &event.ciphertext) {
            Some(true) => {}
            Some(false) => {
                warn!("Event {} failed cipher verification", event.id);
                mismatched += 1;
            }
            None => {
                warn!("Cipher unavailable at event {}, skipping rest of batch", event.id);
                break;
            }
        }
    }
    mismatched
}
