//! Per-rank message queues.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;

/// Message class. A receive only matches messages with the same tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Owned boundary data travelling to the next rank's ghosts.
    HaloForward,
    /// Owned boundary data travelling to the previous rank's ghosts.
    HaloReverse,
    /// Index-list halo traffic.
    HaloIndex,
    /// Root-to-all payloads.
    Broadcast,
    /// All-to-root payloads.
    Gather,
    /// Root-to-each payloads.
    Scatter,
    /// Application-defined traffic.
    User(u32),
}

struct Envelope {
    source: usize,
    tag: Tag,
    payload: Vec<u8>,
}

/// Inbox of one rank. Only the owning rank receives from it.
pub(crate) struct Mailbox {
    queue: Mutex<VecDeque<Envelope>>,
    arrived: Condvar,
}

impl Mailbox {
    pub(crate) fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            arrived: Condvar::new(),
        }
    }

    /// Appends a message; never blocks on the receiver.
    pub(crate) fn deliver(&self, source: usize, tag: Tag, payload: Vec<u8>) {
        self.queue.lock().push_back(Envelope {
            source,
            tag,
            payload,
        });
        self.arrived.notify_one();
    }

    /// Blocks until a message from `source` with `tag` is queued and removes
    /// the oldest such message.
    pub(crate) fn take(&self, source: usize, tag: Tag) -> Vec<u8> {
        let mut queue = self.queue.lock();
        loop {
            let pos = queue.iter().position(|e| e.source == source && e.tag == tag);
            if let Some(envelope) = pos.and_then(|pos| queue.remove(pos)) {
                return envelope.payload;
            }
            self.arrived.wait(&mut queue);
        }
    }

    /// Number of queued messages.
    #[cfg(test)]
    pub(crate) fn pending(&self) -> usize {
        self.queue.lock().len()
    }
}
