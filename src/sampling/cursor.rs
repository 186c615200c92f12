//! Per-channel sampling state.
//!
//! The store keeps channels in registration (configuration) order. Callers
//! receive owned snapshots; the lock is never held while a collaborator is
//! awaited. During a run the rate sampler's tick is the only writer.

use parking_lot::Mutex;
use serde::Serialize;

use super::sanitize_instance_name;

/// Sampling state of one channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelCursor {
    pub name: String,
    /// Metrics instance name derived from `name`
    pub instance_name: String,
    pub last_sequence: u64,
    /// Set once after an unrecoverable read failure, never cleared
    pub quarantined: bool,
}

impl ChannelCursor {
    pub fn new<N: Into<String>>(name: N, last_sequence: u64) -> Self {
        let name = name.into();
        let instance_name = sanitize_instance_name(&name);
        Self {
            name,
            instance_name,
            last_sequence,
            quarantined: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct ChannelCursorStore {
    cursors: Mutex<Vec<ChannelCursor>>,
}

impl ChannelCursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from channel names, each starting at sequence zero.
    /// Duplicate names are ignored.
    pub fn with_channels<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        for channel in channels {
            store.register(channel, 0);
        }
        store
    }

    /// Register a channel. Returns `false` when the name is already registered.
    pub fn register<N: Into<String>>(&self, name: N, initial_sequence: u64) -> bool {
        let name = name.into();
        let mut cursors = self.cursors.lock();
        if cursors.iter().any(|c| c.name == name) {
            return false;
        }
        cursors.push(ChannelCursor::new(name, initial_sequence));
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.cursors.lock().iter().any(|c| c.name == name)
    }

    /// Every channel, quarantined ones included
    pub fn snapshot(&self) -> Vec<ChannelCursor> {
        self.cursors.lock().clone()
    }

    /// Channels still eligible for sampling, in registration order
    pub fn active(&self) -> Vec<ChannelCursor> {
        self.cursors
            .lock()
            .iter()
            .filter(|c| !c.quarantined)
            .cloned()
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<ChannelCursor> {
        self.cursors.lock().iter().find(|c| c.name == name).cloned()
    }

    /// Record a newly observed sequence. Quarantined channels are left untouched.
    pub fn advance(&self, name: &str, sequence: u64) {
        if let Some(cursor) = self
            .cursors
            .lock()
            .iter_mut()
            .find(|c| c.name == name && !c.quarantined)
        {
            cursor.last_sequence = sequence;
        }
    }

    /// Quarantine a channel. Returns `true` only on the false-to-true transition.
    pub fn quarantine(&self, name: &str) -> bool {
        match self.cursors.lock().iter_mut().find(|c| c.name == name) {
            Some(cursor) if !cursor.quarantined => {
                cursor.quarantined = true;
                true
            }
            _ => false,
        }
    }

    pub fn is_quarantined(&self, name: &str) -> bool {
        self.get(name).is_some_and(|c| c.quarantined)
    }

    pub fn len(&self) -> usize {
        self.cursors.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.lock().is_empty()
    }
}
