//  Copyright 2026 canon Project Authors
//
//  Licensed under the Apache License, Version 2.0 (the "License");
//  you may not use this file except in compliance with the License.
//  You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.

use std::fmt::Display;

use crate::code::Key;

/// Event identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// A write carrying a lower ordering token than the stored entry was dropped.
    StaleWrite,
    /// An entity was deleted by a committed removal.
    Remove,
    /// A committed removal observed state the two-phase removal protocol does not produce.
    Anomaly,
}

impl Event {
    /// Convert self into static str.
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::StaleWrite => "stale_write",
            Event::Remove => "remove",
            Event::Anomaly => "anomaly",
        }
    }
}

/// Recoverable inconsistencies observed by a committed removal.
///
/// The removal still completes. An anomaly only indicates that some caller upstream bypassed the
/// mark-then-commit protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Anomaly {
    /// The id is present but not marked for removal, so it is kept.
    ///
    /// Either the id was never marked, or an `add` revived it after it was marked.
    NotMarked,
    /// The id has no entry, status, subscribers or dependencies.
    AlreadyAbsent,
}

impl Display for Anomaly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Anomaly::NotMarked => write!(f, "commit removal on an id not marked for removal"),
            Anomaly::AlreadyAbsent => write!(f, "commit removal on an absent id"),
        }
    }
}

/// Trait for the customized event listener.
///
/// All methods are called after the new snapshot is published and outside of the writer lock.
pub trait EventListener: Send + Sync + 'static {
    /// Associated key type.
    type Key;

    /// Called when an `add` is dropped because the stored entry carries a greater ordering token.
    #[expect(unused_variables)]
    fn on_stale_write(&self, key: &Self::Key, current: u64, incoming: u64)
    where
        Self::Key: Key,
    {
    }

    /// Called when an entity leaves the cache by a committed removal.
    #[expect(unused_variables)]
    fn on_leave(&self, key: &Self::Key)
    where
        Self::Key: Key,
    {
    }

    /// Called when a committed removal observes a recoverable anomaly.
    #[expect(unused_variables)]
    fn on_anomaly(&self, anomaly: Anomaly, key: &Self::Key)
    where
        Self::Key: Key,
    {
    }
}
