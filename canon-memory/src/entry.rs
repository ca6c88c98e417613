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

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Canonical metadata of an entity.
///
/// Always a JSON object at the top level.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Last-write time of an entry.
///
/// [`Timestamp::Expired`] orders before any instant, so an expired entry is never fresher than a written one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Timestamp {
    /// Stale-but-present. The entry is still served while the caller refetches it.
    Expired,
    /// Written at the given instant.
    At(Instant),
}

impl Timestamp {
    /// Returns true if the timestamp is the expired sentinel.
    pub fn is_expired(&self) -> bool {
        matches!(self, Timestamp::Expired)
    }

    /// Returns true if the timestamp is expired or older than `ttl` at `now`.
    pub fn is_stale(&self, now: Instant, ttl: Duration) -> bool {
        match self {
            Timestamp::Expired => true,
            Timestamp::At(at) => now.saturating_duration_since(*at) > ttl,
        }
    }
}

/// Canonical record of one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    metadata: Metadata,
    timestamp: Timestamp,
    ordering_token: Option<u64>,
}

impl Entry {
    pub(crate) fn new(metadata: Metadata, timestamp: Timestamp, ordering_token: Option<u64>) -> Self {
        Self {
            metadata,
            timestamp,
            ordering_token,
        }
    }

    /// Merged metadata of the entity.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Last-write time of the entry.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Ordering token of the last accepted write, if any write carried one.
    pub fn ordering_token(&self) -> Option<u64> {
        self.ordering_token
    }

    /// Returns true if the entry is marked expired.
    pub fn is_expired(&self) -> bool {
        self.timestamp.is_expired()
    }

    /// Returns a copy of the entry with its timestamp set to the expired sentinel.
    pub(crate) fn expired(&self) -> Self {
        Self {
            metadata: self.metadata.clone(),
            timestamp: Timestamp::Expired,
            ordering_token: self.ordering_token,
        }
    }
}

/// Fetch status of an entity, tracked independently from its entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// No status has been recorded.
    #[default]
    Unknown,
    /// A fetch is in flight.
    Loading,
    /// The last fetch succeeded.
    Success,
    /// The last fetch failed.
    Error,
}
