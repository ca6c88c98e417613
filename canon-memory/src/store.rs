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

use std::{borrow::Borrow, hash::Hash, sync::Arc};

use canon_common::code::Key;
use imbl::HashMap;

use crate::entry::{Entry, Status};

/// Canonical entries and fetch statuses keyed by entity id.
///
/// The store exposes no per-field write API. Entries and statuses are written as whole precomputed batches,
/// so that the merge policy stays independent from storage.
///
/// Both maps are persistent. Cloning the store is `O(1)` and a write only copies the path to the touched node.
#[derive(Debug, Clone)]
pub struct EntryStore<K>
where
    K: Key,
{
    entries: HashMap<K, Arc<Entry>>,
    statuses: HashMap<K, Status>,
}

impl<K> Default for EntryStore<K>
where
    K: Key,
{
    fn default() -> Self {
        Self {
            entries: HashMap::default(),
            statuses: HashMap::default(),
        }
    }
}

impl<K> EntryStore<K>
where
    K: Key,
{
    /// Get the entry of the given id.
    pub fn get<Q>(&self, id: &Q) -> Option<&Arc<Entry>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(id)
    }

    /// Get the status of the given id, [`Status::Unknown`] if none is recorded.
    pub fn get_status<Q>(&self, id: &Q) -> Status
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.statuses.get(id).copied().unwrap_or_default()
    }

    /// Returns true if a status is recorded for the given id.
    pub fn has_status<Q>(&self, id: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.statuses.contains_key(id)
    }

    /// Returns true if an entry is stored for the given id.
    pub fn contains<Q>(&self, id: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.contains_key(id)
    }

    /// Count of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no entry is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over stored entries.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &Arc<Entry>)> {
        self.entries.iter()
    }

    /// Apply a precomputed batch of entries. Later duplicates overwrite earlier ones.
    pub(crate) fn apply_entries(&mut self, entries: impl IntoIterator<Item = (K, Entry)>) {
        for (id, entry) in entries {
            self.entries.insert(id, Arc::new(entry));
        }
    }

    /// Apply a precomputed batch of statuses. Later duplicates overwrite earlier ones.
    pub(crate) fn apply_statuses(&mut self, statuses: impl IntoIterator<Item = (K, Status)>) {
        for (id, status) in statuses {
            self.statuses.insert(id, status);
        }
    }

    /// Remove the entry and the status of the given id.
    pub(crate) fn remove<Q>(&mut self, id: &Q) -> (Option<Arc<Entry>>, Option<Status>)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        (self.entries.remove(id), self.statuses.remove(id))
    }
}
