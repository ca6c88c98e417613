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

use serde::{Deserialize, Serialize};

/// Kind of a cached entity.
///
/// Ids are only unique within a kind, so each kind is served by its own cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    /// Tracks.
    Track,
    /// Users.
    User,
    /// Collections, e.g. playlists and albums.
    Collection,
}

impl Kind {
    /// All kinds.
    pub const ALL: [Kind; 3] = [Kind::Track, Kind::User, Kind::Collection];

    /// Convert self into static str.
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Track => "track",
            Kind::User => "user",
            Kind::Collection => "collection",
        }
    }
}

impl Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
