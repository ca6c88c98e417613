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

//! Merge policies of the entity kinds.

use crate::{FieldPolicy, Kind, MembershipLayout, MergePolicy};

/// Track fields that are always replaced wholesale.
pub const TRACK_VOLATILE_FIELDS: &[&str] = &[
    "field_visibility",
    "followee_reposts",
    "followee_saves",
    "remix_of",
    "stem_of",
    "stream_conditions",
    "download_conditions",
];

/// User fields that are always replaced wholesale.
pub const USER_VOLATILE_FIELDS: &[&str] = &["associated_wallets", "associated_sol_wallets", "playlist_library"];

/// Collection fields that are always replaced wholesale.
pub const COLLECTION_VOLATILE_FIELDS: &[&str] = &["followee_reposts", "followee_saves"];

/// Ordered-membership field of collections.
pub const PLAYLIST_CONTENTS: &str = "playlist_contents";

/// Layout of [`PLAYLIST_CONTENTS`]: rows under `track_ids`, each pointing at a `track` with a per-row `uid`.
pub fn playlist_contents_layout() -> MembershipLayout {
    MembershipLayout {
        rows_field: Some("track_ids".to_string()),
        content_key: "track".to_string(),
        handle_key: "uid".to_string(),
    }
}

/// Merge policy of tracks.
pub fn track_policy() -> MergePolicy {
    MergePolicy::new().with_volatile_fields(TRACK_VOLATILE_FIELDS.iter().copied())
}

/// Merge policy of users.
pub fn user_policy() -> MergePolicy {
    MergePolicy::new().with_volatile_fields(USER_VOLATILE_FIELDS.iter().copied())
}

/// Merge policy of collections.
pub fn collection_policy() -> MergePolicy {
    MergePolicy::new()
        .with_volatile_fields(COLLECTION_VOLATILE_FIELDS.iter().copied())
        .with_ordered_membership(PLAYLIST_CONTENTS, playlist_contents_layout())
}

/// Merge policy of the given kind.
pub fn policy(kind: Kind) -> MergePolicy {
    match kind {
        Kind::Track => track_policy(),
        Kind::User => user_policy(),
        Kind::Collection => collection_policy(),
    }
}
