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

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Shape of an ordered-membership field.
///
/// An ordered-membership field is an ordered, duplicate-tolerant list of rows. Each row points at some content by
/// `content_key` and carries its own per-row handle under `handle_key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipLayout {
    /// If set, the field value is an object holding the row array under this key.
    ///
    /// Otherwise the field value is the row array itself.
    #[serde(default)]
    pub rows_field: Option<String>,
    /// Key of the content id within a row.
    pub content_key: String,
    /// Key of the per-row handle within a row.
    pub handle_key: String,
}

/// Merge policy of a single field.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum FieldPolicy {
    /// The new value replaces the old one wholesale, even if both are objects.
    ///
    /// Used for volatile fields where a stale value is worse than a lost intermediate state.
    Replace,
    /// Objects merge recursively, other values in the new data override the old ones.
    #[default]
    DeepMerge,
    /// Like [`FieldPolicy::DeepMerge`], but numeric leaves present on both sides are summed.
    Additive,
    /// Rows of the new list inherit the handles of matching old rows.
    OrderedMembership(MembershipLayout),
}

/// Merge mode of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// Used by `add` and `update`. Unlisted fields deep merge.
    Default,
    /// Used by `increment`. Unlisted fields accumulate.
    Additive,
}

/// Policy of a field resolved for one merge step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resolved<'a> {
    Replace,
    DeepMerge,
    Additive,
    OrderedMembership(&'a MembershipLayout),
}

/// Table of field policies, resolved by field name at every nesting depth.
///
/// Fields not listed in the table deep merge, or accumulate in [`MergeMode::Additive`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergePolicy {
    #[serde(default)]
    fields: HashMap<String, FieldPolicy>,
}

impl MergePolicy {
    /// Create a policy table where every field deep merges.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the policy of a field.
    pub fn with_field(mut self, field: impl Into<String>, policy: FieldPolicy) -> Self {
        self.fields.insert(field.into(), policy);
        self
    }

    /// Mark fields as volatile. Volatile fields are always replaced wholesale.
    pub fn with_volatile_fields(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        for field in fields {
            self.fields.insert(field.into(), FieldPolicy::Replace);
        }
        self
    }

    /// Mark a field as an ordered-membership field.
    pub fn with_ordered_membership(self, field: impl Into<String>, layout: MembershipLayout) -> Self {
        self.with_field(field, FieldPolicy::OrderedMembership(layout))
    }

    /// Get the explicit policy of a field.
    pub fn field(&self, field: &str) -> Option<&FieldPolicy> {
        self.fields.get(field)
    }

    pub(crate) fn resolve(&self, field: &str, mode: MergeMode) -> Resolved<'_> {
        match (self.fields.get(field), mode) {
            (Some(FieldPolicy::Replace), _) => Resolved::Replace,
            (Some(FieldPolicy::Additive), _) => Resolved::Additive,
            (Some(FieldPolicy::OrderedMembership(layout)), _) => Resolved::OrderedMembership(layout),
            (Some(FieldPolicy::DeepMerge) | None, MergeMode::Default) => Resolved::DeepMerge,
            (Some(FieldPolicy::DeepMerge) | None, MergeMode::Additive) => Resolved::Additive,
        }
    }

    /// Check the table for layouts that can never match.
    pub(crate) fn validate(&self) -> Result<()> {
        for (field, policy) in self.fields.iter() {
            if field.is_empty() {
                return Err(Error::ConfigError("merge policy field name must not be empty".to_string()));
            }
            if let FieldPolicy::OrderedMembership(layout) = policy {
                if layout.content_key.is_empty() || layout.handle_key.is_empty() {
                    return Err(Error::ConfigError(format!(
                        "ordered membership field `{field}` must name both the content key and the handle key"
                    )));
                }
                if layout.content_key == layout.handle_key {
                    return Err(Error::ConfigError(format!(
                        "ordered membership field `{field}` uses `{}` as both content key and handle key",
                        layout.content_key
                    )));
                }
                if layout.rows_field.as_deref() == Some("") {
                    return Err(Error::ConfigError(format!(
                        "ordered membership field `{field}` has an empty rows field"
                    )));
                }
            }
        }
        Ok(())
    }
}
