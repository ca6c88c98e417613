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

mod membership;
/// Field policy tables.
pub mod policy;

use serde_json::{Number, Value};

pub use self::policy::{FieldPolicy, MembershipLayout, MergeMode, MergePolicy};
use self::policy::Resolved;
use crate::entry::Metadata;

/// Compute the new metadata of an entity from its current metadata and incoming data.
///
/// A first write is never merged: if `old` is absent, `new` is returned unchanged.
#[cfg_attr(feature = "tracing", fastrace::trace(name = "canon::memory::merge"))]
pub fn merge(old: Option<&Metadata>, new: Metadata, policy: &MergePolicy, mode: MergeMode) -> Metadata {
    match old {
        None => new,
        Some(old) => merge_object(old.clone(), new, policy, mode),
    }
}

fn merge_object(mut old: Metadata, new: Metadata, policy: &MergePolicy, mode: MergeMode) -> Metadata {
    for (field, incoming) in new {
        let merged = match old.remove(&field) {
            None => incoming,
            Some(current) => merge_field(&field, current, incoming, policy, mode),
        };
        old.insert(field, merged);
    }
    old
}

fn merge_field(field: &str, current: Value, incoming: Value, policy: &MergePolicy, mode: MergeMode) -> Value {
    match policy.resolve(field, mode) {
        Resolved::Replace => incoming,
        Resolved::OrderedMembership(layout) => membership::merge(layout, &current, incoming),
        Resolved::DeepMerge => merge_value(current, incoming, policy, mode, false),
        Resolved::Additive => merge_value(current, incoming, policy, mode, true),
    }
}

fn merge_value(current: Value, incoming: Value, policy: &MergePolicy, mode: MergeMode, additive: bool) -> Value {
    match (current, incoming) {
        (Value::Object(current), Value::Object(incoming)) => Value::Object(merge_object(current, incoming, policy, mode)),
        (Value::Number(current), Value::Number(incoming)) if additive => sum(&current, &incoming),
        (_, incoming) => incoming,
    }
}

/// Integers stay integral as long as both sides are integers; everything else sums as floats.
fn sum(a: &Number, b: &Number) -> Value {
    let integral = |n: &Number| n.as_i64().map(i128::from).or_else(|| n.as_u64().map(i128::from));
    if let (Some(a), Some(b)) = (integral(a), integral(b)) {
        // Cannot overflow: both operands lie in `i64::MIN..=u64::MAX`.
        let total = a + b;
        return match (i64::try_from(total), u64::try_from(total)) {
            (Ok(total), _) => Value::from(total),
            (_, Ok(total)) => Value::from(total),
            _ if total < 0 => Value::from(i64::MIN),
            _ => Value::from(u64::MAX),
        };
    }
    let (a, b) = (a.as_f64().unwrap_or_default(), b.as_f64().unwrap_or_default());
    Number::from_f64(a + b).map(Value::Number).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn meta(v: Value) -> Metadata {
        match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    fn policy() -> MergePolicy {
        MergePolicy::new()
            .with_volatile_fields(["field_visibility", "followee_saves"])
            .with_ordered_membership(
                "playlist_contents",
                MembershipLayout {
                    rows_field: Some("track_ids".to_string()),
                    content_key: "track".to_string(),
                    handle_key: "uid".to_string(),
                },
            )
    }

    #[test]
    fn test_first_write_is_not_merged() {
        let new = meta(json!({ "a": 1, "field_visibility": { "x": true } }));
        assert_eq!(merge(None, new.clone(), &policy(), MergeMode::Default), new);
        assert_eq!(merge(None, new.clone(), &policy(), MergeMode::Additive), new);
    }

    #[test]
    fn test_deep_merge() {
        let old = meta(json!({
            "title": "old",
            "owner": { "id": 3, "name": "a" },
            "tags": [1, 2, 3],
            "kept": true,
        }));
        let new = meta(json!({
            "title": "new",
            "owner": { "name": "b", "verified": true },
            "tags": [4],
        }));

        let merged = merge(Some(&old), new, &policy(), MergeMode::Default);
        assert_eq!(
            Value::Object(merged),
            json!({
                "title": "new",
                "owner": { "id": 3, "name": "b", "verified": true },
                "tags": [4],
                "kept": true,
            })
        );
    }

    #[test]
    fn test_volatile_field_is_replaced() {
        let old = meta(json!({ "field_visibility": { "genre": true, "mood": true } }));
        let new = meta(json!({ "field_visibility": { "genre": false } }));

        let merged = merge(Some(&old), new, &policy(), MergeMode::Default);
        assert_eq!(Value::Object(merged), json!({ "field_visibility": { "genre": false } }));
    }

    #[test]
    fn test_volatile_field_is_replaced_at_depth() {
        let old = meta(json!({ "inner": { "followee_saves": [{ "user": 1 }], "x": 1 } }));
        let new = meta(json!({ "inner": { "followee_saves": [] } }));

        let merged = merge(Some(&old), new, &policy(), MergeMode::Default);
        assert_eq!(Value::Object(merged), json!({ "inner": { "followee_saves": [], "x": 1 } }));
    }

    #[test]
    fn test_membership_field() {
        let old = meta(json!({
            "playlist_name": "p",
            "playlist_contents": { "track_ids": [{ "track": 1, "uid": "a" }, { "track": 2, "uid": "b" }] },
        }));
        let new = meta(json!({
            "playlist_contents": { "track_ids": [{ "track": 2 }] },
        }));

        let merged = merge(Some(&old), new, &policy(), MergeMode::Default);
        assert_eq!(
            Value::Object(merged),
            json!({
                "playlist_name": "p",
                "playlist_contents": { "track_ids": [{ "track": 2, "uid": "b" }] },
            })
        );
    }

    #[test]
    fn test_additive() {
        let old = meta(json!({
            "play_count": 10,
            "stats": { "reposts": 1, "ratio": 0.5 },
            "title": "t",
            "field_visibility": { "n": 1 },
        }));
        let new = meta(json!({
            "play_count": 5,
            "stats": { "reposts": -1, "ratio": 0.25, "saves": 2 },
            "title": "u",
            "field_visibility": { "n": 2 },
        }));

        let merged = merge(Some(&old), new, &policy(), MergeMode::Additive);
        assert_eq!(
            Value::Object(merged),
            json!({
                "play_count": 15,
                "stats": { "reposts": 0, "ratio": 0.75, "saves": 2 },
                "title": "u",
                "field_visibility": { "n": 2 },
            })
        );
    }

    #[test]
    fn test_additive_field_in_default_mode() {
        let policy = MergePolicy::new().with_field("plays", FieldPolicy::Additive);
        let old = meta(json!({ "plays": 1, "other": 1 }));
        let new = meta(json!({ "plays": 2, "other": 2 }));

        let merged = merge(Some(&old), new, &policy, MergeMode::Default);
        assert_eq!(Value::Object(merged), json!({ "plays": 3, "other": 2 }));
    }

    #[test]
    fn test_sum() {
        assert_eq!(sum(&Number::from(i64::MAX), &Number::from(1)), json!(i64::MAX as u64 + 1));
        assert_eq!(sum(&Number::from(i64::MAX), &Number::from(i64::MAX)), json!(u64::MAX - 1));
        assert_eq!(sum(&Number::from(u64::MAX), &Number::from(1u64)), json!(u64::MAX));
        assert_eq!(sum(&Number::from(u64::MAX), &Number::from(-1)), json!(u64::MAX - 1));
        assert_eq!(sum(&Number::from(i64::MIN), &Number::from(-1)), json!(i64::MIN));
        assert_eq!(sum(&Number::from(-2), &Number::from(5u64)), json!(3));
        assert_eq!(
            sum(&Number::from_f64(1.5).unwrap(), &Number::from(1)),
            json!(2.5)
        );
    }
}
