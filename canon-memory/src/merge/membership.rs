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

use std::collections::VecDeque;

use hashbrown::HashMap;
use serde_json::Value;

use super::policy::MembershipLayout;

fn rows<'a>(layout: &MembershipLayout, value: &'a Value) -> Option<&'a Vec<Value>> {
    match &layout.rows_field {
        Some(field) => value.as_object()?.get(field)?.as_array(),
        None => value.as_array(),
    }
}

fn rows_mut<'a>(layout: &MembershipLayout, value: &'a mut Value) -> Option<&'a mut Vec<Value>> {
    match &layout.rows_field {
        Some(field) => value.as_object_mut()?.get_mut(field)?.as_array_mut(),
        None => value.as_array_mut(),
    }
}

/// Rows are matched by the JSON text of their content id, so `1` and `"1"` are different contents.
fn content_id(layout: &MembershipLayout, row: &Value) -> Option<String> {
    row.as_object()?.get(&layout.content_key).map(|id| id.to_string())
}

/// Merge an ordered-membership field.
///
/// The new rows keep their order. Each new row takes the handle of the oldest unmatched old row with the same
/// content id. A new row without a match is left as given: no handle is invented for it, and a handle it already
/// carries is kept. Anything that is not shaped like the layout falls back to the new value.
pub(crate) fn merge(layout: &MembershipLayout, old: &Value, mut new: Value) -> Value {
    let Some(old_rows) = rows(layout, old) else {
        return new;
    };

    let mut queues: HashMap<String, VecDeque<Option<&Value>>> = HashMap::new();
    for row in old_rows {
        let Some(id) = content_id(layout, row) else {
            continue;
        };
        let handle = row.get(&layout.handle_key).filter(|handle| !handle.is_null());
        queues.entry(id).or_default().push_back(handle);
    }

    let Some(new_rows) = rows_mut(layout, &mut new) else {
        return new;
    };

    for row in new_rows.iter_mut() {
        let Some(id) = content_id(layout, row) else {
            continue;
        };
        let Some(Some(handle)) = queues.get_mut(&id).and_then(|queue| queue.pop_front()) else {
            continue;
        };
        if let Some(row) = row.as_object_mut() {
            row.insert(layout.handle_key.clone(), handle.clone());
        }
    }

    new
}
