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

//! Lifecycle scenarios of the entity caches.

use std::{sync::Arc, time::Duration};

use canon::{
    AddEntry, Anomaly, Cache, CacheBuilder, DependencyUpdate, EntityCaches, EntityCachesBuilder, EventListener, Kind,
    Metadata, Status, Subscription, Unsubscription, UpdateEntry,
};
use parking_lot::Mutex;
use serde_json::{json, Value};

fn meta(v: Value) -> Metadata {
    match v {
        Value::Object(m) => m,
        _ => unreachable!(),
    }
}

fn uid(s: &str) -> String {
    s.to_string()
}

fn tracks(prune_min: usize) -> Cache<u64, String> {
    CacheBuilder::new()
        .with_name("tracks")
        .with_prune_min(prune_min)
        .build()
        .unwrap()
}

fn subscribers(cache: &Cache<u64, String>, id: u64) -> Vec<String> {
    let mut subscribers = cache.snapshot().subscribers_of(&id).cloned().collect::<Vec<_>>();
    subscribers.sort();
    subscribers
}

fn metadata(cache: &Cache<u64, String>, id: u64) -> Value {
    Value::Object(cache.get(&id).unwrap().metadata().clone())
}

#[test_log::test]
fn test_add_one() {
    let cache = tracks(1);

    let outcome = cache.add([AddEntry::new(1, uid("111"), meta(json!({ "data": 10 })))]);

    assert_eq!(outcome.applied, vec![1]);
    assert_eq!(metadata(&cache, 1), json!({ "data": 10 }));
    assert_eq!(cache.snapshot().reference_target("111"), Some(&1));
    assert_eq!(subscribers(&cache, 1), vec!["111"]);
}

#[test_log::test]
fn test_add_multiple() {
    let cache = tracks(1);

    cache.add([
        AddEntry::new(1, uid("111"), meta(json!({ "data": 10 }))),
        AddEntry::new(2, uid("222"), meta(json!({ "data": 20 }))),
    ]);
    cache.add([AddEntry::new(3, uid("333"), meta(json!({ "data": 30 })))]);

    let snapshot = cache.snapshot();
    assert_eq!(snapshot.len(), 3);
    for id in 1..=3u64 {
        assert_eq!(metadata(&cache, id), json!({ "data": id * 10 }));
        let reference = format!("{id}{id}{id}");
        assert_eq!(snapshot.reference_target(reference.as_str()), Some(&id));
        assert_eq!(subscribers(&cache, id), vec![reference]);
    }
}

#[test_log::test]
fn test_add_merges_unless_replace() {
    let cache = tracks(1);

    cache.add([AddEntry::new(1, uid("111"), meta(json!({ "old_value": 10 })))]);
    cache.add([AddEntry::new(1, uid("222"), meta(json!({ "new_value": 20 })))]);
    assert_eq!(metadata(&cache, 1), json!({ "old_value": 10, "new_value": 20 }));
    assert_eq!(subscribers(&cache, 1), vec!["111", "222"]);

    cache.add([AddEntry::new(1, uid("333"), meta(json!({ "newest_value": 30 }))).with_replace(true)]);
    assert_eq!(metadata(&cache, 1), json!({ "newest_value": 30 }));
    assert_eq!(subscribers(&cache, 1), vec!["111", "222", "333"]);
}

#[test_log::test]
fn test_stale_add_still_subscribes() {
    let cache = tracks(1);

    cache.add([AddEntry::new(7, uid("r1"), meta(json!({ "owner_id": 3, "play_count": 1 }))).with_ordering_token(5)]);
    let outcome = cache.add([AddEntry::new(7, uid("r2"), meta(json!({ "play_count": 2 }))).with_ordering_token(3)]);

    assert_eq!(outcome.stale.len(), 1);
    assert_eq!(metadata(&cache, 7), json!({ "owner_id": 3, "play_count": 1 }));
    assert_eq!(subscribers(&cache, 7), vec!["r1", "r2"]);
}

#[test_log::test]
fn test_update() {
    let cache = tracks(1);
    cache.add([
        AddEntry::new(1, uid("111"), meta(json!({ "data": 10 }))),
        AddEntry::new(1, uid("112"), meta(json!({ "data": 10 }))),
        AddEntry::new(2, uid("222"), meta(json!({ "data": 20 }))),
    ]);

    cache.update([UpdateEntry::new(1, meta(json!({ "data": 11 })))], []);
    cache.update([UpdateEntry::new(2, meta(json!({ "data": 21 })))], []);
    cache.update([UpdateEntry::new(3, meta(json!({ "partial": true })))], []);

    assert_eq!(metadata(&cache, 1), json!({ "data": 11 }));
    assert_eq!(metadata(&cache, 2), json!({ "data": 21 }));
    assert_eq!(metadata(&cache, 3), json!({ "partial": true }));
    assert_eq!(subscribers(&cache, 1), vec!["111", "112"]);
    assert_eq!(subscribers(&cache, 2), vec!["222"]);
    assert!(subscribers(&cache, 3).is_empty());
}

#[test_log::test]
fn test_increment_accumulates() {
    let cache = tracks(1);
    cache.add([AddEntry::new(1, uid("111"), meta(json!({ "play_count": 10, "title": "t" })))]);

    cache.increment([UpdateEntry::new(1, meta(json!({ "play_count": 5 })))]);
    cache.increment([UpdateEntry::new(1, meta(json!({ "play_count": 5 })))]);

    assert_eq!(metadata(&cache, 1), json!({ "play_count": 20, "title": "t" }));
}

#[test_log::test]
fn test_transitive_subscribe() {
    let caches = EntityCaches::<String>::new().unwrap();
    caches.tracks().add([
        AddEntry::new(1, uid("111"), meta(json!({ "data": 10 }))),
        AddEntry::new(2, uid("222"), meta(json!({ "data": 20 }))),
    ]);
    caches.collections().add([AddEntry::new(1, uid("444"), meta(json!({ "tracks": [1, 2] })))]);

    caches.collections().update(
        [],
        [DependencyUpdate::new(1, Kind::Track, [uid("111"), uid("222")])],
    );

    let snapshot = caches.collections().snapshot();
    let mut dependencies = snapshot
        .dependencies_of(&1)
        .map(|dependency| (dependency.kind, dependency.reference.clone()))
        .collect::<Vec<_>>();
    dependencies.sort();
    assert_eq!(dependencies, vec![(Kind::Track, uid("111")), (Kind::Track, uid("222"))]);
}

#[test_log::test]
fn test_set_status() {
    let cache = tracks(1);
    cache.add([AddEntry::new(1, uid("111"), meta(json!({ "data": 10 })))]);
    cache.set_status([(1, Status::Loading)]);

    cache.set_status([(1, Status::Success)]);

    assert_eq!(cache.get_status(&1), Status::Success);
    assert_eq!(cache.get_status(&2), Status::Unknown);
}

#[test_log::test]
fn test_remove_one() {
    let cache = tracks(1);
    cache.add([
        AddEntry::new(1, uid("111"), meta(json!({ "data": 10 }))),
        AddEntry::new(1, uid("222"), meta(json!({ "data": 10 }))),
    ]);
    cache.set_status([(1, Status::Success)]);
    let orphaned = cache
        .unsubscribe([Unsubscription::new(uid("111")), Unsubscription::new(uid("222"))])
        .orphaned;
    assert_eq!(orphaned, vec![1]);

    let outcome = cache.remove(orphaned);

    assert_eq!(outcome.removed, vec![1]);
    let snapshot = cache.snapshot();
    assert!(snapshot.is_empty());
    assert_eq!(snapshot.get_status(&1), Status::Unknown);
    assert_eq!(snapshot.registry().reference_count(), 0);
    assert_eq!(snapshot.pending_prune_len(), 0);
}

#[test_log::test]
fn test_remove_marks_until_prune_min() {
    let cache = tracks(2);
    cache.add([
        AddEntry::new(1, uid("111"), meta(json!({ "data": 10 }))),
        AddEntry::new(1, uid("222"), meta(json!({ "data": 10 }))),
    ]);

    let outcome = cache.remove([1]);

    assert!(outcome.is_empty());
    let snapshot = cache.snapshot();
    assert!(snapshot.is_pending_prune(&1));
    assert_eq!(snapshot.len(), 1);
    assert_eq!(subscribers(&cache, 1), vec!["111", "222"]);
}

#[test_log::test]
fn test_remove_never_evicts_subscribed_entity() {
    let cache = tracks(2);
    cache.add([AddEntry::new(1, uid("111"), meta(json!({ "data": 10 })))]);
    cache.unsubscribe([Unsubscription::new(uid("111"))]);
    assert!(cache.remove([1]).is_empty());

    // A view mounts on the marked entity before the batch is committed.
    cache.subscribe([Subscription::new(1, uid("222"))]);
    assert!(!cache.snapshot().is_pending_prune(&1));

    cache.add([AddEntry::new(2, uid("333"), meta(json!({ "data": 20 })))]);
    cache.unsubscribe([Unsubscription::new(uid("333"))]);
    let outcome = cache.remove([1, 2]);

    assert_eq!(outcome.removed, vec![2]);
    let snapshot = cache.snapshot();
    assert_eq!(metadata(&cache, 1), json!({ "data": 10 }));
    assert_eq!(snapshot.reference_target("222"), Some(&1));
    assert!(snapshot.get(&2).is_none());
    assert_eq!(snapshot.pending_prune_len(), 0);
}

#[test_log::test]
fn test_add_between_mark_and_commit_keeps_entity() {
    let cache = tracks(1);
    cache.add([AddEntry::new(1, uid("111"), meta(json!({ "data": 10 })))]);

    cache.mark_for_removal([1]);
    cache.add([AddEntry::new(1, uid("222"), meta(json!({ "data": 11 })))]);
    let outcome = cache.commit_removal([1]);

    assert!(outcome.removed.is_empty());
    assert_eq!(outcome.anomalies, vec![(1, Anomaly::NotMarked)]);
    assert_eq!(metadata(&cache, 1), json!({ "data": 11 }));
    assert_eq!(subscribers(&cache, 1), vec!["111", "222"]);
}

#[test_log::test]
fn test_subscribe() {
    let cache = tracks(1);
    cache.add([
        AddEntry::new(1, uid("111"), meta(json!({ "data": 10 }))),
        AddEntry::new(1, uid("222"), meta(json!({ "data": 10 }))),
        AddEntry::new(2, uid("000"), meta(json!({ "data": 20 }))),
    ]);
    cache.unsubscribe([Unsubscription::new(uid("000"))]);

    cache.subscribe([Subscription::new(1, uid("333"))]);
    cache.subscribe([Subscription::new(2, uid("444"))]);

    assert_eq!(subscribers(&cache, 1), vec!["111", "222", "333"]);
    assert_eq!(subscribers(&cache, 2), vec!["444"]);
    assert!(cache.get(&2).is_some());
}

#[test_log::test]
fn test_unsubscribe() {
    let cache = tracks(1);
    cache.add([
        AddEntry::new(1, uid("111"), meta(json!({ "data": 10 }))),
        AddEntry::new(1, uid("222"), meta(json!({ "data": 10 }))),
    ]);

    let outcome = cache.unsubscribe([Unsubscription::new(uid("222")).with_id(1)]);

    assert!(outcome.orphaned.is_empty());
    assert_eq!(subscribers(&cache, 1), vec!["111"]);
    assert_eq!(cache.snapshot().reference_target("222"), None);
}

#[test_log::test]
fn test_release_transitively_unsubscribes() {
    let caches: EntityCaches<String> = EntityCachesBuilder::new().with_prune_min(1).build().unwrap();
    caches.tracks().add([
        AddEntry::new(1, uid("111"), meta(json!({ "data": 10 }))),
        AddEntry::new(1, uid("222"), meta(json!({ "data": 10 }))),
        AddEntry::new(2, uid("333"), meta(json!({ "data": 20 }))),
    ]);
    caches.collections().add([AddEntry::new(1, uid("444"), meta(json!({ "tracks": [1, 2] })))]);
    caches
        .collections()
        .update([], [DependencyUpdate::new(1, Kind::Track, [uid("222")])]);

    let release = caches.release(Kind::Collection, [Unsubscription::new(uid("444")).with_id(1)]);

    assert_eq!(release.orphaned, vec![(Kind::Collection, 1)]);
    assert_eq!(release.removed, vec![(Kind::Collection, 1)]);

    let tracks = caches.tracks().snapshot();
    assert_eq!(tracks.reference_target("111"), Some(&1));
    assert_eq!(tracks.reference_target("222"), None);
    assert_eq!(tracks.reference_target("333"), Some(&2));
    assert_eq!(tracks.len(), 2);

    let collections = caches.collections().snapshot();
    assert!(collections.is_empty());
    assert_eq!(collections.registry().reference_count(), 0);
    assert_eq!(collections.dependencies_of(&1).count(), 0);
}

#[test_log::test]
fn test_release_cascades_to_orphaned_tracks() {
    let caches: EntityCaches<String> = EntityCachesBuilder::new().with_prune_min(1).build().unwrap();
    caches.users().add([AddEntry::new(9, uid("u9"), meta(json!({ "handle": "artist" })))]);
    caches.tracks().add([
        AddEntry::new(1, uid("c1-row0"), meta(json!({ "owner_id": 9 }))),
        AddEntry::new(2, uid("c1-row1"), meta(json!({ "owner_id": 9 }))),
    ]);
    caches
        .tracks()
        .update([], [DependencyUpdate::new(1, Kind::User, [uid("u9")])]);
    caches.collections().add([AddEntry::new(1, uid("view"), meta(json!({})))]);
    caches
        .collections()
        .update([], [DependencyUpdate::new(1, Kind::Track, [uid("c1-row0"), uid("c1-row1")])]);

    let release = caches.release(Kind::Collection, [Unsubscription::new(uid("view"))]);

    let mut orphaned = release.orphaned.clone();
    orphaned.sort();
    assert_eq!(orphaned, vec![(Kind::Track, 1), (Kind::Track, 2), (Kind::User, 9), (Kind::Collection, 1)]);
    assert_eq!(release.orphaned.first(), Some(&(Kind::Collection, 1)));
    assert_eq!(release.orphaned.last(), Some(&(Kind::User, 9)));
    for kind in Kind::ALL {
        assert!(caches.cache(kind).snapshot().is_empty(), "{kind} cache is not empty");
    }
}

#[derive(Debug, Default)]
struct Leaves(Mutex<Vec<u64>>);

impl EventListener for Leaves {
    type Key = u64;

    fn on_leave(&self, key: &u64) {
        self.0.lock().push(*key);
    }
}

#[test_log::test]
fn test_expire_and_listen() {
    let leaves = Arc::new(Leaves::default());
    let cache: Cache<u64, String> = CacheBuilder::new()
        .with_prune_min(1)
        .with_entry_ttl(Duration::from_secs(3600))
        .with_event_listener(leaves.clone())
        .build()
        .unwrap();
    cache.add([AddEntry::new(1, uid("111"), meta(json!({ "data": 10 })))]);

    let now = std::time::Instant::now();
    assert!(!cache.snapshot().is_stale(&1, now));
    cache.set_expired([1]);
    assert!(cache.snapshot().is_stale(&1, now));
    assert_eq!(metadata(&cache, 1), json!({ "data": 10 }));

    cache.unsubscribe([Unsubscription::new(uid("111"))]);
    assert_eq!(cache.snapshot().unsubscribed().copied().collect::<Vec<_>>(), vec![1]);
    cache.remove([1]);
    assert_eq!(*leaves.0.lock(), vec![1]);
}
