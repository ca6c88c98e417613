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

//! Fuzzy test for canon entity cache.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
};

use canon::{AddEntry, Cache, CacheBuilder, Metadata, Subscription, Unsubscription, UpdateEntry};
use hashbrown::{HashMap, HashSet};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use serde_json::json;

const WRITERS: usize = 4;
const READERS: usize = 4;

const OPS: usize = 2000;
const IDS: u64 = 64;
const REFS: usize = 48;

const INTERVAL: usize = 500;

fn meta(id: u64, blocknumber: u64) -> Metadata {
    match json!({ "id": id, "blocknumber": blocknumber, "play_count": 1 }) {
        serde_json::Value::Object(m) => m,
        _ => unreachable!(),
    }
}

/// Reference bookkeeping the cache is expected to agree with.
#[derive(Debug, Default)]
struct Model {
    targets: HashMap<String, u64>,
    marked: HashSet<u64>,
    present: HashSet<u64>,
}

impl Model {
    fn subscribe(&mut self, id: u64, reference: String) {
        self.targets.insert(reference, id);
    }

    fn subscriber_count(&self, id: u64) -> usize {
        self.targets.values().filter(|target| **target == id).count()
    }
}

fn step(cache: &Cache<u64, String>, rng: &mut SmallRng, writer: usize, model: Option<&mut Model>) {
    let id = rng.random_range(0..IDS);
    let reference = format!("w{writer}-r{}", rng.random_range(0..REFS));
    let blocknumber = rng.random_range(0..100);

    match rng.random_range(0..8) {
        0 | 1 => {
            cache.add([AddEntry::new(id, reference.clone(), meta(id, blocknumber))]);
            if let Some(model) = model {
                model.subscribe(id, reference);
                model.marked.remove(&id);
                model.present.insert(id);
            }
        }
        2 => {
            cache.subscribe([Subscription::new(id, reference.clone())]);
            if let Some(model) = model {
                model.subscribe(id, reference);
                model.marked.remove(&id);
            }
        }
        3 | 4 => {
            let outcome = cache.unsubscribe([Unsubscription::new(reference.clone())]);
            if let Some(model) = model {
                model.targets.remove(&reference);
                for orphaned in outcome.orphaned {
                    assert_eq!(model.subscriber_count(orphaned), 0);
                }
            }
        }
        5 => {
            cache.increment([UpdateEntry::new(id, meta(id, 0))]);
            if let Some(model) = model {
                model.present.insert(id);
            }
        }
        6 => {
            cache.mark_for_removal([id]);
            if let Some(model) = model {
                model.marked.insert(id);
            }
        }
        _ => {
            cache.commit_removal([id]);
            if let Some(model) = model {
                if model.marked.remove(&id) {
                    model.targets.retain(|_, target| *target != id);
                    model.present.remove(&id);
                }
            }
        }
    }
}

#[test_log::test]
fn test_random_operations_match_model() {
    let cache: Cache<u64, String> = CacheBuilder::new().with_name("fuzzy").build().unwrap();
    let mut rng = SmallRng::seed_from_u64(0x5eed);
    let mut model = Model::default();

    for i in 0..OPS {
        step(&cache, &mut rng, 0, Some(&mut model));

        let snapshot = cache.snapshot();
        assert!(snapshot.is_consistent());
        assert_eq!(snapshot.registry().reference_count(), model.targets.len());
        for (reference, id) in model.targets.iter() {
            assert_eq!(snapshot.reference_target(reference.as_str()), Some(id));
        }
        for id in 0..IDS {
            assert_eq!(snapshot.get(&id).is_some(), model.present.contains(&id), "entry {id}");
            assert_eq!(snapshot.is_pending_prune(&id), model.marked.contains(&id), "prune {id}");
            assert_eq!(snapshot.subscribers_of(&id).count(), model.subscriber_count(id), "subscribers {id}");
        }

        if i % INTERVAL == 0 {
            tracing::info!("Applied {i} operations");
        }
    }
}

#[test_log::test]
fn test_concurrent_writers_and_readers() {
    let cache: Cache<u64, String> = CacheBuilder::new().with_name("fuzzy").with_prune_min(8).build().unwrap();
    let stop = Arc::new(AtomicBool::new(false));

    thread::scope(|s| {
        let mut writers = vec![];
        for writer in 0..WRITERS {
            let cache = cache.clone();
            writers.push(s.spawn(move || {
                let mut rng = SmallRng::seed_from_u64(writer as u64);
                for i in 0..OPS {
                    step(&cache, &mut rng, writer, None);
                    if i % 16 == 0 {
                        cache.remove([rng.random_range(0..IDS)]);
                    }
                }
            }));
        }

        for _ in 0..READERS {
            let cache = cache.clone();
            let stop = stop.clone();
            s.spawn(move || {
                let mut reads = 0usize;
                while !stop.load(Ordering::Relaxed) {
                    let snapshot = cache.snapshot();
                    assert!(snapshot.is_consistent());
                    for (reference, id) in snapshot.registry().references() {
                        assert!(snapshot.subscribers_of(id).any(|subscriber| subscriber == reference));
                    }
                    reads += 1;
                }
                tracing::info!("Read {reads} snapshots");
            });
        }

        for writer in writers {
            writer.join().unwrap();
        }
        stop.store(true, Ordering::Relaxed);
    });

    assert!(cache.snapshot().is_consistent());
}
