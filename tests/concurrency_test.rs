//! Concurrency and model tests for the aggregation engine.
//!
//! These tests validate:
//! 1. Independent classes can be mutated from many threads at once
//! 2. Contended classes settle on the correct extremum
//! 3. Random open/update/close sequences match a brute-force model

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use prometheus_qos::builders::EngineBuilder;
use prometheus_qos::core::{
    AggregationRule, AppResult, QosEngine, RequestHandle, Requirement, TargetChange,
};

const THREADS: usize = 8;
const ROUNDS: i32 = 200;

fn engine() -> QosEngine {
    let mut builder = EngineBuilder::new();
    for n in 0..THREADS {
        let rule = if n % 2 == 0 {
            AggregationRule::Min
        } else {
            AggregationRule::Max
        };
        builder = builder.class(format!("class_{n}"), rule, 1_000_000);
    }
    builder
        .class("shared", AggregationRule::Max, 0)
        .build()
        .unwrap()
}

// ============================================================================
// THREADED
// ============================================================================

#[test]
fn test_independent_classes_in_parallel() {
    let engine = engine();
    let barrier = Arc::new(Barrier::new(THREADS));

    let workers: Vec<_> = (0..THREADS)
        .map(|n| {
            let engine = engine.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let class = engine.class_index_by_name(&format!("class_{n}")).unwrap();
                let mut handle = engine.open(class).unwrap();
                barrier.wait();
                for v in 1..=ROUNDS {
                    handle.update(v).unwrap();
                    assert_eq!(engine.current_target(class).unwrap(), v);
                }
                handle
            })
        })
        .collect();

    let handles: Vec<RequestHandle> = workers.into_iter().map(|w| w.join().unwrap()).collect();
    for handle in &handles {
        assert_eq!(engine.current_target(handle.class()).unwrap(), ROUNDS);
    }
    drop(handles);
    for n in 0..THREADS {
        assert_eq!(
            engine.current_target_by_name(&format!("class_{n}")).unwrap(),
            1_000_000
        );
    }
}

#[test]
fn test_contended_class_settles_on_max() {
    let engine = engine();
    let shared = engine.class_index_by_name("shared").unwrap();
    let notified = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&notified);
    engine
        .register_observer(
            shared,
            Arc::new(move |_: &TargetChange| -> AppResult<()> {
                counter.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }),
        )
        .unwrap();

    let workers: Vec<_> = (0..THREADS)
        .map(|n| {
            let engine = engine.clone();
            thread::spawn(move || {
                let mut handle = engine.open(shared).unwrap();
                let base = i32::try_from(n).unwrap() * 1000;
                for v in 0..ROUNDS {
                    handle.update(base + v).unwrap();
                }
                handle
            })
        })
        .collect();
    let handles: Vec<RequestHandle> = workers.into_iter().map(|w| w.join().unwrap()).collect();

    let top = i32::try_from(THREADS - 1).unwrap() * 1000 + ROUNDS - 1;
    assert_eq!(engine.current_target(shared).unwrap(), top);
    assert_eq!(engine.request_count(shared).unwrap(), THREADS);

    let snap = &engine.snapshot().unwrap()[shared.index()];
    assert_eq!(snap.notifications, notified.load(Ordering::Relaxed) as u64);

    drop(handles);
    assert_eq!(engine.current_target(shared).unwrap(), 0);
    assert_eq!(engine.request_count(shared).unwrap(), 0);
}

// ============================================================================
// RANDOM MODEL
// ============================================================================

fn brute_force(rule: AggregationRule, default: i32, live: &[Option<Requirement>]) -> i32 {
    let values = live.iter().flatten().filter_map(|r| r.value());
    match rule {
        AggregationRule::Min => values.min(),
        AggregationRule::Max => values.max(),
    }
    .unwrap_or(default)
}

fn run_model(rule: AggregationRule, seed: u64) {
    const DEFAULT: i32 = 5_000;
    let engine = EngineBuilder::new()
        .class("model", rule, DEFAULT)
        .build()
        .unwrap();
    let class = engine.class_index_by_name("model").unwrap();
    let mut rng = StdRng::seed_from_u64(seed);

    let mut handles: Vec<Option<RequestHandle>> = Vec::new();
    let mut model: Vec<Option<Requirement>> = Vec::new();

    for _ in 0..2_000 {
        let value = if rng.random_range(0..5) == 0 {
            Requirement::NoPreference
        } else {
            Requirement::Value(rng.random_range(0..10_000))
        };
        match rng.random_range(0..3) {
            0 => {
                handles.push(Some(engine.add_request(class, value).unwrap()));
                model.push(Some(value));
            }
            1 if !handles.is_empty() => {
                let slot = rng.random_range(0..handles.len());
                if let Some(handle) = handles[slot].as_mut() {
                    handle.update(value).unwrap();
                    model[slot] = Some(value);
                }
            }
            _ if !handles.is_empty() => {
                let slot = rng.random_range(0..handles.len());
                if let Some(mut handle) = handles[slot].take() {
                    handle.close();
                }
                model[slot] = None;
            }
            _ => {}
        }
        assert_eq!(
            engine.current_target(class).unwrap(),
            brute_force(rule, DEFAULT, &model)
        );
    }
}

#[test]
fn test_random_min_matches_model() {
    run_model(AggregationRule::Min, 0x5eed);
}

#[test]
fn test_random_max_matches_model() {
    run_model(AggregationRule::Max, 0xdecaf);
}
