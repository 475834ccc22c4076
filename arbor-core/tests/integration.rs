//! Integration Tests for the Reactive State Tree
//!
//! These tests verify that writes, listeners, computed properties and the
//! schedulers work together correctly.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::oneshot;

use arbor_core::reactive::{Derived, Path, PathHandle, Store, Subscription};
use arbor_core::schedule::{ManualScheduler, TokioScheduler};
use arbor_core::{StoreConfig, StoreError};

type Seen = Arc<Mutex<Vec<(Option<Value>, String)>>>;

fn setup(state: Value) -> (Store, Arc<ManualScheduler>) {
    let scheduler = Arc::new(ManualScheduler::new());
    (Store::new(state, scheduler.clone()), scheduler)
}

fn record(handle: &PathHandle) -> (Seen, Subscription) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    let sub = handle.subscribe(move |value: Option<&Value>, path: &Path| {
        seen_clone.lock().push((value.cloned(), path.key()));
    });
    (seen, sub)
}

fn full_name(s: &PathHandle) -> Value {
    json!(format!("{} {}", s.at("user.firstName"), s.at("user.lastName")))
}

/// Test that a computed property is written at once and reaches a listener
/// registered before the property existed.
#[test]
fn computed_reaches_placeholder_subscriber() {
    let (store, scheduler) = setup(json!({ "user": { "firstName": "Bob", "lastName": "Smith" } }));

    // Subscribe before anything lives at the path
    let (seen, _sub) = record(&store.at("user.fullName"));
    assert_eq!(store.at("user.fullName").to_string(), "Placeholder(user.fullName)");

    store.at("user.fullName").set_computed(full_name).unwrap();
    assert_eq!(store.at("user.fullName").get(), Some(json!("Bob Smith")));

    scheduler.run_until_stalled();
    assert_eq!(
        *seen.lock(),
        vec![(Some(json!("Bob Smith")), "user.fullName".to_string())]
    );
}

/// Test that changing a dependency recomputes the property and notifies
/// its listeners in a later flush.
#[test]
fn computed_follows_dependency() {
    let (store, scheduler) = setup(json!({ "user": { "firstName": "Bob", "lastName": "Smith" } }));
    store.at("user.fullName").set_computed(full_name).unwrap();
    scheduler.run_until_stalled();

    let (seen, _sub) = record(&store.at("user.fullName"));
    store.at("user.firstName").set("Jim").unwrap();

    // The dependency changed, the derived value waits for the flush
    assert_eq!(store.at("user.fullName").get(), Some(json!("Bob Smith")));

    scheduler.run_until_stalled();
    assert_eq!(store.at("user.fullName").get(), Some(json!("Jim Smith")));
    assert_eq!(
        *seen.lock(),
        vec![(Some(json!("Jim Smith")), "user.fullName".to_string())]
    );
}

/// Test that a write bubbles to every ancestor with the changed path.
#[test]
fn notifications_bubble_to_ancestors() {
    let (store, scheduler) = setup(json!({ "user": { "profile": { "surname": "Smith" } } }));

    let (leaf, _a) = record(&store.at("user.profile.surname"));
    let (profile, _b) = record(&store.at("user.profile"));
    let (user, _c) = record(&store.at("user"));
    let (root, _d) = record(&store.root());
    let (sibling, _e) = record(&store.at("user.settings"));

    store.at("user.profile.surname").set("Jones").unwrap();
    scheduler.run_until_stalled();

    let expected = vec![(Some(json!("Jones")), "user.profile.surname".to_string())];
    assert_eq!(*leaf.lock(), expected);
    assert_eq!(*profile.lock(), expected);
    assert_eq!(*user.lock(), expected);
    assert_eq!(*root.lock(), expected);
    assert!(sibling.lock().is_empty());
}

/// Test that writing an equal value notifies no one.
#[test]
fn equal_writes_are_silent() {
    let (store, scheduler) = setup(json!({ "count": 1, "tags": ["a", "b"] }));
    let (seen, _sub) = record(&store.root());

    store.at("count").set(1).unwrap();
    store.at("tags").set(json!(["a", "b"])).unwrap();
    assert!(!store.has_pending());
    scheduler.run_until_stalled();
    assert!(seen.lock().is_empty());

    store.at("count").set(2).unwrap();
    store.at("count").set(2).unwrap();
    scheduler.run_until_stalled();
    assert_eq!(*seen.lock(), vec![(Some(json!(2)), "count".to_string())]);
}

/// Test that each array mutation in a turn delivers the final array.
#[test]
fn array_mutations_notify_array_path() {
    let (store, scheduler) = setup(json!({ "items": [3, 1, 2] }));
    let (seen, _sub) = record(&store.at("items"));

    let items = store.at("items");
    assert_eq!(items.push([json!(4)]).unwrap(), 4);
    items.sort_by(|a, b| a.as_i64().cmp(&b.as_i64())).unwrap();
    assert_eq!(items.to_string(), "1,2,3,4");

    scheduler.run_until_stalled();
    assert_eq!(
        *seen.lock(),
        vec![(Some(json!([1, 2, 3, 4])), "items".to_string()); 2]
    );
}

/// Test that a computed property over an array follows in-place mutation.
#[test]
fn computed_over_array() {
    let (store, scheduler) = setup(json!({ "items": [1, 2, 3] }));
    store
        .at("stats.total")
        .set_computed(|s: &PathHandle| {
            let total: i64 = match s.at("items").get() {
                Some(Value::Array(items)) => items.iter().filter_map(Value::as_i64).sum(),
                _ => 0,
            };
            json!(total)
        })
        .unwrap();
    assert_eq!(store.at("stats.total").get(), Some(json!(6)));

    store.at("items").push([json!(10)]).unwrap();
    scheduler.run_until_stalled();
    assert_eq!(store.at("stats.total").get(), Some(json!(16)));

    // Index assignment notifies the index path, which bubbles to the array
    store.at("items").child(0usize).set(0).unwrap();
    scheduler.run_until_stalled();
    assert_eq!(store.at("stats.total").get(), Some(json!(15)));
}

/// Test that dependencies are rebuilt when a branch switches.
#[test]
fn dependencies_follow_branches() {
    let (store, scheduler) = setup(json!({ "useNick": false, "first": "Robert", "nick": "Bob" }));
    let runs = Arc::new(AtomicUsize::new(0));
    let runs_clone = runs.clone();

    store
        .at("display")
        .set_computed(move |s: &PathHandle| {
            runs_clone.fetch_add(1, Ordering::SeqCst);
            if s.at("useNick").get() == Some(json!(true)) {
                s.at("nick").get().unwrap_or(Value::Null)
            } else {
                s.at("first").get().unwrap_or(Value::Null)
            }
        })
        .unwrap();
    assert_eq!(
        store.at("display").meta().unwrap().dependencies,
        vec!["useNick", "first"]
    );

    store.at("useNick").set(true).unwrap();
    scheduler.run_until_stalled();
    assert_eq!(store.at("display").get(), Some(json!("Bob")));
    assert_eq!(
        store.at("display").meta().unwrap().dependencies,
        vec!["useNick", "nick"]
    );

    // No longer a dependency
    let before = runs.load(Ordering::SeqCst);
    store.at("first").set("Rob").unwrap();
    scheduler.run_until_stalled();
    assert_eq!(runs.load(Ordering::SeqCst), before);

    store.at("nick").set("Bobby").unwrap();
    scheduler.run_until_stalled();
    assert_eq!(store.at("display").get(), Some(json!("Bobby")));
}

/// Test that a failing recompute keeps the last good value.
#[test]
fn failed_recompute_keeps_last_value() {
    let (store, scheduler) = setup(json!({ "n": 2 }));
    store
        .at("double")
        .set_computed(|s: &PathHandle| -> Result<Value, String> {
            match s.at("n").as_f64() {
                Some(n) if n >= 0.0 => Ok(json!(n * 2.0)),
                _ => Err("n must be a non-negative number".into()),
            }
        })
        .unwrap();
    assert_eq!(store.at("double").get(), Some(json!(4.0)));

    store.at("n").set(-1).unwrap();
    scheduler.run_until_stalled();
    assert_eq!(store.at("double").get(), Some(json!(4.0)));
    assert_eq!(store.at("double").meta().unwrap().last_value, Some(json!(4.0)));

    // Still subscribed after the failure
    store.at("n").set(5).unwrap();
    scheduler.run_until_stalled();
    assert_eq!(store.at("double").get(), Some(json!(10.0)));
}

/// Test that a failing first run is reported to the caller.
#[test]
fn failed_definition_is_an_error() {
    let (store, scheduler) = setup(json!({ "n": "x" }));
    let err = store
        .at("double")
        .set_computed(|s: &PathHandle| -> Result<Value, String> {
            s.at("n").as_f64().map(|n| json!(n * 2.0)).ok_or_else(|| "not a number".to_string())
        })
        .unwrap_err();

    match err {
        StoreError::Compute { path, source } => {
            assert_eq!(path, "double");
            assert_eq!(source.message(), "not a number");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(store.at("double").get(), None);
    assert!(store.at("double").meta().is_none());
    scheduler.run_until_stalled();
}

/// Test that redefining a path drops the old definition's subscriptions.
#[test]
fn redefinition_replaces_dependencies() {
    let (store, scheduler) = setup(json!({ "a": 1, "b": 10 }));
    store
        .at("out")
        .set_computed(|s: &PathHandle| s.at("a").get().unwrap_or(Value::Null))
        .unwrap();
    store
        .at("out")
        .set_computed(|s: &PathHandle| s.at("b").get().unwrap_or(Value::Null))
        .unwrap();
    assert_eq!(store.at("out").get(), Some(json!(10)));

    store.at("a").set(2).unwrap();
    scheduler.run_until_stalled();
    assert_eq!(store.at("out").get(), Some(json!(10)));

    store.at("b").set(20).unwrap();
    scheduler.run_until_stalled();
    assert_eq!(store.at("out").get(), Some(json!(20)));
}

/// Test that a deferred computed property lands after its future resolves.
#[tokio::test]
async fn deferred_computed_on_tokio() {
    let scheduler = Arc::new(TokioScheduler::current().unwrap());
    let store = Store::new(json!({ "user": { "name": "Alice" } }), scheduler);

    store
        .at("user.greeting")
        .set_computed(|s: &PathHandle| {
            let name = s.at("user.name").to_string();
            Derived::deferred(async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                json!(format!("Async {name}"))
            })
        })
        .unwrap();

    // Metadata is in place before the value arrives
    let (seen, _sub) = record(&store.at("user.greeting"));
    assert_eq!(store.at("user.greeting").get(), None);
    let meta = store.at("user.greeting").meta().unwrap();
    assert!(meta.is_async);
    assert_eq!(meta.dependencies, vec!["user.name"]);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(store.at("user.greeting").get(), Some(json!("Async Alice")));
    assert_eq!(
        *seen.lock(),
        vec![(Some(json!("Async Alice")), "user.greeting".to_string())]
    );

    store.at("user.name").set("Bob").unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(store.at("user.greeting").get(), Some(json!("Async Bob")));
    assert_eq!(
        *seen.lock(),
        vec![
            (Some(json!("Async Alice")), "user.greeting".to_string()),
            (Some(json!("Async Bob")), "user.greeting".to_string()),
        ]
    );
}

/// Test that a slow deferred result never overwrites a newer one.
#[test]
fn stale_deferred_result_is_dropped() {
    let (store, scheduler) = setup(json!({ "query": "a" }));
    let (tx1, rx1) = oneshot::channel::<Value>();
    let (tx2, rx2) = oneshot::channel::<Value>();
    let receivers = Arc::new(Mutex::new(VecDeque::from([rx1, rx2])));

    store
        .at("result")
        .set_computed(move |s: &PathHandle| {
            let _ = s.at("query").get();
            let rx = receivers.lock().pop_front();
            Derived::deferred(async move {
                match rx {
                    Some(rx) => rx.await.unwrap_or(Value::Null),
                    None => Value::Null,
                }
            })
        })
        .unwrap();

    let (seen, _sub) = record(&store.at("result"));

    // Second run starts while the first is still pending
    store.at("query").set("b").unwrap();
    scheduler.run_until_stalled();
    assert_eq!(scheduler.pending_futures(), 2);
    assert!(seen.lock().is_empty());

    tx2.send(json!("for b")).unwrap();
    scheduler.run_until_stalled();
    assert_eq!(store.at("result").get(), Some(json!("for b")));
    assert_eq!(*seen.lock(), vec![(Some(json!("for b")), "result".to_string())]);

    // The stale result neither writes nor notifies
    tx1.send(json!("for a")).unwrap();
    scheduler.run_until_stalled();
    assert_eq!(store.at("result").get(), Some(json!("for b")));
    assert_eq!(*seen.lock(), vec![(Some(json!("for b")), "result".to_string())]);
    assert_eq!(scheduler.pending_futures(), 0);
}

/// Test that a listener writing to the store gets its own flush.
#[test]
fn listener_writes_cascade() {
    let (store, scheduler) = setup(json!({ "celsius": 0 }));
    let writer = store.clone();
    let _sub = store.at("celsius").subscribe(move |value: Option<&Value>, _: &Path| {
        if let Some(c) = value.and_then(Value::as_f64) {
            writer.at("fahrenheit").set(json!(c * 9.0 / 5.0 + 32.0)).unwrap();
        }
    });
    let (seen, _f) = record(&store.at("fahrenheit"));

    store.at("celsius").set(100).unwrap();
    assert_eq!(scheduler.run_until_stalled(), 2);
    assert_eq!(
        *seen.lock(),
        vec![(Some(json!(212.0)), "fahrenheit".to_string())]
    );
}

/// Test that delete notifies with the path gone.
#[test]
fn delete_notifies_missing_value() {
    let (store, scheduler) = setup(json!({ "user": { "name": "A", "age": 3 } }));
    let (seen, _sub) = record(&store.at("user"));

    store.at("user.age").delete();
    store.at("nothing.here").delete();
    scheduler.run_until_stalled();

    assert_eq!(*seen.lock(), vec![(None, "user.age".to_string())]);
    assert_eq!(store.at("user").keys(), vec!["name"]);
}

/// Test that repeated writes keep one notification each unless dedupe is
/// turned on.
#[test]
fn dedupe_is_opt_in() {
    let (store, scheduler) = setup(json!({}));
    let (seen, _sub) = record(&store.at("n"));
    store.at("n").set(1).unwrap();
    store.at("n").set(2).unwrap();
    scheduler.run_until_stalled();
    assert_eq!(*seen.lock(), vec![(Some(json!(2)), "n".to_string()); 2]);

    let scheduler = Arc::new(ManualScheduler::new());
    let store = Store::builder()
        .state(json!({}))
        .scheduler(scheduler.clone())
        .config(StoreConfig {
            dedupe_notifications: true,
            ..StoreConfig::default()
        })
        .build();
    let (seen, _sub) = record(&store.at("n"));

    store.at("n").set(1).unwrap();
    store.at("n").set(2).unwrap();
    scheduler.run_until_stalled();
    assert_eq!(*seen.lock(), vec![(Some(json!(2)), "n".to_string())]);
}

/// Test that writes from several threads land and flush together.
#[test]
fn concurrent_writers() {
    let (store, scheduler) = setup(json!({}));
    let (seen, _sub) = record(&store.root());

    let workers: Vec<_> = (0..4)
        .map(|n| {
            let store = store.clone();
            thread::spawn(move || {
                store.at(format!("workers.w{n}").as_str()).set(n).unwrap();
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(scheduler.pending_tasks(), 1);
    scheduler.run_until_stalled();
    assert_eq!(seen.lock().len(), 4);
    assert_eq!(store.at("workers").keys().len(), 4);
}

/// Test the introspection surface end to end.
#[test]
fn debug_view_reports_computed_tree() {
    let (store, _scheduler) = setup(json!({ "user": { "firstName": "Bob", "lastName": "Smith" } }));
    store.at("user.fullName").set_computed(full_name).unwrap();

    let tree = store.debug().computed_tree();
    assert!(tree.contains("- fullName"));
    assert!(tree.contains("↳ deps: [user.firstName, user.lastName]"));

    let infos = store.debug().inspect_computed();
    assert_eq!(infos.len(), 1);
    assert_eq!(infos[0].path, "user.fullName");
    assert_eq!(store.debug().state()["user"]["fullName"], json!("Bob Smith"));
}
