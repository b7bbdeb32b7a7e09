//! Integration tests for the signal graph.
//!
//! These exercise the full stack: store binding, dependency-ordered
//! evaluation, memoization gating, subscriber notification, and the
//! re-entrancy queue.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};

use signal_core::{
    by_value, read, value, EvaluationMode, GraphOptions, Input, MemoryStore, SignalError,
    SignalGraph, SignalHandle, SignalSpec, SubscriptionId, Value,
};

#[derive(Clone, Default)]
struct AppState {
    a: i64,
    b: i64,
    c: i64,
}

fn as_i64(v: &Value) -> i64 {
    read::<i64>(v).copied().expect("i64 value")
}

fn select_a(graph: &SignalGraph<AppState>) -> SignalHandle {
    graph
        .create_signal(
            vec![Input::state(|s: &AppState| value(s.a))],
            |vals: &[Value]| Ok(vals[0].clone()),
        )
        .expect("register")
}

/// The end-to-end scenario: a sum signal over two state fields follows
/// store updates, notifies exactly once per real change, and ignores
/// updates to unrelated state.
#[test]
fn sum_signal_follows_the_store() {
    let graph: SignalGraph<AppState> = SignalGraph::new();
    let sum = graph
        .create_signal(
            vec![
                Input::state(|s: &AppState| value(s.a)),
                Input::state(|s: &AppState| value(s.b)),
            ],
            |vals: &[Value]| Ok(value(as_i64(&vals[0]) + as_i64(&vals[1]))),
        )
        .expect("register");

    let store = MemoryStore::new(AppState { a: 1, b: 2, c: 0 });
    graph.attach(store.clone()).expect("attach");
    assert_eq!(as_i64(&graph.get_value(sum).expect("value")), 3);

    let notifications = Arc::new(Mutex::new(Vec::new()));
    let log = notifications.clone();
    graph
        .subscribe(sum, move |v| log.lock().unwrap().push(as_i64(v)))
        .expect("subscribe");

    store.set_state(AppState { a: 1, b: 5, c: 0 });
    assert_eq!(as_i64(&graph.get_value(sum).expect("value")), 6);
    assert_eq!(*notifications.lock().unwrap(), vec![6]);

    // c is not an input of sum: no recompute, no notification.
    let version_before = graph.version(sum).expect("version");
    store.set_state(AppState { a: 1, b: 5, c: 9 });
    assert_eq!(graph.version(sum).expect("version"), version_before);
    assert_eq!(*notifications.lock().unwrap(), vec![6]);
}

/// Reading twice with no intervening store change neither recomputes nor
/// produces a different value identity, even when every read pulls a
/// lazy pass.
#[test]
fn reads_are_idempotent_without_store_changes() {
    let graph: SignalGraph<AppState> = SignalGraph::with_options(GraphOptions {
        mode: EvaluationMode::Lazy,
    });
    let computes = Arc::new(AtomicI32::new(0));
    let counter = computes.clone();
    let sig = graph
        .create_signal(
            vec![Input::state(|s: &AppState| value(s.a))],
            move |vals: &[Value]| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(value(vec![as_i64(&vals[0])]))
            },
        )
        .expect("register");

    let store = MemoryStore::new(AppState { a: 5, b: 0, c: 0 });
    graph.attach(store).expect("attach");

    let first = graph.get_value(sig).expect("value");
    let second = graph.get_value(sig).expect("value");
    assert_eq!(computes.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&first, &second));
}

fn diamond(
    graph: &SignalGraph<AppState>,
    log: &Arc<Mutex<Vec<&'static str>>>,
) -> Vec<SignalHandle> {
    let mut specs = Vec::new();
    {
        let log = log.clone();
        specs.push(SignalSpec::new(
            vec![Input::state(|s: &AppState| value(s.a))],
            move |vals: &[Value]| {
                log.lock().unwrap().push("base");
                Ok(vals[0].clone())
            },
        ));
    }
    {
        let log = log.clone();
        specs.push(SignalSpec::new(vec![Input::member(0)], move |vals: &[Value]| {
            log.lock().unwrap().push("left");
            Ok(value(as_i64(&vals[0]) + 1))
        }));
    }
    {
        let log = log.clone();
        specs.push(SignalSpec::new(vec![Input::member(0)], move |vals: &[Value]| {
            log.lock().unwrap().push("right");
            Ok(value(as_i64(&vals[0]) * 2))
        }));
    }
    {
        let log = log.clone();
        specs.push(SignalSpec::new(
            vec![Input::member(1), Input::member(2)],
            move |vals: &[Value]| {
                log.lock().unwrap().push("join");
                Ok(value(as_i64(&vals[0]) + as_i64(&vals[1])))
            },
        ));
    }
    graph.create_signals(specs).expect("acyclic batch")
}

/// Diamond sharing and topological order: one store change recomputes
/// every node exactly once, dependencies strictly before dependents.
#[test]
fn diamond_recomputes_each_node_once_in_order() {
    let graph: SignalGraph<AppState> = SignalGraph::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let handles = diamond(&graph, &log);

    let store = MemoryStore::new(AppState::default());
    graph.attach(store.clone()).expect("attach");

    store.set_state(AppState { a: 2, b: 0, c: 0 });
    assert_eq!(*log.lock().unwrap(), vec!["base", "left", "right", "join"]);

    log.lock().unwrap().clear();
    store.set_state(AppState { a: 3, b: 0, c: 0 });
    assert_eq!(*log.lock().unwrap(), vec!["base", "left", "right", "join"]);

    // join = (a + 1) + (a * 2)
    assert_eq!(as_i64(&graph.get_value(handles[3]).expect("value")), 10);
}

/// Constructing A→B→A fails with a cycle error and registers neither node.
#[test]
fn cyclic_batch_registers_nothing() {
    let graph: SignalGraph<AppState> = SignalGraph::new();
    let err = graph
        .create_signals(vec![
            SignalSpec::new(vec![Input::member(1)], |vals: &[Value]| Ok(vals[0].clone())),
            SignalSpec::new(vec![Input::member(0)], |vals: &[Value]| Ok(vals[0].clone())),
        ])
        .unwrap_err();
    assert!(matches!(err, SignalError::Cycle(_)));
    assert_eq!(graph.node_count(), 0);
}

/// A recompute that produces an equal output keeps the previous value's
/// identity and fires no subscriber.
#[test]
fn equal_recompute_is_referentially_stable() {
    let graph: SignalGraph<AppState> = SignalGraph::new();
    let parity = graph
        .create_signal_with(
            SignalSpec::new(
                vec![Input::state(|s: &AppState| value(s.a))],
                |vals: &[Value]| Ok(value(vec![as_i64(&vals[0]).rem_euclid(2)])),
            )
            .with_equality(by_value::<Vec<i64>>()),
        )
        .expect("register");

    let store = MemoryStore::new(AppState { a: 2, b: 0, c: 0 });
    graph.attach(store.clone()).expect("attach");
    let before = graph.get_value(parity).expect("value");

    let fired = Arc::new(AtomicI32::new(0));
    let fired_clone = fired.clone();
    graph
        .subscribe(parity, move |_| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        })
        .expect("subscribe");

    // 2 -> 4: still even, so the output is equal by policy.
    store.set_state(AppState { a: 4, b: 0, c: 0 });
    let after = graph.get_value(parity).expect("value");
    assert!(Arc::ptr_eq(&before, &after));
    assert_eq!(fired.load(Ordering::SeqCst), 0);
    assert_eq!(graph.version(parity).expect("version"), 1);
}

/// One node's compute failure neither aborts the pass nor disturbs
/// independent nodes; the failing node keeps its last-known-good value.
#[test]
fn failures_are_isolated_per_node() {
    let graph: SignalGraph<AppState> = SignalGraph::new();
    let flaky = graph
        .create_signal(
            vec![Input::state(|s: &AppState| value(s.a))],
            |vals: &[Value]| {
                let a = as_i64(&vals[0]);
                if a < 0 {
                    Err(format!("negative input {a}").into())
                } else {
                    Ok(value(a))
                }
            },
        )
        .expect("register");
    let steady = graph
        .create_signal(
            vec![Input::state(|s: &AppState| value(s.b))],
            |vals: &[Value]| Ok(vals[0].clone()),
        )
        .expect("register");

    let store = MemoryStore::new(AppState { a: 1, b: 1, c: 0 });
    graph.attach(store.clone()).expect("attach");
    graph.get_value(flaky).expect("settle");

    let steady_log = Arc::new(Mutex::new(Vec::new()));
    let log = steady_log.clone();
    graph
        .subscribe(steady, move |v| log.lock().unwrap().push(as_i64(v)))
        .expect("subscribe");

    store.set_state(AppState { a: -1, b: 2, c: 0 });

    assert_eq!(*steady_log.lock().unwrap(), vec![2]);
    assert_eq!(as_i64(&graph.get_value(flaky).expect("stale value")), 1);

    let report = graph.last_report();
    assert_eq!(report.failures().len(), 1);
    assert_eq!(report.failures()[0].node(), flaky.node_id());
    assert!(report.failures()[0].error().to_string().contains("negative"));
}

/// Signals compose through node inputs, and an unchanged upstream
/// short-circuits the downstream via its version counter.
#[test]
fn signals_compose_through_node_inputs() {
    let graph: SignalGraph<AppState> = SignalGraph::new();
    let base = select_a(&graph);
    let doubled_computes = Arc::new(AtomicI32::new(0));
    let counter = doubled_computes.clone();
    let doubled = graph
        .create_signal(vec![Input::node(base)], move |vals: &[Value]| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(value(as_i64(&vals[0]) * 2))
        })
        .expect("register");

    let store = MemoryStore::new(AppState { a: 2, b: 0, c: 0 });
    graph.attach(store.clone()).expect("attach");

    assert_eq!(as_i64(&graph.get_value(doubled).expect("value")), 4);
    assert_eq!(doubled_computes.load(Ordering::SeqCst), 1);

    // b is irrelevant to the chain: base stays at the same version and
    // doubled never reruns.
    store.set_state(AppState { a: 2, b: 9, c: 0 });
    assert_eq!(doubled_computes.load(Ordering::SeqCst), 1);

    store.set_state(AppState { a: 5, b: 9, c: 0 });
    assert_eq!(as_i64(&graph.get_value(doubled).expect("value")), 10);
    assert_eq!(doubled_computes.load(Ordering::SeqCst), 2);
}

/// A store mutation from inside a subscriber callback is queued and run
/// as a follow-up pass, never nested.
#[test]
fn reentrant_updates_are_queued_not_nested() {
    let graph: SignalGraph<AppState> = SignalGraph::new();
    let sig = select_a(&graph);
    let store = MemoryStore::new(AppState::default());
    graph.attach(store.clone()).expect("attach");
    graph.get_value(sig).expect("settle");

    let log = Arc::new(Mutex::new(Vec::new()));
    let depth = Arc::new(AtomicI32::new(0));
    {
        let log = log.clone();
        let depth = depth.clone();
        let store = store.clone();
        graph
            .subscribe(sig, move |v| {
                let nested = depth.fetch_add(1, Ordering::SeqCst);
                assert_eq!(nested, 0, "notification must not nest");
                let n = as_i64(v);
                log.lock().unwrap().push(n);
                if n == 1 {
                    store.set_state(AppState { a: 2, b: 0, c: 0 });
                }
                depth.fetch_sub(1, Ordering::SeqCst);
            })
            .expect("subscribe");
    }

    store.set_state(AppState { a: 1, b: 0, c: 0 });
    assert_eq!(*log.lock().unwrap(), vec![1, 2]);
    assert_eq!(as_i64(&graph.get_value(sig).expect("value")), 2);
}

/// Callbacks may subscribe and unsubscribe during notification: removals
/// take effect within the current pass, additions only join the next one.
#[test]
fn subscriptions_can_change_during_notification() {
    let graph: SignalGraph<AppState> = SignalGraph::new();
    let sig = select_a(&graph);
    let store = MemoryStore::new(AppState::default());
    graph.attach(store.clone()).expect("attach");
    graph.get_value(sig).expect("settle");

    let log = Arc::new(Mutex::new(Vec::<&'static str>::new()));
    let second_token = Arc::new(Mutex::new(None::<SubscriptionId>));
    let added_late = Arc::new(AtomicI32::new(0));

    {
        let graph = graph.clone();
        let log = log.clone();
        let second_token = second_token.clone();
        let added_late = added_late.clone();
        graph
            .clone()
            .subscribe(sig, move |_| {
                log.lock().unwrap().push("first");
                if let Some(token) = second_token.lock().unwrap().take() {
                    assert!(graph.unsubscribe(token));
                }
                if added_late.fetch_add(1, Ordering::SeqCst) == 0 {
                    let log = log.clone();
                    graph
                        .subscribe(sig, move |_| log.lock().unwrap().push("late"))
                        .expect("subscribe from callback");
                }
            })
            .expect("subscribe");
    }
    {
        let log = log.clone();
        let token = graph
            .subscribe(sig, move |_| log.lock().unwrap().push("second"))
            .expect("subscribe");
        *second_token.lock().unwrap() = Some(token);
    }

    // First pass: "second" was unsubscribed before its turn; "late" was
    // added mid-pass and must wait.
    store.set_state(AppState { a: 1, b: 0, c: 0 });
    assert_eq!(*log.lock().unwrap(), vec!["first"]);

    store.set_state(AppState { a: 2, b: 0, c: 0 });
    assert_eq!(*log.lock().unwrap(), vec!["first", "first", "late"]);
}
