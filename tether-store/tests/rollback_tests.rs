use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};
use tether_store::{Rollback, RollbackStack};
use tether_types::Error;

fn logging_rollback(log: &Arc<Mutex<Vec<&'static str>>>, tag: &'static str) -> Rollback {
    let log = Arc::clone(log);
    Rollback::new(move || {
        log.lock().unwrap().push(tag);
        Ok(())
    })
}

// ── Single rollbacks ─────────────────────────────────────────────

#[test]
fn run_executes_the_closure() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let rollback = logging_rollback(&log, "ran");

    rollback.run().unwrap();
    assert_eq!(log.lock().unwrap().as_slice(), ["ran"]);
}

#[test]
fn noop_runs_without_effect() {
    let rollback = Rollback::noop();
    assert!(rollback.is_noop());
    rollback.run().unwrap();
}

#[test]
fn real_rollback_is_not_noop() {
    let rollback = Rollback::new(|| Ok(()));
    assert!(!rollback.is_noop());
}

#[test]
fn run_propagates_errors() {
    let rollback = Rollback::new(|| Err(Error::Validation("broken".into())));
    assert!(rollback.run().is_err());
}

// ── Stack ordering ───────────────────────────────────────────────

#[test]
fn unwind_runs_in_reverse_push_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let stack = RollbackStack::new();

    stack.push(logging_rollback(&log, "first"));
    stack.push(logging_rollback(&log, "second"));
    stack.push(logging_rollback(&log, "third"));

    let executed = stack.unwind();

    assert_eq!(executed, 3);
    assert_eq!(log.lock().unwrap().as_slice(), ["third", "second", "first"]);
}

#[test]
fn unwind_empties_the_stack() {
    let stack = RollbackStack::new();
    stack.push(Rollback::new(|| Ok(())));
    assert_eq!(stack.len(), 1);

    stack.unwind();

    assert!(stack.is_empty());
    assert_eq!(stack.unwind(), 0);
}

#[test]
fn failed_entry_does_not_stop_the_rest() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let stack = RollbackStack::new();

    stack.push(logging_rollback(&log, "first"));
    stack.push(Rollback::new(|| Err(Error::Validation("cannot restore".into()))));
    stack.push(logging_rollback(&log, "third"));

    let executed = stack.unwind();

    // The failing entry is skipped from the count but the others still ran.
    assert_eq!(executed, 2);
    assert_eq!(log.lock().unwrap().as_slice(), ["third", "first"]);
}

#[test]
fn clear_discards_without_running() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let stack = RollbackStack::new();
    stack.push(logging_rollback(&log, "never"));

    stack.clear();

    assert!(stack.is_empty());
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn clones_share_the_same_entries() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let stack = RollbackStack::new();
    let alias = stack.clone();

    alias.push(logging_rollback(&log, "via alias"));
    assert_eq!(stack.len(), 1);

    stack.unwind();
    assert_eq!(log.lock().unwrap().as_slice(), ["via alias"]);
    assert!(alias.is_empty());
}
