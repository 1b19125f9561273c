use tether_types::AbortSignal;

#[test]
fn starts_unaborted() {
    let signal = AbortSignal::new();
    assert!(!signal.is_aborted());
}

#[test]
fn abort_sets_flag() {
    let signal = AbortSignal::new();
    signal.abort();
    assert!(signal.is_aborted());
}

#[test]
fn abort_is_idempotent() {
    let signal = AbortSignal::new();
    signal.abort();
    signal.abort();
    assert!(signal.is_aborted());
}

#[test]
fn clones_share_the_flag() {
    let signal = AbortSignal::new();
    let observer = signal.clone();
    assert!(!observer.is_aborted());

    signal.abort();
    assert!(observer.is_aborted());
}

#[test]
fn abort_visible_across_threads() {
    let signal = AbortSignal::new();
    let remote = signal.clone();

    let handle = std::thread::spawn(move || {
        remote.abort();
    });
    handle.join().unwrap();

    assert!(signal.is_aborted());
}

#[test]
fn default_is_unaborted() {
    let signal = AbortSignal::default();
    assert!(!signal.is_aborted());
}
