//! Shared test fixtures for the query primitives.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tether_sync::ClientHandle;
use tether_types::{Error, Keyed, Result};

/// The entity under test.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub key: String,
    pub name: String,
    pub done: bool,
}

impl Keyed for Task {
    type Key = String;

    fn key(&self) -> String {
        self.key.clone()
    }
}

/// Returns an open task.
pub fn task(key: &str, name: &str) -> Task {
    Task {
        key: key.into(),
        name: name.into(),
        done: false,
    }
}

/// Returns a completed task.
pub fn done_task(key: &str, name: &str) -> Task {
    Task {
        done: true,
        ..task(key, name)
    }
}

/// In-memory stand-in for the remote API: a keyed table plus call
/// accounting, so tests can assert exactly how often the network was hit.
pub struct TestClient {
    table: Mutex<HashMap<String, Task>>,
    fetches: AtomicUsize,
    saves: AtomicUsize,
    pages: AtomicUsize,
    fail_next: AtomicBool,
}

impl TestClient {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
            fetches: AtomicUsize::new(0),
            saves: AtomicUsize::new(0),
            pages: AtomicUsize::new(0),
            fail_next: AtomicBool::new(false),
        }
    }

    /// Preloads the server-side table.
    pub fn seed(&self, tasks: impl IntoIterator<Item = Task>) {
        let mut table = self.table.lock().unwrap();
        for task in tasks {
            table.insert(task.key.clone(), task);
        }
    }

    /// Makes the next fetch or save fail with a transport error.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// How many fetch calls the client has served, including failed ones.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// How many save calls the client has served.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Resolves one task by key.
    pub fn fetch(&self, key: &str) -> Result<Task> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(Error::Transport("connection reset".into()));
        }
        self.table
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }

    /// Resolves every task matching the filter, in key order.
    pub fn fetch_matching(&self, matches: impl Fn(&Task) -> bool) -> Result<Vec<Task>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(Error::Transport("connection reset".into()));
        }
        let mut hits: Vec<Task> = self
            .table
            .lock()
            .unwrap()
            .values()
            .filter(|task| matches(task))
            .cloned()
            .collect();
        hits.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(hits)
    }

    /// Serves the next `size` tasks in key order, advancing an internal
    /// cursor. Each call is one page.
    pub fn next_page(&self, size: usize) -> Result<Vec<Task>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(Error::Transport("connection reset".into()));
        }
        let start = self.pages.fetch_add(1, Ordering::SeqCst) * size;
        let mut all: Vec<Task> = self.table.lock().unwrap().values().cloned().collect();
        all.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(all.into_iter().skip(start).take(size).collect())
    }

    /// Persists a task, assigning a server key when the client sends a
    /// blank one, and echoes the stored row back.
    pub fn save(&self, mut task: Task) -> Result<Task> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(Error::Transport("connection reset".into()));
        }
        let serial = self.saves.fetch_add(1, Ordering::SeqCst) + 1;
        if task.key.is_empty() {
            task.key = format!("srv-{serial}");
        }
        self.table
            .lock()
            .unwrap()
            .insert(task.key.clone(), task.clone());
        Ok(task)
    }
}

/// A handle already connected to a fresh [`TestClient`], plus the client
/// itself for seeding and call accounting.
pub fn connected() -> (ClientHandle<TestClient>, Arc<TestClient>) {
    let api = Arc::new(TestClient::new());
    let handle = ClientHandle::new();
    handle.connect(Arc::clone(&api));
    (handle, api)
}
