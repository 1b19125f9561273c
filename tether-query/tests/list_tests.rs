mod common;

use common::{connected, done_task, task, Task, TestClient};
use pretty_assertions::assert_eq;
use std::time::Duration;
use tether_query::{CachePlan, FetchCtx, FetchOptions, List};
use tether_store::Store;
use tether_sync::ClientHandle;
use tether_types::{AbortSignal, QueryState};

/// Two cached queries ("open", "done") plus a network-only free-text
/// search, sorted by key for deterministic assertions.
fn make_list(
    client: &ClientHandle<TestClient>,
    store: &Store<Task>,
) -> List<TestClient, Task, String> {
    List::new(
        client.clone(),
        store,
        |query: &String| match query.as_str() {
            "open" => CachePlan::cached(|task: &Task| !task.done),
            "done" => CachePlan::cached(|task: &Task| task.done),
            _ => CachePlan::Network,
        },
        |ctx: FetchCtx<TestClient>, query: String| async move {
            match query.as_str() {
                "open" => ctx.client.fetch_matching(|task| !task.done),
                "done" => ctx.client.fetch_matching(|task| task.done),
                term => {
                    let term = term.to_string();
                    ctx.client.fetch_matching(|task| task.name.contains(&term))
                }
            }
        },
    )
    .with_name("tasks")
    .with_sort(|a, b| a.key.cmp(&b.key))
}

/// Pages through the whole table two at a time.
fn make_paged_list(
    client: &ClientHandle<TestClient>,
    store: &Store<Task>,
) -> List<TestClient, Task, String> {
    List::new(
        client.clone(),
        store,
        |_query: &String| CachePlan::Network,
        |ctx: FetchCtx<TestClient>, _query: String| async move { ctx.client.next_page(2) },
    )
    .with_name("tasks")
    .with_page_size(2)
}

fn keys(state: &QueryState<Vec<Task>>) -> Vec<String> {
    state
        .data
        .clone()
        .unwrap_or_default()
        .into_iter()
        .map(|task| task.key)
        .collect()
}

// ── Cache planning ───────────────────────────────────────────────

#[tokio::test]
async fn cached_plan_with_hits_serves_without_network() {
    let (client, api) = connected();
    let store = Store::new();
    let _ = store.set_many([task("t1", "Write tests"), done_task("t2", "Ship"), task("t3", "Review")]);

    let list = make_list(&client, &store);
    list.fetch("open".into(), FetchOptions::default()).await;

    assert!(list.state().is_success());
    assert_eq!(keys(&list.state()), ["t1", "t3"]);
    assert_eq!(api.fetch_count(), 0);
}

#[tokio::test]
async fn cached_plan_with_an_empty_scan_falls_through_to_the_transport() {
    let (client, api) = connected();
    api.seed([task("t1", "Write tests"), done_task("t2", "Ship")]);
    let store = Store::new();

    let list = make_list(&client, &store);
    list.fetch("open".into(), FetchOptions::default()).await;

    assert_eq!(keys(&list.state()), ["t1"]);
    assert_eq!(api.fetch_count(), 1);
    // Fetched rows land in the shared store.
    assert_eq!(store.get(&"t1".to_string()), Some(task("t1", "Write tests")));
}

#[tokio::test]
async fn network_plan_always_uses_the_transport() {
    let (client, api) = connected();
    api.seed([task("t1", "alpha release")]);
    let store = Store::new();
    let _ = store.set(task("t9", "alpha draft"));

    let list = make_list(&client, &store);
    list.fetch("alpha".into(), FetchOptions::default()).await;

    assert_eq!(keys(&list.state()), ["t1"]);
    assert_eq!(api.fetch_count(), 1);
}

#[tokio::test]
async fn refresh_forces_the_transport_under_a_cached_plan() {
    let (client, api) = connected();
    api.seed([task("t1", "New name")]);
    let store = Store::new();
    let _ = store.set(task("t1", "Old name"));

    let list = make_list(&client, &store);
    let options = FetchOptions {
        refresh: true,
        ..Default::default()
    };
    list.fetch("open".into(), options).await;

    assert_eq!(api.fetch_count(), 1);
    let state = list.state();
    assert_eq!(
        state.data.unwrap_or_default()[0].name,
        "New name".to_string()
    );
}

// ── Failure modes ────────────────────────────────────────────────

#[tokio::test]
async fn disconnected_with_an_empty_cache_reports_disabled() {
    let client: ClientHandle<TestClient> = ClientHandle::new();
    let store = Store::new();

    let list = make_list(&client, &store);
    list.fetch("open".into(), FetchOptions::default()).await;

    let state = list.state();
    assert!(state.is_disabled());
    assert_eq!(state.message, "Cannot retrieve tasks");
}

#[tokio::test]
async fn cached_hits_are_served_even_disconnected() {
    let client: ClientHandle<TestClient> = ClientHandle::new();
    let store = Store::new();
    let _ = store.set(task("t1", "Write tests"));

    let list = make_list(&client, &store);
    list.fetch("open".into(), FetchOptions::default()).await;

    assert!(list.state().is_success());
    assert_eq!(keys(&list.state()), ["t1"]);
}

#[tokio::test]
async fn transport_failure_reports_the_error() {
    let (client, api) = connected();
    api.fail_next();
    let store = Store::new();

    let list = make_list(&client, &store);
    list.fetch("open".into(), FetchOptions::default()).await;

    let state = list.state();
    assert!(state.is_error());
    assert_eq!(state.message, "Failed to retrieve tasks");
    assert_eq!(
        state.description.as_deref(),
        Some("transport error: connection reset")
    );
}

// ── Live membership ──────────────────────────────────────────────

#[tokio::test]
async fn matching_write_joins_the_result_set() {
    let (client, _api) = connected();
    let store = Store::new();
    let _ = store.set_many([task("t1", "Write tests"), task("t3", "Review")]);

    let list = make_list(&client, &store);
    list.fetch("open".into(), FetchOptions::default()).await;
    assert_eq!(keys(&list.state()), ["t1", "t3"]);

    let _ = store.set(task("t2", "New arrival"));
    assert_eq!(keys(&list.state()), ["t1", "t2", "t3"]);
}

#[tokio::test]
async fn admission_works_from_an_empty_result_set() {
    let (client, api) = connected();
    let store = Store::new();

    let list = make_list(&client, &store);
    list.fetch("open".into(), FetchOptions::default()).await;

    let state = list.state();
    assert!(state.is_success());
    assert_eq!(state.data, Some(Vec::new()));

    // The first matching write populates the list without another fetch.
    let _ = store.set(task("t1", "Write tests"));
    assert_eq!(keys(&list.state()), ["t1"]);
    assert_eq!(api.fetch_count(), 1);
}

#[tokio::test]
async fn non_matching_write_is_ignored() {
    let (client, _api) = connected();
    let store = Store::new();
    let _ = store.set(task("t1", "Write tests"));

    let list = make_list(&client, &store);
    list.fetch("open".into(), FetchOptions::default()).await;

    let states = list.watch();
    let _ = store.set(done_task("t4", "Already finished"));

    assert_eq!(keys(&list.state()), ["t1"]);
    // Nothing was even re-emitted.
    assert!(!states.has_changed().unwrap());
}

#[tokio::test]
async fn member_update_is_reflected_in_place() {
    let (client, _api) = connected();
    let store = Store::new();
    let _ = store.set(task("t1", "Write tests"));

    let list = make_list(&client, &store);
    list.fetch("open".into(), FetchOptions::default()).await;

    let _ = store.set(task("t1", "Write better tests"));

    let state = list.state();
    assert_eq!(keys(&state), ["t1"]);
    assert_eq!(state.data.unwrap()[0].name, "Write better tests");
}

#[tokio::test]
async fn member_update_that_stops_matching_is_evicted() {
    let (client, _api) = connected();
    let store = Store::new();
    let _ = store.set_many([task("t1", "Write tests"), task("t3", "Review")]);

    let list = make_list(&client, &store);
    list.fetch("open".into(), FetchOptions::default()).await;

    let _ = store.set(done_task("t1", "Write tests"));
    assert_eq!(keys(&list.state()), ["t3"]);
}

#[tokio::test]
async fn delete_removes_the_member() {
    let (client, _api) = connected();
    let store = Store::new();
    let _ = store.set_many([task("t1", "Write tests"), task("t3", "Review")]);

    let list = make_list(&client, &store);
    list.fetch("open".into(), FetchOptions::default()).await;

    let _ = store.delete(&"t1".to_string());
    assert_eq!(keys(&list.state()), ["t3"]);
}

#[tokio::test]
async fn delete_of_a_non_member_is_ignored() {
    let (client, _api) = connected();
    let store = Store::new();
    let _ = store.set_many([task("t1", "Write tests"), done_task("t2", "Ship")]);

    let list = make_list(&client, &store);
    list.fetch("open".into(), FetchOptions::default()).await;

    let states = list.watch();
    let _ = store.delete(&"t2".to_string());

    assert_eq!(keys(&list.state()), ["t1"]);
    assert!(!states.has_changed().unwrap());
}

#[tokio::test]
async fn network_plan_updates_only_known_members() {
    let (client, api) = connected();
    api.seed([task("t1", "alpha release")]);
    let store = Store::new();

    let list = make_list(&client, &store);
    list.fetch("alpha".into(), FetchOptions::default()).await;
    assert_eq!(keys(&list.state()), ["t1"]);

    // A new entity cannot be admitted: no local predicate exists.
    let _ = store.set(task("t8", "alpha too"));
    assert_eq!(keys(&list.state()), ["t1"]);

    // But a known member still updates in place.
    let _ = store.set(task("t1", "alpha revised"));
    assert_eq!(
        list.state().data.unwrap()[0].name,
        "alpha revised".to_string()
    );
}

// ── Pagination ───────────────────────────────────────────────────

#[tokio::test]
async fn a_full_page_sets_has_more() {
    let (client, api) = connected();
    api.seed([task("t1", "One"), task("t2", "Two"), task("t3", "Three")]);
    let store = Store::new();

    let list = make_paged_list(&client, &store);
    list.fetch("page".into(), FetchOptions::default()).await;

    assert_eq!(keys(&list.state()), ["t1", "t2"]);
    assert!(list.has_more());

    list.fetch_more("page".into(), FetchOptions::default()).await;
    assert_eq!(keys(&list.state()), ["t1", "t2", "t3"]);
    assert!(!list.has_more());
}

#[tokio::test]
async fn fetch_more_deduplicates_by_key() {
    let (client, api) = connected();
    api.seed([task("t1", "Write tests"), task("t3", "Review")]);
    let store = Store::new();

    let list = make_list(&client, &store);
    list.fetch("open".into(), FetchOptions::default()).await;
    // The same window again: nothing doubles up.
    list.fetch_more("open".into(), FetchOptions::default()).await;

    assert_eq!(keys(&list.state()), ["t1", "t3"]);
}

// ── Sorting ──────────────────────────────────────────────────────

#[tokio::test]
async fn results_follow_the_comparator() {
    let (client, _api) = connected();
    let store = Store::new();
    let _ = store.set_many([
        task("t1", "charlie"),
        task("t2", "alpha"),
        task("t3", "bravo"),
    ]);

    let list = List::new(
        client.clone(),
        &store,
        |_query: &String| CachePlan::cached(|task: &Task| !task.done),
        |ctx: FetchCtx<TestClient>, _query: String| async move {
            ctx.client.fetch_matching(|task| !task.done)
        },
    )
    .with_name("tasks")
    .with_sort(|a, b| a.name.cmp(&b.name));

    list.fetch("open".into(), FetchOptions::default()).await;
    assert_eq!(keys(&list.state()), ["t2", "t3", "t1"]);

    // Admissions slot in under the same ordering.
    let _ = store.set(task("t4", "aaa first"));
    assert_eq!(keys(&list.state()), ["t4", "t2", "t3", "t1"]);
}

// ── Item lookup ──────────────────────────────────────────────────

#[tokio::test]
async fn get_item_serves_cached_entities_synchronously() {
    let (client, api) = connected();
    let store = Store::new();
    let _ = store.set(task("t1", "Write tests"));

    let list = make_list(&client, &store);
    assert_eq!(
        list.get_item(&"t1".to_string()),
        Some(task("t1", "Write tests"))
    );
    assert_eq!(api.fetch_count(), 0);
}

#[tokio::test]
async fn get_item_without_a_resolver_stops_at_the_cache() {
    let (client, api) = connected();
    api.seed([task("t5", "Elsewhere")]);
    let store = Store::new();

    let list = make_list(&client, &store);
    assert_eq!(list.get_item(&"t5".to_string()), None);
    assert_eq!(api.fetch_count(), 0);
}

#[tokio::test]
async fn background_item_fetch_joins_the_result_set() {
    let (client, api) = connected();
    api.seed([task("t1", "Write tests")]);
    let store = Store::new();

    let list = make_list(&client, &store).with_item_fetch(
        |ctx: FetchCtx<TestClient>, key: String| async move { ctx.client.fetch(&key) },
    );
    list.fetch("open".into(), FetchOptions::default()).await;
    assert_eq!(keys(&list.state()), ["t1"]);

    // Unknown key: a background fetch starts; the arrival is admitted by
    // the active predicate.
    api.seed([task("t5", "Late arrival")]);
    assert_eq!(list.get_item(&"t5".to_string()), None);

    let mut states = list.watch();
    let joined = tokio::time::timeout(
        Duration::from_secs(1),
        states.wait_for(|state| {
            state
                .data
                .as_ref()
                .is_some_and(|items| items.iter().any(|task| task.key == "t5"))
        }),
    )
    .await
    .unwrap()
    .map(|state| state.clone())
    .unwrap();

    assert_eq!(
        joined.data.unwrap_or_default().len(),
        2,
        "t5 joins t1 in the result set"
    );
    assert_eq!(list.get_item(&"t5".to_string()), Some(task("t5", "Late arrival")));
}

// ── Abort ────────────────────────────────────────────────────────

#[tokio::test]
async fn abort_discards_the_network_result() {
    let (client, api) = connected();
    api.seed([task("t1", "Write tests")]);
    let store = Store::new();

    let list = List::new(
        client.clone(),
        &store,
        |_query: &String| CachePlan::Network,
        |ctx: FetchCtx<TestClient>, _query: String| async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            ctx.client.fetch_matching(|task| !task.done)
        },
    )
    .with_name("tasks");

    let signal = AbortSignal::new();
    let fetching = {
        let list = list.clone();
        let options = FetchOptions {
            signal: signal.clone(),
            ..Default::default()
        };
        tokio::spawn(async move {
            list.fetch("all".into(), options).await;
        })
    };

    tokio::time::sleep(Duration::from_millis(10)).await;
    signal.abort();
    fetching.await.unwrap();

    assert!(list.state().is_loading());
    assert_eq!(store.len(), 0);
}
