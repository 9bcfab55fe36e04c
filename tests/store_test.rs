use std::time::Duration;

use hyper_store::mock::MockHyperClient;
use hyper_store::{
    ClientError, FetchOutcome, HyperClient, HyperStore, RenderContext, StoreError, StoreEvent,
    ROOT_RESOURCE,
};
use serde_json::{json, Value};

/// Seeds the canonical three-hop users graph.
fn users_client() -> MockHyperClient {
    let client = MockHyperClient::new();
    client.insert_root(json!({"users": {"href": "/users"}}));
    client.insert("/users", json!({"collection": [{"href": "/users/1"}]}));
    client.insert("/users/1", json!({"name": "Mike"}));
    client.set_latency(Duration::from_millis(5));
    client
}

/// Drives one context until a pass completes fully loaded.
async fn render_until_loaded(context: &mut RenderContext, path: &str) -> Option<Value> {
    loop {
        context.start().await.unwrap();
        let value = context.get(path, None, None).await.unwrap();
        if context.stop().await.unwrap() {
            return value;
        }
        context.wake().await.expect("store should stay alive");
    }
}

#[tokio::test(start_paused = true)]
async fn render_completes_as_linked_resources_arrive() {
    let client = users_client();
    let store = HyperStore::new(client.clone());
    let mut events = store.subscribe();

    let name = store
        .get_async(|ctx| async move { ctx.get(".users.collection.0.name", None, None).await })
        .await
        .unwrap();
    assert_eq!(name, Some(json!("Mike")));

    // the walk fetched each hop exactly once
    assert_eq!(client.dispatch_count(ROOT_RESOURCE), 1);
    assert_eq!(client.dispatch_count("/users"), 1);
    assert_eq!(client.dispatch_count("/users/1"), 1);

    // three settlements, then one complete, not one per settlement
    let mut changes = 0;
    loop {
        match events.recv().await.unwrap() {
            StoreEvent::Change(notice) => {
                assert!(notice.error.is_none());
                changes += 1;
            }
            StoreEvent::Complete => break,
        }
    }
    assert_eq!(changes, 3);
    let silence = tokio::time::timeout(Duration::from_millis(500), events.recv()).await;
    assert!(silence.is_err(), "complete should fire once, got {silence:?}");
}

#[tokio::test(start_paused = true)]
async fn first_pass_yields_the_fallback() {
    let client = users_client();
    let store = HyperStore::new(client.clone());
    let mut context = store.context();

    context.start().await.unwrap();
    let list = context
        .get(".users.collection", None, Some(json!([])))
        .await
        .unwrap();
    assert_eq!(list, Some(json!([])));
    assert!(!context.stop().await.unwrap());
    context.destroy().await;
}

#[tokio::test(start_paused = true)]
async fn concurrent_contexts_share_one_fetch() {
    let client = users_client();
    let store = HyperStore::new(client.clone());
    let mut first = store.context();
    let mut second = store.context();

    // both cycles run before anything settles
    for context in [&mut first, &mut second] {
        context.start().await.unwrap();
        let value = context.get(".users.collection", None, None).await.unwrap();
        assert_eq!(value, None);
        assert!(!context.stop().await.unwrap());
    }
    assert_eq!(client.dispatch_count(ROOT_RESOURCE), 1);

    first.wake().await.unwrap();
    second.wake().await.unwrap();

    for context in [&mut first, &mut second] {
        context.start().await.unwrap();
        context.get(".users.collection", None, None).await.unwrap();
        context.stop().await.unwrap();
    }
    assert_eq!(client.dispatch_count("/users"), 1);

    first.destroy().await;
    second.destroy().await;
}

#[tokio::test(start_paused = true)]
async fn settled_values_are_served_from_cache() {
    let client = users_client();
    let store = HyperStore::new(client.clone());

    let mut context = store.context();
    let name = render_until_loaded(&mut context, ".users.collection.0.name").await;
    assert_eq!(name, Some(json!("Mike")));
    let dispatched = client.operations().len();

    // a fresh context re-reading the same graph dispatches nothing
    let mut other = store.context();
    other.start().await.unwrap();
    let name = other
        .get(".users.collection.0.name", None, None)
        .await
        .unwrap();
    assert_eq!(name, Some(json!("Mike")));
    assert!(other.stop().await.unwrap());
    assert_eq!(client.operations().len(), dispatched);

    context.destroy().await;
    other.destroy().await;
}

#[tokio::test(start_paused = true)]
async fn reads_before_start_are_rejected() {
    let client = users_client();
    let store = HyperStore::new(client);
    let context = store.context();
    let err = context.get(".users", None, None).await.unwrap_err();
    assert_eq!(err, StoreError::NotStarted);
}

#[tokio::test(start_paused = true)]
async fn fetch_errors_are_cached_and_surfaced() {
    let client = MockHyperClient::new();
    client.insert_root(json!({"users": {"href": "/users"}}));
    client.fail(
        "/users",
        ClientError::Status {
            id: "/users".into(),
            status: 500,
        },
    );
    client.set_latency(Duration::from_millis(5));
    let store = HyperStore::new(client.clone());

    let err = store
        .get_async(|ctx| async move { ctx.get(".users.collection", None, None).await })
        .await
        .unwrap_err();
    match err {
        StoreError::Fetch { id, source } => {
            assert_eq!(id, "/users");
            assert_eq!(
                source,
                ClientError::Status {
                    id: "/users".into(),
                    status: 500,
                }
            );
        }
        other => panic!("expected a fetch error, got {other:?}"),
    }
    // the failure was fetched once and cached, not retried
    assert_eq!(client.dispatch_count("/users"), 1);
}

#[tokio::test(start_paused = true)]
async fn req_reports_resolution_state_without_substitution() {
    let client = users_client();
    let store = HyperStore::new(client.clone());
    let mut context = store.context();

    context.start().await.unwrap();
    let resolution = context.req(".users.collection", None).await.unwrap();
    assert!(!resolution.is_loaded);
    assert!(!resolution.completed);
    assert_eq!(resolution.value, None);
    assert!(!context.stop().await.unwrap());

    // root settles; the next pass walks one hop further
    context.wake().await.unwrap();
    context.start().await.unwrap();
    assert!(!context.req(".users.collection", None).await.unwrap().is_loaded);
    assert!(!context.stop().await.unwrap());

    context.wake().await.unwrap();
    context.start().await.unwrap();
    let resolution = context.req(".users.collection", None).await.unwrap();
    assert!(resolution.is_loaded);
    assert_eq!(resolution.value, Some(json!([{"href": "/users/1"}])));
    assert!(context.stop().await.unwrap());
    context.destroy().await;
}

#[tokio::test(start_paused = true)]
async fn scheme_spellings_share_one_resource() {
    let client = MockHyperClient::new();
    client.insert_root(json!({
        "a": {"href": "proto:/users"},
        "b": {"href": "/users"},
    }));
    client.insert("proto:/users", json!({"count": 2}));
    client.set_latency(Duration::from_millis(5));
    let store = HyperStore::new(client.clone());

    let counts = store
        .get_async(|ctx| async move {
            let a = ctx.get(".a.count", None, None).await?;
            let b = ctx.get(".b.count", None, None).await?;
            Ok((a, b))
        })
        .await
        .unwrap();
    assert_eq!(counts, (Some(json!(2)), Some(json!(2))));

    // one fetch, dispatched with the originally requested spelling
    assert_eq!(client.dispatch_count("proto:/users"), 1);
    assert_eq!(client.dispatch_count("/users"), 0);
}

#[tokio::test(start_paused = true)]
async fn reload_refetches_through_clear() {
    let client = users_client();
    let store = HyperStore::new(client.clone());
    let mut context = store.context();
    render_until_loaded(&mut context, ".users.collection.0.name").await;

    client.insert("/users/1", json!({"name": "Michael"}));
    store.reload("/users/1").await.unwrap();
    context.wake().await.unwrap();

    context.start().await.unwrap();
    let name = context
        .get(".users.collection.0.name", None, None)
        .await
        .unwrap();
    assert_eq!(name, Some(json!("Michael")));
    assert!(context.stop().await.unwrap());

    assert_eq!(client.dispatch_count("/users/1"), 2);
    assert_eq!(client.clear_count("/users/1"), 1);
    context.destroy().await;
}

/// A client without a transport cache: `clear` keeps the default no-op.
#[derive(Clone)]
struct NoClearClient(MockHyperClient);

#[async_trait::async_trait]
impl HyperClient for NoClearClient {
    async fn root(&self) -> FetchOutcome {
        self.0.root().await
    }

    async fn get(&self, href: &str) -> FetchOutcome {
        self.0.get(href).await
    }
}

#[tokio::test(start_paused = true)]
async fn reload_without_clear_still_refetches() {
    let inner = users_client();
    let store = HyperStore::new(NoClearClient(inner.clone()));
    let mut context = store.context();
    render_until_loaded(&mut context, ".users.collection.0.name").await;

    inner.insert("/users/1", json!({"name": "Michael"}));
    store.reload("/users/1").await.unwrap();
    context.wake().await.unwrap();

    context.start().await.unwrap();
    let name = context
        .get(".users.collection.0.name", None, None)
        .await
        .unwrap();
    assert_eq!(name, Some(json!("Michael")));
    context.stop().await.unwrap();

    assert_eq!(inner.dispatch_count("/users/1"), 2);
    assert_eq!(inner.clear_count("/users/1"), 0);
    context.destroy().await;
}

#[tokio::test(start_paused = true)]
async fn reload_of_unknown_id_is_ignored() {
    let client = users_client();
    let store = HyperStore::new(client.clone());
    store.reload("/never-seen").await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(client.dispatch_count("/never-seen"), 0);
}

#[tokio::test(start_paused = true)]
async fn scoped_reads_walk_from_the_scope() {
    let client = users_client();
    let store = HyperStore::new(client.clone());
    let mut context = store.context();
    render_until_loaded(&mut context, ".users.collection.0.name").await;

    context.start().await.unwrap();
    let list = context.get(".users.collection", None, None).await.unwrap();
    let quiz = list.unwrap().get(0).cloned().unwrap();
    // the scope itself is a link stub; /users/1 is already cached
    let name = context.get("name", Some(&quiz), None).await.unwrap();
    assert_eq!(name, Some(json!("Mike")));
    assert!(context.stop().await.unwrap());
    context.destroy().await;
}
