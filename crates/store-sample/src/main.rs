//! # Store Sample
//!
//! A small walkthrough of the hypermedia store:
//!
//! 1. Seed a mock hypermedia graph (a quiz feed).
//! 2. Render a view with [`HyperStore::get_async`]; the render function
//!    re-runs as each linked resource arrives.
//! 3. Tail the store's events until the network goes quiet.
//!
//! ```bash
//! RUST_LOG=info cargo run -p store-sample
//! RUST_LOG=debug cargo run -p store-sample   # fetch dispatch/settle detail
//! ```

use std::time::Duration;

use hyper_store::lifecycle::setup_tracing;
use hyper_store::mock::MockHyperClient;
use hyper_store::{HyperStore, StoreEvent};
use serde_json::json;
use tracing::{info, Instrument};

fn seed_graph(client: &MockHyperClient) {
    client.insert_root(json!({"quizzes": {"href": "/quizzes"}}));
    client.insert(
        "/quizzes",
        json!({"trending": [{"href": "/quizzes/1"}, {"href": "/quizzes/2"}]}),
    );
    client.insert(
        "/quizzes/1",
        json!({"title": "Which crate are you?", "author": {"href": "/users/7"}}),
    );
    client.insert(
        "/quizzes/2",
        json!({"title": "Name that lifetime", "author": {"href": "/users/7"}}),
    );
    client.insert("/users/7", json!({"display_name": "Mike"}));
}

#[tokio::main]
async fn main() -> Result<(), hyper_store::StoreError> {
    setup_tracing();

    info!("Starting hypermedia store demo");

    let client = MockHyperClient::new();
    client.set_latency(Duration::from_millis(25));
    seed_graph(&client);

    let store = HyperStore::new(client.clone());
    let mut events = store.subscribe();

    // Render the trending feed; the closure re-runs on every coalesced wake
    // until everything it reads is cached.
    let span = tracing::info_span!("trending_feed");
    let feed = async {
        info!("Rendering trending feed");
        store
            .get_async(|ctx| async move {
                let mut lines = Vec::new();
                let trending = ctx
                    .get(".quizzes.trending", None, Some(json!([])))
                    .await?
                    .unwrap_or(json!([]));
                for quiz in trending.as_array().into_iter().flatten() {
                    let title = ctx.get("title", Some(quiz), None).await?;
                    let author = ctx.get("author.display_name", Some(quiz), None).await?;
                    lines.push((title, author));
                }
                Ok(lines)
            })
            .await
    }
    .instrument(span)
    .await?;

    for (title, author) in &feed {
        info!(?title, ?author, "Rendered quiz");
    }

    // Drain the event stream up to quiescence.
    loop {
        match events.recv().await {
            Ok(StoreEvent::Change(notice)) => {
                info!(id = %notice.id, latency = ?notice.latency, "Resource settled")
            }
            Ok(StoreEvent::Complete) => {
                info!("Network quiescent");
                break;
            }
            Err(e) => {
                info!(error = %e, "Event stream ended");
                break;
            }
        }
    }

    info!(
        fetches = client.operations().len(),
        open_subscriptions = client.open_subscriptions(),
        "Demo complete"
    );
    Ok(())
}
