//! Path resolution against the resource graph.
//!
//! The walker applies one [`PathSegment`] at a time to a JSON scope. Whenever
//! the current value is an object that lacks the next segment locally but
//! carries an `"href"` link, the link is dereferenced through a
//! [`ResourceView`] lookup, repeatedly, since a fetched body may itself be a
//! link stub. A locally present member always wins over the link, so embedded
//! partial representations short-circuit fetches.
//!
//! Resolution never blocks: a link whose target has no cached entry ends the
//! walk as "not loaded", and every id the walk reached is reported back so
//! the caller can count it into the open sweep and dispatch fetches.

use serde_json::Value;

use crate::client::{canonical_id, ClientError, ROOT_RESOURCE};
use crate::path::{Path, PathSegment};
use crate::store::table::ResourceEntry;

/// Lookup interface the walker resolves hrefs through.
pub(crate) trait ResourceView {
    fn lookup(&self, canonical: &str) -> Option<&ResourceEntry>;
}

/// A resource id the walk reached, in both spellings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TouchedId {
    pub canonical: String,
    pub requested: String,
}

/// What one walk produced.
#[derive(Debug)]
pub(crate) struct ResolveOutcome {
    /// The resolved value; `None` when the walk was blocked or the final
    /// member is absent.
    pub value: Option<Value>,
    /// `false` when the walk stopped at an unfetched link.
    pub is_loaded: bool,
    /// Set when a dereferenced id holds a cached fetch error.
    pub error: Option<(String, ClientError)>,
    /// Every id dereferenced during the walk, in order.
    pub touched: Vec<TouchedId>,
}

impl ResolveOutcome {
    fn blocked(touched: Vec<TouchedId>) -> Self {
        Self {
            value: None,
            is_loaded: false,
            error: None,
            touched,
        }
    }

    fn failed(touched: Vec<TouchedId>, id: String, error: ClientError) -> Self {
        Self {
            value: None,
            is_loaded: false,
            error: Some((id, error)),
            touched,
        }
    }
}

enum Step {
    Value(Value),
    Blocked,
    Failed(String, ClientError),
}

fn deref(id: &str, requested: &str, view: &dyn ResourceView, touched: &mut Vec<TouchedId>) -> Step {
    touched.push(TouchedId {
        canonical: id.to_owned(),
        requested: requested.to_owned(),
    });
    match view.lookup(id) {
        Some(entry) => match &entry.error {
            Some(error) => Step::Failed(id.to_owned(), error.clone()),
            None => Step::Value(entry.value.clone().unwrap_or(Value::Null)),
        },
        None => Step::Blocked,
    }
}

/// Resolves `path` against `scope` (or the root resource when no scope is
/// given) through `view`.
pub(crate) fn resolve(path: &Path, scope: Option<&Value>, view: &dyn ResourceView) -> ResolveOutcome {
    let mut touched = Vec::new();
    let segments = path.segments();

    let mut rest = segments;
    let mut current = if let Some(PathSegment::Root) = segments.first() {
        rest = &segments[1..];
        match deref(ROOT_RESOURCE, ROOT_RESOURCE, view, &mut touched) {
            Step::Value(value) => value,
            Step::Blocked => return ResolveOutcome::blocked(touched),
            Step::Failed(id, error) => return ResolveOutcome::failed(touched, id, error),
        }
    } else if let Some(scope) = scope {
        scope.clone()
    } else {
        match deref(ROOT_RESOURCE, ROOT_RESOURCE, view, &mut touched) {
            Step::Value(value) => value,
            Step::Blocked => return ResolveOutcome::blocked(touched),
            Step::Failed(id, error) => return ResolveOutcome::failed(touched, id, error),
        }
    };

    for segment in rest {
        // follow links until the segment is locally applicable; a chain that
        // revisits an id is a stub cycle and stops dereferencing
        let mut hops = std::collections::HashSet::new();
        loop {
            let Some(object) = current.as_object() else {
                break;
            };
            let local = match segment {
                PathSegment::Key(key) => object.contains_key(key),
                _ => false,
            };
            if local {
                break;
            }
            let Some(href) = object.get("href").and_then(Value::as_str) else {
                break;
            };
            let canonical = canonical_id(href).to_owned();
            if !hops.insert(canonical.clone()) {
                break;
            }
            match deref(&canonical, href, view, &mut touched) {
                Step::Value(value) => current = value,
                Step::Blocked => return ResolveOutcome::blocked(touched),
                Step::Failed(id, error) => return ResolveOutcome::failed(touched, id, error),
            }
        }

        let next = match segment {
            PathSegment::Root => match deref(ROOT_RESOURCE, ROOT_RESOURCE, view, &mut touched) {
                Step::Value(value) => Some(value),
                Step::Blocked => return ResolveOutcome::blocked(touched),
                Step::Failed(id, error) => return ResolveOutcome::failed(touched, id, error),
            },
            PathSegment::Key(key) => current.get(key).cloned(),
            PathSegment::Index(index) => current.get(index).cloned(),
        };
        match next {
            Some(value) => current = value,
            // absent member: resolved, just not there
            None => {
                return ResolveOutcome {
                    value: None,
                    is_loaded: true,
                    error: None,
                    touched,
                }
            }
        }
    }

    ResolveOutcome {
        value: Some(current),
        is_loaded: true,
        error: None,
        touched,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use tokio::time::Instant;

    #[derive(Default)]
    struct StubView {
        entries: HashMap<String, ResourceEntry>,
    }

    impl StubView {
        fn with(mut self, id: &str, value: Value) -> Self {
            self.entries.insert(
                id.to_owned(),
                ResourceEntry {
                    value: Some(value),
                    error: None,
                    fetched_at: Instant::now(),
                },
            );
            self
        }

        fn with_error(mut self, id: &str, error: ClientError) -> Self {
            self.entries.insert(
                id.to_owned(),
                ResourceEntry {
                    value: None,
                    error: Some(error),
                    fetched_at: Instant::now(),
                },
            );
            self
        }
    }

    impl ResourceView for StubView {
        fn lookup(&self, canonical: &str) -> Option<&ResourceEntry> {
            self.entries.get(canonical)
        }
    }

    fn users_graph() -> StubView {
        StubView::default()
            .with(ROOT_RESOURCE, json!({"users": {"href": "/users"}}))
            .with("/users", json!({"collection": [{"href": "/users/1"}]}))
            .with("/users/1", json!({"name": "Mike"}))
    }

    #[tokio::test]
    async fn walks_links_to_the_leaf() {
        let view = users_graph();
        let outcome = resolve(&Path::parse(".users.collection.0.name"), None, &view);
        assert_eq!(outcome.value, Some(json!("Mike")));
        assert!(outcome.is_loaded);
        let ids: Vec<&str> = outcome.touched.iter().map(|t| t.canonical.as_str()).collect();
        assert_eq!(ids, [ROOT_RESOURCE, "/users", "/users/1"]);
    }

    #[tokio::test]
    async fn blocks_at_the_first_missing_resource() {
        let view = StubView::default().with(ROOT_RESOURCE, json!({"users": {"href": "/users"}}));
        let outcome = resolve(&Path::parse(".users.collection.0.name"), None, &view);
        assert_eq!(outcome.value, None);
        assert!(!outcome.is_loaded);
        let ids: Vec<&str> = outcome.touched.iter().map(|t| t.canonical.as_str()).collect();
        assert_eq!(ids, [ROOT_RESOURCE, "/users"]);
    }

    #[tokio::test]
    async fn resolves_within_a_scope() {
        let view = users_graph();
        let scope = json!({"href": "/users/1"});
        let outcome = resolve(&Path::parse("name"), Some(&scope), &view);
        assert_eq!(outcome.value, Some(json!("Mike")));
        let ids: Vec<&str> = outcome.touched.iter().map(|t| t.canonical.as_str()).collect();
        assert_eq!(ids, ["/users/1"]);
    }

    #[tokio::test]
    async fn local_member_wins_over_link() {
        let view = users_graph();
        let scope = json!({"href": "/users/1", "name": "Embedded"});
        let outcome = resolve(&Path::parse("name"), Some(&scope), &view);
        assert_eq!(outcome.value, Some(json!("Embedded")));
        assert!(outcome.touched.is_empty());
    }

    #[tokio::test]
    async fn absent_member_is_loaded_but_undefined() {
        let view = users_graph();
        let outcome = resolve(&Path::parse(".users.missing"), None, &view);
        assert_eq!(outcome.value, None);
        assert!(outcome.is_loaded);
    }

    #[tokio::test]
    async fn cached_error_aborts_resolution() {
        let view = StubView::default()
            .with(ROOT_RESOURCE, json!({"users": {"href": "/users"}}))
            .with_error("/users", ClientError::NotFound("/users".into()));
        let outcome = resolve(&Path::parse(".users.collection"), None, &view);
        assert!(!outcome.is_loaded);
        let (id, error) = outcome.error.expect("cached error should surface");
        assert_eq!(id, "/users");
        assert_eq!(error, ClientError::NotFound("/users".into()));
        // the failing id still counts as touched
        assert_eq!(outcome.touched.last().map(|t| t.canonical.as_str()), Some("/users"));
    }

    #[tokio::test]
    async fn scheme_prefix_is_stripped_for_lookup() {
        let view = StubView::default()
            .with(ROOT_RESOURCE, json!({"users": {"href": "proto:/users"}}))
            .with("/users", json!({"count": 2}));
        let outcome = resolve(&Path::parse(".users.count"), None, &view);
        assert_eq!(outcome.value, Some(json!(2)));
        let touched = &outcome.touched[1];
        assert_eq!(touched.canonical, "/users");
        assert_eq!(touched.requested, "proto:/users");
    }

    #[tokio::test]
    async fn self_referencing_stub_terminates() {
        let view = StubView::default().with("/loop", json!({"href": "/loop"}));
        let scope = json!({"href": "/loop"});
        let outcome = resolve(&Path::parse("missing"), Some(&scope), &view);
        assert_eq!(outcome.value, None);
        assert!(outcome.is_loaded);
        let ids: Vec<&str> = outcome.touched.iter().map(|t| t.canonical.as_str()).collect();
        assert_eq!(ids, ["/loop"]);
    }

    #[tokio::test]
    async fn empty_path_yields_the_scope() {
        let view = users_graph();
        let outcome = resolve(&Path::parse(""), Some(&json!(7)), &view);
        assert_eq!(outcome.value, Some(json!(7)));
        let outcome = resolve(&Path::parse(""), None, &view);
        assert_eq!(outcome.value, Some(json!({"users": {"href": "/users"}})));
    }
}
