//! Runtime lifecycle utilities.
//!
//! The store itself is spawned by [`HyperStore::new`](crate::HyperStore::new)
//! and shuts down when its last handle drops; what remains here is the
//! observability setup shared by binaries and examples.

pub mod tracing;

pub use self::tracing::setup_tracing;
