//! # Observability & Tracing
//!
//! [`setup_tracing`] initializes structured logging for a process embedding
//! the store. The store logs its interesting transitions with structured
//! fields: fetch dispatch and settlement (with latency and the pending
//! count), garbage flagging, resurrection, and eviction.
//!
//! Log levels follow `RUST_LOG`:
//!
//! ```bash
//! # settlements, evictions, fetch failures
//! RUST_LOG=debug cargo run
//!
//! # plus per-sweep open/finalize noise
//! RUST_LOG=trace cargo run
//!
//! # only this crate
//! RUST_LOG=hyper_store=debug cargo run
//! ```
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}
