//! Purpose: Library crate backing the `brokeradm` CLI and tests.
//! Exports: `core` (dynamic JSON bridge, errors) and `api` (management client, models).
//! Role: Binds a message broker's management HTTP API; opaque payloads go through `core::codec`.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
//! Invariants: `api` is the public surface; `core` types it needs are re-exported there.
pub mod api;
pub mod core;
