//! # Observability & Tracing
//!
//! Models log through the `tracing` crate. Persistence operations open a span per
//! call carrying `entity_type` (the definition name) and the model `uid`, so every
//! line inside an operation can be attributed to one instance.
//!
//! | Level | What |
//! |-------|------|
//! | `info` | an operation completed |
//! | `warn` | an operation failed |
//! | `debug` | requests sent, operations skipped or cancelled, locale changes |
//!
//! ## Usage Examples
//!
//! ```bash
//! # Completed and failed operations only
//! RUST_LOG=info cargo test
//!
//! # Every request as it is sent
//! RUST_LOG=debug cargo test
//! ```
//!
//! With `RUST_LOG=debug` a create looks like:
//!
//! ```text
//! DEBUG save{entity_type=user uid=3}: Sending request method=POST url=/users
//! INFO save{entity_type=user uid=3}: Completed operation=save status=Some(201)
//! ```

/// Installs a compact `tracing-subscriber` formatter filtered by `RUST_LOG`.
///
/// Call once, at process start. Calling it again panics.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false) // entity_type identifies the source instead
        .compact()
        .init();
}

/// Like [`setup_tracing`], but returns quietly if a subscriber is already installed.
pub fn try_setup_tracing() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .try_init()
        .is_ok()
}
