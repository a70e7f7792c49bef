//! Authenticated request pipeline for Azure Blob, Queue and Table storage.
//!
//! This crate is deliberately scoped to the pipeline shared by every Azure Storage
//! service call — canonicalization/signing, credential strategies, a connection-pool
//! agent, retry with backoff, and response classification/parsing — rather than a
//! full per-service API surface. `facade` holds a handful of representative
//! operations that exercise the pipeline end to end; most callers will plug their
//! own request-shaping on top of [`client::Client::execute`].

pub mod agent;
pub mod canonical;
pub mod classify;
pub mod client;
pub mod config;
pub mod credential;
pub mod error;
pub mod executor;
pub mod facade;
pub mod meta;
pub mod retry;
pub mod sas;
pub mod signer;
pub mod xml;

pub use client::{Client, OperationRequest};
pub use config::{ClientConfig, ClientConfigBuilder, CredentialSource};
pub use error::{Error, ErrorKind, Result, ServiceError};

/// Installs a `tracing-subscriber` `fmt` layer honoring `RUST_LOG`, for binaries
/// embedding this crate that don't already manage their own subscriber. Tests and
/// libraries embedding this crate are expected to configure their own subscriber
/// instead of calling this.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();
}
